use anyhow::Result;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};

use crate::db::collections;
use crate::models::event::Event;
use crate::models::feedback::FeedbackRequest;
use crate::models::participant::Participant;

/// Events handled per pass; the remainder is picked up on the next tick.
const BATCH_LIMIT: i64 = 50;

/// For each ended event that has not been swept yet, create a pending
/// feedback request per participant and flag the event.
pub async fn sweep(db: &Database) -> Result<u64> {
    let events: Collection<Event> = db.collection(collections::EVENTS);
    let participants: Collection<Participant> = db.collection(collections::PARTICIPANTS);
    let requests: Collection<FeedbackRequest> = db.collection(collections::FEEDBACK_REQUESTS);

    let now = Utc::now();
    let filter = doc! {
        "end_at": {"$lt": DateTime::from_chrono(now)},
        "feedback_requested": {"$ne": true},
    };
    let options = FindOptions::builder().limit(BATCH_LIMIT).build();

    let mut cursor = events.find(filter, options).await?;
    let mut processed = 0u64;

    while let Some(event) = cursor.try_next().await? {
        let event_id = event.hex_id();

        let mut attendee_cursor = participants
            .find(doc! {"event_id": &event_id}, None)
            .await?;
        let mut batch = Vec::new();
        while let Some(participant) = attendee_cursor.try_next().await? {
            batch.push(FeedbackRequest::for_participant(&event, &participant, now));
        }
        if !batch.is_empty() {
            requests.insert_many(&batch, None).await?;
        }

        if let Some(id) = event.id {
            events
                .update_one(
                    doc! {"_id": id},
                    doc! {"$set": {
                        "feedback_requested": true,
                        "feedback_requested_at": DateTime::from_chrono(now),
                    }},
                    None,
                )
                .await?;
        }
        processed += 1;
    }

    Ok(processed)
}
