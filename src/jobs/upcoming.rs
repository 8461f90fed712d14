use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::{Collection, Database};

use crate::db::collections;
use crate::models::event::Event;
use crate::models::participant::Participant;
use crate::models::user::UserProfile;
use crate::push::{is_push_token, PushClient, PushMessage};

/// One-minute window starting ten minutes out. The sweep runs every minute,
/// so together with the `notified_10min` flag each event is picked up once.
pub fn notify_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (now + Duration::minutes(10), now + Duration::minutes(11))
}

/// Push "starting soon" to every participant of an active event entering
/// the notification window, then flag the event so it is never re-notified.
pub async fn sweep(db: &Database, push: &PushClient) -> Result<u64> {
    let events: Collection<Event> = db.collection(collections::EVENTS);
    let participants: Collection<Participant> = db.collection(collections::PARTICIPANTS);
    let users: Collection<UserProfile> = db.collection(collections::USERS);

    let (from, to) = notify_window(Utc::now());
    let filter = doc! {
        "status": "active",
        "notified_10min": {"$ne": true},
        "start_at": {
            "$gte": mongodb::bson::DateTime::from_chrono(from),
            "$lte": mongodb::bson::DateTime::from_chrono(to),
        },
    };

    let mut cursor = events.find(filter, None).await?;
    let mut messages = Vec::new();
    let mut processed = 0u64;

    while let Some(event) = cursor.try_next().await? {
        let event_id = event.hex_id();
        let body = format!("{} is starting in 10 minutes.", event.title);

        let mut attendee_cursor = participants
            .find(doc! {"event_id": &event_id}, None)
            .await?;
        while let Some(participant) = attendee_cursor.try_next().await? {
            let Ok(user_oid) = ObjectId::parse_str(&participant.user_id) else {
                continue;
            };
            let user = users.find_one(doc! {"_id": user_oid}, None).await?;
            if let Some(token) = user.and_then(|u| u.push_token) {
                if is_push_token(&token) {
                    messages.push(PushMessage::new(
                        &token,
                        "Event Starting Soon!",
                        body.clone(),
                        &event_id,
                    ));
                }
            }
        }

        if let Some(id) = event.id {
            events
                .update_one(
                    doc! {"_id": id},
                    doc! {"$set": {"notified_10min": true}},
                    None,
                )
                .await?;
        }
        processed += 1;
    }

    push.send_all(&messages).await;
    Ok(processed)
}
