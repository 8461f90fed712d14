use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::models::event::Event;
use crate::models::participant::Participant;

pub const FEEDBACK_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub user_name: String,
    pub event_id: String,
    pub event_title: String,
    pub club_id: String,
    pub club_name: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub event_end_at: DateTime<Utc>,
    pub status: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl FeedbackRequest {
    pub fn for_participant(event: &Event, participant: &Participant, now: DateTime<Utc>) -> Self {
        FeedbackRequest {
            id: None,
            user_id: participant.user_id.clone(),
            user_name: participant.name.clone(),
            event_id: event.hex_id(),
            event_title: event.title.clone(),
            club_id: event.owner_id.clone(),
            club_name: event
                .organization
                .clone()
                .unwrap_or_else(|| "Organizer".to_string()),
            event_end_at: event.end_at,
            status: "pending".to_string(),
            created_at: now,
            expires_at: now + Duration::days(FEEDBACK_WINDOW_DAYS),
        }
    }
}
