use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::db::composite_id;

/// A user's RSVP for one event. The composite `_id` enforces at most one
/// registration per (event, user) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "_id")]
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub year: i32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub joined_at: DateTime<Utc>,
    /// Short code for manual entry at the door, issued at RSVP time.
    pub ticket_code: String,
}

impl Participant {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: &str,
        user_id: &str,
        name: &str,
        email: &str,
        department: &str,
        year: i32,
        ticket_code: String,
    ) -> Self {
        Participant {
            id: composite_id(event_id, user_id),
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            department: department.to_string(),
            year,
            joined_at: Utc::now(),
            ticket_code,
        }
    }
}

/// Mirror entry under the user, so "my events" never scans every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participating {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub joined_at: DateTime<Utc>,
}

impl Participating {
    pub fn new(user_id: &str, event_id: &str) -> Self {
        Participating {
            id: composite_id(user_id, event_id),
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
            joined_at: Utc::now(),
        }
    }
}
