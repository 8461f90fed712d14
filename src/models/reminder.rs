use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub event_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub remind_at: DateTime<Utc>,
    #[serde(default)]
    pub sent: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn new(user_id: &str, event_id: &str, remind_at: DateTime<Utc>) -> Self {
        Reminder {
            id: None,
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
            remind_at,
            sent: false,
            created_at: Utc::now(),
        }
    }
}
