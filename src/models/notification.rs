use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

/// In-app notification shown in the user's inbox, separate from push
/// delivery which goes through Expo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub event_id: String,
    #[serde(default)]
    pub read: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: &str, title: &str, body: String, event_id: &str) -> Self {
        Notification {
            id: None,
            user_id: user_id.to_string(),
            title: title.to_string(),
            body,
            event_id: event_id.to_string(),
            read: false,
            created_at: Utc::now(),
        }
    }
}
