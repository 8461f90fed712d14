use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::db::composite_id;
use crate::models::participant::Participant;

/// Durable proof that a registered attendee was admitted. Created at most
/// once per (event, user) via the composite `_id`; never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub event_id: String,
    pub user_id: String,
    pub name: String,
    pub department: String,
    pub year: i32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub checked_in_at: DateTime<Utc>,
    /// Operator (organizer/staff) who performed the scan.
    pub checked_in_by: String,
}

impl CheckInRecord {
    pub fn new(registration: &Participant, operator_id: &str, at: DateTime<Utc>) -> Self {
        CheckInRecord {
            id: composite_id(&registration.event_id, &registration.user_id),
            event_id: registration.event_id.clone(),
            user_id: registration.user_id.clone(),
            name: registration.name.clone(),
            department: registration.department.clone(),
            year: registration.year,
            checked_in_at: at,
            checked_in_by: operator_id.to_string(),
        }
    }
}
