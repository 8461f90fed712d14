use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Club {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub owner_user_id: String,
    #[serde(default)]
    pub reputation: Reputation,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Reputation {
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub attendance_count: i64,
}

/// Reputation formula over a club's event metrics: 10 points per 100
/// attendees, 2 per registration, 1 per reminder set.
pub fn reputation_points(attendance: i64, registrations: i64, reminders: i64) -> i64 {
    (attendance / 100) * 10 + registrations * 2 + reminders
}

#[cfg(test)]
mod tests {
    use super::reputation_points;

    #[test]
    fn points_follow_the_published_formula() {
        assert_eq!(reputation_points(0, 0, 0), 0);
        assert_eq!(reputation_points(99, 0, 0), 0);
        assert_eq!(reputation_points(250, 10, 3), 20 + 20 + 3);
    }
}
