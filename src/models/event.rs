use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::models::user::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_at: DateTime<Utc>,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
    pub owner_id: String,
    #[serde(default)]
    pub target: EventTarget,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub metrics: EventMetrics,
    #[serde(default)]
    pub notified_10min: bool,
    #[serde(default)]
    pub feedback_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Suspended,
}

impl Default for EventStatus {
    fn default() -> Self {
        EventStatus::Active
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Active => write!(f, "active"),
            EventStatus::Suspended => write!(f, "suspended"),
        }
    }
}

/// Audience the organizer aimed the event at. An empty year list and the
/// `"All"` department wildcard both mean "open to everyone".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventTarget {
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    pub years: Vec<i32>,
}

/// Derived counters kept on the event document. Not authoritative; the
/// participant and check-in collections can always recompute them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EventMetrics {
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub reminders_set: i64,
    #[serde(default)]
    pub registrations: i64,
    #[serde(default)]
    pub attendance: i64,
}

impl Event {
    pub fn is_suspended(&self) -> bool {
        self.status == EventStatus::Suspended
    }

    pub fn hex_id(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }

    /// Suspended events stay visible to their owner and to admins only.
    pub fn visible_to(&self, viewer_id: &str, role: Role) -> bool {
        !self.is_suspended() || self.owner_id == viewer_id || role == Role::Admin
    }

    pub fn matches_audience(&self, department: &str, year: i32) -> bool {
        let depts = &self.target.departments;
        let dept_match = depts.is_empty()
            || depts.iter().any(|d| d == "All")
            || depts.iter().any(|d| d == department);
        let years = &self.target.years;
        let year_match = years.is_empty() || years.contains(&year);
        dept_match && year_match
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFilter {
    Upcoming,
    Past,
    Category(String),
}

impl FeedFilter {
    pub fn parse(raw: Option<&str>) -> FeedFilter {
        match raw {
            None => FeedFilter::Upcoming,
            Some(s) if s.eq_ignore_ascii_case("upcoming") => FeedFilter::Upcoming,
            Some(s) if s.eq_ignore_ascii_case("past") => FeedFilter::Past,
            Some(s) => FeedFilter::Category(s.to_string()),
        }
    }

    /// Tab filtering as the mobile feed does it: "upcoming" keeps everything
    /// newer than a one-day grace window sorted soonest-first, "past" is the
    /// complement sorted most-recent-first, categories sort soonest-first.
    pub fn apply(&self, mut events: Vec<Event>, now: DateTime<Utc>) -> Vec<Event> {
        let cutoff = now - Duration::hours(24);
        match self {
            FeedFilter::Upcoming => {
                events.retain(|e| e.start_at >= cutoff);
                events.sort_by_key(|e| e.start_at);
            }
            FeedFilter::Past => {
                events.retain(|e| e.start_at < cutoff);
                events.sort_by_key(|e| std::cmp::Reverse(e.start_at));
            }
            FeedFilter::Category(category) => {
                events.retain(|e| e.category.eq_ignore_ascii_case(category));
                events.sort_by_key(|e| e.start_at);
            }
        }
        events
    }
}
