use mongodb::{options::ClientOptions, Client, Database};

use crate::config::Config;

pub mod collections {
    pub const EVENTS: &str = "events";
    pub const PARTICIPANTS: &str = "participants";
    pub const CHECKINS: &str = "checkins";
    pub const USERS: &str = "users";
    pub const PARTICIPATING: &str = "participating";
    pub const REMINDERS: &str = "reminders";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const FEEDBACK_REQUESTS: &str = "feedback_requests";
    pub const CLUBS: &str = "clubs";
}

pub async fn init_db(config: &Config) -> Database {
    let mut client_options = ClientOptions::parse(&config.mongodb_uri)
        .await
        .expect("invalid MONGODB_URI");
    client_options.app_name = Some("unievent".to_string());

    let db_name = client_options
        .default_database
        .clone()
        .unwrap_or_else(|| "unievent".to_string());
    let client = Client::with_options(client_options).expect("failed to build MongoDB client");
    client.database(&db_name)
}

/// Per-event documents keyed by user carry a composite `_id`, which makes
/// the unique index the create-if-absent primitive for check-ins and RSVPs.
pub fn composite_id(event_id: &str, user_id: &str) -> String {
    format!("{}:{}", event_id, user_id)
}

#[cfg(test)]
mod tests {
    use super::composite_id;

    #[test]
    fn composite_id_joins_event_and_user() {
        assert_eq!(composite_id("E1", "U1"), "E1:U1");
    }
}
