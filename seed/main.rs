use chrono::Utc;
use dotenvy::dotenv;
use mongodb::bson::doc;
use mongodb::{options::ClientOptions, Client, Collection};
use unievent::{
    config::Config,
    db::collections,
    models::event::{Event, EventMetrics, EventStatus, EventTarget},
    models::user::{Role, UserProfile},
    utils::auth::hash_password,
};

#[tokio::main]
async fn main() -> mongodb::error::Result<()> {
    dotenv().ok();
    let config = Config::from_env();

    let mut client_options = ClientOptions::parse(&config.mongodb_uri).await?;
    client_options.app_name = Some("unievent_seed".to_string());
    let db_name = client_options
        .default_database
        .clone()
        .unwrap_or_else(|| "unievent".to_string());
    let client = Client::with_options(client_options)?;
    let db = client.database(&db_name);

    // Seed admin
    let users: Collection<UserProfile> = db.collection(collections::USERS);
    if users
        .count_documents(doc! {"role": "admin"}, None)
        .await?
        == 0
    {
        let password_hash =
            hash_password(&config.admin_password).expect("Failed to hash password");
        let admin = UserProfile {
            id: None,
            email: config.admin_email.clone(),
            password_hash,
            name: "Administrator".to_string(),
            department: "All".to_string(),
            year: 0,
            role: Role::Admin,
            push_token: None,
            points: 0,
            created_at: Utc::now(),
        };
        users.insert_one(admin, None).await?;
        println!("Admin user created: {}", config.admin_email);
    } else {
        println!("Admin user already exists. Skipping creation.");
    }

    // Seed events
    let events: Collection<Event> = db.collection(collections::EVENTS);
    events.delete_many(doc! {}, None).await?;

    let samples = vec![
        Event {
            id: None,
            title: "Robotics Expo".to_string(),
            description: "Student-built robots, live demos all day.".to_string(),
            category: "Tech".to_string(),
            start_at: Utc::now() + chrono::Duration::days(14),
            end_at: Utc::now() + chrono::Duration::days(14) + chrono::Duration::hours(8),
            location: "Engineering Block Atrium".to_string(),
            meeting_url: None,
            organization: Some("Robotics Club".to_string()),
            status: EventStatus::Active,
            owner_id: String::new(),
            target: EventTarget {
                departments: vec!["CSE".to_string(), "ECE".to_string()],
                years: vec![],
            },
            is_paid: false,
            price: 0.0,
            metrics: EventMetrics::default(),
            notified_10min: false,
            feedback_requested: false,
        },
        Event {
            id: None,
            title: "Spring Cultural Night".to_string(),
            description: "Music, dance and theatre from every department.".to_string(),
            category: "Cultural".to_string(),
            start_at: Utc::now() + chrono::Duration::days(30),
            end_at: Utc::now() + chrono::Duration::days(30) + chrono::Duration::hours(4),
            location: "Open Air Theatre".to_string(),
            meeting_url: None,
            organization: Some("Cultural Committee".to_string()),
            status: EventStatus::Active,
            owner_id: String::new(),
            target: EventTarget {
                departments: vec!["All".to_string()],
                years: vec![],
            },
            is_paid: true,
            price: 150.0,
            metrics: EventMetrics::default(),
            notified_10min: false,
            feedback_requested: false,
        },
    ];

    events.insert_many(samples, None).await?;
    println!("Sample events added:");
    println!("   - Robotics Expo");
    println!("   - Spring Cultural Night");

    println!("\nSeeding complete!");
    Ok(())
}
