use anyhow::Result;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::{Collection, Database};

use crate::db::collections;
use crate::models::notification::Notification;
use crate::models::reminder::Reminder;
use crate::models::user::UserProfile;
use crate::push::{is_push_token, PushClient, PushMessage};

/// Dispatch every due, unsent reminder: an in-app notification always, a
/// push message when the user has a usable device token, then mark it sent.
pub async fn sweep(db: &Database, push: &PushClient) -> Result<u64> {
    let reminders: Collection<Reminder> = db.collection(collections::REMINDERS);
    let notifications: Collection<Notification> = db.collection(collections::NOTIFICATIONS);
    let users: Collection<UserProfile> = db.collection(collections::USERS);

    let now = DateTime::from_chrono(Utc::now());
    let mut cursor = reminders
        .find(doc! {"sent": false, "remind_at": {"$lte": now}}, None)
        .await?;

    let mut messages = Vec::new();
    let mut processed = 0u64;

    while let Some(reminder) = cursor.try_next().await? {
        let notification = Notification::new(
            &reminder.user_id,
            "Event Reminder",
            "Your event is starting soon!".to_string(),
            &reminder.event_id,
        );
        notifications.insert_one(&notification, None).await?;

        if let Ok(user_oid) = ObjectId::parse_str(&reminder.user_id) {
            let user = users.find_one(doc! {"_id": user_oid}, None).await?;
            if let Some(token) = user.and_then(|u| u.push_token) {
                if is_push_token(&token) {
                    messages.push(PushMessage::new(
                        &token,
                        "Event Reminder",
                        "Your event is starting!".to_string(),
                        &reminder.event_id,
                    ));
                }
            }
        }

        if let Some(id) = reminder.id {
            reminders
                .update_one(doc! {"_id": id}, doc! {"$set": {"sent": true}}, None)
                .await?;
        }
        processed += 1;
    }

    push.send_all(&messages).await;
    Ok(processed)
}
