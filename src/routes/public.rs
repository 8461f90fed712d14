use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::serde::Deserialize;
use rocket::{delete, get, post, routes, State};
use serde_json::{json, Value};

use crate::checkin;
use crate::checkin::store::{is_duplicate_key, MongoAttendanceStore};
use crate::checkin::ticket::{self, TicketKeys};
use crate::config::Config;
use crate::db::{collections, composite_id};
use crate::error::CheckInError;
use crate::models::event::{Event, FeedFilter};
use crate::models::notification::Notification;
use crate::models::participant::{Participant, Participating};
use crate::models::reminder::Reminder;
use crate::models::user::{Role, UserProfile};
use crate::utils::auth::{create_jwt, hash_password, resolve_role, verify_password, AuthUser};

use super::{api_error, db_error, fetch_profile, ApiError};

// --- Accounts ---

#[derive(Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    pub password: String,
    pub name: String,
    pub department: String,
    pub year: i32,
}

#[post("/register", data = "<payload>")]
pub async fn register(
    db: &State<Database>,
    config: &State<Config>,
    payload: Json<RegisterPayload>,
) -> Result<Json<Value>, ApiError> {
    let users: Collection<UserProfile> = db.collection(collections::USERS);

    let existing = users
        .find_one(doc! {"email": &payload.email}, None)
        .await
        .map_err(|_| db_error())?;
    if existing.is_some() {
        return Err(api_error(Status::Conflict, "Email already registered"));
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|_| api_error(Status::InternalServerError, "Password hashing failed"))?;

    let user = UserProfile {
        id: None,
        email: payload.email.clone(),
        password_hash,
        name: payload.name.clone(),
        department: payload.department.clone(),
        year: payload.year,
        role: Role::Student,
        push_token: None,
        points: 0,
        created_at: Utc::now(),
    };

    let result = users
        .insert_one(&user, None)
        .await
        .map_err(|_| db_error())?;
    let uid = result
        .inserted_id
        .as_object_id()
        .map(|id| id.to_hex())
        .ok_or_else(db_error)?;

    let token = create_jwt(&uid, Role::Student, &config.jwt_secret)
        .map_err(|_| api_error(Status::InternalServerError, "Token generation failed"))?;
    Ok(Json(json!({ "token": token, "uid": uid })))
}

#[derive(Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[post("/login", data = "<payload>")]
pub async fn login(
    db: &State<Database>,
    config: &State<Config>,
    payload: Json<LoginPayload>,
) -> Result<Json<Value>, ApiError> {
    let users: Collection<UserProfile> = db.collection(collections::USERS);
    let user = users
        .find_one(doc! {"email": &payload.email}, None)
        .await
        .map_err(|_| db_error())?;

    let Some(user) = user else {
        return Err(api_error(Status::Unauthorized, "Invalid credentials"));
    };
    if !verify_password(&payload.password, &user.password_hash) {
        return Err(api_error(Status::Unauthorized, "Invalid credentials"));
    }

    let uid = user.id.map(|id| id.to_hex()).unwrap_or_default();
    let token = create_jwt(&uid, user.role, &config.jwt_secret)
        .map_err(|_| api_error(Status::InternalServerError, "Token generation failed"))?;
    Ok(Json(json!({ "token": token, "uid": uid, "role": user.role.to_string() })))
}

#[derive(Deserialize)]
pub struct PushTokenPayload {
    pub push_token: String,
}

#[post("/me/push-token", data = "<payload>")]
pub async fn set_push_token(
    db: &State<Database>,
    auth: AuthUser,
    payload: Json<PushTokenPayload>,
) -> Result<Status, ApiError> {
    let object_id = ObjectId::parse_str(&auth.uid)
        .map_err(|_| api_error(Status::BadRequest, "Invalid user ID"))?;
    let users: Collection<UserProfile> = db.collection(collections::USERS);
    users
        .update_one(
            doc! {"_id": object_id},
            doc! {"$set": {"push_token": &payload.push_token}},
            None,
        )
        .await
        .map_err(|_| db_error())?;
    Ok(Status::NoContent)
}

// --- Event feed ---

#[get("/events?<filter>")]
pub async fn event_feed(
    db: &State<Database>,
    auth: AuthUser,
    filter: Option<&str>,
) -> Result<Json<Vec<Event>>, Status> {
    let profile = fetch_profile(db, &auth.uid)
        .await
        .map_err(|_| Status::InternalServerError)?;
    let role = resolve_role(&auth.claims, profile.as_ref());

    let events: Collection<Event> = db.collection(collections::EVENTS);
    let mut cursor = events
        .find(doc! {}, None)
        .await
        .map_err(|_| Status::InternalServerError)?;

    let mut list = Vec::new();
    while let Some(event) = cursor
        .try_next()
        .await
        .map_err(|_| Status::InternalServerError)?
    {
        if !event.visible_to(&auth.uid, role) {
            continue;
        }
        // Students only see events aimed at their department and year.
        if role == Role::Student {
            if let Some(profile) = &profile {
                if !event.matches_audience(&profile.department, profile.year) {
                    continue;
                }
            }
        }
        list.push(event);
    }

    Ok(Json(FeedFilter::parse(filter).apply(list, Utc::now())))
}

#[get("/events/<id>")]
pub async fn event_detail(
    db: &State<Database>,
    _auth: AuthUser,
    id: &str,
) -> Result<Json<Event>, Status> {
    let object_id = ObjectId::parse_str(id).map_err(|_| Status::BadRequest)?;
    let events: Collection<Event> = db.collection(collections::EVENTS);

    // Every detail view bumps the views metric; atomic so concurrent
    // viewers never lose an increment.
    events
        .update_one(
            doc! {"_id": object_id},
            doc! {"$inc": {"metrics.views": 1}},
            None,
        )
        .await
        .map_err(|_| Status::InternalServerError)?;

    let event = events
        .find_one(doc! {"_id": object_id}, None)
        .await
        .map_err(|_| Status::InternalServerError)?;
    match event {
        Some(e) => Ok(Json(e)),
        None => Err(Status::NotFound),
    }
}

// --- RSVP / withdrawal ---

#[post("/events/<id>/rsvp")]
pub async fn rsvp(
    db: &State<Database>,
    auth: AuthUser,
    id: &str,
) -> Result<Json<Value>, ApiError> {
    let object_id =
        ObjectId::parse_str(id).map_err(|_| api_error(Status::BadRequest, "Invalid event ID"))?;
    let events: Collection<Event> = db.collection(collections::EVENTS);
    let participants: Collection<Participant> = db.collection(collections::PARTICIPANTS);
    let participating: Collection<Participating> = db.collection(collections::PARTICIPATING);
    let notifications: Collection<Notification> = db.collection(collections::NOTIFICATIONS);
    let users: Collection<UserProfile> = db.collection(collections::USERS);

    let event = events
        .find_one(doc! {"_id": object_id}, None)
        .await
        .map_err(|_| db_error())?
        .ok_or_else(|| api_error(Status::NotFound, "Event not found"))?;
    if event.is_suspended() {
        return Err(api_error(Status::Conflict, "Event is suspended"));
    }

    let profile = fetch_profile(db, &auth.uid)
        .await?
        .ok_or_else(|| api_error(Status::NotFound, "User profile not found"))?;

    let registration = Participant::new(
        id,
        &auth.uid,
        &profile.name,
        &profile.email,
        &profile.department,
        profile.year,
        ticket::new_ticket_code(),
    );

    // Composite _id makes the insert reject a second RSVP for the same pair.
    match participants.insert_one(&registration, None).await {
        Ok(_) => {}
        Err(err) if is_duplicate_key(&err) => {
            return Err(api_error(Status::Conflict, "Already registered"));
        }
        Err(_) => return Err(db_error()),
    }

    let _ = participating
        .insert_one(&Participating::new(&auth.uid, id), None)
        .await;

    events
        .update_one(
            doc! {"_id": object_id},
            doc! {"$inc": {"metrics.registrations": 1}},
            None,
        )
        .await
        .map_err(|_| db_error())?;

    if let Ok(user_oid) = ObjectId::parse_str(&auth.uid) {
        let _ = users
            .update_one(doc! {"_id": user_oid}, doc! {"$inc": {"points": 10}}, None)
            .await;
    }

    let note = Notification::new(
        &auth.uid,
        "Event Registered",
        format!("You are going to {}", event.title),
        id,
    );
    let _ = notifications.insert_one(&note, None).await;

    Ok(Json(json!({
        "registered": true,
        "ticket_code": registration.ticket_code,
    })))
}

#[delete("/events/<id>/rsvp")]
pub async fn withdraw(
    db: &State<Database>,
    auth: AuthUser,
    id: &str,
) -> Result<Json<Value>, ApiError> {
    let object_id =
        ObjectId::parse_str(id).map_err(|_| api_error(Status::BadRequest, "Invalid event ID"))?;
    let events: Collection<Event> = db.collection(collections::EVENTS);
    let participating: Collection<Participating> = db.collection(collections::PARTICIPATING);
    let users: Collection<UserProfile> = db.collection(collections::USERS);

    // Checked-in is terminal; the attendance record must keep its
    // registration behind it, even against a scan racing this request.
    let store = MongoAttendanceStore::new(db.inner().clone());
    match checkin::withdraw(&store, id, &auth.uid).await {
        Ok(_) => {}
        Err(CheckInError::NotRegistered) => {
            return Err(api_error(Status::NotFound, "Not registered"));
        }
        Err(CheckInError::AlreadyCheckedIn) => {
            return Err(api_error(
                Status::Conflict,
                "Already checked in; withdrawal is not possible",
            ));
        }
        Err(_) => return Err(db_error()),
    }

    let _ = participating
        .delete_one(doc! {"_id": composite_id(&auth.uid, id)}, None)
        .await;

    events
        .update_one(
            doc! {"_id": object_id},
            doc! {"$inc": {"metrics.registrations": -1}},
            None,
        )
        .await
        .map_err(|_| db_error())?;

    if let Ok(user_oid) = ObjectId::parse_str(&auth.uid) {
        let _ = users
            .update_one(doc! {"_id": user_oid}, doc! {"$inc": {"points": -10}}, None)
            .await;
    }

    Ok(Json(json!({ "registered": false })))
}

// --- Tickets ---

#[get("/events/<id>/ticket")]
pub async fn my_ticket(
    db: &State<Database>,
    keys: &State<TicketKeys>,
    auth: AuthUser,
    id: &str,
) -> Result<Json<Value>, ApiError> {
    let object_id =
        ObjectId::parse_str(id).map_err(|_| api_error(Status::BadRequest, "Invalid event ID"))?;
    let events: Collection<Event> = db.collection(collections::EVENTS);
    let participants: Collection<Participant> = db.collection(collections::PARTICIPANTS);

    let event = events
        .find_one(doc! {"_id": object_id}, None)
        .await
        .map_err(|_| db_error())?
        .ok_or_else(|| api_error(Status::NotFound, "Event not found"))?;

    let registration = participants
        .find_one(doc! {"_id": composite_id(id, &auth.uid)}, None)
        .await
        .map_err(|_| db_error())?
        .ok_or_else(|| api_error(Status::NotFound, "Not registered for this event"))?;

    // QR payload stays scannable through the event plus a grace day.
    let valid_until = event.end_at + chrono::Duration::days(1);
    let token = ticket::issue(keys, id, &auth.uid, valid_until)
        .map_err(|_| api_error(Status::InternalServerError, "Ticket signing failed"))?;

    Ok(Json(json!({
        "qr_payload": token,
        "ticket_code": registration.ticket_code,
        "event_id": id,
    })))
}

// --- Reminders ---

#[derive(Deserialize)]
pub struct ReminderPayload {
    pub remind_at: DateTime<Utc>,
}

#[post("/events/<id>/reminders", data = "<payload>")]
pub async fn set_reminder(
    db: &State<Database>,
    auth: AuthUser,
    id: &str,
    payload: Json<ReminderPayload>,
) -> Result<Json<Value>, ApiError> {
    let object_id =
        ObjectId::parse_str(id).map_err(|_| api_error(Status::BadRequest, "Invalid event ID"))?;
    let events: Collection<Event> = db.collection(collections::EVENTS);
    let reminders: Collection<Reminder> = db.collection(collections::REMINDERS);

    let event = events
        .find_one(doc! {"_id": object_id}, None)
        .await
        .map_err(|_| db_error())?;
    if event.is_none() {
        return Err(api_error(Status::NotFound, "Event not found"));
    }

    let reminder = Reminder::new(&auth.uid, id, payload.remind_at);
    reminders
        .insert_one(&reminder, None)
        .await
        .map_err(|_| db_error())?;

    events
        .update_one(
            doc! {"_id": object_id},
            doc! {"$inc": {"metrics.reminders_set": 1}},
            None,
        )
        .await
        .map_err(|_| db_error())?;

    Ok(Json(json!({ "reminder_set": true })))
}

// --- Notifications ---

#[get("/notifications")]
pub async fn my_notifications(
    db: &State<Database>,
    auth: AuthUser,
) -> Result<Json<Vec<Notification>>, Status> {
    let notifications: Collection<Notification> = db.collection(collections::NOTIFICATIONS);
    let options = FindOptions::builder()
        .sort(doc! {"created_at": -1})
        .limit(50)
        .build();

    let mut cursor = notifications
        .find(doc! {"user_id": &auth.uid}, options)
        .await
        .map_err(|_| Status::InternalServerError)?;

    let mut list = Vec::new();
    while let Some(note) = cursor
        .try_next()
        .await
        .map_err(|_| Status::InternalServerError)?
    {
        list.push(note);
    }
    Ok(Json(list))
}

#[post("/notifications/<id>/read")]
pub async fn mark_notification_read(
    db: &State<Database>,
    auth: AuthUser,
    id: &str,
) -> Result<Status, ApiError> {
    let object_id = ObjectId::parse_str(id)
        .map_err(|_| api_error(Status::BadRequest, "Invalid notification ID"))?;
    let notifications: Collection<Notification> = db.collection(collections::NOTIFICATIONS);
    let result = notifications
        .update_one(
            doc! {"_id": object_id, "user_id": &auth.uid},
            doc! {"$set": {"read": true}},
            None,
        )
        .await
        .map_err(|_| db_error())?;
    if result.matched_count == 0 {
        return Err(api_error(Status::NotFound, "Notification not found"));
    }
    Ok(Status::NoContent)
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        register,
        login,
        set_push_token,
        event_feed,
        event_detail,
        rsvp,
        withdraw,
        my_ticket,
        set_reminder,
        my_notifications,
        mark_notification_read,
    ]
}
