use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::{Collection, Database};
use rocket::http::{ContentType, Status};
use rocket::response::stream::{Event as SseEvent, EventStream};
use rocket::serde::json::Json;
use rocket::serde::Deserialize;
use rocket::tokio::select;
use rocket::{delete, get, patch, post, routes, Shutdown, State};
use serde_json::{json, Value};
use tracing::info;

use crate::checkin;
use crate::checkin::store::MongoAttendanceStore;
use crate::checkin::ticket::TicketKeys;
use crate::db::collections;
use crate::error::CheckInError;
use crate::models::event::{Event, EventMetrics, EventStatus, EventTarget};
use crate::models::notification::Notification;
use crate::models::participant::Participant;
use crate::models::user::{Role, UserProfile};
use crate::stats::{aggregator, export};
use crate::utils::auth::{resolve_role, AuthUser};

use super::{api_error, db_error, fetch_profile, ApiError};

fn check_in_error(err: CheckInError) -> ApiError {
    rocket::response::status::Custom(
        err.status(),
        Json(json!({ "error": err.code(), "message": err.to_string() })),
    )
}

async fn authorize_event(
    db: &Database,
    auth: &AuthUser,
    event_id: &str,
) -> Result<Event, ApiError> {
    let object_id = ObjectId::parse_str(event_id)
        .map_err(|_| api_error(Status::BadRequest, "Invalid event ID"))?;
    let events: Collection<Event> = db.collection(collections::EVENTS);
    let event = events
        .find_one(doc! {"_id": object_id}, None)
        .await
        .map_err(|_| db_error())?
        .ok_or_else(|| api_error(Status::NotFound, "Event not found"))?;

    let profile = fetch_profile(db, &auth.uid).await?;
    let role = resolve_role(&auth.claims, profile.as_ref());
    if role != Role::Admin && event.owner_id != auth.uid {
        return Err(api_error(Status::Forbidden, "Not your event"));
    }
    Ok(event)
}

// --- Event management ---

#[derive(Deserialize)]
pub struct CreateEventPayload {
    pub title: String,
    pub description: String,
    pub category: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub location: String,
    pub meeting_url: Option<String>,
    pub organization: Option<String>,
    pub target: Option<EventTarget>,
    pub is_paid: Option<bool>,
    pub price: Option<f64>,
}

#[post("/events", data = "<payload>")]
pub async fn create_event(
    db: &State<Database>,
    auth: AuthUser,
    payload: Json<CreateEventPayload>,
) -> Result<Json<Value>, ApiError> {
    let profile = fetch_profile(db, &auth.uid).await?;
    let role = resolve_role(&auth.claims, profile.as_ref());
    if !role.can_manage_events() {
        return Err(api_error(Status::Forbidden, "Organizer role required"));
    }

    let payload = payload.into_inner();
    let event = Event {
        id: None,
        title: payload.title,
        description: payload.description,
        category: payload.category,
        start_at: payload.start_at,
        end_at: payload.end_at,
        location: payload.location,
        meeting_url: payload.meeting_url,
        organization: payload.organization,
        status: EventStatus::Active,
        owner_id: auth.uid.clone(),
        target: payload.target.unwrap_or_default(),
        is_paid: payload.is_paid.unwrap_or(false),
        price: payload.price.unwrap_or(0.0),
        metrics: EventMetrics::default(),
        notified_10min: false,
        feedback_requested: false,
    };

    let events: Collection<Event> = db.collection(collections::EVENTS);
    let result = events
        .insert_one(&event, None)
        .await
        .map_err(|_| db_error())?;
    let event_id = result
        .inserted_id
        .as_object_id()
        .map(|id| id.to_hex())
        .ok_or_else(db_error)?;

    notify_target_departments(db, &event, &event_id).await;

    Ok(Json(json!({ "event_id": event_id })))
}

/// In-app "new event" alert to every user of the targeted departments.
/// `All` and an empty target mean everyone, which is too broad to fan out.
async fn notify_target_departments(db: &Database, event: &Event, event_id: &str) {
    let departments = &event.target.departments;
    if departments.is_empty() || departments.iter().any(|d| d == "All") {
        return;
    }

    let users: Collection<UserProfile> = db.collection(collections::USERS);
    let notifications: Collection<Notification> = db.collection(collections::NOTIFICATIONS);

    let Ok(mut cursor) = users
        .find(doc! {"department": {"$in": departments}}, None)
        .await
    else {
        return;
    };

    let mut batch = Vec::new();
    while let Ok(Some(user)) = cursor.try_next().await {
        let Some(uid) = user.id.map(|id| id.to_hex()) else {
            continue;
        };
        batch.push(Notification::new(
            &uid,
            "New Event Alert!",
            format!("New event \"{}\" in your department.", event.title),
            event_id,
        ));
    }

    if !batch.is_empty() {
        let count = batch.len();
        if notifications.insert_many(&batch, None).await.is_ok() {
            info!(event_id, notified = count, "new event fan-out");
        }
    }
}

#[derive(Deserialize)]
pub struct StatusPayload {
    pub status: EventStatus,
}

#[patch("/events/<id>/status", data = "<payload>")]
pub async fn set_event_status(
    db: &State<Database>,
    auth: AuthUser,
    id: &str,
    payload: Json<StatusPayload>,
) -> Result<Json<Value>, ApiError> {
    authorize_event(db, &auth, id).await?;

    let object_id = ObjectId::parse_str(id)
        .map_err(|_| api_error(Status::BadRequest, "Invalid event ID"))?;
    let events: Collection<Event> = db.collection(collections::EVENTS);
    events
        .update_one(
            doc! {"_id": object_id},
            doc! {"$set": {"status": payload.status.to_string()}},
            None,
        )
        .await
        .map_err(|_| db_error())?;

    Ok(Json(json!({ "status": payload.status.to_string() })))
}

#[delete("/events/<id>")]
pub async fn delete_event(
    db: &State<Database>,
    auth: AuthUser,
    id: &str,
) -> Result<Status, ApiError> {
    authorize_event(db, &auth, id).await?;

    let participants: Collection<Participant> = db.collection(collections::PARTICIPANTS);
    let registered = participants
        .count_documents(doc! {"event_id": id}, None)
        .await
        .map_err(|_| db_error())?;
    if registered > 0 {
        // Dependent registrations keep the event alive; suspend instead.
        return Err(api_error(
            Status::Conflict,
            "Event has registrations; suspend it instead of deleting",
        ));
    }

    let object_id = ObjectId::parse_str(id)
        .map_err(|_| api_error(Status::BadRequest, "Invalid event ID"))?;
    let events: Collection<Event> = db.collection(collections::EVENTS);
    events
        .delete_one(doc! {"_id": object_id}, None)
        .await
        .map_err(|_| db_error())?;
    Ok(Status::NoContent)
}

// --- Check-in ---

#[derive(Deserialize)]
pub struct ScanRequest {
    pub payload: String,
}

#[post("/events/<id>/check-ins", data = "<body>")]
pub async fn scan_ticket(
    db: &State<Database>,
    keys: &State<TicketKeys>,
    auth: AuthUser,
    id: &str,
    body: Json<ScanRequest>,
) -> Result<Json<Value>, ApiError> {
    authorize_event(db, &auth, id).await?;

    let store = MongoAttendanceStore::new(db.inner().clone());
    match checkin::scan(&store, keys, id, &body.payload, &auth.uid).await {
        Ok(record) => Ok(Json(json!({
            "result": "checked_in",
            "attendee": {
                "user_id": record.user_id,
                "name": record.name,
                "department": record.department,
                "year": record.year,
            },
            "checked_in_at": record.checked_in_at.to_rfc3339(),
        }))),
        // Informational duplicate, not an operator error: the attendee is
        // already inside, which a re-scan should say plainly.
        Err(CheckInError::AlreadyCheckedIn) => Ok(Json(json!({
            "result": "already_checked_in",
            "message": "Attendee is already checked in",
        }))),
        Err(err) => Err(check_in_error(err)),
    }
}

// --- Attendance dashboard ---

#[get("/events/<id>/attendance")]
pub async fn attendance(
    db: &State<Database>,
    auth: AuthUser,
    id: &str,
) -> Result<Json<aggregator::AttendanceSnapshot>, ApiError> {
    authorize_event(db, &auth, id).await?;
    let snapshot = aggregator::snapshot(db, id)
        .await
        .map_err(|_| api_error(Status::ServiceUnavailable, "Store unavailable"))?;
    Ok(Json(snapshot))
}

#[get("/events/<id>/attendance/live")]
pub async fn attendance_live(
    db: &State<Database>,
    auth: AuthUser,
    id: &str,
    mut end: Shutdown,
) -> Result<EventStream![], ApiError> {
    authorize_event(db, &auth, id).await?;

    let feed = aggregator::subscribe(db, id, Duration::from_secs(5))
        .await
        .map_err(|_| api_error(Status::ServiceUnavailable, "Store unavailable"))?;
    let mut snapshots = feed.snapshots();

    Ok(EventStream! {
        // Holding the feed keeps the change-stream task alive; dropping it
        // when the client disconnects unsubscribes.
        let _feed = feed;
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            yield SseEvent::json(&snapshot);
            select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = &mut end => break,
            }
        }
    })
}

#[get("/events/<id>/attendance/export?<format>")]
pub async fn export_attendance(
    db: &State<Database>,
    auth: AuthUser,
    id: &str,
    format: Option<&str>,
) -> Result<(ContentType, String), ApiError> {
    let event = authorize_event(db, &auth, id).await?;
    let (registered, records) = aggregator::load(db, id)
        .await
        .map_err(|_| api_error(Status::ServiceUnavailable, "Store unavailable"))?;

    match format.unwrap_or("csv") {
        "csv" => Ok((ContentType::CSV, export::attendance_csv(&records))),
        "report" => {
            let snapshot = aggregator::compute(registered, &records);
            Ok((
                ContentType::HTML,
                export::attendance_report(&event, &snapshot, &records),
            ))
        }
        _ => Err(api_error(Status::BadRequest, "Unknown export format")),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        create_event,
        set_event_status,
        delete_event,
        scan_ticket,
        attendance,
        attendance_live,
        export_attendance,
    ]
}
