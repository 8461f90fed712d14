use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::serde::Deserialize;
use rocket::{get, post, routes, State};
use serde_json::{json, Value};
use tracing::info;

use crate::db::collections;
use crate::models::club::{reputation_points, Club};
use crate::models::event::Event;
use crate::models::user::{Role, UserProfile};
use crate::utils::auth::{resolve_role, AuthUser};

use super::{api_error, db_error, fetch_profile, ApiError};

async fn require_admin(db: &Database, auth: &AuthUser) -> Result<(), ApiError> {
    let profile = fetch_profile(db, &auth.uid).await?;
    if resolve_role(&auth.claims, profile.as_ref()) != Role::Admin {
        return Err(api_error(Status::Forbidden, "Admin role required"));
    }
    Ok(())
}

#[get("/events")]
pub async fn all_events(db: &State<Database>, auth: AuthUser) -> Result<Json<Vec<Event>>, ApiError> {
    require_admin(db, &auth).await?;

    let events: Collection<Event> = db.collection(collections::EVENTS);
    let options = FindOptions::builder().sort(doc! {"start_at": -1}).build();
    let mut cursor = events
        .find(doc! {}, options)
        .await
        .map_err(|_| db_error())?;

    let mut list = Vec::new();
    while let Some(event) = cursor.try_next().await.map_err(|_| db_error())? {
        list.push(event);
    }
    Ok(Json(list))
}

#[derive(Deserialize)]
pub struct RolePayload {
    pub role: String,
}

/// Role changes land on the user document immediately; token claims catch
/// up at the next login. `resolve_role` honors whichever grants more.
#[post("/users/<uid>/role", data = "<payload>")]
pub async fn set_role(
    db: &State<Database>,
    auth: AuthUser,
    uid: &str,
    payload: Json<RolePayload>,
) -> Result<Json<Value>, ApiError> {
    require_admin(db, &auth).await?;

    let role = Role::parse(&payload.role)
        .ok_or_else(|| api_error(Status::BadRequest, "Role must be admin, club or student"))?;
    let object_id =
        ObjectId::parse_str(uid).map_err(|_| api_error(Status::BadRequest, "Invalid user ID"))?;

    let users: Collection<UserProfile> = db.collection(collections::USERS);
    let result = users
        .update_one(
            doc! {"_id": object_id},
            doc! {"$set": {"role": role.to_string()}},
            None,
        )
        .await
        .map_err(|_| db_error())?;
    if result.matched_count == 0 {
        return Err(api_error(Status::NotFound, "User not found"));
    }

    info!(uid, role = %role, "role updated");
    Ok(Json(json!({ "uid": uid, "role": role.to_string() })))
}

/// Recompute reputation for every club from its events' metrics. Counters
/// are derived data, so this is safe to re-run at any time.
#[post("/reputation")]
pub async fn recalculate_reputation(
    db: &State<Database>,
    auth: AuthUser,
) -> Result<Json<Value>, ApiError> {
    require_admin(db, &auth).await?;

    let clubs: Collection<Club> = db.collection(collections::CLUBS);
    let events: Collection<Event> = db.collection(collections::EVENTS);

    let mut club_cursor = clubs.find(doc! {}, None).await.map_err(|_| db_error())?;
    let mut updated = 0u64;

    while let Some(club) = club_cursor.try_next().await.map_err(|_| db_error())? {
        let mut event_cursor = events
            .find(doc! {"owner_id": &club.owner_user_id}, None)
            .await
            .map_err(|_| db_error())?;

        let mut attendance = 0i64;
        let mut registrations = 0i64;
        let mut reminders = 0i64;
        while let Some(event) = event_cursor.try_next().await.map_err(|_| db_error())? {
            attendance += event.metrics.attendance;
            registrations += event.metrics.registrations;
            reminders += event.metrics.reminders_set;
        }

        let points = reputation_points(attendance, registrations, reminders);
        if let Some(id) = club.id {
            clubs
                .update_one(
                    doc! {"_id": id},
                    doc! {"$set": {
                        "reputation.points": points,
                        "reputation.attendance_count": attendance,
                        "updated_at": DateTime::from_chrono(Utc::now()),
                    }},
                    None,
                )
                .await
                .map_err(|_| db_error())?;
            updated += 1;
        }
    }

    Ok(Json(json!({ "updated": updated })))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![all_events, set_role, recalculate_reputation]
}
