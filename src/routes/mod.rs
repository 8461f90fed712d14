pub mod admin;
pub mod organizer;
pub mod public;

use mongodb::bson::{doc, oid::ObjectId};
use mongodb::{Collection, Database};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{json, Value};

use crate::db::collections;
use crate::models::user::UserProfile;

pub type ApiError = Custom<Json<Value>>;

pub fn api_error(status: Status, message: &str) -> ApiError {
    Custom(status, Json(json!({ "error": message })))
}

pub fn db_error() -> ApiError {
    api_error(Status::InternalServerError, "Database query failed")
}

pub async fn fetch_profile(db: &Database, uid: &str) -> Result<Option<UserProfile>, ApiError> {
    let object_id = match ObjectId::parse_str(uid) {
        Ok(id) => id,
        Err(_) => return Ok(None),
    };
    let users: Collection<UserProfile> = db.collection(collections::USERS);
    users
        .find_one(doc! {"_id": object_id}, None)
        .await
        .map_err(|_| db_error())
}
