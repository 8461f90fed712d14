use mongodb::bson::{doc, oid::ObjectId};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Collection, Database};

use crate::db::{collections, composite_id};
use crate::error::StoreError;
use crate::models::checkin::CheckInRecord;
use crate::models::event::{Event, EventStatus};
use crate::models::participant::Participant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// The record already existed; a concurrent scanner (or an earlier scan)
    /// won the race.
    AlreadyExists,
}

/// Store seam for the check-in core. Routes hand it the live MongoDB
/// database; tests substitute an in-memory implementation.
#[rocket::async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn event_status(&self, event_id: &str) -> Result<Option<EventStatus>, StoreError>;

    async fn registration(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, StoreError>;

    async fn registration_by_code(
        &self,
        event_id: &str,
        code: &str,
    ) -> Result<Option<Participant>, StoreError>;

    async fn check_in_exists(&self, event_id: &str, user_id: &str) -> Result<bool, StoreError>;

    /// Create the record only if no record exists under its key. This must
    /// be atomic in the store; a read-then-write would double count under
    /// concurrent scans.
    async fn insert_check_in(&self, record: &CheckInRecord) -> Result<InsertOutcome, StoreError>;

    /// Atomic increment of the event's attendance counter.
    async fn bump_attendance(&self, event_id: &str) -> Result<(), StoreError>;

    /// Delete the registration and hand back the deleted document, so a
    /// withdrawal that lost a race against a scan can put it back.
    async fn remove_registration(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, StoreError>;

    async fn put_registration(&self, registration: &Participant) -> Result<(), StoreError>;
}

pub struct MongoAttendanceStore {
    db: Database,
}

impl MongoAttendanceStore {
    pub fn new(db: Database) -> Self {
        MongoAttendanceStore { db }
    }

    fn events(&self) -> Collection<Event> {
        self.db.collection(collections::EVENTS)
    }

    fn participants(&self) -> Collection<Participant> {
        self.db.collection(collections::PARTICIPANTS)
    }

    fn checkins(&self) -> Collection<CheckInRecord> {
        self.db.collection(collections::CHECKINS)
    }
}

#[rocket::async_trait]
impl AttendanceStore for MongoAttendanceStore {
    async fn event_status(&self, event_id: &str) -> Result<Option<EventStatus>, StoreError> {
        let object_id = match ObjectId::parse_str(event_id) {
            Ok(id) => id,
            Err(_) => return Ok(None),
        };
        let event = self.events().find_one(doc! {"_id": object_id}, None).await?;
        Ok(event.map(|e| e.status))
    }

    async fn registration(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, StoreError> {
        let id = composite_id(event_id, user_id);
        Ok(self.participants().find_one(doc! {"_id": id}, None).await?)
    }

    async fn registration_by_code(
        &self,
        event_id: &str,
        code: &str,
    ) -> Result<Option<Participant>, StoreError> {
        Ok(self
            .participants()
            .find_one(doc! {"event_id": event_id, "ticket_code": code}, None)
            .await?)
    }

    async fn check_in_exists(&self, event_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let id = composite_id(event_id, user_id);
        let existing = self.checkins().find_one(doc! {"_id": id}, None).await?;
        Ok(existing.is_some())
    }

    async fn insert_check_in(&self, record: &CheckInRecord) -> Result<InsertOutcome, StoreError> {
        // The unique `_id` makes the insert a native create-if-absent: the
        // duplicate-key error is the losing side of a concurrent race.
        match self.checkins().insert_one(record, None).await {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(err) if is_duplicate_key(&err) => Ok(InsertOutcome::AlreadyExists),
            Err(err) => Err(err.into()),
        }
    }

    async fn bump_attendance(&self, event_id: &str) -> Result<(), StoreError> {
        let object_id = ObjectId::parse_str(event_id)
            .map_err(|e| StoreError(format!("bad event id: {}", e)))?;
        self.events()
            .update_one(
                doc! {"_id": object_id},
                doc! {"$inc": {"metrics.attendance": 1}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn remove_registration(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, StoreError> {
        let id = composite_id(event_id, user_id);
        Ok(self
            .participants()
            .find_one_and_delete(doc! {"_id": id}, None)
            .await?)
    }

    async fn put_registration(&self, registration: &Participant) -> Result<(), StoreError> {
        match self.participants().insert_one(registration, None).await {
            Ok(_) => Ok(()),
            // the attendee re-registered in the meantime; theirs wins
            Err(err) if is_duplicate_key(&err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        &*err.kind,
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}
