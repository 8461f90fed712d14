use rocket::http::Status;
use thiserror::Error;

/// Transient infrastructure failure. Nothing was changed; the operator may
/// retry the scan.
#[derive(Debug, Error)]
#[error("document store unavailable: {0}")]
pub struct StoreError(pub String);

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError(err.to_string())
    }
}

/// Everything that can go wrong between a scan and a recorded check-in.
/// Each variant maps to a distinct short message so staff can tell
/// "deny entry" from "already handled" from "try again".
#[derive(Debug, Error)]
pub enum CheckInError {
    #[error("ticket is malformed or not issued for this event")]
    InvalidTicket,
    #[error("no registration exists for this attendee")]
    NotRegistered,
    #[error("event is suspended; entry is blocked")]
    EventSuspended,
    #[error("attendee is already checked in")]
    AlreadyCheckedIn,
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

impl CheckInError {
    pub fn code(&self) -> &'static str {
        match self {
            CheckInError::InvalidTicket => "invalid_ticket",
            CheckInError::NotRegistered => "not_registered",
            CheckInError::EventSuspended => "event_suspended",
            CheckInError::AlreadyCheckedIn => "already_checked_in",
            CheckInError::StoreUnavailable(_) => "store_unavailable",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            CheckInError::InvalidTicket => Status::UnprocessableEntity,
            CheckInError::NotRegistered => Status::NotFound,
            CheckInError::EventSuspended => Status::Conflict,
            CheckInError::AlreadyCheckedIn => Status::Conflict,
            CheckInError::StoreUnavailable(_) => Status::ServiceUnavailable,
        }
    }
}
