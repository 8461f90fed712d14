//! Entry check-in core: ticket decoding, validation against registration
//! state, and the at-most-once recording of attendance.
//!
//! For a single (event, user) pair:
//!
//! ```text
//! NOT_REGISTERED --(RSVP)--> REGISTERED --(first valid scan)--> CHECKED_IN
//! REGISTERED --(withdraw)--> NOT_REGISTERED
//! CHECKED_IN --(any further scan)--> CHECKED_IN   (duplicate, idempotent)
//! ```
//!
//! `CHECKED_IN` is terminal. Concurrent scans of the same ticket race only
//! at the store's conditional insert, which is the single correctness
//! boundary preventing a double count.

pub mod recorder;
pub mod store;
pub mod ticket;
pub mod validator;

use crate::error::CheckInError;
use crate::models::checkin::CheckInRecord;
use crate::models::participant::Participant;
use store::AttendanceStore;
use ticket::TicketKeys;

/// Full scan pipeline: decode and validate the payload, then record the
/// check-in. A lost race between two concurrent scanners surfaces as
/// `AlreadyCheckedIn`, same as a plain re-scan.
pub async fn scan<S: AttendanceStore>(
    store: &S,
    keys: &TicketKeys,
    event_id: &str,
    raw_payload: &str,
    operator_id: &str,
) -> Result<CheckInRecord, CheckInError> {
    let registration = validator::validate_ticket(store, keys, event_id, raw_payload).await?;
    recorder::record_check_in(store, &registration, operator_id).await
}

/// Undo a registration that has not been used for entry. Withdrawal loses
/// against check-in: a scan that lands between the existence check and the
/// delete is detected afterwards, the registration is put back, and the
/// withdrawal refused, so no check-in record is ever left orphaned.
pub async fn withdraw<S: AttendanceStore>(
    store: &S,
    event_id: &str,
    user_id: &str,
) -> Result<Participant, CheckInError> {
    if store.check_in_exists(event_id, user_id).await? {
        return Err(CheckInError::AlreadyCheckedIn);
    }

    let registration = store
        .remove_registration(event_id, user_id)
        .await?
        .ok_or(CheckInError::NotRegistered)?;

    if store.check_in_exists(event_id, user_id).await? {
        store.put_registration(&registration).await?;
        return Err(CheckInError::AlreadyCheckedIn);
    }

    Ok(registration)
}
