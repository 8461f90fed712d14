use crate::error::CheckInError;
use crate::models::event::EventStatus;
use crate::models::participant::Participant;

use super::store::AttendanceStore;
use super::ticket::{self, ScanPayload, TicketKeys};

/// Read-only resolution of a raw scan against registration and check-in
/// state. Checks run in a fixed order; each is a terminal failure:
///
/// 1. malformed payload, bad signature, or event mismatch -> `InvalidTicket`
/// 2. no registration for (event, user)                   -> `NotRegistered`
/// 3. event suspended                                     -> `EventSuspended`
/// 4. check-in record already present                     -> `AlreadyCheckedIn`
pub async fn validate_ticket<S: AttendanceStore>(
    store: &S,
    keys: &TicketKeys,
    event_id: &str,
    raw_payload: &str,
) -> Result<Participant, CheckInError> {
    let payload = ticket::parse_scan(raw_payload).ok_or(CheckInError::InvalidTicket)?;

    let registration = match payload {
        ScanPayload::Signed(token) => {
            let claims = ticket::decode_ticket(keys, &token).ok_or(CheckInError::InvalidTicket)?;
            if claims.evt != event_id {
                // Valid ticket, wrong door.
                return Err(CheckInError::InvalidTicket);
            }
            store
                .registration(event_id, &claims.sub)
                .await?
                .ok_or(CheckInError::NotRegistered)?
        }
        ScanPayload::ManualCode(code) => store
            .registration_by_code(event_id, &code)
            .await?
            .ok_or(CheckInError::NotRegistered)?,
    };

    match store.event_status(event_id).await? {
        Some(EventStatus::Active) => {}
        // A registration pointing at a missing event means the event was
        // pulled out from under it; block entry like a suspension.
        Some(EventStatus::Suspended) | None => return Err(CheckInError::EventSuspended),
    }

    if store
        .check_in_exists(event_id, &registration.user_id)
        .await?
    {
        return Err(CheckInError::AlreadyCheckedIn);
    }

    Ok(registration)
}
