use chrono::Utc;
use tracing::warn;

use crate::error::CheckInError;
use crate::models::checkin::CheckInRecord;
use crate::models::participant::Participant;

use super::store::{AttendanceStore, InsertOutcome};

/// Transition a validated registration to checked-in, exactly once. The
/// conditional insert is the only correctness boundary against two staff
/// phones scanning the same attendee at the same time; losing that race is
/// reported the same way as a plain duplicate scan.
pub async fn record_check_in<S: AttendanceStore>(
    store: &S,
    registration: &Participant,
    operator_id: &str,
) -> Result<CheckInRecord, CheckInError> {
    let record = CheckInRecord::new(registration, operator_id, Utc::now());

    match store.insert_check_in(&record).await? {
        InsertOutcome::AlreadyExists => Err(CheckInError::AlreadyCheckedIn),
        InsertOutcome::Created => {
            // The record is the durable truth; the counter is a derived
            // metric, so a failed bump degrades the dashboard, not entry.
            if let Err(err) = store.bump_attendance(&record.event_id).await {
                warn!(
                    event_id = %record.event_id,
                    user_id = %record.user_id,
                    error = %err,
                    "check-in recorded but attendance counter not bumped"
                );
            }
            Ok(record)
        }
    }
}
