use std::collections::BTreeMap;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::db::collections;
use crate::error::StoreError;
use crate::models::checkin::CheckInRecord;
use crate::models::participant::Participant;

/// Live attendance statistics for one event. Cheap to recompute from
/// scratch on every change; realistic events are a few hundred attendees.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttendanceSnapshot {
    pub registered: u64,
    pub checked_in: u64,
    pub rate_percent: u32,
    pub by_department: BTreeMap<String, u64>,
    pub by_year: BTreeMap<String, u64>,
}

pub fn compute(registered: u64, records: &[CheckInRecord]) -> AttendanceSnapshot {
    let checked_in = records.len() as u64;
    let rate_percent = if registered == 0 {
        0
    } else {
        ((checked_in as f64 / registered as f64) * 100.0).round() as u32
    };

    let mut by_department: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_year: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        let dept = if record.department.is_empty() {
            "Unknown".to_string()
        } else {
            record.department.clone()
        };
        *by_department.entry(dept).or_insert(0) += 1;

        let year = if record.year == 0 {
            "Unknown".to_string()
        } else {
            record.year.to_string()
        };
        *by_year.entry(year).or_insert(0) += 1;
    }

    AttendanceSnapshot {
        registered,
        checked_in,
        rate_percent,
        by_department,
        by_year,
    }
}

/// Fetch everything the snapshot derives from: the registration count and
/// the event's check-in records, newest first.
pub async fn load(
    db: &Database,
    event_id: &str,
) -> Result<(u64, Vec<CheckInRecord>), StoreError> {
    let participants: Collection<Participant> = db.collection(collections::PARTICIPANTS);
    let checkins: Collection<CheckInRecord> = db.collection(collections::CHECKINS);

    let registered = participants
        .count_documents(doc! {"event_id": event_id}, None)
        .await?;

    let options = FindOptions::builder()
        .sort(doc! {"checked_in_at": -1})
        .build();
    let mut cursor = checkins.find(doc! {"event_id": event_id}, options).await?;
    let mut records = Vec::new();
    while let Some(record) = cursor.try_next().await? {
        records.push(record);
    }

    Ok((registered, records))
}

pub async fn snapshot(db: &Database, event_id: &str) -> Result<AttendanceSnapshot, StoreError> {
    let (registered, records) = load(db, event_id).await?;
    Ok(compute(registered, &records))
}

/// Live subscription to one event's attendance. The background task follows
/// the check-in change stream, reloads and recomputes on every change, and
/// polls on an interval to pick up registration churn (registrations change
/// rarely and have no dedicated stream). Dropping the feed unsubscribes.
pub struct AttendanceFeed {
    receiver: watch::Receiver<AttendanceSnapshot>,
    task: JoinHandle<()>,
}

impl AttendanceFeed {
    pub fn snapshots(&self) -> watch::Receiver<AttendanceSnapshot> {
        self.receiver.clone()
    }
}

impl Drop for AttendanceFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn subscribe(
    db: &Database,
    event_id: &str,
    poll_interval: Duration,
) -> Result<AttendanceFeed, StoreError> {
    let checkins: Collection<CheckInRecord> = db.collection(collections::CHECKINS);
    let pipeline = vec![doc! {"$match": {"fullDocument.event_id": event_id}}];
    let mut changes = checkins.watch(pipeline, None).await?;

    let initial = snapshot(db, event_id).await?;
    let (sender, receiver) = watch::channel(initial);

    let db = db.clone();
    let event_id = event_id.to_string();
    let task = tokio::spawn(async move {
        let mut poll = tokio::time::interval(poll_interval);
        poll.tick().await; // first tick fires immediately; the initial snapshot covered it
        loop {
            tokio::select! {
                change = changes.next() => match change {
                    Some(Ok(_)) => debug!(event_id = %event_id, "check-in change observed"),
                    Some(Err(err)) => {
                        warn!(event_id = %event_id, error = %err, "change stream error");
                    }
                    None => break,
                },
                _ = poll.tick() => {}
            }

            match snapshot(&db, &event_id).await {
                Ok(snap) => {
                    if sender.send(snap).is_err() {
                        break; // every subscriber is gone
                    }
                }
                Err(err) => warn!(event_id = %event_id, error = %err, "snapshot reload failed"),
            }
        }
    });

    Ok(AttendanceFeed { receiver, task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::participant::Participant;
    use chrono::Utc;

    fn record(user: &str, dept: &str, year: i32) -> CheckInRecord {
        let registration = Participant::new(
            "E1",
            user,
            user,
            "u@example.edu",
            dept,
            year,
            "UE-TESTCODE".to_string(),
        );
        CheckInRecord::new(&registration, "operator", Utc::now())
    }

    #[test]
    fn empty_event_reports_zero_rate() {
        let snap = compute(0, &[]);
        assert_eq!(snap.registered, 0);
        assert_eq!(snap.checked_in, 0);
        assert_eq!(snap.rate_percent, 0);
    }

    #[test]
    fn rate_is_rounded_percentage() {
        let records = vec![record("U1", "CSE", 2)];
        assert_eq!(compute(3, &records).rate_percent, 33);

        let records = vec![record("U1", "CSE", 2), record("U2", "ECE", 3)];
        assert_eq!(compute(3, &records).rate_percent, 67);
        assert_eq!(compute(2, &records).rate_percent, 100);
    }

    #[test]
    fn breakdowns_group_by_department_and_year() {
        let records = vec![
            record("U1", "CSE", 2),
            record("U2", "CSE", 3),
            record("U3", "ECE", 3),
            record("U4", "", 0),
        ];
        let snap = compute(10, &records);
        assert_eq!(snap.by_department["CSE"], 2);
        assert_eq!(snap.by_department["ECE"], 1);
        assert_eq!(snap.by_department["Unknown"], 1);
        assert_eq!(snap.by_year["2"], 1);
        assert_eq!(snap.by_year["3"], 2);
        assert_eq!(snap.by_year["Unknown"], 1);
    }
}
