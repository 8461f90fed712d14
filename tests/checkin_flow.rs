//! End-to-end check-in flow against an in-memory store: one scanner, many
//! scanners racing, manual codes, and the full error ladder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};

use unievent::checkin;
use unievent::checkin::store::{AttendanceStore, InsertOutcome};
use unievent::checkin::ticket::{self, TicketKeys};
use unievent::db::composite_id;
use unievent::error::{CheckInError, StoreError};
use unievent::models::checkin::CheckInRecord;
use unievent::models::event::EventStatus;
use unievent::models::participant::Participant;
use unievent::stats::aggregator;

#[derive(Default)]
struct MemoryStore {
    events: Mutex<HashMap<String, EventStatus>>,
    registrations: Mutex<HashMap<String, Participant>>,
    checkins: Mutex<HashMap<String, CheckInRecord>>,
    attendance: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    fn with_event(event_id: &str, status: EventStatus) -> Self {
        let store = MemoryStore::default();
        store
            .events
            .lock()
            .unwrap()
            .insert(event_id.to_string(), status);
        store
    }

    fn register(&self, event_id: &str, user_id: &str) -> Participant {
        let registration = Participant::new(
            event_id,
            user_id,
            user_id,
            "student@example.edu",
            "CSE",
            2,
            ticket::new_ticket_code(),
        );
        self.registrations
            .lock()
            .unwrap()
            .insert(registration.id.clone(), registration.clone());
        registration
    }

    fn suspend(&self, event_id: &str) {
        self.events
            .lock()
            .unwrap()
            .insert(event_id.to_string(), EventStatus::Suspended);
    }

    fn attendance_count(&self, event_id: &str) -> u64 {
        *self.attendance.lock().unwrap().get(event_id).unwrap_or(&0)
    }

    fn records(&self, event_id: &str) -> Vec<CheckInRecord> {
        self.checkins
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect()
    }
}

#[rocket::async_trait]
impl AttendanceStore for MemoryStore {
    async fn event_status(&self, event_id: &str) -> Result<Option<EventStatus>, StoreError> {
        Ok(self.events.lock().unwrap().get(event_id).copied())
    }

    async fn registration(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, StoreError> {
        let id = composite_id(event_id, user_id);
        Ok(self.registrations.lock().unwrap().get(&id).cloned())
    }

    async fn registration_by_code(
        &self,
        event_id: &str,
        code: &str,
    ) -> Result<Option<Participant>, StoreError> {
        Ok(self
            .registrations
            .lock()
            .unwrap()
            .values()
            .find(|p| p.event_id == event_id && p.ticket_code == code)
            .cloned())
    }

    async fn check_in_exists(&self, event_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let id = composite_id(event_id, user_id);
        Ok(self.checkins.lock().unwrap().contains_key(&id))
    }

    async fn insert_check_in(&self, record: &CheckInRecord) -> Result<InsertOutcome, StoreError> {
        // Single lock held over test-and-insert, mirroring the unique-key
        // insert of the real store.
        let mut checkins = self.checkins.lock().unwrap();
        if checkins.contains_key(&record.id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        checkins.insert(record.id.clone(), record.clone());
        Ok(InsertOutcome::Created)
    }

    async fn bump_attendance(&self, event_id: &str) -> Result<(), StoreError> {
        *self
            .attendance
            .lock()
            .unwrap()
            .entry(event_id.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn remove_registration(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, StoreError> {
        let id = composite_id(event_id, user_id);
        Ok(self.registrations.lock().unwrap().remove(&id))
    }

    async fn put_registration(&self, registration: &Participant) -> Result<(), StoreError> {
        self.registrations
            .lock()
            .unwrap()
            .insert(registration.id.clone(), registration.clone());
        Ok(())
    }
}

/// Store where an operator's scan lands in the gap between withdrawal's
/// existence check and its registration delete.
struct ScanBeforeDelete {
    inner: MemoryStore,
}

#[rocket::async_trait]
impl AttendanceStore for ScanBeforeDelete {
    async fn event_status(&self, event_id: &str) -> Result<Option<EventStatus>, StoreError> {
        self.inner.event_status(event_id).await
    }

    async fn registration(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, StoreError> {
        self.inner.registration(event_id, user_id).await
    }

    async fn registration_by_code(
        &self,
        event_id: &str,
        code: &str,
    ) -> Result<Option<Participant>, StoreError> {
        self.inner.registration_by_code(event_id, code).await
    }

    async fn check_in_exists(&self, event_id: &str, user_id: &str) -> Result<bool, StoreError> {
        self.inner.check_in_exists(event_id, user_id).await
    }

    async fn insert_check_in(&self, record: &CheckInRecord) -> Result<InsertOutcome, StoreError> {
        self.inner.insert_check_in(record).await
    }

    async fn bump_attendance(&self, event_id: &str) -> Result<(), StoreError> {
        self.inner.bump_attendance(event_id).await
    }

    async fn remove_registration(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, StoreError> {
        if let Some(registration) = self.inner.registration(event_id, user_id).await? {
            let record = CheckInRecord::new(&registration, "staff-2", Utc::now());
            self.inner.insert_check_in(&record).await?;
            self.inner.bump_attendance(event_id).await?;
        }
        self.inner.remove_registration(event_id, user_id).await
    }

    async fn put_registration(&self, registration: &Participant) -> Result<(), StoreError> {
        self.inner.put_registration(registration).await
    }
}

fn keys() -> TicketKeys {
    TicketKeys::new("door-secret")
}

fn signed_ticket(keys: &TicketKeys, event_id: &str, user_id: &str) -> String {
    ticket::issue(keys, event_id, user_id, Utc::now() + Duration::days(1))
        .expect("ticket issuance")
}

#[rocket::async_test]
async fn first_scan_checks_in_and_bumps_attendance() {
    let store = MemoryStore::with_event("E1", EventStatus::Active);
    store.register("E1", "U1");
    let keys = keys();
    let token = signed_ticket(&keys, "E1", "U1");

    let record = checkin::scan(&store, &keys, "E1", &token, "staff-1")
        .await
        .expect("first scan should succeed");
    assert_eq!(record.user_id, "U1");
    assert_eq!(record.event_id, "E1");
    assert_eq!(record.checked_in_by, "staff-1");
    assert_eq!(store.attendance_count("E1"), 1);
}

#[rocket::async_test]
async fn rescan_is_rejected_without_double_counting() {
    let store = MemoryStore::with_event("E1", EventStatus::Active);
    store.register("E1", "U1");
    let keys = keys();
    let token = signed_ticket(&keys, "E1", "U1");

    checkin::scan(&store, &keys, "E1", &token, "staff-1")
        .await
        .expect("first scan should succeed");
    let second = checkin::scan(&store, &keys, "E1", &token, "staff-2").await;
    assert!(matches!(second, Err(CheckInError::AlreadyCheckedIn)));
    assert_eq!(store.attendance_count("E1"), 1);
    assert_eq!(store.records("E1").len(), 1);
}

#[rocket::async_test]
async fn unregistered_attendee_is_turned_away() {
    let store = MemoryStore::with_event("E1", EventStatus::Active);
    store.register("E1", "U1");
    let keys = keys();

    // Valid signature, but U9 never registered for E1.
    let token = signed_ticket(&keys, "E1", "U9");
    let result = checkin::scan(&store, &keys, "E1", &token, "staff-1").await;
    assert!(matches!(result, Err(CheckInError::NotRegistered)));
    assert_eq!(store.attendance_count("E1"), 0);
}

#[rocket::async_test]
async fn suspended_event_blocks_entry_even_for_registered() {
    let store = MemoryStore::with_event("E1", EventStatus::Active);
    store.register("E1", "U1");
    store.suspend("E1");
    let keys = keys();
    let token = signed_ticket(&keys, "E1", "U1");

    let result = checkin::scan(&store, &keys, "E1", &token, "staff-1").await;
    assert!(matches!(result, Err(CheckInError::EventSuspended)));
}

#[rocket::async_test]
async fn malformed_tampered_or_foreign_tickets_are_invalid() {
    let store = MemoryStore::with_event("E1", EventStatus::Active);
    store.register("E1", "U1");
    let keys = keys();

    // Garbage that parses as a manual code but matches no registration
    // falls through to NotRegistered; everything token-shaped but broken
    // is InvalidTicket.
    let empty = checkin::scan(&store, &keys, "E1", "   ", "staff-1").await;
    assert!(matches!(empty, Err(CheckInError::InvalidTicket)));

    let mut mangled = signed_ticket(&keys, "E1", "U1");
    mangled.push('x');
    let tampered = checkin::scan(&store, &keys, "E1", &mangled, "staff-1").await;
    assert!(matches!(tampered, Err(CheckInError::InvalidTicket)));

    let foreign = TicketKeys::new("someone-elses-secret");
    let forged = signed_ticket(&foreign, "E1", "U1");
    let result = checkin::scan(&store, &keys, "E1", &forged, "staff-1").await;
    assert!(matches!(result, Err(CheckInError::InvalidTicket)));

    // Ticket for a different event presented at this door.
    let wrong_event = signed_ticket(&keys, "E2", "U1");
    let result = checkin::scan(&store, &keys, "E1", &wrong_event, "staff-1").await;
    assert!(matches!(result, Err(CheckInError::InvalidTicket)));

    assert_eq!(store.attendance_count("E1"), 0);
}

#[rocket::async_test]
async fn manual_code_checks_in_like_a_scan() {
    let store = MemoryStore::with_event("E1", EventStatus::Active);
    let registration = store.register("E1", "U1");
    let keys = keys();

    // Typed lowercase at the door.
    let typed = registration.ticket_code.to_ascii_lowercase();
    let record = checkin::scan(&store, &keys, "E1", &typed, "staff-1")
        .await
        .expect("manual code should check in");
    assert_eq!(record.user_id, "U1");

    let unknown = checkin::scan(&store, &keys, "E1", "UE-DEADBEEF", "staff-1").await;
    assert!(matches!(unknown, Err(CheckInError::NotRegistered)));
}

#[rocket::async_test]
async fn concurrent_scans_admit_exactly_once() {
    let store = Arc::new(MemoryStore::with_event("E1", EventStatus::Active));
    store.register("E1", "U1");
    let keys = Arc::new(keys());
    let token = signed_ticket(&keys, "E1", "U1");

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        let keys = Arc::clone(&keys);
        let token = token.clone();
        handles.push(rocket::tokio::spawn(async move {
            checkin::scan(&*store, &keys, "E1", &token, &format!("staff-{i}")).await
        }));
    }

    let mut admitted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.expect("task should not panic") {
            Ok(_) => admitted += 1,
            Err(CheckInError::AlreadyCheckedIn) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(admitted, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(store.attendance_count("E1"), 1);
    assert_eq!(store.records("E1").len(), 1);
}

#[rocket::async_test]
async fn withdrawal_frees_the_registration_before_entry() {
    let store = MemoryStore::with_event("E1", EventStatus::Active);
    store.register("E1", "U1");
    let keys = keys();

    checkin::withdraw(&store, "E1", "U1")
        .await
        .expect("withdrawal should succeed");

    // The old ticket is now just a valid signature with nothing behind it.
    let token = signed_ticket(&keys, "E1", "U1");
    let result = checkin::scan(&store, &keys, "E1", &token, "staff-1").await;
    assert!(matches!(result, Err(CheckInError::NotRegistered)));

    let again = checkin::withdraw(&store, "E1", "U1").await;
    assert!(matches!(again, Err(CheckInError::NotRegistered)));
}

#[rocket::async_test]
async fn withdrawal_after_check_in_is_refused() {
    let store = MemoryStore::with_event("E1", EventStatus::Active);
    store.register("E1", "U1");
    let keys = keys();
    let token = signed_ticket(&keys, "E1", "U1");

    checkin::scan(&store, &keys, "E1", &token, "staff-1")
        .await
        .expect("scan should succeed");

    let result = checkin::withdraw(&store, "E1", "U1").await;
    assert!(matches!(result, Err(CheckInError::AlreadyCheckedIn)));
    assert!(store
        .registration("E1", "U1")
        .await
        .unwrap()
        .is_some());
}

#[rocket::async_test]
async fn withdrawal_losing_to_a_scan_restores_the_registration() {
    let store = ScanBeforeDelete {
        inner: MemoryStore::with_event("E1", EventStatus::Active),
    };
    store.inner.register("E1", "U1");

    let result = checkin::withdraw(&store, "E1", "U1").await;
    assert!(matches!(result, Err(CheckInError::AlreadyCheckedIn)));

    // The admitted attendee keeps a registration behind the check-in record.
    assert!(store
        .inner
        .registration("E1", "U1")
        .await
        .unwrap()
        .is_some());
    assert_eq!(store.inner.attendance_count("E1"), 1);
    assert_eq!(store.inner.records("E1").len(), 1);
}

#[rocket::async_test]
async fn busy_door_walkthrough() {
    let store = MemoryStore::with_event("E1", EventStatus::Active);
    store.register("E1", "U1");
    store.register("E1", "U2");
    store.register("E1", "U3");
    let keys = keys();

    let u1 = signed_ticket(&keys, "E1", "U1");
    checkin::scan(&store, &keys, "E1", &u1, "staff-1")
        .await
        .expect("U1 should check in");
    assert_eq!(store.attendance_count("E1"), 1);

    let rescan = checkin::scan(&store, &keys, "E1", &u1, "staff-1").await;
    assert!(matches!(rescan, Err(CheckInError::AlreadyCheckedIn)));
    assert_eq!(store.attendance_count("E1"), 1);

    let u9 = signed_ticket(&keys, "E1", "U9");
    let walkup = checkin::scan(&store, &keys, "E1", &u9, "staff-1").await;
    assert!(matches!(walkup, Err(CheckInError::NotRegistered)));
    assert_eq!(store.attendance_count("E1"), 1);

    store.suspend("E1");
    let u2 = signed_ticket(&keys, "E1", "U2");
    let blocked = checkin::scan(&store, &keys, "E1", &u2, "staff-1").await;
    assert!(matches!(blocked, Err(CheckInError::EventSuspended)));

    let snapshot = aggregator::compute(3, &store.records("E1"));
    assert_eq!(snapshot.registered, 3);
    assert_eq!(snapshot.checked_in, 1);
    assert_eq!(snapshot.rate_percent, 33);
}

#[rocket::async_test]
async fn snapshot_reflects_store_state() {
    let store = MemoryStore::with_event("E1", EventStatus::Active);
    store.register("E1", "U1");
    store.register("E1", "U2");
    store.register("E1", "U3");
    let keys = keys();

    let token = signed_ticket(&keys, "E1", "U2");
    checkin::scan(&store, &keys, "E1", &token, "staff-1")
        .await
        .expect("scan should succeed");

    let snapshot = aggregator::compute(3, &store.records("E1"));
    assert_eq!(snapshot.registered, 3);
    assert_eq!(snapshot.checked_in, 1);
    assert_eq!(snapshot.rate_percent, 33);
    assert_eq!(snapshot.by_department["CSE"], 1);
}
