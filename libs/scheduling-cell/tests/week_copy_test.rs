// libs/scheduling-cell/tests/week_copy_test.rs
//
// Week copier: weekday-offset mapping, forced pending/non-repeating
// copies and conflict skipping against the target week.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use scheduling_cell::models::{
    Appointment, AppointmentStatus, SchedulingError, WeekCopyRequest,
};
use scheduling_cell::services::week_copy::WeekCopyService;
use scheduling_cell::store::InMemoryAppointmentStore;

// ==============================================================================
// TEST FIXTURES
// ==============================================================================

struct TestSetup {
    store: Arc<InMemoryAppointmentStore>,
    service: WeekCopyService,
}

impl TestSetup {
    fn new() -> Self {
        let store = Arc::new(InMemoryAppointmentStore::new());
        let service = WeekCopyService::with_store(store.clone());
        Self { store, service }
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn source_appointment(
    therapist_id: Uuid,
    room_id: Option<Uuid>,
    date: NaiveDate,
    time: NaiveTime,
    status: AppointmentStatus,
) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Some(Uuid::new_v4()),
        patient_name: "Maria Costa".to_string(),
        date,
        time,
        duration_minutes: 60,
        therapist_id,
        room_id,
        status,
        is_first_session: true,
        repeat_weekly: true,
        repeat_until: Some(date + chrono::Duration::weeks(8)),
        notes: Some("bring reports".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn copy_request(source: NaiveDate, target: NaiveDate) -> WeekCopyRequest {
    WeekCopyRequest {
        source_week_start: source,
        target_week_start: target,
        therapist_id: None,
    }
}

// ==============================================================================
// COPY SEMANTICS
// ==============================================================================

#[tokio::test]
async fn copies_preserve_weekday_offsets() {
    let setup = TestSetup::new();
    let therapist = Uuid::new_v4();
    // Monday 2024-02-05 and Saturday 2024-02-10 of the source week.
    setup
        .store
        .seed(vec![
            source_appointment(
                therapist,
                None,
                d(2024, 2, 5),
                t(9, 0),
                AppointmentStatus::Confirmed,
            ),
            source_appointment(
                therapist,
                None,
                d(2024, 2, 10),
                t(16, 0),
                AppointmentStatus::Scheduled,
            ),
        ])
        .await;

    let outcome = setup
        .service
        .copy_week(copy_request(d(2024, 2, 5), d(2024, 2, 12)), "token")
        .await
        .unwrap();

    assert_eq!(outcome.copied_count, 2);
    assert!(outcome.skipped.is_empty());

    let all = setup.store.all().await;
    let copies: Vec<&Appointment> = all.iter().filter(|a| a.date >= d(2024, 2, 12)).collect();
    let mut copy_dates: Vec<NaiveDate> = copies.iter().map(|a| a.date).collect();
    copy_dates.sort();
    assert_eq!(copy_dates, vec![d(2024, 2, 12), d(2024, 2, 17)]);

    let monday_copy = copies.iter().find(|a| a.date == d(2024, 2, 12)).unwrap();
    assert_eq!(monday_copy.time, t(9, 0));
}

#[tokio::test]
async fn copies_land_pending_and_non_repeating() {
    let setup = TestSetup::new();
    setup
        .store
        .seed(vec![source_appointment(
            Uuid::new_v4(),
            None,
            d(2024, 2, 7),
            t(11, 0),
            AppointmentStatus::Confirmed,
        )])
        .await;

    setup
        .service
        .copy_week(copy_request(d(2024, 2, 5), d(2024, 2, 12)), "token")
        .await
        .unwrap();

    let all = setup.store.all().await;
    let copy = all.iter().find(|a| a.date == d(2024, 2, 14)).unwrap();
    assert_eq!(copy.status, AppointmentStatus::Pending);
    assert!(!copy.repeat_weekly);
    assert_eq!(copy.repeat_until, None);
    assert!(!copy.is_first_session);
    // Patient linkage and notes carry over.
    assert!(copy.patient_id.is_some());
    assert_eq!(copy.notes.as_deref(), Some("bring reports"));
}

#[tokio::test]
async fn therapist_filter_narrows_the_source() {
    let setup = TestSetup::new();
    let ana = Uuid::new_v4();
    setup
        .store
        .seed(vec![
            source_appointment(ana, None, d(2024, 2, 5), t(9, 0), AppointmentStatus::Confirmed),
            source_appointment(
                Uuid::new_v4(),
                None,
                d(2024, 2, 5),
                t(9, 0),
                AppointmentStatus::Confirmed,
            ),
        ])
        .await;

    let outcome = setup
        .service
        .copy_week(
            WeekCopyRequest {
                source_week_start: d(2024, 2, 5),
                target_week_start: d(2024, 2, 12),
                therapist_id: Some(ana),
            },
            "token",
        )
        .await
        .unwrap();

    assert_eq!(outcome.copied_count, 1);
    let all = setup.store.all().await;
    let copy = all.iter().find(|a| a.date == d(2024, 2, 12)).unwrap();
    assert_eq!(copy.therapist_id, ana);
}

#[tokio::test]
async fn appointments_outside_the_six_day_window_are_left_behind() {
    let setup = TestSetup::new();
    // Sunday 2024-02-11 sits past the Mon-Sat span.
    setup
        .store
        .seed(vec![source_appointment(
            Uuid::new_v4(),
            None,
            d(2024, 2, 11),
            t(9, 0),
            AppointmentStatus::Confirmed,
        )])
        .await;

    let result = setup
        .service
        .copy_week(copy_request(d(2024, 2, 5), d(2024, 2, 12)), "token")
        .await;

    assert_matches!(result, Err(SchedulingError::NothingToCopy));
}

// ==============================================================================
// CONFLICTS AND EMPTY SOURCE
// ==============================================================================

#[tokio::test]
async fn empty_source_week_writes_nothing() {
    let setup = TestSetup::new();

    let result = setup
        .service
        .copy_week(copy_request(d(2024, 2, 5), d(2024, 2, 12)), "token")
        .await;

    assert_matches!(result, Err(SchedulingError::NothingToCopy));
    assert!(setup.store.all().await.is_empty());
}

#[tokio::test]
async fn full_target_slot_is_skipped_and_reported() {
    let setup = TestSetup::new();
    let therapist = Uuid::new_v4();
    setup
        .store
        .seed(vec![
            source_appointment(
                therapist,
                None,
                d(2024, 2, 5),
                t(10, 0),
                AppointmentStatus::Confirmed,
            ),
            source_appointment(
                therapist,
                None,
                d(2024, 2, 6),
                t(10, 0),
                AppointmentStatus::Confirmed,
            ),
            // The target Monday is already at capacity for this therapist.
            source_appointment(
                therapist,
                None,
                d(2024, 2, 12),
                t(10, 0),
                AppointmentStatus::Scheduled,
            ),
            source_appointment(
                therapist,
                None,
                d(2024, 2, 12),
                t(10, 30),
                AppointmentStatus::Confirmed,
            ),
        ])
        .await;

    let outcome = setup
        .service
        .copy_week(copy_request(d(2024, 2, 5), d(2024, 2, 10)), "token")
        .await
        .unwrap();

    assert_eq!(outcome.copied_count, 1);
    assert_eq!(outcome.skipped, vec![d(2024, 2, 12)]);

    let all = setup.store.all().await;
    assert!(all.iter().any(|a| a.date == d(2024, 2, 13)));
}

#[tokio::test]
async fn occupied_target_room_is_skipped() {
    let setup = TestSetup::new();
    let room = Uuid::new_v4();
    setup
        .store
        .seed(vec![
            source_appointment(
                Uuid::new_v4(),
                Some(room),
                d(2024, 2, 5),
                t(10, 0),
                AppointmentStatus::Confirmed,
            ),
            // A different therapist holds the same room on the target Monday.
            source_appointment(
                Uuid::new_v4(),
                Some(room),
                d(2024, 2, 12),
                t(10, 0),
                AppointmentStatus::Confirmed,
            ),
        ])
        .await;

    let outcome = setup
        .service
        .copy_week(copy_request(d(2024, 2, 5), d(2024, 2, 10)), "token")
        .await
        .unwrap();

    assert_eq!(outcome.copied_count, 0);
    assert_eq!(outcome.skipped, vec![d(2024, 2, 12)]);
    // Only the two seeded rows remain.
    assert_eq!(setup.store.all().await.len(), 2);
}

#[tokio::test]
async fn accepted_copies_occupy_the_target_for_later_candidates() {
    let setup = TestSetup::new();
    let therapist = Uuid::new_v4();
    // Three overlapping bookings on the source Monday. The first two
    // copies fill the target slot, so the third is skipped even though the
    // target week started empty.
    setup
        .store
        .seed(vec![
            source_appointment(
                therapist,
                None,
                d(2024, 2, 5),
                t(10, 0),
                AppointmentStatus::Confirmed,
            ),
            source_appointment(
                therapist,
                None,
                d(2024, 2, 5),
                t(10, 0),
                AppointmentStatus::Confirmed,
            ),
            source_appointment(
                therapist,
                None,
                d(2024, 2, 5),
                t(10, 30),
                AppointmentStatus::Confirmed,
            ),
        ])
        .await;

    let outcome = setup
        .service
        .copy_week(copy_request(d(2024, 2, 5), d(2024, 2, 12)), "token")
        .await
        .unwrap();

    assert_eq!(outcome.copied_count, 2);
    assert_eq!(outcome.skipped, vec![d(2024, 2, 12)]);
}
