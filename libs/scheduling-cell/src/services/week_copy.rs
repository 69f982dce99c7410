// libs/scheduling-cell/src/services/week_copy.rs
//
// Copy a 6-day clinical week (Mon-Sat) of bookings onto another week by
// weekday offset. Copies land as fresh `pending` appointments and are
// re-validated against the target week before insert.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, NewAppointment, SchedulingError,
    WeekCopyOutcome, WeekCopyRequest,
};
use crate::services::conflict::{self, ProposedSlot};
use crate::store::{AppointmentStore, SupabaseAppointmentStore};

/// Mon-Sat source window: start date plus five days.
const WEEK_SPAN_DAYS: i64 = 5;

pub struct WeekCopyService {
    store: Arc<dyn AppointmentStore>,
}

impl WeekCopyService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: Arc::new(SupabaseAppointmentStore::new(config)),
        }
    }

    pub fn with_store(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub async fn copy_week(
        &self,
        request: WeekCopyRequest,
        auth_token: &str,
    ) -> Result<WeekCopyOutcome, SchedulingError> {
        let source_end = request.source_week_start + Duration::days(WEEK_SPAN_DAYS);
        let target_end = request.target_week_start + Duration::days(WEEK_SPAN_DAYS);

        info!(
            "Copying week {} onto week {}{}",
            request.source_week_start,
            request.target_week_start,
            request
                .therapist_id
                .map(|id| format!(" for therapist {}", id))
                .unwrap_or_default()
        );

        let source = self
            .store
            .list(
                &AppointmentFilter {
                    therapist_id: request.therapist_id,
                    ..AppointmentFilter::range(request.source_week_start, source_end)
                },
                auth_token,
            )
            .await?;

        if source.is_empty() {
            warn!("Nothing to copy from week {}", request.source_week_start);
            return Err(SchedulingError::NothingToCopy);
        }

        // Target occupancy is fetched across all therapists and rooms so
        // both capacity policies can run against it.
        let mut target_pool = self
            .store
            .list(
                &AppointmentFilter::range(request.target_week_start, target_end),
                auth_token,
            )
            .await?;

        let mut accepted = Vec::new();
        let mut skipped = Vec::new();

        for appt in &source {
            let offset = (appt.date - request.source_week_start).num_days();
            debug_assert!((0..=WEEK_SPAN_DAYS).contains(&offset));
            let new_date = request.target_week_start + Duration::days(offset);

            let slot = ProposedSlot {
                exclude_id: None,
                therapist_id: appt.therapist_id,
                room_id: appt.room_id,
                date: new_date,
                time: appt.time,
                duration_minutes: Some(appt.duration_minutes),
            };

            // Re-validation the source flow never did: copies that would
            // exceed capacity in the target week are skipped and reported.
            if conflict::assess_therapist_slot(&slot, &target_pool).is_blocking()
                || !conflict::room_is_free(&slot, &target_pool)
            {
                debug!("Skipping copy of {} onto {}", appt.id, new_date);
                skipped.push(new_date);
                continue;
            }

            accepted.push(copy_onto(appt, new_date));
            // Accepted copies occupy the target week for the remaining
            // candidates.
            target_pool.push(phantom_row(appt, new_date));
        }

        if accepted.is_empty() {
            info!(
                "Week copy found {} source appointments but every copy conflicted",
                source.len()
            );
            return Ok(WeekCopyOutcome {
                copied_count: 0,
                skipped,
            });
        }

        let inserted = self.store.insert_many(accepted, auth_token).await?;

        info!(
            "Week copy created {} appointments, skipped {}",
            inserted.len(),
            skipped.len()
        );

        Ok(WeekCopyOutcome {
            copied_count: inserted.len(),
            skipped,
        })
    }
}

/// A copy always lands as a fresh, unconfirmed, non-repeating booking,
/// whatever the source row carried.
fn copy_onto(source: &Appointment, new_date: NaiveDate) -> NewAppointment {
    NewAppointment {
        patient_id: source.patient_id,
        patient_name: source.patient_name.clone(),
        date: new_date,
        time: source.time,
        duration_minutes: source.duration_minutes,
        therapist_id: source.therapist_id,
        room_id: source.room_id,
        status: AppointmentStatus::Pending,
        is_first_session: false,
        repeat_weekly: false,
        repeat_until: None,
        notes: source.notes.clone(),
    }
}

/// Stand-in row representing a not-yet-inserted copy in the target pool.
fn phantom_row(source: &Appointment, new_date: NaiveDate) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        patient_id: source.patient_id,
        patient_name: source.patient_name.clone(),
        date: new_date,
        time: source.time,
        duration_minutes: source.duration_minutes,
        therapist_id: source.therapist_id,
        room_id: source.room_id,
        status: AppointmentStatus::Pending,
        is_first_session: false,
        repeat_weekly: false,
        repeat_until: None,
        notes: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
