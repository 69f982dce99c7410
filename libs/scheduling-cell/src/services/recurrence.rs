// libs/scheduling-cell/src/services/recurrence.rs
//
// Weekly recurrence: expansion of a repeating request into dated
// candidates, per-occurrence validation against the conflict policy,
// and the partial-success batch insert.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, CreateAppointmentRequest, NewAppointment,
    RecurringBookingOutcome, RecurringPreview, SchedulingError,
};
use crate::services::conflict::{self, ProposedSlot};
use crate::store::{
    AppointmentStore, PatientDirectory, SupabaseAppointmentStore, SupabasePatientDirectory,
};

/// Upper bound on expansion, two years of weekly occurrences. Guards
/// against malformed `repeat_until` values producing unbounded work.
pub const MAX_OCCURRENCES: usize = 104;

/// Candidate dates for a weekly repeat: base, base+7d, base+14d, ...
/// inclusive of `until`, capped at [`MAX_OCCURRENCES`].
pub fn expand_weekly(base: NaiveDate, until: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = base;

    while current <= until && dates.len() < MAX_OCCURRENCES {
        dates.push(current);
        current += Duration::weeks(1);
    }

    dates
}

pub struct RecurrenceService {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn PatientDirectory>,
}

impl RecurrenceService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: Arc::new(SupabaseAppointmentStore::new(config)),
            directory: Arc::new(SupabasePatientDirectory::new(config)),
        }
    }

    pub fn with_stores(
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn PatientDirectory>,
    ) -> Self {
        Self { store, directory }
    }

    /// Validate every candidate and persist the accepted ones in a single
    /// batch. Partial success by design: skipped dates are reported back so
    /// the caller can retry them manually.
    pub async fn create_recurring(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<RecurringBookingOutcome, SchedulingError> {
        request.validate()?;
        let until = request.repeat_until.ok_or_else(|| {
            SchedulingError::Validation("repeat_until is required for weekly repeats".to_string())
        })?;

        info!(
            "Creating weekly appointments for therapist {} from {} until {}",
            request.therapist_id, request.date, until
        );

        let (accepted, skipped) = self.classify(&request, until, auth_token).await?;

        if accepted.is_empty() {
            warn!(
                "Recurring request rejected: all {} candidate dates conflicted",
                skipped.len()
            );
            return Err(SchedulingError::NoOccurrencesScheduled);
        }

        let patient_id = match request.patient_id {
            Some(id) => Some(id),
            None => {
                self.directory
                    .find_by_name(&request.patient_name, auth_token)
                    .await
            }
        };

        let status = request.status.unwrap_or(AppointmentStatus::Scheduled);
        let rows: Vec<NewAppointment> = accepted
            .iter()
            .map(|date| NewAppointment {
                patient_id,
                patient_name: request.patient_name.clone(),
                date: *date,
                time: request.time,
                duration_minutes: request.effective_duration(),
                therapist_id: request.therapist_id,
                room_id: request.room_id,
                status,
                is_first_session: request.is_first_session && *date == request.date,
                // The first persisted occurrence anchors the series; the
                // rest are concrete dated rows.
                repeat_weekly: *date == request.date,
                repeat_until: (*date == request.date).then_some(until),
                notes: request.notes.clone(),
            })
            .collect();

        let created = self.store.insert_many(rows, auth_token).await?;

        info!(
            "Recurring booking created {} occurrences, skipped {}",
            created.len(),
            skipped.len()
        );

        Ok(RecurringBookingOutcome { created, skipped })
    }

    /// Run the identical classification without persisting anything.
    /// Deterministic for an unchanged store; used by the UI before commit.
    pub async fn preview_recurring(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<RecurringPreview, SchedulingError> {
        request.validate()?;
        let until = request.repeat_until.ok_or_else(|| {
            SchedulingError::Validation("repeat_until is required for weekly repeats".to_string())
        })?;

        let total_weeks = expand_weekly(request.date, until).len();
        let (_, skipped) = self.classify(&request, until, auth_token).await?;

        Ok(RecurringPreview {
            conflicts: skipped,
            total_weeks,
        })
    }

    /// Split the expanded candidates into accepted and skipped dates.
    ///
    /// The therapist's existing bookings across the whole span are fetched
    /// once; the room's occupancy is fetched as well when a room is
    /// requested, so the recurring path enforces the same room rule as the
    /// single-booking path.
    async fn classify(
        &self,
        request: &CreateAppointmentRequest,
        until: NaiveDate,
        auth_token: &str,
    ) -> Result<(Vec<NaiveDate>, Vec<NaiveDate>), SchedulingError> {
        let candidates = expand_weekly(request.date, until);
        debug!("Expanded {} candidate dates", candidates.len());

        let mut existing = self
            .store
            .list(
                &AppointmentFilter::for_therapist(request.therapist_id, request.date, until),
                auth_token,
            )
            .await?;

        if let Some(room_id) = request.room_id {
            let room_rows = self
                .store
                .list(
                    &AppointmentFilter {
                        room_id: Some(room_id),
                        ..AppointmentFilter::range(request.date, until)
                    },
                    auth_token,
                )
                .await?;
            merge_rows(&mut existing, room_rows);
        }

        let mut accepted = Vec::new();
        let mut skipped = Vec::new();

        for date in candidates {
            let slot = ProposedSlot {
                exclude_id: None,
                therapist_id: request.therapist_id,
                room_id: request.room_id,
                date,
                time: request.time,
                duration_minutes: request.duration_minutes,
            };

            let verdict = conflict::assess_therapist_slot(&slot, &existing);
            if verdict.is_blocking() {
                debug!("Skipping {}: therapist slot full", date);
                skipped.push(date);
                continue;
            }
            if !conflict::room_is_free(&slot, &existing) {
                debug!("Skipping {}: room occupied", date);
                skipped.push(date);
                continue;
            }

            accepted.push(date);
        }

        Ok((accepted, skipped))
    }
}

/// Merge store results from separate range queries, deduplicating rows
/// that matched both filters.
pub(crate) fn merge_rows(existing: &mut Vec<Appointment>, extra: Vec<Appointment>) {
    for row in extra {
        if !existing.iter().any(|appt| appt.id == row.id) {
            existing.push(row);
        }
    }
}
