// libs/scheduling-cell/src/services/booking.rs
//
// Single-booking path and the conflict-checked mutation operations.
// Both capacity policies run here before any write: the therapist rule
// (capacity 2, dual-session warning at 1) and the hard-blocking room rule.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentPatch, AppointmentSearchQuery, AppointmentStatus,
    BookingOutcome, CreateAppointmentRequest, NewAppointment, RescheduleAppointmentRequest,
    SchedulingError, UpdateAppointmentRequest,
};
use crate::services::conflict::{self, ProposedSlot, SlotVerdict};
use crate::services::recurrence::merge_rows;
use crate::store::{
    AppointmentStore, PatientDirectory, SupabaseAppointmentStore, SupabasePatientDirectory,
};

pub struct BookingService {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn PatientDirectory>,
}

impl BookingService {
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

    /// Book a single appointment. Rejects with `SlotFull` when the
    /// therapist already holds two overlapping bookings and with
    /// `RoomConflict` when the requested room window is occupied; a single
    /// overlap is accepted with a dual-session warning.
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<BookingOutcome, SchedulingError> {
        request.validate()?;
        if request.repeat_weekly {
            return Err(SchedulingError::Validation(
                "weekly repeats go through the recurring booking path".to_string(),
            ));
        }

        info!(
            "Booking appointment for '{}' with therapist {} on {} at {}",
            request.patient_name, request.therapist_id, request.date, request.time
        );

        let slot = ProposedSlot {
            exclude_id: None,
            therapist_id: request.therapist_id,
            room_id: request.room_id,
            date: request.date,
            time: request.time,
            duration_minutes: request.duration_minutes,
        };
        let warning = self.enforce_slot_policies(&slot, auth_token).await?;

        let patient_id = match request.patient_id {
            Some(id) => Some(id),
            None => {
                self.directory
                    .find_by_name(&request.patient_name, auth_token)
                    .await
            }
        };

        let row = NewAppointment {
            patient_id,
            patient_name: request.patient_name.clone(),
            date: request.date,
            time: request.time,
            duration_minutes: request.effective_duration(),
            therapist_id: request.therapist_id,
            room_id: request.room_id,
            status: request.status.unwrap_or(AppointmentStatus::Scheduled),
            is_first_session: request.is_first_session,
            repeat_weekly: false,
            repeat_until: None,
            notes: request.notes,
        };

        let appointment = self
            .store
            .insert_many(vec![row], auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                SchedulingError::Database("insert returned no appointment".to_string())
            })?;

        info!("Appointment {} created", appointment.id);
        Ok(BookingOutcome {
            appointment,
            warning,
        })
    }

    pub async fn get_appointment(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        self.store
            .get(id, auth_token)
            .await?
            .ok_or(SchedulingError::NotFound)
    }

    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.store
            .list(
                &AppointmentFilter {
                    therapist_id: query.therapist_id,
                    room_id: query.room_id,
                    date_from: query.date_from,
                    date_to: query.date_to,
                    include_cancelled: query.include_cancelled,
                },
                auth_token,
            )
            .await
    }

    /// Partial update. Status changes go through the transition rules; a
    /// room change re-runs the room policy for the existing time window.
    pub async fn update_appointment(
        &self,
        id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.get_appointment(id, auth_token).await?;

        if let Some(next) = request.status {
            if !current.status.can_transition_to(next) {
                return Err(SchedulingError::InvalidStatusTransition {
                    from: current.status,
                    to: next,
                });
            }
        }

        if let Some(room_id) = request.room_id {
            if current.room_id != Some(room_id) {
                let slot = ProposedSlot {
                    exclude_id: Some(id),
                    therapist_id: current.therapist_id,
                    room_id: Some(room_id),
                    date: current.date,
                    time: current.time,
                    duration_minutes: Some(current.duration_minutes),
                };
                let existing = self.window_snapshot(&slot, auth_token).await?;
                if !conflict::room_is_free(&slot, &existing) {
                    return Err(SchedulingError::RoomConflict {
                        room_id,
                        date: current.date,
                        time: current.time,
                    });
                }
            }
        }

        let patch = AppointmentPatch {
            patient_name: request.patient_name,
            room_id: request.room_id,
            status: request.status,
            notes: request.notes,
            ..AppointmentPatch::default()
        };

        self.store.update(id, patch, auth_token).await
    }

    /// Move an appointment to a new date/time/duration, re-running both
    /// capacity policies with the appointment's own id excluded.
    pub async fn reschedule_appointment(
        &self,
        id: Uuid,
        request: RescheduleAppointmentRequest,
        auth_token: &str,
    ) -> Result<BookingOutcome, SchedulingError> {
        let current = self.get_appointment(id, auth_token).await?;

        if current.status.is_terminal() {
            return Err(SchedulingError::Validation(format!(
                "cannot reschedule a {} appointment",
                current.status
            )));
        }

        let duration = request
            .new_duration_minutes
            .unwrap_or(current.duration_minutes);
        if duration <= 0 {
            return Err(SchedulingError::Validation(
                "duration_minutes must be greater than zero".to_string(),
            ));
        }

        debug!(
            "Rescheduling appointment {} to {} at {}",
            id, request.new_date, request.new_time
        );

        let slot = ProposedSlot {
            exclude_id: Some(id),
            therapist_id: current.therapist_id,
            room_id: current.room_id,
            date: request.new_date,
            time: request.new_time,
            duration_minutes: Some(duration),
        };
        let warning = self.enforce_slot_policies(&slot, auth_token).await?;

        let patch = AppointmentPatch {
            date: Some(request.new_date),
            time: Some(request.new_time),
            duration_minutes: Some(duration),
            ..AppointmentPatch::default()
        };
        let appointment = self.store.update(id, patch, auth_token).await?;

        Ok(BookingOutcome {
            appointment,
            warning,
        })
    }

    /// Soft termination: the appointment stays on record but leaves all
    /// capacity accounting.
    pub async fn cancel_appointment(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let current = self.get_appointment(id, auth_token).await?;

        if !current
            .status
            .can_transition_to(AppointmentStatus::Cancelled)
        {
            return Err(SchedulingError::InvalidStatusTransition {
                from: current.status,
                to: AppointmentStatus::Cancelled,
            });
        }

        let patch = AppointmentPatch {
            status: Some(AppointmentStatus::Cancelled),
            ..AppointmentPatch::default()
        };
        self.store.update(id, patch, auth_token).await
    }

    pub async fn delete_appointment(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        self.store.delete(id, auth_token).await
    }

    /// Dry-run verdict for a proposed slot, used by the conflict-check
    /// endpoint and shared by create/reschedule.
    pub async fn assess_slot(
        &self,
        slot: &ProposedSlot,
        auth_token: &str,
    ) -> Result<(SlotVerdict, bool), SchedulingError> {
        let existing = self.window_snapshot(slot, auth_token).await?;
        let verdict = conflict::assess_therapist_slot(slot, &existing);
        let room_free = conflict::room_is_free(slot, &existing);
        Ok((verdict, room_free))
    }

    async fn enforce_slot_policies(
        &self,
        slot: &ProposedSlot,
        auth_token: &str,
    ) -> Result<Option<String>, SchedulingError> {
        let (verdict, room_free) = self.assess_slot(slot, auth_token).await?;

        if let SlotVerdict::Full { count } = verdict {
            warn!(
                "Slot full for therapist {} on {}: {} overlapping bookings",
                slot.therapist_id, slot.date, count
            );
            return Err(SchedulingError::SlotFull {
                therapist_id: slot.therapist_id,
                date: slot.date,
                time: slot.time,
            });
        }

        // The room rule overrides the dual-capacity tolerance unconditionally.
        if !room_free {
            let room_id = slot.room_id.unwrap_or_default();
            warn!(
                "Room {} occupied on {} at {}",
                room_id, slot.date, slot.time
            );
            return Err(SchedulingError::RoomConflict {
                room_id,
                date: slot.date,
                time: slot.time,
            });
        }

        Ok(verdict.warning())
    }

    /// One read of everything the two policies need for a single day:
    /// the therapist's bookings plus, when a room is requested, that
    /// room's bookings across all therapists.
    async fn window_snapshot(
        &self,
        slot: &ProposedSlot,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut existing = self
            .store
            .list(
                &AppointmentFilter::for_therapist(slot.therapist_id, slot.date, slot.date),
                auth_token,
            )
            .await?;

        if let Some(room_id) = slot.room_id {
            let room_rows = self
                .store
                .list(
                    &AppointmentFilter {
                        room_id: Some(room_id),
                        ..AppointmentFilter::range(slot.date, slot.date)
                    },
                    auth_token,
                )
                .await?;
            merge_rows(&mut existing, room_rows);
        }

        Ok(existing)
    }
}
