// libs/scheduling-cell/src/store/memory.rs
//
// In-memory store used by the engine test suites. Same filtering
// semantics as the Supabase implementation.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentPatch, AppointmentStatus, NewAppointment,
    SchedulingError,
};
use crate::store::AppointmentStore;

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    rows: RwLock<Vec<Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, appointments: Vec<Appointment>) {
        self.rows.write().await.extend(appointments);
    }

    /// Snapshot of every row, cancelled included.
    pub async fn all(&self) -> Vec<Appointment> {
        self.rows.read().await.clone()
    }

    fn matches(filter: &AppointmentFilter, appt: &Appointment) -> bool {
        if appt.date < filter.date_from || appt.date > filter.date_to {
            return false;
        }
        if let Some(therapist_id) = filter.therapist_id {
            if appt.therapist_id != therapist_id {
                return false;
            }
        }
        if let Some(room_id) = filter.room_id {
            if appt.room_id != Some(room_id) {
                return false;
            }
        }
        if !filter.include_cancelled && appt.status == AppointmentStatus::Cancelled {
            return false;
        }
        true
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn list(
        &self,
        filter: &AppointmentFilter,
        _auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut result: Vec<Appointment> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|appt| Self::matches(filter, appt))
            .cloned()
            .collect();

        result.sort_by_key(|appt| (appt.date, appt.time));
        Ok(result)
    }

    async fn get(
        &self,
        id: Uuid,
        _auth_token: &str,
    ) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self.rows.read().await.iter().find(|a| a.id == id).cloned())
    }

    async fn insert_many(
        &self,
        rows: Vec<NewAppointment>,
        _auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let now = Utc::now();
        let inserted: Vec<Appointment> = rows
            .into_iter()
            .map(|row| Appointment {
                id: Uuid::new_v4(),
                patient_id: row.patient_id,
                patient_name: row.patient_name,
                date: row.date,
                time: row.time,
                duration_minutes: row.duration_minutes,
                therapist_id: row.therapist_id,
                room_id: row.room_id,
                status: row.status,
                is_first_session: row.is_first_session,
                repeat_weekly: row.repeat_weekly,
                repeat_until: row.repeat_until,
                notes: row.notes,
                created_at: now,
                updated_at: now,
            })
            .collect();

        self.rows.write().await.extend(inserted.clone());
        Ok(inserted)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
        _auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let mut rows = self.rows.write().await;
        let appt = rows
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(SchedulingError::NotFound)?;

        if let Some(patient_name) = patch.patient_name {
            appt.patient_name = patient_name;
        }
        if let Some(date) = patch.date {
            appt.date = date;
        }
        if let Some(time) = patch.time {
            appt.time = time;
        }
        if let Some(duration_minutes) = patch.duration_minutes {
            appt.duration_minutes = duration_minutes;
        }
        if let Some(room_id) = patch.room_id {
            appt.room_id = Some(room_id);
        }
        if let Some(status) = patch.status {
            appt.status = status;
        }
        if let Some(notes) = patch.notes {
            appt.notes = Some(notes);
        }
        appt.updated_at = Utc::now();

        Ok(appt.clone())
    }

    async fn delete(&self, id: Uuid, _auth_token: &str) -> Result<(), SchedulingError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|a| a.id != id);

        if rows.len() == before {
            return Err(SchedulingError::NotFound);
        }
        Ok(())
    }
}
