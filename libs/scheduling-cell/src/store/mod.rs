// libs/scheduling-cell/src/store/mod.rs
//
// Persistence seam. The engine never reads ambient state: every conflict
// check receives its existing-appointment set through this interface.

pub mod memory;
pub mod patients;
pub mod supabase;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentPatch, NewAppointment, SchedulingError,
};

pub use memory::InMemoryAppointmentStore;
pub use patients::{InMemoryPatientDirectory, PatientDirectory, SupabasePatientDirectory};
pub use supabase::SupabaseAppointmentStore;

/// Range queries and writes over appointment rows.
///
/// The read-then-write gap between `list` and `insert_many` is the
/// documented race window; a transactional implementation would close it
/// behind this same interface.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn list(
        &self,
        filter: &AppointmentFilter,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError>;

    async fn get(&self, id: Uuid, auth_token: &str)
        -> Result<Option<Appointment>, SchedulingError>;

    async fn insert_many(
        &self,
        rows: Vec<NewAppointment>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError>;

    async fn update(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError>;

    async fn delete(&self, id: Uuid, auth_token: &str) -> Result<(), SchedulingError>;
}
