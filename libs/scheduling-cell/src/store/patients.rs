// libs/scheduling-cell/src/store/patients.rs
use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

/// Resolves a patient name to an id so new bookings can link the record.
/// Best-effort by contract: absence is not an error, and lookup failures
/// must never block a booking.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_by_name(&self, name: &str, auth_token: &str) -> Option<Uuid>;
}

pub struct SupabasePatientDirectory {
    supabase: SupabaseClient,
}

impl SupabasePatientDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn find_by_name(&self, name: &str, auth_token: &str) -> Option<Uuid> {
        let path = format!(
            "/rest/v1/patients?full_name=ilike.{}&limit=1",
            urlencoding::encode(name)
        );
        debug!("Resolving patient id for '{}'", name);

        let rows: Vec<Value> = match self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Patient lookup failed for '{}': {}", name, e);
                return None;
            }
        };

        rows.first()
            .and_then(|row| row.get("id"))
            .and_then(|id| id.as_str())
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

#[derive(Default)]
pub struct InMemoryPatientDirectory {
    by_name: HashMap<String, Uuid>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patient(mut self, name: &str, id: Uuid) -> Self {
        self.by_name.insert(name.to_lowercase(), id);
        self
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn find_by_name(&self, name: &str, _auth_token: &str) -> Option<Uuid> {
        self.by_name.get(&name.to_lowercase()).copied()
    }
}
