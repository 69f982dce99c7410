// libs/scheduling-cell/src/store/supabase.rs
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentPatch, NewAppointment, SchedulingError,
};
use crate::store::AppointmentStore;

pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn list_path(filter: &AppointmentFilter) -> String {
        let mut query_parts = vec![
            format!("date=gte.{}", filter.date_from),
            format!("date=lte.{}", filter.date_to),
        ];

        if let Some(therapist_id) = filter.therapist_id {
            query_parts.push(format!("therapist_id=eq.{}", therapist_id));
        }
        if let Some(room_id) = filter.room_id {
            query_parts.push(format!("room_id=eq.{}", room_id));
        }
        if !filter.include_cancelled {
            query_parts.push("status=neq.cancelled".to_string());
        }

        format!(
            "/rest/v1/appointments?{}&order=date.asc,time.asc",
            query_parts.join("&")
        )
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, SchedulingError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointments: {}", e)))
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn list(
        &self,
        filter: &AppointmentFilter,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = Self::list_path(filter);
        debug!("Listing appointments: {}", path);

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        Self::parse_rows(rows)
    }

    async fn get(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        Ok(Self::parse_rows(rows)?.into_iter().next())
    }

    async fn insert_many(
        &self,
        rows: Vec<NewAppointment>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        debug!("Inserting {} appointment rows", rows.len());

        let now = Utc::now().to_rfc3339();
        let body: Vec<Value> = rows
            .into_iter()
            .map(|row| {
                let mut value = serde_json::to_value(row).unwrap_or(Value::Null);
                if let Some(object) = value.as_object_mut() {
                    object.insert("created_at".to_string(), json!(now));
                    object.insert("updated_at".to_string(), json!(now));
                }
                value
            })
            .collect();

        let inserted = self
            .supabase
            .insert_returning("/rest/v1/appointments", auth_token, Value::Array(body))
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        Self::parse_rows(inserted)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);

        let mut body = serde_json::to_value(&patch)
            .map_err(|e| SchedulingError::Database(e.to_string()))?;
        if let Some(object) = body.as_object_mut() {
            object.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        }

        let updated = self
            .supabase
            .patch_returning(&path, auth_token, body)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        Self::parse_rows(updated)?
            .into_iter()
            .next()
            .ok_or(SchedulingError::NotFound)
    }

    async fn delete(&self, id: Uuid, auth_token: &str) -> Result<(), SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);

        self.supabase
            .delete(&path, auth_token)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))
    }
}
