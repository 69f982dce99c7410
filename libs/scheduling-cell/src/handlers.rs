// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, NaiveTime};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    hhmm, AppointmentSearchQuery, CreateAppointmentRequest, RescheduleAppointmentRequest,
    SchedulingError, UpdateAppointmentRequest, WeekCopyRequest,
};
use crate::services::booking::BookingService;
use crate::services::conflict::ProposedSlot;
use crate::services::recurrence::RecurrenceService;
use crate::services::week_copy::WeekCopyService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotCheckQuery {
    pub therapist_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub duration_minutes: Option<i32>,
    pub room_id: Option<Uuid>,
    pub exclude_id: Option<Uuid>,
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn map_scheduling_error(e: SchedulingError) -> AppError {
    let message = e.to_string();
    match e {
        SchedulingError::Validation(_) => AppError::ValidationError(message),
        SchedulingError::SlotFull { .. }
        | SchedulingError::RoomConflict { .. }
        | SchedulingError::NoOccurrencesScheduled => AppError::Conflict(message),
        SchedulingError::NothingToCopy | SchedulingError::NotFound => AppError::NotFound(message),
        SchedulingError::InvalidStatusTransition { .. } => AppError::BadRequest(message),
        SchedulingError::Database(_) => AppError::Database(message),
    }
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

/// Book a single appointment. Requests flagged `repeat_weekly` are routed
/// through the recurring path and answered with its partial-success report.
#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if request.repeat_weekly {
        let recurrence = RecurrenceService::new(&state);
        let outcome = recurrence
            .create_recurring(request, token)
            .await
            .map_err(map_scheduling_error)?;

        return Ok(Json(json!({
            "success": true,
            "created": outcome.created,
            "skipped": outcome.skipped,
        })));
    }

    let booking = BookingService::new(&state);
    let outcome = booking
        .create_appointment(request, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "warning": outcome.warning,
    })))
}

#[axum::debug_handler]
pub async fn create_recurring_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let recurrence = RecurrenceService::new(&state);
    let outcome = recurrence
        .create_recurring(request, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "created": outcome.created,
        "skipped": outcome.skipped,
    })))
}

/// Read-only classification of a recurring request, for UI confirmation
/// before commit.
#[axum::debug_handler]
pub async fn preview_recurring_conflicts(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let recurrence = RecurrenceService::new(&state);
    let preview = recurrence
        .preview_recurring(request, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "conflicts": preview.conflicts,
        "total_weeks": preview.total_weeks,
    })))
}

#[axum::debug_handler]
pub async fn copy_week(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<WeekCopyRequest>,
) -> Result<Json<Value>, AppError> {
    let copier = WeekCopyService::new(&state);
    let outcome = copier
        .copy_week(request, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "copied_count": outcome.copied_count,
        "skipped": outcome.skipped,
    })))
}

// ==============================================================================
// LOOKUP AND MUTATION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&state);
    let appointments = booking
        .search_appointments(query, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&state);
    let appointment = booking
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&state);
    let appointment = booking
        .update_appointment(appointment_id, request, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&state);
    let outcome = booking
        .reschedule_appointment(appointment_id, request, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "warning": outcome.warning,
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&state);
    let appointment = booking
        .cancel_appointment(appointment_id, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking = BookingService::new(&state);
    booking
        .delete_appointment(appointment_id, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "success": true })))
}

/// Dry-run conflict check for a proposed slot.
#[axum::debug_handler]
pub async fn check_slot_conflicts(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<SlotCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let slot = ProposedSlot {
        exclude_id: query.exclude_id,
        therapist_id: query.therapist_id,
        room_id: query.room_id,
        date: query.date,
        time: query.time,
        duration_minutes: query.duration_minutes,
    };

    let booking = BookingService::new(&state);
    let (verdict, room_free) = booking
        .assess_slot(&slot, auth.token())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "available": !verdict.is_blocking() && room_free,
        "room_free": room_free,
        "warning": verdict.warning(),
    })))
}
