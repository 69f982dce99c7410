// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;

pub fn scheduling_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        // Booking paths
        .route("/", post(handlers::create_appointment))
        .route("/recurring", post(handlers::create_recurring_appointment))
        .route(
            "/recurring/preview",
            post(handlers::preview_recurring_conflicts),
        )
        .route("/week-copy", post(handlers::copy_week))
        // Lookups
        .route("/search", get(handlers::search_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        // Mutations
        .route("/{appointment_id}", put(handlers::update_appointment))
        .route(
            "/{appointment_id}/reschedule",
            patch(handlers::reschedule_appointment),
        )
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}", delete(handlers::delete_appointment))
        // Utility endpoints
        .route("/conflicts/check", get(handlers::check_slot_conflicts))
        .with_state(state)
}
