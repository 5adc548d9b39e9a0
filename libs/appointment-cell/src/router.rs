// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/secretary", post(handlers::book_appointment_by_secretary))

        // Listings per actor kind
        .route("/patient", get(handlers::list_patient_appointments))
        .route("/doctor", get(handlers::list_doctor_appointments))
        .route("/secretary", get(handlers::list_secretary_appointments))
        .route("/secretary/clinics", get(handlers::list_secretary_clinics))

        // Single appointment and lifecycle
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_status))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/payment", patch(handlers::update_payment))

        // Encrypted clinical notes
        .route("/{appointment_id}/medical-notes", put(handlers::update_medical_notes))
        .route("/{appointment_id}/medical-notes", get(handlers::get_medical_notes))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
