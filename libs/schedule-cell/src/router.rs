// libs/schedule-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/clinics/{clinic_id}/schedules", post(handlers::create_schedule))
        .route("/clinics/{clinic_id}/schedules", get(handlers::list_schedules))
        .route("/clinics/{clinic_id}/slots", get(handlers::get_available_slots))
        .route("/schedules/{schedule_id}", put(handlers::update_schedule))
        .route("/schedules/{schedule_id}", delete(handlers::delete_schedule))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
