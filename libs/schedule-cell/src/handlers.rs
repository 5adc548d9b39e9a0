// libs/schedule-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{CreateScheduleRequest, UpdateScheduleRequest};
use crate::services::availability::AvailabilityService;
use crate::services::schedule::ScheduleService;

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

fn require_doctor(user: &User) -> Result<(), AppError> {
    match user.require_role()? {
        Role::Doctor => Ok(()),
        role => Err(AppError::Forbidden(format!(
            "Only doctors manage schedules, not {}",
            role
        ))),
    }
}

#[axum::debug_handler]
pub async fn create_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(clinic_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let service = ScheduleService::new(&state);
    let schedule = service
        .create(&user.id, clinic_id, request, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule
    })))
}

#[axum::debug_handler]
pub async fn list_schedules(
    State(state): State<Arc<AppConfig>>,
    Path(clinic_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduleService::new(&state);
    let schedules = service.find_by_clinic(clinic_id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "schedules": schedules
    })))
}

#[axum::debug_handler]
pub async fn update_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(schedule_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let service = ScheduleService::new(&state);
    let schedule = service
        .update(&user.id, schedule_id, request, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule
    })))
}

#[axum::debug_handler]
pub async fn delete_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(schedule_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_doctor(&user)?;

    let service = ScheduleService::new(&state);
    service.delete(&user.id, schedule_id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule deleted"
    })))
}

/// Availability for a clinic on a date. Advisory only; booking re-checks.
#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(clinic_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    let slots = service
        .get_available_slots(clinic_id, query.date, Utc::now(), auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "date": query.date,
        "slots": slots
    })))
}
