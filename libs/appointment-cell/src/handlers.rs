// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{
    AppointmentFilter, AppointmentStatus, CancelAppointmentRequest, CreateAppointmentRequest,
    CreateSecretaryAppointmentRequest, UpdateMedicalNotesRequest, UpdatePaymentRequest,
    UpdateStatusRequest,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notes::MedicalNotesService;
use crate::services::queries::AppointmentQueryService;

fn require_role(user: &User, expected: Role) -> Result<(), AppError> {
    let role = user.require_role()?;
    if role == expected {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "This operation requires the {} role",
            expected
        )))
    }
}

fn require_staff(user: &User) -> Result<(), AppError> {
    match user.require_role()? {
        Role::Doctor | Role::Secretary => Ok(()),
        role => Err(AppError::Forbidden(format!(
            "This operation requires clinic staff, not {}",
            role
        ))),
    }
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Patient)?;

    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .create_for_patient(&user, request, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn book_appointment_by_secretary(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateSecretaryAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Secretary)?;

    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .create_for_secretary(&user, request, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueryService::new(&state);
    let appointment = service
        .get_for_actor(&user, appointment_id, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn list_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(filter): Query<AppointmentFilter>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Patient)?;

    let service = AppointmentQueryService::new(&state);
    let appointments = service
        .find_by_patient(&user, &filter, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(filter): Query<AppointmentFilter>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Doctor)?;

    let service = AppointmentQueryService::new(&state);
    let appointments = service.find_by_doctor(&user, &filter, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn list_secretary_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(filter): Query<AppointmentFilter>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Secretary)?;

    let service = AppointmentQueryService::new(&state);
    let appointments = service
        .find_by_secretary(&user, &filter, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn list_secretary_clinics(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Secretary)?;

    let service = AppointmentQueryService::new(&state);
    let clinics = service.secretary_clinics(&user, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "clinics": clinics
    })))
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = AppointmentLifecycleService::new(&state);
    let appointment = service
        .update_status(&user, appointment_id, request, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// Patient self-cancel: the one transition patients may make, expressed as
/// its own endpoint so the intent is explicit.
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Patient)?;

    let service = AppointmentLifecycleService::new(&state);
    let appointment = service
        .update_status(
            &user,
            appointment_id,
            UpdateStatusRequest {
                status: AppointmentStatus::Cancelled,
                cancellation_reason: request.reason,
            },
            auth.token(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn update_payment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = AppointmentLifecycleService::new(&state);
    let appointment = service
        .update_payment(&user, appointment_id, request, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// MEDICAL NOTES
// ==============================================================================

#[axum::debug_handler]
pub async fn update_medical_notes(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateMedicalNotesRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, Role::Doctor)?;

    let service = MedicalNotesService::new(&state);
    let appointment = service
        .update_notes(&user, appointment_id, request, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment_id": appointment.id,
        "message": "Medical notes updated"
    })))
}

#[axum::debug_handler]
pub async fn get_medical_notes(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = MedicalNotesService::new(&state);
    let notes = service
        .get_notes(&user, appointment_id, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "notes": notes
    })))
}
