// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use schedule_cell::models::ScheduleError;
use security_cell::VaultError;
use shared_database::DbError;
use shared_models::auth::Role;
use shared_models::error::AppError;
use shared_models::multilingual::Multilingual;
use shared_models::pagination::Pagination;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::CheckedIn => "CHECKED_IN",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::NoShow => "NO_SHOW",
        }
    }

    /// Statuses that hold a slot. Everything else has released it.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    /// Medical notes may only be written while the visit is underway or done.
    pub fn allows_medical_notes(&self) -> bool {
        matches!(self, AppointmentStatus::CheckedIn | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookedBy {
    Patient,
    Secretary,
}

/// The central aggregate. `patient_name`, `patient_age`, `service_name` and
/// `price` are a point-in-time receipt captured at creation; they are never
/// re-derived from the profile or catalog afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub booking_number: String,
    pub clinic_id: Uuid,
    pub doctor_profile_id: Uuid,
    pub patient_profile_id: Uuid,
    pub booked_for_patient_id: Uuid,
    pub service_type_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub queue_number: i32,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub patient_name: String,
    pub patient_age: Option<i32>,
    pub service_name: Multilingual,
    pub price: f64,
    pub patient_notes: Option<String>,
    pub symptoms: Option<String>,
    pub diagnosis_encrypted: Option<String>,
    pub prescription_encrypted: Option<String>,
    pub doctor_notes_encrypted: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by_id: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub booked_by: BookedBy,
    pub booked_by_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Patient booking. `patient_profile_id` names a family member the caller is
/// booking for; absent means booking for themselves.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub clinic_id: Uuid,
    pub service_type_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub patient_profile_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Secretary booking on a walk-in or phone patient's behalf.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSecretaryAppointmentRequest {
    pub clinic_id: Uuid,
    pub service_type_id: Uuid,
    pub patient_profile_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub notes: Option<String>,
    pub symptoms: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

/// Every writable clinical field gets its own optional slot; absent fields
/// are left untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMedicalNotesRequest {
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
}

/// Decrypted clinical payload returned after the access check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MedicalNotes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prescription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Payment state is deliberately a free pair: any value may follow any other,
/// because refund workflows live outside this core.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub clinic_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl AppointmentFilter {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

// ==============================================================================
// COLLABORATOR ROWS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PatientProfileRow {
    pub id: Uuid,
    pub user_id: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub age: Option<i32>,
    pub family_head_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicRow {
    pub id: Uuid,
    pub name: Multilingual,
    pub doctor_profile_id: Uuid,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorProfileRow {
    pub id: Uuid,
    pub user_id: String,
    pub full_name: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceTypeRow {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: Multilingual,
    pub price: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretaryAssignmentRow {
    pub id: Uuid,
    pub user_id: String,
    pub clinic_id: Uuid,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueNumberRow {
    pub queue_number: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdRow {
    pub id: Uuid,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient profile not found")]
    PatientProfileNotFound,

    #[error("Doctor profile not found")]
    DoctorProfileNotFound,

    #[error("Clinic not found or not active")]
    ClinicNotFound,

    #[error("Doctor is not available for appointments")]
    DoctorNotAvailable,

    #[error("Service type not found or not active")]
    ServiceNotActive,

    #[error("Cannot book appointments in the past")]
    PastBooking,

    #[error("Clinic is not open on this day")]
    ClinicClosed,

    #[error("This time slot is already booked")]
    SlotAlreadyBooked,

    #[error("Cannot book for this patient. They are not in your family")]
    NotYourFamilyMember,

    #[error("You do not own this clinic")]
    NotClinicOwner,

    #[error("You are not assigned to this clinic")]
    NotAssignedToClinic,

    #[error("You cannot act on this appointment")]
    NotYourAppointment,

    #[error("Cannot transition from {from} to {to} as {role}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
        role: Role,
    },

    #[error("Medical notes can only be updated for checked-in or completed appointments")]
    NotesNotWritable,

    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("Booking conflicted too many times, please retry")]
    SequenceContention,

    #[error("Medical notes cipher failure: {0}")]
    Vault(#[from] VaultError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<DbError> for AppointmentError {
    fn from(e: DbError) -> Self {
        // Sequencing code matches on `DbError::Conflict` before it gets here;
        // a conflict that reaches this conversion is an unmodeled constraint.
        AppointmentError::Database(e.to_string())
    }
}

impl From<ScheduleError> for AppointmentError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::ClinicNotFound => AppointmentError::ClinicNotFound,
            ScheduleError::InvalidTimeFormat(t) => AppointmentError::InvalidTimeFormat(t),
            other => AppointmentError::Database(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match &e {
            AppointmentError::NotFound
            | AppointmentError::PatientProfileNotFound
            | AppointmentError::DoctorProfileNotFound
            | AppointmentError::ClinicNotFound
            | AppointmentError::ServiceNotActive => AppError::NotFound(e.to_string()),

            AppointmentError::SlotAlreadyBooked | AppointmentError::SequenceContention => {
                AppError::Conflict(e.to_string())
            }

            AppointmentError::NotYourFamilyMember
            | AppointmentError::NotClinicOwner
            | AppointmentError::NotAssignedToClinic
            | AppointmentError::NotYourAppointment => AppError::Forbidden(e.to_string()),

            AppointmentError::DoctorNotAvailable
            | AppointmentError::PastBooking
            | AppointmentError::ClinicClosed
            | AppointmentError::NotesNotWritable
            | AppointmentError::InvalidTimeFormat(_) => AppError::BadRequest(e.to_string()),

            AppointmentError::InvalidStatusTransition { .. } => {
                AppError::InvalidTransition(e.to_string())
            }

            AppointmentError::Vault(VaultError::AuthenticationFailure) => {
                AppError::Internal("Stored medical notes failed authentication".to_string())
            }
            AppointmentError::Vault(_) => AppError::Internal(e.to_string()),

            AppointmentError::Database(msg) => AppError::Database(msg.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_format_is_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::CheckedIn).unwrap(),
            "\"CHECKED_IN\""
        );
        assert_eq!(
            serde_json::from_str::<AppointmentStatus>("\"NO_SHOW\"").unwrap(),
            AppointmentStatus::NoShow
        );
    }

    #[test]
    fn active_and_terminal_partitions() {
        use AppointmentStatus::*;
        assert!(Pending.is_active() && Confirmed.is_active());
        assert!(!CheckedIn.is_active());
        assert!(Completed.is_terminal() && Cancelled.is_terminal() && NoShow.is_terminal());
        assert!(!CheckedIn.is_terminal());
    }

    #[test]
    fn notes_gate_follows_status() {
        use AppointmentStatus::*;
        assert!(CheckedIn.allows_medical_notes());
        assert!(Completed.allows_medical_notes());
        for status in [Pending, Confirmed, Cancelled, NoShow] {
            assert!(!status.allows_medical_notes());
        }
    }
}
