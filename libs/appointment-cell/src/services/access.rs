// libs/appointment-cell/src/services/access.rs
//
// Ownership and assignment checks shared by every appointment operation.
// All of them read the collaborators' tables and decide before anything is
// written or decrypted.

use std::sync::Arc;

use reqwest::Method;
use uuid::Uuid;

use shared_database::PostgrestClient;

use crate::models::{
    AppointmentError, ClinicRow, DoctorProfileRow, PatientProfileRow, SecretaryAssignmentRow,
};

/// The doctor's own profile, or an error when the user has none.
pub async fn doctor_profile(
    db: &Arc<PostgrestClient>,
    doctor_user_id: &str,
    auth_token: &str,
) -> Result<DoctorProfileRow, AppointmentError> {
    let mut rows: Vec<DoctorProfileRow> = db
        .request(
            Method::GET,
            &format!("/rest/v1/doctor_profiles?user_id=eq.{}", doctor_user_id),
            Some(auth_token),
            None,
        )
        .await?;

    if rows.is_empty() {
        return Err(AppointmentError::DoctorProfileNotFound);
    }
    Ok(rows.swap_remove(0))
}

/// Doctor must own the clinic the appointment belongs to.
pub async fn verify_doctor_ownership(
    db: &Arc<PostgrestClient>,
    doctor_user_id: &str,
    clinic_id: Uuid,
    auth_token: &str,
) -> Result<(), AppointmentError> {
    let profile = doctor_profile(db, doctor_user_id, auth_token).await?;

    let clinics: Vec<ClinicRow> = db
        .request(
            Method::GET,
            &format!("/rest/v1/clinics?id=eq.{}", clinic_id),
            Some(auth_token),
            None,
        )
        .await?;

    match clinics.first() {
        Some(clinic) if clinic.doctor_profile_id == profile.id => Ok(()),
        Some(_) => Err(AppointmentError::NotClinicOwner),
        None => Err(AppointmentError::ClinicNotFound),
    }
}

/// Secretary must hold an active assignment to the clinic.
pub async fn verify_secretary_access(
    db: &Arc<PostgrestClient>,
    secretary_user_id: &str,
    clinic_id: Uuid,
    auth_token: &str,
) -> Result<(), AppointmentError> {
    let assignments: Vec<SecretaryAssignmentRow> = db
        .request(
            Method::GET,
            &format!(
                "/rest/v1/clinic_secretaries?user_id=eq.{}&clinic_id=eq.{}&is_active=eq.true",
                secretary_user_id, clinic_id
            ),
            Some(auth_token),
            None,
        )
        .await?;

    if assignments.is_empty() {
        return Err(AppointmentError::NotAssignedToClinic);
    }
    Ok(())
}

/// All clinics a secretary may act on.
pub async fn secretary_clinic_ids(
    db: &Arc<PostgrestClient>,
    secretary_user_id: &str,
    auth_token: &str,
) -> Result<Vec<Uuid>, AppointmentError> {
    let assignments: Vec<SecretaryAssignmentRow> = db
        .request(
            Method::GET,
            &format!(
                "/rest/v1/clinic_secretaries?user_id=eq.{}&is_active=eq.true",
                secretary_user_id
            ),
            Some(auth_token),
            None,
        )
        .await?;

    if assignments.is_empty() {
        return Err(AppointmentError::NotAssignedToClinic);
    }
    Ok(assignments.into_iter().map(|a| a.clinic_id).collect())
}

/// The caller's own patient profile.
pub async fn patient_profile_by_user(
    db: &Arc<PostgrestClient>,
    patient_user_id: &str,
    auth_token: &str,
) -> Result<PatientProfileRow, AppointmentError> {
    let mut rows: Vec<PatientProfileRow> = db
        .request(
            Method::GET,
            &format!("/rest/v1/patient_profiles?user_id=eq.{}", patient_user_id),
            Some(auth_token),
            None,
        )
        .await?;

    if rows.is_empty() {
        return Err(AppointmentError::PatientProfileNotFound);
    }
    Ok(rows.swap_remove(0))
}

/// Profile ids a patient acts for: their own plus any family members they
/// head. Used to authorize cancellations, listings and notes reads.
pub async fn patient_scope(
    db: &Arc<PostgrestClient>,
    patient_user_id: &str,
    auth_token: &str,
) -> Result<Vec<Uuid>, AppointmentError> {
    let profile = patient_profile_by_user(db, patient_user_id, auth_token).await?;

    let family: Vec<PatientProfileRow> = db
        .request(
            Method::GET,
            &format!("/rest/v1/patient_profiles?family_head_id=eq.{}", profile.id),
            Some(auth_token),
            None,
        )
        .await?;

    let mut ids = vec![profile.id];
    ids.extend(family.into_iter().map(|p| p.id));
    Ok(ids)
}
