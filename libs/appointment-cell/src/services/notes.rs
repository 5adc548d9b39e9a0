// libs/appointment-cell/src/services/notes.rs
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use security_cell::FieldVault;
use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_models::auth::{Role, User};

use crate::models::{
    Appointment, AppointmentError, MedicalNotes, UpdateMedicalNotesRequest,
};
use crate::services::access;
use crate::services::queries::fetch_appointment;

/// Clinical note fields on an appointment: encrypted at rest, writable by
/// the treating doctor while the visit is underway or completed, readable by
/// the doctor or the owning patient/family head. Each field is sealed
/// independently so one can be rewritten without touching the others.
pub struct MedicalNotesService {
    db: Arc<PostgrestClient>,
    vault: FieldVault,
}

impl MedicalNotesService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: Arc::new(PostgrestClient::new(config)),
            vault: FieldVault::from_config(config),
        }
    }

    pub async fn update_notes(
        &self,
        doctor: &User,
        appointment_id: Uuid,
        request: UpdateMedicalNotesRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = fetch_appointment(&self.db, appointment_id, auth_token).await?;

        access::verify_doctor_ownership(&self.db, &doctor.id, appointment.clinic_id, auth_token)
            .await?;

        if !appointment.status.allows_medical_notes() {
            return Err(AppointmentError::NotesNotWritable);
        }

        let mut body = serde_json::Map::new();
        if let Some(diagnosis) = &request.diagnosis {
            body.insert(
                "diagnosis_encrypted".to_string(),
                json!(self.vault.encrypt_field(diagnosis)?),
            );
        }
        if let Some(prescription) = &request.prescription {
            body.insert(
                "prescription_encrypted".to_string(),
                json!(self.vault.encrypt_field(prescription)?),
            );
        }
        if let Some(notes) = &request.notes {
            body.insert(
                "doctor_notes_encrypted".to_string(),
                json!(self.vault.encrypt_field(notes)?),
            );
        }

        if body.is_empty() {
            debug!("Medical notes update for {} had no fields", appointment_id);
            return Ok(appointment);
        }

        let mut updated: Vec<Appointment> = self
            .db
            .update(
                &format!("/rest/v1/appointments?id=eq.{}", appointment_id),
                Some(auth_token),
                serde_json::Value::Object(body),
            )
            .await?;

        if updated.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        info!("Medical notes updated on appointment {}", appointment_id);
        Ok(updated.swap_remove(0))
    }

    /// Decrypt and return the notes, but only after the caller's relationship
    /// to the appointment is established; strangers are refused before any
    /// ciphertext is touched.
    pub async fn get_notes(
        &self,
        actor: &User,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<MedicalNotes, AppointmentError> {
        let appointment = fetch_appointment(&self.db, appointment_id, auth_token).await?;

        match actor.role {
            Some(Role::Doctor) => {
                access::verify_doctor_ownership(&self.db, &actor.id, appointment.clinic_id, auth_token)
                    .await?;
            }
            Some(Role::Patient) => {
                let scope = access::patient_scope(&self.db, &actor.id, auth_token).await?;
                if !scope.contains(&appointment.booked_for_patient_id) {
                    return Err(AppointmentError::NotYourAppointment);
                }
            }
            _ => return Err(AppointmentError::NotYourAppointment),
        }

        let decrypt = |field: &Option<String>| -> Result<Option<String>, AppointmentError> {
            field
                .as_deref()
                .map(|envelope| self.vault.decrypt_field(envelope))
                .transpose()
                .map_err(AppointmentError::from)
        };

        Ok(MedicalNotes {
            diagnosis: decrypt(&appointment.diagnosis_encrypted)?,
            prescription: decrypt(&appointment.prescription_encrypted)?,
            notes: decrypt(&appointment.doctor_notes_encrypted)?,
        })
    }
}
