// libs/appointment-cell/src/services/queries.rs
use std::sync::Arc;

use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, ClinicRow, DoctorProfileRow,
    PatientProfileRow,
};
use crate::services::access;

/// Single-row fetch used by every mutation path.
pub async fn fetch_appointment(
    db: &Arc<PostgrestClient>,
    appointment_id: Uuid,
    auth_token: &str,
) -> Result<Appointment, AppointmentError> {
    let mut rows: Vec<Appointment> = db
        .request(
            Method::GET,
            &format!("/rest/v1/appointments?id=eq.{}", appointment_id),
            Some(auth_token),
            None,
        )
        .await?;

    if rows.is_empty() {
        return Err(AppointmentError::NotFound);
    }
    Ok(rows.swap_remove(0))
}

pub async fn patient_profile_by_id(
    db: &Arc<PostgrestClient>,
    profile_id: Uuid,
    auth_token: &str,
) -> Result<PatientProfileRow, AppointmentError> {
    let mut rows: Vec<PatientProfileRow> = db
        .request(
            Method::GET,
            &format!("/rest/v1/patient_profiles?id=eq.{}", profile_id),
            Some(auth_token),
            None,
        )
        .await?;

    if rows.is_empty() {
        return Err(AppointmentError::PatientProfileNotFound);
    }
    Ok(rows.swap_remove(0))
}

/// Display name of the doctor behind a clinic, for notification context.
pub async fn doctor_name_for_clinic(
    db: &Arc<PostgrestClient>,
    clinic_id: Uuid,
    auth_token: &str,
) -> Result<String, AppointmentError> {
    let clinics: Vec<ClinicRow> = db
        .request(
            Method::GET,
            &format!("/rest/v1/clinics?id=eq.{}", clinic_id),
            Some(auth_token),
            None,
        )
        .await?;
    let clinic = clinics.first().ok_or(AppointmentError::ClinicNotFound)?;

    let doctors: Vec<DoctorProfileRow> = db
        .request(
            Method::GET,
            &format!("/rest/v1/doctor_profiles?id=eq.{}", clinic.doctor_profile_id),
            Some(auth_token),
            None,
        )
        .await?;

    Ok(doctors
        .first()
        .map(|d| d.full_name.clone())
        .unwrap_or_default())
}

/// Listing/filtering surface for the three actor kinds. Results are plain
/// appointment rows; shaping for the UI happens upstream.
pub struct AppointmentQueryService {
    db: Arc<PostgrestClient>,
}

impl AppointmentQueryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: Arc::new(PostgrestClient::new(config)),
        }
    }

    pub async fn get_for_actor(
        &self,
        actor: &User,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = fetch_appointment(&self.db, appointment_id, auth_token).await?;
        self.authorize_view(actor, &appointment, auth_token).await?;
        Ok(appointment)
    }

    /// Appointments booked for the patient themselves or anyone in their
    /// family, newest first.
    pub async fn find_by_patient(
        &self,
        patient_user: &User,
        filter: &AppointmentFilter,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let scope = access::patient_scope(&self.db, &patient_user.id, auth_token).await?;
        let scope_list = scope
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let mut path = format!(
            "/rest/v1/appointments?booked_for_patient_id=in.({})&order=appointment_date.desc,appointment_time.desc",
            scope_list
        );
        if let Some(status) = filter.status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        push_pagination(&mut path, filter);

        debug!("Patient {} listing appointments", patient_user.id);
        Ok(self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?)
    }

    /// Appointments across the doctor's clinics, in visit order.
    pub async fn find_by_doctor(
        &self,
        doctor_user: &User,
        filter: &AppointmentFilter,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let profile = access::doctor_profile(&self.db, &doctor_user.id, auth_token).await?;

        let clinics: Vec<ClinicRow> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/clinics?doctor_profile_id=eq.{}", profile.id),
                Some(auth_token),
                None,
            )
            .await?;
        let clinic_ids: Vec<Uuid> = clinics.iter().map(|c| c.id).collect();

        self.find_for_clinics(&clinic_ids, filter, AppointmentError::NotClinicOwner, auth_token)
            .await
    }

    /// Appointments across the clinics a secretary is assigned to.
    pub async fn find_by_secretary(
        &self,
        secretary_user: &User,
        filter: &AppointmentFilter,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let clinic_ids =
            access::secretary_clinic_ids(&self.db, &secretary_user.id, auth_token).await?;

        self.find_for_clinics(
            &clinic_ids,
            filter,
            AppointmentError::NotAssignedToClinic,
            auth_token,
        )
        .await
    }

    /// Clinics a secretary is assigned to, for their workspace switcher.
    pub async fn secretary_clinics(
        &self,
        secretary_user: &User,
        auth_token: &str,
    ) -> Result<Vec<ClinicRow>, AppointmentError> {
        let clinic_ids =
            access::secretary_clinic_ids(&self.db, &secretary_user.id, auth_token).await?;
        let id_list = clinic_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");

        Ok(self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/clinics?id=in.({})", id_list),
                Some(auth_token),
                None,
            )
            .await?)
    }

    async fn find_for_clinics(
        &self,
        clinic_ids: &[Uuid],
        filter: &AppointmentFilter,
        foreign_clinic_error: AppointmentError,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        // Narrowing to one clinic must stay inside the actor's own set.
        let scoped_ids: Vec<Uuid> = match filter.clinic_id {
            Some(requested) => {
                if !clinic_ids.contains(&requested) {
                    return Err(foreign_clinic_error);
                }
                vec![requested]
            }
            None => clinic_ids.to_vec(),
        };

        if scoped_ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = scoped_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let mut path = format!(
            "/rest/v1/appointments?clinic_id=in.({})&order=appointment_date.asc,queue_number.asc",
            id_list
        );
        if let Some(date) = filter.date {
            path.push_str(&format!("&appointment_date=eq.{}", date.format("%Y-%m-%d")));
        }
        if let Some(status) = filter.status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        push_pagination(&mut path, filter);

        Ok(self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?)
    }

    async fn authorize_view(
        &self,
        actor: &User,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        use shared_models::auth::Role;

        match actor.role {
            Some(Role::Doctor) => {
                access::verify_doctor_ownership(&self.db, &actor.id, appointment.clinic_id, auth_token)
                    .await
            }
            Some(Role::Secretary) => {
                access::verify_secretary_access(&self.db, &actor.id, appointment.clinic_id, auth_token)
                    .await
            }
            Some(Role::Patient) => {
                let scope = access::patient_scope(&self.db, &actor.id, auth_token).await?;
                if scope.contains(&appointment.booked_for_patient_id) {
                    Ok(())
                } else {
                    Err(AppointmentError::NotYourAppointment)
                }
            }
            _ => Err(AppointmentError::NotYourAppointment),
        }
    }
}

fn push_pagination(path: &mut String, filter: &AppointmentFilter) {
    let pagination = filter.pagination();
    path.push_str(&format!(
        "&limit={}&offset={}",
        pagination.limit(),
        pagination.offset()
    ));
}
