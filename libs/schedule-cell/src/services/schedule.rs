// libs/schedule-cell/src/services/schedule.rs
use std::sync::Arc;

use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{
    parse_hhmm, ClinicRow, ClinicSchedule, CreateScheduleRequest, DoctorProfileRow, ScheduleError,
    Shift, UpdateScheduleRequest, MAX_SLOT_DURATION_MINUTES, MIN_SLOT_DURATION_MINUTES,
};

const DEFAULT_SLOT_DURATION_MINUTES: i32 = 20;

/// Doctor-owned schedule CRUD. This is the only writer of schedule rows, so
/// the one-row-per-(clinic, weekday) rule the availability engine relies on
/// is enforced here.
pub struct ScheduleService {
    db: Arc<PostgrestClient>,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: Arc::new(PostgrestClient::new(config)),
        }
    }

    pub async fn create(
        &self,
        doctor_user_id: &str,
        clinic_id: Uuid,
        request: CreateScheduleRequest,
        auth_token: &str,
    ) -> Result<ClinicSchedule, ScheduleError> {
        self.verify_clinic_ownership(doctor_user_id, clinic_id, auth_token)
            .await?;

        // One schedule row per weekday.
        let existing: Vec<ClinicSchedule> = self
            .db
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/clinic_schedules?clinic_id=eq.{}&day_of_week=eq.{}",
                    clinic_id, request.day_of_week
                ),
                Some(auth_token),
                None,
            )
            .await?;

        if !existing.is_empty() {
            return Err(ScheduleError::DuplicateScheduleForDay(request.day_of_week));
        }

        validate_shifts(&request.shifts)?;
        let slot_duration = validate_slot_duration(request.slot_duration)?;

        let body = json!({
            "clinic_id": clinic_id,
            "day_of_week": request.day_of_week,
            "shifts": request.shifts,
            "slot_duration": slot_duration,
            "is_active": request.is_active.unwrap_or(true),
        });

        let mut created: Vec<ClinicSchedule> = self
            .db
            .insert("/rest/v1/clinic_schedules", Some(auth_token), body)
            .await?;

        if created.is_empty() {
            return Err(ScheduleError::Database(
                "insert returned no representation".to_string(),
            ));
        }

        let schedule = created.swap_remove(0);
        info!(
            "Created schedule {} for clinic {} on {}",
            schedule.id, clinic_id, schedule.day_of_week
        );
        Ok(schedule)
    }

    pub async fn find_by_clinic(
        &self,
        clinic_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ClinicSchedule>, ScheduleError> {
        debug!("Listing schedules for clinic {}", clinic_id);

        let schedules: Vec<ClinicSchedule> = self
            .db
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/clinic_schedules?clinic_id=eq.{}&order=day_of_week.asc",
                    clinic_id
                ),
                Some(auth_token),
                None,
            )
            .await?;

        Ok(schedules)
    }

    pub async fn update(
        &self,
        doctor_user_id: &str,
        schedule_id: Uuid,
        request: UpdateScheduleRequest,
        auth_token: &str,
    ) -> Result<ClinicSchedule, ScheduleError> {
        let schedule = self
            .find_with_ownership_check(doctor_user_id, schedule_id, auth_token)
            .await?;

        if let Some(shifts) = &request.shifts {
            validate_shifts(shifts)?;
        }
        if let Some(duration) = request.slot_duration {
            validate_slot_duration(Some(duration))?;
        }

        let mut patch = serde_json::Map::new();
        if let Some(day) = request.day_of_week {
            patch.insert("day_of_week".to_string(), json!(day));
        }
        if let Some(shifts) = request.shifts {
            patch.insert("shifts".to_string(), json!(shifts));
        }
        if let Some(duration) = request.slot_duration {
            patch.insert("slot_duration".to_string(), json!(duration));
        }
        if let Some(active) = request.is_active {
            patch.insert("is_active".to_string(), json!(active));
        }

        if patch.is_empty() {
            return Ok(schedule);
        }

        let mut updated: Vec<ClinicSchedule> = self
            .db
            .update(
                &format!("/rest/v1/clinic_schedules?id=eq.{}", schedule_id),
                Some(auth_token),
                serde_json::Value::Object(patch),
            )
            .await?;

        if updated.is_empty() {
            return Err(ScheduleError::ScheduleNotFound);
        }

        Ok(updated.swap_remove(0))
    }

    pub async fn delete(
        &self,
        doctor_user_id: &str,
        schedule_id: Uuid,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        self.find_with_ownership_check(doctor_user_id, schedule_id, auth_token)
            .await?;

        let _: Vec<serde_json::Value> = self
            .db
            .request_with_prefer(
                Method::DELETE,
                &format!("/rest/v1/clinic_schedules?id=eq.{}", schedule_id),
                Some(auth_token),
                None,
                Some("return=representation"),
            )
            .await?;

        info!("Deleted schedule {}", schedule_id);
        Ok(())
    }

    async fn find_with_ownership_check(
        &self,
        doctor_user_id: &str,
        schedule_id: Uuid,
        auth_token: &str,
    ) -> Result<ClinicSchedule, ScheduleError> {
        let mut schedules: Vec<ClinicSchedule> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/clinic_schedules?id=eq.{}", schedule_id),
                Some(auth_token),
                None,
            )
            .await?;

        if schedules.is_empty() {
            return Err(ScheduleError::ScheduleNotFound);
        }
        let schedule = schedules.swap_remove(0);

        self.verify_clinic_ownership(doctor_user_id, schedule.clinic_id, auth_token)
            .await?;

        Ok(schedule)
    }

    async fn verify_clinic_ownership(
        &self,
        doctor_user_id: &str,
        clinic_id: Uuid,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        let profiles: Vec<DoctorProfileRow> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/doctor_profiles?user_id=eq.{}", doctor_user_id),
                Some(auth_token),
                None,
            )
            .await?;

        let profile = profiles
            .first()
            .ok_or(ScheduleError::DoctorProfileNotFound)?;

        let clinics: Vec<ClinicRow> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/clinics?id=eq.{}", clinic_id),
                Some(auth_token),
                None,
            )
            .await?;

        let clinic = clinics.first().ok_or(ScheduleError::ClinicNotFound)?;

        if clinic.doctor_profile_id != profile.id {
            return Err(ScheduleError::NotClinicOwner);
        }

        Ok(())
    }
}

fn validate_shifts(shifts: &[Shift]) -> Result<(), ScheduleError> {
    for shift in shifts {
        let start = parse_hhmm(&shift.start_time)?;
        let end = parse_hhmm(&shift.end_time)?;
        if let Some(break_time) = &shift.break_time {
            parse_hhmm(break_time)?;
        }
        if start >= end {
            return Err(ScheduleError::InvalidShift {
                start: shift.start_time.clone(),
                end: shift.end_time.clone(),
            });
        }
    }
    Ok(())
}

fn validate_slot_duration(value: Option<i32>) -> Result<i32, ScheduleError> {
    let duration = value.unwrap_or(DEFAULT_SLOT_DURATION_MINUTES);
    if !(MIN_SLOT_DURATION_MINUTES..=MAX_SLOT_DURATION_MINUTES).contains(&duration) {
        return Err(ScheduleError::InvalidSlotDuration(duration));
    }
    Ok(duration)
}
