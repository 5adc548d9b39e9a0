// libs/schedule-cell/src/services/availability.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{
    parse_hhmm, BookedTimeRow, ClinicRow, ClinicSchedule, DayOfWeek, ScheduleError, TimeSlot,
};
use crate::services::slots::shift_slots;

/// Read-only availability queries. Results are advisory: a slot reported free
/// can be taken by the time a booking lands, and the booking path re-checks
/// under the storage constraints.
pub struct AvailabilityService {
    db: Arc<PostgrestClient>,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: Arc::new(PostgrestClient::new(config)),
        }
    }

    pub fn with_client(db: Arc<PostgrestClient>) -> Self {
        Self { db }
    }

    /// All slots for a clinic on a date, flagged available or not.
    pub async fn get_available_slots(
        &self,
        clinic_id: uuid::Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, ScheduleError> {
        debug!("Computing available slots for clinic {} on {}", clinic_id, date);

        // Clinic must exist; a clinic with no schedule that day is simply closed.
        let clinics: Vec<ClinicRow> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/clinics?id=eq.{}", clinic_id),
                Some(auth_token),
                None,
            )
            .await?;

        if clinics.is_empty() {
            return Err(ScheduleError::ClinicNotFound);
        }

        let day = DayOfWeek::from(date.weekday());
        let Some(schedule) = self.active_schedule_for_day(clinic_id, day, auth_token).await? else {
            return Ok(Vec::new());
        };

        let booked = self.booked_times(clinic_id, date, auth_token).await?;

        compute_available_slots(&schedule, &booked, date, now)
    }

    /// The single active schedule row for a clinic on a given weekday, if any.
    pub async fn active_schedule_for_day(
        &self,
        clinic_id: uuid::Uuid,
        day: DayOfWeek,
        auth_token: &str,
    ) -> Result<Option<ClinicSchedule>, ScheduleError> {
        let path = format!(
            "/rest/v1/clinic_schedules?clinic_id=eq.{}&day_of_week=eq.{}&is_active=eq.true",
            clinic_id, day
        );
        let mut schedules: Vec<ClinicSchedule> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(if schedules.is_empty() {
            None
        } else {
            Some(schedules.swap_remove(0))
        })
    }

    /// Times already held by an active (PENDING or CONFIRMED) appointment.
    async fn booked_times(
        &self,
        clinic_id: uuid::Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<HashSet<String>, ScheduleError> {
        let path = format!(
            "/rest/v1/appointments?clinic_id=eq.{}&appointment_date=eq.{}&status=in.(PENDING,CONFIRMED)&select=appointment_time",
            clinic_id,
            date.format("%Y-%m-%d")
        );
        let rows: Vec<BookedTimeRow> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(rows.into_iter().map(|r| r.appointment_time).collect())
    }
}

/// Pure core of the availability engine: expand every shift, sort, and flag
/// each slot against the booked set and the query wall clock. The slot's
/// instant is the date plus its start time, interpreted in UTC like every
/// other timestamp in the system.
pub fn compute_available_slots(
    schedule: &ClinicSchedule,
    booked: &HashSet<String>,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<TimeSlot>, ScheduleError> {
    let mut slots = Vec::new();

    for shift in &schedule.shifts {
        for time in shift_slots(shift, schedule.slot_duration)? {
            let is_available = !booked.contains(&time) && slot_is_in_future(date, &time, now)?;
            slots.push(TimeSlot { time, is_available });
        }
    }

    // "HH:mm" is zero-padded, so lexicographic order is chronological order.
    slots.sort_by(|a, b| a.time.cmp(&b.time));

    Ok(slots)
}

fn slot_is_in_future(date: NaiveDate, time: &str, now: DateTime<Utc>) -> Result<bool, ScheduleError> {
    let minute_of_day = parse_hhmm(time)?;
    let time_of_day = NaiveTime::from_num_seconds_from_midnight_opt(minute_of_day * 60, 0)
        .ok_or_else(|| ScheduleError::InvalidTimeFormat(time.to_string()))?;
    let instant = date.and_time(time_of_day).and_utc();
    Ok(instant > now)
}
