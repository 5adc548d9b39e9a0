// libs/schedule-cell/src/models.rs
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DbError;
use shared_models::error::AppError;
use shared_models::multilingual::Multilingual;

pub const MIN_SLOT_DURATION_MINUTES: i32 = 5;
pub const MAX_SLOT_DURATION_MINUTES: i32 = 120;

// ==============================================================================
// TIME-OF-DAY HANDLING
// ==============================================================================

/// Wire format for all times of day: zero-padded 24h "HH:mm".
fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").unwrap())
}

/// Parse an "HH:mm" string into minute-of-day.
pub fn parse_hhmm(value: &str) -> Result<u32, ScheduleError> {
    let captures = time_regex()
        .captures(value)
        .ok_or_else(|| ScheduleError::InvalidTimeFormat(value.to_string()))?;

    let hours: u32 = captures[1].parse().unwrap();
    let minutes: u32 = captures[2].parse().unwrap();
    Ok(hours * 60 + minutes)
}

/// Format a minute-of-day as "HH:mm".
pub fn format_hhmm(minute_of_day: u32) -> String {
    format!("{:02}:{:02}", minute_of_day / 60, minute_of_day % 60)
}

// ==============================================================================
// SCHEDULE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "SUNDAY",
            DayOfWeek::Monday => "MONDAY",
            DayOfWeek::Tuesday => "TUESDAY",
            DayOfWeek::Wednesday => "WEDNESDAY",
            DayOfWeek::Thursday => "THURSDAY",
            DayOfWeek::Friday => "FRIDAY",
            DayOfWeek::Saturday => "SATURDAY",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sun => DayOfWeek::Sunday,
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
        }
    }
}

/// A contiguous working interval within a day. `break_time` is carried for
/// display; slot generation subdivides the full interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_time: Option<String>,
}

impl Shift {
    pub fn new(start_time: &str, end_time: &str) -> Self {
        Self {
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            break_time: None,
        }
    }
}

/// One row per (clinic, day-of-week); the writer enforces that uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicSchedule {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub shifts: Vec<Shift>,
    pub slot_duration: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ephemeral availability flag for a single bookable time. Never persisted;
/// regenerated on every query because bookings move underneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub time: String,
    pub is_available: bool,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateScheduleRequest {
    pub day_of_week: DayOfWeek,
    pub shifts: Vec<Shift>,
    pub slot_duration: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateScheduleRequest {
    pub day_of_week: Option<DayOfWeek>,
    pub shifts: Option<Vec<Shift>>,
    pub slot_duration: Option<i32>,
    pub is_active: Option<bool>,
}

// ==============================================================================
// COLLABORATOR ROWS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
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

/// Projection of an appointment down to its time, for the booked-set load.
#[derive(Debug, Clone, Deserialize)]
pub struct BookedTimeRow {
    pub appointment_time: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Clinic not found")]
    ClinicNotFound,

    #[error("Schedule not found")]
    ScheduleNotFound,

    #[error("Doctor profile not found")]
    DoctorProfileNotFound,

    #[error("You do not own this clinic")]
    NotClinicOwner,

    #[error("Schedule already exists for {0}")]
    DuplicateScheduleForDay(DayOfWeek),

    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("Shift start {start} must be before end {end}")]
    InvalidShift { start: String, end: String },

    #[error("Slot duration {0} outside allowed range")]
    InvalidSlotDuration(i32),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<DbError> for ScheduleError {
    fn from(e: DbError) -> Self {
        ScheduleError::Database(e.to_string())
    }
}

impl From<ScheduleError> for AppError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::ClinicNotFound
            | ScheduleError::ScheduleNotFound
            | ScheduleError::DoctorProfileNotFound => AppError::NotFound(e.to_string()),
            ScheduleError::NotClinicOwner => AppError::Forbidden(e.to_string()),
            ScheduleError::DuplicateScheduleForDay(_) => AppError::Conflict(e.to_string()),
            ScheduleError::InvalidTimeFormat(_)
            | ScheduleError::InvalidShift { .. }
            | ScheduleError::InvalidSlotDuration(_) => AppError::BadRequest(e.to_string()),
            ScheduleError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_times() {
        assert_eq!(parse_hhmm("00:00").unwrap(), 0);
        assert_eq!(parse_hhmm("09:30").unwrap(), 570);
        assert_eq!(parse_hhmm("23:59").unwrap(), 1439);
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["24:00", "9:30", "09:60", "0930", "09:3a", "", "09:30:00"] {
            assert!(parse_hhmm(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn formats_back_to_padded_form() {
        assert_eq!(format_hhmm(0), "00:00");
        assert_eq!(format_hhmm(570), "09:30");
        assert_eq!(format_hhmm(1439), "23:59");
    }

    #[test]
    fn day_of_week_wire_format() {
        let json = serde_json::to_string(&DayOfWeek::Wednesday).unwrap();
        assert_eq!(json, "\"WEDNESDAY\"");
        assert_eq!(DayOfWeek::from(Weekday::Sun), DayOfWeek::Sunday);
    }
}
