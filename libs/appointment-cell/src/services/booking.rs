// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::{NotificationPayload, NotificationService};
use schedule_cell::models::{parse_hhmm, DayOfWeek};
use schedule_cell::services::availability::AvailabilityService;
use shared_config::AppConfig;
use shared_database::{DbError, PostgrestClient};
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentError, BookedBy, ClinicRow, CreateAppointmentRequest,
    CreateSecretaryAppointmentRequest, DoctorProfileRow, IdRow, PatientProfileRow,
    QueueNumberRow, ServiceTypeRow,
};
use crate::services::access;

const DOCTOR_APPROVED_STATUS: &str = "APPROVED";

/// Storage-side unique constraints that close the booking races. A 409 on
/// the slot index means the slot is genuinely gone; a 409 on a sequence
/// index means we raced another writer for an ordinal and should recompute.
const SLOT_CONSTRAINT: &str = "appointments_active_slot_key";
const QUEUE_CONSTRAINT: &str = "appointments_clinic_day_queue_key";
const BOOKING_NUMBER_CONSTRAINT: &str = "appointments_booking_number_key";

const MAX_SEQUENCE_ATTEMPTS: u32 = 3;

const BOOKING_NUMBER_PREFIX: &str = "APT";

pub struct AppointmentBookingService {
    db: Arc<PostgrestClient>,
    availability: AvailabilityService,
    notifications: NotificationService,
}

/// Everything resolved by the precondition pipeline, ready to persist.
struct BookingContext {
    clinic: ClinicRow,
    doctor: DoctorProfileRow,
    service: ServiceTypeRow,
    payer: PatientProfileRow,
    booked_for: PatientProfileRow,
    date: NaiveDate,
    time: String,
    notes: Option<String>,
    symptoms: Option<String>,
    booked_by: BookedBy,
    booked_by_id: String,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let db = Arc::new(PostgrestClient::new(config));
        Self {
            availability: AvailabilityService::with_client(Arc::clone(&db)),
            notifications: NotificationService::new(config),
            db,
        }
    }

    /// Patient books for themselves or for a family member they head.
    pub async fn create_for_patient(
        &self,
        actor: &User,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Patient {} booking clinic {} at {} {}",
            actor.id, request.clinic_id, request.appointment_date, request.appointment_time
        );

        let payer = access::patient_profile_by_user(&self.db, &actor.id, auth_token).await?;

        let context = self
            .resolve_context(
                request.clinic_id,
                request.service_type_id,
                request.appointment_date,
                request.appointment_time,
                payer,
                request.patient_profile_id,
                request.notes,
                None,
                BookedBy::Patient,
                actor.id.clone(),
                auth_token,
            )
            .await?;

        self.sequence_and_insert(context, auth_token).await
    }

    /// Secretary books on a patient's behalf; requires an active assignment
    /// to the clinic before anything else is looked at.
    pub async fn create_for_secretary(
        &self,
        actor: &User,
        request: CreateSecretaryAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Secretary {} booking clinic {} at {} {}",
            actor.id, request.clinic_id, request.appointment_date, request.appointment_time
        );

        access::verify_secretary_access(&self.db, &actor.id, request.clinic_id, auth_token).await?;

        let patient = crate::services::queries::patient_profile_by_id(
            &self.db,
            request.patient_profile_id,
            auth_token,
        )
        .await?;

        let context = self
            .resolve_context(
                request.clinic_id,
                request.service_type_id,
                request.appointment_date,
                request.appointment_time,
                patient,
                None,
                request.notes,
                request.symptoms,
                BookedBy::Secretary,
                actor.id.clone(),
                auth_token,
            )
            .await?;

        self.sequence_and_insert(context, auth_token).await
    }

    /// The precondition pipeline of the booking contract, in order, each
    /// failing fast before any write. `booked_for_target` is the family
    /// member a patient is booking for; its membership check runs last.
    #[allow(clippy::too_many_arguments)]
    async fn resolve_context(
        &self,
        clinic_id: Uuid,
        service_type_id: Uuid,
        date: NaiveDate,
        time: String,
        payer: PatientProfileRow,
        booked_for_target: Option<Uuid>,
        notes: Option<String>,
        symptoms: Option<String>,
        booked_by: BookedBy,
        booked_by_id: String,
        auth_token: &str,
    ) -> Result<BookingContext, AppointmentError> {
        // Clinic must exist and be active, its doctor approved.
        let clinics: Vec<ClinicRow> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/clinics?id=eq.{}", clinic_id),
                Some(auth_token),
                None,
            )
            .await?;
        let clinic = clinics
            .into_iter()
            .next()
            .filter(|c| c.is_active)
            .ok_or(AppointmentError::ClinicNotFound)?;

        let doctors: Vec<DoctorProfileRow> = self
            .db
            .request(
                Method::GET,
                &format!("/rest/v1/doctor_profiles?id=eq.{}", clinic.doctor_profile_id),
                Some(auth_token),
                None,
            )
            .await?;
        let doctor = doctors
            .into_iter()
            .next()
            .filter(|d| d.status == DOCTOR_APPROVED_STATUS)
            .ok_or(AppointmentError::DoctorNotAvailable)?;

        // Service must belong to this clinic and be active.
        let services: Vec<ServiceTypeRow> = self
            .db
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/clinic_service_types?id=eq.{}&clinic_id=eq.{}&is_active=eq.true",
                    service_type_id, clinic_id
                ),
                Some(auth_token),
                None,
            )
            .await?;
        let service = services
            .into_iter()
            .next()
            .ok_or(AppointmentError::ServiceNotActive)?;

        parse_hhmm(&time).map_err(|_| AppointmentError::InvalidTimeFormat(time.clone()))?;

        // Date-only comparison; the date column has no time component.
        let today = Utc::now().date_naive();
        if date < today {
            return Err(AppointmentError::PastBooking);
        }

        let day = DayOfWeek::from(date.weekday());
        if self
            .availability
            .active_schedule_for_day(clinic_id, day, auth_token)
            .await?
            .is_none()
        {
            return Err(AppointmentError::ClinicClosed);
        }

        // Advisory pre-check; the storage constraint is the authority.
        if self.slot_is_taken(clinic_id, date, &time, auth_token).await? {
            return Err(AppointmentError::SlotAlreadyBooked);
        }

        let booked_for = match booked_for_target {
            Some(target) if target != payer.id => {
                self.family_member(payer.id, target, auth_token).await?
            }
            _ => payer.clone(),
        };

        Ok(BookingContext {
            clinic,
            doctor,
            service,
            payer,
            booked_for,
            date,
            time,
            notes,
            symptoms,
            booked_by,
            booked_by_id,
        })
    }

    /// Assign ordinals and insert. Ordinals come from fresh reads; the unique
    /// indexes arbitrate when concurrent writers pick the same value. Losing
    /// a sequence ordinal is retried with re-read values; losing the slot is
    /// final.
    async fn sequence_and_insert(
        &self,
        context: BookingContext,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        for attempt in 1..=MAX_SEQUENCE_ATTEMPTS {
            let queue_number = self
                .next_queue_number(context.clinic.id, context.date, auth_token)
                .await?;
            let booking_number = self.next_booking_number(auth_token).await?;

            debug!(
                "Booking attempt {}: queue {} number {}",
                attempt, queue_number, booking_number
            );

            let body = json!({
                "booking_number": booking_number,
                "clinic_id": context.clinic.id,
                "doctor_profile_id": context.doctor.id,
                "patient_profile_id": context.payer.id,
                "booked_for_patient_id": context.booked_for.id,
                "service_type_id": context.service.id,
                "appointment_date": context.date.format("%Y-%m-%d").to_string(),
                "appointment_time": context.time,
                "queue_number": queue_number,
                "status": "PENDING",
                "payment_status": "PENDING",
                // Snapshot fields: a point-in-time receipt, never re-derived.
                "patient_name": context.booked_for.full_name,
                "patient_age": context.booked_for.age,
                "service_name": context.service.name,
                "price": context.service.price,
                "patient_notes": context.notes,
                "symptoms": context.symptoms,
                "booked_by": context.booked_by,
                "booked_by_id": context.booked_by_id,
            });

            let inserted: Result<Vec<Appointment>, DbError> = self
                .db
                .insert("/rest/v1/appointments", Some(auth_token), body)
                .await;

            match inserted {
                Ok(mut rows) => {
                    if rows.is_empty() {
                        return Err(AppointmentError::Database(
                            "insert returned no representation".to_string(),
                        ));
                    }
                    let appointment = rows.swap_remove(0);
                    info!(
                        "Appointment {} booked: {} queue {} at {} {}",
                        appointment.id,
                        appointment.booking_number,
                        appointment.queue_number,
                        appointment.appointment_date,
                        appointment.appointment_time
                    );
                    self.notify_booked(&context, &appointment);
                    return Ok(appointment);
                }
                Err(DbError::Conflict { constraint, .. }) => {
                    if constraint == SLOT_CONSTRAINT {
                        warn!(
                            "Slot {} {} at clinic {} lost to a concurrent booking",
                            context.date, context.time, context.clinic.id
                        );
                        return Err(AppointmentError::SlotAlreadyBooked);
                    }
                    if constraint == QUEUE_CONSTRAINT || constraint == BOOKING_NUMBER_CONSTRAINT {
                        debug!("Sequence collision on {}, retrying", constraint);
                        continue;
                    }
                    return Err(AppointmentError::Database(format!(
                        "unexpected constraint violation: {}",
                        constraint
                    )));
                }
                Err(other) => return Err(other.into()),
            }
        }

        warn!("Booking gave up after {} sequence collisions", MAX_SEQUENCE_ATTEMPTS);
        Err(AppointmentError::SequenceContention)
    }

    async fn family_member(
        &self,
        head_profile_id: Uuid,
        member_profile_id: Uuid,
        auth_token: &str,
    ) -> Result<PatientProfileRow, AppointmentError> {
        let mut rows: Vec<PatientProfileRow> = self
            .db
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/patient_profiles?id=eq.{}&family_head_id=eq.{}",
                    member_profile_id, head_profile_id
                ),
                Some(auth_token),
                None,
            )
            .await?;

        if rows.is_empty() {
            return Err(AppointmentError::NotYourFamilyMember);
        }
        Ok(rows.swap_remove(0))
    }

    async fn slot_is_taken(
        &self,
        clinic_id: Uuid,
        date: NaiveDate,
        time: &str,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?clinic_id=eq.{}&appointment_date=eq.{}&appointment_time=eq.{}&status=in.(PENDING,CONFIRMED)&select=id",
            clinic_id,
            date.format("%Y-%m-%d"),
            urlencoding::encode(time)
        );
        let rows: Vec<IdRow> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;
        Ok(!rows.is_empty())
    }

    /// Queue numbers run 1, 2, 3... per clinic per day, in booking order.
    async fn next_queue_number(
        &self,
        clinic_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<i32, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?clinic_id=eq.{}&appointment_date=eq.{}&select=queue_number&order=queue_number.desc&limit=1",
            clinic_id,
            date.format("%Y-%m-%d")
        );
        let rows: Vec<QueueNumberRow> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(rows.first().map(|r| r.queue_number).unwrap_or(0) + 1)
    }

    /// Booking numbers are a system-wide daily sequence stamped with the
    /// creation date: APT-YYYYMMDD-NNN.
    async fn next_booking_number(&self, auth_token: &str) -> Result<String, AppointmentError> {
        let today = Utc::now().date_naive();
        let start_of_day = format!("{}T00:00:00Z", today.format("%Y-%m-%d"));
        let path = format!(
            "/rest/v1/appointments?created_at=gte.{}&select=id",
            urlencoding::encode(&start_of_day)
        );
        let rows: Vec<IdRow> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(format_booking_number(today, rows.len() as u32 + 1))
    }

    fn notify_booked(&self, context: &BookingContext, appointment: &Appointment) {
        let Some(phone) = context.payer.phone_number.clone() else {
            return;
        };

        self.notifications.dispatch(NotificationPayload::appointment_booked(
            &phone,
            &appointment.patient_name,
            &context.doctor.full_name,
            &context.clinic.name.en,
            &appointment.appointment_date.format("%Y-%m-%d").to_string(),
            &appointment.appointment_time,
            appointment.queue_number,
        ));
    }
}

fn format_booking_number(date: NaiveDate, daily_ordinal: u32) -> String {
    format!(
        "{}-{}-{:03}",
        BOOKING_NUMBER_PREFIX,
        date.format("%Y%m%d"),
        daily_ordinal
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_number_layout() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(format_booking_number(date, 1), "APT-20250602-001");
        assert_eq!(format_booking_number(date, 42), "APT-20250602-042");
        assert_eq!(format_booking_number(date, 137), "APT-20250602-137");
    }

    #[test]
    fn booking_number_matches_expected_pattern() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let number = format_booking_number(date, 7);
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "APT");
        assert_eq!(parts[1], "20241231");
        assert_eq!(parts[2].len(), 3);
    }
}
