// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::{NotificationPayload, NotificationService};
use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_models::auth::{Role, User};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, UpdatePaymentRequest, UpdateStatusRequest,
};
use crate::services::access;
use crate::services::queries::fetch_appointment;

/// The whole status policy as data: which targets a role may move an
/// appointment to from a given state. Terminal states have no rows for any
/// role. The doctor's set is the widest; the secretary's is a deliberate
/// subset (no NO_SHOW, no COMPLETED); patients may only cancel their own.
pub fn allowed_targets(role: Role, from: AppointmentStatus) -> &'static [AppointmentStatus] {
    use AppointmentStatus::*;

    match (role, from) {
        (Role::Doctor, Pending) => &[Confirmed, Cancelled],
        (Role::Doctor, Confirmed) => &[CheckedIn, Cancelled, NoShow],
        (Role::Doctor, CheckedIn) => &[Completed],

        (Role::Secretary, Pending) => &[Confirmed, Cancelled],
        (Role::Secretary, Confirmed) => &[CheckedIn, Cancelled],

        (Role::Patient, Pending) => &[Cancelled],
        (Role::Patient, Confirmed) => &[Cancelled],

        _ => &[],
    }
}

pub fn validate_transition(
    role: Role,
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if allowed_targets(role, from).contains(&to) {
        Ok(())
    } else {
        warn!("Rejected transition {} -> {} for {}", from, to, role);
        Err(AppointmentError::InvalidStatusTransition { from, to, role })
    }
}

pub struct AppointmentLifecycleService {
    db: Arc<PostgrestClient>,
    notifications: NotificationService,
}

impl AppointmentLifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: Arc::new(PostgrestClient::new(config)),
            notifications: NotificationService::new(config),
        }
    }

    /// Apply a status change for any actor. Authorization comes first, then
    /// the transition table, then a guarded write that only lands if the
    /// persisted status is still the one we validated against.
    pub async fn update_status(
        &self,
        actor: &User,
        appointment_id: Uuid,
        request: UpdateStatusRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let role = actor
            .role
            .ok_or(AppointmentError::NotYourAppointment)?;

        let appointment = fetch_appointment(&self.db, appointment_id, auth_token).await?;

        self.authorize(actor, role, &appointment, auth_token).await?;

        validate_transition(role, appointment.status, request.status)?;

        let updated = self
            .apply_transition(&appointment, role, actor, &request, auth_token)
            .await?;

        self.notify_transition(&updated, request.cancellation_reason.as_deref(), auth_token)
            .await;

        info!(
            "Appointment {} moved {} -> {} by {} {}",
            appointment_id, appointment.status, updated.status, role, actor.id
        );
        Ok(updated)
    }

    /// Payment state is orthogonal to the status machine: doctor or secretary
    /// may set any value at any appointment status.
    pub async fn update_payment(
        &self,
        actor: &User,
        appointment_id: Uuid,
        request: UpdatePaymentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let role = actor.role.ok_or(AppointmentError::NotYourAppointment)?;

        let appointment = fetch_appointment(&self.db, appointment_id, auth_token).await?;

        match role {
            Role::Doctor => {
                access::verify_doctor_ownership(&self.db, &actor.id, appointment.clinic_id, auth_token)
                    .await?
            }
            Role::Secretary => {
                access::verify_secretary_access(&self.db, &actor.id, appointment.clinic_id, auth_token)
                    .await?
            }
            _ => return Err(AppointmentError::NotYourAppointment),
        }

        let body = json!({
            "payment_status": request.payment_status,
            "payment_method": request.payment_method,
        });

        let mut updated: Vec<Appointment> = self
            .db
            .update(
                &format!("/rest/v1/appointments?id=eq.{}", appointment_id),
                Some(auth_token),
                body,
            )
            .await?;

        if updated.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        info!(
            "Appointment {} payment set to {:?} by {}",
            appointment_id, request.payment_status, actor.id
        );
        Ok(updated.swap_remove(0))
    }

    async fn authorize(
        &self,
        actor: &User,
        role: Role,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        match role {
            Role::Doctor => {
                access::verify_doctor_ownership(&self.db, &actor.id, appointment.clinic_id, auth_token)
                    .await
            }
            Role::Secretary => {
                access::verify_secretary_access(&self.db, &actor.id, appointment.clinic_id, auth_token)
                    .await
            }
            Role::Patient => {
                let scope = access::patient_scope(&self.db, &actor.id, auth_token).await?;
                if scope.contains(&appointment.booked_for_patient_id) {
                    Ok(())
                } else {
                    Err(AppointmentError::NotYourAppointment)
                }
            }
            Role::Admin => Err(AppointmentError::NotYourAppointment),
        }
    }

    /// Guarded write: the filter pins the status we validated, so two racing
    /// transitions cannot both land. The loser sees the fresh status in an
    /// InvalidStatusTransition instead of silently clobbering the winner.
    async fn apply_transition(
        &self,
        appointment: &Appointment,
        role: Role,
        actor: &User,
        request: &UpdateStatusRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut body = serde_json::Map::new();
        body.insert("status".to_string(), json!(request.status));

        if request.status == AppointmentStatus::Cancelled {
            body.insert(
                "cancellation_reason".to_string(),
                json!(request.cancellation_reason),
            );
            body.insert("cancelled_by_id".to_string(), json!(actor.id));
            body.insert("cancelled_at".to_string(), json!(Utc::now()));
        }

        if request.status == AppointmentStatus::Completed {
            body.insert("completed_at".to_string(), json!(Utc::now()));
        }

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment.id, appointment.status
        );

        let mut updated: Vec<Appointment> = self
            .db
            .update(&path, Some(auth_token), serde_json::Value::Object(body))
            .await?;

        if updated.is_empty() {
            // Lost the race: someone else moved the row first.
            let fresh = fetch_appointment(&self.db, appointment.id, auth_token).await?;
            debug!(
                "Guarded transition on {} lost race, status now {}",
                appointment.id, fresh.status
            );
            return Err(AppointmentError::InvalidStatusTransition {
                from: fresh.status,
                to: request.status,
                role,
            });
        }

        Ok(updated.swap_remove(0))
    }

    async fn notify_transition(
        &self,
        appointment: &Appointment,
        reason: Option<&str>,
        auth_token: &str,
    ) {
        // Notification context is best-effort; a missing profile or phone
        // must never fail the transition itself.
        let Ok(profile) = crate::services::queries::patient_profile_by_id(
            &self.db,
            appointment.booked_for_patient_id,
            auth_token,
        )
        .await
        else {
            return;
        };
        let Some(phone) = profile.phone_number else {
            return;
        };

        let doctor_name = crate::services::queries::doctor_name_for_clinic(
            &self.db,
            appointment.clinic_id,
            auth_token,
        )
        .await
        .unwrap_or_default();

        let date = appointment.appointment_date.format("%Y-%m-%d").to_string();

        let payload = match appointment.status {
            AppointmentStatus::Confirmed => Some(NotificationPayload::appointment_confirmed(
                &phone,
                &appointment.patient_name,
                &doctor_name,
                &date,
                &appointment.appointment_time,
            )),
            AppointmentStatus::Cancelled => Some(NotificationPayload::appointment_cancelled(
                &phone,
                &appointment.patient_name,
                &doctor_name,
                &date,
                reason,
            )),
            _ => None,
        };

        if let Some(payload) = payload {
            self.notifications.dispatch(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    const ALL_STATUSES: [AppointmentStatus; 6] =
        [Pending, Confirmed, CheckedIn, Completed, Cancelled, NoShow];
    const ALL_ROLES: [Role; 4] = [Role::Patient, Role::Doctor, Role::Secretary, Role::Admin];

    #[test]
    fn doctor_transitions_match_policy() {
        assert_eq!(allowed_targets(Role::Doctor, Pending), &[Confirmed, Cancelled]);
        assert_eq!(
            allowed_targets(Role::Doctor, Confirmed),
            &[CheckedIn, Cancelled, NoShow]
        );
        assert_eq!(allowed_targets(Role::Doctor, CheckedIn), &[Completed]);
    }

    #[test]
    fn secretary_is_a_subset_of_doctor() {
        for from in ALL_STATUSES {
            let doctor = allowed_targets(Role::Doctor, from);
            for target in allowed_targets(Role::Secretary, from) {
                assert!(
                    doctor.contains(target),
                    "secretary may {from} -> {target} but doctor may not"
                );
            }
        }
    }

    #[test]
    fn secretary_lacks_no_show_and_completed() {
        assert!(!allowed_targets(Role::Secretary, Confirmed).contains(&NoShow));
        assert!(allowed_targets(Role::Secretary, CheckedIn).is_empty());
    }

    #[test]
    fn patient_may_only_cancel() {
        for from in ALL_STATUSES {
            for target in allowed_targets(Role::Patient, from) {
                assert_eq!(*target, Cancelled);
            }
        }
        assert_eq!(allowed_targets(Role::Patient, Pending), &[Cancelled]);
        assert_eq!(allowed_targets(Role::Patient, Confirmed), &[Cancelled]);
    }

    #[test]
    fn terminal_states_have_no_exits_for_any_role() {
        for role in ALL_ROLES {
            for from in [Completed, Cancelled, NoShow] {
                assert!(
                    allowed_targets(role, from).is_empty(),
                    "{role} escapes terminal {from}"
                );
            }
        }
    }

    #[test]
    fn admin_has_no_transitions() {
        for from in ALL_STATUSES {
            assert!(allowed_targets(Role::Admin, from).is_empty());
        }
    }

    #[test]
    fn every_pair_outside_the_table_is_rejected() {
        for role in ALL_ROLES {
            for from in ALL_STATUSES {
                for to in ALL_STATUSES {
                    let allowed = allowed_targets(role, from).contains(&to);
                    let result = validate_transition(role, from, to);
                    assert_eq!(result.is_ok(), allowed, "{role}: {from} -> {to}");
                }
            }
        }
    }

    #[test]
    fn rejection_names_the_attempted_pair() {
        let err = validate_transition(Role::Secretary, Confirmed, NoShow).unwrap_err();
        match err {
            AppointmentError::InvalidStatusTransition { from, to, role } => {
                assert_eq!(from, Confirmed);
                assert_eq!(to, NoShow);
                assert_eq!(role, Role::Secretary);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
