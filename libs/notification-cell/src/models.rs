// libs/notification-cell/src/models.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    AppointmentBooked,
    AppointmentConfirmed,
    AppointmentCancelled,
    AppointmentReminder,
}

/// Context the delivery collaborator needs to render the message; copy and
/// localization live on that side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub recipient_phone: String,
    pub recipient_name: String,
    pub data: NotificationData,
}

impl NotificationPayload {
    pub fn appointment_booked(
        phone: &str,
        patient_name: &str,
        doctor_name: &str,
        clinic_name: &str,
        date: &str,
        time: &str,
        queue_number: i32,
    ) -> Self {
        Self {
            notification_type: NotificationType::AppointmentBooked,
            recipient_phone: phone.to_string(),
            recipient_name: patient_name.to_string(),
            data: NotificationData {
                appointment_date: Some(date.to_string()),
                appointment_time: Some(time.to_string()),
                doctor_name: Some(doctor_name.to_string()),
                clinic_name: Some(clinic_name.to_string()),
                queue_number: Some(queue_number),
                reason: None,
            },
        }
    }

    pub fn appointment_confirmed(
        phone: &str,
        patient_name: &str,
        doctor_name: &str,
        date: &str,
        time: &str,
    ) -> Self {
        Self {
            notification_type: NotificationType::AppointmentConfirmed,
            recipient_phone: phone.to_string(),
            recipient_name: patient_name.to_string(),
            data: NotificationData {
                appointment_date: Some(date.to_string()),
                appointment_time: Some(time.to_string()),
                doctor_name: Some(doctor_name.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn appointment_cancelled(
        phone: &str,
        patient_name: &str,
        doctor_name: &str,
        date: &str,
        reason: Option<&str>,
    ) -> Self {
        Self {
            notification_type: NotificationType::AppointmentCancelled,
            recipient_phone: phone.to_string(),
            recipient_name: patient_name.to_string(),
            data: NotificationData {
                appointment_date: Some(date.to_string()),
                doctor_name: Some(doctor_name.to_string()),
                reason: reason.map(String::from),
                ..Default::default()
            },
        }
    }

    pub fn appointment_reminder(
        phone: &str,
        patient_name: &str,
        doctor_name: &str,
        clinic_name: &str,
        date: &str,
        time: &str,
    ) -> Self {
        Self {
            notification_type: NotificationType::AppointmentReminder,
            recipient_phone: phone.to_string(),
            recipient_name: patient_name.to_string(),
            data: NotificationData {
                appointment_date: Some(date.to_string()),
                appointment_time: Some(time.to_string()),
                doctor_name: Some(doctor_name.to_string()),
                clinic_name: Some(clinic_name.to_string()),
                ..Default::default()
            },
        }
    }
}
