use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub notes_encryption_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            notes_encryption_key: "test-notes-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            supabase_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            notes_encryption_key: self.notes_encryption_key.clone(),
            sms_gateway_url: String::new(),
            sms_enabled: false,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn secretary(email: &str) -> Self {
        Self::new(email, "secretary")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: self.role.parse::<Role>().ok(),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows matching the booking core's tables.
pub struct MockDbResponses;

impl MockDbResponses {
    pub fn patient_profile_row(
        profile_id: &str,
        user_id: &str,
        full_name: &str,
        family_head_id: Option<&str>,
    ) -> serde_json::Value {
        json!({
            "id": profile_id,
            "user_id": user_id,
            "full_name": full_name,
            "phone_number": "+201001234567",
            "age": 34,
            "family_head_id": family_head_id,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn clinic_row(clinic_id: &str, doctor_profile_id: &str, is_active: bool) -> serde_json::Value {
        json!({
            "id": clinic_id,
            "name": { "ar": "عيادة الاختبار", "en": "Test Clinic" },
            "doctor_profile_id": doctor_profile_id,
            "is_active": is_active,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_profile_row(profile_id: &str, user_id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": profile_id,
            "user_id": user_id,
            "full_name": "Dr. Test",
            "status": status,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn service_type_row(
        service_id: &str,
        clinic_id: &str,
        price: f64,
        is_active: bool,
    ) -> serde_json::Value {
        json!({
            "id": service_id,
            "clinic_id": clinic_id,
            "name": { "ar": "كشف", "en": "Consultation" },
            "price": price,
            "is_active": is_active,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn schedule_row(
        schedule_id: &str,
        clinic_id: &str,
        day_of_week: &str,
        slot_duration: i32,
    ) -> serde_json::Value {
        json!({
            "id": schedule_id,
            "clinic_id": clinic_id,
            "day_of_week": day_of_week,
            "shifts": [
                { "start_time": "09:00", "end_time": "12:00", "break_time": null }
            ],
            "slot_duration": slot_duration,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn secretary_assignment_row(user_id: &str, clinic_id: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "clinic_id": clinic_id,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(
        appointment_id: &str,
        clinic_id: &str,
        status: &str,
        date: &str,
        time: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "booking_number": "APT-20250101-001",
            "clinic_id": clinic_id,
            "doctor_profile_id": Uuid::new_v4(),
            "patient_profile_id": Uuid::new_v4(),
            "booked_for_patient_id": Uuid::new_v4(),
            "service_type_id": Uuid::new_v4(),
            "appointment_date": date,
            "appointment_time": time,
            "queue_number": 1,
            "status": status,
            "payment_status": "PENDING",
            "payment_method": null,
            "patient_name": "Test Patient",
            "patient_age": 34,
            "service_name": { "ar": "كشف", "en": "Consultation" },
            "price": 250.0,
            "patient_notes": null,
            "symptoms": null,
            "diagnosis_encrypted": null,
            "prescription_encrypted": null,
            "doctor_notes_encrypted": null,
            "cancellation_reason": null,
            "cancelled_by_id": null,
            "cancelled_at": null,
            "completed_at": null,
            "booked_by": "patient",
            "booked_by_id": Uuid::new_v4(),
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "code": code,
            "message": message
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::secretary("sec@example.com");
        assert_eq!(user.email, "sec@example.com");
        assert_eq!(user.role, "secretary");

        let user_model = user.to_user();
        assert_eq!(user_model.role, Some(Role::Secretary));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let secret = "test-secret";
        let token = JwtTestUtils::create_test_token(&user, secret, Some(1));

        assert!(token.contains('.'));
        assert_eq!(token.split('.').count(), 3);
    }
}
