use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param_contains};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, MockDbResponses, TestConfig, TestUser};

fn test_app(config: &TestConfig) -> Router {
    appointment_routes(config.to_arc())
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn status_request(appointment_id: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(format!("/{}/status", appointment_id))
        .header("Authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Doctor-owned appointment in the given status, with ownership lookups
/// mocked so authorization passes.
async fn doctor_fixture(
    server: &MockServer,
    doctor: &TestUser,
    appointment_id: &str,
    status: &str,
) -> Value {
    let clinic_id = Uuid::new_v4().to_string();
    let doctor_profile_id = Uuid::new_v4().to_string();

    let row = {
        let mut row = MockDbResponses::appointment_row(
            appointment_id,
            &clinic_id,
            status,
            "2025-06-02",
            "09:30",
        );
        row["doctor_profile_id"] = json!(doctor_profile_id);
        row
    };

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param_contains("id", "eq."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDbResponses::doctor_profile_row(&doctor_profile_id, &doctor.id, "APPROVED")
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDbResponses::clinic_row(&clinic_id, &doctor_profile_id, true)
        ])))
        .mount(server)
        .await;

    // Notification context lookup; no profile means no notification.
    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;

    row
}

#[tokio::test]
async fn doctor_confirms_pending_appointment() {
    let server = MockServer::start().await;
    let config = TestConfig::with_base_url(&server.uri());
    let doctor = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let appointment_id = Uuid::new_v4().to_string();
    let mut confirmed = doctor_fixture(&server, &doctor, &appointment_id, "PENDING").await;
    confirmed["status"] = json!("CONFIRMED");

    // The guarded update pins the status the transition was validated from.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param_contains("status", "eq.PENDING"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([confirmed])))
        .expect(1)
        .mount(&server)
        .await;

    let response = test_app(&config)
        .oneshot(status_request(
            &appointment_id,
            &token,
            json!({ "status": "CONFIRMED" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appointment"]["status"], "CONFIRMED");
}

#[tokio::test]
async fn completing_a_checked_in_visit_stamps_completed_at() {
    let server = MockServer::start().await;
    let config = TestConfig::with_base_url(&server.uri());
    let doctor = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let appointment_id = Uuid::new_v4().to_string();
    let mut completed = doctor_fixture(&server, &doctor, &appointment_id, "CHECKED_IN").await;
    completed["status"] = json!("COMPLETED");
    completed["completed_at"] = json!("2025-06-02T10:05:00Z");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param_contains("status", "eq.CHECKED_IN"))
        .and(wiremock::matchers::body_partial_json(json!({ "status": "COMPLETED" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([completed])))
        .expect(1)
        .mount(&server)
        .await;

    let response = test_app(&config)
        .oneshot(status_request(
            &appointment_id,
            &token,
            json!({ "status": "COMPLETED" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appointment"]["status"], "COMPLETED");
    assert!(!body["appointment"]["completed_at"].is_null());
}

#[tokio::test]
async fn completed_appointment_is_terminal() {
    let server = MockServer::start().await;
    let config = TestConfig::with_base_url(&server.uri());
    let doctor = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let appointment_id = Uuid::new_v4().to_string();
    doctor_fixture(&server, &doctor, &appointment_id, "COMPLETED").await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    for target in ["PENDING", "CONFIRMED", "CHECKED_IN", "CANCELLED", "NO_SHOW"] {
        let response = test_app(&config)
            .oneshot(status_request(
                &appointment_id,
                &token,
                json!({ "status": target }),
            ))
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "COMPLETED -> {target} must be rejected"
        );
    }
}

#[tokio::test]
async fn secretary_cannot_mark_no_show() {
    let server = MockServer::start().await;
    let config = TestConfig::with_base_url(&server.uri());
    let secretary = TestUser::secretary("sec@example.com");
    let token = JwtTestUtils::create_test_token(&secretary, &config.jwt_secret, Some(1));

    let appointment_id = Uuid::new_v4().to_string();
    let clinic_id = Uuid::new_v4().to_string();

    let row = MockDbResponses::appointment_row(
        &appointment_id,
        &clinic_id,
        "CONFIRMED",
        "2025-06-02",
        "09:30",
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_secretaries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDbResponses::secretary_assignment_row(&secretary.id, &clinic_id)
        ])))
        .mount(&server)
        .await;

    // The table says no; the stored row must not be touched.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let response = test_app(&config)
        .oneshot(status_request(
            &appointment_id,
            &token,
            json!({ "status": "NO_SHOW" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patient_cannot_cancel_a_strangers_appointment() {
    let server = MockServer::start().await;
    let config = TestConfig::with_base_url(&server.uri());
    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    let appointment_id = Uuid::new_v4().to_string();
    let own_profile_id = Uuid::new_v4().to_string();

    // Appointment booked for someone outside the caller's family scope.
    let row = MockDbResponses::appointment_row(
        &appointment_id,
        &Uuid::new_v4().to_string(),
        "PENDING",
        "2025-06-02",
        "09:30",
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_profiles"))
        .and(query_param_contains("user_id", "eq."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDbResponses::patient_profile_row(&own_profile_id, &patient.id, "Test Patient", None)
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_profiles"))
        .and(query_param_contains("family_head_id", "eq."))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/{}/cancel", appointment_id))
        .header("Authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "reason": "change of plans" }).to_string()))
        .unwrap();

    let response = test_app(&config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn lost_transition_race_surfaces_fresh_status() {
    let server = MockServer::start().await;
    let config = TestConfig::with_base_url(&server.uri());
    let doctor = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let appointment_id = Uuid::new_v4().to_string();
    let clinic_id = Uuid::new_v4().to_string();
    let doctor_profile_id = Uuid::new_v4().to_string();

    let pending = {
        let mut row = MockDbResponses::appointment_row(
            &appointment_id,
            &clinic_id,
            "PENDING",
            "2025-06-02",
            "09:30",
        );
        row["doctor_profile_id"] = json!(doctor_profile_id);
        row
    };
    let mut cancelled = pending.clone();
    cancelled["status"] = json!("CANCELLED");

    // First read sees PENDING; after the guarded write matches nothing, the
    // re-read shows the concurrent cancellation.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pending])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDbResponses::doctor_profile_row(&doctor_profile_id, &doctor.id, "APPROVED")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDbResponses::clinic_row(&clinic_id, &doctor_profile_id, true)
        ])))
        .mount(&server)
        .await;

    // Guarded update matched zero rows: the pinned status is stale.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let response = test_app(&config)
        .oneshot(status_request(
            &appointment_id,
            &token,
            json!({ "status": "CONFIRMED" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("CANCELLED"), "got: {message}");
}

#[tokio::test]
async fn payment_updates_are_free_of_the_status_machine() {
    let server = MockServer::start().await;
    let config = TestConfig::with_base_url(&server.uri());
    let secretary = TestUser::secretary("sec@example.com");
    let token = JwtTestUtils::create_test_token(&secretary, &config.jwt_secret, Some(1));

    let appointment_id = Uuid::new_v4().to_string();
    let clinic_id = Uuid::new_v4().to_string();

    // Already COMPLETED: payment may still move, e.g. to REFUNDED.
    let mut row = MockDbResponses::appointment_row(
        &appointment_id,
        &clinic_id,
        "COMPLETED",
        "2025-06-02",
        "09:30",
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_secretaries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDbResponses::secretary_assignment_row(&secretary.id, &clinic_id)
        ])))
        .mount(&server)
        .await;

    row["payment_status"] = json!("REFUNDED");
    row["payment_method"] = json!("cash");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(wiremock::matchers::body_partial_json(
            json!({ "payment_status": "REFUNDED", "payment_method": "cash" }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/{}/payment", appointment_id))
        .header("Authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "payment_status": "REFUNDED", "payment_method": "cash" }).to_string(),
        ))
        .unwrap();

    let response = test_app(&config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appointment"]["payment_status"], "REFUNDED");
}
