// Consultation admission flow tests against mocked collaborator endpoints.

use assert_matches::assert_matches;
use tokio_test::assert_ok;
use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use consultation_cell::services::server_clock::client_now_ms;
use consultation_cell::{
    AdmissionOutcome, Appointment, ConsultationError, ConsultationService, CountdownLabel,
    ListView, ServerClock,
};
use shared_config::ClientConfig;

fn config_for(uri: &str) -> ClientConfig {
    ClientConfig {
        backend_base_url: uri.to_string(),
        auth_token: "test-token".to_string(),
        video_base_url: "https://meet.jit.si".to_string(),
        server_tz_offset_minutes: 330,
    }
}

fn tz() -> FixedOffset {
    FixedOffset::east_opt(330 * 60).unwrap()
}

fn server_ms(local: &str) -> i64 {
    let ndt = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S").unwrap();
    tz().from_local_datetime(&ndt)
        .single()
        .unwrap()
        .timestamp_millis()
}

/// A clock whose corrected now sits at the given server-local instant.
fn clock_at(local: &str) -> ServerClock {
    let mut clock = ServerClock::new();
    clock.record_sample(server_ms(local), client_now_ms());
    clock
}

fn appt(value: serde_json::Value) -> Appointment {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_refresh_merges_dashboard_lists_and_annotates() {
    let server = MockServer::start().await;

    // Server now at 09:59, appointment at 10:00 (inside the early grace).
    Mock::given(method("GET"))
        .and(path("/doctor/home_dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "data": {
                "server_now_ms": server_ms("2026-08-26 09:59:00"),
                "doctor_name": "Dr. Rao",
                "doctor_specialization": "Cardiology",
                "today_patients": 4,
                "today_in_progress": [
                    {"id": 1, "public_code": "AB12", "status": "IN_PROGRESS",
                     "scheduled_at": "2026-08-26 09:45:00", "duration_min": 30}
                ],
                "today_upcoming": [
                    {"id": 1, "public_code": "AB12", "status": "SCHEDULED",
                     "scheduled_at": "2026-08-26 09:45:00", "duration_min": 30},
                    {"id": 2, "public_code": "CD34", "status": "SCHEDULED",
                     "scheduled_at": "2026-08-26 10:00:00", "duration_min": 15}
                ]
            }
        })))
        .mount(&server)
        .await;

    let service = ConsultationService::new(&config_for(&server.uri()));
    let outcome = tokio_test::assert_ok!(service.refresh_today(ServerClock::new()).await);

    assert_eq!(outcome.entries.len(), 2);
    // First occurrence (in-progress copy) wins.
    assert_eq!(outcome.entries[0].appointment.id, 1);
    assert_eq!(
        outcome.entries[0].appointment.status.to_string(),
        "IN_PROGRESS"
    );
    assert!(outcome.entries[0].admission.can_start);
    // Upcoming appointment is inside its two-minute grace window.
    assert!(outcome.entries[1].admission.can_start);

    let summary = outcome.summary.unwrap();
    assert_eq!(summary.doctor_name, "Dr. Rao");
    assert_eq!(summary.today_patients, 4);

    // Refresh adopted the server time sample.
    assert!(outcome.clock.has_sample());
}

#[tokio::test]
async fn test_refresh_falls_back_to_generic_list_filtered_to_today() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/doctor/home_dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "data": {"server_now_ms": server_ms("2026-08-26 09:00:00"), "doctor_name": "Dr. Rao"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/doctor/appointments"))
        .and(query_param("view", "ALL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "data": {
                "server_now_ms": server_ms("2026-08-26 09:00:00"),
                "total": 3,
                "items": [
                    {"id": 1, "public_code": "AB12", "scheduled_at": "2026-08-26 10:00:00"},
                    {"id": 2, "public_code": "CD34", "scheduled_at": "2026-08-27 10:00:00"},
                    {"id": 3, "public_code": "EF56", "scheduled_at": "2026-08-26 12:00:00",
                     "status": "CANCELLED"}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = ConsultationService::new(&config_for(&server.uri()));
    let outcome = service.refresh_today(ServerClock::new()).await.unwrap();

    // Tomorrow's and the cancelled appointment are filtered out.
    assert_eq!(outcome.entries.len(), 1);
    assert_eq!(outcome.entries[0].appointment.public_code, "AB12");
}

#[tokio::test]
async fn test_refresh_upcoming_only_dashboard_pulls_in_progress_from_list() {
    let server = MockServer::start().await;

    // The dashboard knows about the upcoming session only; the in-progress
    // session exists solely in the generic appointments list.
    Mock::given(method("GET"))
        .and(path("/doctor/home_dashboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "data": {
                "server_now_ms": server_ms("2026-08-26 10:00:00"),
                "today_upcoming": [
                    {"id": 2, "public_code": "CD34", "status": "SCHEDULED",
                     "scheduled_at": "2026-08-26 11:00:00", "duration_min": 15}
                ]
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/doctor/appointments"))
        .and(query_param("view", "ALL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "data": {
                "server_now_ms": server_ms("2026-08-26 10:00:00"),
                "total": 2,
                "items": [
                    {"id": 1, "public_code": "AB12", "status": "IN_PROGRESS",
                     "scheduled_at": "2026-08-26 09:45:00", "duration_min": 30},
                    {"id": 2, "public_code": "CD34", "status": "SCHEDULED",
                     "scheduled_at": "2026-08-26 11:00:00", "duration_min": 15}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = ConsultationService::new(&config_for(&server.uri()));
    let outcome = tokio_test::assert_ok!(service.refresh_today(ServerClock::new()).await);

    // Both survive; dashboard rows stay ahead and the duplicate is dropped.
    assert_eq!(outcome.entries.len(), 2);
    assert_eq!(outcome.entries[0].appointment.public_code, "CD34");
    assert_eq!(outcome.entries[1].appointment.public_code, "AB12");
    assert_eq!(
        outcome.entries[1].appointment.status.to_string(),
        "IN_PROGRESS"
    );
}

#[tokio::test]
async fn test_refresh_network_failure_degrades_to_empty_state() {
    // Nothing listens on port 1.
    let service = ConsultationService::new(&config_for("http://127.0.0.1:1"));
    let outcome = service.refresh_today(ServerClock::new()).await.unwrap();

    assert!(outcome.entries.is_empty());
    assert!(outcome.summary.is_none());
    assert!(!outcome.clock.has_sample());
}

#[tokio::test]
async fn test_refresh_server_rejection_surfaces_one_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doctor/home_dashboard"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": false, "message": "expired"})),
        )
        .mount(&server)
        .await;

    let service = ConsultationService::new(&config_for(&server.uri()));
    let result = service.refresh_today(ServerClock::new()).await;
    assert_matches!(result, Err(ConsultationError::Server(msg)) if msg == "expired");
}

#[tokio::test]
async fn test_list_consultations_passes_view_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doctor/appointments"))
        .and(query_param("view", "UPCOMING"))
        .and(query_param("q", "asha"))
        .and(query_param("limit", "50"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "data": {
                "server_now_ms": server_ms("2026-08-26 09:00:00"),
                "total": 1,
                "items": [{"id": 7, "public_code": "GH78",
                           "scheduled_at": "2026-08-28 10:00:00"}]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = ConsultationService::new(&config_for(&server.uri()));
    let outcome = service
        .list_consultations(ListView::Upcoming, "asha", 50, 0, ServerClock::new())
        .await
        .unwrap();

    assert_eq!(outcome.entries.len(), 1);
    assert_eq!(outcome.entries[0].appointment.id, 7);
    // Two days out: not startable, minutes-remaining countdown.
    assert!(!outcome.entries[0].admission.can_start);
    assert_matches!(
        outcome.entries[0].admission.countdown,
        CountdownLabel::StartsInMinutes(_)
    );
}

#[tokio::test]
async fn test_admit_resolves_patient_marks_completed_and_plans_video() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/doctor/resolve_patient"))
        .and(body_json(json!({"appointment_key": "AB12"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "data": {"patient_id": 55, "appointment_id": 9}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/doctor/mark_completed"))
        .and(body_json(json!({"appointment_key": "AB12"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let service = ConsultationService::new(&config_for(&server.uri()));
    let appointment = appt(json!({
        "id": 9, "public_code": "AB12", "patient_id": 0,
        "patient_name": "Asha", "consult_type": "VIDEO",
        "status": "SCHEDULED", "scheduled_at": "2026-08-26 10:00:00",
        "duration_min": 15
    }));

    let outcome = service
        .admit(&appointment, &clock_at("2026-08-26 10:00:00"))
        .await
        .unwrap();

    let plan = match outcome {
        AdmissionOutcome::Admitted(plan) => plan,
        other => panic!("expected admission, got {:?}", other),
    };

    // Downstream navigation uses the resolved id, never zero.
    assert_eq!(plan.prescription.patient_id, 55);
    assert_eq!(plan.prescription.appointment_id, 9);
    assert_eq!(plan.prescription.appointment_key, "AB12");
    assert_matches!(
        plan.call,
        Some(consultation_cell::models::CallInvocation::Video { url })
            if url == "https://meet.jit.si/ss_appt_AB12"
    );
}

#[tokio::test]
async fn test_admit_short_circuits_resolution_for_known_patient() {
    let server = MockServer::start().await;

    // The resolver endpoint must never be hit.
    Mock::given(method("POST"))
        .and(path("/doctor/resolve_patient"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/doctor/mark_completed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let service = ConsultationService::new(&config_for(&server.uri()));
    let appointment = appt(json!({
        "id": 9, "public_code": "AB12", "patient_id": 77,
        "consult_type": "PHYSICAL", "status": "SCHEDULED",
        "scheduled_at": "2026-08-26 10:00:00", "duration_min": 15
    }));

    let outcome = service
        .admit(&appointment, &clock_at("2026-08-26 10:05:00"))
        .await
        .unwrap();

    let plan = match outcome {
        AdmissionOutcome::Admitted(plan) => plan,
        other => panic!("expected admission, got {:?}", other),
    };
    assert!(plan.call.is_none());
    assert_eq!(plan.prescription.patient_id, 77);
}

#[tokio::test]
async fn test_admit_aborts_on_missing_patient() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/doctor/resolve_patient"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "data": {"patient_id": 0}
        })))
        .mount(&server)
        .await;

    let service = ConsultationService::new(&config_for(&server.uri()));
    let appointment = appt(json!({
        "id": 9, "public_code": "AB12", "patient_id": 0,
        "consult_type": "VIDEO", "status": "SCHEDULED",
        "scheduled_at": "2026-08-26 10:00:00", "duration_min": 15
    }));

    let result = service
        .admit(&appointment, &clock_at("2026-08-26 10:00:00"))
        .await;
    assert_matches!(result, Err(ConsultationError::MissingPatient));
}

#[tokio::test]
async fn test_admit_proceeds_when_completion_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/doctor/mark_completed"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let service = ConsultationService::new(&config_for(&server.uri()));
    let appointment = appt(json!({
        "id": 9, "public_code": "AB12", "patient_id": 77,
        "consult_type": "PHYSICAL", "status": "IN_PROGRESS",
        "scheduled_at": "2026-08-26 10:00:00", "duration_min": 15
    }));

    let outcome = service
        .admit(&appointment, &clock_at("2026-08-26 10:10:00"))
        .await
        .unwrap();
    assert_matches!(outcome, AdmissionOutcome::Admitted(_));
}

#[tokio::test]
async fn test_admit_outside_window_reports_countdown() {
    let service = ConsultationService::new(&config_for("http://127.0.0.1:1"));
    let appointment = appt(json!({
        "id": 9, "public_code": "AB12", "patient_id": 77,
        "consult_type": "VIDEO", "status": "SCHEDULED",
        "scheduled_at": "2026-08-26 10:00:00", "duration_min": 15
    }));

    // Ten minutes early: outside the two-minute grace, no network touched.
    let outcome = service
        .admit(&appointment, &clock_at("2026-08-26 09:50:00"))
        .await
        .unwrap();
    assert_matches!(
        outcome,
        AdmissionOutcome::NotYet(CountdownLabel::StartsInMinutes(mins)) if mins >= 9 && mins <= 10
    );
}
