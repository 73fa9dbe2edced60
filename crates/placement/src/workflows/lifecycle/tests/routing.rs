use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::config::CounterConfig;
use crate::workflows::lifecycle::domain::{ApplicationStatus, RoundOutcome};
use crate::workflows::lifecycle::router::application_handler;
use crate::workflows::lifecycle::{lifecycle_router, LifecycleState};
use crate::workflows::memory::MemoryInternshipCatalog;

#[tokio::test]
async fn open_route_creates_application_for_caller() {
    let (state, _) = build_lifecycle();
    let router = lifecycle_router(state);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/applications",
            Some("stu-ada"),
            json!({ "internship_id": "int-backend-2026" }),
        ))
        .await
        .unwrap();

    assert_status(&response, StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["student_id"], "stu-ada");
    assert_eq!(body["status"], "form_pending");
    assert_eq!(body["current_round"], 0);
}

#[tokio::test]
async fn open_route_requires_identity() {
    let (state, _) = build_lifecycle();
    let response = lifecycle_router(state)
        .oneshot(json_request(
            "POST",
            "/api/v1/applications",
            None,
            json!({ "internship_id": "int-backend-2026" }),
        ))
        .await
        .unwrap();

    assert_status(&response, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_application_conflicts() {
    let (state, _) = build_lifecycle();
    open(&state, "ada").await;

    let response = lifecycle_router(state)
        .oneshot(json_request(
            "POST",
            "/api/v1/applications",
            Some("stu-ada"),
            json!({ "internship_id": "int-backend-2026" }),
        ))
        .await
        .unwrap();

    assert_status(&response, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_application_is_not_found() {
    let (state, _) = build_lifecycle();
    let response = lifecycle_router(state)
        .oneshot(get_request("/api/v1/applications/app-missing"))
        .await
        .unwrap();

    assert_status(&response, StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "application app-missing not found");
}

#[tokio::test]
async fn round_route_records_evaluator_from_identity() {
    let (state, _) = build_lifecycle();
    let record = open(&state, "ada").await;

    let response = lifecycle_router(state)
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/applications/{}/rounds", record.id),
            Some("fac-turing"),
            json!({
                "target_status": "form_approved",
                "round_number": 1,
                "outcome": "passed",
                "feedback": "strong portfolio"
            }),
        ))
        .await
        .unwrap();

    assert_status(&response, StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["record"]["status"], "form_approved");
    assert_eq!(body["record"]["rounds"][0]["evaluated_by"], "fac-turing");
    assert_eq!(body["projection_failures"], json!([]));
}

#[tokio::test]
async fn round_route_ignores_evaluator_claimed_in_body() {
    let (state, _) = build_lifecycle();
    let record = open(&state, "ada").await;

    let response = lifecycle_router(state.clone())
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/applications/{}/rounds", record.id),
            Some("fac-turing"),
            json!({
                "target_status": "form_approved",
                "round_number": 1,
                "outcome": "passed",
                "evaluator_id": "fac-hopper"
            }),
        ))
        .await
        .unwrap();

    assert_status(&response, StatusCode::OK);
    let stored = state
        .coordinator
        .application(&record.id)
        .await
        .expect("application stored");
    let round = stored.round(1).expect("round recorded");
    assert_eq!(
        round.evaluated_by.as_ref().map(|evaluator| evaluator.0.as_str()),
        Some("fac-turing")
    );
}

#[tokio::test]
async fn invalid_transition_is_unprocessable() {
    let (state, _) = build_lifecycle();
    let record = open(&state, "ada").await;

    let response = lifecycle_router(state)
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/applications/{}/rounds", record.id),
            Some("fac-turing"),
            json!({
                "target_status": "quiz_completed",
                "round_number": 2,
                "outcome": "passed"
            }),
        ))
        .await
        .unwrap();

    assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn offer_acceptance_by_another_student_is_forbidden() {
    let (state, _) = build_lifecycle();
    let record = open(&state, "ada").await;
    for (status, round) in [
        (ApplicationStatus::FormApproved, 1),
        (ApplicationStatus::Selected, 2),
    ] {
        state
            .coordinator
            .apply_round_outcome(&record.id, evaluation(status, round, RoundOutcome::Passed))
            .await
            .expect("transition allowed");
    }
    let router = lifecycle_router(state);
    let uri = format!("/api/v1/applications/{}/offer/accept", record.id);

    let forbidden = router
        .clone()
        .oneshot(json_request("POST", &uri, Some("stu-mallory"), json!({})))
        .await
        .unwrap();
    assert_status(&forbidden, StatusCode::FORBIDDEN);

    let accepted = router
        .oneshot(json_request("POST", &uri, Some("stu-ada"), json!({})))
        .await
        .unwrap();
    assert_status(&accepted, StatusCode::OK);
    let body = read_json_body(accepted).await;
    assert_eq!(body["record"]["status"], "offer_accepted");
}

#[tokio::test]
async fn counter_and_summary_routes_expose_projections() {
    let (state, _) = build_lifecycle();
    let record = open(&state, "ada").await;
    state
        .coordinator
        .apply_round_outcome(
            &record.id,
            evaluation(ApplicationStatus::FormApproved, 1, RoundOutcome::Passed),
        )
        .await
        .expect("approved");
    let router = lifecycle_router(state);

    let counters = router
        .clone()
        .oneshot(get_request(
            "/api/v1/internships/int-backend-2026/rounds/1/counters",
        ))
        .await
        .unwrap();
    assert_status(&counters, StatusCode::OK);
    let body = read_json_body(counters).await;
    assert_eq!(body["total_applicants"], 1);
    assert_eq!(body["passed"], 1);

    let summaries = router
        .clone()
        .oneshot(get_request("/api/v1/students/stu-ada/summaries"))
        .await
        .unwrap();
    assert_status(&summaries, StatusCode::OK);
    let body = read_json_body(summaries).await;
    assert_eq!(body[0]["company_name"], "Northwind Labs");

    let applicants = router
        .oneshot(get_request("/api/v1/internships/int-backend-2026/applications"))
        .await
        .unwrap();
    let body = read_json_body(applicants).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn application_handler_returns_internal_error_when_store_is_down() {
    let state = LifecycleState::wire(
        Arc::new(UnavailableStore),
        Arc::new(MemoryInternshipCatalog::default()),
        CounterConfig::default(),
    );

    let response = application_handler::<UnavailableStore, MemoryInternshipCatalog>(
        State(state),
        Path("app-1".to_string()),
    )
    .await;

    assert_status(&response, StatusCode::INTERNAL_SERVER_ERROR);
}
