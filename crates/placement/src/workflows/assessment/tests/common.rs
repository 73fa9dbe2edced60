use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use serde_json::Value;

use crate::config::{AssessmentConfig, CounterConfig};
use crate::workflows::assessment::domain::{OutcomePolicy, Question, QuestionId};
use crate::workflows::lifecycle::domain::{
    ApplicationRecord, ApplicationStatus, InternshipId, InternshipListing, RoundOutcome,
    StudentId, FORM_ROUND,
};
use crate::workflows::lifecycle::identity::USER_ID_HEADER;
use crate::workflows::lifecycle::RoundEvaluation;
use crate::workflows::memory::{MemoryInternshipCatalog, MemoryQuestionBank, MemoryRecordStore};
use crate::workflows::Placement;

pub(super) type MemoryPlacement =
    Placement<MemoryRecordStore, MemoryInternshipCatalog, MemoryQuestionBank>;

pub(super) struct Harness {
    pub(super) placement: MemoryPlacement,
    pub(super) store: Arc<MemoryRecordStore>,
}

pub(super) fn internship() -> InternshipId {
    InternshipId("int-systems-2026".to_string())
}

pub(super) fn student(name: &str) -> StudentId {
    StudentId(format!("stu-{name}"))
}

pub(super) fn questions() -> Vec<Question> {
    vec![
        Question::multiple_choice(
            "q-binding",
            "Which keyword introduces an immutable binding?",
            &["let", "mut", "static"],
            &["let"],
        ),
        Question::multiple_choice(
            "q-smart-pointer",
            "Which types provide shared ownership?",
            &["Box", "Rc", "Arc"],
            &["Rc", "Arc"],
        ),
        Question::free_text(
            "q-operator",
            "Which operator propagates an error to the caller?",
            "the question mark",
        ),
        Question::free_text("q-trait", "Which trait powers `{}` formatting?", "Display"),
    ]
}

pub(super) fn correct_answer(question_id: &QuestionId) -> &'static str {
    match question_id.0.as_str() {
        "q-binding" => "let",
        "q-smart-pointer" => "Arc",
        "q-operator" => "  The   Question mark ",
        _ => "display",
    }
}

pub(super) fn assessment_config() -> AssessmentConfig {
    AssessmentConfig {
        duration: Duration::from_secs(30 * 60),
        tick: Duration::from_secs(1),
        max_warnings: 2,
        outcome_policy: OutcomePolicy::PendingReview,
        closed_session_retention: 16,
    }
}

pub(super) fn harness() -> Harness {
    harness_with(assessment_config())
}

pub(super) fn harness_with(config: AssessmentConfig) -> Harness {
    let store = Arc::new(MemoryRecordStore::new());
    let catalog = MemoryInternshipCatalog::new([InternshipListing {
        internship_id: internship(),
        title: "Systems Programming Intern".to_string(),
        company_name: "Ferrous Works".to_string(),
    }]);
    let bank = MemoryQuestionBank::new().with_questions(internship(), questions());

    let placement = Placement::new(
        Arc::clone(&store),
        Arc::new(catalog),
        Arc::new(bank),
        config,
        CounterConfig::default(),
    );
    Harness { placement, store }
}

/// Opens an application and approves its form so the assessment round can start.
pub(super) async fn approved_application(harness: &Harness, name: &str) -> ApplicationRecord {
    let coordinator = &harness.placement.lifecycle.coordinator;
    let record = coordinator
        .open_application(student(name), internship())
        .await
        .expect("application opens");
    coordinator
        .apply_round_outcome(
            &record.id,
            RoundEvaluation {
                target_status: ApplicationStatus::FormApproved,
                round_number: FORM_ROUND,
                outcome: RoundOutcome::Passed,
                feedback: String::new(),
                evaluator_id: None,
            },
        )
        .await
        .expect("form approved")
        .record
}

pub(super) fn json_request(method: &str, uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub(super) fn get_request(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder.body(Body::empty()).unwrap()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
