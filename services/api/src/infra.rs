use metrics_exporter_prometheus::PrometheusHandle;
use placement::workflows::assessment::{Question, QuestionId};
use placement::workflows::lifecycle::{InternshipId, InternshipListing};
use placement::workflows::memory::{MemoryInternshipCatalog, MemoryQuestionBank};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) const DEMO_INTERNSHIP: &str = "int-rust-2026";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn demo_catalog() -> MemoryInternshipCatalog {
    MemoryInternshipCatalog::new([
        InternshipListing {
            internship_id: InternshipId(DEMO_INTERNSHIP.to_string()),
            title: "Rust Backend Intern".to_string(),
            company_name: "Cobalt Systems".to_string(),
        },
        InternshipListing {
            internship_id: InternshipId("int-data-2026".to_string()),
            title: "Data Platform Intern".to_string(),
            company_name: "Meridian Freight".to_string(),
        },
    ])
}

pub(crate) fn demo_question_bank() -> MemoryQuestionBank {
    MemoryQuestionBank::new().with_questions(
        InternshipId(DEMO_INTERNSHIP.to_string()),
        vec![
            Question::multiple_choice(
                "q-ownership",
                "What happens to a `String` after it is moved into a function?",
                &[
                    "It is copied",
                    "The caller can no longer use it",
                    "It becomes a reference",
                ],
                &["The caller can no longer use it"],
            ),
            Question::multiple_choice(
                "q-sync",
                "Which wrapper lets several threads mutate shared data?",
                &["Rc<RefCell<T>>", "Arc<Mutex<T>>", "Box<T>"],
                &["Arc<Mutex<T>>"],
            ),
            Question::free_text(
                "q-error",
                "Which enum does the standard library use for recoverable errors?",
                "Result",
            ),
            Question::free_text(
                "q-runtime",
                "Which crate provides the async runtime used by axum?",
                "tokio",
            )
            .worth(2),
        ],
    )
}

/// Answers the demo candidate gives. One of them is wrong on purpose.
pub(crate) fn demo_answers() -> Vec<(QuestionId, &'static str)> {
    vec![
        (
            QuestionId("q-ownership".to_string()),
            "The caller can no longer use it",
        ),
        (QuestionId("q-sync".to_string()), "Rc<RefCell<T>>"),
        (QuestionId("q-error".to_string()), "result"),
        (QuestionId("q-runtime".to_string()), " Tokio "),
    ]
}
