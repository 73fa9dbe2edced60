use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::body::Body;
use serde_json::Value;

use crate::config::CounterConfig;
use crate::workflows::lifecycle::counter::RoundTally;
use crate::workflows::lifecycle::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, InternshipId, InternshipListing,
    RoundOutcome, StudentId,
};
use crate::workflows::lifecycle::identity::USER_ID_HEADER;
use crate::workflows::lifecycle::store::{
    ApplicationRepository, CounterKey, CounterRepository, StoreError, SummaryRepository,
    Versioned,
};
use crate::workflows::lifecycle::summary::SummaryView;
use crate::workflows::lifecycle::{LifecycleState, RoundEvaluation};
use crate::workflows::memory::{MemoryInternshipCatalog, MemoryRecordStore};

pub(super) type MemoryLifecycle = LifecycleState<MemoryRecordStore, MemoryInternshipCatalog>;

pub(super) fn internship() -> InternshipId {
    InternshipId("int-backend-2026".to_string())
}

pub(super) fn student(name: &str) -> StudentId {
    StudentId(format!("stu-{name}"))
}

pub(super) fn listing() -> InternshipListing {
    InternshipListing {
        internship_id: internship(),
        title: "Backend Engineering Intern".to_string(),
        company_name: "Northwind Labs".to_string(),
    }
}

pub(super) fn build_lifecycle() -> (MemoryLifecycle, Arc<MemoryRecordStore>) {
    build_lifecycle_with(MemoryInternshipCatalog::new([listing()]), CounterConfig::default())
}

pub(super) fn build_lifecycle_with(
    catalog: MemoryInternshipCatalog,
    counters: CounterConfig,
) -> (MemoryLifecycle, Arc<MemoryRecordStore>) {
    let store = Arc::new(MemoryRecordStore::new());
    let state = LifecycleState::wire(Arc::clone(&store), Arc::new(catalog), counters);
    (state, store)
}

pub(super) async fn open(state: &MemoryLifecycle, name: &str) -> ApplicationRecord {
    state
        .coordinator
        .open_application(student(name), internship())
        .await
        .expect("application opens")
}

pub(super) fn evaluation(
    target_status: ApplicationStatus,
    round_number: u32,
    outcome: RoundOutcome,
) -> RoundEvaluation {
    RoundEvaluation {
        target_status,
        round_number,
        outcome,
        feedback: String::new(),
        evaluator_id: None,
    }
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

pub(super) fn get_request(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}

/// Store whose every call fails as if the database were offline.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("database offline".to_string()))
}

#[async_trait]
impl ApplicationRepository for UnavailableStore {
    async fn insert_application(
        &self,
        _record: ApplicationRecord,
    ) -> Result<ApplicationRecord, StoreError> {
        offline()
    }

    async fn fetch_application(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        offline()
    }

    async fn save_application(&self, _record: ApplicationRecord) -> Result<(), StoreError> {
        offline()
    }

    async fn applications_for_internship(
        &self,
        _internship_id: &InternshipId,
    ) -> Result<Vec<ApplicationRecord>, StoreError> {
        offline()
    }
}

#[async_trait]
impl SummaryRepository for UnavailableStore {
    async fn fetch_summary(
        &self,
        _student_id: &StudentId,
        _internship_id: &InternshipId,
    ) -> Result<Option<SummaryView>, StoreError> {
        offline()
    }

    async fn save_summary(&self, _summary: SummaryView) -> Result<(), StoreError> {
        offline()
    }

    async fn summaries_for_student(
        &self,
        _student_id: &StudentId,
    ) -> Result<Vec<SummaryView>, StoreError> {
        offline()
    }
}

#[async_trait]
impl CounterRepository for UnavailableStore {
    async fn load_tally(&self, _key: &CounterKey) -> Result<Option<Versioned<RoundTally>>, StoreError> {
        offline()
    }

    async fn compare_and_swap_tally(
        &self,
        _key: &CounterKey,
        _expected_version: u64,
        _tally: RoundTally,
    ) -> Result<u64, StoreError> {
        offline()
    }
}

/// Counter cell that some other writer always updates first.
pub(super) struct AlwaysMovingCounters;

#[async_trait]
impl CounterRepository for AlwaysMovingCounters {
    async fn load_tally(&self, _key: &CounterKey) -> Result<Option<Versioned<RoundTally>>, StoreError> {
        Ok(None)
    }

    async fn compare_and_swap_tally(
        &self,
        _key: &CounterKey,
        expected_version: u64,
        _tally: RoundTally,
    ) -> Result<u64, StoreError> {
        Err(StoreError::VersionMismatch {
            expected: expected_version,
            actual: expected_version + 1,
        })
    }
}
