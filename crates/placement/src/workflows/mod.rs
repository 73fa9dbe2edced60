pub mod assessment;
pub mod lifecycle;
pub mod memory;

use std::sync::Arc;

use axum::Router;

use crate::config::{AssessmentConfig, CounterConfig};
use assessment::{assessment_router, AssessmentService, QuestionBank, SubmissionRepository};
use lifecycle::{
    lifecycle_router, ApplicationRepository, CounterRepository, InternshipCatalog,
    LifecycleState, SummaryRepository,
};

/// Umbrella over every record family. A single backing store usually serves them all.
pub trait RecordStore:
    ApplicationRepository + SummaryRepository + CounterRepository + SubmissionRepository
{
}

impl<T> RecordStore for T where
    T: ApplicationRepository + SummaryRepository + CounterRepository + SubmissionRepository
{
}

/// Lifecycle and assessment services wired against one record store.
pub struct Placement<St, C, Q> {
    pub lifecycle: LifecycleState<St, C>,
    pub assessments: Arc<AssessmentService<St, Q, St>>,
}

impl<St, C, Q> Placement<St, C, Q>
where
    St: RecordStore + 'static,
    C: InternshipCatalog + 'static,
    Q: QuestionBank + 'static,
{
    pub fn new(
        store: Arc<St>,
        catalog: Arc<C>,
        questions: Arc<Q>,
        assessment: AssessmentConfig,
        counters: CounterConfig,
    ) -> Self {
        let lifecycle = LifecycleState::wire(Arc::clone(&store), catalog, counters);
        let assessments = Arc::new(AssessmentService::new(
            Arc::clone(&lifecycle.coordinator),
            questions,
            store,
            assessment,
        ));

        Self {
            lifecycle,
            assessments,
        }
    }

    /// Every `/api/v1` route of the placement engine.
    pub fn router(&self) -> Router {
        lifecycle_router(self.lifecycle.clone())
            .merge(assessment_router(Arc::clone(&self.assessments)))
    }
}
