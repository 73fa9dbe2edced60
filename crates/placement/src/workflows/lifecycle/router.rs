use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::coordinator::{LifecycleError, RoundEvaluation, RoundTransitionCoordinator};
use super::counter::AggregateCounter;
use super::domain::{ApplicationId, EvaluatorId, InternshipId, StudentId, UserIdentity};
use super::identity::HeaderIdentity;
use super::store::{
    ApplicationRepository, CounterRepository, IdentityProvider, InternshipCatalog,
    SummaryRepository,
};
use super::summary::SummaryProjector;
use crate::config::CounterConfig;

/// Coordinator plus the read models the HTTP surface exposes.
pub struct LifecycleState<St, C> {
    pub coordinator: Arc<RoundTransitionCoordinator<St>>,
    pub summaries: Arc<SummaryProjector<St, C>>,
    pub counter: Arc<AggregateCounter<St>>,
}

impl<St, C> Clone for LifecycleState<St, C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            summaries: Arc::clone(&self.summaries),
            counter: Arc::clone(&self.counter),
        }
    }
}

impl<St, C> LifecycleState<St, C>
where
    St: ApplicationRepository + SummaryRepository + CounterRepository + 'static,
    C: InternshipCatalog + 'static,
{
    /// Build the coordinator with the summary projector and the aggregate counter
    /// subscribed to its events.
    pub fn wire(store: Arc<St>, catalog: Arc<C>, counters: CounterConfig) -> Self {
        let summaries = Arc::new(SummaryProjector::new(Arc::clone(&store), catalog));
        let counter = Arc::new(AggregateCounter::new(Arc::clone(&store), counters));
        let coordinator = Arc::new(
            RoundTransitionCoordinator::new(store)
                .with_handler(summaries.clone())
                .with_handler(counter.clone()),
        );

        Self {
            coordinator,
            summaries,
            counter,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenApplicationRequest {
    pub internship_id: InternshipId,
}

/// Router builder exposing the application lifecycle endpoints.
pub fn lifecycle_router<St, C>(state: LifecycleState<St, C>) -> Router
where
    St: ApplicationRepository + SummaryRepository + CounterRepository + 'static,
    C: InternshipCatalog + 'static,
{
    Router::new()
        .route("/api/v1/applications", post(open_handler::<St, C>))
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<St, C>),
        )
        .route(
            "/api/v1/applications/:application_id/rounds",
            post(round_handler::<St, C>),
        )
        .route(
            "/api/v1/applications/:application_id/offer/accept",
            post(accept_offer_handler::<St, C>),
        )
        .route(
            "/api/v1/internships/:internship_id/applications",
            get(internship_applications_handler::<St, C>),
        )
        .route(
            "/api/v1/internships/:internship_id/rounds/:round_number/counters",
            get(counter_handler::<St, C>),
        )
        .route(
            "/api/v1/students/:student_id/summaries",
            get(summaries_handler::<St, C>),
        )
        .with_state(state)
}

pub(crate) async fn open_handler<St, C>(
    State(state): State<LifecycleState<St, C>>,
    headers: HeaderMap,
    Json(request): Json<OpenApplicationRequest>,
) -> Response
where
    St: ApplicationRepository + SummaryRepository + CounterRepository + 'static,
    C: InternshipCatalog + 'static,
{
    let Some(user) = authenticated(&headers) else {
        return unauthenticated();
    };

    match state
        .coordinator
        .open_application(StudentId(user.id), request.internship_id)
        .await
    {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => lifecycle_error_response(&err),
    }
}

pub(crate) async fn application_handler<St, C>(
    State(state): State<LifecycleState<St, C>>,
    Path(application_id): Path<String>,
) -> Response
where
    St: ApplicationRepository + SummaryRepository + CounterRepository + 'static,
    C: InternshipCatalog + 'static,
{
    match state
        .coordinator
        .application(&ApplicationId(application_id))
        .await
    {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => lifecycle_error_response(&err),
    }
}

pub(crate) async fn round_handler<St, C>(
    State(state): State<LifecycleState<St, C>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(mut evaluation): Json<RoundEvaluation>,
) -> Response
where
    St: ApplicationRepository + SummaryRepository + CounterRepository + 'static,
    C: InternshipCatalog + 'static,
{
    let Some(user) = authenticated(&headers) else {
        return unauthenticated();
    };
    // The reviewer on record is always the caller, whatever the body claims.
    evaluation.evaluator_id = Some(EvaluatorId(user.id));

    match state
        .coordinator
        .apply_round_outcome(&ApplicationId(application_id), evaluation)
        .await
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => lifecycle_error_response(&err),
    }
}

pub(crate) async fn accept_offer_handler<St, C>(
    State(state): State<LifecycleState<St, C>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    St: ApplicationRepository + SummaryRepository + CounterRepository + 'static,
    C: InternshipCatalog + 'static,
{
    let Some(user) = authenticated(&headers) else {
        return unauthenticated();
    };

    match state
        .coordinator
        .accept_offer(&ApplicationId(application_id), &StudentId(user.id))
        .await
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => lifecycle_error_response(&err),
    }
}

pub(crate) async fn internship_applications_handler<St, C>(
    State(state): State<LifecycleState<St, C>>,
    Path(internship_id): Path<String>,
) -> Response
where
    St: ApplicationRepository + SummaryRepository + CounterRepository + 'static,
    C: InternshipCatalog + 'static,
{
    match state
        .coordinator
        .applications_for_internship(&InternshipId(internship_id))
        .await
    {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => lifecycle_error_response(&err),
    }
}

pub(crate) async fn counter_handler<St, C>(
    State(state): State<LifecycleState<St, C>>,
    Path((internship_id, round_number)): Path<(String, u32)>,
) -> Response
where
    St: ApplicationRepository + SummaryRepository + CounterRepository + 'static,
    C: InternshipCatalog + 'static,
{
    match state
        .counter
        .tally(&InternshipId(internship_id), round_number)
        .await
    {
        Ok(tally) => (StatusCode::OK, Json(tally)).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub(crate) async fn summaries_handler<St, C>(
    State(state): State<LifecycleState<St, C>>,
    Path(student_id): Path<String>,
) -> Response
where
    St: ApplicationRepository + SummaryRepository + CounterRepository + 'static,
    C: InternshipCatalog + 'static,
{
    match state
        .summaries
        .summaries_for_student(&StudentId(student_id))
        .await
    {
        Ok(summaries) => (StatusCode::OK, Json(summaries)).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub(crate) fn authenticated(headers: &HeaderMap) -> Option<UserIdentity> {
    HeaderIdentity::from_headers(headers).current_user()
}

pub(crate) fn unauthenticated() -> Response {
    error_response(StatusCode::UNAUTHORIZED, "missing caller identity")
}

pub(crate) fn lifecycle_error_response(err: &LifecycleError) -> Response {
    let status = match err {
        LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::InvalidTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::Conflict { .. } => StatusCode::CONFLICT,
        LifecycleError::NotOwner(_) => StatusCode::FORBIDDEN,
        LifecycleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({
        "error": message.into(),
    });
    (status, Json(payload)).into_response()
}
