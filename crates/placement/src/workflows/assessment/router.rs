use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{QuestionId, SessionId};
use super::repository::{QuestionBank, SubmissionRepository};
use super::service::{AssessmentError, AssessmentService};
use crate::workflows::lifecycle::domain::{ApplicationId, StudentId};
use crate::workflows::lifecycle::router::{
    authenticated, error_response, lifecycle_error_response, unauthenticated,
};
use crate::workflows::lifecycle::store::ApplicationRepository;

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
}

/// Router builder exposing the proctored assessment endpoints.
pub fn assessment_router<R, Q, S>(service: Arc<AssessmentService<R, Q, S>>) -> Router
where
    R: ApplicationRepository + 'static,
    Q: QuestionBank + 'static,
    S: SubmissionRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications/:application_id/assessment",
            post(start_handler::<R, Q, S>),
        )
        .route(
            "/api/v1/applications/:application_id/submission",
            get(submission_handler::<R, Q, S>),
        )
        .route(
            "/api/v1/assessments/:session_id",
            get(status_handler::<R, Q, S>),
        )
        .route(
            "/api/v1/assessments/:session_id/acknowledge",
            post(acknowledge_handler::<R, Q, S>),
        )
        .route(
            "/api/v1/assessments/:session_id/answers/:question_id",
            put(answer_handler::<R, Q, S>),
        )
        .route(
            "/api/v1/assessments/:session_id/visibility-loss",
            post(visibility_handler::<R, Q, S>),
        )
        .route(
            "/api/v1/assessments/:session_id/warning/dismiss",
            post(dismiss_handler::<R, Q, S>),
        )
        .route(
            "/api/v1/assessments/:session_id/submit",
            post(submit_handler::<R, Q, S>),
        )
        .with_state(service)
}

pub(crate) async fn start_handler<R, Q, S>(
    State(service): State<Arc<AssessmentService<R, Q, S>>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    Q: QuestionBank + 'static,
    S: SubmissionRepository + 'static,
{
    let Some(user) = authenticated(&headers) else {
        return unauthenticated();
    };

    match service
        .start_assessment(&ApplicationId(application_id), &StudentId(user.id))
        .await
    {
        Ok(handle) => (StatusCode::CREATED, Json(handle)).into_response(),
        Err(err) => assessment_error_response(&err),
    }
}

pub(crate) async fn submission_handler<R, Q, S>(
    State(service): State<Arc<AssessmentService<R, Q, S>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    Q: QuestionBank + 'static,
    S: SubmissionRepository + 'static,
{
    match service.submission(&ApplicationId(application_id)).await {
        Ok(artifact) => (StatusCode::OK, Json(artifact)).into_response(),
        Err(err) => assessment_error_response(&err),
    }
}

pub(crate) async fn status_handler<R, Q, S>(
    State(service): State<Arc<AssessmentService<R, Q, S>>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    Q: QuestionBank + 'static,
    S: SubmissionRepository + 'static,
{
    let session_id = SessionId(session_id);
    if let Err(response) = authorize_session(&service, &headers, &session_id).await {
        return response;
    }

    match service.session_status(&session_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => assessment_error_response(&err),
    }
}

pub(crate) async fn acknowledge_handler<R, Q, S>(
    State(service): State<Arc<AssessmentService<R, Q, S>>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    Q: QuestionBank + 'static,
    S: SubmissionRepository + 'static,
{
    let session_id = SessionId(session_id);
    if let Err(response) = authorize_session(&service, &headers, &session_id).await {
        return response;
    }
    match service.acknowledge(&session_id).await {
        Ok(questions) => {
            let payload = json!({
                "session_id": session_id,
                "duration_seconds": service.config().duration.as_secs(),
                "max_warnings": service.config().max_warnings,
                "questions": questions,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => assessment_error_response(&err),
    }
}

pub(crate) async fn answer_handler<R, Q, S>(
    State(service): State<Arc<AssessmentService<R, Q, S>>>,
    Path((session_id, question_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<AnswerRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    Q: QuestionBank + 'static,
    S: SubmissionRepository + 'static,
{
    let session_id = SessionId(session_id);
    if let Err(response) = authorize_session(&service, &headers, &session_id).await {
        return response;
    }

    match service
        .record_answer(&session_id, QuestionId(question_id), request.answer)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => assessment_error_response(&err),
    }
}

pub(crate) async fn visibility_handler<R, Q, S>(
    State(service): State<Arc<AssessmentService<R, Q, S>>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    Q: QuestionBank + 'static,
    S: SubmissionRepository + 'static,
{
    let session_id = SessionId(session_id);
    if let Err(response) = authorize_session(&service, &headers, &session_id).await {
        return response;
    }

    match service.report_visibility_loss(&session_id).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => assessment_error_response(&err),
    }
}

pub(crate) async fn dismiss_handler<R, Q, S>(
    State(service): State<Arc<AssessmentService<R, Q, S>>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    Q: QuestionBank + 'static,
    S: SubmissionRepository + 'static,
{
    let session_id = SessionId(session_id);
    if let Err(response) = authorize_session(&service, &headers, &session_id).await {
        return response;
    }

    match service.dismiss_warning(&session_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => assessment_error_response(&err),
    }
}

pub(crate) async fn submit_handler<R, Q, S>(
    State(service): State<Arc<AssessmentService<R, Q, S>>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
    Q: QuestionBank + 'static,
    S: SubmissionRepository + 'static,
{
    let session_id = SessionId(session_id);
    if let Err(response) = authorize_session(&service, &headers, &session_id).await {
        return response;
    }

    match service.submit_assessment(&session_id).await {
        Ok(submission) => {
            let payload = json!({
                "submitted": submission.is_some(),
                "submission": submission,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => assessment_error_response(&err),
    }
}

/// Session routes are open to the student who took the session and nobody else.
async fn authorize_session<R, Q, S>(
    service: &AssessmentService<R, Q, S>,
    headers: &HeaderMap,
    session_id: &SessionId,
) -> Result<(), Response>
where
    R: ApplicationRepository + 'static,
    Q: QuestionBank + 'static,
    S: SubmissionRepository + 'static,
{
    let Some(user) = authenticated(headers) else {
        return Err(unauthenticated());
    };
    service
        .authorize(session_id, &StudentId(user.id))
        .await
        .map_err(|err| assessment_error_response(&err))
}

pub(crate) fn assessment_error_response(err: &AssessmentError) -> Response {
    let status = match err {
        AssessmentError::SessionNotFound(_) | AssessmentError::SubmissionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        AssessmentError::SessionActive(_) | AssessmentError::AlreadySubmitted(_) => {
            StatusCode::CONFLICT
        }
        AssessmentError::NotStarted | AssessmentError::UnknownQuestion(_) => {
            StatusCode::BAD_REQUEST
        }
        AssessmentError::TimeExpired | AssessmentError::IntegrityBlock => StatusCode::GONE,
        AssessmentError::NotOwner(_) | AssessmentError::SessionNotOwned(_) => {
            StatusCode::FORBIDDEN
        }
        AssessmentError::Lifecycle(inner) => return lifecycle_error_response(inner),
        AssessmentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}
