use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::counter::CounterError;
use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, EvaluatorId, InternshipId,
    LifecycleEvent, RoundEvaluated, RoundOutcome, RoundRecord, StudentId,
};
use super::registry::{StatusRegistry, TransitionError};
use super::store::{ApplicationRepository, StoreError};
use super::summary::ProjectionError;

/// Downstream consumer of lifecycle events, e.g. a projection or a tally.
#[async_trait]
pub trait RoundEventHandler: Send + Sync {
    fn name(&self) -> &'static str;
    async fn handle(&self, event: &LifecycleEvent) -> Result<(), HandlerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Counter(#[from] CounterError),
}

/// Error raised by the coordinator. Projection failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),
    #[error("student {student_id} already applied to internship {internship_id}")]
    Conflict {
        student_id: StudentId,
        internship_id: InternshipId,
    },
    #[error("application {0} belongs to another student")]
    NotOwner(ApplicationId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Evaluation of one round as submitted by a reviewer or by the assessment service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEvaluation {
    pub target_status: ApplicationStatus,
    pub round_number: u32,
    pub outcome: RoundOutcome,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub evaluator_id: Option<EvaluatorId>,
}

/// Handler that failed to reflect a canonical write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionFailure {
    pub handler: &'static str,
    pub message: String,
}

/// Result of a successful canonical write.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionReport {
    pub record: ApplicationRecord,
    pub projection_failures: Vec<ProjectionFailure>,
}

impl TransitionReport {
    pub fn is_fully_projected(&self) -> bool {
        self.projection_failures.is_empty()
    }
}

/// Applies round outcomes to canonical records and fans the resulting events out.
pub struct RoundTransitionCoordinator<R> {
    applications: Arc<R>,
    registry: StatusRegistry,
    handlers: Vec<Arc<dyn RoundEventHandler>>,
}

impl<R> RoundTransitionCoordinator<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(applications: Arc<R>) -> Self {
        Self {
            applications,
            registry: StatusRegistry,
            handlers: Vec::new(),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn RoundEventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Register a student's application; the record starts at `form_pending`, round 0.
    pub async fn open_application(
        &self,
        student_id: StudentId,
        internship_id: InternshipId,
    ) -> Result<ApplicationRecord, LifecycleError> {
        let record = ApplicationRecord::new(student_id.clone(), internship_id.clone(), Utc::now());
        let stored = self
            .applications
            .insert_application(record)
            .await
            .map_err(|err| match err {
                StoreError::Conflict => LifecycleError::Conflict {
                    student_id,
                    internship_id,
                },
                other => LifecycleError::Store(other),
            })?;
        info!(application_id = %stored.id, student_id = %stored.student_id, internship_id = %stored.internship_id, "application opened");
        Ok(stored)
    }

    pub async fn application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, LifecycleError> {
        self.applications
            .fetch_application(application_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(application_id.clone()))
    }

    pub async fn applications_for_internship(
        &self,
        internship_id: &InternshipId,
    ) -> Result<Vec<ApplicationRecord>, LifecycleError> {
        Ok(self
            .applications
            .applications_for_internship(internship_id)
            .await?)
    }

    /// Merge a round outcome into the canonical record, then notify the projections.
    ///
    /// Exactly one canonical write happens per successful call. Racing evaluations of the
    /// same round resolve last-writer-wins.
    pub async fn apply_round_outcome(
        &self,
        application_id: &ApplicationId,
        evaluation: RoundEvaluation,
    ) -> Result<TransitionReport, LifecycleError> {
        let mut record = self.application(application_id).await?;

        self.registry.validate(
            record.status,
            record.current_round,
            evaluation.target_status,
            evaluation.round_number,
        )?;

        let now = Utc::now();
        let evaluated = evaluation.outcome != RoundOutcome::Pending;
        let previous_outcome = record.upsert_round(RoundRecord {
            round_number: evaluation.round_number,
            status: evaluation.outcome,
            feedback: evaluation.feedback,
            evaluated_at: evaluated.then_some(now),
            evaluated_by: if evaluated { evaluation.evaluator_id } else { None },
        });

        record.status = evaluation.target_status;
        record.current_round = record.current_round.max(evaluation.round_number);
        record.updated_at = now;
        match evaluation.target_status {
            ApplicationStatus::Selected => {
                record.selected_at.get_or_insert(now);
            }
            ApplicationStatus::Rejected => {
                record.rejected_at.get_or_insert(now);
            }
            _ => {}
        }

        self.applications.save_application(record.clone()).await?;
        info!(
            %application_id,
            status = %record.status,
            round = evaluation.round_number,
            outcome = %evaluation.outcome,
            reevaluation = previous_outcome.is_some(),
            "round outcome applied"
        );

        let event = LifecycleEvent::RoundEvaluated(RoundEvaluated {
            application_id: record.id.clone(),
            student_id: record.student_id.clone(),
            internship_id: record.internship_id.clone(),
            status: record.status,
            round_number: evaluation.round_number,
            outcome: evaluation.outcome,
            previous_outcome,
            occurred_at: now,
        });
        let projection_failures = self.dispatch(&event).await;

        Ok(TransitionReport {
            record,
            projection_failures,
        })
    }

    /// Move a selected application to `offer_accepted` on behalf of its student.
    pub async fn accept_offer(
        &self,
        application_id: &ApplicationId,
        student_id: &StudentId,
    ) -> Result<TransitionReport, LifecycleError> {
        let mut record = self.application(application_id).await?;
        if &record.student_id != student_id {
            return Err(LifecycleError::NotOwner(application_id.clone()));
        }
        self.registry.validate_offer_acceptance(record.status)?;

        let now = Utc::now();
        record.status = ApplicationStatus::OfferAccepted;
        record.updated_at = now;
        record.offer_accepted_at.get_or_insert(now);

        self.applications.save_application(record.clone()).await?;
        info!(%application_id, "offer accepted");

        let event = LifecycleEvent::OfferAccepted {
            application_id: record.id.clone(),
            student_id: record.student_id.clone(),
            internship_id: record.internship_id.clone(),
            occurred_at: now,
        };
        let projection_failures = self.dispatch(&event).await;

        Ok(TransitionReport {
            record,
            projection_failures,
        })
    }

    async fn dispatch(&self, event: &LifecycleEvent) -> Vec<ProjectionFailure> {
        let mut failures = Vec::new();
        for handler in &self.handlers {
            if let Err(err) = handler.handle(event).await {
                warn!(handler = handler.name(), error = %err, "projection is stale after canonical write");
                failures.push(ProjectionFailure {
                    handler: handler.name(),
                    message: err.to_string(),
                });
            }
        }
        failures
    }
}
