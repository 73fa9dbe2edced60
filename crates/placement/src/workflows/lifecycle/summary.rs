use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::coordinator::{HandlerError, RoundEventHandler};
use super::domain::{
    ApplicationStatus, InternshipId, InternshipListing, LifecycleEvent, RoundOutcome, StudentId,
};
use super::store::{InternshipCatalog, StoreError, SummaryRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: u32,
    pub status: RoundOutcome,
}

/// Read-optimized overview of one application, self-contained for dashboards.
///
/// Display fields are copied from the catalog on first write and never re-joined, so the
/// summary survives the internship being removed later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryView {
    pub student_id: StudentId,
    pub internship_id: InternshipId,
    pub internship_title: String,
    pub company_name: String,
    pub current_round: u32,
    pub status: ApplicationStatus,
    pub round_results: Vec<RoundResult>,
    pub updated_at: DateTime<Utc>,
}

impl SummaryView {
    fn from_listing(
        student_id: StudentId,
        listing: InternshipListing,
        status: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            student_id,
            internship_id: listing.internship_id,
            internship_title: listing.title,
            company_name: listing.company_name,
            current_round: 0,
            status,
            round_results: Vec::new(),
            updated_at: now,
        }
    }

    fn record_round(&mut self, round: u32, status: RoundOutcome) {
        match self.round_results.iter_mut().find(|entry| entry.round == round) {
            Some(entry) => entry.status = status,
            None => {
                self.round_results.push(RoundResult { round, status });
                self.round_results.sort_by_key(|entry| entry.round);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("internship {0} is not in the catalog")]
    InternshipNotFound(InternshipId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Keeps [`SummaryView`]s in step with the canonical application records.
pub struct SummaryProjector<S, C> {
    summaries: Arc<S>,
    catalog: Arc<C>,
}

impl<S, C> SummaryProjector<S, C>
where
    S: SummaryRepository + 'static,
    C: InternshipCatalog + 'static,
{
    pub fn new(summaries: Arc<S>, catalog: Arc<C>) -> Self {
        Self { summaries, catalog }
    }

    pub async fn project(
        &self,
        student_id: &StudentId,
        internship_id: &InternshipId,
        status: ApplicationStatus,
        round_number: u32,
        outcome: RoundOutcome,
    ) -> Result<(), ProjectionError> {
        let now = Utc::now();
        let mut summary = self.load_or_create(student_id, internship_id, status, now).await?;

        summary.record_round(round_number, outcome);
        summary.status = status;
        summary.current_round = round_number;
        summary.updated_at = now;

        self.summaries.save_summary(summary).await?;
        Ok(())
    }

    /// Overwrites only the status, for transitions that carry no round result.
    pub async fn project_status(
        &self,
        student_id: &StudentId,
        internship_id: &InternshipId,
        status: ApplicationStatus,
    ) -> Result<(), ProjectionError> {
        let now = Utc::now();
        let mut summary = self.load_or_create(student_id, internship_id, status, now).await?;
        summary.status = status;
        summary.updated_at = now;
        self.summaries.save_summary(summary).await?;
        Ok(())
    }

    pub async fn summaries_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<SummaryView>, ProjectionError> {
        Ok(self.summaries.summaries_for_student(student_id).await?)
    }

    async fn load_or_create(
        &self,
        student_id: &StudentId,
        internship_id: &InternshipId,
        status: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> Result<SummaryView, ProjectionError> {
        if let Some(existing) = self.summaries.fetch_summary(student_id, internship_id).await? {
            return Ok(existing);
        }

        let listing = self
            .catalog
            .listing(internship_id)
            .await?
            .ok_or_else(|| ProjectionError::InternshipNotFound(internship_id.clone()))?;
        debug!(%student_id, %internship_id, "creating application summary");
        Ok(SummaryView::from_listing(
            student_id.clone(),
            listing,
            status,
            now,
        ))
    }
}

#[async_trait]
impl<S, C> RoundEventHandler for SummaryProjector<S, C>
where
    S: SummaryRepository + 'static,
    C: InternshipCatalog + 'static,
{
    fn name(&self) -> &'static str {
        "summary_projector"
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<(), HandlerError> {
        match event {
            LifecycleEvent::RoundEvaluated(evaluated) => self
                .project(
                    &evaluated.student_id,
                    &evaluated.internship_id,
                    evaluated.status,
                    evaluated.round_number,
                    evaluated.outcome,
                )
                .await
                .map_err(HandlerError::from),
            LifecycleEvent::OfferAccepted {
                student_id,
                internship_id,
                ..
            } => self
                .project_status(student_id, internship_id, ApplicationStatus::OfferAccepted)
                .await
                .map_err(HandlerError::from),
        }
    }
}
