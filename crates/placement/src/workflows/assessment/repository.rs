use async_trait::async_trait;

use super::domain::{Question, SubmissionArtifact};
use crate::workflows::lifecycle::domain::{ApplicationId, InternshipId};
use crate::workflows::lifecycle::store::StoreError;

/// Source of the question set for an internship's assessment.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    async fn questions_for(&self, internship_id: &InternshipId)
        -> Result<Vec<Question>, StoreError>;
}

/// Durable home of submission artifacts, one per application.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Fails with [`StoreError::Conflict`] if the application already has a submission.
    async fn insert_submission(&self, artifact: SubmissionArtifact) -> Result<(), StoreError>;
    async fn fetch_submission(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<SubmissionArtifact>, StoreError>;
}
