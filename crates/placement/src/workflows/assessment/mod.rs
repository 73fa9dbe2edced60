//! Proctored, timed assessment taken as the second round of an application.
//!
//! A session walks disclaimer, running, and finished phases, counting focus-loss warnings
//! along the way. Its single submission is graded, persisted as a [`SubmissionArtifact`],
//! and handed to the lifecycle coordinator as the round 2 outcome.

pub mod domain;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod session;

#[cfg(test)]
mod tests;

pub use domain::{
    AnsweredQuestion, OutcomePolicy, Question, QuestionId, QuestionKind, QuestionView,
    SessionId, SubmissionArtifact, SubmissionReason,
};
pub use repository::{QuestionBank, SubmissionRepository};
pub use router::assessment_router;
pub use scoring::ScoreCard;
pub use service::{
    AssessmentError, AssessmentService, SessionHandle, SessionStatusView, VisibilityOutcome,
};
pub use session::{AssessmentSession, SessionError, SessionPhase, SessionSnapshot};
