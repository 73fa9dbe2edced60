use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflows::lifecycle::domain::{ApplicationId, InternshipId, RoundOutcome, StudentId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId(pub String);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle identifying one proctored session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(format!("sess-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    /// Correct when the chosen option is one of `correct`.
    MultipleChoice {
        options: Vec<String>,
        correct: Vec<String>,
    },
    /// Correct when the answer matches `expected` ignoring case and spacing.
    FreeText { expected: String },
}

fn default_points() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default = "default_points")]
    pub points: u32,
}

impl Question {
    pub fn multiple_choice(
        id: &str,
        prompt: &str,
        options: &[&str],
        correct: &[&str],
    ) -> Self {
        Self {
            id: QuestionId(id.to_string()),
            prompt: prompt.to_string(),
            kind: QuestionKind::MultipleChoice {
                options: options.iter().map(|option| option.to_string()).collect(),
                correct: correct.iter().map(|option| option.to_string()).collect(),
            },
            points: default_points(),
        }
    }

    pub fn free_text(id: &str, prompt: &str, expected: &str) -> Self {
        Self {
            id: QuestionId(id.to_string()),
            prompt: prompt.to_string(),
            kind: QuestionKind::FreeText {
                expected: expected.to_string(),
            },
            points: default_points(),
        }
    }

    pub fn worth(mut self, points: u32) -> Self {
        self.points = points;
        self
    }

    /// Student-facing rendering that omits the answer key.
    pub fn view(&self) -> QuestionView {
        let (kind, options) = match &self.kind {
            QuestionKind::MultipleChoice { options, .. } => ("multiple_choice", options.clone()),
            QuestionKind::FreeText { .. } => ("free_text", Vec::new()),
        };
        QuestionView {
            id: self.id.clone(),
            prompt: self.prompt.clone(),
            kind,
            options,
            points: self.points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub prompt: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub points: u32,
}

/// Why a session was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionReason {
    Manual,
    TimedOut,
    AutoSubmittedIntegrity,
}

impl SubmissionReason {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionReason::Manual => "manual",
            SubmissionReason::TimedOut => "timed_out",
            SubmissionReason::AutoSubmittedIntegrity => "auto_submitted_integrity",
        }
    }
}

impl fmt::Display for SubmissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-question line of a submission, consumed by the review screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question_id: QuestionId,
    pub question_text: String,
    pub user_answer: Option<String>,
    pub is_correct: bool,
    pub points: u32,
}

/// Persisted result of one assessment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionArtifact {
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub internship_id: InternshipId,
    pub session_id: SessionId,
    pub reason: SubmissionReason,
    pub answers: Vec<AnsweredQuestion>,
    pub score: u32,
    pub total_possible_points: u32,
    pub percentage: u8,
    pub warnings: u8,
    pub time_spent_seconds: u64,
    pub submitted_at: DateTime<Utc>,
}

/// Maps a score onto the round outcome handed to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OutcomePolicy {
    /// A reviewer decides later; the round stays pending.
    #[default]
    PendingReview,
    PassMark { minimum_percentage: u8 },
}

impl OutcomePolicy {
    pub fn outcome_for(self, percentage: u8) -> RoundOutcome {
        match self {
            OutcomePolicy::PendingReview => RoundOutcome::Pending,
            OutcomePolicy::PassMark { minimum_percentage } if percentage >= minimum_percentage => {
                RoundOutcome::Passed
            }
            OutcomePolicy::PassMark { .. } => RoundOutcome::Failed,
        }
    }
}
