use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for a student's application to one internship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(format!("app-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InternshipId(pub String);

impl fmt::Display for InternshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Faculty member (or other reviewer) recorded against a round evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvaluatorId(pub String);

/// Closed vocabulary of application statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    FormPending,
    FormSubmitted,
    FormApproved,
    FormRejected,
    TestAssigned,
    TestSubmitted,
    QuizCompleted,
    QuizApproved,
    QuizRejected,
    Selected,
    OfferAccepted,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 12] = [
        ApplicationStatus::FormPending,
        ApplicationStatus::FormSubmitted,
        ApplicationStatus::FormApproved,
        ApplicationStatus::FormRejected,
        ApplicationStatus::TestAssigned,
        ApplicationStatus::TestSubmitted,
        ApplicationStatus::QuizCompleted,
        ApplicationStatus::QuizApproved,
        ApplicationStatus::QuizRejected,
        ApplicationStatus::Selected,
        ApplicationStatus::OfferAccepted,
        ApplicationStatus::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::FormPending => "form_pending",
            ApplicationStatus::FormSubmitted => "form_submitted",
            ApplicationStatus::FormApproved => "form_approved",
            ApplicationStatus::FormRejected => "form_rejected",
            ApplicationStatus::TestAssigned => "test_assigned",
            ApplicationStatus::TestSubmitted => "test_submitted",
            ApplicationStatus::QuizCompleted => "quiz_completed",
            ApplicationStatus::QuizApproved => "quiz_approved",
            ApplicationStatus::QuizRejected => "quiz_rejected",
            ApplicationStatus::Selected => "selected",
            ApplicationStatus::OfferAccepted => "offer_accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// Terminal statuses absorb every further round transition.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Selected | ApplicationStatus::OfferAccepted | ApplicationStatus::Rejected
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Verdict recorded for a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Pending,
    Passed,
    Failed,
}

impl RoundOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            RoundOutcome::Pending => "pending",
            RoundOutcome::Passed => "passed",
            RoundOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Round 1 is the written form review.
pub const FORM_ROUND: u32 = 1;
/// Round 2 is the timed assessment.
pub const ASSESSMENT_ROUND: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_number: u32,
    pub status: RoundOutcome,
    #[serde(default)]
    pub feedback: String,
    pub evaluated_at: Option<DateTime<Utc>>,
    pub evaluated_by: Option<EvaluatorId>,
}

/// Canonical record for one (student, internship) application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub student_id: StudentId,
    pub internship_id: InternshipId,
    pub status: ApplicationStatus,
    pub current_round: u32,
    /// Sorted by `round_number`, one entry per round.
    pub rounds: Vec<RoundRecord>,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub selected_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub offer_accepted_at: Option<DateTime<Utc>>,
}

impl ApplicationRecord {
    pub fn new(student_id: StudentId, internship_id: InternshipId, now: DateTime<Utc>) -> Self {
        Self {
            id: ApplicationId::generate(),
            student_id,
            internship_id,
            status: ApplicationStatus::FormPending,
            current_round: 0,
            rounds: Vec::new(),
            applied_at: now,
            updated_at: now,
            selected_at: None,
            rejected_at: None,
            offer_accepted_at: None,
        }
    }

    pub fn round(&self, round_number: u32) -> Option<&RoundRecord> {
        self.rounds
            .iter()
            .find(|round| round.round_number == round_number)
    }

    /// Replaces the entry for the round if present, otherwise inserts it in order.
    /// Returns the outcome the round carried before.
    pub fn upsert_round(&mut self, round: RoundRecord) -> Option<RoundOutcome> {
        match self
            .rounds
            .binary_search_by_key(&round.round_number, |existing| existing.round_number)
        {
            Ok(index) => {
                let previous = self.rounds[index].status;
                self.rounds[index] = round;
                Some(previous)
            }
            Err(index) => {
                self.rounds.insert(index, round);
                None
            }
        }
    }

    pub fn highest_round(&self) -> u32 {
        self.rounds
            .last()
            .map(|round| round.round_number)
            .unwrap_or(0)
    }
}

/// Display fields the catalog exposes for an internship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternshipListing {
    pub internship_id: InternshipId,
    pub title: String,
    pub company_name: String,
}

/// Authenticated caller as reported by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
}

/// Fact emitted by the coordinator after each canonical write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    RoundEvaluated(RoundEvaluated),
    OfferAccepted {
        application_id: ApplicationId,
        student_id: StudentId,
        internship_id: InternshipId,
        occurred_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundEvaluated {
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub internship_id: InternshipId,
    pub status: ApplicationStatus,
    pub round_number: u32,
    pub outcome: RoundOutcome,
    /// Outcome this round had before the evaluation, `None` on first evaluation.
    pub previous_outcome: Option<RoundOutcome>,
    pub occurred_at: DateTime<Utc>,
}
