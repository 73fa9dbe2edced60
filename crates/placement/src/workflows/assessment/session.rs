//! Proctored session state machine.
//!
//! `Disclaimer -> Running <-> Warned(n) -> Finished(reason)`, with `Blocked` reached on
//! excess focus loss. The machine is synchronous and clock-agnostic: callers pass the
//! current [`Instant`] in, and the service serializes every call through one lock.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::domain::{Question, QuestionId, SessionId, SubmissionReason};
use crate::config::AssessmentConfig;
use crate::workflows::lifecycle::domain::{ApplicationId, InternshipId, StudentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    Disclaimer,
    Running,
    Warned { warnings: u8 },
    Blocked,
    Finished { reason: SubmissionReason },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("the disclaimer has not been acknowledged")]
    NotStarted,
    #[error("the session is already running")]
    AlreadyStarted,
    #[error("question {0} is not part of this session")]
    UnknownQuestion(QuestionId),
    #[error("time expired")]
    TimeExpired,
    #[error("the session is closed")]
    Closed,
    #[error("a submission was already issued for this session")]
    Reentry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum VisibilityVerdict {
    Warned { warnings: u8, remaining_warnings: u8 },
    Blocked,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickVerdict {
    Continue { remaining_seconds: u64 },
    Expired,
    Stopped,
}

/// Everything needed to grade and persist a session once submission has been claimed.
#[derive(Debug, Clone)]
pub struct SubmissionDraft {
    pub session_id: SessionId,
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub internship_id: InternshipId,
    pub reason: SubmissionReason,
    pub questions: Vec<Question>,
    pub answers: BTreeMap<QuestionId, String>,
    pub warnings: u8,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub application_id: ApplicationId,
    #[serde(flatten)]
    pub phase: SessionPhase,
    pub remaining_seconds: u64,
    pub warnings: u8,
    pub max_warnings: u8,
    pub answered: usize,
    pub total_questions: usize,
}

#[derive(Debug)]
pub struct AssessmentSession {
    id: SessionId,
    application_id: ApplicationId,
    student_id: StudentId,
    internship_id: InternshipId,
    phase: SessionPhase,
    questions: Vec<Question>,
    answers: BTreeMap<QuestionId, String>,
    duration: Duration,
    remaining: Duration,
    tick: Duration,
    warnings: u8,
    max_warnings: u8,
    started_at: Option<Instant>,
    submission_issued: bool,
}

impl AssessmentSession {
    pub fn new(
        id: SessionId,
        application_id: ApplicationId,
        student_id: StudentId,
        internship_id: InternshipId,
        config: &AssessmentConfig,
    ) -> Self {
        Self {
            id,
            application_id,
            student_id,
            internship_id,
            phase: SessionPhase::Disclaimer,
            questions: Vec::new(),
            answers: BTreeMap::new(),
            duration: config.duration,
            remaining: config.duration,
            tick: config.tick,
            warnings: 0,
            max_warnings: config.max_warnings,
            started_at: None,
            submission_issued: false,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn application_id(&self) -> &ApplicationId {
        &self.application_id
    }

    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    pub fn internship_id(&self) -> &InternshipId {
        &self.internship_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn is_active(&self) -> bool {
        !self.submission_issued
            && matches!(self.phase, SessionPhase::Running | SessionPhase::Warned { .. })
    }

    /// Acknowledge the disclaimer. The question set is frozen here and the clock starts.
    pub fn begin(&mut self, questions: Vec<Question>, now: Instant) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Disclaimer => {
                self.questions = questions;
                self.started_at = Some(now);
                self.remaining = self.duration;
                self.phase = SessionPhase::Running;
                Ok(())
            }
            SessionPhase::Running | SessionPhase::Warned { .. } => Err(SessionError::AlreadyStarted),
            SessionPhase::Blocked | SessionPhase::Finished { .. } => Err(SessionError::Closed),
        }
    }

    pub fn record_answer(
        &mut self,
        question_id: QuestionId,
        answer: String,
        now: Instant,
    ) -> Result<(), SessionError> {
        self.ensure_active()?;
        if self.deadline_passed(now) {
            return Err(SessionError::TimeExpired);
        }
        if !self.questions.iter().any(|question| question.id == question_id) {
            return Err(SessionError::UnknownQuestion(question_id));
        }
        self.answers.insert(question_id, answer);
        Ok(())
    }

    /// Advance the countdown by one tick.
    pub fn tick(&mut self) -> TickVerdict {
        if !self.is_active() {
            return TickVerdict::Stopped;
        }
        self.remaining = self.remaining.saturating_sub(self.tick);
        if self.remaining.is_zero() {
            TickVerdict::Expired
        } else {
            TickVerdict::Continue {
                remaining_seconds: self.remaining.as_secs(),
            }
        }
    }

    /// The environment reported loss of foreground focus.
    pub fn visibility_lost(&mut self) -> VisibilityVerdict {
        if !self.is_active() {
            return VisibilityVerdict::Ignored;
        }
        self.warnings = self.warnings.saturating_add(1);
        if self.warnings <= self.max_warnings {
            self.phase = SessionPhase::Warned {
                warnings: self.warnings,
            };
            VisibilityVerdict::Warned {
                warnings: self.warnings,
                remaining_warnings: self.max_warnings - self.warnings,
            }
        } else {
            self.phase = SessionPhase::Blocked;
            VisibilityVerdict::Blocked
        }
    }

    pub fn dismiss_warning(&mut self) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.phase = SessionPhase::Running;
        Ok(())
    }

    /// Claim the single submission slot of this session.
    ///
    /// Only the first caller gets a draft; every later trigger sees [`SessionError::Reentry`].
    /// A manual submit arriving after the deadline is recorded as timed out, and a blocked
    /// session always submits for integrity.
    pub fn begin_submission(
        &mut self,
        requested: SubmissionReason,
        now: Instant,
    ) -> Result<SubmissionDraft, SessionError> {
        if self.submission_issued {
            return Err(SessionError::Reentry);
        }
        let started_at = match (self.phase, self.started_at) {
            (SessionPhase::Disclaimer, _) | (_, None) => return Err(SessionError::NotStarted),
            (_, Some(started_at)) => started_at,
        };

        let reason = match (self.phase, requested) {
            (SessionPhase::Blocked, _) => SubmissionReason::AutoSubmittedIntegrity,
            (_, SubmissionReason::Manual) if self.deadline_passed(now) => SubmissionReason::TimedOut,
            (_, requested) => requested,
        };

        self.submission_issued = true;
        if self.phase != SessionPhase::Blocked {
            self.phase = SessionPhase::Finished { reason };
        }

        Ok(SubmissionDraft {
            session_id: self.id.clone(),
            application_id: self.application_id.clone(),
            student_id: self.student_id.clone(),
            internship_id: self.internship_id.clone(),
            reason,
            questions: self.questions.clone(),
            answers: self.answers.clone(),
            warnings: self.warnings,
            elapsed: now.saturating_duration_since(started_at),
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            application_id: self.application_id.clone(),
            phase: self.phase,
            remaining_seconds: self.remaining.as_secs(),
            warnings: self.warnings,
            max_warnings: self.max_warnings,
            answered: self.answers.len(),
            total_questions: self.questions.len(),
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.phase {
            _ if self.submission_issued => Err(SessionError::Closed),
            SessionPhase::Disclaimer => Err(SessionError::NotStarted),
            SessionPhase::Running | SessionPhase::Warned { .. } => Ok(()),
            SessionPhase::Blocked | SessionPhase::Finished { .. } => Err(SessionError::Closed),
        }
    }

    fn deadline_passed(&self, now: Instant) -> bool {
        self.started_at
            .map(|started_at| now.saturating_duration_since(started_at) > self.duration)
            .unwrap_or(false)
    }
}
