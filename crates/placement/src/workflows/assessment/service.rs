use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::domain::{
    QuestionId, QuestionView, SessionId, SubmissionArtifact, SubmissionReason,
};
use super::repository::{QuestionBank, SubmissionRepository};
use super::scoring;
use super::session::{
    AssessmentSession, SessionError, SessionPhase, SessionSnapshot, SubmissionDraft,
    TickVerdict, VisibilityVerdict,
};
use crate::config::AssessmentConfig;
use crate::workflows::lifecycle::coordinator::{
    LifecycleError, RoundEvaluation, RoundTransitionCoordinator,
};
use crate::workflows::lifecycle::domain::{
    ApplicationId, ApplicationStatus, StudentId, ASSESSMENT_ROUND,
};
use crate::workflows::lifecycle::registry::StatusRegistry;
use crate::workflows::lifecycle::store::{ApplicationRepository, StoreError};

/// Error raised by the assessment service.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("assessment session {0} not found")]
    SessionNotFound(SessionId),
    #[error("application {0} already has an assessment in progress")]
    SessionActive(ApplicationId),
    #[error("application {0} has already submitted its assessment")]
    AlreadySubmitted(ApplicationId),
    #[error("no assessment submission recorded for application {0}")]
    SubmissionNotFound(ApplicationId),
    #[error("acknowledge the disclaimer before starting the assessment")]
    NotStarted,
    #[error("question {0} is not part of this assessment")]
    UnknownQuestion(QuestionId),
    #[error("time is up: the assessment was submitted and no more answers are accepted")]
    TimeExpired,
    #[error("the assessment was submitted automatically after leaving the window too many times")]
    IntegrityBlock,
    #[error("application {0} belongs to another student")]
    NotOwner(ApplicationId),
    #[error("assessment session {0} belongs to another student")]
    SessionNotOwned(SessionId),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub application_id: ApplicationId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VisibilityOutcome {
    Warned {
        warnings: u8,
        remaining_warnings: u8,
        notice: String,
    },
    Blocked {
        submission: Option<SubmissionArtifact>,
    },
    Ignored,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatusView {
    Live(SessionSnapshot),
    Closed {
        session_id: SessionId,
        application_id: ApplicationId,
        reason: SubmissionReason,
    },
}

#[derive(Clone)]
enum SessionSlot {
    Live {
        application_id: ApplicationId,
        student_id: StudentId,
        session: Arc<Mutex<AssessmentSession>>,
    },
    Closed {
        application_id: ApplicationId,
        student_id: StudentId,
        reason: SubmissionReason,
    },
}

impl SessionSlot {
    fn student_id(&self) -> &StudentId {
        match self {
            SessionSlot::Live { student_id, .. } | SessionSlot::Closed { student_id, .. } => {
                student_id
            }
        }
    }
}

/// Live sessions indexed by application, plus a bounded tail of closed ones.
#[derive(Default)]
struct SessionTable {
    slots: HashMap<SessionId, SessionSlot>,
    live_by_application: HashMap<ApplicationId, SessionId>,
    closed: VecDeque<SessionId>,
}

impl SessionTable {
    fn get(&self, session_id: &SessionId) -> Option<&SessionSlot> {
        self.slots.get(session_id)
    }

    fn live_for(&self, application_id: &ApplicationId) -> Option<(&SessionId, &SessionSlot)> {
        let session_id = self.live_by_application.get(application_id)?;
        self.slots.get(session_id).map(|slot| (session_id, slot))
    }

    fn open(&mut self, session_id: SessionId, slot: SessionSlot) {
        if let SessionSlot::Live { application_id, .. } = &slot {
            self.live_by_application
                .insert(application_id.clone(), session_id.clone());
        }
        self.slots.insert(session_id, slot);
    }

    /// Replace a live slot with its tombstone, evicting the oldest tombstones past `retention`.
    fn close(&mut self, session_id: &SessionId, reason: SubmissionReason, retention: usize) {
        let (application_id, student_id) = match self.slots.get(session_id) {
            Some(SessionSlot::Live {
                application_id,
                student_id,
                ..
            }) => (application_id.clone(), student_id.clone()),
            Some(SessionSlot::Closed { .. }) | None => return,
        };

        if self.live_by_application.get(&application_id) == Some(session_id) {
            self.live_by_application.remove(&application_id);
        }
        self.slots.insert(
            session_id.clone(),
            SessionSlot::Closed {
                application_id,
                student_id,
                reason,
            },
        );
        self.closed.push_back(session_id.clone());

        while self.closed.len() > retention {
            if let Some(oldest) = self.closed.pop_front() {
                self.slots.remove(&oldest);
                debug!(session_id = %oldest, "evicted closed assessment session");
            }
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Runs proctored assessments and hands their results to the lifecycle coordinator.
///
/// Every trigger (student request, countdown task, visibility monitor) serializes
/// through the session's own lock, so a session produces at most one artifact.
/// Finished sessions stay behind as tombstones recording why they closed, up to
/// [`AssessmentConfig::closed_session_retention`] of them; the persisted
/// [`SubmissionArtifact`] outlives the tombstone.
pub struct AssessmentService<R, Q, S> {
    coordinator: Arc<RoundTransitionCoordinator<R>>,
    questions: Arc<Q>,
    submissions: Arc<S>,
    config: AssessmentConfig,
    sessions: Mutex<SessionTable>,
}

impl<R, Q, S> AssessmentService<R, Q, S>
where
    R: ApplicationRepository + 'static,
    Q: QuestionBank + 'static,
    S: SubmissionRepository + 'static,
{
    pub fn new(
        coordinator: Arc<RoundTransitionCoordinator<R>>,
        questions: Arc<Q>,
        submissions: Arc<S>,
        config: AssessmentConfig,
    ) -> Self {
        Self {
            coordinator,
            questions,
            submissions,
            config,
            sessions: Mutex::new(SessionTable::default()),
        }
    }

    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    /// Open a session in the disclaimer phase. The clock does not run yet.
    ///
    /// A student who already has a live session for the application gets its handle back,
    /// so a lost handle never locks the application out of round 2.
    pub async fn start_assessment(
        &self,
        application_id: &ApplicationId,
        student_id: &StudentId,
    ) -> Result<SessionHandle, AssessmentError> {
        let record = self.coordinator.application(application_id).await?;
        if &record.student_id != student_id {
            return Err(AssessmentError::NotOwner(application_id.clone()));
        }
        StatusRegistry
            .validate(
                record.status,
                record.current_round,
                ApplicationStatus::TestSubmitted,
                ASSESSMENT_ROUND,
            )
            .map_err(LifecycleError::from)?;
        if self
            .submissions
            .fetch_submission(application_id)
            .await?
            .is_some()
        {
            return Err(AssessmentError::AlreadySubmitted(application_id.clone()));
        }

        let mut sessions = self.sessions.lock().await;
        if let Some((session_id, slot)) = sessions.live_for(application_id) {
            if slot.student_id() != student_id {
                return Err(AssessmentError::SessionActive(application_id.clone()));
            }
            debug!(%session_id, %application_id, "returning open assessment session");
            return Ok(SessionHandle {
                session_id: session_id.clone(),
                application_id: application_id.clone(),
            });
        }

        let session_id = SessionId::generate();
        let session = AssessmentSession::new(
            session_id.clone(),
            record.id.clone(),
            record.student_id.clone(),
            record.internship_id.clone(),
            &self.config,
        );
        sessions.open(
            session_id.clone(),
            SessionSlot::Live {
                application_id: record.id.clone(),
                student_id: record.student_id.clone(),
                session: Arc::new(Mutex::new(session)),
            },
        );
        info!(%session_id, %application_id, "assessment session opened");

        Ok(SessionHandle {
            session_id,
            application_id: record.id,
        })
    }

    /// Fails unless `student_id` took the session.
    pub async fn authorize(
        &self,
        session_id: &SessionId,
        student_id: &StudentId,
    ) -> Result<(), AssessmentError> {
        if self.slot(session_id).await?.student_id() == student_id {
            Ok(())
        } else {
            Err(AssessmentError::SessionNotOwned(session_id.clone()))
        }
    }

    /// Accept the disclaimer: freeze a shuffled question set and start the countdown.
    ///
    /// Acknowledging a running session again returns the same questions.
    pub async fn acknowledge(
        self: &Arc<Self>,
        session_id: &SessionId,
    ) -> Result<Vec<QuestionView>, AssessmentError> {
        let session = self.live_session(session_id).await?;
        let mut guard = session.lock().await;

        match guard.phase() {
            SessionPhase::Disclaimer => {}
            SessionPhase::Running | SessionPhase::Warned { .. } if guard.is_active() => {
                return Ok(guard.questions().iter().map(|question| question.view()).collect());
            }
            _ => return Err(closed_error(&guard)),
        }

        let mut questions = self.questions.questions_for(guard.internship_id()).await?;
        {
            let mut rng = rand::thread_rng();
            questions.shuffle(&mut rng);
        }

        guard
            .begin(questions, Instant::now())
            .map_err(|err| session_error(err, &guard))?;
        let views = guard.questions().iter().map(|question| question.view()).collect();
        drop(guard);

        info!(%session_id, duration_secs = self.config.duration.as_secs(), "assessment started");
        self.spawn_countdown(session_id.clone(), session);
        Ok(views)
    }

    pub async fn record_answer(
        &self,
        session_id: &SessionId,
        question_id: QuestionId,
        answer: String,
    ) -> Result<(), AssessmentError> {
        let session = self.live_session(session_id).await?;
        let mut guard = session.lock().await;
        guard
            .record_answer(question_id, answer, Instant::now())
            .map_err(|err| session_error(err, &guard))
    }

    /// Called by the environment whenever the student leaves the assessment window.
    pub async fn report_visibility_loss(
        &self,
        session_id: &SessionId,
    ) -> Result<VisibilityOutcome, AssessmentError> {
        let session = self.live_session(session_id).await?;
        let draft = {
            let mut guard = session.lock().await;
            match guard.visibility_lost() {
                VisibilityVerdict::Ignored => return Ok(VisibilityOutcome::Ignored),
                VisibilityVerdict::Warned {
                    warnings,
                    remaining_warnings,
                } => {
                    warn!(%session_id, warnings, "assessment window lost focus");
                    return Ok(VisibilityOutcome::Warned {
                        warnings,
                        remaining_warnings,
                        notice: warning_notice(warnings, remaining_warnings),
                    });
                }
                VisibilityVerdict::Blocked => {
                    warn!(%session_id, "assessment blocked for integrity");
                    match guard.begin_submission(SubmissionReason::AutoSubmittedIntegrity, Instant::now()) {
                        Ok(draft) => draft,
                        Err(SessionError::Reentry) => {
                            debug!(%session_id, "integrity submission lost the race");
                            return Ok(VisibilityOutcome::Blocked { submission: None });
                        }
                        Err(err) => return Err(session_error(err, &guard)),
                    }
                }
            }
        };

        let artifact = self.complete(draft).await?;
        Ok(VisibilityOutcome::Blocked {
            submission: Some(artifact),
        })
    }

    pub async fn dismiss_warning(&self, session_id: &SessionId) -> Result<(), AssessmentError> {
        let session = self.live_session(session_id).await?;
        let mut guard = session.lock().await;
        guard
            .dismiss_warning()
            .map_err(|err| session_error(err, &guard))
    }

    /// Manual submission. Returns `None` when another trigger already submitted.
    pub async fn submit_assessment(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SubmissionArtifact>, AssessmentError> {
        let session = match self.slot(session_id).await? {
            SessionSlot::Live { session, .. } => session,
            SessionSlot::Closed { .. } => {
                debug!(%session_id, "submit ignored for closed session");
                return Ok(None);
            }
        };

        let draft = {
            let mut guard = session.lock().await;
            match guard.begin_submission(SubmissionReason::Manual, Instant::now()) {
                Ok(draft) => draft,
                Err(SessionError::Reentry) => {
                    debug!(%session_id, "submit lost the race to another trigger");
                    return Ok(None);
                }
                Err(err) => return Err(session_error(err, &guard)),
            }
        };

        self.complete(draft).await.map(Some)
    }

    pub async fn session_status(
        &self,
        session_id: &SessionId,
    ) -> Result<SessionStatusView, AssessmentError> {
        match self.slot(session_id).await? {
            SessionSlot::Live { session, .. } => Ok(SessionStatusView::Live(session.lock().await.snapshot())),
            SessionSlot::Closed {
                application_id,
                reason,
                ..
            } => Ok(SessionStatusView::Closed {
                session_id: session_id.clone(),
                application_id,
                reason,
            }),
        }
    }

    pub async fn submission(
        &self,
        application_id: &ApplicationId,
    ) -> Result<SubmissionArtifact, AssessmentError> {
        self.submissions
            .fetch_submission(application_id)
            .await?
            .ok_or_else(|| AssessmentError::SubmissionNotFound(application_id.clone()))
    }

    fn spawn_countdown(self: &Arc<Self>, session_id: SessionId, session: Arc<Mutex<AssessmentSession>>) {
        let service = Arc::clone(self);
        let tick = self.config.tick.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let draft = {
                    let mut guard = session.lock().await;
                    match guard.tick() {
                        TickVerdict::Continue { .. } => continue,
                        TickVerdict::Stopped => break,
                        TickVerdict::Expired => {
                            match guard.begin_submission(SubmissionReason::TimedOut, Instant::now()) {
                                Ok(draft) => draft,
                                Err(err) => {
                                    debug!(%session_id, error = %err, "countdown expired after submission");
                                    break;
                                }
                            }
                        }
                    }
                };

                info!(%session_id, "assessment time expired");
                if let Err(err) = service.complete(draft).await {
                    warn!(%session_id, error = %err, "timed out submission failed");
                }
                break;
            }
        });
    }

    /// Grade, persist, and advance the application. Runs once per session.
    async fn complete(&self, draft: SubmissionDraft) -> Result<SubmissionArtifact, AssessmentError> {
        let session_id = draft.session_id.clone();
        let application_id = draft.application_id.clone();
        let reason = draft.reason;

        let result = self.persist_and_advance(draft).await;
        self.sessions
            .lock()
            .await
            .close(&session_id, reason, self.config.closed_session_retention);

        match &result {
            Ok(artifact) => info!(
                %session_id,
                %application_id,
                %reason,
                score = artifact.score,
                total = artifact.total_possible_points,
                "assessment submitted"
            ),
            Err(err) => warn!(%session_id, %application_id, error = %err, "assessment submission failed"),
        }
        result
    }

    async fn persist_and_advance(
        &self,
        draft: SubmissionDraft,
    ) -> Result<SubmissionArtifact, AssessmentError> {
        let card = scoring::score(&draft.questions, &draft.answers);
        let artifact = SubmissionArtifact {
            application_id: draft.application_id,
            student_id: draft.student_id,
            internship_id: draft.internship_id,
            session_id: draft.session_id,
            reason: draft.reason,
            answers: card.answers,
            score: card.score,
            total_possible_points: card.total_possible_points,
            percentage: card.percentage,
            warnings: draft.warnings,
            time_spent_seconds: draft.elapsed.as_secs(),
            submitted_at: chrono::Utc::now(),
        };

        self.submissions
            .insert_submission(artifact.clone())
            .await
            .map_err(|err| match err {
                StoreError::Conflict => AssessmentError::AlreadySubmitted(artifact.application_id.clone()),
                other => AssessmentError::Store(other),
            })?;

        let evaluation = RoundEvaluation {
            target_status: ApplicationStatus::TestSubmitted,
            round_number: ASSESSMENT_ROUND,
            outcome: self.config.outcome_policy.outcome_for(artifact.percentage),
            feedback: format!(
                "score {}/{} ({}%)",
                artifact.score, artifact.total_possible_points, artifact.percentage
            ),
            evaluator_id: None,
        };
        self.coordinator
            .apply_round_outcome(&artifact.application_id, evaluation)
            .await?;

        Ok(artifact)
    }

    /// Sessions currently tracked, live and closed.
    pub async fn tracked_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn slot(&self, session_id: &SessionId) -> Result<SessionSlot, AssessmentError> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| AssessmentError::SessionNotFound(session_id.clone()))
    }

    async fn live_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Arc<Mutex<AssessmentSession>>, AssessmentError> {
        match self.slot(session_id).await? {
            SessionSlot::Live { session, .. } => Ok(session),
            SessionSlot::Closed {
                application_id,
                reason,
                ..
            } => Err(closed_reason_error(reason, application_id)),
        }
    }
}

fn warning_notice(warnings: u8, remaining_warnings: u8) -> String {
    match remaining_warnings {
        0 => format!(
            "Warning {warnings}: you left the assessment window. Leaving again submits your assessment automatically."
        ),
        remaining => format!(
            "Warning {warnings}: you left the assessment window. {remaining} more and your assessment is submitted automatically."
        ),
    }
}

fn closed_reason_error(reason: SubmissionReason, application_id: ApplicationId) -> AssessmentError {
    match reason {
        SubmissionReason::AutoSubmittedIntegrity => AssessmentError::IntegrityBlock,
        SubmissionReason::TimedOut => AssessmentError::TimeExpired,
        SubmissionReason::Manual => AssessmentError::AlreadySubmitted(application_id),
    }
}

fn closed_error(session: &AssessmentSession) -> AssessmentError {
    match session.phase() {
        SessionPhase::Blocked => AssessmentError::IntegrityBlock,
        SessionPhase::Finished { reason } => {
            closed_reason_error(reason, session.application_id().clone())
        }
        _ => AssessmentError::AlreadySubmitted(session.application_id().clone()),
    }
}

fn session_error(err: SessionError, session: &AssessmentSession) -> AssessmentError {
    match err {
        SessionError::NotStarted => AssessmentError::NotStarted,
        SessionError::AlreadyStarted => {
            AssessmentError::SessionActive(session.application_id().clone())
        }
        SessionError::UnknownQuestion(question_id) => AssessmentError::UnknownQuestion(question_id),
        SessionError::TimeExpired => AssessmentError::TimeExpired,
        SessionError::Closed | SessionError::Reentry => closed_error(session),
    }
}
