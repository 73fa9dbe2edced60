use super::domain::ApplicationStatus;

/// Reason a requested status or round change was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("status {from} is terminal and cannot move to {to}")]
    Terminal {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("status {to} is not reachable from {from}")]
    Unreachable {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("round numbers start at 1")]
    ZeroRound,
    #[error("round {requested} skips ahead of current round {current}")]
    RoundSkipped { current: u32, requested: u32 },
    #[error("round {requested} is behind current round {current}")]
    RoundBehind { current: u32, requested: u32 },
    #[error("offers can only be accepted from selected, not {from}")]
    OfferNotExtended { from: ApplicationStatus },
}

/// Validates status and round movement against the allowed-transition table.
///
/// The registry never derives a status itself: callers state the target they intend,
/// because the same round outcome can legitimately lead to different statuses.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusRegistry;

impl StatusRegistry {
    pub fn validate(
        &self,
        current: ApplicationStatus,
        current_round: u32,
        target: ApplicationStatus,
        round_number: u32,
    ) -> Result<(), TransitionError> {
        if current.is_terminal() && current != target {
            return Err(TransitionError::Terminal {
                from: current,
                to: target,
            });
        }

        if current != target && !Self::allowed_targets(current).contains(&target) {
            return Err(TransitionError::Unreachable {
                from: current,
                to: target,
            });
        }

        Self::validate_round(current_round, round_number)
    }

    /// Offer acceptance is the single exit out of `selected` and bypasses round rules.
    pub fn validate_offer_acceptance(
        &self,
        current: ApplicationStatus,
    ) -> Result<(), TransitionError> {
        match current {
            ApplicationStatus::Selected => Ok(()),
            from => Err(TransitionError::OfferNotExtended { from }),
        }
    }

    fn validate_round(current_round: u32, round_number: u32) -> Result<(), TransitionError> {
        if round_number == 0 {
            return Err(TransitionError::ZeroRound);
        }
        if round_number > current_round + 1 {
            return Err(TransitionError::RoundSkipped {
                current: current_round,
                requested: round_number,
            });
        }
        if round_number < current_round {
            return Err(TransitionError::RoundBehind {
                current: current_round,
                requested: round_number,
            });
        }
        Ok(())
    }

    pub fn allowed_targets(current: ApplicationStatus) -> &'static [ApplicationStatus] {
        use ApplicationStatus::*;

        match current {
            FormPending => &[FormSubmitted, FormApproved, FormRejected, Rejected],
            FormSubmitted => &[FormApproved, FormRejected, Rejected],
            FormApproved => &[
                FormRejected,
                TestAssigned,
                TestSubmitted,
                QuizCompleted,
                QuizApproved,
                QuizRejected,
                Selected,
                Rejected,
            ],
            FormRejected => &[FormApproved, Rejected],
            TestAssigned => &[
                TestSubmitted,
                QuizCompleted,
                QuizApproved,
                QuizRejected,
                Selected,
                Rejected,
            ],
            TestSubmitted => &[QuizCompleted, QuizApproved, QuizRejected, Selected, Rejected],
            QuizCompleted => &[TestSubmitted, QuizApproved, QuizRejected, Selected, Rejected],
            QuizApproved => &[QuizRejected, Selected, Rejected],
            QuizRejected => &[QuizApproved, Rejected],
            Selected | OfferAccepted | Rejected => &[],
        }
    }
}
