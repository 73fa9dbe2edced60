use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::coordinator::{HandlerError, RoundEventHandler};
use super::domain::{InternshipId, LifecycleEvent, RoundOutcome};
use super::store::{CounterKey, CounterRepository, StoreError};
use crate::config::CounterConfig;

/// Pass/fail/pending tally for one internship round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTally {
    pub internship_id: InternshipId,
    pub round_number: u32,
    pub total_applicants: u64,
    pub passed: u64,
    pub rejected: u64,
    pub pending: u64,
}

impl RoundTally {
    pub fn empty(key: &CounterKey) -> Self {
        Self {
            internship_id: key.internship_id.clone(),
            round_number: key.round_number,
            total_applicants: 0,
            passed: 0,
            rejected: 0,
            pending: 0,
        }
    }

    fn bucket_mut(&mut self, outcome: RoundOutcome) -> &mut u64 {
        match outcome {
            RoundOutcome::Pending => &mut self.pending,
            RoundOutcome::Passed => &mut self.passed,
            RoundOutcome::Failed => &mut self.rejected,
        }
    }

    /// Folds one evaluation into the tally. A re-evaluation moves the application from its
    /// old bucket into the new one instead of counting it twice. Returns whether anything
    /// changed.
    pub fn apply(&mut self, outcome: RoundOutcome, previous: Option<RoundOutcome>) -> bool {
        match previous {
            None => {
                self.total_applicants += 1;
                *self.bucket_mut(outcome) += 1;
                true
            }
            Some(previous) if previous == outcome => false,
            Some(previous) => {
                let old = self.bucket_mut(previous);
                *old = old.saturating_sub(1);
                *self.bucket_mut(outcome) += 1;
                true
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    #[error("counter update lost the race {attempts} times")]
    Contention { attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Maintains [`RoundTally`] cells with a compare-and-swap retry loop so concurrent
/// evaluators never lose an increment.
pub struct AggregateCounter<C> {
    counters: Arc<C>,
    max_retries: u32,
}

impl<C> AggregateCounter<C>
where
    C: CounterRepository + 'static,
{
    pub fn new(counters: Arc<C>, config: CounterConfig) -> Self {
        Self {
            counters,
            max_retries: config.max_retries.max(1),
        }
    }

    pub async fn record_outcome(
        &self,
        internship_id: &InternshipId,
        round_number: u32,
        outcome: RoundOutcome,
        previous: Option<RoundOutcome>,
    ) -> Result<RoundTally, CounterError> {
        let key = CounterKey {
            internship_id: internship_id.clone(),
            round_number,
        };

        for attempt in 1..=self.max_retries {
            let (version, mut tally) = match self.counters.load_tally(&key).await? {
                Some(stored) => (stored.version, stored.value),
                None => (0, RoundTally::empty(&key)),
            };

            if !tally.apply(outcome, previous) {
                return Ok(tally);
            }

            match self
                .counters
                .compare_and_swap_tally(&key, version, tally.clone())
                .await
            {
                Ok(_) => return Ok(tally),
                Err(StoreError::VersionMismatch { expected, actual }) => {
                    debug!(%internship_id, round_number, attempt, expected, actual, "tally moved underneath us, retrying");
                    tokio::task::yield_now().await;
                }
                Err(other) => return Err(other.into()),
            }
        }

        warn!(%internship_id, round_number, attempts = self.max_retries, "giving up on contended tally");
        Err(CounterError::Contention {
            attempts: self.max_retries,
        })
    }

    /// Current tally for a round; rounds nobody has been evaluated in read as zero.
    pub async fn tally(
        &self,
        internship_id: &InternshipId,
        round_number: u32,
    ) -> Result<RoundTally, CounterError> {
        let key = CounterKey {
            internship_id: internship_id.clone(),
            round_number,
        };
        Ok(self
            .counters
            .load_tally(&key)
            .await?
            .map(|stored| stored.value)
            .unwrap_or_else(|| RoundTally::empty(&key)))
    }
}

#[async_trait]
impl<C> RoundEventHandler for AggregateCounter<C>
where
    C: CounterRepository + 'static,
{
    fn name(&self) -> &'static str {
        "aggregate_counter"
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<(), HandlerError> {
        match event {
            LifecycleEvent::RoundEvaluated(evaluated) => {
                self.record_outcome(
                    &evaluated.internship_id,
                    evaluated.round_number,
                    evaluated.outcome,
                    evaluated.previous_outcome,
                )
                .await?;
                Ok(())
            }
            LifecycleEvent::OfferAccepted { .. } => Ok(()),
        }
    }
}
