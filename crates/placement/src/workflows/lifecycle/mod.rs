//! Multi-round application lifecycle.
//!
//! The [`RoundTransitionCoordinator`] owns the canonical [`ApplicationRecord`]. Every write
//! it makes is followed by a [`LifecycleEvent`] fanned out to the registered
//! [`RoundEventHandler`]s, which keep the student summaries and the per-round tallies
//! current. Handler failures are reported, never rolled back.

pub mod coordinator;
pub mod counter;
pub mod domain;
pub mod identity;
pub mod registry;
pub mod router;
pub mod store;
pub mod summary;

#[cfg(test)]
mod tests;

pub use coordinator::{
    HandlerError, LifecycleError, ProjectionFailure, RoundEvaluation, RoundEventHandler,
    RoundTransitionCoordinator, TransitionReport,
};
pub use counter::{AggregateCounter, CounterError, RoundTally};
pub use domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, EvaluatorId, InternshipId,
    InternshipListing, LifecycleEvent, RoundEvaluated, RoundOutcome, RoundRecord, StudentId,
    UserIdentity, ASSESSMENT_ROUND, FORM_ROUND,
};
pub use identity::HeaderIdentity;
pub use registry::{StatusRegistry, TransitionError};
pub use router::{lifecycle_router, LifecycleState};
pub use store::{
    ApplicationRepository, CounterKey, CounterRepository, IdentityProvider, InternshipCatalog,
    StoreError, SummaryRepository, Versioned,
};
pub use summary::{ProjectionError, RoundResult, SummaryProjector, SummaryView};
