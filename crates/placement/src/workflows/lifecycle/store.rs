//! Storage ports the lifecycle engine reads and writes through.
//!
//! Each record family gets its own trait so the coordinator and the projectors can be
//! exercised against isolated fakes. Concrete stores implement all of them; see
//! [`crate::workflows::memory::MemoryRecordStore`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::counter::RoundTally;
use super::domain::{
    ApplicationId, ApplicationRecord, InternshipId, InternshipListing, StudentId, UserIdentity,
};
use super::summary::SummaryView;

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("version mismatch: expected {expected}, actual {actual}")]
    VersionMismatch { expected: u64, actual: u64 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Canonical application records. Writes are last-writer-wins.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the student already applied to the internship.
    async fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, StoreError>;
    async fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError>;
    async fn save_application(&self, record: ApplicationRecord) -> Result<(), StoreError>;
    async fn applications_for_internship(
        &self,
        internship_id: &InternshipId,
    ) -> Result<Vec<ApplicationRecord>, StoreError>;
}

/// Per-student dashboard projections.
#[async_trait]
pub trait SummaryRepository: Send + Sync {
    async fn fetch_summary(
        &self,
        student_id: &StudentId,
        internship_id: &InternshipId,
    ) -> Result<Option<SummaryView>, StoreError>;
    async fn save_summary(&self, summary: SummaryView) -> Result<(), StoreError>;
    async fn summaries_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<SummaryView>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CounterKey {
    pub internship_id: InternshipId,
    pub round_number: u32,
}

/// A stored value together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Contended tally cells, updated with optimistic concurrency.
#[async_trait]
pub trait CounterRepository: Send + Sync {
    async fn load_tally(&self, key: &CounterKey) -> Result<Option<Versioned<RoundTally>>, StoreError>;

    /// Stores `tally` only if the cell is still at `expected_version` (0 for a missing cell),
    /// otherwise fails with [`StoreError::VersionMismatch`].
    async fn compare_and_swap_tally(
        &self,
        key: &CounterKey,
        expected_version: u64,
        tally: RoundTally,
    ) -> Result<u64, StoreError>;
}

/// Read-only internship catalog used for denormalized display fields.
#[async_trait]
pub trait InternshipCatalog: Send + Sync {
    async fn listing(
        &self,
        internship_id: &InternshipId,
    ) -> Result<Option<InternshipListing>, StoreError>;
}

/// Authentication collaborator. Only the identity of the caller is consumed.
pub trait IdentityProvider {
    fn current_user(&self) -> Option<UserIdentity>;
}
