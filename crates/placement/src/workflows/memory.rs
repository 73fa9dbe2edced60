//! In-process implementations of every storage port, used by the demo server and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::assessment::domain::{Question, SubmissionArtifact};
use super::assessment::repository::{QuestionBank, SubmissionRepository};
use super::lifecycle::counter::RoundTally;
use super::lifecycle::domain::{
    ApplicationId, ApplicationRecord, InternshipId, InternshipListing, StudentId,
};
use super::lifecycle::store::{
    ApplicationRepository, CounterKey, CounterRepository, InternshipCatalog, StoreError,
    SummaryRepository, Versioned,
};
use super::lifecycle::summary::SummaryView;

/// Record store holding applications, summaries, tallies, and submissions in memory.
#[derive(Default)]
pub struct MemoryRecordStore {
    applications: RwLock<HashMap<ApplicationId, ApplicationRecord>>,
    summaries: RwLock<HashMap<(StudentId, InternshipId), SummaryView>>,
    tallies: RwLock<HashMap<CounterKey, Versioned<RoundTally>>>,
    submissions: RwLock<HashMap<ApplicationId, SubmissionArtifact>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationRepository for MemoryRecordStore {
    async fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, StoreError> {
        let mut applications = self.applications.write().await;
        let duplicate = applications.contains_key(&record.id)
            || applications.values().any(|existing| {
                existing.student_id == record.student_id
                    && existing.internship_id == record.internship_id
            });
        if duplicate {
            return Err(StoreError::Conflict);
        }
        applications.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(self.applications.read().await.get(id).cloned())
    }

    async fn save_application(&self, record: ApplicationRecord) -> Result<(), StoreError> {
        self.applications
            .write()
            .await
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn applications_for_internship(
        &self,
        internship_id: &InternshipId,
    ) -> Result<Vec<ApplicationRecord>, StoreError> {
        let mut records: Vec<_> = self
            .applications
            .read()
            .await
            .values()
            .filter(|record| &record.internship_id == internship_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.applied_at.cmp(&b.applied_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }
}

#[async_trait]
impl SummaryRepository for MemoryRecordStore {
    async fn fetch_summary(
        &self,
        student_id: &StudentId,
        internship_id: &InternshipId,
    ) -> Result<Option<SummaryView>, StoreError> {
        let key = (student_id.clone(), internship_id.clone());
        Ok(self.summaries.read().await.get(&key).cloned())
    }

    async fn save_summary(&self, summary: SummaryView) -> Result<(), StoreError> {
        let key = (summary.student_id.clone(), summary.internship_id.clone());
        self.summaries.write().await.insert(key, summary);
        Ok(())
    }

    async fn summaries_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<SummaryView>, StoreError> {
        let mut summaries: Vec<_> = self
            .summaries
            .read()
            .await
            .values()
            .filter(|summary| &summary.student_id == student_id)
            .cloned()
            .collect();
        summaries.sort_by(|a, b| a.internship_id.cmp(&b.internship_id));
        Ok(summaries)
    }
}

#[async_trait]
impl CounterRepository for MemoryRecordStore {
    async fn load_tally(&self, key: &CounterKey) -> Result<Option<Versioned<RoundTally>>, StoreError> {
        Ok(self.tallies.read().await.get(key).cloned())
    }

    async fn compare_and_swap_tally(
        &self,
        key: &CounterKey,
        expected_version: u64,
        tally: RoundTally,
    ) -> Result<u64, StoreError> {
        let mut tallies = self.tallies.write().await;
        let actual = tallies.get(key).map(|stored| stored.version).unwrap_or(0);
        if actual != expected_version {
            return Err(StoreError::VersionMismatch {
                expected: expected_version,
                actual,
            });
        }

        let version = actual + 1;
        tallies.insert(
            key.clone(),
            Versioned {
                version,
                value: tally,
            },
        );
        Ok(version)
    }
}

#[async_trait]
impl SubmissionRepository for MemoryRecordStore {
    async fn insert_submission(&self, artifact: SubmissionArtifact) -> Result<(), StoreError> {
        let mut submissions = self.submissions.write().await;
        if submissions.contains_key(&artifact.application_id) {
            return Err(StoreError::Conflict);
        }
        submissions.insert(artifact.application_id.clone(), artifact);
        Ok(())
    }

    async fn fetch_submission(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<SubmissionArtifact>, StoreError> {
        Ok(self.submissions.read().await.get(application_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryInternshipCatalog {
    listings: HashMap<InternshipId, InternshipListing>,
}

impl MemoryInternshipCatalog {
    pub fn new(listings: impl IntoIterator<Item = InternshipListing>) -> Self {
        Self {
            listings: listings
                .into_iter()
                .map(|listing| (listing.internship_id.clone(), listing))
                .collect(),
        }
    }
}

#[async_trait]
impl InternshipCatalog for MemoryInternshipCatalog {
    async fn listing(
        &self,
        internship_id: &InternshipId,
    ) -> Result<Option<InternshipListing>, StoreError> {
        Ok(self.listings.get(internship_id).cloned())
    }
}

/// Fixed question sets keyed by internship. Unknown internships get an empty set.
#[derive(Debug, Default)]
pub struct MemoryQuestionBank {
    questions: HashMap<InternshipId, Vec<Question>>,
}

impl MemoryQuestionBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_questions(mut self, internship_id: InternshipId, questions: Vec<Question>) -> Self {
        self.questions.insert(internship_id, questions);
        self
    }
}

#[async_trait]
impl QuestionBank for MemoryQuestionBank {
    async fn questions_for(
        &self,
        internship_id: &InternshipId,
    ) -> Result<Vec<Question>, StoreError> {
        Ok(self.questions.get(internship_id).cloned().unwrap_or_default())
    }
}
