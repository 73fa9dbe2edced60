use std::sync::Arc;

use super::common::*;
use crate::workflows::lifecycle::domain::{ApplicationStatus, InternshipId, RoundOutcome};
use crate::workflows::lifecycle::summary::{ProjectionError, RoundResult, SummaryProjector};
use crate::workflows::memory::{MemoryInternshipCatalog, MemoryRecordStore};

fn projector() -> SummaryProjector<MemoryRecordStore, MemoryInternshipCatalog> {
    SummaryProjector::new(
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryInternshipCatalog::new([listing()])),
    )
}

#[tokio::test]
async fn first_projection_copies_catalog_fields() {
    let projector = projector();
    projector
        .project(
            &student("ada"),
            &internship(),
            ApplicationStatus::FormApproved,
            1,
            RoundOutcome::Passed,
        )
        .await
        .expect("projection lands");

    let summaries = projector
        .summaries_for_student(&student("ada"))
        .await
        .expect("summaries load");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].internship_title, "Backend Engineering Intern");
    assert_eq!(summaries[0].company_name, "Northwind Labs");
    assert_eq!(
        summaries[0].round_results,
        vec![RoundResult {
            round: 1,
            status: RoundOutcome::Passed
        }]
    );
}

#[tokio::test]
async fn reprojection_replaces_the_round_result() {
    let projector = projector();
    for (status, outcome) in [
        (ApplicationStatus::FormSubmitted, RoundOutcome::Pending),
        (ApplicationStatus::FormRejected, RoundOutcome::Failed),
    ] {
        projector
            .project(&student("ada"), &internship(), status, 1, outcome)
            .await
            .expect("projection lands");
    }

    let summary = projector
        .summaries_for_student(&student("ada"))
        .await
        .expect("summaries load")
        .remove(0);
    assert_eq!(summary.status, ApplicationStatus::FormRejected);
    assert_eq!(summary.round_results.len(), 1);
    assert_eq!(summary.round_results[0].status, RoundOutcome::Failed);
}

#[tokio::test]
async fn unknown_internship_cannot_be_projected() {
    let projector = projector();
    let unknown = InternshipId("int-retired".to_string());

    match projector
        .project(
            &student("ada"),
            &unknown,
            ApplicationStatus::FormApproved,
            1,
            RoundOutcome::Passed,
        )
        .await
    {
        Err(ProjectionError::InternshipNotFound(id)) => assert_eq!(id, unknown),
        other => panic!("expected missing internship, got {other:?}"),
    }
}

#[tokio::test]
async fn summaries_are_scoped_to_the_student() {
    let projector = projector();
    for name in ["ada", "grace"] {
        projector
            .project(
                &student(name),
                &internship(),
                ApplicationStatus::FormSubmitted,
                1,
                RoundOutcome::Pending,
            )
            .await
            .expect("projection lands");
    }

    let summaries = projector
        .summaries_for_student(&student("grace"))
        .await
        .expect("summaries load");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].student_id, student("grace"));
}

#[tokio::test]
async fn status_only_projection_keeps_round_results() {
    let projector = projector();
    projector
        .project(
            &student("ada"),
            &internship(),
            ApplicationStatus::Selected,
            3,
            RoundOutcome::Passed,
        )
        .await
        .expect("projection lands");
    projector
        .project_status(&student("ada"), &internship(), ApplicationStatus::OfferAccepted)
        .await
        .expect("status lands");

    let summary = projector
        .summaries_for_student(&student("ada"))
        .await
        .expect("summaries load")
        .remove(0);
    assert_eq!(summary.status, ApplicationStatus::OfferAccepted);
    assert_eq!(summary.current_round, 3);
    assert_eq!(summary.round_results.len(), 1);
}
