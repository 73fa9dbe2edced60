use crate::infra::{demo_answers, demo_catalog, demo_question_bank, DEMO_INTERNSHIP};
use clap::Args;
use placement::config::{AssessmentConfig, CounterConfig};
use placement::error::AppError;
use placement::workflows::assessment::{OutcomePolicy, SubmissionArtifact, VisibilityOutcome};
use placement::workflows::lifecycle::{
    ApplicationStatus, EvaluatorId, InternshipId, RoundEvaluation, RoundOutcome, StudentId,
    ASSESSMENT_ROUND, FORM_ROUND,
};
use placement::workflows::memory::MemoryRecordStore;
use placement::workflows::Placement;
use std::sync::Arc;

const DEMO_REVIEWER: &str = "fac-demo";
const REVIEW_PASS_PERCENTAGE: u8 = 60;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Student identifier used for the walkthrough.
    #[arg(long, default_value = "stu-demo")]
    pub(crate) student: String,
    /// Number of times the candidate leaves the assessment window before submitting.
    #[arg(long, default_value_t = 1)]
    pub(crate) focus_losses: u8,
    /// Let the assessment score decide round 2 instead of leaving it for review.
    #[arg(long)]
    pub(crate) pass_mark: Option<u8>,
    /// Stop once the assessment is submitted.
    #[arg(long)]
    pub(crate) skip_review: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        student,
        focus_losses,
        pass_mark,
        skip_review,
    } = args;

    let outcome_policy = match pass_mark {
        Some(minimum_percentage) => OutcomePolicy::PassMark {
            minimum_percentage: minimum_percentage.min(100),
        },
        None => OutcomePolicy::PendingReview,
    };
    let placement = Placement::new(
        Arc::new(MemoryRecordStore::new()),
        Arc::new(demo_catalog()),
        Arc::new(demo_question_bank()),
        AssessmentConfig {
            outcome_policy,
            ..AssessmentConfig::default()
        },
        CounterConfig::default(),
    );
    let coordinator = &placement.lifecycle.coordinator;
    let assessments = &placement.assessments;
    let student_id = StudentId(student);
    let internship_id = InternshipId(DEMO_INTERNSHIP.to_string());

    println!("Internship placement demo");
    let record = coordinator
        .open_application(student_id.clone(), internship_id.clone())
        .await?;
    println!(
        "- Opened application {} for {} -> {}",
        record.id, internship_id, record.status
    );

    let report = coordinator
        .apply_round_outcome(
            &record.id,
            RoundEvaluation {
                target_status: ApplicationStatus::FormApproved,
                round_number: FORM_ROUND,
                outcome: RoundOutcome::Passed,
                feedback: "Motivation letter and CV look solid".to_string(),
                evaluator_id: Some(EvaluatorId(DEMO_REVIEWER.to_string())),
            },
        )
        .await?;
    println!(
        "- Round {} reviewed by {} -> {}",
        FORM_ROUND, DEMO_REVIEWER, report.record.status
    );

    println!("\nProctored assessment");
    let handle = assessments
        .start_assessment(&record.id, &student_id)
        .await?;
    let questions = assessments.acknowledge(&handle.session_id).await?;
    println!(
        "- Session {} started: {} questions, {} minutes, {} warnings allowed",
        handle.session_id,
        questions.len(),
        assessments.config().duration.as_secs() / 60,
        assessments.config().max_warnings
    );

    for (question_id, answer) in demo_answers() {
        assessments
            .record_answer(&handle.session_id, question_id, answer.to_string())
            .await?;
    }
    println!("- Answered {} questions", questions.len());

    let mut submission: Option<SubmissionArtifact> = None;
    for _ in 0..focus_losses {
        match assessments.report_visibility_loss(&handle.session_id).await? {
            VisibilityOutcome::Warned { notice, .. } => {
                println!("  ! {notice}");
                assessments.dismiss_warning(&handle.session_id).await?;
            }
            VisibilityOutcome::Blocked { submission: blocked } => {
                println!("  ! Window left too often; the assessment was submitted automatically");
                submission = blocked;
                break;
            }
            VisibilityOutcome::Ignored => {}
        }
    }

    if submission.is_none() {
        submission = assessments.submit_assessment(&handle.session_id).await?;
    }
    let submission = match submission {
        Some(submission) => submission,
        None => assessments.submission(&record.id).await?,
    };
    println!(
        "- Submitted ({}) with {} warning(s): {}/{} points ({}%) in {}s",
        submission.reason,
        submission.warnings,
        submission.score,
        submission.total_possible_points,
        submission.percentage,
        submission.time_spent_seconds
    );
    for line in &submission.answers {
        println!(
            "    - {} [{}] {}",
            line.question_id,
            if line.is_correct { "correct" } else { "incorrect" },
            line.user_answer.as_deref().unwrap_or("(no answer)")
        );
    }

    let current = coordinator.application(&record.id).await?;
    let assessment_outcome = current
        .round(ASSESSMENT_ROUND)
        .map(|round| round.status)
        .unwrap_or(RoundOutcome::Pending);
    println!(
        "- Application now {} (round {} {})",
        current.status, ASSESSMENT_ROUND, assessment_outcome
    );

    if !skip_review && assessment_outcome == RoundOutcome::Pending {
        let passed = submission.percentage >= REVIEW_PASS_PERCENTAGE;
        let (target_status, outcome) = if passed {
            (ApplicationStatus::QuizCompleted, RoundOutcome::Passed)
        } else {
            (ApplicationStatus::QuizRejected, RoundOutcome::Failed)
        };
        let report = coordinator
            .apply_round_outcome(
                &record.id,
                RoundEvaluation {
                    target_status,
                    round_number: ASSESSMENT_ROUND,
                    outcome,
                    feedback: format!("Reviewed at {}%", submission.percentage),
                    evaluator_id: Some(EvaluatorId(DEMO_REVIEWER.to_string())),
                },
            )
            .await?;
        println!(
            "- Reviewer marked round {} {} -> {}",
            ASSESSMENT_ROUND, outcome, report.record.status
        );
    }

    println!("\nStudent dashboard");
    match placement
        .lifecycle
        .summaries
        .summaries_for_student(&student_id)
        .await
    {
        Ok(summaries) => {
            for summary in summaries {
                println!(
                    "- {} at {}: {} (round {})",
                    summary.internship_title,
                    summary.company_name,
                    summary.status,
                    summary.current_round
                );
                for result in &summary.round_results {
                    println!("    - round {}: {}", result.round, result.status);
                }
            }
        }
        Err(err) => println!("  Summaries unavailable: {err}"),
    }

    println!("\nRound counters for {internship_id}");
    for round_number in [FORM_ROUND, ASSESSMENT_ROUND] {
        match placement
            .lifecycle
            .counter
            .tally(&internship_id, round_number)
            .await
        {
            Ok(tally) => println!(
                "- Round {}: {} applicants | {} passed | {} rejected | {} pending",
                round_number, tally.total_applicants, tally.passed, tally.rejected, tally.pending
            ),
            Err(err) => println!("- Round {round_number}: unavailable ({err})"),
        }
    }

    Ok(())
}
