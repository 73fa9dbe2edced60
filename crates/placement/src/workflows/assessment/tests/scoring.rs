use std::collections::BTreeMap;

use super::common::*;
use crate::workflows::assessment::domain::{Question, QuestionId};
use crate::workflows::assessment::scoring::{is_correct, normalize_free_text, percentage, score};

fn all_correct() -> BTreeMap<QuestionId, String> {
    questions()
        .iter()
        .map(|question| (question.id.clone(), correct_answer(&question.id).to_string()))
        .collect()
}

#[test]
fn three_of_four_scores_seventy_five_percent() {
    let mut answers = all_correct();
    answers.insert(QuestionId("q-trait".to_string()), "Debug".to_string());

    let card = score(&questions(), &answers);
    assert_eq!(card.score, 3);
    assert_eq!(card.total_possible_points, 4);
    assert_eq!(card.percentage, 75);
    assert_eq!(card.answers.len(), 4);
    assert_eq!(card.answers.iter().filter(|line| line.is_correct).count(), 3);
}

#[test]
fn unanswered_questions_score_nothing() {
    let card = score(&questions(), &BTreeMap::new());
    assert_eq!(card.score, 0);
    assert_eq!(card.percentage, 0);
    assert!(card.answers.iter().all(|line| line.user_answer.is_none() && !line.is_correct));
}

#[test]
fn free_text_ignores_case_and_spacing() {
    assert_eq!(normalize_free_text("  Zero   Cost\tAbstractions "), "zero cost abstractions");
    let question = Question::free_text("q", "Motto?", "zero cost abstractions");
    assert!(is_correct(&question, "ZERO cost   abstractions"));
    assert!(!is_correct(&question, "zero-cost abstractions"));
}

#[test]
fn multiple_choice_accepts_any_listed_correct_option() {
    let question = Question::multiple_choice("q", "Shared?", &["Box", "Rc", "Arc"], &["Rc", "Arc"]);
    assert!(is_correct(&question, "Rc"));
    assert!(is_correct(&question, " Arc "));
    assert!(!is_correct(&question, "Box"));
    assert!(!is_correct(&question, "rc"));
}

#[test]
fn weighted_questions_contribute_their_points() {
    let questions = vec![
        Question::free_text("easy", "1 + 1?", "2"),
        Question::free_text("hard", "Halting?", "undecidable").worth(3),
    ];
    let mut answers = BTreeMap::new();
    answers.insert(QuestionId("hard".to_string()), "Undecidable".to_string());

    let card = score(&questions, &answers);
    assert_eq!(card.score, 3);
    assert_eq!(card.total_possible_points, 4);
    assert_eq!(card.percentage, 75);
}

#[test]
fn percentage_rounds_and_handles_empty_sets() {
    assert_eq!(percentage(0, 0), 0);
    assert_eq!(percentage(2, 3), 67);
    assert_eq!(percentage(1, 3), 33);
    assert_eq!(percentage(5, 5), 100);
}

#[test]
fn oversized_weights_saturate_instead_of_overflowing() {
    let questions = vec![
        Question::free_text("heavy", "Heavy?", "yes").worth(u32::MAX),
        Question::free_text("heavier", "Heavier?", "yes").worth(u32::MAX),
        Question::free_text("light", "Light?", "yes"),
    ];
    let mut answers = BTreeMap::new();
    answers.insert(QuestionId("heavy".to_string()), "yes".to_string());
    answers.insert(QuestionId("heavier".to_string()), "yes".to_string());

    let card = score(&questions, &answers);
    assert_eq!(card.total_possible_points, u32::MAX);
    assert_eq!(card.score, u32::MAX);
    assert_eq!(card.percentage, 100);
}
