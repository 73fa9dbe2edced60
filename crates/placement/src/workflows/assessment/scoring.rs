use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{AnsweredQuestion, Question, QuestionId, QuestionKind};

/// Raw result of grading a session. Pass/fail is decided elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreCard {
    pub answers: Vec<AnsweredQuestion>,
    pub score: u32,
    pub total_possible_points: u32,
    pub percentage: u8,
}

/// Lowercases and collapses every whitespace run to a single space.
pub fn normalize_free_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn is_correct(question: &Question, answer: &str) -> bool {
    match &question.kind {
        QuestionKind::MultipleChoice { correct, .. } => {
            let answer = answer.trim();
            correct.iter().any(|option| option.trim() == answer)
        }
        QuestionKind::FreeText { expected } => {
            normalize_free_text(answer) == normalize_free_text(expected)
        }
    }
}

pub fn percentage(score: u32, total_possible_points: u32) -> u8 {
    if total_possible_points == 0 {
        return 0;
    }
    let ratio = f64::from(score) * 100.0 / f64::from(total_possible_points);
    ratio.round().clamp(0.0, 100.0) as u8
}

/// Point totals saturate at `u32::MAX` instead of wrapping.
pub fn score(questions: &[Question], answers: &BTreeMap<QuestionId, String>) -> ScoreCard {
    let mut score: u32 = 0;
    let mut total_possible_points: u32 = 0;
    let mut graded = Vec::with_capacity(questions.len());

    for question in questions {
        let user_answer = answers.get(&question.id).cloned();
        let correct = user_answer
            .as_deref()
            .map(|answer| is_correct(question, answer))
            .unwrap_or(false);

        total_possible_points = total_possible_points.saturating_add(question.points);
        if correct {
            score = score.saturating_add(question.points);
        }

        graded.push(AnsweredQuestion {
            question_id: question.id.clone(),
            question_text: question.prompt.clone(),
            user_answer,
            is_correct: correct,
            points: question.points,
        });
    }

    ScoreCard {
        answers: graded,
        score,
        total_possible_points,
        percentage: percentage(score, total_possible_points),
    }
}
