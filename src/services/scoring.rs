// src/services/scoring.rs

use crate::models::question::{Question, QuestionType};
use crate::models::submission::{AnswerMap, ReviewEntry};

/// Outcome of scoring one attempt.
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub score: i32,
    pub total_marks: i32,
    /// 0-100, rounded to 2 decimals. Defined as 0 for an assignment with
    /// no active questions.
    pub percentage: f64,
    pub review_data: Vec<ReviewEntry>,
}

/// Scores a set of answers against the attempt's questions.
///
/// Pure function: no storage access, no side effects. Single-choice is
/// correct when the one selected letter is in the answer key
/// (case-insensitive); multiple-choice requires exact set equality, with
/// no partial credit for subsets. Unanswered questions score zero but
/// still appear in the review data.
pub fn calculate_score(questions: &[Question], answers: &AnswerMap) -> ScoreBreakdown {
    let mut score = 0;
    let mut total_marks = 0;
    let mut review_data = Vec::with_capacity(questions.len());

    for question in questions {
        total_marks += question.marks;

        let answer = answers.get(&question.id);
        let selected = answer.map(|a| a.keys()).unwrap_or_default();

        let correct = match question.question_type {
            QuestionType::Single => {
                selected.len() == 1
                    && selected
                        .first()
                        .is_some_and(|k| question.correct_answers.contains(k))
            }
            QuestionType::Multiple => {
                !selected.is_empty() && selected == question.correct_answers
            }
        };

        let marks_obtained = if correct { question.marks } else { 0 };
        score += marks_obtained;

        review_data.push(ReviewEntry {
            question_id: question.id,
            correct,
            student_answer: answer.cloned(),
            correct_answers: question.correct_answers.iter().copied().collect(),
            marks_obtained,
            question_marks: question.marks,
            explanation: question.explanation.clone(),
        });
    }

    let percentage = if total_marks > 0 {
        round2(f64::from(score) / f64::from(total_marks) * 100.0)
    } else {
        0.0
    };

    ScoreBreakdown {
        score,
        total_marks,
        percentage,
        review_data,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
