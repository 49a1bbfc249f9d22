//! Scoring of a single submission against a quiz's answer key.

use serde::Serialize;

use crate::constants::{OPTION_COUNT, UNANSWERED};
use crate::error::QuizError;
use crate::types::{Question, Score};

/// Per-question outcome returned to the respondent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_index: usize,
    pub question: String,
    pub user_answer: i8,
    pub correct_answer: u8,
    pub is_correct: bool,
    pub explanation: String,
}

/// Score plus the per-question breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scorecard {
    pub score: Score,
    pub results: Vec<QuestionResult>,
}

/// `round(part / whole * 100)` with halves rounded up; 0 when `whole` is 0
pub fn percentage(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part * 200 + whole) / (whole * 2)) as u32
}

/// Check that every answer is a valid option index or `UNANSWERED`
pub fn validate_answer_values(answers: &[i64]) -> Result<Vec<i8>, QuizError> {
    answers
        .iter()
        .enumerate()
        .map(|(i, &a)| {
            if (UNANSWERED as i64..OPTION_COUNT as i64).contains(&a) {
                Ok(a as i8)
            } else {
                Err(QuizError::Validation(format!(
                    "Answer {} must be between {} and {}",
                    i + 1,
                    UNANSWERED,
                    OPTION_COUNT - 1
                )))
            }
        })
        .collect()
}

/// Score `answers` against `questions`.
///
/// Lengths must match. An answer is correct only on exact equality with the
/// stored index, so `UNANSWERED` never scores.
pub fn score_submission(questions: &[Question], answers: &[i8]) -> Result<Scorecard, QuizError> {
    if answers.len() != questions.len() {
        return Err(QuizError::InvalidAnswers {
            expected: questions.len(),
            actual: answers.len(),
        });
    }

    let results: Vec<QuestionResult> = questions
        .iter()
        .zip(answers)
        .enumerate()
        .map(|(index, (question, &answer))| QuestionResult {
            question_index: index,
            question: question.text.clone(),
            user_answer: answer,
            correct_answer: question.correct_option_index,
            is_correct: answer >= 0 && answer as u8 == question.correct_option_index,
            explanation: question.explanation.clone(),
        })
        .collect();

    let correct = results.iter().filter(|r| r.is_correct).count() as u32;
    let total = questions.len() as u32;

    Ok(Scorecard {
        score: Score {
            correct,
            total,
            percentage: percentage(correct as u64, total as u64),
        },
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: u8) -> Question {
        Question {
            text: format!("Q with answer {correct}"),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_option_index: correct,
            explanation: "because".into(),
        }
    }

    #[test]
    fn test_all_correct() {
        let questions = vec![question(0), question(1), question(2)];
        let card = score_submission(&questions, &[0, 1, 2]).unwrap();
        assert_eq!(card.score, Score { correct: 3, total: 3, percentage: 100 });
        assert!(card.results.iter().all(|r| r.is_correct));
    }

    #[test]
    fn test_all_wrong() {
        let questions = vec![question(0), question(1)];
        let card = score_submission(&questions, &[3, 3]).unwrap();
        assert_eq!(card.score.correct, 0);
        assert_eq!(card.score.percentage, 0);
    }

    #[test]
    fn test_unanswered_never_correct() {
        let questions = vec![question(0), question(3)];
        let card = score_submission(&questions, &[-1, -1]).unwrap();
        assert_eq!(card.score.correct, 0);
        assert_eq!(card.results[0].user_answer, -1);
    }

    #[test]
    fn test_one_third_rounds_down() {
        let questions = vec![question(0), question(0), question(0)];
        let card = score_submission(&questions, &[0, 1, 2]).unwrap();
        assert_eq!(card.score.percentage, 33);
    }

    #[test]
    fn test_half_rounds_up() {
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(0, 0), 0);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let questions = vec![question(0), question(1)];
        let err = score_submission(&questions, &[0]).unwrap_err();
        assert!(matches!(err, QuizError::InvalidAnswers { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_results_carry_explanations() {
        let questions = vec![question(2)];
        let card = score_submission(&questions, &[1]).unwrap();
        assert_eq!(card.results[0].explanation, "because");
        assert_eq!(card.results[0].correct_answer, 2);
        assert!(!card.results[0].is_correct);
    }

    #[test]
    fn test_answer_value_range() {
        assert_eq!(validate_answer_values(&[-1, 0, 3]).unwrap(), vec![-1, 0, 3]);
        assert!(validate_answer_values(&[4]).is_err());
        assert!(validate_answer_values(&[-2]).is_err());
    }
}
