//! Cross-response aggregation for quiz creators.

use serde::Serialize;

use crate::constants::OPTION_COUNT;
use crate::scoring::percentage;
use crate::types::{Question, QuizResponse};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallAnalytics {
    pub total_responses: usize,
    pub average_score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnalytics {
    pub question_index: usize,
    pub question: String,
    pub correct_answer: u8,
    pub correct_count: usize,
    pub correct_percentage: u32,
    /// How many respondents picked each option
    pub option_counts: [usize; OPTION_COUNT],
    pub total_responses: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnalytics {
    pub analytics: OverallAnalytics,
    pub question_analytics: Vec<QuestionAnalytics>,
}

/// Fold all responses of a quiz into overall and per-question statistics
pub fn aggregate(questions: &[Question], responses: &[QuizResponse]) -> QuizAnalytics {
    let total_responses = responses.len();

    let percentage_sum: u64 = responses.iter().map(|r| r.score.percentage as u64).sum();
    let analytics = OverallAnalytics {
        total_responses,
        average_score: percentage(percentage_sum, total_responses as u64 * 100),
    };

    let question_analytics = questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let mut option_counts = [0usize; OPTION_COUNT];
            let mut correct_count = 0;

            for answer in responses.iter().filter_map(|r| r.answers.get(index).copied()) {
                if answer >= 0 {
                    if let Some(slot) = option_counts.get_mut(answer as usize) {
                        *slot += 1;
                    }
                    if answer as u8 == question.correct_option_index {
                        correct_count += 1;
                    }
                }
            }

            QuestionAnalytics {
                question_index: index,
                question: question.text.clone(),
                correct_answer: question.correct_option_index,
                correct_count,
                correct_percentage: percentage(correct_count as u64, total_responses as u64),
                option_counts,
                total_responses,
            }
        })
        .collect();

    QuizAnalytics {
        analytics,
        question_analytics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Score;
    use chrono::Utc;

    fn questions() -> Vec<Question> {
        (0..2)
            .map(|i| Question {
                text: format!("Question {i}"),
                options: ["a".into(), "b".into(), "c".into(), "d".into()],
                correct_option_index: i,
                explanation: "x".into(),
            })
            .collect()
    }

    fn response(answers: Vec<i8>, pct: u32) -> QuizResponse {
        QuizResponse {
            respondent_name: "anon".into(),
            answers,
            score: Score { correct: 0, total: 2, percentage: pct },
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_responses() {
        let result = aggregate(&questions(), &[]);
        assert_eq!(result.analytics.total_responses, 0);
        assert_eq!(result.analytics.average_score, 0);
        assert_eq!(result.question_analytics.len(), 2);
        assert_eq!(result.question_analytics[0].correct_percentage, 0);
        assert_eq!(result.question_analytics[0].option_counts, [0; 4]);
    }

    #[test]
    fn test_distribution_and_average() {
        let responses = vec![
            response(vec![0, 1], 100),
            response(vec![0, 3], 50),
            response(vec![2, -1], 0),
        ];
        let result = aggregate(&questions(), &responses);

        // (100 + 50 + 0) / 3 = 50
        assert_eq!(result.analytics.average_score, 50);

        let first = &result.question_analytics[0];
        assert_eq!(first.option_counts, [2, 0, 1, 0]);
        assert_eq!(first.correct_count, 2);
        assert_eq!(first.correct_percentage, 67);

        let second = &result.question_analytics[1];
        assert_eq!(second.option_counts, [0, 1, 0, 1]);
        assert_eq!(second.correct_count, 1);
        assert_eq!(second.correct_percentage, 33);
        assert_eq!(second.total_responses, 3);
    }

    #[test]
    fn test_average_rounds_half_up() {
        let responses = vec![response(vec![0, 1], 33), response(vec![0, 1], 34)];
        let result = aggregate(&questions(), &responses);
        // 33.5 -> 34
        assert_eq!(result.analytics.average_score, 34);
    }
}
