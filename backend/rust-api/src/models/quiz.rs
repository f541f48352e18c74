use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::quiz::scoring::rounded_ratio;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Seconds allowed per question.
    pub fn time_limit_seconds(&self) -> u32 {
        match self {
            Difficulty::Easy => 30,
            Difficulty::Medium => 15,
            Difficulty::Hard => 10,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown difficulty '{0}' (expected easy, medium or hard)")]
pub struct ParseDifficultyError(pub String);

impl FromStr for Difficulty {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(ParseDifficultyError(other.to_string())),
        }
    }
}

/// One completed quiz, as persisted in a user's history. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub id: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub score: u32,
    pub total_questions: u32,
    pub percentage: u32,
    pub date: DateTime<Utc>,
    /// Milliseconds since the Unix epoch, same instant as `date`.
    pub timestamp: i64,
}

impl QuizResult {
    pub fn from_request(req: SaveResultRequest, now: DateTime<Utc>) -> Self {
        QuizResult {
            id: Uuid::new_v4().to_string(),
            category: req.category,
            difficulty: req.difficulty,
            score: req.score,
            total_questions: req.total_questions,
            percentage: req.percentage,
            date: now,
            timestamp: now.timestamp_millis(),
        }
    }
}

/// Request to append a finished quiz to the caller's history
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_score_within_total"))]
pub struct SaveResultRequest {
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub difficulty: Difficulty,
    pub score: u32,
    pub total_questions: u32,
    #[validate(range(max = 100, message = "Percentage must be between 0 and 100"))]
    pub percentage: u32,
}

fn validate_score_within_total(req: &SaveResultRequest) -> Result<(), ValidationError> {
    if req.score > req.total_questions {
        return Err(ValidationError::new("score_exceeds_total")
            .with_message("Score cannot exceed the number of questions".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResultResponse {
    pub message: String,
    pub quiz_result: QuizResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<QuizResult>,
}

/// Aggregate figures shown above the history list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HistoryStats {
    pub total_quizzes: usize,
    pub average_percentage: u32,
    pub best_percentage: u32,
}

impl HistoryStats {
    pub fn from_history(history: &[QuizResult]) -> Self {
        if history.is_empty() {
            return HistoryStats::default();
        }

        let sum: u64 = history.iter().map(|r| u64::from(r.percentage)).sum();
        let best = history.iter().map(|r| r.percentage).max().unwrap_or(0);

        HistoryStats {
            total_quizzes: history.len(),
            average_percentage: rounded_ratio(sum, history.len() as u64),
            best_percentage: best,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(percentage: u32) -> QuizResult {
        QuizResult::from_request(
            SaveResultRequest {
                category: "General Knowledge".to_string(),
                difficulty: Difficulty::Easy,
                score: percentage / 10,
                total_questions: 10,
                percentage,
            },
            Utc::now(),
        )
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("Hard".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!(" easy ".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn time_limits_follow_difficulty() {
        assert_eq!(Difficulty::Easy.time_limit_seconds(), 30);
        assert_eq!(Difficulty::Medium.time_limit_seconds(), 15);
        assert_eq!(Difficulty::Hard.time_limit_seconds(), 10);
    }

    #[test]
    fn save_request_rejects_score_above_total() {
        let req = SaveResultRequest {
            category: "Science".to_string(),
            difficulty: Difficulty::Medium,
            score: 11,
            total_questions: 10,
            percentage: 100,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn save_request_rejects_percentage_over_100() {
        let req = SaveResultRequest {
            category: "Science".to_string(),
            difficulty: Difficulty::Medium,
            score: 10,
            total_questions: 10,
            percentage: 101,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn quiz_result_serializes_camel_case() {
        let json = serde_json::to_value(result(70)).unwrap();
        assert_eq!(json["totalQuestions"], 10);
        assert_eq!(json["difficulty"], "easy");
        assert!(json["timestamp"].is_i64());
    }

    #[test]
    fn history_stats_average_and_best() {
        let history = vec![result(70), result(85), result(40)];
        let stats = HistoryStats::from_history(&history);
        assert_eq!(stats.total_quizzes, 3);
        // (70 + 85 + 40) / 3 = 65
        assert_eq!(stats.average_percentage, 65);
        assert_eq!(stats.best_percentage, 85);
    }

    #[test]
    fn history_stats_empty() {
        assert_eq!(HistoryStats::from_history(&[]), HistoryStats::default());
    }
}
