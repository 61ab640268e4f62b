// src/models/attempt.rs

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Paused,
    Completed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown attempt status '{other}'")),
        }
    }
}

/// Raw 'test_attempts' row; `status` is kept as text until converted.
#[derive(Debug, Clone, FromRow)]
pub struct AttemptRow {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_time: i64,
}

/// One user's pass through a test.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAttempt {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Accumulated active time in seconds, excluding paused periods.
    pub total_time: i64,
}

impl TryFrom<AttemptRow> for TestAttempt {
    type Error = AppError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<AttemptStatus>()
            .map_err(AppError::InternalServerError)?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            test_id: row.test_id,
            status,
            started_at: row.started_at,
            paused_at: row.paused_at,
            resumed_at: row.resumed_at,
            completed_at: row.completed_at,
            total_time: row.total_time,
        })
    }
}

/// Represents the 'user_answers' table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswerRow {
    pub attempt_id: i64,
    pub question_id: i64,
    /// JSON-encoded array of selected option ids or tokens.
    pub answer_ids: Option<String>,
    pub answer_text: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for starting an attempt.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptRequest {
    #[validate(range(min = 1))]
    pub test_id: i64,
}

/// DTO for saving one answer.
///
/// `answer` may be a single id, a number, or a list of either.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswerRequest {
    #[serde(default)]
    pub answer: Option<serde_json::Value>,
    #[serde(default)]
    pub answer_text: Option<String>,
}

/// Normalized form of a saved answer, ready for the upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnswer {
    pub answer_ids: Option<Vec<String>>,
    pub answer_text: Option<String>,
}

impl SaveAnswerRequest {
    /// Normalizes the loose request shape. Selections become a list of strings.
    pub fn into_new_answer(self) -> Result<NewAnswer, AppError> {
        let answer_ids = match self.answer {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(selection_tokens(&value).ok_or_else(|| {
                AppError::BadRequest(
                    "answer must be a string, a number, or a list of them".to_string(),
                )
            })?),
        };
        let answer_text = self.answer_text.filter(|t| !t.trim().is_empty());

        if answer_ids.is_none() && answer_text.is_none() {
            return Err(AppError::BadRequest(
                "Either answer or answerText is required".to_string(),
            ));
        }

        Ok(NewAnswer {
            answer_ids,
            answer_text,
        })
    }
}

/// Flattens a JSON scalar or array of scalars into string tokens.
/// Returns `None` when the shape is not a selection at all.
pub fn selection_tokens(value: &serde_json::Value) -> Option<Vec<String>> {
    fn scalar(value: &serde_json::Value) -> Option<String> {
        match value {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    match value {
        serde_json::Value::Array(items) => items.iter().map(scalar).collect(),
        other => scalar(other).map(|token| vec![token]),
    }
}
