// src/models/result.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'results' table: the immutable score of one completed attempt.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: i64,
    pub attempt_id: i64,
    pub user_id: i64,
    pub test_id: i64,
    pub correct_answers: i32,
    pub total_questions: i32,
    pub raw_score: i32,
    pub max_score: i32,
    pub scaled_score: f64,
    /// 0..=100
    pub percentage: f64,
    /// Seconds.
    pub time_spent: i64,
    pub created_at: DateTime<Utc>,
}

/// Score figures computed before the row exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub correct_answers: i32,
    pub total_questions: i32,
    pub raw_score: i32,
    pub max_score: i32,
    pub scaled_score: f64,
    pub percentage: f64,
    pub time_spent: i64,
}
