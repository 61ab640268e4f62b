// src/models/review.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Represents the 'review_plan_items' table: a topic the user marked as studied.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPlanItem {
    pub id: i64,
    pub user_id: i64,
    pub subject: String,
    pub topic: String,
    pub studied_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Represents the 'review_completions' table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCompletion {
    pub review_plan_item_id: i64,
    pub review_date: NaiveDate,
    pub interval_days: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewItemRequest {
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(length(min = 1, max = 300))]
    pub topic: String,
    /// `YYYY-MM-DD`; today (UTC) when absent.
    pub studied_date: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetCompletionRequest {
    pub review_date: String,
    #[validate(range(min = 1, max = 3650))]
    pub interval_days: i32,
    pub done: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    pub today: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Upcoming,
    Due,
    Overdue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub interval_days: i32,
    pub review_date: NaiveDate,
    pub done: bool,
    pub status: CheckpointStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPlanView {
    #[serde(flatten)]
    pub item: ReviewPlanItem,
    pub checkpoints: Vec<Checkpoint>,
}

/// Result of a completion toggle. `changed` is false for no-op toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub done: bool,
    pub changed: bool,
}

/// Parses a `YYYY-MM-DD` date, mapping failures to `BadRequest`.
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("{field} must be a YYYY-MM-DD date")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_iso_and_rejects_other_shapes() {
        assert_eq!(
            parse_date("reviewDate", "2025-03-09").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
        );
        assert!(matches!(
            parse_date("reviewDate", "09.03.2025"),
            Err(AppError::BadRequest(_))
        ));
    }
}
