// src/models/digest.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidateEmail, ValidationError};

use crate::config::{DEFAULT_SEND_HOUR, DEFAULT_TIME_ZONE};

/// Represents the 'daily_report_settings' table (one row per user).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportSetting {
    pub user_id: i64,
    pub target_email: String,
    pub enabled: bool,
    /// Local hour (0..=23) in `time_zone` at which the digest goes out.
    pub send_hour: i32,
    /// IANA zone name, e.g. `Europe/Kyiv`.
    pub time_zone: String,
    /// Last local calendar date a digest was delivered (or is being delivered).
    pub last_sent_date: Option<NaiveDate>,
}

impl DailyReportSetting {
    /// Settings shown to a user who never saved any.
    pub fn defaults_for(user_id: i64) -> Self {
        Self {
            user_id,
            target_email: String::new(),
            enabled: false,
            send_hour: DEFAULT_SEND_HOUR,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            last_sent_date: None,
        }
    }

    /// Whether the scheduler should look at this row at all.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.target_email.trim().is_empty()
    }
}

/// DTO for updating the digest settings.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DigestSettingsUpdate {
    #[validate(length(max = 254), custom(function = validate_target_email))]
    pub target_email: String,
    pub enabled: bool,
    #[validate(range(min = 0, max = 23))]
    pub send_hour: i32,
    #[validate(custom(function = validate_time_zone))]
    pub time_zone: String,
}

/// Empty is allowed here; enabling delivery without an address is rejected separately.
fn validate_target_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() || email.validate_email() {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_email"))
    }
}

fn validate_time_zone(zone: &str) -> Result<(), ValidationError> {
    zone.parse::<chrono_tz::Tz>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_time_zone"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogTrigger {
    Scheduled,
    Manual,
}

impl LogTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Sent,
    Failed,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Represents the append-only 'daily_report_logs' table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportLog {
    pub id: i64,
    pub user_id: i64,
    pub report_date: NaiveDate,
    pub trigger: String,
    pub status: String,
    pub error: Option<String>,
    pub metrics: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDigestLog {
    pub user_id: i64,
    pub report_date: NaiveDate,
    pub trigger: LogTrigger,
    pub status: LogStatus,
    pub error: Option<String>,
    pub metrics: Option<DigestMetrics>,
}

/// Activity figures for one user and one local calendar day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestMetrics {
    pub attempts_completed: i64,
    pub correct_answers: i64,
    pub total_questions: i64,
    pub mistakes: i64,
    pub average_percentage: f64,
    pub best_scaled_score: Option<f64>,
    /// Seconds.
    pub time_spent: i64,
    pub reviews_completed: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestSettingsResponse {
    #[serde(flatten)]
    pub setting: DailyReportSetting,
    pub logs: Vec<DailyReportLog>,
}

/// Aggregate outcome of one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSummary {
    pub settings: u32,
    pub sent: u32,
    pub failed: u32,
    pub skipped_by_hour: u32,
    pub skipped_already_sent: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNowResponse {
    pub ok: bool,
    pub report_date: NaiveDate,
    pub metrics: DigestMetrics,
}
