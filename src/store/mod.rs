// src/store/mod.rs

//! Persistence seams. Services depend on these traits; `PgStore` implements
//! them over PostgreSQL and the in-memory store backs the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptStatus, NewAnswer, TestAttempt, UserAnswerRow},
        digest::{
            DailyReportLog, DailyReportSetting, DigestMetrics, DigestSettingsUpdate, NewDigestLog,
        },
        result::{ResultSummary, TestResult},
        review::{ReviewCompletion, ReviewPlanItem},
    },
    services::{mistakes::AnsweredQuestion, scoring::ScoringItem},
};

mod attempts;
mod digest;
#[cfg(test)]
pub(crate) mod memory;
mod review;

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn test_exists(&self, test_id: i64) -> Result<bool, AppError>;

    /// The caller's non-completed attempt for a test, if any.
    async fn open_attempt(&self, user_id: i64, test_id: i64)
    -> Result<Option<TestAttempt>, AppError>;

    /// Inserts a fresh `in_progress` attempt. `None` when another open attempt won the race.
    async fn create_attempt(
        &self,
        user_id: i64,
        test_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<Option<TestAttempt>, AppError>;

    async fn find_attempt(&self, user_id: i64, attempt_id: i64)
    -> Result<Option<TestAttempt>, AppError>;

    /// Writes status and timing fields of `attempt`, but only while the stored
    /// status still equals `expected`. Returns whether the row was updated.
    async fn transition_attempt(
        &self,
        attempt: &TestAttempt,
        expected: AttemptStatus,
    ) -> Result<bool, AppError>;

    async fn question_in_test(&self, test_id: i64, question_id: i64) -> Result<bool, AppError>;

    async fn upsert_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        answer: &NewAnswer,
    ) -> Result<UserAnswerRow, AppError>;

    /// Questions of a test in test order, with their options and this attempt's answers.
    async fn scoring_items(&self, test_id: i64, attempt_id: i64)
    -> Result<Vec<ScoringItem>, AppError>;

    /// Atomically marks the attempt completed and inserts its result.
    /// `None` when the attempt was already completed.
    async fn finalize_attempt(
        &self,
        attempt: &TestAttempt,
        summary: &ResultSummary,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<TestResult>, AppError>;

    async fn find_result(&self, user_id: i64, attempt_id: i64)
    -> Result<Option<TestResult>, AppError>;

    /// Newest-first answers from the user's completed attempts, capped at `limit` rows.
    async fn recent_answers(&self, user_id: i64, limit: i64)
    -> Result<Vec<AnsweredQuestion>, AppError>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Returns the existing item when the same topic was already marked on that date.
    async fn insert_item(
        &self,
        user_id: i64,
        subject: &str,
        topic: &str,
        studied_date: NaiveDate,
    ) -> Result<ReviewPlanItem, AppError>;

    async fn find_item(&self, user_id: i64, item_id: i64)
    -> Result<Option<ReviewPlanItem>, AppError>;

    async fn list_items(&self, user_id: i64) -> Result<Vec<ReviewPlanItem>, AppError>;

    /// Returns false when the completion already existed.
    async fn insert_completion(
        &self,
        user_id: i64,
        item_id: i64,
        review_date: NaiveDate,
        interval_days: i32,
    ) -> Result<bool, AppError>;

    /// Returns false when there was nothing to delete.
    async fn delete_completion(
        &self,
        user_id: i64,
        item_id: i64,
        review_date: NaiveDate,
        interval_days: i32,
    ) -> Result<bool, AppError>;

    async fn list_completions(&self, user_id: i64) -> Result<Vec<ReviewCompletion>, AppError>;
}

#[async_trait]
pub trait DigestStore: Send + Sync {
    /// Enabled settings with a non-empty target address.
    async fn active_settings(&self) -> Result<Vec<DailyReportSetting>, AppError>;

    async fn find_setting(&self, user_id: i64) -> Result<Option<DailyReportSetting>, AppError>;

    async fn upsert_setting(
        &self,
        user_id: i64,
        update: &DigestSettingsUpdate,
    ) -> Result<DailyReportSetting, AppError>;

    /// Compare-and-set of `last_sent_date` to `report_date`. False when it already held that date.
    async fn claim_report_date(&self, user_id: i64, report_date: NaiveDate)
    -> Result<bool, AppError>;

    /// Puts `previous` back, but only if the claim for `report_date` is still in place.
    async fn release_report_date(
        &self,
        user_id: i64,
        report_date: NaiveDate,
        previous: Option<NaiveDate>,
    ) -> Result<(), AppError>;

    async fn append_log(&self, entry: &NewDigestLog) -> Result<(), AppError>;

    async fn recent_logs(&self, user_id: i64, limit: i64) -> Result<Vec<DailyReportLog>, AppError>;
}

/// Source of the activity figures a digest reports.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn daily_metrics(
        &self,
        user_id: i64,
        report_date: NaiveDate,
        zone: Tz,
    ) -> Result<DigestMetrics, AppError>;
}

/// PostgreSQL implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
