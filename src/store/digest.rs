// src/store/digest.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use sqlx::FromRow;

use super::{DigestStore, MetricsProvider, PgStore};
use crate::{
    error::AppError,
    models::digest::{
        DailyReportLog, DailyReportSetting, DigestMetrics, DigestSettingsUpdate, NewDigestLog,
    },
    services::digest::clock::local_day_bounds,
};

const SETTING_COLUMNS: &str = "user_id, target_email, enabled, send_hour, time_zone, last_sent_date";

#[derive(Debug, FromRow)]
struct ResultTotals {
    attempts_completed: i64,
    correct_answers: i64,
    total_questions: i64,
    average_percentage: f64,
    best_scaled_score: Option<f64>,
    time_spent: i64,
}

#[async_trait]
impl DigestStore for PgStore {
    async fn active_settings(&self) -> Result<Vec<DailyReportSetting>, AppError> {
        let settings = sqlx::query_as::<_, DailyReportSetting>(&format!(
            "SELECT {SETTING_COLUMNS} FROM daily_report_settings \
             WHERE enabled AND btrim(target_email) <> '' ORDER BY user_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn find_setting(&self, user_id: i64) -> Result<Option<DailyReportSetting>, AppError> {
        let setting = sqlx::query_as::<_, DailyReportSetting>(&format!(
            "SELECT {SETTING_COLUMNS} FROM daily_report_settings WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(setting)
    }

    async fn upsert_setting(
        &self,
        user_id: i64,
        update: &DigestSettingsUpdate,
    ) -> Result<DailyReportSetting, AppError> {
        let setting = sqlx::query_as::<_, DailyReportSetting>(&format!(
            "INSERT INTO daily_report_settings (user_id, target_email, enabled, send_hour, time_zone, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             ON CONFLICT (user_id) DO UPDATE SET \
                target_email = EXCLUDED.target_email, \
                enabled = EXCLUDED.enabled, \
                send_hour = EXCLUDED.send_hour, \
                time_zone = EXCLUDED.time_zone, \
                updated_at = NOW() \
             RETURNING {SETTING_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&update.target_email)
        .bind(update.enabled)
        .bind(update.send_hour)
        .bind(&update.time_zone)
        .fetch_one(&self.pool)
        .await?;
        Ok(setting)
    }

    async fn claim_report_date(&self, user_id: i64, report_date: NaiveDate) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE daily_report_settings SET last_sent_date = $2, updated_at = NOW() \
             WHERE user_id = $1 AND last_sent_date IS DISTINCT FROM $2",
        )
        .bind(user_id)
        .bind(report_date)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_report_date(
        &self,
        user_id: i64,
        report_date: NaiveDate,
        previous: Option<NaiveDate>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE daily_report_settings SET last_sent_date = $3, updated_at = NOW() \
             WHERE user_id = $1 AND last_sent_date = $2",
        )
        .bind(user_id)
        .bind(report_date)
        .bind(previous)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_log(&self, entry: &NewDigestLog) -> Result<(), AppError> {
        let metrics = entry
            .metrics
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        sqlx::query(
            "INSERT INTO daily_report_logs (user_id, report_date, trigger, status, error, metrics) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.user_id)
        .bind(entry.report_date)
        .bind(entry.trigger.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.error)
        .bind(metrics)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_logs(&self, user_id: i64, limit: i64) -> Result<Vec<DailyReportLog>, AppError> {
        let logs = sqlx::query_as::<_, DailyReportLog>(
            "SELECT id, user_id, report_date, trigger, status, error, metrics, created_at \
             FROM daily_report_logs WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }
}

#[async_trait]
impl MetricsProvider for PgStore {
    async fn daily_metrics(
        &self,
        user_id: i64,
        report_date: NaiveDate,
        zone: Tz,
    ) -> Result<DigestMetrics, AppError> {
        let (start, end) = local_day_bounds(report_date, zone);

        let totals = sqlx::query_as::<_, ResultTotals>(
            r#"
            SELECT
                COUNT(*)::BIGINT AS attempts_completed,
                COALESCE(SUM(correct_answers), 0)::BIGINT AS correct_answers,
                COALESCE(SUM(total_questions), 0)::BIGINT AS total_questions,
                COALESCE(AVG(percentage), 0)::DOUBLE PRECISION AS average_percentage,
                MAX(scaled_score) AS best_scaled_score,
                COALESCE(SUM(time_spent), 0)::BIGINT AS time_spent
            FROM results
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        let reviews_completed = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM review_completions \
             WHERE user_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(DigestMetrics {
            attempts_completed: totals.attempts_completed,
            correct_answers: totals.correct_answers,
            total_questions: totals.total_questions,
            mistakes: totals.total_questions - totals.correct_answers,
            average_percentage: (totals.average_percentage * 100.0).round() / 100.0,
            best_scaled_score: totals.best_scaled_score,
            time_spent: totals.time_spent,
            reviews_completed,
        })
    }
}
