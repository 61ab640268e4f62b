// src/store/review.rs

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{PgStore, ReviewStore};
use crate::{
    error::AppError,
    models::review::{ReviewCompletion, ReviewPlanItem},
};

const ITEM_COLUMNS: &str = "id, user_id, subject, topic, studied_date, created_at";

#[async_trait]
impl ReviewStore for PgStore {
    async fn insert_item(
        &self,
        user_id: i64,
        subject: &str,
        topic: &str,
        studied_date: NaiveDate,
    ) -> Result<ReviewPlanItem, AppError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let item = sqlx::query_as::<_, ReviewPlanItem>(&format!(
            "INSERT INTO review_plan_items (user_id, subject, topic, studied_date) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, subject, topic, studied_date) \
             DO UPDATE SET subject = EXCLUDED.subject \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(user_id)
        .bind(subject)
        .bind(topic)
        .bind(studied_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(item)
    }

    async fn find_item(&self, user_id: i64, item_id: i64) -> Result<Option<ReviewPlanItem>, AppError> {
        let item = sqlx::query_as::<_, ReviewPlanItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM review_plan_items WHERE id = $1 AND user_id = $2"
        ))
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn list_items(&self, user_id: i64) -> Result<Vec<ReviewPlanItem>, AppError> {
        let items = sqlx::query_as::<_, ReviewPlanItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM review_plan_items WHERE user_id = $1 \
             ORDER BY studied_date DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn insert_completion(
        &self,
        user_id: i64,
        item_id: i64,
        review_date: NaiveDate,
        interval_days: i32,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO review_completions (user_id, review_plan_item_id, review_date, interval_days) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, review_plan_item_id, review_date, interval_days) DO NOTHING",
        )
        .bind(user_id)
        .bind(item_id)
        .bind(review_date)
        .bind(interval_days)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_completion(
        &self,
        user_id: i64,
        item_id: i64,
        review_date: NaiveDate,
        interval_days: i32,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM review_completions \
             WHERE user_id = $1 AND review_plan_item_id = $2 AND review_date = $3 AND interval_days = $4",
        )
        .bind(user_id)
        .bind(item_id)
        .bind(review_date)
        .bind(interval_days)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_completions(&self, user_id: i64) -> Result<Vec<ReviewCompletion>, AppError> {
        let completions = sqlx::query_as::<_, ReviewCompletion>(
            "SELECT review_plan_item_id, review_date, interval_days \
             FROM review_completions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(completions)
    }
}
