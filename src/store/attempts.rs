// src/store/attempts.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::{AttemptStore, PgStore};
use crate::{
    error::AppError,
    models::{
        attempt::{AttemptRow, AttemptStatus, NewAnswer, TestAttempt, UserAnswerRow},
        question::{AnswerOption, QuestionRow, QuestionType},
        result::{ResultSummary, TestResult},
    },
    services::{evaluator::SubmittedAnswer, mistakes::AnsweredQuestion, scoring::ScoringItem},
};

const ATTEMPT_COLUMNS: &str =
    "id, user_id, test_id, status, started_at, paused_at, resumed_at, completed_at, total_time";

const RESULT_COLUMNS: &str = "id, attempt_id, user_id, test_id, correct_answers, total_questions, \
     raw_score, max_score, scaled_score, percentage, time_spent, created_at";

const OPTION_COLUMNS: &str = "id, question_id, text, is_correct, sort_order, matching_pair";

/// Flat row of the mistakes window query.
#[derive(Debug, FromRow)]
struct AnsweredRow {
    question_id: i64,
    question_type: String,
    text: String,
    subject: String,
    test_title: String,
    attempt_id: i64,
    answered_at: DateTime<Utc>,
    answer_ids: Option<String>,
    answer_text: Option<String>,
}

fn parse_question_type(raw: &str) -> Result<QuestionType, AppError> {
    raw.parse::<QuestionType>()
        .map_err(AppError::InternalServerError)
}

fn group_options(options: Vec<AnswerOption>) -> HashMap<i64, Vec<AnswerOption>> {
    let mut grouped: HashMap<i64, Vec<AnswerOption>> = HashMap::new();
    for option in options {
        grouped.entry(option.question_id).or_default().push(option);
    }
    grouped
}

impl PgStore {
    async fn options_for(&self, question_ids: &[i64]) -> Result<HashMap<i64, Vec<AnswerOption>>, AppError> {
        if question_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let options = sqlx::query_as::<_, AnswerOption>(&format!(
            "SELECT {OPTION_COLUMNS} FROM answers WHERE question_id = ANY($1) \
             ORDER BY question_id, sort_order NULLS LAST, id"
        ))
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(group_options(options))
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn test_exists(&self, test_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM tests WHERE id = $1)")
            .bind(test_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn open_attempt(&self, user_id: i64, test_id: i64) -> Result<Option<TestAttempt>, AppError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM test_attempts \
             WHERE user_id = $1 AND test_id = $2 AND status <> 'completed' \
             ORDER BY started_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TestAttempt::try_from).transpose()
    }

    async fn create_attempt(
        &self,
        user_id: i64,
        test_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<Option<TestAttempt>, AppError> {
        // The partial unique index turns a concurrent second start into a no-op.
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "INSERT INTO test_attempts (user_id, test_id, status, started_at, total_time) \
             VALUES ($1, $2, 'in_progress', $3, 0) \
             ON CONFLICT (user_id, test_id) WHERE status <> 'completed' DO NOTHING \
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(user_id)
        .bind(test_id)
        .bind(started_at)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TestAttempt::try_from).transpose()
    }

    async fn find_attempt(&self, user_id: i64, attempt_id: i64) -> Result<Option<TestAttempt>, AppError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM test_attempts WHERE id = $1 AND user_id = $2"
        ))
        .bind(attempt_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TestAttempt::try_from).transpose()
    }

    async fn transition_attempt(
        &self,
        attempt: &TestAttempt,
        expected: AttemptStatus,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE test_attempts \
             SET status = $3, paused_at = $4, resumed_at = $5, total_time = $6 \
             WHERE id = $1 AND status = $2",
        )
        .bind(attempt.id)
        .bind(expected.as_str())
        .bind(attempt.status.as_str())
        .bind(attempt.paused_at)
        .bind(attempt.resumed_at)
        .bind(attempt.total_time)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn question_in_test(&self, test_id: i64, question_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM questions WHERE id = $1 AND test_id = $2)",
        )
        .bind(question_id)
        .bind(test_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn upsert_answer(
        &self,
        attempt_id: i64,
        question_id: i64,
        answer: &NewAnswer,
    ) -> Result<UserAnswerRow, AppError> {
        let answer_ids = answer
            .answer_ids
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        let row = sqlx::query_as::<_, UserAnswerRow>(
            "INSERT INTO user_answers (attempt_id, question_id, answer_ids, answer_text, updated_at) \
             VALUES ($1, $2, $3, $4, NOW()) \
             ON CONFLICT (attempt_id, question_id) DO UPDATE \
             SET answer_ids = EXCLUDED.answer_ids, answer_text = EXCLUDED.answer_text, updated_at = NOW() \
             RETURNING attempt_id, question_id, answer_ids, answer_text, updated_at",
        )
        .bind(attempt_id)
        .bind(question_id)
        .bind(answer_ids)
        .bind(&answer.answer_text)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn scoring_items(&self, test_id: i64, attempt_id: i64) -> Result<Vec<ScoringItem>, AppError> {
        let questions = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, test_id, position, type, text, points FROM questions \
             WHERE test_id = $1 ORDER BY position, id",
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        let answers = sqlx::query_as::<_, UserAnswerRow>(
            "SELECT attempt_id, question_id, answer_ids, answer_text, updated_at \
             FROM user_answers WHERE attempt_id = $1",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        let mut answers: HashMap<i64, UserAnswerRow> =
            answers.into_iter().map(|a| (a.question_id, a)).collect();

        let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let mut options = self.options_for(&ids).await?;

        questions
            .into_iter()
            .map(|q| {
                Ok(ScoringItem {
                    question_id: q.id,
                    question_type: parse_question_type(&q.question_type)?,
                    points: q.points,
                    options: options.remove(&q.id).unwrap_or_default(),
                    answer: answers.remove(&q.id).map(|a| {
                        SubmittedAnswer::from_stored(a.answer_ids.as_deref(), a.answer_text.as_deref())
                    }),
                })
            })
            .collect()
    }

    async fn finalize_attempt(
        &self,
        attempt: &TestAttempt,
        summary: &ResultSummary,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<TestResult>, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE test_attempts \
             SET status = 'completed', completed_at = $2, total_time = $3 \
             WHERE id = $1 AND status <> 'completed'",
        )
        .bind(attempt.id)
        .bind(completed_at)
        .bind(summary.time_spent)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let result = sqlx::query_as::<_, TestResult>(&format!(
            "INSERT INTO results (attempt_id, user_id, test_id, correct_answers, total_questions, \
             raw_score, max_score, scaled_score, percentage, time_spent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {RESULT_COLUMNS}"
        ))
        .bind(attempt.id)
        .bind(attempt.user_id)
        .bind(attempt.test_id)
        .bind(summary.correct_answers)
        .bind(summary.total_questions)
        .bind(summary.raw_score)
        .bind(summary.max_score)
        .bind(summary.scaled_score)
        .bind(summary.percentage)
        .bind(summary.time_spent)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(result))
    }

    async fn find_result(&self, user_id: i64, attempt_id: i64) -> Result<Option<TestResult>, AppError> {
        let result = sqlx::query_as::<_, TestResult>(&format!(
            "SELECT {RESULT_COLUMNS} FROM results WHERE attempt_id = $1 AND user_id = $2"
        ))
        .bind(attempt_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(result)
    }

    async fn recent_answers(&self, user_id: i64, limit: i64) -> Result<Vec<AnsweredQuestion>, AppError> {
        let rows = sqlx::query_as::<_, AnsweredRow>(
            r#"
            SELECT
                ua.question_id, q.type AS question_type, q.text,
                s.slug AS subject, t.title AS test_title,
                ua.attempt_id, ua.updated_at AS answered_at,
                ua.answer_ids, ua.answer_text
            FROM user_answers ua
            JOIN test_attempts ta ON ta.id = ua.attempt_id
            JOIN questions q ON q.id = ua.question_id
            JOIN tests t ON t.id = ta.test_id
            JOIN subjects s ON s.id = t.subject_id
            WHERE ta.user_id = $1 AND ta.status = 'completed'
            ORDER BY ta.completed_at DESC NULLS LAST, ua.updated_at DESC, ua.id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut ids: Vec<i64> = rows.iter().map(|r| r.question_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let options = self.options_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                Ok(AnsweredQuestion {
                    question_type: parse_question_type(&row.question_type)?,
                    options: options.get(&row.question_id).cloned().unwrap_or_default(),
                    question_id: row.question_id,
                    text: row.text,
                    subject: row.subject,
                    test_title: row.test_title,
                    attempt_id: row.attempt_id,
                    answered_at: row.answered_at,
                    answer_ids: row.answer_ids,
                    answer_text: row.answer_text,
                })
            })
            .collect()
    }
}
