// src/store/memory.rs

//! In-memory store for unit tests. Mirrors the conditional-update semantics of
//! the SQL implementation so races can be exercised without a database.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{AttemptStore, DigestStore, ReviewStore};
use crate::{
    error::AppError,
    models::{
        attempt::{AttemptStatus, NewAnswer, TestAttempt, UserAnswerRow},
        digest::{
            DailyReportLog, DailyReportSetting, DigestSettingsUpdate, NewDigestLog,
        },
        question::{AnswerOption, QuestionType},
        result::{ResultSummary, TestResult},
        review::{ReviewCompletion, ReviewPlanItem},
    },
    services::{evaluator::SubmittedAnswer, mistakes::AnsweredQuestion, scoring::ScoringItem},
};

struct Question {
    id: i64,
    test_id: i64,
    question_type: QuestionType,
    text: String,
    points: i32,
}

struct StoredAnswer {
    seq: i64,
    row: UserAnswerRow,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    /// test id -> (title, subject slug)
    tests: BTreeMap<i64, (String, String)>,
    questions: Vec<Question>,
    options: Vec<AnswerOption>,
    attempts: Vec<TestAttempt>,
    answers: Vec<StoredAnswer>,
    results: Vec<TestResult>,
    items: Vec<ReviewPlanItem>,
    completions: Vec<(i64, ReviewCompletion)>,
    settings: BTreeMap<i64, DailyReportSetting>,
    logs: Vec<DailyReportLog>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn options_of(&self, question_id: i64) -> Vec<AnswerOption> {
        self.options
            .iter()
            .filter(|o| o.question_id == question_id)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
}

fn option(id: i64, question_id: i64, text: &str, is_correct: bool) -> AnswerOption {
    AnswerOption {
        id,
        question_id,
        text: text.to_string(),
        is_correct,
        order: None,
        matching_pair: None,
    }
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Test 1 ("Mock NMT", history) with three one-point questions:
    /// 1. single choice, correct option 11 of 10/11/12
    /// 2. multiple answers, correct options 20 and 21 of 20/21/22
    /// 3. written, accepted answer "Kyiv"
    pub(crate) fn with_sample_test() -> Self {
        let store = Self::default();
        {
            let mut inner = store.lock();
            inner
                .tests
                .insert(1, ("Mock NMT".to_string(), "history".to_string()));
            inner.questions = vec![
                Question {
                    id: 1,
                    test_id: 1,
                    question_type: QuestionType::SingleChoice,
                    text: "When was Kyiv founded?".to_string(),
                    points: 1,
                },
                Question {
                    id: 2,
                    test_id: 1,
                    question_type: QuestionType::MultipleAnswers,
                    text: "Pick the hetmans".to_string(),
                    points: 1,
                },
                Question {
                    id: 3,
                    test_id: 1,
                    question_type: QuestionType::Written,
                    text: "Capital of Ukraine".to_string(),
                    points: 1,
                },
            ];
            inner.options = vec![
                option(10, 1, "482", false),
                option(11, 1, "482 AD", true),
                option(12, 1, "1240", false),
                option(20, 2, "Khmelnytskyi", true),
                option(21, 2, "Mazepa", true),
                option(22, 2, "Shevchenko", false),
                option(30, 3, "Kyiv", true),
            ];
            inner.next_id = 1000;
        }
        store
    }

    pub(crate) fn answer_count(&self, attempt_id: i64) -> usize {
        self.lock()
            .answers
            .iter()
            .filter(|a| a.row.attempt_id == attempt_id)
            .count()
    }

    pub(crate) fn result_count(&self, attempt_id: i64) -> usize {
        self.lock()
            .results
            .iter()
            .filter(|r| r.attempt_id == attempt_id)
            .count()
    }

    /// Stores a setting as-is, bypassing request validation.
    pub(crate) fn insert_raw_setting(&self, setting: DailyReportSetting) {
        self.lock().settings.insert(setting.user_id, setting);
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn test_exists(&self, test_id: i64) -> Result<bool, AppError> {
        Ok(self.lock().tests.contains_key(&test_id))
    }

    async fn open_attempt(&self, user_id: i64, test_id: i64) -> Result<Option<TestAttempt>, AppError> {
        Ok(self
            .lock()
            .attempts
            .iter()
            .find(|a| a.user_id == user_id && a.test_id == test_id && a.status != AttemptStatus::Completed)
            .cloned())
    }

    async fn create_attempt(
        &self,
        user_id: i64,
        test_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<Option<TestAttempt>, AppError> {
        let mut inner = self.lock();
        if inner
            .attempts
            .iter()
            .any(|a| a.user_id == user_id && a.test_id == test_id && a.status != AttemptStatus::Completed)
        {
            return Ok(None);
        }
        let attempt = TestAttempt {
            id: inner.next_id(),
            user_id,
            test_id,
            status: AttemptStatus::InProgress,
            started_at,
            paused_at: None,
            resumed_at: None,
            completed_at: None,
            total_time: 0,
        };
        inner.attempts.push(attempt.clone());
        Ok(Some(attempt))
    }

    async fn find_attempt(&self, user_id: i64, attempt_id: i64) -> Result<Option<TestAttempt>, AppError> {
        Ok(self
            .lock()
            .attempts
            .iter()
            .find(|a| a.id == attempt_id && a.user_id == user_id)
            .cloned())
    }

    async fn transition_attempt(
        &self,
        attempt: &TestAttempt,
        expected: AttemptStatus,
    ) -> Result<bool, AppError> {
        let mut inner = self.lock();
        match inner
            .attempts
            .iter_mut()
            .find(|a| a.id == attempt.id && a.status == expected)
        {
            Some(stored) => {
                stored.status = attempt.status;
                stored.paused_at = attempt.paused_at;
                stored.resumed_at = attempt.resumed_at;
                stored.total_time = attempt.total_time;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn question_in_test(&self, test_id: i64, question_id: i64) -> Result<bool, AppError> {
        Ok(self
            .lock()
            .questions
            .iter()
            .any(|q| q.id == question_id && q.test_id == test_id))
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
        let row = UserAnswerRow {
            attempt_id,
            question_id,
            answer_ids,
            answer_text: answer.answer_text.clone(),
            updated_at: Utc::now(),
        };

        let mut inner = self.lock();
        let seq = inner.next_id();
        inner
            .answers
            .retain(|a| !(a.row.attempt_id == attempt_id && a.row.question_id == question_id));
        inner.answers.push(StoredAnswer {
            seq,
            row: row.clone(),
        });
        Ok(row)
    }

    async fn scoring_items(&self, test_id: i64, attempt_id: i64) -> Result<Vec<ScoringItem>, AppError> {
        let inner = self.lock();
        Ok(inner
            .questions
            .iter()
            .filter(|q| q.test_id == test_id)
            .map(|q| ScoringItem {
                question_id: q.id,
                question_type: q.question_type,
                points: q.points,
                options: inner.options_of(q.id),
                answer: inner
                    .answers
                    .iter()
                    .find(|a| a.row.attempt_id == attempt_id && a.row.question_id == q.id)
                    .map(|a| {
                        SubmittedAnswer::from_stored(
                            a.row.answer_ids.as_deref(),
                            a.row.answer_text.as_deref(),
                        )
                    }),
            })
            .collect())
    }

    async fn finalize_attempt(
        &self,
        attempt: &TestAttempt,
        summary: &ResultSummary,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<TestResult>, AppError> {
        let mut inner = self.lock();
        let Some(stored) = inner
            .attempts
            .iter_mut()
            .find(|a| a.id == attempt.id && a.status != AttemptStatus::Completed)
        else {
            return Ok(None);
        };
        stored.status = AttemptStatus::Completed;
        stored.completed_at = Some(completed_at);
        stored.total_time = summary.time_spent;

        let result = TestResult {
            id: inner.next_id(),
            attempt_id: attempt.id,
            user_id: attempt.user_id,
            test_id: attempt.test_id,
            correct_answers: summary.correct_answers,
            total_questions: summary.total_questions,
            raw_score: summary.raw_score,
            max_score: summary.max_score,
            scaled_score: summary.scaled_score,
            percentage: summary.percentage,
            time_spent: summary.time_spent,
            created_at: completed_at,
        };
        inner.results.push(result.clone());
        Ok(Some(result))
    }

    async fn find_result(&self, user_id: i64, attempt_id: i64) -> Result<Option<TestResult>, AppError> {
        Ok(self
            .lock()
            .results
            .iter()
            .find(|r| r.attempt_id == attempt_id && r.user_id == user_id)
            .cloned())
    }

    async fn recent_answers(&self, user_id: i64, limit: i64) -> Result<Vec<AnsweredQuestion>, AppError> {
        let inner = self.lock();
        let mut rows: Vec<(DateTime<Utc>, i64, AnsweredQuestion)> = Vec::new();

        for stored in &inner.answers {
            let Some(attempt) = inner.attempts.iter().find(|a| {
                a.id == stored.row.attempt_id
                    && a.user_id == user_id
                    && a.status == AttemptStatus::Completed
            }) else {
                continue;
            };
            let Some(question) = inner.questions.iter().find(|q| q.id == stored.row.question_id)
            else {
                continue;
            };
            let (test_title, subject) = inner
                .tests
                .get(&attempt.test_id)
                .cloned()
                .unwrap_or_default();

            rows.push((
                attempt.completed_at.unwrap_or(attempt.started_at),
                stored.seq,
                AnsweredQuestion {
                    question_id: question.id,
                    question_type: question.question_type,
                    text: question.text.clone(),
                    subject,
                    test_title,
                    attempt_id: attempt.id,
                    answered_at: stored.row.updated_at,
                    answer_ids: stored.row.answer_ids.clone(),
                    answer_text: stored.row.answer_text.clone(),
                    options: inner.options_of(question.id),
                },
            ));
        }

        rows.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        Ok(rows
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|(_, _, row)| row)
            .collect())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert_item(
        &self,
        user_id: i64,
        subject: &str,
        topic: &str,
        studied_date: NaiveDate,
    ) -> Result<ReviewPlanItem, AppError> {
        let mut inner = self.lock();
        if let Some(existing) = inner.items.iter().find(|i| {
            i.user_id == user_id
                && i.subject == subject
                && i.topic == topic
                && i.studied_date == studied_date
        }) {
            return Ok(existing.clone());
        }
        let item = ReviewPlanItem {
            id: inner.next_id(),
            user_id,
            subject: subject.to_string(),
            topic: topic.to_string(),
            studied_date,
            created_at: Utc::now(),
        };
        inner.items.push(item.clone());
        Ok(item)
    }

    async fn find_item(&self, user_id: i64, item_id: i64) -> Result<Option<ReviewPlanItem>, AppError> {
        Ok(self
            .lock()
            .items
            .iter()
            .find(|i| i.id == item_id && i.user_id == user_id)
            .cloned())
    }

    async fn list_items(&self, user_id: i64) -> Result<Vec<ReviewPlanItem>, AppError> {
        let mut items: Vec<ReviewPlanItem> = self
            .lock()
            .items
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.studied_date.cmp(&a.studied_date).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    async fn insert_completion(
        &self,
        user_id: i64,
        item_id: i64,
        review_date: NaiveDate,
        interval_days: i32,
    ) -> Result<bool, AppError> {
        let completion = ReviewCompletion {
            review_plan_item_id: item_id,
            review_date,
            interval_days,
        };
        let mut inner = self.lock();
        if inner
            .completions
            .iter()
            .any(|(owner, c)| *owner == user_id && *c == completion)
        {
            return Ok(false);
        }
        inner.completions.push((user_id, completion));
        Ok(true)
    }

    async fn delete_completion(
        &self,
        user_id: i64,
        item_id: i64,
        review_date: NaiveDate,
        interval_days: i32,
    ) -> Result<bool, AppError> {
        let mut inner = self.lock();
        let before = inner.completions.len();
        inner.completions.retain(|(owner, c)| {
            !(*owner == user_id
                && c.review_plan_item_id == item_id
                && c.review_date == review_date
                && c.interval_days == interval_days)
        });
        Ok(inner.completions.len() < before)
    }

    async fn list_completions(&self, user_id: i64) -> Result<Vec<ReviewCompletion>, AppError> {
        Ok(self
            .lock()
            .completions
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, c)| c.clone())
            .collect())
    }
}

#[async_trait]
impl DigestStore for MemoryStore {
    async fn active_settings(&self) -> Result<Vec<DailyReportSetting>, AppError> {
        Ok(self
            .lock()
            .settings
            .values()
            .filter(|s| s.is_active())
            .cloned()
            .collect())
    }

    async fn find_setting(&self, user_id: i64) -> Result<Option<DailyReportSetting>, AppError> {
        Ok(self.lock().settings.get(&user_id).cloned())
    }

    async fn upsert_setting(
        &self,
        user_id: i64,
        update: &DigestSettingsUpdate,
    ) -> Result<DailyReportSetting, AppError> {
        let mut inner = self.lock();
        let setting = inner
            .settings
            .entry(user_id)
            .or_insert_with(|| DailyReportSetting::defaults_for(user_id));
        setting.target_email = update.target_email.clone();
        setting.enabled = update.enabled;
        setting.send_hour = update.send_hour;
        setting.time_zone = update.time_zone.clone();
        Ok(setting.clone())
    }

    async fn claim_report_date(&self, user_id: i64, report_date: NaiveDate) -> Result<bool, AppError> {
        let mut inner = self.lock();
        match inner.settings.get_mut(&user_id) {
            Some(setting) if setting.last_sent_date != Some(report_date) => {
                setting.last_sent_date = Some(report_date);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_report_date(
        &self,
        user_id: i64,
        report_date: NaiveDate,
        previous: Option<NaiveDate>,
    ) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(setting) = inner.settings.get_mut(&user_id) {
            if setting.last_sent_date == Some(report_date) {
                setting.last_sent_date = previous;
            }
        }
        Ok(())
    }

    async fn append_log(&self, entry: &NewDigestLog) -> Result<(), AppError> {
        let metrics = entry
            .metrics
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        let mut inner = self.lock();
        let log = DailyReportLog {
            id: inner.next_id(),
            user_id: entry.user_id,
            report_date: entry.report_date,
            trigger: entry.trigger.as_str().to_string(),
            status: entry.status.as_str().to_string(),
            error: entry.error.clone(),
            metrics,
            created_at: Utc::now(),
        };
        inner.logs.push(log);
        Ok(())
    }

    async fn recent_logs(&self, user_id: i64, limit: i64) -> Result<Vec<DailyReportLog>, AppError> {
        // Ids grow monotonically, so they order rows written within the same instant.
        let mut logs: Vec<DailyReportLog> = self
            .lock()
            .logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.id.cmp(&a.id));
        logs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(logs)
    }
}
