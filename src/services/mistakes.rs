// src/services/mistakes.rs

//! The "my mistakes" view: questions whose most recent answer was wrong.
//!
//! Only the newest `MISTAKE_SCAN_LIMIT` answer rows are scanned, so very old
//! mistakes can drop out of the list for heavy users.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::MISTAKE_SCAN_LIMIT,
    error::AppError,
    models::question::{AnswerOption, QuestionType},
    services::evaluator::{AnswerKey, SubmittedAnswer},
    store::AttemptStore,
};

/// One stored answer of a completed attempt, joined with its question.
#[derive(Debug, Clone)]
pub struct AnsweredQuestion {
    pub question_id: i64,
    pub question_type: QuestionType,
    pub text: String,
    pub subject: String,
    pub test_title: String,
    pub attempt_id: i64,
    pub answered_at: DateTime<Utc>,
    pub answer_ids: Option<String>,
    pub answer_text: Option<String>,
    pub options: Vec<AnswerOption>,
}

/// Raw query string of the mistakes endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct MistakeParams {
    pub subject: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub search: Option<String>,
}

/// Validated filter predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MistakeFilter {
    pub subject: Option<String>,
    pub question_type: Option<QuestionType>,
    /// Already lowercased.
    pub search: Option<String>,
}

impl TryFrom<MistakeParams> for MistakeFilter {
    type Error = AppError;

    fn try_from(params: MistakeParams) -> Result<Self, Self::Error> {
        let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let question_type = non_blank(params.question_type)
            .map(|t| t.parse::<QuestionType>())
            .transpose()
            .map_err(AppError::BadRequest)?;

        Ok(Self {
            subject: non_blank(params.subject),
            question_type,
            search: non_blank(params.search).map(|s| s.to_lowercase()),
        })
    }
}

impl MistakeFilter {
    fn matches(&self, row: &AnsweredQuestion) -> bool {
        if let Some(subject) = &self.subject {
            if &row.subject != subject {
                return false;
            }
        }
        if let Some(question_type) = self.question_type {
            if row.question_type != question_type {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !row.text.to_lowercase().contains(search) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mistake {
    pub question_id: i64,
    pub question_type: QuestionType,
    pub text: String,
    pub subject: String,
    pub test_title: String,
    pub attempt_id: i64,
    pub answered_at: DateTime<Utc>,
    pub selected: Vec<String>,
    pub answer_text: Option<String>,
    pub options: Vec<AnswerOption>,
}

/// Walks `rows` newest-first, keeps the first row per question, filters, and
/// emits the ones answered wrongly. Output keeps the traversal order.
pub fn extract_mistakes(rows: Vec<AnsweredQuestion>, filter: &MistakeFilter) -> Vec<Mistake> {
    let mut seen = HashSet::new();
    let mut mistakes = Vec::new();

    for row in rows {
        // Dedup comes before filtering: an older answer never stands in for a newer one.
        if !seen.insert(row.question_id) {
            continue;
        }
        if !filter.matches(&row) {
            continue;
        }

        let submitted = SubmittedAnswer::from_stored(row.answer_ids.as_deref(), row.answer_text.as_deref());
        if AnswerKey::new(row.question_type, &row.options)
            .evaluate(&submitted)
            .is_correct
        {
            continue;
        }

        mistakes.push(Mistake {
            question_id: row.question_id,
            question_type: row.question_type,
            text: row.text,
            subject: row.subject,
            test_title: row.test_title,
            attempt_id: row.attempt_id,
            answered_at: row.answered_at,
            selected: submitted.selected,
            answer_text: submitted.text,
            options: row.options,
        });
    }

    mistakes
}

pub async fn find_mistakes<S: AttemptStore + ?Sized>(
    store: &S,
    user_id: i64,
    filter: &MistakeFilter,
) -> Result<Vec<Mistake>, AppError> {
    let rows = store.recent_answers(user_id, MISTAKE_SCAN_LIMIT).await?;
    Ok(extract_mistakes(rows, filter))
}
