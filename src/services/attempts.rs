// src/services/attempts.rs

//! Attempt lifecycle: start, pause, resume and answer saving.
//! Completion lives in [`crate::services::scoring`].

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::attempt::{AttemptStatus, NewAnswer, TestAttempt, UserAnswerRow},
    store::AttemptStore,
};

#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Created(TestAttempt),
    /// An open attempt for the same test already existed and is handed back.
    Existing(TestAttempt),
}

/// Seconds of the segment currently running, zero unless in progress.
pub fn running_segment(attempt: &TestAttempt, now: DateTime<Utc>) -> i64 {
    if attempt.status != AttemptStatus::InProgress {
        return 0;
    }
    let since = attempt.resumed_at.unwrap_or(attempt.started_at);
    (now - since).num_seconds().max(0)
}

/// Total active time as of `now`.
pub fn total_time_at(attempt: &TestAttempt, now: DateTime<Utc>) -> i64 {
    attempt.total_time + running_segment(attempt, now)
}

/// `in_progress -> paused`, folding the running segment into `total_time`.
pub fn paused(attempt: &TestAttempt, now: DateTime<Utc>) -> Result<TestAttempt, AppError> {
    if attempt.status != AttemptStatus::InProgress {
        return Err(AppError::Conflict(format!(
            "Cannot pause an attempt that is {}",
            attempt.status.as_str()
        )));
    }
    Ok(TestAttempt {
        status: AttemptStatus::Paused,
        paused_at: Some(now),
        total_time: total_time_at(attempt, now),
        ..attempt.clone()
    })
}

/// `paused -> in_progress`.
pub fn resumed(attempt: &TestAttempt, now: DateTime<Utc>) -> Result<TestAttempt, AppError> {
    if attempt.status != AttemptStatus::Paused {
        return Err(AppError::Conflict(format!(
            "Cannot resume an attempt that is {}",
            attempt.status.as_str()
        )));
    }
    Ok(TestAttempt {
        status: AttemptStatus::InProgress,
        resumed_at: Some(now),
        ..attempt.clone()
    })
}

pub async fn get<S: AttemptStore + ?Sized>(
    store: &S,
    user_id: i64,
    attempt_id: i64,
) -> Result<TestAttempt, AppError> {
    store
        .find_attempt(user_id, attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))
}

pub async fn start<S: AttemptStore + ?Sized>(
    store: &S,
    user_id: i64,
    test_id: i64,
    now: DateTime<Utc>,
) -> Result<StartOutcome, AppError> {
    if !store.test_exists(test_id).await? {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    if let Some(existing) = store.open_attempt(user_id, test_id).await? {
        return Ok(StartOutcome::Existing(existing));
    }

    match store.create_attempt(user_id, test_id, now).await? {
        Some(created) => {
            tracing::info!(user_id, test_id, attempt_id = created.id, "Attempt started");
            Ok(StartOutcome::Created(created))
        }
        // Lost a race with a concurrent start for the same test.
        None => store
            .open_attempt(user_id, test_id)
            .await?
            .map(StartOutcome::Existing)
            .ok_or_else(|| AppError::Conflict("Attempt could not be started".to_string())),
    }
}

pub async fn pause<S: AttemptStore + ?Sized>(
    store: &S,
    user_id: i64,
    attempt_id: i64,
    now: DateTime<Utc>,
) -> Result<TestAttempt, AppError> {
    let attempt = get(store, user_id, attempt_id).await?;
    let next = paused(&attempt, now)?;
    apply(store, &next, attempt.status).await
}

pub async fn resume<S: AttemptStore + ?Sized>(
    store: &S,
    user_id: i64,
    attempt_id: i64,
    now: DateTime<Utc>,
) -> Result<TestAttempt, AppError> {
    let attempt = get(store, user_id, attempt_id).await?;
    let next = resumed(&attempt, now)?;
    apply(store, &next, attempt.status).await
}

async fn apply<S: AttemptStore + ?Sized>(
    store: &S,
    next: &TestAttempt,
    expected: AttemptStatus,
) -> Result<TestAttempt, AppError> {
    if store.transition_attempt(next, expected).await? {
        Ok(next.clone())
    } else {
        Err(AppError::Conflict(
            "Attempt changed concurrently, reload and retry".to_string(),
        ))
    }
}

/// Upserts the answer for one question of an open attempt.
pub async fn save_answer<S: AttemptStore + ?Sized>(
    store: &S,
    user_id: i64,
    attempt_id: i64,
    question_id: i64,
    answer: NewAnswer,
) -> Result<UserAnswerRow, AppError> {
    let attempt = get(store, user_id, attempt_id).await?;
    if attempt.status == AttemptStatus::Completed {
        return Err(AppError::Conflict("Attempt already completed".to_string()));
    }
    if !store.question_in_test(attempt.test_id, question_id).await? {
        return Err(AppError::NotFound("Question not found in this test".to_string()));
    }
    store.upsert_answer(attempt.id, question_id, &answer).await
}
