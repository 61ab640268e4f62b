// src/services/scoring.rs

//! Turns a finished attempt into its one and only Result row.

use chrono::{DateTime, Utc};

use crate::{
    config::ScaledScorePolicy,
    error::AppError,
    models::{
        attempt::AttemptStatus,
        question::{AnswerOption, QuestionType},
        result::{ResultSummary, TestResult},
    },
    services::{
        attempts::total_time_at,
        evaluator::{AnswerKey, SubmittedAnswer},
    },
    store::AttemptStore,
};

/// One question of the test as seen by the scorer.
#[derive(Debug, Clone)]
pub struct ScoringItem {
    pub question_id: i64,
    pub question_type: QuestionType,
    pub points: i32,
    pub options: Vec<AnswerOption>,
    /// `None` when the user never answered the question.
    pub answer: Option<SubmittedAnswer>,
}

/// Scores every item in order. Unanswered questions count as wrong.
pub fn aggregate(items: &[ScoringItem], time_spent: i64, policy: &ScaledScorePolicy) -> ResultSummary {
    let mut correct_answers = 0;
    let mut raw_score = 0;
    let mut max_score = 0;

    for item in items {
        max_score += item.points;
        let Some(answer) = &item.answer else {
            continue;
        };
        if AnswerKey::new(item.question_type, &item.options)
            .evaluate(answer)
            .is_correct
        {
            correct_answers += 1;
            raw_score += item.points;
        }
    }

    let total_questions = items.len() as i32;
    let percentage = if total_questions == 0 {
        0.0
    } else {
        round_to(100.0 * f64::from(correct_answers) / f64::from(total_questions), 2)
    };

    ResultSummary {
        correct_answers,
        total_questions,
        raw_score,
        max_score,
        scaled_score: scaled_score(raw_score, max_score, policy),
        percentage,
        time_spent,
    }
}

/// Linear, monotonic mapping of `raw` onto `[floor, ceiling]`.
pub fn scaled_score(raw: i32, max: i32, policy: &ScaledScorePolicy) -> f64 {
    if max <= 0 {
        return policy.floor;
    }
    let ratio = (f64::from(raw) / f64::from(max)).clamp(0.0, 1.0);
    round_to(policy.floor + (policy.ceiling - policy.floor) * ratio, 1)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Completes the attempt and persists its Result exactly once.
///
/// A second call for the same attempt is rejected with `Conflict` and leaves
/// the stored Result untouched.
pub async fn complete_attempt<S: AttemptStore + ?Sized>(
    store: &S,
    user_id: i64,
    attempt_id: i64,
    policy: &ScaledScorePolicy,
    now: DateTime<Utc>,
) -> Result<TestResult, AppError> {
    let attempt = store
        .find_attempt(user_id, attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.status == AttemptStatus::Completed {
        return Err(AppError::Conflict("Attempt already completed".to_string()));
    }

    let items = store.scoring_items(attempt.test_id, attempt.id).await?;
    let summary = aggregate(&items, total_time_at(&attempt, now), policy);

    let result = store
        .finalize_attempt(&attempt, &summary, now)
        .await?
        .ok_or_else(|| AppError::Conflict("Attempt already completed".to_string()))?;

    tracing::info!(
        user_id,
        attempt_id,
        correct = result.correct_answers,
        total = result.total_questions,
        scaled = result.scaled_score,
        "Attempt completed"
    );

    Ok(result)
}

pub async fn get_result<S: AttemptStore + ?Sized>(
    store: &S,
    user_id: i64,
    attempt_id: i64,
) -> Result<TestResult, AppError> {
    store
        .find_result(user_id, attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Result not found".to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::{
        models::attempt::NewAnswer,
        services::{
            attempts::{StartOutcome, pause, save_answer, start},
            evaluator::tests::option,
        },
        store::memory::MemoryStore,
    };

    fn item(id: i64, qt: QuestionType, points: i32, answer: Option<&[&str]>) -> ScoringItem {
        ScoringItem {
            question_id: id,
            question_type: qt,
            points,
            options: vec![option(1, true), option(2, false)],
            answer: answer.map(|tokens| SubmittedAnswer::selection(tokens.iter().copied())),
        }
    }

    #[test]
    fn aggregate_weights_points_and_counts_unanswered_as_wrong() {
        let items = [
            item(1, QuestionType::SingleChoice, 1, Some(&["1"][..])),
            item(2, QuestionType::SingleChoice, 3, Some(&["1"][..])),
            item(3, QuestionType::SingleChoice, 2, Some(&["2"][..])),
            item(4, QuestionType::SingleChoice, 2, None),
        ];
        let summary = aggregate(&items, 300, &ScaledScorePolicy::default());

        assert_eq!(summary.correct_answers, 2);
        assert_eq!(summary.total_questions, 4);
        assert_eq!(summary.raw_score, 4);
        assert_eq!(summary.max_score, 8);
        assert_eq!(summary.percentage, 50.0);
        assert_eq!(summary.scaled_score, 150.0);
        assert_eq!(summary.time_spent, 300);
    }

    #[test]
    fn empty_test_scores_floor_and_zero_percent() {
        let summary = aggregate(&[], 0, &ScaledScorePolicy::default());
        assert_eq!(summary.percentage, 0.0);
        assert_eq!(summary.scaled_score, 100.0);
    }

    #[test]
    fn scaled_score_is_monotonic() {
        let policy = ScaledScorePolicy {
            floor: 100.0,
            ceiling: 200.0,
        };
        let scores: Vec<f64> = (0..=7).map(|raw| scaled_score(raw, 7, &policy)).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(scores[0], 100.0);
        assert_eq!(scores[7], 200.0);
        assert_eq!(scaled_score(1, 3, &policy), 133.3);
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
    }

    async fn answered_attempt(store: &MemoryStore) -> i64 {
        let StartOutcome::Created(attempt) = start(store, 1, 1, t0()).await.unwrap() else {
            panic!("expected a new attempt");
        };
        let answer = NewAnswer {
            answer_ids: Some(vec!["11".into()]),
            answer_text: None,
        };
        save_answer(store, 1, attempt.id, 1, answer).await.unwrap();
        attempt.id
    }

    #[tokio::test]
    async fn completing_twice_keeps_the_first_result() {
        let store = MemoryStore::with_sample_test();
        let attempt_id = answered_attempt(&store).await;
        let policy = ScaledScorePolicy::default();

        let first = complete_attempt(&store, 1, attempt_id, &policy, t0() + Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(first.correct_answers, 1);
        assert_eq!(first.total_questions, 3);
        assert_eq!(first.time_spent, 300);

        let second =
            complete_attempt(&store, 1, attempt_id, &policy, t0() + Duration::minutes(9)).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        assert_eq!(store.result_count(attempt_id), 1);
        assert_eq!(get_result(&store, 1, attempt_id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn completing_from_pause_excludes_paused_time() {
        let store = MemoryStore::with_sample_test();
        let attempt_id = answered_attempt(&store).await;
        pause(&store, 1, attempt_id, t0() + Duration::seconds(40)).await.unwrap();

        let result = complete_attempt(
            &store,
            1,
            attempt_id,
            &ScaledScorePolicy::default(),
            t0() + Duration::hours(2),
        )
        .await
        .unwrap();
        assert_eq!(result.time_spent, 40);
    }

    #[tokio::test]
    async fn racing_finalize_is_rejected() {
        let store = MemoryStore::with_sample_test();
        let attempt_id = answered_attempt(&store).await;
        let attempt = store.find_attempt(1, attempt_id).await.unwrap().unwrap();
        let summary = aggregate(&[], 0, &ScaledScorePolicy::default());

        // A stale snapshot still says in_progress; the store must refuse the second write.
        assert!(store.finalize_attempt(&attempt, &summary, t0()).await.unwrap().is_some());
        assert!(store.finalize_attempt(&attempt, &summary, t0()).await.unwrap().is_none());
        assert_eq!(store.result_count(attempt_id), 1);
    }

    #[tokio::test]
    async fn result_of_open_attempt_is_not_found() {
        let store = MemoryStore::with_sample_test();
        let attempt_id = answered_attempt(&store).await;
        assert!(matches!(
            get_result(&store, 1, attempt_id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
