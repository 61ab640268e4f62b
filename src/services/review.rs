// src/services/review.rs

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};

use crate::{
    error::AppError,
    models::review::{
        Checkpoint, CheckpointStatus, ReviewCompletion, ReviewPlanItem, ReviewPlanView,
        ToggleOutcome,
    },
    store::ReviewStore,
};

/// Tracks studied topics and their spaced-repetition checkpoints.
///
/// `intervals` is the canonical schedule shown in the plan. Completions are
/// accepted for any positive interval, on or off the schedule.
pub struct ReviewScheduler<'a, S: ReviewStore + ?Sized> {
    store: &'a S,
    intervals: &'a [i32],
}

impl<'a, S: ReviewStore + ?Sized> ReviewScheduler<'a, S> {
    pub fn new(store: &'a S, intervals: &'a [i32]) -> Self {
        Self { store, intervals }
    }

    pub async fn mark_studied(
        &self,
        user_id: i64,
        subject: &str,
        topic: &str,
        studied_date: NaiveDate,
    ) -> Result<ReviewPlanItem, AppError> {
        let item = self
            .store
            .insert_item(user_id, subject.trim(), topic.trim(), studied_date)
            .await?;
        tracing::debug!(user_id, item_id = item.id, "Topic marked as studied");
        Ok(item)
    }

    /// Marks or unmarks one checkpoint. Repeating either direction is a no-op.
    pub async fn set_completion(
        &self,
        user_id: i64,
        item_id: i64,
        review_date: NaiveDate,
        interval_days: i32,
        done: bool,
    ) -> Result<ToggleOutcome, AppError> {
        if interval_days < 1 {
            return Err(AppError::BadRequest(
                "intervalDays must be positive".to_string(),
            ));
        }
        if self.store.find_item(user_id, item_id).await?.is_none() {
            return Err(AppError::NotFound("Review item not found".to_string()));
        }

        let changed = if done {
            self.store
                .insert_completion(user_id, item_id, review_date, interval_days)
                .await?
        } else {
            self.store
                .delete_completion(user_id, item_id, review_date, interval_days)
                .await?
        };

        Ok(ToggleOutcome { done, changed })
    }

    pub async fn plan(&self, user_id: i64, today: NaiveDate) -> Result<Vec<ReviewPlanView>, AppError> {
        let items = self.store.list_items(user_id).await?;
        let completions = self.store.list_completions(user_id).await?;

        Ok(items
            .into_iter()
            .map(|item| {
                let checkpoints = checkpoints(&item, self.intervals, &completions, today);
                ReviewPlanView { item, checkpoints }
            })
            .collect())
    }
}

/// Checkpoints of one item: every scheduled interval plus any off-schedule
/// completion recorded for it, ordered by interval.
pub fn checkpoints(
    item: &ReviewPlanItem,
    intervals: &[i32],
    completions: &[ReviewCompletion],
    today: NaiveDate,
) -> Vec<Checkpoint> {
    let done: BTreeSet<(i32, NaiveDate)> = completions
        .iter()
        .filter(|c| c.review_plan_item_id == item.id)
        .map(|c| (c.interval_days, c.review_date))
        .collect();

    let mut keys: BTreeSet<(i32, NaiveDate)> = intervals
        .iter()
        .filter_map(|&days| checkpoint_date(item.studied_date, days).map(|date| (days, date)))
        .collect();
    keys.extend(done.iter().copied());

    keys.into_iter()
        .map(|(interval_days, review_date)| {
            let is_done = done.contains(&(interval_days, review_date));
            Checkpoint {
                interval_days,
                review_date,
                done: is_done,
                status: if review_date > today {
                    CheckpointStatus::Upcoming
                } else if review_date == today {
                    CheckpointStatus::Due
                } else {
                    CheckpointStatus::Overdue
                },
            }
        })
        .collect()
}

pub fn checkpoint_date(studied: NaiveDate, interval_days: i32) -> Option<NaiveDate> {
    u64::try_from(interval_days)
        .ok()
        .and_then(|days| studied.checked_add_days(Days::new(days)))
}
