// src/services/digest/scheduler.rs

//! Hourly per-user digest decision engine.
//!
//! Each tick walks the active settings and, per user, goes through
//! WrongHour -> AlreadySent -> Dispatch. The day is claimed with a single
//! compare-and-set on `last_sent_date` before anything is sent, and released
//! again if delivery fails, so overlapping ticks never send twice and a failed
//! day is retried on the next tick within the hour.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::{
    error::AppError,
    models::digest::{
        DailyReportSetting, DigestMetrics, LogStatus, LogTrigger, NewDigestLog, SendNowResponse,
        TickSummary,
    },
    services::digest::{
        clock::{local_clock, parse_zone},
        dispatcher::{DigestDispatcher, DispatchError},
    },
    store::DigestStore,
};

/// Pure gate evaluation for one setting at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    Disabled,
    WrongHour { local_hour: u32 },
    AlreadySent { report_date: NaiveDate },
    Dispatch { report_date: NaiveDate },
}

pub fn decide(setting: &DailyReportSetting, now: DateTime<Utc>, zone: Tz) -> TickDecision {
    if !setting.is_active() {
        return TickDecision::Disabled;
    }

    let clock = local_clock(now, zone);
    if i64::from(clock.hour) != i64::from(setting.send_hour) {
        return TickDecision::WrongHour {
            local_hour: clock.hour,
        };
    }
    if setting.last_sent_date == Some(clock.date) {
        return TickDecision::AlreadySent {
            report_date: clock.date,
        };
    }
    TickDecision::Dispatch {
        report_date: clock.date,
    }
}

/// What happened to one user during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Disabled,
    SkippedByHour,
    SkippedAlreadySent,
    Sent,
    Failed,
}

impl TickSummary {
    fn record(&mut self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::Disabled => {}
            TickOutcome::SkippedByHour => self.skipped_by_hour += 1,
            TickOutcome::SkippedAlreadySent => self.skipped_already_sent += 1,
            TickOutcome::Sent => self.sent += 1,
            TickOutcome::Failed => self.failed += 1,
        }
    }
}

pub struct DigestScheduler<'a, S: DigestStore + ?Sized> {
    store: &'a S,
    dispatcher: &'a DigestDispatcher,
    timeout: Duration,
}

impl<'a, S: DigestStore + ?Sized> DigestScheduler<'a, S> {
    pub fn new(store: &'a S, dispatcher: &'a DigestDispatcher, timeout: Duration) -> Self {
        Self {
            store,
            dispatcher,
            timeout,
        }
    }

    /// One full pass over the active settings.
    ///
    /// Only a failure to list the settings is an error; every per-user problem
    /// ends up in the `failed` count.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickSummary, AppError> {
        let settings = self.store.active_settings().await?;
        let mut summary = TickSummary {
            settings: settings.len() as u32,
            ..TickSummary::default()
        };

        for setting in &settings {
            summary.record(self.evaluate_setting(setting, now).await);
        }

        tracing::info!(
            settings = summary.settings,
            sent = summary.sent,
            failed = summary.failed,
            skipped_by_hour = summary.skipped_by_hour,
            skipped_already_sent = summary.skipped_already_sent,
            "Daily digest tick finished"
        );

        Ok(summary)
    }

    /// Runs the state machine for one user. `setting` may be stale; the claim
    /// against the store is authoritative.
    pub async fn evaluate_setting(&self, setting: &DailyReportSetting, now: DateTime<Utc>) -> TickOutcome {
        let Some(zone) = parse_zone(&setting.time_zone) else {
            let report_date = now.date_naive();
            let reason = format!("invalid time zone '{}'", setting.time_zone);
            tracing::warn!(user_id = setting.user_id, "{}", reason);
            if !self.failure_logged_on(setting.user_id, report_date).await {
                self.write_log(setting.user_id, report_date, LogTrigger::Scheduled, Err(reason))
                    .await;
            }
            return TickOutcome::Failed;
        };

        let report_date = match decide(setting, now, zone) {
            TickDecision::Disabled => return TickOutcome::Disabled,
            TickDecision::WrongHour { .. } => return TickOutcome::SkippedByHour,
            TickDecision::AlreadySent { .. } => return TickOutcome::SkippedAlreadySent,
            TickDecision::Dispatch { report_date } => report_date,
        };

        match self.store.claim_report_date(setting.user_id, report_date).await {
            Ok(true) => {}
            // Another tick claimed this day between our read and now.
            Ok(false) => return TickOutcome::SkippedAlreadySent,
            Err(e) => {
                tracing::warn!(user_id = setting.user_id, "Failed to claim report date: {}", e);
                self.write_log(setting.user_id, report_date, LogTrigger::Scheduled, Err(e.to_string()))
                    .await;
                return TickOutcome::Failed;
            }
        }

        match self.dispatch(setting, report_date).await {
            Ok(metrics) => {
                self.write_log(setting.user_id, report_date, LogTrigger::Scheduled, Ok(metrics))
                    .await;
                TickOutcome::Sent
            }
            Err(err) => {
                tracing::warn!(
                    user_id = setting.user_id,
                    %report_date,
                    "Daily digest dispatch failed: {}",
                    err
                );
                if let Err(e) = self
                    .store
                    .release_report_date(setting.user_id, report_date, setting.last_sent_date)
                    .await
                {
                    tracing::error!(user_id = setting.user_id, "Failed to release report date: {}", e);
                }
                self.write_log(setting.user_id, report_date, LogTrigger::Scheduled, Err(err.to_string()))
                    .await;
                TickOutcome::Failed
            }
        }
    }

    /// Sends today's digest immediately, ignoring the hour and already-sent gates.
    /// `last_sent_date` is left alone so the scheduled digest still goes out.
    pub async fn send_now(&self, user_id: i64, now: DateTime<Utc>) -> Result<SendNowResponse, AppError> {
        let setting = self
            .store
            .find_setting(user_id)
            .await?
            .ok_or_else(|| AppError::BadRequest("Daily report is not configured".to_string()))?;

        if setting.target_email.trim().is_empty() {
            return Err(AppError::BadRequest("Target email is not set".to_string()));
        }
        let zone = parse_zone(&setting.time_zone).ok_or_else(|| {
            AppError::BadRequest(format!("Invalid time zone '{}'", setting.time_zone))
        })?;
        let report_date = local_clock(now, zone).date;

        match self.dispatch(&setting, report_date).await {
            Ok(metrics) => {
                self.write_log(user_id, report_date, LogTrigger::Manual, Ok(metrics.clone()))
                    .await;
                Ok(SendNowResponse {
                    ok: true,
                    report_date,
                    metrics,
                })
            }
            Err(err) => {
                self.write_log(user_id, report_date, LogTrigger::Manual, Err(err.to_string()))
                    .await;
                Err(AppError::DispatchFailed(err.to_string()))
            }
        }
    }

    async fn dispatch(
        &self,
        setting: &DailyReportSetting,
        report_date: NaiveDate,
    ) -> Result<DigestMetrics, DispatchError> {
        let send = self.dispatcher.dispatch(
            setting.user_id,
            &setting.target_email,
            &setting.time_zone,
            report_date,
        );
        tokio::time::timeout(self.timeout, send)
            .await
            .unwrap_or_else(|_| Err(DispatchError::TimedOut(self.timeout.as_secs())))
    }

    /// Whether the newest log row is already a scheduled failure for `report_date`.
    async fn failure_logged_on(&self, user_id: i64, report_date: NaiveDate) -> bool {
        match self.store.recent_logs(user_id, 1).await {
            Ok(logs) => logs.first().is_some_and(|log| {
                log.report_date == report_date
                    && log.trigger == LogTrigger::Scheduled.as_str()
                    && log.status == LogStatus::Failed.as_str()
            }),
            Err(e) => {
                tracing::warn!(user_id, "Failed to read digest logs: {}", e);
                false
            }
        }
    }

    async fn write_log(
        &self,
        user_id: i64,
        report_date: NaiveDate,
        trigger: LogTrigger,
        outcome: Result<DigestMetrics, String>,
    ) {
        let entry = match outcome {
            Ok(metrics) => NewDigestLog {
                user_id,
                report_date,
                trigger,
                status: LogStatus::Sent,
                error: None,
                metrics: Some(metrics),
            },
            Err(error) => NewDigestLog {
                user_id,
                report_date,
                trigger,
                status: LogStatus::Failed,
                error: Some(error),
                metrics: None,
            },
        };

        if let Err(e) = self.store.append_log(&entry).await {
            tracing::error!(user_id, "Failed to write digest log: {}", e);
        }
    }
}
