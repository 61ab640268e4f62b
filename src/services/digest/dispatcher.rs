// src/services/digest/dispatcher.rs

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    models::digest::DigestMetrics,
    services::digest::{
        clock::parse_zone,
        notifier::{DigestMessage, Notifier, NotifyError},
    },
    store::MetricsProvider,
    utils::html::escape_text,
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid time zone '{0}'")]
    TimeZone(String),
    #[error("metrics unavailable: {0}")]
    Metrics(String),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error("dispatch timed out after {0}s")]
    TimedOut(u64),
}

/// Gathers a user's figures for one day and hands the rendered digest to the notifier.
///
/// Holds no state about what was already sent; the scheduler owns that.
#[derive(Clone)]
pub struct DigestDispatcher {
    metrics: Arc<dyn MetricsProvider>,
    notifier: Arc<dyn Notifier>,
}

impl DigestDispatcher {
    pub fn new(metrics: Arc<dyn MetricsProvider>, notifier: Arc<dyn Notifier>) -> Self {
        Self { metrics, notifier }
    }

    pub async fn dispatch(
        &self,
        user_id: i64,
        target_email: &str,
        time_zone: &str,
        report_date: NaiveDate,
    ) -> Result<DigestMetrics, DispatchError> {
        let zone = parse_zone(time_zone).ok_or_else(|| DispatchError::TimeZone(time_zone.to_string()))?;

        let metrics = self
            .metrics
            .daily_metrics(user_id, report_date, zone)
            .await
            .map_err(|e| DispatchError::Metrics(e.to_string()))?;

        let message = render(target_email, report_date, &metrics);
        self.notifier.send(&message).await?;

        Ok(metrics)
    }
}

/// Builds the subject and HTML body of a digest.
pub fn render(target_email: &str, report_date: NaiveDate, metrics: &DigestMetrics) -> DigestMessage {
    let subject = format!("Daily progress report: {}", report_date.format("%Y-%m-%d"));

    let mut html = String::new();
    html.push_str(&format!("<h2>{subject}</h2>"));

    if metrics.attempts_completed == 0 && metrics.reviews_completed == 0 {
        html.push_str("<p>No tests or reviews were completed on this day.</p>");
    } else {
        html.push_str("<ul>");
        html.push_str(&format!(
            "<li>Tests completed: {}</li>",
            metrics.attempts_completed
        ));
        html.push_str(&format!(
            "<li>Correct answers: {} of {}</li>",
            metrics.correct_answers, metrics.total_questions
        ));
        html.push_str(&format!("<li>Mistakes: {}</li>", metrics.mistakes));
        html.push_str(&format!(
            "<li>Average result: {:.1}%</li>",
            metrics.average_percentage
        ));
        if let Some(best) = metrics.best_scaled_score {
            html.push_str(&format!("<li>Best scaled score: {best:.1}</li>"));
        }
        html.push_str(&format!(
            "<li>Time spent: {} min</li>",
            metrics.time_spent / 60
        ));
        html.push_str(&format!(
            "<li>Review checkpoints done: {}</li>",
            metrics.reviews_completed
        ));
        html.push_str("</ul>");
    }

    // The address is user-supplied; everything else above is numeric.
    html.push_str(&format!(
        "<p>This report was sent to {} because daily reports are enabled in your settings.</p>",
        escape_text(target_email)
    ));

    DigestMessage {
        to: target_email.to_string(),
        subject,
        html,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono_tz::Tz;

    use super::*;
    use crate::error::AppError;

    /// Records every message; fails while `fail` is set.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) sent: Mutex<Vec<DigestMessage>>,
        pub(crate) fail: Mutex<bool>,
    }

    impl RecordingNotifier {
        pub(crate) fn set_failing(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        pub(crate) fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, message: &DigestMessage) -> Result<(), NotifyError> {
            if *self.fail.lock().unwrap() {
                return Err(NotifyError::NotConfigured("test"));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    pub(crate) struct FixedMetrics(pub(crate) DigestMetrics);

    #[async_trait]
    impl MetricsProvider for FixedMetrics {
        async fn daily_metrics(
            &self,
            _user_id: i64,
            _report_date: NaiveDate,
            _zone: Tz,
        ) -> Result<DigestMetrics, AppError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenMetrics;

    #[async_trait]
    impl MetricsProvider for BrokenMetrics {
        async fn daily_metrics(
            &self,
            _user_id: i64,
            _report_date: NaiveDate,
            _zone: Tz,
        ) -> Result<DigestMetrics, AppError> {
            Err(AppError::InternalServerError("db down".into()))
        }
    }

    fn sample_metrics() -> DigestMetrics {
        DigestMetrics {
            attempts_completed: 2,
            correct_answers: 30,
            total_questions: 40,
            mistakes: 10,
            average_percentage: 75.0,
            best_scaled_score: Some(181.5),
            time_spent: 3600,
            reviews_completed: 1,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 10).unwrap()
    }

    #[tokio::test]
    async fn dispatch_sends_rendered_digest() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher =
            DigestDispatcher::new(Arc::new(FixedMetrics(sample_metrics())), notifier.clone());

        let metrics = dispatcher
            .dispatch(1, "student@example.com", "Europe/Kyiv", day())
            .await
            .unwrap();

        assert_eq!(metrics, sample_metrics());
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "student@example.com");
        assert_eq!(sent[0].subject, "Daily progress report: 2025-07-10");
        assert!(sent[0].html.contains("Correct answers: 30 of 40"));
    }

    #[tokio::test]
    async fn notifier_and_metrics_failures_surface_as_errors() {
        let notifier = Arc::new(RecordingNotifier::default());
        notifier.set_failing(true);
        let dispatcher =
            DigestDispatcher::new(Arc::new(FixedMetrics(sample_metrics())), notifier.clone());
        assert!(matches!(
            dispatcher.dispatch(1, "a@b.com", "Europe/Kyiv", day()).await,
            Err(DispatchError::Notify(_))
        ));

        let dispatcher = DigestDispatcher::new(Arc::new(BrokenMetrics), notifier);
        assert!(matches!(
            dispatcher.dispatch(1, "a@b.com", "Europe/Kyiv", day()).await,
            Err(DispatchError::Metrics(_))
        ));
    }

    #[tokio::test]
    async fn bad_zone_fails_before_any_io() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = DigestDispatcher::new(Arc::new(BrokenMetrics), notifier.clone());
        assert!(matches!(
            dispatcher.dispatch(1, "a@b.com", "Nowhere/City", day()).await,
            Err(DispatchError::TimeZone(_))
        ));
        assert_eq!(notifier.sent_count(), 0);
    }

    #[test]
    fn recipient_address_is_escaped_in_the_body() {
        let message = render("x<b>&co@example.com", day(), &sample_metrics());
        assert_eq!(message.to, "x<b>&co@example.com");
        assert!(!message.html.contains("<b>"));
        assert!(message.html.contains("&lt;b&gt;&amp;co@example.com"));
    }

    #[test]
    fn empty_day_renders_a_short_note() {
        let message = render("a@b.com", day(), &DigestMetrics::default());
        assert!(message.html.contains("No tests or reviews"));
    }
}
