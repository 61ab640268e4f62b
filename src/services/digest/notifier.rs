// src/services/digest/notifier.rs

//! Outbound delivery of rendered digests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::{EmailConfig, EmailProvider};

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivers one message. At-least-once is acceptable; callers guard against
/// duplicate digests themselves.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &DigestMessage) -> Result<(), NotifyError>;
}

/// Writes digests to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &DigestMessage) -> Result<(), NotifyError> {
        tracing::info!(to = %message.to, subject = %message.subject, "Digest delivered to log");
        Ok(())
    }
}

pub struct SendGridNotifier {
    client: reqwest::Client,
    api_key: String,
    from_address: String,
}

impl SendGridNotifier {
    pub fn new(api_key: String, from_address: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from_address,
        }
    }
}

#[derive(Serialize)]
struct SendGridPayload<'a> {
    personalizations: Vec<SendGridPersonalization<'a>>,
    from: SendGridAddress<'a>,
    subject: &'a str,
    content: Vec<SendGridContent<'a>>,
}

#[derive(Serialize)]
struct SendGridPersonalization<'a> {
    to: Vec<SendGridAddress<'a>>,
}

#[derive(Serialize)]
struct SendGridAddress<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct SendGridContent<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn send(&self, message: &DigestMessage) -> Result<(), NotifyError> {
        let payload = SendGridPayload {
            personalizations: vec![SendGridPersonalization {
                to: vec![SendGridAddress { email: &message.to }],
            }],
            from: SendGridAddress {
                email: &self.from_address,
            },
            subject: &message.subject,
            content: vec![SendGridContent {
                content_type: "text/html",
                value: &message.html,
            }],
        };

        let resp = self
            .client
            .post(SENDGRID_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::HttpStatus { status, body });
        }

        Ok(())
    }
}

/// Picks the notifier named by the email configuration.
pub fn from_config(config: &EmailConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match config.provider {
        EmailProvider::Log => Ok(Arc::new(LogNotifier)),
        EmailProvider::SendGrid => {
            let api_key = config
                .sendgrid_api_key
                .clone()
                .ok_or(NotifyError::NotConfigured("SENDGRID_API_KEY"))?;
            Ok(Arc::new(SendGridNotifier::new(
                api_key,
                config.from_address.clone(),
            )))
        }
    }
}
