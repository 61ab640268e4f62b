// src/config.rs

use std::{env, net::SocketAddr, str::FromStr};

use dotenvy::dotenv;
use thiserror::Error;

/// Size of the recent answer window scanned when building the mistakes list.
pub const MISTAKE_SCAN_LIMIT: i64 = 500;

/// Number of dispatch log rows returned together with the digest settings.
pub const DIGEST_LOG_LIMIT: i64 = 20;

pub const DEFAULT_SEND_HOUR: i32 = 20;
pub const DEFAULT_TIME_ZONE: &str = "Europe/Kyiv";

/// Checkpoint schedule used when `REVIEW_INTERVALS` is not set.
pub const DEFAULT_REVIEW_INTERVALS: [i32; 5] = [1, 3, 7, 14, 30];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Which notifier delivers rendered digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailProvider {
    /// Writes the digest to the application log instead of sending it.
    Log,
    SendGrid,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub provider: EmailProvider,
    pub sendgrid_api_key: Option<String>,
    pub from_address: String,
}

/// Linear mapping of a raw score onto the scaled range `[floor, ceiling]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledScorePolicy {
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for ScaledScorePolicy {
    fn default() -> Self {
        Self {
            floor: 100.0,
            ceiling: 200.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    /// Shared secret for the scheduler tick endpoint. Unset means the endpoint is open.
    pub cron_secret: Option<String>,
    pub dispatch_timeout_secs: u64,
    /// When set, the binary runs the digest tick itself on this interval.
    pub tick_interval_secs: Option<u64>,
    pub scaled_score: ScaledScorePolicy,
    pub review_intervals: Vec<i32>,
    pub email: EmailConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;
        let rust_log = optional("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let bind_addr = parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;
        let dispatch_timeout_secs = parse_or("DIGEST_DISPATCH_TIMEOUT_SECS", 30)?;
        let tick_interval_secs = match optional("DIGEST_TICK_INTERVAL_SECS") {
            Some(raw) => Some(parse_value("DIGEST_TICK_INTERVAL_SECS", &raw)?),
            None => None,
        };

        let defaults = ScaledScorePolicy::default();
        let scaled_score = ScaledScorePolicy {
            floor: parse_or("SCALED_SCORE_FLOOR", defaults.floor)?,
            ceiling: parse_or("SCALED_SCORE_CEILING", defaults.ceiling)?,
        };
        if scaled_score.ceiling < scaled_score.floor {
            return Err(ConfigError::Invalid {
                name: "SCALED_SCORE_CEILING",
                value: scaled_score.ceiling.to_string(),
            });
        }

        let review_intervals = match optional("REVIEW_INTERVALS") {
            Some(raw) => parse_intervals(&raw)?,
            None => DEFAULT_REVIEW_INTERVALS.to_vec(),
        };

        let provider = match optional("EMAIL_PROVIDER").as_deref() {
            None | Some("log") => EmailProvider::Log,
            Some("sendgrid") => EmailProvider::SendGrid,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "EMAIL_PROVIDER",
                    value: other.to_string(),
                });
            }
        };
        let sendgrid_api_key = optional("SENDGRID_API_KEY");
        if provider == EmailProvider::SendGrid && sendgrid_api_key.is_none() {
            return Err(ConfigError::Missing("SENDGRID_API_KEY"));
        }

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            cron_secret: optional("CRON_SECRET"),
            dispatch_timeout_secs,
            tick_interval_secs,
            scaled_score,
            review_intervals,
            email: EmailConfig {
                provider,
                sendgrid_api_key,
                from_address: optional("EMAIL_FROM")
                    .unwrap_or_else(|| "reports@exam-prep.local".to_string()),
            },
        })
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

/// Parses a comma-separated list of positive day offsets, e.g. `1,3,7`.
fn parse_intervals(raw: &str) -> Result<Vec<i32>, ConfigError> {
    let mut intervals = Vec::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let days: i32 = parse_value("REVIEW_INTERVALS", part)?;
        if days < 1 {
            return Err(ConfigError::Invalid {
                name: "REVIEW_INTERVALS",
                value: raw.to_string(),
            });
        }
        intervals.push(days);
    }
    intervals.sort_unstable();
    intervals.dedup();
    Ok(intervals)
}
