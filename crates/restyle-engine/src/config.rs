use std::env;
use std::fmt;
use std::time::Duration;

use anyhow::{bail, Result};
use restyle_contracts::modes::DEFAULT_API_BASE;
use restyle_contracts::polling::{PollPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use serde_json::Value;

pub const API_KEY_VAR: &str = "LIGHTX_API_KEY";
pub const API_BASE_VAR: &str = "LIGHTX_API_BASE";
pub const POLL_INTERVAL_VAR: &str = "RESTYLE_POLL_INTERVAL";
pub const POLL_MAX_ATTEMPTS_VAR: &str = "RESTYLE_POLL_MAX_ATTEMPTS";
pub const REQUEST_TIMEOUT_VAR: &str = "RESTYLE_REQUEST_TIMEOUT";

const DEFAULT_REQUEST_TIMEOUT_S: f64 = 30.0;

/// Provider credential. Never printed; `scrub` removes it from text.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn scrub(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        text.replace(&self.0, "[redacted]")
    }

    pub fn scrub_value(&self, value: Value) -> Value {
        match value {
            Value::String(text) => Value::String(self.scrub(&text)),
            Value::Array(rows) => {
                Value::Array(rows.into_iter().map(|row| self.scrub_value(row)).collect())
            }
            Value::Object(obj) => Value::Object(
                obj.into_iter()
                    .map(|(key, row)| (key, self.scrub_value(row)))
                    .collect(),
            ),
            other => other,
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([redacted])")
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_key: ApiKey,
    pub api_base: String,
    pub poll: PollPolicy,
    pub request_timeout: Duration,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let setting = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let Some(api_key) = setting(API_KEY_VAR) else {
            bail!("{API_KEY_VAR} not set");
        };
        let api_base = setting(API_BASE_VAR)
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let interval_s = seconds_setting(
            setting(POLL_INTERVAL_VAR),
            DEFAULT_POLL_INTERVAL.as_secs_f64(),
            0.1,
            60.0,
        );
        let max_attempts = setting(POLL_MAX_ATTEMPTS_VAR)
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
            .clamp(1, 120);
        let timeout_s = seconds_setting(
            setting(REQUEST_TIMEOUT_VAR),
            DEFAULT_REQUEST_TIMEOUT_S,
            1.0,
            300.0,
        );

        Ok(Self {
            api_key: ApiKey::new(api_key),
            api_base,
            poll: PollPolicy {
                interval: Duration::from_secs_f64(interval_s),
                max_attempts,
            },
            request_timeout: Duration::from_secs_f64(timeout_s),
        })
    }

    pub fn with_poll_interval(mut self, seconds: f64) -> Self {
        self.poll.interval = Duration::from_secs_f64(seconds.clamp(0.1, 60.0));
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.poll.max_attempts = attempts.clamp(1, 120);
        self
    }
}

fn seconds_setting(raw: Option<String>, default: f64, min: f64, max: f64) -> f64 {
    raw.and_then(|text| text.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}
