use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use vidgen_core::simulation::DEFAULT_SIMULATION_DURATION;

use crate::poller::{PollerConfig, DEFAULT_MAX_CONSECUTIVE_FAILURES, DEFAULT_POLL_INTERVAL};

/// Default base URL of the generation service.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/";

/// Default timeout for submission calls.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for status calls. Shorter than submissions: a slow
/// status check is simply retried on the next tick.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(8);

/// What to do when a submission cannot be completed against the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Surface the classified error; the job ends in `Failed`.
    #[default]
    Disabled,
    /// Continue with a simulated job and log the cause.
    OnFailure,
    /// Never contact the service; every job is simulated.
    Always,
}

impl FromStr for FallbackPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" | "none" => Ok(Self::Disabled),
            "on-failure" | "on_failure" | "fallback" => Ok(Self::OnFailure),
            "always" | "demo" => Ok(Self::Always),
            _ => Err(ConfigError::Invalid {
                var: "FALLBACK_POLICY",
                expected: "one of disabled, on-failure, always",
                value: s.to_string(),
            }),
        }
    }
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Service base URL, always ending in `/`.
    pub api_url: Url,
    /// Sent as `Authorization: Bearer <key>` when present.
    pub api_key: Option<String>,
    pub submit_timeout: Duration,
    pub status_timeout: Duration,
    pub poll_interval: Duration,
    /// Time a simulated job takes to complete.
    pub simulation_duration: Duration,
    pub fallback_policy: FallbackPolicy,
    /// Consecutive failed ticks before the job is failed; `0` = unlimited.
    pub max_consecutive_poll_failures: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            simulation_duration: DEFAULT_SIMULATION_DURATION,
            fallback_policy: FallbackPolicy::default(),
            max_consecutive_poll_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

impl InferenceConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                         | Default                  |
    /// |---------------------------------|--------------------------|
    /// | `INFERENCE_API_URL`             | `http://localhost:8000/` |
    /// | `INFERENCE_API_KEY`             | unset                    |
    /// | `SUBMIT_TIMEOUT_SECS`           | `30`                     |
    /// | `STATUS_TIMEOUT_SECS`           | `8`                      |
    /// | `POLL_INTERVAL_MS`              | `2000`                   |
    /// | `SIMULATION_DURATION_SECS`      | `20`                     |
    /// | `FALLBACK_POLICY`               | `disabled`               |
    /// | `MAX_CONSECUTIVE_POLL_FAILURES` | `10`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = match lookup("INFERENCE_API_URL") {
            Some(raw) => parse_base_url(&raw)?,
            None => defaults.api_url,
        };

        let api_key = lookup("INFERENCE_API_KEY").filter(|k| !k.trim().is_empty());

        let submit_timeout = match lookup("SUBMIT_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_positive("SUBMIT_TIMEOUT_SECS", &raw)?),
            None => defaults.submit_timeout,
        };
        let status_timeout = match lookup("STATUS_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_positive("STATUS_TIMEOUT_SECS", &raw)?),
            None => defaults.status_timeout,
        };
        let poll_interval = match lookup("POLL_INTERVAL_MS") {
            Some(raw) => Duration::from_millis(parse_positive("POLL_INTERVAL_MS", &raw)?),
            None => defaults.poll_interval,
        };
        let simulation_duration = match lookup("SIMULATION_DURATION_SECS") {
            Some(raw) => Duration::from_secs(parse_u64("SIMULATION_DURATION_SECS", &raw)?),
            None => defaults.simulation_duration,
        };
        let fallback_policy = match lookup("FALLBACK_POLICY") {
            Some(raw) => raw.parse()?,
            None => defaults.fallback_policy,
        };
        let max_consecutive_poll_failures = match lookup("MAX_CONSECUTIVE_POLL_FAILURES") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "MAX_CONSECUTIVE_POLL_FAILURES",
                expected: "a non-negative integer",
                value: raw.clone(),
            })?,
            None => defaults.max_consecutive_poll_failures,
        };

        Ok(Self {
            api_url,
            api_key,
            submit_timeout,
            status_timeout,
            poll_interval,
            simulation_duration,
            fallback_policy,
            max_consecutive_poll_failures,
        })
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: self.poll_interval,
            max_consecutive_failures: self.max_consecutive_poll_failures,
        }
    }
}

/// Errors from loading [`InferenceConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected} (got '{value}')")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("DEFAULT_API_URL is a valid URL")
}

/// Parse an `http(s)` base URL and make sure it ends in `/` so that
/// relative joins append rather than replace the last segment.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::Invalid {
        var: "INFERENCE_API_URL",
        expected: "an absolute http(s) URL",
        value: raw.to_string(),
    };
    let mut url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_u64(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        expected: "a non-negative integer",
        value: raw.to_string(),
    })
}

fn parse_positive(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match parse_u64(var, raw)? {
        0 => Err(ConfigError::Invalid {
            var,
            expected: "greater than 0",
            value: raw.to_string(),
        }),
        n => Ok(n),
    }
}
