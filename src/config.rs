//! Configuration types.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://app.hivera.org";
pub const DEFAULT_REFERRAL_CODE: &str = "2b6a4dfc8";
pub const DEFAULT_IP_CHECK_URL: &str = "https://api.ipify.org?format=json";

/// How each account's execution unit is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationMode {
    /// One tokio task per account on the shared runtime.
    #[default]
    Task,
    /// One OS thread with its own single-threaded runtime per account.
    Thread,
}

/// Fixed pacing delays used by the state machine and the scheduler.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Pause before every task completion call.
    pub task_delay: Duration,
    /// Pause between the info fetch and the first contribute call.
    pub mining_settle: Duration,
    /// Pause after each successful contribute call.
    pub mining_interval: Duration,
    /// Pause between two batches of the same cycle.
    pub batch_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            task_delay: Duration::from_secs(2),
            mining_settle: Duration::from_secs(3),
            mining_interval: Duration::from_secs(30),
            batch_delay: Duration::from_secs(3),
        }
    }
}

impl Pacing {
    /// No delays at all. Used by tests.
    pub fn immediate() -> Self {
        Self {
            task_delay: Duration::ZERO,
            mining_settle: Duration::ZERO,
            mining_interval: Duration::ZERO,
            batch_delay: Duration::ZERO,
        }
    }
}

/// Bot configuration, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Remote service base URL, without trailing slash.
    pub base_url: String,
    /// Run the task sweep before mining.
    pub auto_task: bool,
    /// Task ids never attempted (daily ids carry the `daily_` prefix).
    pub skip_tasks: HashSet<String>,
    /// Accounts processed concurrently per batch.
    pub max_concurrent: usize,
    /// Startup jitter bounds in seconds, inclusive.
    pub start_delay: (u64, u64),
    /// Sleep between two complete cycles.
    pub cycle_interval: Duration,
    pub referral_code: String,
    pub ip_check_url: String,
    pub data_file: PathBuf,
    pub proxy_file: PathBuf,
    pub isolation: IsolationMode,
    /// Transport timeout; `None` keeps the HTTP client default.
    pub request_timeout: Option<Duration>,
    pub pacing: Pacing,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auto_task: false,
            skip_tasks: HashSet::new(),
            max_concurrent: 10,
            start_delay: (1, 15),
            cycle_interval: Duration::from_secs(60 * 60),
            referral_code: DEFAULT_REFERRAL_CODE.to_string(),
            ip_check_url: DEFAULT_IP_CHECK_URL.to_string(),
            data_file: PathBuf::from("data.txt"),
            proxy_file: PathBuf::from("proxy.txt"),
            isolation: IsolationMode::Task,
            request_timeout: None,
            pacing: Pacing::default(),
        }
    }
}

impl BotConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = get("BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(value) = get("AUTO_TASK") {
            config.auto_task = parse_bool("AUTO_TASK", &value)?;
        }

        if let Some(value) = get("SKIP_TASKS") {
            config.skip_tasks = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(value) = get("MAX_THREADS") {
            let max: usize = parse_number("MAX_THREADS", &value)?;
            if max == 0 {
                return Err(invalid("MAX_THREADS", "must be at least 1"));
            }
            config.max_concurrent = max;
        }

        if let Some(value) = get("DELAY_START_BOT") {
            config.start_delay = parse_range("DELAY_START_BOT", &value)?;
        }

        if let Some(value) = get("TIME_SLEEP") {
            let minutes: u64 = parse_number("TIME_SLEEP", &value)?;
            let secs = minutes
                .checked_mul(60)
                .ok_or_else(|| invalid("TIME_SLEEP", "interval is too large"))?;
            config.cycle_interval = Duration::from_secs(secs);
        }

        if let Some(code) = get("REFERRAL_CODE") {
            config.referral_code = code;
        }
        if let Some(url) = get("IP_CHECK_URL") {
            config.ip_check_url = url;
        }
        if let Some(path) = get("DATA_FILE") {
            config.data_file = PathBuf::from(path);
        }
        if let Some(path) = get("PROXY_FILE") {
            config.proxy_file = PathBuf::from(path);
        }

        if let Some(value) = get("ISOLATION") {
            config.isolation = match value.to_ascii_lowercase().as_str() {
                "task" => IsolationMode::Task,
                "thread" => IsolationMode::Thread,
                other => {
                    return Err(invalid(
                        "ISOLATION",
                        &format!("expected 'task' or 'thread', got '{other}'"),
                    ));
                }
            };
        }

        if let Some(value) = get("REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_number("REQUEST_TIMEOUT_SECS", &value)?;
            config.request_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(invalid(key, &format!("expected a boolean, got '{other}'"))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| invalid(key, &format!("expected a non-negative integer, got '{value}'")))
}

/// Parse `min,max` (brackets tolerated, as in `[5,10]`).
fn parse_range(key: &str, value: &str) -> Result<(u64, u64), ConfigError> {
    let inner = value.trim_start_matches('[').trim_end_matches(']');
    let mut parts = inner.split(',').map(str::trim);
    let (Some(min), Some(max), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid(key, &format!("expected 'min,max', got '{value}'")));
    };
    let min: u64 = parse_number(key, min)?;
    let max: u64 = parse_number(key, max)?;
    if min > max {
        return Err(invalid(key, &format!("min {min} is greater than max {max}")));
    }
    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(!config.auto_task);
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.cycle_interval, Duration::from_secs(3600));
        assert_eq!(config.isolation, IsolationMode::Task);
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn parses_all_keys() {
        let config = from_pairs(&[
            ("BASE_URL", "https://example.test/api/"),
            ("AUTO_TASK", "true"),
            ("SKIP_TASKS", "7, daily_3 ,"),
            ("MAX_THREADS", "4"),
            ("DELAY_START_BOT", "[2, 9]"),
            ("TIME_SLEEP", "15"),
            ("ISOLATION", "thread"),
            ("REQUEST_TIMEOUT_SECS", "20"),
        ])
        .unwrap();

        assert_eq!(config.base_url, "https://example.test/api");
        assert!(config.auto_task);
        assert_eq!(config.skip_tasks.len(), 2);
        assert!(config.skip_tasks.contains("daily_3"));
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.start_delay, (2, 9));
        assert_eq!(config.cycle_interval, Duration::from_secs(900));
        assert_eq!(config.isolation, IsolationMode::Thread);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(20)));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = from_pairs(&[("MAX_THREADS", "0")]).unwrap_err();
        assert!(err.to_string().contains("MAX_THREADS"));
    }

    #[test]
    fn rejects_inverted_delay_range() {
        assert!(from_pairs(&[("DELAY_START_BOT", "10,2")]).is_err());
        assert!(from_pairs(&[("DELAY_START_BOT", "10")]).is_err());
    }

    #[test]
    fn rejects_bad_bool() {
        assert!(from_pairs(&[("AUTO_TASK", "maybe")]).is_err());
    }

    #[test]
    fn rejects_overflowing_sleep() {
        let err = from_pairs(&[("TIME_SLEEP", "400000000000000000")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TIME_SLEEP"));

        let config = from_pairs(&[("TIME_SLEEP", "5")]).unwrap();
        assert_eq!(config.cycle_interval, Duration::from_secs(300));
    }
}
