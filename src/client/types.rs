//! Typed request and response shapes for the remote API.
//!
//! Every field the service may omit is optional on the wire and resolved to
//! an explicit default here, so consumers never see a half-parsed response.

use std::fmt;

use rand::seq::SliceRandom;
use serde::{Deserialize, Deserializer, Serialize};

/// Connection quality values sampled for each contribute call.
pub const QUALITY_LEVELS: [u32; 6] = [75, 80, 85, 90, 95, 100];

/// Namespace marker distinguishing daily task ids from mission ids.
pub const DAILY_PREFIX: &str = "daily_";

/// Standard `{ "result": ... }` envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub result: Option<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthInfo {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthBody {
    #[serde(default)]
    pub username: Option<String>,
}

impl From<Envelope<AuthBody>> for AuthInfo {
    fn from(envelope: Envelope<AuthBody>) -> Self {
        Self {
            username: envelope.result.and_then(|r| r.username),
        }
    }
}

/// Reward and power gauge of one account.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceState {
    /// Accumulated reward. Display only.
    pub hivera: f64,
    /// Depletable gauge that drives the mining loop.
    pub power: f64,
    /// Gauge ceiling. Display only.
    pub power_capacity: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EngineBody {
    #[serde(default)]
    pub profile: Option<ProfileBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileBody {
    #[serde(rename = "HIVERA", default)]
    pub hivera: Option<f64>,
    #[serde(rename = "POWER", default)]
    pub power: Option<f64>,
    #[serde(rename = "POWER_CAPACITY", default)]
    pub power_capacity: Option<f64>,
}

impl From<Envelope<EngineBody>> for ResourceState {
    fn from(envelope: Envelope<EngineBody>) -> Self {
        let profile = envelope.result.and_then(|r| r.profile);
        match profile {
            Some(p) => Self {
                hivera: p.hivera.unwrap_or(0.0),
                power: p.power.unwrap_or(0.0),
                power_capacity: p.power_capacity.unwrap_or(0.0),
            },
            None => Self::default(),
        }
    }
}

/// Task identifier, tagged with the namespace it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskId {
    Mission(String),
    Daily(String),
}

impl TaskId {
    /// Parse the combined form: `daily_42` is daily task `42`, anything else
    /// is a mission id taken verbatim.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(DAILY_PREFIX) {
            Some(rest) => Self::Daily(rest.to_string()),
            None => Self::Mission(raw.to_string()),
        }
    }

    /// The id as the remote service knows it, without namespace marker.
    pub fn remote_id(&self) -> &str {
        match self {
            Self::Mission(id) | Self::Daily(id) => id,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mission(id) => write!(f, "{id}"),
            Self::Daily(id) => write!(f, "{DAILY_PREFIX}{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub complete: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskBody {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub complete: Option<bool>,
}

impl TaskBody {
    pub(crate) fn into_task(self, daily: bool) -> Task {
        Task {
            id: if daily {
                TaskId::Daily(self.id)
            } else {
                TaskId::Mission(self.id)
            },
            name: self.name.unwrap_or_default(),
            complete: self.complete.unwrap_or(false),
        }
    }
}

/// Result of a task completion call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCompletion {
    pub result: Option<String>,
}

impl TaskCompletion {
    /// Only the literal `"done"` counts as success.
    pub fn is_done(&self) -> bool {
        self.result.as_deref() == Some("done")
    }
}

impl From<Envelope<serde_json::Value>> for TaskCompletion {
    fn from(envelope: Envelope<serde_json::Value>) -> Self {
        let result = match envelope.result {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
            None => None,
        };
        Self { result }
    }
}

/// Body of `POST /engine/contribute`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContributePayload {
    /// Epoch milliseconds at generation time.
    pub from_date: i64,
    pub quality_connection: u32,
}

impl ContributePayload {
    pub fn generate() -> Self {
        let quality_connection = *QUALITY_LEVELS
            .choose(&mut rand::thread_rng())
            .unwrap_or(&QUALITY_LEVELS[0]);
        Self {
            from_date: chrono::Utc::now().timestamp_millis(),
            quality_connection,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct IpBody {
    pub ip: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
