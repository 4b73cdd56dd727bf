//! Error types for the Hivera bot.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors on the required inputs (account and proxy files).
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("No accounts found in {path}")]
    NoAccounts { path: String },

    #[error("Invalid proxy '{line}': {reason}")]
    InvalidProxy { line: String, reason: String },
}

/// Remote service errors, one variant per RPC family.
///
/// All of these are recovered at the call site; none of them ends an
/// account's cycle on its own.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    #[error("Auth request failed: {0}")]
    Auth(String),

    #[error("Referral request failed: {0}")]
    Referral(String),

    #[error("Power info request failed: {0}")]
    PowerFetch(String),

    #[error("Task list request failed: {0}")]
    TaskList(String),

    #[error("Task {task_id} completion failed: {reason}")]
    TaskComplete { task_id: String, reason: String },

    #[error("Contribute request failed: {0}")]
    Contribute(String),

    #[error("Egress IP probe failed: {0}")]
    IpProbe(String),
}

/// Malformed credential blob.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential has no user= field")]
    MissingUser,

    #[error("user field is not valid JSON: {0}")]
    InvalidUser(#[from] serde_json::Error),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
