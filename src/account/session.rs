//! Per-account session data, derived fresh from the raw credential list each
//! cycle.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::CredentialError;
use crate::input::{ProxyRef, assign_proxy};

/// Placeholder until the egress probe resolves an address.
pub const UNKNOWN_IP: &str = "unknown";

/// Opaque session-export blob. Never printed.
#[derive(Debug)]
pub struct Credential(SecretString);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(SecretString::from(raw.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Display name embedded in the credential's `user=` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Identity {
    /// Parse the URL-encoded JSON `user` field out of the credential blob.
    pub fn from_credential(cred: &Credential) -> Result<Self, CredentialError> {
        let user = url::form_urlencoded::parse(cred.expose().as_bytes())
            .find(|(key, _)| key == "user")
            .map(|(_, value)| value.into_owned())
            .ok_or(CredentialError::MissingUser)?;
        Ok(serde_json::from_str(&user)?)
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// One account for the duration of a single cycle.
#[derive(Debug)]
pub struct AccountSession {
    /// Position in the input list (0-based).
    pub index: usize,
    pub credential: Credential,
    pub proxy: Option<ProxyRef>,
    /// Set once the credential is parsed.
    pub identity: Option<Identity>,
    /// Set once the egress probe succeeds.
    pub egress_ip: String,
}

impl AccountSession {
    pub fn new(index: usize, raw: &str, proxy: Option<ProxyRef>) -> Self {
        Self {
            index,
            credential: Credential::new(raw),
            proxy,
            identity: None,
            egress_ip: UNKNOWN_IP.to_string(),
        }
    }

    /// 1-based account number used in logs.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Build this cycle's sessions, assigning proxies cyclically by index.
pub fn build_sessions(raw: &[String], proxies: &[ProxyRef]) -> Vec<AccountSession> {
    raw.iter()
        .enumerate()
        .map(|(index, line)| AccountSession::new(index, line, assign_proxy(proxies, index).cloned()))
        .collect()
}
