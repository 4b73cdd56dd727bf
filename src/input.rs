//! Account and proxy list loading.

use std::fmt;
use std::path::Path;

use tracing::{error, warn};
use url::Url;

use crate::error::InputError;

const PROXY_SCHEMES: [&str; 4] = ["http", "https", "socks5", "socks5h"];

/// One egress descriptor: `scheme://[user:pass@]host:port`.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyRef {
    raw: String,
    host: String,
    port: u16,
}

impl ProxyRef {
    pub fn parse(line: &str) -> Result<Self, InputError> {
        let invalid = |reason: &str| InputError::InvalidProxy {
            line: redact(line),
            reason: reason.to_string(),
        };

        let url = Url::parse(line).map_err(|e| invalid(&e.to_string()))?;
        if !PROXY_SCHEMES.contains(&url.scheme()) {
            return Err(invalid(&format!("unsupported scheme '{}'", url.scheme())));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        Ok(Self {
            raw: line.to_string(),
            host,
            port,
        })
    }

    /// Full URL including credentials, for the transport only.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Never print proxy credentials.
impl fmt::Display for ProxyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ProxyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProxyRef({self})")
    }
}

fn redact(line: &str) -> String {
    match line.rsplit_once('@') {
        Some((_, host)) => format!("***@{host}"),
        None => line.to_string(),
    }
}

/// Read a newline-delimited file into trimmed, non-blank lines.
///
/// A read failure is logged and yields an empty list.
pub async fn load_lines(path: &Path) -> Vec<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(data) => {
            let lines: Vec<String> = data
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            if lines.is_empty() {
                warn!(path = %path.display(), "No entries found in file");
            }
            lines
        }
        Err(e) => {
            error!(path = %path.display(), "Error reading file: {e}");
            Vec::new()
        }
    }
}

/// Load and validate the proxy list. Invalid lines are logged and skipped.
pub async fn load_proxies(path: &Path) -> Vec<ProxyRef> {
    load_lines(path)
        .await
        .iter()
        .filter_map(|line| match ProxyRef::parse(line) {
            Ok(proxy) => Some(proxy),
            Err(e) => {
                warn!("Skipping proxy: {e}");
                None
            }
        })
        .collect()
}

/// Cyclic assignment: account `index` uses `proxies[index % len]`.
pub fn assign_proxy(proxies: &[ProxyRef], index: usize) -> Option<&ProxyRef> {
    if proxies.is_empty() {
        None
    } else {
        proxies.get(index % proxies.len())
    }
}
