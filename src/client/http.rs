//! `RemoteClient` over HTTP via reqwest.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::account::Credential;
use crate::client::types::{
    AuthBody, ContributePayload, EngineBody, Envelope, IpBody, TaskBody,
};
use crate::client::{
    AuthInfo, ClientFactory, RemoteClient, ResourceState, Task, TaskCompletion, TaskId,
};
use crate::config::BotConfig;
use crate::error::ClientError;
use crate::input::ProxyRef;

const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7 Build/TQ3A.230901.001; wv) \
     AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/120.0.6099.230 Mobile Safari/537.36";

/// Header bundle attached to every request.
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ORIGIN, HeaderValue::from_static("https://app.hivera.org"));
    headers.insert(
        header::REFERER,
        HeaderValue::from_static("https://app.hivera.org/"),
    );
    headers.insert("sec-fetch-dest", HeaderValue::from_static("empty"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("cors"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("same-site"));
    headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    headers
}

/// HTTP client bound to one egress path.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    client: reqwest::Client,
    base_url: String,
    referral_code: String,
    ip_check_url: String,
}

impl HttpRemoteClient {
    pub fn new(config: &BotConfig, proxy: Option<&ProxyRef>) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder().default_headers(default_headers());

        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| ClientError::Build(format!("invalid proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            referral_code: config.referral_code.clone(),
            ip_check_url: config.ip_check_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET `path` with the credential attached and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        cred: &Credential,
        extra: &[(&str, &str)],
    ) -> Result<T, String> {
        let resp = self
            .client
            .get(self.url(path))
            .query(extra)
            .query(&[("auth_data", cred.expose())])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        decode(resp).await
    }
}

/// Reject non-2xx statuses, then parse the body.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, String> {
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("HTTP error, status {status}"));
    }
    resp.json::<T>()
        .await
        .map_err(|e| format!("malformed response body: {e}"))
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn authenticate(&self, cred: &Credential) -> Result<AuthInfo, ClientError> {
        let envelope: Envelope<AuthBody> = self
            .get_json("/auth", cred, &[])
            .await
            .map_err(ClientError::Auth)?;
        Ok(envelope.into())
    }

    async fn fetch_referral_info(&self, cred: &Credential) -> Result<(), ClientError> {
        // Status and body are irrelevant; only transport failures surface.
        self.client
            .get(self.url("/referral"))
            .query(&[
                ("referral_code", self.referral_code.as_str()),
                ("auth_data", cred.expose()),
            ])
            .send()
            .await
            .map_err(|e| ClientError::Referral(e.to_string()))?;
        Ok(())
    }

    async fn fetch_power_state(&self, cred: &Credential) -> Result<ResourceState, ClientError> {
        let envelope: Envelope<EngineBody> = self
            .get_json("/engine/info", cred, &[])
            .await
            .map_err(ClientError::PowerFetch)?;
        Ok(envelope.into())
    }

    async fn list_missions(&self, cred: &Credential) -> Result<Vec<Task>, ClientError> {
        let envelope: Envelope<Vec<TaskBody>> = self
            .get_json("/missions", cred, &[])
            .await
            .map_err(ClientError::TaskList)?;
        Ok(envelope
            .result
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.into_task(false))
            .collect())
    }

    async fn list_daily_tasks(&self, cred: &Credential) -> Result<Vec<Task>, ClientError> {
        let envelope: Envelope<Vec<TaskBody>> = self
            .get_json("/daily-tasks", cred, &[])
            .await
            .map_err(ClientError::TaskList)?;
        Ok(envelope
            .result
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.into_task(true))
            .collect())
    }

    async fn complete_task(
        &self,
        cred: &Credential,
        task_id: &TaskId,
    ) -> Result<TaskCompletion, ClientError> {
        let (path, param) = match task_id {
            TaskId::Mission(_) => ("/missions/complete", "mission_id"),
            TaskId::Daily(_) => ("/daily-tasks/complete", "task_id"),
        };
        let envelope: Envelope<serde_json::Value> = self
            .get_json(path, cred, &[(param, task_id.remote_id())])
            .await
            .map_err(|reason| ClientError::TaskComplete {
                task_id: task_id.to_string(),
                reason,
            })?;
        Ok(envelope.into())
    }

    async fn contribute(&self, cred: &Credential) -> Result<ResourceState, ClientError> {
        let payload = ContributePayload::generate();
        let resp = self
            .client
            .post(self.url("/engine/contribute"))
            .query(&[("auth_data", cred.expose())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| ClientError::Contribute(e.to_string()))?;

        let envelope: Envelope<EngineBody> =
            decode(resp).await.map_err(ClientError::Contribute)?;
        Ok(envelope.into())
    }

    async fn probe_egress_ip(&self) -> Result<String, ClientError> {
        let resp = self
            .client
            .get(&self.ip_check_url)
            .send()
            .await
            .map_err(|e| ClientError::IpProbe(e.to_string()))?;
        let body: IpBody = decode(resp).await.map_err(ClientError::IpProbe)?;
        Ok(body.ip)
    }
}

/// Builds one `HttpRemoteClient` per egress path.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    config: Arc<BotConfig>,
}

impl HttpClientFactory {
    pub fn new(config: Arc<BotConfig>) -> Self {
        Self { config }
    }
}

impl ClientFactory for HttpClientFactory {
    fn connect(&self, proxy: Option<&ProxyRef>) -> Result<Arc<dyn RemoteClient>, ClientError> {
        Ok(Arc::new(HttpRemoteClient::new(&self.config, proxy)?))
    }
}
