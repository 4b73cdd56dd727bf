//! Remote service client.
//!
//! `RemoteClient` is the seam between the account state machine and the
//! Hivera HTTP API. A client is bound to one egress path (proxy or direct)
//! when `ClientFactory::connect` builds it. No retries happen here; callers
//! own the recovery policy.

pub mod http;
pub mod types;

pub use http::{HttpClientFactory, HttpRemoteClient};
pub use types::{
    AuthInfo, ContributePayload, QUALITY_LEVELS, ResourceState, Task, TaskCompletion, TaskId,
};

use std::sync::Arc;

use async_trait::async_trait;

use crate::account::Credential;
use crate::error::ClientError;
use crate::input::ProxyRef;

/// The fixed set of RPC calls made on behalf of one account.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Resolve the account's username.
    async fn authenticate(&self, cred: &Credential) -> Result<AuthInfo, ClientError>;

    /// Side-effect call; the response body is ignored.
    async fn fetch_referral_info(&self, cred: &Credential) -> Result<(), ClientError>;

    /// Current reward and power gauge.
    async fn fetch_power_state(&self, cred: &Credential) -> Result<ResourceState, ClientError>;

    /// Mission tasks, ids unprefixed.
    async fn list_missions(&self, cred: &Credential) -> Result<Vec<Task>, ClientError>;

    /// Daily tasks, ids in the daily namespace.
    async fn list_daily_tasks(&self, cred: &Credential) -> Result<Vec<Task>, ClientError>;

    /// Complete one task, routed by the id's namespace.
    async fn complete_task(
        &self,
        cred: &Credential,
        task_id: &TaskId,
    ) -> Result<TaskCompletion, ClientError>;

    /// One mining step. Each call sends a freshly generated payload.
    async fn contribute(&self, cred: &Credential) -> Result<ResourceState, ClientError>;

    /// Public IP seen by the outside world through this client's egress.
    async fn probe_egress_ip(&self) -> Result<String, ClientError>;
}

/// Builds a `RemoteClient` bound to one egress path.
pub trait ClientFactory: Send + Sync {
    fn connect(&self, proxy: Option<&ProxyRef>) -> Result<Arc<dyn RemoteClient>, ClientError>;
}
