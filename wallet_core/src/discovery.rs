//! Discovery/redirect wallet backend.
//!
//! The user authorizes through a wallet discovery service; the adapter keeps a
//! `{logged_in, addr}` current-user record and emits it on every change. The
//! connected predicate for this backend needs both fields; the record is
//! passed on untouched, so transient "logged in without an address" states
//! reach the session store and are healed there.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use securepool_types::WalletAddress;
use securepool_utils::lock;

use crate::error::{ConnectError, DisconnectError};
use crate::hub::{EventHub, ProviderSnapshot, Subscription};
use crate::provider::{BackendKind, ProviderAdapter};

/// The discovery service's record of the current user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    #[serde(default)]
    pub addr: Option<String>,
    #[serde(default, rename = "loggedIn")]
    pub logged_in: bool,
}

impl CurrentUser {
    pub fn authenticated(addr: impl Into<String>) -> Self {
        Self {
            addr: Some(addr.into()),
            logged_in: true,
        }
    }

    fn snapshot(&self) -> ProviderSnapshot {
        ProviderSnapshot {
            logged_in: self.logged_in,
            address: self
                .addr
                .as_deref()
                .and_then(|a| WalletAddress::parse(a).ok()),
        }
    }
}

/// Runs the authorization handshake with a discovery service.
#[async_trait]
pub trait AuthnService: Send + Sync {
    /// Drive authorization to completion and return the resulting user record.
    async fn authenticate(&self) -> Result<CurrentUser, ConnectError>;

    /// Revoke whatever the service holds for the current user.
    async fn unauthenticate(&self) -> Result<(), DisconnectError>;
}

pub struct DiscoveryAdapter {
    service: Arc<dyn AuthnService>,
    user: Mutex<CurrentUser>,
    hub: EventHub,
}

impl DiscoveryAdapter {
    pub fn new(service: Arc<dyn AuthnService>) -> Self {
        Self {
            service,
            user: Mutex::new(CurrentUser::default()),
            hub: EventHub::new(),
        }
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    fn set_user(&self, user: CurrentUser) {
        let snapshot = user.snapshot();
        *lock(&self.user) = user;
        self.hub.emit(snapshot);
    }
}

#[async_trait]
impl ProviderAdapter for DiscoveryAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::Discovery
    }

    async fn connect(&self) -> Result<(), ConnectError> {
        let user = self.service.authenticate().await?;
        tracing::debug!(logged_in = user.logged_in, addr = ?user.addr, "discovery authentication finished");
        self.set_user(user);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DisconnectError> {
        let active = {
            let user = lock(&self.user);
            user.logged_in || user.addr.is_some()
        };
        if !active {
            return Ok(());
        }
        let result = self.service.unauthenticate().await;
        self.set_user(CurrentUser::default());
        result
    }

    fn current_session(&self) -> ProviderSnapshot {
        lock(&self.user).snapshot()
    }

    fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    fn last_seq(&self) -> u64 {
        self.hub.last_seq()
    }
}

// ── HTTP polling transport ─────────────────────────────────────────────

/// Where and how to reach the discovery service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Endpoint that starts an authorization request.
    #[serde(default = "default_authn_endpoint")]
    pub authn_endpoint: String,

    /// Application name shown by the wallet.
    #[serde(default = "default_app_title")]
    pub app_title: String,

    /// Network the wallet should authorize on.
    #[serde(default = "default_network")]
    pub network: String,

    /// Delay between polls while authorization is pending.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_authn_endpoint() -> String {
    "https://fcl-discovery.onflow.org/api/testnet/authn".to_string()
}

fn default_app_title() -> String {
    "SecurePool Insurance".to_string()
}

fn default_network() -> String {
    "testnet".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            authn_endpoint: default_authn_endpoint(),
            app_title: default_app_title(),
            network: default_network(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum PollStatus {
    Pending,
    Approved,
    Declined,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Deserialize)]
struct ServiceEndpoint {
    endpoint: String,
    #[serde(default)]
    params: HashMap<String, serde_json::Value>,
}

impl ServiceEndpoint {
    fn query(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

#[derive(Clone, Debug, Deserialize)]
struct ApprovedData {
    #[serde(default)]
    addr: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct PollingResponse {
    status: PollStatus,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    data: Option<ApprovedData>,
    #[serde(default)]
    updates: Option<ServiceEndpoint>,
    #[serde(default)]
    local: Option<ServiceEndpoint>,
}

/// Callback receiving the URL the user must open to authorize.
pub type AuthorizeHook = Arc<dyn Fn(&str) + Send + Sync>;

/// [`AuthnService`] speaking the discovery polling protocol over HTTP.
///
/// The service answers the initial request with `PENDING`, an authorization
/// page for the user (`local`) and a poll endpoint (`updates`); polling
/// continues until `APPROVED` or `DECLINED`. Sessions are held client-side, so
/// revoking is local.
pub struct HttpAuthn {
    http: reqwest::Client,
    config: DiscoveryConfig,
    on_authorize: Option<AuthorizeHook>,
}

impl HttpAuthn {
    pub fn new(config: DiscoveryConfig) -> Result<Self, ConnectError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ConnectError::Failed(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            on_authorize: None,
        })
    }

    /// Receive the authorization URL when the service asks the user to approve.
    pub fn with_authorize_hook(mut self, hook: AuthorizeHook) -> Self {
        self.on_authorize = Some(hook);
        self
    }

    async fn read(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<PollingResponse, ConnectError> {
        let response = request
            .send()
            .await
            .map_err(|e| ConnectError::Unavailable(format!("discovery request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ConnectError::Unavailable(format!(
                "discovery returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<PollingResponse>()
            .await
            .map_err(|e| ConnectError::Failed(format!("invalid discovery response: {e}")))
    }

    fn announce(&self, local: &ServiceEndpoint) {
        let url = reqwest::Url::parse_with_params(&local.endpoint, local.query())
            .map(|u| u.to_string())
            .unwrap_or_else(|_| local.endpoint.clone());
        tracing::info!(%url, "wallet authorization requested");
        if let Some(hook) = &self.on_authorize {
            hook(&url);
        }
    }
}

#[async_trait]
impl AuthnService for HttpAuthn {
    async fn authenticate(&self) -> Result<CurrentUser, ConnectError> {
        let body = serde_json::json!({
            "config": {
                "app": { "title": self.config.app_title },
                "client": { "network": self.config.network },
            }
        });
        let mut response = self
            .read(self.http.post(&self.config.authn_endpoint).json(&body))
            .await?;
        let mut announced = false;

        loop {
            match response.status {
                PollStatus::Approved => {
                    let addr = response.data.and_then(|d| d.addr);
                    return Ok(CurrentUser {
                        addr,
                        logged_in: true,
                    });
                }
                PollStatus::Declined => {
                    tracing::info!(reason = ?response.reason, "wallet authorization declined");
                    return Err(ConnectError::Rejected);
                }
                PollStatus::Unknown => {
                    return Err(ConnectError::Failed(
                        "discovery returned an unknown status".into(),
                    ));
                }
                PollStatus::Pending => {}
            }

            if !announced {
                if let Some(local) = &response.local {
                    self.announce(local);
                }
                announced = true;
            }

            let updates = response.updates.take().ok_or_else(|| {
                ConnectError::Failed("pending response without an updates endpoint".into())
            })?;
            tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
            let mut next = self
                .read(self.http.get(&updates.endpoint).query(&updates.query()))
                .await?;
            // Services may omit the poll endpoint on follow-up responses.
            if next.updates.is_none() {
                next.updates = Some(updates);
            }
            response = next;
        }
    }

    async fn unauthenticate(&self) -> Result<(), DisconnectError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedAuthn {
        outcomes: Mutex<VecDeque<Result<CurrentUser, ConnectError>>>,
    }

    #[async_trait]
    impl AuthnService for ScriptedAuthn {
        async fn authenticate(&self) -> Result<CurrentUser, ConnectError> {
            lock(&self.outcomes)
                .pop_front()
                .unwrap_or(Err(ConnectError::Unavailable("script exhausted".into())))
        }

        async fn unauthenticate(&self) -> Result<(), DisconnectError> {
            Ok(())
        }
    }

    fn adapter(outcomes: Vec<Result<CurrentUser, ConnectError>>) -> DiscoveryAdapter {
        DiscoveryAdapter::new(Arc::new(ScriptedAuthn {
            outcomes: Mutex::new(outcomes.into()),
        }))
    }

    #[tokio::test]
    async fn successful_authentication_emits_logged_in_snapshot() {
        let adapter = adapter(vec![Ok(CurrentUser::authenticated("0x9a2b"))]);
        let mut events = adapter.subscribe();

        adapter.connect().await.unwrap();

        let event = events.try_recv().unwrap();
        assert!(event.snapshot.is_qualifying());
        assert_eq!(adapter.current_session(), event.snapshot);
    }

    #[tokio::test]
    async fn missing_address_is_passed_through() {
        let adapter = adapter(vec![Ok(CurrentUser {
            addr: None,
            logged_in: true,
        })]);
        let mut events = adapter.subscribe();
        adapter.connect().await.unwrap();

        let event = events.try_recv().unwrap();
        assert!(event.snapshot.logged_in);
        assert!(event.snapshot.address.is_none());
    }

    #[tokio::test]
    async fn rejection_emits_nothing() {
        let adapter = adapter(vec![Err(ConnectError::Rejected)]);
        let mut events = adapter.subscribe();
        assert_eq!(adapter.connect().await, Err(ConnectError::Rejected));
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let adapter = adapter(vec![Ok(CurrentUser::authenticated("0x9a2b"))]);
        adapter.connect().await.unwrap();
        let mut events = adapter.subscribe();

        adapter.disconnect().await.unwrap();
        adapter.disconnect().await.unwrap();

        assert_eq!(events.try_recv().map(|e| e.snapshot), Some(ProviderSnapshot::logged_out()));
        assert!(events.try_recv().is_none());
        assert_eq!(adapter.current_session(), ProviderSnapshot::logged_out());
    }

    #[test]
    fn polling_response_parses_pending_with_endpoints() {
        let json = serde_json::json!({
            "f_type": "PollingResponse",
            "status": "PENDING",
            "updates": { "endpoint": "https://wallet.example/poll", "params": { "id": "abc", "n": 1 } },
            "local": { "endpoint": "https://wallet.example/authz", "params": {} }
        });
        let resp: PollingResponse = serde_json::from_value(json).unwrap();
        assert_eq!(resp.status, PollStatus::Pending);
        let mut query = resp.updates.unwrap().query();
        query.sort();
        assert_eq!(
            query,
            vec![("id".to_string(), "abc".to_string()), ("n".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn polling_response_parses_approval_and_unknown_status() {
        let approved: PollingResponse = serde_json::from_value(serde_json::json!({
            "status": "APPROVED",
            "data": { "addr": "0xf8d6e0586b0a20c7" }
        }))
        .unwrap();
        assert_eq!(approved.status, PollStatus::Approved);
        assert_eq!(approved.data.unwrap().addr.as_deref(), Some("0xf8d6e0586b0a20c7"));

        let odd: PollingResponse =
            serde_json::from_value(serde_json::json!({ "status": "REDIRECT" })).unwrap();
        assert_eq!(odd.status, PollStatus::Unknown);
    }

    #[test]
    fn current_user_uses_camel_case_flag() {
        let user: CurrentUser =
            serde_json::from_value(serde_json::json!({ "addr": null, "loggedIn": true })).unwrap();
        assert!(user.logged_in);
        assert!(user.addr.is_none());
    }

    #[tokio::test]
    async fn unreachable_service_is_reported_unavailable() {
        let authn = HttpAuthn::new(DiscoveryConfig {
            authn_endpoint: "http://127.0.0.1:9/authn".into(),
            request_timeout_ms: 500,
            ..DiscoveryConfig::default()
        })
        .unwrap();
        assert!(matches!(
            authn.authenticate().await,
            Err(ConnectError::Unavailable(_))
        ));
    }
}
