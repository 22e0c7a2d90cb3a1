//! Webhook trigger
//!
//! Binds an HTTP listener on a configured host/port/path and forwards
//! validated deliveries to the callback. When a shared secret is
//! configured, every request must carry a signature header whose value is
//! the SHA-256 digest of `secret || body`; requests with a missing or
//! wrong signature are answered with 401 and never reach the callback.

use crate::trigger::{Result, Trigger, TriggerCallback, TriggerEvent};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use sdk::errors::AgentError;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Header carrying the request signature
pub const SIGNATURE_HEADER: &str = "x-drover-signature";

/// Webhook trigger configuration
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Bind host
    pub host: String,

    /// Bind port; 0 picks an ephemeral port
    pub port: u16,

    /// Request path deliveries are posted to
    pub path: String,

    /// Shared secret for signature validation; `None` accepts unsigned
    /// deliveries
    pub secret: Option<String>,
}

impl WebhookConfig {
    /// Listen on `127.0.0.1:port` at `path`, unsigned
    pub fn new(port: u16, path: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
            path: path.into(),
            secret: None,
        }
    }

    /// Require signed deliveries
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

struct ListenerState {
    callback: TriggerCallback,
    secret: Option<String>,
}

/// HTTP-listener trigger
pub struct WebhookTrigger {
    config: WebhookConfig,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl WebhookTrigger {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            shutdown: None,
            handle: None,
            local_addr: None,
        }
    }

    /// Address the listener actually bound, available after `start`.
    /// Useful when the configured port is 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

/// Expected signature for a body: hex SHA-256 over `secret || body`
fn compute_signature(secret: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Validate a provided signature header value, accepting an optional
/// `sha256=` prefix
fn signature_matches(secret: &str, body: &[u8], provided: &str) -> bool {
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);
    provided.eq_ignore_ascii_case(&compute_signature(secret, body))
}

async fn handle_delivery(
    State(state): State<Arc<ListenerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.secret {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        let valid = provided
            .map(|sig| signature_matches(secret, &body, sig))
            .unwrap_or(false);
        if !valid {
            warn!("Rejecting webhook delivery with invalid signature");
            return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
        }
    }

    let parsed: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            debug!("Rejecting webhook delivery with unparseable body: {}", e);
            return (StatusCode::BAD_REQUEST, "body is not valid JSON").into_response();
        }
    };

    let header_map: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    (state.callback)(TriggerEvent::Webhook {
        body: parsed,
        headers: header_map,
    })
    .await;

    (StatusCode::ACCEPTED, "accepted").into_response()
}

#[async_trait]
impl Trigger for WebhookTrigger {
    fn kind(&self) -> &'static str {
        "webhook"
    }

    async fn start(&mut self, callback: TriggerCallback) -> Result<()> {
        if self.handle.is_some() {
            return Err(AgentError::TriggerFault(
                "webhook trigger already started".to_string(),
            ));
        }

        let listener = tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| {
                AgentError::TriggerFault(format!(
                    "webhook listener failed to bind {}:{}: {}",
                    self.config.host, self.config.port, e
                ))
            })?;
        let local_addr = listener.local_addr().map_err(|e| {
            AgentError::TriggerFault(format!("webhook listener address unavailable: {}", e))
        })?;

        let state = Arc::new(ListenerState {
            callback,
            secret: self.config.secret.clone(),
        });
        let app = Router::new()
            .route(&self.config.path, post(handle_delivery))
            .with_state(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!("Webhook listener exited with error: {}", e);
            }
        });

        info!("Webhook trigger listening on {}{}", local_addr, self.config.path);
        self.shutdown = Some(shutdown_tx);
        self.handle = Some(handle);
        self.local_addr = Some(local_addr);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
            debug!("Webhook trigger stopped");
        }
        self.local_addr = None;
    }
}

impl Drop for WebhookTrigger {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
