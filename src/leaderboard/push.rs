//! Push channel for live account updates.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use derive_getters::Getters;
use derive_new::new;
use futures::stream::BoxStream;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{debug, info, instrument, warn};

use crate::leaderboard::indexer::AccountNode;
use crate::leaderboard::{SyncError, UserAccount};

/// Stream of account updates from one connection.
pub type UpdateStream = BoxStream<'static, Result<UserAccount, SyncError>>;

/// Opens push connections.
#[async_trait]
pub trait PushTransport: Send + Sync + Debug {
    /// Connects, completes the subscribe handshake and returns the update
    /// stream. The stream ends or yields an error when the connection drops.
    async fn connect(&self) -> Result<UpdateStream, SyncError>;
}

/// Reconnect delays for the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    initial: Duration,
    /// Upper bound on any delay.
    max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}

impl BackoffPolicy {
    /// Delay before reconnect attempt `attempt` (zero-based): doubles from
    /// `initial`, capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

const SUBSCRIPTION: &str = "subscription { userAccountUpdated { telegram_id account_address total_games last_active is_active } }";

/// graphql-ws subscription over a WebSocket.
#[derive(Debug, Clone)]
pub struct WsPushTransport {
    url: String,
}

impl WsPushTransport {
    /// Creates a transport for the WebSocket endpoint `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Derives the push endpoint from an indexer HTTP URL.
    pub fn from_indexer_url(indexer_url: &str) -> Self {
        let base = indexer_url.trim_end_matches('/');
        let ws = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        Self::new(format!("{ws}/graphql"))
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PushTransport for WsPushTransport {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&self) -> Result<UpdateStream, SyncError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| SyncError::unreachable(format!("invalid push url: {e}")))?;
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("graphql-ws"));

        let (mut ws, _) = connect_async(request)
            .await
            .map_err(|e| SyncError::unreachable(format!("push connect failed: {e}")))?;

        let init = serde_json::json!({ "type": "connection_init", "payload": {} });
        let start = serde_json::json!({
            "id": "1",
            "type": "start",
            "payload": { "query": SUBSCRIPTION },
        });
        for frame in [init, start] {
            ws.send(Message::text(frame.to_string()))
                .await
                .map_err(|e| SyncError::unreachable(format!("push handshake failed: {e}")))?;
        }
        info!("Push subscription started");

        let updates = ws.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => parse_frame(&text).transpose(),
                Ok(Message::Close(frame)) => Some(Err(SyncError::unreachable(format!(
                    "push channel closed: {frame:?}"
                )))),
                Ok(_) => None,
                Err(e) => Some(Err(SyncError::unreachable(format!("push channel error: {e}")))),
            }
        });
        Ok(updates.boxed())
    }
}

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

/// Decodes one graphql-ws frame. Control frames yield `None`.
pub(crate) fn parse_frame(text: &str) -> Result<Option<UserAccount>, SyncError> {
    let frame: Frame = serde_json::from_str(text)
        .map_err(|e| SyncError::response(format!("invalid push frame: {e}")))?;
    match frame.kind.as_str() {
        "data" | "next" => {
            let Some(node) = frame
                .payload
                .and_then(|p| p.get("data").and_then(|d| d.get("userAccountUpdated")).cloned())
                .filter(|node| !node.is_null())
            else {
                debug!("Push data frame without account");
                return Ok(None);
            };
            let node: AccountNode = serde_json::from_value(node)
                .map_err(|e| SyncError::response(format!("invalid account update: {e}")))?;
            node.into_account().map(Some)
        }
        "error" | "connection_error" => {
            warn!(payload = ?frame.payload, "Push channel reported error");
            Err(SyncError::response(format!(
                "push subscription error: {}",
                frame.payload.unwrap_or_default()
            )))
        }
        other => {
            debug!(frame = other, "Push control frame");
            Ok(None)
        }
    }
}
