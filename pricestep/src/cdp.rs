//! Minimal Chrome DevTools Protocol client.
//!
//! Discovery goes over the HTTP endpoints (`/json/version`, `/json/list`);
//! commands go over the page target's WebSocket with replies correlated by id.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};

use crate::errors::AutomationError;

type CdpResult = Result<Value, String>;
type PendingMap = HashMap<u64, oneshot::Sender<CdpResult>>;
type Pending = Arc<Mutex<PendingMap>>;

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP side of the DevTools endpoint, used before a WebSocket exists.
#[derive(Debug, Clone)]
pub struct DevToolsHttp {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "Browser", default)]
    pub browser: String,
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub websocket_url: Option<String>,
}

impl DevToolsHttp {
    pub fn new(debug_port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{debug_port}"),
            client: reqwest::Client::new(),
        }
    }

    /// Browser build info; fails until the browser has opened its debugging port.
    pub async fn version(&self) -> Result<VersionInfo, AutomationError> {
        let response = self
            .client
            .get(format!("{}/json/version", self.base_url))
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| AutomationError::PlatformError(format!("DevTools not reachable: {e}")))?;

        response
            .json()
            .await
            .map_err(|e| AutomationError::Protocol(format!("Failed to parse version: {e}")))
    }

    /// Get list of all targets (tabs, workers, extensions)
    pub async fn targets(&self) -> Result<Vec<TargetInfo>, AutomationError> {
        let response = self
            .client
            .get(format!("{}/json/list", self.base_url))
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| AutomationError::PlatformError(format!("Failed to get targets: {e}")))?;

        let targets: Vec<TargetInfo> = response
            .json()
            .await
            .map_err(|e| AutomationError::Protocol(format!("Failed to parse targets: {e}")))?;

        debug!("Found {} DevTools targets", targets.len());
        Ok(targets)
    }

    /// First target of type `page` that accepts a debugger connection.
    pub async fn first_page(&self) -> Result<Option<TargetInfo>, AutomationError> {
        Ok(pick_page_target(self.targets().await?))
    }
}

fn pick_page_target(targets: Vec<TargetInfo>) -> Option<TargetInfo> {
    targets
        .into_iter()
        .find(|t| t.kind == "page" && t.websocket_url.is_some())
}

#[derive(Debug, Serialize)]
struct CdpRequest<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CdpErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CdpIncoming {
    Response {
        id: u64,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<CdpErrorBody>,
    },
    Event {
        method: String,
        #[serde(default)]
        params: Value,
    },
}

/// A live WebSocket connection to one DevTools target.
pub struct CdpConnection {
    sender: mpsc::UnboundedSender<Message>,
    pending: Pending,
    next_id: AtomicU64,
    call_timeout: Duration,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl CdpConnection {
    pub async fn connect(ws_url: &str, call_timeout: Duration) -> Result<Self, AutomationError> {
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| AutomationError::PlatformError(format!("WebSocket connect failed: {e}")))?;
        debug!(%ws_url, "Connected to DevTools target");

        let (mut sink, mut stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    warn!("cdp send error: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        let reader = tokio::spawn(async move {
            while let Some(Ok(msg)) = stream.next().await {
                if !msg.is_text() {
                    continue;
                }
                let txt = msg.into_text().unwrap_or_default();
                match serde_json::from_str::<CdpIncoming>(&txt) {
                    Ok(CdpIncoming::Response { id, result, error }) => {
                        let reply = match error {
                            Some(err) => Err(describe_error(&err)),
                            None => Ok(result.unwrap_or(Value::Null)),
                        };
                        if let Some(tx) = reader_pending.lock().await.remove(&id) {
                            let _ = tx.send(reply);
                        } else {
                            trace!(id, "Reply for unknown or expired request");
                        }
                    }
                    Ok(CdpIncoming::Event { method, params }) => match method.as_str() {
                        "Inspector.detached" | "Inspector.targetCrashed" => {
                            warn!(event = %method, params = %params, "DevTools target lost")
                        }
                        "Runtime.exceptionThrown" => {
                            debug!(params = %params, "Page exception")
                        }
                        _ => trace!(event = %method, "DevTools event"),
                    },
                    Err(e) => warn!("Invalid incoming DevTools message: {}", e),
                }
            }
            // Waiters see a cancelled channel once their senders are dropped.
            reader_pending.lock().await.clear();
            debug!("DevTools connection closed");
        });

        Ok(Self {
            sender: tx,
            pending,
            next_id: AtomicU64::new(1),
            call_timeout,
            reader,
            writer,
        })
    }

    /// Send a command and wait for its reply.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, AutomationError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel::<CdpResult>();
        self.pending.lock().await.insert(id, tx);

        let payload = serde_json::to_string(&CdpRequest { id, method, params })
            .map_err(|e| AutomationError::Protocol(format!("serialize {method}: {e}")))?;
        trace!(id, %method, "Sending DevTools command");

        if self.sender.send(Message::Text(payload)).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(AutomationError::Protocol(
                "DevTools connection is closed".to_string(),
            ));
        }

        match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(reply_error(method, &message)),
            Ok(Err(_canceled)) => Err(AutomationError::Protocol(format!(
                "{method}: connection closed before reply"
            ))),
            Err(_elapsed) => {
                self.pending.lock().await.remove(&id);
                Err(AutomationError::Timeout(format!(
                    "{method} got no reply within {:?}",
                    self.call_timeout
                )))
            }
        }
    }

    /// Evaluate an expression in the page and return its JSON value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, AutomationError> {
        let reply = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        evaluation_value(reply)
    }

    pub async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        let reply = self.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(error_text) = reply.get("errorText").and_then(|v| v.as_str()) {
            return Err(AutomationError::PlatformError(format!(
                "navigation to {url} failed: {error_text}"
            )));
        }
        Ok(())
    }

    /// Move, press and release the left mouse button at page coordinates.
    pub async fn click_at(&self, x: f64, y: f64) -> Result<(), AutomationError> {
        for kind in ["mouseMoved", "mousePressed", "mouseReleased"] {
            self.call(
                "Input.dispatchMouseEvent",
                json!({
                    "type": kind,
                    "x": x,
                    "y": y,
                    "button": "left",
                    "clickCount": if kind == "mouseMoved" { 0 } else { 1 },
                }),
            )
            .await?;
        }
        Ok(())
    }

    /// Insert text into the focused element as if typed.
    pub async fn insert_text(&self, text: &str) -> Result<(), AutomationError> {
        self.call("Input.insertText", json!({ "text": text }))
            .await
            .map(|_| ())
    }

    pub async fn close(mut self) {
        let _ = self.sender.send(Message::Close(None));
        // writer exits after flushing the close frame
        let _ = tokio::time::timeout(Duration::from_millis(500), &mut self.writer).await;
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

fn describe_error(err: &CdpErrorBody) -> String {
    match &err.data {
        Some(data) => format!("{} ({}) {}", err.message, err.code, data),
        None => format!("{} ({})", err.message, err.code),
    }
}

// Replies Chrome sends while a navigation swaps out the document.
const CONTEXT_LOST_MARKERS: &[&str] = &[
    "Execution context was destroyed",
    "Cannot find context with specified id",
    "Inspected target navigated or closed",
];

/// Map an error reply to an [`AutomationError`].
fn reply_error(method: &str, message: &str) -> AutomationError {
    if CONTEXT_LOST_MARKERS.iter().any(|m| message.contains(m)) {
        AutomationError::ContextLost(format!("{method}: {message}"))
    } else {
        AutomationError::Protocol(format!("{method}: {message}"))
    }
}

/// Unwrap a `Runtime.evaluate` reply into the returned value, surfacing
/// thrown exceptions as errors.
fn evaluation_value(reply: Value) -> Result<Value, AutomationError> {
    if let Some(details) = reply.get("exceptionDetails") {
        let message = details
            .get("exception")
            .and_then(|e| e.get("description"))
            .and_then(|d| d.as_str())
            .or_else(|| details.get("text").and_then(|t| t.as_str()))
            .unwrap_or("unknown exception");
        return Err(AutomationError::ScriptError(message.to_string()));
    }
    Ok(reply
        .get("result")
        .and_then(|r| r.get("value"))
        .cloned()
        .unwrap_or(Value::Null))
}
