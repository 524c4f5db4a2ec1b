use std::collections::VecDeque;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::core::error::RuntimeError;

/// Closed set of runtime backends the factory can construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    OpenClaw,
    Mock,
}

impl RuntimeKind {
    /// Maps the many spellings operators use for a runtime name onto the
    /// canonical variant. Punctuation and case are ignored, so `open-claw`,
    /// `Open_Claw`, and `OPENCLAW` all resolve the same way. Unknown names
    /// return `None`; the fail-safe default is the factory's concern.
    pub fn parse(value: &str) -> Option<Self> {
        let canonical: String = value
            .trim()
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .map(|ch| ch.to_ascii_lowercase())
            .collect();

        match canonical.as_str() {
            "mock" | "mockruntime" | "mockadapter" | "inmemory" => Some(Self::Mock),
            "openclaw" | "openclawruntime" | "openclawadapter" | "claw" => Some(Self::OpenClaw),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenClaw => "openclaw",
            Self::Mock => "mock",
        }
    }
}

/// Read-only snapshot of an adapter's resolved endpoints. Computed once at
/// construction; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub kind: RuntimeKind,
    pub chat_completions_url: String,
    pub health_url: String,
    pub control_plane_base_urls: Vec<String>,
}

/// Static declaration of what an adapter supports, so callers can branch
/// behavior without downcasting the concrete adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeCapabilities {
    pub supports_chat: bool,
    pub supports_streaming: bool,
    pub supports_tools: bool,
    pub supports_health_check: bool,
    pub supports_control_plane: bool,
    pub supports_agent_header: bool,
    pub conversation_isolation: bool,
    pub control_resources: Vec<String>,
}

/// Per-call parameters for chat completions. All per-request data travels
/// here; adapters hold no per-call state.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub agent_id: Option<String>,
    pub timeout_ms: Option<u64>,
    pub cancel: Option<CancelSignal>,
}

/// Per-call timeout override for health, discovery, and file operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAvailability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-resource availability in catalog order, plus the overall OR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ControlPlaneStatus {
    pub available: bool,
    pub resources: IndexMap<String, ResourceAvailability>,
}

/// Creates a linked cancellation pair. The handle side lives with the caller;
/// the signal side is passed into `ChatOptions`.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle { sender }, CancelSignal { receiver })
}

#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

/// External cancellation signal for in-flight requests. Cloning observes the
/// same handle.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the paired handle fires. If the handle is dropped
    /// without firing, this never resolves.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if *receiver.borrow() {
            return;
        }

        while receiver.changed().await.is_ok() {
            if *receiver.borrow() {
                return;
            }
        }

        std::future::pending::<()>().await;
    }
}

/// Handle over an established streaming chat connection. The adapter's job
/// ends at connection setup; token framing belongs to the consumer.
#[derive(Debug)]
pub struct ChatStream {
    source: ChatStreamSource,
}

#[derive(Debug)]
enum ChatStreamSource {
    Http(reqwest::Response),
    Canned(VecDeque<Vec<u8>>),
}

impl ChatStream {
    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        Self {
            source: ChatStreamSource::Http(response),
        }
    }

    pub(crate) fn from_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            source: ChatStreamSource::Canned(VecDeque::from(chunks)),
        }
    }

    /// Next raw chunk of the response body, or `None` at end of stream.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, RuntimeError> {
        match &mut self.source {
            ChatStreamSource::Http(response) => response
                .chunk()
                .await
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .map_err(|error| RuntimeError::Transport {
                    message: error.to_string(),
                }),
            ChatStreamSource::Canned(chunks) => Ok(chunks.pop_front()),
        }
    }
}
