use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Value, json};

use crate::catalog;
use crate::core::error::RuntimeError;
use crate::core::traits::AgentRuntime;
use crate::core::types::{
    ChatOptions, ChatStream, ControlPlaneStatus, HealthStatus, RequestOptions,
    ResourceAvailability, RuntimeCapabilities, RuntimeInfo, RuntimeKind,
};

const MOCK_CHAT_COMPLETION_ID: &str = "chatcmpl-mock-000001";
const MOCK_MODEL: &str = "mock-agent";
const MOCK_FIXTURE_FILE: &str = "README.md";
const MOCK_FIXTURE_CONTENT: &[u8] = b"mock workspace fixture\n";

const MOCK_OPERATIONS: [&str; 10] = [
    "runtime_info",
    "capabilities",
    "chat_completions",
    "chat_completions_stream",
    "health_check",
    "list_control_resource",
    "control_plane_status",
    "list_workspace_files",
    "fetch_workspace_file",
    "upload_workspace_file",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSettings {
    /// When false, `health_check` simulates a failing backend.
    pub healthy: bool,
    /// Fixed assistant reply; defaults to echoing the last user message.
    pub canned_reply: Option<String>,
    /// When true, `chat_completions` simulates a transport failure.
    pub fail_chat: bool,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            healthy: true,
            canned_reply: None,
            fail_chat: false,
        }
    }
}

/// Deterministic stand-in runtime for tests and local development. Performs
/// no network I/O and is safe to construct with zero configuration.
pub struct MockRuntime {
    settings: MockSettings,
    workspace: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::with_settings(MockSettings::default())
    }

    pub fn with_settings(settings: MockSettings) -> Self {
        let mut workspace = BTreeMap::new();
        workspace.insert(MOCK_FIXTURE_FILE.to_string(), MOCK_FIXTURE_CONTENT.to_vec());

        Self {
            settings,
            workspace: Mutex::new(workspace),
        }
    }

    fn reply_text(&self, payload: &Value) -> String {
        if let Some(reply) = &self.settings.canned_reply {
            return reply.clone();
        }

        match last_user_message(payload) {
            Some(content) => format!("mock: {content}"),
            None => "mock: (no user message)".to_string(),
        }
    }

    fn completion_envelope(&self, payload: &Value) -> Value {
        let model = payload
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(MOCK_MODEL);

        json!({
            "id": MOCK_CHAT_COMPLETION_ID,
            "object": "chat.completion",
            "model": model,
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": self.reply_text(payload),
                },
                "finish_reason": "stop",
            }],
            "usage": {
                "prompt_tokens": 0,
                "completion_tokens": 0,
                "total_tokens": 0,
            },
        })
    }

    fn lock_workspace(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.workspace
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentRuntime for MockRuntime {
    fn runtime_info(&self) -> RuntimeInfo {
        RuntimeInfo {
            kind: RuntimeKind::Mock,
            chat_completions_url: "mock://chat/completions".to_string(),
            health_url: "mock://health".to_string(),
            control_plane_base_urls: vec!["mock://control-plane".to_string()],
        }
    }

    fn capabilities(&self) -> RuntimeCapabilities {
        RuntimeCapabilities {
            supports_chat: true,
            supports_streaming: true,
            supports_tools: false,
            supports_health_check: true,
            supports_control_plane: true,
            supports_agent_header: false,
            conversation_isolation: false,
            control_resources: catalog::resource_names()
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    fn supported_operations(&self) -> &'static [&'static str] {
        &MOCK_OPERATIONS
    }

    async fn chat_completions(
        &self,
        payload: &Value,
        opts: &ChatOptions,
    ) -> Result<Value, RuntimeError> {
        if let Some(signal) = &opts.cancel {
            if signal.is_cancelled() {
                return Err(RuntimeError::Cancelled);
            }
        }

        if self.settings.fail_chat {
            return Err(RuntimeError::Transport {
                message: "mock chat failure".to_string(),
            });
        }

        Ok(self.completion_envelope(payload))
    }

    async fn chat_completions_stream(
        &self,
        payload: &Value,
        opts: &ChatOptions,
    ) -> Result<ChatStream, RuntimeError> {
        let envelope = self.chat_completions(payload, opts).await?;
        let rendered = envelope.to_string().into_bytes();

        // Two chunks, so consumers exercise reassembly.
        let split_at = rendered.len() / 2;
        let tail = rendered[split_at..].to_vec();
        let head = rendered[..split_at].to_vec();

        Ok(ChatStream::from_chunks(vec![head, tail]))
    }

    async fn health_check(&self, _opts: &RequestOptions) -> Result<HealthStatus, RuntimeError> {
        if !self.settings.healthy {
            return Err(RuntimeError::HealthCheckFailed {
                url: "mock://health".to_string(),
                message: "simulated failure".to_string(),
            });
        }

        Ok(HealthStatus {
            healthy: true,
            detail: json!({"status": "ok"}),
        })
    }

    async fn list_control_resource(
        &self,
        resource: &str,
        _opts: &RequestOptions,
    ) -> Result<Value, RuntimeError> {
        if catalog::candidate_paths(resource).is_none() {
            return Err(RuntimeError::UnknownResource {
                resource: resource.to_string(),
            });
        }

        let data = match resource {
            "agents" => json!([{"id": "mock-agent", "name": "Mock Agent"}]),
            "sessions" => json!([{"id": "mock-session", "agent_id": "mock-agent"}]),
            "channels" => json!([{"id": "mock-channel", "kind": "direct"}]),
            "plugins" => json!([{"id": "mock-plugin", "enabled": true}]),
            "files" => {
                let names: Vec<String> = self.lock_workspace().keys().cloned().collect();
                json!(names)
            }
            _ => unreachable!("catalog lookup already filtered unknown resources"),
        };

        Ok(json!({"object": "list", "data": data}))
    }

    async fn control_plane_status(&self, _opts: &RequestOptions) -> ControlPlaneStatus {
        let mut resources = IndexMap::new();
        for resource in catalog::resource_names() {
            resources.insert(
                resource.to_string(),
                ResourceAvailability {
                    available: true,
                    error: None,
                },
            );
        }

        ControlPlaneStatus {
            available: true,
            resources,
        }
    }

    async fn list_workspace_files(&self, _opts: &RequestOptions) -> Result<Value, RuntimeError> {
        let names: Vec<String> = self.lock_workspace().keys().cloned().collect();
        Ok(json!({"object": "list", "data": names}))
    }

    async fn fetch_workspace_file(
        &self,
        name: &str,
        _opts: &RequestOptions,
    ) -> Result<Vec<u8>, RuntimeError> {
        self.lock_workspace()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::Status {
                url: format!("mock://files/{name}"),
                status_code: 404,
                message: "file not found".to_string(),
            })
    }

    async fn upload_workspace_file(
        &self,
        name: &str,
        content: Vec<u8>,
        _opts: &RequestOptions,
    ) -> Result<Value, RuntimeError> {
        let bytes = content.len();
        self.lock_workspace().insert(name.to_string(), content);

        Ok(json!({"uploaded": name, "bytes": bytes}))
    }
}

fn last_user_message(payload: &Value) -> Option<&str> {
    payload
        .get("messages")?
        .as_array()?
        .iter()
        .rev()
        .find(|message| message.get("role").and_then(Value::as_str) == Some("user"))?
        .get("content")?
        .as_str()
}
