use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use agent_runtime::core::error::*;
use agent_runtime::core::traits::*;
use agent_runtime::core::types::*;

struct CompileRuntime;

#[async_trait]
impl AgentRuntime for CompileRuntime {
    fn runtime_info(&self) -> RuntimeInfo {
        RuntimeInfo {
            kind: RuntimeKind::Mock,
            chat_completions_url: "compile://chat".to_string(),
            health_url: "compile://health".to_string(),
            control_plane_base_urls: Vec::new(),
        }
    }

    fn capabilities(&self) -> RuntimeCapabilities {
        RuntimeCapabilities {
            supports_chat: true,
            supports_streaming: false,
            supports_tools: false,
            supports_health_check: true,
            supports_control_plane: false,
            supports_agent_header: false,
            conversation_isolation: false,
            control_resources: Vec::new(),
        }
    }

    fn supported_operations(&self) -> &'static [&'static str] {
        &["runtime_info", "capabilities", "chat_completions", "health_check"]
    }

    async fn chat_completions(
        &self,
        _payload: &Value,
        _opts: &ChatOptions,
    ) -> Result<Value, RuntimeError> {
        Ok(json!({}))
    }

    async fn chat_completions_stream(
        &self,
        _payload: &Value,
        _opts: &ChatOptions,
    ) -> Result<ChatStream, RuntimeError> {
        Err(RuntimeError::Transport {
            message: "streaming unsupported".to_string(),
        })
    }

    async fn health_check(&self, _opts: &RequestOptions) -> Result<HealthStatus, RuntimeError> {
        Ok(HealthStatus {
            healthy: true,
            detail: json!({}),
        })
    }

    async fn list_control_resource(
        &self,
        resource: &str,
        _opts: &RequestOptions,
    ) -> Result<Value, RuntimeError> {
        Err(RuntimeError::UnknownResource {
            resource: resource.to_string(),
        })
    }

    async fn control_plane_status(&self, _opts: &RequestOptions) -> ControlPlaneStatus {
        ControlPlaneStatus::default()
    }

    async fn list_workspace_files(&self, _opts: &RequestOptions) -> Result<Value, RuntimeError> {
        Ok(json!([]))
    }

    async fn fetch_workspace_file(
        &self,
        _name: &str,
        _opts: &RequestOptions,
    ) -> Result<Vec<u8>, RuntimeError> {
        Ok(Vec::new())
    }

    async fn upload_workspace_file(
        &self,
        _name: &str,
        _content: Vec<u8>,
        _opts: &RequestOptions,
    ) -> Result<Value, RuntimeError> {
        Ok(json!({}))
    }
}

#[test]
fn test_core_exports_compile() {
    let runtime: Arc<dyn AgentRuntime> = Arc::new(CompileRuntime);
    assert_eq!(runtime.runtime_info().kind, RuntimeKind::Mock);

    let (handle, signal) = cancel_pair();
    handle.cancel();
    assert!(signal.is_cancelled());

    let error: RuntimeError = ConfigError::MissingApiKey.into();
    assert_eq!(error.to_string(), "missing api key");
}
