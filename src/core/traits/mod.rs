use async_trait::async_trait;
use serde_json::Value;

use crate::core::error::RuntimeError;
use crate::core::types::{
    ChatOptions, ChatStream, ControlPlaneStatus, HealthStatus, RequestOptions, RuntimeCapabilities,
    RuntimeInfo,
};

/// Runtime backend contract: chat completions, health, and the control plane.
///
/// Callers obtain an implementation from the factory and never learn which
/// concrete adapter they hold. Adapters are immutable after construction and
/// safe to share across concurrent callers; all per-request data arrives via
/// the call's options.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Resolved endpoint snapshot for routing and diagnostics.
    fn runtime_info(&self) -> RuntimeInfo;

    /// Declares support flags used by callers to branch behavior.
    fn capabilities(&self) -> RuntimeCapabilities;

    /// Self-declared operation surface, consulted by the factory-boundary
    /// structural check for adapters selected from configuration.
    fn supported_operations(&self) -> &'static [&'static str];

    /// Proxies a single chat-completion request. One attempt per call; retry
    /// policy, if any, belongs to the caller.
    async fn chat_completions(
        &self,
        payload: &Value,
        opts: &ChatOptions,
    ) -> Result<Value, RuntimeError>;

    /// Establishes a streaming chat connection and hands back the stream.
    async fn chat_completions_stream(
        &self,
        payload: &Value,
        opts: &ChatOptions,
    ) -> Result<ChatStream, RuntimeError>;

    async fn health_check(&self, opts: &RequestOptions) -> Result<HealthStatus, RuntimeError>;

    /// Lists a control-plane resource by logical name (`agents`, `sessions`,
    /// `channels`, `plugins`, `files`).
    async fn list_control_resource(
        &self,
        resource: &str,
        opts: &RequestOptions,
    ) -> Result<Value, RuntimeError>;

    /// Aggregated availability across all control-plane resources. Failures
    /// are captured inline; this never fails.
    async fn control_plane_status(&self, opts: &RequestOptions) -> ControlPlaneStatus;

    async fn list_workspace_files(&self, opts: &RequestOptions) -> Result<Value, RuntimeError>;

    async fn fetch_workspace_file(
        &self,
        name: &str,
        opts: &RequestOptions,
    ) -> Result<Vec<u8>, RuntimeError>;

    async fn upload_workspace_file(
        &self,
        name: &str,
        content: Vec<u8>,
        opts: &RequestOptions,
    ) -> Result<Value, RuntimeError>;
}
