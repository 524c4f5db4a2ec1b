use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::catalog;
use crate::core::error::{ConfigError, RuntimeError};
use crate::core::traits::AgentRuntime;
use crate::core::types::{
    ChatOptions, ChatStream, ControlPlaneStatus, HealthStatus, RequestOptions,
    ResourceAvailability, RuntimeCapabilities, RuntimeInfo, RuntimeKind,
};
use crate::transport::http::{HttpClient, HttpReply, TransportFailure};

const API_VERSION_SEGMENT: &str = "/v1";
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
const HEALTH_PATH: &str = "/health";
const AGENT_ID_HEADER: &str = "x-openclaw-agent-id";

pub const DEFAULT_CHAT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DISCOVERY_TIMEOUT_MS: u64 = 10_000;

const OPENCLAW_OPERATIONS: [&str; 10] = [
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
pub struct OpenClawConfig {
    pub api_base_url: String,
    pub api_key: String,
    /// Explicit control-plane roots. Empty means derive the default pair
    /// (version-stripped root, versioned root) from the API base URL.
    pub control_plane_base_urls: Vec<String>,
    pub chat_timeout_ms: u64,
    pub health_timeout_ms: u64,
    pub discovery_timeout_ms: u64,
}

impl OpenClawConfig {
    pub fn new(api_base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_key: api_key.into(),
            control_plane_base_urls: Vec::new(),
            chat_timeout_ms: DEFAULT_CHAT_TIMEOUT_MS,
            health_timeout_ms: DEFAULT_HEALTH_TIMEOUT_MS,
            discovery_timeout_ms: DEFAULT_DISCOVERY_TIMEOUT_MS,
        }
    }
}

/// HTTP-backed runtime adapter for an OpenClaw-style agent-serving backend.
///
/// Deployment layouts differ in where they mount control-plane routes, so
/// listing operations search the catalog's candidate paths across every
/// configured base URL in order. Configuration is normalized once here;
/// the instance is immutable afterwards and safe to share.
pub struct OpenClawRuntime {
    transport: HttpClient,
    auth_header: HeaderValue,
    chat_completions_url: String,
    health_url: String,
    control_plane_base_urls: Vec<String>,
    chat_timeout_ms: u64,
    health_timeout_ms: u64,
    discovery_timeout_ms: u64,
}

enum DiscoveryAction<'a> {
    Get,
    Upload {
        file_name: &'a str,
        content: &'a [u8],
    },
}

impl OpenClawRuntime {
    pub fn new(config: OpenClawConfig) -> Result<Self, ConfigError> {
        Self::with_transport(config, HttpClient::new())
    }

    pub(crate) fn with_transport(
        config: OpenClawConfig,
        transport: HttpClient,
    ) -> Result<Self, ConfigError> {
        let api_base_url = normalize_api_base_url(&config.api_base_url)?;
        let auth_header = build_auth_header(&config.api_key)?;
        let control_plane_base_urls =
            resolve_control_plane_base_urls(&api_base_url, &config.control_plane_base_urls);

        for timeout_ms in [
            config.chat_timeout_ms,
            config.health_timeout_ms,
            config.discovery_timeout_ms,
        ] {
            if timeout_ms == 0 {
                return Err(ConfigError::InvalidTimeout { timeout_ms });
            }
        }

        Ok(Self {
            transport,
            auth_header,
            chat_completions_url: format!("{api_base_url}{CHAT_COMPLETIONS_PATH}"),
            health_url: format!("{api_base_url}{HEALTH_PATH}"),
            control_plane_base_urls,
            chat_timeout_ms: config.chat_timeout_ms,
            health_timeout_ms: config.health_timeout_ms,
            discovery_timeout_ms: config.discovery_timeout_ms,
        })
    }

    fn base_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.auth_header.clone());
        headers
    }

    fn chat_headers(&self, opts: &ChatOptions) -> Result<HeaderMap, RuntimeError> {
        let mut headers = self.base_headers();

        if let Some(agent_id) = &opts.agent_id {
            let value =
                HeaderValue::from_str(agent_id).map_err(|error| RuntimeError::Transport {
                    message: format!("invalid agent id header value: {error}"),
                })?;
            headers.insert(HeaderName::from_static(AGENT_ID_HEADER), value);
        }

        Ok(headers)
    }

    /// Ordered search over catalog candidate paths (outer) and configured
    /// base URLs (inner). A 404 means "not mounted here" and moves to the
    /// next base; a non-404 error response is a definitive answer for the
    /// current path and moves to the next path; transport errors keep
    /// probing remaining bases. Only full exhaustion is surfaced.
    async fn discover(
        &self,
        resource: &str,
        paths: &[&str],
        suffix: Option<&str>,
        action: DiscoveryAction<'_>,
        timeout_ms: u64,
    ) -> Result<HttpReply, RuntimeError> {
        let mut attempts = 0_usize;
        let mut last_error: Option<String> = None;

        for path in paths {
            'bases: for base in &self.control_plane_base_urls {
                let url = match suffix {
                    Some(name) => format!("{base}{path}/{name}"),
                    None => format!("{base}{path}"),
                };
                attempts += 1;
                tracing::debug!(resource, url = url.as_str(), "control-plane discovery attempt");

                let outcome = match &action {
                    DiscoveryAction::Get => {
                        self.transport
                            .get(&url, self.base_headers(), timeout_ms)
                            .await
                    }
                    DiscoveryAction::Upload { file_name, content } => {
                        self.transport
                            .post_multipart(
                                &url,
                                self.base_headers(),
                                file_name,
                                content.to_vec(),
                                timeout_ms,
                            )
                            .await
                    }
                };

                match outcome {
                    Ok(reply) if reply.status == 404 => continue,
                    Ok(reply) if reply.is_success() => return Ok(reply),
                    Ok(reply) => {
                        last_error = Some(format!(
                            "http status {} from {}: {}",
                            reply.status,
                            url,
                            reply.text()
                        ));
                        break 'bases;
                    }
                    Err(failure) => {
                        last_error = Some(describe_failure(&failure, &url));
                        continue;
                    }
                }
            }
        }

        Err(RuntimeError::DiscoveryExhausted {
            resource: resource.to_string(),
            attempts,
            last_error,
        })
    }

    fn discovery_timeout(&self, opts: &RequestOptions) -> u64 {
        opts.timeout_ms.unwrap_or(self.discovery_timeout_ms)
    }
}

#[async_trait]
impl AgentRuntime for OpenClawRuntime {
    fn runtime_info(&self) -> RuntimeInfo {
        RuntimeInfo {
            kind: RuntimeKind::OpenClaw,
            chat_completions_url: self.chat_completions_url.clone(),
            health_url: self.health_url.clone(),
            control_plane_base_urls: self.control_plane_base_urls.clone(),
        }
    }

    fn capabilities(&self) -> RuntimeCapabilities {
        RuntimeCapabilities {
            supports_chat: true,
            supports_streaming: true,
            supports_tools: true,
            supports_health_check: true,
            supports_control_plane: true,
            supports_agent_header: true,
            conversation_isolation: true,
            control_resources: catalog::resource_names()
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    fn supported_operations(&self) -> &'static [&'static str] {
        &OPENCLAW_OPERATIONS
    }

    async fn chat_completions(
        &self,
        payload: &Value,
        opts: &ChatOptions,
    ) -> Result<Value, RuntimeError> {
        let timeout_ms = opts.timeout_ms.unwrap_or(self.chat_timeout_ms);
        let headers = self.chat_headers(opts)?;

        let reply = self
            .transport
            .post_json(
                &self.chat_completions_url,
                headers,
                payload,
                timeout_ms,
                opts.cancel.as_ref(),
            )
            .await
            .map_err(map_transport_failure)?;

        if !reply.is_success() {
            return Err(RuntimeError::Status {
                url: self.chat_completions_url.clone(),
                status_code: reply.status,
                message: reply.text(),
            });
        }

        reply.json().map_err(|error| RuntimeError::Serialization {
            message: error.to_string(),
        })
    }

    async fn chat_completions_stream(
        &self,
        payload: &Value,
        opts: &ChatOptions,
    ) -> Result<ChatStream, RuntimeError> {
        let timeout_ms = opts.timeout_ms.unwrap_or(self.chat_timeout_ms);
        let headers = self.chat_headers(opts)?;

        let response = self
            .transport
            .post_json_streaming(
                &self.chat_completions_url,
                headers,
                payload,
                timeout_ms,
                opts.cancel.as_ref(),
            )
            .await
            .map_err(map_transport_failure)?;

        if !response.status().is_success() {
            let status_code = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(RuntimeError::Status {
                url: self.chat_completions_url.clone(),
                status_code,
                message,
            });
        }

        Ok(ChatStream::from_response(response))
    }

    async fn health_check(&self, opts: &RequestOptions) -> Result<HealthStatus, RuntimeError> {
        let timeout_ms = opts.timeout_ms.unwrap_or(self.health_timeout_ms);

        let outcome = self
            .transport
            .get(&self.health_url, self.base_headers(), timeout_ms)
            .await;

        match outcome {
            Ok(reply) if reply.is_success() => {
                let detail = reply
                    .json()
                    .unwrap_or_else(|_| Value::String(reply.text()));
                Ok(HealthStatus {
                    healthy: true,
                    detail,
                })
            }
            Ok(reply) => Err(RuntimeError::HealthCheckFailed {
                url: self.health_url.clone(),
                message: format!("http status {}: {}", reply.status, reply.text()),
            }),
            Err(failure) => Err(RuntimeError::HealthCheckFailed {
                url: self.health_url.clone(),
                message: describe_failure(&failure, &self.health_url),
            }),
        }
    }

    async fn list_control_resource(
        &self,
        resource: &str,
        opts: &RequestOptions,
    ) -> Result<Value, RuntimeError> {
        let paths =
            catalog::candidate_paths(resource).ok_or_else(|| RuntimeError::UnknownResource {
                resource: resource.to_string(),
            })?;

        let reply = self
            .discover(
                resource,
                paths,
                None,
                DiscoveryAction::Get,
                self.discovery_timeout(opts),
            )
            .await?;

        reply.json().map_err(|error| RuntimeError::Serialization {
            message: error.to_string(),
        })
    }

    async fn control_plane_status(&self, opts: &RequestOptions) -> ControlPlaneStatus {
        let mut available = false;
        let mut resources = IndexMap::new();

        for resource in catalog::resource_names() {
            match self.list_control_resource(resource, opts).await {
                Ok(_) => {
                    available = true;
                    resources.insert(
                        resource.to_string(),
                        ResourceAvailability {
                            available: true,
                            error: None,
                        },
                    );
                }
                Err(error) => {
                    resources.insert(
                        resource.to_string(),
                        ResourceAvailability {
                            available: false,
                            error: Some(error.to_string()),
                        },
                    );
                }
            }
        }

        ControlPlaneStatus {
            available,
            resources,
        }
    }

    async fn list_workspace_files(&self, opts: &RequestOptions) -> Result<Value, RuntimeError> {
        self.list_control_resource("files", opts).await
    }

    async fn fetch_workspace_file(
        &self,
        name: &str,
        opts: &RequestOptions,
    ) -> Result<Vec<u8>, RuntimeError> {
        let reply = self
            .discover(
                "files",
                catalog::file_paths(),
                Some(name),
                DiscoveryAction::Get,
                self.discovery_timeout(opts),
            )
            .await?;

        Ok(reply.body)
    }

    async fn upload_workspace_file(
        &self,
        name: &str,
        content: Vec<u8>,
        opts: &RequestOptions,
    ) -> Result<Value, RuntimeError> {
        let reply = self
            .discover(
                "files",
                catalog::file_paths(),
                None,
                DiscoveryAction::Upload {
                    file_name: name,
                    content: &content,
                },
                self.discovery_timeout(opts),
            )
            .await?;

        reply.json().map_err(|error| RuntimeError::Serialization {
            message: error.to_string(),
        })
    }
}

/// Trims the operator-supplied base URL, strips trailing slashes, and
/// guarantees the stable `/v1` suffix so chat and health always resolve to
/// predictable absolute URLs.
fn normalize_api_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::MissingApiBaseUrl);
    }

    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(ConfigError::InvalidBaseUrl {
            value: trimmed.to_string(),
        });
    }

    if trimmed.ends_with(API_VERSION_SEGMENT) {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}{API_VERSION_SEGMENT}"))
    }
}

/// Explicit list wins; otherwise the default pair is the version-stripped
/// root followed by the versioned root. Duplicates collapse to first-seen
/// order either way.
fn resolve_control_plane_base_urls(api_base_url: &str, explicit: &[String]) -> Vec<String> {
    let candidates: Vec<String> = if explicit.is_empty() {
        let versionless = api_base_url
            .strip_suffix(API_VERSION_SEGMENT)
            .unwrap_or(api_base_url);
        vec![versionless.to_string(), api_base_url.to_string()]
    } else {
        explicit
            .iter()
            .map(|base| base.trim().trim_end_matches('/').to_string())
            .collect()
    };

    let mut resolved = Vec::new();
    for candidate in candidates {
        if candidate.is_empty() || resolved.contains(&candidate) {
            continue;
        }
        resolved.push(candidate);
    }

    resolved
}

fn build_auth_header(api_key: &str) -> Result<HeaderValue, ConfigError> {
    let trimmed = api_key.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingApiKey);
    }

    HeaderValue::from_str(&format!("Bearer {trimmed}")).map_err(|error| {
        ConfigError::InvalidApiKey {
            reason: error.to_string(),
        }
    })
}

fn map_transport_failure(failure: TransportFailure) -> RuntimeError {
    match failure {
        TransportFailure::Timeout { timeout_ms } => RuntimeError::Timeout { timeout_ms },
        TransportFailure::Cancelled => RuntimeError::Cancelled,
        TransportFailure::Failed { message } => RuntimeError::Transport { message },
    }
}

fn describe_failure(failure: &TransportFailure, url: &str) -> String {
    match failure {
        TransportFailure::Timeout { timeout_ms } => {
            format!("timeout after {timeout_ms} ms from {url}")
        }
        TransportFailure::Cancelled => format!("cancelled while calling {url}"),
        TransportFailure::Failed { message } => format!("{message} ({url})"),
    }
}
