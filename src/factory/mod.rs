use std::sync::{Arc, RwLock};

use crate::contract::verify_runtime_contract;
use crate::core::error::RuntimeError;
use crate::core::traits::AgentRuntime;
use crate::core::types::RuntimeKind;
use crate::runtimes::mock::{MockRuntime, MockSettings};
use crate::runtimes::openclaw::{OpenClawConfig, OpenClawRuntime};

const RUNTIME_ENV: &str = "AGENT_RUNTIME";
const ENVIRONMENT_ENV: &str = "AGENT_RUNTIME_ENV";
const ALLOW_MOCK_ENV: &str = "AGENT_RUNTIME_ALLOW_MOCK";
const OPENCLAW_API_URL_ENV: &str = "OPENCLAW_API_URL";
const OPENCLAW_API_KEY_ENV: &str = "OPENCLAW_API_KEY";
const OPENCLAW_CONTROL_PLANE_URLS_ENV: &str = "OPENCLAW_CONTROL_PLANE_URLS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FactoryConfig {
    /// Configured runtime name; aliases are tolerated, unknowns fall back.
    pub runtime: Option<String>,
    pub environment: Environment,
    /// Explicit opt-in for running the mock runtime in production.
    pub allow_mock_in_production: bool,
    pub openclaw: OpenClawConfig,
    pub mock: MockSettings,
}

impl FactoryConfig {
    pub fn from_env() -> Self {
        let control_plane_base_urls = std::env::var(OPENCLAW_CONTROL_PLANE_URLS_ENV)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|base| !base.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut openclaw = OpenClawConfig::new(
            std::env::var(OPENCLAW_API_URL_ENV).unwrap_or_default(),
            std::env::var(OPENCLAW_API_KEY_ENV).unwrap_or_default(),
        );
        openclaw.control_plane_base_urls = control_plane_base_urls;

        Self {
            runtime: std::env::var(RUNTIME_ENV).ok(),
            environment: Environment::parse(&std::env::var(ENVIRONMENT_ENV).unwrap_or_default()),
            allow_mock_in_production: parse_flag(std::env::var(ALLOW_MOCK_ENV).ok().as_deref()),
            openclaw,
            mock: MockSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FactoryOptions {
    /// Overrides the configured runtime name for this resolution.
    pub runtime: Option<String>,
    /// Forces reconstruction instead of returning the cached instance.
    pub reset: bool,
}

/// Single authority for which runtime implementation is active.
///
/// Constructed once at application startup and passed to the components that
/// need it; the cached instance is the only shared mutable state and is
/// swapped whole on reset, never mutated in place.
pub struct RuntimeFactory {
    config: FactoryConfig,
    cached: RwLock<Option<Arc<dyn AgentRuntime>>>,
}

impl RuntimeFactory {
    pub fn new(config: FactoryConfig) -> Self {
        Self {
            config,
            cached: RwLock::new(None),
        }
    }

    pub fn from_env() -> Self {
        Self::new(FactoryConfig::from_env())
    }

    /// Returns the active runtime, constructing and validating it on first
    /// use. Idempotent unless `reset` is requested.
    pub fn runtime(
        &self,
        options: &FactoryOptions,
    ) -> Result<Arc<dyn AgentRuntime>, RuntimeError> {
        if !options.reset {
            let cached = self
                .cached
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(runtime) = cached.as_ref() {
                return Ok(Arc::clone(runtime));
            }
        }

        let kind = self.resolve_kind(options);
        let constructed: Arc<dyn AgentRuntime> = match kind {
            RuntimeKind::Mock => Arc::new(MockRuntime::with_settings(self.config.mock.clone())),
            RuntimeKind::OpenClaw => {
                Arc::new(OpenClawRuntime::new(self.config.openclaw.clone())?)
            }
        };

        let verified = verify_runtime_contract(constructed)?;

        *self
            .cached
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::clone(&verified));

        Ok(verified)
    }

    fn resolve_kind(&self, options: &FactoryOptions) -> RuntimeKind {
        let requested = options
            .runtime
            .as_deref()
            .or(self.config.runtime.as_deref());

        let kind = match requested {
            Some(name) => match RuntimeKind::parse(name) {
                Some(kind) => kind,
                None => {
                    tracing::warn!(
                        runtime = name,
                        "unrecognized runtime name, falling back to openclaw"
                    );
                    RuntimeKind::OpenClaw
                }
            },
            None => RuntimeKind::OpenClaw,
        };

        if kind == RuntimeKind::Mock
            && self.config.environment == Environment::Production
            && !self.config.allow_mock_in_production
        {
            tracing::warn!(
                "mock runtime requested in production without explicit override, using openclaw"
            );
            return RuntimeKind::OpenClaw;
        }

        kind
    }
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}
