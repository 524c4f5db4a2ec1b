use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing api base url")]
    MissingApiBaseUrl,
    #[error("invalid api base url: {value}")]
    InvalidBaseUrl { value: String },
    #[error("missing api key")]
    MissingApiKey,
    #[error("invalid api key: {reason}")]
    InvalidApiKey { reason: String },
    #[error("invalid timeout: {timeout_ms} ms")]
    InvalidTimeout { timeout_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("runtime contract violation: missing required operation {missing_operation}")]
    ContractViolation { missing_operation: String },
    #[error("unknown control-plane resource: {resource}")]
    UnknownResource { resource: String },
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("request cancelled by caller")]
    Cancelled,
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("http status {status_code} from {url}: {message}")]
    Status {
        url: String,
        status_code: u16,
        message: String,
    },
    #[error("health check failed for {url}: {message}")]
    HealthCheckFailed { url: String, message: String },
    #[error(
        "control-plane discovery exhausted for {resource} after {attempts} attempts{last_error}",
        last_error = format_last_error(.last_error)
    )]
    DiscoveryExhausted {
        resource: String,
        attempts: usize,
        last_error: Option<String>,
    },
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

fn format_last_error(last_error: &Option<String>) -> String {
    match last_error {
        Some(message) => format!("; last error: {message}"),
        None => String::new(),
    }
}
