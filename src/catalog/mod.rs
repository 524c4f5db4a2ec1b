//! Static control-plane resource catalog.
//!
//! Different backend deployments expose the same logical resources under
//! different routing conventions (bare path, `/api/` prefix, versioned
//! prefix). The catalog maps each logical resource to the candidate relative
//! paths discovery tries, in order; first match wins. It is a versioned
//! internal constant, not operator-configurable.

const AGENT_PATHS: [&str; 4] = ["/v1/agents", "/agents", "/api/agents", "/api/v1/agents"];
const SESSION_PATHS: [&str; 4] = [
    "/v1/sessions",
    "/sessions",
    "/api/sessions",
    "/api/v1/sessions",
];
const CHANNEL_PATHS: [&str; 4] = [
    "/v1/channels",
    "/channels",
    "/api/channels",
    "/api/v1/channels",
];
const PLUGIN_PATHS: [&str; 4] = ["/v1/plugins", "/plugins", "/api/plugins", "/api/v1/plugins"];
const FILE_PATHS: [&str; 4] = ["/v1/files", "/files", "/api/files", "/api/v1/files"];

const RESOURCE_NAMES: [&str; 5] = ["agents", "sessions", "channels", "plugins", "files"];

/// Ordered candidate paths for a logical resource name, or `None` for a
/// resource outside the catalog.
pub fn candidate_paths(resource: &str) -> Option<&'static [&'static str]> {
    match resource {
        "agents" => Some(&AGENT_PATHS),
        "sessions" => Some(&SESSION_PATHS),
        "channels" => Some(&CHANNEL_PATHS),
        "plugins" => Some(&PLUGIN_PATHS),
        "files" => Some(&FILE_PATHS),
        _ => None,
    }
}

/// All catalog resource names, in the order status aggregation reports them.
pub fn resource_names() -> &'static [&'static str] {
    &RESOURCE_NAMES
}

/// Candidate paths for the workspace file resource, used directly by the
/// file fetch/upload variants of discovery.
pub fn file_paths() -> &'static [&'static str] {
    &FILE_PATHS
}
