use std::sync::Arc;

use crate::core::error::RuntimeError;
use crate::core::traits::AgentRuntime;

/// Operations every runtime implementation must expose. The trait already
/// enforces the shape at compile time; this list backs the factory-boundary
/// check for adapters that are selected from configuration and can
/// misdeclare their surface.
pub const REQUIRED_OPERATIONS: [&str; 4] = [
    "runtime_info",
    "capabilities",
    "chat_completions",
    "health_check",
];

/// Fail-fast structural validation of a candidate runtime.
///
/// Returns the same handle unchanged on success, so construction sites can
/// write `verify_runtime_contract(Arc::new(Adapter::new(config)?))`. Fails
/// with a `ContractViolation` naming the first missing operation. Pure
/// validation; no side effects.
pub fn verify_runtime_contract(
    candidate: Arc<dyn AgentRuntime>,
) -> Result<Arc<dyn AgentRuntime>, RuntimeError> {
    let declared = candidate.supported_operations();

    for required in REQUIRED_OPERATIONS {
        if !declared.contains(&required) {
            return Err(RuntimeError::ContractViolation {
                missing_operation: required.to_string(),
            });
        }
    }

    Ok(candidate)
}
