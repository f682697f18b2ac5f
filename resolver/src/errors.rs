use shared::types::NamespacedName;
use thiserror::Error;

/// Result type alias for endpoint resolution
pub type Result<T, E = ResolveError> = std::result::Result<T, E>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// The caller passed a degenerate service reference. This is a bug in the
    /// caller and must not be treated as a missing backend.
    #[error(
        "expected the following fields to be non-empty: name: {name:?}, ns: {namespace:?}, port: {port}"
    )]
    ContractViolation {
        name: String,
        namespace: String,
        port: i32,
    },

    #[error("no endpoints found for Service {0}")]
    NoEndpoints(NamespacedName),

    #[error("no valid endpoints found for Service {service} and port {port}")]
    NoValidEndpoints { service: NamespacedName, port: i32 },
}

impl ResolveError {
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, ResolveError::ContractViolation { .. })
    }
}
