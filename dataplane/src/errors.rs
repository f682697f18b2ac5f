use std::io;
use thiserror::Error;

/// Result type alias for configuration building
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum BuildError {
    /// The graph breaks an invariant validation should have guaranteed.
    #[error("contract violation: {0}")]
    ContractViolation(String),
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("failed to load graph: {0}")]
    LoadError(#[from] io::Error),

    #[error("failed to parse graph: {0}")]
    ParseError(#[from] serde_yaml::Error),
}
