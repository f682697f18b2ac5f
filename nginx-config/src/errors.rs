use thiserror::Error;

/// Result type alias for configuration generation
pub type Result<T, E = GenerateError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum GenerateError {
    /// The configuration breaks an invariant the builder should have guaranteed.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("template {name} failed to compile: {reason}")]
    TemplateCompile { name: &'static str, reason: String },

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}
