//! Builds the intermediate data plane model from a validated graph of routing
//! resources.

mod configuration;
mod convert;
pub mod errors;
pub mod graph;
pub mod hostname;
pub mod policies;
mod sort;
pub mod types;

pub use configuration::{build_configuration, default_configuration};
pub use errors::{BuildError, Result};
pub use types::*;
