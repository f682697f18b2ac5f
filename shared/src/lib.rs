pub mod metrics_defs;
pub mod types;
