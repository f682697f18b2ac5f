//! Resolves a backend service reference into the concrete endpoints that
//! a proxy upstream can balance across.

pub mod directory;
pub mod errors;
mod resolver;
pub mod types;

pub use directory::{DirectoryError, EndpointDirectory, StaticDirectory};
pub use errors::{ResolveError, Result};
pub use resolver::{ServiceResolver, ServiceResolverImpl};
pub use types::{
    AddressType, Endpoint, EndpointPort, EndpointSlice, ServicePort, SliceEndpoint, TargetPort,
};
