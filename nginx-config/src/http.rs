//! Render model of the http context. These types only exist to be fed to the
//! templates, so field names match what the templates read.

use crate::includes::Include;
use serde::Serialize;

/// An http `server` block.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct Server {
    pub ssl: Option<Ssl>,
    pub server_name: String,
    pub listen: String,
    pub locations: Vec<Location>,
    pub includes: Vec<Include>,
    /// Client address rewriting directives, filled in once `is_socket` is known.
    pub real_ip: Vec<String>,
    pub is_default_http: bool,
    pub is_default_ssl: bool,
    pub grpc: bool,
    pub is_socket: bool,
}

#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    /// Proxies directly.
    #[default]
    External,
    /// Only reachable through a redirect from njs.
    Internal,
    /// Hands the request to njs, which picks an internal location.
    Redirect,
}

/// An http `location` block.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct Location {
    pub path: String,
    pub location_type: LocationType,
    pub proxy_pass: String,
    pub http_match_key: String,
    pub proxy_set_headers: Vec<Header>,
    pub proxy_ssl_verify: Option<ProxySslVerify>,
    pub return_value: Option<Return>,
    pub response_headers: ResponseHeaders,
    pub rewrites: Vec<String>,
    pub includes: Vec<Include>,
    pub grpc: bool,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub(crate) fn new(name: &str, value: &str) -> Self {
        Header {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct ResponseHeaders {
    pub add: Vec<Header>,
    pub set: Vec<Header>,
    pub remove: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Return {
    pub code: u16,
    pub body: String,
}

impl Return {
    pub(crate) fn code(code: u16) -> Self {
        Return {
            code,
            body: String::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Ssl {
    pub certificate: String,
    pub certificate_key: String,
}

/// Verification of the TLS certificate served by the backend.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct ProxySslVerify {
    pub trusted_certificate: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Upstream {
    pub name: String,
    /// Empty means no shared memory zone.
    pub zone_size: String,
    pub servers: Vec<UpstreamServer>,
    pub keep_alive: UpstreamKeepAlive,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct UpstreamServer {
    pub address: String,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct UpstreamKeepAlive {
    pub connections: Option<i32>,
    pub requests: Option<i32>,
    pub time: Option<String>,
    pub timeout: Option<String>,
}

impl UpstreamKeepAlive {
    pub fn enabled(&self) -> bool {
        self.connections.is_some_and(|c| c != 0)
            || self.requests.is_some_and(|r| r != 0)
            || self.time.as_deref().is_some_and(|t| !t.is_empty())
            || self.timeout.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct SplitClient {
    pub variable_name: String,
    pub distributions: Vec<SplitClientDistribution>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct SplitClientDistribution {
    pub percent: String,
    pub value: String,
}

/// A `map` block, shared by the http and stream contexts.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Map {
    pub source: String,
    pub variable: String,
    pub parameters: Vec<MapParameter>,
    pub use_hostnames: bool,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct MapParameter {
    pub value: String,
    pub result: String,
}

impl MapParameter {
    pub(crate) fn new(value: impl Into<String>, result: impl Into<String>) -> Self {
        MapParameter {
            value: value.into(),
            result: result.into(),
        }
    }
}
