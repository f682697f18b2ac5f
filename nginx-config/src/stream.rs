//! Render model of the stream context.

use serde::Serialize;

/// A stream `server` block. It either reads the SNI and passes the connection
/// on (`ssl_preread`), or proxies a socket to an upstream.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub(crate) struct Server {
    pub listen: String,
    pub status_zone: String,
    pub proxy_pass: String,
    pub pass: String,
    pub proxy_protocol: String,
    pub real_ip_from: Vec<String>,
    pub ssl_preread: bool,
    pub is_socket: bool,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub(crate) struct Upstream {
    pub name: String,
    pub zone_size: String,
    pub servers: Vec<UpstreamServer>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub(crate) struct UpstreamServer {
    pub address: String,
}
