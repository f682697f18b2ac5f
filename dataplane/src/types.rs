//! The intermediate data plane model. Everything here is plain data: the builder
//! fills it in once per reconciliation and the generator only reads it.

use crate::policies::{Policy, SpanAttribute};
use resolver::Endpoint;
use serde::{Deserialize, Serialize};
use shared::types::{NamespacedName, ObjectMeta};
use std::collections::BTreeMap;
use std::fmt;

/// Hostname of the server created for a listener without a hostname.
pub const WILDCARD_HOSTNAME: &str = "~^";

/// Trusted CA bundle used when a backend TLS policy does not name its own.
pub const ROOT_CA_PATH: &str = "/etc/ssl/cert.pem";

pub const DEFAULT_ERROR_LOG_LEVEL: &str = "info";

/// Identifies an [`SslKeyPair`]. Safe to use as a file name.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SslKeyPairId(pub String);

impl SslKeyPairId {
    pub fn for_secret(secret: &NamespacedName) -> Self {
        SslKeyPairId(format!("ssl_keypair_{}_{}", secret.namespace, secret.name))
    }
}

impl fmt::Display for SslKeyPairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a [`CertBundle`]. Safe to use as a file name.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CertBundleId(pub String);

impl CertBundleId {
    pub fn for_config_map(config_map: &NamespacedName) -> Self {
        CertBundleId(format!("cert_bundle_{}_{}", config_map.namespace, config_map.name))
    }
}

impl fmt::Display for CertBundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SslKeyPair {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

pub type CertBundle = Vec<u8>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Configuration {
    pub ssl_key_pairs: BTreeMap<SslKeyPairId, SslKeyPair>,
    pub cert_bundles: BTreeMap<CertBundleId, CertBundle>,
    pub http_servers: Vec<VirtualServer>,
    pub ssl_servers: Vec<VirtualServer>,
    pub tls_passthrough_servers: Vec<Layer4VirtualServer>,
    /// Sorted by name.
    pub upstreams: Vec<Upstream>,
    pub stream_upstreams: Vec<Upstream>,
    pub backend_groups: Vec<BackendGroup>,
    pub main_snippets: Vec<Snippet>,
    pub base_http_config: BaseHttpConfig,
    pub telemetry: Telemetry,
    pub logging: Logging,
    pub auxiliary_secrets: AuxiliarySecrets,
    pub deployment_context: DeploymentContext,
    pub version: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VirtualServer {
    pub ssl: Option<Ssl>,
    pub hostname: String,
    pub path_rules: Vec<PathRule>,
    pub policies: Vec<Policy>,
    pub port: i32,
    pub is_default: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Layer4VirtualServer {
    pub hostname: String,
    /// Empty when the route's backend is invalid.
    pub upstream_name: String,
    pub port: i32,
    /// Created for the listener hostname rather than a route hostname.
    pub is_default: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ssl {
    pub key_pair_id: SslKeyPairId,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Upstream {
    /// Unique per service and port.
    pub name: String,
    /// Set when the endpoints could not be resolved.
    pub error_msg: String,
    pub endpoints: Vec<Endpoint>,
    /// Upstream settings policies attached to the service.
    pub policies: Vec<Policy>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathType {
    Exact,
    #[default]
    Prefix,
}

impl PathType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathType::Exact => "exact",
            PathType::Prefix => "prefix",
        }
    }
}

/// Routing rules sharing a path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathRule {
    pub path: String,
    pub path_type: PathType,
    pub match_rules: Vec<MatchRule>,
    pub policies: Vec<Policy>,
    pub grpc: bool,
}

/// One match of a route rule.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchRule {
    pub filters: HttpFilters,
    /// Resource the rule comes from. Only used to break precedence ties.
    pub source: ObjectMeta,
    pub matches: Match,
    pub backend_group: BackendGroup,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Match {
    pub method: Option<String>,
    pub headers: Vec<HttpHeaderMatch>,
    pub query_params: Vec<HttpQueryParamMatch>,
}

impl Match {
    /// True when nothing but the path has to match.
    pub fn is_path_only(&self) -> bool {
        self.method.is_none() && self.headers.is_empty() && self.query_params.is_empty()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct HttpHeaderMatch {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct HttpQueryParamMatch {
    pub name: String,
    pub value: String,
}

/// Filters of a match rule. When `invalid` is set the data plane must answer
/// with a 500 and every other filter is empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpFilters {
    pub invalid: bool,
    pub request_redirect: Option<HttpRequestRedirectFilter>,
    pub request_url_rewrite: Option<HttpUrlRewriteFilter>,
    pub request_header_modifiers: Option<HttpHeaderFilter>,
    pub response_header_modifiers: Option<HttpHeaderFilter>,
    /// Unlike the other kinds, several snippets filters can apply to one rule.
    pub snippets_filters: Vec<SnippetsFilter>,
}

impl HttpFilters {
    pub fn invalid() -> Self {
        HttpFilters {
            invalid: true,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnippetsFilter {
    pub location_snippet: Option<Snippet>,
    pub server_snippet: Option<Snippet>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct HttpHeaderFilter {
    #[serde(default)]
    pub set: Vec<HttpHeader>,
    #[serde(default)]
    pub add: Vec<HttpHeader>,
    #[serde(default)]
    pub remove: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct HttpRequestRedirectFilter {
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub port: Option<i32>,
    #[serde(default)]
    pub status_code: Option<u16>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct HttpUrlRewriteFilter {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub path: Option<HttpPathModifier>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum PathModifierType {
    ReplaceFullPath,
    ReplacePrefixMatch,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct HttpPathModifier {
    #[serde(rename = "type")]
    pub modifier_type: PathModifierType,
    pub replacement: String,
}

/// The backends of one route rule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendGroup {
    pub source: NamespacedName,
    pub backends: Vec<Backend>,
    pub rule_idx: usize,
}

impl BackendGroup {
    /// Unique across all routes and all rules of a route.
    pub fn name(&self) -> String {
        format!(
            "{}__{}_rule{}",
            self.source.namespace, self.source.name, self.rule_idx
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Backend {
    pub verify_tls: Option<VerifyTls>,
    pub upstream_name: String,
    /// 0 means no traffic is forwarded to this backend.
    pub weight: i32,
    pub valid: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyTls {
    pub cert_bundle_id: Option<CertBundleId>,
    pub hostname: String,
    pub root_ca_path: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Telemetry {
    /// Empty when tracing is not configured.
    pub endpoint: String,
    pub service_name: String,
    pub interval: String,
    /// Sorted by name.
    pub ratios: Vec<Ratio>,
    pub span_attributes: Vec<SpanAttribute>,
    pub batch_size: i32,
    pub batch_count: i32,
}

impl Telemetry {
    pub fn enabled(&self) -> bool {
        !self.endpoint.is_empty()
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Ratio {
    pub name: String,
    pub value: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseHttpConfig {
    pub ip_family: IpFamily,
    pub snippets: Vec<Snippet>,
    pub rewrite_client_ip: RewriteClientIpSettings,
    pub http2: bool,
}

impl Default for BaseHttpConfig {
    fn default() -> Self {
        BaseHttpConfig {
            ip_family: IpFamily::Dual,
            snippets: Vec::new(),
            rewrite_client_ip: RewriteClientIpSettings::default(),
            http2: true,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Snippet {
    pub name: String,
    pub contents: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewriteClientIpSettings {
    pub mode: Option<RewriteIpMode>,
    pub trusted_addresses: Vec<String>,
    pub ip_recursive: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum RewriteIpMode {
    #[serde(rename = "ProxyProtocol")]
    ProxyProtocol,
    #[serde(rename = "XForwardedFor")]
    XForwardedFor,
}

impl RewriteIpMode {
    /// Value used by the `real_ip_header` directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            RewriteIpMode::ProxyProtocol => "proxy_protocol",
            RewriteIpMode::XForwardedFor => "X-Forwarded-For",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    #[default]
    Dual,
    Ipv4,
    Ipv6,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Logging {
    pub error_level: String,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            error_level: DEFAULT_ERROR_LOG_LEVEL.to_string(),
        }
    }
}

/// Secrets only needed by the commercial build to report usage.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuxiliarySecrets {
    #[serde(default)]
    pub license_jwt: Option<String>,
    #[serde(default)]
    pub ca_cert: Option<String>,
    #[serde(default)]
    pub client_ssl_cert: Option<String>,
    #[serde(default)]
    pub client_ssl_key: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeploymentContext {
    #[serde(default = "default_integration")]
    pub integration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_node_count: Option<u32>,
}

fn default_integration() -> String {
    "ngf".to_string()
}

impl Default for DeploymentContext {
    fn default() -> Self {
        DeploymentContext {
            integration: default_integration(),
            cluster_id: None,
            installation_id: None,
            cluster_node_count: None,
        }
    }
}
