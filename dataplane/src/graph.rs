//! The validated graph of routing resources the builder consumes. Validation has
//! already happened upstream: every resource carries its verdict in a `valid`
//! flag and the builder only decides what to do with it.

use crate::errors::GraphError;
use crate::policies::{Policy, SpanAttribute};
use crate::types::{
    AuxiliarySecrets, DeploymentContext, HttpHeaderFilter, HttpHeaderMatch, HttpQueryParamMatch,
    HttpRequestRedirectFilter, HttpUrlRewriteFilter, IpFamily, RewriteIpMode,
};
use resolver::ServicePort;
use serde::{Deserialize, Serialize};
use shared::types::{NamespacedName, ObjectMeta};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

fn default_true() -> bool {
    true
}

fn default_weight() -> i32 {
    1
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Graph {
    #[serde(default)]
    pub gateway_class: Option<GatewayClass>,
    #[serde(default)]
    pub gateway: Option<Gateway>,
    #[serde(default)]
    pub proxy_settings: Option<ProxySettings>,
    #[serde(default)]
    pub routes: Vec<L7Route>,
    #[serde(default)]
    pub l4_routes: Vec<L4Route>,
    #[serde(default)]
    pub referenced_secrets: Vec<Secret>,
    #[serde(default)]
    pub ca_cert_bundles: Vec<CaCertBundle>,
    #[serde(default)]
    pub referenced_services: Vec<ReferencedService>,
    /// Every policy known to the gateway, attached or not.
    #[serde(default)]
    pub policies: Vec<GraphPolicy>,
    #[serde(default)]
    pub snippets_filters: Vec<GraphSnippetsFilter>,
    #[serde(default)]
    pub auxiliary_secrets: AuxiliarySecrets,
    #[serde(default)]
    pub deployment_context: DeploymentContext,
}

impl Graph {
    pub fn from_file(path: &Path) -> Result<Self, GraphError> {
        let file = File::open(path)?;
        let graph: Graph = serde_yaml::from_reader(file)?;
        Ok(graph)
    }

    pub fn from_yaml(s: &str) -> Result<Self, GraphError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn route(&self, key: &RouteKey) -> Option<&L7Route> {
        self.routes
            .iter()
            .find(|r| r.source.namespace == key.namespace && r.source.name == key.name)
    }

    pub fn l4_route(&self, key: &RouteKey) -> Option<&L4Route> {
        self.l4_routes
            .iter()
            .find(|r| r.source.namespace == key.namespace && r.source.name == key.name)
    }

    pub fn secret(&self, nsname: &NamespacedName) -> Option<&Secret> {
        self.referenced_secrets
            .iter()
            .find(|s| s.namespace == nsname.namespace && s.name == nsname.name)
    }

    pub fn snippets_filter(&self, nsname: &NamespacedName) -> Option<&GraphSnippetsFilter> {
        self.snippets_filters
            .iter()
            .find(|f| f.namespace == nsname.namespace && f.name == nsname.name)
    }

    /// Policies attached to a referenced service.
    pub fn service_policies(&self, svc: &NamespacedName) -> &[GraphPolicy] {
        self.referenced_services
            .iter()
            .find(|s| s.namespace == svc.namespace && s.name == svc.name)
            .map(|s| s.policies.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GatewayClass {
    #[serde(default = "default_true")]
    pub valid: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Gateway {
    pub source: ObjectMeta,
    #[serde(default)]
    pub listeners: Vec<Listener>,
    #[serde(default)]
    pub policies: Vec<GraphPolicy>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ListenerProtocol {
    #[serde(rename = "HTTP")]
    Http,
    #[serde(rename = "HTTPS")]
    Https,
    #[serde(rename = "TLS")]
    Tls,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Listener {
    pub name: String,
    pub protocol: ListenerProtocol,
    pub port: i32,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default = "default_true")]
    pub valid: bool,
    /// Secret holding the certificate and key of an HTTPS listener.
    #[serde(default)]
    pub resolved_secret: Option<NamespacedName>,
    /// HTTP and gRPC routes attached to the listener.
    #[serde(default)]
    pub routes: Vec<RouteKey>,
    /// TLS routes attached to the listener.
    #[serde(default)]
    pub l4_routes: Vec<RouteKey>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub namespace: String,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    #[default]
    Http,
    Grpc,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct L7Route {
    pub source: ObjectMeta,
    #[serde(default)]
    pub route_type: RouteType,
    #[serde(default = "default_true")]
    pub valid: bool,
    /// Hostnames accepted by each listener, keyed by listener name.
    #[serde(default)]
    pub accepted_hostnames: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub rules: Vec<RouteRule>,
    #[serde(default)]
    pub policies: Vec<GraphPolicy>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RouteRule {
    #[serde(default = "default_true")]
    pub valid_matches: bool,
    #[serde(default = "default_true")]
    pub valid_filters: bool,
    #[serde(default)]
    pub matches: Vec<RouteMatch>,
    #[serde(default)]
    pub filters: Vec<RouteFilter>,
    #[serde(default)]
    pub backend_refs: Vec<BackendRef>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RouteMatch {
    #[serde(default)]
    pub path: Option<PathMatch>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: Vec<HttpHeaderMatch>,
    #[serde(default)]
    pub query_params: Vec<HttpQueryParamMatch>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum PathMatchType {
    Exact,
    #[default]
    PathPrefix,
    RegularExpression,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PathMatch {
    #[serde(default, rename = "type")]
    pub match_type: PathMatchType,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum RouteFilter {
    RequestRedirect(HttpRequestRedirectFilter),
    #[serde(rename = "URLRewrite")]
    UrlRewrite(HttpUrlRewriteFilter),
    RequestHeaderModifier(HttpHeaderFilter),
    ResponseHeaderModifier(HttpHeaderFilter),
    /// Reference to a snippets filter in the same graph.
    SnippetsFilter(NamespacedName),
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BackendRef {
    pub svc: NamespacedName,
    pub service_port: ServicePort,
    #[serde(default = "default_weight")]
    pub weight: i32,
    #[serde(default = "default_true")]
    pub valid: bool,
    #[serde(default)]
    pub backend_tls_policy: Option<BackendTlsPolicy>,
}

impl BackendRef {
    /// Name of the upstream backing this reference, empty for invalid references.
    pub fn service_port_reference(&self) -> String {
        if !self.valid {
            return String::new();
        }

        format!(
            "{}_{}_{}",
            self.svc.namespace, self.svc.name, self.service_port.port
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BackendTlsPolicy {
    pub namespace: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub valid: bool,
    /// Config map holding the CA certificate. The system roots are used when unset.
    #[serde(default)]
    pub ca_cert_ref: Option<NamespacedName>,
    pub hostname: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct L4Route {
    pub source: ObjectMeta,
    #[serde(default = "default_true")]
    pub valid: bool,
    #[serde(default)]
    pub accepted_hostnames: BTreeMap<String, Vec<String>>,
    pub backend_ref: BackendRef,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Secret {
    pub namespace: String,
    pub name: String,
    pub cert: String,
    pub key: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CaCertBundle {
    pub namespace: String,
    pub name: String,
    /// PEM data, optionally base64 encoded.
    #[serde(default)]
    pub ca_cert: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ReferencedService {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub policies: Vec<GraphPolicy>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GraphPolicy {
    #[serde(default = "default_true")]
    pub valid: bool,
    pub source: Policy,
}

/// Nginx contexts a snippet can be injected into.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Snippets {
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub http: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GraphSnippetsFilter {
    pub namespace: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub valid: bool,
    #[serde(default)]
    pub snippets: Snippets,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ProxySettings {
    #[serde(default = "default_true")]
    pub valid: bool,
    #[serde(default)]
    pub disable_http2: bool,
    #[serde(default)]
    pub ip_family: Option<IpFamily>,
    #[serde(default)]
    pub rewrite_client_ip: Option<RewriteClientIp>,
    #[serde(default)]
    pub telemetry: Option<TelemetrySettings>,
    #[serde(default)]
    pub logging: Option<LoggingSettings>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RewriteClientIp {
    #[serde(default)]
    pub mode: Option<RewriteIpMode>,
    #[serde(default)]
    pub trusted_addresses: Vec<String>,
    #[serde(default)]
    pub set_ip_recursively: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub exporter: Option<TelemetryExporter>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub span_attributes: Vec<SpanAttribute>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TelemetryExporter {
    pub endpoint: String,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub batch_size: Option<i32>,
    #[serde(default)]
    pub batch_count: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub error_level: Option<String>,
}
