//! Traffic policies that can be attached to gateways, routes and services.

use serde::{Deserialize, Serialize};
use shared::types::NamespacedName;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind")]
pub enum Policy {
    ClientSettings(ClientSettingsPolicy),
    Observability(ObservabilityPolicy),
    UpstreamSettings(UpstreamSettingsPolicy),
}

impl Policy {
    pub fn namespaced_name(&self) -> NamespacedName {
        let (namespace, name) = match self {
            Policy::ClientSettings(p) => (&p.namespace, &p.name),
            Policy::Observability(p) => (&p.namespace, &p.name),
            Policy::UpstreamSettings(p) => (&p.namespace, &p.name),
        };
        NamespacedName::new(namespace, name)
    }
}

/// Client request settings applied at the server or location level.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ClientSettingsPolicy {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub body: Option<ClientBody>,
    #[serde(default)]
    pub keep_alive: Option<ClientKeepAlive>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ClientBody {
    #[serde(default)]
    pub max_size: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ClientKeepAlive {
    #[serde(default)]
    pub requests: Option<i32>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub timeout: Option<ClientKeepAliveTimeout>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ClientKeepAliveTimeout {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ObservabilityPolicy {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub tracing: Option<Tracing>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TraceStrategy {
    Ratio,
    Parent,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Tracing {
    pub strategy: TraceStrategy,
    #[serde(default)]
    pub ratio: Option<i32>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub span_name: Option<String>,
    #[serde(default)]
    pub span_attributes: Vec<SpanAttribute>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SpanAttribute {
    pub key: String,
    pub value: String,
}

/// Upstream connection settings applied to every upstream of a service.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct UpstreamSettingsPolicy {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub zone_size: Option<String>,
    #[serde(default)]
    pub keep_alive: Option<UpstreamKeepAlivePolicy>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct UpstreamKeepAlivePolicy {
    #[serde(default)]
    pub connections: Option<i32>,
    #[serde(default)]
    pub requests: Option<i32>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
}

/// Nginx variable holding the sampling decision for a tracing ratio.
pub fn ratio_variable_name(ratio: i32) -> String {
    format!("$otel_ratio_{ratio}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_tagged() {
        let yaml = r#"
            kind: ClientSettings
            namespace: test
            name: csp
            body:
                max_size: 10m
            "#;
        let policy: Policy = serde_yaml::from_str(yaml).unwrap();
        let Policy::ClientSettings(csp) = &policy else {
            panic!("expected client settings policy");
        };
        assert_eq!(csp.body.as_ref().unwrap().max_size.as_deref(), Some("10m"));
        assert_eq!(policy.namespaced_name(), NamespacedName::new("test", "csp"));
    }

    #[test]
    fn test_ratio_variable_name() {
        assert_eq!(ratio_variable_name(25), "$otel_ratio_25");
    }
}
