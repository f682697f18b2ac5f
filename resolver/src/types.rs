use serde::{Deserialize, Serialize};

/// Address family of an endpoint slice.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum AddressType {
    IPv4,
    IPv6,
    #[serde(rename = "FQDN")]
    Fqdn,
}

/// The port a backend reference points at on a service.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct ServicePort {
    /// Port name, empty when the service port is unnamed.
    #[serde(default)]
    pub name: String,
    pub port: i32,
    #[serde(default)]
    pub target_port: TargetPort,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum TargetPort {
    Int(i32),
    Name(String),
}

impl Default for TargetPort {
    fn default() -> Self {
        TargetPort::Int(0)
    }
}

impl ServicePort {
    /// Port used when an endpoint port entry does not carry a number, meaning
    /// all ports are valid.
    pub fn default_port(&self) -> i32 {
        match self.target_port {
            TargetPort::Int(port) if port != 0 => port,
            _ => self.port,
        }
    }
}

/// A port entry of an endpoint slice.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct EndpointPort {
    #[serde(default)]
    pub name: Option<String>,
    /// `None` means every port is valid.
    #[serde(default)]
    pub port: Option<i32>,
}

/// One endpoint of a slice. It can carry several addresses.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SliceEndpoint {
    pub addresses: Vec<String>,
    #[serde(default)]
    pub ready: Option<bool>,
}

impl SliceEndpoint {
    pub fn is_ready(&self) -> bool {
        self.ready == Some(true)
    }
}

/// A group of endpoints reported for a service by one source.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct EndpointSlice {
    pub address_type: AddressType,
    #[serde(default)]
    pub ports: Vec<EndpointPort>,
    #[serde(default)]
    pub endpoints: Vec<SliceEndpoint>,
}

/// A resolved network endpoint.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub address: String,
    pub port: i32,
    #[serde(default)]
    pub ipv6: bool,
}
