use dataplane::{BaseHttpConfig, IpFamily, RewriteClientIpSettings, RewriteIpMode};
use serde::Serialize;

const PROXY_PROTOCOL_DIRECTIVE: &str = " proxy_protocol";

/// Which address families the listen directives are rendered for.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub(crate) struct IpFamilyFlags {
    pub ipv4: bool,
    pub ipv6: bool,
}

impl From<&BaseHttpConfig> for IpFamilyFlags {
    fn from(config: &BaseHttpConfig) -> Self {
        match config.ip_family {
            IpFamily::Ipv4 => IpFamilyFlags {
                ipv4: true,
                ipv6: false,
            },
            IpFamily::Ipv6 => IpFamilyFlags {
                ipv4: false,
                ipv6: true,
            },
            IpFamily::Dual => IpFamilyFlags {
                ipv4: true,
                ipv6: true,
            },
        }
    }
}

/// Suffix for listen directives, empty unless the proxy protocol is expected.
pub(crate) fn proxy_protocol_suffix(settings: &RewriteClientIpSettings) -> &'static str {
    match settings.mode {
        Some(RewriteIpMode::ProxyProtocol) => PROXY_PROTOCOL_DIRECTIVE,
        _ => "",
    }
}

/// The `set_real_ip_from`, `real_ip_header` and `real_ip_recursive` directives
/// of an http server, without the trailing semicolon.
///
/// A server listening on a unix socket only ever receives traffic from the
/// stream server in front of it, so it trusts the socket and nothing else.
pub(crate) fn real_ip_directives(
    settings: &RewriteClientIpSettings,
    is_socket: bool,
) -> Vec<String> {
    let mut directives = Vec::new();
    let proxy_protocol = settings.mode == Some(RewriteIpMode::ProxyProtocol);

    if is_socket {
        if proxy_protocol {
            directives.push("set_real_ip_from unix:".to_string());
        }
        return directives;
    }

    for cidr in &settings.trusted_addresses {
        directives.push(format!("set_real_ip_from {cidr}"));
    }
    if let Some(mode) = settings.mode {
        directives.push(format!("real_ip_header {}", mode.as_str()));
    }
    if settings.ip_recursive {
        directives.push("real_ip_recursive on".to_string());
    }

    directives
}

/// Nginx variables may only hold letters, digits and underscores.
pub(crate) fn safe_variable_name(name: &str) -> String {
    name.replace(['-', '.'], "_")
}

/// Socket of the https server block sharing a port with TLS passthrough.
pub(crate) fn https_socket_name(port: i32) -> String {
    format!("unix:/var/run/nginx/https{port}.sock")
}

/// Socket of the stream server proxying one passthrough hostname.
pub(crate) fn tls_socket_name(port: i32, hostname: &str) -> String {
    format!("unix:/var/run/nginx/{hostname}{port}.sock")
}

/// Variable selecting the destination of a passthrough port.
pub(crate) fn tls_passthrough_variable(port: i32) -> String {
    format!("$dest{port}")
}
