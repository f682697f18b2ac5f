//! Stream servers in front of TLS passthrough ports.
//!
//! Each port gets a server that reads the SNI and passes the connection to the
//! socket the stream map picks. Each routed hostname gets a socket server that
//! proxies to its upstream.

use crate::common::{
    IpFamilyFlags, proxy_protocol_suffix, tls_passthrough_variable, tls_socket_name,
};
use crate::errors::Result;
use crate::generator::{ExecuteResult, STREAM_CONFIG_FILE};
use crate::stream::Server;
use crate::templates::{self, Template};
use dataplane::{Configuration, RewriteClientIpSettings, RewriteIpMode};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub(crate) const STREAM_SERVERS_TEMPLATE: Template = Template {
    name: "stream_servers.conf",
    source: r#"{% for s in servers %}
server {
{% if s.is_socket %}
    listen {{ s.listen }}{{ s.proxy_protocol }};
{% else %}
{% if ip_family.ipv4 %}
    listen {{ s.listen }}{{ s.proxy_protocol }};
{% endif %}
{% if ip_family.ipv6 %}
    listen [::]:{{ s.listen }}{{ s.proxy_protocol }};
{% endif %}
{% endif %}
{% for cidr in s.real_ip_from %}
    set_real_ip_from {{ cidr }};
{% endfor %}
{% if plus and s.status_zone %}
    status_zone {{ s.status_zone }};
{% endif %}
{% if s.proxy_pass %}
    proxy_pass {{ s.proxy_pass }};
{% endif %}
{% if s.pass %}
    pass {{ s.pass }};
{% endif %}
{% if s.ssl_preread %}
    ssl_preread on;
{% endif %}
}

{% endfor %}
"#,
};

#[derive(Serialize)]
struct ServerConfig<'a> {
    servers: &'a [Server],
    ip_family: IpFamilyFlags,
    plus: bool,
}

pub(crate) fn execute_stream_servers(
    conf: &Configuration,
    plus: bool,
) -> Result<Vec<ExecuteResult>> {
    let servers = create_stream_servers(conf);

    let ctx = ServerConfig {
        servers: &servers,
        ip_family: IpFamilyFlags::from(&conf.base_http_config),
        plus,
    };

    Ok(vec![ExecuteResult::new(
        STREAM_CONFIG_FILE,
        templates::render(&STREAM_SERVERS_TEMPLATE, &ctx)?,
    )])
}

fn create_stream_servers(conf: &Configuration) -> Vec<Server> {
    if conf.tls_passthrough_servers.is_empty() {
        return Vec::new();
    }

    let resolved: HashMap<&str, bool> = conf
        .stream_upstreams
        .iter()
        .map(|u| (u.name.as_str(), !u.endpoints.is_empty()))
        .collect();

    let mut servers = Vec::with_capacity(conf.tls_passthrough_servers.len() * 2);
    let mut ports = HashSet::new();

    for server in &conf.tls_passthrough_servers {
        let has_endpoints = !server.upstream_name.is_empty()
            && resolved.get(server.upstream_name.as_str()).copied().unwrap_or(false);

        if has_endpoints && !server.hostname.is_empty() {
            let (proxy_protocol, real_ip_from) =
                rewrite_client_ip_for_stream(&conf.base_http_config.rewrite_client_ip);
            servers.push(Server {
                listen: tls_socket_name(server.port, &server.hostname),
                status_zone: server.hostname.clone(),
                proxy_pass: server.upstream_name.clone(),
                proxy_protocol,
                real_ip_from,
                is_socket: true,
                ..Default::default()
            });
        }

        if !ports.insert(server.port) {
            continue;
        }

        servers.push(Server {
            listen: server.port.to_string(),
            status_zone: server.hostname.clone(),
            pass: tls_passthrough_variable(server.port),
            ssl_preread: true,
            ..Default::default()
        });
    }

    servers
}

/// A socket server only sees the proxy protocol header when the listener in
/// front of the whole proxy expects one.
fn rewrite_client_ip_for_stream(settings: &RewriteClientIpSettings) -> (String, Vec<String>) {
    if settings.mode == Some(RewriteIpMode::ProxyProtocol) {
        (
            proxy_protocol_suffix(settings).to_string(),
            settings.trusted_addresses.clone(),
        )
    } else {
        (String::new(), Vec::new())
    }
}
