use crate::common::{
    https_socket_name, safe_variable_name, tls_passthrough_variable, tls_socket_name,
};
use crate::errors::Result;
use crate::generator::{ExecuteResult, HTTP_CONFIG_FILE, STREAM_CONFIG_FILE};
use crate::http::{Map, MapParameter};
use crate::templates::{self, Template};
use dataplane::{Configuration, VirtualServer};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

pub(crate) const MAPS_TEMPLATE: Template = Template {
    name: "maps.conf",
    source: r#"{% for m in maps %}
map {{ m.source }} {{ m.variable }} {
{% for p in m.parameters %}
    {{ p.value }} {{ p.result }};
{% endfor %}
}

{% endfor %}
# Set $gw_api_compliant_host to $http_host unless it is empty, as it can be for
# HTTP/1.0 requests. $http_host keeps the port, which $host does not.
map $http_host $gw_api_compliant_host {
    '' $host;
    default $http_host;
}

# Set $connection_upgrade to "upgrade" when the Upgrade header is present,
# so websocket connections are proxied.
map $http_upgrade $connection_upgrade {
    default upgrade;
    '' close;
}

# The request URI without its query string.
map $request_uri $request_uri_path {
    "~^(?P<path>[^?]*)(\?.*)?$" $path;
}
"#,
};

pub(crate) const STREAM_MAPS_TEMPLATE: Template = Template {
    name: "stream_maps.conf",
    source: r#"{% for m in maps %}
map {{ m.source }} {{ m.variable }} {
{% if m.use_hostnames %}
    hostnames;

{% endif %}
{% for p in m.parameters %}
    {{ p.value }} {{ p.result }};
{% endfor %}
}

{% endfor %}
"#,
};

/// Request header values are prepended to the values added by a filter, so a
/// map per added header turns the client value into `"value,"` or nothing.
const ANY_STRING: &str = "~.*";

/// Result for a hostname whose connections are dropped.
const EMPTY_STRING_SOCKET: &str = r#""""#;

#[derive(Serialize)]
struct Maps<'a> {
    maps: &'a [Map],
}

pub(crate) fn execute_maps(conf: &Configuration) -> Result<Vec<ExecuteResult>> {
    let servers = conf.http_servers.iter().chain(&conf.ssl_servers);
    let maps = build_add_header_maps(servers);

    let rendered = templates::render(&MAPS_TEMPLATE, Maps { maps: &maps })?;
    Ok(vec![ExecuteResult::new(HTTP_CONFIG_FILE, rendered)])
}

pub(crate) fn execute_stream_maps(conf: &Configuration) -> Result<Vec<ExecuteResult>> {
    let maps = create_stream_maps(conf);

    let rendered = templates::render(&STREAM_MAPS_TEMPLATE, Maps { maps: &maps })?;
    Ok(vec![ExecuteResult::new(STREAM_CONFIG_FILE, rendered)])
}

/// Variable holding the client value of a header that a filter adds to.
pub(crate) fn add_header_map_variable_name(name: &str) -> String {
    format!("{}_header_var", safe_variable_name(name).to_lowercase())
}

fn build_add_header_maps<'a>(servers: impl Iterator<Item = &'a VirtualServer>) -> Vec<Map> {
    let names: BTreeSet<String> = servers
        .flat_map(|s| &s.path_rules)
        .flat_map(|pr| &pr.match_rules)
        .filter_map(|mr| mr.filters.request_header_modifiers.as_ref())
        .flat_map(|modifiers| &modifiers.add)
        .map(|header| header.name.to_lowercase())
        .collect();

    names.iter().map(|name| create_add_headers_map(name)).collect()
}

fn create_add_headers_map(name: &str) -> Map {
    let http_var_source = format!("${{http_{}}}", safe_variable_name(name));

    Map {
        variable: format!("${}", add_header_map_variable_name(name)),
        parameters: vec![
            MapParameter::new("default", "''"),
            MapParameter::new(ANY_STRING, format!("{http_var_source},")),
        ],
        source: http_var_source,
        use_hostnames: false,
    }
}

/// One map per passthrough port, choosing the socket a connection is passed to
/// by its SNI. SSL servers sharing the port are reached through their socket.
fn create_stream_maps(conf: &Configuration) -> Vec<Map> {
    if conf.tls_passthrough_servers.is_empty() {
        return Vec::new();
    }

    let resolved: HashMap<&str, bool> = conf
        .stream_upstreams
        .iter()
        .map(|u| (u.name.as_str(), !u.endpoints.is_empty()))
        .collect();

    let mut port_maps: IndexMap<i32, Map> = IndexMap::new();

    for server in &conf.tls_passthrough_servers {
        let map = port_maps.entry(server.port).or_insert_with(|| Map {
            source: "$ssl_preread_server_name".to_string(),
            variable: tls_passthrough_variable(server.port),
            parameters: Vec::new(),
            use_hostnames: true,
        });

        // A listener without a hostname has no entry of its own.
        if server.hostname.is_empty() {
            continue;
        }

        // Listener hostnames without a route carry no upstream.
        let has_endpoints = !server.upstream_name.is_empty()
            && resolved.get(server.upstream_name.as_str()).copied().unwrap_or(false);

        let socket = if has_endpoints {
            tls_socket_name(server.port, &server.hostname)
        } else {
            EMPTY_STRING_SOCKET.to_string()
        };

        map.parameters.push(MapParameter::new(&server.hostname, socket));
    }

    for server in &conf.ssl_servers {
        let Some(map) = port_maps.get_mut(&server.port) else {
            continue;
        };

        let hostname = if server.is_default {
            "default"
        } else {
            server.hostname.as_str()
        };
        map.parameters
            .push(MapParameter::new(hostname, https_socket_name(server.port)));
    }

    port_maps.into_values().collect()
}

/// Ports shared by TLS passthrough and https servers. The https servers on
/// these ports listen on a socket behind the stream server.
pub(crate) fn passthrough_ports(conf: &Configuration) -> BTreeSet<i32> {
    conf.tls_passthrough_servers.iter().map(|s| s.port).collect()
}
