use crate::errors::Result;
use crate::generator::{ExecuteResult, HTTP_CONFIG_FILE, STREAM_CONFIG_FILE};
use crate::policies::upstreamsettings;
use crate::templates::{self, Template};
use crate::{http, stream};
use dataplane::{Configuration, Upstream};
use resolver::Endpoint;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

pub(crate) const UPSTREAMS_TEMPLATE: Template = Template {
    name: "upstreams.conf",
    source: r#"{% for u in upstreams %}
upstream {{ u.name }} {
    random two least_conn;
{% if u.zone_size %}
    zone {{ u.name }} {{ u.zone_size }};
{% endif %}
{% for server in u.servers %}
    server {{ server.address }};
{% endfor %}
{% if u.keep_alive.connections %}
    keepalive {{ u.keep_alive.connections }};
{% endif %}
{% if u.keep_alive.requests %}
    keepalive_requests {{ u.keep_alive.requests }};
{% endif %}
{% if u.keep_alive.time %}
    keepalive_time {{ u.keep_alive.time }};
{% endif %}
{% if u.keep_alive.timeout %}
    keepalive_timeout {{ u.keep_alive.timeout }};
{% endif %}
}

{% endfor %}
"#,
};

pub(crate) const STREAM_UPSTREAMS_TEMPLATE: Template = Template {
    name: "stream_upstreams.conf",
    source: r#"{% for u in upstreams %}
upstream {{ u.name }} {
    random two least_conn;
{% if u.zone_size %}
    zone {{ u.name }} {{ u.zone_size }};
{% endif %}
{% for server in u.servers %}
    server {{ server.address }};
{% endfor %}
}

{% endfor %}
"#,
};

/// Upstream for backend references that could not be resolved to a service.
pub(crate) const INVALID_BACKEND_REF: &str = "invalid-backend-ref";

const OSS_ZONE_SIZE: &str = "512k";
const PLUS_ZONE_SIZE: &str = "1m";
const NGINX_500_SERVER: &str = "unix:/var/run/nginx/nginx-500-server.sock";
const NGINX_503_SERVER: &str = "unix:/var/run/nginx/nginx-503-server.sock";

/// Upstreams by name, so locations can tell whether keepalive is on.
pub(crate) struct UpstreamMap<'a> {
    upstreams: HashMap<&'a str, &'a http::Upstream>,
}

impl<'a> UpstreamMap<'a> {
    pub(crate) fn new(upstreams: &'a [http::Upstream]) -> Self {
        UpstreamMap {
            upstreams: upstreams.iter().map(|u| (u.name.as_str(), u)).collect(),
        }
    }

    pub(crate) fn keep_alive_enabled(&self, name: &str) -> bool {
        self.upstreams
            .get(name)
            .is_some_and(|u| u.keep_alive.enabled())
    }
}

#[derive(Serialize)]
struct Upstreams<'a, T> {
    upstreams: &'a [T],
}

fn zone_size(plus: bool) -> &'static str {
    if plus { PLUS_ZONE_SIZE } else { OSS_ZONE_SIZE }
}

fn server_address(endpoint: &Endpoint) -> String {
    if endpoint.ipv6 {
        format!("[{}]:{}", endpoint.address, endpoint.port)
    } else {
        format!("{}:{}", endpoint.address, endpoint.port)
    }
}

/// The http upstreams, followed by the one serving invalid backend references.
pub(crate) fn create_upstreams(upstreams: &[Upstream], plus: bool) -> Vec<http::Upstream> {
    let mut result: Vec<http::Upstream> =
        upstreams.iter().map(|u| create_upstream(u, plus)).collect();

    result.push(http::Upstream {
        name: INVALID_BACKEND_REF.to_string(),
        servers: vec![http::UpstreamServer {
            address: NGINX_500_SERVER.to_string(),
        }],
        ..Default::default()
    });

    result
}

fn create_upstream(upstream: &Upstream, plus: bool) -> http::Upstream {
    let settings = upstreamsettings::process(&upstream.policies);
    let zone_size = settings
        .zone_size
        .unwrap_or_else(|| zone_size(plus).to_string());

    if upstream.endpoints.is_empty() {
        if !upstream.error_msg.is_empty() {
            warn!(
                upstream = %upstream.name,
                error = %upstream.error_msg,
                "Upstream has no endpoints, requests will get a 503"
            );
        }

        return http::Upstream {
            name: upstream.name.clone(),
            zone_size,
            servers: vec![http::UpstreamServer {
                address: NGINX_503_SERVER.to_string(),
            }],
            keep_alive: settings.keep_alive,
        };
    }

    http::Upstream {
        name: upstream.name.clone(),
        zone_size,
        servers: upstream
            .endpoints
            .iter()
            .map(|e| http::UpstreamServer {
                address: server_address(e),
            })
            .collect(),
        keep_alive: settings.keep_alive,
    }
}

pub(crate) fn execute_upstreams(upstreams: &[http::Upstream]) -> Result<Vec<ExecuteResult>> {
    let rendered = templates::render(&UPSTREAMS_TEMPLATE, Upstreams { upstreams })?;
    Ok(vec![ExecuteResult::new(HTTP_CONFIG_FILE, rendered)])
}

/// Stream upstreams without endpoints are left out. Nothing routes to them:
/// the stream maps send their hostnames nowhere.
pub(crate) fn execute_stream_upstreams(
    conf: &Configuration,
    plus: bool,
) -> Result<Vec<ExecuteResult>> {
    let upstreams: Vec<stream::Upstream> = conf
        .stream_upstreams
        .iter()
        .filter(|u| !u.endpoints.is_empty())
        .map(|u| stream::Upstream {
            name: u.name.clone(),
            zone_size: zone_size(plus).to_string(),
            servers: u
                .endpoints
                .iter()
                .map(|e| stream::UpstreamServer {
                    address: server_address(e),
                })
                .collect(),
        })
        .collect();

    let rendered = templates::render(
        &STREAM_UPSTREAMS_TEMPLATE,
        Upstreams {
            upstreams: &upstreams,
        },
    )?;
    Ok(vec![ExecuteResult::new(STREAM_CONFIG_FILE, rendered)])
}
