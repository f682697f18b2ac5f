//! The http and https `server` blocks with their locations, and the match
//! table njs uses to route requests that match on more than their path.

use crate::common::{
    IpFamilyFlags, https_socket_name, proxy_protocol_suffix, real_ip_directives, safe_variable_name,
};
use crate::errors::{GenerateError, Result};
use crate::generator::{
    ExecuteResult, HTTP_CONFIG_FILE, HTTP_MATCH_VARS_FILE, cert_bundle_file_name, pem_file_name,
};
use crate::http::{
    Header, Location, LocationType, ProxySslVerify, ResponseHeaders, Return, Server, Ssl,
};
use crate::includes;
use crate::maps::{add_header_map_variable_name, passthrough_ports};
use crate::policies::PolicyGenerator;
use crate::split_clients::{backend_group_name, backend_group_needs_split};
use crate::templates::{self, Template};
use crate::upstreams::UpstreamMap;
use dataplane::{
    Backend, BackendGroup, Configuration, HttpFilters, HttpHeader, HttpRequestRedirectFilter,
    HttpUrlRewriteFilter, Match, MatchRule, PathModifierType, PathRule, PathType, ROOT_CA_PATH,
    VerifyTls, VirtualServer,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

pub(crate) const SERVERS_TEMPLATE: Template = Template {
    name: "servers.conf",
    source: r#"js_preload_object matches from /etc/nginx/conf.d/matches.json;
{% for s in servers %}

{% if s.is_default_ssl %}
server {
{% if ip_family.ipv4 or s.is_socket %}
    listen {{ s.listen }} ssl default_server{{ proxy_protocol }};
{% endif %}
{% if ip_family.ipv6 and not s.is_socket %}
    listen [::]:{{ s.listen }} ssl default_server{{ proxy_protocol }};
{% endif %}
    ssl_reject_handshake on;
{% for d in s.real_ip %}
    {{ d }};
{% endfor %}
}
{% elif s.is_default_http %}
server {
{% if ip_family.ipv4 %}
    listen {{ s.listen }} default_server{{ proxy_protocol }};
{% endif %}
{% if ip_family.ipv6 %}
    listen [::]:{{ s.listen }} default_server{{ proxy_protocol }};
{% endif %}
{% for d in s.real_ip %}
    {{ d }};
{% endfor %}
    default_type text/html;
    return 404;
}
{% else %}
server {
{% if s.ssl %}
{% if ip_family.ipv4 or s.is_socket %}
    listen {{ s.listen }} ssl{{ proxy_protocol }};
{% endif %}
{% if ip_family.ipv6 and not s.is_socket %}
    listen [::]:{{ s.listen }} ssl{{ proxy_protocol }};
{% endif %}
    ssl_certificate {{ s.ssl.certificate }};
    ssl_certificate_key {{ s.ssl.certificate_key }};

    if ($ssl_server_name != $host) {
        return 421;
    }
{% else %}
{% if ip_family.ipv4 %}
    listen {{ s.listen }}{{ proxy_protocol }};
{% endif %}
{% if ip_family.ipv6 %}
    listen [::]:{{ s.listen }}{{ proxy_protocol }};
{% endif %}
{% endif %}

    server_name {{ s.server_name }};
{% if plus %}
    status_zone {{ s.server_name }};
{% endif %}
{% for i in s.includes %}
    include {{ i.name }};
{% endfor %}
{% for d in s.real_ip %}
    {{ d }};
{% endfor %}
{% for l in s.locations %}
{% set p = "grpc" if l.grpc else "proxy" %}

    location {{ l.path }} {
{% if l.location_type == "internal" %}
        internal;
{% endif %}
{% for i in l.includes %}
        include {{ i.name }};
{% endfor %}
{% for r in l.rewrites %}
        rewrite {{ r }};
{% endfor %}
{% if l.return_value %}
        return {{ l.return_value.code }} "{{ l.return_value.body }}";
{% endif %}
{% if l.location_type == "redirect" %}
        set $match_key {{ l.http_match_key }};
        js_content httpmatches.redirect;
{% endif %}
{% if l.grpc %}
        include /etc/nginx/grpc-error-pages.conf;
{% endif %}
        proxy_http_version 1.1;
{% if l.proxy_pass %}
{% for h in l.proxy_set_headers %}
        {{ p }}_set_header {{ h.name }} "{{ h.value }}";
{% endfor %}
        {{ p }}_pass {{ l.proxy_pass }};
{% for h in l.response_headers.add %}
        add_header {{ h.name }} "{{ h.value }}" always;
{% endfor %}
{% for h in l.response_headers.set %}
        proxy_hide_header {{ h.name }};
        add_header {{ h.name }} "{{ h.value }}" always;
{% endfor %}
{% for h in l.response_headers.remove %}
        proxy_hide_header {{ h }};
{% endfor %}
{% if l.proxy_ssl_verify %}
        {{ p }}_ssl_server_name on;
        {{ p }}_ssl_verify on;
        {{ p }}_ssl_name {{ l.proxy_ssl_verify.name }};
        {{ p }}_ssl_trusted_certificate {{ l.proxy_ssl_verify.trusted_certificate }};
{% endif %}
{% endif %}
    }
{% endfor %}
{% if s.grpc %}

    include /etc/nginx/grpc-error-locations.conf;
{% endif %}
}
{% endif %}
{% endfor %}

server {
    listen unix:/var/run/nginx/nginx-502-server.sock;
    access_log off;

    return 502;
}

server {
    listen unix:/var/run/nginx/nginx-500-server.sock;
    access_log off;

    return 500;
}
"#,
};

const ROOT_PATH: &str = "/";
const INTERNAL_ROUTE_PATH_PREFIX: &str = "/_ngf-internal";
/// Separates a header name from its value in the match table.
const HEADER_MATCH_SEPARATOR: &str = ":";

/// Match conditions by `$match_key`, read by the njs `httpmatches` module.
/// Sorted so the file is stable across runs.
type HttpMatchPairs = BTreeMap<String, Vec<RouteMatch>>;

/// One match of a route, as njs sees it. A request satisfying it is redirected
/// to `redirect_path`.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct RouteMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    redirect_path: String,
    /// `name:value`. Header names are case-insensitive, values are not.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    headers: Vec<String>,
    /// `name=value`. Both are case-sensitive.
    #[serde(rename = "params", skip_serializing_if = "Vec::is_empty")]
    query_params: Vec<String>,
    /// Matches every request on the path.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    any: bool,
}

#[derive(Serialize)]
struct ServerConfig<'a> {
    servers: &'a [Server],
    ip_family: IpFamilyFlags,
    plus: bool,
    proxy_protocol: &'static str,
}

pub(crate) fn execute_servers(
    conf: &Configuration,
    generator: &dyn PolicyGenerator,
    upstreams: &UpstreamMap<'_>,
    plus: bool,
) -> Result<Vec<ExecuteResult>> {
    let (servers, match_pairs) = create_servers(conf, generator, upstreams)?;

    let server_config = ServerConfig {
        servers: &servers,
        ip_family: IpFamilyFlags::from(&conf.base_http_config),
        plus,
        proxy_protocol: proxy_protocol_suffix(&conf.base_http_config.rewrite_client_ip),
    };
    let rendered = templates::render(&SERVERS_TEMPLATE, &server_config)?;

    let match_conf = serde_json::to_vec(&match_pairs).map_err(|err| {
        GenerateError::ContractViolation(format!("could not serialize http match pairs: {err}"))
    })?;

    let mut results = includes::execute_results_from_servers(&servers);
    results.push(ExecuteResult::new(HTTP_CONFIG_FILE, rendered));
    results.push(ExecuteResult::new(HTTP_MATCH_VARS_FILE, match_conf));

    Ok(results)
}

fn create_servers(
    conf: &Configuration,
    generator: &dyn PolicyGenerator,
    upstreams: &UpstreamMap<'_>,
) -> Result<(Vec<Server>, HttpMatchPairs)> {
    let shared_tls_ports = passthrough_ports(conf);
    let rewrite_client_ip = &conf.base_http_config.rewrite_client_ip;

    let mut servers = Vec::with_capacity(conf.http_servers.len() + conf.ssl_servers.len());
    let mut match_pairs = HttpMatchPairs::new();

    for (idx, virtual_server) in conf.http_servers.iter().enumerate() {
        let (mut server, pairs) =
            create_server(virtual_server, &idx.to_string(), false, generator, upstreams)?;
        server.real_ip = real_ip_directives(rewrite_client_ip, server.is_socket);
        servers.push(server);
        match_pairs.extend(pairs);
    }

    for (idx, virtual_server) in conf.ssl_servers.iter().enumerate() {
        let server_id = format!("SSL_{idx}");
        let (mut server, pairs) =
            create_server(virtual_server, &server_id, true, generator, upstreams)?;

        // The stream server owns the port and passes https traffic on.
        if shared_tls_ports.contains(&virtual_server.port) {
            server.listen = https_socket_name(virtual_server.port);
            server.is_socket = true;
        }

        server.real_ip = real_ip_directives(rewrite_client_ip, server.is_socket);
        servers.push(server);
        match_pairs.extend(pairs);
    }

    Ok((servers, match_pairs))
}

fn create_server(
    virtual_server: &VirtualServer,
    server_id: &str,
    ssl: bool,
    generator: &dyn PolicyGenerator,
    upstreams: &UpstreamMap<'_>,
) -> Result<(Server, HttpMatchPairs)> {
    let listen = virtual_server.port.to_string();

    if virtual_server.is_default {
        let server = Server {
            listen,
            is_default_ssl: ssl,
            is_default_http: !ssl,
            ..Default::default()
        };
        return Ok((server, HttpMatchPairs::new()));
    }

    let ssl = if ssl {
        let key_pair_id = &virtual_server
            .ssl
            .as_ref()
            .ok_or_else(|| {
                GenerateError::ContractViolation(format!(
                    "https server {} on port {} has no key pair",
                    virtual_server.hostname, virtual_server.port
                ))
            })?
            .key_pair_id;

        Some(Ssl {
            certificate: pem_file_name(key_pair_id),
            certificate_key: pem_file_name(key_pair_id),
        })
    } else {
        None
    };

    let (locations, match_pairs, grpc) =
        create_locations(virtual_server, server_id, generator, upstreams)?;

    let mut server = Server {
        ssl,
        server_name: virtual_server.hostname.clone(),
        listen,
        locations,
        grpc,
        ..Default::default()
    };

    let server_files = generator.generate_for_server(&virtual_server.policies, &server)?;
    let mut server_includes = includes::from_policy_files(server_files);
    server_includes.extend(includes::from_server_snippets_filters(virtual_server));
    server.includes = server_includes;

    Ok((server, match_pairs))
}

fn create_locations(
    server: &VirtualServer,
    server_id: &str,
    generator: &dyn PolicyGenerator,
    upstreams: &UpstreamMap<'_>,
) -> Result<(Vec<Location>, HttpMatchPairs, bool)> {
    let paths_and_types = path_types(&server.path_rules);

    let mut locations = Vec::new();
    let mut match_pairs = HttpMatchPairs::new();
    let mut root_path_exists = false;
    let mut grpc = false;

    for (path_rule_idx, rule) in server.path_rules.iter().enumerate() {
        if rule.path == ROOT_PATH {
            root_path_exists = true;
        }
        grpc |= rule.grpc;

        let mut ext_locations = initialize_external_locations(rule, &paths_and_types);
        for location in &mut ext_locations {
            let files = generator.generate_for_location(&rule.policies, location)?;
            location.includes = includes::from_policy_files(files);
        }

        if !needs_internal_locations(rule) {
            for match_rule in &rule.match_rules {
                for location in &mut ext_locations {
                    update_location(
                        location,
                        match_rule,
                        server.port,
                        &rule.path,
                        rule.grpc,
                        upstreams,
                    );
                }
            }

            locations.extend(ext_locations);
            continue;
        }

        let mut internal_locations = Vec::with_capacity(rule.match_rules.len());
        let mut matches = Vec::with_capacity(rule.match_rules.len());

        for (match_rule_idx, match_rule) in rule.match_rules.iter().enumerate() {
            let path =
                format!("{INTERNAL_ROUTE_PATH_PREFIX}-rule{path_rule_idx}-route{match_rule_idx}");

            let mut location = create_match_location(&path, rule.grpc);
            let files = generator.generate_for_internal_location(&rule.policies)?;
            location.includes = includes::from_policy_files(files);
            update_location(
                &mut location,
                match_rule,
                server.port,
                &rule.path,
                rule.grpc,
                upstreams,
            );

            internal_locations.push(location);
            matches.push(create_route_match(&match_rule.matches, path));
        }

        // Every external location of the rule shares the same match key.
        if !ext_locations.is_empty() {
            let http_match_key = format!("{server_id}_{path_rule_idx}");
            for location in &mut ext_locations {
                location.http_match_key = http_match_key.clone();
            }
            match_pairs.insert(http_match_key, matches);
        }

        locations.extend(ext_locations);
        locations.extend(internal_locations);
    }

    if !root_path_exists {
        locations.push(create_default_root_location());
    }

    Ok((locations, match_pairs, grpc))
}

/// Path types configured for each path, e.g. `/foo` → {exact, prefix}.
fn path_types(rules: &[PathRule]) -> HashMap<&str, HashSet<PathType>> {
    let mut paths: HashMap<&str, HashSet<PathType>> = HashMap::new();
    for rule in rules {
        paths.entry(rule.path.as_str()).or_default().insert(rule.path_type);
    }
    paths
}

fn needs_internal_locations(rule: &PathRule) -> bool {
    match rule.match_rules.as_slice() {
        [] => false,
        [only] => !only.matches.is_path_only(),
        _ => true,
    }
}

fn initialize_external_locations(
    rule: &PathRule,
    paths_and_types: &HashMap<&str, HashSet<PathType>>,
) -> Vec<Location> {
    let location_type = if needs_internal_locations(rule) {
        LocationType::Redirect
    } else {
        LocationType::External
    };
    let location = |path: String| Location {
        path,
        location_type,
        ..Default::default()
    };

    if rule.path_type == PathType::Exact {
        return vec![location(exact_path(&rule.path))];
    }
    if rule.path.ends_with('/') {
        return vec![location(rule.path.clone())];
    }

    // A prefix without a trailing slash needs a location for the exact path
    // and one for everything below it. A rule that configures either one
    // explicitly takes precedence.
    let has_type = |path: &str, path_type: PathType| {
        paths_and_types
            .get(path)
            .is_some_and(|types| types.contains(&path_type))
    };
    let exact_exists = has_type(&rule.path, PathType::Exact);
    let trailing_slash_exists = has_type(&format!("{}/", rule.path), PathType::Prefix);

    let mut locations = Vec::with_capacity(2);
    if !trailing_slash_exists {
        locations.push(location(format!("{}/", rule.path)));
    }
    if !exact_exists {
        locations.push(location(exact_path(&rule.path)));
    }
    locations
}

fn exact_path(path: &str) -> String {
    format!("= {path}")
}

fn create_match_location(path: &str, grpc: bool) -> Location {
    let rewrites = if grpc {
        vec!["^ $request_uri break".to_string()]
    } else {
        Vec::new()
    };

    Location {
        path: path.to_string(),
        location_type: LocationType::Internal,
        rewrites,
        ..Default::default()
    }
}

fn create_default_root_location() -> Location {
    Location {
        path: ROOT_PATH.to_string(),
        return_value: Some(Return::code(404)),
        ..Default::default()
    }
}

/// Applies the filters and backends of a match rule to a location.
fn update_location(
    location: &mut Location,
    match_rule: &MatchRule,
    listener_port: i32,
    path: &str,
    grpc: bool,
    upstreams: &UpstreamMap<'_>,
) {
    let filters = &match_rule.filters;
    if filters.invalid {
        location.return_value = Some(Return::code(500));
        return;
    }

    location
        .includes
        .extend(includes::from_location_snippets_filters(&filters.snippets_filters));

    if let Some(redirect) = &filters.request_redirect {
        location.return_value = Some(create_return_for_redirect_filter(redirect, listener_port));
        return;
    }

    if let Some(rewrites) = create_rewrites(filters.request_url_rewrite.as_ref(), path) {
        if location.location_type == LocationType::Internal {
            location.rewrites.push(rewrites.internal);
        }
        location.rewrites.push(rewrites.main);
    }

    let backends = &match_rule.backend_group.backends;
    location.proxy_set_headers = generate_proxy_set_headers(filters, grpc, upstreams, backends);
    location.proxy_ssl_verify = create_proxy_tls_from_backends(backends);

    let protocol = protocol(location.proxy_ssl_verify.is_some(), grpc);
    location.proxy_pass = create_proxy_pass(
        &match_rule.backend_group,
        filters.request_url_rewrite.as_ref(),
        protocol,
        grpc,
    );
    location.response_headers = generate_response_headers(filters);
    location.grpc = grpc;
}

fn create_return_for_redirect_filter(
    filter: &HttpRequestRedirectFilter,
    listener_port: i32,
) -> Return {
    let hostname = filter.hostname.as_deref().unwrap_or("$host");
    let code = filter.status_code.unwrap_or(302);
    let port = filter.port.unwrap_or(listener_port);

    let mut host_port = format!("{hostname}:{port}");
    let scheme = match filter.scheme.as_deref() {
        Some(scheme) => {
            let well_known_port =
                (port == 80 && scheme == "http") || (port == 443 && scheme == "https");
            let default_port = filter.port.is_none() && (scheme == "http" || scheme == "https");
            if well_known_port || default_port {
                host_port = hostname.to_string();
            }
            scheme
        }
        None => "$scheme",
    };

    Return {
        code,
        body: format!("{scheme}://{host_port}$request_uri"),
    }
}

struct Rewrites {
    /// Restores the original URI in an internal location.
    internal: String,
    main: String,
}

fn create_rewrites(filter: Option<&HttpUrlRewriteFilter>, path: &str) -> Option<Rewrites> {
    let modifier = filter?.path.as_ref()?;

    let main = match modifier.modifier_type {
        PathModifierType::ReplaceFullPath => format!("^ {} break", modifier.replacement),
        PathModifierType::ReplacePrefixMatch => {
            let prefix = if modifier.replacement.is_empty() {
                "/"
            } else {
                modifier.replacement.as_str()
            };

            // Capture everything after the configured prefix.
            let mut regex = format!("^{path}(.*)$");
            let mut replacement = format!("{prefix}$1");

            // The replacement supplies the slash, so require one in the
            // request without capturing it.
            if prefix.ends_with('/') && !path.ends_with('/') {
                regex = format!("^{path}(?:/(.*))?$");
            }

            // The path's own slash is not captured, so put it back.
            if path.ends_with('/') && !prefix.ends_with('/') {
                replacement = format!("{prefix}/$1");
            }

            format!("{regex} {replacement} break")
        }
    };

    Some(Rewrites {
        internal: "^ $request_uri".to_string(),
        main,
    })
}

fn create_route_match(matches: &Match, redirect_path: String) -> RouteMatch {
    if matches.is_path_only() {
        return RouteMatch {
            redirect_path,
            any: true,
            ..Default::default()
        };
    }

    // Only the first header of each name counts, compared case-insensitively.
    let mut header_names = HashSet::new();
    let headers = matches
        .headers
        .iter()
        .filter(|h| header_names.insert(h.name.to_lowercase()))
        .map(|h| format!("{}{HEADER_MATCH_SEPARATOR}{}", h.name, h.value))
        .collect();

    RouteMatch {
        method: matches.method.clone(),
        redirect_path,
        headers,
        query_params: matches
            .query_params
            .iter()
            .map(|p| format!("{}={}", p.name, p.value))
            .collect(),
        any: false,
    }
}

fn protocol(verify_tls: bool, grpc: bool) -> &'static str {
    match (grpc, verify_tls) {
        (false, false) => "http",
        (false, true) => "https",
        (true, false) => "grpc",
        (true, true) => "grpcs",
    }
}

/// Backends of a group share their TLS policy, so the first one found applies.
fn create_proxy_tls_from_backends(backends: &[Backend]) -> Option<ProxySslVerify> {
    backends
        .iter()
        .find_map(|b| b.verify_tls.as_ref())
        .map(create_proxy_ssl_verify)
}

fn create_proxy_ssl_verify(verify: &VerifyTls) -> ProxySslVerify {
    let trusted_certificate = match (&verify.cert_bundle_id, &verify.root_ca_path) {
        (Some(id), _) => cert_bundle_file_name(id),
        (None, Some(path)) => path.clone(),
        (None, None) => ROOT_CA_PATH.to_string(),
    };

    ProxySslVerify {
        trusted_certificate,
        name: verify.hostname.clone(),
    }
}

fn create_proxy_pass(
    group: &BackendGroup,
    rewrite: Option<&HttpUrlRewriteFilter>,
    protocol: &str,
    grpc: bool,
) -> String {
    // A rewritten path is set by the rewrite directive instead.
    let request_uri = if grpc || rewrite.is_some_and(|r| r.path.is_some()) {
        ""
    } else {
        "$request_uri"
    };

    let backend = backend_group_name(group);
    if backend_group_needs_split(group) {
        return format!("{protocol}://${}{request_uri}", safe_variable_name(&backend));
    }

    format!("{protocol}://{backend}{request_uri}")
}

fn base_proxy_set_headers() -> Vec<Header> {
    vec![
        Header::new("Host", "$gw_api_compliant_host"),
        Header::new("X-Forwarded-For", "$proxy_add_x_forwarded_for"),
        Header::new("X-Real-IP", "$remote_addr"),
        Header::new("X-Forwarded-Proto", "$scheme"),
        Header::new("X-Forwarded-Host", "$host"),
        Header::new("X-Forwarded-Port", "$server_port"),
    ]
}

fn generate_proxy_set_headers(
    filters: &HttpFilters,
    grpc: bool,
    upstreams: &UpstreamMap<'_>,
    backends: &[Backend],
) -> Vec<Header> {
    let mut headers = base_proxy_set_headers();

    if grpc {
        headers.push(Header::new("Authority", "$gw_api_compliant_host"));
    } else {
        // Keepalive connections to the upstream must not be closed or upgraded.
        let keep_alive = backends
            .iter()
            .any(|b| upstreams.keep_alive_enabled(&b.upstream_name));
        let connection = if keep_alive { "" } else { "$connection_upgrade" };

        headers.push(Header::new("Upgrade", "$http_upgrade"));
        headers.push(Header::new("Connection", connection));
    }

    let rewrite_hostname = filters
        .request_url_rewrite
        .as_ref()
        .and_then(|r| r.hostname.as_deref());
    if let Some(hostname) = rewrite_hostname {
        if let Some(host) = headers.iter_mut().find(|h| h.name == "Host") {
            host.value = hostname.to_string();
        }
    }

    let Some(modifiers) = &filters.request_header_modifiers else {
        return headers;
    };

    let capacity =
        modifiers.add.len() + modifiers.set.len() + modifiers.remove.len() + headers.len();
    let mut proxy_set_headers = Vec::with_capacity(capacity);
    proxy_set_headers.extend(modifiers.add.iter().map(|h| Header {
        name: h.name.clone(),
        value: format!("${{{}}}{}", add_header_map_variable_name(&h.name), h.value),
    }));
    proxy_set_headers.extend(create_headers(&modifiers.set));
    // An empty value keeps nginx from passing the header on.
    proxy_set_headers.extend(modifiers.remove.iter().map(|name| Header::new(name, "")));
    proxy_set_headers.extend(headers);

    proxy_set_headers
}

fn generate_response_headers(filters: &HttpFilters) -> ResponseHeaders {
    let Some(modifiers) = &filters.response_header_modifiers else {
        return ResponseHeaders::default();
    };

    ResponseHeaders {
        add: create_headers(&modifiers.add),
        set: create_headers(&modifiers.set),
        remove: modifiers.remove.clone(),
    }
}

fn create_headers(headers: &[HttpHeader]) -> Vec<Header> {
    headers.iter().map(|h| Header::new(&h.name, &h.value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http;
    use crate::policies::PolicyFile;
    use dataplane::policies::{ClientSettingsPolicy, Policy};
    use dataplane::{
        CertBundleId, HttpHeaderFilter, HttpHeaderMatch, HttpPathModifier, HttpQueryParamMatch,
        Layer4VirtualServer, RewriteClientIpSettings, RewriteIpMode, Snippet, SnippetsFilter,
        SslKeyPairId,
    };
    use dataplane::Ssl as SslConfig;
    use shared::types::NamespacedName;

    struct NoPolicies;

    impl PolicyGenerator for NoPolicies {}

    /// Names every generated file after the block it was generated for.
    struct Recording;

    impl PolicyGenerator for Recording {
        fn generate_for_server(&self, _: &[Policy], server: &Server) -> Result<Vec<PolicyFile>> {
            Ok(vec![PolicyFile {
                name: format!("server-{}.conf", server.server_name),
                content: b"server".to_vec(),
            }])
        }

        fn generate_for_location(
            &self,
            _: &[Policy],
            location: &Location,
        ) -> Result<Vec<PolicyFile>> {
            let kind = match location.location_type {
                LocationType::Redirect => "redirect",
                _ => "ext",
            };
            Ok(vec![PolicyFile {
                name: format!("location-{kind}.conf"),
                content: b"location".to_vec(),
            }])
        }

        fn generate_for_internal_location(&self, _: &[Policy]) -> Result<Vec<PolicyFile>> {
            Ok(vec![PolicyFile {
                name: "internal.conf".into(),
                content: b"internal".to_vec(),
            }])
        }
    }

    fn backend_group(upstreams: &[&str]) -> BackendGroup {
        BackendGroup {
            source: NamespacedName::new("test", "hr"),
            backends: upstreams
                .iter()
                .map(|u| Backend {
                    upstream_name: u.to_string(),
                    weight: 1,
                    valid: true,
                    verify_tls: None,
                })
                .collect(),
            rule_idx: 0,
        }
    }

    fn match_rule(matches: Match) -> MatchRule {
        MatchRule {
            matches,
            backend_group: backend_group(&["test_foo_80"]),
            ..Default::default()
        }
    }

    fn path_rule(path: &str, path_type: PathType, match_rules: Vec<MatchRule>) -> PathRule {
        PathRule {
            path: path.into(),
            path_type,
            match_rules,
            ..Default::default()
        }
    }

    fn virtual_server(path_rules: Vec<PathRule>) -> VirtualServer {
        VirtualServer {
            hostname: "cafe.example.com".into(),
            port: 80,
            path_rules,
            ..Default::default()
        }
    }

    fn locations(server: &VirtualServer) -> (Vec<Location>, HttpMatchPairs, bool) {
        create_locations(server, "1", &NoPolicies, &UpstreamMap::new(&[])).unwrap()
    }

    fn paths(locations: &[Location]) -> Vec<&str> {
        locations.iter().map(|l| l.path.as_str()).collect()
    }

    fn header_match() -> Match {
        Match {
            headers: vec![HttpHeaderMatch {
                name: "Version".into(),
                value: "v1".into(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_path_only_rule_proxies_directly() {
        let server = virtual_server(vec![path_rule(
            "/",
            PathType::Prefix,
            vec![match_rule(Match::default())],
        )]);

        let (locs, match_pairs, grpc) = locations(&server);
        assert!(match_pairs.is_empty());
        assert!(!grpc);
        assert_eq!(locs.len(), 1);

        let loc = &locs[0];
        assert_eq!(loc.path, "/");
        assert_eq!(loc.location_type, LocationType::External);
        assert_eq!(loc.proxy_pass, "http://test_foo_80$request_uri");
        let names: Vec<_> = loc.proxy_set_headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Host",
                "X-Forwarded-For",
                "X-Real-IP",
                "X-Forwarded-Proto",
                "X-Forwarded-Host",
                "X-Forwarded-Port",
                "Upgrade",
                "Connection",
            ]
        );
        assert_eq!(loc.proxy_set_headers[7].value, "$connection_upgrade");
    }

    #[test]
    fn test_non_slashed_prefix_and_default_root() {
        let server = virtual_server(vec![
            path_rule("/coffee", PathType::Prefix, vec![match_rule(Match::default())]),
            path_rule("/tea", PathType::Exact, vec![match_rule(Match::default())]),
            path_rule("/beans/", PathType::Prefix, vec![match_rule(Match::default())]),
        ]);

        let (locs, _, _) = locations(&server);
        assert_eq!(paths(&locs), vec!["/coffee/", "= /coffee", "= /tea", "/beans/", "/"]);
        assert_eq!(locs[4].return_value, Some(Return::code(404)));
        assert!(locs[4].proxy_pass.is_empty());
    }

    #[test]
    fn test_explicit_rules_take_precedence() {
        let server = virtual_server(vec![
            path_rule("/", PathType::Prefix, vec![match_rule(Match::default())]),
            path_rule("/coffee", PathType::Exact, vec![match_rule(Match::default())]),
            path_rule("/coffee", PathType::Prefix, vec![match_rule(Match::default())]),
            path_rule("/tea", PathType::Prefix, vec![match_rule(Match::default())]),
            path_rule("/tea/", PathType::Prefix, vec![match_rule(Match::default())]),
            path_rule("/tea", PathType::Exact, vec![match_rule(Match::default())]),
        ]);

        let (locs, _, _) = locations(&server);
        assert_eq!(paths(&locs), vec!["/", "= /coffee", "/coffee/", "/tea/", "= /tea"]);
    }

    #[test]
    fn test_internal_locations() {
        let server = virtual_server(vec![path_rule(
            "/coffee/",
            PathType::Prefix,
            vec![
                match_rule(Match {
                    method: Some("GET".into()),
                    ..header_match()
                }),
                match_rule(Match::default()),
            ],
        )]);

        let (locs, match_pairs, _) = locations(&server);
        assert_eq!(
            paths(&locs),
            vec![
                "/coffee/",
                "/_ngf-internal-rule0-route0",
                "/_ngf-internal-rule0-route1",
                "/"
            ]
        );
        assert_eq!(locs[0].location_type, LocationType::Redirect);
        assert_eq!(locs[0].http_match_key, "1_0");
        assert!(locs[0].proxy_pass.is_empty());
        assert_eq!(locs[1].location_type, LocationType::Internal);
        assert_eq!(locs[1].proxy_pass, "http://test_foo_80$request_uri");

        assert_eq!(
            serde_json::to_string(&match_pairs).unwrap(),
            r#"{"1_0":[{"method":"GET","redirectPath":"/_ngf-internal-rule0-route0","headers":["Version:v1"]},{"redirectPath":"/_ngf-internal-rule0-route1","any":true}]}"#
        );
    }

    #[test]
    fn test_grpc_internal_location() {
        let mut rule = path_rule("/svc/", PathType::Prefix, vec![match_rule(header_match())]);
        rule.grpc = true;

        let (locs, _, grpc) = locations(&virtual_server(vec![rule]));
        assert!(grpc);
        assert_eq!(locs[1].rewrites, vec!["^ $request_uri break"]);
        assert_eq!(locs[1].proxy_pass, "grpc://test_foo_80");
        assert!(locs[1].grpc);
        assert!(locs[1].proxy_set_headers.iter().any(|h| h.name == "Authority"));
        assert!(!locs[1].proxy_set_headers.iter().any(|h| h.name == "Upgrade"));
    }

    #[test]
    fn test_no_match_pairs_without_external_locations() {
        let server = virtual_server(vec![
            path_rule("/coffee/", PathType::Prefix, vec![match_rule(Match::default())]),
            path_rule("/coffee", PathType::Exact, vec![match_rule(Match::default())]),
            path_rule("/coffee", PathType::Prefix, vec![match_rule(header_match())]),
        ]);

        let (locs, match_pairs, _) = locations(&server);
        assert!(match_pairs.is_empty());
        assert_eq!(
            paths(&locs),
            vec!["/coffee/", "= /coffee", "/_ngf-internal-rule2-route0", "/"]
        );
    }

    #[test]
    fn test_route_match() {
        let matches = Match {
            method: Some("POST".into()),
            headers: vec![
                HttpHeaderMatch {
                    name: "Version".into(),
                    value: "v1".into(),
                },
                HttpHeaderMatch {
                    name: "version".into(),
                    value: "v2".into(),
                },
                HttpHeaderMatch {
                    name: "Env".into(),
                    value: "Prod".into(),
                },
            ],
            query_params: vec![HttpQueryParamMatch {
                name: "Color".into(),
                value: "Blue".into(),
            }],
        };

        let route_match = create_route_match(&matches, "/_ngf-internal-rule0-route0".into());
        assert_eq!(route_match.method.as_deref(), Some("POST"));
        assert_eq!(route_match.headers, vec!["Version:v1", "Env:Prod"]);
        assert_eq!(route_match.query_params, vec!["Color=Blue"]);
        assert!(!route_match.any);
    }

    #[test]
    fn test_invalid_filter_returns_500() {
        let mut rule = match_rule(Match::default());
        rule.filters = HttpFilters::invalid();
        let server = virtual_server(vec![path_rule("/", PathType::Prefix, vec![rule])]);

        let (locs, _, _) = locations(&server);
        assert_eq!(locs[0].return_value, Some(Return::code(500)));
        assert!(locs[0].proxy_pass.is_empty());
        assert!(locs[0].proxy_set_headers.is_empty());
    }

    #[test]
    fn test_redirect_filter() {
        let mut rule = match_rule(Match::default());
        rule.filters.request_redirect = Some(HttpRequestRedirectFilter {
            scheme: Some("https".into()),
            ..Default::default()
        });
        rule.filters.snippets_filters = vec![SnippetsFilter {
            location_snippet: Some(Snippet {
                name: "loc".into(),
                contents: "limit_rate 1k;".into(),
            }),
            server_snippet: None,
        }];
        let server = virtual_server(vec![path_rule("/", PathType::Prefix, vec![rule])]);

        let (locs, _, _) = locations(&server);
        assert_eq!(
            locs[0].return_value,
            Some(Return {
                code: 302,
                body: "https://$host$request_uri".into(),
            })
        );
        assert_eq!(locs[0].includes[0].name, "/etc/nginx/includes/loc.conf");
        assert!(locs[0].proxy_pass.is_empty());
    }

    #[test]
    fn test_return_for_redirect_filter() {
        fn redirect(
            scheme: Option<&str>,
            hostname: Option<&str>,
            port: Option<i32>,
            code: Option<u16>,
        ) -> Return {
            let filter = HttpRequestRedirectFilter {
                scheme: scheme.map(String::from),
                hostname: hostname.map(String::from),
                port,
                status_code: code,
            };
            create_return_for_redirect_filter(&filter, 8080)
        }

        assert_eq!(
            redirect(None, None, None, None),
            Return {
                code: 302,
                body: "$scheme://$host:8080$request_uri".into()
            }
        );
        assert_eq!(
            redirect(Some("https"), Some("foo.example.com"), Some(443), Some(301)),
            Return {
                code: 301,
                body: "https://foo.example.com$request_uri".into()
            }
        );
        assert_eq!(
            redirect(Some("https"), None, None, None).body,
            "https://$host$request_uri"
        );
        assert_eq!(
            redirect(Some("http"), None, Some(8443), None).body,
            "http://$host:8443$request_uri"
        );
        assert_eq!(
            redirect(Some("ftp"), Some("foo.example.com"), None, None).body,
            "ftp://foo.example.com:8080$request_uri"
        );
    }

    fn rewrite(path_type: PathModifierType, replacement: &str, path: &str) -> String {
        let filter = HttpUrlRewriteFilter {
            hostname: None,
            path: Some(HttpPathModifier {
                modifier_type: path_type,
                replacement: replacement.into(),
            }),
        };
        create_rewrites(Some(&filter), path).unwrap().main
    }

    #[test]
    fn test_rewrites() {
        use PathModifierType::{ReplaceFullPath, ReplacePrefixMatch};

        assert_eq!(rewrite(ReplaceFullPath, "/full", "/original"), "^ /full break");
        assert_eq!(
            rewrite(ReplacePrefixMatch, "/new", "/original/"),
            "^/original/(.*)$ /new/$1 break"
        );
        assert_eq!(
            rewrite(ReplacePrefixMatch, "/new/", "/original"),
            "^/original(?:/(.*))?$ /new/$1 break"
        );
        assert_eq!(
            rewrite(ReplacePrefixMatch, "/new", "/original"),
            "^/original(.*)$ /new$1 break"
        );
        assert_eq!(
            rewrite(ReplacePrefixMatch, "", "/original"),
            "^/original(?:/(.*))?$ /$1 break"
        );
        assert_eq!(
            rewrite(ReplacePrefixMatch, "/new/", "/original/"),
            "^/original/(.*)$ /new/$1 break"
        );

        assert!(create_rewrites(None, "/").is_none());
        let hostname_only = HttpUrlRewriteFilter {
            hostname: Some("foo.example.com".into()),
            path: None,
        };
        assert!(create_rewrites(Some(&hostname_only), "/").is_none());
    }

    #[test]
    fn test_rewrite_on_internal_location() {
        let mut rule = match_rule(header_match());
        rule.filters.request_url_rewrite = Some(HttpUrlRewriteFilter {
            hostname: Some("beans.example.com".into()),
            path: Some(HttpPathModifier {
                modifier_type: PathModifierType::ReplacePrefixMatch,
                replacement: "/beans".into(),
            }),
        });
        let server = virtual_server(vec![path_rule("/coffee/", PathType::Prefix, vec![rule])]);

        let (locs, _, _) = locations(&server);
        let internal = &locs[1];
        assert_eq!(
            internal.rewrites,
            vec!["^ $request_uri", "^/coffee/(.*)$ /beans/$1 break"]
        );
        assert_eq!(internal.proxy_pass, "http://test_foo_80");
        assert_eq!(internal.proxy_set_headers[0], Header::new("Host", "beans.example.com"));
    }

    #[test]
    fn test_header_modifiers() {
        let mut filters = HttpFilters {
            request_header_modifiers: Some(HttpHeaderFilter {
                add: vec![HttpHeader {
                    name: "My-Header".into(),
                    value: "added".into(),
                }],
                set: vec![HttpHeader {
                    name: "Set-Me".into(),
                    value: "set".into(),
                }],
                remove: vec!["Remove-Me".into()],
            }),
            ..Default::default()
        };
        filters.response_header_modifiers = Some(HttpHeaderFilter {
            add: vec![HttpHeader {
                name: "Resp-Add".into(),
                value: "a".into(),
            }],
            set: vec![],
            remove: vec!["Server".into()],
        });

        let headers = generate_proxy_set_headers(&filters, false, &UpstreamMap::new(&[]), &[]);
        assert_eq!(headers[0], Header::new("My-Header", "${my_header_header_var}added"));
        assert_eq!(headers[1], Header::new("Set-Me", "set"));
        assert_eq!(headers[2], Header::new("Remove-Me", ""));
        assert_eq!(headers[3], Header::new("Host", "$gw_api_compliant_host"));
        assert_eq!(headers.len(), 11);

        let response = generate_response_headers(&filters);
        assert_eq!(response.add, vec![Header::new("Resp-Add", "a")]);
        assert!(response.set.is_empty());
        assert_eq!(response.remove, vec!["Server"]);
    }

    #[test]
    fn test_keep_alive_empties_connection_header() {
        let upstreams = vec![http::Upstream {
            name: "test_foo_80".into(),
            keep_alive: http::UpstreamKeepAlive {
                connections: Some(16),
                ..Default::default()
            },
            ..Default::default()
        }];
        let upstream_map = UpstreamMap::new(&upstreams);

        let backends = backend_group(&["other", "test_foo_80"]).backends;
        let headers =
            generate_proxy_set_headers(&HttpFilters::default(), false, &upstream_map, &backends);
        assert_eq!(headers.last(), Some(&Header::new("Connection", "")));
    }

    #[test]
    fn test_proxy_tls_and_split_proxy_pass() {
        let mut group = backend_group(&["test_foo_443", "test_bar_443"]);
        group.backends[1].verify_tls = Some(VerifyTls {
            cert_bundle_id: Some(CertBundleId("cert_bundle_test_ca".into())),
            hostname: "foo.example.com".into(),
            root_ca_path: None,
        });

        let verify = create_proxy_tls_from_backends(&group.backends).unwrap();
        assert_eq!(verify.trusted_certificate, "/etc/nginx/secrets/cert_bundle_test_ca.crt");
        assert_eq!(verify.name, "foo.example.com");

        assert_eq!(
            create_proxy_pass(&group, None, protocol(true, false), false),
            "https://$test__hr_rule0$request_uri"
        );

        let system_ca = create_proxy_ssl_verify(&VerifyTls {
            cert_bundle_id: None,
            hostname: "foo.example.com".into(),
            root_ca_path: None,
        });
        assert_eq!(system_ca.trusted_certificate, ROOT_CA_PATH);
    }

    #[test]
    fn test_protocol() {
        assert_eq!(protocol(false, false), "http");
        assert_eq!(protocol(true, false), "https");
        assert_eq!(protocol(false, true), "grpc");
        assert_eq!(protocol(true, true), "grpcs");
    }

    fn ssl_server(hostname: &str, port: i32) -> VirtualServer {
        VirtualServer {
            hostname: hostname.into(),
            port,
            ssl: Some(SslConfig {
                key_pair_id: SslKeyPairId("ssl_keypair_test_secret".into()),
            }),
            path_rules: vec![path_rule("/", PathType::Prefix, vec![match_rule(Match::default())])],
            ..Default::default()
        }
    }

    #[test]
    fn test_create_servers() {
        let conf = Configuration {
            http_servers: vec![
                VirtualServer {
                    is_default: true,
                    port: 80,
                    ..Default::default()
                },
                virtual_server(vec![path_rule(
                    "/",
                    PathType::Prefix,
                    vec![match_rule(header_match())],
                )]),
            ],
            ssl_servers: vec![
                VirtualServer {
                    is_default: true,
                    port: 443,
                    ..Default::default()
                },
                ssl_server("cafe.example.com", 443),
                ssl_server("cafe.example.com", 8443),
            ],
            tls_passthrough_servers: vec![Layer4VirtualServer {
                hostname: "app.example.com".into(),
                port: 443,
                ..Default::default()
            }],
            base_http_config: dataplane::BaseHttpConfig {
                rewrite_client_ip: RewriteClientIpSettings {
                    mode: Some(RewriteIpMode::XForwardedFor),
                    trusted_addresses: vec!["10.0.0.0/8".into()],
                    ip_recursive: true,
                },
                ..Default::default()
            },
            ..Default::default()
        };

        let (servers, match_pairs) =
            create_servers(&conf, &Recording, &UpstreamMap::new(&[])).unwrap();
        assert_eq!(servers.len(), 5);

        assert!(servers[0].is_default_http);
        assert!(servers[0].locations.is_empty());
        assert_eq!(servers[0].real_ip.len(), 3);

        assert_eq!(
            servers[1].includes.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            vec!["/etc/nginx/includes/server-cafe.example.com.conf"]
        );
        assert_eq!(
            servers[1].locations[0].includes[0].name,
            "/etc/nginx/includes/location-redirect.conf"
        );
        assert_eq!(servers[1].locations[1].includes[0].name, "/etc/nginx/includes/internal.conf");
        assert!(match_pairs.contains_key("1_0"));

        assert!(servers[2].is_default_ssl);
        assert_eq!(servers[2].listen, "unix:/var/run/nginx/https443.sock");
        assert!(servers[2].is_socket);
        assert!(servers[2].real_ip.is_empty());

        let ssl = servers[3].ssl.as_ref().unwrap();
        assert_eq!(ssl.certificate, "/etc/nginx/secrets/ssl_keypair_test_secret.pem");
        assert_eq!(ssl.certificate_key, ssl.certificate);
        assert!(servers[3].is_socket);

        assert_eq!(servers[4].listen, "8443");
        assert!(!servers[4].is_socket);
        assert_eq!(
            servers[4].locations[0].includes[0].name,
            "/etc/nginx/includes/location-ext.conf"
        );
    }

    #[test]
    fn test_ssl_server_without_key_pair() {
        let mut server = ssl_server("cafe.example.com", 443);
        server.ssl = None;
        let conf = Configuration {
            ssl_servers: vec![server],
            ..Default::default()
        };

        let err = create_servers(&conf, &NoPolicies, &UpstreamMap::new(&[])).unwrap_err();
        assert!(matches!(err, GenerateError::ContractViolation(_)));
    }

    #[test]
    fn test_server_snippets_follow_policies() {
        let mut server = virtual_server(vec![path_rule(
            "/",
            PathType::Prefix,
            vec![match_rule(Match::default())],
        )]);
        server.policies = vec![Policy::ClientSettings(ClientSettingsPolicy::default())];
        server.path_rules[0].match_rules[0].filters.snippets_filters = vec![SnippetsFilter {
            location_snippet: None,
            server_snippet: Some(Snippet {
                name: "srv".into(),
                contents: "keepalive_time 1s;".into(),
            }),
        }];

        let (result, _) =
            create_server(&server, "0", false, &Recording, &UpstreamMap::new(&[])).unwrap();
        let names: Vec<_> = result.includes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "/etc/nginx/includes/server-cafe.example.com.conf",
                "/etc/nginx/includes/srv.conf"
            ]
        );
    }

    #[test]
    fn test_execute_servers() {
        let mut rule = match_rule(Match::default());
        rule.filters.response_header_modifiers = Some(HttpHeaderFilter {
            add: vec![],
            set: vec![HttpHeader {
                name: "X-Set".into(),
                value: "v".into(),
            }],
            remove: vec!["Server".into()],
        });
        let mut grpc_rule =
            path_rule("/grpc/", PathType::Prefix, vec![match_rule(Match::default())]);
        grpc_rule.grpc = true;

        let conf = Configuration {
            http_servers: vec![
                VirtualServer {
                    is_default: true,
                    port: 80,
                    ..Default::default()
                },
                virtual_server(vec![path_rule("/", PathType::Prefix, vec![rule]), grpc_rule]),
            ],
            ..Default::default()
        };

        let results = execute_servers(&conf, &Recording, &UpstreamMap::new(&[]), true).unwrap();
        let dests: Vec<_> = results.iter().map(|r| r.dest.as_str()).collect();
        assert_eq!(
            dests,
            vec![
                "/etc/nginx/includes/server-cafe.example.com.conf",
                "/etc/nginx/includes/location-ext.conf",
                HTTP_CONFIG_FILE,
                HTTP_MATCH_VARS_FILE,
            ]
        );
        assert_eq!(results[3].data, b"{}");

        let conf_text = String::from_utf8(results[2].data.clone()).unwrap();
        assert!(conf_text.starts_with(
            "js_preload_object matches from /etc/nginx/conf.d/matches.json;\n"
        ));
        assert!(conf_text.contains(
            "server {\n    listen 80 default_server;\n    listen [::]:80 default_server;\n    default_type text/html;\n    return 404;\n}"
        ));
        assert!(conf_text.contains(
            "    server_name cafe.example.com;\n    status_zone cafe.example.com;\n"
        ));
        assert!(conf_text.contains("        proxy_set_header Host \"$gw_api_compliant_host\";\n"));
        assert!(conf_text.contains("        proxy_pass http://test_foo_80$request_uri;\n"));
        assert!(conf_text.contains(
            "        proxy_hide_header X-Set;\n        add_header X-Set \"v\" always;\n"
        ));
        assert!(conf_text.contains("        proxy_hide_header Server;\n"));
        assert!(conf_text.contains("        include /etc/nginx/grpc-error-pages.conf;\n"));
        assert!(conf_text.contains("        grpc_pass grpc://test_foo_80;\n"));
        assert!(conf_text.contains("    include /etc/nginx/grpc-error-locations.conf;\n"));
        assert!(conf_text.contains("listen unix:/var/run/nginx/nginx-502-server.sock;"));
        assert!(conf_text.contains("listen unix:/var/run/nginx/nginx-500-server.sock;"));
    }

    #[test]
    fn test_render_ssl_and_internal() {
        let conf = Configuration {
            ssl_servers: vec![
                VirtualServer {
                    is_default: true,
                    port: 443,
                    ..Default::default()
                },
                {
                    let mut server = ssl_server("cafe.example.com", 443);
                    server.path_rules[0].match_rules[0].matches = header_match();
                    server
                },
            ],
            base_http_config: dataplane::BaseHttpConfig {
                ip_family: dataplane::IpFamily::Ipv4,
                rewrite_client_ip: RewriteClientIpSettings {
                    mode: Some(RewriteIpMode::ProxyProtocol),
                    trusted_addresses: vec!["10.0.0.0/8".into()],
                    ip_recursive: false,
                },
                ..Default::default()
            },
            ..Default::default()
        };

        let results = execute_servers(&conf, &NoPolicies, &UpstreamMap::new(&[]), false).unwrap();
        let conf_text = String::from_utf8(results[0].data.clone()).unwrap();

        assert!(conf_text.contains(
            "server {\n    listen 443 ssl default_server proxy_protocol;\n    ssl_reject_handshake on;\n    set_real_ip_from 10.0.0.0/8;\n    real_ip_header proxy_protocol;\n}"
        ));
        assert!(conf_text.contains("    listen 443 ssl proxy_protocol;\n"));
        assert!(conf_text.contains(
            "    ssl_certificate /etc/nginx/secrets/ssl_keypair_test_secret.pem;\n"
        ));
        assert!(
            conf_text.contains("    if ($ssl_server_name != $host) {\n        return 421;\n    }\n")
        );
        assert!(!conf_text.contains("[::]"));
        assert!(!conf_text.contains("status_zone"));
        assert!(conf_text.contains(
            "    location / {\n        set $match_key SSL_1_0;\n        js_content httpmatches.redirect;\n        proxy_http_version 1.1;\n    }\n"
        ));
        assert!(
            conf_text.contains("    location /_ngf-internal-rule0-route0 {\n        internal;\n")
        );

        let match_conf = String::from_utf8(results[1].data.clone()).unwrap();
        assert_eq!(
            match_conf,
            r#"{"SSL_1_0":[{"redirectPath":"/_ngf-internal-rule0-route0","headers":["Version:v1"]}]}"#
        );
    }
}
