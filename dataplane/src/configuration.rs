use crate::convert::{
    CONTEXT_HTTP, CONTEXT_MAIN, build_snippets_for_context, convert_match, convert_path_type,
    create_http_filters, get_path,
};
use crate::errors::{BuildError, Result};
use crate::graph::{
    BackendRef, BackendTlsPolicy, Gateway, Graph, GraphPolicy, L4Route, L7Route, Listener,
    ListenerProtocol, RouteKey, RouteType,
};
use crate::hostname::listener_hostname_more_specific;
use crate::policies::{Policy, ratio_variable_name};
use crate::sort::sort_match_rules;
use crate::types::{
    Backend, BackendGroup, BaseHttpConfig, CertBundle, CertBundleId, Configuration, HttpFilters,
    IpFamily, Layer4VirtualServer, Logging, MatchRule, PathRule, PathType, ROOT_CA_PATH, Ratio,
    Ssl, SslKeyPair, SslKeyPairId, Telemetry, Upstream, VerifyTls, VirtualServer,
    WILDCARD_HOSTNAME,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use resolver::{AddressType, ServiceResolver};
use shared::types::NamespacedName;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Builds the data plane configuration from the graph.
///
/// Without a valid gateway class and a gateway, the default configuration is
/// returned. Backends whose endpoints cannot be resolved still get an upstream,
/// with the failure recorded in its `error_msg`.
pub fn build_configuration(
    graph: &Graph,
    service_resolver: &dyn ServiceResolver,
    version: u64,
) -> Result<Configuration> {
    let class_valid = graph.gateway_class.as_ref().is_some_and(|gc| gc.valid);
    let Some(gateway) = graph.gateway.as_ref().filter(|_| class_valid) else {
        return Ok(default_configuration(version));
    };

    let base_http_config = build_base_http_config(graph);
    let allowed = allowed_address_types(base_http_config.ip_family);

    let (http_servers, ssl_servers) = build_servers(graph, gateway)?;
    let backend_groups = build_backend_groups(http_servers.iter().chain(&ssl_servers));

    let upstreams = build_upstreams(graph, &gateway.listeners, service_resolver, &allowed)?;
    let stream_upstreams =
        build_stream_upstreams(graph, &gateway.listeners, service_resolver, &allowed)?;

    tracing::debug!(
        http_servers = http_servers.len(),
        ssl_servers = ssl_servers.len(),
        upstreams = upstreams.len(),
        stream_upstreams = stream_upstreams.len(),
        "built configuration"
    );

    Ok(Configuration {
        ssl_key_pairs: build_ssl_key_pairs(graph, &gateway.listeners)?,
        cert_bundles: build_cert_bundles(graph, &backend_groups),
        tls_passthrough_servers: build_passthrough_servers(graph, &gateway.listeners)?,
        http_servers,
        ssl_servers,
        upstreams,
        stream_upstreams,
        backend_groups,
        main_snippets: build_snippets_for_context(graph, CONTEXT_MAIN),
        telemetry: build_telemetry(graph, gateway),
        base_http_config,
        logging: build_logging(graph),
        auxiliary_secrets: graph.auxiliary_secrets.clone(),
        deployment_context: graph.deployment_context.clone(),
        version,
    })
}

pub fn default_configuration(version: u64) -> Configuration {
    Configuration {
        version,
        logging: Logging::default(),
        ..Default::default()
    }
}

/// Endpoint address families nginx can reach for an IP family.
pub fn allowed_address_types(ip_family: IpFamily) -> Vec<AddressType> {
    match ip_family {
        IpFamily::Ipv4 => vec![AddressType::IPv4],
        IpFamily::Ipv6 => vec![AddressType::IPv6],
        IpFamily::Dual => vec![AddressType::IPv4, AddressType::IPv6],
    }
}

fn lookup_route<'g>(graph: &'g Graph, key: &RouteKey) -> Result<&'g L7Route> {
    graph.route(key).ok_or_else(|| {
        BuildError::ContractViolation(format!(
            "route {}/{} attached to a listener is missing",
            key.namespace, key.name
        ))
    })
}

fn lookup_l4_route<'g>(graph: &'g Graph, key: &RouteKey) -> Result<&'g L4Route> {
    graph.l4_route(key).ok_or_else(|| {
        BuildError::ContractViolation(format!(
            "TLS route {}/{} attached to a listener is missing",
            key.namespace, key.name
        ))
    })
}

fn build_servers(
    graph: &Graph,
    gateway: &Gateway,
) -> Result<(Vec<VirtualServer>, Vec<VirtualServer>)> {
    let mut http_rules: BTreeMap<i32, HostPathRules<'_>> = BTreeMap::new();
    let mut ssl_rules: BTreeMap<i32, HostPathRules<'_>> = BTreeMap::new();

    for l in &gateway.listeners {
        let rules = match l.protocol {
            ListenerProtocol::Http => &mut http_rules,
            ListenerProtocol::Https => &mut ssl_rules,
            // Passthrough, handled by the stream servers.
            ListenerProtocol::Tls => continue,
        };

        if l.valid {
            rules.entry(l.port).or_default().upsert_listener(l, graph)?;
        }
    }

    let policies = build_policies(&gateway.policies);

    let mut http_servers = build_port_servers(http_rules)?;
    let mut ssl_servers = build_port_servers(ssl_rules)?;

    for server in http_servers.iter_mut().chain(ssl_servers.iter_mut()) {
        server.policies = policies.clone();
    }

    Ok((http_servers, ssl_servers))
}

fn build_port_servers(rules: BTreeMap<i32, HostPathRules<'_>>) -> Result<Vec<VirtualServer>> {
    let mut servers = Vec::new();
    for rules in rules.into_values() {
        servers.extend(rules.build_servers()?);
    }
    Ok(servers)
}

/// Routing state of one (protocol, port) pair.
#[derive(Default)]
struct HostPathRules<'a> {
    rules_per_host: IndexMap<String, IndexMap<(String, PathType), PathRule>>,
    listeners_for_host: HashMap<String, &'a Listener>,
    https_listeners: Vec<&'a Listener>,
    port: i32,
    listeners_exist: bool,
}

impl<'a> HostPathRules<'a> {
    fn upsert_listener(&mut self, l: &'a Listener, graph: &Graph) -> Result<()> {
        self.listeners_exist = true;
        self.port = l.port;

        if l.protocol == ListenerProtocol::Https {
            self.https_listeners.push(l);
        }

        for key in &l.routes {
            let route = lookup_route(graph, key)?;
            if !route.valid {
                continue;
            }

            self.upsert_route(route, l, graph)?;
        }

        Ok(())
    }

    fn upsert_route(
        &mut self,
        route: &L7Route,
        listener: &'a Listener,
        graph: &Graph,
    ) -> Result<()> {
        let grpc = route.route_type == RouteType::Grpc;
        let hostnames = route
            .accepted_hostnames
            .get(&listener.name)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for h in hostnames {
            let replace = match self.listeners_for_host.get(h) {
                Some(prev) => listener_hostname_more_specific(
                    listener.hostname.as_deref(),
                    prev.hostname.as_deref(),
                ),
                None => true,
            };
            if replace {
                self.listeners_for_host.insert(h.clone(), listener);
            }

            self.rules_per_host.entry(h.clone()).or_default();
        }

        let route_nsname = route.source.namespaced_name();
        let policies = build_policies(&route.policies);

        for (idx, rule) in route.rules.iter().enumerate() {
            if !rule.valid_matches {
                continue;
            }

            let filters = if rule.valid_filters {
                create_http_filters(&rule.filters, graph)?
            } else {
                HttpFilters::invalid()
            };

            for h in hostnames {
                for m in &rule.matches {
                    let path = get_path(m.path.as_ref());
                    let path_type = convert_path_type(m.path.as_ref())?;

                    let host_rules = self.rules_per_host.entry(h.clone()).or_default();
                    let host_rule = host_rules
                        .entry((path.clone(), path_type))
                        .or_insert_with(|| PathRule {
                            path,
                            path_type,
                            ..Default::default()
                        });

                    host_rule.grpc = grpc;
                    for policy in &policies {
                        if !host_rule.policies.contains(policy) {
                            host_rule.policies.push(policy.clone());
                        }
                    }

                    host_rule.match_rules.push(MatchRule {
                        filters: filters.clone(),
                        source: route.source.clone(),
                        matches: convert_match(m),
                        backend_group: new_backend_group(&rule.backend_refs, &route_nsname, idx),
                    });
                }
            }
        }

        Ok(())
    }

    fn build_servers(self) -> Result<Vec<VirtualServer>> {
        let HostPathRules {
            rules_per_host,
            listeners_for_host,
            https_listeners,
            port,
            listeners_exist,
        } = self;

        let mut servers = Vec::with_capacity(rules_per_host.len() + https_listeners.len() + 1);

        for (hostname, rules) in rules_per_host {
            let listener = listeners_for_host.get(&hostname).ok_or_else(|| {
                BuildError::ContractViolation(format!("no listener found for hostname: {hostname}"))
            })?;

            let mut path_rules: Vec<PathRule> = rules
                .into_values()
                .map(|mut rule| {
                    sort_match_rules(&mut rule.match_rules);
                    rule
                })
                .collect();

            // Keeps the output stable across reconfigurations.
            path_rules.sort_by(|a, b| {
                a.path
                    .cmp(&b.path)
                    .then_with(|| a.path_type.cmp(&b.path_type))
            });

            servers.push(VirtualServer {
                ssl: listener_ssl(listener),
                hostname,
                path_rules,
                port,
                ..Default::default()
            });
        }

        // A listener with no routes or a match-all hostname gets its own server
        // so it overrides the default ssl server.
        for l in https_listeners {
            let hostname = listener_hostname(l);
            if l.routes.is_empty() || hostname == WILDCARD_HOSTNAME {
                servers.push(VirtualServer {
                    ssl: listener_ssl(l),
                    hostname,
                    port,
                    ..Default::default()
                });
            }
        }

        if listeners_exist {
            servers.push(VirtualServer {
                is_default: true,
                port,
                ..Default::default()
            });
        }

        servers.sort_by(|a, b| a.hostname.cmp(&b.hostname));

        Ok(servers)
    }
}

fn listener_hostname(l: &Listener) -> String {
    match l.hostname.as_deref() {
        None | Some("") => WILDCARD_HOSTNAME.to_string(),
        Some(h) => h.to_string(),
    }
}

fn listener_ssl(l: &Listener) -> Option<Ssl> {
    l.resolved_secret.as_ref().map(|secret| Ssl {
        key_pair_id: SslKeyPairId::for_secret(secret),
    })
}

fn build_policies(policies: &[GraphPolicy]) -> Vec<Policy> {
    policies
        .iter()
        .filter(|p| p.valid)
        .map(|p| p.source.clone())
        .collect()
}

/// A route attached to several listeners yields the same group several times.
fn build_backend_groups<'a>(servers: impl Iterator<Item = &'a VirtualServer>) -> Vec<BackendGroup> {
    let mut unique: IndexMap<(NamespacedName, usize), BackendGroup> = IndexMap::new();

    for server in servers {
        for rule in &server.path_rules {
            for mr in &rule.match_rules {
                let group = &mr.backend_group;
                unique
                    .entry((group.source.clone(), group.rule_idx))
                    .or_insert_with(|| group.clone());
            }
        }
    }

    unique.into_values().collect()
}

fn new_backend_group(
    refs: &[BackendRef],
    source: &NamespacedName,
    rule_idx: usize,
) -> BackendGroup {
    BackendGroup {
        source: source.clone(),
        backends: refs
            .iter()
            .map(|r| Backend {
                verify_tls: convert_backend_tls(r.backend_tls_policy.as_ref()),
                upstream_name: r.service_port_reference(),
                weight: r.weight,
                valid: r.valid,
            })
            .collect(),
        rule_idx,
    }
}

fn convert_backend_tls(policy: Option<&BackendTlsPolicy>) -> Option<VerifyTls> {
    let policy = policy.filter(|p| p.valid)?;

    let (cert_bundle_id, root_ca_path) = match &policy.ca_cert_ref {
        Some(ca) if !ca.name.is_empty() => (Some(CertBundleId::for_config_map(ca)), None),
        _ => (None, Some(ROOT_CA_PATH.to_string())),
    };

    Some(VerifyTls {
        cert_bundle_id,
        hostname: policy.hostname.clone(),
        root_ca_path,
    })
}

fn resolve_upstream(
    br: &BackendRef,
    name: String,
    service_resolver: &dyn ServiceResolver,
    allowed: &[AddressType],
    policies: Vec<Policy>,
) -> Result<Upstream> {
    let resolved = service_resolver.resolve(&br.svc, &br.service_port, allowed);
    let (endpoints, error_msg) = match resolved {
        Ok(endpoints) => (endpoints, String::new()),
        Err(e) if e.is_contract_violation() => {
            return Err(BuildError::ContractViolation(e.to_string()));
        }
        Err(e) => {
            tracing::warn!(upstream = %name, error = %e, "failed to resolve endpoints");
            (Vec::new(), e.to_string())
        }
    };

    Ok(Upstream {
        name,
        error_msg,
        endpoints,
        policies,
    })
}

fn build_upstreams(
    graph: &Graph,
    listeners: &[Listener],
    service_resolver: &dyn ServiceResolver,
    allowed: &[AddressType],
) -> Result<Vec<Upstream>> {
    // Several routes can share a backend.
    let mut unique: BTreeMap<String, Upstream> = BTreeMap::new();

    for l in listeners.iter().filter(|l| l.valid) {
        for key in &l.routes {
            let route = lookup_route(graph, key)?;
            if !route.valid {
                continue;
            }

            for rule in &route.rules {
                if !rule.valid_matches || !rule.valid_filters {
                    continue;
                }

                for br in rule.backend_refs.iter().filter(|br| br.valid) {
                    let name = br.service_port_reference();
                    if unique.contains_key(&name) {
                        continue;
                    }

                    let policies = build_policies(graph.service_policies(&br.svc));
                    let upstream =
                        resolve_upstream(br, name.clone(), service_resolver, allowed, policies)?;
                    unique.insert(name, upstream);
                }
            }
        }
    }

    Ok(unique.into_values().collect())
}

fn build_stream_upstreams(
    graph: &Graph,
    listeners: &[Listener],
    service_resolver: &dyn ServiceResolver,
    allowed: &[AddressType],
) -> Result<Vec<Upstream>> {
    let mut unique: BTreeMap<String, Upstream> = BTreeMap::new();

    for l in listeners
        .iter()
        .filter(|l| l.valid && l.protocol == ListenerProtocol::Tls)
    {
        for key in &l.l4_routes {
            let route = lookup_l4_route(graph, key)?;
            let br = &route.backend_ref;
            if !route.valid || !br.valid {
                continue;
            }

            let name = br.service_port_reference();
            if unique.contains_key(&name) {
                continue;
            }

            let upstream =
                resolve_upstream(br, name.clone(), service_resolver, allowed, Vec::new())?;
            unique.insert(name, upstream);
        }
    }

    Ok(unique.into_values().collect())
}

/// Only secrets referenced by valid listeners are shipped to the data plane.
fn build_ssl_key_pairs(
    graph: &Graph,
    listeners: &[Listener],
) -> Result<BTreeMap<SslKeyPairId, SslKeyPair>> {
    let mut key_pairs = BTreeMap::new();

    for l in listeners.iter().filter(|l| l.valid) {
        let Some(secret_ref) = &l.resolved_secret else {
            continue;
        };

        let secret = graph.secret(secret_ref).ok_or_else(|| {
            BuildError::ContractViolation(format!(
                "secret {secret_ref} of listener {} is not referenced",
                l.name
            ))
        })?;

        key_pairs.insert(
            SslKeyPairId::for_secret(secret_ref),
            SslKeyPair {
                cert: secret.cert.as_bytes().to_vec(),
                key: secret.key.as_bytes().to_vec(),
            },
        );
    }

    Ok(key_pairs)
}

/// Only bundles referenced by a valid backend are kept. The CA data can be
/// base64 encoded or plain PEM.
fn build_cert_bundles(
    graph: &Graph,
    backend_groups: &[BackendGroup],
) -> BTreeMap<CertBundleId, CertBundle> {
    let referenced: HashSet<&CertBundleId> = backend_groups
        .iter()
        .flat_map(|g| &g.backends)
        .filter(|b| b.valid)
        .filter_map(|b| b.verify_tls.as_ref()?.cert_bundle_id.as_ref())
        .collect();

    let mut bundles = BTreeMap::new();
    if referenced.is_empty() {
        return bundles;
    }

    for cm in &graph.ca_cert_bundles {
        let id = CertBundleId::for_config_map(&NamespacedName::new(&cm.namespace, &cm.name));
        if !referenced.contains(&id) || cm.ca_cert.is_empty() {
            continue;
        }

        let data = STANDARD
            .decode(cm.ca_cert.trim())
            .unwrap_or_else(|_| cm.ca_cert.as_bytes().to_vec());
        bundles.insert(id, data);
    }

    bundles
}

fn build_passthrough_servers(
    graph: &Graph,
    listeners: &[Listener],
) -> Result<Vec<Layer4VirtualServer>> {
    let mut route_servers: IndexMap<&RouteKey, Vec<Layer4VirtualServer>> = IndexMap::new();
    let mut listener_servers = Vec::new();

    for l in listeners
        .iter()
        .filter(|l| l.valid && l.protocol == ListenerProtocol::Tls)
    {
        let mut found_listener_hostname = false;

        for key in &l.l4_routes {
            let route = lookup_l4_route(graph, key)?;
            if !route.valid {
                continue;
            }

            let hostnames = route
                .accepted_hostnames
                .get(&l.name)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let servers = route_servers.entry(key).or_default();
            for h in hostnames {
                if l.hostname.as_deref() == Some(h.as_str()) {
                    found_listener_hostname = true;
                }

                servers.push(Layer4VirtualServer {
                    hostname: h.clone(),
                    upstream_name: route.backend_ref.service_port_reference(),
                    port: l.port,
                    is_default: false,
                });
            }
        }

        if !found_listener_hostname {
            listener_servers.push(match &l.hostname {
                Some(hostname) => Layer4VirtualServer {
                    hostname: hostname.clone(),
                    upstream_name: String::new(),
                    port: l.port,
                    is_default: true,
                },
                None => Layer4VirtualServer {
                    port: l.port,
                    ..Default::default()
                },
            });
        }
    }

    Ok(route_servers
        .into_values()
        .flatten()
        .chain(listener_servers)
        .collect())
}

fn build_telemetry(graph: &Graph, gateway: &Gateway) -> Telemetry {
    let Some(settings) = graph
        .proxy_settings
        .as_ref()
        .filter(|p| p.valid)
        .and_then(|p| p.telemetry.as_ref())
    else {
        return Telemetry::default();
    };
    let Some(exporter) = &settings.exporter else {
        return Telemetry::default();
    };

    let mut service_name = format!("ngf:{}:{}", gateway.source.namespace, gateway.source.name);
    if let Some(custom) = &settings.service_name {
        service_name.push(':');
        service_name.push_str(custom);
    }

    // Sampling ratios are declared once in the http context no matter how many
    // policies use them.
    let mut ratios = BTreeMap::new();
    for policy in &graph.policies {
        let Policy::Observability(obs) = &policy.source else {
            continue;
        };
        if let Some(ratio) = obs.tracing.as_ref().and_then(|t| t.ratio).filter(|r| *r > 0) {
            ratios.insert(ratio_variable_name(ratio), ratio);
        }
    }

    Telemetry {
        endpoint: exporter.endpoint.clone(),
        service_name,
        interval: exporter.interval.clone().unwrap_or_default(),
        ratios: ratios
            .into_iter()
            .map(|(name, value)| Ratio { name, value })
            .collect(),
        span_attributes: settings.span_attributes.clone(),
        batch_size: exporter.batch_size.unwrap_or_default(),
        batch_count: exporter.batch_count.unwrap_or_default(),
    }
}

fn build_base_http_config(graph: &Graph) -> BaseHttpConfig {
    let mut config = BaseHttpConfig {
        snippets: build_snippets_for_context(graph, CONTEXT_HTTP),
        ..Default::default()
    };

    let Some(settings) = graph.proxy_settings.as_ref().filter(|p| p.valid) else {
        return config;
    };

    if settings.disable_http2 {
        config.http2 = false;
    }

    if let Some(ip_family) = settings.ip_family {
        config.ip_family = ip_family;
    }

    if let Some(rewrite) = &settings.rewrite_client_ip {
        config.rewrite_client_ip.mode = rewrite.mode;
        config.rewrite_client_ip.trusted_addresses = rewrite.trusted_addresses.clone();
        config.rewrite_client_ip.ip_recursive = rewrite.set_ip_recursively.unwrap_or_default();
    }

    config
}

fn build_logging(graph: &Graph) -> Logging {
    let error_level = graph
        .proxy_settings
        .as_ref()
        .and_then(|p| p.logging.as_ref())
        .and_then(|l| l.error_level.clone());

    match error_level {
        Some(error_level) => Logging { error_level },
        None => Logging::default(),
    }
}
