use crate::directory::EndpointDirectory;
use crate::errors::{ResolveError, Result};
use crate::types::{AddressType, Endpoint, EndpointPort, EndpointSlice, ServicePort};
use indexmap::IndexSet;
use shared::types::NamespacedName;

/// Resolves a service and service port to the list of endpoints backing it.
pub trait ServiceResolver: Send + Sync {
    fn resolve(
        &self,
        service: &NamespacedName,
        port: &ServicePort,
        allowed: &[AddressType],
    ) -> Result<Vec<Endpoint>>;
}

pub struct ServiceResolverImpl<D> {
    directory: D,
}

impl<D: EndpointDirectory> ServiceResolverImpl<D> {
    pub fn new(directory: D) -> Self {
        ServiceResolverImpl { directory }
    }
}

impl<D: EndpointDirectory> ServiceResolver for ServiceResolverImpl<D> {
    fn resolve(
        &self,
        service: &NamespacedName,
        port: &ServicePort,
        allowed: &[AddressType],
    ) -> Result<Vec<Endpoint>> {
        if port.port == 0 || service.name.is_empty() || service.namespace.is_empty() {
            return Err(ResolveError::ContractViolation {
                name: service.name.clone(),
                namespace: service.namespace.clone(),
                port: port.port,
            });
        }

        let slices = match self.directory.list(service) {
            Ok(slices) if !slices.is_empty() => slices,
            Ok(_) => return Err(ResolveError::NoEndpoints(service.clone())),
            Err(e) => {
                tracing::warn!(service = %service, error = %e, "failed to list endpoint slices");
                return Err(ResolveError::NoEndpoints(service.clone()));
            }
        };

        resolve_endpoints(service, port, &slices, allowed)
    }
}

fn resolve_endpoints(
    service: &NamespacedName,
    port: &ServicePort,
    slices: &[EndpointSlice],
    allowed: &[AddressType],
) -> Result<Vec<Endpoint>> {
    let filtered: Vec<&EndpointSlice> = slices
        .iter()
        .filter(|slice| !ignore_slice(slice, port, allowed))
        .collect();

    if filtered.is_empty() {
        return Err(ResolveError::NoValidEndpoints {
            service: service.clone(),
            port: port.port,
        });
    }

    // The same endpoint can be reported by more than one slice.
    let mut endpoints = IndexSet::new();

    for slice in filtered {
        let ipv6 = slice.address_type == AddressType::IPv6;
        // Non-zero, the slice would have been ignored otherwise.
        let endpoint_port = find_port(&slice.ports, port);

        for endpoint in slice.endpoints.iter().filter(|e| e.is_ready()) {
            for address in &endpoint.addresses {
                endpoints.insert(Endpoint {
                    address: address.clone(),
                    port: endpoint_port,
                    ipv6,
                });
            }
        }
    }

    tracing::debug!(service = %service, count = endpoints.len(), "resolved endpoints");

    Ok(endpoints.into_iter().collect())
}

fn ignore_slice(slice: &EndpointSlice, port: &ServicePort, allowed: &[AddressType]) -> bool {
    if slice.address_type == AddressType::Fqdn {
        return true;
    }

    if !allowed.contains(&slice.address_type) {
        return true;
    }

    find_port(&slice.ports, port) == 0
}

/// Finds the slice port matching the service port by name. Unnamed ports match
/// an unnamed service port. A port entry without a number matches anything and
/// yields the service's default port. Returns 0 when nothing matches.
fn find_port(ports: &[EndpointPort], service_port: &ServicePort) -> i32 {
    for p in ports {
        let Some(number) = p.port else {
            return service_port.default_port();
        };

        if p.name.as_deref().unwrap_or_default() == service_port.name {
            return number;
        }
    }

    0
}
