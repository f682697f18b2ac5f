//! Upstream settings policies do not produce include files. Their fields are
//! folded into the upstream block of every service they target.

use crate::http::UpstreamKeepAlive;
use dataplane::policies::Policy;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpstreamSettings {
    pub zone_size: Option<String>,
    pub keep_alive: UpstreamKeepAlive,
}

/// Merges every upstream settings policy in order. A field set by a later
/// policy overrides the same field of an earlier one.
pub fn process(policies: &[Policy]) -> UpstreamSettings {
    let mut settings = UpstreamSettings::default();

    for policy in policies {
        let Policy::UpstreamSettings(usp) = policy else {
            continue;
        };

        if let Some(zone_size) = &usp.zone_size {
            settings.zone_size = Some(zone_size.clone());
        }

        let Some(keep_alive) = &usp.keep_alive else {
            continue;
        };
        if let Some(connections) = keep_alive.connections {
            settings.keep_alive.connections = Some(connections);
        }
        if let Some(requests) = keep_alive.requests {
            settings.keep_alive.requests = Some(requests);
        }
        if let Some(time) = &keep_alive.time {
            settings.keep_alive.time = Some(time.clone());
        }
        if let Some(timeout) = &keep_alive.timeout {
            settings.keep_alive.timeout = Some(timeout.clone());
        }
    }

    settings
}
