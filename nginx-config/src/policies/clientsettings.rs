//! Client request limits and keepalive, applied wherever the policy is attached.

use super::{PolicyFile, PolicyGenerator};
use crate::errors::Result;
use crate::http::{Location, Server};
use crate::templates::{self, Template};
use dataplane::policies::Policy;

pub(crate) const CLIENT_SETTINGS_TEMPLATE: Template = Template {
    name: "client_settings.conf",
    source: r#"{% if body %}
{% if body.max_size %}
client_max_body_size {{ body.max_size }};
{% endif %}
{% if body.timeout %}
client_body_timeout {{ body.timeout }};
{% endif %}
{% endif %}
{% if keep_alive %}
{% if keep_alive.requests %}
keepalive_requests {{ keep_alive.requests }};
{% endif %}
{% if keep_alive.time %}
keepalive_time {{ keep_alive.time }};
{% endif %}
{% if keep_alive.timeout and keep_alive.timeout.server %}
{% if keep_alive.timeout.header %}
keepalive_timeout {{ keep_alive.timeout.server }} {{ keep_alive.timeout.header }};
{% else %}
keepalive_timeout {{ keep_alive.timeout.server }};
{% endif %}
{% endif %}
{% endif %}
"#,
};

#[derive(Default)]
pub struct ClientSettingsGenerator;

impl ClientSettingsGenerator {
    fn generate(&self, policies: &[Policy]) -> Result<Vec<PolicyFile>> {
        policies
            .iter()
            .filter_map(|policy| match policy {
                Policy::ClientSettings(csp) => Some(csp),
                _ => None,
            })
            .map(|csp| -> Result<PolicyFile> {
                Ok(PolicyFile {
                    name: format!("ClientSettingsPolicy_{}_{}.conf", csp.namespace, csp.name),
                    content: templates::render(&CLIENT_SETTINGS_TEMPLATE, csp)?.into_bytes(),
                })
            })
            .collect()
    }
}

impl PolicyGenerator for ClientSettingsGenerator {
    fn generate_for_server(
        &self,
        policies: &[Policy],
        _server: &Server,
    ) -> Result<Vec<PolicyFile>> {
        self.generate(policies)
    }

    fn generate_for_location(
        &self,
        policies: &[Policy],
        _location: &Location,
    ) -> Result<Vec<PolicyFile>> {
        self.generate(policies)
    }

    fn generate_for_internal_location(&self, policies: &[Policy]) -> Result<Vec<PolicyFile>> {
        self.generate(policies)
    }
}
