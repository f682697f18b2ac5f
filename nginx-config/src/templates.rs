//! Every template is compiled once into a process-wide environment.
//!
//! Block tags sit on lines of their own: `trim_blocks` and `lstrip_blocks`
//! make such lines vanish from the output. Template names end in `.conf` so no
//! auto escaping applies. A template keeps its final newline, so fragments
//! appended to the same file start on a line of their own.

use crate::errors::{GenerateError, Result};
use crate::{
    base_http, main_config, maps, policies, servers, split_clients, stream_servers, telemetry,
    upstreams, version,
};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::error;

pub(crate) struct Template {
    pub name: &'static str,
    pub source: &'static str,
}

const ALL_TEMPLATES: &[&Template] = &[
    &main_config::MAIN_CONFIG_TEMPLATE,
    &main_config::MGMT_CONFIG_TEMPLATE,
    &base_http::BASE_HTTP_TEMPLATE,
    &servers::SERVERS_TEMPLATE,
    &upstreams::UPSTREAMS_TEMPLATE,
    &upstreams::STREAM_UPSTREAMS_TEMPLATE,
    &split_clients::SPLIT_CLIENTS_TEMPLATE,
    &maps::MAPS_TEMPLATE,
    &maps::STREAM_MAPS_TEMPLATE,
    &telemetry::TELEMETRY_TEMPLATE,
    &stream_servers::STREAM_SERVERS_TEMPLATE,
    &version::VERSION_TEMPLATE,
    &policies::clientsettings::CLIENT_SETTINGS_TEMPLATE,
    &policies::observability::OBSERVABILITY_TEMPLATE,
    &policies::observability::INTERNAL_TEMPLATE,
    &policies::observability::EXTERNAL_REDIRECT_TEMPLATE,
];

/// The compiled templates, plus the compile error of every template that
/// failed so rendering it reports the real cause.
struct Templates {
    env: Environment<'static>,
    broken: HashMap<&'static str, String>,
}

impl Templates {
    fn compile(templates: &[&Template]) -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        let mut broken = HashMap::new();
        for template in templates {
            if let Err(err) = env.add_template(template.name, template.source) {
                error!(template = template.name, error = %err, "Failed to compile template");
                broken.insert(template.name, err.to_string());
            }
        }

        Templates { env, broken }
    }

    fn render<S: Serialize>(&self, template: &Template, ctx: S) -> Result<String> {
        if let Some(reason) = self.broken.get(template.name) {
            return Err(GenerateError::TemplateCompile {
                name: template.name,
                reason: reason.clone(),
            });
        }

        let compiled = self.env.get_template(template.name)?;
        Ok(compiled.render(ctx)?)
    }
}

static TEMPLATES: LazyLock<Templates> = LazyLock::new(|| Templates::compile(ALL_TEMPLATES));

pub(crate) fn render<S: Serialize>(template: &Template, ctx: S) -> Result<String> {
    TEMPLATES.render(template, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_templates_compile() {
        assert!(TEMPLATES.broken.is_empty(), "broken templates: {:?}", TEMPLATES.broken);
        for template in ALL_TEMPLATES {
            assert!(
                TEMPLATES.env.get_template(template.name).is_ok(),
                "template {} failed to compile",
                template.name
            );
        }
    }

    #[test]
    fn test_compile_error_is_kept() {
        let broken = Template {
            name: "broken.conf",
            source: "{% for x in %}\n{% endfor %}\n",
        };
        let templates = Templates::compile(&[&broken]);

        match templates.render(&broken, minijinja::context! {}) {
            Err(GenerateError::TemplateCompile { name, reason }) => {
                assert_eq!(name, "broken.conf");
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_trailing_newline_is_kept() {
        let text = Template {
            name: "text.conf",
            source: "server {}\n",
        };
        let block = Template {
            name: "block.conf",
            source: "{% for x in xs %}\n{{ x }};\n{% endfor %}\n",
        };
        let templates = Templates::compile(&[&text, &block]);

        assert_eq!(templates.render(&text, minijinja::context! {}).unwrap(), "server {}\n");
        assert_eq!(
            templates.render(&block, minijinja::context! { xs => vec!["a", "b"] }).unwrap(),
            "a;\nb;\n"
        );
    }

    #[test]
    fn test_unique_names() {
        let mut names: Vec<_> = ALL_TEMPLATES.iter().map(|t| t.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ALL_TEMPLATES.len());
    }
}
