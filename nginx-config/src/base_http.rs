use crate::errors::Result;
use crate::generator::{ExecuteResult, HTTP_CONFIG_FILE};
use crate::includes::{self, Include};
use crate::templates::{self, Template};
use dataplane::Configuration;
use serde::Serialize;

pub(crate) const BASE_HTTP_TEMPLATE: Template = Template {
    name: "base_http.conf",
    source: r#"{% if http2 %}
http2 on;

{% endif %}
{% for include in includes %}
include {{ include.name }};
{% endfor %}
"#,
};

#[derive(Serialize)]
struct BaseHttpConfig<'a> {
    http2: bool,
    includes: &'a [Include],
}

pub(crate) fn execute_base_http_config(conf: &Configuration) -> Result<Vec<ExecuteResult>> {
    let includes = includes::from_snippets(&conf.base_http_config.snippets);

    let base = BaseHttpConfig {
        http2: conf.base_http_config.http2,
        includes: &includes,
    };

    let mut results = vec![ExecuteResult::new(
        HTTP_CONFIG_FILE,
        templates::render(&BASE_HTTP_TEMPLATE, &base)?,
    )];
    results.extend(includes::execute_results(&includes));

    Ok(results)
}
