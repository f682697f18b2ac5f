use crate::errors::Result;
use crate::generator::{ExecuteResult, HTTP_CONFIG_FILE};
use crate::templates::{self, Template};
use dataplane::policies::SpanAttribute;
use dataplane::{Configuration, Ratio};
use serde::Serialize;

pub(crate) const TELEMETRY_TEMPLATE: Template = Template {
    name: "telemetry.conf",
    source: r#"otel_exporter {
    endpoint {{ endpoint }};
{% if interval %}
    interval {{ interval }};
{% endif %}
{% if batch_size %}
    batch_size {{ batch_size }};
{% endif %}
{% if batch_count %}
    batch_count {{ batch_count }};
{% endif %}
}

otel_service_name {{ service_name }};
{% for attr in span_attributes %}
otel_span_attr "{{ attr.key }}" "{{ attr.value }}";
{% endfor %}
{% for ratio in ratios %}

split_clients $otel_trace_id {{ ratio.name }} {
    {{ ratio.value }}% on;
    * off;
}
{% endfor %}
"#,
};

#[derive(Serialize)]
struct TelemetryContext<'a> {
    endpoint: &'a str,
    interval: &'a str,
    batch_size: i32,
    batch_count: i32,
    service_name: &'a str,
    span_attributes: &'a [SpanAttribute],
    ratios: &'a [Ratio],
}

/// Nothing is rendered unless an exporter endpoint is configured.
pub(crate) fn execute_telemetry(conf: &Configuration) -> Result<Vec<ExecuteResult>> {
    let telemetry = &conf.telemetry;
    if !telemetry.enabled() {
        return Ok(Vec::new());
    }

    let ctx = TelemetryContext {
        endpoint: &telemetry.endpoint,
        interval: &telemetry.interval,
        batch_size: telemetry.batch_size,
        batch_count: telemetry.batch_count,
        service_name: &telemetry.service_name,
        span_attributes: &telemetry.span_attributes,
        ratios: &telemetry.ratios,
    };

    Ok(vec![ExecuteResult::new(
        HTTP_CONFIG_FILE,
        templates::render(&TELEMETRY_TEMPLATE, &ctx)?,
    )])
}
