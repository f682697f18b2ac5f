//! Tracing configuration from observability policies.
//!
//! A location that proxies directly gets every directive. When a location
//! hands off to internal locations, the sampling decision stays on the
//! external location and the span naming moves to the internal ones.

use super::{PolicyFile, PolicyGenerator};
use crate::errors::Result;
use crate::http::{Location, LocationType};
use crate::templates::{self, Template};
use dataplane::Telemetry;
use dataplane::policies::{
    ObservabilityPolicy, Policy, SpanAttribute, TraceStrategy, Tracing, ratio_variable_name,
};
use serde::Serialize;

pub(crate) const OBSERVABILITY_TEMPLATE: Template = Template {
    name: "observability.conf",
    source: r#"{% if tracing %}
otel_trace {{ strategy }};
{% if tracing.context %}
otel_trace_context {{ tracing.context }};
{% endif %}
{% if tracing.span_name %}
otel_span_name "{{ tracing.span_name }}";
{% endif %}
{% for attr in tracing.span_attributes %}
otel_span_attr "{{ attr.key }}" "{{ attr.value }}";
{% endfor %}
{% for attr in global_span_attributes %}
otel_span_attr "{{ attr.key }}" "{{ attr.value }}";
{% endfor %}
{% endif %}
"#,
};

pub(crate) const INTERNAL_TEMPLATE: Template = Template {
    name: "observability_internal.conf",
    source: r#"{% if tracing %}
{% if tracing.span_name %}
otel_span_name "{{ tracing.span_name }}";
{% else %}
otel_span_name $request_uri_path;
{% endif %}
{% for attr in tracing.span_attributes %}
otel_span_attr "{{ attr.key }}" "{{ attr.value }}";
{% endfor %}
{% for attr in global_span_attributes %}
otel_span_attr "{{ attr.key }}" "{{ attr.value }}";
{% endfor %}
{% endif %}
"#,
};

pub(crate) const EXTERNAL_REDIRECT_TEMPLATE: Template = Template {
    name: "observability_redirect.conf",
    source: r#"{% if tracing %}
otel_trace {{ strategy }};
{% if tracing.context %}
otel_trace_context {{ tracing.context }};
{% endif %}
{% endif %}
"#,
};

#[derive(Serialize)]
struct TracingContext<'a> {
    tracing: Option<&'a Tracing>,
    strategy: String,
    global_span_attributes: &'a [SpanAttribute],
}

pub struct ObservabilityGenerator {
    telemetry: Telemetry,
}

impl ObservabilityGenerator {
    pub fn new(telemetry: Telemetry) -> Self {
        ObservabilityGenerator { telemetry }
    }

    /// Only the first observability policy applies.
    fn first_policy(policies: &[Policy]) -> Option<&ObservabilityPolicy> {
        policies.iter().find_map(|policy| match policy {
            Policy::Observability(obs) => Some(obs),
            _ => None,
        })
    }
}

impl PolicyGenerator for ObservabilityGenerator {
    fn generate_for_location(
        &self,
        policies: &[Policy],
        location: &Location,
    ) -> Result<Vec<PolicyFile>> {
        let Some(obs) = Self::first_policy(policies) else {
            return Ok(Vec::new());
        };

        let (template, suffix, global_span_attributes) = match location.location_type {
            LocationType::External => (
                &OBSERVABILITY_TEMPLATE,
                "ext",
                self.telemetry.span_attributes.as_slice(),
            ),
            _ => (&EXTERNAL_REDIRECT_TEMPLATE, "redirect", &[][..]),
        };

        let ctx = TracingContext {
            tracing: obs.tracing.as_ref(),
            strategy: strategy(obs),
            global_span_attributes,
        };

        Ok(vec![PolicyFile {
            name: format!("ObservabilityPolicy_{}_{}_{suffix}.conf", obs.namespace, obs.name),
            content: templates::render(template, &ctx)?.into_bytes(),
        }])
    }

    fn generate_for_internal_location(&self, policies: &[Policy]) -> Result<Vec<PolicyFile>> {
        let Some(obs) = Self::first_policy(policies) else {
            return Ok(Vec::new());
        };

        let ctx = TracingContext {
            tracing: obs.tracing.as_ref(),
            strategy: strategy(obs),
            global_span_attributes: &self.telemetry.span_attributes,
        };

        Ok(vec![PolicyFile {
            name: format!("ObservabilityPolicy_{}_{}_int.conf", obs.namespace, obs.name),
            content: templates::render(&INTERNAL_TEMPLATE, &ctx)?.into_bytes(),
        }])
    }
}

/// Value of the `otel_trace` directive.
fn strategy(obs: &ObservabilityPolicy) -> String {
    let Some(tracing) = &obs.tracing else {
        return String::new();
    };

    match tracing.strategy {
        TraceStrategy::Parent => "$otel_parent_sampled".to_string(),
        TraceStrategy::Ratio => match tracing.ratio {
            None => "on".to_string(),
            Some(ratio) if ratio > 0 => ratio_variable_name(ratio),
            Some(_) => "off".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(strategy: TraceStrategy, ratio: Option<i32>) -> Policy {
        Policy::Observability(ObservabilityPolicy {
            namespace: "test".into(),
            name: "obs".into(),
            tracing: Some(Tracing {
                strategy,
                ratio,
                context: Some("propagate".into()),
                span_name: Some("my-span".into()),
                span_attributes: vec![SpanAttribute {
                    key: "team".into(),
                    value: "cafe".into(),
                }],
            }),
        })
    }

    fn generator() -> ObservabilityGenerator {
        ObservabilityGenerator::new(Telemetry {
            span_attributes: vec![SpanAttribute {
                key: "global".into(),
                value: "attr".into(),
            }],
            ..Default::default()
        })
    }

    fn content(files: &[PolicyFile]) -> String {
        String::from_utf8(files[0].content.clone()).unwrap()
    }

    #[test]
    fn test_external_location() {
        let files = generator()
            .generate_for_location(&[policy(TraceStrategy::Ratio, Some(25))], &Location::default())
            .unwrap();
        assert_eq!(files[0].name, "ObservabilityPolicy_test_obs_ext.conf");

        let conf = content(&files);
        assert!(conf.contains("otel_trace $otel_ratio_25;"));
        assert!(conf.contains("otel_trace_context propagate;"));
        assert!(conf.contains(r#"otel_span_name "my-span";"#));
        assert!(conf.contains(r#"otel_span_attr "team" "cafe";"#));
        assert!(conf.contains(r#"otel_span_attr "global" "attr";"#));
    }

    #[test]
    fn test_redirect_location() {
        let location = Location {
            location_type: LocationType::Redirect,
            ..Default::default()
        };
        let files = generator()
            .generate_for_location(&[policy(TraceStrategy::Parent, None)], &location)
            .unwrap();
        assert_eq!(files[0].name, "ObservabilityPolicy_test_obs_redirect.conf");

        let conf = content(&files);
        assert!(conf.contains("otel_trace $otel_parent_sampled;"));
        assert!(conf.contains("otel_trace_context propagate;"));
        assert!(!conf.contains("otel_span_name"));
    }

    #[test]
    fn test_internal_location() {
        let mut pol = policy(TraceStrategy::Ratio, Some(0));
        if let Policy::Observability(obs) = &mut pol {
            obs.tracing.as_mut().unwrap().span_name = None;
        }

        let files = generator().generate_for_internal_location(&[pol]).unwrap();
        assert_eq!(files[0].name, "ObservabilityPolicy_test_obs_int.conf");

        let conf = content(&files);
        assert!(conf.contains("otel_span_name $request_uri_path;"));
        assert!(conf.contains(r#"otel_span_attr "global" "attr";"#));
        assert!(!conf.contains("otel_trace "));
    }

    #[test]
    fn test_strategy() {
        let strategy_of = |p: Policy| match p {
            Policy::Observability(obs) => strategy(&obs),
            _ => unreachable!(),
        };
        assert_eq!(strategy_of(policy(TraceStrategy::Ratio, None)), "on");
        assert_eq!(strategy_of(policy(TraceStrategy::Ratio, Some(0))), "off");
        assert_eq!(strategy_of(policy(TraceStrategy::Ratio, Some(50))), "$otel_ratio_50");
        assert_eq!(strategy_of(policy(TraceStrategy::Parent, Some(50))), "$otel_parent_sampled");
    }

    #[test]
    fn test_no_server_config() {
        let files = generator()
            .generate_for_server(
                &[policy(TraceStrategy::Parent, None)],
                &crate::http::Server::default(),
            )
            .unwrap();
        assert!(files.is_empty());
    }
}
