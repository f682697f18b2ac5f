//! Weighted traffic splitting between the backends of a rule.

use crate::common::safe_variable_name;
use crate::errors::Result;
use crate::generator::{ExecuteResult, HTTP_CONFIG_FILE};
use crate::http::{SplitClient, SplitClientDistribution};
use crate::templates::{self, Template};
use crate::upstreams::INVALID_BACKEND_REF;
use dataplane::{Backend, BackendGroup, Configuration};
use serde::Serialize;

pub(crate) const SPLIT_CLIENTS_TEMPLATE: Template = Template {
    name: "split_clients.conf",
    source: r#"{% for sc in split_clients %}
split_clients $request_id ${{ sc.variable_name }} {
{% for d in sc.distributions %}
{% if d.percent == "0.00" %}
    # {{ d.percent }}% {{ d.value }};
{% else %}
    {{ d.percent }}% {{ d.value }};
{% endif %}
{% endfor %}
}

{% endfor %}
"#,
};

#[derive(Serialize)]
struct SplitClients<'a> {
    split_clients: &'a [SplitClient],
}

pub(crate) fn execute_split_clients(conf: &Configuration) -> Result<Vec<ExecuteResult>> {
    let split_clients = create_split_clients(&conf.backend_groups);
    let rendered = templates::render(
        &SPLIT_CLIENTS_TEMPLATE,
        SplitClients {
            split_clients: &split_clients,
        },
    )?;

    Ok(vec![ExecuteResult::new(HTTP_CONFIG_FILE, rendered)])
}

fn create_split_clients(groups: &[BackendGroup]) -> Vec<SplitClient> {
    groups
        .iter()
        .filter_map(|group| {
            let distributions = create_split_client_distributions(group);
            if distributions.is_empty() {
                return None;
            }
            Some(SplitClient {
                variable_name: safe_variable_name(&group.name()),
                distributions,
            })
        })
        .collect()
}

fn create_split_client_distributions(group: &BackendGroup) -> Vec<SplitClientDistribution> {
    if !backend_group_needs_split(group) {
        return Vec::new();
    }

    let total_weight: i32 = group.backends.iter().map(|b| b.weight).sum();
    if total_weight == 0 {
        return vec![SplitClientDistribution {
            percent: "100".to_string(),
            value: INVALID_BACKEND_REF.to_string(),
        }];
    }

    let Some((last, rest)) = group.backends.split_last() else {
        return Vec::new();
    };

    let mut available = 100.0;
    let mut distributions = Vec::with_capacity(group.backends.len());
    for backend in rest {
        let percentage = percent_of(backend.weight, total_weight);
        available -= percentage;
        distributions.push(SplitClientDistribution {
            percent: format!("{percentage:.2}"),
            value: split_client_value(backend),
        });
    }

    // Whatever rounding left over goes to the last backend, so the total is
    // exactly 100.
    distributions.push(SplitClientDistribution {
        percent: format!("{available:.2}"),
        value: split_client_value(last),
    });

    distributions
}

fn split_client_value(backend: &Backend) -> String {
    if backend.valid {
        backend.upstream_name.clone()
    } else {
        INVALID_BACKEND_REF.to_string()
    }
}

/// Percentage of the total weight, rounded down to two decimals.
fn percent_of(weight: i32, total_weight: i32) -> f64 {
    let p = f64::from(weight) * 100.0 / f64::from(total_weight);
    (p * 100.0).floor() / 100.0
}

pub(crate) fn backend_group_needs_split(group: &BackendGroup) -> bool {
    group.backends.len() > 1
}

/// What a location proxies to for a backend group: the split variable when
/// traffic is split, otherwise the single upstream.
pub(crate) fn backend_group_name(group: &BackendGroup) -> String {
    match group.backends.as_slice() {
        [] => INVALID_BACKEND_REF.to_string(),
        [backend] => {
            if backend.weight <= 0 || !backend.valid {
                INVALID_BACKEND_REF.to_string()
            } else {
                backend.upstream_name.clone()
            }
        }
        _ => group.name(),
    }
}
