//! Common types for metrics definitions.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl MetricType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "Counter",
            MetricType::Gauge => "Gauge",
            MetricType::Histogram => "Histogram",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

/// Registers the description of every metric with the installed recorder.
pub fn describe_all(defs: &[MetricDef]) {
    for def in defs {
        match def.metric_type {
            MetricType::Counter => metrics::describe_counter!(def.name, def.description),
            MetricType::Gauge => metrics::describe_gauge!(def.name, def.description),
            MetricType::Histogram => metrics::describe_histogram!(def.name, def.description),
        }
    }
}

/// Renders the definitions as a markdown table, one metric per row.
pub fn render_table(defs: &[MetricDef]) -> String {
    let mut out = String::from("| Name | Type | Description |\n|------|------|-------------|\n");
    for def in defs {
        out.push_str(&format!(
            "| `{}` | {} | {} |\n",
            def.name,
            def.metric_type.as_str(),
            def.description
        ));
    }
    out
}

#[macro_export]
macro_rules! counter {
    ($def:expr) => {
        metrics::counter!($def.name)
    };
    ($def:expr, $($label:expr => $value:expr),+ $(,)?) => {
        metrics::counter!($def.name, $($label => $value),+)
    };
}

#[macro_export]
macro_rules! gauge {
    ($def:expr) => {
        metrics::gauge!($def.name)
    };
}

#[macro_export]
macro_rules! histogram {
    ($def:expr) => {
        metrics::histogram!($def.name)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFS: &[MetricDef] = &[
        MetricDef {
            name: "a.count",
            metric_type: MetricType::Counter,
            description: "A counter",
        },
        MetricDef {
            name: "b.time",
            metric_type: MetricType::Histogram,
            description: "A histogram",
        },
    ];

    #[test]
    fn test_render_table() {
        let table = render_table(DEFS);
        assert!(table.contains("| `a.count` | Counter | A counter |"));
        assert!(table.contains("| `b.time` | Histogram | A histogram |"));
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn test_describe_without_recorder() {
        // no recorder installed, must be a no-op
        describe_all(DEFS);
    }

    #[test]
    fn test_counter_with_labels() {
        counter!(DEFS[0]).increment(1);
        counter!(DEFS[0], "file_type" => "Secret").increment(1);
        counter!(DEFS[0], "a" => "1", "b" => "2",).increment(1);
    }
}
