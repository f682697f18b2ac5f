//! Metrics definitions for the configuration generator.

use shared::metrics_defs::{MetricDef, MetricType};

pub const BUILD_DURATION: MetricDef = MetricDef {
    name: "build.duration",
    metric_type: MetricType::Histogram,
    description: "Time to build the data plane configuration from the graph in seconds",
};

pub const BUILD_UPSTREAMS: MetricDef = MetricDef {
    name: "build.upstreams",
    metric_type: MetricType::Gauge,
    description: "Number of http and stream upstreams in the last built configuration",
};

pub const RESOLVE_FAILURES: MetricDef = MetricDef {
    name: "resolve.failures",
    metric_type: MetricType::Counter,
    description: "Number of upstreams whose endpoints could not be resolved",
};

pub const GENERATE_FILES: MetricDef = MetricDef {
    name: "generate.files",
    metric_type: MetricType::Gauge,
    description: "Number of files in the last generated configuration",
};

pub const GENERATE_DURATION: MetricDef = MetricDef {
    name: "generate.duration",
    metric_type: MetricType::Histogram,
    description: "Time to render the nginx configuration in seconds",
};

pub const FILES_WRITTEN: MetricDef = MetricDef {
    name: "files.written",
    metric_type: MetricType::Counter,
    description: "Number of configuration files written to disk, by file type",
};

pub const ALL_METRICS: &[MetricDef] = &[
    BUILD_DURATION,
    BUILD_UPSTREAMS,
    RESOLVE_FAILURES,
    GENERATE_FILES,
    GENERATE_DURATION,
    FILES_WRITTEN,
];
