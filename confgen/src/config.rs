use nginx_config::UsageReportConfig;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct GeneratorConfig {
    /// Generate for the commercial build of nginx.
    #[serde(default)]
    pub plus: bool,
    #[serde(default)]
    pub usage_report: UsageReportConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Every generated path is written below this directory.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig { root: default_root() }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/")
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.output.root.is_absolute() {
            return Err(ValidationError::RelativeOutputRoot(self.output.root.clone()));
        }

        if let Some(metrics) = &self.metrics {
            if metrics.statsd_host.is_empty() {
                return Err(ValidationError::MissingStatsdHost);
            }
            if metrics.statsd_port == 0 {
                return Err(ValidationError::InvalidStatsdPort);
            }
        }

        if let Some(logging) = &self.logging {
            if logging.sentry_dsn.is_empty() {
                return Err(ValidationError::EmptySentryDsn);
            }
        }

        let usage_report = &self.generator.usage_report;
        let usage_report_set = usage_report.endpoint.is_some() || usage_report.resolver.is_some();
        if usage_report_set && !self.generator.plus {
            return Err(ValidationError::UsageReportWithoutPlus);
        }

        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("output root {0:?} must be an absolute path")]
    RelativeOutputRoot(PathBuf),
    #[error("metrics.statsd_host must not be empty")]
    MissingStatsdHost,
    #[error("metrics.statsd_port must not be 0")]
    InvalidStatsdPort,
    #[error("logging.sentry_dsn must not be empty")]
    EmptySentryDsn,
    #[error("usage reporting is only supported with generator.plus")]
    UsageReportWithoutPlus,
}
