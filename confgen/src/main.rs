use clap::{Args, Parser};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use generate::RunArgs;
use metrics_defs::ALL_METRICS;
use metrics_exporter_statsd::StatsdBuilder;
use shared::metrics_defs::{describe_all, render_table};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod generate;
mod metrics_defs;

const METRICS_PREFIX: &str = "confgen";

#[derive(Parser)]
#[command(version, about = "Generates nginx configuration from a gateway graph")]
enum CliCommand {
    /// Builds the configuration and writes the nginx files.
    Generate(GenerateArgs),
    /// Prints the metrics this tool emits.
    Metrics,
}

#[derive(Args)]
struct GenerateArgs {
    #[arg(long)]
    config: PathBuf,
    /// YAML snapshot of the validated graph.
    #[arg(long)]
    graph: PathBuf,
    /// YAML snapshot of the endpoint directory.
    #[arg(long)]
    endpoints: PathBuf,
    /// Configuration version served on the version endpoint.
    #[arg(long, default_value_t = 1)]
    version: u64,
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    match &cli {
        CliCommand::Generate(args) => run_generate(args),
        CliCommand::Metrics => {
            print!("{}", render_table(ALL_METRICS));
            ExitCode::SUCCESS
        }
    }
}

fn run_generate(args: &GenerateArgs) -> ExitCode {
    let config = load_config(&args.config);

    let logging = config.as_ref().ok().and_then(|c| c.logging.as_ref());
    let _sentry = init_logging(logging);

    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!(path = %args.config.display(), error = %err, "Failed to load config");
            return ExitCode::FAILURE;
        }
    };

    if let Some(metrics) = &config.metrics {
        init_metrics(metrics);
    }

    let run_args = RunArgs {
        graph: &args.graph,
        endpoints: &args.endpoints,
        version: args.version,
        dry_run: args.dry_run,
    };

    match generate::run(&config, &run_args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Failed to generate nginx configuration");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = Config::from_file(path)?;
    config.validate()?;
    Ok(config)
}

/// Errors are also sent to Sentry when a DSN is configured. The returned guard
/// flushes pending events when dropped.
fn init_logging(logging: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = logging.map(|l| {
        sentry::init((
            l.sentry_dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let sentry_layer = guard.as_ref().map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();

    guard
}

fn init_metrics(config: &MetricsConfig) {
    let builder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port);
    let recorder = match builder.build(Some(METRICS_PREFIX)) {
        Ok(recorder) => recorder,
        Err(err) => {
            warn!(error = %err, "Failed to build statsd recorder, metrics are disabled");
            return;
        }
    };

    if let Err(err) = metrics::set_global_recorder(recorder) {
        warn!(error = %err, "Failed to install statsd recorder");
        return;
    }

    describe_all(ALL_METRICS);
}
