//! One pass of the pipeline: graph and endpoints in, nginx files out.

use crate::config::Config;
use crate::metrics_defs::{
    BUILD_DURATION, BUILD_UPSTREAMS, FILES_WRITTEN, GENERATE_DURATION, GENERATE_FILES,
    RESOLVE_FAILURES,
};
use dataplane::errors::GraphError;
use dataplane::graph::Graph;
use dataplane::{BuildError, build_configuration};
use nginx_config::{CONFIG_FOLDERS, FileError, FileManager, GenerateError, Generator};
use resolver::{DirectoryError, ServiceResolverImpl, StaticDirectory};
use shared::{counter, gauge, histogram};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("could not load graph: {0}")]
    Graph(#[from] GraphError),
    #[error("could not load endpoints: {0}")]
    Endpoints(#[from] DirectoryError),
    #[error("could not build configuration: {0}")]
    Build(#[from] BuildError),
    #[error("could not generate configuration: {0}")]
    Generate(#[from] GenerateError),
    #[error("could not write configuration: {0}")]
    Write(#[from] FileError),
}

pub struct RunArgs<'a> {
    pub graph: &'a Path,
    pub endpoints: &'a Path,
    pub version: u64,
    /// Generate without touching the output directory.
    pub dry_run: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Summary {
    pub files: usize,
    pub resolve_failures: usize,
}

pub fn run(config: &Config, args: &RunArgs<'_>) -> Result<Summary, RunError> {
    let graph = Graph::from_file(args.graph)?;
    let directory = StaticDirectory::from_file(args.endpoints)?;
    debug!(services = directory.service_count(), "Loaded endpoint directory");
    let service_resolver = ServiceResolverImpl::new(directory);

    let start = Instant::now();
    let conf = build_configuration(&graph, &service_resolver, args.version)?;
    histogram!(BUILD_DURATION).record(start.elapsed().as_secs_f64());

    let upstreams = conf.upstreams.iter().chain(&conf.stream_upstreams);
    gauge!(BUILD_UPSTREAMS).set(upstreams.clone().count() as f64);

    let mut resolve_failures = 0;
    for upstream in upstreams.filter(|u| !u.error_msg.is_empty()) {
        warn!(
            upstream = %upstream.name,
            error = %upstream.error_msg,
            "Could not resolve endpoints"
        );
        resolve_failures += 1;
    }
    counter!(RESOLVE_FAILURES).increment(resolve_failures as u64);

    let start = Instant::now();
    let generator = Generator::new(config.generator.plus, config.generator.usage_report.clone());
    let files = generator.generate(&conf)?;
    histogram!(GENERATE_DURATION).record(start.elapsed().as_secs_f64());
    gauge!(GENERATE_FILES).set(files.len() as f64);

    if args.dry_run {
        for file in &files {
            info!(
                path = %file.path,
                bytes = file.content.len(),
                file_type = %file.file_type,
                "Would write file"
            );
        }
    } else {
        let mut manager = FileManager::new(config.output.root.clone())?;
        create_config_folders(&manager)?;
        manager.replace_files(&files)?;
        for file in &files {
            counter!(FILES_WRITTEN, "file_type" => file.file_type.as_str()).increment(1);
        }
    }

    info!(
        version = args.version,
        files = files.len(),
        resolve_failures,
        dry_run = args.dry_run,
        "Generated nginx configuration"
    );

    Ok(Summary {
        files: files.len(),
        resolve_failures,
    })
}

/// Nginx includes every folder, so they exist even when nothing is written
/// to them.
fn create_config_folders(manager: &FileManager) -> Result<(), FileError> {
    for folder in CONFIG_FOLDERS {
        let path = manager.resolve(folder);
        fs::create_dir_all(&path).map_err(|source| FileError::Create { path, source })?;
    }
    Ok(())
}
