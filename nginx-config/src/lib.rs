//! Renders a data plane [`Configuration`](dataplane::Configuration) into the
//! nginx configuration files and auxiliary data the proxy loads at runtime.

mod base_http;
mod common;
pub mod errors;
pub mod file;
mod generator;
pub mod http;
mod includes;
mod main_config;
mod maps;
pub mod policies;
mod servers;
mod split_clients;
mod stream;
mod stream_servers;
mod telemetry;
mod templates;
mod upstreams;
mod version;

pub use errors::{GenerateError, Result};
pub use includes::Include;
pub use file::{File, FileError, FileManager, FileType};
pub use generator::{CONFIG_FOLDERS, Generator, UsageReportConfig};
