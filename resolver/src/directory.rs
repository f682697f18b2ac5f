/// The endpoint directory is the source of endpoint slices for a service.
/// Slices for one service can come from several independent sources and may
/// report the same endpoint more than once.
use crate::types::EndpointSlice;
use serde::Deserialize;
use shared::types::NamespacedName;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum DirectoryError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

pub trait EndpointDirectory: Send + Sync {
    /// Lists every endpoint slice reported for the service.
    fn list(&self, service: &NamespacedName) -> Result<Vec<EndpointSlice>, DirectoryError>;
}

#[derive(Deserialize)]
struct ServiceEntry {
    namespace: String,
    name: String,
    #[serde(default)]
    slices: Vec<EndpointSlice>,
}

#[derive(Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    services: Vec<ServiceEntry>,
}

/// In-memory directory, typically loaded from a YAML snapshot.
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    slices: HashMap<NamespacedName, Vec<EndpointSlice>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self, DirectoryError> {
        let file = File::open(path)?;
        let data: DirectoryFile = serde_yaml::from_reader(file)?;
        Ok(Self::from_entries(data))
    }

    pub fn from_yaml(s: &str) -> Result<Self, DirectoryError> {
        let data: DirectoryFile = serde_yaml::from_str(s)?;
        Ok(Self::from_entries(data))
    }

    fn from_entries(data: DirectoryFile) -> Self {
        let mut directory = Self::new();
        for entry in data.services {
            let service = NamespacedName::new(entry.namespace, entry.name);
            for slice in entry.slices {
                directory.insert(service.clone(), slice);
            }
        }
        directory
    }

    pub fn insert(&mut self, service: NamespacedName, slice: EndpointSlice) {
        self.slices.entry(service).or_default().push(slice);
    }

    pub fn service_count(&self) -> usize {
        self.slices.len()
    }
}

impl EndpointDirectory for StaticDirectory {
    fn list(&self, service: &NamespacedName) -> Result<Vec<EndpointSlice>, DirectoryError> {
        Ok(self.slices.get(service).cloned().unwrap_or_default())
    }
}
