//! Include files: snippets and policy output that servers and locations pull in
//! with the `include` directive.

use crate::generator::{ExecuteResult, INCLUDES_FOLDER};
use crate::http::Server;
use crate::policies::PolicyFile;
use dataplane::{Snippet, SnippetsFilter, VirtualServer};
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Include {
    /// Absolute path of the include file.
    pub name: String,
    #[serde(skip)]
    pub content: Vec<u8>,
}

/// One file per unique include across all servers and locations. The same
/// policy or snippets filter is often attached in many places.
pub(crate) fn execute_results_from_servers(servers: &[Server]) -> Vec<ExecuteResult> {
    let mut unique: IndexMap<&str, &[u8]> = IndexMap::new();

    for server in servers {
        let location_includes = server.locations.iter().flat_map(|l| &l.includes);
        for include in server.includes.iter().chain(location_includes) {
            unique.insert(&include.name, &include.content);
        }
    }

    unique
        .into_iter()
        .map(|(name, content)| ExecuteResult::new(name, content.to_vec()))
        .collect()
}

pub(crate) fn from_policy_files(files: Vec<PolicyFile>) -> Vec<Include> {
    files
        .into_iter()
        .map(|file| Include {
            name: format!("{INCLUDES_FOLDER}/{}", file.name),
            content: file.content,
        })
        .collect()
}

fn from_snippet(snippet: &Snippet) -> Include {
    Include {
        name: format!("{INCLUDES_FOLDER}/{}.conf", snippet.name),
        content: snippet.contents.clone().into_bytes(),
    }
}

/// Keeps the first include of each name.
fn deduplicate(includes: impl IntoIterator<Item = Include>) -> Vec<Include> {
    let mut unique: IndexMap<String, Include> = IndexMap::new();
    for include in includes {
        unique.entry(include.name.clone()).or_insert(include);
    }
    unique.into_values().collect()
}

pub(crate) fn from_location_snippets_filters(filters: &[SnippetsFilter]) -> Vec<Include> {
    deduplicate(
        filters
            .iter()
            .filter_map(|f| f.location_snippet.as_ref())
            .map(from_snippet),
    )
}

/// Server snippets of every snippets filter referenced by any rule of the server.
pub(crate) fn from_server_snippets_filters(server: &VirtualServer) -> Vec<Include> {
    deduplicate(
        server
            .path_rules
            .iter()
            .flat_map(|pr| &pr.match_rules)
            .flat_map(|mr| &mr.filters.snippets_filters)
            .filter_map(|sf| sf.server_snippet.as_ref())
            .map(from_snippet),
    )
}

/// Main and http context snippets.
pub(crate) fn from_snippets(snippets: &[Snippet]) -> Vec<Include> {
    deduplicate(snippets.iter().map(from_snippet))
}

pub(crate) fn execute_results(includes: &[Include]) -> Vec<ExecuteResult> {
    includes
        .iter()
        .map(|i| ExecuteResult::new(&i.name, i.content.clone()))
        .collect()
}
