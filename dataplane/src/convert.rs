use crate::errors::{BuildError, Result};
use crate::graph::{Graph, GraphSnippetsFilter, PathMatch, PathMatchType, RouteFilter, RouteMatch};
use crate::types::{HttpFilters, Match, PathType, Snippet, SnippetsFilter};
use shared::types::NamespacedName;

pub(crate) const CONTEXT_MAIN: &str = "main";
pub(crate) const CONTEXT_HTTP: &str = "http";
pub(crate) const CONTEXT_SERVER: &str = "http.server";
pub(crate) const CONTEXT_LOCATION: &str = "http.server.location";

pub(crate) fn convert_match(m: &RouteMatch) -> Match {
    Match {
        method: m.method.clone(),
        headers: m.headers.clone(),
        query_params: m.query_params.clone(),
    }
}

pub(crate) fn convert_path_type(path: Option<&PathMatch>) -> Result<PathType> {
    let match_type = path.map(|p| p.match_type).unwrap_or_default();
    match match_type {
        PathMatchType::PathPrefix => Ok(PathType::Prefix),
        PathMatchType::Exact => Ok(PathType::Exact),
        PathMatchType::RegularExpression => Err(BuildError::ContractViolation(format!(
            "unsupported path type: {match_type:?}"
        ))),
    }
}

pub(crate) fn get_path(path: Option<&PathMatch>) -> String {
    path.and_then(|p| p.value.as_deref())
        .filter(|v| !v.is_empty())
        .unwrap_or("/")
        .to_string()
}

/// Picks the first filter of each kind. Snippets filters accumulate.
pub(crate) fn create_http_filters(filters: &[RouteFilter], graph: &Graph) -> Result<HttpFilters> {
    let mut result = HttpFilters::default();

    for filter in filters {
        match filter {
            RouteFilter::RequestRedirect(f) => {
                result.request_redirect.get_or_insert_with(|| f.clone());
            }
            RouteFilter::UrlRewrite(f) => {
                result.request_url_rewrite.get_or_insert_with(|| f.clone());
            }
            RouteFilter::RequestHeaderModifier(f) => {
                result.request_header_modifiers.get_or_insert_with(|| f.clone());
            }
            RouteFilter::ResponseHeaderModifier(f) => {
                result.response_header_modifiers.get_or_insert_with(|| f.clone());
            }
            RouteFilter::SnippetsFilter(nsname) => {
                let sf = graph.snippets_filter(nsname).ok_or_else(|| {
                    BuildError::ContractViolation(format!(
                        "snippets filter {nsname} referenced by a route is missing"
                    ))
                })?;
                result.snippets_filters.push(convert_snippets_filter(sf));
            }
        }
    }

    Ok(result)
}

fn convert_snippets_filter(filter: &GraphSnippetsFilter) -> SnippetsFilter {
    let source = NamespacedName::new(&filter.namespace, &filter.name);

    SnippetsFilter {
        server_snippet: filter.snippets.server.as_ref().map(|contents| Snippet {
            name: create_snippet_name(CONTEXT_SERVER, &source),
            contents: contents.clone(),
        }),
        location_snippet: filter.snippets.location.as_ref().map(|contents| Snippet {
            name: create_snippet_name(CONTEXT_LOCATION, &source),
            contents: contents.clone(),
        }),
    }
}

/// Name of the include file holding a snippet, unique per context and filter.
pub(crate) fn create_snippet_name(context: &str, source: &NamespacedName) -> String {
    format!(
        "SnippetsFilter_{}_{}_{}",
        context, source.namespace, source.name
    )
}

/// Collects the snippets of every valid snippets filter for one context.
pub(crate) fn build_snippets_for_context(graph: &Graph, context: &str) -> Vec<Snippet> {
    graph
        .snippets_filters
        .iter()
        .filter(|f| f.valid)
        .filter_map(|f| {
            let contents = match context {
                CONTEXT_MAIN => f.snippets.main.as_ref(),
                CONTEXT_HTTP => f.snippets.http.as_ref(),
                _ => None,
            }?;

            Some(Snippet {
                name: create_snippet_name(context, &NamespacedName::new(&f.namespace, &f.name)),
                contents: contents.clone(),
            })
        })
        .collect()
}
