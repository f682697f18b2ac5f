use crate::types::MatchRule;
use std::cmp::Ordering;

/// Orders match rules by precedence. The sort is stable so rules that tie keep
/// the order they were defined in, and the first of them wins.
///
/// Path and hostname precedence are left to nginx. Here a method match beats no
/// method, then more header matches win, then more query param matches, then
/// the older route, then the route whose "namespace/name" sorts first.
pub(crate) fn sort_match_rules(rules: &mut [MatchRule]) {
    rules.sort_by(compare_priority);
}

fn compare_priority(rule1: &MatchRule, rule2: &MatchRule) -> Ordering {
    let m1 = &rule1.matches;
    let m2 = &rule2.matches;

    m2.method
        .is_some()
        .cmp(&m1.method.is_some())
        .then_with(|| m2.headers.len().cmp(&m1.headers.len()))
        .then_with(|| m2.query_params.len().cmp(&m1.query_params.len()))
        .then_with(|| rule1.source.precedence(&rule2.source))
}
