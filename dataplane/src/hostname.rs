//! Hostname specificity, used when several listeners claim the same hostname.

/// Returns the more specific of two hostnames, or an empty string when neither
/// is. Equal hostnames return the first one.
///
/// An absent hostname loses to anything. Between two wildcards the one with more
/// labels wins, a tie goes to `host2`. A literal beats a wildcard. Two different
/// literals are incomparable.
pub fn more_specific_hostname(host1: &str, host2: &str) -> String {
    if host1 == host2 {
        return host1.to_string();
    }
    if host1.is_empty() {
        return host2.to_string();
    }
    if host2.is_empty() {
        return host1.to_string();
    }

    match (host1.starts_with("*."), host2.starts_with("*.")) {
        (true, true) => {
            if label_count(host1) > label_count(host2) {
                host1.to_string()
            } else {
                host2.to_string()
            }
        }
        (true, false) => host2.to_string(),
        (false, true) => host1.to_string(),
        (false, false) => String::new(),
    }
}

fn label_count(host: &str) -> usize {
    host.split('.').count()
}

/// True when `host1` should replace `host2` as the owner of a hostname.
pub fn listener_hostname_more_specific(host1: Option<&str>, host2: Option<&str>) -> bool {
    let host1 = host1.unwrap_or_default();
    let host2 = host2.unwrap_or_default();

    more_specific_hostname(host1, host2) == host1
}
