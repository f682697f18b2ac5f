//! Identity types shared by the resolver, the builder and the generator.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Namespace-qualified name of a resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        NamespacedName {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Metadata of the resource a routing rule originates from.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
    /// Creation time as unix seconds.
    #[serde(default)]
    pub creation_timestamp: i64,
}

impl ObjectMeta {
    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(&self.namespace, &self.name)
    }

    /// Orders two resources by age (oldest first), then by "namespace/name".
    pub fn precedence(&self, other: &ObjectMeta) -> Ordering {
        self.creation_timestamp
            .cmp(&other.creation_timestamp)
            .then_with(|| {
                self.namespaced_name()
                    .to_string()
                    .cmp(&other.namespaced_name().to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(namespace: &str, name: &str, ts: i64) -> ObjectMeta {
        ObjectMeta {
            namespace: namespace.into(),
            name: name.into(),
            creation_timestamp: ts,
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(NamespacedName::new("default", "coffee").to_string(), "default/coffee");
    }

    #[test]
    fn test_precedence_oldest_first() {
        let older = meta("b", "b", 10);
        let newer = meta("a", "a", 20);
        assert_eq!(older.precedence(&newer), Ordering::Less);
        assert_eq!(newer.precedence(&older), Ordering::Greater);
    }

    #[test]
    fn test_precedence_name_on_same_age() {
        let first = meta("default", "a", 10);
        let second = meta("default", "b", 10);
        assert_eq!(first.precedence(&second), Ordering::Less);
        assert_eq!(first.precedence(&first.clone()), Ordering::Equal);
    }

    #[test]
    fn test_deserialize_without_timestamp() {
        let meta: ObjectMeta = serde_yaml::from_str("namespace: test\nname: route\n").unwrap();
        assert_eq!(meta.creation_timestamp, 0);
        assert_eq!(meta.namespaced_name(), NamespacedName::new("test", "route"));
    }
}
