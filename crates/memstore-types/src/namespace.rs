//! Hierarchical namespace paths.
//!
//! A namespace path is an ordered, non-empty sequence of string segments,
//! analogous to a directory path. Document identifiers are derived by
//! joining the segments and the record key with a reserved separator, so
//! the same (namespace, key) pair always maps to the same identifier.

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Reserved separator used to join namespace segments and keys into
/// deterministic document identifiers. Segments and keys containing this
/// sequence are rejected rather than escaped.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// An ordered, non-empty sequence of namespace segments.
///
/// Paths order lexicographically by segment tuple, which is the order
/// namespace listings are returned in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct NamespacePath(Vec<String>);

impl NamespacePath {
    /// Create a namespace path from segments.
    ///
    /// # Errors
    ///
    /// Returns `TypesError::InvalidNamespace` when the path is empty, a
    /// segment is empty, or a segment contains the reserved separator.
    pub fn new(segments: Vec<String>) -> Result<Self, TypesError> {
        if segments.is_empty() {
            return Err(TypesError::InvalidNamespace(
                "namespace must have at least one segment".to_string(),
            ));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(TypesError::InvalidNamespace(
                    "namespace segments must be non-empty".to_string(),
                ));
            }
            if segment.contains(NAMESPACE_SEPARATOR) {
                return Err(TypesError::InvalidNamespace(format!(
                    "segment {segment:?} contains reserved separator {NAMESPACE_SEPARATOR:?}"
                )));
            }
        }
        Ok(Self(segments))
    }

    /// Build from string slices, for literals in call sites and tests.
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Result<Self, TypesError> {
        Self::new(segments.iter().map(|s| s.as_ref().to_string()).collect())
    }

    /// The path segments in order.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The separator-joined form used as the aggregate document id and in
    /// engine-side term/prefix filters.
    pub fn namespace_key(&self) -> String {
        self.0.join(NAMESPACE_SEPARATOR)
    }

    /// Deterministic document identifier for a record key in this
    /// namespace. Writing the same (namespace, key) twice overwrites the
    /// prior document instead of creating a duplicate.
    pub fn document_id(&self, key: &str) -> Result<String, TypesError> {
        validate_key(key)?;
        Ok(format!(
            "{}{}{}",
            self.namespace_key(),
            NAMESPACE_SEPARATOR,
            key
        ))
    }

    /// True when `self`'s segments are a prefix of `other`'s.
    pub fn is_prefix_of(&self, other: &NamespacePath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// True when this path ends with the given suffix segments.
    pub fn matches_suffix(&self, suffix: &NamespacePath) -> bool {
        suffix.0.len() <= self.0.len() && self.0[self.0.len() - suffix.0.len()..] == suffix.0[..]
    }

    /// Truncate to at most `max_depth` segments.
    pub fn truncated(&self, max_depth: usize) -> NamespacePath {
        if self.0.len() <= max_depth {
            self.clone()
        } else {
            NamespacePath(self.0[..max_depth].to_vec())
        }
    }
}

impl TryFrom<Vec<String>> for NamespacePath {
    type Error = TypesError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

impl From<NamespacePath> for Vec<String> {
    fn from(path: NamespacePath) -> Self {
        path.0
    }
}

impl std::fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl std::str::FromStr for NamespacePath {
    type Err = TypesError;

    /// Parse a `/`-separated path, e.g. `prefs/user_123`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.split('/').map(|seg| seg.to_string()).collect())
    }
}

/// Validate a record key: non-empty and free of the reserved separator.
pub fn validate_key(key: &str) -> Result<(), TypesError> {
    if key.is_empty() {
        return Err(TypesError::InvalidKey("key must be non-empty".to_string()));
    }
    if key.contains(NAMESPACE_SEPARATOR) {
        return Err(TypesError::InvalidKey(format!(
            "key {key:?} contains reserved separator {NAMESPACE_SEPARATOR:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_key_joins_segments() {
        let ns = NamespacePath::from_segments(&["prefs", "user_123"]).unwrap();
        assert_eq!(ns.namespace_key(), "prefs::user_123");
        assert_eq!(ns.depth(), 2);
    }

    #[test]
    fn test_document_id_is_deterministic() {
        let ns = NamespacePath::from_segments(&["a", "b"]).unwrap();
        assert_eq!(ns.document_id("k1").unwrap(), "a::b::k1");
        assert_eq!(ns.document_id("k1").unwrap(), ns.document_id("k1").unwrap());
    }

    #[test]
    fn test_rejects_empty_and_reserved_segments() {
        assert!(NamespacePath::new(vec![]).is_err());
        assert!(NamespacePath::from_segments(&[""]).is_err());
        assert!(NamespacePath::from_segments(&["a::b"]).is_err());
        let ns = NamespacePath::from_segments(&["a"]).unwrap();
        assert!(ns.document_id("bad::key").is_err());
        assert!(ns.document_id("").is_err());
    }

    #[test]
    fn test_prefix_and_suffix_matching() {
        let ns = NamespacePath::from_segments(&["a", "b", "c"]).unwrap();
        let prefix = NamespacePath::from_segments(&["a", "b"]).unwrap();
        let suffix = NamespacePath::from_segments(&["b", "c"]).unwrap();
        assert!(prefix.is_prefix_of(&ns));
        assert!(!ns.is_prefix_of(&prefix));
        assert!(ns.matches_suffix(&suffix));
        assert!(!ns.matches_suffix(&NamespacePath::from_segments(&["x"]).unwrap()));
    }

    #[test]
    fn test_truncated_caps_depth() {
        let ns = NamespacePath::from_segments(&["a", "b", "c"]).unwrap();
        assert_eq!(ns.truncated(2).segments(), &["a", "b"]);
        assert_eq!(ns.truncated(5), ns);
    }

    #[test]
    fn test_display_and_parse() {
        let ns: NamespacePath = "prefs/user_123".parse().unwrap();
        assert_eq!(ns.segments(), &["prefs", "user_123"]);
        assert_eq!(ns.to_string(), "prefs/user_123");
    }

    #[test]
    fn test_ordering_is_lexicographic_by_segments() {
        let a_b = NamespacePath::from_segments(&["a", "b"]).unwrap();
        let a_c = NamespacePath::from_segments(&["a", "c"]).unwrap();
        let x_b = NamespacePath::from_segments(&["x", "b"]).unwrap();
        let mut paths = vec![x_b.clone(), a_c.clone(), a_b.clone()];
        paths.sort();
        assert_eq!(paths, vec![a_b, a_c, x_b]);
    }
}
