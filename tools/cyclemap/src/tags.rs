//! Tag lookup for OSM features and relations
//!
//! Absence of a key is distinct from an empty value: `get` returns
//! `Some("")` for a key present with an empty value.

use std::collections::HashMap;

/// Immutable key/value tag set of one OSM element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    inner: HashMap<String, String>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a tag value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    /// Get `key`, falling back to `fallback_key` when `key` is absent
    pub fn get_or(&self, key: &str, fallback_key: &str) -> Option<&str> {
        self.get(key).or_else(|| self.get(fallback_key))
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Exact match of one key/value pair
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    /// Exact match of `key` against any of `values`
    pub fn has_any(&self, key: &str, values: &[&str]) -> bool {
        self.get(key).is_some_and(|v| values.contains(&v))
    }

    /// Any of `keys` carries `value`
    pub fn any_key_has(&self, keys: &[&str], value: &str) -> bool {
        keys.iter().any(|k| self.has_tag(k, value))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Tags
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_has() {
        let tags: Tags = [("highway", "cycleway"), ("name", "")].into_iter().collect();

        assert_eq!(tags.get("highway"), Some("cycleway"));
        assert_eq!(tags.get("name"), Some(""));
        assert_eq!(tags.get("surface"), None);
        assert!(tags.has("name"));
        assert!(!tags.has("surface"));
    }

    #[test]
    fn test_has_tag_is_exact() {
        let tags: Tags = [("cycleway", "lane;track")].into_iter().collect();

        assert!(tags.has_tag("cycleway", "lane;track"));
        assert!(!tags.has_tag("cycleway", "lane"));
        assert!(!tags.has_tag("Cycleway", "lane;track"));
    }

    #[test]
    fn test_has_any() {
        let tags: Tags = [("cycleway", "shared_lane")].into_iter().collect();

        assert!(tags.has_any("cycleway", &["share_busway", "shared_lane"]));
        assert!(!tags.has_any("cycleway", &["lane", "track"]));
        assert!(!tags.has_any("cycleway:left", &["shared_lane"]));
    }

    #[test]
    fn test_get_or_prefers_primary_key() {
        let both: Tags = [("cycleway:surface", "asphalt"), ("surface", "sett")]
            .into_iter()
            .collect();
        let generic: Tags = [("surface", "sett")].into_iter().collect();

        assert_eq!(both.get_or("cycleway:surface", "surface"), Some("asphalt"));
        assert_eq!(generic.get_or("cycleway:surface", "surface"), Some("sett"));
        assert_eq!(Tags::new().get_or("cycleway:surface", "surface"), None);
    }

    #[test]
    fn test_any_key_has() {
        let tags: Tags = [("cycleway:right", "track")].into_iter().collect();

        assert!(tags.any_key_has(&["cycleway", "cycleway:right"], "track"));
        assert!(!tags.any_key_has(&["cycleway", "cycleway:left"], "track"));
    }
}
