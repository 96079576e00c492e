//! Canonical request keys.

use std::fmt;

/// Multi-valued query parameters.
///
/// Insertion order is irrelevant: [`QueryParams::encode`] always sorts the
/// pairs, so two logically identical parameter sets encode identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value for `key`, keeping existing values.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    /// Replaces every value of `key`.
    pub fn set<I, V>(&mut self, key: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let key = key.into();
        self.pairs.retain(|(k, _)| *k != key);
        self.pairs
            .extend(values.into_iter().map(|v| (key.clone(), v.into())));
        self
    }

    /// Builder form of [`QueryParams::add`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(key, value);
        self
    }

    /// All values of `key` in insertion order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Returns whether no pair was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Form-encodes the pairs sorted by key, then value.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut sorted: Vec<&(String, String)> = self.pairs.iter().collect();
        sorted.sort();
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(sorted.into_iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Serialized `(path, sorted query)` identifying one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds the key for a request path and its parameters.
    #[must_use]
    pub fn new(path: &str, params: &QueryParams) -> Self {
        let path = path.trim_start_matches('/');
        if params.is_empty() {
            Self(path.to_string())
        } else {
            Self(format!("{path}?{}", params.encode()))
        }
    }

    /// Canonical `path?query` text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in bytes, counted against the cache memory budget.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the key is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_insertion_order() {
        let a = QueryParams::new()
            .with("includes[]", "author")
            .with("translatedLanguage[]", "en")
            .with("includes[]", "artist");
        let b = QueryParams::new()
            .with("translatedLanguage[]", "en")
            .with("includes[]", "artist")
            .with("includes[]", "author");

        assert_eq!(CacheKey::new("manga/1", &a), CacheKey::new("/manga/1", &b));
    }

    #[test]
    fn test_encode_is_form_encoded_and_sorted() {
        let params = QueryParams::new()
            .with("title", "spy x family")
            .with("includes[]", "cover_art");
        assert_eq!(
            params.encode(),
            "includes%5B%5D=cover_art&title=spy+x+family"
        );
    }

    #[test]
    fn test_key_without_params_is_path() {
        assert_eq!(
            CacheKey::new("/at-home/server/abc", &QueryParams::new()).as_str(),
            "at-home/server/abc"
        );
    }

    #[test]
    fn test_set_replaces_values() {
        let mut params = QueryParams::new().with("includes[]", "manga");
        params.set("includes[]", ["author", "artist"]);
        assert_eq!(params.get_all("includes[]"), vec!["author", "artist"]);
    }
}
