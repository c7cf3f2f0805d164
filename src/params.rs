//! Path and query parameter bags
//!
//! [`RouteParams`] holds values captured by named pattern segments (`:id`).
//! [`QueryParams`] holds the `?key=value` part of a navigation, with repeated
//! keys preserved in order.

use std::collections::{BTreeMap, HashMap};

/// Parameters captured from path segments.
///
/// # Example
///
/// ```
/// use navigation_engine::RouteParams;
///
/// let params: RouteParams = [("id", "42")].into_iter().collect();
///
/// assert_eq!(params.get("id"), Some("42"));
/// assert_eq!(params.get_as::<u32>("id"), Some(42));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    params: HashMap<String, String>,
}

impl RouteParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(params: HashMap<String, String>) -> Self {
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parse a parameter. `None` if it is absent or does not parse.
    pub fn get_as<T>(&self, key: &str) -> Option<T>
    where
        T: std::str::FromStr,
    {
        self.params.get(key)?.parse().ok()
    }

    /// Insert a value, returning the previous one for that name.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.params.insert(key.into(), value.into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.params
    }
}

impl<K, V> FromIterator<(K, V)> for RouteParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Query parameters of a navigation.
///
/// Keys are kept sorted so [`to_query_string`](Self::to_query_string) is
/// deterministic; values of a repeated key keep their insertion order.
///
/// # Example
///
/// ```
/// use navigation_engine::QueryParams;
///
/// let query = QueryParams::from_query_string("page=2&tag=rust&tag=async");
///
/// assert_eq!(query.get("page"), Some("2"));
/// assert_eq!(query.get_all("tag"), &["rust", "async"]);
/// assert_eq!(query.to_query_string(), "page=2&tag=rust&tag=async");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: BTreeMap<String, Vec<String>>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string (without the leading `?`).
    ///
    /// A key without `=` gets an empty value. `+` decodes to a space.
    pub fn from_query_string(query: &str) -> Self {
        let mut params = Self::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params.insert(decode_component(key), decode_component(value));
        }
        params
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key)?.first().map(String::as_str)
    }

    /// All values for `key`, empty if absent.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.params.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get_as<T>(&self, key: &str) -> Option<T>
    where
        T: std::str::FromStr,
    {
        self.get(key)?.parse().ok()
    }

    /// Append a value; existing values for the key are kept.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.entry(key.into()).or_default().push(value.into());
    }

    /// Append every value of `other` after the values already present.
    pub fn merge(&mut self, other: &QueryParams) {
        for (key, values) in &other.params {
            self.params
                .entry(key.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .flat_map(|(key, values)| {
                values
                    .iter()
                    .map(move |value| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.params.len()
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Percent-decode a query component, treating `+` as a space.
/// Invalid escapes are kept verbatim.
fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_params_basic() {
        let mut params = RouteParams::new();
        assert_eq!(params.insert("id", "7"), None);
        assert_eq!(params.insert("id", "8"), Some("7".to_string()));

        assert_eq!(params.get("id"), Some("8"));
        assert_eq!(params.get_as::<i64>("id"), Some(8));
        assert_eq!(params.get_as::<i64>("missing"), None);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_route_params_get_as_rejects_garbage() {
        let params: RouteParams = [("id", "abc")].into_iter().collect();
        assert_eq!(params.get_as::<u32>("id"), None);
        assert_eq!(params.get("id"), Some("abc"));
    }

    #[test]
    fn test_query_decoding() {
        let query = QueryParams::from_query_string("q=hello+world&name=J%C3%BCrgen&flag");
        assert_eq!(query.get("q"), Some("hello world"));
        assert_eq!(query.get("name"), Some("Jürgen"));
        assert_eq!(query.get("flag"), Some(""));
    }

    #[test]
    fn test_query_invalid_escape_is_kept() {
        let query = QueryParams::from_query_string("bad=%ZZ");
        assert_eq!(query.get("bad"), Some("%ZZ"));
    }

    #[test]
    fn test_query_merge_appends() {
        let mut base = QueryParams::from_query_string("tag=a");
        let extra: QueryParams = [("tag", "b"), ("page", "1")].into_iter().collect();
        base.merge(&extra);

        assert_eq!(base.get_all("tag"), &["a", "b"]);
        assert_eq!(base.get("page"), Some("1"));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_to_query_string_encodes() {
        let query: QueryParams = [("q", "a b&c")].into_iter().collect();
        assert_eq!(query.to_query_string(), "q=a%20b%26c");
        assert!(QueryParams::from_query_string("").is_empty());
    }
}
