//! Path canonicalization
//!
//! Every path and pattern goes through [`normalize`] before it is compared.
//! Malformed input is never rejected, only rewritten:
//!
//! - missing leading slash: `users` → `/users`
//! - trailing slashes: `/users/` → `/users`
//! - repeated slashes: `/users//42` → `/users/42`
//! - empty input: `` → `/`

use std::borrow::Cow;

/// Returns `true` if `path` is already in canonical form.
///
/// ```
/// use navigation_engine::path::is_normalized;
///
/// assert!(is_normalized("/"));
/// assert!(is_normalized("/users/42"));
/// assert!(!is_normalized("users"));
/// assert!(!is_normalized("/users/"));
/// assert!(!is_normalized("/users//42"));
/// ```
pub fn is_normalized(path: &str) -> bool {
    if !path.starts_with('/') {
        return false;
    }
    if path == "/" {
        return true;
    }
    !path.ends_with('/') && !path.contains("//")
}

/// Canonicalize a path.
///
/// Borrows when the input is already canonical.
///
/// ```
/// use navigation_engine::path::normalize;
///
/// assert_eq!(normalize("/about"), "/about");
/// assert_eq!(normalize("about/"), "/about");
/// assert_eq!(normalize("//a///b//"), "/a/b");
/// assert_eq!(normalize(""), "/");
/// ```
pub fn normalize(path: &str) -> Cow<'_, str> {
    if is_normalized(path) {
        return Cow::Borrowed(path);
    }

    let joined = segments(path).join("/");
    if joined.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(format!("/{joined}"))
    }
}

/// Split a path into its non-empty segments. Root yields nothing.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Separate `path?query` into the path and the optional raw query.
///
/// ```
/// use navigation_engine::path::split_query;
///
/// assert_eq!(split_query("/search?q=rust"), ("/search", Some("q=rust")));
/// assert_eq!(split_query("/search"), ("/search", None));
/// assert_eq!(split_query("/search?"), ("/search", None));
/// ```
pub fn split_query(path: &str) -> (&str, Option<&str>) {
    match path.split_once('?') {
        Some((path, query)) if !query.is_empty() => (path, Some(query)),
        Some((path, _)) => (path, None),
        None => (path, None),
    }
}
