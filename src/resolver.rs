//! Best-match selection and path building
//!
//! The resolver evaluates every candidate pattern and keeps the highest
//! score. Equal scores go to the candidate that comes first, so a caller
//! that registers `/user/:id` and `/user/:name` gets the former. Literal
//! segments always outscore parameters, so `/user/admin` beats `/user/:id`
//! whatever the registration order.

use crate::error::RouteError;
use crate::matcher::{match_path, match_prefix, MatchResult, RoutePattern, Segment};
use crate::params::RouteParams;

/// Pick the best full match among `patterns`.
///
/// # Example
///
/// ```
/// use navigation_engine::{resolver::find_best_match, RoutePattern};
///
/// let patterns = vec![
///     RoutePattern::parse("/user/:id").unwrap(),
///     RoutePattern::parse("/user/admin").unwrap(),
/// ];
///
/// let (best, result) = find_best_match(&patterns, "/user/admin").unwrap();
/// assert_eq!(best.as_str(), "/user/admin");
/// assert!(result.path_params.is_empty());
/// ```
pub fn find_best_match<'a>(
    patterns: &'a [RoutePattern],
    path: &str,
) -> Option<(&'a RoutePattern, MatchResult)> {
    best_by(patterns, path, |p| p, match_path).map(|(i, m)| (&patterns[i], m))
}

/// Pick the best prefix match among `patterns`.
pub fn find_best_prefix_match<'a>(
    patterns: &'a [RoutePattern],
    path: &str,
) -> Option<(&'a RoutePattern, MatchResult)> {
    best_by(patterns, path, |p| p, match_prefix).map(|(i, m)| (&patterns[i], m))
}

/// Index-returning core shared by the route table.
///
/// `pattern_of` projects each candidate onto its pattern; `matcher` is
/// either [`match_path`] or [`match_prefix`].
pub(crate) fn best_by<T>(
    candidates: &[T],
    path: &str,
    pattern_of: impl Fn(&T) -> &RoutePattern,
    matcher: fn(&RoutePattern, &str) -> MatchResult,
) -> Option<(usize, MatchResult)> {
    let mut best: Option<(usize, MatchResult)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let result = matcher(pattern_of(candidate), path);
        if !result.is_match {
            continue;
        }
        // Strictly greater: the first registered keeps a tie.
        let better = best
            .as_ref()
            .map_or(true, |(_, current)| result.score > current.score);
        if better {
            best = Some((index, result));
        }
    }

    best
}

/// Substitute named parameters into `pattern`, percent-encoding each value.
///
/// # Example
///
/// ```
/// use navigation_engine::{resolver::build_path, RoutePattern, RouteParams};
///
/// let pattern = RoutePattern::parse("/users/:id/files/:name").unwrap();
/// let params: RouteParams = [("id", "7"), ("name", "q3 report")].into_iter().collect();
///
/// assert_eq!(build_path(&pattern, &params).unwrap(), "/users/7/files/q3%20report");
/// ```
pub fn build_path(pattern: &RoutePattern, params: &RouteParams) -> Result<String, RouteError> {
    if pattern.is_root() {
        return Ok("/".to_string());
    }

    let mut path = String::new();
    for segment in pattern.segments() {
        path.push('/');
        match segment {
            Segment::Literal(text) => path.push_str(text),
            Segment::Param(name) => match params.get(name) {
                Some(value) if !value.is_empty() => path.push_str(&urlencoding::encode(value)),
                _ => {
                    return Err(RouteError::MissingPathParameter {
                        pattern: pattern.as_str().to_string(),
                        name: name.clone(),
                    })
                }
            },
            Segment::Wildcard | Segment::MultiWildcard => {
                return Err(RouteError::invalid_pattern(
                    pattern.as_str(),
                    "cannot build a path through a wildcard segment",
                ))
            }
        }
    }

    Ok(path)
}

/// Names of the parameters `pattern` needs that `params` lacks, in pattern order.
pub fn validate_required_params(pattern: &RoutePattern, params: &RouteParams) -> Vec<String> {
    pattern
        .param_names()
        .filter(|name| params.get(name).map_or(true, str::is_empty))
        .map(str::to_string)
        .collect()
}
