//! Pattern matching with specificity scoring
//!
//! A [`RoutePattern`] is parsed once from a template such as
//! `/users/:id/files/**` and then matched against many paths. Each
//! successful match carries a score so that the resolver can pick the most
//! specific pattern among several that match:
//!
//! | Segment          | Syntax  | Score per segment |
//! |------------------|---------|-------------------|
//! | Literal          | `users` | 100               |
//! | Named parameter  | `:id`   | 10                |
//! | Single wildcard  | `*`     | 5                 |
//! | Multi wildcard   | `**`    | 1                 |
//!
//! The root pattern `/` matched against the root path scores [`ROOT_SCORE`].

use crate::error::RouteError;
use crate::params::RouteParams;
use crate::path;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub const LITERAL_SCORE: u32 = 100;
pub const PARAM_SCORE: u32 = 10;
pub const WILDCARD_SCORE: u32 = 5;
pub const MULTI_WILDCARD_SCORE: u32 = 1;
/// Fixed score of the root pattern matching the root path.
pub const ROOT_SCORE: u32 = u32::MAX;

/// A single segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Text that must match exactly (case-sensitive)
    Literal(String),
    /// `:name`, captures one segment
    Param(String),
    /// `*`, matches one segment without capturing
    Wildcard,
    /// `**`, matches every remaining segment; only valid last
    MultiWildcard,
}

impl Segment {
    /// Classify one raw segment.
    ///
    /// - `"users"` → `Literal("users")`
    /// - `":id"` → `Param("id")`
    /// - `"*"` → `Wildcard`
    /// - `"**"` → `MultiWildcard`
    pub fn parse(s: &str) -> Self {
        match s {
            "*" => Segment::Wildcard,
            "**" => Segment::MultiWildcard,
            _ => match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            },
        }
    }

    pub fn score(&self) -> u32 {
        match self {
            Segment::Literal(_) => LITERAL_SCORE,
            Segment::Param(_) => PARAM_SCORE,
            Segment::Wildcard => WILDCARD_SCORE,
            Segment::MultiWildcard => MULTI_WILDCARD_SCORE,
        }
    }

    /// Same kind of segment, ignoring parameter names.
    fn same_shape(&self, other: &Segment) -> bool {
        match (self, other) {
            (Segment::Literal(a), Segment::Literal(b)) => a == b,
            (Segment::Param(_), Segment::Param(_))
            | (Segment::Wildcard, Segment::Wildcard)
            | (Segment::MultiWildcard, Segment::MultiWildcard) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(s) => f.write_str(s),
            Segment::Param(name) => write!(f, ":{name}"),
            Segment::Wildcard => f.write_str("*"),
            Segment::MultiWildcard => f.write_str("**"),
        }
    }
}

/// A parsed, immutable route pattern.
///
/// # Example
///
/// ```
/// use navigation_engine::RoutePattern;
///
/// let pattern = RoutePattern::parse("/users/:id").unwrap();
/// let result = pattern.match_path("/users/42");
///
/// assert!(result.is_match);
/// assert_eq!(result.path_params.get("id"), Some("42"));
/// assert_eq!(result.score, 110);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern template.
    ///
    /// Fails when a `**` is not the last segment, when a parameter has no
    /// name, or when a parameter name is used twice.
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let source = path::normalize(pattern).into_owned();
        let segments: Vec<Segment> = path::segments(&source)
            .into_iter()
            .map(Segment::parse)
            .collect();

        if let Some(pos) = segments.iter().position(|s| *s == Segment::MultiWildcard) {
            if pos + 1 != segments.len() {
                return Err(RouteError::invalid_pattern(
                    source,
                    "'**' must be the last segment",
                ));
            }
        }

        let mut names = HashSet::new();
        for segment in &segments {
            if let Segment::Param(name) = segment {
                if name.is_empty() {
                    return Err(RouteError::invalid_pattern(
                        source,
                        "parameter name cannot be empty",
                    ));
                }
                if !names.insert(name.as_str()) {
                    return Err(RouteError::invalid_pattern(
                        source,
                        format!("duplicate parameter ':{name}'"),
                    ));
                }
            }
        }

        Ok(Self { source, segments })
    }

    /// The normalized template text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Only literal segments.
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    pub fn has_multi_wildcard(&self) -> bool {
        self.segments.last() == Some(&Segment::MultiWildcard)
    }

    /// Named parameters in pattern order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// The score a full match of this pattern produces.
    pub fn specificity(&self) -> u32 {
        if self.is_root() {
            ROOT_SCORE
        } else {
            self.segments.iter().map(Segment::score).sum()
        }
    }

    /// Whether both patterns match exactly the same set of paths.
    pub fn same_shape(&self, other: &RoutePattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.same_shape(b))
    }

    pub fn match_path(&self, path: &str) -> MatchResult {
        match_path(self, path)
    }

    pub fn match_prefix(&self, path: &str) -> MatchResult {
        match_prefix(self, path)
    }
}

impl FromStr for RoutePattern {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Outcome of matching one path against one pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub is_match: bool,
    pub path_params: RouteParams,
    /// Path segments consumed by a trailing `**` or left over by a prefix match
    pub remaining_segments: Vec<String>,
    pub score: u32,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self::default()
    }
}

/// Match `path` against `pattern` in full.
///
/// Segment counts must be equal unless the pattern ends in `**`, in which
/// case the path needs at least the pattern's fixed segments.
pub fn match_path(pattern: &RoutePattern, path: &str) -> MatchResult {
    match_segments(pattern, path, false)
}

/// Match only the beginning of `path` against `pattern`.
///
/// Used for shell containment: `/app` contains `/app/settings`, and the
/// leftover `settings` comes back in `remaining_segments`.
pub fn match_prefix(pattern: &RoutePattern, path: &str) -> MatchResult {
    match_segments(pattern, path, true)
}

fn match_segments(pattern: &RoutePattern, raw_path: &str, prefix: bool) -> MatchResult {
    let normalized = path::normalize(raw_path);
    let path_segments = path::segments(&normalized);

    if pattern.is_root() {
        if path_segments.is_empty() {
            return MatchResult {
                is_match: true,
                score: ROOT_SCORE,
                ..MatchResult::default()
            };
        }
        if !prefix {
            return MatchResult::no_match();
        }
    }

    let fixed = if pattern.has_multi_wildcard() {
        pattern.segments.len() - 1
    } else {
        pattern.segments.len()
    };

    if path_segments.len() < fixed {
        return MatchResult::no_match();
    }
    if !prefix && !pattern.has_multi_wildcard() && path_segments.len() != fixed {
        return MatchResult::no_match();
    }

    let mut result = MatchResult {
        is_match: true,
        ..MatchResult::default()
    };

    for (segment, value) in pattern.segments.iter().zip(&path_segments) {
        match segment {
            Segment::Literal(expected) => {
                if expected != value {
                    return MatchResult::no_match();
                }
            }
            Segment::Param(name) => {
                result.path_params.insert(name.as_str(), decode_segment(value));
            }
            Segment::Wildcard => {}
            Segment::MultiWildcard => break,
        }
        result.score += segment.score();
    }

    if pattern.has_multi_wildcard() {
        result.score += MULTI_WILDCARD_SCORE;
    }

    result.remaining_segments = path_segments[fixed..]
        .iter()
        .map(|s| (*s).to_string())
        .collect();

    result
}

fn decode_segment(segment: &str) -> String {
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> RoutePattern {
        RoutePattern::parse(p).unwrap()
    }

    #[test]
    fn test_segment_parsing() {
        assert_eq!(Segment::parse("users"), Segment::Literal("users".to_string()));
        assert_eq!(Segment::parse(":id"), Segment::Param("id".to_string()));
        assert_eq!(Segment::parse("*"), Segment::Wildcard);
        assert_eq!(Segment::parse("**"), Segment::MultiWildcard);
    }

    #[test]
    fn test_parse_rejects_inner_multi_wildcard() {
        let err = RoutePattern::parse("/files/**/raw").unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { .. }));
    }

    #[test]
    fn test_parse_rejects_bad_params() {
        assert!(RoutePattern::parse("/users/:").is_err());
        assert!(RoutePattern::parse("/a/:id/b/:id").is_err());
    }

    #[test]
    fn test_parse_normalizes_source() {
        assert_eq!(pattern("users/:id/").as_str(), "/users/:id");
        assert_eq!(pattern("").as_str(), "/");
    }

    #[test]
    fn test_literal_match() {
        let p = pattern("/users");
        assert!(p.match_path("/users").is_match);
        assert!(p.match_path("/users/").is_match);
        assert!(!p.match_path("/Users").is_match);
        assert!(!p.match_path("/users/42").is_match);
        assert_eq!(p.match_path("/users").score, 100);
    }

    #[test]
    fn test_param_capture_is_decoded() {
        let result = pattern("/files/:name").match_path("/files/my%20report");
        assert!(result.is_match);
        assert_eq!(result.path_params.get("name"), Some("my report"));
    }

    #[test]
    fn test_root_match() {
        let root = pattern("/");
        let result = root.match_path("/");
        assert!(result.is_match);
        assert_eq!(result.score, ROOT_SCORE);
        assert!(!root.match_path("/home").is_match);
    }

    #[test]
    fn test_single_wildcard_consumes_one_segment() {
        let p = pattern("/files/*");
        assert!(p.match_path("/files/a").is_match);
        assert!(!p.match_path("/files").is_match);
        assert!(!p.match_path("/files/a/b").is_match);
        assert_eq!(p.match_path("/files/a").score, 105);
    }

    #[test]
    fn test_multi_wildcard_collects_remaining() {
        let p = pattern("/docs/**");
        let result = p.match_path("/docs/guide/intro");
        assert!(result.is_match);
        assert_eq!(result.remaining_segments, vec!["guide", "intro"]);
        assert_eq!(result.score, 101);

        let bare = p.match_path("/docs");
        assert!(bare.is_match);
        assert!(bare.remaining_segments.is_empty());

        assert!(!p.match_path("/other/guide").is_match);
    }

    #[test]
    fn test_literal_outscores_param_at_same_position() {
        let literal = pattern("/users/admin/settings");
        let param = pattern("/users/:name/settings");
        let path = "/users/admin/settings";

        assert!(literal.match_path(path).score > param.match_path(path).score);
    }

    #[test]
    fn test_prefix_match() {
        let shell = pattern("/app");
        let result = shell.match_prefix("/app/settings/profile");
        assert!(result.is_match);
        assert_eq!(result.remaining_segments, vec!["settings", "profile"]);

        assert!(shell.match_prefix("/app").is_match);
        assert!(!shell.match_prefix("/apple").is_match);
        assert!(!shell.match_path("/app/settings").is_match);
    }

    #[test]
    fn test_root_prefix_contains_everything() {
        let result = pattern("/").match_prefix("/a/b");
        assert!(result.is_match);
        assert_eq!(result.remaining_segments, vec!["a", "b"]);
    }

    #[test]
    fn test_same_shape_ignores_param_names() {
        assert!(pattern("/u/:id").same_shape(&pattern("/u/:name")));
        assert!(!pattern("/u/:id").same_shape(&pattern("/u/admin")));
        assert!(!pattern("/u/:id").same_shape(&pattern("/u/:id/x")));
    }
}
