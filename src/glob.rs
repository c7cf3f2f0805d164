//! Glob matching for guard and middleware scoping
//!
//! Globs decide *whether* a guard or middleware runs for a path. They never
//! capture values, which is what separates them from [`RoutePattern`].
//!
//! | Glob            | Matches                                        |
//! |-----------------|------------------------------------------------|
//! | `*` or `**`     | every path                                     |
//! | `/admin`        | exactly `/admin`                               |
//! | `/admin/**`     | `/admin` and everything below it              |
//! | `/user/*`       | `/user/42`, not `/user` and not `/user/42/x`   |
//! | `/img/*.png`    | `/img/logo.png`; `*` never crosses a `/`       |
//!
//! [`RoutePattern`]: crate::RoutePattern

use crate::path;
use crate::warn_log;
use regex::Regex;

#[derive(Debug, Clone)]
enum GlobKind {
    Any,
    Exact(String),
    Subtree(String),
    Segments(Regex),
}

/// A compiled glob.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    kind: GlobKind,
}

impl GlobPattern {
    pub fn new(glob: impl Into<String>) -> Self {
        let source = glob.into();
        let kind = Self::compile(&source);
        Self { source, kind }
    }

    fn compile(glob: &str) -> GlobKind {
        let trimmed = glob.trim();
        if trimmed == "*" || trimmed == "**" {
            return GlobKind::Any;
        }

        let normalized = path::normalize(trimmed).into_owned();

        if let Some(prefix) = normalized.strip_suffix("/**") {
            if !prefix.contains('*') {
                return if prefix.is_empty() {
                    GlobKind::Any
                } else {
                    GlobKind::Subtree(prefix.to_string())
                };
            }
        }

        if !normalized.contains('*') {
            return GlobKind::Exact(normalized);
        }

        let body = normalized
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("[^/]*");
        match Regex::new(&format!("^{body}$")) {
            Ok(regex) => GlobKind::Segments(regex),
            Err(err) => {
                warn_log!("Glob '{}' did not compile ({}); matching it literally", glob, err);
                GlobKind::Exact(normalized)
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        let (path, _) = path::split_query(path);
        let path = path::normalize(path);
        match &self.kind {
            GlobKind::Any => true,
            GlobKind::Exact(expected) => *expected == path,
            GlobKind::Subtree(prefix) => {
                path == prefix.as_str()
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            GlobKind::Segments(regex) => regex.is_match(&path),
        }
    }
}

impl From<&str> for GlobPattern {
    fn from(glob: &str) -> Self {
        Self::new(glob)
    }
}

impl From<String> for GlobPattern {
    fn from(glob: String) -> Self {
        Self::new(glob)
    }
}

/// One-shot glob check. Prefer [`GlobPattern`] when matching repeatedly.
///
/// ```
/// use navigation_engine::glob::glob_matches;
///
/// assert!(glob_matches("/admin/**", "/admin/users/1"));
/// assert!(glob_matches("/user/*", "/user/42"));
/// assert!(!glob_matches("/user/*", "/user/42/edit"));
/// ```
pub fn glob_matches(glob: &str, path: &str) -> bool {
    GlobPattern::new(glob).matches(path)
}

/// Include/exclude scoping shared by guards and middleware.
///
/// No include list means "every path". Exclusion always wins.
///
/// # Example
///
/// ```
/// use navigation_engine::RouteFilter;
///
/// let filter = RouteFilter::all()
///     .include(["/admin/**"])
///     .exclude(["/admin/public"]);
///
/// assert!(filter.applies_to("/admin/dashboard"));
/// assert!(!filter.applies_to("/admin/public"));
/// assert!(!filter.applies_to("/home"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteFilter {
    include: Option<Vec<GlobPattern>>,
    exclude: Vec<GlobPattern>,
}

impl RouteFilter {
    /// A filter that applies everywhere.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to paths matching any of `globs`, added to earlier includes.
    pub fn include<I, G>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<GlobPattern>,
    {
        self.include
            .get_or_insert_with(Vec::new)
            .extend(globs.into_iter().map(Into::into));
        self
    }

    /// Skip paths matching any of `globs`.
    pub fn exclude<I, G>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<GlobPattern>,
    {
        self.exclude.extend(globs.into_iter().map(Into::into));
        self
    }

    pub fn applies_to(&self, path: &str) -> bool {
        if self.exclude.iter().any(|g| g.matches(path)) {
            return false;
        }
        match &self.include {
            None => true,
            Some(globs) => globs.iter().any(|g| g.matches(path)),
        }
    }
}

/// Builder methods for types that carry `filter: RouteFilter` and
/// `priority: i32` fields.
macro_rules! scoped_builders {
    ($ty:ident $(<$($gen:ident),+>)?) => {
        impl$(<$($gen),+>)? $ty$(<$($gen),+>)? {
            /// Only run for paths matching one of these globs.
            pub fn routes<I, G>(mut self, globs: I) -> Self
            where
                I: IntoIterator<Item = G>,
                G: Into<$crate::glob::GlobPattern>,
            {
                self.filter = self.filter.include(globs);
                self
            }

            /// Never run for paths matching one of these globs.
            pub fn exclude_routes<I, G>(mut self, globs: I) -> Self
            where
                I: IntoIterator<Item = G>,
                G: Into<$crate::glob::GlobPattern>,
            {
                self.filter = self.filter.exclude(globs);
                self
            }

            /// Override the execution priority (higher runs first).
            pub fn with_priority(mut self, priority: i32) -> Self {
                self.priority = priority;
                self
            }
        }
    };
}

pub(crate) use scoped_builders;
