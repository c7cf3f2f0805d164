//! Route definitions and the route table
//!
//! A [`RouteTable`] is built once from an ordered list of [`RouteEntry`]s
//! and [`RedirectEntry`]s, validated, and then only read. Registration
//! order matters: it breaks ties between equally specific patterns.

use crate::error::RouteError;
use crate::guards::{BoxedGuard, RouteGuard};
use crate::matcher::{match_path, MatchResult, RoutePattern, Segment};
use crate::middleware::{BoxedMiddleware, RouteMiddleware};
use crate::params::RouteParams;
use crate::resolver::{best_by, build_path};
use crate::{path, warn_log};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[cfg(feature = "cache")]
use crate::cache::{CacheStats, MatchCache};
#[cfg(feature = "cache")]
use parking_lot::Mutex;

/// A named route with its own guards and middleware.
///
/// # Example
///
/// ```
/// use navigation_engine::{AuthGuard, LoggingMiddleware, RouteEntry};
///
/// let settings = RouteEntry::new("settings", "/app/settings")?
///     .parent("app")
///     .guard(AuthGuard::new(|| true, "/login"))
///     .middleware(LoggingMiddleware::new());
///
/// assert_eq!(settings.parent_name(), Some("app"));
/// # Ok::<(), navigation_engine::RouteError>(())
/// ```
pub struct RouteEntry {
    name: String,
    pattern: RoutePattern,
    guards: Vec<BoxedGuard>,
    middleware: Vec<BoxedMiddleware>,
    is_initial: bool,
    parent_name: Option<String>,
}

impl RouteEntry {
    /// Parse `pattern` and create an entry for it.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, RouteError> {
        Ok(Self::from_pattern(name, RoutePattern::parse(pattern)?))
    }

    pub fn from_pattern(name: impl Into<String>, pattern: RoutePattern) -> Self {
        Self {
            name: name.into(),
            pattern,
            guards: Vec::new(),
            middleware: Vec::new(),
            is_initial: false,
            parent_name: None,
        }
    }

    /// Add a guard that runs only for this route and its descendants.
    pub fn guard<G: RouteGuard>(mut self, guard: G) -> Self {
        self.guards.push(Box::new(guard));
        self
    }

    pub fn guards(mut self, guards: Vec<BoxedGuard>) -> Self {
        self.guards.extend(guards);
        self
    }

    /// Add middleware that runs only for this route and its descendants.
    pub fn middleware<M: RouteMiddleware>(mut self, middleware: M) -> Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    pub fn middlewares(mut self, middleware: Vec<BoxedMiddleware>) -> Self {
        self.middleware.extend(middleware);
        self
    }

    /// Mark as the route to show first.
    pub fn initial(mut self) -> Self {
        self.is_initial = true;
        self
    }

    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.parent_name = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn route_guards(&self) -> &[BoxedGuard] {
        &self.guards
    }

    pub fn route_middleware(&self) -> &[BoxedMiddleware] {
        &self.middleware
    }

    pub fn is_initial(&self) -> bool {
        self.is_initial
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent_name.as_deref()
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field(
                "guards",
                &self.guards.iter().map(|g| g.name()).collect::<Vec<_>>(),
            )
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field("is_initial", &self.is_initial)
            .field("parent_name", &self.parent_name)
            .finish()
    }
}

/// A static redirect rule.
///
/// The target may reuse parameters captured by `from`, and a target ending
/// in `/**` receives whatever a trailing `**` in `from` matched.
///
/// ```
/// use navigation_engine::RedirectEntry;
///
/// let moved = RedirectEntry::new("/blog/:slug", "/posts/:slug")?.permanent();
/// assert_eq!(moved.target_for("/blog/hello").unwrap()?, "/posts/hello");
///
/// let docs = RedirectEntry::new("/docs/v1/**", "/docs/latest/**")?;
/// assert_eq!(docs.target_for("/docs/v1/guide/intro").unwrap()?, "/docs/latest/guide/intro");
///
/// assert!(moved.target_for("/elsewhere").is_none());
/// # Ok::<(), navigation_engine::RouteError>(())
/// ```
#[derive(Debug, Clone)]
pub struct RedirectEntry {
    from: RoutePattern,
    to: String,
    permanent: bool,
}

impl RedirectEntry {
    pub fn new(from: &str, to: impl Into<String>) -> Result<Self, RouteError> {
        Ok(Self {
            from: RoutePattern::parse(from)?,
            to: to.into(),
            permanent: false,
        })
    }

    pub fn permanent(mut self) -> Self {
        self.permanent = true;
        self
    }

    pub fn from_pattern(&self) -> &RoutePattern {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    /// The redirect target for `path`, or `None` if this rule does not apply.
    ///
    /// Fails when the target names a parameter `from` does not capture.
    pub fn target_for(&self, path: &str) -> Option<Result<String, RouteError>> {
        let matched = self.from.match_path(path);
        if !matched.is_match {
            return None;
        }
        Some(self.substitute(&matched))
    }

    fn substitute(&self, matched: &MatchResult) -> Result<String, RouteError> {
        let (target, query) = path::split_query(&self.to);
        let segments = path::segments(target);
        let mut out = String::new();

        for (i, raw) in segments.iter().enumerate() {
            match Segment::parse(raw) {
                Segment::Param(name) => {
                    let value = matched.path_params.get(&name).ok_or_else(|| {
                        RouteError::MissingPathParameter {
                            pattern: self.to.clone(),
                            name: name.clone(),
                        }
                    })?;
                    out.push('/');
                    out.push_str(&urlencoding::encode(value));
                }
                Segment::MultiWildcard if i + 1 == segments.len() => {
                    for rest in &matched.remaining_segments {
                        out.push('/');
                        out.push_str(rest);
                    }
                }
                _ => {
                    out.push('/');
                    out.push_str(raw);
                }
            }
        }

        if out.is_empty() {
            out.push('/');
        }
        if let Some(query) = query {
            out.push('?');
            out.push_str(query);
        }
        Ok(out)
    }
}

/// Validated, immutable set of routes and redirects.
pub struct RouteTable {
    routes: Vec<RouteEntry>,
    redirects: Vec<RedirectEntry>,
    by_name: HashMap<String, usize>,
    #[cfg(feature = "cache")]
    cache: Mutex<MatchCache>,
}

impl RouteTable {
    /// Build and validate a table.
    ///
    /// Fails on duplicate names, unknown parents or parent cycles.
    /// Suspicious but legal tables (several initial routes, patterns that
    /// can never win a tie) are only logged.
    pub fn new(routes: Vec<RouteEntry>, redirects: Vec<RedirectEntry>) -> Result<Self, RouteError> {
        Self::build(routes, redirects, DEFAULT_CACHE_CAPACITY)
    }

    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    #[cfg_attr(not(feature = "cache"), allow(unused_variables))]
    fn build(
        routes: Vec<RouteEntry>,
        redirects: Vec<RedirectEntry>,
        cache_capacity: usize,
    ) -> Result<Self, RouteError> {
        let mut by_name = HashMap::with_capacity(routes.len());
        for (index, route) in routes.iter().enumerate() {
            if by_name.insert(route.name.clone(), index).is_some() {
                return Err(RouteError::DuplicateRouteName {
                    name: route.name.clone(),
                });
            }
        }

        let table = Self {
            routes,
            redirects,
            by_name,
            #[cfg(feature = "cache")]
            cache: Mutex::new(MatchCache::with_capacity(cache_capacity)),
        };
        table.validate_parents()?;
        table.warn_suspicious();
        Ok(table)
    }

    fn validate_parents(&self) -> Result<(), RouteError> {
        for route in &self.routes {
            let mut seen = HashSet::new();
            seen.insert(route.name.as_str());

            let mut cursor = route;
            while let Some(parent_name) = cursor.parent_name() {
                let Some(parent) = self.get(parent_name) else {
                    return Err(RouteError::UnknownParent {
                        route: cursor.name.clone(),
                        parent: parent_name.to_string(),
                    });
                };
                if !seen.insert(parent.name.as_str()) {
                    return Err(RouteError::ParentCycle {
                        route: route.name.clone(),
                    });
                }
                cursor = parent;
            }
        }
        Ok(())
    }

    fn warn_suspicious(&self) {
        let initial: Vec<&str> = self
            .routes
            .iter()
            .filter(|r| r.is_initial)
            .map(|r| r.name())
            .collect();
        if initial.len() > 1 {
            warn_log!(
                "Several initial routes ({}); '{}' is used",
                initial.join(", "),
                initial[0]
            );
        }

        for (i, later) in self.routes.iter().enumerate() {
            if let Some(earlier) = self.routes[..i]
                .iter()
                .find(|r| r.pattern.same_shape(&later.pattern))
            {
                warn_log!(
                    "Route '{}' ({}) is shadowed by '{}' ({}) and can never match",
                    later.name,
                    later.pattern,
                    earlier.name,
                    earlier.pattern
                );
            }

            if let Some(parent) = later.parent_name().and_then(|name| self.get(name)) {
                if !parent.pattern.match_prefix(later.pattern.as_str()).is_match {
                    warn_log!(
                        "Route '{}' ({}) is not nested under its parent '{}' ({})",
                        later.name,
                        later.pattern,
                        parent.name,
                        parent.pattern
                    );
                }
            }
        }
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn redirects(&self) -> &[RedirectEntry] {
        &self.redirects
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RouteEntry> {
        self.by_name.get(name).map(|&index| &self.routes[index])
    }

    /// The first route marked initial.
    pub fn initial(&self) -> Option<&RouteEntry> {
        self.routes.iter().find(|r| r.is_initial)
    }

    /// Best route for `path` (query ignored).
    pub fn find(&self, path: &str) -> Option<(&RouteEntry, MatchResult)> {
        let (path, _) = path::split_query(path);
        let path = path::normalize(path);

        #[cfg(feature = "cache")]
        {
            let mut cache = self.cache.lock();
            let found = match cache.get(&path) {
                Some(hit) => hit,
                None => {
                    let computed = self.compute_match(&path);
                    cache.insert(path.clone().into_owned(), computed.clone());
                    computed
                }
            };
            found.map(|(index, result)| (&self.routes[index], result))
        }

        #[cfg(not(feature = "cache"))]
        {
            self.compute_match(&path)
                .map(|(index, result)| (&self.routes[index], result))
        }
    }

    fn compute_match(&self, path: &str) -> Option<(usize, MatchResult)> {
        best_by(&self.routes, path, RouteEntry::pattern, match_path)
    }

    /// Routes whose pattern contains `path` as a prefix, most specific first.
    ///
    /// ```
    /// use navigation_engine::{RouteEntry, RouteTable};
    ///
    /// let table = RouteTable::builder()
    ///     .route(RouteEntry::new("root", "/")?)
    ///     .route(RouteEntry::new("app", "/app")?)
    ///     .route(RouteEntry::new("settings", "/app/settings")?)
    ///     .build()?;
    ///
    /// let shells: Vec<&str> = table
    ///     .enclosing_routes("/app/settings/theme")
    ///     .iter()
    ///     .map(|(route, _)| route.name())
    ///     .collect();
    /// assert_eq!(shells, vec!["settings", "app", "root"]);
    /// # Ok::<(), navigation_engine::RouteError>(())
    /// ```
    pub fn enclosing_routes(&self, path: &str) -> Vec<(&RouteEntry, MatchResult)> {
        let (path, _) = path::split_query(path);
        let mut found: Vec<(&RouteEntry, MatchResult)> = self
            .routes
            .iter()
            .filter_map(|route| {
                let result = route.pattern.match_prefix(path);
                result.is_match.then_some((route, result))
            })
            .collect();
        // Root prefix-matches with ROOT_SCORE, but it encloses everything.
        found.sort_by_key(|(route, result)| {
            std::cmp::Reverse(if route.pattern.is_root() { 0 } else { result.score })
        });
        found
    }

    /// First redirect rule that applies to `path`, with its target.
    pub fn redirect_for(&self, path: &str) -> Option<(&RedirectEntry, Result<String, RouteError>)> {
        self.redirects
            .iter()
            .find_map(|entry| entry.target_for(path).map(|target| (entry, target)))
    }

    /// `route` and its ancestors, outermost first.
    pub fn lineage<'a>(&'a self, route: &'a RouteEntry) -> Vec<&'a RouteEntry> {
        let mut chain = vec![route];
        let mut cursor = route;
        // Parents were validated acyclic; the bound only guards the loop.
        while chain.len() <= self.routes.len() {
            match cursor.parent_name().and_then(|name| self.get(name)) {
                Some(parent) => {
                    chain.push(parent);
                    cursor = parent;
                }
                None => break,
            }
        }
        chain.reverse();
        chain
    }

    /// Build the path of the route named `name`.
    pub fn url_for(&self, name: &str, params: &RouteParams) -> Result<String, RouteError> {
        let route = self.get(name).ok_or_else(|| RouteError::UnknownRoute {
            name: name.to_string(),
        })?;
        build_path(&route.pattern, params)
    }

    #[cfg(feature = "cache")]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    #[cfg(feature = "cache")]
    pub(crate) fn resize_cache(&self, capacity: usize) {
        self.cache.lock().resize(capacity);
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes)
            .field("redirects", &self.redirects)
            .finish_non_exhaustive()
    }
}

/// Default capacity of the match cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Builder for [`RouteTable`].
#[derive(Debug)]
pub struct RouteTableBuilder {
    routes: Vec<RouteEntry>,
    redirects: Vec<RedirectEntry>,
    cache_capacity: usize,
}

impl Default for RouteTableBuilder {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            redirects: Vec::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl RouteTableBuilder {
    pub fn route(mut self, route: RouteEntry) -> Self {
        self.routes.push(route);
        self
    }

    pub fn redirect(mut self, redirect: RedirectEntry) -> Self {
        self.redirects.push(redirect);
        self
    }

    /// Entries kept by the match cache (`cache` feature only).
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<RouteTable, RouteError> {
        RouteTable::build(self.routes, self.redirects, self.cache_capacity)
    }
}
