//! The navigation entry point
//!
//! [`Router`] owns the route table, the global pipelines, the history, and
//! the committed route. Every navigation goes through [`Router::resolve`],
//! which takes `&mut self`, so only one resolution can be in flight at a time.
//!
//! # Example
//!
//! ```
//! use navigation_engine::{AuthGuard, NavigationRequest, RouteEntry, RouteTable, Router};
//!
//! # fn main() -> Result<(), navigation_engine::RouteError> {
//! let table = RouteTable::builder()
//!     .route(RouteEntry::new("home", "/")?.initial())
//!     .route(RouteEntry::new("login", "/login")?)
//!     .route(RouteEntry::new("user", "/users/:id")?)
//!     .build()?;
//!
//! let mut router = Router::new(table);
//! router
//!     .guards_mut()
//!     .register(AuthGuard::new(|| false, "/login").routes(["/users/**"]));
//!
//! let outcome = pollster::block_on(router.resolve(NavigationRequest::new("/users/7")))?;
//! let nav = outcome.into_result()?;
//!
//! assert_eq!(nav.route.name, "login");
//! assert_eq!(nav.route.query.get("redirect"), Some("/users/7"));
//! assert_eq!(router.history().len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::context::{
    NavigationContext, NavigationRequest, NavigationToken, ResolvedRoute, SupersedeHandle,
};
use crate::error::{ResolutionOutcome, ResolvedNavigation, RouteError};
use crate::guards::GuardPipeline;
use crate::history::{HistoryEntry, NavigationEvent, NavigationHistory, DEFAULT_MAX_HISTORY};
use crate::middleware::{run_after_navigation, MiddlewarePipeline, RouteMiddleware};
use crate::params::{QueryParams, RouteParams};
use crate::redirect::{RedirectResolver, DEFAULT_MAX_REDIRECTS};
use crate::resolver::build_path;
use crate::route::RouteTable;
use crate::{debug_log, info_log, path, warn_log};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

/// Router configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOptions {
    /// History entries kept before the oldest is evicted
    pub max_history: usize,
    /// Redirects followed before giving up with a loop
    pub max_redirects: usize,
    /// Overrides the table's match cache size (`cache` feature only)
    pub cache_capacity: Option<usize>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            cache_capacity: None,
        }
    }
}

impl RouterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = Some(cache_capacity);
        self
    }
}

/// Resolves navigations and keeps track of where the application is.
pub struct Router {
    table: RouteTable,
    guards: GuardPipeline,
    middleware: MiddlewarePipeline,
    history: NavigationHistory,
    current: Option<ResolvedRoute>,
    last_event: Option<NavigationEvent>,
    options: RouterOptions,
    generation: Arc<AtomicU64>,
}

impl Router {
    pub fn new(table: RouteTable) -> Self {
        Self::with_options(table, RouterOptions::default())
    }

    pub fn with_options(table: RouteTable, options: RouterOptions) -> Self {
        #[cfg(feature = "cache")]
        if let Some(capacity) = options.cache_capacity {
            table.resize_cache(capacity);
        }

        Self {
            table,
            guards: GuardPipeline::new(),
            middleware: MiddlewarePipeline::new(),
            history: NavigationHistory::with_max_size(options.max_history),
            current: None,
            last_event: None,
            options,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    pub fn guards(&self) -> &GuardPipeline {
        &self.guards
    }

    pub fn guards_mut(&mut self) -> &mut GuardPipeline {
        &mut self.guards
    }

    pub fn middleware(&self) -> &MiddlewarePipeline {
        &self.middleware
    }

    pub fn middleware_mut(&mut self) -> &mut MiddlewarePipeline {
        &mut self.middleware
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    /// The committed route, `None` before the first navigation.
    pub fn current_route(&self) -> Option<&ResolvedRoute> {
        self.current.as_ref()
    }

    /// How the history cursor moved on the last commit, back or forward.
    pub fn last_event(&self) -> Option<&NavigationEvent> {
        self.last_event.as_ref()
    }

    /// A handle that invalidates whichever resolution is in flight.
    pub fn supersede_handle(&self) -> SupersedeHandle {
        SupersedeHandle::new(Arc::clone(&self.generation))
    }

    /// Path of the initial route, when it needs no parameters.
    pub fn initial_path(&self) -> Option<String> {
        let initial = self.table.initial()?;
        build_path(initial.pattern(), &RouteParams::new()).ok()
    }

    /// Navigate to the initial route, or to `/` when there is none.
    pub async fn start(&mut self) -> Result<ResolutionOutcome, RouteError> {
        let path = self.initial_path().unwrap_or_else(|| "/".to_string());
        self.resolve(NavigationRequest::new(path)).await
    }

    /// Shorthand for resolving a plain push to `path`.
    pub async fn navigate(&mut self, path: &str) -> Result<ResolutionOutcome, RouteError> {
        self.resolve(NavigationRequest::new(path)).await
    }

    /// Shorthand for resolving a replace of the current entry with `path`.
    pub async fn replace(&mut self, path: &str) -> Result<ResolutionOutcome, RouteError> {
        self.resolve(NavigationRequest::new(path).replace()).await
    }

    /// Run a navigation through redirects, guards and middleware, and
    /// commit it if it resolves.
    ///
    /// On `Resolved`, the history and current route are updated and then
    /// every middleware's `after_navigation` runs. Any other outcome, or an
    /// error, leaves the router untouched.
    pub async fn resolve(
        &mut self,
        request: impl Into<NavigationRequest>,
    ) -> Result<ResolutionOutcome, RouteError> {
        let request = request.into();
        let token = NavigationToken::issue(&self.generation);
        let started_at = Instant::now();
        debug_log!(
            "Resolving {} (generation {})",
            request.target_path,
            token.generation()
        );

        let resolver = RedirectResolver::new(&self.table, &self.guards, &self.middleware)
            .max_redirects(self.options.max_redirects)
            .started_at(started_at);
        let mut outcome = resolver
            .resolve(&request, self.current.as_ref(), &token)
            .await?;

        if token.is_superseded() {
            debug_log!("Discarding superseded resolution of {}", request.target_path);
            return Ok(ResolutionOutcome::Superseded);
        }

        match &mut outcome {
            ResolutionOutcome::Resolved(nav) => {
                let previous = self.commit(nav);
                let failures = self.after_navigation(nav, previous, started_at).await;
                nav.after_navigation_failures = failures;
                info_log!("Navigated to {} in {:?}", nav.route.path, started_at.elapsed());
            }
            other => {
                debug_log!("Resolution of {} ended without commit: {:?}", request.target_path, other);
            }
        }

        Ok(outcome)
    }

    /// Record `nav` and make it current. Returns the route it replaces.
    fn commit(&mut self, nav: &ResolvedNavigation) -> Option<ResolvedRoute> {
        let entry = HistoryEntry::new(nav.route.full_path(), nav.route.name.clone());
        let event = if nav.is_replace {
            self.history.replace(entry)
        } else {
            self.history.push(entry)
        };
        self.last_event = Some(event);
        self.current.replace(nav.route.clone())
    }

    async fn after_navigation(
        &self,
        nav: &ResolvedNavigation,
        previous: Option<ResolvedRoute>,
        started_at: Instant,
    ) -> Vec<String> {
        let mut ctx = NavigationContext::new(nav.route.clone(), previous);
        ctx.is_replace = nav.is_replace;
        ctx.extra = nav.extra.clone();
        ctx.start_time = started_at;

        let lineage = self
            .table
            .get(&nav.route.name)
            .map(|entry| self.table.lineage(entry))
            .unwrap_or_default();
        let route_middleware = lineage.iter().copied().flat_map(|route| {
            route
                .route_middleware()
                .iter()
                .map(|m| &**m as &dyn RouteMiddleware)
        });

        run_after_navigation(self.middleware.iter().chain(route_middleware), &ctx).await
    }

    /// Step back in history. Guards are not consulted.
    pub fn back(&mut self) -> Option<&ResolvedRoute> {
        self.last_event = Some(self.history.back()?);
        self.sync_current();
        self.current.as_ref()
    }

    /// Step forward in history. Guards are not consulted.
    pub fn forward(&mut self) -> Option<&ResolvedRoute> {
        self.last_event = Some(self.history.forward()?);
        self.sync_current();
        self.current.as_ref()
    }

    /// Drop the current entry and return to the previous one.
    pub fn pop(&mut self) -> Option<HistoryEntry> {
        let popped = self.history.pop()?;
        self.sync_current();
        Some(popped)
    }

    /// Pop history entries until the top satisfies `predicate` or one
    /// entry is left. Returns the popped entries, most recent first.
    pub fn pop_until<F>(&mut self, predicate: F) -> Vec<HistoryEntry>
    where
        F: FnMut(&HistoryEntry) -> bool,
    {
        let popped = self.history.pop_until(predicate);
        if !popped.is_empty() {
            self.sync_current();
        }
        popped
    }

    /// Rebuild the current route from the history cursor.
    fn sync_current(&mut self) {
        let Some(entry) = self.history.current() else {
            self.current = None;
            return;
        };
        let (path, query) = path::split_query(&entry.path);

        self.current = match self.table.find(path) {
            Some((route, matched)) => Some(ResolvedRoute {
                name: route.name().to_string(),
                pattern: route.pattern().clone(),
                path: path::normalize(path).into_owned(),
                params: matched.path_params,
                query: query
                    .map(QueryParams::from_query_string)
                    .unwrap_or_default(),
            }),
            None => {
                warn_log!("History entry {} no longer matches a route", entry.path);
                None
            }
        };
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.table.len())
            .field("guards", &self.guards)
            .field("middleware", &self.middleware)
            .field("history", &self.history.len())
            .field("current", &self.current.as_ref().map(|r| r.path.as_str()))
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::GuardResult;
    use crate::history::NavigationDirection;
    use crate::{guard_fn, RouteEntry};

    fn router() -> Router {
        let table = RouteTable::builder()
            .route(RouteEntry::new("home", "/").unwrap().initial())
            .route(RouteEntry::new("users", "/users").unwrap())
            .route(RouteEntry::new("user", "/users/:id").unwrap())
            .build()
            .unwrap();
        Router::with_options(table, RouterOptions::new().max_history(5))
    }

    #[test]
    fn test_options_builder() {
        let options = RouterOptions::new()
            .max_history(3)
            .max_redirects(2)
            .cache_capacity(16);
        assert_eq!(options.max_history, 3);
        assert_eq!(options.max_redirects, 2);
        assert_eq!(options.cache_capacity, Some(16));
        assert_eq!(RouterOptions::default().cache_capacity, None);
        assert_eq!(RouterOptions::default().max_redirects, 10);
    }

    #[test]
    fn test_start_uses_initial_route() {
        let mut router = router();
        assert_eq!(router.initial_path().as_deref(), Some("/"));

        let outcome = pollster::block_on(router.start()).unwrap();
        assert!(outcome.is_resolved());
        assert_eq!(router.current_route().unwrap().name, "home");
    }

    #[test]
    fn test_commit_push_and_replace() {
        let mut router = router();
        pollster::block_on(router.navigate("/")).unwrap();
        pollster::block_on(router.navigate("/users")).unwrap();
        pollster::block_on(router.replace("/users/3?tab=posts")).unwrap();

        let paths: Vec<&str> = router.history().entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/users/3?tab=posts"]);

        let current = router.current_route().unwrap();
        assert_eq!(current.params.get("id"), Some("3"));
        assert_eq!(current.query.get("tab"), Some("posts"));
    }

    #[test]
    fn test_denied_leaves_state_untouched() {
        let mut router = router();
        pollster::block_on(router.navigate("/")).unwrap();
        router
            .guards_mut()
            .register(guard_fn(|_| async { GuardResult::deny("closed") }).routes(["/users/**"]));

        let outcome = pollster::block_on(router.navigate("/users/1")).unwrap();
        assert!(outcome.is_denied());
        assert_eq!(router.history().len(), 1);
        assert_eq!(router.current_route().unwrap().path, "/");
    }

    #[test]
    fn test_back_forward_refresh_current() {
        let mut router = router();
        for path in ["/", "/users", "/users/9"] {
            pollster::block_on(router.navigate(path)).unwrap();
        }

        assert_eq!(router.back().map(|r| r.name.as_str()), Some("users"));
        assert_eq!(router.back().map(|r| r.name.as_str()), Some("home"));
        assert!(router.back().is_none());

        let forward = router.forward().unwrap();
        assert_eq!(forward.name, "users");
    }

    #[test]
    fn test_last_event_tracks_history_moves() {
        let mut router = router();
        assert!(router.last_event().is_none());

        pollster::block_on(router.navigate("/")).unwrap();
        pollster::block_on(router.replace("/users")).unwrap();
        let event = router.last_event().unwrap();
        assert_eq!(event.direction, NavigationDirection::Replace);
        assert_eq!(event.from.as_deref(), Some("/"));
        assert_eq!(event.to, "/users");

        pollster::block_on(router.navigate("/users/4")).unwrap();
        assert_eq!(router.last_event().unwrap().direction, NavigationDirection::Push);

        router.back();
        let event = router.last_event().unwrap();
        assert_eq!(event.direction, NavigationDirection::Back);
        assert_eq!(event.to, "/users");

        // A denied navigation leaves the last event alone.
        router
            .guards_mut()
            .register(guard_fn(|_| async { GuardResult::deny("closed") }));
        pollster::block_on(router.navigate("/")).unwrap();
        assert_eq!(router.last_event().unwrap().direction, NavigationDirection::Back);
    }

    #[test]
    fn test_pop_until() {
        let mut router = router();
        for path in ["/", "/users", "/users/1", "/users/2"] {
            pollster::block_on(router.navigate(path)).unwrap();
        }

        let popped = router.pop_until(|e| e.resolved_name == "users");
        assert_eq!(popped.len(), 2);
        assert_eq!(router.current_route().unwrap().name, "users");
        assert_eq!(router.history().previous_path(), Some("/"));

        let popped = router.pop().unwrap();
        assert_eq!(popped.path, "/users");
        assert_eq!(router.current_route().unwrap().name, "home");
        assert!(!router.history().can_go_back());
    }

    #[cfg(feature = "cache")]
    fn small_table() -> RouteTable {
        RouteTable::builder()
            .route(RouteEntry::new("user", "/users/:id").unwrap())
            .cache_capacity(2)
            .build()
            .unwrap()
    }

    #[cfg(feature = "cache")]
    fn lookup_twice(router: &Router) -> crate::CacheStats {
        for _ in 0..2 {
            for id in 0..5 {
                router.table().find(&format!("/users/{id}"));
            }
        }
        router.table().cache_stats()
    }

    #[cfg(feature = "cache")]
    #[test]
    fn test_table_cache_capacity_survives_default_options() {
        let router = Router::new(small_table());
        let stats = lookup_twice(&router);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 10);
    }

    #[cfg(feature = "cache")]
    #[test]
    fn test_options_override_cache_capacity() {
        let router = Router::with_options(small_table(), RouterOptions::new().cache_capacity(8));
        let stats = lookup_twice(&router);
        assert_eq!(stats.hits, 5);
        assert_eq!(stats.misses, 5);
    }
}
