//! Navigation requests and the read-only context handed to the pipeline

use crate::matcher::RoutePattern;
use crate::params::{QueryParams, RouteParams};
use crate::path;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Opaque, shareable data attached to a navigation (body or extra).
pub type Payload = Arc<dyn Any + Send + Sync>;

/// A request to navigate somewhere.
///
/// `target_path` may carry an inline query (`/search?q=rust`). Inline values
/// come first when merged with [`query`](Self::query).
///
/// # Example
///
/// ```
/// use navigation_engine::NavigationRequest;
///
/// let request = NavigationRequest::new("/search?q=rust")
///     .query_param("page", "2")
///     .with_body(42_u32)
///     .replace();
///
/// assert!(request.is_replace);
/// assert_eq!(request.path(), "/search");
/// assert_eq!(request.merged_query().get("q"), Some("rust"));
/// assert_eq!(request.merged_query().get("page"), Some("2"));
/// ```
#[derive(Clone)]
pub struct NavigationRequest {
    pub target_path: String,
    pub query: QueryParams,
    pub body: Option<Payload>,
    /// Replace the current history entry instead of pushing
    pub is_replace: bool,
    pub extra: Option<Payload>,
}

impl NavigationRequest {
    pub fn new(target_path: impl Into<String>) -> Self {
        Self {
            target_path: target_path.into(),
            query: QueryParams::new(),
            body: None,
            is_replace: false,
            extra: None,
        }
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key, value);
        self
    }

    pub fn with_body<T: Any + Send + Sync>(mut self, body: T) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    pub fn with_extra<T: Any + Send + Sync>(mut self, extra: T) -> Self {
        self.extra = Some(Arc::new(extra));
        self
    }

    pub fn replace(mut self) -> Self {
        self.is_replace = true;
        self
    }

    /// The target path without its inline query.
    pub fn path(&self) -> &str {
        path::split_query(&self.target_path).0
    }

    /// Inline query values followed by the explicit ones.
    pub fn merged_query(&self) -> QueryParams {
        let mut query = match path::split_query(&self.target_path).1 {
            Some(raw) => QueryParams::from_query_string(raw),
            None => QueryParams::new(),
        };
        query.merge(&self.query);
        query
    }
}

impl fmt::Debug for NavigationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationRequest")
            .field("target_path", &self.target_path)
            .field("query", &self.query)
            .field("has_body", &self.body.is_some())
            .field("is_replace", &self.is_replace)
            .finish_non_exhaustive()
    }
}

impl From<&str> for NavigationRequest {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for NavigationRequest {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

/// A path bound to the route entry it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Name of the matched route entry
    pub name: String,
    pub pattern: RoutePattern,
    /// Normalized path, without query
    pub path: String,
    pub params: RouteParams,
    pub query: QueryParams,
}

impl ResolvedRoute {
    /// Path with the query appended, if any.
    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query.to_query_string())
        }
    }
}

/// What a guard or middleware sees while deciding.
#[derive(Clone)]
pub struct NavigationContext {
    pub target: ResolvedRoute,
    /// The committed route, `None` before the first navigation
    pub current: Option<ResolvedRoute>,
    pub is_replace: bool,
    pub extra: Option<Payload>,
    /// When the resolution began
    pub start_time: Instant,
}

/// Context passed to guards.
pub type GuardContext = NavigationContext;

/// Context passed to middleware.
pub type MiddlewareContext = NavigationContext;

impl NavigationContext {
    pub fn new(target: ResolvedRoute, current: Option<ResolvedRoute>) -> Self {
        Self {
            target,
            current,
            is_replace: false,
            extra: None,
            start_time: Instant::now(),
        }
    }

    pub fn target_path(&self) -> &str {
        &self.target.path
    }

    pub fn current_path(&self) -> Option<&str> {
        self.current.as_ref().map(|route| route.path.as_str())
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.target.params.get(key)
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.target.query.get(key)
    }

    /// Downcast the extra payload.
    pub fn extra_as<T: Any>(&self) -> Option<&T> {
        self.extra.as_deref()?.downcast_ref::<T>()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl fmt::Debug for NavigationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationContext")
            .field("target", &self.target.path)
            .field("current", &self.current_path())
            .field("is_replace", &self.is_replace)
            .field("has_extra", &self.extra.is_some())
            .finish_non_exhaustive()
    }
}

/// Identity of one resolution run.
///
/// A run is superseded as soon as the shared generation moves past the one
/// it was issued with.
#[derive(Debug, Clone)]
pub struct NavigationToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl NavigationToken {
    /// Start a new run on `counter`, superseding every earlier token.
    pub(crate) fn issue(counter: &Arc<AtomicU64>) -> Self {
        let generation = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self {
            generation,
            current: Arc::clone(counter),
        }
    }

    /// A token nothing else can supersede except its own handle.
    pub fn detached() -> Self {
        Self::issue(&Arc::new(AtomicU64::new(0)))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_superseded(&self) -> bool {
        self.current.load(Ordering::SeqCst) != self.generation
    }

    pub fn supersede_handle(&self) -> SupersedeHandle {
        SupersedeHandle::new(Arc::clone(&self.current))
    }
}

/// Invalidates whatever run is in flight on a router.
///
/// Cloneable and `Send`, so it can be moved into another task or into a
/// guard that needs to cancel the navigation it is part of.
#[derive(Debug, Clone)]
pub struct SupersedeHandle {
    current: Arc<AtomicU64>,
}

impl SupersedeHandle {
    pub(crate) fn new(current: Arc<AtomicU64>) -> Self {
        Self { current }
    }

    pub fn supersede(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }
}
