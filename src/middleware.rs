//! Route middleware trait and types
//!
//! Middleware handles cross-cutting concerns around a navigation: logging,
//! throttling, analytics. `before_navigation` runs after the guards and can
//! still abort or redirect. `after_navigation` runs once the navigation has
//! committed and cannot change anything.
//!
//! # Example
//!
//! ```
//! use navigation_engine::{MiddlewareContext, MiddlewareFuture, MiddlewareResult, RouteMiddleware};
//!
//! struct ReadOnlyMode;
//!
//! impl RouteMiddleware for ReadOnlyMode {
//!     fn before_navigation(&self, ctx: &MiddlewareContext) -> MiddlewareFuture {
//!         let editing = ctx.target_path().ends_with("/edit");
//!         Box::pin(async move {
//!             Ok(if editing {
//!                 MiddlewareResult::abort("read-only mode")
//!             } else {
//!                 MiddlewareResult::Continue
//!             })
//!         })
//!     }
//!
//!     fn name(&self) -> &str {
//!         "ReadOnlyMode"
//!     }
//! }
//! ```

use crate::context::{MiddlewareContext, NavigationToken};
use crate::error::{BoxError, PipelineStage, RouteError};
use crate::glob::{scoped_builders, RouteFilter};
use crate::params::QueryParams;
use crate::{debug_log, error_log, info_log, trace_log};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

/// Future returned by [`RouteMiddleware::before_navigation`].
pub type MiddlewareFuture =
    Pin<Box<dyn Future<Output = Result<MiddlewareResult, BoxError>> + Send>>;

/// Future returned by [`RouteMiddleware::after_navigation`].
pub type AfterNavigationFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

/// Decision of a middleware's `before_navigation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareResult {
    Continue,
    Abort { reason: String },
    Redirect { to: String, query: QueryParams },
}

impl MiddlewareResult {
    pub fn abort(reason: impl Into<String>) -> Self {
        MiddlewareResult::Abort {
            reason: reason.into(),
        }
    }

    pub fn redirect(to: impl Into<String>) -> Self {
        MiddlewareResult::Redirect {
            to: to.into(),
            query: QueryParams::new(),
        }
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, MiddlewareResult::Continue)
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, MiddlewareResult::Abort { .. })
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, MiddlewareResult::Redirect { .. })
    }
}

/// Middleware that processes navigation requests.
pub trait RouteMiddleware: Send + Sync + 'static {
    /// Called after the guards allowed, before the navigation commits.
    fn before_navigation(&self, ctx: &MiddlewareContext) -> MiddlewareFuture;

    /// Called after the navigation committed.
    ///
    /// Runs for every registered middleware, whatever [`applies_to`] says.
    /// Errors are logged and reported, never propagated.
    ///
    /// [`applies_to`]: RouteMiddleware::applies_to
    fn after_navigation(&self, _ctx: &MiddlewareContext) -> AfterNavigationFuture {
        Box::pin(async { Ok(()) })
    }

    /// Middleware name for debugging
    fn name(&self) -> &str {
        "RouteMiddleware"
    }

    /// Middleware priority (higher runs first)
    fn priority(&self) -> i32 {
        0
    }

    /// Whether `before_navigation` runs for `path`.
    fn applies_to(&self, _path: &str) -> bool {
        true
    }
}

/// Type-erased middleware for dynamic dispatch
pub type BoxedMiddleware = Box<dyn RouteMiddleware>;

/// Result of running a set of middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareVerdict {
    pub result: MiddlewareResult,
    /// Name of the middleware that ended the run, `None` when all continued
    pub decided_by: Option<String>,
}

fn by_priority<'a, I>(middleware: I) -> Vec<&'a dyn RouteMiddleware>
where
    I: IntoIterator<Item = &'a dyn RouteMiddleware>,
{
    let mut ordered: Vec<_> = middleware.into_iter().collect();
    ordered.sort_by_key(|m| Reverse(m.priority()));
    ordered
}

/// Run `before_navigation` on every applicable middleware in priority order.
///
/// Stops at the first result that is not `Continue`. Supersession is checked
/// after each await, as in [`run_guards`](crate::guards::run_guards).
pub async fn run_middleware<'a, I>(
    middleware: I,
    ctx: &MiddlewareContext,
    token: &NavigationToken,
) -> Result<MiddlewareVerdict, RouteError>
where
    I: IntoIterator<Item = &'a dyn RouteMiddleware>,
{
    let path = ctx.target_path();
    let ordered = by_priority(middleware.into_iter().filter(|m| m.applies_to(path)));

    for m in ordered {
        trace_log!("Running middleware '{}' for {}", m.name(), path);
        let outcome = m.before_navigation(ctx).await;

        if token.is_superseded() {
            debug_log!("Middleware '{}' finished after its run was superseded", m.name());
            return Err(RouteError::Superseded);
        }

        let result = outcome.map_err(|source| RouteError::PipelineFailure {
            stage: PipelineStage::Middleware,
            name: m.name().to_string(),
            source,
        })?;

        if !result.is_continue() {
            debug_log!("Middleware '{}' stopped {}: {:?}", m.name(), path, result);
            return Ok(MiddlewareVerdict {
                result,
                decided_by: Some(m.name().to_string()),
            });
        }
    }

    Ok(MiddlewareVerdict {
        result: MiddlewareResult::Continue,
        decided_by: None,
    })
}

/// Run `after_navigation` on all of `middleware`, in priority order.
///
/// Returns the names of the middleware that failed.
pub async fn run_after_navigation<'a, I>(middleware: I, ctx: &MiddlewareContext) -> Vec<String>
where
    I: IntoIterator<Item = &'a dyn RouteMiddleware>,
{
    let mut failed = Vec::new();
    for m in by_priority(middleware) {
        if let Err(err) = m.after_navigation(ctx).await {
            error_log!(
                "Middleware '{}' failed after navigating to {}: {}",
                m.name(),
                ctx.target_path(),
                err
            );
            failed.push(m.name().to_string());
        }
    }
    failed
}

/// Globally registered middleware, kept sorted by descending priority.
#[derive(Default)]
pub struct MiddlewarePipeline {
    middleware: Vec<BoxedMiddleware>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: RouteMiddleware>(&mut self, middleware: M) -> &mut Self {
        self.register_boxed(Box::new(middleware))
    }

    pub fn register_boxed(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        debug_log!(
            "Registering middleware '{}' (priority {})",
            middleware.name(),
            middleware.priority()
        );
        self.middleware.push(middleware);
        self.middleware.sort_by_key(|m| Reverse(m.priority()));
        self
    }

    /// Remove every middleware named `name`. Returns whether any was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.middleware.len();
        self.middleware.retain(|m| m.name() != name);
        before != self.middleware.len()
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn RouteMiddleware> {
        self.middleware.iter().map(|m| m.as_ref())
    }

    pub async fn run(&self, ctx: &MiddlewareContext) -> Result<MiddlewareVerdict, RouteError> {
        run_middleware(self.iter(), ctx, &NavigationToken::detached()).await
    }

    pub async fn run_after(&self, ctx: &MiddlewareContext) -> Vec<String> {
        run_after_navigation(self.iter(), ctx).await
    }
}

impl fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewarePipeline")
            .field("middleware", &self.names())
            .finish()
    }
}

/// Create middleware from a `before` async closure and an `after` callback.
///
/// ```
/// use navigation_engine::{middleware_fn, MiddlewareResult};
///
/// let analytics = middleware_fn(
///     |_ctx| async { MiddlewareResult::Continue },
///     |ctx| println!("page view: {}", ctx.target_path()),
/// )
/// .named("Analytics")
/// .exclude_routes(["/health"]);
/// ```
pub fn middleware_fn<B, Fut, A>(before: B, after: A) -> FnMiddleware<B, A>
where
    B: Fn(MiddlewareContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
    A: Fn(&MiddlewareContext) + Send + Sync + 'static,
{
    FnMiddleware {
        before,
        after,
        name: "FnMiddleware".to_string(),
        priority: 0,
        filter: RouteFilter::all(),
    }
}

/// Middleware created from functions
pub struct FnMiddleware<B, A> {
    before: B,
    after: A,
    name: String,
    priority: i32,
    filter: RouteFilter,
}

impl<B, A> FnMiddleware<B, A> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

scoped_builders!(FnMiddleware<B, A>);

impl<B, Fut, A> RouteMiddleware for FnMiddleware<B, A>
where
    B: Fn(MiddlewareContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
    A: Fn(&MiddlewareContext) + Send + Sync + 'static,
{
    fn before_navigation(&self, ctx: &MiddlewareContext) -> MiddlewareFuture {
        let fut = (self.before)(ctx.clone());
        Box::pin(async move { Ok(fut.await) })
    }

    fn after_navigation(&self, ctx: &MiddlewareContext) -> AfterNavigationFuture {
        (self.after)(ctx);
        Box::pin(async { Ok(()) })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn applies_to(&self, path: &str) -> bool {
        self.filter.applies_to(path)
    }
}

/// Logs every navigation and how long it took to commit.
///
/// Runs first by default so the elapsed time covers the other middleware.
pub struct LoggingMiddleware {
    priority: i32,
    filter: RouteFilter,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self {
            priority: 1000,
            filter: RouteFilter::all(),
        }
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

scoped_builders!(LoggingMiddleware);

impl RouteMiddleware for LoggingMiddleware {
    fn before_navigation(&self, ctx: &MiddlewareContext) -> MiddlewareFuture {
        info_log!(
            "Navigating {} -> {}",
            ctx.current_path().unwrap_or("<none>"),
            ctx.target_path()
        );
        Box::pin(async { Ok(MiddlewareResult::Continue) })
    }

    fn after_navigation(&self, ctx: &MiddlewareContext) -> AfterNavigationFuture {
        info_log!("Navigated to {} in {:?}", ctx.target_path(), ctx.elapsed());
        Box::pin(async { Ok(()) })
    }

    fn name(&self) -> &str {
        "LoggingMiddleware"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn applies_to(&self, path: &str) -> bool {
        self.filter.applies_to(path)
    }
}

/// Aborts navigations that arrive sooner than `min_interval` after the
/// last committed one.
///
/// Holds its own timestamp, so it assumes one navigation at a time.
pub struct RateLimitMiddleware {
    min_interval: Duration,
    last_committed: Mutex<Option<Instant>>,
    priority: i32,
    filter: RouteFilter,
}

impl RateLimitMiddleware {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_committed: Mutex::new(None),
            priority: 0,
            filter: RouteFilter::all(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

scoped_builders!(RateLimitMiddleware);

impl RouteMiddleware for RateLimitMiddleware {
    fn before_navigation(&self, ctx: &MiddlewareContext) -> MiddlewareFuture {
        let last = *self.last_committed.lock();

        let result = match last {
            Some(previous) if previous.elapsed() < self.min_interval => {
                debug_log!("Rate limit hit for {}", ctx.target_path());
                MiddlewareResult::abort(format!(
                    "navigations must be at least {:?} apart",
                    self.min_interval
                ))
            }
            _ => MiddlewareResult::Continue,
        };

        Box::pin(async move { Ok(result) })
    }

    // Only committed navigations count against the interval.
    fn after_navigation(&self, ctx: &MiddlewareContext) -> AfterNavigationFuture {
        if self.filter.applies_to(ctx.target_path()) {
            *self.last_committed.lock() = Some(Instant::now());
        }
        Box::pin(async { Ok(()) })
    }

    fn name(&self) -> &str {
        "RateLimitMiddleware"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn applies_to(&self, path: &str) -> bool {
        self.filter.applies_to(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResolvedRoute;
    use crate::matcher::RoutePattern;
    use crate::params::RouteParams;
    use std::sync::Arc;

    fn ctx(path: &str) -> MiddlewareContext {
        MiddlewareContext::new(
            ResolvedRoute {
                name: "target".to_string(),
                pattern: RoutePattern::parse(path).unwrap(),
                path: path.to_string(),
                params: RouteParams::new(),
                query: QueryParams::new(),
            },
            None,
        )
    }

    struct Recording {
        name: &'static str,
        priority: i32,
        result: MiddlewareResult,
        fail_after: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RouteMiddleware for Recording {
        fn before_navigation(&self, _ctx: &MiddlewareContext) -> MiddlewareFuture {
            self.log.lock().push(format!("before:{}", self.name));
            let result = self.result.clone();
            Box::pin(async move { Ok(result) })
        }

        fn after_navigation(&self, _ctx: &MiddlewareContext) -> AfterNavigationFuture {
            self.log.lock().push(format!("after:{}", self.name));
            let fail = self.fail_after;
            Box::pin(async move {
                if fail {
                    Err(BoxError::from("analytics endpoint unreachable"))
                } else {
                    Ok(())
                }
            })
        }

        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn applies_to(&self, path: &str) -> bool {
            path != "/skip"
        }
    }

    fn recording(
        name: &'static str,
        priority: i32,
        result: MiddlewareResult,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Recording {
        Recording {
            name,
            priority,
            result,
            fail_after: false,
            log: Arc::clone(log),
        }
    }

    #[test]
    fn test_trait_defaults() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let m = recording("m", 0, MiddlewareResult::Continue, &log);
        assert_eq!(m.priority(), 0);
        assert!(LoggingMiddleware::new().priority() > 0);
        assert_eq!(LoggingMiddleware::default().name(), "LoggingMiddleware");
    }

    #[test]
    fn test_abort_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.register(recording("low", 1, MiddlewareResult::Continue, &log));
        pipeline.register(recording("high", 5, MiddlewareResult::abort("maintenance"), &log));

        let verdict = pollster::block_on(pipeline.run(&ctx("/a"))).unwrap();
        assert_eq!(verdict.result, MiddlewareResult::abort("maintenance"));
        assert_eq!(verdict.decided_by.as_deref(), Some("high"));
        assert_eq!(*log.lock(), vec!["before:high"]);
    }

    #[test]
    fn test_redirect_result() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.register(recording("moved", 0, MiddlewareResult::redirect("/new"), &log));

        let verdict = pollster::block_on(pipeline.run(&ctx("/old"))).unwrap();
        assert!(verdict.result.is_redirect());
    }

    #[test]
    fn test_after_navigation_ignores_filters_and_isolates_failures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.register(Recording {
            fail_after: true,
            ..recording("flaky", 2, MiddlewareResult::Continue, &log)
        });
        pipeline.register(recording("steady", 1, MiddlewareResult::Continue, &log));

        // `/skip` is filtered out for before_navigation only.
        let verdict = pollster::block_on(pipeline.run(&ctx("/skip"))).unwrap();
        assert!(verdict.result.is_continue());
        assert!(log.lock().is_empty());

        let failed = pollster::block_on(pipeline.run_after(&ctx("/skip")));
        assert_eq!(failed, vec!["flaky"]);
        assert_eq!(*log.lock(), vec!["after:flaky", "after:steady"]);
    }

    #[test]
    fn test_fn_middleware() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let m = middleware_fn(
            |ctx| async move {
                if ctx.target_path() == "/blocked" {
                    MiddlewareResult::abort("blocked")
                } else {
                    MiddlewareResult::Continue
                }
            },
            move |ctx| sink.lock().push(ctx.target_path().to_string()),
        )
        .named("Tracker")
        .with_priority(7);

        assert_eq!(m.name(), "Tracker");
        assert_eq!(m.priority(), 7);
        assert!(pollster::block_on(m.before_navigation(&ctx("/blocked")))
            .unwrap()
            .is_abort());

        pollster::block_on(m.after_navigation(&ctx("/home"))).unwrap();
        assert_eq!(*seen.lock(), vec!["/home"]);
    }

    #[test]
    fn test_rate_limit() {
        let limiter = RateLimitMiddleware::new(Duration::from_secs(60));
        assert!(pollster::block_on(limiter.before_navigation(&ctx("/a")))
            .unwrap()
            .is_continue());
        // Nothing committed yet, so a second hop is still let through.
        assert!(pollster::block_on(limiter.before_navigation(&ctx("/b")))
            .unwrap()
            .is_continue());

        pollster::block_on(limiter.after_navigation(&ctx("/b"))).unwrap();
        assert!(pollster::block_on(limiter.before_navigation(&ctx("/c")))
            .unwrap()
            .is_abort());

        let unlimited = RateLimitMiddleware::new(Duration::ZERO);
        pollster::block_on(unlimited.after_navigation(&ctx("/a"))).unwrap();
        assert!(pollster::block_on(unlimited.before_navigation(&ctx("/b")))
            .unwrap()
            .is_continue());
    }

    #[test]
    fn test_rate_limit_ignores_commits_outside_its_routes() {
        let limiter = RateLimitMiddleware::new(Duration::from_secs(60)).routes(["/search/**"]);
        pollster::block_on(limiter.after_navigation(&ctx("/home"))).unwrap();
        assert!(pollster::block_on(limiter.before_navigation(&ctx("/search/rust")))
            .unwrap()
            .is_continue());
    }

    #[test]
    fn test_superseded_token() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let m = recording("m", 0, MiddlewareResult::Continue, &log);
        let token = NavigationToken::detached();
        token.supersede_handle().supersede();

        let err = pollster::block_on(run_middleware([&m as &dyn RouteMiddleware], &ctx("/a"), &token))
            .unwrap_err();
        assert!(matches!(err, RouteError::Superseded));
    }
}
