//! Redirect-safe resolution loop
//!
//! Each hop of the loop does the following, in order:
//!
//! 1. apply the first static [`RedirectEntry`](crate::RedirectEntry) that
//!    matches, then start over;
//! 2. find the best route, or stop with `NotFound`;
//! 3. run the guards (global ones plus those of the route and its
//!    ancestors), following a redirect by starting over;
//! 4. run the middleware the same way.
//!
//! Every visited path is recorded. Coming back to one, or exceeding the hop
//! bound, stops with `LoopDetected` instead of spinning forever.

use crate::context::{NavigationContext, NavigationRequest, NavigationToken, Payload, ResolvedRoute};
use crate::error::{ResolutionOutcome, ResolvedNavigation, RouteError};
use crate::guards::{run_guards, GuardPipeline, GuardResult, RouteGuard};
use crate::middleware::{run_middleware, MiddlewarePipeline, MiddlewareResult, RouteMiddleware};
use crate::params::QueryParams;
use crate::route::RouteTable;
use crate::{debug_log, info_log, path, warn_log};
use std::time::Instant;

/// Redirects followed before a resolution is declared a loop.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Drives one resolution over a route table and its pipelines.
pub struct RedirectResolver<'a> {
    table: &'a RouteTable,
    guards: &'a GuardPipeline,
    middleware: &'a MiddlewarePipeline,
    max_redirects: usize,
    started_at: Instant,
}

/// Where the next hop goes.
struct Hop {
    target: String,
    query: QueryParams,
    extra: Option<Payload>,
}

impl Hop {
    /// Move to `to`, whose inline query is merged before `query`.
    fn redirect(&mut self, to: &str, query: QueryParams) {
        let (to_path, inline) = path::split_query(to);
        let mut merged = inline
            .map(QueryParams::from_query_string)
            .unwrap_or_default();
        merged.merge(&query);
        self.target = to_path.to_string();
        self.query = merged;
    }
}

impl<'a> RedirectResolver<'a> {
    pub fn new(
        table: &'a RouteTable,
        guards: &'a GuardPipeline,
        middleware: &'a MiddlewarePipeline,
    ) -> Self {
        Self {
            table,
            guards,
            middleware,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            started_at: Instant::now(),
        }
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Start time reported to guards and middleware through the context.
    pub fn started_at(mut self, started_at: Instant) -> Self {
        self.started_at = started_at;
        self
    }

    /// Resolve `request` to a terminal outcome.
    ///
    /// `current` is the committed route the navigation starts from. Errors
    /// are reserved for failing callbacks and malformed redirect targets;
    /// every expected stop is an `Ok` outcome.
    pub async fn resolve(
        &self,
        request: &NavigationRequest,
        current: Option<&ResolvedRoute>,
        token: &NavigationToken,
    ) -> Result<ResolutionOutcome, RouteError> {
        let mut hop = Hop {
            target: request.path().to_string(),
            query: request.merged_query(),
            extra: request.extra.clone(),
        };
        let mut chain: Vec<String> = Vec::new();

        loop {
            if token.is_superseded() {
                return Ok(ResolutionOutcome::Superseded);
            }

            let target = path::normalize(&hop.target).into_owned();
            if chain.contains(&target) {
                chain.push(target);
                warn_log!("Redirect loop detected: {}", chain.join(" -> "));
                return Ok(ResolutionOutcome::LoopDetected { chain });
            }
            chain.push(target.clone());
            if chain.len() > self.max_redirects + 1 {
                warn_log!(
                    "Gave up after {} redirects: {}",
                    self.max_redirects,
                    chain.join(" -> ")
                );
                return Ok(ResolutionOutcome::LoopDetected { chain });
            }

            if let Some((rule, next)) = self.table.redirect_for(&target) {
                let next = next?;
                debug_log!(
                    "{} redirect {} -> {}",
                    if rule.is_permanent() { "Permanent" } else { "Temporary" },
                    target,
                    next
                );
                let carried = std::mem::take(&mut hop.query);
                hop.redirect(&next, carried);
                continue;
            }

            let Some((entry, matched)) = self.table.find(&target) else {
                info_log!("No route matches {}", target);
                return Ok(ResolutionOutcome::NotFound { path: target });
            };

            let mut ctx = NavigationContext::new(
                ResolvedRoute {
                    name: entry.name().to_string(),
                    pattern: entry.pattern().clone(),
                    path: target.clone(),
                    params: matched.path_params,
                    query: hop.query.clone(),
                },
                current.cloned(),
            );
            ctx.is_replace = request.is_replace;
            ctx.extra = hop.extra.clone();
            ctx.start_time = self.started_at;

            let lineage = self.table.lineage(entry);

            let route_guards = lineage
                .iter()
                .copied()
                .flat_map(|route| route.route_guards().iter().map(|g| &**g as &dyn RouteGuard));
            let verdict = match run_guards(self.guards.iter().chain(route_guards), &ctx, token).await {
                Ok(verdict) => verdict,
                Err(RouteError::Superseded) => return Ok(ResolutionOutcome::Superseded),
                Err(err) => return Err(err),
            };
            let guard = verdict.decided_by.unwrap_or_default();
            match verdict.result {
                GuardResult::Allow => {}
                GuardResult::Deny { reason } => {
                    info_log!("Navigation to {} denied by '{}': {}", target, guard, reason);
                    return Ok(ResolutionOutcome::Denied { guard, reason });
                }
                GuardResult::Pending => {
                    return Ok(ResolutionOutcome::Pending { guard });
                }
                GuardResult::Redirect { to, query, extra } => {
                    debug_log!("Guard '{}' redirected {} -> {}", guard, target, to);
                    hop.redirect(&to, query);
                    if extra.is_some() {
                        hop.extra = extra;
                    }
                    continue;
                }
            }

            let route_middleware = lineage.iter().copied().flat_map(|route| {
                route
                    .route_middleware()
                    .iter()
                    .map(|m| &**m as &dyn RouteMiddleware)
            });
            let verdict = match run_middleware(
                self.middleware.iter().chain(route_middleware),
                &ctx,
                token,
            )
            .await
            {
                Ok(verdict) => verdict,
                Err(RouteError::Superseded) => return Ok(ResolutionOutcome::Superseded),
                Err(err) => return Err(err),
            };
            let middleware = verdict.decided_by.unwrap_or_default();
            match verdict.result {
                MiddlewareResult::Continue => {}
                MiddlewareResult::Abort { reason } => {
                    warn_log!(
                        "Navigation to {} aborted by '{}': {}",
                        target,
                        middleware,
                        reason
                    );
                    return Ok(ResolutionOutcome::Aborted { middleware, reason });
                }
                MiddlewareResult::Redirect { to, query } => {
                    debug_log!("Middleware '{}' redirected {} -> {}", middleware, target, to);
                    hop.redirect(&to, query);
                    continue;
                }
            }

            return Ok(ResolutionOutcome::Resolved(ResolvedNavigation {
                route: ctx.target,
                body: request.body.clone(),
                extra: hop.extra,
                redirect_chain: chain,
                is_replace: request.is_replace,
                after_navigation_failures: Vec::new(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::guard_fn;
    use crate::route::{RedirectEntry, RouteEntry};

    fn table(routes: &[(&str, &str)], redirects: &[(&str, &str)]) -> RouteTable {
        RouteTable::new(
            routes
                .iter()
                .map(|(name, pattern)| RouteEntry::new(*name, pattern).unwrap())
                .collect(),
            redirects
                .iter()
                .map(|(from, to)| RedirectEntry::new(from, *to).unwrap())
                .collect(),
        )
        .unwrap()
    }

    fn resolve(
        table: &RouteTable,
        guards: &GuardPipeline,
        request: NavigationRequest,
    ) -> ResolutionOutcome {
        let middleware = MiddlewarePipeline::new();
        let resolver = RedirectResolver::new(table, guards, &middleware);
        pollster::block_on(resolver.resolve(&request, None, &NavigationToken::detached())).unwrap()
    }

    #[test]
    fn test_static_redirect_loop() {
        let table = table(&[("a", "/a"), ("b", "/b")], &[("/a", "/b"), ("/b", "/a")]);
        let outcome = resolve(&table, &GuardPipeline::new(), "/a".into());

        match outcome {
            ResolutionOutcome::LoopDetected { chain } => assert_eq!(chain, vec!["/a", "/b", "/a"]),
            other => panic!("expected loop, got {other:?}"),
        }
    }

    #[test]
    fn test_hop_bound() {
        let redirects: Vec<(String, String)> = (0..5)
            .map(|i| (format!("/r{i}"), format!("/r{}", i + 1)))
            .collect();
        let redirects: Vec<(&str, &str)> = redirects
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_str()))
            .collect();
        let table = table(&[("end", "/r5")], &redirects);

        let guards = GuardPipeline::new();
        let middleware = MiddlewarePipeline::new();
        let request = NavigationRequest::new("/r0");
        let token = NavigationToken::detached();

        let tight = RedirectResolver::new(&table, &guards, &middleware).max_redirects(3);
        let outcome = pollster::block_on(tight.resolve(&request, None, &token)).unwrap();
        assert!(outcome.is_loop());

        let roomy = RedirectResolver::new(&table, &guards, &middleware).max_redirects(5);
        let outcome = pollster::block_on(roomy.resolve(&request, None, &token)).unwrap();
        assert_eq!(outcome.resolved().unwrap().route.name, "end");
    }

    #[test]
    fn test_not_found_after_redirect() {
        let table = table(&[("home", "/")], &[("/old", "/gone")]);
        let outcome = resolve(&table, &GuardPipeline::new(), "/old".into());
        assert!(matches!(outcome, ResolutionOutcome::NotFound { ref path } if path == "/gone"));
    }

    #[test]
    fn test_static_redirect_keeps_query_and_params() {
        let table = table(&[("post", "/posts/:id")], &[("/p/:id", "/posts/:id?ref=short")]);
        let outcome = resolve(&table, &GuardPipeline::new(), "/p/9?utm=mail".into());

        let nav = outcome.resolved().unwrap();
        assert_eq!(nav.route.params.get("id"), Some("9"));
        assert_eq!(nav.route.query.get("ref"), Some("short"));
        assert_eq!(nav.route.query.get("utm"), Some("mail"));
        assert_eq!(nav.redirect_chain, vec!["/p/9", "/posts/9"]);
        assert!(nav.was_redirected());
    }

    #[test]
    fn test_guard_redirect_replaces_query() {
        let table = table(&[("login", "/login"), ("account", "/account")], &[]);
        let mut guards = GuardPipeline::new();
        guards.register(
            guard_fn(|_| async {
                let query: QueryParams = [("next", "/account")].into_iter().collect();
                GuardResult::redirect_with("/login", query, None)
            })
            .routes(["/account"]),
        );

        let outcome = resolve(&table, &guards, NavigationRequest::new("/account?tab=billing"));
        let nav = outcome.resolved().unwrap();
        assert_eq!(nav.route.name, "login");
        assert_eq!(nav.route.query.get("next"), Some("/account"));
        assert!(!nav.route.query.contains("tab"));
    }

    #[test]
    fn test_guard_redirect_loop() {
        let table = table(&[("a", "/a"), ("b", "/b")], &[]);
        let mut guards = GuardPipeline::new();
        guards.register(guard_fn(|ctx| async move {
            if ctx.target_path() == "/a" {
                GuardResult::redirect("/b")
            } else {
                GuardResult::redirect("/a")
            }
        }));

        let outcome = resolve(&table, &guards, "/a".into());
        assert!(outcome.is_loop());
    }

    #[test]
    fn test_superseded_before_start() {
        let table = table(&[("home", "/")], &[]);
        let guards = GuardPipeline::new();
        let middleware = MiddlewarePipeline::new();
        let token = NavigationToken::detached();
        token.supersede_handle().supersede();

        let resolver = RedirectResolver::new(&table, &guards, &middleware);
        let outcome =
            pollster::block_on(resolver.resolve(&NavigationRequest::new("/"), None, &token)).unwrap();
        assert!(matches!(outcome, ResolutionOutcome::Superseded));
    }

    #[test]
    fn test_bad_redirect_template_is_an_error() {
        let table = table(&[("home", "/")], &[("/u/:id", "/users/:name")]);
        let guards = GuardPipeline::new();
        let middleware = MiddlewarePipeline::new();
        let resolver = RedirectResolver::new(&table, &guards, &middleware);

        let result = pollster::block_on(resolver.resolve(
            &NavigationRequest::new("/u/1"),
            None,
            &NavigationToken::detached(),
        ));
        assert!(matches!(result, Err(RouteError::MissingPathParameter { .. })));
    }
}
