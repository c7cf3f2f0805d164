//! # Navigation Engine
//!
//! The runtime core of a client-side navigation library:
//!
//! - **Route Matching** - Patterns with literals, `:params`, `*` and `**`,
//!   disambiguated by a specificity score
//! - **Route Guards** - Priority-ordered authorization checks that allow,
//!   deny, redirect or defer a navigation
//! - **Middleware** - Cross-cutting hooks before and after a navigation
//! - **Redirects** - Static rules plus guard/middleware redirects, with loop
//!   detection
//! - **History** - Bounded back/forward stack of committed navigations
//! - **Named Routes** - Build paths from route names and parameters
//!
//! # Quick Start
//!
//! ```
//! use navigation_engine::*;
//!
//! # fn main() -> Result<(), RouteError> {
//! let table = RouteTable::builder()
//!     .route(RouteEntry::new("home", "/")?.initial())
//!     .route(RouteEntry::new("user", "/users/:id")?)
//!     .route(RouteEntry::new("admin", "/users/admin")?)
//!     .redirect(RedirectEntry::new("/u/:id", "/users/:id")?)
//!     .build()?;
//!
//! let mut router = Router::new(table);
//! router.middleware_mut().register(LoggingMiddleware::new());
//!
//! pollster::block_on(async {
//!     router.start().await?;
//!
//!     let nav = router.navigate("/u/42").await?.into_result()?;
//!     assert_eq!(nav.route.name, "user");
//!     assert_eq!(nav.route.params.get("id"), Some("42"));
//!
//!     let nav = router.navigate("/users/admin").await?.into_result()?;
//!     assert_eq!(nav.route.name, "admin");
//!     Ok::<(), RouteError>(())
//! })?;
//!
//! assert_eq!(router.history().previous_path(), Some("/users/42"));
//! # Ok(())
//! # }
//! ```
//!
//! # Route Guards
//!
//! Guards are registered globally on the router or attached to a route. A
//! guard attached to a route also protects every route that names it as
//! parent.
//!
//! ```
//! use navigation_engine::*;
//!
//! # fn main() -> Result<(), RouteError> {
//! let table = RouteTable::builder()
//!     .route(RouteEntry::new("login", "/login")?)
//!     .route(
//!         RouteEntry::new("admin", "/admin")?
//!             .guard(RoleGuard::new(|| Some("user".into()), "admin", None::<String>)),
//!     )
//!     .route(RouteEntry::new("audit", "/admin/audit")?.parent("admin"))
//!     .build()?;
//!
//! let mut router = Router::new(table);
//! let outcome = pollster::block_on(router.navigate("/admin/audit"))?;
//! assert!(outcome.is_denied());
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `log` (default) - Uses the standard `log` crate for logging
//! - `tracing` - Uses the `tracing` crate for structured logging (mutually exclusive with `log`)
//! - `cache` (default) - LRU cache of path lookups

#![cfg_attr(docsrs, feature(doc_cfg))]
// Lints are configured in Cargo.toml [lints] section

// Logging abstraction
pub mod logging;

// Cache (optional)
#[cfg(feature = "cache")]
pub mod cache;

// Matching
pub mod glob;
pub mod matcher;
pub mod params;
pub mod path;
pub mod resolver;

// Pipeline
pub mod context;
pub mod guards;
pub mod middleware;
pub mod redirect;

// Routes, history and the router
pub mod history;
pub mod route;
pub mod router;

// Error handling
pub mod error;

// Re-export main types for convenient access
#[cfg(feature = "cache")]
pub use cache::{CacheStats, MatchCache};
pub use context::{
    GuardContext, MiddlewareContext, NavigationContext, NavigationRequest, NavigationToken,
    Payload, ResolvedRoute, SupersedeHandle,
};
pub use error::{BoxError, PipelineStage, ResolutionOutcome, ResolvedNavigation, RouteError};
pub use glob::{glob_matches, GlobPattern, RouteFilter};
pub use guards::{
    guard_fn, AsyncConditionGuard, AuthGuard, BoxedGuard, ConditionGuard, FnGuard, GuardFuture,
    GuardPipeline, GuardResult, GuardVerdict, NotGuard, RoleGuard, RouteGuard,
};
pub use history::{HistoryEntry, NavigationDirection, NavigationEvent, NavigationHistory};
pub use matcher::{MatchResult, RoutePattern, Segment};
pub use middleware::{
    middleware_fn, AfterNavigationFuture, BoxedMiddleware, FnMiddleware, LoggingMiddleware,
    MiddlewareFuture, MiddlewarePipeline, MiddlewareResult, MiddlewareVerdict,
    RateLimitMiddleware, RouteMiddleware,
};
pub use params::{QueryParams, RouteParams};
pub use redirect::RedirectResolver;
pub use resolver::{build_path, find_best_match, find_best_prefix_match};
pub use route::{RedirectEntry, RouteEntry, RouteTable, RouteTableBuilder};
pub use router::{Router, RouterOptions};
