//! Route guards for authentication, authorization, and validation
//!
//! Guards decide *whether* a navigation may proceed. They run in descending
//! priority order and the first guard that does not allow ends the run.
//!
//! # Example
//!
//! ```
//! use navigation_engine::{guard_fn, AuthGuard, GuardPipeline, GuardResult};
//!
//! let mut guards = GuardPipeline::new();
//! guards.register(AuthGuard::new(|| true, "/login"));
//! guards.register(
//!     guard_fn(|ctx| async move {
//!         if ctx.param("id") == Some("0") {
//!             GuardResult::deny("reserved id")
//!         } else {
//!             GuardResult::allow()
//!         }
//!     })
//!     .named("ReservedIdGuard")
//!     .routes(["/users/*"]),
//! );
//!
//! assert_eq!(guards.names(), vec!["AuthGuard", "ReservedIdGuard"]);
//! ```

use crate::context::{GuardContext, NavigationToken, Payload};
use crate::error::{BoxError, PipelineStage, RouteError};
use crate::glob::{scoped_builders, RouteFilter};
use crate::params::QueryParams;
use crate::{debug_log, trace_log};
use std::cmp::Reverse;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Future returned by [`RouteGuard::can_activate`].
pub type GuardFuture = Pin<Box<dyn Future<Output = Result<GuardResult, BoxError>> + Send>>;

/// Result of a guard check
#[derive(Debug, Clone)]
pub enum GuardResult {
    /// Allow navigation to proceed
    Allow,

    /// Deny navigation with a reason
    Deny { reason: String },

    /// Send the navigation somewhere else
    Redirect {
        to: String,
        query: QueryParams,
        /// Replaces the request's extra when present
        extra: Option<Payload>,
    },

    /// The guard has taken over the navigation and will decide later,
    /// e.g. after a confirmation dialog
    Pending,
}

impl GuardResult {
    pub fn allow() -> Self {
        GuardResult::Allow
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        GuardResult::Deny {
            reason: reason.into(),
        }
    }

    pub fn redirect(to: impl Into<String>) -> Self {
        GuardResult::Redirect {
            to: to.into(),
            query: QueryParams::new(),
            extra: None,
        }
    }

    /// Redirect carrying a query and an extra payload for the new target.
    pub fn redirect_with(to: impl Into<String>, query: QueryParams, extra: Option<Payload>) -> Self {
        GuardResult::Redirect {
            to: to.into(),
            query,
            extra,
        }
    }

    pub fn pending() -> Self {
        GuardResult::Pending
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, GuardResult::Allow)
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, GuardResult::Deny { .. })
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, GuardResult::Redirect { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, GuardResult::Pending)
    }

    pub fn redirect_path(&self) -> Option<&str> {
        match self {
            GuardResult::Redirect { to, .. } => Some(to.as_str()),
            _ => None,
        }
    }
}

/// Trait for route guards
///
/// `can_activate` returns a `'static` boxed future, so implementations copy
/// whatever they need out of the context before the `async` block.
///
/// # Example
///
/// ```
/// use navigation_engine::{GuardContext, GuardFuture, GuardResult, RouteGuard};
///
/// struct OwnerGuard {
///     user_id: String,
/// }
///
/// impl RouteGuard for OwnerGuard {
///     fn can_activate(&self, ctx: &GuardContext) -> GuardFuture {
///         let allowed = ctx.param("owner") == Some(self.user_id.as_str());
///         Box::pin(async move {
///             Ok(if allowed {
///                 GuardResult::allow()
///             } else {
///                 GuardResult::deny("not the owner")
///             })
///         })
///     }
///
///     fn name(&self) -> &str {
///         "OwnerGuard"
///     }
///
///     fn applies_to(&self, path: &str) -> bool {
///         path.starts_with("/repos/")
///     }
/// }
/// ```
pub trait RouteGuard: Send + Sync + 'static {
    /// Decide on the navigation described by `ctx`.
    ///
    /// An `Err` aborts the whole resolution with
    /// [`RouteError::PipelineFailure`].
    fn can_activate(&self, ctx: &GuardContext) -> GuardFuture;

    /// Guard name (for logs and outcomes)
    fn name(&self) -> &str {
        "RouteGuard"
    }

    /// Higher priority guards run first. Default is 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether this guard runs for `path` at all.
    fn applies_to(&self, _path: &str) -> bool {
        true
    }

    /// Called after this guard allowed, before the next guard runs.
    fn on_activated(&self, _ctx: &GuardContext) {}

    /// Called after this guard denied or redirected.
    fn on_denied(&self, _ctx: &GuardContext, _result: &GuardResult) {}
}

/// Boxed route guard for dynamic dispatch
pub type BoxedGuard = Box<dyn RouteGuard>;

/// Result of running a set of guards.
#[derive(Debug, Clone)]
pub struct GuardVerdict {
    pub result: GuardResult,
    /// Name of the guard that ended the run, `None` when all allowed
    pub decided_by: Option<String>,
}

impl GuardVerdict {
    fn allowed() -> Self {
        Self {
            result: GuardResult::Allow,
            decided_by: None,
        }
    }
}

/// Run `guards` against `ctx`.
///
/// Guards whose [`applies_to`](RouteGuard::applies_to) rejects the target are
/// skipped. The rest are awaited one at a time in descending priority (stable
/// for equal priorities), and the first non-`Allow` result is returned.
///
/// If `token` is superseded while a guard is being awaited, its result is
/// dropped without running any hook and the run fails with
/// [`RouteError::Superseded`].
pub async fn run_guards<'a, I>(
    guards: I,
    ctx: &GuardContext,
    token: &NavigationToken,
) -> Result<GuardVerdict, RouteError>
where
    I: IntoIterator<Item = &'a dyn RouteGuard>,
{
    let path = ctx.target_path();
    let mut ordered: Vec<&dyn RouteGuard> = guards
        .into_iter()
        .filter(|guard| guard.applies_to(path))
        .collect();
    ordered.sort_by_key(|guard| Reverse(guard.priority()));

    for guard in ordered {
        trace_log!("Running guard '{}' for {}", guard.name(), path);
        let outcome = guard.can_activate(ctx).await;

        if token.is_superseded() {
            debug_log!("Guard '{}' finished after its run was superseded", guard.name());
            return Err(RouteError::Superseded);
        }

        let result = outcome.map_err(|source| RouteError::PipelineFailure {
            stage: PipelineStage::Guard,
            name: guard.name().to_string(),
            source,
        })?;

        match &result {
            GuardResult::Allow => {
                guard.on_activated(ctx);
                continue;
            }
            GuardResult::Pending => {
                debug_log!("Guard '{}' left {} pending", guard.name(), path);
            }
            GuardResult::Deny { .. } | GuardResult::Redirect { .. } => {
                debug_log!("Guard '{}' blocked {}: {:?}", guard.name(), path, result);
                guard.on_denied(ctx, &result);
            }
        }

        return Ok(GuardVerdict {
            result,
            decided_by: Some(guard.name().to_string()),
        });
    }

    Ok(GuardVerdict::allowed())
}

/// Globally registered guards, kept sorted by descending priority.
#[derive(Default)]
pub struct GuardPipeline {
    guards: Vec<BoxedGuard>,
}

impl GuardPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<G: RouteGuard>(&mut self, guard: G) -> &mut Self {
        self.register_boxed(Box::new(guard))
    }

    pub fn register_boxed(&mut self, guard: BoxedGuard) -> &mut Self {
        debug_log!("Registering guard '{}' (priority {})", guard.name(), guard.priority());
        self.guards.push(guard);
        self.guards.sort_by_key(|guard| Reverse(guard.priority()));
        self
    }

    /// Remove every guard named `name`. Returns whether any was removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.guards.len();
        self.guards.retain(|guard| guard.name() != name);
        before != self.guards.len()
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.guards.iter().map(|guard| guard.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn RouteGuard> {
        self.guards.iter().map(|guard| guard.as_ref())
    }

    /// Run the registered guards on their own, outside a router.
    pub async fn run(&self, ctx: &GuardContext) -> Result<GuardVerdict, RouteError> {
        run_guards(self.iter(), ctx, &NavigationToken::detached()).await
    }
}

impl fmt::Debug for GuardPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardPipeline")
            .field("guards", &self.names())
            .finish()
    }
}

// ============================================================================
// Function and condition guards
// ============================================================================

/// Create a guard from an async closure.
///
/// The closure receives an owned copy of the context.
pub fn guard_fn<F, Fut>(f: F) -> FnGuard<F>
where
    F: Fn(GuardContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = GuardResult> + Send + 'static,
{
    FnGuard {
        f,
        name: "FnGuard".to_string(),
        priority: 0,
        filter: RouteFilter::all(),
    }
}

/// Guard created from a function or closure
pub struct FnGuard<F> {
    f: F,
    name: String,
    priority: i32,
    filter: RouteFilter,
}

impl<F> FnGuard<F> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

scoped_builders!(FnGuard<F>);

impl<F, Fut> RouteGuard for FnGuard<F>
where
    F: Fn(GuardContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = GuardResult> + Send + 'static,
{
    fn can_activate(&self, ctx: &GuardContext) -> GuardFuture {
        let fut = (self.f)(ctx.clone());
        Box::pin(async move { Ok(fut.await) })
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

type ConditionFn = Box<dyn Fn(&GuardContext) -> bool + Send + Sync>;

/// Allows when a synchronous predicate holds, otherwise redirects.
pub struct ConditionGuard {
    condition: ConditionFn,
    redirect_to: String,
    priority: i32,
    filter: RouteFilter,
}

impl ConditionGuard {
    pub fn new<F>(condition: F, redirect_to: impl Into<String>) -> Self
    where
        F: Fn(&GuardContext) -> bool + Send + Sync + 'static,
    {
        Self {
            condition: Box::new(condition),
            redirect_to: redirect_to.into(),
            priority: 0,
            filter: RouteFilter::all(),
        }
    }
}

scoped_builders!(ConditionGuard);

impl RouteGuard for ConditionGuard {
    fn can_activate(&self, ctx: &GuardContext) -> GuardFuture {
        let result = if (self.condition)(ctx) {
            GuardResult::allow()
        } else {
            GuardResult::redirect(self.redirect_to.clone())
        };
        Box::pin(async move { Ok(result) })
    }

    fn name(&self) -> &str {
        "ConditionGuard"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn applies_to(&self, path: &str) -> bool {
        self.filter.applies_to(path)
    }
}

type AsyncConditionFn =
    Box<dyn Fn(GuardContext) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

/// Like [`ConditionGuard`], with an asynchronous predicate.
pub struct AsyncConditionGuard {
    condition: AsyncConditionFn,
    redirect_to: String,
    priority: i32,
    filter: RouteFilter,
}

impl AsyncConditionGuard {
    pub fn new<F, Fut>(condition: F, redirect_to: impl Into<String>) -> Self
    where
        F: Fn(GuardContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self {
            condition: Box::new(move |ctx| Box::pin(condition(ctx))),
            redirect_to: redirect_to.into(),
            priority: 0,
            filter: RouteFilter::all(),
        }
    }
}

scoped_builders!(AsyncConditionGuard);

impl RouteGuard for AsyncConditionGuard {
    fn can_activate(&self, ctx: &GuardContext) -> GuardFuture {
        let check = (self.condition)(ctx.clone());
        let redirect_to = self.redirect_to.clone();
        Box::pin(async move {
            Ok(if check.await {
                GuardResult::allow()
            } else {
                GuardResult::redirect(redirect_to)
            })
        })
    }

    fn name(&self) -> &str {
        "AsyncConditionGuard"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn applies_to(&self, path: &str) -> bool {
        self.filter.applies_to(path)
    }
}

// ============================================================================
// Authentication and Authorization Guards
// ============================================================================

/// Function that reports whether the user is signed in.
pub type AuthCheckFn = Box<dyn Fn() -> bool + Send + Sync>;

/// Authentication guard that checks if user is logged in.
///
/// ```
/// use navigation_engine::{AuthGuard, RouteGuard};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let signed_in = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&signed_in);
///
/// let guard = AuthGuard::new(move || flag.load(Ordering::Relaxed), "/login")
///     .exclude_routes(["/login", "/public/**"]);
///
/// assert_eq!(guard.priority(), 100);
/// assert!(!guard.applies_to("/public/about"));
/// ```
pub struct AuthGuard {
    check_fn: AuthCheckFn,
    redirect_path: String,
    priority: i32,
    filter: RouteFilter,
}

impl AuthGuard {
    pub fn new<F>(check_fn: F, redirect_path: impl Into<String>) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            check_fn: Box::new(check_fn),
            redirect_path: redirect_path.into(),
            priority: 100,
            filter: RouteFilter::all(),
        }
    }
}

scoped_builders!(AuthGuard);

impl RouteGuard for AuthGuard {
    fn can_activate(&self, ctx: &GuardContext) -> GuardFuture {
        let result = if (self.check_fn)() {
            GuardResult::allow()
        } else {
            // Hand the original destination to the login page.
            let query: QueryParams = [("redirect", ctx.target.full_path())].into_iter().collect();
            GuardResult::redirect_with(self.redirect_path.clone(), query, None)
        };
        Box::pin(async move { Ok(result) })
    }

    fn name(&self) -> &str {
        "AuthGuard"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn applies_to(&self, path: &str) -> bool {
        self.filter.applies_to(path)
    }
}

/// Function that returns the user's current role.
pub type RoleExtractorFn = Box<dyn Fn() -> Option<String> + Send + Sync>;

/// Role-based authorization guard.
///
/// Redirects when a redirect path is configured, denies otherwise.
pub struct RoleGuard {
    role_extractor: RoleExtractorFn,
    required_role: String,
    redirect_path: Option<String>,
    priority: i32,
    filter: RouteFilter,
}

impl RoleGuard {
    pub fn new<F>(
        role_extractor: F,
        required_role: impl Into<String>,
        redirect_path: Option<impl Into<String>>,
    ) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        Self {
            role_extractor: Box::new(role_extractor),
            required_role: required_role.into(),
            redirect_path: redirect_path.map(Into::into),
            priority: 90,
            filter: RouteFilter::all(),
        }
    }

    fn has_required_role(&self) -> bool {
        (self.role_extractor)().is_some_and(|role| role == self.required_role)
    }
}

scoped_builders!(RoleGuard);

impl RouteGuard for RoleGuard {
    fn can_activate(&self, _ctx: &GuardContext) -> GuardFuture {
        let result = if self.has_required_role() {
            GuardResult::allow()
        } else if let Some(redirect) = &self.redirect_path {
            GuardResult::redirect(redirect.clone())
        } else {
            GuardResult::deny(format!("missing required role: {}", self.required_role))
        };
        Box::pin(async move { Ok(result) })
    }

    fn name(&self) -> &str {
        "RoleGuard"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn applies_to(&self, path: &str) -> bool {
        self.filter.applies_to(path)
    }
}

// ============================================================================
// Guard Composition
// ============================================================================

/// Inverts a guard result
///
/// Allow becomes Deny and Deny becomes Allow. Redirect and Pending pass
/// through unchanged, so wrap a guard that denies rather than one that
/// redirects, like [`AuthGuard`]. Priority and scoping are the inner guard's.
///
/// ```
/// use navigation_engine::*;
///
/// # fn main() -> Result<(), RouteError> {
/// let signed_in = || false;
/// let require_sign_in = guard_fn(move |_| {
///     let result = if signed_in() {
///         GuardResult::allow()
///     } else {
///         GuardResult::deny("signed out")
///     };
///     async move { result }
/// })
/// .named("SignedIn")
/// .routes(["/login"]);
///
/// let table = RouteTable::builder()
///     .route(RouteEntry::new("login", "/login")?)
///     .build()?;
/// let mut router = Router::new(table);
///
/// // Only signed-out users may open the login page.
/// router.guards_mut().register(NotGuard::new(require_sign_in));
///
/// let outcome = pollster::block_on(router.navigate("/login"))?;
/// assert!(outcome.is_resolved());
/// # Ok(())
/// # }
/// ```
pub struct NotGuard {
    guard: BoxedGuard,
}

impl NotGuard {
    pub fn new<G: RouteGuard>(guard: G) -> Self {
        Self {
            guard: Box::new(guard),
        }
    }

    pub fn from_boxed(guard: BoxedGuard) -> Self {
        Self { guard }
    }
}

impl RouteGuard for NotGuard {
    fn can_activate(&self, ctx: &GuardContext) -> GuardFuture {
        let inner = self.guard.can_activate(ctx);
        let inner_name = self.guard.name().to_string();

        Box::pin(async move {
            Ok(match inner.await? {
                GuardResult::Allow => GuardResult::deny(format!("inverted: {inner_name} allowed")),
                GuardResult::Deny { .. } => GuardResult::Allow,
                other => other,
            })
        })
    }

    fn name(&self) -> &str {
        "NotGuard"
    }

    fn priority(&self) -> i32 {
        self.guard.priority()
    }

    fn applies_to(&self, path: &str) -> bool {
        self.guard.applies_to(path)
    }
}
