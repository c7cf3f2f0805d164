//! Shared fixtures for the integration tests
//!
//! Route tables, a guard and a middleware that record when they run, and
//! logger setup.

#![allow(dead_code)]

use navigation_engine::*;
use parking_lot::Mutex;
use std::sync::Arc;

/// Route the logging macros to the test harness output.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Execution log shared between recording guards and middleware.
pub type Calls = Arc<Mutex<Vec<String>>>;

pub fn calls() -> Calls {
    Arc::new(Mutex::new(Vec::new()))
}

/// A small application: home, login, users, a user profile and an admin area.
pub fn app_table() -> RouteTable {
    RouteTable::builder()
        .route(RouteEntry::new("home", "/").unwrap().initial())
        .route(RouteEntry::new("login", "/login").unwrap())
        .route(RouteEntry::new("users", "/users").unwrap())
        .route(RouteEntry::new("user", "/users/:id").unwrap())
        .route(RouteEntry::new("user_admin", "/users/admin").unwrap())
        .route(RouteEntry::new("admin", "/admin").unwrap())
        .route(RouteEntry::new("audit", "/admin/audit").unwrap().parent("admin"))
        .route(RouteEntry::new("files", "/files/**").unwrap())
        .build()
        .unwrap()
}

pub fn router() -> Router {
    init_logging();
    Router::new(app_table())
}

/// Guard that appends its name to `calls` and then returns a fixed result.
pub struct RecordingGuard {
    pub name: String,
    pub priority: i32,
    pub result: GuardResult,
    pub calls: Calls,
}

impl RecordingGuard {
    pub fn new(name: &str, priority: i32, result: GuardResult, calls: &Calls) -> Self {
        Self {
            name: name.to_string(),
            priority,
            result,
            calls: Arc::clone(calls),
        }
    }
}

impl RouteGuard for RecordingGuard {
    fn can_activate(&self, _ctx: &GuardContext) -> GuardFuture {
        self.calls.lock().push(self.name.clone());
        let result = self.result.clone();
        Box::pin(async move { Ok(result) })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn on_activated(&self, _ctx: &GuardContext) {
        self.calls.lock().push(format!("{}:activated", self.name));
    }

    fn on_denied(&self, _ctx: &GuardContext, _result: &GuardResult) {
        self.calls.lock().push(format!("{}:denied", self.name));
    }
}

/// Middleware that records `before:<name>` and `after:<name>`.
pub struct RecordingMiddleware {
    pub name: String,
    pub priority: i32,
    pub calls: Calls,
    pub fail_after: bool,
}

impl RecordingMiddleware {
    pub fn new(name: &str, priority: i32, calls: &Calls) -> Self {
        Self {
            name: name.to_string(),
            priority,
            calls: Arc::clone(calls),
            fail_after: false,
        }
    }

    pub fn failing_after(mut self) -> Self {
        self.fail_after = true;
        self
    }
}

impl RouteMiddleware for RecordingMiddleware {
    fn before_navigation(&self, _ctx: &MiddlewareContext) -> MiddlewareFuture {
        self.calls.lock().push(format!("before:{}", self.name));
        Box::pin(async { Ok(MiddlewareResult::Continue) })
    }

    fn after_navigation(&self, _ctx: &MiddlewareContext) -> AfterNavigationFuture {
        self.calls.lock().push(format!("after:{}", self.name));
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
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

pub fn history_paths(router: &Router) -> Vec<String> {
    router
        .history()
        .entries()
        .iter()
        .map(|entry| entry.path.clone())
        .collect()
}
