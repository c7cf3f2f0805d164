//! Error taxonomy and resolution outcomes
//!
//! Expected control flow (not found, denied, aborted, redirect loop) is a
//! [`ResolutionOutcome`] value. [`RouteError`] is for programmer errors
//! (bad patterns, missing parameters, inconsistent route tables) and for
//! failures raised inside guard or middleware callbacks.
//!
//! # Examples
//!
//! ```
//! use navigation_engine::{ResolutionOutcome, RouteError};
//!
//! let outcome = ResolutionOutcome::LoopDetected {
//!     chain: vec!["/a".into(), "/b".into(), "/a".into()],
//! };
//! assert!(outcome.is_loop());
//!
//! let err = outcome.into_result().unwrap_err();
//! assert_eq!(err.to_string(), "redirect loop detected: /a -> /b -> /a");
//! ```

use crate::context::{Payload, ResolvedRoute};
use std::fmt;

/// Error type returned by guard and middleware callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which interception stage a [`RouteError::PipelineFailure`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Guard,
    Middleware,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Guard => f.write_str("guard"),
            PipelineStage::Middleware => f.write_str("middleware"),
        }
    }
}

/// Errors raised by the resolution engine.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The path matches no registered pattern
    #[error("no route matches path: {path}")]
    NoMatch { path: String },

    /// `build_path` was called without a value for a named parameter
    #[error("missing path parameter '{name}' for pattern {pattern}")]
    MissingPathParameter { pattern: String, name: String },

    /// A pattern could not be parsed or built
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// `url_for` was given a name no route carries
    #[error("no route named '{name}'")]
    UnknownRoute { name: String },

    #[error("duplicate route name: {name}")]
    DuplicateRouteName { name: String },

    #[error("route '{route}' references unknown parent '{parent}'")]
    UnknownParent { route: String, parent: String },

    #[error("route '{route}' is its own ancestor")]
    ParentCycle { route: String },

    #[error("redirect loop detected: {}", chain.join(" -> "))]
    RedirectLoop { chain: Vec<String> },

    #[error("navigation denied by {guard}: {reason}")]
    GuardDenied { guard: String, reason: String },

    #[error("navigation aborted by {middleware}: {reason}")]
    MiddlewareAborted { middleware: String, reason: String },

    #[error("navigation left pending by {guard}")]
    GuardPending { guard: String },

    /// A newer navigation invalidated this one before it committed
    #[error("navigation superseded by a newer request")]
    Superseded,

    /// A guard or middleware callback failed
    #[error("{stage} '{name}' failed: {source}")]
    PipelineFailure {
        stage: PipelineStage,
        name: String,
        #[source]
        source: BoxError,
    },
}

impl RouteError {
    pub(crate) fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        RouteError::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// A navigation that passed every guard and middleware.
#[derive(Debug, Clone)]
pub struct ResolvedNavigation {
    /// Matched route, its captured params and the final query
    pub route: ResolvedRoute,
    /// Opaque body forwarded from the request
    pub body: Option<Payload>,
    /// Opaque extra, possibly replaced by a guard redirect
    pub extra: Option<Payload>,
    /// Every target visited, starting with the requested path
    pub redirect_chain: Vec<String>,
    pub is_replace: bool,
    /// Middleware whose `after_navigation` failed
    pub after_navigation_failures: Vec<String>,
}

impl ResolvedNavigation {
    /// Whether any redirect was followed before settling.
    pub fn was_redirected(&self) -> bool {
        self.redirect_chain.len() > 1
    }
}

/// Terminal state of one resolution.
#[derive(Debug, Clone)]
pub enum ResolutionOutcome {
    /// Navigation allowed and committed
    Resolved(ResolvedNavigation),
    /// A guard denied the navigation
    Denied { guard: String, reason: String },
    /// A middleware aborted the navigation
    Aborted { middleware: String, reason: String },
    /// No route matches the (possibly redirected) path
    NotFound { path: String },
    /// Redirects formed a cycle or exceeded the hop bound
    LoopDetected { chain: Vec<String> },
    /// A guard took over the navigation without deciding
    Pending { guard: String },
    /// The run was invalidated before it could commit
    Superseded,
}

impl ResolutionOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionOutcome::Resolved(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, ResolutionOutcome::Denied { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, ResolutionOutcome::Aborted { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolutionOutcome::NotFound { .. })
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, ResolutionOutcome::LoopDetected { .. })
    }

    /// The committed navigation, if any.
    pub fn resolved(&self) -> Option<&ResolvedNavigation> {
        match self {
            ResolutionOutcome::Resolved(nav) => Some(nav),
            _ => None,
        }
    }

    /// Convert every non-`Resolved` state into the matching [`RouteError`].
    pub fn into_result(self) -> Result<ResolvedNavigation, RouteError> {
        match self {
            ResolutionOutcome::Resolved(nav) => Ok(nav),
            ResolutionOutcome::Denied { guard, reason } => {
                Err(RouteError::GuardDenied { guard, reason })
            }
            ResolutionOutcome::Aborted { middleware, reason } => {
                Err(RouteError::MiddlewareAborted { middleware, reason })
            }
            ResolutionOutcome::NotFound { path } => Err(RouteError::NoMatch { path }),
            ResolutionOutcome::LoopDetected { chain } => Err(RouteError::RedirectLoop { chain }),
            ResolutionOutcome::Pending { guard } => Err(RouteError::GuardPending { guard }),
            ResolutionOutcome::Superseded => Err(RouteError::Superseded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_outcome_predicates() {
        let outcome = ResolutionOutcome::NotFound {
            path: "/missing".to_string(),
        };
        assert!(outcome.is_not_found());
        assert!(!outcome.is_resolved());
        assert!(outcome.resolved().is_none());
    }

    #[test]
    fn test_into_result_maps_denial() {
        let outcome = ResolutionOutcome::Denied {
            guard: "AuthGuard".to_string(),
            reason: "not signed in".to_string(),
        };
        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, RouteError::GuardDenied { .. }));
        assert_eq!(err.to_string(), "navigation denied by AuthGuard: not signed in");
    }

    #[test]
    fn test_pipeline_failure_keeps_source() {
        let err = RouteError::PipelineFailure {
            stage: PipelineStage::Middleware,
            name: "Analytics".to_string(),
            source: "socket closed".into(),
        };
        assert_eq!(err.to_string(), "middleware 'Analytics' failed: socket closed");
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("socket closed"));
    }

    #[test]
    fn test_missing_parameter_display() {
        let err = RouteError::MissingPathParameter {
            pattern: "/users/:id".to_string(),
            name: "id".to_string(),
        };
        assert_eq!(err.to_string(), "missing path parameter 'id' for pattern /users/:id");
    }
}
