//! Logging dispatch macros
//!
//! The engine never installs a logger. It only emits records through these
//! macros, which forward to the `log` crate (feature `log`, default) or to
//! `tracing` (feature `tracing`). Enable at most one of the two.
//!
//! # Usage
//!
//! ```ignore
//! use navigation_engine::{debug_log, warn_log};
//!
//! debug_log!("Resolving '{}'", path);
//! warn_log!("Redirect loop: {}", chain.join(" -> "));
//! ```

/// Trace-level record: per-guard and per-middleware decisions.
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::trace!($($arg)*);
        #[cfg(feature = "log")]
        ::log::trace!($($arg)*);
    };
}

/// Debug-level record: resolution steps and redirects.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!($($arg)*);
        #[cfg(feature = "log")]
        ::log::debug!($($arg)*);
    };
}

/// Info-level record: committed navigations and denials.
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::info!($($arg)*);
        #[cfg(feature = "log")]
        ::log::info!($($arg)*);
    };
}

/// Warn-level record: loops, aborts and suspicious route tables.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::warn!($($arg)*);
        #[cfg(feature = "log")]
        ::log::warn!($($arg)*);
    };
}

/// Error-level record: failures swallowed by the after-navigation phase.
#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::error!($($arg)*);
        #[cfg(feature = "log")]
        ::log::error!($($arg)*);
    };
}
