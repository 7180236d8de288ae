//! Runtime Configuration
//!
//! Tunables for the reactive runtime. Configuration is installed per thread,
//! matching the thread-local tracking context: every store write and every
//! computation run on a thread reads the configuration installed there.
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::ReactiveConfig;
//!
//! let config = ReactiveConfig::from_json(r#"{"max_notify_depth": 16}"#)?;
//! config.install();
//! ```

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

/// Default bound on re-entrant notification depth.
pub const DEFAULT_MAX_NOTIFY_DEPTH: usize = 100;

thread_local! {
    static CONFIG: RefCell<ReactiveConfig> = RefCell::new(ReactiveConfig::default());
}

/// Configuration for dependency tracking and notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    /// Unsubscribe a computation from fields it stopped reading on its
    /// latest run. When false, subscriptions accumulate for the lifetime of
    /// the computation.
    pub prune_stale_dependencies: bool,

    /// Maximum nesting of notifications triggered by writes made from inside
    /// running computations.
    pub max_notify_depth: usize,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            prune_stale_dependencies: true,
            max_notify_depth: DEFAULT_MAX_NOTIFY_DEPTH,
        }
    }
}

impl ReactiveConfig {
    /// Parse configuration from a JSON document. Missing fields take their
    /// default values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Install this configuration for the current thread.
    ///
    /// Returns the previously installed configuration.
    pub fn install(self) -> ReactiveConfig {
        tracing::debug!(config = ?self, "installing reactive config");
        CONFIG.with(|config| config.replace(self))
    }

    /// The configuration installed on the current thread.
    pub fn current() -> ReactiveConfig {
        CONFIG.with(|config| config.borrow().clone())
    }
}
