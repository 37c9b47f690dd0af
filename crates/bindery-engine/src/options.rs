//! Runtime configuration
//!
//! Options can be built in code or loaded from TOML text. Missing keys fall
//! back to the constants in [`crate::defaults`].
//!
//! ```toml
//! auto_reclaim_threshold = 64
//! max_dispatch_depth = 128
//! trace_calls = true
//! ```

use serde::Deserialize;

use crate::defaults::{DEFAULT_AUTO_RECLAIM_THRESHOLD, DEFAULT_MAX_DISPATCH_DEPTH};

/// Errors raised while loading options
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    /// The TOML text did not parse or had wrongly typed keys
    #[error("Invalid runtime options: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables of a [`crate::Runtime`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeOptions {
    /// Constructions between automatic reclaim sweeps (0 disables)
    pub auto_reclaim_threshold: usize,
    /// Maximum nesting of host callbacks re-entering the runtime
    pub max_dispatch_depth: usize,
    /// Emit a trace event for every resolved call
    pub trace_calls: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            auto_reclaim_threshold: DEFAULT_AUTO_RECLAIM_THRESHOLD,
            max_dispatch_depth: DEFAULT_MAX_DISPATCH_DEPTH,
            trace_calls: false,
        }
    }
}

impl RuntimeOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(text)?)
    }

    /// Set the automatic reclaim threshold
    pub fn with_auto_reclaim(mut self, threshold: usize) -> Self {
        self.auto_reclaim_threshold = threshold;
        self
    }

    /// Set the maximum dispatch depth
    pub fn with_max_dispatch_depth(mut self, depth: usize) -> Self {
        self.max_dispatch_depth = depth;
        self
    }

    /// Enable per-call trace events
    pub fn with_trace_calls(mut self) -> Self {
        self.trace_calls = true;
        self
    }
}
