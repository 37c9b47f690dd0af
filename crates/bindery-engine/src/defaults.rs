//! Default constants for runtime configuration.

/// Allocations between automatic reclaim sweeps (0 = only explicit sweeps).
pub const DEFAULT_AUTO_RECLAIM_THRESHOLD: usize = 0;

/// Maximum nesting of host overrides, event handlers and blocks.
pub const DEFAULT_MAX_DISPATCH_DEPTH: usize = 256;

/// Reclaim sweeps repeat until a pass frees nothing; this bounds the passes.
pub const MAX_RECLAIM_PASSES: usize = 64;
