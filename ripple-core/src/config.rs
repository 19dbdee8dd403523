//! Runtime configuration.
//!
//! Configuration is per thread, like the runtime itself. Install it with
//! `Runtime::configure` before creating effects.

use std::fmt;
use std::rc::Rc;

use crate::error::ReactiveError;

/// Default recursion depth up to which dependencies are diffed with marker
/// bits instead of being rebuilt on every run.
pub const DEFAULT_MAX_MARKER_BITS: u32 = 30;

/// Marker bits live in a `u32`, so depth 31 is the highest usable bit.
pub const MARKER_BITS_LIMIT: u32 = 31;

pub type WarnHandler = Rc<dyn Fn(&ReactiveError)>;

/// Tunables of the reactive runtime.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Effects nested deeper than this fall back to full dependency cleanup
    /// before each run.
    pub max_marker_bits: u32,
    /// Receives every development warning in addition to the log.
    pub warn_handler: Option<WarnHandler>,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the marker depth, clamped to `MARKER_BITS_LIMIT`.
    pub fn with_max_marker_bits(mut self, bits: u32) -> Self {
        self.max_marker_bits = bits.min(MARKER_BITS_LIMIT);
        self
    }

    pub fn with_warn_handler(mut self, handler: impl Fn(&ReactiveError) + 'static) -> Self {
        self.warn_handler = Some(Rc::new(handler));
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_marker_bits: DEFAULT_MAX_MARKER_BITS,
            warn_handler: None,
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("max_marker_bits", &self.max_marker_bits)
            .field("warn_handler", &self.warn_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_bits_are_clamped() {
        assert_eq!(RuntimeConfig::new().max_marker_bits, DEFAULT_MAX_MARKER_BITS);
        assert_eq!(
            RuntimeConfig::new().with_max_marker_bits(64).max_marker_bits,
            MARKER_BITS_LIMIT
        );
        assert_eq!(RuntimeConfig::new().with_max_marker_bits(2).max_marker_bits, 2);
    }
}
