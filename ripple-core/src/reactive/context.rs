//! Reactive Context Guards
//!
//! The runtime keeps three pieces of dynamic context: the stack of running
//! effects, the tracking switch and the active effect scope. Each is entered
//! through an RAII guard so that the previous state is restored even if the
//! user computation panics.

use super::effect::stop_effect;
use super::runtime::{pause_tracking, enable_tracking, reset_tracking_in, try_with_runtime, with_runtime};
use super::scope::EffectScope;
use crate::graph::EffectId;

/// Guard that pops a running effect when dropped.
///
/// Created by `RuntimeState::enter_effect`. On drop it prunes the deps the
/// run did not read, restores the tracking switch and performs a stop that
/// was requested while the effect was running.
pub(crate) struct RunGuard {
    effect: EffectId,
    last_should_track: bool,
}

impl RunGuard {
    pub(crate) fn new(effect: EffectId, last_should_track: bool) -> Self {
        Self {
            effect,
            last_should_track,
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let deferred_stop =
            try_with_runtime(|rt| rt.exit_effect(self.effect, self.last_should_track))
                .unwrap_or(false);
        if deferred_stop {
            stop_effect(self.effect);
        }
    }
}

/// Guard that switches dependency tracking for its lifetime.
///
/// ```
/// use ripple_core::TrackingGuard;
///
/// {
///     let _paused = TrackingGuard::pause();
///     // reads here are not recorded
/// }
/// ```
pub struct TrackingGuard {
    _private: (),
}

impl TrackingGuard {
    /// Stop recording reads until the guard drops.
    pub fn pause() -> Self {
        pause_tracking();
        Self { _private: () }
    }

    /// Record reads until the guard drops, even inside a paused region.
    pub fn enable() -> Self {
        enable_tracking();
        Self { _private: () }
    }
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        try_with_runtime(reset_tracking_in);
    }
}

/// Guard that makes a scope the active one until dropped.
pub(crate) struct ScopeGuard {
    previous: Option<EffectScope>,
}

impl ScopeGuard {
    pub(crate) fn enter(scope: EffectScope) -> Self {
        let previous = with_runtime(|rt| rt.active_scope.replace(scope));
        Self { previous }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        // The replaced scope is dropped here, outside the runtime borrow.
        let replaced = try_with_runtime(move |rt| std::mem::replace(&mut rt.active_scope, previous));
        drop(replaced);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
