//! Graph Nodes
//!
//! Identities for everything that participates in dependency tracking, and
//! the per-effect record owned by the subscriber graph.

use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::reactive::{DebugHook, EffectHandle};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Generate a new unique ID.
            pub fn new() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(0);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }

            /// Get the raw ID value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an effect.
    EffectId,
    "Effect"
);

define_id!(
    /// Unique identifier for a dependency set.
    DepId,
    "Dep"
);

define_id!(
    /// Identity of anything that can be tracked: raw containers, wrappers,
    /// refs and custom integration targets.
    ObjectId,
    "Object"
);

/// Why a scheduler is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleCause {
    /// One of the effect's dependencies was triggered.
    Dependency,
    /// A deferred computed upstream is invalidating its chained deferred
    /// computeds synchronously.
    ComputedChain,
}

/// Marks the effects that back computed values. Computed effects are
/// notified before plain effects during a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedKind {
    Eager,
    Deferred,
}

pub(crate) type EffectFn = Rc<dyn Fn()>;
pub(crate) type SchedulerFn = Rc<dyn Fn(ScheduleCause)>;

/// The graph-owned state of one effect.
pub(crate) struct EffectNode {
    pub(crate) func: EffectFn,
    pub(crate) scheduler: Option<SchedulerFn>,
    /// Deps this effect is subscribed to. Mirrors the subscriber sets.
    pub(crate) deps: SmallVec<[DepId; 8]>,
    pub(crate) active: bool,
    /// The effect that was running when this one started, if any.
    pub(crate) parent: Option<EffectId>,
    pub(crate) allow_recurse: bool,
    /// Set when `stop()` is requested while the effect is running.
    pub(crate) defer_stop: bool,
    pub(crate) computed: Option<ComputedKind>,
    pub(crate) on_stop: Option<Rc<dyn Fn()>>,
    pub(crate) on_track: Option<DebugHook>,
    pub(crate) on_trigger: Option<DebugHook>,
    pub(crate) handle: Weak<EffectHandle>,
}

impl EffectNode {
    pub(crate) fn new(func: EffectFn, handle: Weak<EffectHandle>) -> Self {
        Self {
            func,
            scheduler: None,
            deps: SmallVec::new(),
            active: true,
            parent: None,
            allow_recurse: false,
            defer_stop: false,
            computed: None,
            on_stop: None,
            on_track: None,
            on_trigger: None,
            handle,
        }
    }

    /// Whether any `ReactiveEffect` handle still refers to this node.
    pub(crate) fn has_handles(&self) -> bool {
        self.handle.strong_count() > 0
    }
}

impl fmt::Debug for EffectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectNode")
            .field("deps", &self.deps)
            .field("active", &self.active)
            .field("parent", &self.parent)
            .field("allow_recurse", &self.allow_recurse)
            .field("computed", &self.computed)
            .finish()
    }
}
