//! Reactive Primitives
//!
//! This module implements the core reactive system: effects, refs, computed
//! values and the runtime that tracks which effects read what.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An effect is a computation that is re-run (or re-scheduled) whenever
//! the observed state it read during its last run changes. Effects nest:
//! an effect created while another runs is independent of it, but the
//! running stack prevents any effect from re-entering itself.
//!
//! ## Refs
//!
//! A ref is a single reactive cell. Typed refs (`Ref<T>`) are used from
//! Rust code directly; type-erased refs (`AnyRef`) can be stored inside
//! observed containers and are unwrapped on read.
//!
//! ## Computed Values
//!
//! A computed value caches a derivation and re-evaluates lazily after its
//! dependencies change. A deferred computed additionally batches its change
//! notifications to the next tick of the job queue.
//!
//! ## Scopes
//!
//! An effect scope collects effects created inside it so they can be
//! stopped together.
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic: reads of observed state call `track`
//! and writes call `trigger`. All bookkeeping lives in a thread-local
//! runtime, so reactive values are `!Send` and each thread has an
//! independent reactive world.

mod computed;
mod context;
mod deferred;
mod effect;
mod operations;
mod refs;
pub(crate) mod runtime;
mod scope;
mod tick;

pub use computed::{computed, Computed, ComputedOptions};
pub use context::TrackingGuard;
pub use deferred::{deferred_computed, DeferredComputed};
pub use effect::{
    effect, stop, DebugHook, DebugOp, DebuggerEvent, EffectHandle, EffectOptions, EffectRunner,
    ReactiveEffect,
};
pub use operations::{TrackKey, TrackOp, TrackTarget, TriggerOp};
pub use refs::{
    custom_ref, is_ref, shallow_ref, to_ref, to_ref_with_default, to_refs, trigger_ref, unref,
    AnyRef, CustomRef, Ref, RefTracker, RefValue, ValueCell,
};
pub use runtime::{
    enable_tracking, pause_tracking, reset_tracking, track, trigger, untracked, Runtime,
};
pub use scope::{effect_scope, get_current_scope, on_scope_dispose, EffectScope};
pub use tick::{flush_jobs, has_pending_jobs, queue_job};
