//! Ripple Core
//!
//! This crate provides a fine-grained reactivity engine. It implements:
//!
//! - Observed containers (records, arrays, maps, sets) with per-key
//!   dependency tracking
//! - Refs, computed values and deferred computed values
//! - Effects with optional schedulers, and scopes to stop them in bulk
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `observe`: raw containers, observed views and the dynamic `Value`
//! - `reactive`: effects, refs, computed values, scopes and the runtime
//! - `graph`: the dependency graph between deps and effects
//! - `config`: per-thread runtime configuration
//! - `error`: development diagnostics
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use ripple_core::{computed, effect, reactive, EffectOptions, Target};
//!
//! let state = reactive(Target::record([("count", 1)]))
//!     .into_observed()
//!     .unwrap();
//!
//! let s = state.clone();
//! let doubled = computed(move || s.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0) * 2.0);
//!
//! let seen = Rc::new(Cell::new(0.0));
//! let out = seen.clone();
//! let d = doubled.clone();
//! let _runner = effect(move || out.set(d.get()), EffectOptions::default());
//! assert_eq!(seen.get(), 2.0);
//!
//! state.set("count", 5);
//! assert_eq!(seen.get(), 10.0);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod observe;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
pub use graph::{ComputedKind, DepId, EffectId, ObjectId, ScheduleCause};
pub use observe::{
    is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, wrap, Container, ContainerKind, Flavor, Observed,
    ReactiveFlag, Record, Target, TargetKind, Value,
};
pub use reactive::{
    computed, custom_ref, deferred_computed, effect, effect_scope, enable_tracking, flush_jobs,
    get_current_scope, has_pending_jobs, is_ref, on_scope_dispose, pause_tracking, queue_job,
    reset_tracking, shallow_ref, stop, to_ref, to_ref_with_default, to_refs, track, trigger,
    trigger_ref, unref, untracked, AnyRef, Computed, ComputedOptions, CustomRef, DebugHook,
    DebugOp, DebuggerEvent, DeferredComputed, EffectOptions, EffectRunner, EffectScope, Ref,
    RefTracker, RefValue, ReactiveEffect, Runtime, TrackKey, TrackOp, TrackTarget,
    TrackingGuard, TriggerOp, ValueCell,
};
