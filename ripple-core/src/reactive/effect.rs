//! Effect Implementation
//!
//! An effect is a computation that re-runs whenever the observed state it
//! read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. `effect()` runs the function immediately (unless `lazy`) to establish
//!    the initial dependencies.
//!
//! 2. When a dependency is triggered, the effect's scheduler is called if it
//!    has one, otherwise the effect re-runs synchronously.
//!
//! 3. Each run re-tracks dependencies. Deps read again are kept untouched,
//!    deps no longer read are dropped after the run.
//!
//! # Recursion
//!
//! An effect never re-enters itself: a run requested while the same effect
//! is anywhere on the stack of running effects is skipped. Writes an effect
//! makes to its own dependencies do not notify it either, unless
//! `allow_recurse` is set, in which case its scheduler is called.
//!
//! # Stopping
//!
//! `stop()` unsubscribes the effect from everything and calls `on_stop`.
//! Stopping the effect that is currently running is deferred until its run
//! finishes. A stopped effect can still be run by hand; the function is
//! then called without any tracking.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use super::operations::{TrackKey, TrackOp, TriggerOp};
use super::runtime::{try_with_runtime, with_runtime, RunEntry, StopOutcome};
use super::scope::{record_effect_scope, EffectScope};
use crate::graph::{ComputedKind, EffectFn, EffectId, EffectNode, ObjectId, SchedulerFn};
use crate::observe::{Container, Value};

/// Debug hook receiving track or trigger events.
pub type DebugHook = Rc<dyn Fn(&DebuggerEvent)>;

/// Whether a debugger event describes a read or a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugOp {
    Track(TrackOp),
    Trigger(TriggerOp),
}

/// Payload of `on_track` and `on_trigger` hooks.
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
    pub effect: EffectId,
    pub target: ObjectId,
    pub op: DebugOp,
    pub key: Option<TrackKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    /// Snapshot of a collection before `clear()`.
    pub old_target: Option<Container>,
}

/// Keeps an effect node alive in the graph.
///
/// Runners, computed values and the scope that recorded the effect all hold
/// a handle. Dropping the last one unregisters the effect from the runtime:
/// it is stopped and its node removed. If it is running, the stop happens
/// when the run ends.
pub struct EffectHandle {
    id: EffectId,
}

impl Drop for EffectHandle {
    fn drop(&mut self) {
        let outcome = try_with_runtime(|rt| match rt.stop_effect(self.id) {
            StopOutcome::Stopped { on_stop, removed } => (on_stop, removed),
            StopOutcome::Deferred => (None, None),
            StopOutcome::Noop => (None, rt.reap_if_orphaned(self.id)),
        });
        // Closures are released outside the runtime borrow.
        drop(outcome);
    }
}

/// A tracked computation registered with the runtime.
#[derive(Clone)]
pub struct ReactiveEffect {
    handle: Rc<EffectHandle>,
}

impl ReactiveEffect {
    /// Create an effect without running it.
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self::build(Rc::new(f), None, None, None)
    }

    /// Create an effect whose re-runs are delegated to `scheduler`.
    pub fn with_scheduler(f: impl Fn() + 'static, scheduler: impl Fn() + 'static) -> Self {
        let scheduler: SchedulerFn = Rc::new(move |_| scheduler());
        Self::build(Rc::new(f), Some(scheduler), None, None)
    }

    pub(crate) fn build(
        func: EffectFn,
        scheduler: Option<SchedulerFn>,
        computed: Option<ComputedKind>,
        scope: Option<&EffectScope>,
    ) -> Self {
        let id = EffectId::new();
        let handle = Rc::new(EffectHandle { id });
        let mut node = EffectNode::new(func, Rc::downgrade(&handle));
        node.scheduler = scheduler;
        node.computed = computed;
        with_runtime(|rt| rt.graph.insert_effect(id, node));

        let effect = Self { handle };
        record_effect_scope(&effect, scope);
        trace!(effect = ?id, "effect created");
        effect
    }

    pub fn id(&self) -> EffectId {
        self.handle.id
    }

    /// Run the effect, tracking what it reads.
    ///
    /// Returns `false` when the run was skipped because the effect is
    /// already running further up the stack.
    pub fn run(&self) -> bool {
        let func = with_runtime(|rt| rt.graph.effect(self.id()).map(|node| node.func.clone()));
        match func {
            Some(func) => self.run_with(move || func()).is_some(),
            None => false,
        }
    }

    pub(crate) fn run_with<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        run_effect(self.id(), f)
    }

    /// Unsubscribe from every dependency and call `on_stop`.
    pub fn stop(&self) {
        stop_effect(self.id());
    }

    pub fn is_active(&self) -> bool {
        self.with_node(|node| node.active).unwrap_or(false)
    }

    pub fn allow_recurse(&self) -> bool {
        self.with_node(|node| node.allow_recurse).unwrap_or(false)
    }

    pub fn set_allow_recurse(&self, allow: bool) {
        self.configure(|node| node.allow_recurse = allow);
    }

    /// Number of deps the effect is currently subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.with_node(|node| node.deps.len()).unwrap_or(0)
    }

    /// The effect that was running when this one started, while it runs.
    pub fn parent(&self) -> Option<EffectId> {
        self.with_node(|node| node.parent).flatten()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.handle, &other.handle)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.configure(|node| node.active = active);
    }

    pub(crate) fn configure(&self, f: impl FnOnce(&mut EffectNode)) {
        with_runtime(|rt| {
            if let Some(node) = rt.graph.effect_mut(self.id()) {
                f(node);
            }
        });
    }

    fn with_node<R>(&self, f: impl FnOnce(&EffectNode) -> R) -> Option<R> {
        with_runtime(|rt| rt.graph.effect(self.id()).map(f))
    }
}

impl fmt::Debug for ReactiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReactiveEffect").field(&self.id()).finish()
    }
}

pub(crate) fn run_effect<R>(id: EffectId, f: impl FnOnce() -> R) -> Option<R> {
    match with_runtime(|rt| rt.enter_effect(id)) {
        RunEntry::Untracked => Some(f()),
        RunEntry::Recursive => {
            trace!(effect = ?id, "skipping recursive run");
            None
        }
        RunEntry::Tracked(guard) => {
            let result = f();
            drop(guard);
            Some(result)
        }
    }
}

pub(crate) fn run_effect_by_id(id: EffectId) {
    let func = with_runtime(|rt| rt.graph.effect(id).map(|node| node.func.clone()));
    if let Some(func) = func {
        run_effect(id, move || func());
    }
}

pub(crate) fn stop_effect(id: EffectId) {
    match with_runtime(|rt| rt.stop_effect(id)) {
        StopOutcome::Stopped { on_stop, removed } => {
            debug!(effect = ?id, "effect stopped");
            drop(removed);
            if let Some(on_stop) = on_stop {
                on_stop();
            }
        }
        StopOutcome::Deferred => trace!(effect = ?id, "stop deferred until run ends"),
        StopOutcome::Noop => {}
    }
}

/// Stop an effect from a `Drop` impl. Skips `on_stop` and never panics.
pub(crate) fn dispose_effect(id: EffectId) {
    let outcome = try_with_runtime(|rt| rt.stop_effect(id));
    if let Some(StopOutcome::Stopped { removed, .. }) = outcome {
        drop(removed);
    }
}

// ----------------------------------------------------------------------------
// effect() and runners
// ----------------------------------------------------------------------------

/// Options for `effect()`.
#[derive(Clone, Default)]
pub struct EffectOptions {
    lazy: bool,
    scheduler: Option<Rc<dyn Fn()>>,
    scope: Option<EffectScope>,
    allow_recurse: bool,
    on_stop: Option<Rc<dyn Fn()>>,
    on_track: Option<DebugHook>,
    on_trigger: Option<DebugHook>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not run the effect on creation.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Called instead of re-running the effect when a dependency changes.
    pub fn scheduler(mut self, scheduler: impl Fn() + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Register the effect with this scope instead of the active one.
    pub fn scope(mut self, scope: &EffectScope) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }

    pub fn on_stop(mut self, on_stop: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Rc::new(on_stop));
        self
    }

    /// Called for every new dependency, in debug builds only.
    pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    /// Called for every trigger that reaches the effect, in debug builds
    /// only.
    pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }
}

/// Callable handle returned by `effect()`.
pub struct EffectRunner<R> {
    effect: ReactiveEffect,
    f: Rc<dyn Fn() -> R>,
}

impl<R> Clone for EffectRunner<R> {
    fn clone(&self) -> Self {
        Self {
            effect: self.effect.clone(),
            f: self.f.clone(),
        }
    }
}

impl<R: 'static> EffectRunner<R> {
    /// Run the effect and return what the function returned, or `None` if
    /// the run was skipped as recursive.
    pub fn run(&self) -> Option<R> {
        let f = self.f.clone();
        self.effect.run_with(move || f())
    }

    pub fn effect(&self) -> &ReactiveEffect {
        &self.effect
    }

    pub fn stop(&self) {
        self.effect.stop();
    }
}

impl<R> fmt::Debug for EffectRunner<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EffectRunner").field(&self.effect.id()).finish()
    }
}

/// Create an effect and run it unless `options` make it lazy.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use ripple_core::{effect, reactive, EffectOptions, Target};
///
/// let state = reactive(Target::record([("count", 0)])).into_observed().unwrap();
/// let seen = Rc::new(Cell::new(0.0));
///
/// let s = state.clone();
/// let out = seen.clone();
/// let _runner = effect(
///     move || out.set(s.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0)),
///     EffectOptions::default(),
/// );
///
/// state.set("count", 5);
/// assert_eq!(seen.get(), 5.0);
/// ```
pub fn effect<R: 'static>(f: impl Fn() -> R + 'static, options: EffectOptions) -> EffectRunner<R> {
    let f: Rc<dyn Fn() -> R> = Rc::new(f);
    let func: EffectFn = {
        let f = f.clone();
        Rc::new(move || {
            f();
        })
    };
    let scheduler = options.scheduler.map(|scheduler| -> SchedulerFn {
        Rc::new(move |_| scheduler())
    });

    let effect = ReactiveEffect::build(func, scheduler, None, options.scope.as_ref());
    let EffectOptions {
        allow_recurse,
        on_stop,
        on_track,
        on_trigger,
        ..
    } = options;
    effect.configure(move |node| {
        node.allow_recurse = allow_recurse;
        node.on_stop = on_stop;
        node.on_track = on_track;
        node.on_trigger = on_trigger;
    });

    let runner = EffectRunner { effect, f };
    if !options.lazy {
        runner.run();
    }
    runner
}

/// Stop the effect behind a runner.
pub fn stop<R>(runner: &EffectRunner<R>) {
    runner.effect.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::reactive::{track, trigger, Runtime};
    use std::cell::{Cell, RefCell};

    fn read(target: ObjectId, key: &str) {
        track(&target, TrackOp::Get, TrackKey::prop(key));
    }

    fn write(target: ObjectId, key: &str) {
        trigger(&target, TriggerOp::Set, Some(TrackKey::prop(key)), None, None);
    }

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn runs_immediately_unless_lazy() {
        let (runs, r) = counter();
        let _eager = effect(move || r.set(r.get() + 1), EffectOptions::default());
        assert_eq!(runs.get(), 1);

        let (runs, r) = counter();
        let lazy = effect(move || r.set(r.get() + 1), EffectOptions::new().lazy());
        assert_eq!(runs.get(), 0);
        lazy.run();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn runner_returns_function_result() {
        let runner = effect(|| 42, EffectOptions::new().lazy());
        assert_eq!(runner.run(), Some(42));
    }

    #[test]
    fn scheduler_replaces_rerun() {
        let target = ObjectId::new();
        let (runs, r) = counter();
        let (scheduled, s) = counter();
        let runner = effect(
            move || {
                r.set(r.get() + 1);
                read(target, "a");
            },
            EffectOptions::new().scheduler(move || s.set(s.get() + 1)),
        );

        write(target, "a");
        assert_eq!(runs.get(), 1);
        assert_eq!(scheduled.get(), 1);

        runner.run();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn self_trigger_does_not_recurse() {
        let target = ObjectId::new();
        let (runs, r) = counter();
        let _runner = effect(
            move || {
                r.set(r.get() + 1);
                read(target, "a");
                write(target, "a");
            },
            EffectOptions::default(),
        );
        assert_eq!(runs.get(), 1);

        write(target, "a");
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn allow_recurse_reaches_scheduler_during_own_run() {
        let target = ObjectId::new();
        let (scheduled, s) = counter();
        let _runner = effect(
            move || {
                read(target, "a");
                write(target, "a");
            },
            EffectOptions::new()
                .allow_recurse()
                .scheduler(move || s.set(s.get() + 1)),
        );
        assert_eq!(scheduled.get(), 1);
    }

    #[test]
    fn nested_run_of_running_effect_is_skipped() {
        let slot: Rc<RefCell<Option<EffectRunner<()>>>> = Rc::new(RefCell::new(None));
        let (runs, r) = counter();
        let inner_slot = slot.clone();
        let runner = effect(
            move || {
                r.set(r.get() + 1);
                if let Some(runner) = inner_slot.borrow().as_ref() {
                    assert!(runner.run().is_none());
                }
            },
            EffectOptions::new().lazy(),
        );
        *slot.borrow_mut() = Some(runner.clone());
        assert_eq!(runner.run(), Some(()));
        assert_eq!(runs.get(), 1);
        slot.borrow_mut().take();
    }

    #[test]
    fn stale_branches_are_dropped() {
        let target = ObjectId::new();
        let flag = Rc::new(Cell::new(true));
        let (runs, r) = counter();
        let f = flag.clone();
        let runner = effect(
            move || {
                r.set(r.get() + 1);
                read(target, "flag");
                if f.get() {
                    read(target, "a");
                } else {
                    read(target, "b");
                }
            },
            EffectOptions::default(),
        );
        assert_eq!(runner.effect().dependency_count(), 2);

        flag.set(false);
        write(target, "flag");
        assert_eq!(runs.get(), 2);

        write(target, "a");
        assert_eq!(runs.get(), 2);
        write(target, "b");
        assert_eq!(runs.get(), 3);
        assert_eq!(Runtime::subscriber_count(&target, &TrackKey::prop("a")), 0);
    }

    #[test]
    fn full_cleanup_past_marker_depth() {
        let previous = Runtime::configure(RuntimeConfig::new().with_max_marker_bits(0));
        let target = ObjectId::new();
        let flag = Rc::new(Cell::new(true));
        let (runs, r) = counter();
        let f = flag.clone();
        let _runner = effect(
            move || {
                r.set(r.get() + 1);
                read(target, "flag");
                read(target, if f.get() { "a" } else { "b" });
            },
            EffectOptions::default(),
        );

        flag.set(false);
        write(target, "flag");
        write(target, "a");
        assert_eq!(runs.get(), 2);
        write(target, "b");
        assert_eq!(runs.get(), 3);
        Runtime::configure(previous);
    }

    #[test]
    fn stop_unsubscribes_and_calls_on_stop_once() {
        let target = ObjectId::new();
        let (runs, r) = counter();
        let (stops, s) = counter();
        let runner = effect(
            move || {
                r.set(r.get() + 1);
                read(target, "a");
            },
            EffectOptions::new().on_stop(move || s.set(s.get() + 1)),
        );

        stop(&runner);
        stop(&runner);
        assert_eq!(stops.get(), 1);
        assert!(!runner.effect().is_active());

        write(target, "a");
        assert_eq!(runs.get(), 1);

        // Manual run still works, without tracking.
        runner.run();
        assert_eq!(runs.get(), 2);
        assert_eq!(Runtime::subscriber_count(&target, &TrackKey::prop("a")), 0);
    }

    #[test]
    fn stop_during_own_run_is_deferred() {
        let target = ObjectId::new();
        let slot: Rc<RefCell<Option<ReactiveEffect>>> = Rc::new(RefCell::new(None));
        let (stops, s) = counter();
        let inner_slot = slot.clone();
        let runner = effect(
            move || {
                if let Some(effect) = inner_slot.borrow().as_ref() {
                    effect.stop();
                    assert!(effect.is_active());
                }
                read(target, "a");
            },
            EffectOptions::new().lazy().on_stop(move || s.set(s.get() + 1)),
        );
        *slot.borrow_mut() = Some(runner.effect().clone());

        runner.run();
        assert!(!runner.effect().is_active());
        assert_eq!(stops.get(), 1);
        assert_eq!(runner.effect().dependency_count(), 0);
        slot.borrow_mut().take();
    }

    /// A fresh effect reading `a` must still be re-run by a write.
    fn assert_slot_still_tracks(target: ObjectId) {
        let (runs, r) = counter();
        let _fresh = effect(
            move || {
                r.set(r.get() + 1);
                read(target, "a");
            },
            EffectOptions::default(),
        );
        write(target, "a");
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn stop_from_nested_effect_waits_for_outer_run() {
        let target = ObjectId::new();
        let slot: Rc<RefCell<Option<ReactiveEffect>>> = Rc::new(RefCell::new(None));
        let (stops, s) = counter();
        let outer_slot = slot.clone();
        let outer = effect(
            move || {
                read(target, "a");
                let victim = outer_slot.borrow().clone();
                let _inner = effect(
                    move || {
                        if let Some(outer) = victim.as_ref() {
                            outer.stop();
                            assert!(outer.is_active());
                        }
                    },
                    EffectOptions::default(),
                );
            },
            EffectOptions::new().lazy().on_stop(move || s.set(s.get() + 1)),
        );
        *slot.borrow_mut() = Some(outer.effect().clone());

        outer.run();
        assert!(!outer.effect().is_active());
        assert_eq!(stops.get(), 1);
        assert_eq!(Runtime::subscriber_count(&target, &TrackKey::prop("a")), 0);
        slot.borrow_mut().take();

        assert_slot_still_tracks(target);
    }

    #[test]
    fn scope_stopped_from_nested_effect_waits_for_outer_run() {
        let target = ObjectId::new();
        let scope = EffectScope::new();
        let stopper = scope.clone();
        let armed = Rc::new(Cell::new(false));
        let a = armed.clone();
        let outer = scope
            .run(|| {
                effect(
                    move || {
                        read(target, "a");
                        if a.get() {
                            let stopper = stopper.clone();
                            let _inner = effect(move || stopper.stop(), EffectOptions::default());
                        }
                    },
                    EffectOptions::default(),
                )
            })
            .expect("active scope");

        armed.set(true);
        outer.run();
        assert!(!scope.is_active());
        assert!(!outer.effect().is_active());
        assert_eq!(Runtime::subscriber_count(&target, &TrackKey::prop("a")), 0);

        assert_slot_still_tracks(target);
    }

    #[test]
    fn effect_stopped_mid_delivery_is_skipped() {
        let target = ObjectId::new();
        let victim: Rc<RefCell<Option<ReactiveEffect>>> = Rc::new(RefCell::new(None));
        let (victim_runs, v) = counter();

        let slot = victim.clone();
        let _killer = effect(
            move || {
                read(target, "a");
                if let Some(effect) = slot.borrow().as_ref() {
                    effect.stop();
                }
            },
            EffectOptions::default(),
        );
        let runner = effect(
            move || {
                v.set(v.get() + 1);
                read(target, "a");
            },
            EffectOptions::default(),
        );
        *victim.borrow_mut() = Some(runner.effect().clone());

        write(target, "a");
        assert_eq!(victim_runs.get(), 1);
    }

    #[test]
    fn nested_effects_track_independently() {
        let target = ObjectId::new();
        let (outer_runs, o) = counter();
        let (inner_runs, i) = counter();
        let inner_holder: Rc<RefCell<Vec<EffectRunner<()>>>> = Rc::new(RefCell::new(Vec::new()));
        let holder = inner_holder.clone();
        let _outer = effect(
            move || {
                o.set(o.get() + 1);
                read(target, "outer");
                let i = i.clone();
                let inner = effect(
                    move || {
                        i.set(i.get() + 1);
                        read(target, "inner");
                    },
                    EffectOptions::default(),
                );
                assert!(Runtime::active_effect().is_some());
                holder.borrow_mut().push(inner);
            },
            EffectOptions::default(),
        );
        assert_eq!((outer_runs.get(), inner_runs.get()), (1, 1));

        write(target, "inner");
        assert_eq!((outer_runs.get(), inner_runs.get()), (1, 2));

        write(target, "outer");
        assert_eq!((outer_runs.get(), inner_runs.get()), (2, 3));
        assert_eq!(Runtime::subscriber_count(&target, &TrackKey::prop("outer")), 1);
    }

    #[test]
    fn parent_is_the_enclosing_effect_while_running() {
        let slot: Rc<RefCell<Option<ReactiveEffect>>> = Rc::new(RefCell::new(None));
        let seen: Rc<Cell<Option<EffectId>>> = Rc::new(Cell::new(None));
        let inner_slot = slot.clone();
        let s = seen.clone();
        let inner = effect(
            move || {
                if let Some(me) = inner_slot.borrow().as_ref() {
                    s.set(me.parent());
                }
            },
            EffectOptions::new().lazy(),
        );
        *slot.borrow_mut() = Some(inner.effect().clone());

        let nested = inner.clone();
        let outer = effect(
            move || {
                nested.run();
            },
            EffectOptions::new().lazy(),
        );
        outer.run();
        assert_eq!(seen.get(), Some(outer.effect().id()));
        assert_eq!(inner.effect().parent(), None);
        slot.borrow_mut().take();
    }

    #[test]
    fn debug_hooks_see_track_and_trigger() {
        let target = ObjectId::new();
        let tracked: Rc<RefCell<Vec<DebugOp>>> = Rc::new(RefCell::new(Vec::new()));
        let triggered: Rc<RefCell<Vec<DebugOp>>> = Rc::new(RefCell::new(Vec::new()));
        let t = tracked.clone();
        let g = triggered.clone();
        let _runner = effect(
            move || {
                read(target, "a");
                read(target, "a");
            },
            EffectOptions::new()
                .on_track(move |event| t.borrow_mut().push(event.op))
                .on_trigger(move |event| g.borrow_mut().push(event.op)),
        );
        write(target, "a");

        if cfg!(debug_assertions) {
            // One new dependency on the first run, none on the re-run.
            assert_eq!(*tracked.borrow(), vec![DebugOp::Track(TrackOp::Get)]);
            assert_eq!(*triggered.borrow(), vec![DebugOp::Trigger(TriggerOp::Set)]);
        }
    }
}
