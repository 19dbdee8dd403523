//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects observed state with
//! the effects that read it. It owns the subscriber graph, the per-target
//! dependency registry and the stack of running effects.
//!
//! # How It Works
//!
//! 1. When an effect runs, it is pushed onto the effect stack together with
//!    the marker bit of its depth.
//!
//! 2. Reads of observed state call `track`. The runtime looks up (or
//!    creates) the dep for `(target, key)` and records it against the
//!    effect on top of the stack.
//!
//! 3. Writes call `trigger`. The runtime collects the deps affected by the
//!    write, unions their subscribers and notifies them:
//!    a. Computed effects first, so derived values are invalidated before
//!       anything reads them
//!    b. An effect with a scheduler gets the scheduler called
//!    c. Any other effect is re-run synchronously
//!
//! # Threading
//!
//! The runtime is thread-local. Everything reactive is `!Send`, and all
//! bookkeeping lives behind a single `RefCell`. User code (effect bodies,
//! schedulers, hooks) is never called while that cell is borrowed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::mem;

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::debug;

use super::context::{RunGuard, TrackingGuard};
use super::effect::{run_effect_by_id, DebugHook, DebugOp, DebuggerEvent};
use super::operations::{TrackKey, TrackOp, TrackTarget, TriggerOp};
use super::scope::EffectScope;
use crate::config::{RuntimeConfig, MARKER_BITS_LIMIT};
use crate::graph::{
    ComputedKind, DepGraph, DepId, EffectId, EffectNode, ObjectId, ScheduleCause, SchedulerFn,
};
use crate::observe::{Container, ContainerKind, Value};

type TargetDeps = HashMap<TrackKey, DepId>;

#[derive(Debug, Clone, Copy)]
struct Frame {
    effect: EffectId,
    /// Marker bit of this depth, `None` past the configured cap.
    bit: Option<u32>,
}

/// All per-thread reactive bookkeeping.
pub(crate) struct RuntimeState {
    pub(crate) graph: DepGraph,
    targets: HashMap<ObjectId, TargetDeps>,
    frames: Vec<Frame>,
    should_track: bool,
    track_stack: Vec<bool>,
    pub(crate) active_scope: Option<EffectScope>,
    pub(crate) config: RuntimeConfig,
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::new());
}

pub(crate) fn with_runtime<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> R {
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

/// Like `with_runtime`, but gives up instead of panicking when the runtime
/// is already borrowed or has been torn down. Used from `Drop` impls.
pub(crate) fn try_with_runtime<R>(f: impl FnOnce(&mut RuntimeState) -> R) -> Option<R> {
    RUNTIME
        .try_with(|rt| rt.try_borrow_mut().ok().map(|mut state| f(&mut state)))
        .ok()
        .flatten()
}

/// Outcome of trying to start an effect run.
pub(crate) enum RunEntry {
    /// The effect is stopped or unknown: run the body without tracking.
    Untracked,
    /// The effect is already on the stack: skip the run.
    Recursive,
    /// The effect is now on the stack until the guard drops.
    Tracked(RunGuard),
}

pub(crate) enum StopOutcome {
    Noop,
    Deferred,
    Stopped {
        on_stop: Option<std::rc::Rc<dyn Fn()>>,
        removed: Option<EffectNode>,
    },
}

impl RuntimeState {
    fn new() -> Self {
        Self {
            graph: DepGraph::new(),
            targets: HashMap::new(),
            frames: Vec::new(),
            should_track: true,
            track_stack: Vec::new(),
            active_scope: None,
            config: RuntimeConfig::default(),
        }
    }

    pub(crate) fn active_effect(&self) -> Option<EffectId> {
        self.frames.last().map(|frame| frame.effect)
    }

    /// The effect that reads should be recorded against, if any.
    fn tracking_effect(&self) -> Option<Frame> {
        if self.should_track {
            self.frames.last().copied()
        } else {
            None
        }
    }

    fn dep_for(&mut self, target: ObjectId, key: &TrackKey) -> DepId {
        let Self { graph, targets, .. } = self;
        let keys = targets.entry(target).or_default();
        match keys.get(key) {
            Some(dep) => *dep,
            None => {
                let dep = graph.create_dep();
                keys.insert(key.clone(), dep);
                dep
            }
        }
    }

    /// Record a read of `dep`. Returns the effect's track hook when a new
    /// edge was created.
    fn track_dep(&mut self, dep: DepId, frame: Frame) -> Option<DebugHook> {
        let linked = self.graph.track(dep, frame.effect, frame.bit);
        if linked && cfg!(debug_assertions) {
            self.graph
                .effect(frame.effect)
                .and_then(|node| node.on_track.clone())
        } else {
            None
        }
    }

    pub(crate) fn enter_effect(&mut self, id: EffectId) -> RunEntry {
        match self.graph.effect(id) {
            Some(node) if node.active => {}
            _ => return RunEntry::Untracked,
        }
        if self.frames.iter().any(|frame| frame.effect == id) {
            return RunEntry::Recursive;
        }

        let parent = self.active_effect();
        let depth = self.frames.len() as u32 + 1;
        let bit = (depth <= self.config.max_marker_bits).then(|| 1u32 << depth);
        if let Some(node) = self.graph.effect_mut(id) {
            node.parent = parent;
        }
        match bit {
            Some(bit) => self.graph.init_markers(id, bit),
            None => self.graph.cleanup_effect(id),
        }

        self.frames.push(Frame { effect: id, bit });
        let last_should_track = mem::replace(&mut self.should_track, true);
        RunEntry::Tracked(RunGuard::new(id, last_should_track))
    }

    /// Pop the running effect. Returns `true` when a stop was requested
    /// during the run.
    pub(crate) fn exit_effect(&mut self, id: EffectId, last_should_track: bool) -> bool {
        let frame = self.frames.pop();
        debug_assert_eq!(
            frame.map(|f| f.effect),
            Some(id),
            "effect stack mismatch: expected {:?}, got {:?}",
            id,
            frame
        );
        if let Some(Frame {
            effect,
            bit: Some(bit),
        }) = frame
        {
            self.graph.finalize_markers(effect, bit);
        }
        self.should_track = last_should_track;

        match self.graph.effect_mut(id) {
            Some(node) => {
                node.parent = None;
                mem::take(&mut node.defer_stop)
            }
            None => false,
        }
    }

    fn frame_of(&self, id: EffectId) -> Option<Frame> {
        self.frames.iter().find(|frame| frame.effect == id).copied()
    }

    /// Unsubscribe an effect from everything, clearing the marker bit of its
    /// run first so no dep is left marked at that depth.
    fn cleanup_effect(&mut self, id: EffectId) {
        if let Some(Frame { bit: Some(bit), .. }) = self.frame_of(id) {
            self.graph.clear_markers(id, bit);
        }
        self.graph.cleanup_effect(id);
    }

    /// Stop an effect. A stop requested while the effect is anywhere on the
    /// run stack is performed when that run ends.
    pub(crate) fn stop_effect(&mut self, id: EffectId) -> StopOutcome {
        if self.frame_of(id).is_some() {
            if let Some(node) = self.graph.effect_mut(id) {
                node.defer_stop = true;
            }
            return StopOutcome::Deferred;
        }
        let Some(node) = self.graph.effect_mut(id) else {
            return StopOutcome::Noop;
        };
        if !node.active {
            return StopOutcome::Noop;
        }
        node.active = false;
        let on_stop = node.on_stop.clone();
        self.cleanup_effect(id);
        let removed = self.reap_if_orphaned(id);
        StopOutcome::Stopped { on_stop, removed }
    }

    /// Remove an effect that can never run again: nothing holds a handle
    /// to it and it is either stopped or subscribed to nothing.
    pub(crate) fn reap_if_orphaned(&mut self, id: EffectId) -> Option<EffectNode> {
        let node = self.graph.effect(id)?;
        let orphaned = !node.has_handles()
            && (!node.active || node.deps.is_empty())
            && !self.frames.iter().any(|frame| frame.effect == id);
        if orphaned {
            self.graph.remove_effect(id)
        } else {
            None
        }
    }

    pub(crate) fn release_dep(&mut self, dep: DepId) -> Vec<EffectNode> {
        self.graph
            .remove_dep(dep)
            .into_iter()
            .filter_map(|effect| self.reap_if_orphaned(effect))
            .collect()
    }

    fn release_target(&mut self, id: ObjectId) -> Option<(TargetDeps, Vec<EffectNode>)> {
        let keys = self.targets.remove(&id)?;
        let mut orphans = Vec::new();
        for dep in keys.values() {
            orphans.extend(self.release_dep(*dep));
        }
        Some((keys, orphans))
    }

    fn collect_effects(
        &self,
        target: ObjectId,
        kind: ContainerKind,
        op: TriggerOp,
        key: Option<&TrackKey>,
        new_value: Option<&Value>,
    ) -> Vec<EffectId> {
        let Some(keys) = self.targets.get(&target) else {
            return Vec::new();
        };

        let mut deps: SmallVec<[DepId; 4]> = SmallVec::new();
        let add = |deps: &mut SmallVec<[DepId; 4]>, key: &TrackKey| {
            if let Some(dep) = keys.get(key) {
                deps.push(*dep);
            }
        };

        if op == TriggerOp::Clear {
            deps.extend(keys.values().copied());
        } else if kind.is_array() && key == Some(&TrackKey::Length) {
            // Shrinking an array affects every index at or past the new end.
            let new_len = new_value.and_then(Value::as_index).unwrap_or(0);
            for (tracked, dep) in keys {
                match tracked {
                    TrackKey::Length => deps.push(*dep),
                    TrackKey::Index(index) if *index >= new_len => deps.push(*dep),
                    _ => {}
                }
            }
        } else {
            if let Some(key) = key {
                add(&mut deps, key);
            }
            match op {
                TriggerOp::Add if kind.is_array() => {
                    if matches!(key, Some(TrackKey::Index(_))) {
                        add(&mut deps, &TrackKey::Length);
                    }
                }
                TriggerOp::Add | TriggerOp::Delete if !kind.is_array() => {
                    add(&mut deps, &TrackKey::Iterate);
                    if kind == ContainerKind::Map {
                        add(&mut deps, &TrackKey::MapKeyIterate);
                    }
                }
                TriggerOp::Set if kind == ContainerKind::Map => add(&mut deps, &TrackKey::Iterate),
                _ => {}
            }
        }

        let mut effects: IndexSet<EffectId> = IndexSet::new();
        for dep in deps {
            if let Some(dep) = self.graph.dep(dep) {
                effects.extend(dep.subscribers());
            }
        }
        effects.into_iter().collect()
    }
}

// ----------------------------------------------------------------------------
// Tracking
// ----------------------------------------------------------------------------

/// Record that the running effect read `key` of `target`.
///
/// Does nothing when no effect is running or tracking is paused.
pub fn track(target: &impl TrackTarget, op: TrackOp, key: TrackKey) {
    let target_id = target.target_id();
    let hook = with_runtime(|rt| {
        let frame = rt.tracking_effect()?;
        let dep = rt.dep_for(target_id, &key);
        rt.track_dep(dep, frame).map(|hook| (frame.effect, hook))
    });
    if let Some((effect, hook)) = hook {
        hook(&DebuggerEvent {
            effect,
            target: target_id,
            op: DebugOp::Track(op),
            key: Some(key),
            new_value: None,
            old_value: None,
            old_target: None,
        });
    }
}

/// Notify every effect that depends on the slots affected by a write.
pub fn trigger(
    target: &impl TrackTarget,
    op: TriggerOp,
    key: Option<TrackKey>,
    new_value: Option<Value>,
    old_value: Option<Value>,
) {
    trigger_with(
        TriggerInfo {
            target: target.target_id(),
            op,
            key,
            new_value,
            old_value,
            old_target: None,
        },
        target.container_kind(),
    );
}

/// A write being delivered to subscribers.
pub(crate) struct TriggerInfo {
    pub(crate) target: ObjectId,
    pub(crate) op: TriggerOp,
    pub(crate) key: Option<TrackKey>,
    pub(crate) new_value: Option<Value>,
    pub(crate) old_value: Option<Value>,
    pub(crate) old_target: Option<Container>,
}

impl TriggerInfo {
    fn event(&self, effect: EffectId) -> DebuggerEvent {
        DebuggerEvent {
            effect,
            target: self.target,
            op: DebugOp::Trigger(self.op),
            key: self.key.clone(),
            new_value: self.new_value.clone(),
            old_value: self.old_value.clone(),
            old_target: self.old_target.clone(),
        }
    }
}

pub(crate) fn trigger_with(info: TriggerInfo, kind: ContainerKind) {
    let effects = with_runtime(|rt| {
        rt.collect_effects(
            info.target,
            kind,
            info.op,
            info.key.as_ref(),
            info.new_value.as_ref(),
        )
    });
    if effects.is_empty() {
        return;
    }
    tracing::trace!(
        target = ?info.target,
        op = ?info.op,
        key = ?info.key,
        effects = effects.len(),
        "trigger"
    );
    trigger_effects(&effects, &info);
}

/// Deliver a trigger to a snapshot of subscribers, computed ones first.
pub(crate) fn trigger_effects(effects: &[EffectId], info: &TriggerInfo) {
    let (computed, plain): (Vec<EffectId>, Vec<EffectId>) = with_runtime(|rt| {
        effects.iter().copied().partition(|id| {
            rt.graph
                .effect(*id)
                .map_or(false, |node| node.computed.is_some())
        })
    });
    for id in computed.into_iter().chain(plain) {
        trigger_effect(id, info);
    }
}

fn trigger_effect(id: EffectId, info: &TriggerInfo) {
    let action = with_runtime(|rt| {
        let node = rt.graph.effect(id)?;
        // Stopped while this delivery was in progress.
        if !node.active {
            return None;
        }
        if rt.active_effect() == Some(id) && !node.allow_recurse {
            return None;
        }
        let hook = if cfg!(debug_assertions) {
            node.on_trigger.clone()
        } else {
            None
        };
        Some((node.scheduler.clone(), hook))
    });
    let Some((scheduler, on_trigger)) = action else {
        return;
    };

    if let Some(hook) = on_trigger {
        hook(&info.event(id));
    }
    match scheduler {
        Some(scheduler) => scheduler(ScheduleCause::Dependency),
        None => run_effect_by_id(id),
    }
}

/// Synchronously notify deferred computeds subscribed to `dep` that an
/// upstream deferred computed is about to change.
pub(crate) fn schedule_chained(dep: DepId) {
    let chained: Vec<SchedulerFn> = with_runtime(|rt| {
        rt.graph
            .subscribers(dep)
            .into_iter()
            .filter_map(|id| rt.graph.effect(id))
            .filter(|node| node.computed == Some(ComputedKind::Deferred))
            .filter_map(|node| node.scheduler.clone())
            .collect()
    });
    for scheduler in chained {
        scheduler(ScheduleCause::ComputedChain);
    }
}

// ----------------------------------------------------------------------------
// Standalone deps
// ----------------------------------------------------------------------------

/// A dep that belongs to a single value rather than to a container slot.
///
/// Refs and computed values own one of these. The dep is created on first
/// tracked read and removed from the graph when the owner is dropped.
pub(crate) struct RefDep {
    owner: ObjectId,
    dep: std::cell::Cell<Option<DepId>>,
}

impl RefDep {
    pub(crate) fn new() -> Self {
        Self {
            owner: ObjectId::new(),
            dep: std::cell::Cell::new(None),
        }
    }

    pub(crate) fn owner(&self) -> ObjectId {
        self.owner
    }

    pub(crate) fn id(&self) -> Option<DepId> {
        self.dep.get()
    }

    pub(crate) fn track(&self) {
        let hook = with_runtime(|rt| {
            let frame = rt.tracking_effect()?;
            let dep = match self.dep.get() {
                Some(dep) if rt.graph.dep(dep).is_some() => dep,
                _ => {
                    let dep = rt.graph.create_dep();
                    self.dep.set(Some(dep));
                    dep
                }
            };
            rt.track_dep(dep, frame).map(|hook| (frame.effect, hook))
        });
        if let Some((effect, hook)) = hook {
            hook(&DebuggerEvent {
                effect,
                target: self.owner,
                op: DebugOp::Track(TrackOp::Get),
                key: Some(TrackKey::prop("value")),
                new_value: None,
                old_value: None,
                old_target: None,
            });
        }
    }

    pub(crate) fn trigger(&self, new_value: Option<Value>, old_value: Option<Value>) {
        let Some(dep) = self.dep.get() else {
            return;
        };
        let effects = with_runtime(|rt| rt.graph.subscribers(dep));
        if effects.is_empty() {
            return;
        }
        let info = TriggerInfo {
            target: self.owner,
            op: TriggerOp::Set,
            key: Some(TrackKey::prop("value")),
            new_value,
            old_value,
            old_target: None,
        };
        trigger_effects(&effects, &info);
    }
}

impl Drop for RefDep {
    fn drop(&mut self) {
        if let Some(dep) = self.dep.get() {
            let orphans = try_with_runtime(|rt| rt.release_dep(dep));
            drop(orphans);
        }
    }
}

/// Forget every dep recorded against a target.
pub(crate) fn release_target(id: ObjectId) {
    let released = try_with_runtime(|rt| rt.release_target(id));
    drop(released);
}

// ----------------------------------------------------------------------------
// Tracking switches
// ----------------------------------------------------------------------------

/// Stop recording reads until the matching `reset_tracking`.
pub fn pause_tracking() {
    with_runtime(|rt| {
        rt.track_stack.push(rt.should_track);
        rt.should_track = false;
    });
}

/// Resume recording reads until the matching `reset_tracking`.
pub fn enable_tracking() {
    with_runtime(|rt| {
        rt.track_stack.push(rt.should_track);
        rt.should_track = true;
    });
}

/// Restore the tracking state saved by the last pause or enable.
pub fn reset_tracking() {
    with_runtime(reset_tracking_in);
}

pub(crate) fn reset_tracking_in(rt: &mut RuntimeState) {
    rt.should_track = rt.track_stack.pop().unwrap_or(true);
}

/// Run `f` without recording any of its reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _paused = TrackingGuard::pause();
    f()
}

// ----------------------------------------------------------------------------
// Introspection
// ----------------------------------------------------------------------------

/// Per-thread runtime facade.
pub struct Runtime;

impl Runtime {
    /// Install a new configuration, returning the previous one.
    ///
    /// Takes effect for effect runs that start afterwards.
    pub fn configure(config: RuntimeConfig) -> RuntimeConfig {
        let mut config = config;
        config.max_marker_bits = config.max_marker_bits.min(MARKER_BITS_LIMIT);
        debug!(max_marker_bits = config.max_marker_bits, "runtime configured");
        with_runtime(|rt| mem::replace(&mut rt.config, config))
    }

    pub fn config() -> RuntimeConfig {
        with_runtime(|rt| rt.config.clone())
    }

    /// The innermost running effect.
    pub fn active_effect() -> Option<EffectId> {
        with_runtime(|rt| rt.active_effect())
    }

    /// Whether a read right now would be recorded.
    pub fn is_tracking() -> bool {
        with_runtime(|rt| rt.tracking_effect().is_some())
    }

    /// Number of effects currently running.
    pub fn effect_depth() -> usize {
        with_runtime(|rt| rt.frames.len())
    }

    pub fn dep_count() -> usize {
        with_runtime(|rt| rt.graph.dep_count())
    }

    pub fn effect_count() -> usize {
        with_runtime(|rt| rt.graph.effect_count())
    }

    /// Number of effects subscribed to one slot of a target.
    pub fn subscriber_count(target: &impl TrackTarget, key: &TrackKey) -> usize {
        let id = target.target_id();
        with_runtime(|rt| {
            rt.targets
                .get(&id)
                .and_then(|keys| keys.get(key))
                .and_then(|dep| rt.graph.dep(*dep))
                .map_or(0, |dep| dep.len())
        })
    }

    /// Number of slots of a target that have ever been tracked and not
    /// released.
    pub fn tracked_keys(target: &impl TrackTarget) -> usize {
        let id = target.target_id();
        with_runtime(|rt| rt.targets.get(&id).map_or(0, |keys| keys.len()))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
