//! Computed Implementation
//!
//! A computed value is a cached derivation that re-evaluates lazily after
//! one of its dependencies changes.
//!
//! # How Computed Values Work
//!
//! 1. A computed owns an effect whose scheduler does not re-run anything.
//!    It only marks the computed dirty and notifies the computed's own
//!    subscribers.
//!
//! 2. Reading the value subscribes the running effect to the computed and,
//!    if the computed is dirty, re-runs the getter inside its effect.
//!
//! 3. A computed that is never read never runs its getter.
//!
//! Because computed effects are notified before plain effects, any effect
//! reading a computed during the same trigger sees the fresh value.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::{dispose_effect, DebugHook, DebuggerEvent, ReactiveEffect};
use super::refs::{AnyRef, RefValue, ValueCell};
use super::runtime::{untracked, RefDep};
use crate::error::{warn, ReactiveError, Result};
use crate::graph::{ComputedKind, ObjectId, SchedulerFn};
use crate::observe::Value;

/// Options for `Computed::with_options`.
#[derive(Clone, Default)]
pub struct ComputedOptions {
    on_track: Option<DebugHook>,
    on_trigger: Option<DebugHook>,
    uncached: bool,
}

impl ComputedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }

    /// Re-run the getter on every read and never subscribe to its reads.
    ///
    /// Reads made by the getter are recorded against the caller instead.
    pub fn uncached(mut self) -> Self {
        self.uncached = true;
        self
    }
}

struct ComputedInner<T: RefValue> {
    dep: RefDep,
    effect: ReactiveEffect,
    getter: Rc<dyn Fn() -> T>,
    setter: Option<Box<dyn Fn(T)>>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    cacheable: bool,
}

impl<T: RefValue> ComputedInner<T> {
    fn invalidate(&self) {
        if !self.dirty.get() {
            self.dirty.set(true);
            self.dep.trigger(None, None);
        }
    }
}

impl<T: RefValue> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        dispose_effect(self.effect.id());
    }
}

/// A cached derived value.
///
/// # Example
///
/// ```
/// use ripple_core::{Computed, Ref};
///
/// let count = Ref::new(2);
/// let c = count.clone();
/// let doubled = Computed::new(move || c.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T: RefValue> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: RefValue> Computed<T> {
    /// Create a readonly computed value.
    pub fn new(getter: impl Fn() -> T + 'static) -> Self {
        Self::build(Rc::new(getter), None, ComputedOptions::default())
    }

    /// Create a computed value whose writes are forwarded to `setter`.
    pub fn writable(getter: impl Fn() -> T + 'static, setter: impl Fn(T) + 'static) -> Self {
        Self::build(
            Rc::new(getter),
            Some(Box::new(setter)),
            ComputedOptions::default(),
        )
    }

    pub fn with_options(getter: impl Fn() -> T + 'static, options: ComputedOptions) -> Self {
        Self::build(Rc::new(getter), None, options)
    }

    fn build(
        getter: Rc<dyn Fn() -> T>,
        setter: Option<Box<dyn Fn(T)>>,
        options: ComputedOptions,
    ) -> Self {
        let cacheable = !options.uncached;
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let scheduler: SchedulerFn = Rc::new(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate();
                }
            });
            let body = getter.clone();
            let effect = ReactiveEffect::build(
                Rc::new(move || {
                    body();
                }),
                Some(scheduler),
                Some(ComputedKind::Eager),
                None,
            );
            ComputedInner {
                dep: RefDep::new(),
                effect,
                getter,
                setter,
                value: RefCell::new(None),
                dirty: Cell::new(true),
                cacheable,
            }
        });

        let ComputedOptions {
            on_track,
            on_trigger,
            ..
        } = options;
        inner.effect.configure(move |node| {
            node.active = cacheable;
            node.on_track = on_track;
            node.on_trigger = on_trigger;
        });
        Self { inner }
    }

    pub fn id(&self) -> ObjectId {
        self.inner.dep.owner()
    }

    /// Read the value, re-evaluating if a dependency changed.
    ///
    /// A read from inside this computed's own first evaluation warns and
    /// yields `T::default()`. Use `try_get` to observe that case.
    pub fn get(&self) -> T
    where
        T: Default,
    {
        self.try_get().unwrap_or_else(|err| {
            warn(err);
            T::default()
        })
    }

    /// Read the value, or fail if it is still being evaluated for the first
    /// time.
    pub fn try_get(&self) -> Result<T> {
        let inner = &self.inner;
        inner.dep.track();
        if inner.dirty.get() || !inner.cacheable {
            inner.dirty.set(false);
            let getter = inner.getter.clone();
            if let Some(value) = inner.effect.run_with(move || getter()) {
                let previous = inner.value.replace(Some(value));
                drop(previous);
            }
        }
        inner
            .value
            .borrow()
            .clone()
            .ok_or(ReactiveError::CyclicComputed)
    }

    /// Forward a write to the setter, or warn if there is none.
    pub fn set(&self, value: T) {
        match &self.inner.setter {
            Some(setter) => setter(value),
            None => warn(ReactiveError::ReadonlyComputed),
        }
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.setter.is_none()
    }

    /// Whether the next read will run the getter.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn effect(&self) -> &ReactiveEffect {
        &self.inner.effect
    }
}

impl<T: RefValue> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: RefValue + fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("value", &*self.inner.value.borrow())
            .field("dirty", &self.inner.dirty.get())
            .finish()
    }
}

/// Create a readonly computed value.
pub fn computed<T: RefValue>(getter: impl Fn() -> T + 'static) -> Computed<T> {
    Computed::new(getter)
}

impl ValueCell for Computed<Value> {
    fn id(&self) -> ObjectId {
        Computed::id(self)
    }

    fn get(&self) -> Value {
        self.try_get().unwrap_or_else(|err| {
            warn(err);
            Value::Null
        })
    }

    fn peek(&self) -> Value {
        untracked(|| ValueCell::get(self))
    }

    fn set(&self, value: Value) {
        Computed::set(self, value);
    }

    fn is_readonly(&self) -> bool {
        Computed::is_readonly(self)
    }
}

impl From<Computed<Value>> for Value {
    fn from(c: Computed<Value>) -> Self {
        Value::Ref(AnyRef::new(c))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::reactive::{effect, EffectOptions, Ref, Runtime};

    fn counted<T: RefValue>(
        f: impl Fn() -> T + 'static,
    ) -> (Rc<Cell<usize>>, impl Fn() -> T + 'static) {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        (calls, move || {
            c.set(c.get() + 1);
            f()
        })
    }

    #[test]
    fn getter_runs_lazily_and_caches() {
        let source = Ref::new(1);
        let s = source.clone();
        let (calls, getter) = counted(move || s.get() + 1);
        let c = Computed::new(getter);

        assert_eq!(calls.get(), 0);
        assert!(c.is_dirty());
        assert_eq!(c.get(), 2);
        assert_eq!(c.get(), 2);
        assert_eq!(calls.get(), 1);

        source.set(10);
        assert_eq!(calls.get(), 1);
        assert!(c.is_dirty());
        assert_eq!(c.get(), 11);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn effect_sees_fresh_computed_value() {
        let source = Ref::new(1);
        let s = source.clone();
        let c = Computed::new(move || s.get() * 10);

        let seen = Rc::new(Cell::new(0));
        let (out, reader) = (seen.clone(), c.clone());
        let _runner = effect(move || out.set(reader.get()), EffectOptions::default());
        assert_eq!(seen.get(), 10);

        source.set(2);
        assert_eq!(seen.get(), 20);
    }

    #[test]
    fn chained_computed_values() {
        let source = Ref::new(0);
        let s = source.clone();
        let c1 = Computed::new(move || s.get() + 1);
        let r1 = c1.clone();
        let c2 = Computed::new(move || r1.get() * 2);

        assert_eq!(c2.get(), 2);
        source.set(4);
        assert_eq!(c2.get(), 10);
        assert_eq!(c1.get(), 5);
    }

    #[test]
    fn writable_computed_forwards_to_setter() {
        let source = Ref::new(1);
        let (s_get, s_set) = (source.clone(), source.clone());
        let plus_one = Computed::writable(move || s_get.get() + 1, move |v| s_set.set(v - 1));

        plus_one.set(10);
        assert_eq!(source.get(), 9);
        assert_eq!(plus_one.get(), 10);
        assert!(!plus_one.is_readonly());
    }

    #[test]
    fn readonly_computed_warns_on_write() {
        let warnings = Rc::new(Cell::new(0));
        let w = warnings.clone();
        let previous =
            Runtime::configure(RuntimeConfig::new().with_warn_handler(move |err| {
                assert_eq!(*err, ReactiveError::ReadonlyComputed);
                w.set(w.get() + 1);
            }));

        let c = Computed::new(|| 1);
        c.set(2);
        assert_eq!(c.get(), 1);
        if cfg!(debug_assertions) {
            assert_eq!(warnings.get(), 1);
        }
        Runtime::configure(previous);
    }

    #[test]
    fn stopped_computed_keeps_its_last_value() {
        let source = Ref::new(1);
        let s = source.clone();
        let c = Computed::new(move || s.get());
        assert_eq!(c.get(), 1);

        c.effect().stop();
        source.set(2);
        assert_eq!(c.get(), 1);
    }

    #[test]
    fn uncached_computed_reevaluates_every_read() {
        let source = Ref::new(1);
        let s = source.clone();
        let (calls, getter) = counted(move || s.get());
        let c = Computed::with_options(getter, ComputedOptions::new().uncached());

        c.get();
        c.get();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn cyclic_first_read_is_an_error() {
        let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));
        let inner_slot = slot.clone();
        let saw_cycle = Rc::new(Cell::new(false));
        let flag = saw_cycle.clone();
        let c = Computed::new(move || {
            if let Some(me) = inner_slot.borrow().as_ref() {
                flag.set(me.try_get() == Err(ReactiveError::CyclicComputed));
            }
            1
        });
        *slot.borrow_mut() = Some(c.clone());

        assert_eq!(c.get(), 1);
        assert!(saw_cycle.get());
        slot.borrow_mut().take();
    }

    #[test]
    fn cyclic_first_read_warns_and_yields_default() {
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let sink = warnings.clone();
        let previous = Runtime::configure(
            RuntimeConfig::new().with_warn_handler(move |err| sink.borrow_mut().push(err.clone())),
        );

        let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));
        let inner_slot = slot.clone();
        let seen = Rc::new(Cell::new(-1));
        let s = seen.clone();
        let c = Computed::new(move || {
            if let Some(me) = inner_slot.borrow().as_ref() {
                s.set(me.get());
            }
            7
        });
        *slot.borrow_mut() = Some(c.clone());

        assert_eq!(c.get(), 7);
        assert_eq!(seen.get(), 0);
        if cfg!(debug_assertions) {
            assert_eq!(*warnings.borrow(), vec![ReactiveError::CyclicComputed]);
        }
        slot.borrow_mut().take();
        Runtime::configure(previous);
    }

    #[test]
    fn dropping_computed_releases_its_effect() {
        let source = Ref::new(1);
        let before = Runtime::effect_count();
        {
            let s = source.clone();
            let c = Computed::new(move || s.get());
            c.get();
            assert_eq!(Runtime::effect_count(), before + 1);
        }
        assert_eq!(Runtime::effect_count(), before);
    }

    #[test]
    fn dynamic_computed_is_a_readonly_ref() {
        let c: Value = Computed::new(|| Value::from("hi")).into();
        let Value::Ref(cell) = &c else { panic!("expected a ref") };
        assert!(cell.is_readonly());
        assert_eq!(cell.get(), Value::from("hi"));
    }
}
