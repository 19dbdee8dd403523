//! Deferred Computed
//!
//! A deferred computed is a computed value that batches its change
//! notifications to the next tick and only notifies when the value really
//! changed.
//!
//! # How It Works
//!
//! 1. When a dependency changes, the computed is marked dirty and, if
//!    something subscribes to it, a job is queued on the tick queue holding
//!    the value to compare against. Further changes before the tick do not
//!    queue more jobs.
//!
//! 2. When the job runs, the computed re-evaluates and triggers its
//!    subscribers only if the result differs from the compared value.
//!
//! 3. Deferred computeds reading other deferred computeds are invalidated
//!    synchronously through the chain, and each one records its current
//!    value as the comparison target. Its own job is queued when the
//!    upstream job actually triggers it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::{dispose_effect, ReactiveEffect};
use super::refs::RefValue;
use super::runtime::{schedule_chained, RefDep};
use super::tick::queue_job;
use crate::error::{warn, ReactiveError, Result};
use crate::graph::{ComputedKind, ObjectId, ScheduleCause, SchedulerFn};

struct DeferredInner<T: RefValue> {
    dep: RefDep,
    effect: ReactiveEffect,
    getter: Rc<dyn Fn() -> T>,
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
    scheduled: Cell<bool>,
    /// Value recorded by a chained invalidation, used by the next job.
    compare_target: RefCell<Option<Option<T>>>,
}

impl<T: RefValue> DeferredInner<T> {
    fn schedule(self: &Rc<Self>, cause: ScheduleCause) {
        if let Some(dep) = self.dep.id() {
            if cause == ScheduleCause::ComputedChain {
                let current = self.value.borrow().clone();
                self.compare_target.replace(Some(current));
            } else if !self.scheduled.get() {
                let to_compare = match self.compare_target.take() {
                    Some(target) => target,
                    None => self.value.borrow().clone(),
                };
                self.scheduled.set(true);
                let weak = Rc::downgrade(self);
                queue_job(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.flush(to_compare);
                    }
                });
            }
            schedule_chained(dep);
        }
        self.dirty.set(true);
    }

    fn flush(&self, to_compare: Option<T>) {
        if self.effect.is_active() {
            let current = self.evaluate();
            let changed = match (&current, &to_compare) {
                (Some(current), Some(old)) => current.has_changed(old),
                (None, None) => false,
                _ => true,
            };
            if changed {
                self.dep.trigger(
                    current.as_ref().and_then(RefValue::to_value),
                    to_compare.as_ref().and_then(RefValue::to_value),
                );
            }
        }
        self.scheduled.set(false);
    }

    fn evaluate(&self) -> Option<T> {
        if self.dirty.get() {
            self.dirty.set(false);
            let getter = self.getter.clone();
            if let Some(value) = self.effect.run_with(move || getter()) {
                let previous = self.value.replace(Some(value));
                drop(previous);
            }
        }
        self.value.borrow().clone()
    }
}

impl<T: RefValue> Drop for DeferredInner<T> {
    fn drop(&mut self) {
        dispose_effect(self.effect.id());
    }
}

/// A computed value whose notifications are deferred to `flush_jobs`.
pub struct DeferredComputed<T: RefValue> {
    inner: Rc<DeferredInner<T>>,
}

impl<T: RefValue> DeferredComputed<T> {
    pub fn new(getter: impl Fn() -> T + 'static) -> Self {
        let getter: Rc<dyn Fn() -> T> = Rc::new(getter);
        let inner = Rc::new_cyclic(|weak: &Weak<DeferredInner<T>>| {
            let weak = weak.clone();
            let scheduler: SchedulerFn = Rc::new(move |cause| {
                if let Some(inner) = weak.upgrade() {
                    inner.schedule(cause);
                }
            });
            let body = getter.clone();
            let effect = ReactiveEffect::build(
                Rc::new(move || {
                    body();
                }),
                Some(scheduler),
                Some(ComputedKind::Deferred),
                None,
            );
            DeferredInner {
                dep: RefDep::new(),
                effect,
                getter,
                value: RefCell::new(None),
                dirty: Cell::new(true),
                scheduled: Cell::new(false),
                compare_target: RefCell::new(None),
            }
        });
        Self { inner }
    }

    pub fn id(&self) -> ObjectId {
        self.inner.dep.owner()
    }

    /// Read the current value, evaluating it if it is dirty.
    ///
    /// A read by its own getter during the first evaluation warns and
    /// yields `T::default()`.
    pub fn get(&self) -> T
    where
        T: Default,
    {
        self.try_get().unwrap_or_else(|err| {
            warn(err);
            T::default()
        })
    }

    pub fn try_get(&self) -> Result<T> {
        self.inner.dep.track();
        self.inner.evaluate().ok_or(ReactiveError::CyclicComputed)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn effect(&self) -> &ReactiveEffect {
        &self.inner.effect
    }
}

impl<T: RefValue> Clone for DeferredComputed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: RefValue + fmt::Debug> fmt::Debug for DeferredComputed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredComputed")
            .field("id", &self.id())
            .field("value", &*self.inner.value.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("scheduled", &self.inner.scheduled.get())
            .finish()
    }
}

/// Create a deferred computed value.
pub fn deferred_computed<T: RefValue>(getter: impl Fn() -> T + 'static) -> DeferredComputed<T> {
    DeferredComputed::new(getter)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, flush_jobs, EffectOptions, Ref};
    use std::cell::RefCell;

    fn observe<T: RefValue + Default>(
        c: &DeferredComputed<T>,
    ) -> (Rc<RefCell<Vec<T>>>, crate::reactive::EffectRunner<()>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (out, reader) = (seen.clone(), c.clone());
        let runner = effect(
            move || out.borrow_mut().push(reader.get()),
            EffectOptions::default(),
        );
        (seen, runner)
    }

    #[test]
    fn multiple_mutations_notify_once_per_tick() {
        let source = Ref::new(0);
        let s = source.clone();
        let c = deferred_computed(move || s.get());
        let (seen, _runner) = observe(&c);

        source.set(1);
        source.set(2);
        source.set(3);
        assert_eq!(*seen.borrow(), vec![0]);
        // A synchronous read already sees the new value.
        assert_eq!(c.get(), 3);

        flush_jobs();
        assert_eq!(*seen.borrow(), vec![0, 3]);
    }

    #[test]
    fn unchanged_value_does_not_notify() {
        let source = Ref::new(0);
        let s = source.clone();
        let c = deferred_computed(move || s.get());
        let (seen, _runner) = observe(&c);

        source.set(1);
        source.set(0);
        flush_jobs();
        assert_eq!(*seen.borrow(), vec![0]);
    }

    #[test]
    fn chained_deferred_computeds_compare_end_to_end() {
        let source = Ref::new(0);
        let s = source.clone();
        let c1 = deferred_computed(move || s.get() % 2);
        let r1 = c1.clone();
        let c2 = deferred_computed(move || r1.get() + 1);
        let (seen, _runner) = observe(&c2);
        assert_eq!(*seen.borrow(), vec![1]);

        source.set(1);
        assert!(c2.is_dirty());
        flush_jobs();
        assert_eq!(*seen.borrow(), vec![1, 2]);

        // Parity unchanged: nothing downstream fires.
        source.set(3);
        flush_jobs();
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn sync_read_of_invalidated_chain_still_notifies() {
        let source = Ref::new(0);
        let s = source.clone();
        let c1 = deferred_computed(move || s.get() % 2);
        let r1 = c1.clone();
        let c2 = deferred_computed(move || r1.get() + 1);
        let (seen, _runner) = observe(&c2);

        source.set(1);
        assert_eq!(c2.get(), 2);
        flush_jobs();
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn unobserved_deferred_computed_queues_nothing() {
        let source = Ref::new(0);
        let s = source.clone();
        let c = deferred_computed(move || s.get());
        assert_eq!(c.get(), 0);

        source.set(5);
        assert!(c.is_dirty());
        assert_eq!(flush_jobs(), 0);
        assert_eq!(c.get(), 5);
    }

    #[test]
    fn stopped_effect_skips_evaluation_on_flush() {
        let source = Ref::new(0);
        let s = source.clone();
        let c = deferred_computed(move || s.get());
        let (seen, _runner) = observe(&c);

        source.set(1);
        c.effect().stop();
        flush_jobs();
        assert_eq!(*seen.borrow(), vec![0]);
    }
}
