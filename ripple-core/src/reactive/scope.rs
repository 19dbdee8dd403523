//! Effect Scopes
//!
//! A scope collects the effects (and nested scopes) created while it is
//! active so they can all be stopped at once.
//!
//! # How Scopes Work
//!
//! - `run(f)` makes the scope active for the duration of `f`. Effects and
//!   computed values created inside register with it.
//! - A non-detached scope created while another scope is active becomes
//!   its child and remembers its position in the parent's child list.
//! - `stop()` stops every collected effect, runs the registered cleanups,
//!   stops child scopes and removes itself from its parent by swapping the
//!   parent's last child into its slot.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::context::ScopeGuard;
use super::effect::ReactiveEffect;
use super::runtime::with_runtime;
use crate::error::{warn, ReactiveError};

struct ScopeInner {
    active: bool,
    detached: bool,
    effects: Vec<ReactiveEffect>,
    cleanups: Vec<Box<dyn FnOnce()>>,
    scopes: Vec<EffectScope>,
    parent: Option<Weak<RefCell<ScopeInner>>>,
    /// Position in the parent's `scopes`.
    index: Option<usize>,
}

/// A group of effects that can be stopped together.
#[derive(Clone)]
pub struct EffectScope {
    inner: Rc<RefCell<ScopeInner>>,
}

impl EffectScope {
    /// Create a scope attached to the currently active scope, if any.
    pub fn new() -> Self {
        Self::create(false)
    }

    /// Create a scope that is not collected by the active scope.
    pub fn detached() -> Self {
        Self::create(true)
    }

    fn create(detached: bool) -> Self {
        let scope = Self {
            inner: Rc::new(RefCell::new(ScopeInner {
                active: true,
                detached,
                effects: Vec::new(),
                cleanups: Vec::new(),
                scopes: Vec::new(),
                parent: None,
                index: None,
            })),
        };
        if !detached {
            if let Some(parent) = get_current_scope() {
                let mut parent_inner = parent.inner.borrow_mut();
                {
                    let mut inner = scope.inner.borrow_mut();
                    inner.parent = Some(Rc::downgrade(&parent.inner));
                    inner.index = Some(parent_inner.scopes.len());
                }
                parent_inner.scopes.push(scope.clone());
            }
        }
        scope
    }

    pub fn is_active(&self) -> bool {
        self.inner.borrow().active
    }

    pub fn is_detached(&self) -> bool {
        self.inner.borrow().detached
    }

    /// Run `f` with this scope active.
    ///
    /// Returns `None` without calling `f` if the scope has been stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            warn(ReactiveError::InactiveScope);
            return None;
        }
        let _guard = ScopeGuard::enter(self.clone());
        Some(f())
    }

    /// Make this scope the active one until `off()`.
    pub fn on(&self) {
        let previous = with_runtime(|rt| rt.active_scope.replace(self.clone()));
        drop(previous);
    }

    /// Make this scope's parent the active scope.
    pub fn off(&self) {
        let parent = self.parent();
        let previous = with_runtime(|rt| mem::replace(&mut rt.active_scope, parent));
        drop(previous);
    }

    /// Stop every collected effect and child scope and run the cleanups.
    pub fn stop(&self) {
        self.stop_inner(false);
    }

    fn stop_inner(&self, from_parent: bool) {
        let (effects, cleanups, scopes, parent, index) = {
            let mut inner = self.inner.borrow_mut();
            if !inner.active {
                return;
            }
            inner.active = false;
            (
                mem::take(&mut inner.effects),
                mem::take(&mut inner.cleanups),
                mem::take(&mut inner.scopes),
                inner.parent.take(),
                inner.index.take(),
            )
        };

        for effect in &effects {
            effect.stop();
        }
        for cleanup in cleanups {
            cleanup();
        }
        for scope in &scopes {
            scope.stop_inner(true);
        }

        if !from_parent {
            if let Some(parent) = parent.and_then(|parent| parent.upgrade()) {
                self.detach_from(&parent, index);
            }
        }
        debug!(
            effects = effects.len(),
            scopes = scopes.len(),
            "effect scope stopped"
        );
    }

    /// Remove this scope from the parent's children in O(1).
    fn detach_from(&self, parent: &RefCell<ScopeInner>, index: Option<usize>) {
        let mut parent = parent.borrow_mut();
        let Some(last) = parent.scopes.pop() else {
            return;
        };
        if last.ptr_eq(self) {
            return;
        }
        match index {
            Some(index) if index < parent.scopes.len() => {
                last.inner.borrow_mut().index = Some(index);
                parent.scopes[index] = last;
            }
            _ => parent.scopes.push(last),
        }
    }

    pub fn parent(&self) -> Option<EffectScope> {
        let inner = self.inner.borrow();
        inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| EffectScope { inner })
    }

    /// Position of this scope in its parent's child list.
    pub fn index(&self) -> Option<usize> {
        self.inner.borrow().index
    }

    pub fn effect_count(&self) -> usize {
        self.inner.borrow().effects.len()
    }

    pub fn scopes(&self) -> Vec<EffectScope> {
        self.inner.borrow().scopes.clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn record(&self, effect: &ReactiveEffect) {
        let mut inner = self.inner.borrow_mut();
        if inner.active {
            inner.effects.push(effect.clone());
        }
    }

    pub(crate) fn add_cleanup(&self, cleanup: Box<dyn FnOnce()>) {
        self.inner.borrow_mut().cleanups.push(cleanup);
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EffectScope")
            .field("active", &inner.active)
            .field("detached", &inner.detached)
            .field("effects", &inner.effects.len())
            .field("scopes", &inner.scopes.len())
            .field("index", &inner.index)
            .finish()
    }
}

/// Create a scope; see `EffectScope::new` and `EffectScope::detached`.
pub fn effect_scope(detached: bool) -> EffectScope {
    if detached {
        EffectScope::detached()
    } else {
        EffectScope::new()
    }
}

/// The scope effects are currently registered with.
pub fn get_current_scope() -> Option<EffectScope> {
    with_runtime(|rt| rt.active_scope.clone())
}

/// Register `cleanup` to run when the active scope stops.
pub fn on_scope_dispose(cleanup: impl FnOnce() + 'static) {
    match get_current_scope() {
        Some(scope) => scope.add_cleanup(Box::new(cleanup)),
        None => warn(ReactiveError::NoActiveScope),
    }
}

/// Register an effect with `scope`, or with the active scope.
pub(crate) fn record_effect_scope(effect: &ReactiveEffect, scope: Option<&EffectScope>) {
    let scope = match scope {
        Some(scope) => Some(scope.clone()),
        None => get_current_scope(),
    };
    if let Some(scope) = scope {
        scope.record(effect);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
