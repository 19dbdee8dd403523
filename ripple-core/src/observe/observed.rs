//! Observed views.
//!
//! An `Observed` is a view over a raw target (or, for readonly views, over
//! another observed view). Reads through a view are tracked and writes are
//! triggered; the raw target underneath is shared with any other view of
//! it.
//!
//! Views are cached per flavor: observing the same target twice with the
//! same flavor yields the same view for as long as that view is alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::base::{self, Search};
use super::collection;
use super::target::{ContainerKind, Target, TargetKind};
use super::value::Value;
use crate::error::{warn, ReactiveError};
use crate::graph::ObjectId;
use crate::reactive::TrackTarget;

/// How a view treats reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Flavor {
    /// Tracks reads, triggers writes, observes nested containers.
    Reactive,
    /// Tracks and triggers the top level only.
    ShallowReactive,
    /// Rejects writes, observes nested containers as readonly.
    Readonly,
    /// Rejects writes at the top level only.
    ShallowReadonly,
}

impl Flavor {
    pub fn is_readonly(self) -> bool {
        matches!(self, Flavor::Readonly | Flavor::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, Flavor::ShallowReactive | Flavor::ShallowReadonly)
    }

    fn slot(self) -> usize {
        match self {
            Flavor::Reactive => 0,
            Flavor::ShallowReactive => 1,
            Flavor::Readonly => 2,
            Flavor::ShallowReadonly => 3,
        }
    }
}

/// Meta keys answered by every view instead of being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactiveFlag {
    Skip,
    IsReactive,
    IsReadonly,
    IsShallow,
    Raw,
}

impl ReactiveFlag {
    pub const fn key(self) -> &'static str {
        match self {
            ReactiveFlag::Skip => "__v_skip",
            ReactiveFlag::IsReactive => "__v_isReactive",
            ReactiveFlag::IsReadonly => "__v_isReadonly",
            ReactiveFlag::IsShallow => "__v_isShallow",
            ReactiveFlag::Raw => "__v_raw",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "__v_skip" => Some(ReactiveFlag::Skip),
            "__v_isReactive" => Some(ReactiveFlag::IsReactive),
            "__v_isReadonly" => Some(ReactiveFlag::IsReadonly),
            "__v_isShallow" => Some(ReactiveFlag::IsShallow),
            "__v_raw" => Some(ReactiveFlag::Raw),
            _ => None,
        }
    }
}

/// What a view sits on.
#[derive(Clone)]
pub(crate) enum Source {
    Raw(Target),
    /// A readonly view over a non-readonly view.
    Observed(Observed),
}

impl Source {
    fn id(&self) -> ObjectId {
        match self {
            Source::Raw(target) => target.id(),
            Source::Observed(observed) => observed.id(),
        }
    }
}

struct ObservedInner {
    id: ObjectId,
    source: Source,
    flavor: Flavor,
}

type ViewCache = HashMap<ObjectId, Weak<ObservedInner>>;

thread_local! {
    static VIEWS: RefCell<[ViewCache; 4]> = RefCell::new(Default::default());
}

impl Drop for ObservedInner {
    fn drop(&mut self) {
        let source = self.source.id();
        let slot = self.flavor.slot();
        let _ = VIEWS.try_with(|views| {
            if let Ok(mut views) = views.try_borrow_mut() {
                let cache = &mut views[slot];
                if cache.get(&source).map_or(false, |w| w.strong_count() == 0) {
                    cache.remove(&source);
                }
            }
        });
    }
}

fn cached(flavor: Flavor, source: ObjectId) -> Option<Observed> {
    VIEWS.with(|views| {
        views.borrow()[flavor.slot()]
            .get(&source)
            .and_then(Weak::upgrade)
            .map(|inner| Observed { inner })
    })
}

fn view(source: Source, flavor: Flavor) -> Observed {
    let source_id = source.id();
    if let Some(existing) = cached(flavor, source_id) {
        return existing;
    }
    let observed = Observed {
        inner: Rc::new(ObservedInner {
            id: ObjectId::new(),
            source,
            flavor,
        }),
    };
    let weak = Rc::downgrade(&observed.inner);
    let stale = VIEWS.with(|views| views.borrow_mut()[flavor.slot()].insert(source_id, weak));
    drop(stale);
    tracing::trace!(source = ?source_id, view = ?observed.id(), ?flavor, "observed view created");
    observed
}

/// Observe `value` with `flavor`.
///
/// Containers get a (cached) view. Marked-raw and non-extensible targets
/// come back unchanged, as do views that already satisfy the request.
/// Primitives come back unchanged with a warning.
pub fn wrap(value: impl Into<Value>, flavor: Flavor) -> Value {
    match value.into() {
        Value::Object(target) => {
            if target.target_kind() == TargetKind::Invalid {
                Value::Object(target)
            } else {
                Value::Observed(view(Source::Raw(target), flavor))
            }
        }
        // Only a readonly view may be layered over a mutable one.
        Value::Observed(observed) if flavor.is_readonly() && !observed.is_readonly() => {
            Value::Observed(view(Source::Observed(observed), flavor))
        }
        observed @ Value::Observed(_) => observed,
        r @ Value::Ref(_) => r,
        primitive => {
            warn(ReactiveError::NotObservable {
                type_name: primitive.type_name(),
            });
            primitive
        }
    }
}

/// A deep mutable view of `value`.
pub fn reactive(value: impl Into<Value>) -> Value {
    let value = value.into();
    // A readonly view is returned as is.
    if value.is_readonly() {
        return value;
    }
    wrap(value, Flavor::Reactive)
}

/// A view tracking and triggering the top level only.
pub fn shallow_reactive(value: impl Into<Value>) -> Value {
    wrap(value, Flavor::ShallowReactive)
}

/// A deep readonly view of `value`.
pub fn readonly(value: impl Into<Value>) -> Value {
    wrap(value, Flavor::Readonly)
}

/// A view rejecting top-level writes only.
pub fn shallow_readonly(value: impl Into<Value>) -> Value {
    wrap(value, Flavor::ShallowReadonly)
}

/// Whether `value` is a mutable view, or a readonly view over one.
pub fn is_reactive(value: &Value) -> bool {
    value.as_observed().map_or(false, Observed::is_reactive)
}

pub fn is_readonly(value: &Value) -> bool {
    value.is_readonly()
}

pub fn is_shallow(value: &Value) -> bool {
    value.is_shallow()
}

/// Whether `value` is any observed view.
pub fn is_proxy(value: &Value) -> bool {
    value.is_observed()
}

/// The raw target behind any stack of views.
pub fn to_raw(value: &Value) -> Value {
    value.to_raw()
}

/// Exclude a container from observation. Other values are returned as is.
pub fn mark_raw(value: impl Into<Value>) -> Value {
    let value = value.into();
    if let Value::Object(target) = &value {
        target.mark_raw();
    }
    value
}

pub(crate) fn unsupported(op: &'static str, kind: ContainerKind) {
    warn(ReactiveError::UnsupportedOperation {
        op,
        kind: kind.name(),
    });
}

// ----------------------------------------------------------------------------
// Observed
// ----------------------------------------------------------------------------

/// A tracked view of a container.
#[derive(Clone)]
pub struct Observed {
    inner: Rc<ObservedInner>,
}

impl Observed {
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn flavor(&self) -> Flavor {
        self.inner.flavor
    }

    pub fn is_readonly(&self) -> bool {
        self.flavor().is_readonly()
    }

    pub fn is_shallow(&self) -> bool {
        self.flavor().is_shallow()
    }

    /// Mutable views and readonly views over mutable ones.
    pub fn is_reactive(&self) -> bool {
        match &self.inner.source {
            _ if !self.is_readonly() => true,
            Source::Observed(inner) => inner.is_reactive(),
            Source::Raw(_) => false,
        }
    }

    /// The raw target at the bottom of the view stack.
    pub fn raw(&self) -> Target {
        match &self.inner.source {
            Source::Raw(target) => target.clone(),
            Source::Observed(inner) => inner.raw(),
        }
    }

    pub(crate) fn source(&self) -> &Source {
        &self.inner.source
    }

    /// What this view sits on: a raw target or another view.
    pub fn source_value(&self) -> Value {
        match &self.inner.source {
            Source::Raw(target) => Value::Object(target.clone()),
            Source::Observed(inner) => Value::Observed(inner.clone()),
        }
    }

    pub fn kind(&self) -> ContainerKind {
        self.raw().kind()
    }

    pub fn ptr_eq(&self, other: &Observed) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn read_flag(&self, flag: ReactiveFlag, receiver: &Observed) -> Option<Value> {
        match flag {
            ReactiveFlag::IsReactive => Some(Value::Bool(!self.is_readonly())),
            ReactiveFlag::IsReadonly => Some(Value::Bool(self.is_readonly())),
            ReactiveFlag::IsShallow => Some(Value::Bool(self.is_shallow())),
            ReactiveFlag::Skip => Some(Value::Bool(self.raw().is_marked_raw())),
            ReactiveFlag::Raw => receiver.ptr_eq(self).then(|| self.source_value()),
        }
    }

    // ------------------------------------------------------------------
    // Keyed access
    // ------------------------------------------------------------------

    /// Read `key`. Records fall back to their prototype.
    pub fn get(&self, key: impl Into<Value>) -> Option<Value> {
        self.get_with_receiver(&key.into(), self)
    }

    pub(crate) fn get_with_receiver(&self, key: &Value, receiver: &Observed) -> Option<Value> {
        if let Some(flag) = key.as_str().and_then(ReactiveFlag::from_key) {
            return self.read_flag(flag, receiver);
        }
        match self.kind() {
            ContainerKind::Record | ContainerKind::Array => base::get(self, key, receiver),
            ContainerKind::Map | ContainerKind::WeakMap => collection::get(self, key),
            kind => {
                unsupported("get", kind);
                None
            }
        }
    }

    /// Write `key`. Returns `false` when the write was refused.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        self.set_with_receiver(&key.into(), value.into(), self)
    }

    pub(crate) fn set_with_receiver(&self, key: &Value, value: Value, receiver: &Observed) -> bool {
        match self.kind() {
            ContainerKind::Record | ContainerKind::Array => base::set(self, key, value, receiver),
            ContainerKind::Map | ContainerKind::WeakMap => collection::set(self, key.clone(), value),
            kind => {
                unsupported("set", kind);
                false
            }
        }
    }

    /// Remove `key` (or a set member). Returns whether it was present.
    pub fn delete(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        if self.kind().is_collection() {
            collection::delete(self, &key)
        } else {
            base::delete(self, &key)
        }
    }

    /// Whether `key` is present. Records include their prototype chain.
    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        if self.kind().is_collection() {
            collection::has(self, &key)
        } else {
            base::has(self, &key)
        }
    }

    /// Add a member to a set.
    pub fn add(&self, value: impl Into<Value>) -> bool {
        match self.kind() {
            ContainerKind::Set | ContainerKind::WeakSet => collection::add(self, value.into()),
            kind => {
                unsupported("add", kind);
                false
            }
        }
    }

    /// Remove every entry of a map or set.
    pub fn clear(&self) -> bool {
        match self.kind() {
            ContainerKind::Map | ContainerKind::Set => collection::clear(self),
            kind => {
                unsupported("clear", kind);
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Size and iteration
    // ------------------------------------------------------------------

    /// Number of entries: array length, own key count or collection size.
    pub fn len(&self) -> usize {
        match self.kind() {
            ContainerKind::Array => base::length(self),
            ContainerKind::Record => base::own_keys(self).len(),
            ContainerKind::Map | ContainerKind::Set => collection::size(self),
            kind => {
                unsupported("size", kind);
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Own keys. Set members are their own keys.
    pub fn keys(&self) -> Vec<Value> {
        match self.kind() {
            ContainerKind::Record | ContainerKind::Array => base::own_keys(self),
            ContainerKind::Map | ContainerKind::Set => collection::keys(self),
            kind => {
                unsupported("keys", kind);
                Vec::new()
            }
        }
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        match self.kind() {
            ContainerKind::Record | ContainerKind::Array => base::entries(self),
            ContainerKind::Map | ContainerKind::Set => collection::entries(self),
            kind => {
                unsupported("entries", kind);
                Vec::new()
            }
        }
    }

    /// Call `f(value, key)` for every entry.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) {
        for (key, value) in self.entries() {
            f(value, key);
        }
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    /// Append values, returning the new length.
    pub fn push<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Option<usize> {
        base::push(self, values.into_iter().map(Into::into).collect())
    }

    pub fn pop(&self) -> Option<Value> {
        base::pop(self)
    }

    pub fn shift(&self) -> Option<Value> {
        base::shift(self)
    }

    /// Prepend values, returning the new length.
    pub fn unshift<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Option<usize> {
        base::unshift(self, values.into_iter().map(Into::into).collect())
    }

    /// Remove `delete_count` items at `start` and insert `items` there.
    /// Returns the removed items.
    pub fn splice<V: Into<Value>>(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = V>,
    ) -> Vec<Value> {
        base::splice(
            self,
            start,
            delete_count,
            items.into_iter().map(Into::into).collect(),
        )
    }

    pub fn set_len(&self, len: usize) -> bool {
        self.set("length", len)
    }

    pub fn includes(&self, value: impl Into<Value>) -> bool {
        base::search(self, &value.into(), Search::Includes).is_some()
    }

    pub fn index_of(&self, value: impl Into<Value>) -> Option<usize> {
        base::search(self, &value.into(), Search::IndexOf)
    }

    pub fn last_index_of(&self, value: impl Into<Value>) -> Option<usize> {
        base::search(self, &value.into(), Search::LastIndexOf)
    }
}

impl TrackTarget for Observed {
    fn target_id(&self) -> ObjectId {
        self.raw().id()
    }

    fn container_kind(&self) -> ContainerKind {
        self.kind()
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}<{:?}>", self.flavor(), self.raw())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(value: Value) -> Observed {
        value.into_observed().expect("observed view")
    }

    #[test]
    fn views_are_cached_per_flavor() {
        let raw = Target::record([("a", 1)]);
        let a = observed(reactive(raw.clone()));
        let b = observed(reactive(raw.clone()));
        assert!(a.ptr_eq(&b));

        let ro = observed(readonly(raw.clone()));
        assert!(!ro.ptr_eq(&a));
        assert!(ro.raw().ptr_eq(&raw));
    }

    #[test]
    fn cache_entry_dies_with_the_view() {
        let raw = Target::record([("a", 1)]);
        let first_id = observed(reactive(raw.clone())).id();
        let second_id = observed(reactive(raw.clone())).id();
        assert_ne!(first_id, second_id);
    }

    #[test]
    fn reactive_of_a_view_is_the_same_view() {
        let state = reactive(Target::record([("a", 1)]));
        let again = reactive(state.clone());
        assert_eq!(state, again);
    }

    #[test]
    fn reactive_of_readonly_stays_readonly() {
        let ro = readonly(Target::record([("a", 1)]));
        let wrapped = reactive(ro.clone());
        assert_eq!(wrapped, ro);
        assert!(is_readonly(&wrapped));
    }

    #[test]
    fn readonly_over_reactive_reports_both() {
        let state = reactive(Target::record([("a", 1)]));
        let ro = readonly(state.clone());
        assert_ne!(ro, state);
        assert!(is_readonly(&ro));
        assert!(is_reactive(&ro));
        assert_eq!(to_raw(&ro), to_raw(&state));
    }

    #[test]
    fn raw_flag_is_one_layer_deep() {
        let raw = Target::record([("a", 1)]);
        let state = reactive(raw.clone());
        let ro = observed(readonly(state.clone()));
        assert_eq!(ro.get(ReactiveFlag::Raw.key()), Some(state));
        assert_eq!(ro.get(ReactiveFlag::IsReadonly.key()), Some(Value::Bool(true)));
        assert_eq!(ro.get(ReactiveFlag::IsReactive.key()), Some(Value::Bool(false)));
    }

    #[test]
    fn primitives_and_marked_targets_are_not_observed() {
        assert_eq!(reactive(1), Value::from(1));
        let skipped = mark_raw(Target::record([("a", 1)]));
        let same = reactive(skipped.clone());
        assert!(!is_proxy(&same));
        assert_eq!(same, skipped);

        let frozen = Target::array([1]);
        frozen.prevent_extensions();
        assert!(!is_proxy(&reactive(frozen)));
    }

    #[test]
    fn shallow_flags() {
        let shallow = shallow_reactive(Target::record([("a", 1)]));
        assert!(is_shallow(&shallow));
        assert!(is_reactive(&shallow));
        let shallow_ro = shallow_readonly(Target::record([("a", 1)]));
        assert!(is_shallow(&shallow_ro));
        assert!(is_readonly(&shallow_ro));
        assert!(!is_reactive(&shallow_ro));
    }
}
