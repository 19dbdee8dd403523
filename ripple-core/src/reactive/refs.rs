//! Ref Implementation
//!
//! A ref is a single reactive cell. Reading its value inside an effect
//! subscribes the effect; writing a value that differs from the current one
//! notifies the subscribers.
//!
//! # How Refs Work
//!
//! 1. Each ref owns one lazily created dep. The first tracked read creates
//!    it, so refs that are never read inside an effect cost nothing.
//!
//! 2. A ref keeps both the raw value and the value it hands out. For a deep
//!    ref holding an object, the handed-out value is the object's reactive
//!    view while the change check compares raw values.
//!
//! 3. A shallow ref stores and returns exactly what it was given, and can
//!    be forced to notify with `trigger_ref`.
//!
//! # Dynamic Refs
//!
//! Refs stored inside observed containers are type-erased as `AnyRef`. Any
//! `ValueCell` implementation can be stored that way: `Ref<Value>`,
//! `Computed<Value>`, property refs created by `to_ref` and custom refs.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::runtime::{untracked, RefDep};
use crate::graph::ObjectId;
use crate::observe::{reactive, Observed, Value};

/// Values that can live in a typed `Ref`.
pub trait RefValue: Clone + 'static {
    /// Whether replacing `old` with `self` counts as a change.
    fn has_changed(&self, old: &Self) -> bool;

    /// The raw form used for change detection.
    fn to_raw(&self) -> Self {
        self.clone()
    }

    /// The form handed out by a deep ref.
    fn to_reactive(&self) -> Self {
        self.clone()
    }

    /// A dynamic rendering for debugger events, if there is one.
    fn to_value(&self) -> Option<Value> {
        None
    }
}

macro_rules! impl_ref_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl RefValue for $ty {
                fn has_changed(&self, old: &Self) -> bool {
                    self != old
                }

                fn to_value(&self) -> Option<Value> {
                    Some(Value::from(self.clone()))
                }
            }
        )*
    };
}

macro_rules! impl_ref_value_opaque {
    ($($ty:ty),* $(,)?) => {
        $(
            impl RefValue for $ty {
                fn has_changed(&self, old: &Self) -> bool {
                    self != old
                }
            }
        )*
    };
}

impl_ref_value!(bool, i32, i64, u32, u64, usize, String, &'static str);
impl_ref_value_opaque!((), char, i8, i16, u8, u16, isize, i128, u128);

impl RefValue for f64 {
    fn has_changed(&self, old: &Self) -> bool {
        !Value::Number(*self).same_value(&Value::Number(*old))
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Number(*self))
    }
}

impl RefValue for f32 {
    fn has_changed(&self, old: &Self) -> bool {
        f64::from(*self).has_changed(&f64::from(*old))
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Number(f64::from(*self)))
    }
}

impl<T: RefValue> RefValue for Option<T> {
    fn has_changed(&self, old: &Self) -> bool {
        match (self, old) {
            (Some(new), Some(old)) => new.has_changed(old),
            (None, None) => false,
            _ => true,
        }
    }

    fn to_raw(&self) -> Self {
        self.as_ref().map(RefValue::to_raw)
    }

    fn to_reactive(&self) -> Self {
        self.as_ref().map(RefValue::to_reactive)
    }

    fn to_value(&self) -> Option<Value> {
        match self {
            Some(value) => value.to_value(),
            None => Some(Value::Null),
        }
    }
}

impl<T: RefValue> RefValue for Vec<T> {
    fn has_changed(&self, old: &Self) -> bool {
        self.len() != old.len() || self.iter().zip(old).any(|(new, old)| new.has_changed(old))
    }

    fn to_raw(&self) -> Self {
        self.iter().map(RefValue::to_raw).collect()
    }

    fn to_reactive(&self) -> Self {
        self.iter().map(RefValue::to_reactive).collect()
    }
}

impl RefValue for Value {
    fn has_changed(&self, old: &Self) -> bool {
        !self.same_value(old)
    }

    fn to_raw(&self) -> Self {
        Value::to_raw(self)
    }

    fn to_reactive(&self) -> Self {
        if self.is_object() {
            reactive(self.clone())
        } else {
            self.clone()
        }
    }

    fn to_value(&self) -> Option<Value> {
        Some(self.clone())
    }
}

// ----------------------------------------------------------------------------
// Ref<T>
// ----------------------------------------------------------------------------

struct RefInner<T> {
    raw: RefCell<T>,
    value: RefCell<T>,
    shallow: bool,
    dep: RefDep,
}

/// A reactive cell holding a `T`.
///
/// # Example
///
/// ```
/// use ripple_core::Ref;
///
/// let count = Ref::new(1);
/// count.set(2);
/// count.update(|n| n * 10);
/// assert_eq!(count.get(), 20);
/// ```
pub struct Ref<T: RefValue> {
    inner: Rc<RefInner<T>>,
}

impl<T: RefValue> Ref<T> {
    /// Create a deep ref.
    pub fn new(value: T) -> Self {
        Self::create(value, false)
    }

    /// Create a ref that stores exactly what it is given.
    pub fn shallow(value: T) -> Self {
        Self::create(value, true)
    }

    fn create(value: T, shallow: bool) -> Self {
        let (raw, value) = if shallow {
            (value.clone(), value)
        } else {
            (value.to_raw(), value.to_reactive())
        };
        Self {
            inner: Rc::new(RefInner {
                raw: RefCell::new(raw),
                value: RefCell::new(value),
                shallow,
                dep: RefDep::new(),
            }),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.inner.dep.owner()
    }

    /// Read the value, subscribing the running effect.
    pub fn get(&self) -> T {
        self.inner.dep.track();
        self.get_untracked()
    }

    /// Read the value without subscribing.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Replace the value, notifying subscribers if it changed.
    pub fn set(&self, value: T) {
        let inner = &self.inner;
        let new_raw = if inner.shallow { value } else { value.to_raw() };
        if !new_raw.has_changed(&inner.raw.borrow()) {
            return;
        }

        let new_value = if inner.shallow {
            new_raw.clone()
        } else {
            new_raw.to_reactive()
        };
        let event_value = new_raw.to_value();
        inner.raw.replace(new_raw);
        let old = inner.value.replace(new_value);
        inner.dep.trigger(event_value, old.to_value());
    }

    /// Set the value computed from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.get_untracked());
        self.set(next);
    }

    /// Notify subscribers without changing the value.
    pub fn trigger(&self) {
        let current = self.inner.value.borrow().to_value();
        self.inner.dep.trigger(current, None);
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: RefValue> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: RefValue + fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.id())
            .field("value", &*self.inner.value.borrow())
            .field("shallow", &self.inner.shallow)
            .finish()
    }
}

/// Create a shallow ref.
pub fn shallow_ref<T: RefValue>(value: T) -> Ref<T> {
    Ref::shallow(value)
}

/// Force a ref's subscribers to run.
pub fn trigger_ref<T: RefValue>(r: &Ref<T>) {
    r.trigger();
}

// ----------------------------------------------------------------------------
// Dynamic refs
// ----------------------------------------------------------------------------

/// A reactive cell holding a dynamic `Value`.
pub trait ValueCell {
    fn id(&self) -> ObjectId;

    /// Tracked read.
    fn get(&self) -> Value;

    /// Untracked read.
    fn peek(&self) -> Value;

    fn set(&self, value: Value);

    fn is_readonly(&self) -> bool {
        false
    }
}

/// A type-erased ref, as stored inside a `Value`.
#[derive(Clone)]
pub struct AnyRef {
    cell: Rc<dyn ValueCell>,
}

impl AnyRef {
    pub fn new(cell: impl ValueCell + 'static) -> Self {
        Self {
            cell: Rc::new(cell),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.cell.id()
    }

    pub fn get(&self) -> Value {
        self.cell.get()
    }

    pub fn peek(&self) -> Value {
        self.cell.peek()
    }

    pub fn set(&self, value: impl Into<Value>) {
        self.cell.set(value.into());
    }

    pub fn is_readonly(&self) -> bool {
        self.cell.is_readonly()
    }
}

impl PartialEq for AnyRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for AnyRef {}

impl fmt::Debug for AnyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({:?})", self.id())
    }
}

impl ValueCell for Ref<Value> {
    fn id(&self) -> ObjectId {
        Ref::id(self)
    }

    fn get(&self) -> Value {
        Ref::get(self)
    }

    fn peek(&self) -> Value {
        self.get_untracked()
    }

    fn set(&self, value: Value) {
        Ref::set(self, value);
    }
}

impl From<Ref<Value>> for AnyRef {
    fn from(r: Ref<Value>) -> Self {
        AnyRef::new(r)
    }
}

impl From<Ref<Value>> for Value {
    fn from(r: Ref<Value>) -> Self {
        Value::Ref(AnyRef::new(r))
    }
}

/// Whether `value` is a ref.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The ref's value if `value` is a ref, otherwise `value` itself.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.get(),
        other => other.clone(),
    }
}

// ----------------------------------------------------------------------------
// Property refs
// ----------------------------------------------------------------------------

/// A ref bound to one property of an observed container.
struct PropertyRef {
    id: ObjectId,
    object: Observed,
    key: Value,
    default: Option<Value>,
}

impl ValueCell for PropertyRef {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn get(&self) -> Value {
        self.object
            .get(self.key.clone())
            .or_else(|| self.default.clone())
            .unwrap_or(Value::Null)
    }

    fn peek(&self) -> Value {
        untracked(|| self.get())
    }

    fn set(&self, value: Value) {
        self.object.set(self.key.clone(), value);
    }

    fn is_readonly(&self) -> bool {
        self.object.is_readonly()
    }
}

/// A ref reading and writing `object[key]`.
///
/// If the slot already holds a ref, that ref is returned.
pub fn to_ref(object: &Observed, key: impl Into<Value>) -> Value {
    to_ref_inner(object, key.into(), None)
}

/// Like `to_ref`, reading `default` while the property is missing.
pub fn to_ref_with_default(
    object: &Observed,
    key: impl Into<Value>,
    default: impl Into<Value>,
) -> Value {
    to_ref_inner(object, key.into(), Some(default.into()))
}

fn to_ref_inner(object: &Observed, key: Value, default: Option<Value>) -> Value {
    let existing = object.raw().with(|container| container.get(&key));
    if let Some(existing @ Value::Ref(_)) = existing {
        return existing;
    }
    Value::Ref(AnyRef::new(PropertyRef {
        id: ObjectId::new(),
        object: object.clone(),
        key,
        default,
    }))
}

/// A property ref for every own key of `object`.
pub fn to_refs(object: &Observed) -> IndexMap<Value, Value> {
    object
        .raw()
        .with(|container| container.keys())
        .into_iter()
        .map(|key| {
            let r = to_ref(object, key.clone());
            (key, r)
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Custom refs
// ----------------------------------------------------------------------------

/// Track and trigger handles given to a `custom_ref` factory.
#[derive(Clone)]
pub struct RefTracker {
    dep: Rc<RefDep>,
}

impl RefTracker {
    pub fn track(&self) {
        self.dep.track();
    }

    pub fn trigger(&self) {
        self.dep.trigger(None, None);
    }
}

struct CustomRefInner<T> {
    dep: Rc<RefDep>,
    get: Box<dyn Fn() -> T>,
    set: Box<dyn Fn(T)>,
}

/// A ref whose reads and writes are user-defined.
pub struct CustomRef<T> {
    inner: Rc<CustomRefInner<T>>,
}

impl<T: 'static> CustomRef<T> {
    pub fn id(&self) -> ObjectId {
        self.inner.dep.owner()
    }

    pub fn get(&self) -> T {
        (self.inner.get)()
    }

    pub fn set(&self, value: T) {
        (self.inner.set)(value);
    }
}

impl<T> Clone for CustomRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Build a ref from a getter and setter that decide when to track and when
/// to trigger.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use ripple_core::custom_ref;
///
/// let store = Rc::new(Cell::new(0));
/// let r = custom_ref(|tracker| {
///     let (read, write) = (store.clone(), store.clone());
///     let t = tracker.clone();
///     (
///         move || {
///             t.track();
///             read.get()
///         },
///         move |value| {
///             write.set(value);
///             tracker.trigger();
///         },
///     )
/// });
/// r.set(3);
/// assert_eq!(r.get(), 3);
/// ```
pub fn custom_ref<T, G, S>(factory: impl FnOnce(RefTracker) -> (G, S)) -> CustomRef<T>
where
    T: 'static,
    G: Fn() -> T + 'static,
    S: Fn(T) + 'static,
{
    let dep = Rc::new(RefDep::new());
    let (get, set) = factory(RefTracker { dep: dep.clone() });
    CustomRef {
        inner: Rc::new(CustomRefInner {
            dep,
            get: Box::new(get),
            set: Box::new(set),
        }),
    }
}

impl ValueCell for CustomRef<Value> {
    fn id(&self) -> ObjectId {
        CustomRef::id(self)
    }

    fn get(&self) -> Value {
        CustomRef::get(self)
    }

    fn peek(&self) -> Value {
        untracked(|| CustomRef::get(self))
    }

    fn set(&self, value: Value) {
        CustomRef::set(self, value);
    }
}

impl From<CustomRef<Value>> for Value {
    fn from(r: CustomRef<Value>) -> Self {
        Value::Ref(AnyRef::new(r))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{is_reactive, Target};
    use crate::reactive::{effect, EffectOptions};
    use std::cell::Cell;

    fn watch<T: RefValue>(r: &Ref<T>) -> (Rc<Cell<usize>>, crate::reactive::EffectRunner<()>) {
        let runs = Rc::new(Cell::new(0));
        let count = runs.clone();
        let r = r.clone();
        let runner = effect(
            move || {
                count.set(count.get() + 1);
                r.get();
            },
            EffectOptions::default(),
        );
        (runs, runner)
    }

    #[test]
    fn set_notifies_only_on_change() {
        let count = Ref::new(1);
        let (runs, _runner) = watch(&count);
        assert_eq!(runs.get(), 1);

        count.set(1);
        assert_eq!(runs.get(), 1);
        count.set(2);
        assert_eq!(runs.get(), 2);
        count.update(|n| n + 1);
        assert_eq!(count.get_untracked(), 3);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn nan_is_not_a_change_but_signed_zero_is() {
        let n = Ref::new(f64::NAN);
        let (runs, _runner) = watch(&n);
        n.set(f64::NAN);
        assert_eq!(runs.get(), 1);

        let z = Ref::new(0.0_f64);
        let (runs, _runner) = watch(&z);
        z.set(-0.0);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn deep_ref_hands_out_reactive_view() {
        let raw = Value::from(Target::record([("a", 1)]));
        let r = Ref::new(raw.clone());
        assert!(is_reactive(&r.get_untracked()));

        let (runs, _runner) = watch(&r);
        // Setting the reactive view of the same object is not a change.
        r.set(r.get_untracked());
        assert_eq!(runs.get(), 1);
        r.set(raw);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn shallow_ref_stores_as_given_and_can_be_forced() {
        let raw = Value::from(Target::record([("a", 1)]));
        let r = shallow_ref(raw.clone());
        assert!(!is_reactive(&r.get_untracked()));
        assert!(r.is_shallow());

        let (runs, _runner) = watch(&r);
        trigger_ref(&r);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn unref_and_is_ref() {
        let r: Value = Ref::new(Value::from(5)).into();
        assert!(is_ref(&r));
        assert_eq!(unref(&r), Value::from(5));
        assert_eq!(unref(&Value::from("x")), Value::from("x"));
        assert!(!is_ref(&Value::Null));
    }

    #[test]
    fn any_ref_identity_follows_the_cell() {
        let r = Ref::new(Value::from(1));
        let a = AnyRef::from(r.clone());
        let b = AnyRef::from(r.clone());
        assert_eq!(a, b);
        assert_ne!(a, AnyRef::from(Ref::new(Value::from(1))));

        a.set(2);
        assert_eq!(b.peek(), Value::from(2));
    }

    #[test]
    fn property_ref_reads_and_writes_through() {
        let state = reactive(Target::record([("a", 1)])).into_observed().unwrap();
        let a = to_ref(&state, "a");
        let Value::Ref(a) = a else { panic!("expected a ref") };

        assert_eq!(a.get(), Value::from(1));
        a.set(2);
        assert_eq!(state.get("a"), Some(Value::from(2)));

        let missing = to_ref_with_default(&state, "b", 10);
        assert_eq!(unref(&missing), Value::from(10));
    }

    #[test]
    fn to_ref_returns_existing_ref() {
        let inner = Ref::new(Value::from(1));
        let state = reactive(Target::record([("r", Value::from(inner.clone()))]))
            .into_observed()
            .unwrap();
        let Value::Ref(found) = to_ref(&state, "r") else { panic!("expected a ref") };
        assert_eq!(found.id(), inner.id());
    }

    #[test]
    fn to_refs_covers_every_key() {
        let state = reactive(Target::record([("a", 1), ("b", 2)]))
            .into_observed()
            .unwrap();
        let refs = to_refs(&state);
        assert_eq!(refs.len(), 2);
        assert_eq!(unref(&refs[&Value::from("b")]), Value::from(2));
    }

    #[test]
    fn custom_ref_controls_tracking() {
        let store = Rc::new(Cell::new(0));
        let (read, write) = (store.clone(), store.clone());
        let r = custom_ref(move |tracker| {
            let t = tracker.clone();
            (
                move || {
                    t.track();
                    read.get()
                },
                move |value: i32| {
                    write.set(value);
                    if value % 2 == 0 {
                        tracker.trigger();
                    }
                },
            )
        });

        let runs = Rc::new(Cell::new(0));
        let (count, reader) = (runs.clone(), r.clone());
        let _runner = effect(
            move || {
                count.set(count.get() + 1);
                reader.get();
            },
            EffectOptions::default(),
        );

        r.set(1);
        assert_eq!(runs.get(), 1);
        r.set(2);
        assert_eq!(runs.get(), 2);
        assert_eq!(store.get(), 2);
    }
}
