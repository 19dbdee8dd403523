//! Record and array handlers.
//!
//! Reads track `(target, key)`; writes compare old and new values and
//! trigger only on real changes. Nested containers are observed lazily on
//! read, with the flavor of the view they were read through.
//!
//! Array mutators work on the raw vector and then trigger the difference
//! between the old and new contents, so effects see one trigger per
//! changed slot plus one for the length.

use std::mem;
use std::rc::Rc;

use super::observed::{unsupported, wrap, Flavor, Observed, Source};
use super::target::{array_index, Container, ContainerKind, Target};
use super::value::{number_key, Value};
use crate::error::{warn, ReactiveError};
use crate::reactive::{track, trigger, TrackKey, TrackOp, TrackingGuard, TriggerOp};

/// Property names reads of which are never tracked.
const NON_TRACKABLE: [&str; 3] = ["__proto__", "__v_isRef", "__isVue"];

/// A key resolved against the shape of its container.
#[derive(Debug, Clone)]
enum PropKey {
    Name(Rc<str>),
    Index(usize),
    Length,
}

impl PropKey {
    fn parse(kind: ContainerKind, key: &Value) -> Option<Self> {
        if kind.is_array() {
            return match key {
                Value::Str(s) if &**s == "length" => Some(PropKey::Length),
                _ => array_index(key).map(PropKey::Index),
            };
        }
        match key {
            Value::Str(s) => Some(PropKey::Name(s.clone())),
            Value::Number(n) => Some(PropKey::Name(Rc::from(number_key(*n)))),
            Value::Bool(b) => Some(PropKey::Name(Rc::from(b.to_string()))),
            Value::Null => Some(PropKey::Name(Rc::from("null"))),
            _ => None,
        }
    }

    fn track_key(&self) -> TrackKey {
        match self {
            PropKey::Name(name) => TrackKey::Prop(name.clone()),
            PropKey::Index(index) => TrackKey::Index(*index),
            PropKey::Length => TrackKey::Length,
        }
    }

    fn is_trackable(&self) -> bool {
        match self {
            PropKey::Name(name) => !NON_TRACKABLE.contains(&&**name),
            _ => true,
        }
    }
}

fn parse_or_warn(kind: ContainerKind, key: &Value) -> Option<PropKey> {
    let prop = PropKey::parse(kind, key);
    if prop.is_none() {
        warn(ReactiveError::InvalidKey {
            key: key.to_string(),
            kind: kind.name(),
        });
    }
    prop
}

/// Own value of `prop`, or the prototype to continue the lookup on.
fn read_own(target: &Target, prop: &PropKey) -> (Option<Value>, Option<Value>) {
    target.with(|container| match (container, prop) {
        (Container::Record(record), PropKey::Name(name)) => match record.get(name) {
            Some(value) => (Some(value.clone()), None),
            None => (None, record.proto().cloned()),
        },
        (Container::Array(items), PropKey::Index(index)) => (items.get(*index).cloned(), None),
        (Container::Array(items), PropKey::Length) => (Some(Value::from(items.len())), None),
        _ => (None, None),
    })
}

/// Look `prop` up along the prototype chain. Observed prototypes are read
/// through their view, with `receiver` as the original reader.
fn lookup(target: &Target, prop: &PropKey, key: &Value, receiver: &Observed) -> Option<Value> {
    let (own, proto) = read_own(target, prop);
    if own.is_some() {
        return own;
    }
    match proto? {
        Value::Observed(parent) => parent.get_with_receiver(key, receiver),
        Value::Object(parent) => lookup(&parent, prop, key, receiver),
        _ => None,
    }
}

/// Untracked lookup along the prototype chain.
fn peek(target: &Target, prop: &PropKey) -> Option<Value> {
    let (own, proto) = read_own(target, prop);
    if own.is_some() {
        return own;
    }
    match proto? {
        Value::Observed(parent) => peek(&parent.raw(), prop),
        Value::Object(parent) => peek(&parent, prop),
        _ => None,
    }
}

/// Post-process a value read through `observed`: unwrap refs (except array
/// elements) and observe nested containers with the view's flavor.
pub(crate) fn finish_read(observed: &Observed, value: Value, array_element: bool) -> Value {
    if observed.is_shallow() {
        return value;
    }
    match value {
        Value::Ref(cell) if !array_element => cell.get(),
        nested @ (Value::Object(_) | Value::Observed(_)) => {
            let flavor = if observed.is_readonly() {
                Flavor::Readonly
            } else {
                Flavor::Reactive
            };
            wrap(nested, flavor)
        }
        other => other,
    }
}

/// Whether reads through `observed` are tracked at some layer.
fn tracks_reads(observed: &Observed) -> bool {
    match observed.source() {
        Source::Raw(_) => !observed.is_readonly(),
        Source::Observed(inner) => tracks_reads(inner),
    }
}

// ----------------------------------------------------------------------------
// Keyed access
// ----------------------------------------------------------------------------

pub(crate) fn get(observed: &Observed, key: &Value, receiver: &Observed) -> Option<Value> {
    let kind = observed.kind();
    let prop = parse_or_warn(kind, key)?;
    let value = match observed.source() {
        Source::Observed(inner) => get(inner, key, receiver)?,
        Source::Raw(target) => {
            let value = lookup(target, &prop, key, receiver);
            if !observed.is_readonly() && prop.is_trackable() {
                track(target, TrackOp::Get, prop.track_key());
            }
            value?
        }
    };
    let array_element = kind.is_array() && matches!(prop, PropKey::Index(_));
    Some(finish_read(observed, value, array_element))
}

pub(crate) fn set(observed: &Observed, key: &Value, value: Value, receiver: &Observed) -> bool {
    let kind = observed.kind();
    let Some(prop) = parse_or_warn(kind, key) else {
        return false;
    };
    if observed.is_readonly() {
        warn(ReactiveError::ReadonlyWrite {
            key: key.to_string(),
        });
        return false;
    }
    let Source::Raw(target) = observed.source() else {
        return false;
    };
    if matches!(prop, PropKey::Length) && value.as_index().is_none() {
        warn(ReactiveError::InvalidKey {
            key: value.to_string(),
            kind: "array length",
        });
        return false;
    }

    let mut value = value;
    let mut old = peek(target, &prop);
    if let Some(Value::Ref(cell)) = &old {
        if cell.is_readonly() && !value.is_ref() {
            return false;
        }
    }
    if !observed.is_shallow() && !value.is_readonly() {
        if !value.is_shallow() {
            value = value.to_raw();
            old = old.map(|old| old.to_raw());
        }
        // Writing a plain value over a ref writes through the ref.
        if !kind.is_array() {
            if let Some(Value::Ref(cell)) = &old {
                if !value.is_ref() {
                    cell.set(value);
                    return true;
                }
            }
        }
    }

    let had_key = target.with(|container| match (container, &prop) {
        (Container::Record(record), PropKey::Name(name)) => record.contains_key(name),
        (Container::Array(items), PropKey::Index(index)) => *index < items.len(),
        (Container::Array(_), PropKey::Length) => true,
        _ => false,
    });
    if !write(target, &prop, key, value.clone(), receiver) {
        return false;
    }

    // Writes that landed on another target through the prototype chain are
    // triggered by that target's own view.
    if receiver.raw().ptr_eq(target) {
        if !had_key {
            trigger(target, TriggerOp::Add, Some(prop.track_key()), Some(value), None);
        } else if old.as_ref().map_or(true, |old| value.has_changed(old)) {
            trigger(target, TriggerOp::Set, Some(prop.track_key()), Some(value), old);
        }
    }
    true
}

fn write(target: &Target, prop: &PropKey, key: &Value, value: Value, receiver: &Observed) -> bool {
    let dest = receiver.raw();
    if !dest.ptr_eq(target) {
        return define_own(&dest, prop, value);
    }
    if let PropKey::Name(name) = prop {
        let inherited_from = target.with(|container| match container {
            Container::Record(record) if !record.contains_key(name) => match record.proto() {
                Some(Value::Observed(parent)) => Some(parent.clone()),
                _ => None,
            },
            _ => None,
        });
        if let Some(parent) = inherited_from {
            return parent.set_with_receiver(key, value, receiver);
        }
    }
    define_own(target, prop, value)
}

fn define_own(target: &Target, prop: &PropKey, value: Value) -> bool {
    let extensible = target.is_extensible();
    target.with_mut(|container| match (container, prop) {
        (Container::Record(record), PropKey::Name(name)) => {
            if extensible || record.contains_key(name) {
                record.insert(name.clone(), value);
                true
            } else {
                false
            }
        }
        (Container::Array(items), PropKey::Index(index)) => {
            if *index < items.len() {
                items[*index] = value;
                true
            } else if extensible {
                items.resize(*index + 1, Value::Null);
                items[*index] = value;
                true
            } else {
                false
            }
        }
        (Container::Array(items), PropKey::Length) => match value.as_index() {
            Some(len) => {
                items.resize(len, Value::Null);
                true
            }
            None => false,
        },
        _ => false,
    })
}

/// Remove `key`. Array elements become holes (`Null`) without changing the
/// length. Returns whether the key existed.
pub(crate) fn delete(observed: &Observed, key: &Value) -> bool {
    let kind = observed.kind();
    let Some(prop) = parse_or_warn(kind, key) else {
        return false;
    };
    if observed.is_readonly() {
        warn(ReactiveError::ReadonlyDelete {
            key: key.to_string(),
        });
        return false;
    }
    let Source::Raw(target) = observed.source() else {
        return false;
    };
    let removed = target.with_mut(|container| match (container, &prop) {
        (Container::Record(record), PropKey::Name(name)) => record.remove(name),
        (Container::Array(items), PropKey::Index(index)) if *index < items.len() => {
            Some(mem::replace(&mut items[*index], Value::Null))
        }
        _ => None,
    });
    match removed {
        Some(old) => {
            trigger(target, TriggerOp::Delete, Some(prop.track_key()), None, Some(old));
            true
        }
        None => false,
    }
}

pub(crate) fn has(observed: &Observed, key: &Value) -> bool {
    let Some(prop) = PropKey::parse(observed.kind(), key) else {
        return false;
    };
    match observed.source() {
        Source::Observed(inner) => has(inner, key),
        Source::Raw(target) => {
            let found = contains(target, &prop, key);
            if !observed.is_readonly() {
                track(target, TrackOp::Has, prop.track_key());
            }
            found
        }
    }
}

fn contains(target: &Target, prop: &PropKey, key: &Value) -> bool {
    let (own, proto) = target.with(|container| match (container, prop) {
        (Container::Record(record), PropKey::Name(name)) => {
            (record.contains_key(name), record.proto().cloned())
        }
        (Container::Array(items), PropKey::Index(index)) => (*index < items.len(), None),
        (Container::Array(_), PropKey::Length) => (true, None),
        _ => (false, None),
    });
    if own {
        return true;
    }
    match proto {
        Some(Value::Observed(parent)) => parent.has(key.clone()),
        Some(Value::Object(parent)) => contains(&parent, prop, key),
        _ => false,
    }
}

/// Own keys. Arrays track their length, records their key set.
pub(crate) fn own_keys(observed: &Observed) -> Vec<Value> {
    match observed.source() {
        Source::Observed(inner) => own_keys(inner),
        Source::Raw(target) => {
            if !observed.is_readonly() {
                let key = if target.kind().is_array() {
                    TrackKey::Length
                } else {
                    TrackKey::Iterate
                };
                track(target, TrackOp::Iterate, key);
            }
            target.with(Container::keys)
        }
    }
}

pub(crate) fn entries(observed: &Observed) -> Vec<(Value, Value)> {
    own_keys(observed)
        .into_iter()
        .map(|key| {
            let value = get(observed, &key, observed).unwrap_or(Value::Null);
            (key, value)
        })
        .collect()
}

pub(crate) fn length(observed: &Observed) -> usize {
    match observed.source() {
        Source::Observed(inner) => length(inner),
        Source::Raw(target) => {
            if !observed.is_readonly() {
                track(target, TrackOp::Get, TrackKey::Length);
            }
            target.len()
        }
    }
}

// ----------------------------------------------------------------------------
// Array mutators
// ----------------------------------------------------------------------------

fn writable_array(observed: &Observed, op: &'static str) -> Option<Target> {
    let kind = observed.kind();
    if !kind.is_array() {
        unsupported(op, kind);
        return None;
    }
    if observed.is_readonly() {
        warn(ReactiveError::ReadonlyWrite { key: op.to_string() });
        return None;
    }
    match observed.source() {
        Source::Raw(target) => Some(target.clone()),
        Source::Observed(_) => None,
    }
}

/// Values stored through a deep view are stored raw.
fn prepare(observed: &Observed, value: Value) -> Value {
    if !observed.is_shallow() && !value.is_readonly() && !value.is_shallow() {
        value.to_raw()
    } else {
        value
    }
}

fn refuse_growth(target: &Target, op: &'static str) -> bool {
    if target.is_extensible() {
        return false;
    }
    unsupported(op, ContainerKind::Array);
    true
}

pub(crate) fn push(observed: &Observed, values: Vec<Value>) -> Option<usize> {
    let target = writable_array(observed, "push")?;
    if !values.is_empty() && refuse_growth(&target, "push") {
        return None;
    }
    let _paused = TrackingGuard::pause();
    let mut len = target.len();
    for value in values {
        let value = prepare(observed, value);
        let stored = value.clone();
        let index = target.with_mut(|container| match container {
            Container::Array(items) => {
                items.push(stored);
                Some(items.len() - 1)
            }
            _ => None,
        })?;
        trigger(&target, TriggerOp::Add, Some(TrackKey::Index(index)), Some(value), None);
        len = index + 1;
    }
    Some(len)
}

pub(crate) fn pop(observed: &Observed) -> Option<Value> {
    let target = writable_array(observed, "pop")?;
    let _paused = TrackingGuard::pause();
    let (old, len) = target.with_mut(|container| match container {
        Container::Array(items) => items.pop().map(|old| (old, items.len())),
        _ => None,
    })?;
    trigger(
        &target,
        TriggerOp::Delete,
        Some(TrackKey::Index(len)),
        None,
        Some(old.clone()),
    );
    trigger(
        &target,
        TriggerOp::Set,
        Some(TrackKey::Length),
        Some(Value::from(len)),
        Some(Value::from(len + 1)),
    );
    Some(finish_read(observed, old, true))
}

pub(crate) fn shift(observed: &Observed) -> Option<Value> {
    let target = writable_array(observed, "shift")?;
    let removed = splice_in_place(&target, |items| {
        if items.is_empty() {
            None
        } else {
            Some(items.remove(0))
        }
    })??;
    Some(finish_read(observed, removed, true))
}

pub(crate) fn unshift(observed: &Observed, values: Vec<Value>) -> Option<usize> {
    let target = writable_array(observed, "unshift")?;
    if !values.is_empty() && refuse_growth(&target, "unshift") {
        return None;
    }
    let values: Vec<Value> = values.into_iter().map(|v| prepare(observed, v)).collect();
    splice_in_place(&target, move |items| {
        let tail = mem::take(items);
        items.extend(values);
        items.extend(tail);
        items.len()
    })
}

pub(crate) fn splice(
    observed: &Observed,
    start: usize,
    delete_count: usize,
    values: Vec<Value>,
) -> Vec<Value> {
    let Some(target) = writable_array(observed, "splice") else {
        return Vec::new();
    };
    let removing = delete_count.min(target.len().saturating_sub(start));
    if values.len() > removing && refuse_growth(&target, "splice") {
        return Vec::new();
    }
    let values: Vec<Value> = values.into_iter().map(|v| prepare(observed, v)).collect();
    let removed = splice_in_place(&target, move |items| {
        let start = start.min(items.len());
        let end = start.saturating_add(delete_count).min(items.len());
        items.splice(start..end, values).collect::<Vec<_>>()
    })
    .unwrap_or_default();
    removed
        .into_iter()
        .map(|value| finish_read(observed, value, true))
        .collect()
}

/// Apply `f` to the raw items, then trigger the difference.
fn splice_in_place<R>(target: &Target, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
    let _paused = TrackingGuard::pause();
    let (before, result, after) = target.with_mut(|container| match container {
        Container::Array(items) => {
            let before = items.clone();
            let result = f(items);
            Some((before, result, items.clone()))
        }
        _ => None,
    })?;
    trigger_diff(target, &before, &after);
    Some(result)
}

fn trigger_diff(target: &Target, before: &[Value], after: &[Value]) {
    let common = before.len().min(after.len());
    for index in 0..common {
        if after[index].has_changed(&before[index]) {
            trigger(
                target,
                TriggerOp::Set,
                Some(TrackKey::Index(index)),
                Some(after[index].clone()),
                Some(before[index].clone()),
            );
        }
    }
    for (index, value) in after.iter().enumerate().skip(before.len()) {
        trigger(
            target,
            TriggerOp::Add,
            Some(TrackKey::Index(index)),
            Some(value.clone()),
            None,
        );
    }
    if after.len() < before.len() {
        for index in (after.len()..before.len()).rev() {
            trigger(
                target,
                TriggerOp::Delete,
                Some(TrackKey::Index(index)),
                None,
                Some(before[index].clone()),
            );
        }
        trigger(
            target,
            TriggerOp::Set,
            Some(TrackKey::Length),
            Some(Value::from(after.len())),
            Some(Value::from(before.len())),
        );
    }
}

// ----------------------------------------------------------------------------
// Search
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Search {
    Includes,
    IndexOf,
    LastIndexOf,
}

/// Search the raw items, tracking every index and the length. A miss is
/// retried with the raw form of `needle`, so observed and raw versions of
/// a container both find it.
pub(crate) fn search(observed: &Observed, needle: &Value, how: Search) -> Option<usize> {
    let kind = observed.kind();
    if !kind.is_array() {
        unsupported("search", kind);
        return None;
    }
    let target = observed.raw();
    let items = target.with(|container| match container {
        Container::Array(items) => items.clone(),
        _ => Vec::new(),
    });
    if tracks_reads(observed) {
        track(&target, TrackOp::Get, TrackKey::Length);
        for index in 0..items.len() {
            track(&target, TrackOp::Get, TrackKey::Index(index));
        }
    }
    find(&items, needle, how).or_else(|| {
        let raw = needle.to_raw();
        if raw.same_value(needle) {
            None
        } else {
            find(&items, &raw, how)
        }
    })
}

fn find(items: &[Value], needle: &Value, how: Search) -> Option<usize> {
    match how {
        Search::Includes => items.iter().position(|item| item.same_value_zero(needle)),
        Search::IndexOf => items.iter().position(|item| item.strict_equals(needle)),
        Search::LastIndexOf => items.iter().rposition(|item| item.strict_equals(needle)),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
