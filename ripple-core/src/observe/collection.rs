//! Map and set handlers.
//!
//! Entries are tracked per key. A key may be looked up in both its given
//! and its raw form, so a view and its raw target address the same entry;
//! storing both forms as separate keys is reported in debug builds.
//!
//! Structural reads (`size`, iteration) track the iterate key. Map key
//! iteration tracks its own key so value-only writes leave it alone.

use std::mem;

use super::observed::{unsupported, wrap, Flavor, Observed, Source};
use super::target::{Container, ContainerKind, Target};
use super::value::Value;
use crate::error::{warn, ReactiveError};
use crate::reactive::runtime::{trigger_with, TriggerInfo};
use crate::reactive::{track, trigger, TrackKey, TrackOp, TriggerOp};

fn wrap_entry(observed: &Observed, value: Value) -> Value {
    if observed.is_shallow() || !value.is_object() {
        return value;
    }
    let flavor = if observed.is_readonly() {
        Flavor::Readonly
    } else {
        Flavor::Reactive
    };
    wrap(value, flavor)
}

/// Track both forms of `key` when they differ.
fn track_entry(observed: &Observed, op: TrackOp, key: &Value, raw_key: &Value) {
    if observed.is_readonly() {
        return;
    }
    let target = observed.raw();
    if key != raw_key {
        track(&target, op, TrackKey::Entry(key.clone()));
    }
    track(&target, op, TrackKey::Entry(raw_key.clone()));
}

fn refuse_readonly(observed: &Observed, op: &'static str) -> bool {
    if observed.is_readonly() {
        warn(ReactiveError::ReadonlyCollection { op });
        true
    } else {
        false
    }
}

/// Weak collections only hold containers.
fn refuse_weak_key(target: &Target, key: &Value) -> bool {
    let kind = target.kind();
    if kind.is_weak() && !key.is_object() {
        warn(ReactiveError::InvalidKey {
            key: key.to_string(),
            kind: kind.name(),
        });
        true
    } else {
        false
    }
}

/// Resolve `key` to the form actually stored, preferring the given form.
fn stored_key(target: &Target, key: &Value) -> Option<Value> {
    if target.with(|c| c.contains(key)) {
        return Some(key.clone());
    }
    let raw_key = key.to_raw();
    if &raw_key != key && target.with(|c| c.contains(&raw_key)) {
        Some(raw_key)
    } else {
        None
    }
}

fn check_identity_keys(target: &Target, key: &Value) {
    if !cfg!(debug_assertions) {
        return;
    }
    let raw_key = key.to_raw();
    if &raw_key != key && target.with(|c| c.contains(&raw_key)) {
        warn(ReactiveError::DuplicateIdentityKey {
            kind: target.kind().name(),
        });
    }
}

// ----------------------------------------------------------------------------
// Reads
// ----------------------------------------------------------------------------

pub(crate) fn get(observed: &Observed, key: &Value) -> Option<Value> {
    let raw_key = key.to_raw();
    track_entry(observed, TrackOp::Get, key, &raw_key);
    let found = stored_key(&observed.raw(), key);
    let value = match (observed.source(), found) {
        (Source::Raw(target), Some(found)) => target.with(|c| c.get(&found)),
        (Source::Observed(inner), Some(found)) => get(inner, &found),
        (Source::Observed(inner), None) => {
            // Let the inner view record the miss.
            get(inner, key);
            None
        }
        (Source::Raw(_), None) => None,
    }?;
    Some(wrap_entry(observed, value))
}

pub(crate) fn has(observed: &Observed, key: &Value) -> bool {
    let raw_key = key.to_raw();
    track_entry(observed, TrackOp::Has, key, &raw_key);
    let lookup = |k: &Value| match observed.source() {
        Source::Raw(target) => target.with(|c| c.contains(k)),
        Source::Observed(inner) => has(inner, k),
    };
    if key == &raw_key {
        lookup(key)
    } else {
        lookup(key) || lookup(&raw_key)
    }
}

pub(crate) fn size(observed: &Observed) -> usize {
    match observed.source() {
        Source::Observed(inner) => size(inner),
        Source::Raw(target) => {
            if !observed.is_readonly() {
                track(target, TrackOp::Iterate, TrackKey::Iterate);
            }
            target.len()
        }
    }
}

fn entries_tracked(observed: &Observed, key: &TrackKey) -> Vec<(Value, Value)> {
    match observed.source() {
        Source::Observed(inner) => entries_tracked(inner, key),
        Source::Raw(target) => {
            if !observed.is_readonly() {
                track(target, TrackOp::Iterate, key.clone());
            }
            target.with(Container::entries)
        }
    }
}

fn iterate(observed: &Observed, key: TrackKey) -> Vec<(Value, Value)> {
    entries_tracked(observed, &key)
        .into_iter()
        .map(|(k, v)| (wrap_entry(observed, k), wrap_entry(observed, v)))
        .collect()
}

/// Map keys track key iteration only; set members track all iteration.
pub(crate) fn keys(observed: &Observed) -> Vec<Value> {
    let key = if observed.kind() == ContainerKind::Map {
        TrackKey::MapKeyIterate
    } else {
        TrackKey::Iterate
    };
    iterate(observed, key).into_iter().map(|(k, _)| k).collect()
}

pub(crate) fn entries(observed: &Observed) -> Vec<(Value, Value)> {
    iterate(observed, TrackKey::Iterate)
}

// ----------------------------------------------------------------------------
// Writes
// ----------------------------------------------------------------------------

pub(crate) fn add(observed: &Observed, value: Value) -> bool {
    if refuse_readonly(observed, "add") {
        return false;
    }
    let target = observed.raw();
    let value = if !observed.is_shallow() && !value.is_shallow() && !value.is_readonly() {
        value.to_raw()
    } else {
        value
    };
    if refuse_weak_key(&target, &value) {
        return false;
    }
    let stored = value.clone();
    let inserted = target.with_mut(|c| match c {
        Container::Set(set) | Container::WeakSet(set) => set.insert(stored),
        _ => false,
    });
    if inserted {
        trigger(
            &target,
            TriggerOp::Add,
            Some(TrackKey::Entry(value.clone())),
            Some(value),
            None,
        );
    }
    inserted
}

pub(crate) fn set(observed: &Observed, key: Value, value: Value) -> bool {
    if refuse_readonly(observed, "set") {
        return false;
    }
    let target = observed.raw();
    if refuse_weak_key(&target, &key) {
        return false;
    }
    let value = if !observed.is_shallow() && !value.is_shallow() && !value.is_readonly() {
        value.to_raw()
    } else {
        value
    };

    let (key, had_key) = match stored_key(&target, &key) {
        Some(found) => {
            if found == key {
                check_identity_keys(&target, &key);
            }
            (found, true)
        }
        None => (key.to_raw(), false),
    };
    let old = target.with(|c| c.get(&key));
    let (stored_key, stored_value) = (key.clone(), value.clone());
    let replaced = target.with_mut(|c| match c {
        Container::Map(map) | Container::WeakMap(map) => map.insert(stored_key, stored_value),
        _ => None,
    });
    drop(replaced);

    if !had_key {
        trigger(&target, TriggerOp::Add, Some(TrackKey::Entry(key)), Some(value), None);
    } else if old.as_ref().map_or(true, |old| value.has_changed(old)) {
        trigger(&target, TriggerOp::Set, Some(TrackKey::Entry(key)), Some(value), old);
    }
    true
}

pub(crate) fn delete(observed: &Observed, key: &Value) -> bool {
    if refuse_readonly(observed, "delete") {
        return false;
    }
    let target = observed.raw();
    let Some(found) = stored_key(&target, key) else {
        return false;
    };
    if &found == key {
        check_identity_keys(&target, key);
    }
    let old = target.with(|c| c.get(&found));
    let removed = target.with_mut(|c| match c {
        Container::Map(map) | Container::WeakMap(map) => map.shift_remove(&found).is_some(),
        Container::Set(set) | Container::WeakSet(set) => set.shift_remove(&found),
        _ => false,
    });
    if removed {
        trigger(&target, TriggerOp::Delete, Some(TrackKey::Entry(found)), None, old);
    }
    removed
}

/// Remove every entry. Weak collections cannot be cleared.
pub(crate) fn clear(observed: &Observed) -> bool {
    if refuse_readonly(observed, "clear") {
        return false;
    }
    let target = observed.raw();
    let kind = target.kind();
    if kind.is_weak() {
        unsupported("clear", kind);
        return false;
    }
    if target.is_empty() {
        return false;
    }
    let cleared = target.with_mut(|c| {
        let empty = c.empty_like();
        mem::replace(c, empty)
    });
    let old_target = cfg!(debug_assertions).then(|| cleared.clone());
    trigger_with(
        TriggerInfo {
            target: target.id(),
            op: TriggerOp::Clear,
            key: None,
            new_value: None,
            old_value: None,
            old_target,
        },
        kind,
    );
    drop(cleared);
    true
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
