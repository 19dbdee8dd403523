//! Track and trigger vocabulary.
//!
//! Every read of an observed slot is a `(target, TrackOp, TrackKey)` triple
//! and every write a `(target, TriggerOp, TrackKey)` triple. Keys identify
//! the slot inside the target; the two synthetic keys `Iterate` and
//! `MapKeyIterate` stand for "the set of keys" of a container.

use std::fmt;
use std::rc::Rc;

use crate::graph::ObjectId;
use crate::observe::{ContainerKind, Value};

/// Kind of read being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Kind of write being triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

/// A tracked slot inside a target.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum TrackKey {
    /// Named property of a record.
    Prop(Rc<str>),
    /// Array element.
    Index(usize),
    /// Array length.
    Length,
    /// Structure of a container: its keys, size or iteration.
    Iterate,
    /// Key iteration of a `Map`, unaffected by value-only writes.
    MapKeyIterate,
    /// Entry of a keyed collection.
    Entry(Value),
}

impl TrackKey {
    pub fn prop(name: &str) -> Self {
        TrackKey::Prop(Rc::from(name))
    }
}

impl fmt::Debug for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKey::Prop(name) => write!(f, "{name:?}"),
            TrackKey::Index(index) => write!(f, "[{index}]"),
            TrackKey::Length => f.write_str("length"),
            TrackKey::Iterate => f.write_str("<iterate>"),
            TrackKey::MapKeyIterate => f.write_str("<map-key-iterate>"),
            TrackKey::Entry(key) => write!(f, "<entry {key:?}>"),
        }
    }
}

/// Anything that dependencies can be recorded against.
///
/// Observed containers implement this; integrations with their own state
/// can use a bare `ObjectId`.
pub trait TrackTarget {
    fn target_id(&self) -> ObjectId;

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Record
    }
}

impl TrackTarget for ObjectId {
    fn target_id(&self) -> ObjectId {
        *self
    }
}
