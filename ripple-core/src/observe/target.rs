//! Raw containers.
//!
//! A `Target` is a shared, mutable container with an identity. Reads and
//! writes through a `Target` are invisible to the reactive runtime; only
//! the observed views in [`super::observed`] track and trigger.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::value::{number_key, Value};
use crate::graph::ObjectId;
use crate::reactive::runtime::release_target;
use crate::reactive::TrackTarget;

/// Shape of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ContainerKind {
    Record,
    Array,
    Map,
    Set,
    WeakMap,
    WeakSet,
}

impl ContainerKind {
    pub fn is_array(self) -> bool {
        self == ContainerKind::Array
    }

    /// Keyed and value collections, weak or not.
    pub fn is_collection(self) -> bool {
        !matches!(self, ContainerKind::Record | ContainerKind::Array)
    }

    pub fn is_weak(self) -> bool {
        matches!(self, ContainerKind::WeakMap | ContainerKind::WeakSet)
    }

    pub fn name(self) -> &'static str {
        match self {
            ContainerKind::Record => "Object",
            ContainerKind::Array => "Array",
            ContainerKind::Map => "Map",
            ContainerKind::Set => "Set",
            ContainerKind::WeakMap => "WeakMap",
            ContainerKind::WeakSet => "WeakSet",
        }
    }
}

/// Which handler family observes a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Records and arrays.
    Common,
    /// Maps and sets, weak or not.
    Collection,
    /// Marked raw or not extensible: never observed.
    Invalid,
}

/// Named properties plus an optional prototype to fall back to.
#[derive(Clone, Default)]
pub struct Record {
    props: IndexMap<Rc<str>, Value>,
    proto: Option<Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proto(proto: impl Into<Value>) -> Self {
        Self {
            props: IndexMap::new(),
            proto: Some(proto.into()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Option<Value> {
        self.props.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.props.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Rc<str>> {
        self.props.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.props.iter()
    }

    pub fn proto(&self) -> Option<&Value> {
        self.proto.as_ref()
    }

    pub fn set_proto(&mut self, proto: Option<Value>) {
        self.proto = proto;
    }
}

impl<K: Into<Rc<str>>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            props: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            proto: None,
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.props.iter()).finish()
    }
}

/// Contents of a target.
#[derive(Clone)]
pub enum Container {
    Record(Record),
    Array(Vec<Value>),
    Map(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
    /// Object-keyed map whose contents cannot be enumerated.
    WeakMap(IndexMap<Value, Value>),
    /// Object-valued set whose contents cannot be enumerated.
    WeakSet(IndexSet<Value>),
}

impl Container {
    pub fn kind(&self) -> ContainerKind {
        match self {
            Container::Record(_) => ContainerKind::Record,
            Container::Array(_) => ContainerKind::Array,
            Container::Map(_) => ContainerKind::Map,
            Container::Set(_) => ContainerKind::Set,
            Container::WeakMap(_) => ContainerKind::WeakMap,
            Container::WeakSet(_) => ContainerKind::WeakSet,
        }
    }

    /// Own value stored under `key`. Records ignore their prototype.
    pub fn get(&self, key: &Value) -> Option<Value> {
        match self {
            Container::Record(record) => record.get(&property_name(key)?).cloned(),
            Container::Array(items) => match key {
                Value::Str(s) if &**s == "length" => Some(Value::from(items.len())),
                _ => items.get(array_index(key)?).cloned(),
            },
            Container::Map(map) | Container::WeakMap(map) => map.get(key).cloned(),
            Container::Set(_) | Container::WeakSet(_) => None,
        }
    }

    /// Whether `key` is an own key, or for sets a member.
    pub fn contains(&self, key: &Value) -> bool {
        match self {
            Container::Record(record) => {
                property_name(key).map_or(false, |name| record.contains_key(&name))
            }
            Container::Array(items) => array_index(key).map_or(false, |i| i < items.len()),
            Container::Map(map) | Container::WeakMap(map) => map.contains_key(key),
            Container::Set(set) | Container::WeakSet(set) => set.contains(key),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Container::Record(record) => record.len(),
            Container::Array(items) => items.len(),
            Container::Map(map) | Container::WeakMap(map) => map.len(),
            Container::Set(set) | Container::WeakSet(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Own keys in insertion order. Set members are their own keys.
    pub fn keys(&self) -> Vec<Value> {
        match self {
            Container::Record(record) => record.keys().map(|k| Value::Str(k.clone())).collect(),
            Container::Array(items) => (0..items.len()).map(Value::from).collect(),
            Container::Map(map) | Container::WeakMap(map) => map.keys().cloned().collect(),
            Container::Set(set) | Container::WeakSet(set) => set.iter().cloned().collect(),
        }
    }

    /// Own `(key, value)` pairs. Sets pair each member with itself.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        match self {
            Container::Record(record) => record
                .iter()
                .map(|(k, v)| (Value::Str(k.clone()), v.clone()))
                .collect(),
            Container::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v.clone()))
                .collect(),
            Container::Map(map) | Container::WeakMap(map) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            Container::Set(set) | Container::WeakSet(set) => {
                set.iter().map(|v| (v.clone(), v.clone())).collect()
            }
        }
    }

    /// An empty container of the same kind. Records keep their prototype.
    pub(crate) fn empty_like(&self) -> Container {
        match self {
            Container::Record(record) => Container::Record(Record {
                props: IndexMap::new(),
                proto: record.proto.clone(),
            }),
            Container::Array(_) => Container::Array(Vec::new()),
            Container::Map(_) => Container::Map(IndexMap::new()),
            Container::Set(_) => Container::Set(IndexSet::new()),
            Container::WeakMap(_) => Container::WeakMap(IndexMap::new()),
            Container::WeakSet(_) => Container::WeakSet(IndexSet::new()),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Container::Record(record) => record.fmt(f),
            Container::Array(items) => f.debug_list().entries(items).finish(),
            Container::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Container::Set(set) => f.debug_set().entries(set).finish(),
            Container::WeakMap(_) | Container::WeakSet(_) => {
                write!(f, "{} {{ <items unknown> }}", self.kind().name())
            }
        }
    }
}

fn property_name(key: &Value) -> Option<Rc<str>> {
    match key {
        Value::Str(s) => Some(s.clone()),
        Value::Number(n) => Some(Rc::from(number_key(*n))),
        Value::Bool(b) => Some(Rc::from(b.to_string())),
        Value::Null => Some(Rc::from("null")),
        _ => None,
    }
}

pub(crate) fn array_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(_) => key.as_index(),
        Value::Str(s) => {
            let index: usize = s.parse().ok()?;
            (index.to_string() == **s).then_some(index)
        }
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Target
// ----------------------------------------------------------------------------

struct TargetInner {
    id: ObjectId,
    data: RefCell<Container>,
    skip: Cell<bool>,
    extensible: Cell<bool>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        release_target(self.id);
    }
}

/// A raw container with identity.
#[derive(Clone)]
pub struct Target {
    inner: Rc<TargetInner>,
}

impl Target {
    pub fn new(container: Container) -> Self {
        Self {
            inner: Rc::new(TargetInner {
                id: ObjectId::new(),
                data: RefCell::new(container),
                skip: Cell::new(false),
                extensible: Cell::new(true),
            }),
        }
    }

    pub fn record<K: Into<Rc<str>>, V: Into<Value>>(
        props: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self::new(Container::Record(props.into_iter().collect()))
    }

    /// A record whose missing properties are looked up on `proto`.
    pub fn record_with_proto<K: Into<Rc<str>>, V: Into<Value>>(
        props: impl IntoIterator<Item = (K, V)>,
        proto: impl Into<Value>,
    ) -> Self {
        let mut record: Record = props.into_iter().collect();
        record.set_proto(Some(proto.into()));
        Self::new(Container::Record(record))
    }

    pub fn array<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::new(Container::Array(items.into_iter().map(Into::into).collect()))
    }

    pub fn map<K: Into<Value>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self::new(Container::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    pub fn set<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::new(Container::Set(items.into_iter().map(Into::into).collect()))
    }

    pub fn weak_map() -> Self {
        Self::new(Container::WeakMap(IndexMap::new()))
    }

    pub fn weak_set() -> Self {
        Self::new(Container::WeakSet(IndexSet::new()))
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn kind(&self) -> ContainerKind {
        self.inner.data.borrow().kind()
    }

    pub fn target_kind(&self) -> TargetKind {
        if self.is_marked_raw() || !self.is_extensible() {
            return TargetKind::Invalid;
        }
        if self.kind().is_collection() {
            TargetKind::Collection
        } else {
            TargetKind::Common
        }
    }

    pub fn len(&self) -> usize {
        self.inner.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the contents. Not tracked.
    pub fn with<R>(&self, f: impl FnOnce(&Container) -> R) -> R {
        f(&self.inner.data.borrow())
    }

    /// Mutate the contents. Not triggered.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Container) -> R) -> R {
        f(&mut self.inner.data.borrow_mut())
    }

    /// Exclude this target from observation.
    pub fn mark_raw(&self) -> &Self {
        self.inner.skip.set(true);
        self
    }

    pub fn is_marked_raw(&self) -> bool {
        self.inner.skip.get()
    }

    /// Forbid new keys. Non-extensible targets are never observed.
    pub fn prevent_extensions(&self) -> &Self {
        self.inner.extensible.set(false);
        self
    }

    pub fn is_extensible(&self) -> bool {
        self.inner.extensible.get()
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Plain JSON rendering of the contents.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl TrackTarget for Target {
    fn target_id(&self) -> ObjectId {
        self.id()
    }

    fn container_kind(&self) -> ContainerKind {
        self.kind()
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.data.try_borrow() {
            Ok(data) => write!(f, "{:?} {:?}", self.id(), *data),
            Err(_) => write!(f, "{:?} <borrowed>", self.id()),
        }
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let data = self.inner.data.borrow();
        match &*data {
            Container::Record(record) => {
                let mut map = serializer.serialize_map(Some(record.len()))?;
                for (key, value) in record.iter() {
                    map.serialize_entry(&**key, value)?;
                }
                map.end()
            }
            Container::Array(items) => serialize_items(serializer, items.iter(), items.len()),
            Container::Set(set) | Container::WeakSet(set) => {
                serialize_items(serializer, set.iter(), set.len())
            }
            Container::Map(map) | Container::WeakMap(map) => {
                if map.keys().all(|key| matches!(key, Value::Str(_))) {
                    let mut out = serializer.serialize_map(Some(map.len()))?;
                    for (key, value) in map {
                        out.serialize_entry(key, value)?;
                    }
                    out.end()
                } else {
                    let mut out = serializer.serialize_seq(Some(map.len()))?;
                    for entry in map {
                        out.serialize_element(&entry)?;
                    }
                    out.end()
                }
            }
        }
    }
}

fn serialize_items<'a, S: Serializer>(
    serializer: S,
    items: impl Iterator<Item = &'a Value>,
    len: usize,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(len))?;
    for item in items {
        seq.serialize_element(item)?;
    }
    seq.end()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
