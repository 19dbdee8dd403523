//! Dynamic values.
//!
//! `Value` is what observed containers store and hand out: primitives,
//! raw containers, observed views of containers and refs. Containers and
//! refs are compared by identity.
//!
//! Three equality relations are used:
//!
//! - `same_value`: change detection. `NaN` equals `NaN`, `+0` and `-0`
//!   differ.
//! - `same_value_zero`: collection keys and `includes`. `NaN` equals `NaN`,
//!   `+0` equals `-0`. This is the `PartialEq`/`Hash` of `Value`.
//! - `strict_equals`: `index_of`. `NaN` equals nothing.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use serde::ser::{Serialize, Serializer};

use super::observed::Observed;
use super::target::Target;
use crate::graph::ObjectId;
use crate::reactive::AnyRef;

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    /// A raw container.
    Object(Target),
    /// An observed view of a container.
    Observed(Observed),
    Ref(AnyRef),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Raw containers and observed views.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Observed(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    pub fn is_observed(&self) -> bool {
        matches!(self, Value::Observed(_))
    }

    /// A readonly observed view.
    pub fn is_readonly(&self) -> bool {
        matches!(self, Value::Observed(observed) if observed.is_readonly())
    }

    /// A shallow observed view.
    pub fn is_shallow(&self) -> bool {
        matches!(self, Value::Observed(observed) if observed.is_shallow())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as an integer, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => Some(*n as i64),
            _ => None,
        }
    }

    /// The number as an array index or length.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_SAFE_INTEGER => {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_observed(&self) -> Option<&Observed> {
        match self {
            Value::Observed(observed) => Some(observed),
            _ => None,
        }
    }

    pub fn into_observed(self) -> Option<Observed> {
        match self {
            Value::Observed(observed) => Some(observed),
            _ => None,
        }
    }

    pub fn as_any_ref(&self) -> Option<&AnyRef> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// The raw container behind an observed view, or the value itself.
    pub fn to_raw(&self) -> Value {
        match self {
            Value::Observed(observed) => Value::Object(observed.raw()),
            other => other.clone(),
        }
    }

    fn identity(&self) -> Option<ObjectId> {
        match self {
            Value::Object(target) => Some(target.id()),
            Value::Observed(observed) => Some(observed.id()),
            Value::Ref(r) => Some(r.id()),
            _ => None,
        }
    }

    fn same_non_number(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(_), Value::Object(_))
            | (Value::Observed(_), Value::Observed(_))
            | (Value::Ref(_), Value::Ref(_)) => self.identity() == other.identity(),
            _ => false,
        }
    }

    /// Identity used for change detection.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            _ => self.same_non_number(other),
        }
    }

    /// Identity used for collection keys and `includes`.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self.same_non_number(other),
        }
    }

    /// Identity used by `index_of`.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self.same_non_number(other),
        }
    }

    /// Whether replacing `old` with `self` is a change.
    pub fn has_changed(&self, old: &Value) -> bool {
        !self.same_value(old)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(target) => target.kind().name(),
            Value::Observed(observed) => observed.kind().name(),
            Value::Ref(_) => "ref",
        }
    }

    /// Plain JSON rendering. Observed views and refs are read untracked.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::Object(target) => target.to_json(),
            Value::Observed(observed) => observed.raw().to_json(),
            Value::Ref(r) => r.peek().to_json(),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Property-name rendering of a number: integers without a fraction.
pub(crate) fn number_key(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value_zero(other)
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Number(n) => {
                2u8.hash(state);
                // Keep NaN and the two zeros consistent with same_value_zero.
                let canonical = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if *n == 0.0 {
                    0.0f64.to_bits()
                } else {
                    n.to_bits()
                };
                canonical.hash(state);
            }
            Value::Str(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Value::Object(target) => {
                4u8.hash(state);
                target.id().hash(state);
            }
            Value::Observed(observed) => {
                5u8.hash(state);
                observed.id().hash(state);
            }
            Value::Ref(r) => {
                6u8.hash(state);
                r.id().hash(state);
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&number_key(*n)),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(target) => write!(f, "{target:?}"),
            Value::Observed(observed) => write!(f, "{observed:?}"),
            Value::Ref(r) => write!(f, "{r:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&number_key(*n)),
            Value::Str(s) => f.write_str(s),
            Value::Object(_) | Value::Observed(_) => write!(f, "[object {}]", self.type_name()),
            Value::Ref(_) => f.write_str("[ref]"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Object(target) => target.serialize(serializer),
            Value::Observed(observed) => observed.raw().serialize(serializer),
            Value::Ref(r) => r.peek().serialize(serializer),
        }
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

macro_rules! from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<Observed> for Value {
    fn from(observed: Observed) -> Self {
        Value::Observed(observed)
    }
}

impl From<AnyRef> for Value {
    fn from(r: AnyRef) -> Self {
        Value::Ref(r)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Object(Target::array(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(props) => Value::Object(Target::record(
                props.into_iter().map(|(key, value)| (key, Value::from(value))),
            )),
        }
    }
}
