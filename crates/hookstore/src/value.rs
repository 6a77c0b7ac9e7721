//! Structured state values
//!
//! [`StateValue`] is the dynamically typed value a store holds. It mirrors the
//! shape of JSON data (null, bool, number, string, array, object) but keeps
//! arrays and objects behind shared, immutable allocations. Two consequences:
//!
//! - Cloning a value is cheap and never copies nested structure.
//! - Identity is meaningful: [`StateValue::is_identical`] compares containers by
//!   allocation, which is what the selector filter uses to decide whether a
//!   projected slice actually changed.
//!
//! Values are never mutated in place. The `with_*` helpers build a new value
//! that shares every untouched child with the original.
//!
//! ```
//! use hookstore::StateValue;
//! use serde_json::json;
//!
//! let state = StateValue::from(json!({ "items": [1, 2, 3], "count": 3 }));
//! let next = state.with_field("count", 4);
//!
//! // `items` was not touched, so both states share the same array.
//! assert!(state.field("items").is_identical(&next.field("items")));
//! assert!(!state.is_identical(&next));
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Ordered key-value storage for object values
pub type ObjectMap = IndexMap<String, StateValue>;

/// The structural kind of a [`StateValue`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    /// Arrays and objects are structured; everything else is a scalar
    pub fn is_structured(self) -> bool {
        matches!(self, ValueKind::Array | ValueKind::Object)
    }
}

/// An immutable structured value held by a store
#[derive(Clone, Default)]
pub enum StateValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(Arc<Vec<StateValue>>),
    Object(Arc<ObjectMap>),
}

impl StateValue {
    /// An empty object, the default initial state of reducer stores
    pub fn object() -> Self {
        StateValue::Object(Arc::new(ObjectMap::new()))
    }

    /// Build an object from key-value pairs
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<StateValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        StateValue::Object(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Build an array from items
    pub fn from_items<V, I>(items: I) -> Self
    where
        V: Into<StateValue>,
        I: IntoIterator<Item = V>,
    {
        StateValue::Array(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            StateValue::Null => ValueKind::Null,
            StateValue::Bool(_) => ValueKind::Bool,
            StateValue::Number(_) => ValueKind::Number,
            StateValue::String(_) => ValueKind::String,
            StateValue::Array(_) => ValueKind::Array,
            StateValue::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    pub fn is_structured(&self) -> bool {
        self.kind().is_structured()
    }

    /// Strict identity
    ///
    /// Scalars compare by value (`NaN` is never identical to anything, `0.0`
    /// and `-0.0` are identical). Arrays and objects compare by allocation,
    /// so two structurally equal but separately built containers are *not*
    /// identical.
    pub fn is_identical(&self, other: &StateValue) -> bool {
        match (self, other) {
            (StateValue::Null, StateValue::Null) => true,
            (StateValue::Bool(a), StateValue::Bool(b)) => a == b,
            (StateValue::Number(a), StateValue::Number(b)) => a == b,
            (StateValue::String(a), StateValue::String(b)) => a == b,
            (StateValue::Array(a), StateValue::Array(b)) => Arc::ptr_eq(a, b),
            (StateValue::Object(a), StateValue::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64()
            .filter(|n| n.fract() == 0.0 && n.is_finite())
            .map(|n| n as i64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[StateValue]> {
        match self {
            StateValue::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectMap> {
        match self {
            StateValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Number of elements (arrays) or entries (objects); `None` for scalars
    pub fn len(&self) -> Option<usize> {
        match self {
            StateValue::Array(items) => Some(items.len()),
            StateValue::Object(map) => Some(map.len()),
            _ => None,
        }
    }

    /// Look up an object property
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Look up an object property, yielding `Null` when absent
    ///
    /// This is the usual shape of a projection: `|s| s.field("items")`.
    pub fn field(&self, key: &str) -> StateValue {
        self.get(key).cloned().unwrap_or_default()
    }

    /// Look up an array element, yielding `Null` when out of range
    pub fn at(&self, index: usize) -> StateValue {
        self.as_array()
            .and_then(|items| items.get(index))
            .cloned()
            .unwrap_or_default()
    }

    /// A copy of this object with `key` set to `value`
    ///
    /// Non-object values are treated as an empty object.
    pub fn with_field(&self, key: impl Into<String>, value: impl Into<StateValue>) -> StateValue {
        let mut map = self.as_object().cloned().unwrap_or_default();
        map.insert(key.into(), value.into());
        StateValue::Object(Arc::new(map))
    }

    /// A copy of this object without `key`
    pub fn without_field(&self, key: &str) -> StateValue {
        let mut map = self.as_object().cloned().unwrap_or_default();
        map.shift_remove(key);
        StateValue::Object(Arc::new(map))
    }

    /// A copy of this array with `value` appended
    ///
    /// Non-array values are treated as an empty array.
    pub fn with_pushed(&self, value: impl Into<StateValue>) -> StateValue {
        let mut items = self.as_array().map(<[_]>::to_vec).unwrap_or_default();
        items.push(value.into());
        StateValue::Array(Arc::new(items))
    }

    /// Convert to a `serde_json::Value` (deep copy)
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            StateValue::Null => serde_json::Value::Null,
            StateValue::Bool(b) => serde_json::Value::Bool(*b),
            StateValue::Number(n) => number_to_json(*n),
            StateValue::String(s) => serde_json::Value::String(s.to_string()),
            StateValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(StateValue::to_json).collect())
            }
            StateValue::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Largest magnitude at which every integer is exactly representable in `f64`
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Integral numbers map back to JSON integers so round trips compare equal
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        if n >= 0.0 {
            serde_json::Value::from(n as u64)
        } else {
            serde_json::Value::from(n as i64)
        }
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Deep structural equality (not identity)
impl PartialEq for StateValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StateValue::Null, StateValue::Null) => true,
            (StateValue::Bool(a), StateValue::Bool(b)) => a == b,
            (StateValue::Number(a), StateValue::Number(b)) => a == b,
            (StateValue::String(a), StateValue::String(b)) => a == b,
            (StateValue::Array(a), StateValue::Array(b)) => Arc::ptr_eq(a, b) || a == b,
            (StateValue::Object(a), StateValue::Object(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Null => f.write_str("null"),
            StateValue::Bool(b) => write!(f, "{b}"),
            StateValue::Number(n) => write!(f, "{n}"),
            StateValue::String(s) => write!(f, "{s:?}"),
            StateValue::Array(items) => f.debug_list().entries(items.iter()).finish(),
            StateValue::Object(map) => f.debug_map().entries(map.iter()).finish(),
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions
// ─────────────────────────────────────────────────────────────────────────────

impl From<serde_json::Value> for StateValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => StateValue::Null,
            serde_json::Value::Bool(b) => StateValue::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(StateValue::Number).unwrap_or_default(),
            serde_json::Value::String(s) => StateValue::String(s.into()),
            serde_json::Value::Array(items) => StateValue::from_items(items),
            serde_json::Value::Object(map) => StateValue::from_entries(map),
        }
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        StateValue::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for StateValue {
                fn from(n: $ty) -> Self {
                    StateValue::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::String(s.into())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        StateValue::String(s.into())
    }
}

impl From<Vec<StateValue>> for StateValue {
    fn from(items: Vec<StateValue>) -> Self {
        StateValue::Array(Arc::new(items))
    }
}

impl From<ObjectMap> for StateValue {
    fn from(map: ObjectMap) -> Self {
        StateValue::Object(Arc::new(map))
    }
}

impl Serialize for StateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StateValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(StateValue::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_identity() {
        assert!(StateValue::from(1).is_identical(&StateValue::from(1.0)));
        assert!(StateValue::from("a").is_identical(&StateValue::from("a")));
        assert!(StateValue::Null.is_identical(&StateValue::Null));
        assert!(StateValue::from(0.0).is_identical(&StateValue::from(-0.0)));
        assert!(!StateValue::from(f64::NAN).is_identical(&StateValue::from(f64::NAN)));
        assert!(!StateValue::from(1).is_identical(&StateValue::from("1")));
        assert!(!StateValue::Null.is_identical(&StateValue::from(false)));
    }

    #[test]
    fn test_structured_kinds() {
        assert!(StateValue::from(json!([1])).is_structured());
        assert!(StateValue::object().is_structured());
        assert!(!StateValue::from("a").is_structured());
        assert!(!StateValue::Null.is_structured());
        assert!(ValueKind::Object.is_structured());
        assert!(!ValueKind::Number.is_structured());
    }

    #[test]
    fn test_container_identity_is_by_allocation() {
        let a = StateValue::from(json!([1, 2]));
        let b = StateValue::from(json!([1, 2]));

        assert!(a.is_identical(&a.clone()));
        assert!(!a.is_identical(&b));
        // Structural equality still holds
        assert_eq!(a, b);
    }

    #[test]
    fn test_with_field_shares_children() {
        let state = StateValue::from(json!({ "items": [1, 2], "n": 0 }));
        let next = state.with_field("n", 1);

        assert_eq!(next.field("n").as_i64(), Some(1));
        assert_eq!(state.field("n").as_i64(), Some(0));
        assert!(next.field("items").is_identical(&state.field("items")));
        assert!(!next.is_identical(&state));
    }

    #[test]
    fn test_without_field_and_push() {
        let state = StateValue::from(json!({ "a": 1, "b": 2 }));
        let smaller = state.without_field("a");
        assert_eq!(smaller.len(), Some(1));
        assert!(smaller.get("a").is_none());

        let list = StateValue::from(json!([1]));
        let longer = list.with_pushed("x");
        assert_eq!(longer.len(), Some(2));
        assert_eq!(longer.at(1).as_str(), Some("x"));
        assert_eq!(list.len(), Some(1));
    }

    #[test]
    fn test_missing_lookups_are_null() {
        let state = StateValue::from(json!({ "a": [1] }));
        assert!(state.field("missing").is_null());
        assert!(state.field("a").at(5).is_null());
        assert!(StateValue::from(3).field("a").is_null());
    }

    #[test]
    fn test_json_conversion() {
        let source = json!({ "x": 1, "tags": ["a", "b"], "on": true, "none": null });
        let value = StateValue::from(source.clone());

        assert_eq!(value.kind(), ValueKind::Object);
        assert_eq!(value.to_json(), source);
        assert_eq!(serde_json::to_value(&value).unwrap(), source);

        let parsed: StateValue = serde_json::from_value(source).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_numbers_to_json() {
        assert_eq!(StateValue::from(3).to_json(), json!(3));
        assert_eq!(StateValue::from(-2).to_json(), json!(-2));
        assert_eq!(StateValue::from(1.5).to_json(), json!(1.5));
        assert_eq!(StateValue::from(f64::NAN).to_json(), json!(null));
    }

    #[test]
    fn test_object_keeps_insertion_order() {
        let value = StateValue::from_entries([("z", 1), ("a", 2), ("m", 3)]);
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
