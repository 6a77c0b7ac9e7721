//! Selector-based re-render filter
//!
//! Every store notification carries the full new state. Each consumer decides
//! on its own whether that notification is worth a re-render by projecting the
//! state down to the slice it renders and comparing the result, one level
//! deep, against the slice it rendered last time.
//!
//! # Comparison rules
//!
//! | previous \ projected | scalar / mixed kinds | array          | object                  |
//! |----------------------|----------------------|----------------|-------------------------|
//! | any                  | strict identity      |                |                         |
//! | array                |                      | len + elements |                         |
//! | object               |                      |                | keys of the *new* value |
//!
//! Object comparison is asymmetric: only keys present in the new projection
//! are checked. Dropping a key while leaving the others untouched counts as
//! "unchanged".

use std::rc::Rc;

use crate::value::StateValue;

/// A consumer's projection from full state to the slice it renders
pub type Projection = Rc<dyn Fn(&StateValue) -> StateValue>;

/// Outcome of filtering one notification for one consumer
#[derive(Clone, Debug, PartialEq)]
pub enum Filtered {
    /// Keep the previously rendered value, do not re-render
    Suppress,
    /// Re-render with this derived value
    Propagate(StateValue),
}

impl Filtered {
    pub fn is_propagate(&self) -> bool {
        matches!(self, Filtered::Propagate(_))
    }
}

/// Apply an optional projection to a state snapshot
pub fn derive(projection: Option<&Projection>, state: &StateValue) -> StateValue {
    match projection {
        Some(project) => project(state),
        None => state.clone(),
    }
}

/// One-level structural comparison
///
/// Returns `true` when `next` should be considered unchanged relative to
/// `prev`. See the module docs for the rules.
pub fn shallow_equal(prev: &StateValue, next: &StateValue) -> bool {
    match (prev, next) {
        (StateValue::Array(prev_items), StateValue::Array(next_items)) => {
            prev_items.len() == next_items.len()
                && prev_items
                    .iter()
                    .zip(next_items.iter())
                    .all(|(a, b)| a.is_identical(b))
        }
        (StateValue::Object(prev_map), StateValue::Object(next_map)) => {
            next_map.iter().all(|(key, value)| {
                prev_map
                    .get(key)
                    .is_some_and(|prev_value| prev_value.is_identical(value))
            })
        }
        _ => prev.is_identical(next),
    }
}

/// Decide whether a consumer re-renders for a `(new_state, old_state)` pair
///
/// Without a projection every notification propagates the full new state.
/// With one, the projected value is compared against `prev_derived`, the value
/// the consumer last rendered. `old_state` is part of the notification
/// contract but the decision is made against what the consumer actually shows.
pub fn filter_update(
    projection: Option<&Projection>,
    prev_derived: &StateValue,
    new_state: &StateValue,
    _old_state: &StateValue,
) -> Filtered {
    let Some(project) = projection else {
        return Filtered::Propagate(new_state.clone());
    };

    let projected = project(new_state);
    if shallow_equal(prev_derived, &projected) {
        Filtered::Suppress
    } else {
        Filtered::Propagate(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(v: serde_json::Value) -> StateValue {
        StateValue::from(v)
    }

    fn project(f: impl Fn(&StateValue) -> StateValue + 'static) -> Projection {
        Rc::new(f)
    }

    #[test]
    fn test_no_projection_always_propagates() {
        let state = value(json!({ "a": 1 }));
        let result = filter_update(None, &state, &state, &state);
        assert_eq!(result, Filtered::Propagate(state));
    }

    #[test]
    fn test_scalar_projection() {
        let by_x = project(|s| s.field("x"));
        let prev = StateValue::from(1);

        let same = filter_update(Some(&by_x), &prev, &value(json!({ "x": 1, "y": 3 })), &prev);
        assert_eq!(same, Filtered::Suppress);

        let changed = filter_update(Some(&by_x), &prev, &value(json!({ "x": 2 })), &prev);
        assert!(changed.is_propagate());
        assert!(!same.is_propagate());
        assert_eq!(changed, Filtered::Propagate(StateValue::from(2)));
    }

    #[test]
    fn test_kind_change_propagates() {
        let prev = value(json!([1]));
        assert!(!shallow_equal(&prev, &value(json!({ "0": 1 }))));
        assert!(!shallow_equal(&StateValue::from(1), &value(json!([1]))));
        assert!(!shallow_equal(&StateValue::Null, &StateValue::from(false)));
    }

    #[test]
    fn test_array_elementwise() {
        let shared = value(json!({ "id": 1 }));
        let prev = StateValue::from_items([shared.clone(), StateValue::from(2)]);

        // Fresh array, same element identities
        let same = StateValue::from_items([shared.clone(), StateValue::from(2)]);
        assert!(shallow_equal(&prev, &same));

        // Structurally equal element, different allocation
        let rebuilt = StateValue::from_items([value(json!({ "id": 1 })), StateValue::from(2)]);
        assert!(!shallow_equal(&prev, &rebuilt));

        // Length change
        let longer = prev.with_pushed(3);
        assert!(!shallow_equal(&prev, &longer));

        // Order matters
        let swapped = StateValue::from_items([StateValue::from(2), shared]);
        assert!(!shallow_equal(&prev, &swapped));
    }

    #[test]
    fn test_array_is_one_level_only() {
        let prev = value(json!([[1]]));
        let next = value(json!([[1]]));
        assert!(!shallow_equal(&prev, &next));
    }

    #[test]
    fn test_object_checks_new_keys() {
        let prev = value(json!({ "a": 1, "b": 2 }));

        assert!(shallow_equal(&prev, &value(json!({ "a": 1, "b": 2 }))));
        assert!(!shallow_equal(&prev, &value(json!({ "a": 1, "b": 3 }))));
        // New key not present before
        assert!(!shallow_equal(&prev, &value(json!({ "a": 1, "b": 2, "c": 0 }))));
    }

    #[test]
    fn test_object_removed_key_is_unchanged() {
        let prev = value(json!({ "a": 1, "b": 2 }));
        let shrunk = value(json!({ "a": 1 }));
        assert!(shallow_equal(&prev, &shrunk));
        // The reverse direction is a change
        assert!(!shallow_equal(&shrunk, &prev));
    }

    #[test]
    fn test_record_projection_propagates_new_value() {
        let pick_a = project(|s| StateValue::from_entries([("a", s.field("a"))]));
        let prev = value(json!({ "a": 1 }));
        let new_state = value(json!({ "a": 5, "b": 0 }));

        match filter_update(Some(&pick_a), &prev, &new_state, &prev) {
            Filtered::Propagate(v) => assert_eq!(v, value(json!({ "a": 5 }))),
            Filtered::Suppress => panic!("changed slice was suppressed"),
        }
    }

    #[test]
    fn test_derive() {
        let state = value(json!({ "x": 7 }));
        assert!(derive(None, &state).is_identical(&state));

        let by_x = project(|s| s.field("x"));
        assert_eq!(derive(Some(&by_x), &state).as_i64(), Some(7));
    }
}
