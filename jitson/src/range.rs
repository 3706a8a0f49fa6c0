//! The `range` pseudo-type: a supplemented feature (not in the
//! distilled spec) carried over from
//! `original_source/lib-sxe-jitson/sxe-jitson-range.c`.
//!
//! A range is exactly a two-element ordered array with its type tag
//! relabelled, "all the same flags" per the original's comment — so
//! construction is a cast, not a new collection kind: validate, dup the
//! array, overwrite the root cell's type id.

use std::cmp::Ordering;

use jitson_core::cell::{TypeId, TYPE_ARRAY};
use jitson_core::registry::{self, RegisterError};

use crate::operators::{DispatchSide, OperatorTable};
use crate::stack::with_thread_stack;
use crate::value::{CellRef, Value};

/// Register the `range` type with the process-wide type registry.
/// Idempotent the way `sxe_jitson_range_register` is meant to be called
/// once at startup; callers that need repeat-safety should cache the
/// returned id themselves.
pub fn register_type() -> Result<TypeId, RegisterError> {
    registry::register("range")
}

/// `spec.md` §4.8 cast group: validate `value` is a two-element array
/// ordered `elem[0] <= elem[1]`, then relabel a dup of it to `range_type`.
/// Matches the `CastFn` signature (`crate::constants::CastFn`) so it can
/// be registered directly into a `CastTable`.
pub fn cast(value: Value, range_type: TypeId) -> Option<Value> {
    let root = value.root();
    if root.get_type() != TYPE_ARRAY || root.len() != 2 {
        return None;
    }
    let from = root.array_get_element(0)?;
    let to = root.array_get_element(1)?;
    match from.cmp(&to)? {
        Ordering::Less | Ordering::Equal => {}
        Ordering::Greater => return None,
    }

    let mut range = value.dup();
    range.retag_root(range_type);
    Some(range)
}

/// Build a range value directly from two cell refs, the builder-side
/// convenience `sxe_jitson_stack_add_range` provides in the original.
pub fn build(range_type: TypeId, from: CellRef<'_>, to: CellRef<'_>) -> Option<Value> {
    match from.cmp(&to)? {
        Ordering::Less | Ordering::Equal => {}
        Ordering::Greater => return None,
    }
    let mut range = with_thread_stack(|stack| {
        let mark = stack.borrow();
        stack.open_array(jitson_core::cell::CellFlags::empty(), false);
        stack.add_dup(&from.to_owned_value());
        stack.add_dup(&to.to_owned_value());
        stack.close_collection();
        stack.return_borrow(mark)
    });
    range.retag_root(range_type);
    Some(range)
}

/// Ranges always test true for evaluation purposes (`sxe-jitson-range.c`
/// `sxe_jitson_range_test`'s comment, preserved verbatim as behaviour).
pub fn test(_range: CellRef<'_>) -> bool {
    true
}

/// Render as `range(` + the backing array's JSON + `)`
/// (`sxe_jitson_range_build_json`).
pub fn to_json(range: CellRef<'_>) -> String {
    format!("range({})", crate::json::to_json(range))
}

/// The `IN` operator override for the range type
/// (`sxe_jitson_range_in`): `value IN range` is true when
/// `range[0] <= value <= range[1]`, else the null value (never `false`
/// — a type mismatch or out-of-range both fall through to null, per the
/// original's "not in range" vs. "not comparable" conflation).
pub fn in_override(value: CellRef<'_>, range: CellRef<'_>) -> Option<Value> {
    let lo = range.array_get_element(0)?;
    let hi = range.array_get_element(1)?;
    let in_range = matches!(value.cmp(&lo)?, Ordering::Greater | Ordering::Equal)
        && matches!(value.cmp(&hi)?, Ordering::Less | Ordering::Equal);
    let result = with_thread_stack(|stack| {
        let mark = stack.borrow();
        if in_range {
            stack.add_bool(true);
        } else {
            stack.add_null();
        }
        stack.return_borrow(mark)
    });
    Some(result)
}

/// Install the `IN` override for `range_type` into `table`.
pub fn register_in_override(table: &mut OperatorTable, in_op: u32, range_type: TypeId) {
    debug_assert_eq!(table.dispatch_side(in_op), DispatchSide::Right);
    table.add_override(in_op, range_type, in_override);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::register_builtins;
    use crate::stack::Stack;

    fn two_element_array(a: f64, b: f64) -> Value {
        let mut s = Stack::new();
        s.open_array(jitson_core::cell::CellFlags::empty(), false);
        s.add_number(a);
        s.add_number(b);
        s.close_collection();
        s.get_jitson()
    }

    #[test]
    fn cast_rejects_unordered_or_wrong_length() {
        let range_type = 9001;
        assert!(cast(two_element_array(5.0, 1.0), range_type).is_none());

        let mut s = Stack::new();
        s.open_array(jitson_core::cell::CellFlags::empty(), false);
        s.add_number(1.0);
        s.close_collection();
        let one_elem = s.get_jitson();
        assert!(cast(one_elem, range_type).is_none());
    }

    #[test]
    fn cast_relabels_type_and_keeps_bounds() {
        let range_type = 9001;
        let r = cast(two_element_array(1.0, 5.0), range_type).unwrap();
        assert_eq!(r.get_type(), range_type);
        assert_eq!(r.root().array_get_element(0).unwrap().get_number(), Some(1.0));
        assert_eq!(r.root().array_get_element(1).unwrap().get_number(), Some(5.0));
    }

    #[test]
    fn test_is_always_true() {
        let r = cast(two_element_array(1.0, 5.0), 9001).unwrap();
        assert!(test(r.root()));
    }

    #[test]
    fn to_json_wraps_array_json() {
        let r = cast(two_element_array(1.0, 5.0), 9001).unwrap();
        assert_eq!(to_json(r.root()), "range([1.0,5.0])");
    }

    #[test]
    fn in_override_bounds_checks_inclusively() {
        let range_type = 9001;
        let r = cast(two_element_array(1.0, 5.0), range_type).unwrap();

        let mut table = OperatorTable::new();
        let (in_op, _, _) = register_builtins(&mut table);
        register_in_override(&mut table, in_op, range_type);

        let mut s = Stack::new();
        s.add_number(1.0);
        let lower_bound = s.get_jitson();
        let inside = table.apply_binary(in_op, lower_bound.root(), r.root()).unwrap();
        assert!(inside.test());

        let mut s2 = Stack::new();
        s2.add_number(6.0);
        let outside_val = s2.get_jitson();
        let outside = table.apply_binary(in_op, outside_val.root(), r.root()).unwrap();
        assert!(!outside.test());
    }
}
