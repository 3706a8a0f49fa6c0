//! Operator dispatch (`spec.md` §4.7): a named, arity-tagged dispatch
//! point with a default implementation and a per-type override table.
//!
//! Grounded on the sparse-override-table design note in `spec.md` §9
//! ("a port may use a dense `Vec<Option<fn>>` indexed by type id, grown
//! when a new type is registered") — `OperatorDef::overrides` is exactly
//! that `Vec`.

use std::cmp::Ordering;

use jitson_core::cell::{TYPE_ARRAY, TYPE_OBJECT, TYPE_STRING};

use crate::stack::with_thread_stack;
use crate::value::{CellRef, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Unary,
    Binary,
}

/// Which operand's (dereferenced) type id selects an override
/// (`spec.md` §4.7: "dispatch on the left or the right operand").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchSide {
    Left,
    Right,
}

pub type BinaryFn = fn(CellRef<'_>, CellRef<'_>) -> Option<Value>;

struct OperatorDef {
    name: &'static str,
    arity: Arity,
    dispatch: DispatchSide,
    default_impl: Option<BinaryFn>,
    overrides: Vec<Option<BinaryFn>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorError {
    /// Neither an override for the dispatch operand's type nor a
    /// default implementation exists (`spec.md` §7, "type error").
    NoImplementation,
}

pub struct OperatorTable {
    ops: Vec<OperatorDef>,
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorTable {
    pub fn new() -> Self {
        OperatorTable { ops: Vec::new() }
    }

    /// Register a new binary operator, returning its id.
    pub fn register_binary(
        &mut self,
        name: &'static str,
        dispatch: DispatchSide,
        default_impl: Option<BinaryFn>,
    ) -> u32 {
        self.ops.push(OperatorDef { name, arity: Arity::Binary, dispatch, default_impl, overrides: Vec::new() });
        (self.ops.len() - 1) as u32
    }

    /// Install an override for `type_id`, replacing the default for
    /// that type (`spec.md` §4.7).
    pub fn add_override(&mut self, op: u32, type_id: u16, f: BinaryFn) {
        let def = &mut self.ops[op as usize];
        let idx = type_id as usize;
        if def.overrides.len() <= idx {
            def.overrides.resize(idx + 1, None);
        }
        def.overrides[idx] = Some(f);
    }

    pub fn name(&self, op: u32) -> &'static str {
        self.ops[op as usize].name
    }

    pub fn dispatch_side(&self, op: u32) -> DispatchSide {
        self.ops[op as usize].dispatch
    }

    /// Apply a binary operator: look up the override for the dispatch
    /// operand's dereferenced type, falling back to the default.
    pub fn apply_binary(
        &self,
        op: u32,
        left: CellRef<'_>,
        right: CellRef<'_>,
    ) -> Result<Value, OperatorError> {
        let def = &self.ops[op as usize];
        debug_assert_eq!(def.arity, Arity::Binary);
        let dispatch_type = match def.dispatch {
            DispatchSide::Left => left.get_type(),
            DispatchSide::Right => right.get_type(),
        } as usize;

        let f = def
            .overrides
            .get(dispatch_type)
            .copied()
            .flatten()
            .or(def.default_impl)
            .ok_or(OperatorError::NoImplementation)?;
        f(left, right).ok_or(OperatorError::NoImplementation)
    }
}

/// Register the three standard operators (`spec.md` §4.7): `IN`,
/// `INTERSECT`, `INTERSECT_TEST`, all dispatching on the right operand.
pub fn register_builtins(table: &mut OperatorTable) -> (u32, u32, u32) {
    let in_op = table.register_binary("IN", DispatchSide::Right, Some(op_in));
    let intersect = table.register_binary("INTERSECT", DispatchSide::Right, Some(op_intersect));
    let intersect_test = table.register_binary("INTERSECT_TEST", DispatchSide::Right, Some(op_intersect_test));
    (in_op, intersect, intersect_test)
}

fn op_in(left: CellRef<'_>, right: CellRef<'_>) -> Option<Value> {
    let right = right.dereferenced();
    match right.get_type() {
        TYPE_STRING => {
            let needle = left.get_string()?;
            let haystack = right.get_string_raw()?;
            Some(bool_value(haystack.contains(&needle)))
        }
        TYPE_OBJECT => {
            let key = left.get_string()?;
            match right.object_get_member(&key) {
                Some(v) => Some(dup_cellref(v)),
                None => Some(null_value()),
            }
        }
        TYPE_ARRAY => Some(array_membership(left, right)),
        _ => None,
    }
}

fn array_membership(left: CellRef<'_>, array: CellRef<'_>) -> Value {
    let count = array.len() as usize;
    // O(log n) path: ordered, homogeneous with a matching left type.
    if count > 0 {
        if let Some(first) = array.array_get_element(0) {
            if is_ordered(array) && first.get_type() == left.get_type() {
                if let Some(found) = binary_search_array(left, array, count) {
                    return dup_cellref(found);
                }
                return null_value();
            }
        }
    }
    // Linear, transitively-searching fallback.
    for i in 0..count {
        let elem = array.array_get_element(i).expect("index within len()");
        if elem.eq(&left) {
            return bool_value(true);
        }
        if matches!(elem.get_type(), TYPE_ARRAY | TYPE_OBJECT) {
            if let Some(v) = op_in(left, elem) {
                if v.test() {
                    // Transitive containment reports the containing
                    // element, not the nested match itself (`spec.md`
                    // §8 scenario 5: `1 IN [0,[1,2,3],[4,5,6]]` yields
                    // the inner array, not `true`).
                    return dup_cellref(elem);
                }
            }
        }
    }
    null_value()
}

fn is_ordered(array: CellRef<'_>) -> bool {
    array.flags().contains(jitson_core::cell::CellFlags::IS_ORD)
}

fn binary_search_array<'a>(key: CellRef<'_>, array: CellRef<'a>, count: usize) -> Option<CellRef<'a>> {
    let mut lo = 0usize;
    let mut hi = count;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let elem = array.array_get_element(mid)?;
        match elem.cmp(&key)? {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => return Some(elem),
        }
    }
    None
}

fn op_intersect(left: CellRef<'_>, right: CellRef<'_>) -> Option<Value> {
    if left.get_type() != TYPE_ARRAY || right.get_type() != TYPE_ARRAY {
        return None;
    }
    // Collect the matches first: `copy_into_stack` below needs the
    // thread-local stack borrowed exclusively for the whole build, and
    // the visitor here only ever reads `left`/`right`, so there is no
    // need to hold that borrow while walking both arrays.
    let mut matches = Vec::new();
    for_each_intersection(left, right, |elem| {
        matches.push(elem);
        true
    });
    Some(with_thread_stack(|stack| {
        let mark = stack.borrow();
        stack.open_array(jitson_core::cell::CellFlags::empty(), false);
        for elem in matches {
            crate::value::copy_into_stack(stack, elem);
        }
        stack.close_collection();
        stack.return_borrow(mark)
    }))
}

fn op_intersect_test(left: CellRef<'_>, right: CellRef<'_>) -> Option<Value> {
    if left.get_type() != TYPE_ARRAY || right.get_type() != TYPE_ARRAY {
        return None;
    }
    let mut any = false;
    for_each_intersection(left, right, |_| {
        any = true;
        false
    });
    Some(bool_value(any))
}

/// Visit every element present (by `eq`) in both arrays. Both sides are
/// nested-loop compared; ordered inputs would use the sorted-array
/// median-split algorithm (`spec.md` §4.1), which this mirrors logically
/// without needing the arrays to be built from fixed-size records the
/// way `jitson_core::sorted_array` requires.
fn for_each_intersection(left: CellRef<'_>, right: CellRef<'_>, mut visit: impl FnMut(CellRef<'_>) -> bool) {
    let left_count = left.len() as usize;
    let right_count = right.len() as usize;
    for i in 0..left_count {
        let l = left.array_get_element(i).expect("index within len()");
        for j in 0..right_count {
            let r = right.array_get_element(j).expect("index within len()");
            if l.eq(&r) {
                if !visit(l) {
                    return;
                }
                break;
            }
        }
    }
}

fn dup_cellref(v: CellRef<'_>) -> Value {
    v.to_owned_value()
}

fn bool_value(b: bool) -> Value {
    with_thread_stack(|stack| {
        let mark = stack.borrow();
        stack.add_bool(b);
        stack.return_borrow(mark)
    })
}

fn null_value() -> Value {
    with_thread_stack(|stack| {
        let mark = stack.borrow();
        stack.add_null();
        stack.return_borrow(mark)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::Stack;
    use jitson_core::cell::CellFlags;

    fn sorted_array(values: &[i64]) -> Value {
        let mut s = Stack::new();
        s.open_array(CellFlags::MK_SORT, true);
        for v in values {
            s.add_number(*v as f64);
        }
        s.close_collection();
        s.get_jitson()
    }

    #[test]
    fn in_string_is_substring_search() {
        let mut table = OperatorTable::new();
        let (in_op, _, _) = register_builtins(&mut table);
        let mut hs = Stack::new();
        hs.add_string("hello world");
        let haystack = hs.get_jitson();
        let mut ns = Stack::new();
        ns.add_string("wor");
        let needle = ns.get_jitson();
        let result = table.apply_binary(in_op, needle.root(), haystack.root()).unwrap();
        assert!(result.test());
    }

    #[test]
    fn in_array_transitive_containment() {
        let mut table = OperatorTable::new();
        let (in_op, _, _) = register_builtins(&mut table);
        let mut s = Stack::new();
        s.open_array(CellFlags::empty(), false);
        s.add_number(0.0);
        s.open_array(CellFlags::empty(), false);
        s.add_number(1.0);
        s.add_number(2.0);
        s.add_number(3.0);
        s.close_collection();
        s.close_collection();
        let v = s.get_jitson();

        let mut one = Stack::new();
        one.add_number(1.0);
        let needle = one.get_jitson();
        let result = table.apply_binary(in_op, needle.root(), v.root()).unwrap();
        assert!(result.test());
    }

    #[test]
    fn intersect_and_intersect_test_agree() {
        let mut table = OperatorTable::new();
        let (_, intersect, intersect_test) = register_builtins(&mut table);
        let a = sorted_array(&[1, 2, 3]);
        let b = sorted_array(&[2, 4]);

        let result = table.apply_binary(intersect, a.root(), b.root()).unwrap();
        assert_eq!(result.root().len(), 1);

        let test_result = table.apply_binary(intersect_test, a.root(), b.root()).unwrap();
        assert!(test_result.test());

        let c = sorted_array(&[1, 3]);
        let no_overlap = table.apply_binary(intersect_test, c.root(), b.root()).unwrap();
        assert!(!no_overlap.test());
    }
}
