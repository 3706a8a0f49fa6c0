//! End-to-end scenarios from `spec.md` §8 "Testable Properties /
//! Concrete scenarios", exercised entirely through the public API, in
//! the style of `crates/runtime/tests/test_closures.rs`.

use jitson::operators::{register_builtins, OperatorTable};
use jitson::parser::Parser;
use jitson::source::SourceFlags;
use jitson::stack::Stack;
use jitson_core::cell::{CellFlags, TYPE_NUMBER};

fn parse(text: &str, flags: SourceFlags) -> jitson::Value {
    Parser::new(text, flags).parse().unwrap_or_else(|e| panic!("parse({text:?}) failed: {e}"))
}

#[test]
fn scenario_1_optimized_array_is_ordered_uniform_homogeneous() {
    let v = parse("[1,2,3]", SourceFlags::OPTIMIZE);
    let root = v.root();
    assert_eq!(root.len(), 3);
    let flags = root.flags();
    assert!(flags.contains(CellFlags::IS_ORD));
    assert!(flags.contains(CellFlags::IS_UNIF));
    assert!(flags.contains(CellFlags::IS_HOMO));

    let second = root.array_get_element(1).expect("element 1 exists");
    assert_eq!(second.get_type(), TYPE_NUMBER);
    assert_eq!(second.get_number(), Some(2.0));
}

#[test]
fn scenario_2_object_with_mixed_members_round_trips() {
    let v = parse(
        r#"{"a":1,"biglongname":"B","c":[2,3],"d":{"e":4},"f":true}"#,
        SourceFlags::empty(),
    );
    let root = v.root();
    assert_eq!(root.len(), 5);

    let biglongname = root.object_get_member("biglongname").expect("member present");
    assert_eq!(biglongname.get_string().as_deref(), Some("B"));

    let json = v.to_json();
    let copy = v.dup();
    let copy_json = copy.to_json();
    for member in ["\"a\"", "\"biglongname\"", "\"c\"", "\"d\"", "\"f\""] {
        assert!(json.contains(member), "missing {member} in {json}");
        assert!(copy_json.contains(member), "missing {member} in {copy_json}");
    }
}

#[test]
fn scenario_3_mk_sort_builds_increasing_array_from_reverse_pushes() {
    let mut stack = Stack::new();
    stack.open_array(CellFlags::MK_SORT, true);
    for n in (1..=32).rev() {
        stack.add_number(n as f64);
    }
    stack.close_collection();
    let v = stack.get_jitson();

    let root = v.root();
    assert!(root.flags().contains(CellFlags::IS_ORD));
    assert_eq!(root.array_get_element(0).unwrap().get_number(), Some(1.0));
    assert_eq!(root.array_get_element(31).unwrap().get_number(), Some(32.0));
}

#[test]
fn scenario_4_unicode_escape_yields_exact_utf8_bytes() {
    let v = parse(r#""€""#, SourceFlags::empty());
    let s = v.root().get_string_raw().expect("string value");
    assert_eq!(s.as_bytes(), &[0xE2, 0x82, 0xAC]);
    assert_eq!(v.root().len(), 3);
    assert_eq!(v.to_json(), "\"\u{20AC}\"");
}

#[test]
fn scenario_5_in_operator_finds_scalar_and_transitive_containment() {
    let v = parse("[0,[1,2,3],[4,5,6]]", SourceFlags::empty());

    let mut table = OperatorTable::new();
    let (in_op, _, _) = register_builtins(&mut table);

    let mut zero = Stack::new();
    zero.add_number(0.0);
    let zero = zero.get_jitson();
    let found = table.apply_binary(in_op, zero.root(), v.root()).unwrap();
    assert!(found.test());

    let mut one = Stack::new();
    one.add_number(1.0);
    let one = one.get_jitson();
    let found = table.apply_binary(in_op, one.root(), v.root()).unwrap();
    assert_eq!(found.to_json(), "[1,2,3]");
}

#[test]
fn scenario_6_intersect_and_intersect_test_agree() {
    let mut table = OperatorTable::new();
    let (_, intersect, intersect_test) = register_builtins(&mut table);

    let sort = |values: &[i64]| -> jitson::Value {
        let mut s = Stack::new();
        s.open_array(CellFlags::MK_SORT, true);
        for v in values {
            s.add_number(*v as f64);
        }
        s.close_collection();
        s.get_jitson()
    };

    let a = sort(&[1, 2, 3]);
    let b = sort(&[2, 4]);
    let result = table.apply_binary(intersect, a.root(), b.root()).unwrap();
    assert_eq!(result.to_json(), "[2.0]");

    let test_result = table.apply_binary(intersect_test, a.root(), b.root()).unwrap();
    assert!(test_result.test());

    let c = sort(&[1, 3]);
    let no_overlap = table.apply_binary(intersect_test, c.root(), b.root()).unwrap();
    assert!(!no_overlap.test());
}
