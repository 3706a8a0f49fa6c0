//! The constants and cast symbol tables the parser consults
//! (`spec.md` §4.8).

use std::collections::HashMap;

use jitson_core::cell::TypeId;

use crate::stack::with_thread_stack;
use crate::value::Value;

/// Identifier → value symbol table, initialised with `true`/`false`/
/// `null` (`spec.md` §4.8). Consulted by the parser only when
/// `SourceFlags::ALLOW_CONSTS` is set; a hit is duplicated into place
/// (copied by value, not referenced — constants never need cross-run
/// references, unlike the built-in array-concatenation reference pair
/// in `spec.md` §4.4).
pub struct ConstTable {
    entries: HashMap<String, Value>,
}

impl Default for ConstTable {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ConstTable {
    pub fn with_builtins() -> Self {
        let mut table = ConstTable { entries: HashMap::new() };
        table.register("true", bool_value(true));
        table.register("false", bool_value(false));
        table.register("null", null_value());
        table
    }

    pub fn register(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Bulk-load a constants table from a parsed jitson object
    /// (`original_source/lib-sxe-jitson/sxe-jitson-const.c`,
    /// `sxe_jitson_const_initialize`): every member of `obj` becomes a
    /// named constant, in addition to `true`/`false`/`null`.
    pub fn from_object(obj: &Value) -> Self {
        let mut table = Self::with_builtins();
        if obj.get_type() == jitson_core::cell::TYPE_OBJECT {
            for (name, value) in crate::value::object_members(obj.root()) {
                table.register(name, value.to_owned_value());
            }
        }
        table
    }
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

/// A registered cast's implementation: consumes the parsed argument
/// value and the cast's registered type id, producing the replacement
/// value, or `None` on a cast error (`spec.md` §4.8, §4.5 "a registered
/// cast identifier followed by `( value )`").
pub type CastFn = fn(Value, TypeId) -> Option<Value>;

struct CastEntry {
    type_id: TypeId,
    f: CastFn,
}

/// Identifier → (type id, cast function) table.
pub struct CastTable {
    entries: HashMap<String, CastEntry>,
}

impl Default for CastTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CastTable {
    pub fn new() -> Self {
        CastTable { entries: HashMap::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, type_id: TypeId, f: CastFn) {
        self.entries.insert(name.into(), CastEntry { type_id, f });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Apply the named cast to `value`, or `None` if no such cast is
    /// registered or the cast itself rejects the value.
    pub fn apply(&self, name: &str, value: Value) -> Option<Value> {
        let entry = self.entries.get(name)?;
        (entry.f)(value, entry.type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_present_and_truthy_as_expected() {
        let table = ConstTable::with_builtins();
        assert!(table.get("true").unwrap().test());
        assert!(!table.get("false").unwrap().test());
        assert!(!table.get("null").unwrap().test());
        assert!(table.get("nope").is_none());
    }

    #[test]
    fn from_object_loads_every_member_as_a_constant() {
        use crate::stack::Stack;
        use jitson_core::cell::CellFlags;
        let mut s = Stack::new();
        s.open_object(CellFlags::empty());
        s.add_member_name("pi");
        s.add_number(3.0);
        s.add_member_name("greeting");
        s.add_string("hi");
        s.close_collection();
        let obj = s.get_jitson();

        let table = ConstTable::from_object(&obj);
        assert_eq!(table.get("pi").unwrap().root().get_number(), Some(3.0));
        assert_eq!(table.get("greeting").unwrap().root().get_string().as_deref(), Some("hi"));
        assert!(table.get("true").unwrap().test());
    }
}
