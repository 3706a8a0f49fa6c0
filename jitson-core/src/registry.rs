//! The process-wide type registry (`spec.md` §4.2).
//!
//! User types are identified by a small integer allocated once and valid
//! for the life of the process — the registry never frees or reuses an
//! id, the same append-only, never-shrinks discipline
//! `memory_stats.rs`'s global slot table uses for per-thread stat slots.
//! A `Mutex`-guarded `Vec` is enough here: registration happens at
//! startup and rarely afterward, so there's no hot path to protect the
//! way there is for per-value indexing (`crate::cell::Collection::index`
//! uses `OnceLock` instead, for exactly that reason).

use std::sync::{Mutex, OnceLock};

use crate::cell::{TypeId, MIN_USER_TYPE};

/// A user type's registered name.
///
/// `spec.md` §4.2 asks only that a type be nameable and that a cast
/// table be able to target it by id; this registry only ever hands out
/// ids and remembers names — it does not itself carry a per-type
/// vtable (`free`/`test`/`size`/`len`/`clone`/`build_json`/`cmp`/`eq`)
/// or a `type_get_extra`/`set_extra` slot the way
/// `original_source/lib-sxe-jitson/sxe-jitson.h`'s `sxe_jitson_type`
/// does. That per-type behaviour is instead split across `jitson`'s
/// existing dispatch tables, keyed by the same `TypeId` this registry
/// hands back: `CastTable` (`crate::constants`, really `jitson::constants`)
/// owns construction, `OperatorTable` overrides own comparison/membership
/// operators, and rendering/sizing fall through the generic
/// collection-shaped path (`jitson::json::render`, `CellRef::len`/`size`)
/// rather than a per-type hook — only `to_json`'s own wrapping (e.g.
/// `range::to_json`'s `"range(...)"`) is type-specific, and that lives
/// on the registering module itself, called directly by its own code
/// rather than through a slot in this registry. A type that needs
/// `test`/`cmp`/`eq` to diverge from the default collection-shaped
/// behaviour (`range` does not: see `DESIGN.md`) has no dispatch point
/// to hook into yet — this is a known gap, not an oversight worth
/// generalising until a second extension type actually needs it.
pub struct TypeEntry {
    pub id: TypeId,
    pub name: Box<str>,
}

struct Registry {
    entries: Mutex<Vec<TypeEntry>>,
}

impl Registry {
    fn new() -> Self {
        Registry { entries: Mutex::new(Vec::new()) }
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Errors from [`register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// A type with this name is already registered.
    Duplicate,
    /// `MIN_USER_TYPE..=u16::MAX` is exhausted.
    Exhausted,
}

/// Register a new user type, returning its freshly allocated id.
///
/// Mirrors `sxe_jitson_type_register` (`original_source`): names are
/// unique process-wide, and re-registering the same name is a caller
/// bug reported as [`RegisterError::Duplicate`] rather than silently
/// returning the existing id, so a program can't accidentally alias two
/// unrelated casts onto one type slot.
pub fn register(name: &str) -> Result<TypeId, RegisterError> {
    let reg = registry();
    let mut entries = reg.entries.lock().expect("type registry poisoned");

    if entries.iter().any(|e| &*e.name == name) {
        return Err(RegisterError::Duplicate);
    }

    let next = MIN_USER_TYPE as usize + entries.len();
    if next > u16::MAX as usize {
        return Err(RegisterError::Exhausted);
    }

    let id = next as TypeId;
    crate::alloc::track_alloc();
    entries.push(TypeEntry { id, name: name.into() });
    Ok(id)
}

/// Look a registered type up by id.
pub fn lookup(id: TypeId) -> Option<Box<str>> {
    let reg = registry();
    let entries = reg.entries.lock().expect("type registry poisoned");
    entries.iter().find(|e| e.id == id).map(|e| e.name.clone())
}

/// Look a registered type up by name.
pub fn lookup_by_name(name: &str) -> Option<TypeId> {
    let reg = registry();
    let entries = reg.entries.lock().expect("type registry poisoned");
    entries.iter().find(|e| &*e.name == name).map(|e| e.id)
}

/// Number of user types registered so far.
pub fn count() -> usize {
    registry().entries.lock().expect("type registry poisoned").len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    // The registry is a single global, so tests that mutate it serialise
    // on this lock to avoid stepping on each other's names/ids.
    static TEST_LOCK: StdMutex<()> = StdMutex::new(());

    #[test]
    fn register_allocates_increasing_ids_from_min_user_type() {
        let _guard = TEST_LOCK.lock().unwrap();
        let before = count();
        let a = register(&format!("registry_test_a_{before}")).unwrap();
        let b = register(&format!("registry_test_b_{before}")).unwrap();
        assert!(a >= MIN_USER_TYPE);
        assert_eq!(b, a + 1);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let _guard = TEST_LOCK.lock().unwrap();
        let before = count();
        let name = format!("registry_test_dup_{before}");
        register(&name).unwrap();
        assert_eq!(register(&name), Err(RegisterError::Duplicate));
    }

    #[test]
    fn lookup_round_trips_name_and_id() {
        let _guard = TEST_LOCK.lock().unwrap();
        let before = count();
        let name = format!("registry_test_lookup_{before}");
        let id = register(&name).unwrap();
        assert_eq!(lookup(id).as_deref(), Some(name.as_str()));
        assert_eq!(lookup_by_name(&name), Some(id));
    }

    #[test]
    fn unknown_id_and_name_return_none() {
        let _guard = TEST_LOCK.lock().unwrap();
        assert_eq!(lookup(u16::MAX), None);
        assert_eq!(lookup_by_name("definitely_not_registered_xyz"), None);
    }
}
