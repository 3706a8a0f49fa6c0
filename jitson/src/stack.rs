//! The per-thread growable cell buffer (`spec.md` §4.4) — the only
//! place cells are produced, whether by the parser or by a caller
//! building a value programmatically.
//!
//! Grounded on `crates/core/src/tagged_stack.rs`'s `TaggedStack`: a
//! growable buffer of fixed-size records with amortised doubling
//! growth and a high-water-mark "borrow" mechanism, generalised here
//! from `StackValue` records to `jitson_core::cell::Cell`s and from a
//! flat append-only stack to one that tracks nested open collections.
//!
//! One simplification from the C original: rather than threading the
//! enclosing-collection link and incremental order/homogeneity
//! bookkeeping through the open collection's own cell payload (the C
//! `partial` union, which exists purely to avoid a second allocation
//! under a 16-byte budget), this keeps an explicit `Vec<OpenFrame>`
//! construction-state stack on `Stack` itself. Rust has no byte-budget
//! pressure forcing that reuse, and a plain `Vec` is both clearer and
//! just as cheap — see `DESIGN.md`.

use std::cmp::Ordering;

use jitson_core::cell::{
    Cell, CellFlags, Collection, Partial, RefTarget, TypeId, TYPE_ARRAY, TYPE_BOOL, TYPE_NULL,
    TYPE_NUMBER, TYPE_OBJECT, TYPE_REFERENCE, TYPE_STRING,
};

use crate::value::Value;

/// Contract violations (`spec.md` §7): "using an operator before
/// registering, closing a collection that isn't open, requesting
/// `get_jitson` with an open collection, adding a value where a key is
/// expected" — these fail loudly rather than return a `Result`, since a
/// well-behaved caller never triggers them.
fn bug(msg: &str) -> ! {
    panic!("jitson stack contract violation: {msg}")
}

struct OpenFrame {
    cell_index: usize,
    type_id: TypeId,
    count: u32,
    elem_type: Option<TypeId>,
    elem_span: Option<u32>,
    ordered: bool,
    last_value_start: Option<usize>,
    awaiting_value: bool,
    optimize: bool,
    mk_sort: bool,
}

impl OpenFrame {
    fn new(cell_index: usize, type_id: TypeId, optimize: bool, mk_sort: bool) -> Self {
        OpenFrame {
            cell_index,
            type_id,
            count: 0,
            elem_type: None,
            elem_span: None,
            ordered: true,
            last_value_start: None,
            awaiting_value: false,
            optimize,
            mk_sort,
        }
    }
}

pub struct Stack {
    cells: Vec<Cell>,
    open: Vec<OpenFrame>,
    borrow_mark: Option<usize>,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    pub fn new() -> Self {
        Stack { cells: Vec::new(), open: Vec::new(), borrow_mark: None }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_open(&self) -> bool {
        !self.open.is_empty()
    }

    pub(crate) fn cells(&self) -> &[Cell] {
        &self.cells
    }

    fn push(&mut self, cell: Cell) -> usize {
        if self.cells.len() == self.cells.capacity() {
            jitson_core::alloc::track_alloc();
        }
        let idx = self.cells.len();
        self.cells.push(cell);
        idx
    }

    /// Record that a value of `(type_id, span)` cells was just appended
    /// to the innermost open collection, updating its running
    /// homogeneity/uniformity/order flags. Does nothing if nothing is
    /// open (a root-level scalar/collection needs no bookkeeping).
    fn note_value_added(&mut self, type_id: TypeId, span: u32, value_start: usize) {
        let Some(frame) = self.open.last_mut() else { return };
        frame.count += 1;

        match frame.elem_type {
            None => frame.elem_type = Some(type_id),
            Some(t) if t == type_id => {}
            Some(_) => frame.elem_type = None,
        }
        match frame.elem_span {
            None if frame.count == 1 => frame.elem_span = Some(span),
            Some(s) if s == span => {}
            _ => frame.elem_span = None,
        }

        if frame.mk_sort {
            // A correctly maintained MK_SORT build is ordered by
            // construction; tracking it via a last-vs-current
            // comparison would misfire since sorted insertion shifts
            // earlier cells' positions (unlike an append-only build).
            frame.last_value_start = Some(value_start);
        } else if frame.optimize && frame.ordered {
            if let Some(prev_start) = frame.last_value_start {
                let is_scalar_homogeneous =
                    frame.elem_type.is_some() && matches!(type_id, TYPE_NUMBER | TYPE_STRING | TYPE_BOOL);
                if !is_scalar_homogeneous {
                    frame.ordered = false;
                } else {
                    match scalar_cmp(&self.cells, prev_start, value_start) {
                        Some(Ordering::Less | Ordering::Equal) => {}
                        _ => frame.ordered = false,
                    }
                }
            }
        }
        frame.last_value_start = Some(value_start);
    }

    fn current_array_frame(&self) -> bool {
        matches!(self.open.last(), Some(f) if f.type_id == TYPE_ARRAY)
    }

    /// Open a new array collection. If another collection is already
    /// open, the array-to-be is registered as a value inside it once
    /// closed, not at open time (the span isn't known yet).
    pub fn open_array(&mut self, flags: CellFlags, optimize: bool) {
        let mk_sort = flags.contains(CellFlags::MK_SORT);
        let parent = self.open.last().map(|f| (f.cell_index + 1) as u32).unwrap_or(0);
        let idx = self.push(Cell {
            type_id: TYPE_ARRAY,
            flags,
            len: 0,
            payload: Partial::Array { collection: parent, last: None }.into_payload(),
        });
        self.open.push(OpenFrame::new(idx, TYPE_ARRAY, optimize, mk_sort));
    }

    pub fn open_object(&mut self, flags: CellFlags) {
        let parent = self.open.last().map(|f| (f.cell_index + 1) as u32).unwrap_or(0);
        let idx = self.push(Cell {
            type_id: TYPE_OBJECT,
            flags,
            len: 0,
            payload: Partial::Object { collection: parent, awaiting_value: false }.into_payload(),
        });
        self.open.push(OpenFrame::new(idx, TYPE_OBJECT, false, false));
    }

    /// Finalise the innermost open collection: compute the cell-run
    /// span and, if uniform, the per-element span, then register the
    /// now-closed collection as a value in the (now) innermost
    /// remaining open collection, if any.
    pub fn close_collection(&mut self) {
        let Some(frame) = self.open.pop() else { bug("close_collection with nothing open") };
        let span = (self.cells.len() - frame.cell_index) as u32;

        let mut flags = self.cells[frame.cell_index].flags;
        if frame.optimize {
            flags.set(CellFlags::IS_HOMO, frame.elem_type.is_some());
            flags.set(CellFlags::IS_UNIF, frame.elem_span.is_some());
            // Single-element or empty arrays are reported as not
            // ordered (spec.md §4.5).
            flags.set(CellFlags::IS_ORD, frame.ordered && frame.count > 1);
        }

        let mut collection = Collection::new(span);
        collection.uniform_type = frame.elem_type;
        if flags.contains(CellFlags::IS_UNIF) {
            collection.uniform_elem_span = frame.elem_span;
        }
        self.cells[frame.cell_index].flags = flags;
        self.cells[frame.cell_index].len = frame.count;
        self.cells[frame.cell_index].payload = jitson_core::cell::Payload::Collection(collection);

        self.note_value_added(frame.type_id, span, frame.cell_index);
    }

    pub fn add_null(&mut self) {
        self.check_not_awaiting_key_value_mismatch();
        let start = self.push(Cell::null());
        self.note_value_added(TYPE_NULL, 1, start);
        self.after_value_in_object();
    }

    pub fn add_bool(&mut self, b: bool) {
        self.check_not_awaiting_key_value_mismatch();
        let start = self.push(Cell::bool(b));
        self.note_value_added(TYPE_BOOL, 1, start);
        self.after_value_in_object();
    }

    pub fn add_number(&mut self, n: f64) {
        self.check_not_awaiting_key_value_mismatch();
        let start = if self.current_array_frame() && self.mk_sort_active() {
            self.insert_sorted_number(n)
        } else {
            self.push(Cell::number(n))
        };
        self.note_value_added(TYPE_NUMBER, 1, start);
        self.after_value_in_object();
    }

    pub fn add_uint(&mut self, n: u64) {
        self.check_not_awaiting_key_value_mismatch();
        let start = self.push(Cell::uint(n));
        self.note_value_added(TYPE_NUMBER, 1, start);
        self.after_value_in_object();
    }

    pub fn add_string(&mut self, s: &str) {
        self.check_not_awaiting_key_value_mismatch();
        let start = self.push(Cell::string_owned(s));
        self.note_value_added(TYPE_STRING, 1, start);
        self.after_value_in_object();
    }

    /// Push a string with its bytes reversed in place, setting the
    /// `REVERSED` flag (`spec.md` §4.4). Used by callers building
    /// reverse-sorted indexes on purpose.
    pub fn add_string_reversed(&mut self, s: &str) {
        self.check_not_awaiting_key_value_mismatch();
        let reversed: String = s.chars().rev().collect();
        let mut cell = Cell::string_owned(reversed);
        cell.flags |= CellFlags::REVERSED;
        let start = self.push(cell);
        self.note_value_added(TYPE_STRING, 1, start);
        self.after_value_in_object();
    }

    pub fn add_reference(&mut self, target_offset: u32) {
        self.check_not_awaiting_key_value_mismatch();
        let start = self.push(Cell {
            type_id: TYPE_REFERENCE,
            flags: CellFlags::empty(),
            len: 1,
            payload: jitson_core::cell::Payload::Reference(RefTarget { offset: target_offset }),
        });
        self.note_value_added(TYPE_REFERENCE, 1, start);
        self.after_value_in_object();
    }

    /// Push a member key string, marked `IS_KEY` (`spec.md` §4.4). Only
    /// valid when the innermost open collection is an object awaiting a
    /// key.
    pub fn add_member_name(&mut self, name: &str) {
        match self.open.last() {
            Some(f) if f.type_id == TYPE_OBJECT && !f.awaiting_value => {}
            Some(f) if f.type_id == TYPE_OBJECT => bug("add_member_name while awaiting a value"),
            _ => bug("add_member_name outside an open object"),
        }
        self.push(Cell::key_owned(name));
        self.open.last_mut().unwrap().awaiting_value = true;
    }

    /// Copy the contents of `value` onto the stack as a new value
    /// (`spec.md`'s `add_dup`). Implemented as a structural clone rather
    /// than a raw `memcpy`-with-fixups, since cloning an `enum` payload
    /// is the natural Rust equivalent.
    pub fn add_dup(&mut self, value: &Value) {
        self.check_not_awaiting_key_value_mismatch();
        let start = self.cells.len();
        for cell in value.cells() {
            self.push(crate::value::clone_cell(cell));
        }
        let span = (self.cells.len() - start) as u32;
        self.note_value_added(value.cells()[0].type_id, span, start);
        self.after_value_in_object();
    }

    fn check_not_awaiting_key_value_mismatch(&self) {
        if let Some(f) = self.open.last() {
            if f.type_id == TYPE_OBJECT && !f.awaiting_value {
                bug("adding a value where a member key is expected");
            }
        }
    }

    fn after_value_in_object(&mut self) {
        if let Some(f) = self.open.last_mut() {
            if f.type_id == TYPE_OBJECT {
                f.awaiting_value = false;
            }
        }
    }

    fn mk_sort_active(&self) -> bool {
        matches!(self.open.last(), Some(f) if f.mk_sort)
    }

    /// Binary-search insertion of a number into the already-built prefix
    /// of the innermost open array (`spec.md` §4.4, `MK_SORT`). Requires
    /// the array to contain only number cells so far — a contract
    /// violation otherwise (non-uniform-sized sorted build).
    fn insert_sorted_number(&mut self, n: f64) -> usize {
        let frame_start = self.open.last().unwrap().cell_index + 1;
        let mut lo = frame_start;
        let mut hi = self.cells.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let existing = match &self.cells[mid].payload {
                jitson_core::cell::Payload::Number(v) => *v,
                _ => bug("MK_SORT array built from non-uniform-sized elements"),
            };
            if existing < n {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        self.cells.insert(lo, Cell::number(n));
        jitson_core::alloc::track_alloc();
        lo
    }

    /// Reserve a tail segment for nested, throwaway construction
    /// (`spec.md` §4.4 `borrow`/`return`). Only one borrow may be
    /// outstanding at a time.
    pub fn borrow(&mut self) -> usize {
        if self.borrow_mark.is_some() {
            bug("stack already borrowed");
        }
        let mark = self.cells.len();
        self.borrow_mark = Some(mark);
        mark
    }

    /// Copy the cells pushed since `mark` into a fresh [`Value`] and
    /// rewind the stack to `mark`.
    pub fn return_borrow(&mut self, mark: usize) -> Value {
        if self.borrow_mark != Some(mark) {
            bug("return_borrow with mismatched mark");
        }
        let run: Vec<Cell> = self.cells.drain(mark..).map(|c| c).collect();
        self.borrow_mark = None;
        Value::from_cells(run.into_boxed_slice())
    }

    /// Seal the stack into an owned [`Value`]: requires no collection
    /// still open (`spec.md` §4.4 `get_jitson`).
    pub fn get_jitson(&mut self) -> Value {
        if self.is_open() {
            bug("get_jitson with an open collection");
        }
        let run = std::mem::take(&mut self.cells).into_boxed_slice();
        Value::from_cells(run)
    }

    /// Discard everything pushed since `mark`, including any
    /// collections opened (and not yet closed) after it (`spec.md`
    /// §4.5, "on any error, the parser resets `stack.count` to the
    /// snapshot taken at entry").
    pub(crate) fn rollback_to(&mut self, mark: usize) {
        self.cells.truncate(mark);
        while matches!(self.open.last(), Some(f) if f.cell_index >= mark) {
            self.open.pop();
        }
        if self.borrow_mark.is_some_and(|m| m >= mark) {
            self.borrow_mark = None;
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.open.clear();
        self.borrow_mark = None;
    }
}

fn scalar_cmp(cells: &[Cell], a: usize, b: usize) -> Option<Ordering> {
    use jitson_core::cell::Payload::*;
    match (&cells[a].payload, &cells[b].payload) {
        (Number(x), Number(y)) => x.partial_cmp(y),
        (Uint(x), Uint(y)) => x.partial_cmp(y),
        (Str(x), Str(y)) => Some(x.as_str().cmp(y.as_str())),
        (Bool(x), Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Small helper so the `Partial` construction reads naturally at each
/// open-collection call site above.
trait IntoPayload {
    fn into_payload(self) -> jitson_core::cell::Payload;
}

impl IntoPayload for Partial {
    fn into_payload(self) -> jitson_core::cell::Payload {
        jitson_core::cell::Payload::Partial(self)
    }
}

thread_local! {
    static THREAD_STACK: std::cell::RefCell<Stack> = std::cell::RefCell::new(Stack::new());
}

/// Run `f` with exclusive access to the current thread's construction
/// stack (`spec.md` §5, "the construction stack is per-thread").
pub fn with_thread_stack<R>(f: impl FnOnce(&mut Stack) -> R) -> R {
    THREAD_STACK.with(|s| f(&mut s.borrow_mut()))
}
