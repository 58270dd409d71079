//! The contract between the VM core and the object runtime.
//!
//! The core never looks inside a heap object. Everything that allocates,
//! inspects structure or talks to the console goes through
//! [`ObjectRuntime`], and the collector only learns about live values
//! through a [`RootProvider`] handed to [`Collector::scan`].

use object::{ObjectKind, ObjectRef, Value};

use crate::{MatchFailure, ObjectError};

/// Consumers implement this to expose their GC roots.
pub trait RootProvider {
    fn visit_roots(&self, visitor: &mut dyn FnMut(Value));
}

/// The region the core exposes for root scanning: the live part of the
/// call/operand stack plus the global area.
#[derive(Debug, Clone, Copy)]
pub struct RootRange<'a> {
    pub stack: &'a [Value],
    pub globals: &'a [Value],
}

impl RootRange<'_> {
    pub fn len(&self) -> usize {
        self.stack.len() + self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        self.stack.iter().chain(self.globals.iter()).copied()
    }
}

impl RootProvider for RootRange<'_> {
    fn visit_roots(&self, visitor: &mut dyn FnMut(Value)) {
        for value in self.iter() {
            visitor(value);
        }
    }
}

/// Root registration side of the garbage collector.
pub trait Collector {
    /// Called once before the first instruction executes.
    fn init(&mut self) {}

    /// Scan `roots` for potential references. Called before every operation
    /// that may allocate; the collector may reclaim anything not reachable
    /// from them.
    fn scan(&mut self, roots: &dyn RootProvider);
}

/// Heap-object runtime the interpreter calls into.
///
/// Constructor arguments are passed as slices of the interpreter's operand
/// region, in push order (first element deepest).
pub trait ObjectRuntime: Collector {
    // ── console ────────────────────────────────────────────────────

    fn read_int(&mut self) -> Result<i32, ObjectError>;
    fn write_int(&mut self, n: i32) -> Result<(), ObjectError>;

    // ── constructors ───────────────────────────────────────────────

    fn string(&mut self, bytes: &[u8]) -> Result<Value, ObjectError>;
    fn array(&mut self, elems: &[Value]) -> Result<Value, ObjectError>;
    fn sexp(&mut self, tag: i32, fields: &[Value]) -> Result<Value, ObjectError>;
    fn closure(&mut self, entry: u32, captured: &[Value]) -> Result<Value, ObjectError>;
    /// Render `value` to its textual form as a new string object.
    fn render(&mut self, value: Value) -> Result<Value, ObjectError>;

    // ── structure ──────────────────────────────────────────────────

    fn length(&self, value: Value) -> Result<i32, ObjectError>;
    fn elem(&self, value: Value, index: i32) -> Result<Value, ObjectError>;
    fn store_elem(&mut self, value: Value, index: i32, elem: Value) -> Result<(), ObjectError>;
    fn closure_entry(&self, value: Value) -> Result<u32, ObjectError>;
    fn captured_slot(&mut self, closure: ObjectRef, index: i32) -> Result<&mut Value, ObjectError>;

    // ── patterns ───────────────────────────────────────────────────

    fn tag_hash(&self, name: &[u8]) -> Result<i32, ObjectError>;
    fn is_kind(&self, value: Value, kind: ObjectKind) -> bool;
    fn tag_matches(&self, value: Value, tag: i32, arity: i32) -> bool;
    fn array_matches(&self, value: Value, len: i32) -> bool;
    fn string_matches(&self, value: Value, pattern: Value) -> bool;
    fn match_failure(&self, value: Value, line: u32, column: u32) -> MatchFailure;
}
