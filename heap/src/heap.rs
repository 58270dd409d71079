//! Reference object runtime: an arena of [`Object`]s with a non-moving
//! mark-and-sweep collector.
//!
//! Handles are arena slot numbers, so a collection never has to rewrite
//! roots. Freed slots are reused by later allocations.

use log::debug;
use object::{Handle, Object, ObjectKind, ObjectRef, Value, VarRef};

use crate::{
    tags, Collector, Console, MatchFailure, ObjectError, ObjectRuntime,
    RootProvider,
};

// ── Heap settings ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HeapSettings {
    /// Allocations between two collections. `0` disables automatic
    /// collection; [`Heap::collect`] still works.
    pub collection_threshold: usize,
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            collection_threshold: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub collections: usize,
    pub allocated: usize,
    pub freed: usize,
}

// ── Heap ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Heap {
    settings: HeapSettings,
    objects: Vec<Option<Object>>,
    marks: Vec<bool>,
    free: Vec<usize>,
    since_collection: usize,
    initialized: bool,
    stats: GcStats,
    console: Console,
}

impl Heap {
    pub fn new(settings: HeapSettings, console: Console) -> Self {
        Self {
            settings,
            objects: Vec::new(),
            marks: Vec::new(),
            free: Vec::new(),
            since_collection: 0,
            initialized: false,
            stats: GcStats::default(),
            console,
        }
    }

    pub fn stats(&self) -> GcStats {
        self.stats
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn live_objects(&self) -> usize {
        self.objects.len() - self.free.len()
    }

    pub fn get(&self, obj: ObjectRef) -> Result<&Object, ObjectError> {
        self.objects
            .get(obj.slot())
            .and_then(Option::as_ref)
            .ok_or(ObjectError::Dangling(obj))
    }

    fn get_mut(&mut self, obj: ObjectRef) -> Result<&mut Object, ObjectError> {
        self.objects
            .get_mut(obj.slot())
            .and_then(Option::as_mut)
            .ok_or(ObjectError::Dangling(obj))
    }

    /// Resolve a value that must be a handle to a live object.
    pub fn resolve(&self, value: Value) -> Result<&Object, ObjectError> {
        let obj = value.as_object().ok_or(ObjectError::NotAnObject(value))?;
        self.get(obj)
    }

    fn resolve_mut(&mut self, value: Value) -> Result<&mut Object, ObjectError> {
        let obj = value.as_object().ok_or(ObjectError::NotAnObject(value))?;
        self.get_mut(obj)
    }

    pub fn allocate(&mut self, object: Object) -> ObjectRef {
        self.stats.allocated += 1;
        self.since_collection += 1;
        match self.free.pop() {
            Some(slot) => {
                self.objects[slot] = Some(object);
                ObjectRef::from_slot(slot)
            }
            None => {
                self.objects.push(Some(object));
                self.marks.push(false);
                ObjectRef::from_slot(self.objects.len() - 1)
            }
        }
    }

    // ── Collection ────────────────────────────────────────────────────

    /// Run a full collection. Returns the number of objects reclaimed.
    pub fn collect(&mut self, roots: &dyn RootProvider) -> usize {
        let before = self.live_objects();

        let mut worklist = Vec::new();
        roots.visit_roots(&mut |value| {
            if let Some(obj) = reachable(value) {
                worklist.push(obj);
            }
        });

        while let Some(obj) = worklist.pop() {
            let slot = obj.slot();
            if slot >= self.objects.len() || self.marks[slot] {
                continue;
            }
            let Some(object) = &self.objects[slot] else {
                continue;
            };
            self.marks[slot] = true;
            worklist.extend(object.edges().iter().copied().filter_map(reachable));
        }

        let mut freed = 0;
        for slot in 0..self.objects.len() {
            if self.marks[slot] {
                self.marks[slot] = false;
            } else if self.objects[slot].take().is_some() {
                self.free.push(slot);
                freed += 1;
            }
        }

        self.since_collection = 0;
        self.stats.collections += 1;
        self.stats.freed += freed;
        debug!(
            "gc #{}: {} -> {} live objects",
            self.stats.collections,
            before,
            self.live_objects()
        );
        freed
    }

    fn kind_of(&self, value: Value) -> Option<ObjectKind> {
        self.resolve(value).ok().map(Object::kind)
    }
}

/// The object a root keeps alive, if any.
fn reachable(value: Value) -> Option<ObjectRef> {
    match value {
        Value::Handle(Handle::Object(obj)) => Some(obj),
        Value::Handle(Handle::Var(VarRef::Captured { closure, .. })) => Some(closure),
        _ => None,
    }
}

fn check_index(index: i32, len: usize) -> Result<usize, ObjectError> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(ObjectError::IndexOutOfBounds { index, len })
}

impl Collector for Heap {
    fn init(&mut self) {
        self.initialized = true;
        debug!(
            "collector initialised, threshold {} allocations",
            self.settings.collection_threshold
        );
    }

    fn scan(&mut self, roots: &dyn RootProvider) {
        let threshold = self.settings.collection_threshold;
        if threshold != 0 && self.since_collection >= threshold {
            self.collect(roots);
        }
    }
}

impl ObjectRuntime for Heap {
    fn read_int(&mut self) -> Result<i32, ObjectError> {
        self.console.read_int()
    }

    fn write_int(&mut self, n: i32) -> Result<(), ObjectError> {
        self.console.write_int(n)
    }

    fn string(&mut self, bytes: &[u8]) -> Result<Value, ObjectError> {
        Ok(Value::object(self.allocate(Object::String(bytes.to_vec()))))
    }

    fn array(&mut self, elems: &[Value]) -> Result<Value, ObjectError> {
        Ok(Value::object(self.allocate(Object::Array(elems.to_vec()))))
    }

    fn sexp(&mut self, tag: i32, fields: &[Value]) -> Result<Value, ObjectError> {
        let sexp = Object::Sexp {
            tag,
            fields: fields.to_vec(),
        };
        Ok(Value::object(self.allocate(sexp)))
    }

    fn closure(&mut self, entry: u32, captured: &[Value]) -> Result<Value, ObjectError> {
        let closure = Object::Closure {
            entry,
            captured: captured.to_vec(),
        };
        Ok(Value::object(self.allocate(closure)))
    }

    fn render(&mut self, value: Value) -> Result<Value, ObjectError> {
        let text = self.describe(value);
        self.string(text.as_bytes())
    }

    fn length(&self, value: Value) -> Result<i32, ObjectError> {
        Ok(self.resolve(value)?.len() as i32)
    }

    fn elem(&self, value: Value, index: i32) -> Result<Value, ObjectError> {
        match self.resolve(value)? {
            Object::String(bytes) => {
                let i = check_index(index, bytes.len())?;
                Ok(Value::Int(bytes[i] as i32))
            }
            Object::Array(elems) | Object::Sexp { fields: elems, .. } => {
                let i = check_index(index, elems.len())?;
                Ok(elems[i])
            }
            Object::Closure { .. } => Err(ObjectError::WrongKind {
                expected: "string, array or s-expression",
                found: ObjectKind::Closure,
            }),
        }
    }

    fn store_elem(&mut self, value: Value, index: i32, elem: Value) -> Result<(), ObjectError> {
        match self.resolve_mut(value)? {
            Object::String(bytes) => {
                let i = check_index(index, bytes.len())?;
                bytes[i] = elem.as_int()? as u8;
            }
            Object::Array(elems) | Object::Sexp { fields: elems, .. } => {
                let i = check_index(index, elems.len())?;
                elems[i] = elem;
            }
            Object::Closure { .. } => {
                return Err(ObjectError::WrongKind {
                    expected: "string, array or s-expression",
                    found: ObjectKind::Closure,
                });
            }
        }
        Ok(())
    }

    fn closure_entry(&self, value: Value) -> Result<u32, ObjectError> {
        match self.resolve(value)? {
            Object::Closure { entry, .. } => Ok(*entry),
            other => Err(ObjectError::WrongKind {
                expected: "closure",
                found: other.kind(),
            }),
        }
    }

    fn captured_slot(&mut self, closure: ObjectRef, index: i32) -> Result<&mut Value, ObjectError> {
        match self.get_mut(closure)? {
            Object::Closure { captured, .. } => {
                let i = check_index(index, captured.len())?;
                Ok(&mut captured[i])
            }
            other => Err(ObjectError::WrongKind {
                expected: "closure",
                found: other.kind(),
            }),
        }
    }

    fn tag_hash(&self, name: &[u8]) -> Result<i32, ObjectError> {
        tags::tag_hash(name)
    }

    fn is_kind(&self, value: Value, kind: ObjectKind) -> bool {
        self.kind_of(value) == Some(kind)
    }

    fn tag_matches(&self, value: Value, tag: i32, arity: i32) -> bool {
        match self.resolve(value) {
            Ok(Object::Sexp { tag: t, fields }) => {
                *t == tag && fields.len() as i64 == arity as i64
            }
            _ => false,
        }
    }

    fn array_matches(&self, value: Value, len: i32) -> bool {
        match self.resolve(value) {
            Ok(Object::Array(elems)) => elems.len() as i64 == len as i64,
            _ => false,
        }
    }

    fn string_matches(&self, value: Value, pattern: Value) -> bool {
        match (self.resolve(value), self.resolve(pattern)) {
            (Ok(Object::String(a)), Ok(Object::String(b))) => a == b,
            _ => false,
        }
    }

    fn match_failure(&self, value: Value, line: u32, column: u32) -> MatchFailure {
        MatchFailure {
            value: self.describe(value),
            line,
            column,
        }
    }
}
