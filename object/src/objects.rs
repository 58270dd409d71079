use core::fmt;

use crate::Value;

/// The structural kind of a heap object, as tested by the pattern
/// predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    String,
    Array,
    Sexp,
    Closure,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::String => "string",
            ObjectKind::Array => "array",
            ObjectKind::Sexp => "s-expression",
            ObjectKind::Closure => "closure",
        };
        f.write_str(name)
    }
}

// ── Objects ────────────────────────────────────────────────────────

/// A heap object as stored by the object runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    /// Byte string without the trailing NUL.
    String(Vec<u8>),
    Array(Vec<Value>),
    /// Tagged tuple. `tag` is the hash of the constructor name.
    Sexp { tag: i32, fields: Vec<Value> },
    /// Code entry offset plus captured values.
    Closure { entry: u32, captured: Vec<Value> },
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::String(_) => ObjectKind::String,
            Object::Array(_) => ObjectKind::Array,
            Object::Sexp { .. } => ObjectKind::Sexp,
            Object::Closure { .. } => ObjectKind::Closure,
        }
    }

    /// Structural length: bytes, elements, fields or captured values.
    pub fn len(&self) -> usize {
        match self {
            Object::String(bytes) => bytes.len(),
            Object::Array(elems) => elems.len(),
            Object::Sexp { fields, .. } => fields.len(),
            Object::Closure { captured, .. } => captured.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value fields the collector must trace.
    pub fn edges(&self) -> &[Value] {
        match self {
            Object::String(_) => &[],
            Object::Array(elems) => elems,
            Object::Sexp { fields, .. } => fields,
            Object::Closure { captured, .. } => captured,
        }
    }
}
