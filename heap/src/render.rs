use std::fmt::Write;

use object::{Handle, Object, Value};

use crate::{tags, Heap};

/// Nesting beyond this depth is elided, so cyclic structures terminate.
const MAX_RENDER_DEPTH: usize = 64;

impl Heap {
    /// Render `value` the way the `string` built-in does.
    pub fn describe(&self, value: Value) -> String {
        let mut out = String::new();
        self.render_into(value, &mut out, 0);
        out
    }

    fn render_into(&self, value: Value, out: &mut String, depth: usize) {
        if depth > MAX_RENDER_DEPTH {
            out.push_str("...");
            return;
        }
        let obj = match value {
            Value::Int(n) => {
                let _ = write!(out, "{n}");
                return;
            }
            Value::Handle(Handle::Var(_)) => {
                out.push_str("<ref>");
                return;
            }
            Value::Handle(Handle::Object(obj)) => obj,
        };
        let Ok(object) = self.get(obj) else {
            let _ = write!(out, "0x{:x}", obj.word());
            return;
        };

        match object {
            Object::String(bytes) => {
                out.push('"');
                out.push_str(&String::from_utf8_lossy(bytes));
                out.push('"');
            }
            Object::Closure { entry, captured } => {
                let _ = write!(out, "<closure 0x{entry:x}");
                for &v in captured {
                    out.push_str(", ");
                    self.render_into(v, out, depth + 1);
                }
                out.push('>');
            }
            Object::Array(elems) => {
                out.push('[');
                self.render_list(elems, out, depth);
                out.push(']');
            }
            Object::Sexp { tag, fields } if self.is_cons(*tag, fields) => {
                out.push('{');
                let mut cell = fields;
                for step in 0.. {
                    if step > MAX_RENDER_DEPTH * MAX_RENDER_DEPTH {
                        out.push_str("...");
                        break;
                    }
                    self.render_into(cell[0], out, depth + 1);
                    match self.resolve(cell[1]) {
                        Ok(Object::Sexp { tag, fields }) if self.is_cons(*tag, fields) => {
                            out.push_str(", ");
                            cell = fields;
                        }
                        _ => break,
                    }
                }
                out.push('}');
            }
            Object::Sexp { tag, fields } => {
                out.push_str(&tags::tag_name(*tag));
                if !fields.is_empty() {
                    out.push_str(" (");
                    self.render_list(fields, out, depth);
                    out.push(')');
                }
            }
        }
    }

    fn render_list(&self, values: &[Value], out: &mut String, depth: usize) {
        for (i, &v) in values.iter().enumerate() {
            if i != 0 {
                out.push_str(", ");
            }
            self.render_into(v, out, depth + 1);
        }
    }

    fn is_cons(&self, tag: i32, fields: &[Value]) -> bool {
        fields.len() == 2 && tags::tag_name(tag) == "cons"
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use object::VarRef;

    use crate::{Console, HeapSettings, ObjectRuntime};

    use super::*;

    fn heap() -> Heap {
        Heap::new(HeapSettings::default(), Console::new(io::empty(), io::sink()))
    }

    #[test]
    fn scalars_and_strings() {
        let mut heap = heap();
        assert_eq!(heap.describe(Value::Int(-5)), "-5");
        assert_eq!(heap.describe(Value::var(VarRef::Global(0))), "<ref>");
        let s = heap.string(b"hello").unwrap();
        assert_eq!(heap.describe(s), "\"hello\"");
    }

    #[test]
    fn arrays_and_tuples() {
        let mut heap = heap();
        let s = heap.string(b"x").unwrap();
        let arr = heap.array(&[Value::Int(1), s]).unwrap();
        assert_eq!(heap.describe(arr), "[1, \"x\"]");

        let none = heap.tag_hash(b"None").unwrap();
        let some = heap.tag_hash(b"Some").unwrap();
        let empty = heap.sexp(none, &[]).unwrap();
        let full = heap.sexp(some, &[arr]).unwrap();
        assert_eq!(heap.describe(empty), "None");
        assert_eq!(heap.describe(full), "Some ([1, \"x\"])");
    }

    #[test]
    fn cons_chains_render_as_lists() {
        let mut heap = heap();
        let cons = heap.tag_hash(b"cons").unwrap();
        let tail = heap.sexp(cons, &[Value::Int(3), Value::Int(0)]).unwrap();
        let mid = heap.sexp(cons, &[Value::Int(2), tail]).unwrap();
        let head = heap.sexp(cons, &[Value::Int(1), mid]).unwrap();
        assert_eq!(heap.describe(head), "{1, 2, 3}");
    }

    #[test]
    fn render_allocates_a_string() {
        let mut heap = heap();
        let arr = heap.array(&[Value::Int(7)]).unwrap();
        let rendered = heap.render(arr).unwrap();
        assert_eq!(heap.describe(rendered), "\"[7]\"");
    }

    #[test]
    fn cyclic_arrays_terminate() {
        let mut heap = heap();
        let arr = heap.array(&[Value::Int(0)]).unwrap();
        heap.store_elem(arr, 0, arr).unwrap();
        assert!(heap.describe(arr).contains("..."));
    }
}
