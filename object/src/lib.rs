mod objects;
mod value;

pub use objects::{Object, ObjectKind};
pub use value::{
    box_int, is_int, unbox, wrap_int, Handle, ObjectRef, Value, ValueError,
    VarRef, Word,
};

#[cfg(test)]
mod tests {
    use super::*;

    // ── Word tagging ───────────────────────────────────────────────

    #[test]
    fn int_round_trip() {
        let max = (1 << 30) - 1;
        let min = -(1 << 30);
        for &n in &[0, 1, -1, 42, -42, 1000, -1000, max, min] {
            let word = box_int(n);
            assert!(is_int(word), "boxed {n} must carry the integer tag");
            assert_eq!(unbox(word), Ok(n));
        }
    }

    #[test]
    fn int_round_trip_sweeps_31_bit_range() {
        let mut n: i32 = -(1 << 30);
        while n < (1 << 30) - 7919 {
            assert_eq!(unbox(box_int(n)), Ok(n));
            n += 7919 * 131;
        }
    }

    #[test]
    fn boxed_zero_is_one() {
        assert_eq!(box_int(0), 1);
        assert_eq!(Value::PLACEHOLDER.to_word(), Some(1));
    }

    #[test]
    fn unbox_rejects_handle_words() {
        assert_eq!(unbox(0x10), Err(ValueError::NotAnIntegerWord(0x10)));
        assert!(!is_int(ObjectRef::from_slot(3).word()));
    }

    #[test]
    fn wrap_int_truncates_to_31_bits() {
        assert_eq!(wrap_int(1 << 30), -(1 << 30));
        assert_eq!(wrap_int(-1), -1);
        assert_eq!(Value::from_i32(i32::MAX), Value::Int(-1));
    }

    // ── Value ──────────────────────────────────────────────────────

    #[test]
    fn value_word_round_trip() {
        let obj = ObjectRef::from_slot(17);
        for value in [Value::Int(5), Value::Int(-9), Value::object(obj)] {
            let word = value.to_word().expect("has a word form");
            assert_eq!(Value::from_word(word), Some(value));
        }
        assert_eq!(Value::from_word(0), None);
    }

    #[test]
    fn var_refs_have_no_word_form() {
        assert_eq!(Value::var(VarRef::Global(0)).to_word(), None);
    }

    #[test]
    fn as_int_rejects_handles() {
        let v = Value::object(ObjectRef::from_slot(0));
        assert_eq!(v.as_int(), Err(ValueError::NotAnInteger(v)));
        assert_eq!(Value::Int(3).as_int(), Ok(3));
    }

    #[test]
    fn equality_is_identity() {
        let a = Value::object(ObjectRef::from_slot(1));
        let b = Value::object(ObjectRef::from_slot(2));
        assert_eq!(a, a);
        assert_ne!(a, b);
        assert_ne!(Value::Int(1), a);
    }

    #[test]
    fn object_edges_follow_kind() {
        let s = Object::String(b"abc".to_vec());
        assert_eq!(s.len(), 3);
        assert!(s.edges().is_empty());

        let sexp = Object::Sexp {
            tag: 7,
            fields: vec![Value::Int(1), Value::Int(2)],
        };
        assert_eq!(sexp.kind(), ObjectKind::Sexp);
        assert_eq!(sexp.edges().len(), 2);
    }
}
