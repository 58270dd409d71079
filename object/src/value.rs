use core::fmt;

use thiserror::Error;

/// Tag constants for the 32-bit word encoding.
const INT_TAG: u32 = 0b1;

/// A raw tagged 32-bit word.
///
/// Encoding:
/// - **Integer**: `...XXXXX1`, a 31-bit signed integer shifted left by one.
/// - **Handle**:  `...XXXXX0`, a reference to a heap object owned by the
///   object runtime.
pub type Word = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("expected a (boxed) number, found word {0:#x}")]
    NotAnIntegerWord(Word),
    #[error("expected a (boxed) number, found {0}")]
    NotAnInteger(Value),
}

// ── Word helpers ───────────────────────────────────────────────────

#[inline(always)]
pub const fn is_int(word: Word) -> bool {
    word & INT_TAG == INT_TAG
}

#[inline(always)]
pub const fn box_int(n: i32) -> Word {
    ((n << 1) as u32) | INT_TAG
}

#[inline(always)]
pub const fn unbox(word: Word) -> Result<i32, ValueError> {
    if !is_int(word) {
        return Err(ValueError::NotAnIntegerWord(word));
    }
    Ok((word as i32) >> 1)
}

/// Truncate `n` to the range representable by a boxed integer.
#[inline(always)]
pub const fn wrap_int(n: i32) -> i32 {
    (n << 1) >> 1
}

// ── Handles ────────────────────────────────────────────────────────

/// Opaque reference to an object living in the object runtime.
///
/// The word form is `(slot + 1) << 1`, so it always has the low bit clear
/// and is never zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(u32);

impl ObjectRef {
    #[inline(always)]
    pub const fn from_slot(slot: usize) -> Self {
        Self(slot as u32)
    }

    #[inline(always)]
    pub const fn slot(self) -> usize {
        self.0 as usize
    }

    #[inline(always)]
    pub const fn word(self) -> Word {
        (self.0 + 1) << 1
    }

    /// Recover a handle from its word form. Returns `None` for integer words
    /// and for the null word.
    pub const fn from_word(word: Word) -> Option<Self> {
        if is_int(word) || word == 0 {
            return None;
        }
        Some(Self((word >> 1) - 1))
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj(0x{:x})", self.word())
    }
}

/// An addressable variable slot, produced by the load-address instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarRef {
    /// Index into the global area.
    Global(u32),
    /// Absolute index into the call/operand stack region, valid only while
    /// the activation `frame` that owns the slot is on the frame stack.
    Stack { slot: u32, frame: u64 },
    /// Captured value `index` of a closure.
    Captured { closure: ObjectRef, index: u32 },
}

/// The non-integer half of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Object(ObjectRef),
    Var(VarRef),
}

// ── Value ──────────────────────────────────────────────────────────

/// A decoded tagged value.
///
/// Equality is identity: integers compare by value, handles by what they
/// point at, and an integer never equals a handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i32),
    Handle(Handle),
}

impl Value {
    /// Boxed zero. Every slot that is reserved but not yet written holds
    /// this, so root scanning never sees anything but a non-pointer there.
    pub const PLACEHOLDER: Value = Value::Int(0);

    #[inline(always)]
    pub const fn from_i32(n: i32) -> Self {
        Value::Int(wrap_int(n))
    }

    #[inline(always)]
    pub const fn from_bool(b: bool) -> Self {
        Value::Int(b as i32)
    }

    #[inline(always)]
    pub const fn object(obj: ObjectRef) -> Self {
        Value::Handle(Handle::Object(obj))
    }

    #[inline(always)]
    pub const fn var(var: VarRef) -> Self {
        Value::Handle(Handle::Var(var))
    }

    #[inline(always)]
    pub const fn is_int(self) -> bool {
        matches!(self, Value::Int(_))
    }

    #[inline(always)]
    pub const fn is_handle(self) -> bool {
        !self.is_int()
    }

    #[inline(always)]
    pub fn as_int(self) -> Result<i32, ValueError> {
        match self {
            Value::Int(n) => Ok(n),
            other => Err(ValueError::NotAnInteger(other)),
        }
    }

    #[inline(always)]
    pub const fn as_object(self) -> Option<ObjectRef> {
        match self {
            Value::Handle(Handle::Object(obj)) => Some(obj),
            _ => None,
        }
    }

    /// Decode a raw word. Non-integer words are object handles.
    pub const fn from_word(word: Word) -> Option<Self> {
        if is_int(word) {
            return Some(Value::Int((word as i32) >> 1));
        }
        match ObjectRef::from_word(word) {
            Some(obj) => Some(Value::object(obj)),
            None => None,
        }
    }

    /// Encode as a raw word. Variable references have no word form.
    pub const fn to_word(self) -> Option<Word> {
        match self {
            Value::Int(n) => Some(box_int(n)),
            Value::Handle(Handle::Object(obj)) => Some(obj.word()),
            Value::Handle(Handle::Var(_)) => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::PLACEHOLDER
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::from_i32(n)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Handle(Handle::Object(obj)) => write!(f, "{obj:?}"),
            Value::Handle(Handle::Var(var)) => write!(f, "Ref({var:?})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Handle(Handle::Object(obj)) => write!(f, "0x{:x}", obj.word()),
            Value::Handle(Handle::Var(_)) => write!(f, "<ref>"),
        }
    }
}
