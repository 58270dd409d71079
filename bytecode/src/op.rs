use num_enum::TryFromPrimitive;

/// Bytecode opcodes.
///
/// Every opcode is a single byte followed by its immediates. Words are
/// 32-bit little-endian; designations inside `Closure` are single bytes.
/// Variable-access opcodes carry their designation in the opcode itself
/// (`Ld*`, `Lda*`, `St*` for global, local, argument and captured).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum Op {
    // ── binary operators ───────────────────────────────────────────
    Add = 0x01,
    Sub = 0x02,
    Mul = 0x03,
    Div = 0x04,
    Mod = 0x05,
    Lt = 0x06,
    Le = 0x07,
    Gt = 0x08,
    Ge = 0x09,
    Eq = 0x0a,
    Ne = 0x0b,
    And = 0x0c,
    Or = 0x0d,

    // ── stack and data ─────────────────────────────────────────────
    /// Operands: `n:i32`
    Const = 0x10,
    /// Operands: `string:u32`
    String = 0x11,
    /// Operands: `tag:u32`, `arity:u32`
    Sexp = 0x12,
    /// Store through a reference.
    Sti = 0x13,
    /// Store into an aggregate.
    Sta = 0x14,
    /// Operands: `target:u32`
    Jmp = 0x15,
    End = 0x16,
    Ret = 0x17,
    Drop = 0x18,
    Dup = 0x19,
    Swap = 0x1a,
    Elem = 0x1b,

    // ── variables ──────────────────────────────────────────────────
    /// Operands: `index:i32`
    LdGlobal = 0x20,
    LdLocal = 0x21,
    LdArg = 0x22,
    LdCaptured = 0x23,
    LdaGlobal = 0x30,
    LdaLocal = 0x31,
    LdaArg = 0x32,
    LdaCaptured = 0x33,
    StGlobal = 0x40,
    StLocal = 0x41,
    StArg = 0x42,
    StCaptured = 0x43,

    // ── control ────────────────────────────────────────────────────
    /// Operands: `target:u32`
    CjmpZ = 0x50,
    /// Operands: `target:u32`
    CjmpNz = 0x51,
    /// Operands: `nargs:u32`, `nlocals:u32`
    Begin = 0x52,
    /// Operands: `nargs:u32`, `nlocals:u32`
    CBegin = 0x53,
    /// Operands: `entry:u32`, `n:u32`, then `n` × (`designation:u8`, `index:i32`)
    Closure = 0x54,
    /// Operands: `nargs:u32`
    CallC = 0x55,
    /// Operands: `target:u32`, `nargs:u32`
    Call = 0x56,
    /// Operands: `tag:u32`, `arity:u32`
    Tag = 0x57,
    /// Operands: `len:u32`
    Array = 0x58,
    /// Operands: `line:u32`, `column:u32`
    Fail = 0x59,
    /// Operands: `line:u32`
    Line = 0x5a,

    // ── patterns ───────────────────────────────────────────────────
    PattStrEq = 0x60,
    PattString = 0x61,
    PattArray = 0x62,
    PattSexp = 0x63,
    PattBoxed = 0x64,
    PattUnboxed = 0x65,
    PattClosure = 0x66,

    // ── built-ins ──────────────────────────────────────────────────
    Read = 0x70,
    Write = 0x71,
    Length = 0x72,
    Stringify = 0x73,
    /// Operands: `n:u32`
    MakeArray = 0x74,
}

impl Op {
    /// Number of immediate bytes that follow the opcode, or `None` when the
    /// length depends on the immediates (`Closure`).
    pub const fn fixed_operand_len(self) -> Option<usize> {
        match self {
            Op::Closure => None,
            Op::Const
            | Op::String
            | Op::Jmp
            | Op::LdGlobal
            | Op::LdLocal
            | Op::LdArg
            | Op::LdCaptured
            | Op::LdaGlobal
            | Op::LdaLocal
            | Op::LdaArg
            | Op::LdaCaptured
            | Op::StGlobal
            | Op::StLocal
            | Op::StArg
            | Op::StCaptured
            | Op::CjmpZ
            | Op::CjmpNz
            | Op::CallC
            | Op::Array
            | Op::Line
            | Op::MakeArray => Some(4),
            Op::Sexp
            | Op::Begin
            | Op::CBegin
            | Op::Call
            | Op::Tag
            | Op::Fail => Some(8),
            _ => Some(0),
        }
    }
}
