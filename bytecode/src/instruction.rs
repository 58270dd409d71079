use core::fmt;

use num_enum::TryFromPrimitive;

/// Storage class a variable-access instruction targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum Designation {
    Global = 0x0,
    Local = 0x1,
    Arg = 0x2,
    Captured = 0x3,
}

/// A designated variable: storage class plus index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var {
    pub designation: Designation,
    pub index: i32,
}

impl Var {
    pub const fn global(index: i32) -> Self {
        Self { designation: Designation::Global, index }
    }

    pub const fn local(index: i32) -> Self {
        Self { designation: Designation::Local, index }
    }

    pub const fn arg(index: i32) -> Self {
        Self { designation: Designation::Arg, index }
    }

    pub const fn captured(index: i32) -> Self {
        Self { designation: Designation::Captured, index }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.designation {
            Designation::Global => "G",
            Designation::Local => "L",
            Designation::Arg => "A",
            Designation::Captured => "C",
        };
        write!(f, "{prefix}({})", self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "!!",
        }
    }
}

/// Structural predicates used by compiled `match` expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    StrEq,
    String,
    Array,
    Sexp,
    Boxed,
    Unboxed,
    Closure,
}

/// A decoded instruction.
///
/// Code offsets are absolute byte offsets into the code region; string
/// operands are byte offsets into the string table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Binop(BinOp),
    Const { value: i32 },
    String { string: u32 },
    Sexp { tag: u32, arity: u32 },
    Sti,
    Sta,
    Jump { target: u32 },
    End,
    Ret,
    Drop,
    Dup,
    Swap,
    Elem,
    Load(Var),
    LoadAddr(Var),
    Store(Var),
    JumpIfZero { target: u32 },
    JumpIfNonZero { target: u32 },
    Begin { nargs: u32, nlocals: u32 },
    ClosureBegin { nargs: u32, nlocals: u32 },
    Closure { entry: u32, captures: Vec<Var> },
    CallClosure { nargs: u32 },
    Call { target: u32, nargs: u32 },
    Tag { tag: u32, arity: u32 },
    ArrayPattern { len: u32 },
    Fail { line: u32, column: u32 },
    Line { line: u32 },
    Pattern(Pattern),
    Read,
    Write,
    Length,
    Stringify,
    MakeArray { len: u32 },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binop(op) => write!(f, "BINOP {}", op.symbol()),
            Self::Const { value } => write!(f, "CONST {value}"),
            Self::String { string } => write!(f, "STRING #{string:#x}"),
            Self::Sexp { tag, arity } => write!(f, "SEXP #{tag:#x} {arity}"),
            Self::Sti => write!(f, "STI"),
            Self::Sta => write!(f, "STA"),
            Self::Jump { target } => write!(f, "JMP {target:#x}"),
            Self::End => write!(f, "END"),
            Self::Ret => write!(f, "RET"),
            Self::Drop => write!(f, "DROP"),
            Self::Dup => write!(f, "DUP"),
            Self::Swap => write!(f, "SWAP"),
            Self::Elem => write!(f, "ELEM"),
            Self::Load(var) => write!(f, "LD {var}"),
            Self::LoadAddr(var) => write!(f, "LDA {var}"),
            Self::Store(var) => write!(f, "ST {var}"),
            Self::JumpIfZero { target } => write!(f, "CJMPz {target:#x}"),
            Self::JumpIfNonZero { target } => write!(f, "CJMPnz {target:#x}"),
            Self::Begin { nargs, nlocals } => write!(f, "BEGIN {nargs} {nlocals}"),
            Self::ClosureBegin { nargs, nlocals } => {
                write!(f, "CBEGIN {nargs} {nlocals}")
            }
            Self::Closure { entry, captures } => {
                write!(f, "CLOSURE {entry:#x}")?;
                for var in captures {
                    write!(f, " {var}")?;
                }
                Ok(())
            }
            Self::CallClosure { nargs } => write!(f, "CALLC {nargs}"),
            Self::Call { target, nargs } => write!(f, "CALL {target:#x} {nargs}"),
            Self::Tag { tag, arity } => write!(f, "TAG #{tag:#x} {arity}"),
            Self::ArrayPattern { len } => write!(f, "ARRAY {len}"),
            Self::Fail { line, column } => write!(f, "FAIL {line}:{column}"),
            Self::Line { line } => write!(f, "LINE {line}"),
            Self::Pattern(pattern) => {
                let name = match pattern {
                    Pattern::StrEq => "=str",
                    Pattern::String => "#string",
                    Pattern::Array => "#array",
                    Pattern::Sexp => "#sexp",
                    Pattern::Boxed => "#ref",
                    Pattern::Unboxed => "#val",
                    Pattern::Closure => "#fun",
                };
                write!(f, "PATT {name}")
            }
            Self::Read => write!(f, "CALL Lread"),
            Self::Write => write!(f, "CALL Lwrite"),
            Self::Length => write!(f, "CALL Llength"),
            Self::Stringify => write!(f, "CALL Lstring"),
            Self::MakeArray { len } => write!(f, "CALL Barray {len}"),
        }
    }
}
