use thiserror::Error;

use crate::instruction::{BinOp, Designation, Instruction, Pattern, Var};
use crate::op::Op;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unsupported instruction code {0:#04x}")]
    UnknownOpcode(u8),
    #[error("unsupported variable designation {0:#x}")]
    UnknownDesignation(u8),
    #[error("truncated instruction: {needed} more bytes needed, {available} left")]
    Truncated { needed: usize, available: usize },
}

/// Decodes a bytecode byte slice into [`Instruction`]s.
///
/// Every read is bounds-checked: the bytes come straight from an untrusted
/// program image.
pub struct BytecodeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BytecodeDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::at(bytes, 0)
    }

    /// Start decoding at byte offset `pos`.
    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    /// Current byte offset in the stream.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Whether the decoder has reached the end of the bytecode.
    #[inline(always)]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Decode the instruction at the current offset and advance past it.
    pub fn decode(&mut self) -> Result<Instruction, DecodeError> {
        let byte = self.read_u8()?;
        let op = Op::try_from(byte).map_err(|_| DecodeError::UnknownOpcode(byte))?;
        if let Some(len) = op.fixed_operand_len() {
            self.ensure(len)?;
        }

        let instruction = match op {
            Op::Add => Instruction::Binop(BinOp::Add),
            Op::Sub => Instruction::Binop(BinOp::Sub),
            Op::Mul => Instruction::Binop(BinOp::Mul),
            Op::Div => Instruction::Binop(BinOp::Div),
            Op::Mod => Instruction::Binop(BinOp::Mod),
            Op::Lt => Instruction::Binop(BinOp::Lt),
            Op::Le => Instruction::Binop(BinOp::Le),
            Op::Gt => Instruction::Binop(BinOp::Gt),
            Op::Ge => Instruction::Binop(BinOp::Ge),
            Op::Eq => Instruction::Binop(BinOp::Eq),
            Op::Ne => Instruction::Binop(BinOp::Ne),
            Op::And => Instruction::Binop(BinOp::And),
            Op::Or => Instruction::Binop(BinOp::Or),

            Op::Const => Instruction::Const { value: self.read_i32()? },
            Op::String => Instruction::String { string: self.read_u32()? },
            Op::Sexp => {
                let tag = self.read_u32()?;
                let arity = self.read_u32()?;
                Instruction::Sexp { tag, arity }
            }
            Op::Sti => Instruction::Sti,
            Op::Sta => Instruction::Sta,
            Op::Jmp => Instruction::Jump { target: self.read_u32()? },
            Op::End => Instruction::End,
            Op::Ret => Instruction::Ret,
            Op::Drop => Instruction::Drop,
            Op::Dup => Instruction::Dup,
            Op::Swap => Instruction::Swap,
            Op::Elem => Instruction::Elem,

            Op::LdGlobal => Instruction::Load(Var::global(self.read_i32()?)),
            Op::LdLocal => Instruction::Load(Var::local(self.read_i32()?)),
            Op::LdArg => Instruction::Load(Var::arg(self.read_i32()?)),
            Op::LdCaptured => Instruction::Load(Var::captured(self.read_i32()?)),
            Op::LdaGlobal => Instruction::LoadAddr(Var::global(self.read_i32()?)),
            Op::LdaLocal => Instruction::LoadAddr(Var::local(self.read_i32()?)),
            Op::LdaArg => Instruction::LoadAddr(Var::arg(self.read_i32()?)),
            Op::LdaCaptured => Instruction::LoadAddr(Var::captured(self.read_i32()?)),
            Op::StGlobal => Instruction::Store(Var::global(self.read_i32()?)),
            Op::StLocal => Instruction::Store(Var::local(self.read_i32()?)),
            Op::StArg => Instruction::Store(Var::arg(self.read_i32()?)),
            Op::StCaptured => Instruction::Store(Var::captured(self.read_i32()?)),

            Op::CjmpZ => Instruction::JumpIfZero { target: self.read_u32()? },
            Op::CjmpNz => Instruction::JumpIfNonZero { target: self.read_u32()? },
            Op::Begin => {
                let nargs = self.read_u32()?;
                let nlocals = self.read_u32()?;
                Instruction::Begin { nargs, nlocals }
            }
            Op::CBegin => {
                let nargs = self.read_u32()?;
                let nlocals = self.read_u32()?;
                Instruction::ClosureBegin { nargs, nlocals }
            }
            Op::Closure => {
                let entry = self.read_u32()?;
                let count = self.read_u32()?;
                // Each capture is a designation byte plus an i32 index.
                self.ensure((count as usize).saturating_mul(5))?;
                let mut captures = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let byte = self.read_u8()?;
                    let designation = Designation::try_from(byte)
                        .map_err(|_| DecodeError::UnknownDesignation(byte))?;
                    let index = self.read_i32()?;
                    captures.push(Var { designation, index });
                }
                Instruction::Closure { entry, captures }
            }
            Op::CallC => Instruction::CallClosure { nargs: self.read_u32()? },
            Op::Call => {
                let target = self.read_u32()?;
                let nargs = self.read_u32()?;
                Instruction::Call { target, nargs }
            }
            Op::Tag => {
                let tag = self.read_u32()?;
                let arity = self.read_u32()?;
                Instruction::Tag { tag, arity }
            }
            Op::Array => Instruction::ArrayPattern { len: self.read_u32()? },
            Op::Fail => {
                let line = self.read_u32()?;
                let column = self.read_u32()?;
                Instruction::Fail { line, column }
            }
            Op::Line => Instruction::Line { line: self.read_u32()? },

            Op::PattStrEq => Instruction::Pattern(Pattern::StrEq),
            Op::PattString => Instruction::Pattern(Pattern::String),
            Op::PattArray => Instruction::Pattern(Pattern::Array),
            Op::PattSexp => Instruction::Pattern(Pattern::Sexp),
            Op::PattBoxed => Instruction::Pattern(Pattern::Boxed),
            Op::PattUnboxed => Instruction::Pattern(Pattern::Unboxed),
            Op::PattClosure => Instruction::Pattern(Pattern::Closure),

            Op::Read => Instruction::Read,
            Op::Write => Instruction::Write,
            Op::Length => Instruction::Length,
            Op::Stringify => Instruction::Stringify,
            Op::MakeArray => Instruction::MakeArray { len: self.read_u32()? },
        };
        Ok(instruction)
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        let available = self.bytes.len().saturating_sub(self.pos);
        if needed > available {
            return Err(DecodeError::Truncated { needed, available });
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        let v = self.bytes[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_le_bytes(word))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.read_u32().map(|w| w as i32)
    }
}

impl Iterator for BytecodeDecoder<'_> {
    type Item = Result<Instruction, DecodeError>;

    /// Yields instructions until the end of the stream or the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.is_at_end() {
            return None;
        }
        let result = self.decode();
        if result.is_err() {
            self.pos = self.bytes.len();
        }
        Some(result)
    }
}
