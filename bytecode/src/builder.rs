use crate::instruction::{BinOp, Designation, Instruction, Pattern, Var};
use crate::op::Op;

/// A code offset whose value is not known yet.
///
/// Created by the `*_forward` helpers of [`BytecodeBuilder`]. Resolve it
/// with [`BytecodeBuilder::bind`] or [`BytecodeBuilder::bind_to`].
#[derive(Debug)]
#[must_use = "an unbound label leaves a zero target in the code"]
pub struct Label {
    /// Position of the u32 target bytes in the buffer.
    patch_pos: usize,
}

/// Builds a bytecode byte sequence.
///
/// Jump, call and closure targets are absolute offsets into the code
/// region being built.
pub struct BytecodeBuilder {
    buf: Vec<u8>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Current byte offset in the bytecode stream.
    pub fn current_offset(&self) -> u32 {
        self.buf.len() as u32
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    // ── emit helpers ───────────────────────────────────────────────

    fn emit_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn emit_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn emit_op(&mut self, op: Op) {
        self.buf.push(op as u8);
    }

    /// Append raw bytes, e.g. to produce deliberately malformed code.
    pub fn emit_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Encode one instruction.
    pub fn emit(&mut self, instruction: &Instruction) {
        match instruction {
            Instruction::Binop(op) => self.emit_op(binop_op(*op)),
            Instruction::Const { value } => {
                self.emit_op(Op::Const);
                self.emit_i32(*value);
            }
            Instruction::String { string } => {
                self.emit_op(Op::String);
                self.emit_u32(*string);
            }
            Instruction::Sexp { tag, arity } => {
                self.emit_op(Op::Sexp);
                self.emit_u32(*tag);
                self.emit_u32(*arity);
            }
            Instruction::Sti => self.emit_op(Op::Sti),
            Instruction::Sta => self.emit_op(Op::Sta),
            Instruction::Jump { target } => {
                self.emit_op(Op::Jmp);
                self.emit_u32(*target);
            }
            Instruction::End => self.emit_op(Op::End),
            Instruction::Ret => self.emit_op(Op::Ret),
            Instruction::Drop => self.emit_op(Op::Drop),
            Instruction::Dup => self.emit_op(Op::Dup),
            Instruction::Swap => self.emit_op(Op::Swap),
            Instruction::Elem => self.emit_op(Op::Elem),
            Instruction::Load(var) => {
                let op = var_op(var.designation, [Op::LdGlobal, Op::LdLocal, Op::LdArg, Op::LdCaptured]);
                self.emit_op(op);
                self.emit_i32(var.index);
            }
            Instruction::LoadAddr(var) => {
                let op = var_op(var.designation, [Op::LdaGlobal, Op::LdaLocal, Op::LdaArg, Op::LdaCaptured]);
                self.emit_op(op);
                self.emit_i32(var.index);
            }
            Instruction::Store(var) => {
                let op = var_op(var.designation, [Op::StGlobal, Op::StLocal, Op::StArg, Op::StCaptured]);
                self.emit_op(op);
                self.emit_i32(var.index);
            }
            Instruction::JumpIfZero { target } => {
                self.emit_op(Op::CjmpZ);
                self.emit_u32(*target);
            }
            Instruction::JumpIfNonZero { target } => {
                self.emit_op(Op::CjmpNz);
                self.emit_u32(*target);
            }
            Instruction::Begin { nargs, nlocals } => {
                self.emit_op(Op::Begin);
                self.emit_u32(*nargs);
                self.emit_u32(*nlocals);
            }
            Instruction::ClosureBegin { nargs, nlocals } => {
                self.emit_op(Op::CBegin);
                self.emit_u32(*nargs);
                self.emit_u32(*nlocals);
            }
            Instruction::Closure { entry, captures } => {
                self.emit_op(Op::Closure);
                self.emit_u32(*entry);
                self.emit_captures(captures);
            }
            Instruction::CallClosure { nargs } => {
                self.emit_op(Op::CallC);
                self.emit_u32(*nargs);
            }
            Instruction::Call { target, nargs } => {
                self.emit_op(Op::Call);
                self.emit_u32(*target);
                self.emit_u32(*nargs);
            }
            Instruction::Tag { tag, arity } => {
                self.emit_op(Op::Tag);
                self.emit_u32(*tag);
                self.emit_u32(*arity);
            }
            Instruction::ArrayPattern { len } => {
                self.emit_op(Op::Array);
                self.emit_u32(*len);
            }
            Instruction::Fail { line, column } => {
                self.emit_op(Op::Fail);
                self.emit_u32(*line);
                self.emit_u32(*column);
            }
            Instruction::Line { line } => {
                self.emit_op(Op::Line);
                self.emit_u32(*line);
            }
            Instruction::Pattern(pattern) => self.emit_op(pattern_op(*pattern)),
            Instruction::Read => self.emit_op(Op::Read),
            Instruction::Write => self.emit_op(Op::Write),
            Instruction::Length => self.emit_op(Op::Length),
            Instruction::Stringify => self.emit_op(Op::Stringify),
            Instruction::MakeArray { len } => {
                self.emit_op(Op::MakeArray);
                self.emit_u32(*len);
            }
        }
    }

    fn emit_captures(&mut self, captures: &[Var]) {
        self.emit_u32(captures.len() as u32);
        for var in captures {
            self.emit_u8(var.designation as u8);
            self.emit_i32(var.index);
        }
    }

    // ── shorthands ─────────────────────────────────────────────────

    pub fn binop(&mut self, op: BinOp) {
        self.emit(&Instruction::Binop(op));
    }

    pub fn const_(&mut self, value: i32) {
        self.emit(&Instruction::Const { value });
    }

    pub fn string(&mut self, string: u32) {
        self.emit(&Instruction::String { string });
    }

    pub fn load(&mut self, var: Var) {
        self.emit(&Instruction::Load(var));
    }

    pub fn load_addr(&mut self, var: Var) {
        self.emit(&Instruction::LoadAddr(var));
    }

    pub fn store(&mut self, var: Var) {
        self.emit(&Instruction::Store(var));
    }

    pub fn begin(&mut self, nargs: u32, nlocals: u32) {
        self.emit(&Instruction::Begin { nargs, nlocals });
    }

    pub fn end(&mut self) {
        self.emit(&Instruction::End);
    }

    pub fn drop_(&mut self) {
        self.emit(&Instruction::Drop);
    }

    pub fn call(&mut self, target: u32, nargs: u32) {
        self.emit(&Instruction::Call { target, nargs });
    }

    // ── forward references ─────────────────────────────────────────

    /// `JMP` to a label bound later.
    pub fn jump_forward(&mut self) -> Label {
        self.emit_op(Op::Jmp);
        self.target_placeholder()
    }

    /// `CJMPz` to a label bound later.
    pub fn jump_if_zero_forward(&mut self) -> Label {
        self.emit_op(Op::CjmpZ);
        self.target_placeholder()
    }

    /// `CJMPnz` to a label bound later.
    pub fn jump_if_nonzero_forward(&mut self) -> Label {
        self.emit_op(Op::CjmpNz);
        self.target_placeholder()
    }

    /// `CALL` to a function emitted later.
    pub fn call_forward(&mut self, nargs: u32) -> Label {
        self.emit_op(Op::Call);
        let label = self.target_placeholder();
        self.emit_u32(nargs);
        label
    }

    /// `CLOSURE` whose entry is emitted later.
    pub fn closure_forward(&mut self, captures: &[Var]) -> Label {
        self.emit_op(Op::Closure);
        let label = self.target_placeholder();
        self.emit_captures(captures);
        label
    }

    /// Bind a label to the current position.
    pub fn bind(&mut self, label: Label) {
        let target = self.current_offset();
        self.bind_to(label, target);
    }

    /// Bind a label to an explicit code offset.
    pub fn bind_to(&mut self, label: Label, target: u32) {
        self.buf[label.patch_pos..label.patch_pos + 4]
            .copy_from_slice(&target.to_le_bytes());
    }

    fn target_placeholder(&mut self) -> Label {
        let patch_pos = self.buf.len();
        self.emit_u32(0);
        Label { patch_pos }
    }
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn binop_op(op: BinOp) -> Op {
    match op {
        BinOp::Add => Op::Add,
        BinOp::Sub => Op::Sub,
        BinOp::Mul => Op::Mul,
        BinOp::Div => Op::Div,
        BinOp::Mod => Op::Mod,
        BinOp::Lt => Op::Lt,
        BinOp::Le => Op::Le,
        BinOp::Gt => Op::Gt,
        BinOp::Ge => Op::Ge,
        BinOp::Eq => Op::Eq,
        BinOp::Ne => Op::Ne,
        BinOp::And => Op::And,
        BinOp::Or => Op::Or,
    }
}

fn pattern_op(pattern: Pattern) -> Op {
    match pattern {
        Pattern::StrEq => Op::PattStrEq,
        Pattern::String => Op::PattString,
        Pattern::Array => Op::PattArray,
        Pattern::Sexp => Op::PattSexp,
        Pattern::Boxed => Op::PattBoxed,
        Pattern::Unboxed => Op::PattUnboxed,
        Pattern::Closure => Op::PattClosure,
    }
}

/// Pick the opcode of a variable family (`[global, local, arg, captured]`).
fn var_op(designation: Designation, family: [Op; 4]) -> Op {
    family[designation as usize]
}
