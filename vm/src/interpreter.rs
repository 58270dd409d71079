use bytecode::{BinOp, Designation, Instruction, Pattern, Var};
use heap::{ObjectError, ObjectRuntime, RootRange};
use log::{debug, trace};
use object::{Handle, ObjectKind, Value, VarRef};

use crate::{RuntimeError, VM, VmError};

/// What `CALL`/`CALLC` leave behind for the callee's prologue.
#[derive(Debug, Clone, Copy)]
struct PendingCall {
    return_address: u32,
    closure: bool,
}

pub struct InterpreterState {
    /// Offset of the next instruction in the code region.
    ip: u32,
    pending: Option<PendingCall>,
    steps: u64,
}

impl InterpreterState {
    fn new() -> Self {
        Self {
            ip: 0,
            // The entry function is "called" by the root pseudo-frame.
            pending: Some(PendingCall {
                return_address: 0,
                closure: false,
            }),
            steps: 0,
        }
    }
}

enum Flow {
    Continue,
    Halt,
}

/// Run `vm` from the start of its code until the outermost function ends.
///
/// Errors carry the offset of the instruction that raised them.
pub fn interpret<R: ObjectRuntime>(vm: &mut VM<R>) -> Result<(), VmError> {
    let mut state = InterpreterState::new();
    vm.runtime.init();

    loop {
        let offset = state.ip;
        match step(vm, &mut state) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Halt) => {
                debug!("halted after {} instructions", state.steps);
                return Ok(());
            }
            Err(error) => {
                debug!("failed at {offset:#06x} after {} instructions", state.steps);
                return Err(VmError::Execution { offset, error });
            }
        }
    }
}

fn step<R: ObjectRuntime>(
    vm: &mut VM<R>,
    state: &mut InterpreterState,
) -> Result<Flow, RuntimeError> {
    let offset = state.ip;
    let mut decoder = vm.image.address_for(offset)?;
    let instruction = decoder.decode()?;
    state.ip = decoder.offset() as u32;
    state.steps += 1;
    trace!("{offset:#06x}: {instruction}");
    execute(vm, state, instruction)
}

fn execute<R: ObjectRuntime>(
    vm: &mut VM<R>,
    state: &mut InterpreterState,
    instruction: Instruction,
) -> Result<Flow, RuntimeError> {
    match instruction {
        Instruction::Binop(op) => {
            let rhs = vm.stack.pop()?;
            let lhs = vm.stack.pop()?;
            vm.stack.push(binop(op, lhs, rhs)?)?;
        }
        Instruction::Const { value } => vm.stack.push(Value::from_i32(value))?,
        Instruction::String { string } => {
            scan_roots(vm);
            let bytes = vm.image.string_at(string)?;
            let value = vm.runtime.string(bytes)?;
            vm.stack.push(value)?;
        }
        Instruction::Sexp { tag, arity } => {
            let hash = vm.runtime.tag_hash(vm.image.string_at(tag)?)?;
            construct(vm, arity as usize, |rt, fields| rt.sexp(hash, fields))?;
        }
        Instruction::Sti => {
            let value = vm.stack.pop()?;
            let target = vm.stack.pop()?;
            let Value::Handle(Handle::Var(var)) = target else {
                return Err(RuntimeError::NotAReference(target));
            };
            *ref_slot(vm, var)? = value;
            vm.stack.push(value)?;
        }
        Instruction::Sta => {
            let value = vm.stack.pop()?;
            let index = vm.stack.pop_int()?;
            let aggregate = vm.stack.pop()?;
            vm.runtime.store_elem(aggregate, index, value)?;
            vm.stack.push(value)?;
        }
        Instruction::Jump { target } => jump(vm, state, target)?,
        Instruction::End | Instruction::Ret => match vm.stack.end_function()? {
            Some(address) => state.ip = address,
            None => return Ok(Flow::Halt),
        },
        Instruction::Drop => {
            vm.stack.pop()?;
        }
        Instruction::Dup => {
            let top = vm.stack.peek()?;
            vm.stack.push(top)?;
        }
        Instruction::Swap => vm.stack.swap()?,
        Instruction::Elem => {
            let index = vm.stack.pop_int()?;
            let aggregate = vm.stack.pop()?;
            let elem = vm.runtime.elem(aggregate, index)?;
            vm.stack.push(elem)?;
        }

        // ── variables ──────────────────────────────────────────────
        Instruction::Load(var) => {
            let value = *var_slot(vm, var)?;
            vm.stack.push(value)?;
        }
        Instruction::LoadAddr(var) => {
            let reference = var_ref(vm, var)?;
            vm.stack.push(Value::var(reference))?;
        }
        Instruction::Store(var) => {
            let value = vm.stack.peek()?;
            *var_slot(vm, var)? = value;
        }

        // ── control ────────────────────────────────────────────────
        Instruction::JumpIfZero { target } => {
            if vm.stack.pop_int()? == 0 {
                jump(vm, state, target)?;
            }
        }
        Instruction::JumpIfNonZero { target } => {
            if vm.stack.pop_int()? != 0 {
                jump(vm, state, target)?;
            }
        }
        Instruction::Begin { nargs, nlocals }
        | Instruction::ClosureBegin { nargs, nlocals } => {
            let call = state.pending.take().ok_or(RuntimeError::BeginWithoutCall)?;
            vm.stack.begin_function(
                nargs as usize,
                nlocals as usize,
                call.closure,
                call.return_address,
            )?;
        }
        Instruction::Closure { entry, captures } => {
            vm.image.check_code_offset(entry)?;
            for var in &captures {
                let value = *var_slot(vm, *var)?;
                vm.stack.push(value)?;
            }
            construct(vm, captures.len(), |rt, captured| rt.closure(entry, captured))?;
        }
        Instruction::CallClosure { nargs } => {
            let closure = vm.stack.peek_at(nargs as usize)?;
            let entry = vm.runtime.closure_entry(closure)?;
            call(vm, state, entry, true)?;
        }
        Instruction::Call { target, .. } => call(vm, state, target, false)?,

        // ── patterns ───────────────────────────────────────────────
        Instruction::Tag { tag, arity } => {
            let hash = vm.runtime.tag_hash(vm.image.string_at(tag)?)?;
            let value = vm.stack.pop()?;
            let matches = vm.runtime.tag_matches(value, hash, arity as i32);
            vm.stack.push(Value::from_bool(matches))?;
        }
        Instruction::ArrayPattern { len } => {
            let value = vm.stack.pop()?;
            let matches = vm.runtime.array_matches(value, len as i32);
            vm.stack.push(Value::from_bool(matches))?;
        }
        Instruction::Fail { line, column } => {
            let value = vm.stack.pop()?;
            return Err(vm.runtime.match_failure(value, line, column).into());
        }
        Instruction::Line { line } => trace!("line {line}"),
        Instruction::Pattern(pattern) => {
            let matches = match pattern {
                Pattern::StrEq => {
                    let expected = vm.stack.pop()?;
                    let value = vm.stack.pop()?;
                    vm.runtime.string_matches(value, expected)
                }
                Pattern::String => vm.runtime.is_kind(vm.stack.pop()?, ObjectKind::String),
                Pattern::Array => vm.runtime.is_kind(vm.stack.pop()?, ObjectKind::Array),
                Pattern::Sexp => vm.runtime.is_kind(vm.stack.pop()?, ObjectKind::Sexp),
                Pattern::Closure => vm.runtime.is_kind(vm.stack.pop()?, ObjectKind::Closure),
                Pattern::Boxed => vm.stack.pop()?.is_handle(),
                Pattern::Unboxed => vm.stack.pop()?.is_int(),
            };
            vm.stack.push(Value::from_bool(matches))?;
        }

        // ── built-ins ──────────────────────────────────────────────
        Instruction::Read => {
            let n = vm.runtime.read_int()?;
            vm.stack.push(Value::from_i32(n))?;
        }
        Instruction::Write => {
            let n = vm.stack.pop_int()?;
            vm.runtime.write_int(n)?;
            vm.stack.push(Value::Int(0))?;
        }
        Instruction::Length => {
            let value = vm.stack.pop()?;
            let len = vm.runtime.length(value)?;
            vm.stack.push(Value::from_i32(len))?;
        }
        Instruction::Stringify => construct(vm, 1, |rt, value| rt.render(value[0]))?,
        Instruction::MakeArray { len } => {
            construct(vm, len as usize, |rt, elems| rt.array(elems))?;
        }
    }
    Ok(Flow::Continue)
}

// ── helpers ────────────────────────────────────────────────────────────

/// Let the collector see the live stack and the globals before an
/// allocation.
fn scan_roots<R: ObjectRuntime>(vm: &mut VM<R>) {
    let roots = RootRange {
        stack: vm.stack.live(),
        globals: vm.globals.as_slice(),
    };
    vm.runtime.scan(&roots);
}

/// Replace the top `n` operands with the object `build` makes of them.
/// The operands stay on the stack, and so stay rooted, until the object
/// exists.
fn construct<R: ObjectRuntime>(
    vm: &mut VM<R>,
    n: usize,
    build: impl FnOnce(&mut R, &[Value]) -> Result<Value, ObjectError>,
) -> Result<(), RuntimeError> {
    vm.stack.top_slice(n)?;
    scan_roots(vm);
    let value = build(&mut vm.runtime, vm.stack.top_slice(n)?)?;
    vm.stack.pop_n(n)?;
    vm.stack.push(value)
}

fn jump<R>(vm: &VM<R>, state: &mut InterpreterState, target: u32) -> Result<(), RuntimeError> {
    vm.image.check_code_offset(target)?;
    state.ip = target;
    Ok(())
}

fn call<R>(
    vm: &VM<R>,
    state: &mut InterpreterState,
    target: u32,
    closure: bool,
) -> Result<(), RuntimeError> {
    vm.image.check_code_offset(target)?;
    state.pending = Some(PendingCall {
        return_address: state.ip,
        closure,
    });
    state.ip = target;
    Ok(())
}

fn var_slot<R: ObjectRuntime>(vm: &mut VM<R>, var: Var) -> Result<&mut Value, RuntimeError> {
    match var.designation {
        Designation::Global => vm.globals.get_mut(var.index),
        Designation::Local => vm.stack.local_mut(var.index),
        Designation::Arg => vm.stack.arg_mut(var.index),
        Designation::Captured => {
            let closure = vm.stack.closure()?;
            Ok(vm.runtime.captured_slot(closure, var.index)?)
        }
    }
}

fn var_ref<R: ObjectRuntime>(vm: &mut VM<R>, var: Var) -> Result<VarRef, RuntimeError> {
    match var.designation {
        Designation::Global => {
            vm.globals.get_mut(var.index)?;
            Ok(VarRef::Global(var.index as u32))
        }
        Designation::Local => vm.stack.local_ref(var.index),
        Designation::Arg => vm.stack.arg_ref(var.index),
        Designation::Captured => {
            let closure = vm.stack.closure()?;
            vm.runtime.captured_slot(closure, var.index)?;
            Ok(VarRef::Captured {
                closure,
                index: var.index as u32,
            })
        }
    }
}

fn ref_slot<R: ObjectRuntime>(vm: &mut VM<R>, var: VarRef) -> Result<&mut Value, RuntimeError> {
    match var {
        VarRef::Global(index) => vm.globals.get_mut(index as i32),
        VarRef::Stack { slot, frame } => vm.stack.slot_mut(slot, frame),
        VarRef::Captured { closure, index } => {
            Ok(vm.runtime.captured_slot(closure, index as i32)?)
        }
    }
}

/// Equality is raw value identity; every other operator needs integers.
fn binop(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match op {
        BinOp::Eq => return Ok(Value::from_bool(lhs == rhs)),
        BinOp::Ne => return Ok(Value::from_bool(lhs != rhs)),
        _ => {}
    }

    let a = lhs.as_int()?;
    let b = rhs.as_int()?;
    let result = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div | BinOp::Mod if b == 0 => return Err(RuntimeError::DivisionByZero),
        BinOp::Div => a.wrapping_div(b),
        BinOp::Mod => a.wrapping_rem(b),
        BinOp::Lt => (a < b) as i32,
        BinOp::Le => (a <= b) as i32,
        BinOp::Gt => (a > b) as i32,
        BinOp::Ge => (a >= b) as i32,
        BinOp::Eq => (a == b) as i32,
        BinOp::Ne => (a != b) as i32,
        BinOp::And => (a != 0 && b != 0) as i32,
        BinOp::Or => (a != 0 || b != 0) as i32,
    };
    Ok(Value::from_i32(result))
}
