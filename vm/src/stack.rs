//! The call/operand stack.
//!
//! One contiguous region holds every frame's arguments, locals and
//! operands. It grows upward:
//!
//! ```text
//! ... caller operands | [closure] args.. | locals.. | operands..
//!                                         ^ base
//! ```
//!
//! Argument `i` lives at `base - nargs + i`, local `i` at `base + i`. The
//! closure, when the frame was entered through one, sits just below the
//! arguments. Everything below the top is a live, tagged value, so the
//! whole region doubles as the collector's stack roots.

use std::mem;

use log::trace;
use object::{ObjectRef, Value, VarRef};

use crate::RuntimeError;

/// Operands the root pseudo-frame starts with, standing in for the entry
/// function's `argc` and `argv`.
pub const ROOT_OPERANDS: usize = 2;

/// An activation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Index of the first local.
    pub base: usize,
    pub nargs: usize,
    pub nlocals: usize,
    /// Entered through a closure call.
    pub closure: bool,
    pub return_address: u32,
    /// Activation id, strictly increasing from the root outward.
    pub activation: u64,
}

impl Frame {
    const ROOT: Frame = Frame {
        base: 0,
        nargs: 0,
        nlocals: 0,
        closure: false,
        return_address: 0,
        activation: 0,
    };

    fn operands_start(&self) -> usize {
        self.base + self.nlocals
    }

    fn args_start(&self) -> usize {
        self.base - self.nargs
    }

    /// First slot owned by this frame.
    fn extent_start(&self) -> usize {
        self.args_start() - self.closure as usize
    }
}

#[derive(Debug, Clone)]
pub struct CallStack {
    slots: Vec<Value>,
    frame: Frame,
    /// Saved caller frames, innermost last.
    frames: Vec<Frame>,
    activations: u64,
    capacity: usize,
}

impl CallStack {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Value::PLACEHOLDER; ROOT_OPERANDS],
            frame: Frame::ROOT,
            frames: Vec::new(),
            activations: 0,
            capacity,
        }
    }

    // ── extent ─────────────────────────────────────────────────────

    /// The live region, bottom to top. This is what the collector scans.
    pub fn live(&self) -> &[Value] {
        &self.slots
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Number of active function frames (the root pseudo-frame excluded).
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Live operands of the current frame.
    pub fn operand_count(&self) -> usize {
        self.slots.len() - self.frame.operands_start()
    }

    // ── operands ───────────────────────────────────────────────────

    pub fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.slots.len() >= self.capacity {
            return Err(RuntimeError::StackOverflow {
                capacity: self.capacity,
            });
        }
        self.slots.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        if self.operand_count() == 0 {
            return Err(RuntimeError::EmptyOperandStack);
        }
        self.slots.pop().ok_or(RuntimeError::EmptyOperandStack)
    }

    pub fn pop_int(&mut self) -> Result<i32, RuntimeError> {
        Ok(self.pop()?.as_int()?)
    }

    pub fn peek(&self) -> Result<Value, RuntimeError> {
        self.peek_at(0).map_err(|_| RuntimeError::EmptyOperandStack)
    }

    /// The operand `depth` entries below the top.
    pub fn peek_at(&self, depth: usize) -> Result<Value, RuntimeError> {
        self.ensure_operands(depth + 1)?;
        Ok(self.slots[self.slots.len() - 1 - depth])
    }

    pub fn pop_n(&mut self, n: usize) -> Result<(), RuntimeError> {
        self.ensure_operands(n)?;
        self.slots.truncate(self.slots.len() - n);
        Ok(())
    }

    /// The top `n` operands, deepest first.
    pub fn top_slice(&self, n: usize) -> Result<&[Value], RuntimeError> {
        self.ensure_operands(n)?;
        Ok(&self.slots[self.slots.len() - n..])
    }

    pub fn swap(&mut self) -> Result<(), RuntimeError> {
        self.ensure_operands(2)?;
        let top = self.slots.len() - 1;
        self.slots.swap(top, top - 1);
        Ok(())
    }

    fn ensure_operands(&self, expected: usize) -> Result<(), RuntimeError> {
        let found = self.operand_count();
        if found < expected {
            return Err(RuntimeError::NotEnoughOperands { expected, found });
        }
        Ok(())
    }

    // ── frames ─────────────────────────────────────────────────────

    /// Enter a function whose `nargs` arguments (plus the closure, for a
    /// closure call) are the caller's top operands.
    ///
    /// Locals are reserved filled with [`Value::PLACEHOLDER`].
    pub fn begin_function(
        &mut self,
        nargs: usize,
        nlocals: usize,
        closure: bool,
        return_address: u32,
    ) -> Result<(), RuntimeError> {
        self.ensure_operands(nargs + closure as usize)?;
        let base = self.slots.len();
        if nlocals > self.capacity.saturating_sub(base) {
            return Err(RuntimeError::StackOverflow {
                capacity: self.capacity,
            });
        }

        self.activations += 1;
        let caller = mem::replace(&mut self.frame, Frame {
            base,
            nargs,
            nlocals,
            closure,
            return_address,
            activation: self.activations,
        });
        self.frames.push(caller);
        self.slots.resize(base + nlocals, Value::PLACEHOLDER);

        trace!(
            "enter frame {}: {nargs} args, {nlocals} locals{}",
            self.frames.len(),
            if closure { ", closure" } else { "" }
        );
        Ok(())
    }

    /// Leave the current function, moving its single live operand to the
    /// caller.
    ///
    /// Returns the caller's resume address, or `None` once the outermost
    /// function has ended.
    pub fn end_function(&mut self) -> Result<Option<u32>, RuntimeError> {
        if self.frames.is_empty() {
            return Err(RuntimeError::NoFunctionToEnd);
        }
        let found = self.operand_count();
        if found != 1 {
            return Err(RuntimeError::ReturnOperands { found });
        }

        let result = self.pop()?;
        let ended = self.frame;
        self.slots.truncate(ended.extent_start());
        self.frame = self.frames.pop().ok_or(RuntimeError::NoFunctionToEnd)?;
        self.slots.push(result);

        trace!("leave frame {}", self.frames.len() + 1);
        if self.frames.is_empty() {
            Ok(None)
        } else {
            Ok(Some(ended.return_address))
        }
    }

    // ── variables ──────────────────────────────────────────────────

    fn local_index(&self, index: i32) -> Result<usize, RuntimeError> {
        let count = self.frame.nlocals;
        usize::try_from(index)
            .ok()
            .filter(|&i| i < count)
            .map(|i| self.frame.base + i)
            .ok_or(RuntimeError::LocalOutOfBounds { index, count })
    }

    fn arg_index(&self, index: i32) -> Result<usize, RuntimeError> {
        let count = self.frame.nargs;
        usize::try_from(index)
            .ok()
            .filter(|&i| i < count)
            .map(|i| self.frame.args_start() + i)
            .ok_or(RuntimeError::ArgOutOfBounds { index, count })
    }

    pub fn local_mut(&mut self, index: i32) -> Result<&mut Value, RuntimeError> {
        let at = self.local_index(index)?;
        Ok(&mut self.slots[at])
    }

    pub fn arg_mut(&mut self, index: i32) -> Result<&mut Value, RuntimeError> {
        let at = self.arg_index(index)?;
        Ok(&mut self.slots[at])
    }

    pub fn local_ref(&self, index: i32) -> Result<VarRef, RuntimeError> {
        Ok(self.stack_ref(self.local_index(index)?))
    }

    pub fn arg_ref(&self, index: i32) -> Result<VarRef, RuntimeError> {
        Ok(self.stack_ref(self.arg_index(index)?))
    }

    fn stack_ref(&self, slot: usize) -> VarRef {
        VarRef::Stack {
            slot: slot as u32,
            frame: self.frame.activation,
        }
    }

    /// The closure the current frame was entered through.
    pub fn closure(&self) -> Result<ObjectRef, RuntimeError> {
        if !self.frame.closure {
            return Err(RuntimeError::NotInClosure);
        }
        let value = self.slots[self.frame.extent_start()];
        value
            .as_object()
            .ok_or(RuntimeError::Object(heap::ObjectError::NotAnObject(value)))
    }

    /// Resolve a stack reference produced by [`local_ref`](Self::local_ref)
    /// or [`arg_ref`](Self::arg_ref).
    ///
    /// Fails once the owning frame has ended, even if the slot has since been
    /// reused by another frame.
    pub fn slot_mut(&mut self, slot: u32, frame: u64) -> Result<&mut Value, RuntimeError> {
        let dangling = RuntimeError::DanglingReference(VarRef::Stack { slot, frame });
        let active = self.frame.activation == frame
            || self
                .frames
                .binary_search_by_key(&frame, |f| f.activation)
                .is_ok();
        if !active {
            return Err(dangling);
        }
        self.slots.get_mut(slot as usize).ok_or(dangling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(slot: usize) -> Value {
        Value::object(ObjectRef::from_slot(slot))
    }

    #[test]
    fn root_frame_holds_two_operands() {
        let mut stack = CallStack::new(64);
        assert_eq!(stack.operand_count(), ROOT_OPERANDS);
        assert_eq!(stack.frame_depth(), 0);
        assert_eq!(stack.pop().unwrap(), Value::PLACEHOLDER);
    }

    #[test]
    fn push_pop_peek() {
        let mut stack = CallStack::new(64);
        stack.push(Value::Int(1)).unwrap();
        stack.push(Value::Int(2)).unwrap();
        assert_eq!(stack.peek().unwrap(), Value::Int(2));
        assert_eq!(stack.peek_at(1).unwrap(), Value::Int(1));
        stack.swap().unwrap();
        assert_eq!(stack.pop_int().unwrap(), 1);
        assert_eq!(stack.top_slice(2).unwrap(), &[Value::PLACEHOLDER, Value::Int(2)]);
        stack.pop_n(3).unwrap();
        assert!(matches!(stack.pop(), Err(RuntimeError::EmptyOperandStack)));
        assert!(matches!(stack.peek(), Err(RuntimeError::EmptyOperandStack)));
    }

    #[test]
    fn pop_int_rejects_handles() {
        let mut stack = CallStack::new(64);
        stack.push(handle(0)).unwrap();
        assert!(matches!(stack.pop_int(), Err(RuntimeError::Value(_))));
    }

    #[test]
    fn pop_n_checks_count() {
        let mut stack = CallStack::new(64);
        assert!(matches!(
            stack.pop_n(3),
            Err(RuntimeError::NotEnoughOperands { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn operands_do_not_reach_into_the_caller() {
        let mut stack = CallStack::new(64);
        stack.begin_function(2, 0, false, 0).unwrap();
        assert_eq!(stack.operand_count(), 0);
        assert!(matches!(stack.pop(), Err(RuntimeError::EmptyOperandStack)));
        assert!(stack.swap().is_err());
    }

    #[test]
    fn begin_requires_arguments() {
        let mut stack = CallStack::new(64);
        stack.pop_n(2).unwrap();
        stack.push(Value::Int(1)).unwrap();
        let err = stack.begin_function(2, 0, false, 7).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::NotEnoughOperands { expected: 2, found: 1 }
        ));
        assert_eq!(err.to_string(), "expected 2 operands, but found operand stack of size 1");
        assert_eq!(stack.frame_depth(), 0);
    }

    #[test]
    fn closure_call_consumes_the_closure_too() {
        let mut stack = CallStack::new(64);
        stack.pop_n(2).unwrap();
        stack.push(Value::Int(5)).unwrap();
        assert!(stack.begin_function(1, 0, true, 0).is_err());

        stack.pop_n(1).unwrap();
        stack.push(handle(3)).unwrap();
        stack.push(Value::Int(5)).unwrap();
        stack.begin_function(1, 0, true, 0).unwrap();
        assert_eq!(stack.closure().unwrap(), ObjectRef::from_slot(3));
        assert_eq!(*stack.arg_mut(0).unwrap(), Value::Int(5));
    }

    #[test]
    fn closure_access_requires_a_closure_frame() {
        let mut stack = CallStack::new(64);
        stack.begin_function(0, 0, false, 0).unwrap();
        assert!(matches!(stack.closure(), Err(RuntimeError::NotInClosure)));
    }

    #[test]
    fn locals_are_reserved_with_placeholders() {
        let mut stack = CallStack::new(64);
        // Leave handles behind in the region the next frame's locals reuse.
        stack.begin_function(0, 0, false, 0).unwrap();
        for slot in 0..4 {
            stack.push(handle(slot)).unwrap();
        }
        stack.pop_n(3).unwrap();
        stack.end_function().unwrap();
        stack.pop_n(1).unwrap();

        stack.begin_function(2, 3, false, 0).unwrap();
        let base = stack.frame().base;
        assert_eq!(&stack.live()[base..], &[Value::PLACEHOLDER; 3]);
        assert!(stack.live().iter().all(|v| v.is_int()));
    }

    #[test]
    fn variables_are_addressed_from_base() {
        let mut stack = CallStack::new(64);
        stack.pop_n(2).unwrap();
        stack.push(Value::Int(10)).unwrap();
        stack.push(Value::Int(11)).unwrap();
        stack.begin_function(2, 2, false, 0).unwrap();

        assert_eq!(*stack.arg_mut(0).unwrap(), Value::Int(10));
        assert_eq!(*stack.arg_mut(1).unwrap(), Value::Int(11));
        *stack.local_mut(1).unwrap() = Value::Int(42);
        assert_eq!(stack.local_ref(1).unwrap(), VarRef::Stack { slot: 3, frame: 1 });
        assert_eq!(stack.arg_ref(0).unwrap(), VarRef::Stack { slot: 0, frame: 1 });
        assert_eq!(*stack.slot_mut(3, 1).unwrap(), Value::Int(42));

        assert!(matches!(
            stack.local_mut(2),
            Err(RuntimeError::LocalOutOfBounds { index: 2, count: 2 })
        ));
        assert!(matches!(
            stack.arg_mut(-1),
            Err(RuntimeError::ArgOutOfBounds { index: -1, count: 2 })
        ));
        assert!(matches!(
            stack.slot_mut(4, 1),
            Err(RuntimeError::DanglingReference(VarRef::Stack { slot: 4, frame: 1 }))
        ));
    }

    #[test]
    fn references_die_with_their_frame() {
        let mut stack = CallStack::new(64);
        stack.begin_function(2, 1, false, 0).unwrap();
        let outer = stack.local_ref(0).unwrap();

        stack.begin_function(0, 1, false, 0x10).unwrap();
        let inner = stack.local_ref(0).unwrap();
        let VarRef::Stack { slot, frame } = outer else { unreachable!() };
        // A caller's slot stays reachable from a callee.
        *stack.slot_mut(slot, frame).unwrap() = Value::Int(5);
        stack.push(Value::Int(0)).unwrap();
        stack.end_function().unwrap();

        // The callee's local slot is reused by a live operand.
        stack.pop_n(1).unwrap();
        stack.push(Value::Int(7)).unwrap();
        let VarRef::Stack { slot, frame } = inner else { unreachable!() };
        assert!(slot < stack.live().len() as u32);
        assert!(matches!(
            stack.slot_mut(slot, frame),
            Err(RuntimeError::DanglingReference(_))
        ));
        assert_eq!(stack.peek().unwrap(), Value::Int(7));

        // A fresh activation over the same region gets a new id.
        stack.pop_n(1).unwrap();
        stack.begin_function(0, 1, false, 0x20).unwrap();
        assert_ne!(stack.local_ref(0).unwrap(), inner);
        assert!(stack.slot_mut(slot, frame).is_err());
    }

    #[test]
    fn end_requires_exactly_one_operand() {
        let mut stack = CallStack::new(64);
        stack.begin_function(2, 1, false, 0).unwrap();
        assert!(matches!(
            stack.end_function(),
            Err(RuntimeError::ReturnOperands { found: 0 })
        ));
        stack.push(Value::Int(1)).unwrap();
        stack.push(Value::Int(2)).unwrap();
        assert!(matches!(
            stack.end_function(),
            Err(RuntimeError::ReturnOperands { found: 2 })
        ));
    }

    #[test]
    fn end_restores_the_caller() {
        let mut stack = CallStack::new(64);
        stack.begin_function(2, 1, false, 0).unwrap();
        stack.push(Value::Int(8)).unwrap();
        stack.push(Value::Int(9)).unwrap();
        stack.begin_function(1, 2, false, 0x40).unwrap();
        assert_eq!(stack.frame_depth(), 2);

        stack.push(Value::Int(3)).unwrap();
        assert_eq!(stack.end_function().unwrap(), Some(0x40));
        assert_eq!(stack.frame_depth(), 1);
        assert_eq!(stack.top_slice(2).unwrap(), &[Value::Int(8), Value::Int(3)]);

        stack.pop_n(1).unwrap();
        assert_eq!(stack.end_function().unwrap(), None);
        assert_eq!(stack.live(), &[Value::Int(8)]);
    }

    #[test]
    fn nothing_to_end_at_the_root() {
        let mut stack = CallStack::new(64);
        assert!(matches!(
            stack.end_function(),
            Err(RuntimeError::NoFunctionToEnd)
        ));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut stack = CallStack::new(4);
        stack.push(Value::Int(1)).unwrap();
        stack.push(Value::Int(2)).unwrap();
        assert!(matches!(
            stack.push(Value::Int(3)),
            Err(RuntimeError::StackOverflow { capacity: 4 })
        ));
        assert!(matches!(
            stack.begin_function(0, 1, false, 0),
            Err(RuntimeError::StackOverflow { .. })
        ));
    }
}
