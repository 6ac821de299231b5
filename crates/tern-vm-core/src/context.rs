//! VM execution context
//!
//! The context holds per-run state: the call stack, statics, the step counter
//! and the materialized constant pool. It is created fresh for every run and
//! never shared.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tern_vm_bytecode::{ConstantIndex, FunctionIndex, Program, Slot};

use crate::config::VmConfig;
use crate::error::{VmError, VmResult};
use crate::value::Value;

/// An active protected region
#[derive(Debug, Clone)]
pub struct Handler {
    /// Instruction the handler transfers to
    pub catch_pc: usize,
    /// Catch type name from the constant pool
    pub catch_type: Rc<str>,
}

/// A call stack frame
#[derive(Debug)]
pub struct CallFrame {
    /// Executing function
    pub function: FunctionIndex,
    /// Program counter (instruction index)
    pub pc: usize,
    /// Value slots, sized by the function's highest slot
    pub slots: Vec<Value>,
    /// Handlers pushed in this frame, innermost last
    pub handlers: Vec<Handler>,
    /// Caller slot receiving the return value
    pub return_slot: Option<Slot>,
}

/// Per-run execution state
pub struct VmContext {
    call_stack: Vec<CallFrame>,
    constants: Vec<Value>,
    statics: FxHashMap<(Rc<str>, Rc<str>), Value>,
    /// Exception staged by dispatch for the next `CatchBind`
    caught: Option<Value>,
    steps: u64,
    max_steps: u64,
    max_call_depth: usize,
}

impl VmContext {
    /// Create a context for one run of `program`
    pub fn new(program: &Program, config: &VmConfig) -> Self {
        Self {
            call_stack: Vec::with_capacity(16),
            constants: program.constants().iter().map(Value::from_constant).collect(),
            statics: FxHashMap::default(),
            caught: None,
            steps: 0,
            max_steps: config.max_steps,
            max_call_depth: config.max_call_depth,
        }
    }

    /// Push a new call frame with `args` in the leading slots
    pub fn push_frame(
        &mut self,
        function: FunctionIndex,
        slot_count: usize,
        args: Vec<Value>,
        return_slot: Option<Slot>,
    ) -> VmResult<()> {
        if self.call_stack.len() >= self.max_call_depth {
            return Err(VmError::StackOverflow {
                depth: self.max_call_depth,
            });
        }

        let mut slots = args;
        slots.resize(slot_count.max(slots.len()), Value::Void);

        self.call_stack.push(CallFrame {
            function,
            pc: 0,
            slots,
            handlers: Vec::new(),
            return_slot,
        });
        Ok(())
    }

    /// Pop the current call frame
    pub fn pop_frame(&mut self) -> Option<CallFrame> {
        self.call_stack.pop()
    }

    /// Get current call frame
    #[inline]
    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.call_stack.last()
    }

    /// Get current call frame mutably
    #[inline]
    pub fn current_frame_mut(&mut self) -> Option<&mut CallFrame> {
        self.call_stack.last_mut()
    }

    fn frame(&self) -> VmResult<&CallFrame> {
        self.current_frame()
            .ok_or_else(|| VmError::internal("no call frame"))
    }

    fn frame_mut(&mut self) -> VmResult<&mut CallFrame> {
        self.current_frame_mut()
            .ok_or_else(|| VmError::internal("no call frame"))
    }

    /// Get call stack depth
    #[inline]
    pub fn stack_depth(&self) -> usize {
        self.call_stack.len()
    }

    /// Get program counter
    #[inline]
    pub fn pc(&self) -> usize {
        self.current_frame().map(|f| f.pc).unwrap_or(0)
    }

    /// Set program counter
    #[inline]
    pub fn set_pc(&mut self, pc: usize) {
        if let Some(frame) = self.current_frame_mut() {
            frame.pc = pc;
        }
    }

    /// Increment program counter
    #[inline]
    pub fn advance_pc(&mut self) {
        if let Some(frame) = self.current_frame_mut() {
            frame.pc += 1;
        }
    }

    /// Read a slot of the current frame
    #[inline]
    pub fn slot(&self, slot: Slot) -> VmResult<Value> {
        self.frame()?
            .slots
            .get(slot.index())
            .cloned()
            .ok_or_else(|| VmError::internal(format!("slot {} out of bounds", slot.index())))
    }

    /// Write a slot of the current frame
    #[inline]
    pub fn set_slot(&mut self, slot: Slot, value: Value) -> VmResult<()> {
        let frame = self.frame_mut()?;
        match frame.slots.get_mut(slot.index()) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(VmError::internal(format!(
                "slot {} out of bounds",
                slot.index()
            ))),
        }
    }

    /// Count one executed instruction against the budget
    #[inline]
    pub fn tick(&mut self) -> VmResult<()> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(VmError::StepBudgetExceeded {
                limit: self.max_steps,
            });
        }
        Ok(())
    }

    /// Instructions executed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Materialized constant
    #[inline]
    pub fn constant(&self, idx: ConstantIndex) -> VmResult<&Value> {
        self.constants
            .get(idx.index() as usize)
            .ok_or_else(|| VmError::internal(format!("constant #{} out of bounds", idx.index())))
    }

    /// String constant, shared with the pool
    pub fn constant_str(&self, idx: ConstantIndex) -> VmResult<Rc<str>> {
        match self.constant(idx)? {
            Value::Str(s) => Ok(Rc::clone(s)),
            other => Err(VmError::internal(format!(
                "constant #{} is {}, not a string",
                idx.index(),
                other.type_name()
            ))),
        }
    }

    /// Read a static field; unset statics are `Void`
    pub fn get_static(&self, class: Rc<str>, field: Rc<str>) -> Value {
        self.statics
            .get(&(class, field))
            .cloned()
            .unwrap_or_default()
    }

    /// Write a static field
    pub fn set_static(&mut self, class: Rc<str>, field: Rc<str>, value: Value) {
        self.statics.insert((class, field), value);
    }

    /// Stage a caught exception for `CatchBind`
    pub fn stage_caught(&mut self, value: Value) {
        self.caught = Some(value);
    }

    /// Take the staged exception
    pub fn take_caught(&mut self) -> Option<Value> {
        self.caught.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_vm_bytecode::{ConstantPool, Instruction, LoaderOptions, load, write_container};

    fn empty_program() -> Program {
        let bytes = write_container(
            &ConstantPool::new(),
            std::iter::empty::<(&str, &[Instruction])>(),
        );
        load(&bytes, &LoaderOptions::default()).unwrap()
    }

    #[test]
    fn test_push_frame_places_args_and_limits_depth() {
        let program = empty_program();
        let config = VmConfig {
            max_call_depth: 2,
            ..VmConfig::default()
        };
        let mut ctx = VmContext::new(&program, &config);

        ctx.push_frame(FunctionIndex(0), 4, vec![Value::Int(7)], None)
            .unwrap();
        assert!(matches!(ctx.slot(Slot(0)).unwrap(), Value::Int(7)));
        assert!(matches!(ctx.slot(Slot(3)).unwrap(), Value::Void));
        assert!(ctx.slot(Slot(4)).is_err());

        ctx.push_frame(FunctionIndex(0), 4, Vec::new(), None).unwrap();
        assert!(matches!(
            ctx.push_frame(FunctionIndex(0), 4, Vec::new(), None),
            Err(VmError::StackOverflow { depth: 2 })
        ));
        assert_eq!(ctx.stack_depth(), 2);
    }

    #[test]
    fn test_step_budget() {
        let program = empty_program();
        let config = VmConfig {
            max_steps: 3,
            ..VmConfig::default()
        };
        let mut ctx = VmContext::new(&program, &config);
        for _ in 0..3 {
            ctx.tick().unwrap();
        }
        assert!(matches!(
            ctx.tick(),
            Err(VmError::StepBudgetExceeded { limit: 3 })
        ));
    }

    #[test]
    fn test_statics_default_to_void() {
        let program = empty_program();
        let mut ctx = VmContext::new(&program, &VmConfig::default());
        let (class, field): (Rc<str>, Rc<str>) = (Rc::from("Main"), Rc::from("count"));
        assert!(matches!(
            ctx.get_static(class.clone(), field.clone()),
            Value::Void
        ));
        ctx.set_static(class.clone(), field.clone(), Value::Int(3));
        assert!(matches!(ctx.get_static(class, field), Value::Int(3)));
    }
}
