//! Bytecode interpreter
//!
//! Executes verified programs. Frames live on an explicit stack in
//! [`VmContext`]; calls and exceptions never recurse on the host stack.

use std::cmp::Ordering;

use tern_vm_bytecode::{
    CallArgs, ENTRY_POINT, Function, FunctionIndex, Instruction, Program, Slot,
};
use tracing::{debug, trace};

use crate::config::VmConfig;
use crate::context::{Handler, VmContext};
use crate::error::{VmError, VmResult};
use crate::host::{Host, NativeError};
use crate::value::{Value, kinds};

/// The bytecode interpreter
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    config: VmConfig,
}

impl Interpreter {
    /// Create an interpreter with the given limits
    pub fn new(config: VmConfig) -> Self {
        Self { config }
    }

    /// Limits in effect
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Run the program's entry function
    pub fn run<H: Host>(&self, program: &Program, host: &mut H) -> VmResult<Value> {
        let entry = program
            .entry()
            .ok_or_else(|| VmError::MissingEntryPoint(ENTRY_POINT.to_string()))?;
        self.call(program, entry, Vec::new(), host)
    }

    /// Run one function with `args` in its leading slots
    pub fn call<H: Host>(
        &self,
        program: &Program,
        function: FunctionIndex,
        args: Vec<Value>,
        host: &mut H,
    ) -> VmResult<Value> {
        let func = program
            .function(function)
            .ok_or_else(|| VmError::internal(format!("no function #{}", function.index())))?;

        let mut ctx = VmContext::new(program, &self.config);
        ctx.push_frame(function, func.slot_count(), args, None)?;
        debug!(function = func.name(), "run start");

        let result = self.run_loop(program, &mut ctx, host);

        debug!(steps = ctx.steps(), ok = result.is_ok(), "run finished");
        result
    }

    /// Main execution loop
    fn run_loop<H: Host>(
        &self,
        program: &Program,
        ctx: &mut VmContext,
        host: &mut H,
    ) -> VmResult<Value> {
        loop {
            let frame = ctx
                .current_frame()
                .ok_or_else(|| VmError::internal("no frame"))?;
            let func = program
                .function(frame.function)
                .ok_or_else(|| VmError::internal("function not found"))?;

            // Falling off the end is an implicit `Return` of `Void`
            let Some(instruction) = func.instruction(frame.pc) else {
                if let Some(value) = Self::return_from_frame(ctx, Value::Void)? {
                    return Ok(value);
                }
                continue;
            };

            ctx.tick()?;

            match self.execute_instruction(instruction, func, ctx, host)? {
                Completion::Continue => {
                    ctx.advance_pc();
                }
                Completion::Jump(pc) => {
                    ctx.set_pc(pc);
                }
                Completion::Return(value) => {
                    if let Some(value) = Self::return_from_frame(ctx, value)? {
                        return Ok(value);
                    }
                }
                Completion::Call {
                    function,
                    args,
                    dst,
                } => {
                    ctx.advance_pc(); // Resume after the call

                    let callee = program
                        .function(function)
                        .ok_or_else(|| VmError::internal("callee not found"))?;
                    trace!(
                        caller = func.name(),
                        callee = callee.name(),
                        depth = ctx.stack_depth(),
                        "call"
                    );
                    ctx.push_frame(function, callee.slot_count(), args, dst)?;
                }
                Completion::Throw(value) => {
                    Self::dispatch_throw(program, ctx, value)?;
                }
            }
        }
    }

    /// Pop the current frame and deliver `value` to the caller
    ///
    /// Returns the run's result when the outermost frame returns.
    fn return_from_frame(ctx: &mut VmContext, value: Value) -> VmResult<Option<Value>> {
        let frame = ctx
            .pop_frame()
            .ok_or_else(|| VmError::internal("return with no frame"))?;
        if ctx.stack_depth() == 0 {
            return Ok(Some(value));
        }
        if let Some(slot) = frame.return_slot {
            ctx.set_slot(slot, value)?;
        }
        Ok(None)
    }

    /// Unwind to the nearest matching handler
    ///
    /// Each frame's handlers are searched innermost-first. On a match the
    /// handler stack is cut below the matched entry and the value is staged for
    /// `CatchBind`; otherwise the frame is discarded and the search continues in
    /// the caller.
    fn dispatch_throw(program: &Program, ctx: &mut VmContext, value: Value) -> VmResult<()> {
        trace!(value = %value, depth = ctx.stack_depth(), "throw");
        loop {
            let frame = ctx
                .current_frame_mut()
                .ok_or_else(|| VmError::internal("throw with no frame"))?;

            if let Some(pos) = frame
                .handlers
                .iter()
                .rposition(|h| catch_matches(&h.catch_type, &value))
            {
                let catch_pc = frame.handlers[pos].catch_pc;
                frame.handlers.truncate(pos);
                frame.pc = catch_pc;
                trace!(
                    function = program.function(frame.function).map(Function::name),
                    catch_pc,
                    "handler matched"
                );
                ctx.stage_caught(value);
                return Ok(());
            }

            if ctx.stack_depth() == 1 {
                return Err(VmError::UncaughtException(value));
            }
            ctx.pop_frame();
        }
    }

    /// Execute a single instruction
    fn execute_instruction<H: Host>(
        &self,
        instruction: &Instruction,
        func: &Function,
        ctx: &mut VmContext,
        host: &mut H,
    ) -> VmResult<Completion> {
        match *instruction {
            Instruction::Const { dst, idx } => {
                let value = ctx.constant(idx)?.clone();
                ctx.set_slot(dst, value)?;
                Ok(Completion::Continue)
            }

            Instruction::LoadLocal { src, dst } | Instruction::StoreLocal { src, dst } => {
                let value = ctx.slot(src)?;
                ctx.set_slot(dst, value)?;
                Ok(Completion::Continue)
            }

            Instruction::Add { lhs, rhs, dst } => binary(ctx, lhs, rhs, dst, Arith::Add),
            Instruction::Sub { lhs, rhs, dst } => binary(ctx, lhs, rhs, dst, Arith::Sub),
            Instruction::Mul { lhs, rhs, dst } => binary(ctx, lhs, rhs, dst, Arith::Mul),
            Instruction::Div { lhs, rhs, dst } => binary(ctx, lhs, rhs, dst, Arith::Div),

            Instruction::Eq { lhs, rhs, dst } => {
                let eq = ctx.slot(lhs)?.loose_eq(&ctx.slot(rhs)?);
                ctx.set_slot(dst, Value::Bool(eq))?;
                Ok(Completion::Continue)
            }
            Instruction::Neq { lhs, rhs, dst } => {
                let eq = ctx.slot(lhs)?.loose_eq(&ctx.slot(rhs)?);
                ctx.set_slot(dst, Value::Bool(!eq))?;
                Ok(Completion::Continue)
            }
            Instruction::Lt { lhs, rhs, dst } => compare(ctx, lhs, rhs, dst, Ordering::is_lt),
            Instruction::Le { lhs, rhs, dst } => compare(ctx, lhs, rhs, dst, Ordering::is_le),
            Instruction::Gt { lhs, rhs, dst } => compare(ctx, lhs, rhs, dst, Ordering::is_gt),
            Instruction::Ge { lhs, rhs, dst } => compare(ctx, lhs, rhs, dst, Ordering::is_ge),

            Instruction::Jump { target } => Ok(Completion::Jump(target.pc())),
            Instruction::JumpIfFalse { cond, target } => {
                if ctx.slot(cond)?.is_truthy() {
                    Ok(Completion::Continue)
                } else {
                    Ok(Completion::Jump(target.pc()))
                }
            }

            Instruction::Print { src, newline } => {
                let text = ctx.slot(src)?.to_string();
                host.print(&text, newline)?;
                Ok(Completion::Continue)
            }

            Instruction::Return { src } => {
                let value = match src {
                    Some(src) => ctx.slot(src)?,
                    None => Value::Void,
                };
                Ok(Completion::Return(value))
            }

            Instruction::Neg { src, dst } => {
                let result = match ctx.slot(src)? {
                    Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
                    Value::Float(n) => Ok(Value::Float(-n)),
                    other => Err(type_error(format!("cannot negate {}", other.type_name()))),
                };
                store_or_throw(ctx, dst, result)
            }
            Instruction::Not { src, dst } => {
                let value = !ctx.slot(src)?.is_truthy();
                ctx.set_slot(dst, Value::Bool(value))?;
                Ok(Completion::Continue)
            }

            Instruction::NewArray {
                size,
                dst,
                elem_type,
            } => {
                let elem_type = elem_type.map(|idx| ctx.constant_str(idx)).transpose()?;
                let result = match ctx.slot(size)? {
                    Value::Int(n) if n >= 0 && n as u64 <= self.config.max_array_len as u64 => {
                        let default = Value::default_for(elem_type.as_deref());
                        Ok(Value::array(vec![default; n as usize]))
                    }
                    Value::Int(n) => Err(Value::exception(
                        kinds::INDEX_OUT_OF_BOUNDS,
                        format!("invalid array size {n}"),
                    )),
                    other => Err(type_error(format!(
                        "array size must be num, got {}",
                        other.type_name()
                    ))),
                };
                store_or_throw(ctx, dst, result)
            }

            Instruction::LoadElem { array, index, dst } => {
                let result = element(&ctx.slot(array)?, &ctx.slot(index)?)
                    .map(|(items, i)| items.borrow()[i].clone());
                store_or_throw(ctx, dst, result)
            }

            Instruction::StoreElem {
                array,
                index,
                value,
            } => {
                let value = ctx.slot(value)?;
                match element(&ctx.slot(array)?, &ctx.slot(index)?) {
                    Ok((items, i)) => {
                        items.borrow_mut()[i] = value;
                        Ok(Completion::Continue)
                    }
                    Err(exception) => Ok(Completion::Throw(exception)),
                }
            }

            Instruction::ArrayLength { array, dst } => {
                let result = match ctx.slot(array)? {
                    Value::Array(items) => Ok(Value::Int(items.borrow().len() as i64)),
                    Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                    other => Err(type_error(format!(
                        "cannot take length of {}",
                        other.type_name()
                    ))),
                };
                store_or_throw(ctx, dst, result)
            }

            Instruction::Call {
                func: function,
                args,
                dst,
            } => {
                let args = args
                    .iter()
                    .map(|arg| arg.map_or(Ok(Value::Void), |slot| ctx.slot(slot)))
                    .collect::<VmResult<Vec<_>>>()?;
                Ok(Completion::Call {
                    function,
                    args,
                    dst,
                })
            }

            Instruction::CallNative { name, args, dst } => {
                let name = ctx.constant_str(name)?;
                let args = present_args(ctx, &args)?;
                trace!(native = &*name, argc = args.len(), "native call");
                match host.call_native(&name, &args) {
                    Ok(value) => {
                        if let Some(dst) = dst {
                            ctx.set_slot(dst, value)?;
                        }
                        Ok(Completion::Continue)
                    }
                    Err(NativeError::Throw(exception)) => Ok(Completion::Throw(exception)),
                    Err(NativeError::Unknown(name)) => Err(VmError::UnknownNative(name)),
                }
            }

            Instruction::GetStatic { class, field, dst } => {
                let value = ctx.get_static(ctx.constant_str(class)?, ctx.constant_str(field)?);
                ctx.set_slot(dst, value)?;
                Ok(Completion::Continue)
            }
            Instruction::SetStatic { class, field, src } => {
                let (class, field) = (ctx.constant_str(class)?, ctx.constant_str(field)?);
                let value = ctx.slot(src)?;
                ctx.set_static(class, field, value);
                Ok(Completion::Continue)
            }

            Instruction::GetField { object, field, dst } => {
                let field = ctx.constant_str(field)?;
                let result = match ctx.slot(object)? {
                    Value::Object(obj) => {
                        Ok(obj.borrow().fields.get(&field).cloned().unwrap_or_default())
                    }
                    other => Err(null_pointer(&field, &other)),
                };
                store_or_throw(ctx, dst, result)
            }
            Instruction::SetField { object, field, src } => {
                let field = ctx.constant_str(field)?;
                let value = ctx.slot(src)?;
                match ctx.slot(object)? {
                    Value::Object(obj) => {
                        obj.borrow_mut().fields.insert(field, value);
                        Ok(Completion::Continue)
                    }
                    other => Ok(Completion::Throw(null_pointer(&field, &other))),
                }
            }

            Instruction::NewObject { class, dst } => {
                let class = ctx.constant_str(class)?;
                ctx.set_slot(dst, Value::object(&class))?;
                Ok(Completion::Continue)
            }

            Instruction::TryPush { catch, catch_type } => {
                let catch_type = ctx.constant_str(catch_type)?;
                let frame = ctx
                    .current_frame_mut()
                    .ok_or_else(|| VmError::internal("no frame"))?;
                frame.handlers.push(Handler {
                    catch_pc: catch.pc(),
                    catch_type,
                });
                Ok(Completion::Continue)
            }
            Instruction::TryPop => {
                let frame = ctx
                    .current_frame_mut()
                    .ok_or_else(|| VmError::internal("no frame"))?;
                if frame.handlers.pop().is_none() {
                    return Err(VmError::HandlerUnderflow {
                        function: func.name().to_string(),
                        pc: frame.pc,
                    });
                }
                Ok(Completion::Continue)
            }
            Instruction::Throw { src } => Ok(Completion::Throw(ctx.slot(src)?)),
            Instruction::CatchBind { dst } => {
                let caught = ctx.take_caught().ok_or_else(|| {
                    VmError::internal(format!(
                        "CatchBind in {} at pc {} with no caught value",
                        func.name(),
                        ctx.pc()
                    ))
                })?;
                ctx.set_slot(dst, caught)?;
                Ok(Completion::Continue)
            }
        }
    }
}

/// How an instruction hands control back to the loop
enum Completion {
    /// Continue to next instruction
    Continue,
    /// Continue at an absolute instruction index
    Jump(usize),
    /// Return from the current function
    Return(Value),
    /// Call a function; the caller resumes after the call
    Call {
        function: FunctionIndex,
        args: Vec<Value>,
        dst: Option<Slot>,
    },
    /// Raise an in-language exception
    Throw(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
}

/// Whether a handler declared with `catch_type` catches `value`
pub fn catch_matches(catch_type: &str, value: &Value) -> bool {
    if catch_type == "any" {
        return true;
    }
    match value {
        Value::Exception(e) => {
            matches!(catch_type, "Error" | "Exception")
                || e.kind == catch_type
                || (catch_type.ends_with("Exception") && e.kind.ends_with(catch_type))
        }
        _ => false,
    }
}

fn type_error(message: impl Into<String>) -> Value {
    Value::exception(kinds::TYPE, message)
}

fn null_pointer(field: &str, receiver: &Value) -> Value {
    Value::exception(
        kinds::NULL_POINTER,
        format!("cannot access field '{field}' of {}", receiver.type_name()),
    )
}

fn store_or_throw(
    ctx: &mut VmContext,
    dst: Slot,
    result: Result<Value, Value>,
) -> VmResult<Completion> {
    match result {
        Ok(value) => {
            ctx.set_slot(dst, value)?;
            Ok(Completion::Continue)
        }
        Err(exception) => Ok(Completion::Throw(exception)),
    }
}

fn present_args(ctx: &VmContext, args: &CallArgs) -> VmResult<Vec<Value>> {
    args.iter().flatten().map(|slot| ctx.slot(*slot)).collect()
}

fn binary(ctx: &mut VmContext, lhs: Slot, rhs: Slot, dst: Slot, op: Arith) -> VmResult<Completion> {
    let result = arith(op, &ctx.slot(lhs)?, &ctx.slot(rhs)?);
    store_or_throw(ctx, dst, result)
}

fn arith(op: Arith, a: &Value, b: &Value) -> Result<Value, Value> {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        return match op {
            Arith::Add => Ok(Value::Int(x.wrapping_add(*y))),
            Arith::Sub => Ok(Value::Int(x.wrapping_sub(*y))),
            Arith::Mul => Ok(Value::Int(x.wrapping_mul(*y))),
            Arith::Div if *y == 0 => Err(Value::exception(kinds::ARITHMETIC, "/ by zero")),
            Arith::Div => Ok(Value::Int(x.wrapping_div(*y))),
        };
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => Ok(Value::Float(match op {
            Arith::Add => x + y,
            Arith::Sub => x - y,
            Arith::Mul => x * y,
            Arith::Div => x / y,
        })),
        _ if op == Arith::Add => Ok(Value::str(&format!("{a}{b}"))),
        _ => Err(type_error(format!(
            "unsupported operand types {:?}: {} and {}",
            op,
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn compare(
    ctx: &mut VmContext,
    lhs: Slot,
    rhs: Slot,
    dst: Slot,
    holds: fn(Ordering) -> bool,
) -> VmResult<Completion> {
    let (a, b) = (ctx.slot(lhs)?, ctx.slot(rhs)?);
    let result = match a.ordering(&b) {
        Ok(Some(ord)) => Ok(Value::Bool(holds(ord))),
        Ok(None) => Ok(Value::Bool(false)),
        Err(_) => Err(type_error(format!(
            "cannot compare {} with {}",
            a.type_name(),
            b.type_name()
        ))),
    };
    store_or_throw(ctx, dst, result)
}

type ArrayRef = std::rc::Rc<std::cell::RefCell<Vec<Value>>>;

/// Resolve an array element, or the exception the access raises
fn element(array: &Value, index: &Value) -> Result<(ArrayRef, usize), Value> {
    let Value::Array(items) = array else {
        return Err(type_error(format!("cannot index {}", array.type_name())));
    };
    let Value::Int(i) = *index else {
        return Err(type_error(format!(
            "array index must be num, got {}",
            index.type_name()
        )));
    };
    let len = items.borrow().len();
    match usize::try_from(i) {
        Ok(i) if i < len => Ok((items.clone(), i)),
        _ => Err(Value::exception(
            kinds::INDEX_OUT_OF_BOUNDS,
            format!("index {i} out of bounds for length {len}"),
        )),
    }
}
