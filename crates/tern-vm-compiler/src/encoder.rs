//! IR to bytecode encoder
//!
//! Encoding runs in two passes per function. The first assigns an instruction
//! index to every label; the second lowers each instruction, resolving labels,
//! callee names and literal operands. The constant pool is shared by the whole
//! program and deduplicated.

use rustc_hash::FxHashMap;
use tracing::debug;

use tern_vm_bytecode::{
    CALL_ARG_COUNT, CallArgs, CodeAddr, Constant, ConstantIndex, ConstantPool, FunctionIndex,
    Instruction, Slot, write_container,
};

use crate::error::{EncodeError, EncodeResult};
use crate::ir::{BinOp, CompareOp, IrFunction, IrInstruction, IrProgram, UnaryOp};

/// Encode a program into container bytes
pub fn encode(program: &IrProgram) -> EncodeResult<Vec<u8>> {
    Encoder::new(program)?.encode()
}

/// Program-wide encoding state
pub struct Encoder<'a> {
    program: &'a IrProgram,
    constants: ConstantPool,
    function_index: FxHashMap<&'a str, u32>,
}

impl<'a> Encoder<'a> {
    /// Prepare an encoder, indexing the function table
    pub fn new(program: &'a IrProgram) -> EncodeResult<Self> {
        let mut function_index = FxHashMap::default();
        for (i, f) in program.functions.iter().enumerate() {
            if function_index.insert(f.name.as_str(), i as u32).is_some() {
                return Err(EncodeError::DuplicateFunction(f.name.clone()));
            }
        }
        Ok(Self {
            program,
            constants: ConstantPool::new(),
            function_index,
        })
    }

    /// Lower every function and serialize the container
    pub fn encode(mut self) -> EncodeResult<Vec<u8>> {
        let program = self.program;
        let mut bodies = Vec::with_capacity(program.functions.len());
        for f in &program.functions {
            bodies.push(self.lower_function(f)?);
        }

        let bytes = write_container(
            &self.constants,
            program
                .functions
                .iter()
                .zip(&bodies)
                .map(|(f, code)| (f.name.as_str(), code.as_slice())),
        );
        debug!(
            functions = bodies.len(),
            instructions = bodies.iter().map(Vec::len).sum::<usize>(),
            constants = self.constants.len(),
            bytes = bytes.len(),
            "encoded program"
        );
        Ok(bytes)
    }

    fn lower_function(&mut self, f: &IrFunction) -> EncodeResult<Vec<Instruction>> {
        let labels = resolve_labels(f)?;
        let mut ctx = FunctionEncoder {
            function: f,
            labels,
            len: f.encoded_len(),
            encoder: self,
        };
        let mut code = Vec::with_capacity(f.encoded_len());
        for insn in &f.instructions {
            if let Some(lowered) = ctx.lower(insn)? {
                code.push(lowered);
            }
        }
        Ok(code)
    }
}

fn resolve_labels(f: &IrFunction) -> EncodeResult<FxHashMap<&str, u32>> {
    let mut labels = FxHashMap::default();
    let mut pc = 0u32;
    for insn in &f.instructions {
        match insn {
            IrInstruction::Label(name) => {
                if labels.insert(name.as_str(), pc).is_some() {
                    return Err(EncodeError::DuplicateLabel {
                        function: f.name.clone(),
                        label: name.clone(),
                    });
                }
            }
            _ => pc += 1,
        }
    }
    Ok(labels)
}

struct FunctionEncoder<'f, 'e, 'a> {
    function: &'f IrFunction,
    labels: FxHashMap<&'f str, u32>,
    len: usize,
    encoder: &'e mut Encoder<'a>,
}

impl FunctionEncoder<'_, '_, '_> {
    fn slot(&self, raw: u32) -> EncodeResult<Slot> {
        i32::try_from(raw)
            .ok()
            .and_then(Slot::from_raw)
            .ok_or_else(|| EncodeError::SlotOutOfRange {
                function: self.function.name.clone(),
                slot: raw,
            })
    }

    fn opt_slot(&self, raw: Option<u32>) -> EncodeResult<Option<Slot>> {
        raw.map(|s| self.slot(s)).transpose()
    }

    /// A label bound after the last instruction has no instruction to land on
    fn target(&self, label: &str) -> EncodeResult<CodeAddr> {
        let pc = *self
            .labels
            .get(label)
            .ok_or_else(|| EncodeError::UnresolvedLabel {
                function: self.function.name.clone(),
                label: label.to_string(),
            })?;
        if pc as usize >= self.len {
            return Err(EncodeError::LabelPastEnd {
                function: self.function.name.clone(),
                label: label.to_string(),
            });
        }
        Ok(CodeAddr(pc))
    }

    fn constant(&mut self, value: Constant) -> ConstantIndex {
        ConstantIndex(self.encoder.constants.add(value))
    }

    fn string(&mut self, s: &str) -> ConstantIndex {
        ConstantIndex(self.encoder.constants.add_string(s))
    }

    fn args(&self, args: &[u32]) -> EncodeResult<CallArgs> {
        if args.len() > CALL_ARG_COUNT {
            return Err(EncodeError::TooManyArguments {
                function: self.function.name.clone(),
                count: args.len(),
                max: CALL_ARG_COUNT,
            });
        }
        let mut out = [None; CALL_ARG_COUNT];
        for (slot, &raw) in out.iter_mut().zip(args) {
            *slot = Some(self.slot(raw)?);
        }
        Ok(out)
    }

    fn lower(&mut self, insn: &IrInstruction) -> EncodeResult<Option<Instruction>> {
        let lowered = match insn {
            IrInstruction::Label(_) => return Ok(None),
            IrInstruction::Const { dst, value } => Instruction::Const {
                dst: self.slot(*dst)?,
                idx: self.constant(value.clone()),
            },
            IrInstruction::LoadLocal { src, dst } => Instruction::LoadLocal {
                src: self.slot(*src)?,
                dst: self.slot(*dst)?,
            },
            IrInstruction::StoreLocal { src, dst } => Instruction::StoreLocal {
                src: self.slot(*src)?,
                dst: self.slot(*dst)?,
            },
            IrInstruction::BinOp { op, lhs, rhs, dst } => {
                let (lhs, rhs, dst) = (self.slot(*lhs)?, self.slot(*rhs)?, self.slot(*dst)?);
                match op {
                    BinOp::Add => Instruction::Add { lhs, rhs, dst },
                    BinOp::Sub => Instruction::Sub { lhs, rhs, dst },
                    BinOp::Mul => Instruction::Mul { lhs, rhs, dst },
                    BinOp::Div => Instruction::Div { lhs, rhs, dst },
                }
            }
            IrInstruction::Compare { op, lhs, rhs, dst } => {
                let (lhs, rhs, dst) = (self.slot(*lhs)?, self.slot(*rhs)?, self.slot(*dst)?);
                match op {
                    CompareOp::Eq => Instruction::Eq { lhs, rhs, dst },
                    CompareOp::Neq => Instruction::Neq { lhs, rhs, dst },
                    CompareOp::Lt => Instruction::Lt { lhs, rhs, dst },
                    CompareOp::Le => Instruction::Le { lhs, rhs, dst },
                    CompareOp::Gt => Instruction::Gt { lhs, rhs, dst },
                    CompareOp::Ge => Instruction::Ge { lhs, rhs, dst },
                }
            }
            IrInstruction::Unary { op, src, dst } => {
                let (src, dst) = (self.slot(*src)?, self.slot(*dst)?);
                match op {
                    UnaryOp::Neg => Instruction::Neg { src, dst },
                    UnaryOp::Not => Instruction::Not { src, dst },
                }
            }
            IrInstruction::Jump { label } => Instruction::Jump {
                target: self.target(label)?,
            },
            IrInstruction::JumpIfFalse { cond, label } => Instruction::JumpIfFalse {
                cond: self.slot(*cond)?,
                target: self.target(label)?,
            },
            IrInstruction::Print { src, newline } => Instruction::Print {
                src: self.slot(*src)?,
                newline: *newline,
            },
            IrInstruction::Return { src } => Instruction::Return {
                src: self.opt_slot(*src)?,
            },
            IrInstruction::NewArray {
                size,
                dst,
                elem_type,
            } => Instruction::NewArray {
                size: self.slot(*size)?,
                dst: self.slot(*dst)?,
                elem_type: elem_type.as_deref().map(|t| self.string(t)),
            },
            IrInstruction::LoadElem { array, index, dst } => Instruction::LoadElem {
                array: self.slot(*array)?,
                index: self.slot(*index)?,
                dst: self.slot(*dst)?,
            },
            IrInstruction::StoreElem {
                array,
                index,
                value,
            } => Instruction::StoreElem {
                array: self.slot(*array)?,
                index: self.slot(*index)?,
                value: self.slot(*value)?,
            },
            IrInstruction::ArrayLength { array, dst } => Instruction::ArrayLength {
                array: self.slot(*array)?,
                dst: self.slot(*dst)?,
            },
            IrInstruction::Call {
                function,
                args,
                dst,
            } => {
                let func = self
                    .encoder
                    .function_index
                    .get(function.as_str())
                    .copied()
                    .ok_or_else(|| EncodeError::UnknownFunction {
                        function: self.function.name.clone(),
                        callee: function.clone(),
                    })?;
                Instruction::Call {
                    func: FunctionIndex(func),
                    args: self.args(args)?,
                    dst: self.opt_slot(*dst)?,
                }
            }
            IrInstruction::CallNative { name, args, dst } => Instruction::CallNative {
                args: self.args(args)?,
                dst: self.opt_slot(*dst)?,
                name: self.string(name),
            },
            IrInstruction::GetStatic { class, field, dst } => Instruction::GetStatic {
                dst: self.slot(*dst)?,
                class: self.string(class),
                field: self.string(field),
            },
            IrInstruction::SetStatic { class, field, src } => Instruction::SetStatic {
                src: self.slot(*src)?,
                class: self.string(class),
                field: self.string(field),
            },
            IrInstruction::GetField { object, field, dst } => Instruction::GetField {
                object: self.slot(*object)?,
                dst: self.slot(*dst)?,
                field: self.string(field),
            },
            IrInstruction::SetField { object, field, src } => Instruction::SetField {
                object: self.slot(*object)?,
                src: self.slot(*src)?,
                field: self.string(field),
            },
            IrInstruction::NewObject { class, dst } => Instruction::NewObject {
                dst: self.slot(*dst)?,
                class: self.string(class),
            },
            IrInstruction::TryPush {
                catch_label,
                catch_type,
            } => Instruction::TryPush {
                catch: self.target(catch_label)?,
                catch_type: self.string(catch_type),
            },
            IrInstruction::TryPop => Instruction::TryPop,
            IrInstruction::Throw { src } => Instruction::Throw {
                src: self.slot(*src)?,
            },
            IrInstruction::CatchBind { dst } => Instruction::CatchBind {
                dst: self.slot(*dst)?,
            },
        };
        Ok(Some(lowered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrInstruction as I;

    fn main_with(body: Vec<IrInstruction>) -> IrProgram {
        let mut f = IrFunction::new("Main.main");
        f.instructions = body;
        let mut program = IrProgram::new();
        program.push(f);
        program
    }

    #[test]
    fn test_unresolved_label() {
        let program = main_with(vec![I::Jump {
            label: "nowhere".into(),
        }]);
        assert_eq!(
            encode(&program),
            Err(EncodeError::UnresolvedLabel {
                function: "Main.main".into(),
                label: "nowhere".into(),
            })
        );
    }

    #[test]
    fn test_duplicate_label() {
        let program = main_with(vec![I::Label("a".into()), I::TryPop, I::Label("a".into())]);
        assert!(matches!(
            encode(&program),
            Err(EncodeError::DuplicateLabel { .. })
        ));
    }

    #[test]
    fn test_unknown_function_and_arity() {
        let program = main_with(vec![I::Call {
            function: "Main.missing".into(),
            args: vec![],
            dst: None,
        }]);
        assert!(matches!(
            encode(&program),
            Err(EncodeError::UnknownFunction { .. })
        ));

        let program = main_with(vec![I::Call {
            function: "Main.main".into(),
            args: vec![0, 1, 2, 3, 4],
            dst: None,
        }]);
        assert!(matches!(
            encode(&program),
            Err(EncodeError::TooManyArguments { count: 5, .. })
        ));
    }

    #[test]
    fn test_slot_out_of_range() {
        let program = main_with(vec![I::Throw { src: 256 }]);
        assert_eq!(
            encode(&program),
            Err(EncodeError::SlotOutOfRange {
                function: "Main.main".into(),
                slot: 256,
            })
        );
    }

    #[test]
    fn test_duplicate_function() {
        let mut program = IrProgram::new();
        program
            .push(IrFunction::new("Main.main"))
            .push(IrFunction::new("Main.main"));
        assert_eq!(
            encode(&program).unwrap_err(),
            EncodeError::DuplicateFunction("Main.main".into())
        );
    }

    #[test]
    fn test_labels_resolve_to_following_instruction() {
        let mut f = IrFunction::new("Main.main");
        f.emit(I::Jump {
            label: "end".into(),
        })
        .emit(I::TryPop)
        .label("end")
        .emit(I::Return { src: None });
        let labels = resolve_labels(&f).unwrap();
        assert_eq!(labels.get("end"), Some(&2));
    }

    #[test]
    fn test_constants_are_deduplicated() {
        let program = main_with(vec![
            I::Const {
                dst: 0,
                value: Constant::Int(7),
            },
            I::Const {
                dst: 1,
                value: Constant::Int(7),
            },
            I::GetStatic {
                class: "Main".into(),
                field: "Main".into(),
                dst: 2,
            },
        ]);
        let mut encoder = Encoder::new(&program).unwrap();
        let code = encoder.lower_function(&program.functions[0]).unwrap();
        assert_eq!(encoder.constants.len(), 2);
        assert_eq!(
            code[2],
            Instruction::GetStatic {
                class: ConstantIndex(1),
                field: ConstantIndex(1),
                dst: Slot(2),
            }
        );
    }
}
