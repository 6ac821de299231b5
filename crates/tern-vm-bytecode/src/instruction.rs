//! Bytecode instructions (opcodes)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constant::ConstTag;
use crate::operand::{
    CALL_ARG_COUNT, CodeAddr, ConstantIndex, FunctionIndex, NO_OPERAND, OperandKind, Slot,
};

/// Bytecode opcodes
///
/// Slot-based instruction set. Each opcode has a fixed operand list, described by
/// [`Opcode::operands`]; the encoder, the decoder and the verifier all read that
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Opcode {
    // ==================== Values ====================
    /// Load constant from pool: dst = constants\[idx\]
    Const = 1,
    /// Copy a slot: dst = src
    LoadLocal = 2,
    /// Copy a slot: dst = src
    StoreLocal = 3,

    // ==================== Arithmetic ====================
    /// Addition or string concatenation: dst = lhs + rhs
    Add = 4,
    /// Subtraction: dst = lhs - rhs
    Sub = 5,
    /// Multiplication: dst = lhs * rhs
    Mul = 6,
    /// Division: dst = lhs / rhs
    Div = 7,

    // ==================== Comparison ====================
    /// Equality: dst = lhs == rhs
    Eq = 8,
    /// Inequality: dst = lhs != rhs
    Neq = 9,
    /// Less than: dst = lhs < rhs
    Lt = 10,
    /// Less than or equal: dst = lhs <= rhs
    Le = 11,
    /// Greater than: dst = lhs > rhs
    Gt = 12,
    /// Greater than or equal: dst = lhs >= rhs
    Ge = 13,

    // ==================== Control Flow ====================
    /// Unconditional jump
    Jump = 14,
    /// Jump if `cond` is `false`
    JumpIfFalse = 15,
    /// Print a slot, optionally followed by a newline
    Print = 16,
    /// Return from function, with an optional value
    Return = 17,

    // ==================== Unary ====================
    /// Numeric negation: dst = -src
    Neg = 18,
    /// Logical NOT: dst = !src
    Not = 19,

    // ==================== Arrays ====================
    /// Allocate an array of `size` default elements
    NewArray = 20,
    /// Read element: dst = arr\[idx\]
    LoadElem = 21,
    /// Write element: arr\[idx\] = val
    StoreElem = 22,
    /// Array length: dst = arr.length
    ArrayLength = 23,

    // ==================== Calls ====================
    /// Call a bytecode function with up to four arguments
    Call = 24,

    // ==================== Fields ====================
    /// Read a static field: dst = Class.field
    GetStatic = 25,
    /// Write a static field: Class.field = src
    SetStatic = 26,
    /// Read an instance field: dst = obj.field
    GetField = 27,
    /// Write an instance field: obj.field = src
    SetField = 28,

    // ==================== Exceptions ====================
    /// Push an exception handler
    TryPush = 29,
    /// Pop the innermost exception handler
    TryPop = 30,
    /// Throw a value
    Throw = 31,
    /// Bind the caught value at a catch entry
    CatchBind = 32,

    // ==================== Objects & Natives ====================
    /// Allocate an object of a class: dst = new Class
    NewObject = 33,
    /// Call a host-provided native function with up to four arguments
    CallNative = 34,
}

use OperandKind as K;

const STR: Option<ConstTag> = Some(ConstTag::String);

const SLOT_CONST: &[OperandKind] = &[K::Slot, K::Const(None)];
const SLOT_SLOT: &[OperandKind] = &[K::Slot, K::Slot];
const BINARY: &[OperandKind] = &[K::Slot, K::Slot, K::Slot];
const JUMP: &[OperandKind] = &[K::CodeAddr];
const BRANCH: &[OperandKind] = &[K::Slot, K::CodeAddr];
const PRINT: &[OperandKind] = &[K::Slot, K::Flag];
const RETURN: &[OperandKind] = &[K::OptSlot];
const NEW_ARRAY: &[OperandKind] = &[K::Slot, K::Slot, K::OptConst(STR)];
const CALL: &[OperandKind] = &[
    K::Function,
    K::OptSlot,
    K::OptSlot,
    K::OptSlot,
    K::OptSlot,
    K::OptSlot,
];
const STATIC: &[OperandKind] = &[K::Const(STR), K::Const(STR), K::Slot];
const FIELD: &[OperandKind] = &[K::Slot, K::Const(STR), K::Slot];
const TRY_PUSH: &[OperandKind] = &[K::CodeAddr, K::Const(STR)];
const SINGLE_SLOT: &[OperandKind] = &[K::Slot];
const NEW_OBJECT: &[OperandKind] = &[K::Const(STR), K::Slot];
const CALL_NATIVE: &[OperandKind] = &[
    K::Const(STR),
    K::OptSlot,
    K::OptSlot,
    K::OptSlot,
    K::OptSlot,
    K::OptSlot,
];

impl Opcode {
    /// Every opcode, in code order
    pub const ALL: [Opcode; 34] = [
        Self::Const,
        Self::LoadLocal,
        Self::StoreLocal,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Eq,
        Self::Neq,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
        Self::Jump,
        Self::JumpIfFalse,
        Self::Print,
        Self::Return,
        Self::Neg,
        Self::Not,
        Self::NewArray,
        Self::LoadElem,
        Self::StoreElem,
        Self::ArrayLength,
        Self::Call,
        Self::GetStatic,
        Self::SetStatic,
        Self::GetField,
        Self::SetField,
        Self::TryPush,
        Self::TryPop,
        Self::Throw,
        Self::CatchBind,
        Self::NewObject,
        Self::CallNative,
    ];

    /// Convert from raw wire code
    pub fn from_code(code: u32) -> Option<Self> {
        let idx = code.checked_sub(1)? as usize;
        Self::ALL.get(idx).copied()
    }

    /// Convert to raw wire code
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Operand schema, in wire order
    pub const fn operands(self) -> &'static [OperandKind] {
        match self {
            Self::Const => SLOT_CONST,
            Self::LoadLocal | Self::StoreLocal => SLOT_SLOT,
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Eq
            | Self::Neq
            | Self::Lt
            | Self::Le
            | Self::Gt
            | Self::Ge => BINARY,
            Self::Jump => JUMP,
            Self::JumpIfFalse => BRANCH,
            Self::Print => PRINT,
            Self::Return => RETURN,
            Self::Neg | Self::Not => SLOT_SLOT,
            Self::NewArray => NEW_ARRAY,
            Self::LoadElem | Self::StoreElem => BINARY,
            Self::ArrayLength => SLOT_SLOT,
            Self::Call => CALL,
            Self::GetStatic | Self::SetStatic => STATIC,
            Self::GetField | Self::SetField => FIELD,
            Self::TryPush => TRY_PUSH,
            Self::TryPop => &[],
            Self::Throw | Self::CatchBind => SINGLE_SLOT,
            Self::NewObject => NEW_OBJECT,
            Self::CallNative => CALL_NATIVE,
        }
    }

    /// Get opcode name for debugging
    pub const fn name(self) -> &'static str {
        match self {
            Self::Const => "Const",
            Self::LoadLocal => "LoadLocal",
            Self::StoreLocal => "StoreLocal",
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
            Self::Div => "Div",
            Self::Eq => "Eq",
            Self::Neq => "Neq",
            Self::Lt => "Lt",
            Self::Le => "Le",
            Self::Gt => "Gt",
            Self::Ge => "Ge",
            Self::Jump => "Jump",
            Self::JumpIfFalse => "JumpIfFalse",
            Self::Print => "Print",
            Self::Return => "Return",
            Self::Neg => "Neg",
            Self::Not => "Not",
            Self::NewArray => "NewArray",
            Self::LoadElem => "LoadElem",
            Self::StoreElem => "StoreElem",
            Self::ArrayLength => "ArrayLength",
            Self::Call => "Call",
            Self::GetStatic => "GetStatic",
            Self::SetStatic => "SetStatic",
            Self::GetField => "GetField",
            Self::SetField => "SetField",
            Self::TryPush => "TryPush",
            Self::TryPop => "TryPop",
            Self::Throw => "Throw",
            Self::CatchBind => "CatchBind",
            Self::NewObject => "NewObject",
            Self::CallNative => "CallNative",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Argument slots of a call, `None` where the caller passes nothing
pub type CallArgs = [Option<Slot>; CALL_ARG_COUNT];

/// Decoded instruction with typed operands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
#[allow(missing_docs)]
pub enum Instruction {
    // Values
    Const {
        dst: Slot,
        idx: ConstantIndex,
    },
    LoadLocal {
        src: Slot,
        dst: Slot,
    },
    StoreLocal {
        src: Slot,
        dst: Slot,
    },

    // Arithmetic
    Add {
        lhs: Slot,
        rhs: Slot,
        dst: Slot,
    },
    Sub {
        lhs: Slot,
        rhs: Slot,
        dst: Slot,
    },
    Mul {
        lhs: Slot,
        rhs: Slot,
        dst: Slot,
    },
    Div {
        lhs: Slot,
        rhs: Slot,
        dst: Slot,
    },

    // Comparison
    Eq {
        lhs: Slot,
        rhs: Slot,
        dst: Slot,
    },
    Neq {
        lhs: Slot,
        rhs: Slot,
        dst: Slot,
    },
    Lt {
        lhs: Slot,
        rhs: Slot,
        dst: Slot,
    },
    Le {
        lhs: Slot,
        rhs: Slot,
        dst: Slot,
    },
    Gt {
        lhs: Slot,
        rhs: Slot,
        dst: Slot,
    },
    Ge {
        lhs: Slot,
        rhs: Slot,
        dst: Slot,
    },

    // Control flow
    Jump {
        target: CodeAddr,
    },
    JumpIfFalse {
        cond: Slot,
        target: CodeAddr,
    },
    Print {
        src: Slot,
        newline: bool,
    },
    Return {
        src: Option<Slot>,
    },

    // Unary
    Neg {
        src: Slot,
        dst: Slot,
    },
    Not {
        src: Slot,
        dst: Slot,
    },

    // Arrays
    NewArray {
        size: Slot,
        dst: Slot,
        elem_type: Option<ConstantIndex>,
    },
    LoadElem {
        array: Slot,
        index: Slot,
        dst: Slot,
    },
    StoreElem {
        array: Slot,
        index: Slot,
        value: Slot,
    },
    ArrayLength {
        array: Slot,
        dst: Slot,
    },

    // Calls
    Call {
        func: FunctionIndex,
        args: CallArgs,
        dst: Option<Slot>,
    },

    // Fields
    GetStatic {
        class: ConstantIndex,
        field: ConstantIndex,
        dst: Slot,
    },
    SetStatic {
        class: ConstantIndex,
        field: ConstantIndex,
        src: Slot,
    },
    GetField {
        object: Slot,
        field: ConstantIndex,
        dst: Slot,
    },
    SetField {
        object: Slot,
        field: ConstantIndex,
        src: Slot,
    },

    // Exceptions
    TryPush {
        catch: CodeAddr,
        catch_type: ConstantIndex,
    },
    TryPop,
    Throw {
        src: Slot,
    },
    CatchBind {
        dst: Slot,
    },

    // Objects & natives
    NewObject {
        class: ConstantIndex,
        dst: Slot,
    },
    CallNative {
        name: ConstantIndex,
        args: CallArgs,
        dst: Option<Slot>,
    },
}

/// Cursor over raw operands that converts each according to its kind
struct RawOperands<'a> {
    raw: &'a [i32],
}

impl RawOperands<'_> {
    fn next(&mut self) -> Option<i32> {
        let (&first, rest) = self.raw.split_first()?;
        self.raw = rest;
        Some(first)
    }

    fn slot(&mut self) -> Option<Slot> {
        Slot::from_raw(self.next()?)
    }

    fn opt_slot(&mut self) -> Option<Option<Slot>> {
        Slot::from_raw_opt(self.next()?)
    }

    fn constant(&mut self) -> Option<ConstantIndex> {
        u32::try_from(self.next()?).ok().map(ConstantIndex)
    }

    fn opt_constant(&mut self) -> Option<Option<ConstantIndex>> {
        match self.next()? {
            NO_OPERAND => Some(None),
            raw => u32::try_from(raw).ok().map(|i| Some(ConstantIndex(i))),
        }
    }

    fn addr(&mut self) -> Option<CodeAddr> {
        u32::try_from(self.next()?).ok().map(CodeAddr)
    }

    fn function(&mut self) -> Option<FunctionIndex> {
        u32::try_from(self.next()?).ok().map(FunctionIndex)
    }

    fn flag(&mut self) -> Option<bool> {
        self.next().map(|raw| raw != 0)
    }

    fn args(&mut self) -> Option<CallArgs> {
        Some([
            self.opt_slot()?,
            self.opt_slot()?,
            self.opt_slot()?,
            self.opt_slot()?,
        ])
    }
}

fn opt_slot_raw(slot: Option<Slot>) -> i32 {
    slot.map_or(NO_OPERAND, |s| i32::from(s.0))
}

fn slot_raw(slot: Slot) -> i32 {
    i32::from(slot.0)
}

// Indices are bounded by the wire format's i32 operands; the encoder rejects larger ones.
fn index_raw(index: u32) -> i32 {
    index as i32
}

impl Instruction {
    /// Build a typed instruction from an opcode and its raw operands
    ///
    /// Returns `None` when the operand count does not match the schema or an
    /// operand is out of range for its kind. Index bounds against the pool and
    /// function table are checked by the verifier, not here.
    pub fn from_raw(opcode: Opcode, raw: &[i32]) -> Option<Self> {
        if raw.len() != opcode.operands().len() {
            return None;
        }
        let mut ops = RawOperands { raw };
        let insn = match opcode {
            Opcode::Const => Self::Const {
                dst: ops.slot()?,
                idx: ops.constant()?,
            },
            Opcode::LoadLocal => Self::LoadLocal {
                src: ops.slot()?,
                dst: ops.slot()?,
            },
            Opcode::StoreLocal => Self::StoreLocal {
                src: ops.slot()?,
                dst: ops.slot()?,
            },
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Eq
            | Opcode::Neq
            | Opcode::Lt
            | Opcode::Le
            | Opcode::Gt
            | Opcode::Ge => {
                let (lhs, rhs, dst) = (ops.slot()?, ops.slot()?, ops.slot()?);
                match opcode {
                    Opcode::Add => Self::Add { lhs, rhs, dst },
                    Opcode::Sub => Self::Sub { lhs, rhs, dst },
                    Opcode::Mul => Self::Mul { lhs, rhs, dst },
                    Opcode::Div => Self::Div { lhs, rhs, dst },
                    Opcode::Eq => Self::Eq { lhs, rhs, dst },
                    Opcode::Neq => Self::Neq { lhs, rhs, dst },
                    Opcode::Lt => Self::Lt { lhs, rhs, dst },
                    Opcode::Le => Self::Le { lhs, rhs, dst },
                    Opcode::Gt => Self::Gt { lhs, rhs, dst },
                    _ => Self::Ge { lhs, rhs, dst },
                }
            }
            Opcode::Jump => Self::Jump {
                target: ops.addr()?,
            },
            Opcode::JumpIfFalse => Self::JumpIfFalse {
                cond: ops.slot()?,
                target: ops.addr()?,
            },
            Opcode::Print => Self::Print {
                src: ops.slot()?,
                newline: ops.flag()?,
            },
            Opcode::Return => Self::Return {
                src: ops.opt_slot()?,
            },
            Opcode::Neg => Self::Neg {
                src: ops.slot()?,
                dst: ops.slot()?,
            },
            Opcode::Not => Self::Not {
                src: ops.slot()?,
                dst: ops.slot()?,
            },
            Opcode::NewArray => Self::NewArray {
                size: ops.slot()?,
                dst: ops.slot()?,
                elem_type: ops.opt_constant()?,
            },
            Opcode::LoadElem => Self::LoadElem {
                array: ops.slot()?,
                index: ops.slot()?,
                dst: ops.slot()?,
            },
            Opcode::StoreElem => Self::StoreElem {
                array: ops.slot()?,
                index: ops.slot()?,
                value: ops.slot()?,
            },
            Opcode::ArrayLength => Self::ArrayLength {
                array: ops.slot()?,
                dst: ops.slot()?,
            },
            Opcode::Call => Self::Call {
                func: ops.function()?,
                args: ops.args()?,
                dst: ops.opt_slot()?,
            },
            Opcode::GetStatic => Self::GetStatic {
                class: ops.constant()?,
                field: ops.constant()?,
                dst: ops.slot()?,
            },
            Opcode::SetStatic => Self::SetStatic {
                class: ops.constant()?,
                field: ops.constant()?,
                src: ops.slot()?,
            },
            Opcode::GetField => Self::GetField {
                object: ops.slot()?,
                field: ops.constant()?,
                dst: ops.slot()?,
            },
            Opcode::SetField => Self::SetField {
                object: ops.slot()?,
                field: ops.constant()?,
                src: ops.slot()?,
            },
            Opcode::TryPush => Self::TryPush {
                catch: ops.addr()?,
                catch_type: ops.constant()?,
            },
            Opcode::TryPop => Self::TryPop,
            Opcode::Throw => Self::Throw { src: ops.slot()? },
            Opcode::CatchBind => Self::CatchBind { dst: ops.slot()? },
            Opcode::NewObject => Self::NewObject {
                class: ops.constant()?,
                dst: ops.slot()?,
            },
            Opcode::CallNative => Self::CallNative {
                name: ops.constant()?,
                args: ops.args()?,
                dst: ops.opt_slot()?,
            },
        };
        Some(insn)
    }

    /// Get the opcode for this instruction
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Const { .. } => Opcode::Const,
            Self::LoadLocal { .. } => Opcode::LoadLocal,
            Self::StoreLocal { .. } => Opcode::StoreLocal,
            Self::Add { .. } => Opcode::Add,
            Self::Sub { .. } => Opcode::Sub,
            Self::Mul { .. } => Opcode::Mul,
            Self::Div { .. } => Opcode::Div,
            Self::Eq { .. } => Opcode::Eq,
            Self::Neq { .. } => Opcode::Neq,
            Self::Lt { .. } => Opcode::Lt,
            Self::Le { .. } => Opcode::Le,
            Self::Gt { .. } => Opcode::Gt,
            Self::Ge { .. } => Opcode::Ge,
            Self::Jump { .. } => Opcode::Jump,
            Self::JumpIfFalse { .. } => Opcode::JumpIfFalse,
            Self::Print { .. } => Opcode::Print,
            Self::Return { .. } => Opcode::Return,
            Self::Neg { .. } => Opcode::Neg,
            Self::Not { .. } => Opcode::Not,
            Self::NewArray { .. } => Opcode::NewArray,
            Self::LoadElem { .. } => Opcode::LoadElem,
            Self::StoreElem { .. } => Opcode::StoreElem,
            Self::ArrayLength { .. } => Opcode::ArrayLength,
            Self::Call { .. } => Opcode::Call,
            Self::GetStatic { .. } => Opcode::GetStatic,
            Self::SetStatic { .. } => Opcode::SetStatic,
            Self::GetField { .. } => Opcode::GetField,
            Self::SetField { .. } => Opcode::SetField,
            Self::TryPush { .. } => Opcode::TryPush,
            Self::TryPop => Opcode::TryPop,
            Self::Throw { .. } => Opcode::Throw,
            Self::CatchBind { .. } => Opcode::CatchBind,
            Self::NewObject { .. } => Opcode::NewObject,
            Self::CallNative { .. } => Opcode::CallNative,
        }
    }

    /// Raw operands in wire order
    pub fn operands(&self) -> Vec<i32> {
        let s = slot_raw;
        let c = |idx: &ConstantIndex| index_raw(idx.0);
        match self {
            Self::Const { dst, idx } => vec![s(*dst), c(idx)],
            Self::LoadLocal { src, dst }
            | Self::StoreLocal { src, dst }
            | Self::Neg { src, dst }
            | Self::Not { src, dst } => vec![s(*src), s(*dst)],
            Self::Add { lhs, rhs, dst }
            | Self::Sub { lhs, rhs, dst }
            | Self::Mul { lhs, rhs, dst }
            | Self::Div { lhs, rhs, dst }
            | Self::Eq { lhs, rhs, dst }
            | Self::Neq { lhs, rhs, dst }
            | Self::Lt { lhs, rhs, dst }
            | Self::Le { lhs, rhs, dst }
            | Self::Gt { lhs, rhs, dst }
            | Self::Ge { lhs, rhs, dst } => vec![s(*lhs), s(*rhs), s(*dst)],
            Self::Jump { target } => vec![index_raw(target.0)],
            Self::JumpIfFalse { cond, target } => vec![s(*cond), index_raw(target.0)],
            Self::Print { src, newline } => vec![s(*src), i32::from(*newline)],
            Self::Return { src } => vec![opt_slot_raw(*src)],
            Self::NewArray {
                size,
                dst,
                elem_type,
            } => vec![
                s(*size),
                s(*dst),
                elem_type.as_ref().map_or(NO_OPERAND, c),
            ],
            Self::LoadElem { array, index, dst } => vec![s(*array), s(*index), s(*dst)],
            Self::StoreElem {
                array,
                index,
                value,
            } => vec![s(*array), s(*index), s(*value)],
            Self::ArrayLength { array, dst } => vec![s(*array), s(*dst)],
            Self::Call { func, args, dst } => {
                let mut out = Vec::with_capacity(CALL_ARG_COUNT + 2);
                out.push(index_raw(func.0));
                out.extend(args.iter().map(|a| opt_slot_raw(*a)));
                out.push(opt_slot_raw(*dst));
                out
            }
            Self::GetStatic { class, field, dst } => vec![c(class), c(field), s(*dst)],
            Self::SetStatic { class, field, src } => vec![c(class), c(field), s(*src)],
            Self::GetField { object, field, dst } => vec![s(*object), c(field), s(*dst)],
            Self::SetField { object, field, src } => vec![s(*object), c(field), s(*src)],
            Self::TryPush { catch, catch_type } => vec![index_raw(catch.0), c(catch_type)],
            Self::TryPop => Vec::new(),
            Self::Throw { src } => vec![s(*src)],
            Self::CatchBind { dst } => vec![s(*dst)],
            Self::NewObject { class, dst } => vec![c(class), s(*dst)],
            Self::CallNative { name, args, dst } => {
                let mut out = Vec::with_capacity(CALL_ARG_COUNT + 2);
                out.push(c(name));
                out.extend(args.iter().map(|a| opt_slot_raw(*a)));
                out.push(opt_slot_raw(*dst));
                out
            }
        }
    }

    /// Whether control never falls through to the next instruction
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Jump { .. } | Self::Return { .. } | Self::Throw { .. }
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode())?;
        let kinds = self.opcode().operands();
        for (kind, raw) in kinds.iter().zip(self.operands()) {
            match (kind, raw) {
                (K::OptSlot | K::OptConst(_), NO_OPERAND) => f.write_str(" _")?,
                (K::Slot | K::OptSlot, n) => write!(f, " r{n}")?,
                (K::Const(_) | K::OptConst(_), n) => write!(f, " #{n}")?,
                (K::CodeAddr, n) => write!(f, " @{n}")?,
                (K::Function, n) => write!(f, " fn{n}")?,
                (K::Flag, n) => write!(f, " {}", n != 0)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_code(op.code()), Some(op));
        }
    }

    #[test]
    fn test_invalid_opcode() {
        assert_eq!(Opcode::from_code(0), None);
        assert_eq!(Opcode::from_code(35), None);
        assert_eq!(Opcode::from_code(u32::MAX), None);
    }

    #[test]
    fn test_opcode_name() {
        assert_eq!(Opcode::Add.name(), "Add");
        assert_eq!(Opcode::JumpIfFalse.name(), "JumpIfFalse");
        assert_eq!(Opcode::CallNative.to_string(), "CallNative");
    }

    #[test]
    fn test_schema_arity() {
        assert_eq!(Opcode::TryPop.operands().len(), 0);
        assert_eq!(Opcode::Call.operands().len(), 6);
        assert_eq!(Opcode::CallNative.operands().len(), 6);
        assert_eq!(
            Opcode::TryPush.operands(),
            &[K::CodeAddr, K::Const(Some(ConstTag::String))]
        );
    }

    #[test]
    fn test_from_raw_matches_schema() {
        let insn = Instruction::from_raw(Opcode::Call, &[2, 0, 1, -1, -1, 5]).unwrap();
        assert_eq!(
            insn,
            Instruction::Call {
                func: FunctionIndex(2),
                args: [Some(Slot(0)), Some(Slot(1)), None, None],
                dst: Some(Slot(5)),
            }
        );
        assert_eq!(insn.operands(), vec![2, 0, 1, -1, -1, 5]);
        assert_eq!(insn.opcode(), Opcode::Call);
    }

    #[test]
    fn test_from_raw_rejects_bad_operands() {
        assert!(Instruction::from_raw(Opcode::Add, &[0, 1]).is_none());
        assert!(Instruction::from_raw(Opcode::Throw, &[-1]).is_none());
        assert!(Instruction::from_raw(Opcode::Return, &[-2]).is_none());
        assert_eq!(
            Instruction::from_raw(Opcode::Return, &[-1]),
            Some(Instruction::Return { src: None })
        );
    }

    #[test]
    fn test_every_opcode_accepts_zero_operands_of_its_arity() {
        for op in Opcode::ALL {
            let raw = vec![0; op.operands().len()];
            let insn = Instruction::from_raw(op, &raw).unwrap();
            assert_eq!(insn.opcode(), op);
            assert_eq!(insn.operands().len(), raw.len());
        }
    }

    #[test]
    fn test_display() {
        let insn = Instruction::TryPush {
            catch: CodeAddr(7),
            catch_type: ConstantIndex(1),
        };
        assert_eq!(insn.to_string(), "TryPush @7 #1");
        assert_eq!(
            Instruction::Return { src: None }.to_string(),
            "Return _"
        );
    }
}
