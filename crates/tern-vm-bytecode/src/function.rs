//! Function bytecode representation

use serde::Serialize;

use crate::instruction::Instruction;
use crate::operand::{CALL_ARG_COUNT, NO_OPERAND, OperandKind};

/// A verified function
///
/// Functions are only produced by the loader, so every instruction here has
/// already passed index, slot and handler-structure checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Function {
    name: String,
    instructions: Vec<Instruction>,
    slot_count: usize,
}

impl Function {
    pub(crate) fn new(name: String, instructions: Vec<Instruction>) -> Self {
        let slot_count = slot_count_for(&instructions);
        Self {
            name,
            instructions,
            slot_count,
        }
    }

    /// Fully qualified name (`Class.method`)
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instructions in program order
    #[inline]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Instruction at `pc`, `None` past the end
    #[inline]
    pub fn instruction(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }

    /// Number of instructions
    #[inline]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the function has no instructions
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Slots a frame for this function needs
    ///
    /// Highest referenced slot plus one, never fewer than the call argument count.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }
}

fn slot_count_for(instructions: &[Instruction]) -> usize {
    let mut count = CALL_ARG_COUNT;
    for insn in instructions {
        let kinds = insn.opcode().operands();
        for (kind, raw) in kinds.iter().zip(insn.operands()) {
            if matches!(kind, OperandKind::Slot | OperandKind::OptSlot) && raw != NO_OPERAND {
                count = count.max(raw as usize + 1);
            }
        }
    }
    count
}
