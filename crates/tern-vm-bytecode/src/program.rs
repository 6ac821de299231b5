//! Verified bytecode program

use serde::Serialize;

use crate::codec::write_container;
use crate::constant::{Constant, ConstantPool};
use crate::function::Function;
use crate::operand::{ConstantIndex, FunctionIndex};

/// Name of the function a program starts at
pub const ENTRY_POINT: &str = "Main.main";

/// A loaded and verified program
///
/// Only [`crate::load`] produces values of this type, so holding a `Program` is
/// proof that the bytes passed every verification check.
#[derive(Debug, Clone, Serialize)]
pub struct Program {
    constants: ConstantPool,
    functions: Vec<Function>,
    entry: Option<FunctionIndex>,
}

impl Program {
    pub(crate) fn new(constants: ConstantPool, functions: Vec<Function>) -> Self {
        let entry = functions
            .iter()
            .position(|f| f.name() == ENTRY_POINT)
            .map(|i| FunctionIndex(i as u32));
        Self {
            constants,
            functions,
            entry,
        }
    }

    /// Constant pool
    #[inline]
    pub fn constants(&self) -> &ConstantPool {
        &self.constants
    }

    /// Constant by typed index
    #[inline]
    pub fn constant(&self, idx: ConstantIndex) -> Option<&Constant> {
        self.constants.get(idx.0)
    }

    /// Function table, in container order
    #[inline]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Function by typed index
    #[inline]
    pub fn function(&self, idx: FunctionIndex) -> Option<&Function> {
        self.functions.get(idx.0 as usize)
    }

    /// Look up a function by its qualified name
    pub fn function_by_name(&self, name: &str) -> Option<(FunctionIndex, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .find(|(_, f)| f.name() == name)
            .map(|(i, f)| (FunctionIndex(i as u32), f))
    }

    /// Index of [`ENTRY_POINT`], if the program defines it
    #[inline]
    pub fn entry(&self) -> Option<FunctionIndex> {
        self.entry
    }

    /// Total instruction count across all functions
    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(Function::len).sum()
    }

    /// Re-encode into container bytes
    ///
    /// The result loads back to an equivalent program.
    pub fn to_bytes(&self) -> Vec<u8> {
        write_container(
            &self.constants,
            self.functions.iter().map(|f| (f.name(), f.instructions())),
        )
    }
}
