//! # Tern VM Bytecode
//!
//! This crate defines the bytecode container for the Tern language and the
//! loader that verifies it.
//!
//! ## Design Principles
//!
//! - **Slot-based**: Operations work on numbered frame slots, not an operand stack
//! - **Fixed arity**: Every opcode has one operand schema, shared by encoder and verifier
//! - **Verify once**: [`load`] is the only way to obtain a [`Program`], so the VM
//!   never sees unchecked bytecode

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod constant;
pub mod error;
pub mod function;
pub mod instruction;
pub mod operand;
pub mod program;
pub mod verifier;

pub use codec::write_container;
pub use constant::{ConstTag, Constant, ConstantPool};
pub use error::{VerifyError, VerifyErrorKind};
pub use function::Function;
pub use instruction::{CallArgs, Instruction, Opcode};
pub use operand::{
    CALL_ARG_COUNT, CodeAddr, ConstantIndex, FunctionIndex, MAX_SLOT, NO_OPERAND, OperandKind,
    Slot,
};
pub use program::{ENTRY_POINT, Program};
pub use verifier::{LoaderOptions, TrustConfig, load};

/// Bytecode format version
pub const BYTECODE_VERSION: u32 = 1;

/// Magic bytes for bytecode files
pub const BYTECODE_MAGIC: [u8; 4] = *b"TNBC";
