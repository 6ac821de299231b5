//! # Tern VM Compiler
//!
//! Lowers the label-based IR into the Tern bytecode container.
//!
//! ## Pipeline
//!
//! 1. Build an [`IrProgram`] (done by the front end)
//! 2. Resolve labels and callee names per function
//! 3. Collect literal operands into a shared constant pool
//! 4. Serialize with the container writer from `tern-vm-bytecode`

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod encoder;
pub mod error;
pub mod ir;

pub use encoder::{Encoder, encode};
pub use error::{EncodeError, EncodeResult};
pub use ir::{BinOp, CompareOp, IrFunction, IrInstruction, IrProgram, UnaryOp};
