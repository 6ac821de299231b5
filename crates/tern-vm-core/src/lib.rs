//! # Tern VM Core
//!
//! Execution engine for verified Tern bytecode.
//!
//! ## Design Principles
//!
//! - **Verified input only**: the interpreter runs [`tern_vm_bytecode::Program`]s,
//!   which only the loader can build
//! - **Explicit frames**: calls and exception unwinding use a frame stack, not
//!   host recursion
//! - **Exceptions are values**: in-language throws travel as a completion
//!   signal; [`VmError`] is reserved for host-level failures
//! - **Bounded**: step budget, call depth and array size are all configurable

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod interpreter;
pub mod value;

pub use config::VmConfig;
pub use context::VmContext;
pub use error::{VmError, VmResult};
pub use host::{Host, NativeError, NativeResult, StdHost};
pub use interpreter::Interpreter;
pub use value::{Exception, Value};
