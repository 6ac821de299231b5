//! VM error types

use crate::value::Value;
use thiserror::Error;

/// VM execution errors
///
/// These are host-level failures. In-language exceptions travel as values and
/// only surface here when nothing catches them.
#[derive(Debug, Error)]
pub enum VmError {
    /// `TryPop` with no active handler in the current frame
    #[error("handler underflow in {function} at pc {pc}")]
    HandlerUnderflow {
        /// Executing function
        function: String,
        /// Offending instruction
        pc: usize,
    },

    /// The run executed more instructions than allowed
    #[error("step budget of {limit} instructions exceeded")]
    StepBudgetExceeded {
        /// Configured limit
        limit: u64,
    },

    /// A thrown value escaped the outermost frame
    #[error("uncaught exception: {0}")]
    UncaughtException(Value),

    /// Call depth exceeded the configured maximum
    #[error("stack overflow: call depth exceeded {depth}")]
    StackOverflow {
        /// Configured maximum depth
        depth: usize,
    },

    /// The host does not provide the named native function
    #[error("unknown native function '{0}'")]
    UnknownNative(String),

    /// The program has no entry function to run
    #[error("no entry function '{0}'")]
    MissingEntryPoint(String),

    /// Host output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Broken interpreter invariant
    #[error("internal error: {0}")]
    Internal(String),
}

impl VmError {
    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The uncaught value, if this is an uncaught exception
    pub fn thrown(&self) -> Option<&Value> {
        match self {
            Self::UncaughtException(value) => Some(value),
            _ => None,
        }
    }
}

/// Result type for VM operations
pub type VmResult<T> = std::result::Result<T, VmError>;
