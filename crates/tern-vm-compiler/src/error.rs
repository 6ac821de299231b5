//! Encoding errors

use thiserror::Error;

/// Defects in an IR program that prevent encoding
///
/// Any error aborts the whole encode; no partial output is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Jump, branch or handler push names a label the function never defines
    #[error("unresolved label '{label}' in function {function}")]
    UnresolvedLabel {
        /// Function containing the reference
        function: String,
        /// Missing label
        label: String,
    },

    /// Referenced label is bound after the function's last instruction
    #[error("label '{label}' in function {function} does not precede an instruction")]
    LabelPastEnd {
        /// Function containing the reference
        function: String,
        /// Trailing label
        label: String,
    },

    /// A label is defined twice in one function
    #[error("label '{label}' defined twice in function {function}")]
    DuplicateLabel {
        /// Function containing the definitions
        function: String,
        /// Repeated label
        label: String,
    },

    /// Call to a function the program does not define
    #[error("function {function} calls unknown function '{callee}'")]
    UnknownFunction {
        /// Calling function
        function: String,
        /// Missing callee
        callee: String,
    },

    /// Two functions share a name
    #[error("duplicate function '{0}'")]
    DuplicateFunction(String),

    /// Call with more arguments than the call instructions carry
    #[error("call in function {function} passes {count} arguments (max {max})")]
    TooManyArguments {
        /// Calling function
        function: String,
        /// Arguments given
        count: usize,
        /// Arguments supported
        max: usize,
    },

    /// Slot number that does not fit the slot operand encoding
    #[error("slot {slot} out of range in function {function}")]
    SlotOutOfRange {
        /// Owning function
        function: String,
        /// Offending slot
        slot: u32,
    },
}

/// Result type for encoding
pub type EncodeResult<T> = Result<T, EncodeError>;
