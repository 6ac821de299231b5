//! Bytecode verification errors

use thiserror::Error;

use crate::constant::ConstTag;

/// Errors produced while loading and verifying a bytecode container
///
/// Function-scoped variants carry the function name and the instruction index
/// the defect was found at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Container does not start with the expected magic bytes
    #[error("invalid magic bytes: {found:02x?}")]
    BadMagic {
        /// Leading bytes actually found (at most four)
        found: Vec<u8>,
    },

    /// Container version is not the one this loader understands
    #[error("unsupported bytecode version {found} (expected {expected})")]
    BadVersion {
        /// Version read from the container
        found: u32,
        /// Version this loader accepts
        expected: u32,
    },

    /// Input ended in the middle of a record
    #[error("unexpected end of bytecode at offset {offset} while reading {context}")]
    UnexpectedEnd {
        /// Byte offset where the read started
        offset: usize,
        /// What was being read
        context: &'static str,
    },

    /// Constant-pool entry with a tag outside the known set
    #[error("unknown constant tag {tag} at constant #{index}")]
    UnknownConstantTag {
        /// Pool index of the entry
        index: u32,
        /// Raw tag byte
        tag: u8,
    },

    /// String payload that is not valid UTF-8
    #[error("invalid UTF-8 in {context} at offset {offset}")]
    InvalidUtf8 {
        /// Byte offset of the string payload
        offset: usize,
        /// What was being read
        context: &'static str,
    },

    /// Instruction with an opcode outside the instruction set
    #[error("{function}@{pc}: unknown opcode {code}")]
    UnknownOpcode {
        /// Owning function
        function: String,
        /// Instruction index
        pc: usize,
        /// Raw opcode code
        code: u32,
    },

    /// Bytes left over after the last function
    #[error("{count} trailing bytes after function table at offset {offset}")]
    TrailingBytes {
        /// Offset of the first unread byte
        offset: usize,
        /// Number of unread bytes
        count: usize,
    },

    /// Two functions share a name
    #[error("duplicate function '{name}'")]
    DuplicateFunction {
        /// The repeated name
        name: String,
    },

    /// Code address outside the owning function
    #[error("{function}@{pc}: jump target {target} out of range 0..{len}")]
    InvalidJumpTarget {
        /// Owning function
        function: String,
        /// Instruction index
        pc: usize,
        /// Raw target operand
        target: i32,
        /// Instruction count of the function
        len: usize,
    },

    /// Constant index outside the pool
    #[error("{function}@{pc}: constant index {index} out of range 0..{len}")]
    InvalidConstantIndex {
        /// Owning function
        function: String,
        /// Instruction index
        pc: usize,
        /// Raw index operand
        index: i32,
        /// Pool size
        len: usize,
    },

    /// Referenced constant has the wrong tag for its operand
    #[error("{function}@{pc}: constant #{index} is {found}, expected {expected}")]
    ConstantTypeMismatch {
        /// Owning function
        function: String,
        /// Instruction index
        pc: usize,
        /// Pool index
        index: u32,
        /// Tag the operand requires
        expected: ConstTag,
        /// Tag actually found
        found: ConstTag,
    },

    /// Call target outside the function table
    #[error("{function}@{pc}: callee index {index} out of range 0..{len}")]
    InvalidCallee {
        /// Owning function
        function: String,
        /// Instruction index
        pc: usize,
        /// Raw callee operand
        index: i32,
        /// Function count
        len: usize,
    },

    /// Strict entry is in effect and the entry function is absent
    #[error("missing entry point '{entry}'")]
    MissingEntryPoint {
        /// Required entry name
        entry: String,
    },

    /// Slot operand negative or above the slot limit
    #[error("{function}@{pc}: invalid slot operand {slot}")]
    InvalidSlot {
        /// Owning function
        function: String,
        /// Instruction index
        pc: usize,
        /// Raw slot operand
        slot: i32,
    },

    /// `TryPop` reachable with no active handler
    #[error("{function}@{pc}: handler pop with empty handler stack")]
    HandlerUnderflow {
        /// Owning function
        function: String,
        /// Instruction index
        pc: usize,
    },

    /// Catch address of a `TryPush` does not hold a `CatchBind`
    #[error("{function}@{pc}: catch target {target} is not a catch-bind instruction")]
    MalformedCatchEntry {
        /// Owning function
        function: String,
        /// Index of the `TryPush`
        pc: usize,
        /// Catch address
        target: usize,
    },

    /// A catch entry can be reached without an exception
    #[error("{function}@{pc}: catch entry reachable by normal control flow")]
    CatchEntryReachableByNormalFlow {
        /// Owning function
        function: String,
        /// Index of the catch entry
        pc: usize,
    },

    /// Two paths reach an instruction with different handler depths
    #[error("{function}@{pc}: handler depth {found} conflicts with {expected}")]
    InconsistentHandlerDepth {
        /// Owning function
        function: String,
        /// Instruction index
        pc: usize,
        /// Depth recorded first
        expected: usize,
        /// Conflicting depth
        found: usize,
    },
}

/// Fieldless category of a [`VerifyError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum VerifyErrorKind {
    BadMagic,
    BadVersion,
    UnexpectedEnd,
    UnknownConstantTag,
    InvalidUtf8,
    UnknownOpcode,
    TrailingBytes,
    DuplicateFunction,
    InvalidJumpTarget,
    InvalidConstantIndex,
    ConstantTypeMismatch,
    InvalidCallee,
    MissingEntryPoint,
    InvalidSlot,
    HandlerUnderflow,
    MalformedCatchEntry,
    CatchEntryReachableByNormalFlow,
    InconsistentHandlerDepth,
}

impl VerifyError {
    /// Category of this error, without its payload
    pub fn kind(&self) -> VerifyErrorKind {
        match self {
            Self::BadMagic { .. } => VerifyErrorKind::BadMagic,
            Self::BadVersion { .. } => VerifyErrorKind::BadVersion,
            Self::UnexpectedEnd { .. } => VerifyErrorKind::UnexpectedEnd,
            Self::UnknownConstantTag { .. } => VerifyErrorKind::UnknownConstantTag,
            Self::InvalidUtf8 { .. } => VerifyErrorKind::InvalidUtf8,
            Self::UnknownOpcode { .. } => VerifyErrorKind::UnknownOpcode,
            Self::TrailingBytes { .. } => VerifyErrorKind::TrailingBytes,
            Self::DuplicateFunction { .. } => VerifyErrorKind::DuplicateFunction,
            Self::InvalidJumpTarget { .. } => VerifyErrorKind::InvalidJumpTarget,
            Self::InvalidConstantIndex { .. } => VerifyErrorKind::InvalidConstantIndex,
            Self::ConstantTypeMismatch { .. } => VerifyErrorKind::ConstantTypeMismatch,
            Self::InvalidCallee { .. } => VerifyErrorKind::InvalidCallee,
            Self::MissingEntryPoint { .. } => VerifyErrorKind::MissingEntryPoint,
            Self::InvalidSlot { .. } => VerifyErrorKind::InvalidSlot,
            Self::HandlerUnderflow { .. } => VerifyErrorKind::HandlerUnderflow,
            Self::MalformedCatchEntry { .. } => VerifyErrorKind::MalformedCatchEntry,
            Self::CatchEntryReachableByNormalFlow { .. } => {
                VerifyErrorKind::CatchEntryReachableByNormalFlow
            }
            Self::InconsistentHandlerDepth { .. } => VerifyErrorKind::InconsistentHandlerDepth,
        }
    }

    /// Function the error was found in, if it is function-scoped
    pub fn function(&self) -> Option<&str> {
        match self {
            Self::UnknownOpcode { function, .. }
            | Self::InvalidJumpTarget { function, .. }
            | Self::InvalidConstantIndex { function, .. }
            | Self::ConstantTypeMismatch { function, .. }
            | Self::InvalidCallee { function, .. }
            | Self::InvalidSlot { function, .. }
            | Self::HandlerUnderflow { function, .. }
            | Self::MalformedCatchEntry { function, .. }
            | Self::CatchEntryReachableByNormalFlow { function, .. }
            | Self::InconsistentHandlerDepth { function, .. } => Some(function),
            Self::DuplicateFunction { name } => Some(name),
            _ => None,
        }
    }

    /// Instruction index the error was found at, if it is function-scoped
    pub fn pc(&self) -> Option<usize> {
        match self {
            Self::UnknownOpcode { pc, .. }
            | Self::InvalidJumpTarget { pc, .. }
            | Self::InvalidConstantIndex { pc, .. }
            | Self::ConstantTypeMismatch { pc, .. }
            | Self::InvalidCallee { pc, .. }
            | Self::InvalidSlot { pc, .. }
            | Self::HandlerUnderflow { pc, .. }
            | Self::MalformedCatchEntry { pc, .. }
            | Self::CatchEntryReachableByNormalFlow { pc, .. }
            | Self::InconsistentHandlerDepth { pc, .. } => Some(*pc),
            _ => None,
        }
    }
}

/// Result type for bytecode loading
pub type Result<T> = std::result::Result<T, VerifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_location() {
        let err = VerifyError::HandlerUnderflow {
            function: "Main.main".into(),
            pc: 3,
        };
        assert_eq!(err.kind(), VerifyErrorKind::HandlerUnderflow);
        assert_eq!(err.function(), Some("Main.main"));
        assert_eq!(err.pc(), Some(3));
        assert_eq!(
            err.to_string(),
            "Main.main@3: handler pop with empty handler stack"
        );
    }

    #[test]
    fn test_container_errors_have_no_location() {
        let err = VerifyError::BadVersion {
            found: 7,
            expected: 1,
        };
        assert_eq!(err.function(), None);
        assert_eq!(err.pc(), None);
        assert!(err.to_string().contains('7'));
    }
}
