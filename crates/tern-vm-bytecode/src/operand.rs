//! Bytecode operands
//!
//! On the wire every operand is a big-endian `i32`. The typed wrappers below only
//! exist once the verifier has checked the raw value against its [`OperandKind`].

use serde::{Deserialize, Serialize};

use crate::constant::ConstTag;

/// Highest slot index a function may reference
///
/// Frames hold at most 256 slots, which bounds the memory a verified program
/// can pin per call.
pub const MAX_SLOT: u32 = 255;

/// Number of argument slots carried by call instructions
pub const CALL_ARG_COUNT: usize = 4;

/// Raw encoding of an absent optional operand
pub const NO_OPERAND: i32 = -1;

/// Value cell in the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Slot(pub u16);

impl Slot {
    /// Create a new slot
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Get slot index
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Convert a raw operand, rejecting negatives and indices above [`MAX_SLOT`]
    #[inline]
    pub fn from_raw(raw: i32) -> Option<Self> {
        u16::try_from(raw)
            .ok()
            .filter(|&n| u32::from(n) <= MAX_SLOT)
            .map(Self)
    }

    /// Convert an optional raw operand (`-1` = none)
    #[inline]
    pub fn from_raw_opt(raw: i32) -> Option<Option<Self>> {
        if raw == NO_OPERAND {
            Some(None)
        } else {
            Self::from_raw(raw).map(Some)
        }
    }
}

impl From<u16> for Slot {
    fn from(index: u16) -> Self {
        Self(index)
    }
}

/// Index into constant pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ConstantIndex(pub u32);

impl ConstantIndex {
    /// Create a new constant index
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get index value
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Index into function table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct FunctionIndex(pub u32);

impl FunctionIndex {
    /// Create a new function index
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get index value
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Absolute instruction index within the owning function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct CodeAddr(pub u32);

impl CodeAddr {
    /// Create a new code address
    #[inline]
    pub const fn new(pc: u32) -> Self {
        Self(pc)
    }

    /// Get the instruction index
    #[inline]
    pub const fn pc(self) -> usize {
        self.0 as usize
    }
}

/// What a raw operand means, and therefore how the verifier checks it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Slot index in the current frame
    Slot,
    /// Slot index, or `-1` for none
    OptSlot,
    /// Constant-pool index; `Some(tag)` pins the constant's tag
    Const(Option<ConstTag>),
    /// Constant-pool index or `-1`; `Some(tag)` pins the constant's tag
    OptConst(Option<ConstTag>),
    /// Instruction index inside the same function
    CodeAddr,
    /// Index into the function table
    Function,
    /// Boolean flag, zero or non-zero
    Flag,
}

impl OperandKind {
    /// The constant tag this operand requires, if it references the pool
    pub const fn required_tag(self) -> Option<ConstTag> {
        match self {
            Self::Const(tag) | Self::OptConst(tag) => tag,
            _ => None,
        }
    }

    /// Whether `-1` is an accepted encoding of "absent"
    pub const fn is_optional(self) -> bool {
        matches!(self, Self::OptSlot | Self::OptConst(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_from_raw() {
        assert_eq!(Slot::from_raw(5), Some(Slot(5)));
        assert_eq!(Slot::from_raw(-1), None);
        assert_eq!(Slot::from_raw(MAX_SLOT as i32), Some(Slot(255)));
        assert_eq!(Slot::from_raw(MAX_SLOT as i32 + 1), None);
        assert_eq!(Slot::from_raw(65_535), None);
        assert_eq!(Slot::from_raw_opt(-1), Some(None));
        assert_eq!(Slot::from_raw_opt(-2), None);
        assert_eq!(Slot::from_raw_opt(3), Some(Some(Slot(3))));
    }

    #[test]
    fn test_constant_index() {
        let c = ConstantIndex::new(1000);
        assert_eq!(c.index(), 1000);
    }

    #[test]
    fn test_required_tag() {
        assert_eq!(
            OperandKind::Const(Some(ConstTag::String)).required_tag(),
            Some(ConstTag::String)
        );
        assert_eq!(OperandKind::Slot.required_tag(), None);
        assert!(OperandKind::OptConst(None).is_optional());
        assert!(!OperandKind::CodeAddr.is_optional());
    }
}
