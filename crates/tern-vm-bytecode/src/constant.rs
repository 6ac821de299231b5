//! Constant pool for bytecode programs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire tag of a constant-pool entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConstTag {
    /// No payload
    Null = 0,
    /// 8-byte big-endian integer
    Int = 1,
    /// 8-byte big-endian IEEE-754 bits
    Float = 2,
    /// u32 length followed by UTF-8 bytes
    String = 3,
    /// 1 byte, zero is false
    Bool = 4,
}

impl ConstTag {
    /// Convert from raw tag byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Null),
            1 => Some(Self::Int),
            2 => Some(Self::Float),
            3 => Some(Self::String),
            4 => Some(Self::Bool),
            _ => None,
        }
    }

    /// Convert to raw tag byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Get the name of this tag
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Bool => "boolean",
        }
    }
}

impl fmt::Display for ConstTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A constant value in the constant pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    /// The null literal
    Null,
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Boolean literal
    Bool(bool),
}

impl Constant {
    /// Create a string constant
    #[inline]
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// The wire tag for this constant
    pub fn tag(&self) -> ConstTag {
        match self {
            Self::Null => ConstTag::Null,
            Self::Int(_) => ConstTag::Int,
            Self::Float(_) => ConstTag::Float,
            Self::String(_) => ConstTag::String,
            Self::Bool(_) => ConstTag::Bool,
        }
    }

    /// Structural identity used for deduplication; floats compare by bit pattern
    fn same_entry(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Constant pool with deduplication
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstantPool {
    constants: Vec<Constant>,
}

impl ConstantPool {
    /// Create a new empty constant pool
    pub fn new() -> Self {
        Self {
            constants: Vec::new(),
        }
    }

    /// Create constant pool with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            constants: Vec::with_capacity(capacity),
        }
    }

    /// Add a constant to the pool, returns its index
    ///
    /// Deduplicates identical constants.
    pub fn add(&mut self, constant: Constant) -> u32 {
        if let Some(idx) = self.constants.iter().position(|c| c.same_entry(&constant)) {
            return idx as u32;
        }

        let idx = self.constants.len() as u32;
        self.constants.push(constant);
        idx
    }

    /// Append without deduplication, preserving the decoded layout
    pub(crate) fn push_raw(&mut self, constant: Constant) {
        self.constants.push(constant);
    }

    /// Add a string constant
    #[inline]
    pub fn add_string(&mut self, s: &str) -> u32 {
        self.add(Constant::string(s))
    }

    /// Add an integer constant
    #[inline]
    pub fn add_int(&mut self, n: i64) -> u32 {
        self.add(Constant::Int(n))
    }

    /// Get a constant by index
    #[inline]
    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    /// Number of constants in the pool
    #[inline]
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    /// Check if the pool is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Iterate over constants
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.constants.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_pool_dedup() {
        let mut pool = ConstantPool::new();

        let idx1 = pool.add_string("hello");
        let idx2 = pool.add_string("world");
        let idx3 = pool.add_string("hello");

        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert_eq!(idx3, 0);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_int_and_string_do_not_collide() {
        let mut pool = ConstantPool::new();
        let a = pool.add_int(1);
        let b = pool.add_string("1");
        let c = pool.add(Constant::Bool(true));
        assert_eq!((a, b, c), (0, 1, 2));
    }

    #[test]
    fn test_float_dedup_by_bits() {
        let mut pool = ConstantPool::new();
        let a = pool.add(Constant::Float(0.0));
        let b = pool.add(Constant::Float(-0.0));
        let c = pool.add(Constant::Float(0.0));
        assert_eq!(a, c);
        assert_ne!(a, b);
    }

    #[test]
    fn test_tag_bytes() {
        for tag in [
            ConstTag::Null,
            ConstTag::Int,
            ConstTag::Float,
            ConstTag::String,
            ConstTag::Bool,
        ] {
            assert_eq!(ConstTag::from_byte(tag.to_byte()), Some(tag));
        }
        assert_eq!(ConstTag::from_byte(99), None);
        assert_eq!(Constant::string("x").tag(), ConstTag::String);
    }
}
