//! Container byte layout
//!
//! All integers are big-endian. Layout:
//!
//! ```text
//! magic "TNBC" | version u32
//! constant count u32 | { tag u8, payload }*
//! function count u32 | { name len u32, name utf8, insn count u32, { opcode u32, operand i32* }* }*
//! ```

use crate::constant::{Constant, ConstantPool};
use crate::error::{Result, VerifyError};
use crate::instruction::Instruction;
use crate::{BYTECODE_MAGIC, BYTECODE_VERSION};

/// Bounds-checked big-endian reader
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Bytes from the cursor onward, without consuming them
    pub(crate) fn peek_rest(&self, max: usize) -> &'a [u8] {
        let end = self.bytes.len().min(self.offset.saturating_add(max));
        &self.bytes[self.offset..end]
    }

    fn take(&mut self, len: usize, context: &'static str) -> Result<&'a [u8]> {
        let start = self.offset;
        let slice = start
            .checked_add(len)
            .and_then(|end| self.bytes.get(start..end))
            .ok_or(VerifyError::UnexpectedEnd {
                offset: start,
                context,
            })?;
        self.offset += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N]> {
        let slice = self.take(N, context)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        Ok(self.array::<1>(context)?[0])
    }

    pub(crate) fn read_u32(&mut self, context: &'static str) -> Result<u32> {
        self.array(context).map(u32::from_be_bytes)
    }

    pub(crate) fn read_i32(&mut self, context: &'static str) -> Result<i32> {
        self.array(context).map(i32::from_be_bytes)
    }

    pub(crate) fn read_i64(&mut self, context: &'static str) -> Result<i64> {
        self.array(context).map(i64::from_be_bytes)
    }

    pub(crate) fn read_u64(&mut self, context: &'static str) -> Result<u64> {
        self.array(context).map(u64::from_be_bytes)
    }

    /// Length-prefixed UTF-8 string
    pub(crate) fn read_str(&mut self, context: &'static str) -> Result<String> {
        let len = self.read_u32(context)? as usize;
        let start = self.offset;
        let bytes = self.take(len, context)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| VerifyError::InvalidUtf8 {
                offset: start,
                context,
            })
    }

    /// Capacity hint for `count` records of at least `min_size` bytes each
    ///
    /// Never exceeds what the remaining input could possibly hold, so a forged
    /// count cannot force a large allocation.
    pub(crate) fn capacity_hint(&self, count: u32, min_size: usize) -> usize {
        (count as usize).min(self.remaining() / min_size.max(1))
    }
}

/// Big-endian byte sink
#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn put_str(&mut self, s: &str) {
        self.put_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Serialize a constant pool and function table into a container
///
/// Every function is given as its name and instruction list, in table order.
/// The output is accepted by [`crate::load`] as long as the instructions are
/// well formed.
pub fn write_container<'a, I>(constants: &ConstantPool, functions: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a str, &'a [Instruction])>,
{
    let mut w = Writer::new();
    for b in BYTECODE_MAGIC {
        w.put_u8(b);
    }
    w.put_u32(BYTECODE_VERSION);

    w.put_u32(constants.len() as u32);
    for constant in constants.iter() {
        w.put_u8(constant.tag().to_byte());
        match constant {
            Constant::Null => {}
            Constant::Int(n) => w.put_i64(*n),
            Constant::Float(n) => w.put_u64(n.to_bits()),
            Constant::String(s) => w.put_str(s),
            Constant::Bool(b) => w.put_u8(u8::from(*b)),
        }
    }

    let functions: Vec<_> = functions.into_iter().collect();
    w.put_u32(functions.len() as u32);
    for (name, instructions) in functions {
        w.put_str(name);
        w.put_u32(instructions.len() as u32);
        for insn in instructions {
            w.put_u32(insn.opcode().code());
            for operand in insn.operands() {
                w.put_i32(operand);
            }
        }
    }

    w.into_bytes()
}
