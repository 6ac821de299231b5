//! Loader and static verifier
//!
//! [`load`] decodes a container and runs every structural check before handing
//! out a [`Program`]. Checks run in a fixed order and the first failure wins:
//!
//! 1. magic and version
//! 2. constant pool decode
//! 3. function table decode
//! 4. code-address bounds
//! 5. constant-index bounds
//! 6. constant tags
//! 7. callee indices
//! 8. entry point (strict mode only)
//! 9. slot operands
//! 10. handler-stack structure

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::Reader;
use crate::constant::{ConstTag, Constant, ConstantPool};
use crate::error::{Result, VerifyError};
use crate::function::Function;
use crate::instruction::{Instruction, Opcode};
use crate::operand::{NO_OPERAND, OperandKind, Slot};
use crate::program::{ENTRY_POINT, Program};
use crate::{BYTECODE_MAGIC, BYTECODE_VERSION};

/// Options that change what the loader accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Require [`ENTRY_POINT`] to be present
    pub strict_entry: bool,
}

impl LoaderOptions {
    /// Options requiring an entry point
    pub fn strict() -> Self {
        Self { strict_entry: true }
    }
}

/// Trust settings for bytecode input
///
/// Untrusted input implies strict entry unless `strict_entry` says otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Explicit strict-entry override
    pub strict_entry: Option<bool>,
    /// Treat input as untrusted
    pub untrusted: bool,
}

impl TrustConfig {
    /// Resolve into loader options
    pub fn loader_options(&self) -> LoaderOptions {
        if self.untrusted && self.strict_entry == Some(false) {
            warn!("untrusted bytecode with strict entry explicitly disabled");
        }
        LoaderOptions {
            strict_entry: self.strict_entry.unwrap_or(self.untrusted),
        }
    }
}

impl From<TrustConfig> for LoaderOptions {
    fn from(trust: TrustConfig) -> Self {
        trust.loader_options()
    }
}

struct RawInsn {
    opcode: Opcode,
    operands: Vec<i32>,
}

struct RawFunction {
    name: String,
    code: Vec<RawInsn>,
}

/// Decode and verify a bytecode container
///
/// Pure: identical input and options always give an identical result.
pub fn load(bytes: &[u8], options: &LoaderOptions) -> Result<Program> {
    let mut r = Reader::new(bytes);

    read_header(&mut r)?;
    let constants = read_constants(&mut r)?;
    let raw = read_functions(&mut r)?;
    if r.remaining() > 0 {
        return Err(VerifyError::TrailingBytes {
            offset: r.offset(),
            count: r.remaining(),
        });
    }

    check_jump_targets(&raw)?;
    check_constant_indices(&raw, &constants)?;
    check_constant_tags(&raw, &constants)?;
    check_callees(&raw)?;
    if options.strict_entry && !raw.iter().any(|f| f.name == ENTRY_POINT) {
        return Err(VerifyError::MissingEntryPoint {
            entry: ENTRY_POINT.to_string(),
        });
    }
    check_slots(&raw)?;

    let mut functions = Vec::with_capacity(raw.len());
    for f in raw {
        let code = typed_code(&f)?;
        check_handlers(&f.name, &code)?;
        functions.push(Function::new(f.name, code));
    }

    let program = Program::new(constants, functions);
    debug!(
        constants = program.constants().len(),
        functions = program.functions().len(),
        instructions = program.instruction_count(),
        strict_entry = options.strict_entry,
        "bytecode verified"
    );
    Ok(program)
}

fn read_header(r: &mut Reader<'_>) -> Result<()> {
    let head = r.peek_rest(BYTECODE_MAGIC.len());
    if head != BYTECODE_MAGIC {
        return Err(VerifyError::BadMagic {
            found: head.to_vec(),
        });
    }
    for _ in 0..BYTECODE_MAGIC.len() {
        r.read_u8("magic")?;
    }

    let version = r.read_u32("version")?;
    if version != BYTECODE_VERSION {
        return Err(VerifyError::BadVersion {
            found: version,
            expected: BYTECODE_VERSION,
        });
    }
    Ok(())
}

fn read_constants(r: &mut Reader<'_>) -> Result<ConstantPool> {
    let count = r.read_u32("constant count")?;
    let mut pool = ConstantPool::with_capacity(r.capacity_hint(count, 1));
    for index in 0..count {
        let raw_tag = r.read_u8("constant tag")?;
        let tag = ConstTag::from_byte(raw_tag).ok_or(VerifyError::UnknownConstantTag {
            index,
            tag: raw_tag,
        })?;
        let constant = match tag {
            ConstTag::Null => Constant::Null,
            ConstTag::Int => Constant::Int(r.read_i64("integer constant")?),
            ConstTag::Float => Constant::Float(f64::from_bits(r.read_u64("float constant")?)),
            ConstTag::String => Constant::String(r.read_str("string constant")?),
            ConstTag::Bool => Constant::Bool(r.read_u8("boolean constant")? != 0),
        };
        pool.push_raw(constant);
    }
    Ok(pool)
}

fn read_functions(r: &mut Reader<'_>) -> Result<Vec<RawFunction>> {
    let count = r.read_u32("function count")?;
    let mut functions = Vec::with_capacity(r.capacity_hint(count, 8));
    let mut seen = FxHashSet::default();

    for _ in 0..count {
        let name = r.read_str("function name")?;
        if !seen.insert(name.clone()) {
            return Err(VerifyError::DuplicateFunction { name });
        }

        let insn_count = r.read_u32("instruction count")?;
        let mut code = Vec::with_capacity(r.capacity_hint(insn_count, 4));
        for pc in 0..insn_count as usize {
            let raw_code = r.read_u32("opcode")?;
            let opcode = Opcode::from_code(raw_code).ok_or_else(|| VerifyError::UnknownOpcode {
                function: name.clone(),
                pc,
                code: raw_code,
            })?;
            let operands = opcode
                .operands()
                .iter()
                .map(|_| r.read_i32("operand"))
                .collect::<Result<Vec<_>>>()?;
            code.push(RawInsn { opcode, operands });
        }
        functions.push(RawFunction { name, code });
    }
    Ok(functions)
}

/// Visit every operand of every instruction, in program order
fn each_operand<F>(functions: &[RawFunction], mut check: F) -> Result<()>
where
    F: FnMut(&RawFunction, usize, OperandKind, i32) -> Result<()>,
{
    for f in functions {
        for (pc, insn) in f.code.iter().enumerate() {
            for (kind, &raw) in insn.opcode.operands().iter().zip(&insn.operands) {
                check(f, pc, *kind, raw)?;
            }
        }
    }
    Ok(())
}

fn in_range(raw: i32, len: usize) -> bool {
    usize::try_from(raw).is_ok_and(|v| v < len)
}

fn check_jump_targets(functions: &[RawFunction]) -> Result<()> {
    each_operand(functions, |f, pc, kind, raw| {
        if kind == OperandKind::CodeAddr && !in_range(raw, f.code.len()) {
            return Err(VerifyError::InvalidJumpTarget {
                function: f.name.clone(),
                pc,
                target: raw,
                len: f.code.len(),
            });
        }
        Ok(())
    })
}

fn check_constant_indices(functions: &[RawFunction], pool: &ConstantPool) -> Result<()> {
    each_operand(functions, |f, pc, kind, raw| {
        let ok = match kind {
            OperandKind::Const(_) => in_range(raw, pool.len()),
            OperandKind::OptConst(_) => raw == NO_OPERAND || in_range(raw, pool.len()),
            _ => true,
        };
        if !ok {
            return Err(VerifyError::InvalidConstantIndex {
                function: f.name.clone(),
                pc,
                index: raw,
                len: pool.len(),
            });
        }
        Ok(())
    })
}

fn check_constant_tags(functions: &[RawFunction], pool: &ConstantPool) -> Result<()> {
    each_operand(functions, |f, pc, kind, raw| {
        let Some(expected) = kind.required_tag() else {
            return Ok(());
        };
        if raw == NO_OPERAND && kind.is_optional() {
            return Ok(());
        }
        // Index bounds were checked by the previous pass.
        let index = raw as u32;
        if let Some(found) = pool.get(index).map(Constant::tag) {
            if found != expected {
                return Err(VerifyError::ConstantTypeMismatch {
                    function: f.name.clone(),
                    pc,
                    index,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    })
}

fn check_callees(functions: &[RawFunction]) -> Result<()> {
    let len = functions.len();
    each_operand(functions, |f, pc, kind, raw| {
        if kind == OperandKind::Function && !in_range(raw, len) {
            return Err(VerifyError::InvalidCallee {
                function: f.name.clone(),
                pc,
                index: raw,
                len,
            });
        }
        Ok(())
    })
}

fn check_slots(functions: &[RawFunction]) -> Result<()> {
    each_operand(functions, |f, pc, kind, raw| {
        let ok = match kind {
            OperandKind::Slot => Slot::from_raw(raw).is_some(),
            OperandKind::OptSlot => Slot::from_raw_opt(raw).is_some(),
            _ => true,
        };
        if !ok {
            return Err(VerifyError::InvalidSlot {
                function: f.name.clone(),
                pc,
                slot: raw,
            });
        }
        Ok(())
    })
}

fn typed_code(f: &RawFunction) -> Result<Vec<Instruction>> {
    f.code
        .iter()
        .enumerate()
        .map(|(pc, insn)| {
            // Every operand kind has been range-checked by now, so this only
            // fails on a schema mismatch.
            Instruction::from_raw(insn.opcode, &insn.operands).ok_or_else(|| {
                VerifyError::InvalidSlot {
                    function: f.name.clone(),
                    pc,
                    slot: insn.operands.first().copied().unwrap_or(NO_OPERAND),
                }
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Normal,
    Exceptional,
}

/// Handler-depth dataflow over one function's control-flow graph
///
/// Each reachable instruction gets exactly one handler depth. `TryPush` has a
/// normal edge to the next instruction at depth + 1 and an exceptional edge to
/// its catch entry at the current depth. Catch entries may only be entered by
/// exceptional edges.
fn check_handlers(name: &str, code: &[Instruction]) -> Result<()> {
    let mut is_catch_entry = vec![false; code.len()];
    for (pc, insn) in code.iter().enumerate() {
        if let Instruction::TryPush { catch, .. } = insn {
            let target = catch.pc();
            if !matches!(code.get(target), Some(Instruction::CatchBind { .. })) {
                return Err(VerifyError::MalformedCatchEntry {
                    function: name.to_string(),
                    pc,
                    target,
                });
            }
            is_catch_entry[target] = true;
        }
    }

    let mut walk = HandlerWalk {
        name,
        is_catch_entry,
        depth_at: vec![None; code.len()],
        worklist: Vec::new(),
    };
    walk.visit(0, 0, Edge::Normal)?;

    while let Some(pc) = walk.worklist.pop() {
        let Some(depth) = walk.depth_at[pc] else {
            continue;
        };
        let next = pc + 1;
        match &code[pc] {
            Instruction::TryPush { catch, .. } => {
                walk.visit(next, depth + 1, Edge::Normal)?;
                walk.visit(catch.pc(), depth, Edge::Exceptional)?;
            }
            Instruction::TryPop => {
                if depth == 0 {
                    return Err(VerifyError::HandlerUnderflow {
                        function: name.to_string(),
                        pc,
                    });
                }
                walk.visit(next, depth - 1, Edge::Normal)?;
            }
            Instruction::Jump { target } => walk.visit(target.pc(), depth, Edge::Normal)?,
            Instruction::JumpIfFalse { target, .. } => {
                walk.visit(next, depth, Edge::Normal)?;
                walk.visit(target.pc(), depth, Edge::Normal)?;
            }
            Instruction::Return { .. } | Instruction::Throw { .. } => {}
            _ => walk.visit(next, depth, Edge::Normal)?,
        }
    }
    Ok(())
}

struct HandlerWalk<'a> {
    name: &'a str,
    is_catch_entry: Vec<bool>,
    depth_at: Vec<Option<usize>>,
    worklist: Vec<usize>,
}

impl HandlerWalk<'_> {
    fn visit(&mut self, pc: usize, depth: usize, edge: Edge) -> Result<()> {
        // Falling off the end is an implicit return.
        if pc >= self.depth_at.len() {
            return Ok(());
        }
        if edge == Edge::Normal && self.is_catch_entry[pc] {
            return Err(VerifyError::CatchEntryReachableByNormalFlow {
                function: self.name.to_string(),
                pc,
            });
        }
        match self.depth_at[pc] {
            None => {
                self.depth_at[pc] = Some(depth);
                self.worklist.push(pc);
            }
            Some(expected) if expected != depth => {
                return Err(VerifyError::InconsistentHandlerDepth {
                    function: self.name.to_string(),
                    pc,
                    expected,
                    found: depth,
                });
            }
            Some(_) => {}
        }
        Ok(())
    }
}
