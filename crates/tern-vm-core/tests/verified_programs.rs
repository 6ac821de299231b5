//! Random instruction streams that pass the loader must run to a result.

use proptest::prelude::*;
use tern_vm_bytecode::{
    ConstTag, Constant, ConstantPool, ENTRY_POINT, Instruction, LoaderOptions, NO_OPERAND, Opcode,
    OperandKind, load, write_container,
};
use tern_vm_core::{Interpreter, StdHost, VmConfig, VmError};

const SLOTS: usize = 6;
const FUNCTIONS: [&str; 2] = [ENTRY_POINT, "Main.helper"];
const HANDLER_OPS: [Opcode; 3] = [Opcode::TryPush, Opcode::TryPop, Opcode::CatchBind];

fn pool() -> ConstantPool {
    let mut pool = ConstantPool::new();
    for constant in [
        Constant::Int(3),
        Constant::Int(0),
        Constant::Int(-2),
        Constant::Float(1.5),
        Constant::Bool(true),
        Constant::Null,
        Constant::string("any"),
        Constant::string("Error"),
        Constant::string("int"),
        Constant::string("abs"),
        Constant::string("length"),
    ] {
        pool.add(constant);
    }
    pool
}

fn constant(tag: Option<ConstTag>, seed: u32, pool: &ConstantPool) -> i32 {
    let candidates: Vec<usize> = pool
        .iter()
        .enumerate()
        .filter(|(_, c)| tag.is_none_or(|t| c.tag() == t))
        .map(|(i, _)| i)
        .collect();
    candidates[seed as usize % candidates.len()] as i32
}

/// Map a seed onto a raw operand that passes the per-operand range checks
fn operand(kind: OperandKind, seed: u32, len: usize, pool: &ConstantPool) -> i32 {
    let pick = |n: usize| (seed as usize % n) as i32;
    let absent = seed % 4 == 0;
    match kind {
        OperandKind::Slot => pick(SLOTS),
        OperandKind::OptSlot if absent => NO_OPERAND,
        OperandKind::OptSlot => pick(SLOTS),
        OperandKind::Const(tag) => constant(tag, seed, pool),
        OperandKind::OptConst(_) if absent => NO_OPERAND,
        OperandKind::OptConst(tag) => constant(tag, seed, pool),
        OperandKind::CodeAddr => pick(len),
        OperandKind::Function => pick(FUNCTIONS.len()),
        OperandKind::Flag => pick(2),
    }
}

fn lower(body: &[(Opcode, Vec<u32>)], pool: &ConstantPool) -> Vec<Instruction> {
    body.iter()
        .map(|(opcode, seeds)| {
            let raw: Vec<i32> = opcode
                .operands()
                .iter()
                .zip(seeds)
                .map(|(kind, seed)| operand(*kind, *seed, body.len(), pool))
                .collect();
            Instruction::from_raw(*opcode, &raw).expect("operands follow the schema")
        })
        .collect()
}

fn opcode() -> impl Strategy<Value = Opcode> {
    let plain: Vec<Opcode> = Opcode::ALL
        .into_iter()
        .filter(|op| !HANDLER_OPS.contains(op))
        .collect();
    prop_oneof![
        9 => prop::sample::select(plain),
        1 => prop::sample::select(HANDLER_OPS.to_vec()),
    ]
}

fn body() -> impl Strategy<Value = Vec<(Opcode, Vec<u32>)>> {
    prop::collection::vec((opcode(), prop::collection::vec(any::<u32>(), 7)), 1..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn loaded_programs_finish_with_a_value_or_a_typed_error(main in body(), helper in body()) {
        let pool = pool();
        let code = [lower(&main, &pool), lower(&helper, &pool)];
        let bytes = write_container(
            &pool,
            FUNCTIONS.iter().copied().zip(code.iter().map(Vec::as_slice)),
        );
        let Ok(program) = load(&bytes, &LoaderOptions::strict()) else {
            return Ok(());
        };

        // Small budgets keep repeated string doubling and deep frames cheap.
        let config = VmConfig {
            max_steps: 32,
            max_call_depth: 8,
            max_array_len: 64,
            ..VmConfig::default()
        };
        let mut host = StdHost::capture();
        let result = Interpreter::new(config).run(&program, &mut host);
        prop_assert!(
            !matches!(result, Err(VmError::Internal(_) | VmError::HandlerUnderflow { .. })),
            "verified program hit an interpreter fault: {:?}",
            result
        );
    }
}
