use proptest::prelude::*;
use tern_vm_bytecode::{Constant, ENTRY_POINT, Instruction, LoaderOptions, load};
use tern_vm_compiler::{BinOp, EncodeError, IrFunction, IrInstruction as I, IrProgram, encode};

fn try_catch_program() -> IrProgram {
    let mut helper = IrFunction::new("Main.fail");
    helper
        .emit(I::Const {
            dst: 0,
            value: Constant::string("boom"),
        })
        .emit(I::Throw { src: 0 });

    let mut main = IrFunction::new(ENTRY_POINT);
    main.emit(I::TryPush {
        catch_label: "catch".into(),
        catch_type: "any".into(),
    })
    .emit(I::Call {
        function: "Main.fail".into(),
        args: vec![],
        dst: None,
    })
    .emit(I::TryPop)
    .emit(I::Jump { label: "end".into() })
    .label("catch")
    .emit(I::CatchBind { dst: 1 })
    .emit(I::Print {
        src: 1,
        newline: true,
    })
    .label("end")
    .emit(I::Return { src: None });

    let mut program = IrProgram::new();
    program.push(main).push(helper);
    program
}

#[test]
fn encoded_program_loads_with_matching_counts() {
    let ir = try_catch_program();
    let bytes = encode(&ir).unwrap();
    let program = load(&bytes, &LoaderOptions::strict()).unwrap();

    assert_eq!(program.functions().len(), ir.functions.len());
    for (loaded, source) in program.functions().iter().zip(&ir.functions) {
        assert_eq!(loaded.name(), source.name);
        assert_eq!(loaded.len(), source.encoded_len());
    }
    // "boom" and "any"
    assert_eq!(program.constants().len(), 2);
}

#[test]
fn labels_resolve_to_instruction_indices() {
    let bytes = encode(&try_catch_program()).unwrap();
    let program = load(&bytes, &LoaderOptions::default()).unwrap();
    let (_, main) = program.function_by_name(ENTRY_POINT).unwrap();
    assert!(matches!(
        main.instructions()[0],
        Instruction::TryPush { catch, .. } if catch.pc() == 4
    ));
    assert!(matches!(
        main.instructions()[3],
        Instruction::Jump { target } if target.pc() == 6
    ));
}

#[test]
fn failed_encode_produces_no_bytes() {
    let mut program = try_catch_program();
    program.functions[0].emit(I::Jump {
        label: "missing".into(),
    });
    assert!(encode(&program).is_err());
}

fn tail_branch(join: impl FnOnce(&mut IrFunction)) -> IrProgram {
    let mut main = IrFunction::new(ENTRY_POINT);
    main.emit(I::Const {
        dst: 0,
        value: Constant::Bool(true),
    })
    .emit(I::JumpIfFalse {
        cond: 0,
        label: "end".into(),
    })
    .emit(I::Print {
        src: 0,
        newline: true,
    })
    .label("end");
    join(&mut main);
    let mut program = IrProgram::new();
    program.push(main);
    program
}

#[test]
fn branch_to_trailing_label_is_rejected() {
    let err = encode(&tail_branch(|_| {})).unwrap_err();
    assert_eq!(
        err,
        EncodeError::LabelPastEnd {
            function: ENTRY_POINT.into(),
            label: "end".into(),
        }
    );
}

#[test]
fn branch_to_label_before_return_loads() {
    let ir = tail_branch(|f| {
        f.emit(I::Return { src: None });
    });
    let bytes = encode(&ir).unwrap();
    let program = load(&bytes, &LoaderOptions::strict()).unwrap();
    assert_eq!(program.functions()[0].len(), 4);
}

#[test]
fn unreferenced_trailing_label_is_harmless() {
    let mut main = IrFunction::new(ENTRY_POINT);
    main.emit(I::Return { src: None }).label("unused");
    let mut ir = IrProgram::new();
    ir.push(main);
    let bytes = encode(&ir).unwrap();
    assert!(load(&bytes, &LoaderOptions::strict()).is_ok());
}

fn arith_op() -> impl Strategy<Value = BinOp> {
    prop_oneof![
        Just(BinOp::Add),
        Just(BinOp::Sub),
        Just(BinOp::Mul),
        Just(BinOp::Div),
    ]
}

proptest! {
    #[test]
    fn straight_line_programs_roundtrip(
        consts in proptest::collection::vec((0u32..16, any::<i64>()), 0..12),
        ops in proptest::collection::vec((arith_op(), 0u32..16, 0u32..16, 0u32..16), 0..12),
    ) {
        let mut main = IrFunction::new(ENTRY_POINT);
        for (dst, n) in &consts {
            main.emit(I::Const { dst: *dst, value: Constant::Int(*n) });
        }
        for (op, lhs, rhs, dst) in &ops {
            main.emit(I::BinOp { op: *op, lhs: *lhs, rhs: *rhs, dst: *dst });
        }
        main.emit(I::Return { src: None });
        let mut ir = IrProgram::new();
        ir.push(main);

        let bytes = encode(&ir).unwrap();
        let program = load(&bytes, &LoaderOptions::strict()).unwrap();
        prop_assert_eq!(program.functions()[0].len(), consts.len() + ops.len() + 1);

        let mut distinct: Vec<i64> = consts.iter().map(|(_, n)| *n).collect();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(program.constants().len(), distinct.len());
        prop_assert_eq!(program.to_bytes(), bytes);
    }
}
