use proptest::prelude::*;
use tern_vm_bytecode::{
    BYTECODE_MAGIC, BYTECODE_VERSION, CodeAddr, ConstantIndex, ConstantPool, ENTRY_POINT,
    Instruction, LoaderOptions, Slot, load, write_container,
};

fn sample_program() -> Vec<u8> {
    let mut pool = ConstantPool::new();
    let msg = pool.add_string("hello");
    let any = pool.add_string("any");
    let code = [
        Instruction::TryPush {
            catch: CodeAddr(5),
            catch_type: ConstantIndex(any),
        },
        Instruction::Const {
            dst: Slot(0),
            idx: ConstantIndex(msg),
        },
        Instruction::Print {
            src: Slot(0),
            newline: true,
        },
        Instruction::TryPop,
        Instruction::Return { src: None },
        Instruction::CatchBind { dst: Slot(1) },
        Instruction::Return { src: Some(Slot(1)) },
    ];
    write_container(&pool, [(ENTRY_POINT, &code[..])])
}

#[test]
fn sample_program_loads_and_reencodes() {
    let bytes = sample_program();
    let program = load(&bytes, &LoaderOptions::strict()).unwrap();
    assert_eq!(program.constants().len(), 2);
    assert_eq!(program.functions().len(), 1);
    assert_eq!(program.functions()[0].len(), 7);
    assert_eq!(program.to_bytes(), bytes);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        .. ProptestConfig::default()
    })]

    #[test]
    fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let first = load(&bytes, &LoaderOptions::default());
        let second = load(&bytes, &LoaderOptions::default());
        match (&first, &second) {
            (Err(a), Err(b)) => prop_assert_eq!(a, b),
            (Ok(a), Ok(b)) => prop_assert_eq!(a.to_bytes(), b.to_bytes()),
            _ => prop_assert!(false, "loader is not deterministic"),
        }
    }

    #[test]
    fn arbitrary_body_after_header_is_categorized(body in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut bytes = BYTECODE_MAGIC.to_vec();
        bytes.extend_from_slice(&BYTECODE_VERSION.to_be_bytes());
        bytes.extend_from_slice(&body);
        let first = load(&bytes, &LoaderOptions::strict());
        let second = load(&bytes, &LoaderOptions::strict());
        prop_assert_eq!(first.map_err(|e| e.kind()).err(), second.map_err(|e| e.kind()).err());
    }

    #[test]
    fn single_byte_corruption_never_panics(pos in 0usize..64, value in any::<u8>()) {
        let mut bytes = sample_program();
        let idx = pos % bytes.len();
        bytes[idx] = value;
        let _ = load(&bytes, &LoaderOptions::strict());
    }

    #[test]
    fn truncation_is_rejected(cut in 0usize..64) {
        let bytes = sample_program();
        let len = cut % bytes.len();
        prop_assert!(load(&bytes[..len], &LoaderOptions::default()).is_err());
    }
}
