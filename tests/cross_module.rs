//! Cross-module consistency tests
//!
//! The assembler's encoder, evm2-spec's bit layout, the disassembler's decoder
//! and the runtime's loader must agree on every field.

use std::fs;

use evm2_assembler::assemble;
use evm2_disassembler::Decoder;
use evm2_runtime::{ErrorKind, Process, RuntimeError};
use evm2_spec::{
    opcode::ENCODED_OPCODES, AccessSize, Argument, BitWriter, ImageError, ImageHeader, Opcode,
    Program,
};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

fn write_image(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

// ============================================================================
// Image Loading
// ============================================================================

#[test]
fn test_header_matches_declared_sizes() {
    let program = assemble(".dataSize 100\n.code\nhlt\n.data\n01 02 03\n").unwrap();
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "sizes.evm", &program.to_bytes());

    let process = Process::load(&path).unwrap();
    assert_eq!(process.header().code_size, 1);
    assert_eq!(process.header().data_size, 100);
    assert_eq!(process.header().initial_data_size, 3);
    assert_eq!(process.memory().len(), 100);
    assert_eq!(process.memory().read_bytes(0, 4).unwrap(), vec![1, 2, 3, 0]);
}

#[test]
fn test_malformed_images_are_rejected() {
    let dir = TempDir::new().unwrap();
    let good = assemble("hlt\n.data\n05\n").unwrap().to_bytes();

    let mut bad_magic = good.clone();
    bad_magic[7] = b'3';

    let mut bad_data_size = good.clone();
    bad_data_size[12..16].copy_from_slice(&0u32.to_le_bytes());

    let mut truncated = good.clone();
    truncated.pop();

    let mut extended = good.clone();
    extended.push(0);

    let cases: Vec<(&str, Vec<u8>)> = vec![
        ("magic.evm", bad_magic),
        ("data.evm", bad_data_size),
        ("truncated.evm", truncated),
        ("extended.evm", extended),
        ("short.evm", good[..ImageHeader::SIZE - 1].to_vec()),
    ];

    for (name, bytes) in cases {
        let path = write_image(&dir, name, &bytes);
        let err = Process::load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImageFormat, "{name}: {err}");
    }

    let err = Process::load(dir.path().join("absent.evm")).unwrap_err();
    assert!(matches!(err, RuntimeError::Image(ImageError::MissingFile(_))));
}

// ============================================================================
// Encoder / Decoder Agreement
// ============================================================================

#[test]
fn test_every_opcode_decodes_as_assembled() {
    for opcode in ENCODED_OPCODES.into_iter().filter(|op| !op.is_unknown()) {
        let mut operands = Vec::new();
        if opcode.has_address() {
            operands.push("8".to_string());
        }
        if opcode.has_constant() {
            operands.push("-1".to_string());
        }
        for i in 0..opcode.arg_count() {
            operands.push(format!("r{}", i + 1));
        }
        let source = format!("{} {}\nhlt\n", opcode.mnemonic(), operands.join(", "));
        let program = assemble(&source).unwrap();

        let mut decoder = Decoder::new(Arc::new(program.bitstream()));
        assert_eq!(decoder.fetch().unwrap(), opcode, "{source}");
        if opcode.has_address() {
            assert_eq!(decoder.instruction().address, 8);
        }
        if opcode.has_constant() {
            assert_eq!(decoder.instruction().constant, -1);
        }
        assert_eq!(decoder.instruction().arguments.len(), opcode.arg_count());
        assert_eq!(decoder.fetch().unwrap(), Opcode::Halt, "{source}");
    }
}

#[test]
fn test_assembler_matches_bit_writer() {
    let program = assemble("mov qword[r3], r12\nret\n").unwrap();

    let mut writer = BitWriter::new();
    writer.push_opcode(Opcode::Mov);
    writer.push_argument(&Argument::memory(AccessSize::Qword, 3));
    writer.push_argument(&Argument::register(12));
    writer.push_opcode(Opcode::Ret);

    assert_eq!(program.code, writer.into_code_bytes());
}

#[test]
fn test_program_roundtrip_through_bytes() {
    let program = assemble(".dataSize 12\n.code\nloadConst 3, r0\nhlt\n.data\naa bb\n").unwrap();
    assert_eq!(Program::from_bytes(&program.to_bytes()).unwrap(), program);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_constant_survives_toolchain(value in any::<i64>()) {
        let program = assemble(&format!("loadConst {value}, r0\nconsoleWrite r0\nhlt\n")).unwrap();
        prop_assert_eq!(evm2_runtime::run(&program, vec![]).unwrap(), vec![value]);
    }

    #[test]
    fn test_memory_width_roundtrip(
        value in any::<i64>(),
        address in 0i64..56,
        width in prop_oneof![Just("byte"), Just("word"), Just("dword"), Just("qword")],
    ) {
        let program = assemble(&format!(
            ".dataSize 64\n.code\nloadConst {value}, r0\nloadConst {address}, r1\nmov r0, {width}[r1]\nmov {width}[r1], r2\nconsoleWrite r2\nhlt\n"
        ))
        .unwrap();

        let bytes = match width {
            "byte" => 1,
            "word" => 2,
            "dword" => 4,
            _ => 8,
        };
        let expected = if bytes == 8 {
            value
        } else {
            value & ((1i64 << (bytes * 8)) - 1)
        };
        prop_assert_eq!(evm2_runtime::run(&program, vec![]).unwrap(), vec![expected]);
    }
}
