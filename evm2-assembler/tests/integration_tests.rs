//! Integration tests for the EVM2 assembler
//!
//! Tests the complete assembly workflow including:
//! - Instruction encoding for every mnemonic
//! - Label resolution
//! - Section and data-size directives

use evm2_assembler::{assemble, parse_constant};
use evm2_spec::{AccessSize, Bitstream, ImageHeader, Opcode, Program};
use proptest::prelude::*;

/// Read `width` LSB-first bits starting at `start`
fn field(stream: &Bitstream, start: usize, width: usize) -> u64 {
    (0..width).fold(0u64, |value, i| {
        value | (stream.bit(start + i).unwrap() as u64) << i
    })
}

/// Read `length` bits in stream order as a prefix code
fn prefix(stream: &Bitstream, start: usize, length: usize) -> u8 {
    (0..length).fold(0u8, |value, i| value << 1 | stream.bit(start + i).unwrap() as u8)
}

// ============================================================================
// Basic Assembly Tests
// ============================================================================

#[test]
fn test_assemble_empty_program() {
    let program = assemble("").unwrap();
    assert!(program.code.is_empty());
    assert!(program.data.is_empty());
    assert_eq!(program.header, ImageHeader::default());
}

#[test]
fn test_assemble_comments_only() {
    let source = r#"
        # This is a comment
        # Another comment
    "#;
    let program = assemble(source).unwrap();
    assert!(program.code.is_empty());
}

#[test]
fn test_every_mnemonic_writes_its_prefix() {
    let cases = [
        ("mov r0, r1", Opcode::Mov),
        ("loadConst 1, r0", Opcode::LoadConst),
        ("add r0, r1, r2", Opcode::Add),
        ("sub r0, r1, r2", Opcode::Sub),
        ("div r0, r1, r2", Opcode::Divide),
        ("mod r0, r1, r2", Opcode::Mod),
        ("mul r0, r1, r2", Opcode::Mul),
        ("compare r0, r1, r2", Opcode::Compare),
        ("jump 0", Opcode::JumpAddress),
        ("jumpEqual 0, r0, r1", Opcode::JumpEqual),
        ("read r0, r1, r2, r3", Opcode::Read),
        ("write r0, r1, r2", Opcode::Write),
        ("consoleRead r0", Opcode::ConRead),
        ("consoleWrite r0", Opcode::ConWrite),
        ("createThread 0, r0", Opcode::ThreadCreate),
        ("joinThread r0", Opcode::ThreadJoin),
        ("hlt", Opcode::Halt),
        ("sleep r0", Opcode::Sleep),
        ("call 0", Opcode::Call),
        ("ret", Opcode::Ret),
        ("lock r0", Opcode::Lock),
        ("unlock r0", Opcode::Unlock),
    ];

    for (source, opcode) in cases {
        let program = assemble(source).unwrap();
        let stream = program.bitstream();
        let (bits, length) = opcode.prefix().unwrap();
        assert_eq!(prefix(&stream, 0, length as usize), bits, "{}", source);
    }
}

#[test]
fn test_load_const_field_layout() {
    let program = assemble("loadConst 256, r0\n").unwrap();
    let stream = program.bitstream();

    assert_eq!(prefix(&stream, 0, 3), 0b001);
    assert_eq!(field(&stream, 3, 64), 256);
    // register-direct argument: flag 0, register 0
    assert_eq!(field(&stream, 67, 5), 0);
}

#[test]
fn test_memory_argument_layout() {
    let program = assemble("consoleWrite word[r9]\n").unwrap();
    let stream = program.bitstream();

    assert_eq!(stream.bit(5), Some(true));
    assert_eq!(field(&stream, 6, 2), AccessSize::Word.selector() as u64);
    assert_eq!(field(&stream, 8, 4), 9);
}

#[test]
fn test_negative_constant_is_twos_complement() {
    let program = assemble("loadConst -1, r0\n").unwrap();
    assert_eq!(field(&program.bitstream(), 3, 64), u64::MAX);
}

// ============================================================================
// Label Resolution Tests
// ============================================================================

#[test]
fn test_backward_and_forward_labels() {
    let source = r#"
        .code
        top:
            call helper
            jump top
        helper:
            ret
    "#;
    let program = assemble(source).unwrap();
    let stream = program.bitstream();

    // call: 4 + 32, jump: 5 + 32
    assert_eq!(field(&stream, 4, 32), 36 + 37);
    assert_eq!(field(&stream, 36 + 5, 32), 0);
}

#[test]
fn test_label_at_end_of_code() {
    let program = assemble("jump end\nend:\n").unwrap();
    assert_eq!(field(&program.bitstream(), 5, 32), 37);
}

#[test]
fn test_numeric_target() {
    let program = assemble("createThread 0x40, r1\n").unwrap();
    let stream = program.bitstream();
    assert_eq!(field(&stream, 5, 32), 64);
    assert_eq!(field(&stream, 37, 5), 1 << 1);
}

// ============================================================================
// Sections and Data
// ============================================================================

#[test]
fn test_data_section() {
    let source = r#"
        .dataSize 8
        .data
            de ad
            be ef
        .code
            hlt
    "#;
    let program = assemble(source).unwrap();

    assert_eq!(program.data, vec![0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(program.header.data_size, 8);
    assert_eq!(program.header.initial_data_size, 4);
    assert_eq!(program.memory_image(), vec![0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0]);
}

#[test]
fn test_data_labels_are_accepted() {
    let program = assemble(".data\ntable:\n01 02\n").unwrap();
    assert_eq!(program.data, vec![1, 2]);
}

#[test]
fn test_image_roundtrip() {
    let source = ".dataSize 4\n.code\nloadConst 3, r0\nhlt\n.data\n07\n";
    let program = assemble(source).unwrap();
    let reparsed = Program::from_bytes(&program.to_bytes()).unwrap();
    assert_eq!(reparsed, program);
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn test_constant_survives_assembly(value in any::<i64>()) {
        let program = assemble(&format!("loadConst {}, r5\n", value)).unwrap();
        let stream = program.bitstream();
        prop_assert_eq!(field(&stream, 3, 64) as i64, value);
        prop_assert_eq!(field(&stream, 67, 5), 5 << 1);
    }

    #[test]
    fn test_hex_constant_matches_decimal(value in any::<u64>()) {
        prop_assert_eq!(
            parse_constant(&format!("{:#x}", value)),
            parse_constant(&value.to_string())
        );
    }

    #[test]
    fn test_register_arguments(a in 0u8..16, b in 0u8..16) {
        let program = assemble(&format!("mov r{}, r{}\n", a, b)).unwrap();
        let stream = program.bitstream();
        prop_assert_eq!(field(&stream, 3, 5), (a as u64) << 1);
        prop_assert_eq!(field(&stream, 8, 5), (b as u64) << 1);
    }
}
