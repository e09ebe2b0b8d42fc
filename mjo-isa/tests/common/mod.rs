#![allow(dead_code)]

use mjo_isa::*;

/// Build an instruction from a mnemonic and let the caller fill operands.
pub fn insn(mnemonic: &str) -> Instruction {
    Instruction::new(by_mnemonic(mnemonic).unwrap())
}

pub fn ldc_i(value: i32) -> Instruction {
    let mut i = insn("ldc.i");
    i.int_value = value;
    i
}

pub fn br(mnemonic: &str, displacement: i32) -> Instruction {
    let mut i = insn(mnemonic);
    i.jump = Some(Target::Offset(displacement));
    i
}

/// Encode, decode, and compare operand slots (offsets and sizes aside).
pub fn assert_roundtrip(program: &[Instruction]) {
    let bytes = encode(program).unwrap();
    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded.len(), program.len(), "length mismatch");
    for (i, (a, b)) in program.iter().zip(&decoded).enumerate() {
        let mut b = b.clone();
        b.offset = a.offset;
        b.size = a.size;
        assert_eq!(a, &b, "mismatch at {i}: {} vs {}", a.opcode, b.opcode);
    }
    assert_eq!(encode(&decoded).unwrap(), bytes, "re-encoding is not byte-identical");
}
