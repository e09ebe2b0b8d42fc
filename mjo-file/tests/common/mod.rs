#![allow(dead_code)]

use mjo_file::{FunctionEntry, MjoFile};
use mjo_isa::{Instruction, Target, by_mnemonic};

pub fn insn(mnemonic: &str) -> Instruction {
    Instruction::new(by_mnemonic(mnemonic).unwrap())
}

/// `line 3; ldc.i 5; return` as a single-function file.
pub fn small_file(encrypted: bool, read_mark: bool) -> MjoFile {
    let mut line = insn("line");
    line.line_number = 3;
    let mut ldc = insn("ldc.i");
    ldc.int_value = 5;
    MjoFile {
        encrypted,
        read_mark,
        entry_offset: 0,
        functions: vec![FunctionEntry { hash: 0x1d12_8f30, offset: 0 }],
        instructions: vec![line, ldc, insn("return")],
    }
}

pub fn text(s: &str) -> Instruction {
    let mut t = insn("text");
    t.string = Some(s.to_string());
    t
}

pub fn br(displacement: i32) -> Instruction {
    let mut b = insn("br");
    b.jump = Some(Target::Offset(displacement));
    b
}
