#![allow(dead_code)]

use mjo_file::FunctionEntry;
use mjo_ir::InstructionList;
use mjo_isa::{Flags, Instruction, InvertMode, MjoType, Modifier, Scope, Target, by_mnemonic};

pub fn insn(mnemonic: &str) -> Instruction {
    Instruction::new(by_mnemonic(mnemonic).unwrap())
}

pub fn ldc_i(value: i32) -> Instruction {
    let mut i = insn("ldc.i");
    i.int_value = value;
    i
}

pub fn jump(mnemonic: &str, displacement: i32) -> Instruction {
    let mut i = insn(mnemonic);
    i.jump = Some(Target::Offset(displacement));
    i
}

pub fn int_flags(scope: Scope) -> Flags {
    Flags::new(MjoType::Int, scope, Modifier::None, InvertMode::None, 0)
}

/// A variable access on the persistent int `$hash`.
pub fn var(mnemonic: &str, hash: u32) -> Instruction {
    let mut i = insn(mnemonic);
    i.hash = hash;
    i.flags = int_flags(Scope::Persistent);
    i.var_offset = -1;
    i
}

/// Assign offsets and sizes by summation.
pub fn lay_out(mut instructions: Vec<Instruction>) -> Vec<Instruction> {
    let mut offset = 0;
    for i in &mut instructions {
        let size = mjo_isa::encoded_size(i).unwrap();
        i.offset = Some(offset);
        i.size = Some(size);
        offset += size;
    }
    instructions
}

pub fn single_function(instructions: Vec<Instruction>) -> InstructionList {
    let mut list = InstructionList {
        meta: Default::default(),
        instructions: lay_out(instructions),
        index: vec![FunctionEntry { hash: 0x1234, offset: 0 }],
        entry_offset: 0,
    };
    list.meta.read_mark = true;
    list
}

/// `ld $AAAA; brfalse L; ldc.i 1; st.i $AAAA; br M;
///  L: ldc.i 2; st.i $AAAA; M: return`
///
/// Offsets: 0, 10, 16, 22, 32, 38, 44, 54.
pub fn if_else() -> InstructionList {
    single_function(vec![
        var("ld", 0xAAAA),
        jump("brfalse", 22),
        ldc_i(1),
        var("st.i", 0xAAAA),
        jump("br", 16),
        ldc_i(2),
        var("st.i", 0xAAAA),
        insn("return"),
    ])
}
