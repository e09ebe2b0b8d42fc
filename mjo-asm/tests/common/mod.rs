#![allow(dead_code)]

use mjo_file::FunctionEntry;
use mjo_ir::{InstructionList, Script};
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

pub fn text(s: &str) -> Instruction {
    let mut i = insn("text");
    i.string = Some(s.to_string());
    i
}

/// A variable access on the persistent int `$hash`.
pub fn var(mnemonic: &str, hash: u32) -> Instruction {
    let mut i = insn(mnemonic);
    i.hash = hash;
    i.flags = Flags::new(MjoType::Int, Scope::Persistent, Modifier::None, InvertMode::None, 0);
    i.var_offset = -1;
    i
}

/// Lay out `functions` back to back; the first one is the entry point.
pub fn listing(functions: Vec<(u32, Vec<Instruction>)>) -> InstructionList {
    let mut instructions = Vec::new();
    let mut index = Vec::new();
    let mut offset = 0;
    for (hash, body) in functions {
        index.push(FunctionEntry { hash, offset });
        for mut i in body {
            let size = mjo_isa::encoded_size(&i).unwrap();
            i.offset = Some(offset);
            i.size = Some(size);
            offset += size;
            instructions.push(i);
        }
    }
    let mut list = InstructionList {
        meta: Default::default(),
        instructions,
        index,
        entry_offset: 0,
    };
    list.meta.read_mark = true;
    list
}

/// `ld $AAAA; brfalse L; ldc.i 1; st.i $AAAA; br M;
///  L: ldc.i 2; st.i $AAAA; M: return`
pub fn if_else() -> InstructionList {
    listing(vec![(0x1234, vec![
        var("ld", 0xAAAA),
        jump("brfalse", 22),
        ldc_i(1),
        var("st.i", 0xAAAA),
        jump("br", 16),
        ldc_i(2),
        var("st.i", 0xAAAA),
        insn("return"),
    ])])
}

/// `ldc.i 1; ld $AAAA; brfalse L; pop; ldc.i 2; L: pop; return`
///
/// Two different values reach `L` in the same stack slot.
pub fn merge() -> InstructionList {
    listing(vec![(0x1234, vec![
        ldc_i(1),
        var("ld", 0xAAAA),
        jump("brfalse", 8),
        insn("pop"),
        ldc_i(2),
        insn("pop"),
        insn("return"),
    ])])
}

pub fn graph(list: InstructionList) -> Script {
    let mut script = Script::InstructionList(list);
    script.to_control_flow_graph().unwrap();
    script
}
