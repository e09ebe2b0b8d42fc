use crate::flags::{Flags, MjoType};
use crate::opcode::Opcode;

/// A branch destination.
///
/// Freshly decoded instructions carry raw displacements; once the script is
/// split into basic blocks every destination refers to a block of the same
/// function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// Byte displacement, relative to the end of the jump operand.
    Offset(i32),
    /// Index into the owning function's block arena.
    Block(usize),
}

/// One instruction with every operand slot.
///
/// Only the slots named by the opcode's encoding are meaningful; the others
/// keep their defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: &'static Opcode,
    /// Byte offset in the code blob, while in instruction-list form.
    pub offset: Option<u32>,
    /// Encoded size in bytes, while in instruction-list form.
    pub size: Option<u32>,
    pub flags: Flags,
    pub hash: u32,
    pub var_offset: i16,
    pub int_value: i32,
    pub float_value: f32,
    pub string: Option<String>,
    /// Original bytes of a string operand that is not valid Shift-JIS.
    /// Written back as long as `string` still holds their lossy decoding.
    pub raw_string: Option<Vec<u8>>,
    /// Key into the externalized-string table, replacing `string`.
    pub external_key: Option<String>,
    pub arg_count: u16,
    pub line_number: u16,
    pub type_list: Vec<MjoType>,
    pub jump: Option<Target>,
    pub switch_cases: Vec<Target>,
}

impl Instruction {
    pub fn new(opcode: &'static Opcode) -> Self {
        Self {
            opcode,
            offset: None,
            size: None,
            flags: Flags::default(),
            hash: 0,
            var_offset: 0,
            int_value: 0,
            float_value: 0.0,
            string: None,
            raw_string: None,
            external_key: None,
            arg_count: 0,
            line_number: 0,
            type_list: Vec::new(),
            jump: None,
            switch_cases: Vec::new(),
        }
    }

    pub fn value(&self) -> u16 {
        self.opcode.value
    }

    pub fn is_jump(&self) -> bool {
        self.opcode.is_jump()
    }

    pub fn is_switch(&self) -> bool {
        self.opcode.is_switch()
    }

    pub fn is_return(&self) -> bool {
        self.opcode.is_return()
    }

    /// Raw displacement of a jump, while still in instruction-list form.
    pub fn jump_offset(&self) -> Option<i32> {
        match self.jump {
            Some(Target::Offset(d)) => Some(d),
            _ => None,
        }
    }

    pub fn jump_block(&self) -> Option<usize> {
        match self.jump {
            Some(Target::Block(b)) => Some(b),
            _ => None,
        }
    }

    /// Byte offset following this instruction.
    pub fn next_offset(&self) -> Option<u32> {
        Some(self.offset? + self.size?)
    }

    /// Absolute offset of a jump destination.
    pub fn jump_destination(&self) -> Option<i64> {
        let displacement = self.jump_offset()?;
        Some(self.next_offset()? as i64 + displacement as i64)
    }

    /// Absolute offsets of the switch case destinations. Each displacement
    /// is relative to the end of its own case slot.
    pub fn switch_destinations(&self) -> Option<Vec<i64>> {
        let base = self.offset? as i64 + 2 + 2;
        self.switch_cases
            .iter()
            .enumerate()
            .map(|(i, case)| match case {
                Target::Offset(d) => Some(base + 4 * (i as i64 + 1) + *d as i64),
                Target::Block(_) => None,
            })
            .collect()
    }
}
