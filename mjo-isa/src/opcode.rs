//! The opcode table.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::descriptor::{OperandKind, StackEffect, compile_encoding};
use crate::flags::TypeMask;

/// Opcode values the rest of the toolchain dispatches on.
pub mod op {
    pub const NOP_191: u16 = 0x191;
    pub const NOP_1A8: u16 = 0x1a8;
    pub const NOP_1A9: u16 = 0x1a9;
    pub const CONV_I: u16 = 0x83e;
    pub const CONV_R: u16 = 0x83f;
    pub const LDC_I: u16 = 0x800;
    pub const LDSTR: u16 = 0x801;
    pub const LD: u16 = 0x802;
    pub const LDC_R: u16 = 0x803;
    pub const CALL: u16 = 0x80f;
    pub const CALLP: u16 = 0x810;
    pub const ALLOCA: u16 = 0x829;
    pub const RETURN: u16 = 0x82b;
    pub const BR: u16 = 0x82c;
    pub const BRTRUE: u16 = 0x82d;
    pub const BRFALSE: u16 = 0x82e;
    pub const POP: u16 = 0x82f;
    pub const SYSCALL: u16 = 0x834;
    pub const SYSCALLP: u16 = 0x835;
    pub const ARGCHECK: u16 = 0x836;
    pub const LDELEM: u16 = 0x837;
    pub const LINE: u16 = 0x83a;
    pub const TEXT: u16 = 0x840;
    pub const PROC: u16 = 0x841;
    pub const CTRL: u16 = 0x842;
    pub const BSEL_CLR: u16 = 0x844;
    pub const BSEL_5: u16 = 0x847;
    pub const SWITCH: u16 = 0x850;
    pub const PHI: u16 = 0xffff;

    pub const BINARY_FIRST: u16 = 0x100;
    pub const BINARY_LAST: u16 = 0x188;
    pub const STORE_FIRST: u16 = 0x1b0;
    pub const STORE_POP_FIRST: u16 = 0x210;
    pub const STORE_ELEM_FIRST: u16 = 0x270;
    pub const STORE_ELEM_POP_FIRST: u16 = 0x2d0;
    pub const STORE_ELEM_POP_LAST: u16 = 0x320;
}

/// An entry of the opcode table.
pub struct Opcode {
    pub value: u16,
    pub mnemonic: String,
    /// Source-level operator, for operator and store opcodes.
    pub operator: Option<&'static str>,
    /// Encoding descriptor, see [`OperandKind`].
    pub encoding: &'static str,
    /// Stack transition descriptor, see [`StackEffect`].
    pub transition: &'static str,
    pub aliases: Vec<String>,
    /// Behaviour has not been confirmed against the engine.
    pub unverified: bool,
    operands: Vec<OperandKind>,
    effect: StackEffect,
}

impl Opcode {
    pub fn operands(&self) -> &[OperandKind] {
        &self.operands
    }

    pub fn effect(&self) -> &StackEffect {
        &self.effect
    }

    pub fn is_jump(&self) -> bool {
        self.operands == [OperandKind::Jump]
    }

    pub fn is_switch(&self) -> bool {
        self.value == op::SWITCH
    }

    pub fn is_return(&self) -> bool {
        self.value == op::RETURN
    }

    pub fn is_unconditional_jump(&self) -> bool {
        self.value == op::BR
    }

    /// Control never falls through to the next instruction.
    pub fn ends_flow(&self) -> bool {
        matches!(self.value, op::BR | op::SWITCH | op::RETURN)
    }

    pub fn is_phi(&self) -> bool {
        self.value == op::PHI
    }

    pub fn is_binary(&self) -> bool {
        (op::BINARY_FIRST..=op::BINARY_LAST).contains(&self.value)
    }

    /// Any `st`, `stp`, `stelem` or `stelemp` opcode.
    pub fn is_store(&self) -> bool {
        (op::STORE_FIRST..=op::STORE_ELEM_POP_LAST).contains(&self.value)
    }

    pub fn is_element_store(&self) -> bool {
        self.value >= op::STORE_ELEM_FIRST && self.is_store()
    }

    /// Store variant that leaves nothing on the stack.
    pub fn is_popping_store(&self) -> bool {
        (op::STORE_POP_FIRST..op::STORE_ELEM_FIRST).contains(&self.value)
            || (op::STORE_ELEM_POP_FIRST..=op::STORE_ELEM_POP_LAST).contains(&self.value)
    }
}

impl PartialEq for Opcode {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Opcode {}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#06x})", self.mnemonic, self.value)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic)
    }
}

/// Errors from table lookups.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NotFound {
    #[error("unknown opcode value {0:#06x}")]
    Value(u16),
    #[error("unknown mnemonic `{0}`")]
    Mnemonic(String),
}

struct Table {
    opcodes: Vec<Opcode>,
    by_value: HashMap<u16, usize>,
    by_name: HashMap<String, usize>,
    phi: Opcode,
}

static TABLE: LazyLock<Table> = LazyLock::new(build_table);

pub fn by_value(value: u16) -> Result<&'static Opcode, NotFound> {
    let table = &*TABLE;
    table
        .by_value
        .get(&value)
        .map(|&i| &table.opcodes[i])
        .ok_or(NotFound::Value(value))
}

/// Look up a mnemonic or alias, case-insensitively.
pub fn by_mnemonic(name: &str) -> Result<&'static Opcode, NotFound> {
    let table = &*TABLE;
    table
        .by_name
        .get(&name.to_ascii_lowercase())
        .map(|&i| &table.opcodes[i])
        .ok_or_else(|| NotFound::Mnemonic(name.to_string()))
}

/// Every encodable opcode, in definition order.
pub fn all() -> &'static [Opcode] {
    &TABLE.opcodes
}

/// The synthetic merge opcode used by phi instructions.
pub fn phi() -> &'static Opcode {
    &TABLE.phi
}

fn make(
    value: u16,
    mnemonic: String,
    operator: Option<&'static str>,
    encoding: &'static str,
    transition: &'static str,
    aliases: Vec<String>,
) -> Opcode {
    // The table is static data; a malformed descriptor is caught by the
    // opcode coverage tests before it can reach a user.
    let operands = compile_encoding(encoding)
        .unwrap_or_else(|e| panic!("opcode {mnemonic}: bad encoding `{encoding}`: {e}"));
    let effect = StackEffect::compile(transition)
        .unwrap_or_else(|e| panic!("opcode {mnemonic}: {e}"));
    Opcode {
        value,
        mnemonic,
        operator,
        encoding,
        transition,
        aliases,
        unverified: false,
        operands,
        effect,
    }
}

struct Builder {
    opcodes: Vec<Opcode>,
}

/// Per-type variants of operator opcodes: value offset, suffix, type bit.
const VARIANTS: [(u16, &str, TypeMask); 6] = [
    (0, "i", TypeMask::INT),
    (1, "r", TypeMask::FLOAT),
    (2, "s", TypeMask::STRING),
    (3, "iarr", TypeMask::INT_ARRAY),
    (4, "rarr", TypeMask::FLOAT_ARRAY),
    (5, "sarr", TypeMask::STRING_ARRAY),
];

impl Builder {
    fn define(
        &mut self,
        value: u16,
        mnemonic: &str,
        encoding: &'static str,
        transition: &'static str,
        aliases: &[&str],
    ) -> &mut Opcode {
        let aliases = aliases.iter().map(|a| a.to_string()).collect();
        self.opcodes
            .push(make(value, mnemonic.to_string(), None, encoding, transition, aliases));
        let last = self.opcodes.len() - 1;
        &mut self.opcodes[last]
    }

    fn unverified(
        &mut self,
        value: u16,
        mnemonic: &str,
        encoding: &'static str,
        transition: &'static str,
    ) {
        let alias = format!("op.{value:03x}");
        self.define(value, mnemonic, encoding, transition, &[alias.as_str()])
            .unverified = true;
    }

    /// Expand one operator family over the types in `mask`.
    ///
    /// An int-only family drops the `.i` suffix from its mnemonic; otherwise
    /// the int variant also answers to the bare name.
    #[allow(clippy::too_many_arguments)]
    fn family(
        &mut self,
        base: u16,
        mnemonic: &str,
        operator: &'static str,
        mask: TypeMask,
        encoding: &'static str,
        transitions: [&'static str; 6],
        aliases: &[&str],
    ) {
        let int_only = mask == TypeMask::INT;
        for (i, (offset, suffix, bit)) in VARIANTS.into_iter().enumerate() {
            if !mask.contains(bit) {
                continue;
            }
            let mut names = Vec::new();
            let name = if int_only {
                names.push(format!("{mnemonic}.{suffix}"));
                mnemonic.to_string()
            } else {
                if offset == 0 {
                    names.push(mnemonic.to_string());
                }
                format!("{mnemonic}.{suffix}")
            };
            for alias in aliases {
                names.push(format!("{alias}.{suffix}"));
                if offset == 0 {
                    names.push(alias.to_string());
                }
            }
            self.opcodes.push(make(
                base + offset,
                name,
                Some(operator),
                encoding,
                transitions[i],
                names,
            ));
        }
    }

    fn binary(&mut self, base: u16, mnemonic: &str, operator: &'static str, mask: TypeMask, aliases: &[&str]) {
        const PLAIN: [&str; 6] = ["ii.i", "nn.f", "ss.s", "II.I", "FF.F", "SS.S"];
        self.family(base, mnemonic, operator, mask, "", PLAIN, aliases);
    }

    fn comparison(&mut self, base: u16, mnemonic: &str, operator: &'static str, mask: TypeMask) {
        const CMP: [&str; 6] = ["ii.b", "nn.b", "ss.b", "II.b", "FF.b", "SS.b"];
        self.family(base, mnemonic, operator, mask, "", CMP, &[]);
    }

    fn store(&mut self, base: u16, operator: &'static str, name: &str, mask: TypeMask) {
        const PUSH: [&str; 6] = ["i.i", "n.f", "s.s", "I.I", "F.F", "S.S"];
        const POP: [&str; 6] = ["i.", "n.", "s.", "I.", "F.", "S."];
        let (st, stp) = match name {
            "" => ("st".to_string(), "stp".to_string()),
            n => (format!("st.{n}"), format!("stp.{n}")),
        };
        self.family(base, &st, operator, mask, "fho", PUSH, &[]);
        self.family(base + 0x60, &stp, operator, mask, "fho", POP, &[]);
    }

    fn element_store(&mut self, base: u16, operator: &'static str, name: &str, mask: TypeMask) {
        const PUSH: [&str; 6] = ["i[i#d].i", "n[i#d].f", "s[i#d].s", "", "", ""];
        const POP: [&str; 6] = ["i[i#d].", "n[i#d].", "s[i#d].", "", "", ""];
        let mask = mask & TypeMask::PRIMITIVE;
        let (st, stp) = match name {
            "" => ("stelem".to_string(), "stelemp".to_string()),
            n => (format!("stelem.{n}"), format!("stelemp.{n}")),
        };
        self.family(base, &st, operator, mask, "fho", PUSH, &[]);
        self.family(base + 0x60, &stp, operator, mask, "fho", POP, &[]);
    }
}

fn build_table() -> Table {
    use TypeMask as M;

    let mut b = Builder { opcodes: Vec::new() };

    b.binary(0x100, "mul", "*", M::NUMERIC, &[]);
    b.binary(0x108, "div", "/", M::NUMERIC, &[]);
    b.binary(0x110, "rem", "%", M::INT, &["mod"]);
    b.binary(0x118, "add", "+", M::PRIMITIVE, &[]);
    b.binary(0x120, "sub", "-", M::PRIMITIVE, &[]);
    b.binary(0x128, "shr", ">>", M::INT, &[]);
    b.binary(0x130, "shl", "<<", M::INT, &[]);
    b.comparison(0x138, "cle", "<=", M::PRIMITIVE);
    b.comparison(0x140, "clt", "<", M::PRIMITIVE);
    b.comparison(0x148, "cge", ">=", M::PRIMITIVE);
    b.comparison(0x150, "cgt", ">", M::PRIMITIVE);
    b.comparison(0x158, "ceq", "==", M::ALL);
    b.comparison(0x160, "cne", "!=", M::ALL);
    b.binary(0x168, "xor", "^", M::INT, &[]);
    b.binary(0x170, "andl", "&&", M::INT, &[]);
    b.binary(0x178, "orl", "||", M::INT, &[]);
    b.binary(0x180, "and", "&", M::INT, &[]);
    b.binary(0x188, "or", "|", M::INT, &[]);

    b.define(0x190, "notl", "", "i.i", &[]).operator = Some("!");
    b.define(0x191, "nop.191", "", "", &[]);
    b.define(0x198, "not", "", "i.i", &[]).operator = Some("~");
    b.define(0x1a0, "neg.i", "", "i.i", &[]).operator = Some("-");
    b.define(0x1a1, "neg.r", "", "f.f", &[]).operator = Some("-");
    b.define(0x1a8, "nop.1a8", "", "", &[]);
    b.define(0x1a9, "nop.1a9", "", "", &[]);

    b.store(0x1b0, "=", "", M::ALL);
    b.store(0x1b8, "*=", "mul", M::NUMERIC);
    b.store(0x1c0, "/=", "div", M::NUMERIC);
    b.store(0x1c8, "%=", "mod", M::INT);
    b.store(0x1d0, "+=", "add", M::PRIMITIVE);
    b.store(0x1d8, "-=", "sub", M::NUMERIC);
    b.store(0x1e0, "<<=", "shl", M::INT);
    b.store(0x1e8, ">>=", "shr", M::INT);
    b.store(0x1f0, "&=", "and", M::INT);
    b.store(0x1f8, "^=", "xor", M::INT);
    b.store(0x200, "|=", "or", M::INT);

    b.element_store(0x270, "=", "", M::ALL);
    b.element_store(0x278, "*=", "mul", M::NUMERIC);
    b.element_store(0x280, "/=", "div", M::NUMERIC);
    b.element_store(0x288, "%=", "mod", M::INT);
    b.element_store(0x290, "+=", "add", M::PRIMITIVE);
    b.element_store(0x298, "-=", "sub", M::NUMERIC);
    b.element_store(0x2a0, "<<=", "shl", M::INT);
    b.element_store(0x2a8, ">>=", "shr", M::INT);
    b.element_store(0x2b0, "&=", "and", M::INT);
    b.element_store(0x2b8, "^=", "xor", M::INT);
    b.element_store(0x2c0, "|=", "or", M::INT);

    b.define(0x800, "ldc.i", "i", ".i", &[]);
    b.define(0x801, "ldstr", "s", ".s", &["ld.s"]);
    b.define(0x802, "ld", "fho", ".#t", &["ldvar"]);
    b.define(0x803, "ldc.r", "r", ".f", &[]);
    b.define(0x80f, "call", "h0a", "[*#a].*", &[]);
    b.define(0x810, "callp", "h0a", "[*#a].", &[]);
    b.define(0x829, "alloca", "t", ".[#t]", &[]);
    b.define(0x82b, "return", "", "[*].", &[]);
    b.define(0x82c, "br", "j", ".", &["jmp"]);
    b.define(0x82d, "brtrue", "j", "p.", &["jnz", "jne"]);
    b.define(0x82e, "brfalse", "j", "p.", &["brnull", "brzero", "jz", "je"]);
    b.define(0x82f, "pop", "", "*.", &[]);
    b.define(0x830, "jmp.v", "j", "p.1", &[]);
    b.define(0x831, "jne.v", "j", "p.1", &[]);
    b.define(0x832, "jgt.v", "j", "p.1", &[]);
    b.define(0x833, "jge.v", "j", "p.1", &[]);
    b.define(0x834, "syscall", "ha", "[*#a].*", &[]);
    b.define(0x835, "syscallp", "ha", "[*#a].", &[]);
    b.define(0x836, "argcheck", "t", ".", &[]);
    b.define(0x837, "ldelem", "fho", "[i#d].~#t", &[]);
    b.define(0x838, "jle.v", "j", "p.1", &[]);
    b.define(0x839, "jlt.v", "j", "p.1", &[]);
    b.define(0x83a, "line", "l", ".", &[]);
    b.unverified(0x83b, "bsel.1", "j", ".");
    b.unverified(0x83c, "bsel.3", "j", ".");
    b.unverified(0x83d, "bsel.2", "j", ".");
    b.define(0x83e, "conv.i", "", "f.i", &[]);
    b.define(0x83f, "conv.r", "", "i.f", &[]);
    b.define(0x840, "text", "s", ".", &[]);
    b.unverified(0x841, "proc", "", ".");
    b.unverified(0x842, "ctrl", "s", "[#s].");
    b.unverified(0x843, "bsel.x", "j", ".");
    b.define(0x844, "bsel.clr", "", ".", &["op.844"]);
    b.unverified(0x845, "bsel.4", "j", ".");
    b.unverified(0x846, "bsel.jmp.4", "", ".");
    b.define(0x847, "bsel.5", "j", ".", &["op.847"]);
    b.define(0x850, "switch", "c", "i.", &[]);

    let opcodes = b.opcodes;
    let mut by_value = HashMap::with_capacity(opcodes.len());
    let mut by_name = HashMap::with_capacity(opcodes.len() * 2);
    for (i, opcode) in opcodes.iter().enumerate() {
        by_value.insert(opcode.value, i);
        by_name.insert(opcode.mnemonic.clone(), i);
    }
    // Aliases never shadow a primary mnemonic.
    for (i, opcode) in opcodes.iter().enumerate() {
        for alias in &opcode.aliases {
            by_name.entry(alias.clone()).or_insert(i);
        }
    }

    Table {
        opcodes,
        by_value,
        by_name,
        phi: make(op::PHI, "phi".to_string(), None, "p", "", Vec::new()),
    }
}
