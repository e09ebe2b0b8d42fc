use mjo_isa::{Flags, MjoType, op};

/// Expression tree nodes for decompiled code.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit(i32),
    FloatLit(f32),
    StringLit(String),
    /// Variable load: `ld`.
    Identifier { hash: u32, flags: Flags },
    /// Element load: `ldelem`, indices outermost first.
    ArrayAccess {
        hash: u32,
        flags: Flags,
        indices: Vec<Expr>,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Binary operation: `lhs op rhs`, with the operand type of the opcode
    /// variant.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        ty: MjoType,
    },
    /// `conv.i` / `conv.r`.
    Cast { ty: MjoType, operand: Box<Expr> },
    Call {
        hash: u32,
        syscall: bool,
        args: Vec<Expr>,
    },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shr,
    Shl,
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
    Ne,
    BitXor,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
}

impl BinaryOp {
    const ORDER: [BinaryOp; 18] = [
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Rem,
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Shr,
        BinaryOp::Shl,
        BinaryOp::Le,
        BinaryOp::Lt,
        BinaryOp::Ge,
        BinaryOp::Gt,
        BinaryOp::Eq,
        BinaryOp::Ne,
        BinaryOp::BitXor,
        BinaryOp::LogicalAnd,
        BinaryOp::LogicalOr,
        BinaryOp::BitAnd,
        BinaryOp::BitOr,
    ];

    /// Operator and operand type of a binary opcode.
    pub fn from_opcode(value: u16) -> Option<(BinaryOp, MjoType)> {
        if !(op::BINARY_FIRST..op::BINARY_LAST + 8).contains(&value) {
            return None;
        }
        let family = ((value - op::BINARY_FIRST) >> 3) as usize;
        let ty = MjoType::from_u8((value & 7) as u8)?;
        Some((Self::ORDER[family], ty))
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shr => ">>",
            BinaryOp::Shl => "<<",
            BinaryOp::Le => "<=",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitXor => "^",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    LogicalNot,
    BitNot,
    Neg,
    Pos,
}

impl UnaryOp {
    pub fn from_opcode(value: u16) -> Option<UnaryOp> {
        Some(match value {
            0x190 => UnaryOp::LogicalNot,
            0x198 => UnaryOp::BitNot,
            0x1a0 | 0x1a1 => UnaryOp::Neg,
            op::NOP_1A8 | op::NOP_1A9 => UnaryOp::Pos,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::LogicalNot => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
        }
    }
}

/// Compound assignment operators of the store families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    BitAnd,
    BitXor,
    BitOr,
}

impl AssignOp {
    const ORDER: [AssignOp; 11] = [
        AssignOp::Assign,
        AssignOp::Mul,
        AssignOp::Div,
        AssignOp::Rem,
        AssignOp::Add,
        AssignOp::Sub,
        AssignOp::Shl,
        AssignOp::Shr,
        AssignOp::BitAnd,
        AssignOp::BitXor,
        AssignOp::BitOr,
    ];

    /// Operator of any `st`, `stp`, `stelem` or `stelemp` opcode.
    pub fn from_opcode(value: u16) -> Option<AssignOp> {
        let base = [
            op::STORE_FIRST,
            op::STORE_POP_FIRST,
            op::STORE_ELEM_FIRST,
            op::STORE_ELEM_POP_FIRST,
        ]
        .into_iter()
        .rev()
        .find(|&base| value >= base)?;
        Self::ORDER.get(((value - base) >> 3) as usize).copied()
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitXor => "^=",
            AssignOp::BitOr => "|=",
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl std::fmt::Display for AssignOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_families() {
        assert_eq!(BinaryOp::from_opcode(0x100), Some((BinaryOp::Mul, MjoType::Int)));
        assert_eq!(BinaryOp::from_opcode(0x11a), Some((BinaryOp::Add, MjoType::String)));
        assert_eq!(BinaryOp::from_opcode(0x15b), Some((BinaryOp::Eq, MjoType::IntArray)));
        assert_eq!(BinaryOp::from_opcode(0x188), Some((BinaryOp::BitOr, MjoType::Int)));
        assert_eq!(BinaryOp::from_opcode(0x190), None);
    }

    #[test]
    fn store_families() {
        assert_eq!(AssignOp::from_opcode(0x1b0), Some(AssignOp::Assign));
        assert_eq!(AssignOp::from_opcode(0x1d1), Some(AssignOp::Add));
        assert_eq!(AssignOp::from_opcode(0x218), Some(AssignOp::Mul));
        assert_eq!(AssignOp::from_opcode(0x2c0), Some(AssignOp::BitOr));
        assert_eq!(AssignOp::from_opcode(0x320), Some(AssignOp::BitOr));
        assert_eq!(AssignOp::from_opcode(0x100), None);
    }
}
