use mjo_isa::{Flags, MjoType};

use crate::expr::{AssignOp, Expr};

/// Statement nodes for decompiled code.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `name op= value;`
    Assignment {
        hash: u32,
        flags: Flags,
        op: AssignOp,
        value: Expr,
    },
    /// `name[i, j] op= value;`
    ArrayAssignment {
        hash: u32,
        flags: Flags,
        op: AssignOp,
        indices: Vec<Expr>,
        value: Expr,
    },
    Block(Vec<Stmt>),
    /// Call whose result is discarded: `callp` / `syscallp`.
    Call(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },
    Text(Message),
    /// `ctrl` with its control code and operands in push order.
    Ctrl { code: String, operands: Vec<Expr> },
    Proc,
    /// Body guarded by `bsel.5`, run on scope exit.
    Destructor(Vec<Stmt>),
}

/// Text of a `text` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Inline(String),
    /// Key into the externalized-string table.
    External(String),
}

/// Decompiled form of one function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionTree {
    pub hash: u32,
    pub is_entry: bool,
    pub parameter_types: Vec<MjoType>,
    pub local_types: Vec<MjoType>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Decompiled(Vec<Stmt>),
    /// Decompilation failed; the error message is kept in place of a body.
    Failed(String),
}
