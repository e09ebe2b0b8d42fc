//! Intermediate representations of a Majiro script.
//!
//! A script moves between an instruction list, a control-flow graph, a
//! stack-value graph and a syntax tree. The first three convert freely
//! into their neighbours; the syntax tree is produced by the decompiler and
//! does not convert back.

pub mod cfg;
pub mod error;
pub mod expr;
pub mod script;
pub mod ssa;
pub mod stmt;

pub use cfg::{BasicBlock, BlockId, Function};
pub use error::{IrError, Result, Site};
pub use script::{ControlFlowGraph, InstructionList, Representation, Script, ScriptMeta, SsaGraph, SyntaxTree};
pub use ssa::{SsaFunction, StackState, StackValue, ValueId};
