//! The script container and its representation states.
//!
//! Each state is its own type carrying only the fields legal for it, and
//! every transition consumes its input. [`Script`] wraps the states for
//! callers that drive transitions in place.

use std::fmt;
use std::sync::Arc;

use mjo_file::{FunctionEntry, MjoFile, StringTable, SymbolResolver};
use mjo_isa::{Instruction, Target};

use crate::cfg::{self, Function};
use crate::error::{IrError, Result};
use crate::ssa::{self, SsaFunction};
use crate::stmt::FunctionTree;

/// Data every state carries.
#[derive(Clone, Default)]
pub struct ScriptMeta {
    pub encrypted: bool,
    pub read_mark: bool,
    pub strings: StringTable,
    pub resolver: Option<Arc<dyn SymbolResolver>>,
}

impl ScriptMeta {
    pub fn resolve(&self, hash: u32) -> Option<&str> {
        self.resolver.as_deref()?.resolve(hash)
    }
}

impl fmt::Debug for ScriptMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptMeta")
            .field("encrypted", &self.encrypted)
            .field("read_mark", &self.read_mark)
            .field("strings", &self.strings.len())
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    InstructionList,
    ControlFlowGraph,
    SsaGraph,
    SyntaxTree,
    InTransition,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Representation::InstructionList => "instruction list",
            Representation::ControlFlowGraph => "control-flow graph",
            Representation::SsaGraph => "SSA graph",
            Representation::SyntaxTree => "syntax tree",
            Representation::InTransition => "in-transition",
        })
    }
}

/// Flat, laid-out instructions with the function index.
#[derive(Debug, Clone)]
pub struct InstructionList {
    pub meta: ScriptMeta,
    pub instructions: Vec<Instruction>,
    pub index: Vec<FunctionEntry>,
    pub entry_offset: u32,
}

impl InstructionList {
    pub fn from_file(file: MjoFile) -> Self {
        Self {
            meta: ScriptMeta {
                encrypted: file.encrypted,
                read_mark: file.read_mark,
                ..ScriptMeta::default()
            },
            instructions: file.instructions,
            index: file.functions,
            entry_offset: file.entry_offset,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_file(MjoFile::parse(bytes)?))
    }

    pub fn to_file(&self) -> MjoFile {
        MjoFile {
            encrypted: self.meta.encrypted,
            read_mark: self.meta.read_mark,
            entry_offset: self.entry_offset,
            functions: self.index.clone(),
            instructions: self.instructions.clone(),
        }
    }

    /// Serialize to a file image. Strings must be internalized.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.to_file().to_bytes()?)
    }

    pub fn into_control_flow_graph(self) -> Result<ControlFlowGraph> {
        let functions = cfg::build_functions(self.instructions, &self.index, self.entry_offset)?;
        log::debug!("built control-flow graph of {} functions", functions.len());
        Ok(ControlFlowGraph {
            meta: self.meta,
            functions,
        })
    }

    pub fn externalize_strings(&mut self) -> usize {
        self.meta.strings.externalize(self.instructions.iter_mut())
    }

    pub fn internalize_strings(&mut self) -> Result<()> {
        Ok(self.meta.strings.internalize(self.instructions.iter_mut())?)
    }

    fn check(&self) -> Result<()> {
        let mut expected = self.instructions.first().and_then(|i| i.offset).unwrap_or(0);
        for insn in &self.instructions {
            if insn.offset != Some(expected) {
                return Err(IrError::Invariant(format!(
                    "`{}` at {:?} breaks the layout, expected offset {expected:#x}",
                    insn.opcode.mnemonic, insn.offset
                )));
            }
            expected += insn.size.ok_or_else(|| IrError::MissingLayout(insn.opcode.mnemonic.clone()))?;
            let targets = insn.jump.iter().chain(&insn.switch_cases);
            if targets.into_iter().any(|t| matches!(t, Target::Block(_))) || insn.opcode.is_phi() {
                return Err(IrError::Invariant(format!(
                    "`{}` at {expected:#x} carries graph-only operands",
                    insn.opcode.mnemonic
                )));
            }
        }
        Ok(())
    }
}

/// Functions split into basic blocks.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    pub meta: ScriptMeta,
    pub functions: Vec<Function>,
}

impl ControlFlowGraph {
    pub fn entry_function(&self) -> Option<&Function> {
        self.functions.iter().find(|f| f.is_entry)
    }

    pub fn into_instruction_list(self) -> Result<InstructionList> {
        let (instructions, index, entry_offset) = cfg::flatten_functions(self.functions)?;
        Ok(InstructionList {
            meta: self.meta,
            instructions,
            index,
            entry_offset,
        })
    }

    pub fn into_ssa_graph(self) -> Result<SsaGraph> {
        let functions = self
            .functions
            .into_iter()
            .map(ssa::simulate)
            .collect::<Result<Vec<_>>>()?;
        Ok(SsaGraph {
            meta: self.meta,
            functions,
        })
    }

    pub fn externalize_strings(&mut self) -> usize {
        let instructions = self.functions.iter_mut().flat_map(Function::instructions_mut);
        self.meta.strings.externalize(instructions)
    }

    pub fn internalize_strings(&mut self) -> Result<()> {
        let instructions = self.functions.iter_mut().flat_map(Function::instructions_mut);
        Ok(self.meta.strings.internalize(instructions)?)
    }

    fn check(&self) -> Result<()> {
        for function in &self.functions {
            for (id, block) in function.blocks.iter().enumerate() {
                if block.id != id {
                    return Err(IrError::Invariant(format!(
                        "function ${:08x}: block {} stored at {id}",
                        function.hash, block.id
                    )));
                }
                for insn in &block.instructions {
                    let targets = insn.jump.iter().chain(&insn.switch_cases);
                    let raw = targets.into_iter().any(|t| matches!(t, Target::Offset(_)));
                    if raw || insn.offset.is_some() || insn.size.is_some() {
                        return Err(IrError::Invariant(format!(
                            "function ${:08x}: `{}` in {} carries list-only operands",
                            function.hash, insn.opcode.mnemonic, block.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Control-flow graph with the stack-value overlay.
#[derive(Debug, Clone)]
pub struct SsaGraph {
    pub meta: ScriptMeta,
    pub functions: Vec<SsaFunction>,
}

impl SsaGraph {
    pub fn into_control_flow_graph(self) -> ControlFlowGraph {
        ControlFlowGraph {
            meta: self.meta,
            functions: self.functions.into_iter().map(SsaFunction::into_function).collect(),
        }
    }
}

/// Decompiled functions. Terminal state.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub meta: ScriptMeta,
    pub functions: Vec<FunctionTree>,
}

/// A script in one of its representations.
#[derive(Debug)]
pub enum Script {
    InstructionList(InstructionList),
    ControlFlowGraph(ControlFlowGraph),
    SsaGraph(SsaGraph),
    SyntaxTree(SyntaxTree),
    /// Left behind by a transition that failed. Discard the script.
    InTransition,
}

impl From<MjoFile> for Script {
    fn from(file: MjoFile) -> Self {
        Script::InstructionList(InstructionList::from_file(file))
    }
}

impl Script {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Script::InstructionList(InstructionList::decode(bytes)?))
    }

    pub fn representation(&self) -> Representation {
        match self {
            Script::InstructionList(_) => Representation::InstructionList,
            Script::ControlFlowGraph(_) => Representation::ControlFlowGraph,
            Script::SsaGraph(_) => Representation::SsaGraph,
            Script::SyntaxTree(_) => Representation::SyntaxTree,
            Script::InTransition => Representation::InTransition,
        }
    }

    pub fn meta(&self) -> Option<&ScriptMeta> {
        match self {
            Script::InstructionList(s) => Some(&s.meta),
            Script::ControlFlowGraph(s) => Some(&s.meta),
            Script::SsaGraph(s) => Some(&s.meta),
            Script::SyntaxTree(s) => Some(&s.meta),
            Script::InTransition => None,
        }
    }

    pub fn meta_mut(&mut self) -> Option<&mut ScriptMeta> {
        match self {
            Script::InstructionList(s) => Some(&mut s.meta),
            Script::ControlFlowGraph(s) => Some(&mut s.meta),
            Script::SsaGraph(s) => Some(&mut s.meta),
            Script::SyntaxTree(s) => Some(&mut s.meta),
            Script::InTransition => None,
        }
    }

    pub fn set_resolver(&mut self, resolver: Arc<dyn SymbolResolver>) {
        if let Some(meta) = self.meta_mut() {
            meta.resolver = Some(resolver);
        }
    }

    fn illegal(&self, to: Representation) -> IrError {
        IrError::IllegalTransition {
            from: self.representation(),
            to,
        }
    }

    /// Replace `self` by the result of `step`. On failure `self` stays
    /// [`Script::InTransition`].
    fn transition(&mut self, step: impl FnOnce(Script) -> Result<Script>) -> Result<()> {
        let current = std::mem::replace(self, Script::InTransition);
        *self = step(current)?;
        Ok(())
    }

    pub fn to_instruction_list(&mut self) -> Result<()> {
        match self {
            Script::InstructionList(_) => Ok(()),
            Script::ControlFlowGraph(_) => self.transition(|s| match s {
                Script::ControlFlowGraph(g) => Ok(Script::InstructionList(g.into_instruction_list()?)),
                other => Ok(other),
            }),
            _ => Err(self.illegal(Representation::InstructionList)),
        }
    }

    pub fn to_control_flow_graph(&mut self) -> Result<()> {
        match self {
            Script::ControlFlowGraph(_) => Ok(()),
            Script::InstructionList(_) | Script::SsaGraph(_) => self.transition(|s| match s {
                Script::InstructionList(l) => Ok(Script::ControlFlowGraph(l.into_control_flow_graph()?)),
                Script::SsaGraph(g) => Ok(Script::ControlFlowGraph(g.into_control_flow_graph())),
                other => Ok(other),
            }),
            _ => Err(self.illegal(Representation::ControlFlowGraph)),
        }
    }

    pub fn to_ssa_graph(&mut self) -> Result<()> {
        match self {
            Script::SsaGraph(_) => Ok(()),
            Script::ControlFlowGraph(_) => self.transition(|s| match s {
                Script::ControlFlowGraph(g) => Ok(Script::SsaGraph(g.into_ssa_graph()?)),
                other => Ok(other),
            }),
            _ => Err(self.illegal(Representation::SsaGraph)),
        }
    }

    /// Serialize; only legal in the instruction-list state.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Script::InstructionList(l) => l.encode(),
            _ => Err(self.illegal(Representation::InstructionList)),
        }
    }

    /// Move `text` strings into the string table. Returns how many moved.
    pub fn externalize_strings(&mut self) -> Result<usize> {
        match self {
            Script::InstructionList(l) => Ok(l.externalize_strings()),
            Script::ControlFlowGraph(g) => Ok(g.externalize_strings()),
            _ => Err(self.illegal(Representation::ControlFlowGraph)),
        }
    }

    pub fn internalize_strings(&mut self) -> Result<()> {
        match self {
            Script::InstructionList(l) => l.internalize_strings(),
            Script::ControlFlowGraph(g) => g.internalize_strings(),
            _ => Err(self.illegal(Representation::ControlFlowGraph)),
        }
    }

    /// Verify that the populated fields match the state.
    pub fn sanity_check(&self) -> Result<()> {
        match self {
            Script::InstructionList(l) => l.check(),
            Script::ControlFlowGraph(g) => g.check(),
            Script::SsaGraph(g) => {
                for f in &g.functions {
                    if f.states.len() != f.function.blocks.len() {
                        return Err(IrError::Invariant(format!(
                            "function ${:08x}: {} stack states for {} blocks",
                            f.function.hash,
                            f.states.len(),
                            f.function.blocks.len()
                        )));
                    }
                }
                Ok(())
            }
            Script::SyntaxTree(_) => Ok(()),
            Script::InTransition => Err(IrError::Invariant("script is in transition".into())),
        }
    }
}
