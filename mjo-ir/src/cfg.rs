//! Functions and basic blocks.
//!
//! Building splits a laid-out instruction list into functions via the
//! function index, then each function into basic blocks at branch targets.
//! Branch operands are rewritten to block handles; flattening reverses this
//! and recomputes every offset, size and displacement.

use std::collections::{BTreeSet, HashSet};

use mjo_file::FunctionEntry;
use mjo_isa::{Instruction, MjoType, Target, op};

use crate::error::{IrError, Result};

/// Index of a basic block within its function.
pub type BlockId = usize;

/// A maximal run of instructions with a single entry and a single exit.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Label: `entry` for the first block, else `block_XXXX` after the
    /// offset the block started at when it was built.
    pub name: String,
    pub instructions: Vec<Instruction>,
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
    pub is_entry: bool,
    /// The block ends in `return`.
    pub is_exit: bool,
}

impl BasicBlock {
    pub fn new(id: BlockId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            instructions: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
            is_entry: id == 0,
            is_exit: false,
        }
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last()
    }
}

/// Label for a block that started at `offset`.
pub fn block_label(offset: u32) -> String {
    format!("block_{offset:04x}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub hash: u32,
    pub is_entry: bool,
    /// Block arena; block 0 is the entry block.
    pub blocks: Vec<BasicBlock>,
    /// From `argcheck`.
    pub parameter_types: Vec<MjoType>,
    /// From `alloca`.
    pub local_types: Vec<MjoType>,
}

impl Function {
    pub fn new(hash: u32) -> Self {
        Self {
            hash,
            is_entry: false,
            blocks: Vec::new(),
            parameter_types: Vec::new(),
            local_types: Vec::new(),
        }
    }

    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    pub fn exit_blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().filter(|b| b.is_exit)
    }

    pub fn block_by_name(&self, name: &str) -> Option<BlockId> {
        self.blocks.iter().position(|b| b.name == name)
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }

    pub fn instructions_mut(&mut self) -> impl Iterator<Item = &mut Instruction> {
        self.blocks.iter_mut().flat_map(|b| b.instructions.iter_mut())
    }

    /// Whether `id` is the body of a destructor guard: its only predecessor
    /// ends in `bsel.5` targeting it.
    pub fn is_destructor_entry(&self, id: BlockId) -> bool {
        let Some(block) = self.blocks.get(id) else {
            return false;
        };
        let [pred] = block.preds.as_slice() else {
            return false;
        };
        self.blocks[*pred]
            .terminator()
            .is_some_and(|t| t.value() == op::BSEL_5 && t.jump_block() == Some(id))
    }

    /// Recompute edges and exit flags from the block terminators.
    ///
    /// A block falls through to the next one unless it ends in `br`,
    /// `switch` or `return`. Successors are listed fallthrough first,
    /// without duplicates.
    pub fn link(&mut self) -> Result<()> {
        let count = self.blocks.len();
        for block in &mut self.blocks {
            block.preds.clear();
            block.succs.clear();
            block.is_entry = block.id == 0;
            block.is_exit = false;
        }
        for id in 0..count {
            if self.blocks[id].terminator().is_some_and(Instruction::is_return) {
                self.blocks[id].is_exit = true;
                continue;
            }
            let mut succs = Vec::new();
            match self.blocks[id].terminator() {
                Some(t) => {
                    if !t.opcode.ends_flow() && id + 1 < count {
                        succs.push(id + 1);
                    }
                    let targets = t.jump.iter().chain(t.switch_cases.iter());
                    for target in targets {
                        let Target::Block(to) = *target else {
                            continue;
                        };
                        if to >= count {
                            return Err(IrError::UnknownBlock {
                                function: self.hash,
                                block: to,
                            });
                        }
                        if !succs.contains(&to) {
                            succs.push(to);
                        }
                    }
                }
                None if id + 1 < count => succs.push(id + 1),
                None => {}
            }
            self.blocks[id].succs = succs;
        }
        for id in 0..count {
            for s in self.blocks[id].succs.clone() {
                if !self.blocks[s].preds.contains(&id) {
                    self.blocks[s].preds.push(id);
                }
            }
        }
        Ok(())
    }

    /// Drop blocks that cannot be reached from the entry and renumber the
    /// rest. Returns how many blocks were removed.
    pub fn prune_unreachable(&mut self) -> usize {
        let mut dead = HashSet::new();
        let mut worklist: Vec<BlockId> = self
            .blocks
            .iter()
            .filter(|b| b.id != 0 && b.preds.is_empty())
            .map(|b| b.id)
            .collect();
        while let Some(id) = worklist.pop() {
            if !dead.insert(id) {
                continue;
            }
            for s in std::mem::take(&mut self.blocks[id].succs) {
                let preds = &mut self.blocks[s].preds;
                preds.retain(|&p| p != id);
                if preds.is_empty() && s != 0 {
                    worklist.push(s);
                }
            }
        }
        if dead.is_empty() {
            return 0;
        }

        let mut remap = vec![None; self.blocks.len()];
        let mut next = 0;
        for (old, slot) in remap.iter_mut().enumerate() {
            if !dead.contains(&old) {
                *slot = Some(next);
                next += 1;
            }
        }
        let renumber = |id: BlockId| remap[id].unwrap_or(id);
        self.blocks.retain(|b| !dead.contains(&b.id));
        for block in &mut self.blocks {
            block.id = renumber(block.id);
            block.preds.iter_mut().for_each(|p| *p = renumber(*p));
            block.succs.iter_mut().for_each(|s| *s = renumber(*s));
            for insn in &mut block.instructions {
                let targets = insn.jump.iter_mut().chain(insn.switch_cases.iter_mut());
                for target in targets {
                    if let Target::Block(b) = target {
                        *b = renumber(*b);
                    }
                }
            }
        }
        log::debug!("function ${:08x}: pruned {} unreachable blocks", self.hash, dead.len());
        dead.len()
    }
}

fn layout(insn: &Instruction) -> Result<(u32, u32)> {
    match (insn.offset, insn.size) {
        (Some(offset), Some(size)) => Ok((offset, size)),
        _ => Err(IrError::MissingLayout(insn.opcode.mnemonic.clone())),
    }
}

/// Split a laid-out instruction list into functions of basic blocks.
///
/// Functions come back in index order. Each one runs from its index offset
/// up to the next function's first instruction.
pub fn build_functions(
    instructions: Vec<Instruction>,
    index: &[FunctionEntry],
    entry_offset: u32,
) -> Result<Vec<Function>> {
    let offsets = instructions
        .iter()
        .map(|i| layout(i).map(|(offset, _)| offset))
        .collect::<Result<Vec<u32>>>()?;

    let mut starts: Vec<(usize, usize)> = Vec::with_capacity(index.len());
    for (position, entry) in index.iter().enumerate() {
        let first = offsets
            .binary_search(&entry.offset)
            .map_err(|_| IrError::InvalidFunctionOffset {
                hash: entry.hash,
                offset: entry.offset,
            })?;
        starts.push((first, position));
    }
    starts.sort_unstable();
    for pair in starts.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(IrError::DuplicateFunction {
                first: index[pair[0].1].hash,
                second: index[pair[1].1].hash,
                offset: index[pair[0].1].offset,
            });
        }
    }

    let mut chunks: Vec<Option<Vec<Instruction>>> = vec![None; index.len()];
    let mut rest = instructions;
    for &(first, position) in starts.iter().rev() {
        chunks[position] = Some(rest.split_off(first));
    }
    if !rest.is_empty() {
        log::warn!("{} instructions precede the first function and are dropped", rest.len());
    }

    let mut functions = Vec::with_capacity(index.len());
    for (entry, chunk) in index.iter().zip(chunks) {
        let chunk = chunk.unwrap_or_default();
        let mut function = build_function(entry.hash, chunk)?;
        function.is_entry = entry.offset == entry_offset;
        functions.push(function);
    }
    Ok(functions)
}

fn build_function(hash: u32, mut instructions: Vec<Instruction>) -> Result<Function> {
    let mut function = Function::new(hash);
    if instructions.is_empty() {
        return Ok(function);
    }
    let offsets = instructions
        .iter()
        .map(|i| layout(i).map(|(offset, _)| offset))
        .collect::<Result<Vec<u32>>>()?;
    let index_of = |insn: &Instruction, target: i64| -> Result<usize> {
        u32::try_from(target)
            .ok()
            .and_then(|t| offsets.binary_search(&t).ok())
            .ok_or(IrError::InvalidJumpTarget {
                offset: insn.offset.unwrap_or_default(),
                target,
            })
    };

    let mut block_starts = BTreeSet::from([0usize]);
    let mut destinations: Vec<(usize, Vec<usize>)> = Vec::new();
    for (i, insn) in instructions.iter().enumerate() {
        match insn.value() {
            op::ARGCHECK => {
                if !function.parameter_types.is_empty() {
                    log::warn!("function ${hash:08x}: repeated argcheck");
                }
                function.parameter_types = insn.type_list.clone();
            }
            op::ALLOCA => {
                if !function.local_types.is_empty() {
                    log::warn!("function ${hash:08x}: repeated alloca");
                }
                function.local_types = insn.type_list.clone();
            }
            _ => {}
        }

        let targets: Vec<i64> = if insn.is_jump() {
            insn.jump_destination().into_iter().collect()
        } else if insn.is_switch() {
            insn.switch_destinations().unwrap_or_default()
        } else {
            continue;
        };
        let mut resolved = Vec::with_capacity(targets.len());
        for target in targets {
            let to = index_of(insn, target)?;
            block_starts.insert(to);
            resolved.push(to);
        }
        if i + 1 < instructions.len() {
            block_starts.insert(i + 1);
        }
        destinations.push((i, resolved));
    }

    let starts: Vec<usize> = block_starts.into_iter().collect();
    let block_of = |insn_index: usize| starts.binary_search(&insn_index).unwrap_or_default();
    for (i, resolved) in destinations {
        let insn = &mut instructions[i];
        if insn.is_jump() {
            insn.jump = resolved.first().map(|&to| Target::Block(block_of(to)));
        } else {
            insn.switch_cases = resolved.into_iter().map(|to| Target::Block(block_of(to))).collect();
        }
    }

    let mut rest = instructions;
    let mut blocks = Vec::with_capacity(starts.len());
    for (id, &first) in starts.iter().enumerate().rev() {
        let name = if id == 0 { "entry".to_string() } else { block_label(offsets[first]) };
        let mut block = BasicBlock::new(id, name);
        block.instructions = rest.split_off(first);
        for insn in &mut block.instructions {
            insn.offset = None;
            insn.size = None;
        }
        blocks.push(block);
    }
    blocks.reverse();
    function.blocks = blocks;
    function.link()?;
    function.prune_unreachable();
    Ok(function)
}

/// Flatten functions back into a laid-out instruction list.
///
/// Returns the instructions, the rebuilt function index and the entry-point
/// offset (0 when no function is flagged as entry).
pub fn flatten_functions(
    functions: Vec<Function>,
) -> Result<(Vec<Instruction>, Vec<FunctionEntry>, u32)> {
    let mut offset = 0u32;
    let mut block_offsets: Vec<Vec<u32>> = Vec::with_capacity(functions.len());
    let mut sizes: Vec<u32> = Vec::new();
    let mut index = Vec::with_capacity(functions.len());
    let mut entry_offset = None;
    for function in &functions {
        index.push(FunctionEntry {
            hash: function.hash,
            offset,
        });
        if function.is_entry && entry_offset.replace(offset).is_some() {
            log::warn!("more than one entry-point function; using the last");
        }
        let mut starts = Vec::with_capacity(function.blocks.len());
        for block in &function.blocks {
            starts.push(offset);
            for insn in &block.instructions {
                let size = mjo_isa::encoded_size(insn)?;
                sizes.push(size);
                offset += size;
            }
        }
        block_offsets.push(starts);
    }

    let resolve = |function: &Function, starts: &[u32], target: Target, from: u32, base: u32| {
        match target {
            Target::Offset(d) => Ok(Target::Offset(d)),
            Target::Block(b) => {
                let to = *starts.get(b).ok_or(IrError::UnknownBlock {
                    function: function.hash,
                    block: b,
                })?;
                i32::try_from(to as i64 - base as i64)
                    .map(Target::Offset)
                    .map_err(|_| IrError::DisplacementOverflow { offset: from })
            }
        }
    };

    let mut out = Vec::with_capacity(sizes.len());
    let mut sizes = sizes.into_iter();
    let mut offset = 0u32;
    for (function, starts) in functions.iter().zip(&block_offsets) {
        for block in &function.blocks {
            for insn in &block.instructions {
                let mut insn = insn.clone();
                let size = sizes.next().unwrap_or_default();
                if let Some(target) = insn.jump {
                    insn.jump = Some(resolve(function, starts, target, offset, offset + size)?);
                }
                let mut cases = Vec::with_capacity(insn.switch_cases.len());
                for (i, &case) in insn.switch_cases.iter().enumerate() {
                    let base = offset + 2 + 2 + 4 * (i as u32 + 1);
                    cases.push(resolve(function, starts, case, offset, base)?);
                }
                insn.switch_cases = cases;
                insn.offset = Some(offset);
                insn.size = Some(size);
                offset += size;
                out.push(insn);
            }
        }
    }
    Ok((out, index, entry_offset.unwrap_or(0)))
}
