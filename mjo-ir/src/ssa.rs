//! Symbolic stack simulation.
//!
//! Every value an instruction pushes becomes a [`StackValue`] with a single
//! producer and a list of consumers. Where predecessors of a join disagree
//! about a slot, a phi value is synthesized.

use mjo_isa::{Instruction, MjoType, PushToken, op};

use crate::cfg::{BlockId, Function};
use crate::error::{IrError, Result, Site};

/// Index into [`SsaFunction::values`].
pub type ValueId = usize;

/// An instruction by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionRef {
    pub block: BlockId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCategory {
    Argument,
    Local,
    Temp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Producer {
    Instruction(InstructionRef),
    /// The `phi`-th phi of `block`.
    Phi { block: BlockId, phi: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackValue {
    pub category: ValueCategory,
    pub ty: MjoType,
    pub producer: Producer,
    pub consumers: Vec<InstructionRef>,
}

/// Stack shape at a program point. Only temporaries live on the simulated
/// stack; arguments and locals are counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackState {
    pub arguments: usize,
    pub locals: usize,
    pub values: Vec<ValueId>,
}

impl StackState {
    pub fn depth(&self) -> usize {
        self.values.len()
    }

    fn same_shape(&self, other: &StackState) -> bool {
        self.arguments == other.arguments && self.locals == other.locals && self.depth() == other.depth()
    }

    fn describe(&self) -> String {
        format!(
            "{} arguments, {} locals, depth {}",
            self.arguments,
            self.locals,
            self.depth()
        )
    }
}

/// A value synthesized at a join.
#[derive(Debug, Clone, PartialEq)]
pub struct Phi {
    /// Stack slot, counted from the bottom.
    pub slot: usize,
    pub value: ValueId,
    /// One input per predecessor edge; `None` until that predecessor has
    /// been simulated.
    pub inputs: Vec<(BlockId, Option<ValueId>)>,
}

/// Values one instruction consumed and produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstructionValues {
    pub popped: Vec<ValueId>,
    pub pushed: Vec<ValueId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockStates {
    pub start: StackState,
    pub end: StackState,
    pub phis: Vec<Phi>,
    /// Parallel to the block's instructions.
    pub instructions: Vec<InstructionValues>,
}

/// A function with its stack-value overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct SsaFunction {
    pub function: Function,
    pub values: Vec<StackValue>,
    /// Indexed by block id.
    pub states: Vec<BlockStates>,
    /// Instructions whose opcode semantics are unconfirmed.
    pub unverified: Vec<InstructionRef>,
}

impl SsaFunction {
    pub fn into_function(self) -> Function {
        self.function
    }

    pub fn value(&self, id: ValueId) -> &StackValue {
        &self.values[id]
    }

    pub fn instruction(&self, at: InstructionRef) -> Option<&Instruction> {
        self.function.blocks.get(at.block)?.instructions.get(at.index)
    }
}

/// Blocks in depth-first pre-order from the entry, successors in edge order.
/// Blocks unreachable from the entry follow, each as a new root.
pub fn pre_order(function: &Function) -> Vec<BlockId> {
    let count = function.blocks.len();
    let mut seen = vec![false; count];
    let mut order = Vec::with_capacity(count);
    for root in 0..count {
        if seen[root] {
            continue;
        }
        seen[root] = true;
        order.push(root);
        let mut stack = vec![(root, 0usize)];
        while let Some((block, next)) = stack.pop() {
            let succs = &function.blocks[block].succs;
            if let Some(&succ) = succs.get(next) {
                stack.push((block, next + 1));
                if !seen[succ] {
                    seen[succ] = true;
                    order.push(succ);
                    stack.push((succ, 0));
                }
            }
        }
    }
    order
}

struct Simulator<'f> {
    function: &'f Function,
    values: Vec<StackValue>,
    states: Vec<Option<BlockStates>>,
    unverified: Vec<InstructionRef>,
}

/// Run the stack simulation over one function.
pub fn simulate(function: Function) -> Result<SsaFunction> {
    let (values, states, unverified) = {
        let mut sim = Simulator {
            function: &function,
            values: Vec::new(),
            states: vec![None; function.blocks.len()],
            unverified: Vec::new(),
        };
        for block in pre_order(&function) {
            sim.block(block)?;
        }
        (sim.values, sim.states, sim.unverified)
    };
    let states = states
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| IrError::Invariant(format!("function ${:08x}: block left unsimulated", function.hash)))?;
    log::debug!(
        "function ${:08x}: {} stack values over {} blocks",
        function.hash,
        values.len(),
        states.len()
    );
    Ok(SsaFunction {
        function,
        values,
        states,
        unverified,
    })
}

impl Simulator<'_> {
    fn site(&self, block: BlockId, index: usize, insn: &Instruction) -> Site {
        Site {
            function: self.function.hash,
            block: self.function.blocks[block].name.clone(),
            index,
            mnemonic: insn.opcode.mnemonic.clone(),
        }
    }

    fn push(&mut self, category: ValueCategory, ty: MjoType, producer: Producer) -> ValueId {
        self.values.push(StackValue {
            category,
            ty,
            producer,
            consumers: Vec::new(),
        });
        self.values.len() - 1
    }

    fn mismatch(&self, block: BlockId, detail: String) -> IrError {
        IrError::StackMismatch {
            function: self.function.hash,
            block: self.function.blocks[block].name.clone(),
            detail,
        }
    }

    fn start_state(&mut self, block: BlockId) -> Result<(StackState, Vec<Phi>)> {
        let function = self.function;
        match function.blocks[block].preds.as_slice() {
            [] => Ok((StackState::default(), Vec::new())),
            [pred] => match &self.states[*pred] {
                Some(states) => Ok((states.end.clone(), Vec::new())),
                None => Err(self.mismatch(block, "sole predecessor not yet simulated".into())),
            },
            _ => self.merge(block),
        }
    }

    /// Merge the end states of the already simulated predecessors.
    fn merge(&mut self, block: BlockId) -> Result<(StackState, Vec<Phi>)> {
        let preds = self.function.blocks[block].preds.clone();
        let known: Vec<(BlockId, StackState)> = preds
            .iter()
            .filter_map(|&p| self.states[p].as_ref().map(|s| (p, s.end.clone())))
            .collect();
        let Some((_, first)) = known.first() else {
            return Err(self.mismatch(block, "no predecessor simulated".into()));
        };
        let first = first.clone();
        if known.len() == 1 {
            return Ok((first, Vec::new()));
        }
        for (pred, state) in &known[1..] {
            if !state.same_shape(&first) {
                return Err(self.mismatch(
                    block,
                    format!(
                        "{} has {}, {} has {}",
                        self.function.blocks[known[0].0].name,
                        first.describe(),
                        self.function.blocks[*pred].name,
                        state.describe()
                    ),
                ));
            }
        }

        let mut merged = first.clone();
        let mut phis = Vec::new();
        for slot in 0..first.depth() {
            let mut distinct: Vec<ValueId> = Vec::new();
            for (_, state) in &known {
                let v = state.values[slot];
                if !distinct.contains(&v) {
                    distinct.push(v);
                }
            }
            if distinct.len() == 1 {
                continue;
            }
            let category = self.values[distinct[0]].category;
            if distinct.iter().any(|&v| self.values[v].category != category) {
                return Err(IrError::CategoryMismatch {
                    function: self.function.hash,
                    block: self.function.blocks[block].name.clone(),
                    slot,
                });
            }
            let mut types: Vec<MjoType> = Vec::new();
            for &v in &distinct {
                let ty = self.values[v].ty;
                if ty != MjoType::Unknown && !types.contains(&ty) {
                    types.push(ty);
                }
            }
            let ty = match types.as_slice() {
                [ty] => *ty,
                _ => MjoType::Unknown,
            };
            let value = self.push(category, ty, Producer::Phi { block, phi: phis.len() });
            let inputs = preds
                .iter()
                .map(|&p| (p, known.iter().find(|(k, _)| *k == p).map(|(_, s)| s.values[slot])))
                .collect();
            merged.values[slot] = value;
            phis.push(Phi { slot, value, inputs });
        }
        Ok((merged, phis))
    }

    fn block(&mut self, id: BlockId) -> Result<()> {
        let (start, phis) = self.start_state(id)?;
        let mut state = start.clone();
        let function = self.function;
        let block = &function.blocks[id];
        let mut per_instruction = Vec::with_capacity(block.instructions.len());
        for (index, insn) in block.instructions.iter().enumerate() {
            per_instruction.push(self.instruction(id, index, insn, &mut state)?);
        }
        self.states[id] = Some(BlockStates {
            start,
            end: state,
            phis,
            instructions: per_instruction,
        });
        self.check_successors(id)
    }

    fn instruction(
        &mut self,
        block: BlockId,
        index: usize,
        insn: &Instruction,
        state: &mut StackState,
    ) -> Result<InstructionValues> {
        let at = InstructionRef { block, index };
        if insn.opcode.unverified {
            log::warn!(
                "{}: opcode {:#05x} is unverified",
                self.site(block, index, insn),
                insn.value()
            );
            self.unverified.push(at);
        }
        match insn.value() {
            op::ARGCHECK => {
                state.arguments = insn.type_list.len();
                return Ok(InstructionValues::default());
            }
            op::ALLOCA => {
                state.locals = insn.type_list.len();
                return Ok(InstructionValues::default());
            }
            _ => {}
        }

        let effect = insn.opcode.effect();
        let depth = state.depth();
        let masks = effect
            .pop_masks(insn, depth)
            .map_err(|source| IrError::Effect {
                site: self.site(block, index, insn),
                source,
            })?;
        if masks.len() > depth {
            return Err(IrError::StackUnderflow {
                site: self.site(block, index, insn),
                needed: masks.len(),
                available: depth,
            });
        }
        let popped = state.values.split_off(depth - masks.len());
        for (operand, (&value, &mask)) in popped.iter().zip(&masks).enumerate() {
            let found = self.values[value].ty;
            if !found.matches(mask) {
                return Err(IrError::TypeMismatch {
                    site: self.site(block, index, insn),
                    operand,
                    found,
                    expected: mask,
                });
            }
            self.values[value].consumers.push(at);
        }

        let producer = Producer::Instruction(at);
        let mut pushed = Vec::new();
        for token in &effect.pushes {
            match *token {
                PushToken::Backref(n) => {
                    let value = *popped.get(n).ok_or_else(|| IrError::Effect {
                        site: self.site(block, index, insn),
                        source: mjo_isa::EffectError::DanglingBackref(n),
                    })?;
                    pushed.push(value);
                }
                PushToken::TypeList => {
                    for &ty in &insn.type_list {
                        pushed.push(self.push(ValueCategory::Temp, ty, producer));
                    }
                }
                PushToken::Type(ty) => pushed.push(self.push(ValueCategory::Temp, ty, producer)),
                PushToken::FlagType => pushed.push(self.push(ValueCategory::Temp, insn.flags.ty(), producer)),
                PushToken::ElementType => {
                    let ty = insn.flags.ty().element_type();
                    pushed.push(self.push(ValueCategory::Temp, ty, producer));
                }
                PushToken::Unknown => pushed.push(self.push(ValueCategory::Temp, MjoType::Unknown, producer)),
            }
        }
        state.values.extend_from_slice(&pushed);
        Ok(InstructionValues { popped, pushed })
    }

    /// Check the end state of `id` against successors that already have a
    /// start state, and fill in this edge's phi inputs.
    fn check_successors(&mut self, id: BlockId) -> Result<()> {
        let Some(end) = self.states[id].as_ref().map(|s| s.end.clone()) else {
            return Ok(());
        };
        let function = self.function;
        for &succ in &function.blocks[id].succs {
            let Some(states) = self.states[succ].as_mut() else {
                continue;
            };
            if !states.start.same_shape(&end) {
                let detail = format!(
                    "{} ends with {}, expected {}",
                    function.blocks[id].name,
                    end.describe(),
                    states.start.describe()
                );
                return Err(self.mismatch(succ, detail));
            }
            for phi in &mut states.phis {
                for (pred, input) in &mut phi.inputs {
                    if *pred == id && input.is_none() {
                        *input = Some(end.values[phi.slot]);
                    }
                }
            }
        }
        Ok(())
    }
}
