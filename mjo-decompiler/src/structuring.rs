use mjo_ir::expr::{Expr, UnaryOp};
use mjo_ir::stmt::Stmt;
use mjo_ir::{BlockId, Function, Site};
use mjo_isa::{Instruction, op};

use crate::dominators::Dominators;
use crate::error::{DecompileError, Result};
use crate::expr_recovery::{self, ExprState};

/// Recover structured statements from a function's blocks.
///
/// Blocks are walked in layout order as one instruction stream. Every
/// instruction is consumed at most once; stepping on a consumed one means
/// control went backwards.
pub(crate) fn structure_function(function: &Function) -> Result<Vec<Stmt>> {
    if function.blocks.is_empty() {
        return Ok(Vec::new());
    }
    let mut ctx = StructCtx::new(function);
    let mut ip = 0;
    let body = ctx.list(&mut ip)?;
    if let Some(pos) = ctx.consumed.iter().position(|c| !c) {
        return Err(DecompileError::Unstructured {
            function: function.hash,
            at: ctx.describe(pos),
        });
    }
    Ok(body)
}

struct StructCtx<'a> {
    function: &'a Function,
    doms: Dominators,
    /// Instruction stream: block and index within it.
    code: Vec<(BlockId, usize)>,
    /// Stream position of each block's first instruction.
    starts: Vec<usize>,
    consumed: Vec<bool>,
    /// Per block, how many instructions had been consumed when the walk
    /// first entered it.
    entered: Vec<Option<usize>>,
    taken: usize,
    /// Every edge into the join at the current position comes from the
    /// statement just emitted, so the list continues through it.
    merged: bool,
    state: ExprState,
}

impl<'a> StructCtx<'a> {
    fn new(function: &'a Function) -> Self {
        let mut code = Vec::new();
        let mut starts = Vec::with_capacity(function.blocks.len());
        for block in &function.blocks {
            starts.push(code.len());
            code.extend((0..block.instructions.len()).map(|i| (block.id, i)));
        }
        Self {
            function,
            doms: Dominators::compute(function),
            consumed: vec![false; code.len()],
            entered: vec![None; function.blocks.len()],
            taken: 0,
            code,
            starts,
            merged: false,
            state: ExprState::default(),
        }
    }

    fn insn(&self, ip: usize) -> &'a Instruction {
        let (block, index) = self.code[ip];
        &self.function.blocks[block].instructions[index]
    }

    fn site(&self, ip: usize) -> Site {
        let (block, index) = self.code[ip];
        Site {
            function: self.function.hash,
            block: self.function.blocks[block].name.clone(),
            index,
            mnemonic: self.insn(ip).opcode.mnemonic.clone(),
        }
    }

    fn describe(&self, ip: usize) -> String {
        match self.code.get(ip) {
            Some(&(block, index)) => format!("{}[{index}]", self.function.blocks[block].name),
            None => "end of function".to_string(),
        }
    }

    fn take(&mut self, ip: usize) -> Result<&'a Instruction> {
        if self.consumed[ip] {
            return Err(DecompileError::Loop { site: self.site(ip) });
        }
        self.consumed[ip] = true;
        let (block, _) = self.code[ip];
        self.entered[block].get_or_insert(self.taken);
        self.taken += 1;
        Ok(self.insn(ip))
    }

    fn target(&self, insn: &Instruction, site: &Site) -> Result<BlockId> {
        insn.jump_block()
            .filter(|&b| b < self.starts.len())
            .ok_or_else(|| DecompileError::Malformed {
                site: site.clone(),
                detail: "jump does not name a block".into(),
            })
    }

    fn is_join(&self, ip: usize) -> bool {
        let (block, index) = self.code[ip];
        index == 0 && self.function.blocks[block].preds.len() > 1
    }

    /// Decompile a statement list starting at `ip`. On return `ip` is where
    /// control continues: a join point, or one past a `return`.
    fn list(&mut self, ip: &mut usize) -> Result<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            if *ip >= self.code.len() {
                if terminates(&body) {
                    break;
                }
                return Err(DecompileError::FellOffEnd {
                    function: self.function.hash,
                });
            }
            if self.is_join(*ip) && !self.merged {
                break;
            }
            self.merged = false;

            let at = *ip;
            let insn = self.take(at)?;
            let site = self.site(at);
            *ip += 1;
            match insn.value() {
                op::LINE | op::ALLOCA | op::ARGCHECK => {}
                op::BR => *ip = self.starts[self.target(insn, &site)?],
                op::BRFALSE | op::BRTRUE | op::BSEL_5 => {
                    let mark = self.taken;
                    let stmt = match insn.value() {
                        op::BSEL_5 => self.destructor(insn, ip, &site)?,
                        _ => self.branch(insn, ip, &site)?,
                    };
                    body.push(stmt);
                    let from = self.code[at].0;
                    self.merged = self.closes(*ip, from, mark);
                    if self.merged {
                        self.check_dominance(from, *ip, &site)?;
                    }
                }
                op::RETURN => {
                    let value = match self.state.stack.len() {
                        0 => None,
                        1 => self.state.stack.pop(),
                        count => return Err(DecompileError::ReturnArity { site, count }),
                    };
                    body.push(Stmt::Return(value));
                    break;
                }
                _ => {
                    body.extend(expr_recovery::process_insn(insn, &site, &mut self.state)?);
                    if insn.opcode.is_store() && !insn.opcode.is_popping_store() {
                        self.skip_trailing_pop(at, ip);
                    }
                }
            }
        }
        Ok(body)
    }

    /// Consume the `pop` that may follow a value-keeping store in the same
    /// block.
    fn skip_trailing_pop(&mut self, store: usize, ip: &mut usize) {
        let Some(&(block, _)) = self.code.get(*ip) else {
            return;
        };
        if block == self.code[store].0 && !self.consumed[*ip] && self.insn(*ip).value() == op::POP {
            self.consumed[*ip] = true;
            *ip += 1;
        }
    }

    /// Whether the join at `ip` is entered only from `from` and from blocks
    /// first walked after `mark`. Otherwise it belongs to an enclosing
    /// statement and the current list has to stop there.
    fn closes(&self, ip: usize, from: BlockId, mark: usize) -> bool {
        if ip >= self.code.len() || !self.is_join(ip) {
            return false;
        }
        let (join, _) = self.code[ip];
        self.function.blocks[join]
            .preds
            .iter()
            .all(|&pred| pred == from || self.entered[pred].is_some_and(|seen| seen >= mark))
    }

    fn check_dominance(&self, from: BlockId, ip: usize, site: &Site) -> Result<()> {
        let (join, _) = self.code[ip];
        if !self.doms.dominates(from, join) {
            return Err(DecompileError::NotDominated {
                site: site.clone(),
                join: self.function.blocks[join].name.clone(),
            });
        }
        Ok(())
    }

    fn branch(&mut self, insn: &Instruction, ip: &mut usize, site: &Site) -> Result<Stmt> {
        let cond = self.state.pop(site)?;
        let cond = if insn.value() == op::BRTRUE {
            Expr::Unary {
                op: UnaryOp::LogicalNot,
                operand: Box::new(cond),
            }
        } else {
            cond
        };
        let else_start = self.starts[self.target(insn, site)?];
        let depth = self.state.stack.len();

        let (then_body, else_body) = if *ip == else_start {
            (Vec::new(), None)
        } else {
            let then_body = self.list(ip)?;
            self.check_depth(depth, site)?;
            if *ip == else_start {
                (then_body, None)
            } else {
                let mut else_ip = else_start;
                let else_body = self.list(&mut else_ip)?;
                self.check_depth(depth, site)?;
                if else_ip != *ip {
                    return Err(DecompileError::NonConverging {
                        site: site.clone(),
                        then_end: self.describe(*ip),
                        else_end: self.describe(else_ip),
                    });
                }
                (then_body, Some(else_body))
            }
        };

        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
        })
    }

    /// `bsel.5 @body; br @after; body: bsel.clr; …; after:`
    fn destructor(&mut self, guard: &Instruction, ip: &mut usize, site: &Site) -> Result<Stmt> {
        let malformed = |detail: &str| DecompileError::Malformed {
            site: site.clone(),
            detail: detail.to_string(),
        };
        if *ip >= self.code.len() || self.insn(*ip).value() != op::BR {
            return Err(malformed("destructor guard is not followed by `br`"));
        }
        let skip = self.take(*ip)?;
        *ip += 1;
        let after = self.starts[self.target(skip, site)?];

        let entry = self.target(guard, site)?;
        if self.starts[entry] != *ip || !self.function.is_destructor_entry(entry) {
            return Err(malformed("destructor body does not follow its guard"));
        }
        if *ip >= self.code.len() || self.insn(*ip).value() != op::BSEL_CLR {
            return Err(malformed("destructor body does not start with `bsel.clr`"));
        }
        self.take(*ip)?;
        *ip += 1;

        let depth = self.state.stack.len();
        let body = self.list(ip)?;
        self.check_depth(depth, site)?;
        if *ip != after {
            return Err(malformed("destructor body does not end where the guard skips to"));
        }
        Ok(Stmt::Destructor(body))
    }

    fn check_depth(&self, depth: usize, site: &Site) -> Result<()> {
        let now = self.state.stack.len();
        if now != depth {
            return Err(DecompileError::Malformed {
                site: site.clone(),
                detail: format!("branch changes the expression stack from {depth} to {now} values"),
            });
        }
        Ok(())
    }
}

/// Whether control cannot leave the end of `body`.
fn terminates(body: &[Stmt]) -> bool {
    match body.last() {
        Some(Stmt::Return(_)) => true,
        Some(Stmt::If {
            then_body,
            else_body: Some(else_body),
            ..
        }) => terminates(then_body) && terminates(else_body),
        _ => false,
    }
}
