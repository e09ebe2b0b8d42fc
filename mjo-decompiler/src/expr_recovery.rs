use mjo_ir::Site;
use mjo_ir::expr::{AssignOp, BinaryOp, Expr, UnaryOp};
use mjo_ir::stmt::{Message, Stmt};
use mjo_isa::descriptor::control_code_operands;
use mjo_isa::{Instruction, MjoType, op};

use crate::error::{DecompileError, Result};

/// The symbolic evaluation stack of a function being decompiled.
#[derive(Debug, Default)]
pub(crate) struct ExprState {
    pub stack: Vec<Expr>,
}

impl ExprState {
    pub fn pop(&mut self, site: &Site) -> Result<Expr> {
        self.stack.pop().ok_or_else(|| DecompileError::StackUnderflow {
            site: site.clone(),
            needed: 1,
            available: 0,
        })
    }

    /// Pop `count` expressions, returned in push order.
    pub fn pop_n(&mut self, count: usize, site: &Site) -> Result<Vec<Expr>> {
        let available = self.stack.len();
        if available < count {
            return Err(DecompileError::StackUnderflow {
                site: site.clone(),
                needed: count,
                available,
            });
        }
        Ok(self.stack.split_off(available - count))
    }
}

/// Apply one instruction to the evaluation stack. Returns the statement it
/// completes, if any.
///
/// Control flow, `return` and the skipped bookkeeping instructions are the
/// caller's business.
pub(crate) fn process_insn(insn: &Instruction, site: &Site, state: &mut ExprState) -> Result<Option<Stmt>> {
    let value = insn.value();

    if let Some((op, ty)) = BinaryOp::from_opcode(value) {
        let rhs = state.pop(site)?;
        let lhs = state.pop(site)?;
        state.stack.push(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            ty,
        });
        return Ok(None);
    }
    if let Some(op) = UnaryOp::from_opcode(value) {
        let operand = state.pop(site)?;
        state.stack.push(Expr::Unary {
            op,
            operand: Box::new(operand),
        });
        return Ok(None);
    }
    if insn.opcode.is_store() {
        return store(insn, site, state).map(Some);
    }

    let stmt = match value {
        op::NOP_191 => None,
        op::CONV_I | op::CONV_R => {
            let ty = if value == op::CONV_I { MjoType::Int } else { MjoType::Float };
            let operand = state.pop(site)?;
            state.stack.push(Expr::Cast {
                ty,
                operand: Box::new(operand),
            });
            None
        }
        op::LDC_I => {
            state.stack.push(Expr::IntLit(insn.int_value));
            None
        }
        op::LDC_R => {
            state.stack.push(Expr::FloatLit(insn.float_value));
            None
        }
        op::LDSTR => {
            state.stack.push(Expr::StringLit(insn.string.clone().unwrap_or_default()));
            None
        }
        op::LD => {
            state.stack.push(Expr::Identifier {
                hash: insn.hash,
                flags: insn.flags,
            });
            None
        }
        op::LDELEM => {
            let indices = state.pop_n(insn.flags.dimension() as usize, site)?;
            state.stack.push(Expr::ArrayAccess {
                hash: insn.hash,
                flags: insn.flags,
                indices,
            });
            None
        }
        op::CALL | op::SYSCALL | op::CALLP | op::SYSCALLP => {
            let args = state.pop_n(insn.arg_count as usize, site)?;
            let call = Expr::Call {
                hash: insn.hash,
                syscall: matches!(value, op::SYSCALL | op::SYSCALLP),
                args,
            };
            if matches!(value, op::CALL | op::SYSCALL) {
                state.stack.push(call);
                None
            } else {
                Some(Stmt::Call(call))
            }
        }
        op::POP => match state.pop(site)? {
            call @ Expr::Call { .. } => Some(Stmt::Call(call)),
            _ => {
                return Err(DecompileError::Malformed {
                    site: site.clone(),
                    detail: "discards a value that is not a call result".into(),
                });
            }
        },
        op::TEXT => Some(Stmt::Text(match &insn.external_key {
            Some(key) => Message::External(key.clone()),
            None => Message::Inline(insn.string.clone().unwrap_or_default()),
        })),
        op::PROC => Some(Stmt::Proc),
        op::CTRL => {
            let code = insn.string.clone().unwrap_or_default();
            let Some(operands) = control_code_operands(&code) else {
                return Err(DecompileError::UnknownControlCode {
                    site: site.clone(),
                    code,
                });
            };
            let operands = state.pop_n(operands.len(), site)?;
            Some(Stmt::Ctrl { code, operands })
        }
        _ => return Err(DecompileError::Unsupported { site: site.clone() }),
    };
    Ok(stmt)
}

fn store(insn: &Instruction, site: &Site, state: &mut ExprState) -> Result<Stmt> {
    let Some(op) = AssignOp::from_opcode(insn.value()) else {
        return Err(DecompileError::Unsupported { site: site.clone() });
    };
    if !insn.opcode.is_element_store() {
        return Ok(Stmt::Assignment {
            hash: insn.hash,
            flags: insn.flags,
            op,
            value: state.pop(site)?,
        });
    }
    // The value sits beneath the indices.
    let indices = state.pop_n(insn.flags.dimension() as usize, site)?;
    let value = state.pop(site)?;
    Ok(Stmt::ArrayAssignment {
        hash: insn.hash,
        flags: insn.flags,
        op,
        indices,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mjo_isa::{Flags, InvertMode, Modifier, Scope, by_mnemonic};

    fn site() -> Site {
        Site {
            function: 1,
            block: "entry".into(),
            index: 0,
            mnemonic: "test".into(),
        }
    }

    fn run(insns: &[Instruction]) -> (ExprState, Vec<Stmt>) {
        let mut state = ExprState::default();
        let mut stmts = Vec::new();
        for insn in insns {
            stmts.extend(process_insn(insn, &site(), &mut state).unwrap());
        }
        (state, stmts)
    }

    fn insn(mnemonic: &str) -> Instruction {
        Instruction::new(by_mnemonic(mnemonic).unwrap())
    }

    fn ldc(v: i32) -> Instruction {
        let mut i = insn("ldc.i");
        i.int_value = v;
        i
    }

    #[test]
    fn operands_keep_their_order() {
        let (state, _) = run(&[ldc(7), ldc(2), insn("sub.i")]);
        assert_eq!(state.stack, vec![Expr::Binary {
            op: BinaryOp::Sub,
            lhs: Box::new(Expr::IntLit(7)),
            rhs: Box::new(Expr::IntLit(2)),
            ty: MjoType::Int,
        }]);
    }

    #[test]
    fn element_store_takes_value_beneath_the_indices() {
        let mut st = insn("stelemp.i");
        st.hash = 0x10;
        st.flags = Flags::new(MjoType::IntArray, Scope::Local, Modifier::None, InvertMode::None, 2);
        let (state, stmts) = run(&[ldc(99), ldc(1), ldc(2), st]);
        assert!(state.stack.is_empty());
        match &stmts[..] {
            [Stmt::ArrayAssignment { indices, value, op, .. }] => {
                assert_eq!(indices, &vec![Expr::IntLit(1), Expr::IntLit(2)]);
                assert_eq!(value, &Expr::IntLit(99));
                assert_eq!(*op, AssignOp::Assign);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn calls_push_or_complete() {
        let mut call = insn("call");
        call.hash = 0xabc;
        call.arg_count = 2;
        let (state, stmts) = run(&[ldc(1), ldc(2), call.clone()]);
        assert!(stmts.is_empty());
        assert!(matches!(&state.stack[..], [Expr::Call { args, syscall: false, .. }] if args.len() == 2));

        let mut callp = insn("syscallp");
        callp.arg_count = 1;
        let (state, stmts) = run(&[ldc(1), callp]);
        assert!(state.stack.is_empty());
        assert!(matches!(&stmts[..], [Stmt::Call(Expr::Call { syscall: true, .. })]));
    }

    #[test]
    fn control_codes() {
        let mut ctrl = insn("ctrl");
        ctrl.string = Some("c".into());
        let (_, stmts) = run(&[ldc(1), ldc(2), ctrl.clone()]);
        assert_eq!(stmts, vec![Stmt::Ctrl {
            code: "c".into(),
            operands: vec![Expr::IntLit(1), Expr::IntLit(2)],
        }]);

        ctrl.string = Some("?".into());
        let err = process_insn(&ctrl, &site(), &mut ExprState::default()).unwrap_err();
        assert!(matches!(err, DecompileError::UnknownControlCode { .. }));
    }

    #[test]
    fn underflow_is_reported() {
        let err = process_insn(&insn("add.i"), &site(), &mut ExprState::default()).unwrap_err();
        assert!(matches!(err, DecompileError::StackUnderflow { needed: 1, available: 0, .. }));
    }

    #[test]
    fn switch_has_no_source_form() {
        let err = process_insn(&insn("switch"), &site(), &mut ExprState::default()).unwrap_err();
        assert!(matches!(err, DecompileError::Unsupported { .. }));
    }
}
