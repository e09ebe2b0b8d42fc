mod common;

use common::*;
use mjo_ir::IrError;
use mjo_ir::ssa::{InstructionRef, Producer, ValueCategory, simulate};
use mjo_isa::{Flags, InvertMode, MjoType, Modifier, Scope};

fn ssa(list: mjo_ir::InstructionList) -> mjo_ir::Result<mjo_ir::SsaGraph> {
    list.into_control_flow_graph()?.into_ssa_graph()
}

#[test]
fn if_else_values_and_consumers() {
    let graph = ssa(if_else()).unwrap();
    let f = &graph.functions[0];
    let entry = &f.states[0];
    assert_eq!(entry.start.depth(), 0);
    assert_eq!(entry.end.depth(), 0);

    let loaded = entry.instructions[0].pushed[0];
    let value = f.value(loaded);
    assert_eq!(value.ty, MjoType::Int);
    assert_eq!(value.category, ValueCategory::Temp);
    assert_eq!(value.producer, Producer::Instruction(InstructionRef { block: 0, index: 0 }));
    assert_eq!(value.consumers, vec![InstructionRef { block: 0, index: 1 }]);

    // `st.i` pushes its value back; the join sees one value on either path
    assert_eq!(f.states[1].end.depth(), 1);
    assert_eq!(f.states[2].end.depth(), 1);
    assert_eq!(f.states[3].start.depth(), 1);
    assert!(f.unverified.is_empty());
}

#[test]
fn per_instruction_stack_balance() {
    let graph = ssa(if_else()).unwrap();
    for f in &graph.functions {
        for (block, states) in f.function.blocks.iter().zip(&f.states) {
            let mut depth = states.start.depth();
            for (insn, values) in block.instructions.iter().zip(&states.instructions) {
                let masks = insn.opcode.effect().pop_masks(insn, depth).unwrap();
                assert_eq!(masks.len(), values.popped.len(), "{}", insn.opcode);
                depth = depth - values.popped.len() + values.pushed.len();
            }
            assert_eq!(depth, states.end.depth());
        }
    }
}

#[test]
fn diverging_slot_gets_a_phi() {
    // entry: ldc.i 1; ldc.i 0; brfalse J
    // B:     pop; ldc.i 2
    // J:     pop; return
    let list = single_function(vec![
        ldc_i(1),
        ldc_i(0),
        jump("brfalse", 8),
        insn("pop"),
        ldc_i(2),
        insn("pop"),
        insn("return"),
    ]);
    let graph = ssa(list).unwrap();
    let f = &graph.functions[0];
    let join = &f.states[2];
    assert_eq!(join.phis.len(), 1);
    let phi = &join.phis[0];
    assert_eq!(phi.slot, 0);
    let first = f.states[0].instructions[0].pushed[0];
    let second = f.states[1].instructions[1].pushed[0];
    assert_eq!(phi.inputs, vec![(0, Some(first)), (1, Some(second))]);
    let merged = f.value(phi.value);
    assert_eq!(merged.ty, MjoType::Int);
    assert_eq!(merged.producer, Producer::Phi { block: 2, phi: 0 });
    assert_eq!(join.start.values, vec![phi.value]);
    assert_eq!(merged.consumers, vec![InstructionRef { block: 2, index: 0 }]);
}

#[test]
fn join_with_different_depths_is_rejected() {
    // entry: ldc.i 0; brfalse J / B: ldc.i 5 / J: return
    let list = single_function(vec![ldc_i(0), jump("brfalse", 6), ldc_i(5), insn("return")]);
    let err = ssa(list).unwrap_err();
    assert!(matches!(err, IrError::StackMismatch { .. }), "{err}");
}

#[test]
fn operand_type_is_checked() {
    let mut s = insn("ldstr");
    s.string = Some("x".into());
    let list = single_function(vec![s, insn("conv.r"), insn("return")]);
    match ssa(list).unwrap_err() {
        IrError::TypeMismatch { site, found, .. } => {
            assert_eq!(site.index, 1);
            assert_eq!(site.mnemonic, "conv.r");
            assert_eq!(found, MjoType::String);
        }
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn pop_from_empty_stack() {
    let list = single_function(vec![insn("pop"), insn("return")]);
    let err = ssa(list).unwrap_err();
    assert!(matches!(err, IrError::StackUnderflow { needed: 1, available: 0, .. }));
}

#[test]
fn unverified_opcodes_are_recorded() {
    let list = single_function(vec![insn("proc"), insn("return")]);
    let graph = ssa(list).unwrap();
    assert_eq!(graph.functions[0].unverified, vec![InstructionRef { block: 0, index: 0 }]);
}

#[test]
fn argcheck_and_alloca_set_the_frame() {
    let mut argcheck = insn("argcheck");
    argcheck.type_list = vec![MjoType::Int, MjoType::String];
    let mut alloca = insn("alloca");
    alloca.type_list = vec![MjoType::Float];
    let list = single_function(vec![argcheck, alloca, insn("return")]);
    let graph = ssa(list).unwrap();
    let end = &graph.functions[0].states[0].end;
    assert_eq!((end.arguments, end.locals, end.depth()), (2, 1, 0));
}

#[test]
fn element_load_pops_one_index_per_dimension() {
    let mut ldelem = insn("ldelem");
    ldelem.flags = Flags::new(MjoType::IntArray, Scope::Local, Modifier::None, InvertMode::None, 2);
    let list = single_function(vec![ldc_i(0), ldc_i(1), ldelem, insn("pop"), insn("return")]);
    let graph = ssa(list).unwrap();
    let f = &graph.functions[0];
    let values = &f.states[0].instructions[2];
    assert_eq!(values.popped.len(), 2);
    assert_eq!(f.value(values.pushed[0]).ty, MjoType::Int);
}

#[test]
fn simulate_empty_function() {
    let f = mjo_ir::Function::new(5);
    let ssa = simulate(f).unwrap();
    assert!(ssa.states.is_empty());
}
