//! Assembly text for Majiro scripts.
//!
//! Two document forms exist. The function form lists each function's
//! basic blocks under labels and parses into a control-flow graph:
//!
//! ```text
//! readmark enable
//!
//! func $1d128f30() entrypoint {
//!  entry:
//!   line          #3
//!   ldc.i         5
//!   return
//! }
//! ```
//!
//! The listing form keeps byte offsets and relative branches and parses
//! into an instruction list:
//!
//! ```text
//! index $1d128f30 0x0 entrypoint
//! 0000: line          #3
//! 0004: ldc.i         5
//! 000a: return
//! ```

pub mod error;
mod parse;
pub mod print;

use std::collections::HashMap;

use mjo_file::FunctionEntry;
use mjo_ir::{BasicBlock, ControlFlowGraph, Function, InstructionList, Script, ScriptMeta};
use mjo_isa::{Target, op};

pub use error::{AsmError, Result};
pub use print::{print_graph, print_list, print_script, print_ssa};

use parse::{Body, IndexLine, ParsedFunction, ParsedInstruction};

/// Parse a document in either form.
pub fn parse(text: &str) -> Result<Script> {
    let doc = match parse::document(text) {
        Ok((_, doc)) => doc,
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => return Err(syntax_error(text, e)),
        Err(nom::Err::Incomplete(_)) => {
            return Err(AsmError::Syntax {
                line: 0,
                column: 0,
                message: "incomplete input".into(),
            });
        }
    };
    let meta = ScriptMeta {
        read_mark: doc.read_mark,
        ..ScriptMeta::default()
    };
    let script = match doc.body {
        Body::Graph(functions) => Script::ControlFlowGraph(build_graph(meta, functions)?),
        Body::List { index, instructions } => Script::InstructionList(build_list(meta, index, instructions)?),
    };
    script.sanity_check()?;
    Ok(script)
}

fn syntax_error(text: &str, e: parse::SyntaxError) -> AsmError {
    let consumed = &text[..text.len() - e.input.len()];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    AsmError::Syntax {
        line,
        column,
        message: e.message,
    }
}

fn build_graph(meta: ScriptMeta, parsed: Vec<ParsedFunction>) -> Result<ControlFlowGraph> {
    let mut functions = Vec::with_capacity(parsed.len());
    let mut entry: Option<u32> = None;
    for pf in parsed {
        if pf.is_entry {
            if let Some(first) = entry {
                return Err(AsmError::MultipleEntryPoints { first, second: pf.hash });
            }
            entry = Some(pf.hash);
        }
        functions.push(build_function(pf)?);
    }
    log::debug!("parsed {} functions", functions.len());
    Ok(ControlFlowGraph { meta, functions })
}

fn build_function(pf: ParsedFunction) -> Result<Function> {
    let mut ids = HashMap::with_capacity(pf.blocks.len());
    for (id, block) in pf.blocks.iter().enumerate() {
        if ids.insert(block.label, id).is_some() {
            return Err(AsmError::DuplicateLabel {
                function: pf.hash,
                label: block.label.to_string(),
            });
        }
    }
    let lookup = |label: &str| {
        ids.get(label).copied().ok_or_else(|| AsmError::UnknownLabel {
            function: pf.hash,
            label: label.to_string(),
        })
    };

    let mut function = Function::new(pf.hash);
    function.is_entry = pf.is_entry;
    function.parameter_types = pf.parameter_types.clone();
    for (id, parsed) in pf.blocks.iter().enumerate() {
        let mut block = BasicBlock::new(id, parsed.label);
        for ParsedInstruction { insn, labels } in &parsed.instructions {
            if insn.opcode.is_phi() {
                continue;
            }
            let mut insn = insn.clone();
            let targets = insn.jump.iter_mut().chain(insn.switch_cases.iter_mut());
            for target in targets {
                if let Target::Block(slot) = *target {
                    *target = Target::Block(lookup(labels[slot])?);
                }
            }
            if insn.value() == op::ALLOCA {
                function.local_types = insn.type_list.clone();
            }
            block.instructions.push(insn);
        }
        function.blocks.push(block);
    }
    function.link()?;
    function.prune_unreachable();
    Ok(function)
}

fn build_list(
    meta: ScriptMeta,
    index: Vec<IndexLine>,
    parsed: Vec<(u32, ParsedInstruction)>,
) -> Result<InstructionList> {
    let mut entry_offset = None;
    let mut entries = Vec::with_capacity(index.len());
    for line in &index {
        if line.is_entry {
            if let Some((first, _)) = entry_offset {
                return Err(AsmError::MultipleEntryPoints {
                    first,
                    second: line.hash,
                });
            }
            entry_offset = Some((line.hash, line.offset));
        }
        entries.push(FunctionEntry {
            hash: line.hash,
            offset: line.offset,
        });
    }

    let mut instructions = Vec::with_capacity(parsed.len());
    for (offset, ParsedInstruction { mut insn, .. }) in parsed {
        insn.offset = Some(offset);
        insn.size = Some(mjo_isa::encoded_size(&insn)?);
        instructions.push(insn);
    }
    Ok(InstructionList {
        meta,
        instructions,
        index: entries,
        entry_offset: entry_offset.map_or(0, |(_, offset)| offset),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mjo_ir::Representation;

    #[test]
    fn syntax_errors_point_at_the_token() {
        let err = parse("func $10() {\n entry:\n  frobnicate\n}\n").unwrap_err();
        match err {
            AsmError::Syntax { line, column, message } => {
                assert_eq!((line, column), (3, 3));
                assert!(message.contains("frobnicate"), "{message}");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn empty_document_is_an_empty_listing() {
        let script = parse("; nothing here\n").unwrap();
        assert_eq!(script.representation(), Representation::InstructionList);
    }

    #[test]
    fn labels_must_exist() {
        let err = parse("func $10() {\n entry:\n  br @nowhere\n}\n").unwrap_err();
        assert!(matches!(err, AsmError::UnknownLabel { function: 0x10, .. }));
    }

    #[test]
    fn labels_must_be_unique() {
        let err = parse("func $10() {\n a:\n  return\n a:\n  return\n}\n").unwrap_err();
        assert!(matches!(err, AsmError::DuplicateLabel { .. }));
    }
}
