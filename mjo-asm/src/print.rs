//! Rendering scripts as assembly text.
use std::fmt::Write;

use mjo_ir::ssa::Phi;
use mjo_ir::{ControlFlowGraph, Function, InstructionList, IrError, Script, ScriptMeta, SsaGraph};
use mjo_isa::{Instruction, MjoType, OperandKind, Scope, Target};

use crate::error::{AsmError, Result};

/// Render whichever printable representation the script is in.
pub fn print_script(script: &Script) -> Result<String> {
    match script {
        Script::InstructionList(list) => print_list(list),
        Script::ControlFlowGraph(graph) => Ok(print_graph(graph)),
        Script::SsaGraph(graph) => Ok(print_ssa(graph)),
        other => Err(AsmError::Unprintable(other.representation())),
    }
}

/// Function form: one `func` per function, blocks under their labels.
pub fn print_graph(graph: &ControlFlowGraph) -> String {
    let mut out = String::new();
    emit_header(&mut out, &graph.meta);
    for function in &graph.functions {
        emit_function(&mut out, &graph.meta, function, |_| &[]);
    }
    out
}

/// Function form with the stack merges at each block start.
pub fn print_ssa(graph: &SsaGraph) -> String {
    let mut out = String::new();
    emit_header(&mut out, &graph.meta);
    for ssa in &graph.functions {
        emit_function(&mut out, &graph.meta, &ssa.function, |id| {
            ssa.states.get(id).map_or(&[][..], |s| s.phis.as_slice())
        });
    }
    out
}

/// Listing form: the function index, then every instruction at its offset.
pub fn print_list(list: &InstructionList) -> Result<String> {
    let mut out = String::new();
    emit_header(&mut out, &list.meta);
    for entry in &list.index {
        let marker = if entry.offset == list.entry_offset { " entrypoint" } else { "" };
        let _ = writeln!(out, "index ${:08x} {:#x}{marker}", entry.hash, entry.offset);
    }
    if !list.index.is_empty() {
        out.push('\n');
    }
    for insn in &list.instructions {
        let offset = insn
            .offset
            .ok_or_else(|| IrError::MissingLayout(insn.opcode.mnemonic.clone()))?;
        let _ = writeln!(out, "{offset:04x}: {}", line(&list.meta, insn, None));
    }
    Ok(out)
}

/// One instruction without indentation or trailing comment.
///
/// Block targets are written as labels of `function` when given, and
/// displacements as `@~hex`.
pub fn format_instruction(insn: &Instruction, function: Option<&Function>) -> String {
    let mut out = format!("{:<13}", insn.opcode.mnemonic);
    let mut cases = insn.switch_cases.iter();
    for &kind in insn.opcode.operands() {
        let text = match kind {
            OperandKind::TypeList => format!("[{}]", type_names(&insn.type_list)),
            OperandKind::String => match &insn.external_key {
                Some(key) => format!("%{{{key}}}"),
                None => quote(insn.string.as_deref().unwrap_or_default()),
            },
            OperandKind::Flags => insn.flags.keywords().join(" "),
            OperandKind::Hash => format!("${:08x}", insn.hash),
            OperandKind::VarOffset if insn.flags.scope() != Scope::Local && insn.var_offset == -1 => continue,
            OperandKind::VarOffset => insn.var_offset.to_string(),
            OperandKind::Reserved | OperandKind::Phi => continue,
            OperandKind::Int => insn.int_value.to_string(),
            OperandKind::Float => format!("{:?}", insn.float_value),
            OperandKind::ArgCount => format!("({})", insn.arg_count),
            OperandKind::Jump => insn.jump.map(|t| target(t, function)).unwrap_or_default(),
            OperandKind::Line => format!("#{}", insn.line_number),
            OperandKind::Switch => cases
                .by_ref()
                .map(|&t| target(t, function))
                .collect::<Vec<_>>()
                .join(", "),
        };
        out.push(' ');
        out.push_str(&text);
    }
    out.truncate(out.trim_end().len());
    out
}

fn emit_header(out: &mut String, meta: &ScriptMeta) {
    let mark = if meta.read_mark { "enable" } else { "disable" };
    let _ = writeln!(out, "readmark {mark}");
    out.push('\n');
}

fn emit_function<'a>(
    out: &mut String,
    meta: &ScriptMeta,
    function: &Function,
    phis: impl Fn(usize) -> &'a [Phi],
) {
    if let Some(name) = meta.resolve(function.hash) {
        let _ = writeln!(out, "; {name}");
    }
    let entry = if function.is_entry { " entrypoint" } else { "" };
    let _ = writeln!(
        out,
        "func ${:08x}({}){entry} {{",
        function.hash,
        type_names(&function.parameter_types)
    );
    for (n, block) in function.blocks.iter().enumerate() {
        if n > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, " {}:", block.name);
        for phi in phis(block.id) {
            let preds: Vec<String> = phi
                .inputs
                .iter()
                .map(|(pred, _)| target(Target::Block(*pred), Some(function)))
                .collect();
            let _ = writeln!(out, "  {:<13} {} ; stack[{}]", "phi", preds.join(", "), phi.slot);
        }
        for insn in &block.instructions {
            let _ = writeln!(out, "  {}", line(meta, insn, Some(function)));
        }
    }
    let _ = writeln!(out, "}}");
    out.push('\n');
}

/// Instruction text plus the symbol name of its hash operand, if known.
fn line(meta: &ScriptMeta, insn: &Instruction, function: Option<&Function>) -> String {
    let mut text = format_instruction(insn, function);
    if insn.opcode.operands().contains(&OperandKind::Hash) {
        if let Some(name) = meta.resolve(insn.hash) {
            let _ = write!(text, " ; {name}");
        }
    }
    text
}

fn target(t: Target, function: Option<&Function>) -> String {
    match t {
        Target::Offset(d) => format!("@~{:08x}", d as u32),
        Target::Block(id) => match function.and_then(|f| f.blocks.get(id)) {
            Some(block) => format!("@{}", block.name),
            None => format!("@block{id}"),
        },
    }
}

fn type_names(types: &[MjoType]) -> String {
    types.iter().map(|t| t.keyword()).collect::<Vec<_>>().join(", ")
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mjo_isa::{Flags, InvertMode, Modifier, by_mnemonic};

    fn insn(mnemonic: &str) -> Instruction {
        Instruction::new(by_mnemonic(mnemonic).unwrap())
    }

    #[test]
    fn mnemonics_are_padded() {
        let mut ldc = insn("ldc.i");
        ldc.int_value = -7;
        assert_eq!(format_instruction(&ldc, None), "ldc.i         -7");
        assert_eq!(format_instruction(&insn("return"), None), "return");
    }

    #[test]
    fn variable_operands() {
        let mut ld = insn("ld");
        ld.flags = Flags::new(MjoType::Float, Scope::Local, Modifier::None, InvertMode::None, 0);
        ld.hash = 0xdead_beef;
        ld.var_offset = 2;
        assert_eq!(format_instruction(&ld, None), "ld            local float $deadbeef 2");

        ld.flags = Flags::new(MjoType::Int, Scope::Persistent, Modifier::None, InvertMode::None, 0);
        ld.var_offset = -1;
        assert_eq!(format_instruction(&ld, None), "ld            persistent int $deadbeef");
    }

    #[test]
    fn strings_are_escaped() {
        let mut text = insn("text");
        text.string = Some("a \"b\"\n".into());
        assert_eq!(format_instruction(&text, None), r#"text          "a \"b\"\n""#);
        text.external_key = Some("L12".into());
        assert_eq!(format_instruction(&text, None), "text          %{L12}");
    }

    #[test]
    fn relative_targets_are_hex() {
        let mut br = insn("br");
        br.jump = Some(Target::Offset(-16));
        assert_eq!(format_instruction(&br, None), "br            @~fffffff0");
    }

    #[test]
    fn syntax_trees_are_not_printable() {
        let err = print_script(&Script::InTransition).unwrap_err();
        assert!(matches!(err, AsmError::Unprintable(_)));
    }
}
