//! Structural decompiler: recovers statements and `if`/`else` nesting from
//! the stack-value graph, and prints them as source text.
//!
//! Loops and `switch` have no structured form here; a function using them
//! is reported as failed while the rest of the script still decompiles.

pub mod dominators;
pub mod error;
mod expr_recovery;
pub mod source_emitter;
mod structuring;

pub use error::{DecompileError, Result};
pub use source_emitter::{emit_stmts, emit_tree};

use mjo_ir::stmt::{FunctionBody, FunctionTree, Stmt};
use mjo_ir::{IrError, Representation, Script, SsaFunction, SsaGraph, SyntaxTree};
use rayon::prelude::*;

/// Decompile one function.
pub fn decompile_function(function: &SsaFunction) -> Result<Vec<Stmt>> {
    structuring::structure_function(&function.function)
}

/// Decompile every function of a script. Functions are independent; one
/// that fails keeps its error message in place of a body.
pub fn decompile(graph: SsaGraph) -> SyntaxTree {
    let functions = graph
        .functions
        .par_iter()
        .map(|function| {
            let f = &function.function;
            log::debug!("decompiling ${:08x}", f.hash);
            let body = match decompile_function(function) {
                Ok(stmts) => FunctionBody::Decompiled(stmts),
                Err(e) => {
                    log::warn!("{e}");
                    FunctionBody::Failed(e.to_string())
                }
            };
            FunctionTree {
                hash: f.hash,
                is_entry: f.is_entry,
                parameter_types: f.parameter_types.clone(),
                local_types: f.local_types.clone(),
                body,
            }
        })
        .collect();
    SyntaxTree {
        meta: graph.meta,
        functions,
    }
}

/// Move a script from the SSA graph state to the syntax tree state.
///
/// A syntax tree is left as is. Any other state is an illegal transition
/// and the script is not touched.
pub fn decompile_script(script: &mut Script) -> std::result::Result<(), IrError> {
    match script {
        Script::SyntaxTree(_) => Ok(()),
        Script::SsaGraph(_) => {
            if let Script::SsaGraph(graph) = std::mem::replace(script, Script::InTransition) {
                *script = Script::SyntaxTree(decompile(graph));
            }
            Ok(())
        }
        other => Err(IrError::IllegalTransition {
            from: other.representation(),
            to: Representation::SyntaxTree,
        }),
    }
}
