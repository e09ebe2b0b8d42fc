#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use mjo_ir::{Script, SsaGraph};

/// `ld $AAAA; brfalse L; ldc.i 1; st.i $AAAA; br M;
///  L: ldc.i 2; st.i $AAAA; M: return`
pub const IF_ELSE: &str = "\
func $00001234() entrypoint {
 entry:
  ld persistent int $0000aaaa
  brfalse @else
 then:
  ldc.i 1
  st.i persistent int $0000aaaa
  br @done
 else:
  ldc.i 2
  st.i persistent int $0000aaaa
 done:
  return
}
";

/// A conditional back edge to the entry block.
pub const LOOP: &str = "\
func $00000030() {
 entry:
  ldc.i 1
  brfalse @entry
 exit:
  return
}
";

/// The inner branch ends at `y` on one side and at `x` on the other.
pub const CROSSED: &str = "\
func $00000040() {
 entry:
  ld persistent int $00000001
  brfalse @else
 then:
  br @x
 else:
  ld persistent int $00000002
  brfalse @x
 e2:
  br @y
 x:
  proc
 y:
  return
}
";

/// Both branches of `if (a) { if (b) { .. } }` jump to the same label.
pub const NESTED_IF: &str = "\
func $00000070() {
 entry:
  ld persistent int $00000001
  brfalse @done
 inner:
  ld persistent int $00000002
  brfalse @done
 body:
  ldc.i 1
  stp.i persistent int $00000003
 done:
  return
}
";

/// `if .. else if .. else` with every arm ending at `done`.
pub const ELSE_IF: &str = "\
func $00000080() {
 entry:
  ld persistent int $00000001
  brfalse @elif
 first:
  ldc.i 1
  stp.i persistent int $00000003
  br @done
 elif:
  ld persistent int $00000002
  brfalse @else
 second:
  ldc.i 2
  stp.i persistent int $00000003
  br @done
 else:
  ldc.i 3
  stp.i persistent int $00000003
 done:
  return
}
";

pub const DESTRUCTOR: &str = "\
func $00000050() {
 entry:
  bsel.5 @body
 skip:
  br @after
 body:
  bsel.clr
  proc
 after:
  return
}
";

/// Parse graph-form text and simulate the stack.
pub fn ssa(text: &str) -> SsaGraph {
    let mut script = mjo_asm::parse(text).unwrap();
    script.to_ssa_graph().unwrap();
    match script {
        Script::SsaGraph(graph) => graph,
        other => panic!("expected an SSA graph, got {}", other.representation()),
    }
}

pub fn names(pairs: &[(u32, &str)]) -> Arc<HashMap<u32, String>> {
    Arc::new(pairs.iter().map(|&(h, n)| (h, n.to_string())).collect())
}

/// Collapse all whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
