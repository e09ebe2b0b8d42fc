use std::fmt::Write;

use mjo_ir::expr::Expr;
use mjo_ir::stmt::{FunctionBody, FunctionTree, Message, Stmt};
use mjo_ir::{ScriptMeta, SyntaxTree};
use mjo_isa::{Flags, InvertMode, MjoType, Modifier};

/// Emit every function of a syntax tree as source text.
pub fn emit_tree(tree: &SyntaxTree) -> String {
    let mut out = String::new();
    for (i, function) in tree.functions.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        emit_function(&mut out, function, &tree.meta);
    }
    out
}

/// Emit a statement list at the outermost indentation.
pub fn emit_stmts(stmts: &[Stmt], meta: &ScriptMeta) -> String {
    let mut out = String::new();
    Emitter { out: &mut out, meta }.stmts(stmts, 0);
    out
}

fn emit_function(out: &mut String, function: &FunctionTree, meta: &ScriptMeta) {
    if let Some(name) = meta.resolve(function.hash) {
        let _ = writeln!(out, "// {name}");
    }
    let params: Vec<&str> = function.parameter_types.iter().map(|t| t.keyword()).collect();
    let entry = if function.is_entry { " entrypoint" } else { "" };
    let _ = writeln!(out, "func ${:08x}({}){entry} {{", function.hash, params.join(", "));
    match &function.body {
        FunctionBody::Decompiled(stmts) => Emitter { out: &mut *out, meta }.stmts(stmts, 1),
        FunctionBody::Failed(message) => {
            let _ = writeln!(out, "  // decompilation failed: {message}");
        }
    }
    out.push_str("}\n");
}

struct Emitter<'a> {
    out: &'a mut String,
    meta: &'a ScriptMeta,
}

impl Emitter<'_> {
    fn stmts(&mut self, stmts: &[Stmt], indent: usize) {
        for stmt in stmts {
            self.stmt(stmt, indent);
        }
    }

    fn block(&mut self, body: &[Stmt], indent: usize) {
        self.stmts(body, indent + 1);
        let _ = writeln!(self.out, "{}}}", pad(indent));
    }

    fn stmt(&mut self, stmt: &Stmt, indent: usize) {
        let pad = pad(indent);
        match stmt {
            Stmt::Assignment { hash, flags, op, value } => {
                let target = self.name(*hash, *flags);
                let value = self.expr(value);
                let _ = writeln!(self.out, "{pad}{target} {op} {value};");
            }
            Stmt::ArrayAssignment {
                hash,
                flags,
                op,
                indices,
                value,
            } => {
                let target = self.name(*hash, *flags);
                let indices = self.list(indices);
                let value = self.expr(value);
                let _ = writeln!(self.out, "{pad}{target}[{indices}] {op} {value};");
            }
            Stmt::Block(body) => {
                let _ = writeln!(self.out, "{pad}{{");
                self.block(body, indent);
            }
            Stmt::Call(call) => {
                let call = self.expr(call);
                let _ = writeln!(self.out, "{pad}{call};");
            }
            Stmt::Return(None) => {
                let _ = writeln!(self.out, "{pad}return;");
            }
            Stmt::Return(Some(value)) => {
                let value = self.expr(value);
                let _ = writeln!(self.out, "{pad}return {value};");
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let cond = self.expr(cond);
                let _ = writeln!(self.out, "{pad}if ({cond}) {{");
                match else_body {
                    None => self.block(then_body, indent),
                    Some(else_body) => {
                        self.stmts(then_body, indent + 1);
                        let _ = writeln!(self.out, "{pad}}} else {{");
                        self.block(else_body, indent);
                    }
                }
            }
            Stmt::Text(Message::Inline(text)) => {
                let _ = writeln!(self.out, "{pad}text({});", quote(text));
            }
            Stmt::Text(Message::External(key)) => {
                let _ = writeln!(self.out, "{pad}text(%{{{key}}});");
            }
            Stmt::Ctrl { code, operands } => {
                let mut args = quote(code);
                for operand in operands {
                    args.push_str(", ");
                    args.push_str(&self.expr(operand));
                }
                let _ = writeln!(self.out, "{pad}ctrl({args});");
            }
            Stmt::Proc => {
                let _ = writeln!(self.out, "{pad}proc;");
            }
            Stmt::Destructor(body) => {
                let _ = writeln!(self.out, "{pad}destructor {{");
                self.block(body, indent);
            }
        }
    }

    fn list(&self, exprs: &[Expr]) -> String {
        exprs.iter().map(|e| self.expr(e)).collect::<Vec<_>>().join(", ")
    }

    fn name(&self, hash: u32, flags: Flags) -> String {
        match self.meta.resolve(hash) {
            Some(name) => name.to_string(),
            None => format!("{}{hash:08x}{}", flags.scope().sigil(), type_sigil(flags.ty())),
        }
    }

    fn load(&self, name: String, flags: Flags) -> String {
        let name = match flags.modifier() {
            Modifier::None => name,
            Modifier::PreIncrement => format!("++{name}"),
            Modifier::PreDecrement => format!("--{name}"),
            Modifier::PostIncrement => format!("{name}++"),
            Modifier::PostDecrement => format!("{name}--"),
        };
        match flags.invert() {
            InvertMode::None => name,
            InvertMode::Numeric => format!("-{name}"),
            InvertMode::Boolean => format!("!{name}"),
            InvertMode::Bitwise => format!("~{name}"),
        }
    }

    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::IntLit(v) => v.to_string(),
            Expr::FloatLit(v) => format!("{v:?}"),
            Expr::StringLit(s) => quote(s),
            Expr::Identifier { hash, flags } => self.load(self.name(*hash, *flags), *flags),
            Expr::ArrayAccess { hash, flags, indices } => {
                let access = format!("{}[{}]", self.name(*hash, *flags), self.list(indices));
                self.load(access, *flags)
            }
            Expr::Unary { op, operand } => format!("{op}{}", self.expr(operand)),
            Expr::Binary { op, lhs, rhs, .. } => {
                format!("({} {op} {})", self.expr(lhs), self.expr(rhs))
            }
            Expr::Cast { ty, operand } => format!("({}){}", ty.keyword(), self.expr(operand)),
            Expr::Call { hash, args, .. } => {
                let name = match self.meta.resolve(*hash) {
                    Some(name) => name.to_string(),
                    None => format!("${hash:08x}"),
                };
                format!("{name}({})", self.list(args))
            }
        }
    }
}

fn pad(indent: usize) -> String {
    "  ".repeat(indent)
}

fn type_sigil(ty: MjoType) -> &'static str {
    match ty {
        MjoType::Float => "%",
        MjoType::String => "$",
        MjoType::IntArray => "#",
        MjoType::FloatArray => "%#",
        MjoType::StringArray => "$#",
        MjoType::Int | MjoType::Unknown => "",
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
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
    use std::collections::HashMap;
    use std::sync::Arc;

    use mjo_ir::expr::{AssignOp, BinaryOp};
    use mjo_isa::Scope;

    fn local(ty: MjoType) -> Flags {
        Flags::new(ty, Scope::Local, Modifier::None, InvertMode::None, 0)
    }

    #[test]
    fn unresolved_names_carry_sigils() {
        let meta = ScriptMeta::default();
        let stmts = vec![Stmt::Assignment {
            hash: 0xab,
            flags: local(MjoType::String),
            op: AssignOp::Add,
            value: Expr::StringLit("a\"b".into()),
        }];
        assert_eq!(emit_stmts(&stmts, &meta), "_000000ab$ += \"a\\\"b\";\n");
    }

    #[test]
    fn binaries_are_parenthesized() {
        let meta = ScriptMeta::default();
        let sum = Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expr::IntLit(1)),
            rhs: Box::new(Expr::Binary {
                op: BinaryOp::Mul,
                lhs: Box::new(Expr::IntLit(2)),
                rhs: Box::new(Expr::FloatLit(3.0)),
                ty: MjoType::Float,
            }),
            ty: MjoType::Float,
        };
        assert_eq!(emit_stmts(&[Stmt::Return(Some(sum))], &meta), "return (1 + (2 * 3.0));\n");
    }

    #[test]
    fn load_modifiers() {
        let names: HashMap<u32, String> = [(1, "x".to_string())].into();
        let meta = ScriptMeta {
            resolver: Some(Arc::new(names)),
            ..Default::default()
        };
        let flags = Flags::new(MjoType::Int, Scope::Local, Modifier::PostIncrement, InvertMode::Boolean, 0);
        let load = Expr::Identifier { hash: 1, flags };
        assert_eq!(emit_stmts(&[Stmt::Return(Some(load))], &meta), "return !x++;\n");
    }

    #[test]
    fn nested_blocks_indent() {
        let meta = ScriptMeta::default();
        let stmts = vec![Stmt::If {
            cond: Expr::IntLit(1),
            then_body: vec![Stmt::Proc],
            else_body: Some(vec![Stmt::Destructor(vec![Stmt::Text(Message::External("L1".into()))])]),
        }];
        let expected = "if (1) {\n  proc;\n} else {\n  destructor {\n    text(%{L1});\n  }\n}\n";
        assert_eq!(emit_stmts(&stmts, &meta), expected);
    }

    #[test]
    fn failed_functions_keep_their_message() {
        let tree = SyntaxTree {
            meta: ScriptMeta::default(),
            functions: vec![FunctionTree {
                hash: 0x10,
                is_entry: true,
                parameter_types: vec![MjoType::Int, MjoType::String],
                local_types: vec![],
                body: FunctionBody::Failed("boom".into()),
            }],
        };
        assert_eq!(
            emit_tree(&tree),
            "func $00000010(int, string) entrypoint {\n  // decompilation failed: boom\n}\n"
        );
    }
}
