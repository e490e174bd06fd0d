//! Indented pseudo-source rendering of a module.
//!
//! Used for `weftc --dump` and for snapshot tests of normalization. The
//! output is not meant to be parsed back.

use crate::ast::Ast;
use crate::ids::{ExprId, ModuleId, StmtId, SymbolId};
use crate::node::{ExprKind, StmtKind, SymbolKind};

/// Configuration for the printer output.
#[derive(Debug, Clone)]
pub struct PrettyConfig {
    /// Number of spaces per indentation level. Default: 2.
    pub indent_size: usize,
    /// Nesting depth after which output is elided with `...`. Keeps a
    /// malformed (cyclic) tree from recursing forever.
    pub max_depth: usize,
}

impl Default for PrettyConfig {
    fn default() -> Self {
        Self {
            indent_size: 2,
            max_depth: 256,
        }
    }
}

/// Render `module` and everything it owns.
pub fn print_module(ast: &Ast, module: ModuleId, config: &PrettyConfig) -> String {
    let mut printer = Printer {
        ast,
        config,
        out: String::new(),
        depth: 0,
    };
    let Some(m) = ast.get_module(module) else {
        return String::new();
    };
    printer.line(&format!("module {} ({})", m.name, m.file));
    for &sym in &m.symbols {
        printer.symbol(sym);
    }
    printer.out
}

/// Render a single expression on one line.
pub fn print_expr(ast: &Ast, expr: ExprId) -> String {
    let config = PrettyConfig::default();
    let printer = Printer {
        ast,
        config: &config,
        out: String::new(),
        depth: 0,
    };
    printer.expr(expr, 0)
}

struct Printer<'a> {
    ast: &'a Ast,
    config: &'a PrettyConfig,
    out: String,
    depth: usize,
}

impl Printer<'_> {
    fn line(&mut self, text: &str) {
        let indent = " ".repeat(self.depth * self.config.indent_size);
        self.out.push_str(&indent);
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            self.line("...");
        } else {
            f(self);
        }
        self.depth -= 1;
    }

    fn symbol(&mut self, id: SymbolId) {
        let Some(sym) = self.ast.get_symbol(id) else {
            self.line(&format!("<dangling {id}>"));
            return;
        };
        match &sym.kind {
            SymbolKind::Variable { ty } | SymbolKind::Param { ty } => {
                self.line(&format!("{} {}{}", sym.keyword(), sym.name, annotation(ty)));
            }
            SymbolKind::Function { params, ret, body } => {
                let params: Vec<String> = params.iter().map(|&p| self.param(p)).collect();
                let ret = match ret {
                    Some(ty) => format!(" -> {ty}"),
                    None => String::new(),
                };
                self.line(&format!("fn {}({}){} {{", sym.name, params.join(", "), ret));
                self.nested(|p| {
                    for &stmt in body {
                        p.stmt(stmt);
                    }
                });
                self.line("}");
            }
            SymbolKind::Type { members } => {
                self.line(&format!("type {} {{", sym.name));
                self.nested(|p| {
                    for &member in members {
                        p.symbol(member);
                    }
                });
                self.line("}");
            }
        }
    }

    fn param(&self, id: SymbolId) -> String {
        match self.ast.get_symbol(id) {
            Some(sym) => match &sym.kind {
                SymbolKind::Param { ty } | SymbolKind::Variable { ty } => {
                    format!("{}{}", sym.name, annotation(ty))
                }
                _ => sym.name.clone(),
            },
            None => format!("<dangling {id}>"),
        }
    }

    fn stmt(&mut self, id: StmtId) {
        let Some(stmt) = self.ast.get_stmt(id) else {
            self.line(&format!("<dangling {id}>"));
            return;
        };
        match &stmt.kind {
            StmtKind::Expr(e) => {
                let text = self.expr(*e, 0);
                self.line(&format!("{text};"));
            }
            StmtKind::Decl { sym, init } => match self.ast.get_symbol(*sym) {
                Some(s) if s.declares_scope() => self.symbol(*sym),
                Some(s) => {
                    let ty = match &s.kind {
                        SymbolKind::Variable { ty } | SymbolKind::Param { ty } => annotation(ty),
                        _ => String::new(),
                    };
                    let init = match init {
                        Some(e) => format!(" = {}", self.expr(*e, 0)),
                        None => String::new(),
                    };
                    self.line(&format!("var {}{}{};", s.name, ty, init));
                }
                None => self.line(&format!("var <dangling {sym}>;")),
            },
            StmtKind::Block(stmts) => {
                self.line("{");
                self.nested(|p| {
                    for &s in stmts {
                        p.stmt(s);
                    }
                });
                self.line("}");
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let header = format!("if {}", self.expr(*cond, 0));
                self.branch(header, *then_branch);
                if let Some(else_branch) = else_branch {
                    self.branch("else".to_string(), *else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                let header = format!("while {}", self.expr(*cond, 0));
                self.branch(header, *body);
            }
            StmtKind::Return(value) => match value {
                Some(e) => {
                    let text = self.expr(*e, 0);
                    self.line(&format!("return {text};"));
                }
                None => self.line("return;"),
            },
            StmtKind::Nop => self.line(";"),
        }
    }

    /// `header { ... }` for block branches, `header` plus an indented
    /// statement otherwise.
    fn branch(&mut self, header: String, body: StmtId) {
        match self.ast.get_stmt(body).map(|s| &s.kind) {
            Some(StmtKind::Block(stmts)) => {
                self.line(&format!("{header} {{"));
                self.nested(|p| {
                    for &s in stmts {
                        p.stmt(s);
                    }
                });
                self.line("}");
            }
            _ => {
                self.line(&header);
                self.nested(|p| p.stmt(body));
            }
        }
    }

    fn expr(&self, id: ExprId, depth: usize) -> String {
        if depth > self.config.max_depth {
            return "...".to_string();
        }
        let Some(expr) = self.ast.get_expr(id) else {
            return format!("<dangling {id}>");
        };
        match &expr.kind {
            ExprKind::Int(v) => v.to_string(),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Str(s) => format!("{s:?}"),
            ExprKind::SymRef(sym) => match self.ast.get_symbol(*sym) {
                Some(s) if s.removed => format!("<removed {}>", s.name),
                Some(s) => s.name.clone(),
                None => format!("<dangling {sym}>"),
            },
            ExprKind::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(|&a| self.expr(a, depth + 1)).collect();
                format!("{}({})", self.expr(*callee, depth + 1), args.join(", "))
            }
            ExprKind::Binary { op, lhs, rhs } => format!(
                "{} {} {}",
                self.expr(*lhs, depth + 1),
                op,
                self.expr(*rhs, depth + 1)
            ),
            ExprKind::Assign { target, value } => format!(
                "{} = {}",
                self.expr(*target, depth + 1),
                self.expr(*value, depth + 1)
            ),
            ExprKind::Paren(inner) => format!("({})", self.expr(*inner, depth + 1)),
        }
    }
}

fn annotation(ty: &Option<String>) -> String {
    match ty {
        Some(ty) => format!(": {ty}"),
        None => String::new(),
    }
}
