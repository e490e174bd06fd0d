//! Verification: the read-only configuration of fixup.
//!
//! The verifier recomputes every back-reference from the walk and compares
//! it with what is recorded on the node. Each disagreement, and each
//! reference to a symbol that is gone, becomes a [`Diagnostic`]; the walk
//! keeps going so one run reports everything.

use rustc_hash::FxHashSet;
use weft_ast::{
    Ast, ChildStmts, ExprId, ExprKind, ExprSlot, ModuleId, NodeRef, StmtId, StmtSlot, SymbolId,
};

use super::{run_modules, FixupContext, FixupPass};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{InternalError, InternalErrorKind};
use crate::traverse::{HookResult, TraversalStats, Visitor};

/// Which invariants the verifier checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyChecks {
    /// Symbol references resolve to a symbol that is still declared
    /// somewhere in the program.
    pub symbol_refs: bool,
    /// Recorded `parent_stmt` equals the enclosing statement of the walk.
    pub enclosing_stmt: bool,
    /// Recorded `parent_symbol` equals the enclosing symbol of the walk.
    pub parent_symbol: bool,
    /// Recorded `scope` of a symbol equals where it is declared.
    pub symbol_scope: bool,
}

impl Default for VerifyChecks {
    fn default() -> Self {
        Self::all()
    }
}

impl VerifyChecks {
    pub const NAMES: [&'static str; 4] = ["symbol-refs", "enclosing-stmt", "parent-symbol", "symbol-scope"];

    pub fn all() -> Self {
        Self {
            symbol_refs: true,
            enclosing_stmt: true,
            parent_symbol: true,
            symbol_scope: true,
        }
    }

    pub fn none() -> Self {
        Self {
            symbol_refs: false,
            enclosing_stmt: false,
            parent_symbol: false,
            symbol_scope: false,
        }
    }

    /// Parse a comma-separated list of check names, or `all` / `none`.
    pub fn parse_list(list: &str) -> Result<Self, String> {
        let mut checks = Self::none();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match name {
                "all" => checks = Self::all(),
                "none" => checks = Self::none(),
                "symbol-refs" => checks.symbol_refs = true,
                "enclosing-stmt" => checks.enclosing_stmt = true,
                "parent-symbol" => checks.parent_symbol = true,
                "symbol-scope" => checks.symbol_scope = true,
                other => {
                    return Err(format!(
                        "unknown check `{other}` (expected one of: all, none, {})",
                        Self::NAMES.join(", ")
                    ))
                }
            }
        }
        Ok(checks)
    }
}

/// What a verification run found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub diagnostics: Vec<Diagnostic>,
    pub stats: TraversalStats,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// The read-only fixup configuration.
#[derive(Debug, Default)]
pub struct Verifier {
    checks: VerifyChecks,
    ctx: FixupContext,
    diagnostics: Vec<Diagnostic>,
    /// Symbols reachable from any module of the program.
    declared: FxHashSet<SymbolId>,
}

impl Verifier {
    pub fn new(checks: VerifyChecks) -> Self {
        Self {
            checks,
            ..Self::default()
        }
    }

    pub fn context(&self) -> &FixupContext {
        &self.ctx
    }

    /// Verify `modules` in order, collecting diagnostics from all of them.
    pub fn run(mut self, ast: &Ast, modules: &[ModuleId]) -> Result<VerifyReport, InternalError> {
        if self.checks.symbol_refs {
            self.declared = declared_symbols(ast);
        }
        let mut view = ast;
        let stats = run_modules(&mut self, &mut view, modules)?;
        Ok(VerifyReport {
            diagnostics: self.diagnostics,
            stats,
        })
    }

    fn report(&mut self, ast: &Ast, kind: DiagnosticKind, line: u32, node: impl Into<NodeRef>) {
        let Some(module) = self.ctx.module() else {
            return;
        };
        let file = ast
            .get_module(module)
            .map(|m| m.file.clone())
            .unwrap_or_default();
        self.diagnostics.push(Diagnostic {
            kind,
            module,
            file,
            line,
            node: node.into(),
        });
    }

    fn check_enclosing(
        &mut self,
        ast: &Ast,
        recorded: Option<StmtId>,
        line: u32,
        node: NodeRef,
    ) {
        let expected = self.ctx.enclosing_stmt();
        if self.checks.enclosing_stmt && recorded != expected {
            let kind = DiagnosticKind::EnclosingStmtMismatch { expected, recorded };
            self.report(ast, kind, line, node);
        }
    }

    fn check_parent_symbol(
        &mut self,
        ast: &Ast,
        recorded: Option<SymbolId>,
        line: u32,
        node: NodeRef,
    ) {
        let expected = self.ctx.enclosing_symbol();
        if self.checks.parent_symbol && recorded != expected {
            let kind = DiagnosticKind::ParentSymbolMismatch { expected, recorded };
            self.report(ast, kind, line, node);
        }
    }
}

/// Every symbol still declared by the program: module symbols, their
/// params and members, and locals declared anywhere in a reachable body.
/// References are resolved against all modules, not only the ones being
/// verified.
fn declared_symbols(ast: &Ast) -> FxHashSet<SymbolId> {
    let mut declared = FxHashSet::default();
    let mut seen = FxHashSet::default();
    let mut worklist: Vec<NodeRef> = Vec::new();
    for module in ast.module_ids() {
        worklist.extend(ast.module(module).symbols.iter().map(|&s| NodeRef::Symbol(s)));
    }

    while let Some(node) = worklist.pop() {
        if !seen.insert(node) {
            continue;
        }
        match node {
            NodeRef::Symbol(sym) => {
                let Some(symbol) = ast.get_symbol(sym) else {
                    continue;
                };
                if symbol.removed {
                    continue;
                }
                declared.insert(sym);
                let nested = symbol.nested_symbols().unwrap_or(&[]);
                worklist.extend(nested.iter().map(|&s| NodeRef::Symbol(s)));
                let body = symbol.body().unwrap_or(&[]);
                worklist.extend(body.iter().map(|&s| NodeRef::Stmt(s)));
            }
            NodeRef::Stmt(stmt) => {
                if let Some(sym) = ast.declared_symbol(stmt) {
                    worklist.push(NodeRef::Symbol(sym));
                }
                match ast.child_stmts(stmt) {
                    ChildStmts::None => {}
                    ChildStmts::List(list) => {
                        let children = ast.stmt_list(list).unwrap_or(&[]);
                        worklist.extend(children.iter().map(|&s| NodeRef::Stmt(s)));
                    }
                    ChildStmts::Slots(slots) => {
                        let children = slots.into_iter().filter_map(|slot| ast.stmt_at(slot));
                        worklist.extend(children.map(NodeRef::Stmt));
                    }
                }
            }
            NodeRef::Module(_) | NodeRef::Expr(_) => {}
        }
    }
    declared
}

impl<'a> Visitor<&'a Ast> for Verifier {
    fn pass_name(&self) -> &'static str {
        "fixup-verify"
    }

    fn pre_symbol(&mut self, ast: &mut &'a Ast, sym: SymbolId) -> HookResult {
        let ast = *ast;
        let symbol = ast.symbol(sym);
        let expected = self.ctx.owner_scope();
        if self.checks.symbol_scope && symbol.scope != expected {
            let kind = DiagnosticKind::ScopeMismatch {
                name: symbol.name.clone(),
                expected,
                recorded: symbol.scope,
            };
            self.report(ast, kind, symbol.line, sym);
        }
        self.ctx.enter_symbol(sym);
        Ok(())
    }

    fn post_symbol(&mut self, _ast: &mut &'a Ast, sym: SymbolId) -> HookResult {
        self.ctx.leave_symbol(sym)
    }

    fn pre_stmt(&mut self, ast: &mut &'a Ast, stmt: StmtId, _slot: StmtSlot) -> HookResult {
        let ast = *ast;
        let node = ast.stmt(stmt);
        self.check_enclosing(ast, node.parent_stmt, node.line, stmt.into());
        self.check_parent_symbol(ast, node.parent_symbol, node.line, stmt.into());
        self.ctx.enter_stmt(stmt);
        Ok(())
    }

    fn post_stmt(&mut self, _ast: &mut &'a Ast, stmt: StmtId) -> HookResult {
        self.ctx.leave_stmt(stmt)
    }

    fn pre_expr(&mut self, ast: &mut &'a Ast, expr: ExprId, _slot: ExprSlot) -> HookResult {
        let ast = *ast;
        if self.ctx.enclosing_stmt().is_none() {
            return Err(InternalErrorKind::HookOutOfOrder {
                hook: "pre_expr",
                detail: format!("{expr} visited outside any statement"),
            });
        }
        let node = ast.expr(expr);
        self.check_enclosing(ast, node.parent_stmt, node.line, expr.into());
        self.check_parent_symbol(ast, node.parent_symbol, node.line, expr.into());

        if let ExprKind::SymRef(sym) = node.kind {
            if self.checks.symbol_refs {
                match ast.get_symbol(sym) {
                    None => {
                        self.report(ast, DiagnosticKind::UnknownSymbol { sym }, node.line, expr);
                    }
                    Some(target) if target.removed || !self.declared.contains(&sym) => {
                        let kind = DiagnosticKind::RemovedSymbol {
                            name: target.name.clone(),
                        };
                        self.report(ast, kind, node.line, expr);
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

impl<'a> FixupPass<&'a Ast> for Verifier {
    fn context_mut(&mut self) -> &mut FixupContext {
        &mut self.ctx
    }
}
