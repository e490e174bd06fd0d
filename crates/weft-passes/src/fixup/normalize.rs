//! Normalization: the rewriting configuration of fixup.

use rustc_hash::FxHashSet;
use weft_ast::{
    Ast, ChildStmts, ExprId, ExprKind, ExprOwner, ExprSlot, ModuleId, StmtId, StmtKind, StmtSlot,
    SymbolId, SymbolKind,
};

use super::{run_modules, FixupContext, FixupPass};
use crate::error::{InternalError, InternalErrorKind};
use crate::traverse::{HookResult, TraversalStats, Visitor};

/// Which rewrites the normalizer applies. Back-references are always
/// written; they are not a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeRules {
    /// Wrap `if` / `while` bodies that are not blocks in a block.
    pub wrap_branches: bool,
    /// Move a call used as an `if` condition, parenthesized or not, into a
    /// temporary declared right before the `if`.
    pub hoist_call_conditions: bool,
    /// Replace `(e)` with `e`.
    pub flatten_parens: bool,
    /// Remove empty statements from statement lists.
    pub drop_nops: bool,
}

impl Default for NormalizeRules {
    fn default() -> Self {
        Self {
            wrap_branches: true,
            hoist_call_conditions: true,
            flatten_parens: true,
            drop_nops: true,
        }
    }
}

impl NormalizeRules {
    /// Only fix back-references.
    pub fn none() -> Self {
        Self {
            wrap_branches: false,
            hoist_call_conditions: false,
            flatten_parens: false,
            drop_nops: false,
        }
    }
}

/// What a normalization run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub wrapped_branches: usize,
    pub hoisted_temps: usize,
    pub flattened_parens: usize,
    pub dropped_nops: usize,
    pub stats: TraversalStats,
}

impl NormalizeReport {
    pub fn rewrites(&self) -> usize {
        self.wrapped_branches + self.hoisted_temps + self.flattened_parens + self.dropped_nops
    }
}

/// The rewriting fixup configuration.
#[derive(Debug, Default)]
pub struct Normalizer {
    rules: NormalizeRules,
    ctx: FixupContext,
    report: NormalizeReport,
    next_temp: usize,
}

impl Normalizer {
    pub fn new(rules: NormalizeRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn context(&self) -> &FixupContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut FixupContext {
        &mut self.ctx
    }

    /// Normalize `modules` in order.
    pub fn run(mut self, ast: &mut Ast, modules: &[ModuleId]) -> Result<NormalizeReport, InternalError> {
        let stats = run_modules(&mut self, ast, modules)?;
        self.report.stats = stats;
        Ok(self.report)
    }

    fn wrap_branches(&mut self, ast: &mut Ast, stmt: StmtId) {
        let ChildStmts::Slots(slots) = ast.child_stmts(stmt) else {
            return;
        };
        for slot in slots {
            let Some(branch) = ast.stmt_at(slot) else {
                continue;
            };
            let line = match ast.get_stmt(branch) {
                Some(branch) if !branch.is_block() => branch.line,
                _ => continue,
            };
            let block = ast.block(vec![branch], line);
            if ast.set_stmt_at(slot, block) {
                self.report.wrapped_branches += 1;
            }
        }
    }

    fn hoist_condition(&mut self, ast: &mut Ast, stmt: StmtId, slot: StmtSlot) {
        let Some(owner) = slot.list_owner() else {
            return;
        };
        let cond = match &ast.stmt(stmt).kind {
            StmtKind::If { cond, .. } => *cond,
            _ => return,
        };
        let is_call = strip_parens(ast, cond)
            .is_some_and(|inner| matches!(ast.expr(inner).kind, ExprKind::Call { .. }));
        if !is_call {
            return;
        }
        if !ast.stmt_list(owner).is_some_and(|list| list.contains(&stmt)) {
            return;
        }

        let line = ast.stmt(stmt).line;
        let name = format!("_t{}", self.next_temp);
        self.next_temp += 1;
        let temp = ast.alloc_symbol(name, SymbolKind::Variable { ty: None }, line);
        let decl = ast.decl_stmt(temp, Some(cond), line);
        ast.insert_stmt_before(owner, stmt, decl);
        let reference = ast.sym_ref(temp, line);
        ast.set_expr_at(ExprSlot::new(ExprOwner::Stmt(stmt), 0), reference);
        self.report.hoisted_temps += 1;
    }
}

/// The expression under any number of `Paren` layers. `None` if an id is
/// dangling or the layers loop; the walk reports those itself.
fn strip_parens(ast: &Ast, expr: ExprId) -> Option<ExprId> {
    let mut seen = FxHashSet::default();
    let mut current = expr;
    while seen.insert(current) {
        match ast.get_expr(current)?.kind {
            ExprKind::Paren(inner) => current = inner,
            _ => return Some(current),
        }
    }
    None
}

impl Visitor<Ast> for Normalizer {
    fn pass_name(&self) -> &'static str {
        "fixup-normalize"
    }

    fn pre_symbol(&mut self, ast: &mut Ast, sym: SymbolId) -> HookResult {
        ast.symbol_mut(sym).scope = self.ctx.owner_scope();
        self.ctx.enter_symbol(sym);
        Ok(())
    }

    fn post_symbol(&mut self, _ast: &mut Ast, sym: SymbolId) -> HookResult {
        self.ctx.leave_symbol(sym)
    }

    fn pre_stmt(&mut self, ast: &mut Ast, stmt: StmtId, slot: StmtSlot) -> HookResult {
        let node = ast.stmt_mut(stmt);
        node.parent_stmt = self.ctx.enclosing_stmt();
        node.parent_symbol = self.ctx.enclosing_symbol();
        let is_nop = matches!(node.kind, StmtKind::Nop);

        if self.rules.drop_nops && is_nop {
            if let Some(owner) = slot.list_owner() {
                if ast.remove_stmt(owner, stmt) {
                    self.report.dropped_nops += 1;
                }
            }
        }
        if self.rules.wrap_branches {
            self.wrap_branches(ast, stmt);
        }
        if self.rules.hoist_call_conditions {
            self.hoist_condition(ast, stmt, slot);
        }

        self.ctx.enter_stmt(stmt);
        Ok(())
    }

    fn post_stmt(&mut self, _ast: &mut Ast, stmt: StmtId) -> HookResult {
        self.ctx.leave_stmt(stmt)
    }

    fn pre_expr(&mut self, ast: &mut Ast, expr: ExprId, slot: ExprSlot) -> HookResult {
        let Some(top) = self.ctx.enclosing_stmt() else {
            return Err(InternalErrorKind::HookOutOfOrder {
                hook: "pre_expr",
                detail: format!("{expr} visited outside any statement"),
            });
        };

        if self.rules.flatten_parens {
            let inner = match ast.expr(expr).kind {
                ExprKind::Paren(inner) => Some(inner),
                _ => None,
            };
            if let Some(inner) = inner {
                if ast.set_expr_at(slot, inner) {
                    self.report.flattened_parens += 1;
                    return Ok(());
                }
            }
        }

        let node = ast.expr_mut(expr);
        node.parent_stmt = Some(top);
        node.parent_symbol = self.ctx.enclosing_symbol();
        Ok(())
    }
}

impl FixupPass<Ast> for Normalizer {
    fn context_mut(&mut self) -> &mut FixupContext {
        &mut self.ctx
    }
}
