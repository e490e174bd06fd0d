//! The fixup pass.
//!
//! Fixup runs right before the later stages and comes in two named
//! configurations built on the same walk context:
//!
//! - [`Normalizer`] rewrites the tree into canonical shape and writes every
//!   back-reference (`scope`, `parent_stmt`, `parent_symbol`) from the walk.
//! - [`Verifier`] walks the tree read-only and reports every back-reference
//!   or symbol reference that disagrees with the walk as a [`Diagnostic`].
//!
//! Both keep a [`FixupContext`]: the enclosing-statement stack plus the chain
//! of scopes above the current node. The stack must be empty at every module
//! boundary and see exactly as many pops as pushes; anything else is a
//! defect in the pass and aborts with an [`InternalError`].
//!
//! [`Diagnostic`]: crate::diagnostics::Diagnostic

mod normalize;
mod verify;

use std::borrow::Borrow;

use weft_ast::{Ast, ModuleId, Scope, StmtId, SymbolId};

use crate::error::{InternalError, InternalErrorKind, TraversalStep};
use crate::traverse::{Traversal, TraversalStats, Visitor};

pub use normalize::{NormalizeReport, NormalizeRules, Normalizer};
pub use verify::{VerifyChecks, VerifyReport, Verifier};

// ── Enclosing-statement stack ──────────────────────────────────────────

/// Statements currently being visited, innermost last.
#[derive(Debug, Clone, Default)]
pub struct EnclosingStack {
    stmts: Vec<StmtId>,
    pushes: usize,
    pops: usize,
}

impl EnclosingStack {
    pub fn push(&mut self, stmt: StmtId) {
        self.stmts.push(stmt);
        self.pushes += 1;
    }

    /// Pop `stmt`, which must be the current top.
    pub fn pop(&mut self, stmt: StmtId) -> Result<(), InternalErrorKind> {
        match self.stmts.last() {
            Some(&top) if top == stmt => {
                self.stmts.pop();
                self.pops += 1;
                Ok(())
            }
            Some(&top) => Err(InternalErrorKind::unexpected_pop("post_stmt", stmt, Some(top))),
            None => Err(self.imbalance()),
        }
    }

    pub fn top(&self) -> Option<StmtId> {
        self.stmts.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.stmts.len()
    }

    pub fn pushes(&self) -> usize {
        self.pushes
    }

    pub fn pops(&self) -> usize {
        self.pops
    }

    pub fn is_balanced(&self) -> bool {
        self.stmts.is_empty() && self.pushes == self.pops
    }

    fn imbalance(&self) -> InternalErrorKind {
        InternalErrorKind::StackImbalance {
            depth: self.stmts.len(),
            pushes: self.pushes,
            pops: self.pops,
        }
    }
}

// ── Walk context ───────────────────────────────────────────────────────

/// Context shared by both fixup configurations.
///
/// `frames` holds every symbol and statement between the module and the
/// node being visited. The innermost frame is the declaring scope of a
/// symbol met at that point; the innermost symbol frame is the symbol whose
/// body contains the current statement.
#[derive(Debug, Clone, Default)]
pub struct FixupContext {
    module: Option<ModuleId>,
    stack: EnclosingStack,
    frames: Vec<Scope>,
}

impl FixupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a module. The stack must be empty and balanced.
    pub fn begin_module(&mut self, module: ModuleId) -> Result<(), InternalErrorKind> {
        if !self.stack.is_balanced() || !self.frames.is_empty() {
            return Err(self.stack.imbalance());
        }
        self.module = Some(module);
        self.stack = EnclosingStack::default();
        Ok(())
    }

    /// Finish the current module, checking that every push was popped.
    pub fn end_module(&mut self) -> Result<(), InternalErrorKind> {
        if !self.stack.is_balanced() || !self.frames.is_empty() {
            return Err(self.stack.imbalance());
        }
        self.module = None;
        Ok(())
    }

    pub fn module(&self) -> Option<ModuleId> {
        self.module
    }

    pub fn stack(&self) -> &EnclosingStack {
        &self.stack
    }

    pub fn enter_symbol(&mut self, sym: SymbolId) {
        self.frames.push(Scope::Symbol(sym));
    }

    pub fn leave_symbol(&mut self, sym: SymbolId) -> Result<(), InternalErrorKind> {
        match self.frames.last() {
            Some(&Scope::Symbol(top)) if top == sym => {
                self.frames.pop();
                Ok(())
            }
            other => Err(InternalErrorKind::HookOutOfOrder {
                hook: "post_symbol",
                detail: format!("expected to leave {sym}, innermost scope is {other:?}"),
            }),
        }
    }

    pub fn enter_stmt(&mut self, stmt: StmtId) {
        self.stack.push(stmt);
        self.frames.push(Scope::Stmt(stmt));
    }

    pub fn leave_stmt(&mut self, stmt: StmtId) -> Result<(), InternalErrorKind> {
        self.stack.pop(stmt)?;
        match self.frames.last() {
            Some(&Scope::Stmt(top)) if top == stmt => {
                self.frames.pop();
                Ok(())
            }
            other => Err(InternalErrorKind::HookOutOfOrder {
                hook: "post_stmt",
                detail: format!("expected to leave {stmt}, innermost scope is {other:?}"),
            }),
        }
    }

    /// The nearest enclosing statement, crossing symbol boundaries.
    pub fn enclosing_stmt(&self) -> Option<StmtId> {
        self.stack.top()
    }

    /// The nearest symbol whose body or member list contains the current node.
    pub fn enclosing_symbol(&self) -> Option<SymbolId> {
        self.frames.iter().rev().find_map(|frame| match *frame {
            Scope::Symbol(sym) => Some(sym),
            _ => None,
        })
    }

    /// The scope that declares a symbol met at this point of the walk.
    pub fn owner_scope(&self) -> Option<Scope> {
        match self.frames.last() {
            Some(&frame) => Some(frame),
            None => self.module.map(Scope::Module),
        }
    }
}

/// A fixup configuration: a visitor that carries a [`FixupContext`].
pub(crate) trait FixupPass<A: Borrow<Ast>>: Visitor<A> {
    fn context_mut(&mut self) -> &mut FixupContext;
}

/// Walk `modules` in order with one traversal, checking stack symmetry at
/// every module boundary.
pub(crate) fn run_modules<A, P>(
    pass: &mut P,
    ast: &mut A,
    modules: &[ModuleId],
) -> Result<TraversalStats, InternalError>
where
    A: Borrow<Ast>,
    P: FixupPass<A>,
{
    let name = Visitor::<A>::pass_name(&*pass);
    let mut traversal = Traversal::new();
    for &module in modules {
        let started = FixupPass::<A>::context_mut(pass).begin_module(module);
        started.map_err(|kind| InternalError::new(name, TraversalStep::Module, module, kind))?;

        traversal.traverse_module(pass, ast, module)?;

        let finished = FixupPass::<A>::context_mut(pass).end_module();
        finished.map_err(|kind| InternalError::new(name, TraversalStep::Module, module, kind))?;
    }
    Ok(traversal.stats())
}

/// Output of [`run`]: what normalization changed and what verification found.
#[derive(Debug, Clone, Default)]
pub struct FixupReport {
    pub normalize: NormalizeReport,
    pub verify: VerifyReport,
}

/// Normalize every module with the default rules.
pub fn normalize(ast: &mut Ast) -> Result<NormalizeReport, InternalError> {
    let modules: Vec<ModuleId> = ast.module_ids().collect();
    Normalizer::new(NormalizeRules::default()).run(ast, &modules)
}

/// Verify every module with all checks enabled.
pub fn verify(ast: &Ast) -> Result<VerifyReport, InternalError> {
    let modules: Vec<ModuleId> = ast.module_ids().collect();
    Verifier::new(VerifyChecks::all()).run(ast, &modules)
}

/// Normalize then verify every module, in declaration order.
pub fn run(ast: &mut Ast) -> Result<FixupReport, InternalError> {
    let normalize = normalize(ast)?;
    let verify = verify(ast)?;
    Ok(FixupReport { normalize, verify })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traverse::HookResult;
    use weft_ast::{ListOwner, NodeRef, StmtKind, StmtSlot, SymbolListOwner};

    /// Tracks the walk like the real passes, but pushes `leak` one extra
    /// time so it is still on the stack when its module ends.
    struct Leaky {
        ctx: FixupContext,
        leak: Option<StmtId>,
        symbols: Vec<SymbolId>,
    }

    impl Leaky {
        fn new(leak: Option<StmtId>) -> Self {
            Self {
                ctx: FixupContext::new(),
                leak,
                symbols: Vec::new(),
            }
        }
    }

    impl<'a> Visitor<&'a Ast> for Leaky {
        fn pre_symbol(&mut self, _ast: &mut &'a Ast, sym: SymbolId) -> HookResult {
            self.symbols.push(sym);
            self.ctx.enter_symbol(sym);
            Ok(())
        }

        fn post_symbol(&mut self, _ast: &mut &'a Ast, sym: SymbolId) -> HookResult {
            self.ctx.leave_symbol(sym)
        }

        fn pre_stmt(&mut self, _ast: &mut &'a Ast, stmt: StmtId, _slot: StmtSlot) -> HookResult {
            if self.leak == Some(stmt) {
                self.ctx.stack.push(stmt);
            }
            self.ctx.enter_stmt(stmt);
            Ok(())
        }

        fn post_stmt(&mut self, _ast: &mut &'a Ast, stmt: StmtId) -> HookResult {
            self.ctx.leave_stmt(stmt)
        }
    }

    impl<'a> FixupPass<&'a Ast> for Leaky {
        fn context_mut(&mut self) -> &mut FixupContext {
            &mut self.ctx
        }
    }

    /// Module `a`: `fn f() { return; }`. Module `b`: `fn g() { ; }`.
    fn two_modules() -> (Ast, [ModuleId; 2], [SymbolId; 2], StmtId) {
        let mut ast = Ast::new();
        let a = ast.add_module("a", "a.w");
        let f = ast.function(SymbolListOwner::Module(a), "f", 1);
        let ret = ast.alloc_stmt(StmtKind::Return(None), 2);
        ast.push_stmt(ListOwner::Body(f), ret);

        let b = ast.add_module("b", "b.w");
        let g = ast.function(SymbolListOwner::Module(b), "g", 1);
        let nop = ast.alloc_stmt(StmtKind::Nop, 2);
        ast.push_stmt(ListOwner::Body(g), nop);
        (ast, [a, b], [f, g], nop)
    }

    #[test]
    fn run_modules_walks_each_module_in_order() {
        let (ast, modules, symbols, _) = two_modules();
        let mut pass = Leaky::new(None);
        let mut view = &ast;
        let stats = run_modules(&mut pass, &mut view, &modules).unwrap();

        assert_eq!(stats.modules, 2);
        assert_eq!(stats.stmts, 2);
        assert_eq!(pass.symbols, symbols);
        assert!(pass.ctx.stack().is_balanced());
        assert_eq!(pass.ctx.module(), None);
    }

    #[test]
    fn run_modules_rejects_a_leak_at_the_module_boundary() {
        let (ast, [a, b], symbols, nop) = two_modules();
        let mut pass = Leaky::new(Some(nop));
        let mut view = &ast;
        let err = run_modules(&mut pass, &mut view, &[a, b]).unwrap_err();

        // `a` finished cleanly; `b` is blamed as a whole.
        assert_eq!(pass.symbols, symbols);
        assert_eq!(err.step, TraversalStep::Module);
        assert_eq!(err.node, NodeRef::Module(b));
        assert_eq!(
            err.kind,
            InternalErrorKind::StackImbalance {
                depth: 1,
                pushes: 2,
                pops: 1
            }
        );
    }

    #[test]
    fn stack_tracks_pushes_and_pops() {
        let mut stack = EnclosingStack::default();
        stack.push(StmtId(0));
        stack.push(StmtId(1));
        assert_eq!(stack.top(), Some(StmtId(1)));
        stack.pop(StmtId(1)).unwrap();
        stack.pop(StmtId(0)).unwrap();
        assert!(stack.is_balanced());
        assert_eq!((stack.pushes(), stack.pops()), (2, 2));
    }

    #[test]
    fn popping_the_wrong_statement_is_out_of_order() {
        let mut stack = EnclosingStack::default();
        stack.push(StmtId(0));
        let err = stack.pop(StmtId(5)).unwrap_err();
        assert!(matches!(err, InternalErrorKind::HookOutOfOrder { hook: "post_stmt", .. }));
    }

    #[test]
    fn popping_an_empty_stack_is_an_imbalance() {
        let mut stack = EnclosingStack::default();
        let err = stack.pop(StmtId(0)).unwrap_err();
        assert_eq!(
            err,
            InternalErrorKind::StackImbalance {
                depth: 0,
                pushes: 0,
                pops: 0
            }
        );
    }

    #[test]
    fn end_module_rejects_leftover_statements() {
        let mut ctx = FixupContext::new();
        ctx.begin_module(ModuleId(0)).unwrap();
        ctx.enter_stmt(StmtId(3));
        let err = ctx.end_module().unwrap_err();
        assert_eq!(
            err,
            InternalErrorKind::StackImbalance {
                depth: 1,
                pushes: 1,
                pops: 0
            }
        );
    }

    #[test]
    fn scopes_follow_the_frames() {
        let mut ctx = FixupContext::new();
        ctx.begin_module(ModuleId(0)).unwrap();
        assert_eq!(ctx.owner_scope(), Some(Scope::Module(ModuleId(0))));

        ctx.enter_symbol(SymbolId(1));
        assert_eq!(ctx.owner_scope(), Some(Scope::Symbol(SymbolId(1))));

        ctx.enter_stmt(StmtId(2));
        assert_eq!(ctx.owner_scope(), Some(Scope::Stmt(StmtId(2))));
        assert_eq!(ctx.enclosing_stmt(), Some(StmtId(2)));
        assert_eq!(ctx.enclosing_symbol(), Some(SymbolId(1)));

        assert!(ctx.leave_symbol(SymbolId(1)).is_err());
        ctx.leave_stmt(StmtId(2)).unwrap();
        ctx.leave_symbol(SymbolId(1)).unwrap();
        ctx.end_module().unwrap();
    }
}
