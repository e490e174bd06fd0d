//! The generic traversal engine.
//!
//! [`Traversal`] owns the one canonical depth-first order over a program:
//!
//! ```text
//! module     -> declared symbols, in declaration order
//! symbol     -> pre_symbol, nested symbols (params / members), body, post_symbol
//! statement  -> pre_stmt, owned expressions, declared symbol, child statements, post_stmt
//! expression -> pre_expr, sub-expressions left to right, post_expr
//! ```
//!
//! Passes implement [`Visitor`] and override only the hooks they need; the
//! rest default to no-ops. The engine itself never mutates the tree. A pass
//! that rewrites implements `Visitor<Ast>` and gets `&mut Ast` in its hooks;
//! a pass that only observes implements `Visitor<&Ast>` and cannot mutate.
//!
//! Rewrites are picked up as the walk goes: every child position is
//! re-read after the previous child finished, so anything not yet visited
//! is seen in its post-rewrite shape. Statements inserted into a list at or
//! after the walk's cursor are visited when the cursor reaches them;
//! statements removed before that are skipped. An expression replaced by
//! its own `pre_expr` hook is abandoned (no children, no `post_expr`) and
//! the walk continues with whatever now occupies its slot.
//!
//! Each node is visited at most once per [`Traversal`]. Reaching a node that
//! is still on the current path means the tree has a cycle; reaching one that
//! was visited earlier means two parents share it. Both abort with an
//! [`InternalError`].

use std::borrow::Borrow;
use std::hash::Hash;

use rustc_hash::FxHashSet;
use weft_ast::{
    Ast, ChildStmts, ExprId, ExprOwner, ExprSlot, ListOwner, ModuleId, NodeRef, StmtId,
    StmtSlot, SymbolId, SymbolListOwner,
};

use crate::error::{InternalError, InternalErrorKind, TraversalStep};

/// Result of a single hook. The engine attaches pass, step and node.
pub type HookResult = Result<(), InternalErrorKind>;

/// Pre/post hooks for each node category.
///
/// `A` is how the tree is handed to the hooks: `Ast` for passes that
/// rewrite, `&Ast` for passes that only look.
pub trait Visitor<A: Borrow<Ast>> {
    /// Name used in internal-error reports.
    fn pass_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn pre_symbol(&mut self, _ast: &mut A, _sym: SymbolId) -> HookResult {
        Ok(())
    }

    fn post_symbol(&mut self, _ast: &mut A, _sym: SymbolId) -> HookResult {
        Ok(())
    }

    /// Called on entry to a statement, before any of its children.
    /// `slot` is where the statement currently lives.
    fn pre_stmt(&mut self, _ast: &mut A, _stmt: StmtId, _slot: StmtSlot) -> HookResult {
        Ok(())
    }

    fn post_stmt(&mut self, _ast: &mut A, _stmt: StmtId) -> HookResult {
        Ok(())
    }

    /// Called on entry to an expression. Writing a different expression into
    /// `slot` replaces this one for the rest of the walk.
    fn pre_expr(&mut self, _ast: &mut A, _expr: ExprId, _slot: ExprSlot) -> HookResult {
        Ok(())
    }

    /// Called after all sub-expressions were visited.
    fn post_expr(&mut self, _ast: &mut A, _expr: ExprId) -> HookResult {
        Ok(())
    }
}

/// Number of nodes visited per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub modules: usize,
    pub symbols: usize,
    pub stmts: usize,
    pub exprs: usize,
}

impl TraversalStats {
    pub fn total(&self) -> usize {
        self.modules + self.symbols + self.stmts + self.exprs
    }

    fn count(&mut self, step: TraversalStep) {
        match step {
            TraversalStep::Module => self.modules += 1,
            TraversalStep::Symbol => self.symbols += 1,
            TraversalStep::Statement => self.stmts += 1,
            TraversalStep::Expression => self.exprs += 1,
        }
    }
}

/// Walk state for one traversal: the current root-to-node path and every
/// node visited so far.
#[derive(Debug, Default)]
pub struct Traversal {
    on_path: FxHashSet<NodeRef>,
    visited: FxHashSet<NodeRef>,
    stats: TraversalStats,
}

fn tree<A: Borrow<Ast>>(ast: &A) -> &Ast {
    ast.borrow()
}

impl Traversal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> TraversalStats {
        self.stats
    }

    /// Whether `node` was already visited by this traversal.
    pub fn has_visited(&self, node: impl Into<NodeRef>) -> bool {
        self.visited.contains(&node.into())
    }

    /// Visit the symbols declared by `module`, in declaration order.
    pub fn traverse_module<A, V>(
        &mut self,
        visitor: &mut V,
        ast: &mut A,
        module: ModuleId,
    ) -> Result<(), InternalError>
    where
        A: Borrow<Ast>,
        V: Visitor<A> + ?Sized,
    {
        let pass = Visitor::<A>::pass_name(&*visitor);
        let node = NodeRef::Module(module);
        let step = TraversalStep::Module;
        if tree(ast).get_module(module).is_none() {
            return Err(fail(pass, step, node, InternalErrorKind::MissingNode));
        }
        self.enter(pass, step, node)?;
        self.traverse_symbol_list(visitor, ast, SymbolListOwner::Module(module))?;
        self.leave(node);
        Ok(())
    }

    /// Visit one symbol: hooks around its nested symbols and body.
    pub fn traverse_symbol<A, V>(
        &mut self,
        visitor: &mut V,
        ast: &mut A,
        sym: SymbolId,
    ) -> Result<(), InternalError>
    where
        A: Borrow<Ast>,
        V: Visitor<A> + ?Sized,
    {
        let pass = Visitor::<A>::pass_name(&*visitor);
        let node = NodeRef::Symbol(sym);
        let step = TraversalStep::Symbol;
        if tree(ast).get_symbol(sym).is_none() {
            return Err(fail(pass, step, node, InternalErrorKind::MissingNode));
        }
        self.enter(pass, step, node)?;

        let result = visitor.pre_symbol(ast, sym);
        check(pass, step, node, result)?;

        self.traverse_symbol_list(visitor, ast, SymbolListOwner::Symbol(sym))?;
        self.traverse_stmt_list(visitor, ast, ListOwner::Body(sym))?;

        let result = visitor.post_symbol(ast, sym);
        check(pass, step, node, result)?;

        self.leave(node);
        Ok(())
    }

    /// Visit the statement currently stored in `slot`, if any.
    pub fn traverse_stmt<A, V>(
        &mut self,
        visitor: &mut V,
        ast: &mut A,
        slot: StmtSlot,
    ) -> Result<(), InternalError>
    where
        A: Borrow<Ast>,
        V: Visitor<A> + ?Sized,
    {
        let pass = Visitor::<A>::pass_name(&*visitor);
        let Some(stmt) = tree(ast).stmt_at(slot) else {
            return Ok(());
        };
        let node = NodeRef::Stmt(stmt);
        let step = TraversalStep::Statement;
        if tree(ast).get_stmt(stmt).is_none() {
            return Err(fail(pass, step, node, InternalErrorKind::MissingNode));
        }
        self.enter(pass, step, node)?;

        let result = visitor.pre_stmt(ast, stmt, slot);
        check(pass, step, node, result)?;

        // Owned expressions first, so their rewrites are committed before
        // any nested block is entered.
        let owner = ExprOwner::Stmt(stmt);
        let mut index = 0;
        while index < tree(ast).expr_slot_count(owner) {
            self.traverse_expr(visitor, ast, ExprSlot::new(owner, index))?;
            index += 1;
        }

        let declared = tree(ast).declared_symbol(stmt);
        if let Some(sym) = declared {
            self.traverse_symbol(visitor, ast, sym)?;
        }

        let children = tree(ast).child_stmts(stmt);
        match children {
            ChildStmts::None => {}
            ChildStmts::List(list) => self.traverse_stmt_list(visitor, ast, list)?,
            ChildStmts::Slots(slots) => {
                for child in slots {
                    self.traverse_stmt(visitor, ast, child)?;
                }
            }
        }

        let result = visitor.post_stmt(ast, stmt);
        check(pass, step, node, result)?;

        self.leave(node);
        Ok(())
    }

    /// Visit the expression currently stored in `slot`, if any.
    pub fn traverse_expr<A, V>(
        &mut self,
        visitor: &mut V,
        ast: &mut A,
        slot: ExprSlot,
    ) -> Result<(), InternalError>
    where
        A: Borrow<Ast>,
        V: Visitor<A> + ?Sized,
    {
        let pass = Visitor::<A>::pass_name(&*visitor);
        let step = TraversalStep::Expression;
        let Some(mut expr) = tree(ast).expr_at(slot) else {
            return Ok(());
        };

        loop {
            let node = NodeRef::Expr(expr);
            if tree(ast).get_expr(expr).is_none() {
                return Err(fail(pass, step, node, InternalErrorKind::MissingNode));
            }
            self.enter(pass, step, node)?;

            let result = visitor.pre_expr(ast, expr, slot);
            check(pass, step, node, result)?;

            let current = tree(ast).expr_at(slot);
            match current {
                Some(current) if current == expr => break,
                Some(replacement) if !self.has_visited(replacement) => {
                    self.leave(node);
                    expr = replacement;
                }
                _ => {
                    self.leave(node);
                    return Ok(());
                }
            }
        }

        let node = NodeRef::Expr(expr);
        let owner = ExprOwner::Expr(expr);
        let mut index = 0;
        while index < tree(ast).expr_slot_count(owner) {
            self.traverse_expr(visitor, ast, ExprSlot::new(owner, index))?;
            index += 1;
        }

        let result = visitor.post_expr(ast, expr);
        check(pass, step, node, result)?;

        self.leave(node);
        Ok(())
    }

    fn traverse_symbol_list<A, V>(
        &mut self,
        visitor: &mut V,
        ast: &mut A,
        owner: SymbolListOwner,
    ) -> Result<(), InternalError>
    where
        A: Borrow<Ast>,
        V: Visitor<A> + ?Sized,
    {
        let pass = Visitor::<A>::pass_name(&*visitor);
        if let Some(dup) = tree(ast).symbol_list(owner).and_then(first_duplicate) {
            let kind = InternalErrorKind::SharedNode;
            return Err(fail(pass, TraversalStep::Symbol, NodeRef::Symbol(dup), kind));
        }
        let mut cursor = ListCursor::default();
        loop {
            let next = cursor.next(tree(ast).symbol_list(owner));
            let Some(sym) = next else {
                break;
            };
            self.traverse_symbol(visitor, ast, sym)?;
        }
        Ok(())
    }

    fn traverse_stmt_list<A, V>(
        &mut self,
        visitor: &mut V,
        ast: &mut A,
        owner: ListOwner,
    ) -> Result<(), InternalError>
    where
        A: Borrow<Ast>,
        V: Visitor<A> + ?Sized,
    {
        let pass = Visitor::<A>::pass_name(&*visitor);
        if let Some(dup) = tree(ast).stmt_list(owner).and_then(first_duplicate) {
            let kind = InternalErrorKind::SharedNode;
            return Err(fail(pass, TraversalStep::Statement, NodeRef::Stmt(dup), kind));
        }
        let mut cursor = ListCursor::default();
        loop {
            let next = cursor.next_indexed(tree(ast).stmt_list(owner));
            let Some((index, _)) = next else {
                break;
            };
            self.traverse_stmt(visitor, ast, StmtSlot::List { owner, index })?;
        }
        Ok(())
    }

    fn enter(&mut self, pass: &'static str, step: TraversalStep, node: NodeRef) -> Result<(), InternalError> {
        if self.on_path.contains(&node) {
            return Err(fail(pass, step, node, InternalErrorKind::Cycle));
        }
        if !self.visited.insert(node) {
            return Err(fail(pass, step, node, InternalErrorKind::SharedNode));
        }
        self.on_path.insert(node);
        self.stats.count(step);
        Ok(())
    }

    fn leave(&mut self, node: NodeRef) {
        self.on_path.remove(&node);
    }
}

/// Cursor over a list that may change between steps.
///
/// Everything before `low` has already been handed out. Each step skips
/// entries handed out earlier (they may have shifted right because of an
/// insertion) and returns the first fresh one.
#[derive(Debug)]
struct ListCursor<T> {
    low: usize,
    seen: FxHashSet<T>,
}

impl<T> Default for ListCursor<T> {
    fn default() -> Self {
        Self {
            low: 0,
            seen: FxHashSet::default(),
        }
    }
}

impl<T: Copy + Eq + Hash> ListCursor<T> {
    fn next_indexed(&mut self, list: Option<&[T]>) -> Option<(usize, T)> {
        let list = list?;
        while self.low < list.len() && self.seen.contains(&list[self.low]) {
            self.low += 1;
        }
        let item = *list.get(self.low)?;
        self.seen.insert(item);
        Some((self.low, item))
    }

    fn next(&mut self, list: Option<&[T]>) -> Option<T> {
        self.next_indexed(list).map(|(_, item)| item)
    }
}

fn first_duplicate<T: Copy + Eq + Hash>(list: &[T]) -> Option<T> {
    let mut seen = FxHashSet::default();
    list.iter().copied().find(|item| !seen.insert(*item))
}

fn fail(pass: &'static str, step: TraversalStep, node: NodeRef, kind: InternalErrorKind) -> InternalError {
    InternalError::new(pass, step, node, kind)
}

fn check(pass: &'static str, step: TraversalStep, node: NodeRef, result: HookResult) -> Result<(), InternalError> {
    result.map_err(|kind| fail(pass, step, node, kind))
}
