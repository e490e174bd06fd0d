//! Addressable child positions.
//!
//! A slot names *where* a child lives rather than *which* child it is. Passes
//! that rewrite the tree write a new id into a slot; the traversal engine
//! re-reads slots after every hook so it always continues from the
//! post-rewrite structure.

use serde::Serialize;

use crate::ids::{ExprId, ModuleId, StmtId, SymbolId};

/// The node owning an expression slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExprOwner {
    Stmt(StmtId),
    Expr(ExprId),
}

/// The `index`-th expression child of `owner`, in source order.
///
/// For statements the only slot is the condition / value / initializer. For
/// expressions the order is: call callee then arguments, binary lhs then
/// rhs, assignment target then value, the inner expression of a paren.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ExprSlot {
    pub owner: ExprOwner,
    pub index: usize,
}

impl ExprSlot {
    pub fn new(owner: ExprOwner, index: usize) -> Self {
        Self { owner, index }
    }
}

/// An ordered list of statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ListOwner {
    /// The body of a function symbol.
    Body(SymbolId),
    /// The statements of a block.
    Block(StmtId),
}

/// The position of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StmtSlot {
    /// Entry `index` of a statement list, as of the moment it was read.
    List { owner: ListOwner, index: usize },
    /// Then branch of an `if`.
    Then(StmtId),
    /// Else branch of an `if`.
    Else(StmtId),
    /// Body of a `while`.
    Loop(StmtId),
}

impl StmtSlot {
    /// The list this slot belongs to, when it is a list entry.
    pub fn list_owner(&self) -> Option<ListOwner> {
        match *self {
            StmtSlot::List { owner, .. } => Some(owner),
            _ => None,
        }
    }
}

/// An ordered list of symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolListOwner {
    /// Symbols declared at module scope.
    Module(ModuleId),
    /// Parameters of a function or members of a type.
    Symbol(SymbolId),
}
