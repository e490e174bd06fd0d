//! The AST node model walked by the weft passes.
//!
//! Upstream stages (parsing, resolution) build the tree; the middle-end only
//! reads and selectively rewrites it. Ownership is tree-shaped: every node
//! lives in one of the arenas of [`Ast`] and is owned by exactly one parent
//! slot. Back-references (`scope`, `parent_stmt`, `parent_symbol`) are plain
//! ids that never own anything; the fixup pass is responsible for keeping
//! them in sync with the owning edges.
//!
//! # Architecture
//!
//! - [`ids`]: `u32` newtype handles and [`NodeRef`]
//! - [`node`]: Module / Symbol / Stmt / Expr payloads
//! - [`slot`]: addressable child positions used for in-place rewriting
//! - [`ast`]: the arena itself plus construction and slot access
//! - [`pretty`]: indented pseudo-source rendering for dumps and tests

pub mod ast;
pub mod ids;
pub mod node;
pub mod pretty;
pub mod slot;

pub use ast::{Ast, ChildStmts};
pub use ids::{ExprId, ModuleId, NodeRef, StmtId, SymbolId};
pub use node::{BinOp, Expr, ExprKind, Module, Scope, Stmt, StmtKind, Symbol, SymbolKind};
pub use slot::{ExprOwner, ExprSlot, ListOwner, StmtSlot, SymbolListOwner};
