//! Internal (defect-level) errors.
//!
//! These never describe a problem in the user's program. They mean an
//! earlier pass, or the engine itself, broke a structural invariant, and
//! compilation must stop right away. User-level problems are
//! [`crate::diagnostics::Diagnostic`]s instead.

use std::fmt;

use serde::Serialize;
use weft_ast::{NodeRef, StmtId};

/// Which part of the walk was running when an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TraversalStep {
    Module,
    Symbol,
    Statement,
    Expression,
}

impl fmt::Display for TraversalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TraversalStep::Module => "module",
            TraversalStep::Symbol => "symbol",
            TraversalStep::Statement => "statement",
            TraversalStep::Expression => "expression",
        };
        f.write_str(name)
    }
}

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalErrorKind {
    /// The node is reachable from itself through owned-child edges.
    Cycle,
    /// The node is owned by two parents (reached twice, not on one path).
    SharedNode,
    /// An id points past the end of its arena.
    MissingNode,
    /// The enclosing-statement stack was not empty at a module boundary, or
    /// pushes and pops did not match.
    StackImbalance {
        depth: usize,
        pushes: usize,
        pops: usize,
    },
    /// A hook ran at a point where the walk context makes no sense for it.
    HookOutOfOrder { hook: &'static str, detail: String },
}

impl fmt::Display for InternalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle => write!(f, "cycle detected: node is its own ancestor"),
            Self::SharedNode => write!(f, "node is owned by more than one parent"),
            Self::MissingNode => write!(f, "node id does not exist in the AST"),
            Self::StackImbalance {
                depth,
                pushes,
                pops,
            } => write!(
                f,
                "enclosing-statement stack imbalance: depth {depth}, {pushes} pushes, {pops} pops"
            ),
            Self::HookOutOfOrder { hook, detail } => {
                write!(f, "`{hook}` invoked out of order: {detail}")
            }
        }
    }
}

impl InternalErrorKind {
    pub(crate) fn unexpected_pop(hook: &'static str, expected: StmtId, found: Option<StmtId>) -> Self {
        let found = match found {
            Some(stmt) => stmt.to_string(),
            None => "an empty stack".to_string(),
        };
        Self::HookOutOfOrder {
            hook,
            detail: format!("expected to leave {expected}, found {found}"),
        }
    }
}

/// A fatal internal error with the full context needed to find the defect:
/// which pass, which traversal step, which node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalError {
    pub pass: &'static str,
    pub step: TraversalStep,
    pub node: NodeRef,
    pub kind: InternalErrorKind,
}

impl InternalError {
    pub fn new(
        pass: &'static str,
        step: TraversalStep,
        node: impl Into<NodeRef>,
        kind: InternalErrorKind,
    ) -> Self {
        Self {
            pass,
            step,
            node: node.into(),
            kind,
        }
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pass `{}`, {} step, at {}: {}",
            self.pass, self.step, self.node, self.kind
        )
    }
}

impl std::error::Error for InternalError {}
