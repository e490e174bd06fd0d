//! Node handles.
//!
//! Ids are indices into the arenas of [`crate::Ast`]. They are assigned
//! sequentially starting from 0 and are never reused, so a removed node
//! keeps its id (and its tombstone) for the life of the tree.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! node_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, " #{}"), self.0)
            }
        }
    };
}

node_id!(
    /// A top-level compilation unit.
    ModuleId,
    "module"
);
node_id!(
    /// A declared entity: variable, parameter, function or type.
    SymbolId,
    "symbol"
);
node_id!(
    /// An executable statement.
    StmtId,
    "statement"
);
node_id!(
    /// A value-producing expression.
    ExprId,
    "expression"
);

/// Any node of the tree, used where a pass has to name "the offending node"
/// without caring about its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeRef {
    Module(ModuleId),
    Symbol(SymbolId),
    Stmt(StmtId),
    Expr(ExprId),
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Module(id) => fmt::Display::fmt(id, f),
            NodeRef::Symbol(id) => fmt::Display::fmt(id, f),
            NodeRef::Stmt(id) => fmt::Display::fmt(id, f),
            NodeRef::Expr(id) => fmt::Display::fmt(id, f),
        }
    }
}

impl From<ModuleId> for NodeRef {
    fn from(id: ModuleId) -> Self {
        NodeRef::Module(id)
    }
}

impl From<SymbolId> for NodeRef {
    fn from(id: SymbolId) -> Self {
        NodeRef::Symbol(id)
    }
}

impl From<StmtId> for NodeRef {
    fn from(id: StmtId) -> Self {
        NodeRef::Stmt(id)
    }
}

impl From<ExprId> for NodeRef {
    fn from(id: ExprId) -> Self {
        NodeRef::Expr(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_category() {
        assert_eq!(StmtId(4).to_string(), "statement #4");
        assert_eq!(NodeRef::from(ExprId(7)).to_string(), "expression #7");
        assert_eq!(NodeRef::Module(ModuleId(0)).to_string(), "module #0");
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&SymbolId(3)).unwrap();
        assert_eq!(json, "3");
        let back: SymbolId = serde_json::from_str("3").unwrap();
        assert_eq!(back, SymbolId(3));
    }
}
