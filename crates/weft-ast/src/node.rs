//! Node payloads stored in the [`crate::Ast`] arenas.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ExprId, ModuleId, StmtId, SymbolId};

/// A top-level compilation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// Path of the source file, used to attribute diagnostics.
    pub file: String,
    /// Original source text, when the producer kept it around. Only used to
    /// render diagnostics with a source excerpt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Symbols declared at module scope, in declaration order.
    pub symbols: Vec<SymbolId>,
}

/// Where a symbol is declared: directly in a module, nested inside another
/// symbol (a parameter of a function, a member of a type), or by a
/// declaration statement inside a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Module(ModuleId),
    Symbol(SymbolId),
    Stmt(StmtId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Module(id) => write!(f, "{id}"),
            Scope::Symbol(id) => write!(f, "{id}"),
            Scope::Stmt(id) => write!(f, "{id}"),
        }
    }
}

/// A named declared entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub line: u32,
    pub kind: SymbolKind,
    /// Back-reference to the declaring scope. Written by the fixup pass.
    #[serde(default)]
    pub scope: Option<Scope>,
    /// Set when an earlier pass deleted the symbol. The slot stays in the
    /// arena so stale references can still be reported by name.
    #[serde(default)]
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SymbolKind {
    Variable {
        ty: Option<String>,
    },
    Param {
        ty: Option<String>,
    },
    Function {
        params: Vec<SymbolId>,
        ret: Option<String>,
        body: Vec<StmtId>,
    },
    Type {
        members: Vec<SymbolId>,
    },
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, line: u32) -> Self {
        Self {
            name: name.into(),
            line,
            kind,
            scope: None,
            removed: false,
        }
    }

    pub fn declares_type(&self) -> bool {
        matches!(self.kind, SymbolKind::Type { .. })
    }

    pub fn declares_value(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Variable { .. } | SymbolKind::Param { .. } | SymbolKind::Function { .. }
        )
    }

    /// Whether the symbol owns nested symbols or a body of statements.
    pub fn declares_scope(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Function { .. } | SymbolKind::Type { .. }
        )
    }

    /// The statement body, for symbols that have one.
    pub fn body(&self) -> Option<&[StmtId]> {
        match &self.kind {
            SymbolKind::Function { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Parameters of a function or members of a type.
    pub fn nested_symbols(&self) -> Option<&[SymbolId]> {
        match &self.kind {
            SymbolKind::Function { params, .. } => Some(params),
            SymbolKind::Type { members } => Some(members),
            _ => None,
        }
    }

    /// Short keyword used by dumps and diagnostics.
    pub fn keyword(&self) -> &'static str {
        match self.kind {
            SymbolKind::Variable { .. } => "var",
            SymbolKind::Param { .. } => "param",
            SymbolKind::Function { .. } => "fn",
            SymbolKind::Type { .. } => "type",
        }
    }
}

/// An executable statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
    /// Nearest enclosing statement. Written by the fixup pass.
    #[serde(default)]
    pub parent_stmt: Option<StmtId>,
    /// Symbol whose body (transitively) contains this statement.
    #[serde(default)]
    pub parent_symbol: Option<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// A bare expression evaluated for its effect.
    Expr(ExprId),
    /// Declares a local symbol, optionally with an initializer.
    Decl {
        sym: SymbolId,
        init: Option<ExprId>,
    },
    Block(Vec<StmtId>),
    If {
        cond: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    While {
        cond: ExprId,
        body: StmtId,
    },
    Return(Option<ExprId>),
    /// An empty statement.
    Nop,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: u32) -> Self {
        Self {
            kind,
            line,
            parent_stmt: None,
            parent_symbol: None,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self.kind, StmtKind::Block(_))
    }
}

/// A value-producing expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: u32,
    /// Nearest enclosing statement. Written by the fixup pass.
    #[serde(default)]
    pub parent_stmt: Option<StmtId>,
    #[serde(default)]
    pub parent_symbol: Option<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Int(i64),
    Bool(bool),
    Str(String),
    /// A resolved, non-owning reference to a symbol declared elsewhere.
    SymRef(SymbolId),
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    Binary {
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Assign {
        target: ExprId,
        value: ExprId,
    },
    Paren(ExprId),
}

impl Expr {
    pub fn new(kind: ExprKind, line: u32) -> Self {
        Self {
            kind,
            line,
            parent_stmt: None,
            parent_symbol: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
