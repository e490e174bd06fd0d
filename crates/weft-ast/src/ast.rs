//! The AST arena.
//!
//! All nodes of a program live in four `Vec`s owned by [`Ast`]. Replacing a
//! child is a constant-time write into its parent's slot; nothing is ever
//! freed, so an id handed out once stays valid (possibly detached) for the
//! life of the arena.

use serde::{Deserialize, Serialize};

use crate::ids::{ExprId, ModuleId, StmtId, SymbolId};
use crate::node::{BinOp, Expr, ExprKind, Module, Stmt, StmtKind, Symbol, SymbolKind};
use crate::slot::{ExprOwner, ExprSlot, ListOwner, StmtSlot, SymbolListOwner};

/// A whole program: every module plus the arenas their nodes live in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    modules: Vec<Module>,
    symbols: Vec<Symbol>,
    stmts: Vec<Stmt>,
    exprs: Vec<Expr>,
}

/// How the child statements of a statement are laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildStmts {
    None,
    /// A growable list (blocks).
    List(ListOwner),
    /// Fixed slots (`if` branches, `while` body). Empty slots read as `None`.
    Slots(Vec<StmtSlot>),
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Modules ────────────────────────────────────────────────────────

    /// Add an empty module and return its id. Ids are assigned in
    /// declaration order.
    pub fn add_module(&mut self, name: impl Into<String>, file: impl Into<String>) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(Module {
            name: name.into(),
            file: file.into(),
            source: None,
            symbols: Vec::new(),
        });
        id
    }

    /// All modules, in declaration order.
    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len() as u32).map(ModuleId)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn get_module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id.index())
    }

    /// # Panics
    ///
    /// Panics if `id` was not handed out by this arena.
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    // ── Symbols ────────────────────────────────────────────────────────

    /// Allocate a symbol without attaching it anywhere (e.g. for a
    /// declaration statement that is built afterwards).
    pub fn alloc_symbol(
        &mut self,
        name: impl Into<String>,
        kind: SymbolKind,
        line: u32,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol::new(name, kind, line));
        id
    }

    /// Allocate a symbol and append it to `owner`'s symbol list.
    ///
    /// # Panics
    ///
    /// Panics if `owner` is a symbol that cannot own nested symbols.
    pub fn declare(
        &mut self,
        owner: SymbolListOwner,
        name: impl Into<String>,
        kind: SymbolKind,
        line: u32,
    ) -> SymbolId {
        let id = self.alloc_symbol(name, kind, line);
        match owner {
            SymbolListOwner::Module(module) => self.modules[module.index()].symbols.push(id),
            SymbolListOwner::Symbol(parent) => match &mut self.symbols[parent.index()].kind {
                SymbolKind::Function { params, .. } => params.push(id),
                SymbolKind::Type { members } => members.push(id),
                _ => panic!("{parent} cannot own nested symbols"),
            },
        }
        id
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn get_symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    /// The symbol list of a module, or the params / members of a symbol.
    pub fn symbol_list(&self, owner: SymbolListOwner) -> Option<&[SymbolId]> {
        match owner {
            SymbolListOwner::Module(module) => {
                self.get_module(module).map(|m| m.symbols.as_slice())
            }
            SymbolListOwner::Symbol(sym) => self.get_symbol(sym)?.nested_symbols(),
        }
    }

    /// Delete a symbol the way an earlier pass would.
    ///
    /// The symbol is detached from every list that declares it and marked
    /// `removed`; a declaration statement for it degrades to `Nop`.
    /// References to it elsewhere are left dangling on purpose, which is
    /// exactly what verification is meant to catch.
    pub fn remove_symbol(&mut self, id: SymbolId) {
        let Some(sym) = self.symbols.get_mut(id.index()) else {
            return;
        };
        sym.removed = true;
        for module in &mut self.modules {
            module.symbols.retain(|&s| s != id);
        }
        for sym in &mut self.symbols {
            match &mut sym.kind {
                SymbolKind::Function { params, .. } => params.retain(|&s| s != id),
                SymbolKind::Type { members } => members.retain(|&s| s != id),
                _ => {}
            }
        }
        for stmt in &mut self.stmts {
            if matches!(stmt.kind, StmtKind::Decl { sym, .. } if sym == id) {
                stmt.kind = StmtKind::Nop;
            }
        }
    }

    // ── Statements ─────────────────────────────────────────────────────

    pub fn alloc_stmt(&mut self, kind: StmtKind, line: u32) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(Stmt::new(kind, line));
        id
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }

    pub fn get_stmt(&self, id: StmtId) -> Option<&Stmt> {
        self.stmts.get(id.index())
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id.index()]
    }

    pub fn stmt_list(&self, owner: ListOwner) -> Option<&[StmtId]> {
        match owner {
            ListOwner::Body(sym) => self.get_symbol(sym)?.body(),
            ListOwner::Block(block) => match &self.get_stmt(block)?.kind {
                StmtKind::Block(stmts) => Some(stmts),
                _ => None,
            },
        }
    }

    fn stmt_list_mut(&mut self, owner: ListOwner) -> Option<&mut Vec<StmtId>> {
        match owner {
            ListOwner::Body(sym) => match &mut self.symbols.get_mut(sym.index())?.kind {
                SymbolKind::Function { body, .. } => Some(body),
                _ => None,
            },
            ListOwner::Block(block) => match &mut self.stmts.get_mut(block.index())?.kind {
                StmtKind::Block(stmts) => Some(stmts),
                _ => None,
            },
        }
    }

    /// Append a statement to a function body or block.
    ///
    /// # Panics
    ///
    /// Panics if `owner` is not a function or not a block.
    pub fn push_stmt(&mut self, owner: ListOwner, stmt: StmtId) {
        match self.stmt_list_mut(owner) {
            Some(list) => list.push(stmt),
            None => panic!("{owner:?} does not own a statement list"),
        }
    }

    /// Insert `stmt` immediately before `anchor` in `owner`'s list.
    /// Returns false if the list does not exist or does not contain `anchor`.
    pub fn insert_stmt_before(&mut self, owner: ListOwner, anchor: StmtId, stmt: StmtId) -> bool {
        let Some(list) = self.stmt_list_mut(owner) else {
            return false;
        };
        let Some(pos) = list.iter().position(|&s| s == anchor) else {
            return false;
        };
        list.insert(pos, stmt);
        true
    }

    /// Detach `stmt` from `owner`'s list. Returns whether anything was removed.
    pub fn remove_stmt(&mut self, owner: ListOwner, stmt: StmtId) -> bool {
        let Some(list) = self.stmt_list_mut(owner) else {
            return false;
        };
        let before = list.len();
        list.retain(|&s| s != stmt);
        list.len() != before
    }

    pub fn stmt_at(&self, slot: StmtSlot) -> Option<StmtId> {
        match slot {
            StmtSlot::List { owner, index } => self.stmt_list(owner)?.get(index).copied(),
            StmtSlot::Then(stmt) => match &self.get_stmt(stmt)?.kind {
                StmtKind::If { then_branch, .. } => Some(*then_branch),
                _ => None,
            },
            StmtSlot::Else(stmt) => match &self.get_stmt(stmt)?.kind {
                StmtKind::If { else_branch, .. } => *else_branch,
                _ => None,
            },
            StmtSlot::Loop(stmt) => match &self.get_stmt(stmt)?.kind {
                StmtKind::While { body, .. } => Some(*body),
                _ => None,
            },
        }
    }

    /// Overwrite the statement stored in `slot`. Returns false if the slot
    /// does not exist.
    pub fn set_stmt_at(&mut self, slot: StmtSlot, new: StmtId) -> bool {
        match slot {
            StmtSlot::List { owner, index } => {
                match self.stmt_list_mut(owner).and_then(|list| list.get_mut(index)) {
                    Some(entry) => {
                        *entry = new;
                        true
                    }
                    None => false,
                }
            }
            StmtSlot::Then(stmt) | StmtSlot::Else(stmt) | StmtSlot::Loop(stmt) => {
                let Some(parent) = self.stmts.get_mut(stmt.index()) else {
                    return false;
                };
                match (&mut parent.kind, slot) {
                    (StmtKind::If { then_branch, .. }, StmtSlot::Then(_)) => *then_branch = new,
                    (StmtKind::If { else_branch, .. }, StmtSlot::Else(_)) => {
                        *else_branch = Some(new)
                    }
                    (StmtKind::While { body, .. }, StmtSlot::Loop(_)) => *body = new,
                    _ => return false,
                }
                true
            }
        }
    }

    pub fn child_stmts(&self, stmt: StmtId) -> ChildStmts {
        match self.get_stmt(stmt).map(|s| &s.kind) {
            Some(StmtKind::Block(_)) => ChildStmts::List(ListOwner::Block(stmt)),
            Some(StmtKind::If { .. }) => {
                ChildStmts::Slots(vec![StmtSlot::Then(stmt), StmtSlot::Else(stmt)])
            }
            Some(StmtKind::While { .. }) => ChildStmts::Slots(vec![StmtSlot::Loop(stmt)]),
            _ => ChildStmts::None,
        }
    }

    /// The symbol introduced by a declaration statement.
    pub fn declared_symbol(&self, stmt: StmtId) -> Option<SymbolId> {
        match &self.get_stmt(stmt)?.kind {
            StmtKind::Decl { sym, .. } => Some(*sym),
            _ => None,
        }
    }

    // ── Expressions ────────────────────────────────────────────────────

    pub fn alloc_expr(&mut self, kind: ExprKind, line: u32) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(Expr::new(kind, line));
        id
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn get_expr(&self, id: ExprId) -> Option<&Expr> {
        self.exprs.get(id.index())
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    /// Number of expression slots `owner` currently has.
    pub fn expr_slot_count(&self, owner: ExprOwner) -> usize {
        match owner {
            ExprOwner::Stmt(stmt) => match self.get_stmt(stmt).map(|s| &s.kind) {
                Some(StmtKind::Expr(_) | StmtKind::If { .. } | StmtKind::While { .. }) => 1,
                Some(StmtKind::Decl { init: Some(_), .. } | StmtKind::Return(Some(_))) => 1,
                _ => 0,
            },
            ExprOwner::Expr(expr) => match self.get_expr(expr).map(|e| &e.kind) {
                Some(ExprKind::Call { args, .. }) => 1 + args.len(),
                Some(ExprKind::Binary { .. } | ExprKind::Assign { .. }) => 2,
                Some(ExprKind::Paren(_)) => 1,
                _ => 0,
            },
        }
    }

    pub fn expr_at(&self, slot: ExprSlot) -> Option<ExprId> {
        match slot.owner {
            ExprOwner::Stmt(stmt) => {
                if slot.index != 0 {
                    return None;
                }
                match &self.get_stmt(stmt)?.kind {
                    StmtKind::Expr(e) => Some(*e),
                    StmtKind::Decl { init, .. } => *init,
                    StmtKind::If { cond, .. } | StmtKind::While { cond, .. } => Some(*cond),
                    StmtKind::Return(value) => *value,
                    _ => None,
                }
            }
            ExprOwner::Expr(expr) => match (&self.get_expr(expr)?.kind, slot.index) {
                (ExprKind::Call { callee, .. }, 0) => Some(*callee),
                (ExprKind::Call { args, .. }, i) => args.get(i - 1).copied(),
                (ExprKind::Binary { lhs, .. }, 0) => Some(*lhs),
                (ExprKind::Binary { rhs, .. }, 1) => Some(*rhs),
                (ExprKind::Assign { target, .. }, 0) => Some(*target),
                (ExprKind::Assign { value, .. }, 1) => Some(*value),
                (ExprKind::Paren(inner), 0) => Some(*inner),
                _ => None,
            },
        }
    }

    fn expr_slot_mut(&mut self, slot: ExprSlot) -> Option<&mut ExprId> {
        match slot.owner {
            ExprOwner::Stmt(stmt) => {
                if slot.index != 0 {
                    return None;
                }
                match &mut self.stmts.get_mut(stmt.index())?.kind {
                    StmtKind::Expr(e) => Some(e),
                    StmtKind::Decl { init, .. } => init.as_mut(),
                    StmtKind::If { cond, .. } | StmtKind::While { cond, .. } => Some(cond),
                    StmtKind::Return(value) => value.as_mut(),
                    _ => None,
                }
            }
            ExprOwner::Expr(expr) => match (&mut self.exprs.get_mut(expr.index())?.kind, slot.index) {
                (ExprKind::Call { callee, .. }, 0) => Some(callee),
                (ExprKind::Call { args, .. }, i) => args.get_mut(i - 1),
                (ExprKind::Binary { lhs, .. }, 0) => Some(lhs),
                (ExprKind::Binary { rhs, .. }, 1) => Some(rhs),
                (ExprKind::Assign { target, .. }, 0) => Some(target),
                (ExprKind::Assign { value, .. }, 1) => Some(value),
                (ExprKind::Paren(inner), 0) => Some(inner),
                _ => None,
            },
        }
    }

    /// Overwrite the expression stored in `slot`. Returns false if the slot
    /// does not exist.
    pub fn set_expr_at(&mut self, slot: ExprSlot, new: ExprId) -> bool {
        match self.expr_slot_mut(slot) {
            Some(entry) => {
                *entry = new;
                true
            }
            None => false,
        }
    }

    /// The expressions currently stored in `owner`'s slots, in slot order.
    pub fn sub_exprs(&self, owner: ExprOwner) -> Vec<ExprId> {
        (0..self.expr_slot_count(owner))
            .filter_map(|index| self.expr_at(ExprSlot::new(owner, index)))
            .collect()
    }

    // ── Convenience constructors ───────────────────────────────────────

    pub fn function(&mut self, owner: SymbolListOwner, name: impl Into<String>, line: u32) -> SymbolId {
        self.declare(
            owner,
            name,
            SymbolKind::Function {
                params: Vec::new(),
                ret: None,
                body: Vec::new(),
            },
            line,
        )
    }

    pub fn variable(&mut self, owner: SymbolListOwner, name: impl Into<String>, line: u32) -> SymbolId {
        self.declare(owner, name, SymbolKind::Variable { ty: None }, line)
    }

    pub fn int(&mut self, value: i64, line: u32) -> ExprId {
        self.alloc_expr(ExprKind::Int(value), line)
    }

    pub fn sym_ref(&mut self, sym: SymbolId, line: u32) -> ExprId {
        self.alloc_expr(ExprKind::SymRef(sym), line)
    }

    pub fn call(&mut self, callee: ExprId, args: Vec<ExprId>, line: u32) -> ExprId {
        self.alloc_expr(ExprKind::Call { callee, args }, line)
    }

    pub fn binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId, line: u32) -> ExprId {
        self.alloc_expr(ExprKind::Binary { op, lhs, rhs }, line)
    }

    pub fn assign(&mut self, target: ExprId, value: ExprId, line: u32) -> ExprId {
        self.alloc_expr(ExprKind::Assign { target, value }, line)
    }

    pub fn paren(&mut self, inner: ExprId, line: u32) -> ExprId {
        self.alloc_expr(ExprKind::Paren(inner), line)
    }

    pub fn expr_stmt(&mut self, expr: ExprId, line: u32) -> StmtId {
        self.alloc_stmt(StmtKind::Expr(expr), line)
    }

    pub fn block(&mut self, stmts: Vec<StmtId>, line: u32) -> StmtId {
        self.alloc_stmt(StmtKind::Block(stmts), line)
    }

    pub fn if_stmt(
        &mut self,
        cond: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
        line: u32,
    ) -> StmtId {
        self.alloc_stmt(
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            line,
        )
    }

    pub fn while_stmt(&mut self, cond: ExprId, body: StmtId, line: u32) -> StmtId {
        self.alloc_stmt(StmtKind::While { cond, body }, line)
    }

    pub fn decl_stmt(&mut self, sym: SymbolId, init: Option<ExprId>, line: u32) -> StmtId {
        self.alloc_stmt(StmtKind::Decl { sym, init }, line)
    }
}
