//! Integration tests for the traversal engine: visiting order, exactly-once
//! visits, continuation after rewrites and cycle detection.

use rustc_hash::FxHashMap;
use weft_ast::pretty::print_expr;
use weft_ast::{
    Ast, BinOp, ExprId, ExprSlot, ListOwner, ModuleId, NodeRef, StmtId, StmtKind, StmtSlot,
    SymbolId, SymbolKind, SymbolListOwner,
};
use weft_passes::{
    HookResult, InternalErrorKind, NormalizeRules, Normalizer, Traversal, TraversalStep, Visitor,
};

// ── Helpers ────────────────────────────────────────────────────────────

fn describe_stmt(ast: &Ast, stmt: StmtId) -> String {
    match &ast.stmt(stmt).kind {
        StmtKind::If { cond, .. } => format!("if {}", print_expr(ast, *cond)),
        StmtKind::While { cond, .. } => format!("while {}", print_expr(ast, *cond)),
        StmtKind::Expr(e) => format!("{};", print_expr(ast, *e)),
        StmtKind::Block(_) => "block".to_string(),
        StmtKind::Decl { sym, .. } => format!("var {}", ast.symbol(*sym).name),
        StmtKind::Return(_) => "return".to_string(),
        StmtKind::Nop => ";".to_string(),
    }
}

/// Forwards every hook to a [`Normalizer`] and records what it saw.
struct Recorder {
    inner: Normalizer,
    events: Vec<String>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            inner: Normalizer::new(NormalizeRules::default()),
            events: Vec::new(),
        }
    }

    fn enclosing(&self, ast: &Ast) -> String {
        match self.inner.context().enclosing_stmt() {
            Some(stmt) => describe_stmt(ast, stmt),
            None => "none".to_string(),
        }
    }
}

impl Visitor<Ast> for Recorder {
    fn pre_symbol(&mut self, ast: &mut Ast, sym: SymbolId) -> HookResult {
        self.inner.pre_symbol(ast, sym)?;
        self.events.push(format!("pre  symbol {}", ast.symbol(sym).name));
        Ok(())
    }

    fn post_symbol(&mut self, ast: &mut Ast, sym: SymbolId) -> HookResult {
        self.inner.post_symbol(ast, sym)?;
        self.events.push(format!("post symbol {}", ast.symbol(sym).name));
        Ok(())
    }

    fn pre_stmt(&mut self, ast: &mut Ast, stmt: StmtId, slot: StmtSlot) -> HookResult {
        self.inner.pre_stmt(ast, stmt, slot)?;
        self.events.push(format!("pre  stmt {}", describe_stmt(ast, stmt)));
        Ok(())
    }

    fn post_stmt(&mut self, ast: &mut Ast, stmt: StmtId) -> HookResult {
        self.inner.post_stmt(ast, stmt)?;
        self.events.push(format!("post stmt {}", describe_stmt(ast, stmt)));
        Ok(())
    }

    fn pre_expr(&mut self, ast: &mut Ast, expr: ExprId, slot: ExprSlot) -> HookResult {
        self.inner.pre_expr(ast, expr, slot)?;
        let enclosing = self.enclosing(ast);
        self.events.push(format!(
            "pre  expr {} (enclosing: {enclosing})",
            print_expr(ast, expr)
        ));
        Ok(())
    }

    fn post_expr(&mut self, ast: &mut Ast, expr: ExprId) -> HookResult {
        self.inner.post_expr(ast, expr)?;
        self.events.push(format!("post expr {}", print_expr(ast, expr)));
        Ok(())
    }
}

fn record(ast: &mut Ast, module: ModuleId) -> Vec<String> {
    let mut recorder = Recorder::new();
    let mut traversal = Traversal::new();
    recorder.inner.context_mut().begin_module(module).unwrap();
    traversal.traverse_module(&mut recorder, ast, module).unwrap();
    recorder.inner.context_mut().end_module().unwrap();
    recorder.events
}

/// `var x; var y; fn f() { if x { y = 1; } }`
fn if_program() -> (Ast, ModuleId) {
    let mut ast = Ast::new();
    let m = ast.add_module("main", "main.w");
    let x = ast.variable(SymbolListOwner::Module(m), "x", 1);
    let y = ast.variable(SymbolListOwner::Module(m), "y", 2);
    let f = ast.function(SymbolListOwner::Module(m), "f", 3);
    let cond = ast.sym_ref(x, 4);
    let target = ast.sym_ref(y, 5);
    let one = ast.int(1, 5);
    let assign = ast.assign(target, one, 5);
    let inner = ast.expr_stmt(assign, 5);
    let then_block = ast.block(vec![inner], 4);
    let if_stmt = ast.if_stmt(cond, then_block, None, 4);
    ast.push_stmt(ListOwner::Body(f), if_stmt);
    (ast, m)
}

/// Counts pre/post hook calls per node, in call order, without mutating.
#[derive(Default)]
struct Census {
    order: Vec<(&'static str, NodeRef)>,
}

impl Census {
    fn calls(&self, phase: &str, node: NodeRef) -> Vec<usize> {
        self.order
            .iter()
            .enumerate()
            .filter(|(_, (p, n))| *p == phase && *n == node)
            .map(|(i, _)| i)
            .collect()
    }
}

impl<'a> Visitor<&'a Ast> for Census {
    fn pre_symbol(&mut self, _ast: &mut &'a Ast, sym: SymbolId) -> HookResult {
        self.order.push(("pre", sym.into()));
        Ok(())
    }

    fn post_symbol(&mut self, _ast: &mut &'a Ast, sym: SymbolId) -> HookResult {
        self.order.push(("post", sym.into()));
        Ok(())
    }

    fn pre_stmt(&mut self, _ast: &mut &'a Ast, stmt: StmtId, _slot: StmtSlot) -> HookResult {
        self.order.push(("pre", stmt.into()));
        Ok(())
    }

    fn post_stmt(&mut self, _ast: &mut &'a Ast, stmt: StmtId) -> HookResult {
        self.order.push(("post", stmt.into()));
        Ok(())
    }

    fn pre_expr(&mut self, _ast: &mut &'a Ast, expr: ExprId, _slot: ExprSlot) -> HookResult {
        self.order.push(("pre", expr.into()));
        Ok(())
    }

    fn post_expr(&mut self, _ast: &mut &'a Ast, expr: ExprId) -> HookResult {
        self.order.push(("post", expr.into()));
        Ok(())
    }
}

/// Two modules exercising every statement kind, nested symbols, and a
/// function declared inside another function's body.
fn rich_program() -> Ast {
    let mut ast = Ast::new();

    let a = ast.add_module("a", "a.w");
    let counter = ast.variable(SymbolListOwner::Module(a), "counter", 1);
    let point = ast.declare(
        SymbolListOwner::Module(a),
        "Point",
        SymbolKind::Type { members: vec![] },
        2,
    );
    ast.declare(
        SymbolListOwner::Symbol(point),
        "x",
        SymbolKind::Variable {
            ty: Some("Int".into()),
        },
        3,
    );
    let step = ast.function(SymbolListOwner::Module(a), "step", 5);
    let n = ast.declare(
        SymbolListOwner::Symbol(step),
        "n",
        SymbolKind::Param {
            ty: Some("Int".into()),
        },
        5,
    );

    // var acc = n * 2;
    let acc = ast.alloc_symbol("acc", SymbolKind::Variable { ty: None }, 6);
    let n_ref = ast.sym_ref(n, 6);
    let two = ast.int(2, 6);
    let doubled = ast.binary(BinOp::Mul, n_ref, two, 6);
    let decl = ast.decl_stmt(acc, Some(doubled), 6);
    ast.push_stmt(ListOwner::Body(step), decl);

    // while counter < acc { counter = counter + 1; }
    let lhs = ast.sym_ref(counter, 7);
    let rhs = ast.sym_ref(acc, 7);
    let cond = ast.binary(BinOp::Lt, lhs, rhs, 7);
    let target = ast.sym_ref(counter, 8);
    let cur = ast.sym_ref(counter, 8);
    let one = ast.int(1, 8);
    let inc = ast.binary(BinOp::Add, cur, one, 8);
    let assign = ast.assign(target, inc, 8);
    let body_stmt = ast.expr_stmt(assign, 8);
    let body = ast.block(vec![body_stmt], 7);
    let while_stmt = ast.while_stmt(cond, body, 7);
    ast.push_stmt(ListOwner::Body(step), while_stmt);

    // fn helper() { return; }
    let helper = ast.alloc_symbol(
        "helper",
        SymbolKind::Function {
            params: vec![],
            ret: None,
            body: vec![],
        },
        10,
    );
    let ret = ast.alloc_stmt(StmtKind::Return(None), 11);
    ast.push_stmt(ListOwner::Body(helper), ret);
    let helper_decl = ast.decl_stmt(helper, None, 10);
    ast.push_stmt(ListOwner::Body(step), helper_decl);

    // return counter;
    let value = ast.sym_ref(counter, 13);
    let ret = ast.alloc_stmt(StmtKind::Return(Some(value)), 13);
    ast.push_stmt(ListOwner::Body(step), ret);

    let b = ast.add_module("b", "b.w");
    let main = ast.function(SymbolListOwner::Module(b), "main", 1);
    let callee = ast.sym_ref(step, 2);
    let arg = ast.int(3, 2);
    let call = ast.call(callee, vec![arg], 2);
    let call_stmt = ast.expr_stmt(call, 2);
    let nop = ast.alloc_stmt(StmtKind::Nop, 3);
    ast.push_stmt(ListOwner::Body(main), call_stmt);
    ast.push_stmt(ListOwner::Body(main), nop);

    ast
}

// ── Order ──────────────────────────────────────────────────────────────

#[test]
fn if_statement_trace() {
    let (mut ast, m) = if_program();
    let trace = record(&mut ast, m).join("\n");
    insta::assert_snapshot!(trace, @r"
    pre  symbol x
    post symbol x
    pre  symbol y
    post symbol y
    pre  symbol f
    pre  stmt if x
    pre  expr x (enclosing: if x)
    post expr x
    pre  stmt block
    pre  stmt y = 1;
    pre  expr y = 1 (enclosing: y = 1;)
    pre  expr y (enclosing: y = 1;)
    post expr y
    pre  expr 1 (enclosing: y = 1;)
    post expr 1
    post expr y = 1
    post stmt y = 1;
    post stmt block
    post stmt if x
    post symbol f
    ");
}

#[test]
fn expressions_before_child_statements() {
    // if a + b c1 else c2
    let mut ast = Ast::new();
    let m = ast.add_module("main", "main.w");
    let f = ast.function(SymbolListOwner::Module(m), "f", 1);
    let a = ast.int(1, 2);
    let b = ast.int(2, 2);
    let e1 = ast.binary(BinOp::Add, a, b, 2);
    let c1_expr = ast.int(3, 3);
    let c1 = ast.expr_stmt(c1_expr, 3);
    let c2_expr = ast.int(4, 4);
    let c2 = ast.expr_stmt(c2_expr, 4);
    let s = ast.if_stmt(e1, c1, Some(c2), 2);
    ast.push_stmt(ListOwner::Body(f), s);

    let mut census = Census::default();
    let mut view = &ast;
    Traversal::new()
        .traverse_stmt(
            &mut census,
            &mut view,
            StmtSlot::List {
                owner: ListOwner::Body(f),
                index: 0,
            },
        )
        .unwrap();

    let expected: Vec<(&str, NodeRef)> = vec![
        ("pre", s.into()),
        ("pre", e1.into()),
        ("pre", a.into()),
        ("post", a.into()),
        ("pre", b.into()),
        ("post", b.into()),
        ("post", e1.into()),
        ("pre", c1.into()),
        ("pre", c1_expr.into()),
        ("post", c1_expr.into()),
        ("post", c1.into()),
        ("pre", c2.into()),
        ("pre", c2_expr.into()),
        ("post", c2_expr.into()),
        ("post", c2.into()),
        ("post", s.into()),
    ];
    assert_eq!(census.order, expected);
}

// ── Exactly once ───────────────────────────────────────────────────────

#[test]
fn every_reachable_node_is_visited_once() {
    let ast = rich_program();
    let mut census = Census::default();
    let mut traversal = Traversal::new();
    let mut view = &ast;
    for module in ast.module_ids() {
        traversal.traverse_module(&mut census, &mut view, module).unwrap();
    }

    let stats = traversal.stats();
    assert_eq!(stats.modules, ast.module_count());
    assert_eq!(stats.symbols, ast.symbol_count());
    assert_eq!(stats.stmts, ast.stmt_count());
    assert_eq!(stats.exprs, ast.expr_count());

    let mut pre_counts: FxHashMap<NodeRef, usize> = FxHashMap::default();
    for (phase, node) in &census.order {
        if *phase == "pre" {
            *pre_counts.entry(*node).or_default() += 1;
        }
    }
    assert_eq!(
        pre_counts.len(),
        ast.symbol_count() + ast.stmt_count() + ast.expr_count()
    );
    for (&node, &count) in &pre_counts {
        assert_eq!(count, 1, "{node} pre-visited {count} times");
        let pre = census.calls("pre", node);
        let post = census.calls("post", node);
        assert_eq!(post.len(), 1, "{node} post-visited {} times", post.len());
        assert!(post[0] > pre[0], "{node}: post before pre");
    }
}

#[test]
fn shared_expression_is_fatal() {
    let mut ast = Ast::new();
    let m = ast.add_module("main", "main.w");
    let f = ast.function(SymbolListOwner::Module(m), "f", 1);
    let shared = ast.int(1, 2);
    let sum = ast.binary(BinOp::Add, shared, shared, 2);
    let stmt = ast.expr_stmt(sum, 2);
    ast.push_stmt(ListOwner::Body(f), stmt);

    let mut view = &ast;
    let err = Traversal::new()
        .traverse_module(&mut Census::default(), &mut view, m)
        .unwrap_err();
    assert_eq!(err.kind, InternalErrorKind::SharedNode);
    assert_eq!(err.node, NodeRef::Expr(shared));
    assert_eq!(err.step, TraversalStep::Expression);
}

// ── Rewrites during the walk ───────────────────────────────────────────

/// Inserts a marker before the first statement it sees and removes the
/// statement named `victim` when it sees `trigger`.
struct Editor {
    owner: ListOwner,
    trigger: StmtId,
    victim: StmtId,
    inserted: Option<StmtId>,
    seen: Vec<StmtId>,
}

impl Visitor<Ast> for Editor {
    fn pre_stmt(&mut self, ast: &mut Ast, stmt: StmtId, _slot: StmtSlot) -> HookResult {
        self.seen.push(stmt);
        if self.inserted.is_none() {
            let marker = ast.alloc_stmt(StmtKind::Nop, 0);
            ast.insert_stmt_before(self.owner, stmt, marker);
            self.inserted = Some(marker);
        }
        if stmt == self.trigger {
            ast.remove_stmt(self.owner, self.victim);
        }
        Ok(())
    }
}

#[test]
fn inserted_statements_are_visited_removed_ones_are_not() {
    let mut ast = Ast::new();
    let m = ast.add_module("main", "main.w");
    let f = ast.function(SymbolListOwner::Module(m), "f", 1);
    let first = ast.alloc_stmt(StmtKind::Return(None), 2);
    let second = ast.alloc_stmt(StmtKind::Return(None), 3);
    let third = ast.alloc_stmt(StmtKind::Return(None), 4);
    for stmt in [first, second, third] {
        ast.push_stmt(ListOwner::Body(f), stmt);
    }

    let mut editor = Editor {
        owner: ListOwner::Body(f),
        trigger: second,
        victim: third,
        inserted: None,
        seen: Vec::new(),
    };
    Traversal::new()
        .traverse_module(&mut editor, &mut ast, m)
        .unwrap();

    let marker = editor.inserted.unwrap();
    assert_eq!(editor.seen, vec![first, marker, second]);
    assert_eq!(
        ast.stmt_list(ListOwner::Body(f)).unwrap(),
        &[marker, first, second]
    );
}

/// Replaces every integer literal with its double, on entry.
#[derive(Default)]
struct Doubler {
    pre: Vec<ExprId>,
    post: Vec<ExprId>,
}

impl Visitor<Ast> for Doubler {
    fn pre_expr(&mut self, ast: &mut Ast, expr: ExprId, slot: ExprSlot) -> HookResult {
        self.pre.push(expr);
        if let weft_ast::ExprKind::Int(v) = ast.expr(expr).kind {
            if v < 100 {
                let doubled = ast.int(v * 100, ast.expr(expr).line);
                ast.set_expr_at(slot, doubled);
            }
        }
        Ok(())
    }

    fn post_expr(&mut self, _ast: &mut Ast, expr: ExprId) -> HookResult {
        self.post.push(expr);
        Ok(())
    }
}

#[test]
fn replaced_expression_continues_with_the_replacement() {
    let mut ast = Ast::new();
    let m = ast.add_module("main", "main.w");
    let f = ast.function(SymbolListOwner::Module(m), "f", 1);
    let lit = ast.int(7, 2);
    let stmt = ast.expr_stmt(lit, 2);
    ast.push_stmt(ListOwner::Body(f), stmt);

    let mut doubler = Doubler::default();
    Traversal::new()
        .traverse_module(&mut doubler, &mut ast, m)
        .unwrap();

    let replacement = match ast.stmt(stmt).kind {
        StmtKind::Expr(e) => e,
        _ => unreachable!(),
    };
    assert_ne!(replacement, lit);
    assert_eq!(doubler.pre, vec![lit, replacement]);
    // The replaced literal gets no post hook.
    assert_eq!(doubler.post, vec![replacement]);
    assert_eq!(print_expr(&ast, replacement), "700");
}

// ── Cycles ─────────────────────────────────────────────────────────────

#[test]
fn statement_listed_as_its_own_descendant_is_fatal() {
    // fn f() { if x { <the same if> } }
    let (mut ast, m) = if_program();
    let f = ast.module(m).symbols[2];
    let if_stmt = ast.stmt_list(ListOwner::Body(f)).unwrap()[0];
    let then_block = ast.stmt_at(StmtSlot::Then(if_stmt)).unwrap();
    ast.push_stmt(ListOwner::Block(then_block), if_stmt);

    let err = weft_passes::normalize(&mut ast).unwrap_err();
    assert_eq!(err.kind, InternalErrorKind::Cycle);
    assert_eq!(err.node, NodeRef::Stmt(if_stmt));
    assert_eq!(err.pass, "fixup-normalize");
    assert_eq!(err.step, TraversalStep::Statement);

    let err = weft_passes::verify(&ast).unwrap_err();
    assert_eq!(err.kind, InternalErrorKind::Cycle);
    assert_eq!(err.pass, "fixup-verify");
}

#[test]
fn expression_cycle_is_fatal() {
    let mut ast = Ast::new();
    let m = ast.add_module("main", "main.w");
    let f = ast.function(SymbolListOwner::Module(m), "f", 1);
    let placeholder = ast.int(0, 2);
    let paren = ast.paren(placeholder, 2);
    // (paren) now wraps itself.
    ast.set_expr_at(ExprSlot::new(weft_ast::ExprOwner::Expr(paren), 0), paren);
    let stmt = ast.expr_stmt(paren, 2);
    ast.push_stmt(ListOwner::Body(f), stmt);

    let mut view = &ast;
    let err = Traversal::new()
        .traverse_module(&mut Census::default(), &mut view, m)
        .unwrap_err();
    assert_eq!(err.kind, InternalErrorKind::Cycle);
    assert_eq!(err.node, NodeRef::Expr(paren));
}
