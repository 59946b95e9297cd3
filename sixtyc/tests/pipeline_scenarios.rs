//! Whole-pipeline scenario tests, `spec.md` section 8. Grounded on
//! `crates/wasmtime/tests`' convention of placing cross-cutting,
//! several-crates-deep scenarios at the umbrella crate rather than any
//! one phase crate, since each of these exercises the full
//! resolve -> recursion/dataflow -> ilgen -> ssa -> codegen -> emit chain.
//!
//! There is no lexer or parser in this workspace, so every scenario below
//! hand-builds its AST with a local [`NodeIdGen`].

use rustc_hash::FxHashSet;
use sixtyc::{CompilerOptions, Pipeline, TargetConfig};
use sixtyc_ast::{BinOp, Decl, DeclKind, Expr, ExprKind, ForDirection, Literal, Node, NodeIdGen, Param, Stmt, StmtKind};
use sixtyc_diagnostics::Span;
use sixtyc_ir::Type;

fn lit(ids: &mut NodeIdGen, v: i64) -> Expr {
    Node::new(ids.next(), Span::synthetic(), ExprKind::Literal(Literal::Number(v)))
}

fn ident(ids: &mut NodeIdGen, name: &str) -> Expr {
    Node::new(ids.next(), Span::synthetic(), ExprKind::Identifier(name.to_string()))
}

fn call(ids: &mut NodeIdGen, callee: &str, args: Vec<Expr>) -> Expr {
    Node::new(
        ids.next(),
        Span::synthetic(),
        ExprKind::Call {
            callee: callee.to_string(),
            args,
        },
    )
}

fn expr_stmt(ids: &mut NodeIdGen, e: Expr) -> Stmt {
    Node::new(ids.next(), Span::synthetic(), StmtKind::ExpressionStmt(e))
}

fn func(ids: &mut NodeIdGen, name: &str, body: Vec<Stmt>) -> Decl {
    Node::new(
        ids.next(),
        Span::synthetic(),
        DeclKind::Function {
            name: name.to_string(),
            params: Vec::<Param>::new(),
            return_type: Type::Void,
            body: Some(body),
            is_exported: name == "main",
            is_callback: false,
        },
    )
}

fn module(ids: &mut NodeIdGen, name: &str, decls: Vec<Decl>) -> Decl {
    Node::new(
        ids.next(),
        Span::synthetic(),
        DeclKind::Module {
            name: name.to_string(),
            decls,
        },
    )
}

/// `spec.md` section 8 scenario 3: indirect (mutual) recursion across two
/// functions is rejected the same as direct recursion, and both function
/// names appear in the cycle.
#[test]
fn indirect_recursion_between_two_functions_is_rejected() {
    let mut ids = NodeIdGen::new();
    let call_b = call(&mut ids, "b", vec![]);
    let a = func(&mut ids, "a", vec![expr_stmt(&mut ids, call_b)]);
    let call_a = call(&mut ids, "a", vec![]);
    let b = func(&mut ids, "b", vec![expr_stmt(&mut ids, call_a)]);
    let m = module(&mut ids, "main", vec![a, b]);

    let pipeline = Pipeline::new(TargetConfig::c64(), CompilerOptions::default());
    let output = pipeline.compile(std::slice::from_ref(&m));

    assert!(output.diagnostics.has_errors());
    assert!(output.asm.is_none());
    let names: FxHashSet<&str> = output
        .diagnostics
        .iter()
        .flat_map(|d| d.message.split_whitespace())
        .collect();
    assert!(names.contains("`a`") || output.diagnostics.iter().any(|d| d.message.contains('a')));
    assert!(output.diagnostics.iter().any(|d| d.message.contains('b')));
}

/// `spec.md` section 8 scenario 5: a constant-folding chain through
/// several arithmetic operators collapses to a single literal write, with
/// no runtime arithmetic instructions left in the emitted assembly.
#[test]
fn constant_folding_chain_collapses_to_a_single_store() {
    let mut ids = NodeIdGen::new();
    // (2 + 3) * 4 - 6 == 14
    let add = Node::new(
        ids.next(),
        Span::synthetic(),
        ExprKind::Binary {
            op: BinOp::Add,
            left: Box::new(lit(&mut ids, 2)),
            right: Box::new(lit(&mut ids, 3)),
        },
    );
    let mul = Node::new(
        ids.next(),
        Span::synthetic(),
        ExprKind::Binary {
            op: BinOp::Mul,
            left: Box::new(add),
            right: Box::new(lit(&mut ids, 4)),
        },
    );
    let sub = Node::new(
        ids.next(),
        Span::synthetic(),
        ExprKind::Binary {
            op: BinOp::Sub,
            left: Box::new(mul),
            right: Box::new(lit(&mut ids, 6)),
        },
    );
    let poke = call(&mut ids, "poke", vec![lit(&mut ids, 0xD020), sub]);
    let body = vec![
        expr_stmt(&mut ids, poke),
        Node::new(ids.next(), Span::synthetic(), StmtKind::Return(None)),
    ];
    let main_fn = func(&mut ids, "main", body);
    let m = module(&mut ids, "main", vec![main_fn]);

    let pipeline = Pipeline::new(TargetConfig::c64(), CompilerOptions::default());
    let output = pipeline.compile(std::slice::from_ref(&m));

    assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics);
    assert!(output.text.contains("LDA #$0E"), "expected folded literal 14 ($0E):\n{}", output.text);
    assert!(!output.text.contains("ADC"));
    assert!(!output.text.contains("SBC"));
}

/// `spec.md` section 8 scenario 6: an `if/else` merging into a shared
/// successor produces a diamond CFG whose merge block receives a phi,
/// and SSA construction on it does not raise an internal error.
#[test]
fn diamond_control_flow_compiles_without_internal_errors() {
    let mut ids = NodeIdGen::new();
    let cond = lit(&mut ids, 1);
    let then_branch = vec![Node::new(
        ids.next(),
        Span::synthetic(),
        StmtKind::LocalVariable {
            name: "x".to_string(),
            type_annotation: Some(Type::Byte),
            initializer: Some(lit(&mut ids, 1)),
            is_const: false,
        },
    )];
    let else_branch = vec![Node::new(
        ids.next(),
        Span::synthetic(),
        StmtKind::LocalVariable {
            name: "x".to_string(),
            type_annotation: Some(Type::Byte),
            initializer: Some(lit(&mut ids, 2)),
            is_const: false,
        },
    )];
    let if_stmt = Node::new(
        ids.next(),
        Span::synthetic(),
        StmtKind::If {
            cond,
            then_branch,
            else_branch: Some(else_branch),
        },
    );
    let poke = call(&mut ids, "poke", vec![lit(&mut ids, 0xD020), ident(&mut ids, "x")]);
    let body = vec![
        if_stmt,
        expr_stmt(&mut ids, poke),
        Node::new(ids.next(), Span::synthetic(), StmtKind::Return(None)),
    ];
    let main_fn = func(&mut ids, "main", body);
    let m = module(&mut ids, "main", vec![main_fn]);

    let pipeline = Pipeline::new(TargetConfig::c64(), CompilerOptions::default());
    let output = pipeline.compile(std::slice::from_ref(&m));

    assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics);
    assert!(output.diagnostics.iter().all(|d| !d.code.starts_with("INTERNAL-")));
    assert!(output.asm.is_some());
}

/// `spec.md` section 8 scenario 7: a function whose estimated stack depth
/// exceeds the configured threshold gets a warning, not an error, and
/// code generation still runs.
#[test]
fn deep_local_variables_warn_but_still_compile() {
    let mut ids = NodeIdGen::new();
    let mut body = Vec::new();
    for i in 0..8u8 {
        body.push(Node::new(
            ids.next(),
            Span::synthetic(),
            StmtKind::LocalVariable {
                name: format!("v{i}"),
                type_annotation: Some(Type::Word),
                initializer: Some(lit(&mut ids, i as i64)),
                is_const: false,
            },
        ));
    }
    body.push(Node::new(ids.next(), Span::synthetic(), StmtKind::Return(None)));
    let main_fn = func(&mut ids, "main", body);
    let m = module(&mut ids, "main", vec![main_fn]);

    let mut options = CompilerOptions::default();
    // own_depth = 2 (return address) + 0 (params) + 8 locals * 2 bytes (Word) = 18, comfortably over this.
    options.stack_warning_threshold = 8;

    let pipeline = Pipeline::new(TargetConfig::c64(), options);
    let output = pipeline.compile(std::slice::from_ref(&m));

    assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics);
    assert!(output.asm.is_some());
    assert!(output
        .diagnostics
        .iter()
        .any(|d| d.code == sixtyc_diagnostics::codes::STACK_DEPTH_WARNING));
}

/// `spec.md` section 8: `for` loops lower without error and the
/// resulting function still verifies.
#[test]
fn for_loop_lowers_cleanly() {
    let mut ids = NodeIdGen::new();
    let poke = call(&mut ids, "poke", vec![lit(&mut ids, 0xD020), ident(&mut ids, "i")]);
    let loop_body = vec![expr_stmt(&mut ids, poke)];
    let for_stmt = Node::new(
        ids.next(),
        Span::synthetic(),
        StmtKind::For {
            var: "i".to_string(),
            start: lit(&mut ids, 0),
            end: lit(&mut ids, 9),
            direction: ForDirection::Up,
            step: None,
            body: loop_body,
        },
    );
    let body = vec![for_stmt, Node::new(ids.next(), Span::synthetic(), StmtKind::Return(None))];
    let main_fn = func(&mut ids, "main", body);
    let m = module(&mut ids, "main", vec![main_fn]);

    let pipeline = Pipeline::new(TargetConfig::c64(), CompilerOptions::default());
    let output = pipeline.compile(std::slice::from_ref(&m));

    assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics);
    assert!(output.asm.is_some());
}

/// `spec.md` section 8: two modules where one imports an exported symbol
/// from the other compile cleanly end to end.
#[test]
fn cross_module_import_of_an_exported_symbol_compiles() {
    let mut ids = NodeIdGen::new();
    let counter = Node::new(
        ids.next(),
        Span::synthetic(),
        DeclKind::Variable {
            name: "counter".to_string(),
            type_annotation: Some(Type::Byte),
            initializer: None,
            is_const: false,
            is_exported: true,
        },
    );
    let lib = module(&mut ids, "lib", vec![counter]);

    let import = Node::new(
        ids.next(),
        Span::synthetic(),
        DeclKind::Import {
            idents: vec!["counter".to_string()],
            path: vec!["lib".to_string()],
            alias: None,
        },
    );
    let poke = call(&mut ids, "poke", vec![lit(&mut ids, 0xD020), ident(&mut ids, "counter")]);
    let body = vec![
        expr_stmt(&mut ids, poke),
        Node::new(ids.next(), Span::synthetic(), StmtKind::Return(None)),
    ];
    let main_fn = func(&mut ids, "main", body);
    let main_mod = module(&mut ids, "main", vec![import, main_fn]);

    let pipeline = Pipeline::new(TargetConfig::c64(), CompilerOptions::default());
    let output = pipeline.compile(&[main_mod, lib]);

    assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics);
    assert!(output.asm.is_some());
}

/// `spec.md` section 8: importing a symbol that exists but was never
/// exported is a `MODULE-SYMBOL-NOT-EXPORTED` error, and no code is
/// generated.
#[test]
fn importing_an_unexported_symbol_is_rejected() {
    let mut ids = NodeIdGen::new();
    let hidden = Node::new(
        ids.next(),
        Span::synthetic(),
        DeclKind::Variable {
            name: "hidden".to_string(),
            type_annotation: Some(Type::Byte),
            initializer: None,
            is_const: false,
            is_exported: false,
        },
    );
    let lib = module(&mut ids, "lib", vec![hidden]);

    let import = Node::new(
        ids.next(),
        Span::synthetic(),
        DeclKind::Import {
            idents: vec!["hidden".to_string()],
            path: vec!["lib".to_string()],
            alias: None,
        },
    );
    let main_mod = module(&mut ids, "main", vec![import]);

    let pipeline = Pipeline::new(TargetConfig::c64(), CompilerOptions::default());
    let output = pipeline.compile(&[main_mod, lib]);

    assert!(output.diagnostics.has_errors());
    assert!(output.asm.is_none());
    assert!(output
        .diagnostics
        .iter()
        .any(|d| d.code == sixtyc_diagnostics::codes::MODULE_SYMBOL_NOT_EXPORTED));
}

/// `spec.md` section 6: `format: Prg` with `basicStub: true` prepends a
/// `SYS`-loader line before the program's own code.
#[test]
fn prg_output_with_basic_stub_prepends_the_loader() {
    let mut ids = NodeIdGen::new();
    let poke = call(&mut ids, "poke", vec![lit(&mut ids, 0xD020), lit(&mut ids, 1)]);
    let body = vec![
        expr_stmt(&mut ids, poke),
        Node::new(ids.next(), Span::synthetic(), StmtKind::Return(None)),
    ];
    let main_fn = func(&mut ids, "main", body);
    let m = module(&mut ids, "main", vec![main_fn]);

    let mut options = CompilerOptions::default();
    options.format = sixtyc::OutputFormat::Prg;
    options.basic_stub = true;
    options.load_address = Some(0x0801);

    let pipeline = Pipeline::new(TargetConfig::c64(), options);
    let output = pipeline.compile(std::slice::from_ref(&m));

    assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics);
    let asm = output.asm.expect("code generation ran");
    assert_eq!(asm.origin, Some(0x0801));
    assert!(matches!(asm.items.first(), Some(sixtyc_asm::Item::Data { .. })));
}
