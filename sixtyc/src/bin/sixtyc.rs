//! A thin smoke-test binary for [`Pipeline::compile`].
//!
//! This workspace has no lexer or parser (`spec.md` section 1's Non-goals:
//! "no lexer/parser -- the pipeline starts from an already-built AST").
//! Rather than wire up a source-file CLI this binary has nothing to feed,
//! it hand-builds the border-color example from `spec.md` section 8 and
//! runs it through the pipeline, printing the emitted assembly and any
//! diagnostics -- useful for `cargo run -p sixtyc` during development,
//! not a release-facing command-line tool.

use sixtyc_ast::{DeclKind, Expr, ExprKind, Literal, Node, NodeIdGen, Param, StmtKind};
use sixtyc_diagnostics::Span;
use sixtyc_ir::Type;
use sixtyc::{CompilerOptions, Pipeline, TargetConfig};

fn lit(ids: &mut NodeIdGen, v: i64) -> Expr {
    Node::new(ids.next(), Span::synthetic(), ExprKind::Literal(Literal::Number(v)))
}

fn border_color_module() -> sixtyc_ast::Decl {
    let mut ids = NodeIdGen::new();
    let call = Node::new(
        ids.next(),
        Span::synthetic(),
        ExprKind::Call {
            callee: "poke".to_string(),
            args: vec![lit(&mut ids, 0xD020), lit(&mut ids, 1)],
        },
    );
    let body = vec![
        Node::new(ids.next(), Span::synthetic(), StmtKind::ExpressionStmt(call)),
        Node::new(ids.next(), Span::synthetic(), StmtKind::Return(None)),
    ];
    let main_fn = Node::new(
        ids.next(),
        Span::synthetic(),
        DeclKind::Function {
            name: "main".to_string(),
            params: Vec::<Param>::new(),
            return_type: Type::Void,
            body: Some(body),
            is_exported: true,
            is_callback: false,
        },
    );
    Node::new(
        ids.next(),
        Span::synthetic(),
        DeclKind::Module {
            name: "main".to_string(),
            decls: vec![main_fn],
        },
    )
}

fn main() {
    env_logger::init();

    let module = border_color_module();
    let pipeline = Pipeline::new(TargetConfig::c64(), CompilerOptions::default());
    let output = pipeline.compile(std::slice::from_ref(&module));

    for diagnostic in output.diagnostics.iter() {
        eprintln!("{:?}: {}", diagnostic.severity, diagnostic.message);
    }

    if let Some(asm) = &output.asm {
        println!("{}", output.text);
        eprintln!(
            "-- {} function(s), {} byte(s) code, {} byte(s) data",
            asm.stats.function_count, asm.stats.code_bytes, asm.stats.data_bytes
        );
    }

    std::process::exit(output.exit_code());
}
