//! Dataflow analyses, `spec.md` section 4.5: constant propagation,
//! dead-code detection, loop analysis, and escape analysis with
//! stack-depth estimation. These run after symbol resolution
//! ([`crate::resolve`]) and before IL generation ([`crate::ilgen`]),
//! annotating [`sixtyc_ast::NodeMetadata`] in place in the fixed order
//! `spec.md` section 3 specifies.
//!
//! Unlike the IL-level passes in `sixtyc-ssa`, these operate directly on
//! the AST: see [`const_prop`]'s module doc for why a separate CFG isn't
//! needed for a language with no unstructured jumps.

pub mod const_prop;
pub mod dead_code;
pub mod escape;
pub mod loop_analysis;

pub use const_prop::ConstPropResult;
pub use dead_code::DeadCodeResult;
pub use escape::{compute_stack_depths, check_stack_depths, seed_globals, EscapeResult, FrameSize};
pub use loop_analysis::LoopInfo;

use rustc_hash::FxHashMap;
use sixtyc_ast::{Decl, DeclKind, Stmt};
use sixtyc_diagnostics::DiagnosticBag;

/// All four analyses' results for one function.
#[derive(Debug, Default)]
pub struct FunctionAnalysis {
    /// Constant propagation result.
    pub const_prop: ConstPropResult,
    /// Dead-code detection result.
    pub dead_code: DeadCodeResult,
    /// Loop analysis result.
    pub loops: Vec<LoopInfo>,
    /// Escape analysis result (locals and parameters only; merge with
    /// [`seed_globals`] for a whole-module escape set).
    pub escapes: EscapeResult,
}

/// Run the four per-function analyses over one function body, in the
/// fixed order `spec.md` section 3 requires: constant propagation first
/// (dead-code detection depends on its literal-condition folding), then
/// dead-code detection, then loop analysis and escape analysis (mutually
/// independent).
pub fn analyze_function(body: &[Stmt]) -> (FunctionAnalysis, DiagnosticBag) {
    let const_prop = const_prop::analyze_function(body);
    let (dead_code, diagnostics) = dead_code::analyze_function(body);
    let loops = loop_analysis::analyze_function(body);
    let escapes = escape::analyze_function(body);
    (
        FunctionAnalysis {
            const_prop,
            dead_code,
            loops,
            escapes,
        },
        diagnostics,
    )
}

/// Run dataflow analyses over every function in a module, then compute
/// whole-program stack depths over the resulting escape/call information.
/// `callees` maps function name to the names of functions it calls
/// directly (see [`crate::recursion::CallGraph`]).
pub fn analyze_module(
    module: &Decl,
    callees: &FxHashMap<String, Vec<String>>,
    warning_threshold: u32,
) -> (FxHashMap<String, FunctionAnalysis>, DiagnosticBag) {
    let mut analyses = FxHashMap::default();
    let mut diagnostics = DiagnosticBag::new();
    let mut frame_sizes = FxHashMap::default();
    let mut spans = FxHashMap::default();

    let DeclKind::Module { decls, .. } = &module.kind else {
        return (analyses, diagnostics);
    };

    let global_escapes = seed_globals(decls);

    for decl in decls {
        let DeclKind::Function {
            name, params, body, ..
        } = &decl.kind
        else {
            continue;
        };
        let Some(body) = body else { continue };

        let (mut analysis, fn_diagnostics) = analyze_function(body);
        diagnostics.extend(fn_diagnostics);
        for (name, reason) in &global_escapes.escapes {
            analysis.escapes.escapes.entry(name.clone()).or_insert(*reason);
        }

        let param_bytes: u32 = params.iter().map(|p| p.ty.size_in_bytes()).sum();
        let local_bytes: u32 = local_variable_bytes(body);
        frame_sizes.insert(
            name.clone(),
            FrameSize {
                params: param_bytes,
                locals: local_bytes,
            },
        );
        spans.insert(name.clone(), decl.span.clone());
        analyses.insert(name.clone(), analysis);
    }

    let depths = compute_stack_depths(&frame_sizes, callees);
    for decl in decls {
        if let DeclKind::Function { name, .. } = &decl.kind {
            if let Some(&depth) = depths.get(name) {
                decl.metadata_mut().stack_depth = Some(depth);
            }
        }
    }
    diagnostics.extend(check_stack_depths(&depths, &spans, warning_threshold));

    (analyses, diagnostics)
}

fn local_variable_bytes(body: &[Stmt]) -> u32 {
    use sixtyc_ast::StmtKind;
    let mut total = 0;
    for stmt in body {
        match &stmt.kind {
            StmtKind::LocalVariable {
                type_annotation, ..
            } => {
                if let Some(ty) = type_annotation {
                    total += ty.size_in_bytes();
                }
            }
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                total += local_variable_bytes(then_branch);
                if let Some(else_branch) = else_branch {
                    total += local_variable_bytes(else_branch);
                }
            }
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::For { body, .. } => {
                total += local_variable_bytes(body);
            }
            StmtKind::Switch { cases, default, .. } => {
                for case in cases {
                    total += local_variable_bytes(&case.body);
                }
                if let Some(default) = default {
                    total += local_variable_bytes(default);
                }
            }
            StmtKind::Block(stmts) => total += local_variable_bytes(stmts),
            StmtKind::ExpressionStmt(_)
            | StmtKind::Return(_)
            | StmtKind::Break
            | StmtKind::Continue => {}
        }
    }
    total
}
