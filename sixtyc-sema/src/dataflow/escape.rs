//! Escape analysis and 6502 stack-depth estimation, `spec.md` section 4.5.
//!
//! Escape analysis walks a function body looking for the four ways a
//! local/parameter can leave its defining frame: passed as a call
//! argument, returned, stored into a global, or address-taken. Globals
//! themselves always escape by definition (`spec.md`'s "Design notes");
//! callers should seed [`EscapeResult`] with every global name already
//! mapped to `StoredGlobally` before merging in a function's own locals.
//!
//! Stack-depth estimation is a separate, whole-program fixpoint: each
//! function's contribution is `2 (return address) + params + locals +
//! max(callee depths)`, iterated over the call graph until it stops
//! changing (bounded by the function count, since depths only grow).

use rustc_hash::FxHashMap;
use sixtyc_ast::{Decl, DeclKind, EscapeReason, Expr, ExprKind, Stmt, StmtKind};
use sixtyc_diagnostics::{codes, Diagnostic, DiagnosticBag, Span};

/// Default stack-depth warning threshold in bytes, `spec.md` section 4.5.
pub const DEFAULT_STACK_WARNING_THRESHOLD: u32 = 200;

/// The 6502 hardware stack is a fixed 256-byte page; exceeding it is
/// always an error regardless of configured threshold.
pub const STACK_HARD_LIMIT: u32 = 256;

/// Output of escape analysis over one function body.
#[derive(Debug, Default)]
pub struct EscapeResult {
    /// Variable name -> the first reason it was found to escape.
    pub escapes: FxHashMap<String, EscapeReason>,
}

/// Run escape analysis over one function body.
pub fn analyze_function(body: &[Stmt]) -> EscapeResult {
    let mut result = EscapeResult::default();
    for stmt in body {
        walk_stmt(stmt, &mut result);
    }
    result
}

fn escape(result: &mut EscapeResult, name: &str, reason: EscapeReason) {
    result.escapes.entry(name.to_string()).or_insert(reason);
}

fn walk_stmt(stmt: &Stmt, result: &mut EscapeResult) {
    match &stmt.kind {
        StmtKind::ExpressionStmt(e) => walk_expr(e, result),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            walk_expr(cond, result);
            for s in then_branch {
                walk_stmt(s, result);
            }
            if let Some(else_branch) = else_branch {
                for s in else_branch {
                    walk_stmt(s, result);
                }
            }
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            walk_expr(cond, result);
            for s in body {
                walk_stmt(s, result);
            }
        }
        StmtKind::For {
            start, end, step, body, ..
        } => {
            walk_expr(start, result);
            walk_expr(end, result);
            if let Some(step) = step {
                walk_expr(step, result);
            }
            for s in body {
                walk_stmt(s, result);
            }
        }
        StmtKind::Switch {
            value,
            cases,
            default,
        } => {
            walk_expr(value, result);
            for case in cases {
                for s in &case.body {
                    walk_stmt(s, result);
                }
            }
            if let Some(default) = default {
                for s in default {
                    walk_stmt(s, result);
                }
            }
        }
        StmtKind::Return(Some(value)) => {
            if let ExprKind::Identifier(name) = &value.kind {
                escape(result, name, EscapeReason::ReturnedFromFunction);
            }
            walk_expr(value, result);
        }
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => {}
        StmtKind::Block(stmts) => {
            for s in stmts {
                walk_stmt(s, result);
            }
        }
        StmtKind::LocalVariable { initializer, .. } => {
            if let Some(init) = initializer {
                walk_expr(init, result);
            }
        }
    }
}

fn walk_expr(expr: &Expr, result: &mut EscapeResult) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Identifier(_) => {}
        ExprKind::Binary { left, right, .. } => {
            walk_expr(left, result);
            walk_expr(right, result);
        }
        ExprKind::Unary { op, operand } => {
            if matches!(op, sixtyc_ast::UnaryOp::AddressOf) {
                if let ExprKind::Identifier(name) = &operand.kind {
                    escape(result, name, EscapeReason::AddressTaken);
                }
            }
            walk_expr(operand, result);
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                if let ExprKind::Identifier(name) = &arg.kind {
                    escape(result, name, EscapeReason::PassedToFunction);
                }
                walk_expr(arg, result);
            }
        }
        ExprKind::Index { object, index } => {
            walk_expr(object, result);
            walk_expr(index, result);
        }
        ExprKind::Member { object, .. } => walk_expr(object, result),
        ExprKind::Assignment { target, value, .. } => {
            walk_expr(value, result);
            walk_expr(target, result);
        }
    }
}

/// Mark every module-level global name as always-escaping before folding
/// in each function's own locals, per `spec.md`'s "globals always escape"
/// rule.
pub fn seed_globals(decls: &[Decl]) -> EscapeResult {
    let mut result = EscapeResult::default();
    for decl in decls {
        if let DeclKind::Variable { name, .. } = &decl.kind {
            escape(&mut result, name, EscapeReason::StoredGlobally);
        }
    }
    result
}

/// One function's fixed byte cost, independent of its callees: parameter
/// bytes plus local-variable bytes.
#[derive(Debug, Clone, Copy)]
pub struct FrameSize {
    /// Bytes occupied by parameters.
    pub params: u32,
    /// Bytes occupied by local variables.
    pub locals: u32,
}

impl FrameSize {
    /// Fixed per-call overhead: the 2-byte return address the 6502
    /// pushes for `JSR`.
    pub const CALL_OVERHEAD: u32 = 2;

    fn own_depth(&self) -> u32 {
        Self::CALL_OVERHEAD + self.params + self.locals
    }
}

/// Compute each function's worst-case stack depth by fixpoint iteration
/// over the call graph: `depth(f) = ownDepth(f) + max(depth(callee))`.
pub fn compute_stack_depths(
    frame_sizes: &FxHashMap<String, FrameSize>,
    callees: &FxHashMap<String, Vec<String>>,
) -> FxHashMap<String, u32> {
    let mut depths: FxHashMap<String, u32> = frame_sizes
        .iter()
        .map(|(name, size)| (name.clone(), size.own_depth()))
        .collect();
    for _ in 0..frame_sizes.len().max(1) {
        let mut changed = false;
        for (name, size) in frame_sizes {
            let max_callee = callees
                .get(name)
                .into_iter()
                .flatten()
                .filter_map(|callee| depths.get(callee))
                .copied()
                .max()
                .unwrap_or(0);
            let new_depth = size.own_depth() + max_callee;
            let entry = depths.entry(name.clone()).or_insert(0);
            if new_depth != *entry {
                *entry = new_depth;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    depths
}

/// Check computed stack depths against the hard 256-byte limit and a
/// configurable warning threshold, producing one diagnostic per function
/// that crosses either.
pub fn check_stack_depths(
    depths: &FxHashMap<String, u32>,
    spans: &FxHashMap<String, Span>,
    warning_threshold: u32,
) -> DiagnosticBag {
    let mut bag = DiagnosticBag::new();
    for (name, &depth) in depths {
        let span = spans.get(name).cloned().unwrap_or_else(Span::synthetic);
        if depth > STACK_HARD_LIMIT {
            bag.push(Diagnostic::error(
                codes::STACK_OVERFLOW_RISK,
                format!(
                    "function `{name}` may need {depth} bytes of stack, exceeding the 256-byte hardware stack"
                ),
                span,
            ));
        } else if depth > warning_threshold {
            bag.push(Diagnostic::warning(
                codes::STACK_DEPTH_WARNING,
                format!("function `{name}` may need {depth} bytes of stack"),
                span,
            ));
        }
    }
    bag
}

#[cfg(test)]
mod tests {
    use super::*;
    use sixtyc_ast::{Literal, Node, NodeIdGen};

    #[test]
    fn returned_local_escapes() {
        let mut gen = NodeIdGen::new();
        let ret = Node::new(
            gen.next(),
            Span::synthetic(),
            StmtKind::Return(Some(Node::new(
                gen.next(),
                Span::synthetic(),
                ExprKind::Identifier("x".to_string()),
            ))),
        );
        let result = analyze_function(&[ret]);
        assert_eq!(result.escapes["x"], EscapeReason::ReturnedFromFunction);
    }

    #[test]
    fn argument_to_call_escapes() {
        let mut gen = NodeIdGen::new();
        let call = Node::new(
            gen.next(),
            Span::synthetic(),
            ExprKind::Call {
                callee: "f".to_string(),
                args: vec![Node::new(
                    gen.next(),
                    Span::synthetic(),
                    ExprKind::Identifier("y".to_string()),
                )],
            },
        );
        let stmt = Node::new(gen.next(), Span::synthetic(), StmtKind::ExpressionStmt(call));
        let result = analyze_function(&[stmt]);
        assert_eq!(result.escapes["y"], EscapeReason::PassedToFunction);
    }

    #[test]
    fn address_of_escapes() {
        let mut gen = NodeIdGen::new();
        let addr = Node::new(
            gen.next(),
            Span::synthetic(),
            ExprKind::Unary {
                op: sixtyc_ast::UnaryOp::AddressOf,
                operand: Box::new(Node::new(
                    gen.next(),
                    Span::synthetic(),
                    ExprKind::Identifier("z".to_string()),
                )),
            },
        );
        let stmt = Node::new(gen.next(), Span::synthetic(), StmtKind::ExpressionStmt(addr));
        let result = analyze_function(&[stmt]);
        assert_eq!(result.escapes["z"], EscapeReason::AddressTaken);
    }

    #[test]
    fn non_escaping_local_is_absent() {
        let mut gen = NodeIdGen::new();
        let stmt = Node::new(
            gen.next(),
            Span::synthetic(),
            StmtKind::LocalVariable {
                name: "a".to_string(),
                type_annotation: None,
                initializer: Some(Node::new(
                    gen.next(),
                    Span::synthetic(),
                    ExprKind::Literal(Literal::Number(1)),
                )),
                is_const: false,
            },
        );
        let result = analyze_function(&[stmt]);
        assert!(result.escapes.is_empty());
    }

    #[test]
    fn stack_depth_accounts_for_deepest_callee() {
        let mut frame_sizes = FxHashMap::default();
        frame_sizes.insert(
            "leaf".to_string(),
            FrameSize {
                params: 2,
                locals: 4,
            },
        );
        frame_sizes.insert(
            "root".to_string(),
            FrameSize {
                params: 1,
                locals: 1,
            },
        );
        let mut callees = FxHashMap::default();
        callees.insert("root".to_string(), vec!["leaf".to_string()]);
        let depths = compute_stack_depths(&frame_sizes, &callees);
        assert_eq!(depths["leaf"], 2 + 2 + 4);
        assert_eq!(depths["root"], 2 + 1 + 1 + depths["leaf"]);
    }

    #[test]
    fn overflow_risk_is_an_error() {
        let mut depths = FxHashMap::default();
        depths.insert("f".to_string(), 300);
        let bag = check_stack_depths(&depths, &FxHashMap::default(), DEFAULT_STACK_WARNING_THRESHOLD);
        assert_eq!(bag.len(), 1);
        assert!(bag.has_errors());
    }

    #[test]
    fn below_threshold_is_silent() {
        let mut depths = FxHashMap::default();
        depths.insert("f".to_string(), 10);
        let bag = check_stack_depths(&depths, &FxHashMap::default(), DEFAULT_STACK_WARNING_THRESHOLD);
        assert!(bag.is_empty());
    }
}
