//! Loop analysis, `spec.md` section 4.5.
//!
//! The language's only loops are `while`, `do`-`while` and `for`, all
//! structured: the loop header lexically dominates its own body by
//! construction, so "natural loop" identification needs no dominator
//! tree here (contrast [`crate::ilgen`]'s reliance on `sixtyc-ssa`'s for
//! arbitrary IL control flow). What's left to compute per loop is which
//! of its body's subexpressions are loop-invariant: built only from
//! literals and variables the loop body never assigns.

use rustc_hash::FxHashSet;
use sixtyc_ast::{Expr, ExprKind, NodeId, Stmt, StmtKind};
use sixtyc_diagnostics::Span;

/// One loop found in a function body.
#[derive(Debug)]
pub struct LoopInfo {
    /// Span of the loop's header (`while`/`do`/`for` keyword position).
    pub header_span: Span,
    /// Node ids of expressions inside the loop proven loop-invariant.
    pub invariant_exprs: Vec<NodeId>,
    /// True if the loop's own condition/bound expressions were invariant.
    pub condition_invariant: bool,
}

/// Find every loop in a function body and annotate loop-invariant
/// expressions' `loop_invariant` metadata.
pub fn analyze_function(body: &[Stmt]) -> Vec<LoopInfo> {
    let mut loops = Vec::new();
    walk_stmts(body, &mut loops);
    loops
}

fn walk_stmts(stmts: &[Stmt], loops: &mut Vec<LoopInfo>) {
    for stmt in stmts {
        walk_stmt(stmt, loops);
    }
}

fn walk_stmt(stmt: &Stmt, loops: &mut Vec<LoopInfo>) {
    match &stmt.kind {
        StmtKind::While { cond, body } => {
            loops.push(analyze_loop(stmt, std::slice::from_ref(cond), body, &[]));
            walk_stmts(body, loops);
        }
        StmtKind::DoWhile { body, cond } => {
            loops.push(analyze_loop(stmt, std::slice::from_ref(cond), body, &[]));
            walk_stmts(body, loops);
        }
        StmtKind::For {
            var,
            start,
            end,
            step,
            body,
            ..
        } => {
            let mut bounds = vec![start, end];
            if let Some(step) = step {
                bounds.push(step);
            }
            let bounds: Vec<&Expr> = bounds.into_iter().collect();
            loops.push(analyze_loop(stmt, &bounds, body, std::slice::from_ref(var)));
            walk_stmts(body, loops);
        }
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            walk_stmts(then_branch, loops);
            if let Some(else_branch) = else_branch {
                walk_stmts(else_branch, loops);
            }
        }
        StmtKind::Switch { cases, default, .. } => {
            for case in cases {
                walk_stmts(&case.body, loops);
            }
            if let Some(default) = default {
                walk_stmts(default, loops);
            }
        }
        StmtKind::Block(stmts) => walk_stmts(stmts, loops),
        StmtKind::ExpressionStmt(_)
        | StmtKind::Return(_)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::LocalVariable { .. } => {}
    }
}

fn analyze_loop(
    header: &Stmt,
    bound_exprs: &[&Expr],
    body: &[Stmt],
    extra_defs: &[String],
) -> LoopInfo {
    let mut defs: FxHashSet<String> = extra_defs.iter().cloned().collect();
    collect_defs(body, &mut defs);

    let mut invariant_exprs = Vec::new();
    let mut condition_invariant = true;
    for expr in bound_exprs {
        if !mark_invariant(expr, &defs, &mut invariant_exprs) {
            condition_invariant = false;
        }
    }
    mark_invariant_in_block(body, &defs, &mut invariant_exprs);

    LoopInfo {
        header_span: header.span.clone(),
        invariant_exprs,
        condition_invariant,
    }
}

fn collect_defs(stmts: &[Stmt], defs: &mut FxHashSet<String>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::LocalVariable { name, .. } => {
                defs.insert(name.clone());
            }
            StmtKind::ExpressionStmt(e) => collect_defs_expr(e, defs),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                collect_defs_expr(cond, defs);
                collect_defs(then_branch, defs);
                if let Some(else_branch) = else_branch {
                    collect_defs(else_branch, defs);
                }
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                collect_defs_expr(cond, defs);
                collect_defs(body, defs);
            }
            StmtKind::For {
                var, body, start, end, step, ..
            } => {
                defs.insert(var.clone());
                collect_defs_expr(start, defs);
                collect_defs_expr(end, defs);
                if let Some(step) = step {
                    collect_defs_expr(step, defs);
                }
                collect_defs(body, defs);
            }
            StmtKind::Switch {
                value,
                cases,
                default,
            } => {
                collect_defs_expr(value, defs);
                for case in cases {
                    collect_defs(&case.body, defs);
                }
                if let Some(default) = default {
                    collect_defs(default, defs);
                }
            }
            StmtKind::Return(Some(e)) => collect_defs_expr(e, defs),
            StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Block(stmts) => collect_defs(stmts, defs),
        }
    }
}

fn collect_defs_expr(expr: &Expr, defs: &mut FxHashSet<String>) {
    match &expr.kind {
        ExprKind::Assignment { target, value, .. } => {
            if let ExprKind::Identifier(name) = &target.kind {
                defs.insert(name.clone());
            }
            collect_defs_expr(target, defs);
            collect_defs_expr(value, defs);
        }
        ExprKind::Binary { left, right, .. } => {
            collect_defs_expr(left, defs);
            collect_defs_expr(right, defs);
        }
        ExprKind::Unary { operand, .. } => collect_defs_expr(operand, defs),
        ExprKind::Call { args, .. } => {
            for arg in args {
                collect_defs_expr(arg, defs);
            }
        }
        ExprKind::Index { object, index } => {
            collect_defs_expr(object, defs);
            collect_defs_expr(index, defs);
        }
        ExprKind::Member { object, .. } => collect_defs_expr(object, defs),
        ExprKind::Literal(_) | ExprKind::Identifier(_) => {}
    }
}

fn mark_invariant_in_block(stmts: &[Stmt], defs: &FxHashSet<String>, out: &mut Vec<NodeId>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::ExpressionStmt(e) => {
                mark_invariant(e, defs, out);
            }
            StmtKind::LocalVariable { initializer, .. } => {
                if let Some(init) = initializer {
                    mark_invariant(init, defs, out);
                }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                mark_invariant(cond, defs, out);
                mark_invariant_in_block(then_branch, defs, out);
                if let Some(else_branch) = else_branch {
                    mark_invariant_in_block(else_branch, defs, out);
                }
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                mark_invariant(cond, defs, out);
                mark_invariant_in_block(body, defs, out);
            }
            StmtKind::For {
                start, end, step, body, ..
            } => {
                mark_invariant(start, defs, out);
                mark_invariant(end, defs, out);
                if let Some(step) = step {
                    mark_invariant(step, defs, out);
                }
                mark_invariant_in_block(body, defs, out);
            }
            StmtKind::Switch {
                value,
                cases,
                default,
            } => {
                mark_invariant(value, defs, out);
                for case in cases {
                    mark_invariant_in_block(&case.body, defs, out);
                }
                if let Some(default) = default {
                    mark_invariant_in_block(default, defs, out);
                }
            }
            StmtKind::Return(Some(e)) => {
                mark_invariant(e, defs, out);
            }
            StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Block(stmts) => mark_invariant_in_block(stmts, defs, out),
        }
    }
}

/// Recursively determine whether `expr` is loop-invariant, marking its
/// metadata and every invariant subexpression's along the way. Returns
/// whether `expr` itself is invariant.
fn mark_invariant(expr: &Expr, defs: &FxHashSet<String>, out: &mut Vec<NodeId>) -> bool {
    let invariant = match &expr.kind {
        ExprKind::Literal(_) => true,
        ExprKind::Identifier(name) => !defs.contains(name),
        ExprKind::Binary { left, right, .. } => {
            let l = mark_invariant(left, defs, out);
            let r = mark_invariant(right, defs, out);
            l && r
        }
        ExprKind::Unary { operand, .. } => mark_invariant(operand, defs, out),
        // Calls, indexing, member access and assignment may read memory
        // or have side effects this analysis doesn't model; conservatively
        // never invariant, though operands are still visited and marked.
        ExprKind::Call { args, .. } => {
            for arg in args {
                mark_invariant(arg, defs, out);
            }
            false
        }
        ExprKind::Index { object, index } => {
            mark_invariant(object, defs, out);
            mark_invariant(index, defs, out);
            false
        }
        ExprKind::Member { object, .. } => {
            mark_invariant(object, defs, out);
            false
        }
        ExprKind::Assignment { target, value, .. } => {
            mark_invariant(target, defs, out);
            mark_invariant(value, defs, out);
            false
        }
    };
    if invariant {
        expr.metadata_mut().loop_invariant = true;
        out.push(expr.id());
    }
    invariant
}

#[cfg(test)]
mod tests {
    use super::*;
    use sixtyc_ast::{BinOp, Literal, Node, NodeIdGen};

    #[test]
    fn loop_invariant_expr_is_marked() {
        let mut gen = NodeIdGen::new();
        // while (n < limit) { x = x + step; }
        let cond = Node::new(
            gen.next(),
            Span::synthetic(),
            ExprKind::Binary {
                op: BinOp::Lt,
                left: Box::new(Node::new(
                    gen.next(),
                    Span::synthetic(),
                    ExprKind::Identifier("n".to_string()),
                )),
                right: Box::new(Node::new(
                    gen.next(),
                    Span::synthetic(),
                    ExprKind::Identifier("limit".to_string()),
                )),
            },
        );
        let invariant_operand = Node::new(
            gen.next(),
            Span::synthetic(),
            ExprKind::Identifier("step".to_string()),
        );
        let invariant_id = invariant_operand.id();
        let assign = Node::new(
            gen.next(),
            Span::synthetic(),
            ExprKind::Assignment {
                target: Box::new(Node::new(
                    gen.next(),
                    Span::synthetic(),
                    ExprKind::Identifier("x".to_string()),
                )),
                op: Some(BinOp::Add),
                value: Box::new(invariant_operand),
            },
        );
        let body = vec![Node::new(
            gen.next(),
            Span::synthetic(),
            StmtKind::ExpressionStmt(assign),
        )];
        let while_stmt = Node::new(gen.next(), Span::synthetic(), StmtKind::While { cond, body });
        let loops = analyze_function(&[while_stmt]);
        assert_eq!(loops.len(), 1);
        assert!(loops[0].invariant_exprs.contains(&invariant_id));
    }

    #[test]
    fn non_invariant_literal_condition_is_still_invariant() {
        let mut gen = NodeIdGen::new();
        let cond = Node::new(
            gen.next(),
            Span::synthetic(),
            ExprKind::Literal(Literal::Bool(true)),
        );
        let do_while = Node::new(
            gen.next(),
            Span::synthetic(),
            StmtKind::DoWhile { body: vec![], cond },
        );
        let loops = analyze_function(&[do_while]);
        assert!(loops[0].condition_invariant);
    }

    #[test]
    fn for_loop_induction_variable_is_not_invariant() {
        let mut gen = NodeIdGen::new();
        let start = Node::new(
            gen.next(),
            Span::synthetic(),
            ExprKind::Literal(Literal::Number(0)),
        );
        let end = Node::new(
            gen.next(),
            Span::synthetic(),
            ExprKind::Literal(Literal::Number(9)),
        );
        let use_of_i = Node::new(
            gen.next(),
            Span::synthetic(),
            ExprKind::Identifier("i".to_string()),
        );
        let use_id = use_of_i.id();
        let body = vec![Node::new(
            gen.next(),
            Span::synthetic(),
            StmtKind::ExpressionStmt(use_of_i),
        )];
        let for_stmt = Node::new(
            gen.next(),
            Span::synthetic(),
            StmtKind::For {
                var: "i".to_string(),
                start,
                end,
                direction: sixtyc_ast::ForDirection::Up,
                step: None,
                body,
            },
        );
        let loops = analyze_function(&[for_stmt]);
        assert!(!loops[0].invariant_exprs.contains(&use_id));
    }
}
