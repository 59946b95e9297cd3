//! Dead-code detection, `spec.md` section 4.5.
//!
//! Two independent sources of dead code: a statement textually following a
//! `return`/`break`/`continue` in the same block (`UnreachableAfterTerminator`),
//! and a branch of an `if` whose condition is a literal constant that
//! selects the other branch (`DeadBranch`). Both are a structural AST walk
//! for the reason [`super::const_prop`] gives: no `goto` means the AST's
//! nesting already is the reachability structure.

use sixtyc_ast::{DeadCodeReason, Expr, ExprKind, Literal, NodeId, Stmt, StmtKind};
use sixtyc_diagnostics::{codes, Diagnostic, DiagnosticBag};

/// Output of dead-code detection over one function body.
#[derive(Debug, Default)]
pub struct DeadCodeResult {
    /// Every node found dead, with why.
    pub dead_nodes: Vec<(NodeId, DeadCodeReason)>,
}

/// Run dead-code detection over a function body, annotating every dead
/// statement's `dead_code` metadata and returning a warning per dead node.
pub fn analyze_function(body: &[Stmt]) -> (DeadCodeResult, DiagnosticBag) {
    let mut result = DeadCodeResult::default();
    let mut diagnostics = DiagnosticBag::new();
    analyze_block(body, &mut result, &mut diagnostics, true);
    (result, diagnostics)
}

fn mark_dead(stmt: &Stmt, reason: DeadCodeReason, result: &mut DeadCodeResult, bag: &mut DiagnosticBag) {
    stmt.metadata_mut().dead_code = Some(reason);
    result.dead_nodes.push((stmt.id(), reason));
    let code = match reason {
        DeadCodeReason::UnreachableAfterTerminator | DeadCodeReason::UnreachableFromEntry => {
            codes::DEAD_CODE_UNREACHABLE
        }
        DeadCodeReason::DeadBranch => codes::DEAD_CODE_BRANCH,
    };
    bag.push(Diagnostic::warning(
        code,
        "this code can never execute",
        stmt.span.clone(),
    ));
}

fn mark_all_dead(
    stmts: &[Stmt],
    reason: DeadCodeReason,
    result: &mut DeadCodeResult,
    bag: &mut DiagnosticBag,
) {
    for stmt in stmts {
        mark_dead(stmt, reason, result, bag);
        mark_nested_dead(stmt, reason, result, bag);
    }
}

/// Mark every statement nested inside `stmt`'s own sub-blocks as dead too,
/// without re-marking `stmt` itself (the caller already did).
fn mark_nested_dead(
    stmt: &Stmt,
    reason: DeadCodeReason,
    result: &mut DeadCodeResult,
    bag: &mut DiagnosticBag,
) {
    match &stmt.kind {
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            mark_all_dead(then_branch, reason, result, bag);
            if let Some(else_branch) = else_branch {
                mark_all_dead(else_branch, reason, result, bag);
            }
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } | StmtKind::For { body, .. } => {
            mark_all_dead(body, reason, result, bag);
        }
        StmtKind::Switch { cases, default, .. } => {
            for case in cases {
                mark_all_dead(&case.body, reason, result, bag);
            }
            if let Some(default) = default {
                mark_all_dead(default, reason, result, bag);
            }
        }
        StmtKind::Block(stmts) => mark_all_dead(stmts, reason, result, bag),
        _ => {}
    }
}

fn literal_bool(cond: &Expr) -> Option<bool> {
    match &cond.kind {
        ExprKind::Literal(Literal::Bool(b)) => Some(*b),
        ExprKind::Literal(Literal::Number(n)) => Some(*n != 0),
        _ => None,
    }
}

/// Walk `stmts` in sequence; returns whether control can fall off the end
/// of the block to whatever follows it.
fn analyze_block(
    stmts: &[Stmt],
    result: &mut DeadCodeResult,
    bag: &mut DiagnosticBag,
    mut reachable: bool,
) -> bool {
    for stmt in stmts {
        if !reachable {
            mark_dead(stmt, DeadCodeReason::UnreachableAfterTerminator, result, bag);
            mark_nested_dead(stmt, DeadCodeReason::UnreachableAfterTerminator, result, bag);
            continue;
        }
        reachable = analyze_stmt(stmt, result, bag);
    }
    reachable
}

/// Returns whether control can reach past this single statement.
fn analyze_stmt(stmt: &Stmt, result: &mut DeadCodeResult, bag: &mut DiagnosticBag) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue => false,
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            if let Some(taken_then) = literal_bool(cond) {
                if taken_then {
                    if let Some(else_branch) = else_branch {
                        mark_all_dead(else_branch, DeadCodeReason::DeadBranch, result, bag);
                    }
                    analyze_block(then_branch, result, bag, true)
                } else {
                    mark_all_dead(then_branch, DeadCodeReason::DeadBranch, result, bag);
                    match else_branch {
                        Some(else_branch) => analyze_block(else_branch, result, bag, true),
                        None => true,
                    }
                }
            } else {
                let then_reachable = analyze_block(then_branch, result, bag, true);
                let else_reachable = match else_branch {
                    Some(else_branch) => analyze_block(else_branch, result, bag, true),
                    None => true,
                };
                then_reachable || else_reachable
            }
        }
        StmtKind::While { body, cond } => {
            if literal_bool(cond) == Some(false) {
                mark_all_dead(body, DeadCodeReason::DeadBranch, result, bag);
            } else {
                analyze_block(body, result, bag, true);
            }
            // The loop may execute zero times (or `break` out of it), so
            // whatever follows stays reachable.
            true
        }
        StmtKind::DoWhile { body, .. } => {
            analyze_block(body, result, bag, true);
            true
        }
        StmtKind::For { body, .. } => {
            analyze_block(body, result, bag, true);
            true
        }
        StmtKind::Switch { cases, default, .. } => {
            for case in cases {
                analyze_block(&case.body, result, bag, true);
            }
            if let Some(default) = default {
                analyze_block(default, result, bag, true);
            }
            true
        }
        StmtKind::Block(stmts) => analyze_block(stmts, result, bag, true),
        StmtKind::ExpressionStmt(_) | StmtKind::LocalVariable { .. } => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sixtyc_ast::{Node, NodeIdGen};
    use sixtyc_diagnostics::Span;

    #[test]
    fn statement_after_return_is_dead() {
        let mut gen = NodeIdGen::new();
        let ret = Node::new(gen.next(), Span::synthetic(), StmtKind::Return(None));
        let after = Node::new(gen.next(), Span::synthetic(), StmtKind::Break);
        let after_id = after.id();
        let (result, diagnostics) = analyze_function(&[ret, after]);
        assert_eq!(
            result.dead_nodes,
            vec![(after_id, DeadCodeReason::UnreachableAfterTerminator)]
        );
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn false_branch_of_literal_true_if_is_dead() {
        let mut gen = NodeIdGen::new();
        let dead_stmt = Node::new(gen.next(), Span::synthetic(), StmtKind::Break);
        let dead_id = dead_stmt.id();
        let if_stmt = Node::new(
            gen.next(),
            Span::synthetic(),
            StmtKind::If {
                cond: Node::new(
                    gen.next(),
                    Span::synthetic(),
                    ExprKind::Literal(Literal::Bool(true)),
                ),
                then_branch: vec![],
                else_branch: Some(vec![dead_stmt]),
            },
        );
        let (result, _) = analyze_function(&[if_stmt]);
        assert_eq!(result.dead_nodes, vec![(dead_id, DeadCodeReason::DeadBranch)]);
    }

    #[test]
    fn normal_code_is_untouched() {
        let mut gen = NodeIdGen::new();
        let stmt = Node::new(
            gen.next(),
            Span::synthetic(),
            StmtKind::ExpressionStmt(Node::new(
                gen.next(),
                Span::synthetic(),
                ExprKind::Literal(Literal::Number(1)),
            )),
        );
        let (result, diagnostics) = analyze_function(&[stmt]);
        assert!(result.dead_nodes.is_empty());
        assert!(diagnostics.is_empty());
    }
}
