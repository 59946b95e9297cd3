//! Constant propagation, `spec.md` section 4.5.
//!
//! The language has no `goto`, so every control-flow join the AST can
//! express (`if`/`else`, loop re-entry, `switch` cases) is already visible
//! structurally. Rather than build a separate CFG to run textbook
//! worklist dataflow over, this walks the AST directly and threads an
//! environment (variable name -> [`ConstLattice`]) through it, taking the
//! lattice meet at every join the AST shows. A loop body is visited once
//! and its exit environment is met with the pre-loop environment, which
//! is a sound (if not maximally precise) approximation of "ran zero or
//! more times" -- see `DESIGN.md`.

use rustc_hash::FxHashMap;
use sixtyc_ast::{BinOp, ConstLattice, Expr, ExprKind, Literal, NodeId, Stmt, StmtKind, UnaryOp};
use sixtyc_ir::BinOpcode;
use std::collections::HashSet;

/// Output of constant propagation over one function body.
#[derive(Debug, Default)]
pub struct ConstPropResult {
    /// Final lattice value of every variable touched by the function.
    pub values: FxHashMap<String, ConstLattice>,
    /// Variables with exactly one static definition, and that definition
    /// is a constant.
    pub effectively_const: HashSet<String>,
    /// Expression nodes constant propagation folded to a literal value.
    pub foldable: Vec<(NodeId, i64)>,
    /// For every `if`/`while`/`do`-`while` whose condition folded to a
    /// known boolean, that statement's node id and the truth value.
    pub branch_constants: FxHashMap<NodeId, bool>,
}

struct Ctx {
    env: FxHashMap<String, ConstLattice>,
    assign_count: FxHashMap<String, u32>,
    result: ConstPropResult,
}

/// Run constant propagation over a function body, annotating every
/// expression node's `constant_value`/`constant_foldable` metadata as a
/// side effect.
pub fn analyze_function(body: &[Stmt]) -> ConstPropResult {
    let mut ctx = Ctx {
        env: FxHashMap::default(),
        assign_count: FxHashMap::default(),
        result: ConstPropResult::default(),
    };
    analyze_block(&mut ctx, body);
    ctx.result.values = ctx.env.clone();
    for (name, count) in &ctx.assign_count {
        if *count == 1 {
            if let Some(ConstLattice::Constant(_)) = ctx.env.get(name) {
                ctx.result.effectively_const.insert(name.clone());
            }
        }
    }
    ctx.result
}

fn meet_envs(
    a: &FxHashMap<String, ConstLattice>,
    b: &FxHashMap<String, ConstLattice>,
) -> FxHashMap<String, ConstLattice> {
    let mut out = FxHashMap::default();
    for key in a.keys().chain(b.keys()) {
        if out.contains_key(key) {
            continue;
        }
        let av = a.get(key).cloned().unwrap_or(ConstLattice::Top);
        let bv = b.get(key).cloned().unwrap_or(ConstLattice::Top);
        out.insert(key.clone(), av.meet(&bv));
    }
    out
}

fn to_bin_opcode(op: BinOp) -> Option<BinOpcode> {
    Some(match op {
        BinOp::Add => BinOpcode::Add,
        BinOp::Sub => BinOpcode::Sub,
        BinOp::Mul => BinOpcode::Mul,
        BinOp::Div => BinOpcode::Div,
        BinOp::Mod => BinOpcode::Mod,
        BinOp::And => BinOpcode::And,
        BinOp::Or => BinOpcode::Or,
        BinOp::Xor => BinOpcode::Xor,
        BinOp::Shl => BinOpcode::Shl,
        BinOp::Shr => BinOpcode::Shr,
        BinOp::Eq => BinOpcode::Eq,
        BinOp::Ne => BinOpcode::Ne,
        BinOp::Lt => BinOpcode::Lt,
        BinOp::Le => BinOpcode::Le,
        BinOp::Gt => BinOpcode::Gt,
        BinOp::Ge => BinOpcode::Ge,
        // Logical and/or are short-circuiting and handled separately so
        // constant folding doesn't evaluate a side-effecting right-hand
        // side that a real run would skip.
        BinOp::LogicalAnd | BinOp::LogicalOr => return None,
    })
}

impl Ctx {
    fn record(&mut self, expr: &Expr, value: ConstLattice) -> ConstLattice {
        if let Some(v) = value.as_constant() {
            if !matches!(expr.kind, ExprKind::Literal(_)) {
                expr.metadata_mut().constant_foldable = Some(v);
                self.result.foldable.push((expr.id(), v));
            }
        }
        expr.metadata_mut().constant_value = Some(value.clone());
        value
    }

    fn eval(&mut self, expr: &Expr) -> ConstLattice {
        let value = match &expr.kind {
            ExprKind::Literal(Literal::Number(n)) => ConstLattice::Constant(*n),
            ExprKind::Literal(Literal::Bool(b)) => ConstLattice::Constant(*b as i64),
            ExprKind::Literal(Literal::Str(_)) => ConstLattice::Bottom,
            ExprKind::Identifier(name) => {
                self.env.get(name).cloned().unwrap_or(ConstLattice::Top)
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.eval(left);
                let r = self.eval(right);
                match op {
                    BinOp::LogicalAnd => match (l.as_constant(), r.as_constant()) {
                        (Some(0), _) => ConstLattice::Constant(0),
                        (Some(_), Some(b)) => ConstLattice::Constant((b != 0) as i64),
                        _ if l == ConstLattice::Bottom || r == ConstLattice::Bottom => {
                            ConstLattice::Bottom
                        }
                        _ => ConstLattice::Top,
                    },
                    BinOp::LogicalOr => match (l.as_constant(), r.as_constant()) {
                        (Some(a), _) if a != 0 => ConstLattice::Constant(1),
                        (Some(_), Some(b)) => ConstLattice::Constant((b != 0) as i64),
                        _ if l == ConstLattice::Bottom || r == ConstLattice::Bottom => {
                            ConstLattice::Bottom
                        }
                        _ => ConstLattice::Top,
                    },
                    _ => match (l.as_constant(), r.as_constant(), to_bin_opcode(*op)) {
                        (Some(a), Some(b), Some(opcode)) => match opcode.fold(a, b) {
                            Some(v) => ConstLattice::Constant(v),
                            None => ConstLattice::Bottom,
                        },
                        _ if l == ConstLattice::Bottom || r == ConstLattice::Bottom => {
                            ConstLattice::Bottom
                        }
                        _ => ConstLattice::Top,
                    },
                }
            }
            ExprKind::Unary { op, operand } => {
                let v = self.eval(operand);
                match (op, v.as_constant()) {
                    (UnaryOp::Neg, Some(a)) => ConstLattice::Constant(a.wrapping_neg()),
                    (UnaryOp::BitNot, Some(a)) => ConstLattice::Constant(!a),
                    (UnaryOp::LogicalNot, Some(a)) => ConstLattice::Constant((a == 0) as i64),
                    // Address-of never yields a compile-time constant.
                    (UnaryOp::AddressOf, _) => ConstLattice::Bottom,
                    _ if v == ConstLattice::Bottom => ConstLattice::Bottom,
                    _ => ConstLattice::Top,
                }
            }
            ExprKind::Assignment { target, op, value } => {
                let rhs = self.eval(value);
                let final_value = if let Some(op) = op {
                    let lhs = if let ExprKind::Identifier(name) = &target.kind {
                        self.env.get(name).cloned().unwrap_or(ConstLattice::Top)
                    } else {
                        ConstLattice::Top
                    };
                    match (lhs.as_constant(), rhs.as_constant(), to_bin_opcode(*op)) {
                        (Some(a), Some(b), Some(opcode)) => match opcode.fold(a, b) {
                            Some(v) => ConstLattice::Constant(v),
                            None => ConstLattice::Bottom,
                        },
                        _ => ConstLattice::Bottom,
                    }
                } else {
                    rhs
                };
                if let ExprKind::Identifier(name) = &target.kind {
                    *self.assign_count.entry(name.clone()).or_insert(0) += 1;
                    self.env.insert(name.clone(), final_value.clone());
                } else {
                    // Indexed/member assignment: evaluate the target
                    // subexpression for its own foldability but this
                    // analysis doesn't model memory, so its effect on any
                    // variable is unknown.
                    self.eval(target);
                }
                final_value
            }
            // Calls, indexing and member access may have arbitrary
            // effects or read memory this analysis doesn't model.
            ExprKind::Call { args, .. } => {
                for arg in args {
                    self.eval(arg);
                }
                ConstLattice::Bottom
            }
            ExprKind::Index { object, index } => {
                self.eval(object);
                self.eval(index);
                ConstLattice::Bottom
            }
            ExprKind::Member { object, .. } => {
                self.eval(object);
                ConstLattice::Bottom
            }
        };
        self.record(expr, value)
    }
}

fn analyze_block(ctx: &mut Ctx, stmts: &[Stmt]) {
    for stmt in stmts {
        analyze_stmt(ctx, stmt);
    }
}

fn analyze_stmt(ctx: &mut Ctx, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::ExpressionStmt(e) => {
            ctx.eval(e);
        }
        StmtKind::LocalVariable {
            name, initializer, ..
        } => {
            let value = initializer
                .as_ref()
                .map(|e| ctx.eval(e))
                .unwrap_or(ConstLattice::Top);
            *ctx.assign_count.entry(name.clone()).or_insert(0) += 1;
            ctx.env.insert(name.clone(), value);
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond_value = ctx.eval(cond);
            if let Some(c) = cond_value.as_constant() {
                ctx.result.branch_constants.insert(stmt.id(), c != 0);
            }
            let saved = ctx.env.clone();
            analyze_block(ctx, then_branch);
            let then_env = std::mem::replace(&mut ctx.env, saved.clone());
            let else_env = if let Some(else_branch) = else_branch {
                ctx.env = saved;
                analyze_block(ctx, else_branch);
                std::mem::take(&mut ctx.env)
            } else {
                saved
            };
            ctx.env = meet_envs(&then_env, &else_env);
        }
        StmtKind::While { cond, body } => {
            let pre = ctx.env.clone();
            ctx.eval(cond);
            analyze_block(ctx, body);
            let post = std::mem::take(&mut ctx.env);
            ctx.env = meet_envs(&pre, &post);
        }
        StmtKind::DoWhile { body, cond } => {
            let pre = ctx.env.clone();
            analyze_block(ctx, body);
            ctx.eval(cond);
            let post = std::mem::take(&mut ctx.env);
            ctx.env = meet_envs(&pre, &post);
        }
        StmtKind::For {
            var,
            start,
            end,
            step,
            body,
            ..
        } => {
            ctx.eval(start);
            ctx.eval(end);
            if let Some(step) = step {
                ctx.eval(step);
            }
            let pre = ctx.env.clone();
            // The induction variable is redefined every iteration, so it
            // is never effectively-const regardless of its initial value.
            *ctx.assign_count.entry(var.clone()).or_insert(0) += 2;
            ctx.env.insert(var.clone(), ConstLattice::Bottom);
            analyze_block(ctx, body);
            let post = std::mem::take(&mut ctx.env);
            ctx.env = meet_envs(&pre, &post);
            ctx.env.insert(var.clone(), ConstLattice::Bottom);
        }
        StmtKind::Switch {
            value,
            cases,
            default,
        } => {
            ctx.eval(value);
            let pre = ctx.env.clone();
            let mut merged: Option<FxHashMap<String, ConstLattice>> = None;
            for case in cases {
                ctx.eval(&case.value);
                ctx.env = pre.clone();
                analyze_block(ctx, &case.body);
                let exit = std::mem::take(&mut ctx.env);
                merged = Some(match merged {
                    Some(m) => meet_envs(&m, &exit),
                    None => exit,
                });
            }
            if let Some(default) = default {
                ctx.env = pre.clone();
                analyze_block(ctx, default);
                let exit = std::mem::take(&mut ctx.env);
                merged = Some(match merged {
                    Some(m) => meet_envs(&m, &exit),
                    None => exit,
                });
            } else {
                merged = Some(match merged {
                    Some(m) => meet_envs(&m, &pre),
                    None => pre.clone(),
                });
            }
            ctx.env = merged.unwrap_or(pre);
        }
        StmtKind::Return(value) => {
            if let Some(value) = value {
                ctx.eval(value);
            }
        }
        StmtKind::Break | StmtKind::Continue => {}
        StmtKind::Block(stmts) => analyze_block(ctx, stmts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sixtyc_ast::{Node, NodeIdGen, Type};
    use sixtyc_diagnostics::Span;

    fn ident(gen: &mut NodeIdGen, name: &str) -> Expr {
        Node::new(
            gen.next(),
            Span::synthetic(),
            ExprKind::Identifier(name.to_string()),
        )
    }

    fn num(gen: &mut NodeIdGen, n: i64) -> Expr {
        Node::new(
            gen.next(),
            Span::synthetic(),
            ExprKind::Literal(Literal::Number(n)),
        )
    }

    fn bin(gen: &mut NodeIdGen, op: BinOp, l: Expr, r: Expr) -> Expr {
        Node::new(
            gen.next(),
            Span::synthetic(),
            ExprKind::Binary {
                op,
                left: Box::new(l),
                right: Box::new(r),
            },
        )
    }

    fn local(gen: &mut NodeIdGen, name: &str, init: Expr) -> Stmt {
        Node::new(
            gen.next(),
            Span::synthetic(),
            StmtKind::LocalVariable {
                name: name.to_string(),
                type_annotation: Some(Type::Byte),
                initializer: Some(init),
                is_const: false,
            },
        )
    }

    #[test]
    fn folds_straight_line_arithmetic() {
        let mut gen = NodeIdGen::new();
        let body = vec![local(
            &mut gen,
            "x",
            bin(&mut gen, BinOp::Add, num(&mut gen, 2), num(&mut gen, 3)),
        )];
        let result = analyze_function(&body);
        assert_eq!(result.values["x"], ConstLattice::Constant(5));
        assert!(result.effectively_const.contains("x"));
    }

    #[test]
    fn conflicting_branch_assignment_goes_bottom() {
        let mut gen = NodeIdGen::new();
        let cond = ident(&mut gen, "flag");
        let then_branch = vec![local(&mut gen, "x", num(&mut gen, 1))];
        let else_branch = vec![local(&mut gen, "x", num(&mut gen, 2))];
        let if_stmt = Node::new(
            gen.next(),
            Span::synthetic(),
            StmtKind::If {
                cond,
                then_branch,
                else_branch: Some(else_branch),
            },
        );
        let result = analyze_function(&[if_stmt]);
        assert_eq!(result.values["x"], ConstLattice::Bottom);
        assert!(!result.effectively_const.contains("x"));
    }

    #[test]
    fn literal_if_condition_is_recorded() {
        let mut gen = NodeIdGen::new();
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
                else_branch: None,
            },
        );
        let id = if_stmt.id();
        let result = analyze_function(&[if_stmt]);
        assert_eq!(result.branch_constants[&id], true);
    }

    #[test]
    fn idempotent_on_rerun() {
        let mut gen = NodeIdGen::new();
        let body = vec![local(
            &mut gen,
            "x",
            bin(&mut gen, BinOp::Mul, num(&mut gen, 6), num(&mut gen, 7)),
        )];
        let first = analyze_function(&body);
        let second = analyze_function(&body);
        assert_eq!(first.values, second.values);
    }
}
