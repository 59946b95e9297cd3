//! Symbol resolution and semantic checking, `spec.md` section 2 ("Symbol
//! table") and section 7's semantic error taxonomy.
//!
//! Walks a parsed module twice: first declaring every module-level
//! `Variable`/`Function` in the root scope (so forward references between
//! top-level declarations resolve regardless of source order), then
//! walking every function body in a nested scope checking names, types,
//! and structural rules (`break`/`continue` placement, `switch` default
//! uniqueness, return-type agreement). Grounded on `sixtyc_ast::symbol_table`
//! for the scope chain itself; the checking walk below is new, since the
//! teacher's own type checker lives in `wasmtime`'s validator crate over a
//! binary wasm encoding rather than a source AST.

use sixtyc_ast::{
    BinOp, Decl, DeclKind, Expr, ExprKind, ScopeId, Stmt, StmtKind, Symbol, SymbolKind,
    SymbolTable, Type, UnaryOp,
};
use sixtyc_diagnostics::{codes, Diagnostic, DiagnosticBag, Span};

/// Intrinsic call names dispatched specially by the IL generator
/// (`spec.md` section 4.6); resolution treats a call to one of these as
/// always resolved, never an undefined-function error, since intrinsics
/// have no `Function` declaration of their own.
pub const INTRINSICS: &[&str] = &[
    "peek",
    "poke",
    "peekw",
    "pokew",
    "lo",
    "hi",
    "sei",
    "cli",
    "nop",
    "brk",
    "pha",
    "pla",
    "php",
    "plp",
    "barrier",
    "volatile_read",
    "volatile_write",
    "sizeof",
    "length",
];

/// The module-level symbol table produced by [`resolve`], plus its root
/// scope id, handed to the IL generator so it can look up global symbols
/// without re-running resolution.
pub struct ModuleResolution {
    /// Every module-level and function-level symbol, in their scope chain.
    pub symbols: SymbolTable,
    /// The module's root (top-level) scope.
    pub root: ScopeId,
}

/// Resolve names and check the semantic rules of `spec.md` section 7 over
/// `module`. Returns the resolved symbol table (consumed by the IL
/// generator and the recursion detector) and every diagnostic raised.
pub fn resolve(module: &Decl) -> (ModuleResolution, DiagnosticBag) {
    let mut bag = DiagnosticBag::new();
    let mut symbols = SymbolTable::new();
    let root = symbols.root();

    let DeclKind::Module { decls, .. } = &module.kind else {
        return (ModuleResolution { symbols, root }, bag);
    };

    for decl in decls {
        declare_top_level(&mut symbols, root, decl);
    }

    for decl in decls {
        if let DeclKind::Function {
            params,
            return_type,
            body: Some(body),
            ..
        } = &decl.kind
        {
            let fn_scope = symbols.push_scope(root);
            for param in params {
                symbols.declare(
                    fn_scope,
                    Symbol {
                        name: param.name.clone(),
                        kind: SymbolKind::Parameter,
                        declared_at: decl.id(),
                        span: decl.span,
                        ty: param.ty.clone(),
                        param_types: Vec::new(),
                        is_const: false,
                        is_exported: false,
                    },
                );
            }
            let mut ctx = CheckCtx {
                symbols: &mut symbols,
                bag: &mut bag,
                return_type: return_type.clone(),
                loop_depth: 0,
            };
            ctx.check_block(body, fn_scope);
        }
    }

    (ModuleResolution { symbols, root }, bag)
}

fn declare_top_level(symbols: &mut SymbolTable, root: ScopeId, decl: &Decl) {
    match &decl.kind {
        DeclKind::Variable {
            name,
            type_annotation,
            is_const,
            is_exported,
            ..
        } => {
            symbols.declare(
                root,
                Symbol {
                    name: name.clone(),
                    kind: SymbolKind::Variable,
                    declared_at: decl.id(),
                    span: decl.span,
                    ty: type_annotation.clone().unwrap_or(Type::Word),
                    param_types: Vec::new(),
                    is_const: *is_const,
                    is_exported: *is_exported,
                },
            );
        }
        DeclKind::Function {
            name,
            params,
            return_type,
            is_exported,
            ..
        } => {
            symbols.declare(
                root,
                Symbol {
                    name: name.clone(),
                    kind: SymbolKind::Function,
                    declared_at: decl.id(),
                    span: decl.span,
                    ty: return_type.clone(),
                    param_types: params.iter().map(|p| p.ty.clone()).collect(),
                    is_const: false,
                    is_exported: *is_exported,
                },
            );
        }
        DeclKind::Module { .. } | DeclKind::Import { .. } => {}
    }
}

struct CheckCtx<'a> {
    symbols: &'a mut SymbolTable,
    bag: &'a mut DiagnosticBag,
    return_type: Type,
    loop_depth: u32,
}

impl CheckCtx<'_> {
    fn check_block(&mut self, stmts: &[Stmt], scope: ScopeId) {
        for stmt in stmts {
            self.check_stmt(stmt, scope);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt, scope: ScopeId) {
        match &stmt.kind {
            StmtKind::ExpressionStmt(e) => {
                self.infer(e, scope);
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_ty = self.infer(cond, scope);
                self.expect_condition(&cond_ty, cond.span);
                self.check_block(then_branch, scope);
                if let Some(else_branch) = else_branch {
                    self.check_block(else_branch, scope);
                }
            }
            StmtKind::While { cond, body } => {
                let cond_ty = self.infer(cond, scope);
                self.expect_condition(&cond_ty, cond.span);
                self.loop_depth += 1;
                self.check_block(body, scope);
                self.loop_depth -= 1;
            }
            StmtKind::DoWhile { body, cond } => {
                self.loop_depth += 1;
                self.check_block(body, scope);
                self.loop_depth -= 1;
                let cond_ty = self.infer(cond, scope);
                self.expect_condition(&cond_ty, cond.span);
            }
            StmtKind::For {
                var,
                start,
                end,
                step,
                body,
                ..
            } => {
                let start_ty = self.infer(start, scope);
                self.infer(end, scope);
                if let Some(step) = step {
                    self.infer(step, scope);
                }
                let loop_scope = self.symbols.push_scope(scope);
                self.symbols.declare(
                    loop_scope,
                    Symbol {
                        name: var.clone(),
                        kind: SymbolKind::Local,
                        declared_at: stmt.id(),
                        span: stmt.span,
                        ty: if start_ty.is_word_sized() {
                            Type::Word
                        } else {
                            Type::Byte
                        },
                        param_types: Vec::new(),
                        is_const: false,
                        is_exported: false,
                    },
                );
                self.loop_depth += 1;
                self.check_block(body, loop_scope);
                self.loop_depth -= 1;
            }
            StmtKind::Switch {
                value,
                cases,
                default,
            } => {
                self.infer(value, scope);
                // `Switch::default` is a single `Option`, so the AST itself
                // already rules out more than one default block; a second
                // `default:` label at the source level must have been
                // rejected (or merged) upstream in the parser. Duplicate
                // case *values* are the one remaining way a switch can be
                // ambiguous at this representation, so that's what gets
                // reported under the same diagnostic code.
                let mut seen_values: Vec<i64> = Vec::new();
                for case in cases {
                    self.infer(&case.value, scope);
                    if let ExprKind::Literal(sixtyc_ast::Literal::Number(n)) = &case.value.kind {
                        if seen_values.contains(n) {
                            self.bag.push(Diagnostic::error(
                                codes::SEMA_MULTIPLE_DEFAULT,
                                format!("switch statement has more than one case for value {n}"),
                                case.value.span,
                            ));
                        } else {
                            seen_values.push(*n);
                        }
                    }
                    self.check_block(&case.body, scope);
                }
                if let Some(default) = default {
                    self.check_block(default, scope);
                }
            }
            StmtKind::Return(value) => {
                let actual = value
                    .as_ref()
                    .map(|e| self.infer(e, scope))
                    .unwrap_or(Type::Void);
                let expected_void = self.return_type == Type::Void;
                let actual_void = actual == Type::Void;
                if expected_void != actual_void {
                    self.bag.push(Diagnostic::error(
                        codes::SEMA_RETURN_TYPE_MISMATCH,
                        format!(
                            "function returns '{}' but this return statement {}",
                            self.return_type,
                            if actual_void {
                                "has no value"
                            } else {
                                "returns a value"
                            }
                        ),
                        stmt.span,
                    ));
                } else if !expected_void && !compatible(&self.return_type, &actual) {
                    self.bag.push(Diagnostic::error(
                        codes::SEMA_TYPE_MISMATCH,
                        format!(
                            "return value has type '{actual}', expected '{}'",
                            self.return_type
                        ),
                        stmt.span,
                    ));
                }
            }
            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    let what = if matches!(stmt.kind, StmtKind::Break) {
                        "break"
                    } else {
                        "continue"
                    };
                    self.bag.push(Diagnostic::error(
                        codes::SEMA_LOOP_CONTROL_OUTSIDE_LOOP,
                        format!("'{what}' used outside of a loop"),
                        stmt.span,
                    ));
                }
            }
            StmtKind::Block(stmts) => {
                let inner = self.symbols.push_scope(scope);
                self.check_block(stmts, inner);
            }
            StmtKind::LocalVariable {
                name,
                type_annotation,
                initializer,
                is_const,
            } => {
                let inferred = initializer.as_ref().map(|e| self.infer(e, scope));
                let ty = type_annotation.clone().or(inferred.clone()).unwrap_or(Type::Word);
                if let (Some(ann), Some(init_ty)) = (type_annotation, &inferred) {
                    if !compatible(ann, init_ty) {
                        self.bag.push(Diagnostic::error(
                            codes::SEMA_TYPE_MISMATCH,
                            format!(
                                "cannot initialize '{name}' of type '{ann}' with a value of type '{init_ty}'"
                            ),
                            stmt.span,
                        ));
                    }
                }
                self.symbols.declare(
                    scope,
                    Symbol {
                        name: name.clone(),
                        kind: SymbolKind::Local,
                        declared_at: stmt.id(),
                        span: stmt.span,
                        ty,
                        param_types: Vec::new(),
                        is_const: *is_const,
                        is_exported: false,
                    },
                );
            }
        }
    }

    fn expect_condition(&mut self, ty: &Type, span: Span) {
        if !matches!(ty, Type::Bool) && !ty.is_numeric() {
            self.bag.push(Diagnostic::error(
                codes::SEMA_TYPE_MISMATCH,
                format!("condition has type '{ty}', expected a boolean or numeric value"),
                span,
            ));
        }
    }

    /// Infer an expression's static type, reporting undefined-variable and
    /// type-mismatch diagnostics along the way. Best-effort on error: a
    /// type is always returned (falling back to the operand's own type, or
    /// `Type::Word`) so that surrounding checks can continue without
    /// cascading unrelated errors from one bad subexpression.
    fn infer(&mut self, expr: &Expr, scope: ScopeId) -> Type {
        match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                sixtyc_ast::Literal::Number(n) => {
                    if *n >= 0 && *n <= u8::MAX as i64 {
                        Type::Byte
                    } else {
                        Type::Word
                    }
                }
                sixtyc_ast::Literal::Str(_) => Type::Byte.pointer_to(),
                sixtyc_ast::Literal::Bool(_) => Type::Bool,
            },
            ExprKind::Identifier(name) => match self.symbols.lookup(scope, name) {
                Some(sym) => sym.ty.clone(),
                None => {
                    self.bag.push(Diagnostic::error(
                        codes::SEMA_UNDEFINED_VARIABLE,
                        format!("undefined variable '{name}'"),
                        expr.span,
                    ));
                    Type::Word
                }
            },
            ExprKind::Binary { op, left, right } => {
                let lt = self.infer(left, scope);
                let rt = self.infer(right, scope);
                self.check_binary(*op, &lt, &rt, expr.span)
            }
            ExprKind::Unary { op, operand } => {
                let ty = self.infer(operand, scope);
                match op {
                    UnaryOp::LogicalNot => Type::Bool,
                    UnaryOp::AddressOf => ty.pointer_to(),
                    UnaryOp::Neg | UnaryOp::BitNot => ty,
                }
            }
            ExprKind::Call { callee, args } => {
                for arg in args {
                    self.infer(arg, scope);
                }
                if INTRINSICS.contains(&callee.as_str()) {
                    return intrinsic_return_type(callee);
                }
                match self.symbols.lookup(scope, callee) {
                    Some(sym) if sym.kind == SymbolKind::Function => {
                        if sym.param_types.len() != args.len() {
                            self.bag.push(Diagnostic::error(
                                codes::SEMA_TYPE_MISMATCH,
                                format!(
                                    "function '{callee}' expects {} argument(s), found {}",
                                    sym.param_types.len(),
                                    args.len()
                                ),
                                expr.span,
                            ));
                        }
                        sym.ty.clone()
                    }
                    _ => {
                        self.bag.push(Diagnostic::error(
                            codes::SEMA_UNDEFINED_VARIABLE,
                            format!("call to undefined function '{callee}'"),
                            expr.span,
                        ));
                        Type::Word
                    }
                }
            }
            ExprKind::Index { object, index } => {
                let index_ty = self.infer(index, scope);
                if !index_ty.is_numeric() {
                    self.bag.push(Diagnostic::error(
                        codes::SEMA_TYPE_MISMATCH,
                        format!("array index has non-numeric type '{index_ty}'"),
                        index.span,
                    ));
                }
                match self.infer(object, scope) {
                    Type::Array(elem, _) => *elem,
                    Type::Pointer(elem) => *elem,
                    other => {
                        self.bag.push(Diagnostic::error(
                            codes::SEMA_TYPE_MISMATCH,
                            format!("cannot index a value of type '{other}'"),
                            object.span,
                        ));
                        Type::Byte
                    }
                }
            }
            ExprKind::Assignment { target, op, value } => {
                let target_ty = self.infer(target, scope);
                let value_ty = self.infer(value, scope);
                let effective = match op {
                    Some(bin_op) => self.check_binary(*bin_op, &target_ty, &value_ty, expr.span),
                    None => value_ty,
                };
                if !compatible(&target_ty, &effective) {
                    self.bag.push(Diagnostic::error(
                        codes::SEMA_TYPE_MISMATCH,
                        format!(
                            "cannot assign a value of type '{effective}' to a target of type '{target_ty}'"
                        ),
                        expr.span,
                    ));
                }
                if !matches!(target.kind, ExprKind::Identifier(_) | ExprKind::Index { .. }) {
                    self.bag.push(Diagnostic::error(
                        codes::SEMA_TYPE_MISMATCH,
                        "assignment target must be a variable or array element",
                        target.span,
                    ));
                }
                target_ty
            }
            ExprKind::Member { object, .. } => {
                self.infer(object, scope);
                Type::Byte
            }
        }
    }

    fn check_binary(&mut self, op: BinOp, lt: &Type, rt: &Type, span: Span) -> Type {
        let is_logical = matches!(op, BinOp::LogicalAnd | BinOp::LogicalOr);
        let is_comparison = matches!(
            op,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        );
        if is_logical {
            if !matches!(lt, Type::Bool) || !matches!(rt, Type::Bool) {
                self.bag.push(Diagnostic::error(
                    codes::SEMA_TYPE_MISMATCH,
                    format!("logical operator requires boolean operands, found '{lt}' and '{rt}'"),
                    span,
                ));
            }
            return Type::Bool;
        }
        if !lt.is_numeric() || !rt.is_numeric() {
            self.bag.push(Diagnostic::error(
                codes::SEMA_TYPE_MISMATCH,
                format!("operator requires numeric operands, found '{lt}' and '{rt}'"),
                span,
            ));
            return if is_comparison { Type::Bool } else { lt.clone() };
        }
        if is_comparison {
            return Type::Bool;
        }
        if lt.is_word_sized() || rt.is_word_sized() {
            Type::Word
        } else {
            Type::Byte
        }
    }
}

/// Are two types assignable/comparable without an explicit cast? Numeric
/// types freely widen and narrow (the IL generator inserts the
/// `ZeroExtend`/`Truncate` conversion, `spec.md` section 3); every other
/// pair must match exactly.
fn compatible(a: &Type, b: &Type) -> bool {
    if a == b {
        return true;
    }
    a.is_numeric() && b.is_numeric()
}

fn intrinsic_return_type(name: &str) -> Type {
    match name {
        "peek" | "lo" | "hi" | "sizeof" | "length" => Type::Byte,
        "peekw" => Type::Word,
        "poke" | "pokew" | "sei" | "cli" | "nop" | "brk" | "pha" | "pla" | "php" | "plp"
        | "barrier" | "volatile_write" => Type::Void,
        "volatile_read" => Type::Byte,
        _ => Type::Void,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sixtyc_ast::{NodeIdGen, Param};

    fn span() -> Span {
        Span::synthetic()
    }

    fn make_function(
        gen: &mut NodeIdGen,
        name: &str,
        params: Vec<Param>,
        return_type: Type,
        body: Vec<Stmt>,
    ) -> Decl {
        sixtyc_ast::Node::new(
            gen.next(),
            span(),
            DeclKind::Function {
                name: name.to_string(),
                params,
                return_type,
                body: Some(body),
                is_exported: false,
                is_callback: false,
            },
        )
    }

    fn module(decls: Vec<Decl>) -> Decl {
        let mut gen = NodeIdGen::new();
        sixtyc_ast::Node::new(
            gen.next(),
            span(),
            DeclKind::Module {
                name: "m".to_string(),
                decls,
            },
        )
    }

    fn ident(gen: &mut NodeIdGen, name: &str) -> Expr {
        sixtyc_ast::Node::new(gen.next(), span(), ExprKind::Identifier(name.to_string()))
    }

    fn number(gen: &mut NodeIdGen, n: i64) -> Expr {
        sixtyc_ast::Node::new(
            gen.next(),
            span(),
            ExprKind::Literal(sixtyc_ast::Literal::Number(n)),
        )
    }

    fn expr_stmt(gen: &mut NodeIdGen, e: Expr) -> Stmt {
        sixtyc_ast::Node::new(gen.next(), span(), StmtKind::ExpressionStmt(e))
    }

    #[test]
    fn undefined_variable_is_reported() {
        let mut gen = NodeIdGen::new();
        let body = vec![expr_stmt(&mut gen, ident(&mut gen, "missing"))];
        let f = make_function(&mut gen, "f", vec![], Type::Void, body);
        let m = module(vec![f]);
        let (_, bag) = resolve(&m);
        assert!(bag.has_errors());
        assert_eq!(bag.iter().next().unwrap().code, codes::SEMA_UNDEFINED_VARIABLE);
    }

    #[test]
    fn break_outside_loop_is_reported() {
        let mut gen = NodeIdGen::new();
        let brk: Stmt = sixtyc_ast::Node::new(gen.next(), span(), StmtKind::Break);
        let f = make_function(&mut gen, "f", vec![], Type::Void, vec![brk]);
        let m = module(vec![f]);
        let (_, bag) = resolve(&m);
        assert!(bag.has_errors());
        assert_eq!(
            bag.iter().next().unwrap().code,
            codes::SEMA_LOOP_CONTROL_OUTSIDE_LOOP
        );
    }

    #[test]
    fn return_value_from_void_function_is_reported() {
        let mut gen = NodeIdGen::new();
        let value = number(&mut gen, 1);
        let ret: Stmt = sixtyc_ast::Node::new(gen.next(), span(), StmtKind::Return(Some(value)));
        let f = make_function(&mut gen, "f", vec![], Type::Void, vec![ret]);
        let m = module(vec![f]);
        let (_, bag) = resolve(&m);
        assert!(bag.has_errors());
        assert_eq!(
            bag.iter().next().unwrap().code,
            codes::SEMA_RETURN_TYPE_MISMATCH
        );
    }

    #[test]
    fn well_formed_function_resolves_cleanly() {
        let mut gen = NodeIdGen::new();
        let param = Param {
            name: "x".to_string(),
            ty: Type::Byte,
        };
        let ret: Stmt = sixtyc_ast::Node::new(
            gen.next(),
            span(),
            StmtKind::Return(Some(ident(&mut gen, "x"))),
        );
        let f = make_function(&mut gen, "f", vec![param], Type::Byte, vec![ret]);
        let m = module(vec![f]);
        let (_, bag) = resolve(&m);
        assert!(!bag.has_errors());
    }

    #[test]
    fn two_switches_each_with_one_default_are_both_clean() {
        let mut gen = NodeIdGen::new();
        let value = number(&mut gen, 1);
        let case = sixtyc_ast::SwitchCase {
            value: number(&mut gen, 1),
            body: vec![],
        };
        let switch: Stmt = sixtyc_ast::Node::new(
            gen.next(),
            span(),
            StmtKind::Switch {
                value,
                cases: vec![case],
                default: Some(vec![]),
            },
        );
        let value2 = number(&mut gen, 2);
        let case2 = sixtyc_ast::SwitchCase {
            value: number(&mut gen, 2),
            body: vec![],
        };
        let switch2: Stmt = sixtyc_ast::Node::new(
            gen.next(),
            span(),
            StmtKind::Switch {
                value: value2,
                cases: vec![case2],
                default: Some(vec![]),
            },
        );
        let f = make_function(&mut gen, "f", vec![], Type::Void, vec![switch, switch2]);
        let m = module(vec![f]);
        let (_, bag) = resolve(&m);
        // Sibling switches must not share duplicate-case-value tracking.
        assert!(!bag.iter().any(|d| d.code == codes::SEMA_MULTIPLE_DEFAULT));
    }

    #[test]
    fn duplicate_case_value_in_one_switch_is_reported() {
        let mut gen = NodeIdGen::new();
        let value = number(&mut gen, 1);
        let case_a = sixtyc_ast::SwitchCase {
            value: number(&mut gen, 7),
            body: vec![],
        };
        let case_b = sixtyc_ast::SwitchCase {
            value: number(&mut gen, 7),
            body: vec![],
        };
        let switch: Stmt = sixtyc_ast::Node::new(
            gen.next(),
            span(),
            StmtKind::Switch {
                value,
                cases: vec![case_a, case_b],
                default: None,
            },
        );
        let f = make_function(&mut gen, "f", vec![], Type::Void, vec![switch]);
        let m = module(vec![f]);
        let (_, bag) = resolve(&m);
        assert!(bag.iter().any(|d| d.code == codes::SEMA_MULTIPLE_DEFAULT));
    }
}
