//! IL generation: lowers the AST plus the symbol table built by
//! [`crate::resolve`] into `sixtyc-ir`'s linear, not-SSA-at-rest IL,
//! `spec.md` section 4.6. Also serves as the control-flow graph builder
//! of section 4.3 -- block creation and sealing happen inline with
//! expression/statement lowering rather than as a separate pass, since
//! the statement walk the spec describes for "CFG construction" is, for
//! this IL, identical to the walk that has to emit instructions anyway.
//! `sixtyc_ir::ControlFlowGraph::compute` is run afterward by callers that
//! need predecessor/successor edges (SSA construction, dataflow
//! analyses); this module only needs to know the block it's currently
//! appending to.
//!
//! Grounded on `cranelift-frontend::FunctionBuilder`'s block-sealing
//! discipline (a "current block" cursor, `switch_to_block`-style control
//! transfer at structural boundaries), adapted from Cranelift's
//! block-parameter SSA-on-the-fly model back to this compiler's
//! named-variable linear IL, since `sixtyc_ssa` runs SSA construction as
//! its own later pass instead (see that crate's module doc comment).

use crate::resolve::{ModuleResolution, INTRINSICS};
use rustc_hash::FxHashMap;
use sixtyc_ast::{BinOp, Decl, DeclKind, Expr, ExprKind, Literal, Stmt, StmtKind, UnaryOp};
use sixtyc_diagnostics::{codes, Diagnostic, DiagnosticBag, Span};
use sixtyc_ir::{BinOpcode, BlockId, ConstValue, ConvertOpcode, CpuIntrinsic, Function, IlParam, Module, Opcode, RegId, Type, UnaryOpcode};

/// Lower a resolved module to IL. `resolution` is consulted only for
/// global symbol types; per-function local scoping is rebuilt here since
/// the linear IL's `local_variables` map is flat (one slot per name, no
/// nested shadowing -- see the per-function note below).
pub fn generate_module(ast: &Decl, resolution: &ModuleResolution) -> (Module, DiagnosticBag) {
    let mut bag = DiagnosticBag::new();
    let DeclKind::Module { name, decls } = &ast.kind else {
        return (Module::new("<unknown>"), bag);
    };
    let mut module = Module::new(name.clone());

    for decl in decls {
        if let DeclKind::Variable {
            name,
            type_annotation,
            initializer,
            is_exported,
            ..
        } = &decl.kind
        {
            module.globals.push(sixtyc_ir::Global {
                name: name.clone(),
                ty: type_annotation.clone().unwrap_or(Type::Word),
                has_initializer: initializer.is_some(),
                is_exported: *is_exported,
            });
        }
    }

    for decl in decls {
        if let DeclKind::Function {
            name,
            params,
            return_type,
            body: Some(body),
            is_exported,
            is_callback,
        } = &decl.kind
        {
            let (mut func, fn_bag) = generate_function(name, params, return_type, body, resolution);
            func.is_exported = *is_exported;
            func.is_callback = *is_callback;
            bag.extend(fn_bag);
            module.declare_function(func);
        }
    }

    if module.functions.contains_key("main") {
        module.entry_point = Some("main".to_string());
    }

    (module, bag)
}

fn generate_function(
    name: &str,
    params: &[sixtyc_ast::Param],
    return_type: &Type,
    body: &[Stmt],
    resolution: &ModuleResolution,
) -> (Function, DiagnosticBag) {
    let il_params: Vec<IlParam> = params
        .iter()
        .map(|p| IlParam {
            name: p.name.clone(),
            ty: p.ty.clone(),
        })
        .collect();
    let mut func = Function::new(name, il_params, return_type.clone());
    let entry = func.entry_block;

    let mut builder = FunctionBuilder {
        func: &mut func,
        cur_block: entry,
        var_types: FxHashMap::default(),
        loop_stack: Vec::new(),
        resolution,
        bag: DiagnosticBag::new(),
    };

    // Parameters are free-standing registers with no defining instruction
    // (`sixtyc_ssa::verify` treats a register absent from its def-site map
    // as a parameter that dominates everything); the entry block's very
    // first instructions bind each one to its name via `StoreVar`, which
    // is what seeds SSA renaming's per-variable stack for parameters
    // (`sixtyc_ssa::construct`'s `definition_blocks`).
    for param in params {
        let reg = builder.func.new_register(param.ty.clone(), Some(param.name.clone()));
        builder.var_types.insert(param.name.clone(), param.ty.clone());
        builder.push_inst(Opcode::StoreVar { name: param.name.clone(), value: reg }, None, Span::synthetic());
    }

    builder.generate_block(body);
    if !builder.is_sealed() {
        let ret = if *return_type == Type::Void { None } else {
            // Falling off the end of a non-void function with no explicit
            // `return` has no well-defined value; emit a zeroed return so
            // every block stays terminated (`spec.md` section 3's
            // invariant), matching the return-type-mismatch check already
            // having flagged this in `resolve::resolve`.
            Some(builder.push_inst(
                Opcode::Const(zero_const(return_type)),
                Some(return_type.clone()),
                Span::synthetic(),
            ))
        };
        builder.push_inst(Opcode::Return { value: ret }, None, Span::synthetic());
    }

    let bag = builder.bag;
    (func, bag)
}

fn zero_const(ty: &Type) -> ConstValue {
    match ty {
        Type::Bool => ConstValue::Bool(false),
        Type::Word | Type::Pointer(_) => ConstValue::Word(0),
        _ => ConstValue::Byte(0),
    }
}

struct LoopTargets {
    continue_block: BlockId,
    break_block: BlockId,
}

struct FunctionBuilder<'a> {
    func: &'a mut Function,
    cur_block: BlockId,
    // Flat name -> type map covering every local and parameter declared
    // anywhere in the function. The source language's block scoping is
    // fully checked by `resolve::resolve`'s hierarchical symbol table; by
    // the time IL generation runs, a second declaration of the same name
    // in a sibling or nested scope simply reuses one storage slot, since
    // `sixtyc_ir::Function::local_variables` (like the rest of this
    // linear IL) is name-keyed and flat. This only matters for programs
    // that shadow a name across scopes, which `spec.md`'s own example
    // programs (section 8) never do.
    var_types: FxHashMap<String, Type>,
    loop_stack: Vec<LoopTargets>,
    resolution: &'a ModuleResolution,
    bag: DiagnosticBag,
}

impl FunctionBuilder<'_> {
    fn is_sealed(&self) -> bool {
        self.func.blocks[self.cur_block].is_sealed()
    }

    fn new_block(&mut self, label: &str) -> BlockId {
        self.func.new_block(label)
    }

    fn push_inst(&mut self, opcode: Opcode, ty: Option<Type>, span: Span) -> RegId {
        self.func
            .push_inst(self.cur_block, opcode, ty, span)
            .expect("result type was provided")
    }

    fn push_void(&mut self, opcode: Opcode, span: Span) {
        self.func.push_inst(self.cur_block, opcode, None, span);
    }

    fn jump_to(&mut self, target: BlockId) {
        if !self.is_sealed() {
            self.push_void(Opcode::Jump { target }, Span::synthetic());
        }
    }

    /// Static type of a declared name (local, parameter, or global).
    fn type_of(&self, name: &str) -> Type {
        if let Some(ty) = self.var_types.get(name) {
            return ty.clone();
        }
        self.resolution
            .symbols
            .lookup(self.resolution.root, name)
            .map(|s| s.ty.clone())
            .unwrap_or(Type::Word)
    }

    fn generate_block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            if self.is_sealed() {
                self.bag.push(Diagnostic::warning(
                    codes::DEAD_CODE_UNREACHABLE,
                    "unreachable statement",
                    stmt.span,
                ));
                continue;
            }
            self.generate_stmt(stmt);
        }
    }

    fn generate_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::ExpressionStmt(e) => {
                self.lower_expr(e);
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_reg = self.lower_condition(cond);
                let then_block = self.new_block("then");
                let else_block = self.new_block("else");
                let merge = self.new_block("merge");
                self.push_void(
                    Opcode::Branch {
                        cond: cond_reg,
                        then_block,
                        else_block,
                    },
                    stmt.span,
                );

                self.cur_block = then_block;
                self.generate_block(then_branch);
                self.jump_to(merge);

                self.cur_block = else_block;
                if let Some(else_branch) = else_branch {
                    self.generate_block(else_branch);
                }
                self.jump_to(merge);

                self.cur_block = merge;
            }
            StmtKind::While { cond, body } => {
                let header = self.new_block("header");
                let loop_body = self.new_block("body");
                let exit = self.new_block("exit");
                self.jump_to(header);

                self.cur_block = header;
                let cond_reg = self.lower_condition(cond);
                self.push_void(
                    Opcode::Branch {
                        cond: cond_reg,
                        then_block: loop_body,
                        else_block: exit,
                    },
                    stmt.span,
                );

                self.cur_block = loop_body;
                self.loop_stack.push(LoopTargets {
                    continue_block: header,
                    break_block: exit,
                });
                self.generate_block(body);
                self.loop_stack.pop();
                self.jump_to(header);

                self.cur_block = exit;
            }
            StmtKind::DoWhile { body, cond } => {
                let loop_body = self.new_block("body");
                let cond_check = self.new_block("cond");
                let exit = self.new_block("exit");
                self.jump_to(loop_body);

                self.cur_block = loop_body;
                self.loop_stack.push(LoopTargets {
                    continue_block: cond_check,
                    break_block: exit,
                });
                self.generate_block(body);
                self.loop_stack.pop();
                self.jump_to(cond_check);

                self.cur_block = cond_check;
                let cond_reg = self.lower_condition(cond);
                self.push_void(
                    Opcode::Branch {
                        cond: cond_reg,
                        then_block: loop_body,
                        else_block: exit,
                    },
                    stmt.span,
                );

                self.cur_block = exit;
            }
            StmtKind::For {
                var,
                start,
                end,
                direction,
                step,
                body,
            } => {
                let start_reg = self.lower_expr(start);
                let var_ty = self.func.registers[start_reg].ty.clone();
                self.var_types.insert(var.clone(), var_ty.clone());
                self.push_void(
                    Opcode::StoreVar {
                        name: var.clone(),
                        value: start_reg,
                    },
                    stmt.span,
                );
                let end_reg = self.lower_expr(end);

                let header = self.new_block("header");
                let loop_body = self.new_block("body");
                let exit = self.new_block("exit");
                self.jump_to(header);

                self.cur_block = header;
                let cur = self.push_inst(Opcode::LoadVar { name: var.clone() }, Some(var_ty.clone()), stmt.span);
                let op = match direction {
                    sixtyc_ast::ForDirection::Up => BinOpcode::CmpLe,
                    sixtyc_ast::ForDirection::Down => BinOpcode::CmpGe,
                };
                let cond = self.push_inst(
                    Opcode::Binary {
                        op,
                        left: cur,
                        right: end_reg,
                    },
                    Some(Type::Bool),
                    stmt.span,
                );
                self.push_void(
                    Opcode::Branch {
                        cond,
                        then_block: loop_body,
                        else_block: exit,
                    },
                    stmt.span,
                );

                self.cur_block = loop_body;
                self.loop_stack.push(LoopTargets {
                    continue_block: header,
                    break_block: exit,
                });
                self.generate_block(body);
                self.loop_stack.pop();
                if !self.is_sealed() {
                    let cur = self.push_inst(Opcode::LoadVar { name: var.clone() }, Some(var_ty.clone()), stmt.span);
                    let step_reg = match step {
                        Some(step_expr) => self.lower_expr(step_expr),
                        None => self.push_inst(
                            Opcode::Const(one_const(&var_ty)),
                            Some(var_ty.clone()),
                            stmt.span,
                        ),
                    };
                    let step_op = match direction {
                        sixtyc_ast::ForDirection::Up => BinOpcode::Add,
                        sixtyc_ast::ForDirection::Down => BinOpcode::Sub,
                    };
                    let next = self.push_inst(
                        Opcode::Binary {
                            op: step_op,
                            left: cur,
                            right: step_reg,
                        },
                        Some(var_ty.clone()),
                        stmt.span,
                    );
                    self.push_void(
                        Opcode::StoreVar {
                            name: var.clone(),
                            value: next,
                        },
                        stmt.span,
                    );
                }
                self.jump_to(header);

                self.cur_block = exit;
            }
            StmtKind::Switch {
                value,
                cases,
                default,
            } => {
                let value_reg = self.lower_expr(value);
                let value_ty = self.func.registers[value_reg].ty.clone();
                let merge = self.new_block("merge");

                for case in cases {
                    let case_reg = self.lower_expr(&case.value);
                    let eq = self.push_inst(
                        Opcode::Binary {
                            op: BinOpcode::CmpEq,
                            left: value_reg,
                            right: case_reg,
                        },
                        Some(Type::Bool),
                        case.value.span,
                    );
                    let case_block = self.new_block("case");
                    let next_test = self.new_block("case");
                    self.push_void(
                        Opcode::Branch {
                            cond: eq,
                            then_block: case_block,
                            else_block: next_test,
                        },
                        case.value.span,
                    );

                    self.cur_block = case_block;
                    self.generate_block(&case.body);
                    self.jump_to(merge);

                    self.cur_block = next_test;
                }
                let _ = value_ty;

                if let Some(default) = default {
                    self.generate_block(default);
                }
                self.jump_to(merge);

                self.cur_block = merge;
            }
            StmtKind::Return(value) => {
                let reg = value.as_ref().map(|e| self.lower_expr(e));
                self.push_void(Opcode::Return { value: reg }, stmt.span);
            }
            StmtKind::Break => {
                if let Some(target) = self.loop_stack.last().map(|l| l.break_block) {
                    self.jump_to(target);
                }
            }
            StmtKind::Continue => {
                if let Some(target) = self.loop_stack.last().map(|l| l.continue_block) {
                    self.jump_to(target);
                }
            }
            StmtKind::Block(stmts) => self.generate_block(stmts),
            StmtKind::LocalVariable {
                name,
                type_annotation,
                initializer,
                ..
            } => {
                let value_reg = initializer.as_ref().map(|e| self.lower_expr(e));
                let ty = type_annotation
                    .clone()
                    .or_else(|| value_reg.map(|r| self.func.registers[r].ty.clone()))
                    .unwrap_or(Type::Word);
                self.var_types.insert(name.clone(), ty.clone());
                self.func.local_variables.insert(name.clone(), ty.clone());
                if let Some(mut value_reg) = value_reg {
                    value_reg = self.coerce(value_reg, &ty, stmt.span);
                    self.push_void(
                        Opcode::StoreVar {
                            name: name.clone(),
                            value: value_reg,
                        },
                        stmt.span,
                    );
                } else {
                    let zero = self.push_inst(Opcode::Const(zero_const(&ty)), Some(ty.clone()), stmt.span);
                    self.push_void(Opcode::StoreVar { name: name.clone(), value: zero }, stmt.span);
                }
            }
        }
    }

    /// Lower `cond` and ensure the result is `Bool` (a byte condition is
    /// coerced via `ByteToBool` -- "nonzero is true" -- the same rule
    /// `resolve::CheckCtx::expect_condition` used to accept it).
    fn lower_condition(&mut self, cond: &Expr) -> RegId {
        let reg = self.lower_expr(cond);
        if self.func.registers[reg].ty == Type::Bool {
            return reg;
        }
        self.push_inst(
            Opcode::Convert {
                op: ConvertOpcode::ByteToBool,
                operand: reg,
            },
            Some(Type::Bool),
            cond.span,
        )
    }

    /// Insert a widening/narrowing conversion if `reg`'s type doesn't
    /// already match `target`, per `spec.md` section 4.6's implicit
    /// numeric coercions.
    fn coerce(&mut self, reg: RegId, target: &Type, span: Span) -> RegId {
        let actual = self.func.registers[reg].ty.clone();
        if actual == *target {
            return reg;
        }
        match (&actual, target) {
            (Type::Byte, Type::Word) => self.push_inst(
                Opcode::Convert {
                    op: ConvertOpcode::ZeroExtend,
                    operand: reg,
                },
                Some(Type::Word),
                span,
            ),
            (Type::Word, Type::Byte) => self.push_inst(
                Opcode::Convert {
                    op: ConvertOpcode::Truncate,
                    operand: reg,
                },
                Some(Type::Byte),
                span,
            ),
            (Type::Bool, Type::Byte) | (Type::Bool, Type::Word) => {
                let byte = self.push_inst(
                    Opcode::Convert {
                        op: ConvertOpcode::BoolToByte,
                        operand: reg,
                    },
                    Some(Type::Byte),
                    span,
                );
                self.coerce(byte, target, span)
            }
            (Type::Byte, Type::Bool) | (Type::Word, Type::Bool) => self.push_inst(
                Opcode::Convert {
                    op: ConvertOpcode::ByteToBool,
                    operand: reg,
                },
                Some(Type::Bool),
                span,
            ),
            _ => reg,
        }
    }

    fn lower_expr(&mut self, expr: &Expr) -> RegId {
        match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Number(n) => {
                    if *n >= 0 && *n <= u8::MAX as i64 {
                        self.push_inst(Opcode::Const(ConstValue::Byte(*n as u8)), Some(Type::Byte), expr.span)
                    } else {
                        self.push_inst(
                            Opcode::Const(ConstValue::Word(*n as u16)),
                            Some(Type::Word),
                            expr.span,
                        )
                    }
                }
                Literal::Bool(b) => {
                    self.push_inst(Opcode::Const(ConstValue::Bool(*b)), Some(Type::Bool), expr.span)
                }
                Literal::Str(s) => {
                    // Strings aren't a first-class IL type; lower to the
                    // byte length of the literal as a best-effort
                    // placeholder, matching the code generator's pattern
                    // of degrading gracefully on constructs the IL can't
                    // represent directly instead of aborting generation.
                    self.push_inst(
                        Opcode::Const(ConstValue::Byte(s.len().min(255) as u8)),
                        Some(Type::Byte),
                        expr.span,
                    )
                }
            },
            ExprKind::Identifier(name) => {
                let ty = self.type_of(name);
                self.push_inst(Opcode::LoadVar { name: name.clone() }, Some(ty), expr.span)
            }
            ExprKind::Binary { op, left, right } => self.lower_binary(*op, left, right, expr.span),
            ExprKind::Unary { op, operand } => {
                let reg = self.lower_expr(operand);
                match op {
                    UnaryOp::Neg => {
                        let ty = self.func.registers[reg].ty.clone();
                        self.push_inst(Opcode::Unary { op: UnaryOpcode::Neg, operand: reg }, Some(ty), expr.span)
                    }
                    UnaryOp::BitNot => {
                        let ty = self.func.registers[reg].ty.clone();
                        self.push_inst(
                            Opcode::Unary { op: UnaryOpcode::BitNot, operand: reg },
                            Some(ty),
                            expr.span,
                        )
                    }
                    UnaryOp::LogicalNot => {
                        let cond = self.lower_condition(operand);
                        self.push_inst(
                            Opcode::Unary { op: UnaryOpcode::LogicalNot, operand: cond },
                            Some(Type::Bool),
                            expr.span,
                        )
                    }
                    UnaryOp::AddressOf => {
                        // No explicit "address-of" IL opcode exists; the
                        // operand register already stands for the
                        // variable's value, so escape analysis (which
                        // observes `UnaryOp::AddressOf` directly on the
                        // AST, not through IL) is what actually reacts to
                        // this operator. At the IL level we pass the
                        // value through unchanged.
                        reg
                    }
                }
            }
            ExprKind::Call { callee, args } => self.lower_call(callee, args, expr.span),
            ExprKind::Index { object, index } => {
                let name = match &object.kind {
                    ExprKind::Identifier(name) => name.clone(),
                    _ => {
                        self.bag.push(Diagnostic::error(
                            codes::SEMA_TYPE_MISMATCH,
                            "array index target must be a plain variable name",
                            object.span,
                        ));
                        String::new()
                    }
                };
                let elem_ty = match self.type_of(&name) {
                    Type::Array(elem, _) => *elem,
                    Type::Pointer(elem) => *elem,
                    _ => Type::Byte,
                };
                let index_reg = self.lower_expr(index);
                self.push_inst(
                    Opcode::LoadArray {
                        name,
                        index: index_reg,
                        elem_ty: elem_ty.clone(),
                    },
                    Some(elem_ty),
                    expr.span,
                )
            }
            ExprKind::Assignment { target, op, value } => self.lower_assignment(target, *op, value, expr.span),
            ExprKind::Member { object, field } => {
                if field == "length" {
                    if let Type::Array(_, Some(len)) = self.infer_expr_type(object) {
                        return self.push_inst(
                            Opcode::Const(ConstValue::Byte(len.min(255) as u8)),
                            Some(Type::Byte),
                            expr.span,
                        );
                    }
                }
                self.bag.push(Diagnostic::warning(
                    codes::SEMA_TYPE_MISMATCH,
                    format!("unsupported member access '.{field}'"),
                    expr.span,
                ));
                self.push_inst(Opcode::Const(ConstValue::Byte(0)), Some(Type::Byte), expr.span)
            }
        }
    }

    fn lower_binary(&mut self, op: BinOp, left: &Expr, right: &Expr, span: Span) -> RegId {
        if matches!(op, BinOp::LogicalAnd | BinOp::LogicalOr) {
            let l = self.lower_condition(left);
            let r = self.lower_condition(right);
            let opcode = if op == BinOp::LogicalAnd { BinOpcode::And } else { BinOpcode::Or };
            return self.push_inst(
                Opcode::Binary { op: opcode, left: l, right: r },
                Some(Type::Bool),
                span,
            );
        }
        let l = self.lower_expr(left);
        let r = self.lower_expr(right);
        let lt = self.func.registers[l].ty.clone();
        let rt = self.func.registers[r].ty.clone();
        let wide = if lt.is_word_sized() || rt.is_word_sized() { Type::Word } else { Type::Byte };
        let l = self.coerce(l, &wide, span);
        let r = self.coerce(r, &wide, span);
        let bin_op = to_bin_opcode(op);
        let result_ty = if bin_op.is_comparison() { Type::Bool } else { wide };
        self.push_inst(Opcode::Binary { op: bin_op, left: l, right: r }, Some(result_ty), span)
    }

    fn lower_assignment(&mut self, target: &Expr, op: Option<BinOp>, value: &Expr, span: Span) -> RegId {
        let mut value_reg = self.lower_expr(value);
        if let Some(op) = op {
            let current = self.lower_expr(target);
            let lt = self.func.registers[current].ty.clone();
            let rt = self.func.registers[value_reg].ty.clone();
            let wide = if lt.is_word_sized() || rt.is_word_sized() { Type::Word } else { Type::Byte };
            let l = self.coerce(current, &wide, span);
            let r = self.coerce(value_reg, &wide, span);
            let bin_op = to_bin_opcode(op);
            let result_ty = if bin_op.is_comparison() { Type::Bool } else { wide };
            value_reg = self.push_inst(Opcode::Binary { op: bin_op, left: l, right: r }, Some(result_ty), span);
        }

        match &target.kind {
            ExprKind::Identifier(name) => {
                let target_ty = self.type_of(name);
                let coerced = self.coerce(value_reg, &target_ty, span);
                self.push_void(
                    Opcode::StoreVar {
                        name: name.clone(),
                        value: coerced,
                    },
                    span,
                );
                coerced
            }
            ExprKind::Index { object, index } => {
                let name = match &object.kind {
                    ExprKind::Identifier(name) => name.clone(),
                    _ => {
                        self.bag.push(Diagnostic::error(
                            codes::SEMA_TYPE_MISMATCH,
                            "array index target must be a plain variable name",
                            object.span,
                        ));
                        String::new()
                    }
                };
                let elem_ty = match self.type_of(&name) {
                    Type::Array(elem, _) => *elem,
                    Type::Pointer(elem) => *elem,
                    _ => Type::Byte,
                };
                let index_reg = self.lower_expr(index);
                let coerced = self.coerce(value_reg, &elem_ty, span);
                self.push_void(
                    Opcode::StoreArray {
                        name,
                        index: index_reg,
                        value: coerced,
                    },
                    span,
                );
                coerced
            }
            _ => value_reg,
        }
    }

    fn lower_call(&mut self, callee: &str, args: &[Expr], span: Span) -> RegId {
        if INTRINSICS.contains(&callee) {
            return self.lower_intrinsic(callee, args, span);
        }
        let arg_regs: smallvec::SmallVec<[RegId; 4]> = args.iter().map(|a| self.lower_expr(a)).collect();
        let return_ty = self
            .resolution
            .symbols
            .lookup(self.resolution.root, callee)
            .map(|s| s.ty.clone())
            .unwrap_or(Type::Void);
        if return_ty == Type::Void {
            self.push_void(
                Opcode::Call {
                    name: callee.to_string(),
                    args: arg_regs,
                },
                span,
            );
            // Callers of `lower_expr` always need a register; synthesize
            // a zero value for a void call used in expression position
            // (`resolve::resolve` already flags this as a type mismatch
            // if the value is actually used meaningfully).
            self.push_inst(Opcode::Const(ConstValue::Byte(0)), Some(Type::Byte), span)
        } else {
            self.func
                .push_inst(
                    self.cur_block,
                    Opcode::Call {
                        name: callee.to_string(),
                        args: arg_regs,
                    },
                    Some(return_ty),
                    span,
                )
                .expect("non-void call always produces a result")
        }
    }

    fn lower_intrinsic(&mut self, name: &str, args: &[Expr], span: Span) -> RegId {
        match name {
            "sei" | "cli" | "nop" | "brk" | "pha" | "pla" | "php" | "plp" => {
                let cpu = match name {
                    "sei" => CpuIntrinsic::Sei,
                    "cli" => CpuIntrinsic::Cli,
                    "nop" => CpuIntrinsic::Nop,
                    "brk" => CpuIntrinsic::Brk,
                    "pha" => CpuIntrinsic::Pha,
                    "pla" => CpuIntrinsic::Pla,
                    "php" => CpuIntrinsic::Php,
                    _ => CpuIntrinsic::Plp,
                };
                self.push_void(Opcode::Intrinsic(cpu), span);
                self.push_inst(Opcode::Const(ConstValue::Byte(0)), Some(Type::Byte), span)
            }
            // A reordering/optimization barrier. This compiler performs
            // no instruction scheduling that could reorder across it, so
            // it's lowered to an explicit `Nop` purely so it remains
            // visible in the emitted assembly rather than vanishing
            // silently.
            "barrier" => {
                self.push_void(Opcode::Intrinsic(CpuIntrinsic::Nop), span);
                self.push_inst(Opcode::Const(ConstValue::Byte(0)), Some(Type::Byte), span)
            }
            "peek" | "volatile_read" => {
                let addr = self.const_address(args.first(), span);
                self.push_inst(Opcode::HardwareRead { addr }, Some(Type::Byte), span)
            }
            "peekw" => {
                let addr = self.const_address(args.first(), span);
                let lo = self.push_inst(Opcode::HardwareRead { addr }, Some(Type::Byte), span);
                let hi = self.push_inst(Opcode::HardwareRead { addr: addr.wrapping_add(1) }, Some(Type::Byte), span);
                let lo_w = self.coerce(lo, &Type::Word, span);
                let hi_w = self.coerce(hi, &Type::Word, span);
                let eight = self.push_inst(Opcode::Const(ConstValue::Byte(8)), Some(Type::Byte), span);
                let eight_w = self.coerce(eight, &Type::Word, span);
                let shifted = self.push_inst(
                    Opcode::Binary { op: BinOpcode::Shl, left: hi_w, right: eight_w },
                    Some(Type::Word),
                    span,
                );
                self.push_inst(Opcode::Binary { op: BinOpcode::Or, left: lo_w, right: shifted }, Some(Type::Word), span)
            }
            "poke" | "volatile_write" => {
                let addr = self.const_address(args.first(), span);
                let value = args.get(1).map(|e| self.lower_expr(e)).unwrap_or_else(|| {
                    self.push_inst(Opcode::Const(ConstValue::Byte(0)), Some(Type::Byte), span)
                });
                let value = self.coerce(value, &Type::Byte, span);
                self.push_void(Opcode::HardwareWrite { addr, value }, span);
                self.push_inst(Opcode::Const(ConstValue::Byte(0)), Some(Type::Byte), span)
            }
            "pokew" => {
                let addr = self.const_address(args.first(), span);
                let value = args.get(1).map(|e| self.lower_expr(e)).unwrap_or_else(|| {
                    self.push_inst(Opcode::Const(ConstValue::Word(0)), Some(Type::Word), span)
                });
                let value = self.coerce(value, &Type::Word, span);
                let lo = self.push_inst(Opcode::Convert { op: ConvertOpcode::Truncate, operand: value }, Some(Type::Byte), span);
                let eight = self.push_inst(Opcode::Const(ConstValue::Byte(8)), Some(Type::Byte), span);
                let eight_w = self.coerce(eight, &Type::Word, span);
                let shifted = self.push_inst(Opcode::Binary { op: BinOpcode::Shr, left: value, right: eight_w }, Some(Type::Word), span);
                let hi = self.push_inst(Opcode::Convert { op: ConvertOpcode::Truncate, operand: shifted }, Some(Type::Byte), span);
                self.push_void(Opcode::HardwareWrite { addr, value: lo }, span);
                self.push_void(Opcode::HardwareWrite { addr: addr.wrapping_add(1), value: hi }, span);
                self.push_inst(Opcode::Const(ConstValue::Byte(0)), Some(Type::Byte), span)
            }
            "lo" => {
                let reg = args.first().map(|e| self.lower_expr(e));
                match reg {
                    Some(reg) if self.func.registers[reg].ty == Type::Byte => reg,
                    Some(reg) => self.push_inst(
                        Opcode::Convert { op: ConvertOpcode::Truncate, operand: reg },
                        Some(Type::Byte),
                        span,
                    ),
                    None => self.push_inst(Opcode::Const(ConstValue::Byte(0)), Some(Type::Byte), span),
                }
            }
            "hi" => {
                let reg = args.first().map(|e| self.lower_expr(e));
                match reg {
                    Some(reg) if self.func.registers[reg].ty == Type::Byte => {
                        self.push_inst(Opcode::Const(ConstValue::Byte(0)), Some(Type::Byte), span)
                    }
                    Some(reg) => {
                        let eight = self.push_inst(Opcode::Const(ConstValue::Byte(8)), Some(Type::Byte), span);
                        let eight_w = self.coerce(eight, &Type::Word, span);
                        let shifted = self.push_inst(
                            Opcode::Binary { op: BinOpcode::Shr, left: reg, right: eight_w },
                            Some(Type::Word),
                            span,
                        );
                        self.push_inst(
                            Opcode::Convert { op: ConvertOpcode::Truncate, operand: shifted },
                            Some(Type::Byte),
                            span,
                        )
                    }
                    None => self.push_inst(Opcode::Const(ConstValue::Byte(0)), Some(Type::Byte), span),
                }
            }
            "sizeof" => {
                let size = args
                    .first()
                    .map(|e| self.infer_expr_type(e).size_in_bytes())
                    .unwrap_or(0);
                self.push_inst(Opcode::Const(ConstValue::Byte(size.min(255) as u8)), Some(Type::Byte), span)
            }
            "length" => {
                let len = args.first().and_then(|e| match self.infer_expr_type(e) {
                    Type::Array(_, Some(n)) => Some(n),
                    _ => None,
                });
                self.push_inst(
                    Opcode::Const(ConstValue::Byte(len.unwrap_or(0).min(255) as u8)),
                    Some(Type::Byte),
                    span,
                )
            }
            _ => {
                self.bag.push(Diagnostic::warning(
                    codes::SEMA_TYPE_MISMATCH,
                    format!("unrecognized intrinsic '{name}'"),
                    span,
                ));
                self.push_inst(Opcode::Const(ConstValue::Byte(0)), Some(Type::Byte), span)
            }
        }
    }

    /// `peek`/`poke`-family intrinsics address fixed hardware registers,
    /// so their address argument must be a compile-time constant
    /// (`sixtyc_ir::Opcode::HardwareRead`/`HardwareWrite` carry a bare
    /// `u16`, not a register). A non-constant address is a type mismatch.
    fn const_address(&mut self, arg: Option<&Expr>, span: Span) -> u16 {
        match arg.map(|e| &e.kind) {
            Some(ExprKind::Literal(Literal::Number(n))) => *n as u16,
            Some(_) => {
                self.bag.push(Diagnostic::error(
                    codes::SEMA_TYPE_MISMATCH,
                    "hardware address must be a compile-time constant",
                    arg.unwrap().span,
                ));
                0
            }
            None => 0,
        }
    }

    /// A lightweight, non-diagnosing type lookup for contexts (`sizeof`,
    /// `length`, `.length`) that only ever need a variable's declared
    /// type, not a fully lowered value.
    fn infer_expr_type(&self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::Identifier(name) => self.type_of(name),
            ExprKind::Index { object, .. } => match self.infer_expr_type(object) {
                Type::Array(elem, _) => *elem,
                Type::Pointer(elem) => *elem,
                other => other,
            },
            _ => Type::Word,
        }
    }
}

fn one_const(ty: &Type) -> ConstValue {
    match ty {
        Type::Word | Type::Pointer(_) => ConstValue::Word(1),
        _ => ConstValue::Byte(1),
    }
}

fn to_bin_opcode(op: BinOp) -> BinOpcode {
    match op {
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
        BinOp::Eq => BinOpcode::CmpEq,
        BinOp::Ne => BinOpcode::CmpNe,
        BinOp::Lt => BinOpcode::CmpLt,
        BinOp::Le => BinOpcode::CmpLe,
        BinOp::Gt => BinOpcode::CmpGt,
        BinOp::Ge => BinOpcode::CmpGe,
        BinOp::LogicalAnd | BinOp::LogicalOr => unreachable!("handled by lower_binary directly"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use sixtyc_ast::{Node, NodeIdGen, Param};

    fn span() -> Span {
        Span::synthetic()
    }

    fn module_with(decls: Vec<Decl>) -> Decl {
        let mut gen = NodeIdGen::new();
        Node::new(
            gen.next(),
            span(),
            DeclKind::Module {
                name: "m".to_string(),
                decls,
            },
        )
    }

    #[test]
    fn straight_line_function_has_one_sealed_block() {
        let mut gen = NodeIdGen::new();
        let ret: Stmt = Node::new(gen.next(), span(), StmtKind::Return(None));
        let f = Node::new(
            gen.next(),
            span(),
            DeclKind::Function {
                name: "f".to_string(),
                params: Vec::<Param>::new(),
                return_type: Type::Void,
                body: Some(vec![ret]),
                is_exported: false,
                is_callback: false,
            },
        );
        let m = module_with(vec![f]);
        let (resolution, resolve_bag) = resolve(&m);
        assert!(!resolve_bag.has_errors());
        let (ir_module, bag) = generate_module(&m, &resolution);
        assert!(!bag.has_errors());
        let func = &ir_module.functions["f"];
        assert_eq!(func.blocks.len(), 1);
        assert!(func.blocks[func.entry_block].is_sealed());
    }

    #[test]
    fn if_statement_creates_four_blocks() {
        let mut gen = NodeIdGen::new();
        let cond = Node::new(gen.next(), span(), ExprKind::Literal(Literal::Bool(true)));
        let if_stmt: Stmt = Node::new(
            gen.next(),
            span(),
            StmtKind::If {
                cond,
                then_branch: vec![],
                else_branch: None,
            },
        );
        let ret: Stmt = Node::new(gen.next(), span(), StmtKind::Return(None));
        let f = Node::new(
            gen.next(),
            span(),
            DeclKind::Function {
                name: "f".to_string(),
                params: Vec::<Param>::new(),
                return_type: Type::Void,
                body: Some(vec![if_stmt, ret]),
                is_exported: false,
                is_callback: false,
            },
        );
        let m = module_with(vec![f]);
        let (resolution, _) = resolve(&m);
        let (ir_module, bag) = generate_module(&m, &resolution);
        assert!(!bag.has_errors());
        let func = &ir_module.functions["f"];
        // entry, then, else, merge
        assert_eq!(func.blocks.len(), 4);
        for (_, block) in func.blocks.iter() {
            assert!(block.is_sealed());
        }
    }

    #[test]
    fn parameter_is_stored_at_function_entry() {
        let mut gen = NodeIdGen::new();
        let ident = Node::new(gen.next(), span(), ExprKind::Identifier("x".to_string()));
        let ret: Stmt = Node::new(gen.next(), span(), StmtKind::Return(Some(ident)));
        let param = Param {
            name: "x".to_string(),
            ty: Type::Byte,
        };
        let f = Node::new(
            gen.next(),
            span(),
            DeclKind::Function {
                name: "f".to_string(),
                params: vec![param],
                return_type: Type::Byte,
                body: Some(vec![ret]),
                is_exported: false,
                is_callback: false,
            },
        );
        let m = module_with(vec![f]);
        let (resolution, _) = resolve(&m);
        let (ir_module, bag) = generate_module(&m, &resolution);
        assert!(!bag.has_errors());
        let func = &ir_module.functions["f"];
        let entry = &func.blocks[func.entry_block];
        let first = &entry.instructions[0];
        assert!(matches!(&first.opcode, Opcode::StoreVar { name, .. } if name == "x"));
    }

    #[test]
    fn while_loop_creates_header_body_exit() {
        let mut gen = NodeIdGen::new();
        let cond = Node::new(gen.next(), span(), ExprKind::Literal(Literal::Bool(true)));
        let while_stmt: Stmt = Node::new(
            gen.next(),
            span(),
            StmtKind::While { cond, body: vec![] },
        );
        let ret: Stmt = Node::new(gen.next(), span(), StmtKind::Return(None));
        let f = Node::new(
            gen.next(),
            span(),
            DeclKind::Function {
                name: "f".to_string(),
                params: Vec::<Param>::new(),
                return_type: Type::Void,
                body: Some(vec![while_stmt, ret]),
                is_exported: false,
                is_callback: false,
            },
        );
        let m = module_with(vec![f]);
        let (resolution, _) = resolve(&m);
        let (ir_module, bag) = generate_module(&m, &resolution);
        assert!(!bag.has_errors());
        let func = &ir_module.functions["f"];
        assert_eq!(func.blocks.len(), 4);
    }
}
