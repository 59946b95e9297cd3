//! The whole-program compilation pipeline, `spec.md` section 2's data-flow
//! diagram wired end to end: module graph -> symbol resolution ->
//! recursion detection -> dataflow analyses -> IL generation -> SSA
//! construction -> frame allocation -> code generation -> assembly
//! emission.
//!
//! Grounded on `cranelift-codegen::Context::compile`'s role as the one
//! place that runs every phase over a single `Function` in order,
//! generalized here to a whole program of possibly many source modules
//! (`cranelift-codegen` has no module-graph concept of its own -- that
//! problem belongs to `cranelift-wasm`/`wasmtime-environ`'s module
//! instantiation bookkeeping, which is why `sixtyc_sema::module_graph` is
//! grounded on that crate's index-keyed adjacency style instead).

use rustc_hash::{FxHashMap, FxHashSet};
use sixtyc_asm::{emit, AsmModule, EmitOptions, SourceMap};
use sixtyc_ast::{Decl, DeclKind};
use sixtyc_codegen::lower_module;
use sixtyc_diagnostics::{codes, Diagnostic, DiagnosticBag};
use sixtyc_ir::{ControlFlowGraph, Module};
use sixtyc_sema::{analyze_module, detect_recursion, generate_module, resolve, CallGraph, ModuleGraph, ModuleResolution};
use sixtyc_ssa::{construct, SsaOptions};

use crate::basic_stub::basic_stub_items;
use crate::config::{CompilerOptions, DebugLevel, OutputFormat, TargetConfig};
use crate::stats::CompilationStats;

/// Everything [`Pipeline::compile`] produces.
#[derive(Debug, Default)]
pub struct CompileOutput {
    /// The structured assembly module, if code generation ran (absent
    /// when compilation stopped at or before semantic analysis).
    pub asm: Option<AsmModule>,
    /// The emitted assembly text (`""` if code generation didn't run).
    pub text: String,
    /// `emittedLine -> sourceSpan`, if [`CompilerOptions::source_map`]
    /// was set and code generation ran.
    pub source_map: Option<SourceMap>,
    /// Every diagnostic raised across every phase that ran, in phase
    /// order, `spec.md` section 7 ("All diagnostics are printed before
    /// the program exits").
    pub diagnostics: DiagnosticBag,
    /// Compilation statistics, `spec.md` section 6. Zeroed when code
    /// generation didn't run.
    pub stats: CompilationStats,
}

impl CompileOutput {
    /// `spec.md` section 7: "the command exits non-zero if any error
    /// diagnostics were produced; warnings alone exit zero".
    pub fn exit_code(&self) -> i32 {
        i32::from(self.diagnostics.has_errors())
    }

    fn failed(diagnostics: DiagnosticBag) -> Self {
        Self {
            diagnostics,
            ..Default::default()
        }
    }
}

/// A whole-program compilation driver: a target machine plus the rest of
/// `spec.md` section 6's recognized options. Stateless beyond its own
/// configuration; [`Pipeline::compile`] borrows its inputs and owns none
/// of the ASTs it is handed.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Target architecture and memory map.
    pub target: TargetConfig,
    /// The rest of the recognized compiler options.
    pub options: CompilerOptions,
}

impl Pipeline {
    /// Construct a pipeline for `target` with `options`.
    pub fn new(target: TargetConfig, options: CompilerOptions) -> Self {
        Self { target, options }
    }

    /// Compile every module in `modules` (each a `DeclKind::Module`
    /// declaration) as one whole program. Order within the slice does not
    /// matter -- compilation order is derived from the import graph.
    pub fn compile(&self, modules: &[Decl]) -> CompileOutput {
        let mut bag = DiagnosticBag::new();

        let graph = build_module_graph(modules);
        let cycles = graph.detect_cycles();
        for cycle in &cycles {
            bag.push(Diagnostic::error(
                codes::MODULE_CYCLE,
                format!("circular module dependency: {}", cycle.cycle.join(" -> ")),
                cycle.location.clone(),
            ));
        }
        if !cycles.is_empty() {
            log::debug!("sixtyc: {} module cycle(s) found; stopping before semantic analysis", cycles.len());
            return CompileOutput::failed(bag);
        }

        let order = graph.compilation_order();
        let by_name: FxHashMap<&str, &Decl> = modules
            .iter()
            .filter_map(|m| match &m.kind {
                DeclKind::Module { name, .. } => Some((name.as_str(), m)),
                _ => None,
            })
            .collect();

        // Phase 1: resolve every module (needed up front so cross-module
        // import checks below can see every module's exports).
        let mut resolutions: FxHashMap<String, ModuleResolution> = FxHashMap::default();
        for name in &order {
            let Some(&m) = by_name.get(name.as_str()) else {
                continue;
            };
            log::debug!("sixtyc: resolving module `{name}`");
            let (resolution, rbag) = resolve(m);
            bag.extend(rbag);
            resolutions.insert(name.clone(), resolution);
        }

        check_imports(modules, &resolutions, &mut bag);

        // Phase 2: recursion detection + dataflow, per module.
        for name in &order {
            let Some(&m) = by_name.get(name.as_str()) else {
                continue;
            };
            let known_functions = function_names(m);
            let call_graph = CallGraph::build(m, &known_functions);
            bag.extend(detect_recursion(&call_graph));

            let callees: FxHashMap<String, Vec<String>> = known_functions
                .iter()
                .map(|f| (f.clone(), call_graph.callee_names(f)))
                .collect();
            let (_analyses, dbag) = analyze_module(m, &callees, self.options.stack_warning_threshold);
            bag.extend(dbag);
        }

        if bag.has_errors() {
            log::debug!("sixtyc: semantic analysis reported errors; no IL produced");
            return CompileOutput::failed(bag);
        }

        // Phase 3: IL generation + SSA construction, per module, merged
        // into one whole-program IL module in compilation order.
        let mut program = Module::new("program");
        for name in &order {
            let Some(&m) = by_name.get(name.as_str()) else {
                continue;
            };
            let Some(resolution) = resolutions.get(name) else {
                continue;
            };
            log::debug!("sixtyc: generating IL for module `{name}`");
            let (mut il_module, ilbag) = generate_module(m, resolution);
            bag.extend(ilbag);

            for func in il_module.functions.values_mut() {
                bag.extend(sixtyc_ir::verify_function(func));
                let cfg = ControlFlowGraph::compute(func);
                let (_ssa, ssa_bag) = construct(func, &cfg, &SsaOptions::default());
                bag.extend(ssa_bag);
            }

            if il_module.entry_point.is_some() {
                program.entry_point = il_module.entry_point.take();
            }
            program.globals.extend(il_module.globals.drain(..));
            for (_, func) in il_module.functions.drain() {
                program.declare_function(func);
            }
        }

        if bag.has_errors() {
            log::debug!("sixtyc: IL generation or SSA construction reported errors; no code generated");
            return CompileOutput::failed(bag);
        }

        // Phase 4: code generation + assembly emission.
        let (mut asm, codegen_bag) = lower_module(&program, &self.target);
        bag.extend(codegen_bag);
        self.apply_container_options(&mut asm);

        let (text, source_map) = emit(&asm, &self.emit_options());
        let stats = CompilationStats {
            code_bytes: asm.stats.code_bytes,
            data_bytes: asm.stats.data_bytes,
            function_count: asm.stats.function_count,
            global_count: asm.stats.global_count,
            total_bytes: asm.stats.total_bytes(),
            line_count: text.lines().count() as u32,
            optimization_passes: u32::from(self.options.optimize),
            optimization_changed: false,
        };

        CompileOutput {
            asm: Some(asm),
            text,
            source_map: if self.options.source_map { Some(source_map) } else { None },
            diagnostics: bag,
            stats,
        }
    }

    /// Apply `format`/`loadAddress`/`basicStub` to an already-lowered
    /// [`AsmModule`], `spec.md` section 6.
    fn apply_container_options(&self, asm: &mut AsmModule) {
        let load_address = self.options.load_address.unwrap_or(self.target.memory_map.code_start);
        if matches!(self.options.format, OutputFormat::Prg) {
            asm.origin = Some(load_address);
            if self.options.basic_stub {
                let entry = self.target.memory_map.code_start;
                let stub_items = basic_stub_items(load_address, entry);
                let mut items = stub_items;
                items.append(&mut asm.items);
                asm.items = Vec::new();
                asm.stats = Default::default();
                for item in items {
                    asm.push(item);
                }
            }
        }
    }

    fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            include_comments: !matches!(self.options.debug, DebugLevel::None),
            include_cycle_counts: matches!(self.options.debug, DebugLevel::Full),
            ..EmitOptions::default()
        }
    }
}

/// Build the import graph across every module in `modules`, `spec.md`
/// section 4.1. A module's fully-qualified name is joined from an
/// `import`'s dotted `path` segments.
fn build_module_graph(modules: &[Decl]) -> ModuleGraph {
    let mut graph = ModuleGraph::new();
    for m in modules {
        if let DeclKind::Module { name, .. } = &m.kind {
            graph.add_node(name);
        }
    }
    for m in modules {
        let DeclKind::Module { name: from, decls } = &m.kind else {
            continue;
        };
        for d in decls {
            if let DeclKind::Import { path, .. } = &d.kind {
                let to = path.join(".");
                graph.add_edge(from, &to, d.span.clone());
            }
        }
    }
    graph
}

/// Cross-module import validation, `spec.md` section 7's "Module" error
/// kind: missing module, imported symbol not found, imported symbol not
/// exported. This can only run once every module's symbol table exists,
/// so it sits between resolution and recursion detection rather than
/// inside [`sixtyc_sema::resolve`] itself, which only ever sees one
/// module at a time.
fn check_imports(modules: &[Decl], resolutions: &FxHashMap<String, ModuleResolution>, bag: &mut DiagnosticBag) {
    for m in modules {
        let DeclKind::Module { name: from, decls } = &m.kind else {
            continue;
        };
        for d in decls {
            let DeclKind::Import { idents, path, .. } = &d.kind else {
                continue;
            };
            let to = path.join(".");
            let Some(target) = resolutions.get(&to) else {
                bag.push(Diagnostic::error(
                    codes::MODULE_NOT_FOUND,
                    format!("module `{from}` imports unknown module `{to}`"),
                    d.span.clone(),
                ));
                continue;
            };
            for ident in idents {
                match target.symbols.lookup_local(target.root, ident) {
                    None => bag.push(Diagnostic::error(
                        codes::MODULE_SYMBOL_NOT_FOUND,
                        format!("module `{to}` has no symbol `{ident}` for `{from}` to import"),
                        d.span.clone(),
                    )),
                    Some(sym) if !sym.is_exported => bag.push(Diagnostic::error(
                        codes::MODULE_SYMBOL_NOT_EXPORTED,
                        format!("`{ident}` in module `{to}` is not exported; `{from}` cannot import it"),
                        d.span.clone(),
                    )),
                    Some(_) => {}
                }
            }
        }
    }
}

/// Names of every function declared at the top level of `module`, for
/// [`CallGraph::build`]'s `known_functions` set.
fn function_names(module: &Decl) -> FxHashSet<String> {
    let DeclKind::Module { decls, .. } = &module.kind else {
        return FxHashSet::default();
    };
    decls
        .iter()
        .filter_map(|d| match &d.kind {
            DeclKind::Function { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sixtyc_ast::{Expr, ExprKind, Literal, Node, NodeIdGen, Param, StmtKind};
    use sixtyc_diagnostics::Span;
    use sixtyc_ir::Type;

    fn ids() -> NodeIdGen {
        NodeIdGen::new()
    }

    fn lit(ids: &mut NodeIdGen, v: i64) -> Expr {
        Node::new(ids.next(), Span::synthetic(), ExprKind::Literal(Literal::Number(v)))
    }

    /// `spec.md` section 8 scenario 1: `main` stores byte literal `1`
    /// into hardware address `$D020` and returns.
    fn border_color_module() -> Decl {
        let mut ids = ids();
        let call = Node::new(
            ids.next(),
            Span::synthetic(),
            ExprKind::Call {
                callee: "poke".to_string(),
                args: vec![lit(&mut ids, 0xD020), lit(&mut ids, 1)],
            },
        );
        let stmt = Node::new(ids.next(), Span::synthetic(), StmtKind::ExpressionStmt(call));
        let body = vec![stmt, Node::new(ids.next(), Span::synthetic(), StmtKind::Return(None))];
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

    #[test]
    fn border_color_program_produces_expected_assembly() {
        let module = border_color_module();
        let pipeline = Pipeline::new(TargetConfig::c64(), CompilerOptions::default());
        let output = pipeline.compile(std::slice::from_ref(&module));
        assert!(!output.diagnostics.has_errors(), "{:?}", output.diagnostics);
        assert_eq!(output.exit_code(), 0);
        assert!(output.text.contains("LDA #$01"));
        assert!(output.text.contains("STA $D020"));
        assert!(output.text.contains("RTS"));
        assert_eq!(output.stats.function_count, 1);
        assert!(output.stats.code_bytes >= 6);
    }

    /// `spec.md` section 8 scenario 2: direct recursion is a compile
    /// error and no IL is produced.
    #[test]
    fn direct_recursion_is_rejected_with_no_codegen() {
        let mut ids = ids();
        let call_self = Node::new(
            ids.next(),
            Span::synthetic(),
            ExprKind::Call {
                callee: "foo".to_string(),
                args: vec![],
            },
        );
        let body = vec![Node::new(ids.next(), Span::synthetic(), StmtKind::ExpressionStmt(call_self))];
        let foo = Node::new(
            ids.next(),
            Span::synthetic(),
            DeclKind::Function {
                name: "foo".to_string(),
                params: Vec::<Param>::new(),
                return_type: Type::Void,
                body: Some(body),
                is_exported: false,
                is_callback: false,
            },
        );
        let module = Node::new(
            ids.next(),
            Span::synthetic(),
            DeclKind::Module {
                name: "main".to_string(),
                decls: vec![foo],
            },
        );

        let pipeline = Pipeline::new(TargetConfig::c64(), CompilerOptions::default());
        let output = pipeline.compile(std::slice::from_ref(&module));
        assert!(output.diagnostics.has_errors());
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.message.to_lowercase().contains("recursion") && d.message.contains("foo")));
        assert!(output.asm.is_none());
        assert_eq!(output.exit_code(), 1);
    }

    /// `spec.md` section 8 scenario 4: a module cycle is fatal with no
    /// IL produced, and the message mentions "circular".
    #[test]
    fn module_cycle_is_fatal() {
        let mut ids = ids();
        let import_b = Node::new(
            ids.next(),
            Span::synthetic(),
            DeclKind::Import {
                idents: vec![],
                path: vec!["b".to_string()],
                alias: None,
            },
        );
        let a = Node::new(
            ids.next(),
            Span::synthetic(),
            DeclKind::Module {
                name: "a".to_string(),
                decls: vec![import_b],
            },
        );
        let import_a = Node::new(
            ids.next(),
            Span::synthetic(),
            DeclKind::Import {
                idents: vec![],
                path: vec!["a".to_string()],
                alias: None,
            },
        );
        let b = Node::new(
            ids.next(),
            Span::synthetic(),
            DeclKind::Module {
                name: "b".to_string(),
                decls: vec![import_a],
            },
        );

        let pipeline = Pipeline::new(TargetConfig::c64(), CompilerOptions::default());
        let output = pipeline.compile(&[a, b]);
        assert!(output.diagnostics.has_errors());
        assert!(output.diagnostics.iter().any(|d| d.message.contains("circular")));
        assert!(output.asm.is_none());
    }
}
