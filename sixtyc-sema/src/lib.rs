//! Whole-program semantic analysis: symbol resolution, the module
//! dependency graph, recursion detection, dataflow analyses, and IL
//! generation -- `spec.md` sections 2 through 4.6.
//!
//! This crate's modules run in the pipeline order `spec.md` section 2's
//! data-flow diagram describes: [`resolve`] first (builds the symbol
//! table and reports name/type errors), then [`module_graph`] and
//! [`recursion`] (structural checks over, respectively, the import graph
//! and the call graph), then [`dataflow`] (constant propagation,
//! dead-code detection, loop analysis, escape analysis and stack-depth
//! estimation, all annotating AST metadata in place), and finally
//! [`ilgen`] (lowering to `sixtyc-ir`'s linear IL). `sixtyc-ssa` runs
//! after this crate, as its own pass over the generated IL.

#![deny(missing_docs)]

pub mod dataflow;
pub mod ilgen;
pub mod module_graph;
pub mod recursion;
pub mod resolve;

pub use dataflow::{analyze_function, analyze_module, FunctionAnalysis};
pub use ilgen::generate_module;
pub use module_graph::{CycleInfo, ModuleGraph};
pub use recursion::{detect_recursion, CallGraph, RecursionCycle};
pub use resolve::{resolve, ModuleResolution, INTRINSICS};
