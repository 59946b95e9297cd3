//! The umbrella crate: wires `sixtyc-ast`/`sixtyc-ir`/`sixtyc-ssa`/
//! `sixtyc-sema`/`sixtyc-codegen`/`sixtyc-asm` into one whole-program
//! [`Pipeline`], plus the rest of the ambient configuration/statistics
//! types a driver needs. No lexer or parser lives here or anywhere in
//! this workspace: callers hand [`Pipeline::compile`] already-built
//! [`sixtyc_ast::Decl`] module ASTs.

#![deny(missing_docs)]

mod basic_stub;
mod config;
mod error;
mod pipeline;
mod stats;

pub use config::{CompilerOptions, DebugLevel, OutputFormat, TargetConfig};
pub use error::InternalError;
pub use pipeline::{CompileOutput, Pipeline};
pub use stats::CompilationStats;
