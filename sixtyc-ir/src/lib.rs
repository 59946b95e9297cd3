//! The typed virtual-register IL: instructions, basic blocks, functions,
//! modules, and the control-flow graph. Grounded on
//! `cranelift-codegen::ir` and `cranelift-codegen::flowgraph`.
//!
//! This is a "linear IL", per `spec.md` section 1: not SSA at rest. The
//! IL generator (`sixtyc_sema::ilgen`) builds it directly out of the AST,
//! and `sixtyc_ssa` mutates it in place into SSA form when a function
//! needs dataflow analysis to run over it.

#![deny(missing_docs)]

pub mod block;
pub mod entities;
pub mod flowgraph;
pub mod function;
pub mod instr;
pub mod module;
pub mod register;
pub mod verify;

pub use block::BasicBlock;
pub use entities::{BlockId, InstId, RegId};
pub use flowgraph::ControlFlowGraph;
pub use function::{Function, IlParam};
pub use instr::{
    BinOpcode, ConstValue, ConvertOpcode, CpuIntrinsic, Inst, Opcode, PhiIncoming, UnaryOpcode,
};
pub use module::{Global, Module};
pub use register::Register;
pub use verify::verify_function;

// Re-export the shared type system so downstream crates need only depend
// on `sixtyc-ir` for IL-level work.
pub use sixtyc_ast::Type;
