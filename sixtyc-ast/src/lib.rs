//! The AST model: tagged-variant declaration/statement/expression nodes
//! with source spans and per-node analysis metadata, plus the hierarchical
//! symbol table and the opaque `Token` type consumed from the (external,
//! out-of-scope) lexer.
//!
//! Grounded on `cranelift-codegen::ir`'s entity-reference conventions
//! (`entity_impl!`, dense ids) for [`node::NodeId`], generalized from IR
//! values to AST nodes since this compiler's AST -- unlike Cranelift's
//! already-SSA IR -- is the thing dataflow analyses annotate in place.

#![deny(missing_docs)]

pub mod metadata;
pub mod node;
pub mod symbol_table;
pub mod token;
pub mod types;

pub use metadata::{ConstLattice, DeadCodeReason, EscapeReason, NodeMetadata};
pub use node::{
    BinOp, Decl, DeclKind, Expr, ExprKind, ForDirection, Literal, Node, NodeId, NodeIdGen, Param,
    Stmt, StmtKind, SwitchCase, UnaryOp,
};
pub use symbol_table::{ScopeId, Symbol, SymbolKind, SymbolTable};
pub use token::{Token, TokenKind};
pub use types::Type;
