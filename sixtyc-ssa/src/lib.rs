//! SSA construction over `sixtyc-ir` functions: dominator trees,
//! dominance frontiers, phi placement, variable renaming, and SSA-specific
//! verification, `spec.md` section 4.4.
//!
//! Grounded on `cranelift-codegen::dominator_tree` (the iterative
//! reverse-postorder intersection algorithm for immediate dominators),
//! generalized to additionally expose dominance frontiers and phi
//! placement as first-class, independently testable results, since the
//! teacher computes SSA incrementally inside `cranelift-frontend`'s
//! `SSABuilder` rather than as a standalone batch pass over an existing
//! non-SSA IL -- this compiler's IL generator emits ordinary load/store
//! IL first (per `spec.md` section 4.6) and runs this crate afterward.

#![deny(missing_docs)]

pub mod construct;
pub mod dom;
pub mod frontier;
pub mod verify;

pub use construct::{construct, PhaseTimings, SsaOptions, SsaResult};
pub use dom::DominatorTree;
pub use frontier::DominanceFrontiers;
pub use verify::verify_ssa;
