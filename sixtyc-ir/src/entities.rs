//! IL entity references. Grounded on `cranelift-codegen::ir::entities`:
//! every cross-reference within a function (block, register, instruction)
//! is a dense `u32`-wrapping index rather than a Rust reference, so the
//! inherently cyclic IL graph (blocks reference predecessors and
//! successors, instructions reference the registers other instructions
//! define) can live in plain owned vectors.

/// A reference to a basic block within its owning [`crate::function::Function`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);
sixtyc_entity::entity_impl!(BlockId, "blk");

/// A reference to a virtual register within its owning
/// [`crate::function::Function`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegId(u32);
sixtyc_entity::entity_impl!(RegId, "v");

/// A reference to an instruction within its owning
/// [`crate::function::Function`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(u32);
sixtyc_entity::entity_impl!(InstId, "i");
