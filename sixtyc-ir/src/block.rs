//! Basic blocks, `spec.md` section 3.

use crate::entities::BlockId;
use crate::instr::Inst;

/// A basic block: a label and an ordered instruction stream. Exactly one
/// instruction (the last) is a terminator (`spec.md` section 3 invariant);
/// enforced by [`crate::function::Function::push_inst`], not here, since
/// enforcing it requires seeing the whole function's instruction stream.
///
/// Predecessor/successor edges and dominator-tree information are *not*
/// stored on `BasicBlock` itself: they're derived data computed by
/// [`crate::flowgraph::ControlFlowGraph`] and `sixtyc_ssa::DominatorTree`
/// respectively, each owning its own side table keyed by `BlockId`. This
/// mirrors how the teacher (`cranelift-codegen::flowgraph` /
/// `cranelift-codegen::dominator_tree`) separates "the IR" from "derived
/// analysis results about the IR" -- recomputing a CFG or dominator tree
/// after an edit never requires mutating blocks in place.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// This block's id within its owning function.
    pub id: BlockId,
    /// A human-readable label, used in pretty-printing and in the code
    /// generator's block-local assembly labels.
    pub label: String,
    /// Ordered instruction stream. Any leading run of [`crate::Opcode::Phi`]
    /// instructions comes first; the last instruction is always a
    /// terminator once the block is sealed.
    pub instructions: Vec<Inst>,
}

impl BasicBlock {
    /// Construct an empty, unsealed block.
    pub fn new(id: BlockId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            instructions: Vec::new(),
        }
    }

    /// Has this block already been terminated?
    pub fn is_sealed(&self) -> bool {
        self.instructions
            .last()
            .is_some_and(|inst| inst.opcode.is_terminator())
    }

    /// The block's terminator instruction, if it has one.
    pub fn terminator(&self) -> Option<&Inst> {
        self.instructions
            .last()
            .filter(|inst| inst.opcode.is_terminator())
    }

    /// Iterate over the leading phi instructions (may be empty).
    pub fn phis(&self) -> impl Iterator<Item = &Inst> {
        self.instructions.iter().take_while(|i| i.opcode.is_phi())
    }

    /// Iterate over the non-phi instructions, in order.
    pub fn non_phis(&self) -> impl Iterator<Item = &Inst> {
        self.instructions.iter().skip_while(|i| i.opcode.is_phi())
    }
}
