//! The control-flow graph: predecessor/successor edges between blocks.
//!
//! Grounded on `cranelift-codegen::flowgraph::ControlFlowGraph`: a
//! recomputable side table keyed by `BlockId`, never part of `BasicBlock`
//! itself, so that editing the IL (as SSA construction does) doesn't
//! require threading CFG updates through every mutation site -- callers
//! just call [`ControlFlowGraph::compute`] again when they're done
//! editing.

use crate::entities::BlockId;
use crate::function::Function;
use sixtyc_entity::SecondaryMap;

#[derive(Clone, Default)]
struct CfgNode {
    predecessors: Vec<BlockId>,
    successors: Vec<BlockId>,
}

/// The control-flow graph of one [`Function`]: for every block, the set of
/// blocks that can jump/branch to it and the set it can jump/branch to.
pub struct ControlFlowGraph {
    nodes: SecondaryMap<BlockId, CfgNode>,
    valid: bool,
}

impl ControlFlowGraph {
    /// An empty, not-yet-computed graph.
    pub fn new() -> Self {
        Self {
            nodes: SecondaryMap::new(),
            valid: false,
        }
    }

    /// Compute (or recompute) the CFG of `func` from scratch.
    pub fn compute(func: &Function) -> Self {
        let mut cfg = Self::new();
        cfg.nodes.resize(func.blocks.len());
        for (block_id, block) in func.blocks.iter() {
            if let Some(term) = block.terminator() {
                for succ in term.opcode.successors() {
                    cfg.add_edge(block_id, succ);
                }
            }
        }
        cfg.valid = true;
        cfg
    }

    fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.nodes[from].successors.push(to);
        self.nodes[to].predecessors.push(from);
    }

    /// Predecessors of `block`, in the order their branch/jump was found
    /// while scanning `block`'s own sources during `compute`. Stable
    /// across repeated `compute` calls on the same IL, which SSA phi
    /// placement depends on (`spec.md` section 8: "the number of incoming
    /// operands equals the number of predecessors... in the same order").
    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        &self.nodes[block].predecessors
    }

    /// Successors of `block`, in source order.
    pub fn successors(&self, block: BlockId) -> &[BlockId] {
        &self.nodes[block].successors
    }

    /// Has `compute` been called on this instance?
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Depth-first reachability from `entry`. `spec.md` section 4.3's
    /// `computeReachability`: any block not visited is unreachable and
    /// becomes a dead-code-detection target.
    pub fn reachable_from(&self, entry: BlockId) -> std::collections::HashSet<BlockId> {
        let mut visited = std::collections::HashSet::new();
        let mut stack = vec![entry];
        while let Some(b) = stack.pop() {
            if visited.insert(b) {
                for &succ in self.successors(b) {
                    if !visited.contains(&succ) {
                        stack.push(succ);
                    }
                }
            }
        }
        visited
    }
}

impl Default for ControlFlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::{ConstValue, Opcode};
    use crate::Function;
    use sixtyc_ast::Type;
    use sixtyc_diagnostics::Span;

    #[test]
    fn diamond_cfg_has_two_preds_at_merge() {
        let mut f = Function::new("f", vec![], Type::Void);
        let entry = f.entry_block;
        let then_blk = f.new_block("then");
        let else_blk = f.new_block("else");
        let merge = f.new_block("merge");

        let cond = f
            .push_inst(entry, Opcode::Const(ConstValue::Bool(true)), Some(Type::Bool), Span::synthetic())
            .unwrap();
        f.push_inst(
            entry,
            Opcode::Branch {
                cond,
                then_block: then_blk,
                else_block: else_blk,
            },
            None,
            Span::synthetic(),
        );
        f.push_inst(then_blk, Opcode::Jump { target: merge }, None, Span::synthetic());
        f.push_inst(else_blk, Opcode::Jump { target: merge }, None, Span::synthetic());
        f.push_inst(merge, Opcode::Return { value: None }, None, Span::synthetic());

        let cfg = ControlFlowGraph::compute(&f);
        assert_eq!(cfg.predecessors(merge).len(), 2);
        assert_eq!(cfg.successors(entry), &[then_blk, else_blk]);
        let reachable = cfg.reachable_from(entry);
        assert_eq!(reachable.len(), 4);
    }
}
