//! Dominance frontier computation, `spec.md` section 4.4 phase 2.
//!
//! `DF(b) = { y | exists a predecessor p of y such that b dominates p but
//! b does not strictly dominate y }`. Computed bottom-up in dominator-tree
//! order (children before parents), the standard Cytron-Ferrante-Rosen-
//! Wegman-Zadeck algorithm: each block `b` with at least two CFG
//! predecessors contributes itself to the frontier of every predecessor's
//! dominator-tree ancestor chain, stopping at (and including) `b`'s own
//! immediate dominator.

use crate::dom::DominatorTree;
use rustc_hash::FxHashSet;
use sixtyc_entity::SecondaryMap;
use sixtyc_ir::{BlockId, ControlFlowGraph, Function};

/// Dominance frontiers of every block in a function's CFG.
#[derive(Debug)]
pub struct DominanceFrontiers {
    frontiers: SecondaryMap<BlockId, FxHashSet<BlockId>>,
}

impl DominanceFrontiers {
    /// Compute the dominance frontier of every block reachable in `dt`.
    pub fn compute(func: &Function, cfg: &ControlFlowGraph, dt: &DominatorTree) -> Self {
        let mut frontiers: SecondaryMap<BlockId, FxHashSet<BlockId>> = SecondaryMap::new();
        frontiers.resize(func.blocks.len());

        for block_id in func.blocks.keys() {
            if !dt.is_reachable(block_id) {
                continue;
            }
            let preds = cfg.predecessors(block_id);
            if preds.len() < 2 {
                continue;
            }
            let idom = dt.idom(block_id);
            for &pred in preds {
                if !dt.is_reachable(pred) {
                    continue;
                }
                let mut runner = pred;
                while Some(runner) != idom {
                    frontiers[runner].insert(block_id);
                    match dt.idom(runner) {
                        Some(next) => runner = next,
                        None => break,
                    }
                }
            }
        }

        Self { frontiers }
    }

    /// The dominance frontier of `block`, possibly empty.
    pub fn of(&self, block: BlockId) -> &FxHashSet<BlockId> {
        self.frontiers.get(block)
    }

    /// The iterated dominance frontier of a definition set: the closure of
    /// `DF` over the set, per `spec.md` section 4.4 phase 4 ("Phi
    /// placement"). This is exactly the set of blocks that need a phi for
    /// a variable defined in `defs`.
    pub fn iterated(&self, defs: &FxHashSet<BlockId>) -> FxHashSet<BlockId> {
        let mut result: FxHashSet<BlockId> = FxHashSet::default();
        let mut worklist: Vec<BlockId> = defs.iter().copied().collect();
        while let Some(b) = worklist.pop() {
            for &f in self.of(b) {
                if result.insert(f) {
                    worklist.push(f);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sixtyc_ast::Type;
    use sixtyc_diagnostics::Span;
    use sixtyc_ir::{ConstValue, Function, Opcode};

    fn diamond() -> (Function, ControlFlowGraph, BlockId, BlockId, BlockId, BlockId) {
        let mut f = Function::new("f", vec![], Type::Void);
        let entry = f.entry_block;
        let then_blk = f.new_block("then");
        let else_blk = f.new_block("else");
        let merge = f.new_block("merge");
        let cond = f
            .push_inst(
                entry,
                Opcode::Const(ConstValue::Bool(true)),
                Some(Type::Bool),
                Span::synthetic(),
            )
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
        (f, cfg, entry, then_blk, else_blk, merge)
    }

    #[test]
    fn merge_block_is_frontier_of_both_branches() {
        let (f, cfg, _entry, then_blk, else_blk, merge) = diamond();
        let dt = DominatorTree::compute(&f, &cfg);
        let df = DominanceFrontiers::compute(&f, &cfg, &dt);
        assert!(df.of(then_blk).contains(&merge));
        assert!(df.of(else_blk).contains(&merge));
    }

    #[test]
    fn entry_has_empty_frontier() {
        let (f, cfg, entry, ..) = diamond();
        let dt = DominatorTree::compute(&f, &cfg);
        let df = DominanceFrontiers::compute(&f, &cfg, &dt);
        assert!(df.of(entry).is_empty());
    }

    #[test]
    fn iterated_frontier_of_both_branches_is_just_merge() {
        let (f, cfg, _entry, then_blk, else_blk, merge) = diamond();
        let dt = DominatorTree::compute(&f, &cfg);
        let df = DominanceFrontiers::compute(&f, &cfg, &dt);
        let mut defs = FxHashSet::default();
        defs.insert(then_blk);
        defs.insert(else_blk);
        let idf = df.iterated(&defs);
        assert_eq!(idf.len(), 1);
        assert!(idf.contains(&merge));
    }
}
