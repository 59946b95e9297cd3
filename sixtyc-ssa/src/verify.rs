//! SSA-specific verification, `spec.md` section 4.4 phase 6 and section 8's
//! universal invariants for SSA-form functions. Complements
//! `sixtyc_ir::verify_function`'s block-local checks (one terminator,
//! phis-at-head) with the two properties that require the dominator tree
//! and CFG: every use is dominated by its definition, and every phi has
//! exactly one incoming operand per predecessor, in the same order.
//!
//! Per `spec.md` section 4.4 ("any verification failure is a compiler
//! bug"), failures here are pushed as `INTERNAL-SSA-VERIFY` diagnostics,
//! not ordinary user-facing errors.

use crate::dom::DominatorTree;
use rustc_hash::FxHashMap;
use sixtyc_diagnostics::{codes, Diagnostic, DiagnosticBag};
use sixtyc_ir::{BlockId, ControlFlowGraph, Function, RegId};

/// Where a register is defined: a specific instruction at a specific
/// position within a specific block. Parameter registers never appear
/// here (the IL generator allocates them before emitting the entry
/// block's implicit `StoreVar`, with no producing instruction of their
/// own); their absence is treated as "defined before everything" at the
/// use-check site below.
#[derive(Clone, Copy)]
struct DefSite {
    block: BlockId,
    position: usize,
}

fn collect_def_sites(func: &Function) -> FxHashMap<RegId, DefSite> {
    let mut sites = FxHashMap::default();
    for (block_id, block) in func.blocks.iter() {
        for (position, inst) in block.instructions.iter().enumerate() {
            if let Some(result) = inst.result {
                sites.insert(
                    result,
                    DefSite {
                        block: block_id,
                        position,
                    },
                );
            }
        }
    }
    sites
}

/// Verify every universal SSA invariant `spec.md` section 8 lists for
/// `func`, given its already-computed control-flow graph and dominator
/// tree.
pub fn verify_ssa(func: &Function, cfg: &ControlFlowGraph, dom_tree: &DominatorTree) -> DiagnosticBag {
    let mut bag = DiagnosticBag::new();
    let sites = collect_def_sites(func);

    for (block_id, block) in func.blocks.iter() {
        for inst in block.phis() {
            let incoming = match &inst.opcode {
                sixtyc_ir::Opcode::Phi { incoming } => incoming,
                _ => unreachable!(),
            };
            let preds = cfg.predecessors(block_id);
            if incoming.len() != preds.len() {
                bag.push(Diagnostic::internal(
                    codes::INTERNAL_SSA_VERIFY,
                    format!(
                        "function `{}`: phi {:?} in block {block_id} has {} incoming operand(s) but block has {} predecessor(s)",
                        func.name, inst.id, incoming.len(), preds.len()
                    ),
                    inst.span.clone(),
                ));
                continue;
            }
            for (slot, pred) in preds.iter().enumerate() {
                if incoming[slot].block != *pred {
                    bag.push(Diagnostic::internal(
                        codes::INTERNAL_SSA_VERIFY,
                        format!(
                            "function `{}`: phi {:?} in block {block_id} operand {slot} names predecessor {} but the block's predecessor in that position is {}",
                            func.name, inst.id, incoming[slot].block, pred
                        ),
                        inst.span.clone(),
                    ));
                }
            }
        }

        for (position, inst) in block.non_phis().enumerate() {
            // non_phis() starts after the phi prefix; recover the true
            // position within the full instruction list for def-before-use
            // comparisons.
            let true_position = block.phis().count() + position;
            for operand in inst.opcode.operands() {
                match sites.get(&operand) {
                    None => {
                        // No producing instruction: a function parameter
                        // register, implicitly live from entry and
                        // dominating every block. A genuinely dangling
                        // reference would instead surface as an
                        // out-of-bounds index panic in
                        // `sixtyc_ir::PrimaryMap`, not silently here.
                    }
                    Some(def) => {
                        let dominated = if def.block == block_id {
                            def.position < true_position
                        } else {
                            dom_tree.strictly_dominates(def.block, block_id)
                        };
                        if !dominated {
                            bag.push(Diagnostic::internal(
                                codes::INTERNAL_SSA_VERIFY,
                                format!(
                                    "function `{}`: instruction {:?} in block {block_id} uses register {operand} defined at block {} position {}, which does not dominate this use",
                                    func.name, inst.id, def.block, def.position
                                ),
                                inst.span.clone(),
                            ));
                        }
                    }
                }
            }
        }
    }

    bag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{construct, SsaOptions};
    use crate::dom::DominatorTree;
    use sixtyc_ast::Type;
    use sixtyc_diagnostics::Span;
    use sixtyc_ir::{ConstValue, Function, Opcode};

    #[test]
    fn diamond_with_promoted_variable_verifies_clean() {
        let mut f = Function::new("f", vec![], Type::Byte);
        f.local_variables.insert("x".to_string(), Type::Byte);
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

        let one = f
            .push_inst(then_blk, Opcode::Const(ConstValue::Byte(1)), Some(Type::Byte), Span::synthetic())
            .unwrap();
        f.push_inst(
            then_blk,
            Opcode::StoreVar {
                name: "x".to_string(),
                value: one,
            },
            None,
            Span::synthetic(),
        );
        f.push_inst(then_blk, Opcode::Jump { target: merge }, None, Span::synthetic());

        let two = f
            .push_inst(else_blk, Opcode::Const(ConstValue::Byte(2)), Some(Type::Byte), Span::synthetic())
            .unwrap();
        f.push_inst(
            else_blk,
            Opcode::StoreVar {
                name: "x".to_string(),
                value: two,
            },
            None,
            Span::synthetic(),
        );
        f.push_inst(else_blk, Opcode::Jump { target: merge }, None, Span::synthetic());

        let load = f
            .push_inst(
                merge,
                Opcode::LoadVar {
                    name: "x".to_string(),
                },
                Some(Type::Byte),
                Span::synthetic(),
            )
            .unwrap();
        f.push_inst(merge, Opcode::Return { value: Some(load) }, None, Span::synthetic());

        let cfg = sixtyc_ir::ControlFlowGraph::compute(&f);
        let (result, bag) = construct(&mut f, &cfg, &SsaOptions::default());
        assert!(!bag.has_errors(), "{:?}", bag.iter().collect::<Vec<_>>());
        assert!(result.phi_placement.get("x").map(|b| b.contains(&merge)).unwrap_or(false));

        let merge_block = &f.blocks[merge];
        let phi_count = merge_block.phis().count();
        assert_eq!(phi_count, 1);
        let cfg2 = sixtyc_ir::ControlFlowGraph::compute(&f);
        let dt2 = DominatorTree::compute(&f, &cfg2);
        let bag2 = verify_ssa(&f, &cfg2, &dt2);
        assert!(!bag2.has_errors(), "{:?}", bag2.iter().collect::<Vec<_>>());
    }
}
