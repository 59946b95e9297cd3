//! Structural verification of the universal invariants from `spec.md`
//! section 8 that apply to *any* IL function, SSA or not: exactly one
//! terminator per block, nothing after it, and phis only at block heads.
//! SSA-specific invariants (dominance of defs over uses, phi arity
//! matching predecessor count) live in `sixtyc_ssa::verify` since they
//! require the dominator tree and CFG this crate doesn't itself compute.

use crate::function::Function;
use sixtyc_diagnostics::{codes, Diagnostic, DiagnosticBag, Span};

/// Check the block-local invariants of `func`, pushing an
/// `INTERNAL-`-prefixed diagnostic for each violation found. A clean
/// result here is a precondition for every later pass (CFG construction,
/// SSA construction, code generation).
pub fn verify_function(func: &Function) -> DiagnosticBag {
    let mut bag = DiagnosticBag::new();
    for (block_id, block) in func.blocks.iter() {
        let mut seen_non_phi = false;
        for (i, inst) in block.instructions.iter().enumerate() {
            let is_last = i + 1 == block.instructions.len();
            if inst.opcode.is_phi() {
                if seen_non_phi {
                    bag.push(Diagnostic::internal(
                        codes::INTERNAL_SSA_VERIFY,
                        format!(
                            "function `{}`: phi instruction {:?} in block {block_id} follows a non-phi instruction",
                            func.name, inst.id
                        ),
                        inst.span.clone(),
                    ));
                }
            } else {
                seen_non_phi = true;
            }

            if inst.opcode.is_terminator() && !is_last {
                bag.push(Diagnostic::internal(
                    codes::INTERNAL_SSA_VERIFY,
                    format!(
                        "function `{}`: instruction {:?} follows a terminator in block {block_id}",
                        func.name, inst.id
                    ),
                    inst.span.clone(),
                ));
            }
        }
        if block.instructions.is_empty() || !block.is_sealed() {
            bag.push(Diagnostic::internal(
                codes::INTERNAL_SSA_VERIFY,
                format!(
                    "function `{}`: block {block_id} (`{}`) has no terminator",
                    func.name, block.label
                ),
                Span::synthetic(),
            ));
        }
    }
    bag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Opcode;
    use crate::Function;
    use sixtyc_ast::Type;

    #[test]
    fn unsealed_block_is_flagged() {
        let f = Function::new("f", vec![], Type::Void);
        let bag = verify_function(&f);
        assert!(bag.has_errors());
    }

    #[test]
    fn properly_terminated_block_is_clean() {
        let mut f = Function::new("f", vec![], Type::Void);
        let entry = f.entry_block;
        f.push_inst(entry, Opcode::Return { value: None }, None, Span::synthetic());
        let bag = verify_function(&f);
        assert!(!bag.has_errors());
    }
}
