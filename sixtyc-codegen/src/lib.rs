//! Lowers typed IL (`sixtyc_ir`) to `AsmIL` (`sixtyc_asm`): the frame
//! allocator, the 6502 instruction-selection table, and whole-module
//! code generation, `spec.md` section 2 ("Code generator") and section
//! 4.7.
//!
//! [`lower_module`] is the crate's single entry point: it allocates every
//! function's fixed frame (`frame`), lowers each function's IL to
//! [`sixtyc_asm::Item`]s (`lower`) using the 6502 byte/cycle table
//! (`isa`), and assembles the result into one [`sixtyc_asm::AsmModule`] in
//! deterministic, name-sorted order -- matching `sixtyc_codegen::frame`'s
//! own allocation order so that repeated compilations of the same module
//! produce byte-identical output. `sixtyc::Pipeline` (the umbrella crate)
//! calls this once semantic analysis and SSA construction have both
//! finished without errors, then hands the result to `sixtyc_asm::emit`
//! for textual serialization.

#![deny(missing_docs)]

pub mod frame;
pub mod isa;
pub mod lower;
pub mod target;

pub use frame::{FrameAllocator, FunctionFrame, SlotAddr};
pub use target::{MemoryMap, TargetConfig};

use rustc_hash::FxHashMap;
use sixtyc_asm::{AsmModule, DataKind, Item, LabelKind};
use sixtyc_diagnostics::DiagnosticBag;
use sixtyc_ir::{Module, Type};

/// Lower every function of `module` to one [`AsmModule`] targeting
/// `target`. Globals are emitted first (as `Label{kind: Global}` plus a
/// `Fill`-zeroed reservation of their static size -- this compiler has no
/// static-initializer encoding of its own; a nonzero initializer is
/// written by `main`'s own prologue code, which the IL generator emits as
/// ordinary `StoreVar`s, see `sixtyc_sema::ilgen`), then functions, in
/// name-sorted order so the frame allocator and this function walk
/// functions in lockstep.
pub fn lower_module(module: &Module, target: &TargetConfig) -> (AsmModule, DiagnosticBag) {
    let mut bag = DiagnosticBag::new();
    let mut allocator = FrameAllocator::new(target);
    let frames = allocator.allocate_module(module);

    let globals: FxHashMap<String, Type> = module
        .globals
        .iter()
        .map(|g| (g.name.clone(), g.ty.clone()))
        .collect();

    let mut asm = AsmModule::new(module.name.clone(), target.architecture.clone());
    asm.origin = Some(target.memory_map.code_start);

    let mut global_names: Vec<&String> = globals.keys().collect();
    global_names.sort();
    for name in global_names {
        let ty = &globals[name];
        let g = module.globals.iter().find(|g| &g.name == name).expect("indexed from globals map");
        asm.push(Item::Label {
            name: name.clone(),
            kind: LabelKind::Global,
            exported: g.is_exported,
            address: None,
            comment: None,
        });
        asm.push(Item::Data {
            kind: DataKind::Fill {
                count: ty.size_in_bytes(),
                value: 0,
            },
            comment: None,
        });
    }

    let mut fn_names: Vec<&String> = module.functions.keys().collect();
    fn_names.sort();
    for name in fn_names {
        let func = &module.functions[name];
        let frame = &frames[name];
        log::debug!("sixtyc-codegen: lowering function `{name}`");
        let (items, fn_bag) = lower::lower_function(func, frame, &frames, &globals);
        for item in items {
            asm.push(item);
        }
        bag.extend(fn_bag);
    }

    (asm, bag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sixtyc_ir::{ConstValue, Opcode};

    /// `spec.md` section 8, scenario 1: `main` stores byte literal `1`
    /// into hardware address `$D020` and returns. Expected output
    /// contains `LDA #$01`, `STA $D020`, `RTS` in that order and
    /// `codeBytes >= 6`.
    #[test]
    fn border_color_program_lowers_to_expected_sequence() {
        use sixtyc_diagnostics::Span;

        let mut f = sixtyc_ir::Function::new("main", vec![], Type::Void);
        let entry = f.entry_block;
        let c = f
            .push_inst(
                entry,
                Opcode::Const(ConstValue::Byte(1)),
                Some(Type::Byte),
                Span::synthetic(),
            )
            .expect("const produces a register");
        f.push_inst(
            entry,
            Opcode::HardwareWrite {
                addr: 0xD020,
                value: c,
            },
            None,
            Span::synthetic(),
        );
        f.push_inst(entry, Opcode::Return { value: None }, None, Span::synthetic());

        let mut module = Module::new("main");
        module.declare_function(f);
        module.entry_point = Some("main".to_string());

        let target = TargetConfig::c64();
        let (asm, bag) = lower_module(&module, &target);
        assert!(!bag.has_errors());
        assert_eq!(asm.stats.function_count, 1);
        assert!(asm.stats.code_bytes >= 6);

        let mnemonics: Vec<&str> = asm
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Instruction { mnemonic, .. } => Some(mnemonic.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(mnemonics, vec!["LDA", "STA", "RTS"]);
    }

    #[test]
    fn globals_get_a_label_and_a_zero_fill_reservation() {
        let mut module = Module::new("m");
        module.globals.push(sixtyc_ir::Global {
            name: "counter".to_string(),
            ty: Type::Word,
            has_initializer: false,
            is_exported: true,
        });
        let target = TargetConfig::c64();
        let (asm, _bag) = lower_module(&module, &target);
        assert!(asm.labels.contains_key("counter"));
        assert_eq!(asm.stats.data_bytes, 2);
    }
}
