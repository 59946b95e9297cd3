//! IL functions, `spec.md` section 3: owns all the blocks and registers it
//! contains, the way `cranelift-codegen::ir::Function` owns its
//! `DataFlowGraph` and `Layout`.

use crate::block::BasicBlock;
use crate::entities::{BlockId, InstId, RegId};
use crate::instr::{Inst, Opcode, PhiIncoming};
use rustc_hash::FxHashMap;
use sixtyc_ast::Type;
use sixtyc_diagnostics::Span;
use sixtyc_entity::PrimaryMap;

/// A function parameter, as carried on the IL (name + type; the entry
/// block materializes a register for each via an implicit definition, see
/// `spec.md` section 4.4 phase 3: "parameters in the entry block").
#[derive(Debug, Clone)]
pub struct IlParam {
    /// Parameter name.
    pub name: String,
    /// Parameter type.
    pub ty: Type,
}

/// One IL function. Owns every [`BasicBlock`] and [`crate::Register`] it
/// contains; blocks reference each other only through [`BlockId`]
/// index pairs, registers only through [`RegId`] index pairs -- never a
/// Rust reference -- so the (inherently cyclic) control-flow graph can
/// live in a flat, owned `PrimaryMap`.
#[derive(Debug)]
pub struct Function {
    /// Function name.
    pub name: String,
    /// Parameters, in declaration order.
    pub params: Vec<IlParam>,
    /// Return type (`Type::Void` for a function with no return value).
    pub return_type: Type,
    /// The function's unique entry block.
    pub entry_block: BlockId,
    /// All blocks, in the order they were created (not necessarily
    /// reverse-postorder; see `sixtyc_ssa::DominatorTree::cfg_postorder`
    /// for a traversal order).
    pub blocks: PrimaryMap<BlockId, BasicBlock>,
    /// Register pool for this function; every [`RegId`] used anywhere in
    /// this function was allocated from here.
    pub registers: PrimaryMap<RegId, crate::Register>,
    /// Local (stack-frame) variables declared in this function, by name,
    /// used by the frame allocator (`spec.md` section 4.11) to size the
    /// function's fixed RAM region.
    pub local_variables: FxHashMap<String, Type>,
    /// Visible to other modules (`spec.md` AST model, `Function.isExported`),
    /// consulted by the code generator to decide whether this function's
    /// label is emitted with the `+` export prefix (`spec.md` section 4.8).
    pub is_exported: bool,
    /// Registered as a hardware interrupt callback (`spec.md` AST model,
    /// `Function.isCallback`). A callback's prologue/epilogue must save and
    /// restore every register it touches (an interrupt can land mid any
    /// other function) and it returns via `RTI` rather than `RTS`; see
    /// `sixtyc_codegen::lower`'s handling and `DESIGN.md`'s note on this
    /// open question.
    pub is_callback: bool,
    next_inst_id: u32,
}

impl Function {
    /// Create a new function with a single, empty entry block.
    pub fn new(name: impl Into<String>, params: Vec<IlParam>, return_type: Type) -> Self {
        let mut blocks = PrimaryMap::new();
        let entry_block = blocks.push(BasicBlock::new(BlockId::new(0), "entry"));
        Self {
            name: name.into(),
            params,
            return_type,
            entry_block,
            blocks,
            registers: PrimaryMap::new(),
            local_variables: FxHashMap::default(),
            is_exported: false,
            is_callback: false,
            next_inst_id: 0,
        }
    }

    /// Allocate a fresh block with the given label, not yet linked to any
    /// other block.
    pub fn new_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        let pushed = self.blocks.push(BasicBlock::new(id, label.into()));
        debug_assert_eq!(id, pushed);
        pushed
    }

    /// Allocate a fresh typed virtual register.
    pub fn new_register(&mut self, ty: Type, name: Option<String>) -> RegId {
        let id = RegId::new(self.registers.len());
        self.registers.push(crate::Register::new(id, ty, name));
        id
    }

    fn fresh_inst_id(&mut self) -> InstId {
        let id = InstId::new(self.next_inst_id as usize);
        self.next_inst_id += 1;
        id
    }

    /// Append `opcode` to the end of `block`'s instruction stream,
    /// producing a new typed register if `result_ty` is given.
    ///
    /// # Panics
    /// In debug builds, if `block` is already sealed (its last instruction
    /// is a terminator) -- `spec.md` section 3's invariant ("instructions
    /// after the terminator are forbidden") is enforced at construction
    /// time rather than only by a later verifier pass.
    pub fn push_inst(
        &mut self,
        block: BlockId,
        opcode: Opcode,
        result_ty: Option<Type>,
        span: Span,
    ) -> Option<RegId> {
        debug_assert!(
            !self.blocks[block].is_sealed(),
            "cannot append to block {block} after its terminator"
        );
        let result = result_ty.map(|ty| self.new_register(ty, None));
        let id = self.fresh_inst_id();
        self.blocks[block].instructions.push(Inst {
            id,
            opcode,
            result,
            span,
        });
        result
    }

    /// Insert a `Phi` instruction at the head of `block` (after any phis
    /// already there), per `spec.md` section 4.4 phase 7. Used only by SSA
    /// construction. Allocates a fresh result register.
    pub fn insert_phi(
        &mut self,
        block: BlockId,
        ty: Type,
        incoming: Vec<PhiIncoming>,
        span: Span,
    ) -> RegId {
        let result = self.new_register(ty, None);
        self.insert_phi_for(block, result, incoming, span);
        result
    }

    /// Like [`Function::insert_phi`], but for a register already allocated
    /// (SSA construction pre-allocates one phi register per placement
    /// site before renaming, since renaming needs to seed its per-variable
    /// stack with the phi's register before the `Phi` instruction itself
    /// can be materialized -- the instruction's incoming operands aren't
    /// known until renaming has visited every predecessor).
    pub fn insert_phi_for(
        &mut self,
        block: BlockId,
        result: RegId,
        incoming: Vec<PhiIncoming>,
        span: Span,
    ) {
        let id = self.fresh_inst_id();
        let inst = Inst {
            id,
            opcode: Opcode::Phi { incoming },
            result: Some(result),
            span,
        };
        let phi_count = self.blocks[block].phis().count();
        self.blocks[block].instructions.insert(phi_count, inst);
    }

    /// Iterate over blocks in creation order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.keys()
    }
}
