//! The frame allocator, `spec.md` section 2 ("Frame allocator: Assigns
//! each IL function a fixed RAM region for its locals; forbids
//! recursion") and the "Static Frame Allocation" glossary entry.
//!
//! Every named local (including parameters, which the IL generator
//! addresses the same way as locals -- see `sixtyc_sema::ilgen`'s module
//! doc) and every virtual register gets its own fixed memory address,
//! assigned once, for the lifetime of the whole compilation: there is no
//! runtime call stack for locals, so two functions never have to "share"
//! an address the way stack-frame slots would on a target with a real
//! call stack. Zero page is allocated first (cheaper addressing modes,
//! one fewer operand byte and one fewer cycle almost everywhere); once
//! exhausted, allocation spills into the target's absolute RAM region.
//!
//! This allocator does not itself re-detect recursion: `spec.md` section
//! 7's propagation policy keeps code generation from running at all once
//! `sixtyc_sema::recursion` has reported an error, and the Static Frame
//! Allocation model is exactly why that check has to happen upstream --
//! by the time a function reaches here, its one fixed region is assumed
//! safe to reuse on every call.

use rustc_hash::FxHashMap;
use sixtyc_ir::{Function, Module, RegId, Type};

use crate::target::TargetConfig;

/// Where one value (a local, a parameter, a virtual register, or a
/// function's return slot) lives in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAddr {
    /// The address of the first byte.
    pub addr: u16,
    /// Whether `addr` falls within the target's zero-page window
    /// (selects the cheaper zero-page addressing modes over absolute).
    pub zero_page: bool,
    /// Size of the slot in bytes (1 for `Byte`/`Bool`, 2 for
    /// `Word`/`Pointer`).
    pub size: u32,
}

impl SlotAddr {
    /// The address of this slot's second byte, for `Word`/`Pointer`
    /// slots (6502 convention: low byte first, so `addr` is the low byte
    /// and `addr + 1` the high byte).
    pub fn hi_addr(&self) -> u16 {
        debug_assert_eq!(self.size, 2, "hi_addr on a 1-byte slot");
        self.addr + 1
    }
}

/// Every fixed address assigned within one function's frame.
#[derive(Debug, Default)]
pub struct FunctionFrame {
    /// Function name, for diagnostics.
    pub function: String,
    /// Addresses of named locals and parameters, by name.
    pub locals: FxHashMap<String, SlotAddr>,
    /// Parameter slots, in declaration order -- `locals` alone can't
    /// recover this order since it's a name-keyed map; callers writing a
    /// caller's arguments into this function's parameter slots (the
    /// code generator's call lowering) need the positional mapping.
    pub param_slots: Vec<SlotAddr>,
    /// Addresses of virtual-register temporaries, by register id.
    pub registers: FxHashMap<RegId, SlotAddr>,
    /// The function's return-value slot, for `Word`/`Pointer`-returning
    /// functions only (`Byte`/`Bool`-returning functions pass their
    /// result back in the accumulator; see `sixtyc_codegen::lower`'s
    /// calling convention note). `None` for `Void`-returning functions
    /// and for scalar byte-sized returns.
    pub return_slot: Option<SlotAddr>,
    /// Total bytes this function's frame occupies (locals + registers +
    /// return slot), for diagnostics and for `spec.md` section 8's stack
    /// accounting properties (which are computed over source-level
    /// byte sizes by `sixtyc_sema::dataflow::escape`, not this map, but
    /// the two are expected to agree for any function whose locals this
    /// allocator actually lays out).
    pub total_bytes: u32,
}

/// Assigns every IL function in a module its fixed memory region. One
/// allocator instance is shared across every function in the module
/// (and, in a whole-program build, across every module in compilation
/// order) since zero page is one shared scarce resource, not a per
/// function budget.
pub struct FrameAllocator {
    zp_next: u16,
    zp_end: u16,
    abs_next: u16,
}

impl FrameAllocator {
    /// A fresh allocator starting at the bottom of `target`'s zero-page
    /// window and absolute RAM region.
    pub fn new(target: &TargetConfig) -> Self {
        Self {
            zp_next: target.memory_map.zero_page_start as u16,
            zp_end: target.memory_map.zero_page_end as u16,
            abs_next: target.memory_map.ram_start,
        }
    }

    /// Remaining free zero-page bytes.
    pub fn zero_page_remaining(&self) -> u16 {
        self.zp_end.saturating_sub(self.zp_next)
    }

    fn bump(&mut self, size: u32) -> SlotAddr {
        if (size as u16) <= self.zero_page_remaining() {
            let addr = self.zp_next;
            self.zp_next += size as u16;
            SlotAddr {
                addr,
                zero_page: true,
                size,
            }
        } else {
            let addr = self.abs_next;
            self.abs_next = self.abs_next.wrapping_add(size as u16);
            SlotAddr {
                addr,
                zero_page: false,
                size,
            }
        }
    }

    /// Allocate frames for every function in `module`, in a
    /// deterministic (name-sorted) order so that repeated compilations of
    /// the same module assign the same addresses.
    pub fn allocate_module(&mut self, module: &Module) -> FxHashMap<String, FunctionFrame> {
        let mut names: Vec<&String> = module.functions.keys().collect();
        names.sort();
        let mut frames = FxHashMap::default();
        for name in names {
            let func = &module.functions[name];
            log::debug!("sixtyc-codegen: allocating frame for `{name}`");
            frames.insert(name.clone(), self.allocate_function(func));
        }
        frames
    }

    /// Allocate one function's frame: its parameters and locals (in
    /// name-sorted order, parameters first), then one slot per virtual
    /// register, then a return slot if its return type doesn't fit in
    /// the accumulator.
    pub fn allocate_function(&mut self, func: &Function) -> FunctionFrame {
        let mut frame = FunctionFrame {
            function: func.name.clone(),
            ..Default::default()
        };

        for param in &func.params {
            let addr = self.bump(param.ty.size_in_bytes());
            frame.total_bytes += addr.size;
            frame.locals.insert(param.name.clone(), addr);
        }

        let mut local_names: Vec<&String> = func.local_variables.keys().collect();
        local_names.sort();
        for name in local_names {
            if frame.locals.contains_key(name) {
                // A parameter and a local sharing a name is a semantic
                // error caught upstream; defensively keep the
                // parameter's slot rather than double-allocating.
                continue;
            }
            let ty = &func.local_variables[name];
            let addr = self.bump(ty.size_in_bytes());
            frame.total_bytes += addr.size;
            frame.locals.insert(name.clone(), addr);
        }

        for (id, reg) in func.registers.iter() {
            if matches!(reg.ty, Type::Void) {
                continue;
            }
            let addr = self.bump(reg.ty.size_in_bytes());
            frame.total_bytes += addr.size;
            frame.registers.insert(id, addr);
        }

        if func.return_type.is_word_sized() {
            let addr = self.bump(func.return_type.size_in_bytes());
            frame.total_bytes += addr.size;
            frame.return_slot = Some(addr);
        }

        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sixtyc_ir::IlParam;

    #[test]
    fn zero_page_is_exhausted_before_spilling_to_absolute() {
        let target = TargetConfig {
            architecture: "test".to_string(),
            memory_map: crate::target::MemoryMap {
                code_start: 0x1000,
                stack_pointer: 0xFF,
                zero_page_start: 0x02,
                zero_page_end: 0x04,
                ram_start: 0x2000,
            },
        };
        let mut alloc = FrameAllocator::new(&target);
        let a = alloc.bump(1);
        let b = alloc.bump(1);
        let c = alloc.bump(1);
        assert!(a.zero_page && a.addr == 0x02);
        assert!(b.zero_page && b.addr == 0x03);
        assert!(!c.zero_page && c.addr == 0x2000);
    }

    #[test]
    fn function_frame_covers_params_locals_and_registers() {
        let target = TargetConfig::c64();
        let mut alloc = FrameAllocator::new(&target);
        let mut f = Function::new(
            "add",
            vec![IlParam {
                name: "a".to_string(),
                ty: Type::Byte,
            }],
            Type::Byte,
        );
        f.local_variables.insert("tmp".to_string(), Type::Word);
        f.new_register(Type::Byte, None);
        let frame = alloc.allocate_function(&f);
        assert!(frame.locals.contains_key("a"));
        assert!(frame.locals.contains_key("tmp"));
        assert_eq!(frame.registers.len(), 1);
        assert!(frame.return_slot.is_none(), "byte return uses the accumulator, not a slot");
        assert_eq!(frame.total_bytes, 1 + 2 + 1);
    }

    #[test]
    fn word_returning_function_gets_a_return_slot() {
        let target = TargetConfig::c64();
        let mut alloc = FrameAllocator::new(&target);
        let f = Function::new("get_word", vec![], Type::Word);
        let frame = alloc.allocate_function(&f);
        assert!(frame.return_slot.is_some());
    }
}
