//! Target configuration, `spec.md` section 6 ("Target configuration"):
//! the architecture tag selecting the code-generation table and the
//! memory map the frame allocator and instruction selector size
//! addresses against.

/// Memory layout of the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryMap {
    /// Where the first instruction of generated code is placed.
    pub code_start: u16,
    /// Initial hardware stack pointer value (always `$FF` on a stock
    /// 6502; kept configurable for targets that reserve the top of the
    /// 256-byte stack page).
    pub stack_pointer: u8,
    /// First usable zero-page address (`spec.md` section 6,
    /// `target.memoryMap.zeroPageStart`).
    pub zero_page_start: u8,
    /// One past the last usable zero-page address.
    pub zero_page_end: u8,
    /// First address of the absolute (non-zero-page) RAM region the frame
    /// allocator spills into once zero page is exhausted. Not one of
    /// `spec.md` section 6's explicitly enumerated memory-map fields --
    /// added because the frame allocator (section 4, "Frame allocator")
    /// needs *some* answer for where a function's locals live once zero
    /// page runs out, and the spec is silent on it; see `DESIGN.md`.
    pub ram_start: u16,
}

/// Target configuration: an architecture tag selecting the
/// code-generation table, plus its memory map.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetConfig {
    /// Architecture tag, e.g. `"c64"`, `"vic20"` (`spec.md` section 6,
    /// `target.architecture`).
    pub architecture: String,
    /// The target's memory layout.
    pub memory_map: MemoryMap,
}

impl TargetConfig {
    /// The Commodore 64: zero page `$02`-`$8F` is free of KERNAL/BASIC
    /// reservations in the common case, code conventionally starts at
    /// `$0801` (the BASIC stub's load address) or `$C000` for a
    /// stub-free binary, and free RAM for spilled locals starts at
    /// `$C000`.
    pub fn c64() -> Self {
        Self {
            architecture: "c64".to_string(),
            memory_map: MemoryMap {
                code_start: 0xC000,
                stack_pointer: 0xFF,
                zero_page_start: 0x02,
                zero_page_end: 0x90,
                ram_start: 0xC800,
            },
        }
    }

    /// The VIC-20 (unexpanded): a much smaller free zero-page window and
    /// a correspondingly lower code origin.
    pub fn vic20() -> Self {
        Self {
            architecture: "vic20".to_string(),
            memory_map: MemoryMap {
                code_start: 0x1000,
                stack_pointer: 0xFF,
                zero_page_start: 0x02,
                zero_page_end: 0x80,
                ram_start: 0x1400,
            },
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self::c64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c64_zero_page_window_is_nonempty() {
        let t = TargetConfig::c64();
        assert!(t.memory_map.zero_page_end > t.memory_map.zero_page_start);
    }
}
