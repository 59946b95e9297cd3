//! `AsmIL`: structured assembly items, the assembly module, and the
//! configurable textual emitter, `spec.md` section 3 ("AsmIL item",
//! "AsmIL module") and section 4.8 ("Assembly emitter").
//!
//! Grounded on `cranelift-codegen::binemit`'s split between a structured,
//! inspectable representation of emitted code and the text/bytes it is
//! finally serialized to -- here the structured side (`Item`/`AsmModule`)
//! is the one and only code-generation target (`sixtyc_codegen` builds
//! it directly), and [`emit`] is a pure function from that structure to
//! text, so there is exactly one code path producing output rather than
//! two that have to be kept in sync (see `DESIGN.md`'s note on the
//! "legacy writer vs. AsmIL builder" open question).

#![deny(missing_docs)]

pub mod emit;
pub mod item;
pub mod module;

pub use emit::{emit, EmitOptions, SourceMap, SourceMapEntry};
pub use item::{AddressingMode, CommentStyle, DataKind, Item, LabelKind, Operand};
pub use module::{AsmModule, AsmStats};
