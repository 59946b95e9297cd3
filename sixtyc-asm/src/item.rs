//! AsmIL item types, `spec.md` section 3 ("AsmIL item") and section 4.8.

use sixtyc_diagnostics::Span;

/// What a [`Item::Label`] identifies, which selects its textual prefix
/// (`spec.md` section 4.8: block labels always begin with `.`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LabelKind {
    /// A function entry point.
    Function,
    /// A module-level global variable.
    Global,
    /// A block-local control-flow target (loop head, branch target, ...).
    Block,
    /// A data item (string constant, jump table, ...).
    Data,
    /// A compiler-generated temporary with no source-level name.
    Temp,
}

/// Addressing mode of an [`Item::Instruction`], selecting the textual
/// operand template `spec.md` section 4.8 fixes: `#imm`, `zp`, `zp,X`,
/// `abs`, `abs,X`, `abs,Y`, `(zp,X)`, `(zp),Y`, `(abs)`, relative label,
/// implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressingMode {
    /// `#$NN`
    Immediate,
    /// `$NN`
    ZeroPage,
    /// `$NN,X`
    ZeroPageX,
    /// `$NN,Y`
    ZeroPageY,
    /// `$NNNN`
    Absolute,
    /// `$NNNN,X`
    AbsoluteX,
    /// `$NNNN,Y`
    AbsoluteY,
    /// `($NN,X)`
    IndirectX,
    /// `($NN),Y`
    IndirectY,
    /// `($NNNN)`
    IndirectAbsolute,
    /// A branch target rendered as a label name, not a numeric operand.
    Relative,
    /// No operand.
    Implied,
}

/// An instruction's operand: either a numeric value (formatted per its
/// [`AddressingMode`]) or an unresolved label reference (for forward
/// branches and calls, resolved by an external assembler).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// No operand (implied addressing).
    None,
    /// A single-byte value (zero-page address or `#imm`).
    Byte(u8),
    /// A two-byte value (absolute address).
    Word(u16),
    /// An unresolved label name.
    Label(String),
}

/// A comment's rendering style, `spec.md` section 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommentStyle {
    /// A comment on its own line.
    Line,
    /// A banner-style section header (blank line before and after).
    Section,
    /// A comment appended after a preceding instruction/directive.
    Inline,
}

/// A data directive's payload, `spec.md` section 3 (`Data{kind, values,
/// size}`) and section 6's bit-exact directive text.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataKind {
    /// `!byte $NN, $NN, ...`
    Byte(Vec<u8>),
    /// `!word $NNNN, ...` (little-endian is the target's convention, not
    /// this directive's; values are listed as given).
    Word(Vec<u16>),
    /// `!text "..."`, escaped per `spec.md` section 6.
    Text(String),
    /// `!fill COUNT, $NN`.
    Fill {
        /// Repeat count.
        count: u32,
        /// Fill byte.
        value: u8,
    },
}

impl DataKind {
    /// Size in bytes this directive occupies in the assembled output.
    pub fn size_in_bytes(&self) -> u32 {
        match self {
            DataKind::Byte(values) => values.len() as u32,
            DataKind::Word(values) => values.len() as u32 * 2,
            DataKind::Text(text) => text.len() as u32,
            DataKind::Fill { count, .. } => *count,
        }
    }
}

/// One item of an [`crate::module::AsmModule`]'s ordered item list,
/// `spec.md` section 3.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Item {
    /// A label definition.
    Label {
        /// Label name.
        name: String,
        /// What the label identifies.
        kind: LabelKind,
        /// Visible outside this module (prefixed `+`).
        exported: bool,
        /// Resolved address, if known at emission time.
        address: Option<u16>,
        /// Optional trailing comment.
        comment: Option<String>,
    },
    /// One machine instruction.
    Instruction {
        /// Mnemonic (e.g. `LDA`), case rendered per emitter config.
        mnemonic: String,
        /// Addressing mode, selecting the operand's textual template.
        addressing_mode: AddressingMode,
        /// The operand, or `Operand::None` for implied addressing.
        operand: Operand,
        /// Encoded instruction length in bytes.
        bytes: u8,
        /// CPU cycles this instruction takes (nominal, no page-cross
        /// penalty modeling).
        cycles: u8,
        /// Originating source location, for the source map.
        source_loc: Option<Span>,
        /// Optional trailing comment.
        comment: Option<String>,
    },
    /// A data directive.
    Data {
        /// The directive's kind and payload.
        kind: DataKind,
        /// Optional trailing comment.
        comment: Option<String>,
    },
    /// A standalone comment.
    Comment {
        /// Comment text (without the `;` prefix).
        text: String,
        /// Rendering style.
        style: CommentStyle,
    },
    /// `*= $XXXX`: sets the assembly location counter.
    Origin {
        /// New location counter value.
        address: u16,
    },
    /// A blank line, purely for readability.
    Blank,
    /// Pass-through raw text, emitted verbatim on its own line. Used for
    /// constructs the structured item set doesn't model.
    Raw {
        /// The raw text.
        text: String,
    },
}

impl Item {
    /// Number of bytes this item contributes to the assembled output, for
    /// `AsmStats`. Labels, comments, origin directives and blank lines
    /// contribute none.
    pub fn size_in_bytes(&self) -> u32 {
        match self {
            Item::Instruction { bytes, .. } => *bytes as u32,
            Item::Data { kind, .. } => kind.size_in_bytes(),
            _ => 0,
        }
    }
}
