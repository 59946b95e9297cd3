//! Serializes an [`AsmModule`] to textual assembly, `spec.md` section 4.8.
//!
//! A pure function of `(module, options)`: no item is ever mutated, and
//! nothing here decides *what* to emit (that's `sixtyc_codegen`'s job) --
//! only how each already-built [`Item`] is rendered as text under a given
//! dialect. Grounded on `cranelift-codegen`'s separation of `MachBuffer`
//! (what to emit) from its disassembly/text printers (how to render it).

use crate::item::{AddressingMode, CommentStyle, DataKind, Item, LabelKind, Operand};
use crate::module::AsmModule;
use sixtyc_diagnostics::Span;
use std::fmt::Write as _;

/// Dialect options for the textual emitter, `spec.md` section 4.8
/// ("Configurable dialect").
#[derive(Debug, Clone)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmitOptions {
    /// Render mnemonics upper-case (`LDA`) vs. lower-case (`lda`).
    pub uppercase_mnemonics: bool,
    /// Prefix prepended to every hex operand (`"$"` or `"0x"`).
    pub hex_prefix: String,
    /// Whether `Comment`/section/inline comments are rendered at all.
    pub include_comments: bool,
    /// Whether to append `Nb Nc` (bytes, cycles) after each instruction.
    pub include_cycle_counts: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            uppercase_mnemonics: true,
            hex_prefix: "$".to_string(),
            include_comments: true,
            include_cycle_counts: false,
        }
    }
}

/// One entry of a [`SourceMap`]: a 1-based emitted line number and the
/// source span the instruction on that line came from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceMapEntry {
    /// 1-based line number in the emitted text.
    pub emitted_line: u32,
    /// The originating source span.
    pub span: Span,
}

/// An ordered mapping `emittedLine -> sourceSpan`, `spec.md` section 6
/// ("Source map").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceMap {
    /// Entries in increasing line-number order.
    pub entries: Vec<SourceMapEntry>,
}

fn format_hex(opts: &EmitOptions, value: u32, digits: usize) -> String {
    format!("{}{:0width$X}", opts.hex_prefix, value, width = digits)
}

fn format_operand(opts: &EmitOptions, mode: AddressingMode, operand: &Operand) -> String {
    let numeric = |opts: &EmitOptions, digits: usize| -> String {
        match operand {
            Operand::Byte(b) => format_hex(opts, *b as u32, digits),
            Operand::Word(w) => format_hex(opts, *w as u32, digits),
            Operand::Label(name) => name.clone(),
            Operand::None => String::new(),
        }
    };
    match mode {
        AddressingMode::Implied => String::new(),
        AddressingMode::Immediate => format!("#{}", numeric(opts, 2)),
        AddressingMode::ZeroPage => numeric(opts, 2),
        AddressingMode::ZeroPageX => format!("{},X", numeric(opts, 2)),
        AddressingMode::ZeroPageY => format!("{},Y", numeric(opts, 2)),
        AddressingMode::Absolute => numeric(opts, 4),
        AddressingMode::AbsoluteX => format!("{},X", numeric(opts, 4)),
        AddressingMode::AbsoluteY => format!("{},Y", numeric(opts, 4)),
        AddressingMode::IndirectX => format!("({},X)", numeric(opts, 2)),
        AddressingMode::IndirectY => format!("({}),Y", numeric(opts, 2)),
        AddressingMode::IndirectAbsolute => format!("({})", numeric(opts, 4)),
        AddressingMode::Relative => numeric(opts, 0),
    }
}

fn format_mnemonic(opts: &EmitOptions, mnemonic: &str) -> String {
    if opts.uppercase_mnemonics {
        mnemonic.to_uppercase()
    } else {
        mnemonic.to_lowercase()
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Serialize `module` to textual assembly under `opts`, returning the text
/// and a source map recording which emitted line each instruction with a
/// known `source_loc` came from. Emission order, `spec.md` section 4.8:
/// output-file directive (if any), then origin, then items in insertion
/// order.
pub fn emit(module: &AsmModule, opts: &EmitOptions) -> (String, SourceMap) {
    let mut out = String::new();
    let mut map = SourceMap::default();
    let mut line: u32 = 0;

    let mut push_line = |out: &mut String, text: String| {
        out.push_str(&text);
        out.push('\n');
        line += 1;
    };

    if let Some(output_file) = &module.output_file {
        push_line(&mut out, format!("!to \"{}\"", escape_text(output_file)));
    }
    if let Some(origin) = module.origin {
        push_line(&mut out, format!("*= {}", format_hex(opts, origin as u32, 4)));
    }

    for item in &module.items {
        match item {
            Item::Label {
                name,
                kind,
                exported,
                comment,
                ..
            } => {
                let prefix = if *exported {
                    "+"
                } else if *kind == LabelKind::Block {
                    "."
                } else {
                    ""
                };
                let mut text = format!("{prefix}{name}:");
                if opts.include_comments {
                    if let Some(c) = comment {
                        write!(text, " ; {c}").ok();
                    }
                }
                push_line(&mut out, text);
            }
            Item::Instruction {
                mnemonic,
                addressing_mode,
                operand,
                bytes,
                cycles,
                source_loc,
                comment,
            } => {
                let operand_text = format_operand(opts, *addressing_mode, operand);
                let mut text = if operand_text.is_empty() {
                    format_mnemonic(opts, mnemonic)
                } else {
                    format!("{} {}", format_mnemonic(opts, mnemonic), operand_text)
                };
                if opts.include_cycle_counts {
                    write!(text, " ; {bytes}b {cycles}c").ok();
                }
                if opts.include_comments {
                    if let Some(c) = comment {
                        write!(text, " ; {c}").ok();
                    }
                }
                push_line(&mut out, text);
                if let Some(span) = source_loc {
                    map.entries.push(SourceMapEntry {
                        emitted_line: line,
                        span: span.clone(),
                    });
                }
            }
            Item::Data { kind, comment } => {
                let mut text = match kind {
                    DataKind::Byte(values) => {
                        let list: Vec<String> = values
                            .iter()
                            .map(|v| format_hex(opts, *v as u32, 2))
                            .collect();
                        format!("!byte {}", list.join(", "))
                    }
                    DataKind::Word(values) => {
                        let list: Vec<String> = values
                            .iter()
                            .map(|v| format_hex(opts, *v as u32, 4))
                            .collect();
                        format!("!word {}", list.join(", "))
                    }
                    DataKind::Text(text) => format!("!text \"{}\"", escape_text(text)),
                    DataKind::Fill { count, value } => {
                        format!("!fill {}, {}", count, format_hex(opts, *value as u32, 2))
                    }
                };
                if opts.include_comments {
                    if let Some(c) = comment {
                        write!(text, " ; {c}").ok();
                    }
                }
                push_line(&mut out, text);
            }
            Item::Comment { text, style } => {
                if !opts.include_comments {
                    continue;
                }
                match style {
                    CommentStyle::Line | CommentStyle::Inline => {
                        push_line(&mut out, format!("; {text}"));
                    }
                    CommentStyle::Section => {
                        push_line(&mut out, String::new());
                        push_line(&mut out, format!("; {}", "-".repeat(text.len().max(1))));
                        push_line(&mut out, format!("; {text}"));
                        push_line(&mut out, format!("; {}", "-".repeat(text.len().max(1))));
                    }
                }
            }
            Item::Origin { address } => {
                push_line(&mut out, format!("*= {}", format_hex(opts, *address as u32, 4)));
            }
            Item::Blank => {
                push_line(&mut out, String::new());
            }
            Item::Raw { text } => {
                push_line(&mut out, text.clone());
            }
        }
    }

    (out, map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Operand;
    use crate::module::AsmModule;

    fn border_color_module() -> AsmModule {
        let mut m = AsmModule::new("main", "c64");
        m.push(Item::Label {
            name: "main".to_string(),
            kind: LabelKind::Function,
            exported: true,
            address: None,
            comment: None,
        });
        m.push(Item::Instruction {
            mnemonic: "LDA".to_string(),
            addressing_mode: AddressingMode::Immediate,
            operand: Operand::Byte(1),
            bytes: 2,
            cycles: 2,
            source_loc: None,
            comment: None,
        });
        m.push(Item::Instruction {
            mnemonic: "STA".to_string(),
            addressing_mode: AddressingMode::Absolute,
            operand: Operand::Word(0xD020),
            bytes: 3,
            cycles: 4,
            source_loc: None,
            comment: None,
        });
        m.push(Item::Instruction {
            mnemonic: "RTS".to_string(),
            addressing_mode: AddressingMode::Implied,
            operand: Operand::None,
            bytes: 1,
            cycles: 6,
            source_loc: None,
            comment: None,
        });
        m
    }

    #[test]
    fn border_color_program_emits_expected_lines() {
        let module = border_color_module();
        let (text, _map) = emit(&module, &EmitOptions::default());
        assert!(text.contains("+main:"));
        assert!(text.contains("LDA #$01"));
        assert!(text.contains("STA $D020"));
        assert!(text.contains("RTS"));
        assert_eq!(module.stats.code_bytes, 6);
    }

    #[test]
    fn hex_prefix_is_configurable() {
        let module = border_color_module();
        let opts = EmitOptions {
            hex_prefix: "0x".to_string(),
            ..Default::default()
        };
        let (text, _) = emit(&module, &opts);
        assert!(text.contains("STA 0xD020"));
    }

    #[test]
    fn lowercase_mnemonics_option() {
        let module = border_color_module();
        let opts = EmitOptions {
            uppercase_mnemonics: false,
            ..Default::default()
        };
        let (text, _) = emit(&module, &opts);
        assert!(text.contains("lda #$01"));
    }

    #[test]
    fn source_map_records_instruction_lines() {
        let mut m = AsmModule::new("m", "c64");
        let span = Span::new(
            sixtyc_diagnostics::Position::new(3, 1, 10),
            sixtyc_diagnostics::Position::new(3, 5, 14),
            "main.src",
        );
        m.push(Item::Instruction {
            mnemonic: "NOP".to_string(),
            addressing_mode: AddressingMode::Implied,
            operand: Operand::None,
            bytes: 1,
            cycles: 2,
            source_loc: Some(span.clone()),
            comment: None,
        });
        let (_, map) = emit(&m, &EmitOptions::default());
        assert_eq!(map.entries.len(), 1);
        assert_eq!(map.entries[0].emitted_line, 1);
        assert_eq!(map.entries[0].span, span);
    }

    #[test]
    fn comments_can_be_suppressed() {
        let mut m = AsmModule::new("m", "c64");
        m.push(Item::Comment {
            text: "hello".to_string(),
            style: CommentStyle::Line,
        });
        m.push(Item::Instruction {
            mnemonic: "NOP".to_string(),
            addressing_mode: AddressingMode::Implied,
            operand: Operand::None,
            bytes: 1,
            cycles: 2,
            source_loc: None,
            comment: None,
        });
        let opts = EmitOptions {
            include_comments: false,
            ..Default::default()
        };
        let (text, _) = emit(&m, &opts);
        assert!(!text.contains("hello"));
        assert!(text.contains("NOP"));
    }
}
