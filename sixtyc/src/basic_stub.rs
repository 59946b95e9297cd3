//! The BASIC loader stub, `spec.md` section 6 (`basicStub: bool --
//! emit the BASIC loader stub that calls the program entry point`).
//!
//! `examples/original_source/` kept no files for this distillation (see
//! its `_INDEX.md`), so there is no original-language byte sequence to
//! follow literally; this is the standard single-line `SYS` loader every
//! Commodore 8-bit cross-assembler generates under names like
//! `BasicUpstart`/`!basic_stub` (documented in `DESIGN.md`'s Open
//! Questions as the decision taken for this gap). A C64 BASIC line is
//! `{next-line-pointer: word}{line-number: word}{tokens/text}$00`, and a
//! zero next-line-pointer terminates the program; the `SYS` token is
//! `$9E` followed by the decimal ASCII digits of the target address.

use sixtyc_asm::{DataKind, Item};

/// `$9E` is BASIC's tokenized `SYS` keyword.
const SYS_TOKEN: u8 = 0x9E;

/// Build the `!byte`/`!word` items of a one-line `10 SYS <addr>` BASIC
/// program, assuming it is loaded starting at `load_address` (C64
/// convention: `$0801`) and immediately followed by `entry_address`'s
/// machine code.
///
/// The next-line pointer has to be `load_address + 2 (pointer) + 2
/// (line number) + strlen(tokens) + 1 (terminator)`; BASIC does not
/// itself chase this pointer to execute the line (it just uses it to
/// find the *next* line), so an off-by-one there would not stop this
/// line from running, but would corrupt a `LIST`ing -- computed exactly
/// here regardless.
pub fn basic_stub_items(load_address: u16, entry_address: u16) -> Vec<Item> {
    let digits = entry_address.to_string().into_bytes();
    // 2 (next-line ptr) + 2 (line number) + 1 (SYS token) + digits + 1 (line terminator)
    let line_len = 2 + 2 + 1 + digits.len() as u16 + 1;
    let next_line_ptr = load_address.wrapping_add(line_len);

    let mut bytes = Vec::with_capacity(line_len as usize + 2);
    bytes.push((next_line_ptr & 0xFF) as u8);
    bytes.push((next_line_ptr >> 8) as u8);
    bytes.push(10); // line number 10, low byte
    bytes.push(0); // line number 10, high byte
    bytes.push(SYS_TOKEN);
    bytes.extend_from_slice(&digits);
    bytes.push(0); // end of line
    bytes.push(0); // end of program: null next-line pointer, low byte
    bytes.push(0); // end of program: null next-line pointer, high byte

    vec![Item::Data {
        kind: DataKind::Byte(bytes),
        comment: Some(format!("BASIC stub: 10 SYS{entry_address}")),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_sys_targets_the_entry_address_in_decimal_ascii() {
        let items = basic_stub_items(0x0801, 2064);
        let Item::Data { kind: DataKind::Byte(bytes), .. } = &items[0] else {
            panic!("expected a byte directive");
        };
        // SYS token followed by "2064" as ASCII digits.
        let sys_pos = bytes.iter().position(|&b| b == SYS_TOKEN).unwrap();
        assert_eq!(&bytes[sys_pos + 1..sys_pos + 5], b"2064");
    }

    #[test]
    fn stub_terminates_with_a_null_next_line_pointer() {
        let items = basic_stub_items(0x0801, 2064);
        let Item::Data { kind: DataKind::Byte(bytes), .. } = &items[0] else {
            panic!("expected a byte directive");
        };
        assert_eq!(&bytes[bytes.len() - 2..], &[0, 0]);
    }
}
