use std::io::{self, Write};

use pci_bar::AccessWidth;

/// Bytes shown per hex dump row.
pub const BYTES_PER_ROW: u64 = 16;

pub const HELP: &str = "
  ?                          Help
  d[width] addr len          Display memory starting from addr
                             [width]
                               8   - 8-bit access
                               16  - 16-bit access
                               32  - 32-bit access (default)
  c[width] addr val          Change memory at addr to val
  e                          Print the endian access mode
  e[mode]                    Change the endian access mode
                             [mode]
                               b - big-endian
                               l - little-endian (default)
  f[width] addr val len inc  Fill memory
                               addr - start address
                               val  - start value
                               len  - length (in bytes)
                               inc  - increment (defaults to 1)
  q                          Quit

  Notes:
    1. addr, len, and val are interpreted as hex values
       addresses are always byte based
";

pub fn write_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{HELP}")
}

/// Row-oriented hex dump: every [`BYTES_PER_ROW`] bytes start a new line prefixed with the absolute
/// address, each value is printed with `width / 4` digits.
pub struct HexDump<'a, W: Write> {
    out: &'a mut W,
    width: AccessWidth,
    start: u64,
}

impl<'a, W: Write> HexDump<'a, W> {
    pub fn new(out: &'a mut W, width: AccessWidth, start: u64) -> Self {
        Self { out, width, start }
    }

    /// Emits the value read at `addr`. Values must be pushed in ascending, contiguous order.
    pub fn push(&mut self, addr: u64, value: u32) -> io::Result<()> {
        if (addr - self.start) % BYTES_PER_ROW == 0 {
            write!(self.out, "\n{addr:08X}: ")?;
        }
        write!(
            self.out,
            "{value:0digits$X} ",
            digits = self.width.hex_digits()
        )
    }

    /// Terminates the last row and the response.
    pub fn finish(self) -> io::Result<()> {
        write!(self.out, "\n\n")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn dump(width: AccessWidth, start: u64, values: &[u32]) -> String {
        let mut out = Vec::new();
        let mut dump = HexDump::new(&mut out, width, start);
        for (i, v) in values.iter().enumerate() {
            dump.push(start + (i * width.bytes()) as u64, *v).unwrap();
        }
        dump.finish().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn rows_hold_sixteen_bytes() {
        let bytes = (0u32..20).collect::<Vec<_>>();
        assert_eq!(
            dump(AccessWidth::Bits8, 0x20, &bytes),
            "\n00000020: 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F \n00000030: 10 11 12 13 \n\n"
        );
    }

    #[test]
    fn values_use_width_digits() {
        assert_eq!(
            dump(AccessWidth::Bits16, 0, &[0xBEEF, 0x1]),
            "\n00000000: BEEF 0001 \n\n"
        );
        assert_eq!(
            dump(
                AccessWidth::Bits32,
                0x1000,
                &[1, 2, 3, 4, 0xDEAD_BEEF]
            ),
            "\n00001000: 00000001 00000002 00000003 00000004 \n00001010: DEADBEEF \n\n"
        );
    }

    #[test]
    fn rows_are_relative_to_the_dump_start() {
        assert_eq!(
            dump(AccessWidth::Bits32, 0x6, &[0xA, 0xB, 0xC, 0xD, 0xE]),
            "\n00000006: 0000000A 0000000B 0000000C 0000000D \n00000016: 0000000E \n\n"
        );
    }

    #[test]
    fn empty_dump_is_just_a_blank_line() {
        assert_eq!(dump(AccessWidth::Bits8, 0, &[]), "\n\n");
    }

    #[test]
    fn help_lists_every_verb() {
        let mut out = Vec::new();
        write_help(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        for verb in ["?  ", "d[width]", "c[width]", "e[mode]", "f[width]", "q  "] {
            assert!(text.contains(verb), "help is missing {verb:?}");
        }
        assert!(text.ends_with("\n\n"));
    }
}
