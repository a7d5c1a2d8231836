//! Command grammar.
//!
//! One input line is one command. The verb is the first character; `c`, `d`, `e`, `f` and `q`
//! accept either case, `?` is matched exactly. For `c`/`d`/`f` the characters between the verb and
//! the first space are a decimal access width (`8`, `16` or `32`); a space straight after the verb
//! selects 32-bit access. All numeric arguments are hexadecimal, with or without a `0x` prefix.

use pci_bar::{AccessWidth, Endianness};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Display {
        width: AccessWidth,
        addr: u32,
        len: u32,
    },
    Change {
        width: AccessWidth,
        addr: u32,
        value: u32,
    },
    Fill {
        width: AccessWidth,
        addr: u32,
        value: u32,
        len: u32,
        increment: u32,
    },
    /// `None` queries the current mode.
    SetEndian { mode: Option<Endianness> },
    Quit,
    Invalid { raw_line: String },
}

/// Increment used by `f` when the fourth argument is omitted.
pub const DEFAULT_FILL_INCREMENT: u32 = 1;

impl Command {
    /// Parses one trimmed, non-empty line. Never fails: unrecognised input becomes
    /// [`Command::Invalid`].
    pub fn parse(line: &str) -> Self {
        parse_command(line).unwrap_or_else(|| Command::Invalid {
            raw_line: line.to_string(),
        })
    }
}

fn parse_command(line: &str) -> Option<Command> {
    let mut chars = line.chars();
    let verb = chars.next()?;
    let rest = chars.as_str();

    match verb {
        '?' => Some(Command::Help),
        'q' | 'Q' => Some(Command::Quit),
        'e' | 'E' => parse_endian(rest),
        'd' | 'D' => {
            let (width, mut args) = split_width(rest)?;
            let addr = next_hex(&mut args)?;
            let len = next_hex(&mut args)?;
            Some(Command::Display { width, addr, len })
        }
        'c' | 'C' => {
            let (width, mut args) = split_width(rest)?;
            let addr = next_hex(&mut args)?;
            let value = next_hex(&mut args)?;
            Some(Command::Change { width, addr, value })
        }
        'f' | 'F' => {
            let (width, mut args) = split_width(rest)?;
            let addr = next_hex(&mut args)?;
            let value = next_hex(&mut args)?;
            let len = next_hex(&mut args)?;
            let increment = match args.next() {
                Some(token) => parse_hex(token)?,
                None => DEFAULT_FILL_INCREMENT,
            };
            Some(Command::Fill {
                width,
                addr,
                value,
                len,
                increment,
            })
        }
        _ => None,
    }
}

fn parse_endian(rest: &str) -> Option<Command> {
    let mode = match rest.chars().next() {
        None => None,
        Some('b') => Some(Endianness::Big),
        Some('l') => Some(Endianness::Little),
        Some(_) => return None,
    };
    Some(Command::SetEndian { mode })
}

/// Splits the text after a verb into the access width and an iterator over argument tokens.
fn split_width(rest: &str) -> Option<(AccessWidth, std::str::SplitWhitespace<'_>)> {
    if let Some(args) = rest.strip_prefix(' ') {
        return Some((AccessWidth::Bits32, args.split_whitespace()));
    }
    let (suffix, args) = rest.split_once(' ')?;
    let bits = suffix.parse::<u32>().ok()?;
    Some((AccessWidth::from_bits(bits)?, args.split_whitespace()))
}

fn next_hex<'a>(args: &mut impl Iterator<Item = &'a str>) -> Option<u32> {
    parse_hex(args.next()?)
}

/// Parses a hexadecimal `u32`, accepting an optional `0x`/`0X` prefix.
pub fn parse_hex(token: &str) -> Option<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}
