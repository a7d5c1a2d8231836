use core::fmt;

/// Granularity of a single register access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AccessWidth {
    Bits8,
    Bits16,
    #[default]
    Bits32,
}

impl AccessWidth {
    pub const ALL: [AccessWidth; 3] = [Self::Bits8, Self::Bits16, Self::Bits32];

    /// Maps a width in bits (`8`, `16` or `32`) to an [`AccessWidth`].
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Self::Bits8),
            16 => Some(Self::Bits16),
            32 => Some(Self::Bits32),
            _ => None,
        }
    }

    pub const fn bits(self) -> u32 {
        match self {
            Self::Bits8 => 8,
            Self::Bits16 => 16,
            Self::Bits32 => 32,
        }
    }

    pub const fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    /// Number of hex digits needed to print one value of this width.
    pub const fn hex_digits(self) -> usize {
        self.bits() as usize / 4
    }

    /// Truncates `value` to this width.
    pub const fn truncate(self, value: u32) -> u32 {
        match self {
            Self::Bits8 => value & 0xFF,
            Self::Bits16 => value & 0xFFFF,
            Self::Bits32 => value,
        }
    }
}

impl fmt::Display for AccessWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bits_accepts_only_supported_widths() {
        assert_eq!(AccessWidth::from_bits(8), Some(AccessWidth::Bits8));
        assert_eq!(AccessWidth::from_bits(16), Some(AccessWidth::Bits16));
        assert_eq!(AccessWidth::from_bits(32), Some(AccessWidth::Bits32));
        assert_eq!(AccessWidth::from_bits(0), None);
        assert_eq!(AccessWidth::from_bits(64), None);
        assert_eq!(AccessWidth::from_bits(12), None);
    }

    #[test]
    fn sizes_follow_bit_width() {
        for width in AccessWidth::ALL {
            assert_eq!(width.bytes() * 8, width.bits() as usize);
            assert_eq!(width.hex_digits() * 4, width.bits() as usize);
        }
    }

    #[test]
    fn truncate_masks_high_bits() {
        assert_eq!(AccessWidth::Bits8.truncate(0x1234_5678), 0x78);
        assert_eq!(AccessWidth::Bits16.truncate(0x1234_5678), 0x5678);
        assert_eq!(AccessWidth::Bits32.truncate(0x1234_5678), 0x1234_5678);
    }
}
