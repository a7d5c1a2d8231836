use core::fmt;

/// Byte order applied to 16/32-bit register accesses.
///
/// The value a caller reads or writes is always expressed in this order, independent of the host's
/// native byte order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    /// Returns the opposite byte order.
    pub const fn flipped(self) -> Self {
        match self {
            Self::Little => Self::Big,
            Self::Big => Self::Little,
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Little => f.write_str("little-endian"),
            Self::Big => f.write_str("big-endian"),
        }
    }
}

/// An integer that can be moved between a device's byte order and the host's.
pub trait RegisterWord: Copy {
    /// Interprets `self` (raw bytes as loaded from the device) in `order` and returns the host value.
    fn from_device(self, order: Endianness) -> Self;

    /// Converts a host value into the raw representation to store for `order`.
    fn to_device(self, order: Endianness) -> Self;
}

macro_rules! impl_register_word {
    ($t:ty) => {
        impl RegisterWord for $t {
            #[inline(always)]
            fn from_device(self, order: Endianness) -> Self {
                match order {
                    Endianness::Little => <$t>::from_le(self),
                    Endianness::Big => <$t>::from_be(self),
                }
            }

            #[inline(always)]
            fn to_device(self, order: Endianness) -> Self {
                match order {
                    Endianness::Little => self.to_le(),
                    Endianness::Big => self.to_be(),
                }
            }
        }
    };
}

impl_register_word!(u8);
impl_register_word!(u16);
impl_register_word!(u32);
