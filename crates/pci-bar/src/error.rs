use std::io;

use thiserror::Error;

use crate::AccessWidth;

pub type Result<T> = std::result::Result<T, RegionError>;

/// Errors raised by [`crate::BarRegion`] and its backings.
#[derive(Debug, Error)]
pub enum RegionError {
    #[error("{width} access at {addr:#010X} overruns region end {size:#010X}")]
    OutOfBounds {
        addr: u64,
        width: AccessWidth,
        size: u64,
    },

    #[error("{width} access at {addr:#010X} is not naturally aligned")]
    Misaligned { addr: u64, width: AccessWidth },

    #[error("region of {size:#x} bytes at offset {offset:#x} does not fit in a {len:#x}-byte mapping")]
    ExceedsBacking { size: u64, offset: u64, len: usize },

    #[error("write barrier failed at {addr:#010X}")]
    Sync {
        addr: u64,
        #[source]
        source: io::Error,
    },
}
