//! Register-level access to a PCI base address region (BAR).
//!
//! The crate is split into three layers:
//!
//! - [`RegionBacking`]: an owned byte range plus the mandatory post-write barrier
//!   ([`HeapBacking`] for host memory, [`MmapBacking`] for a mapped sysfs resource file)
//! - [`BarRegion`]: the typed accessor; it applies the per-BAR offset, converts byte order according
//!   to an explicit [`Endianness`] and validates every checked access against the region size
//! - [`sysfs`]: resolves a PCI address + BAR index to a mapped [`BarRegion`]
//!
//! Byte order is never global state here. Callers pass the [`Endianness`] they want on every
//! 16/32-bit access.

mod backing;
mod endian;
mod error;
#[cfg(unix)]
mod mmap;
mod region;
#[cfg(unix)]
pub mod sysfs;
mod width;

pub use backing::{HeapBacking, RegionBacking};
pub use endian::{Endianness, RegisterWord};
pub use error::{RegionError, Result};
#[cfg(unix)]
pub use mmap::MmapBacking;
pub use region::BarRegion;
pub use width::AccessWidth;
