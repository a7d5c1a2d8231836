use std::sync::atomic::{fence, Ordering};

use crate::{AccessWidth, Endianness, RegionBacking, RegionError, RegisterWord, Result};

/// A device region: `size` addressable bytes starting `offset` bytes into a [`RegionBacking`].
///
/// Logical address `addr` resolves to byte `offset + addr` of the backing. The checked accessors
/// ([`BarRegion::read`], [`BarRegion::write`]) are the default surface; the `*_unchecked` variants
/// exist for callers that have already validated the access with [`BarRegion::check_access`].
///
/// Every store, checked or not, is followed by a fence and the backing's
/// [`RegionBacking::flush_range`] over exactly the written bytes before it returns.
#[derive(Debug)]
pub struct BarRegion<B> {
    backing: B,
    size: u64,
    offset: u64,
}

impl<B: RegionBacking> BarRegion<B> {
    /// Wraps `backing`, exposing `size` bytes starting at `offset`.
    ///
    /// Fails if `offset + size` does not fit inside the backing.
    pub fn new(backing: B, size: u64, offset: u64) -> Result<Self> {
        let len = backing.len();
        let fits = offset
            .checked_add(size)
            .is_some_and(|end| end <= len as u64);
        if !fits {
            return Err(RegionError::ExceedsBacking { size, offset, len });
        }
        Ok(Self {
            backing,
            size,
            offset,
        })
    }

    /// Number of addressable bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Fixed correction between the start of the backing and logical address 0.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }

    /// Validates that a `width` access at `addr` lies inside the region and is naturally aligned.
    pub fn check_access(&self, width: AccessWidth, addr: u64) -> Result<()> {
        let in_bounds = addr
            .checked_add(width.bytes() as u64)
            .is_some_and(|end| end <= self.size);
        if !in_bounds {
            return Err(RegionError::OutOfBounds {
                addr,
                width,
                size: self.size,
            });
        }

        let effective = self.backing.as_ptr() as usize + self.index(addr);
        if effective % width.bytes() != 0 {
            return Err(RegionError::Misaligned { addr, width });
        }
        Ok(())
    }

    /// Reads a `width` value at `addr`, interpreted in `order`.
    pub fn read(&self, width: AccessWidth, addr: u64, order: Endianness) -> Result<u32> {
        self.check_access(width, addr)?;
        // SAFETY: `check_access` validated bounds and alignment.
        Ok(unsafe { self.read_unchecked(width, addr, order) })
    }

    /// Writes the low `width` bits of `value` at `addr` in `order`.
    pub fn write(
        &mut self,
        width: AccessWidth,
        addr: u64,
        value: u32,
        order: Endianness,
    ) -> Result<()> {
        self.check_access(width, addr)?;
        // SAFETY: `check_access` validated bounds and alignment.
        unsafe { self.write_unchecked(width, addr, value, order) }
    }

    /// Volatile load without validation.
    ///
    /// # Safety
    /// The caller must ensure `check_access(width, addr)` would succeed.
    pub unsafe fn read_unchecked(&self, width: AccessWidth, addr: u64, order: Endianness) -> u32 {
        let ptr = self.backing.as_ptr().add(self.index(addr));
        match width {
            AccessWidth::Bits8 => u32::from(ptr.read_volatile()),
            AccessWidth::Bits16 => u32::from(ptr.cast::<u16>().read_volatile().from_device(order)),
            AccessWidth::Bits32 => ptr.cast::<u32>().read_volatile().from_device(order),
        }
    }

    /// Volatile store followed by the write barrier, without validation.
    ///
    /// `value` is truncated to `width`.
    ///
    /// # Safety
    /// The caller must ensure `check_access(width, addr)` would succeed.
    pub unsafe fn write_unchecked(
        &mut self,
        width: AccessWidth,
        addr: u64,
        value: u32,
        order: Endianness,
    ) -> Result<()> {
        let index = self.index(addr);
        let ptr = self.backing.as_mut_ptr().add(index);
        match width {
            AccessWidth::Bits8 => ptr.write_volatile(value as u8),
            AccessWidth::Bits16 => ptr
                .cast::<u16>()
                .write_volatile((value as u16).to_device(order)),
            AccessWidth::Bits32 => ptr.cast::<u32>().write_volatile(value.to_device(order)),
        }
        fence(Ordering::SeqCst);
        self.backing
            .flush_range(index, width.bytes())
            .map_err(|source| RegionError::Sync { addr, source })?;

        tracing::trace!(
            addr = format_args!("{addr:#010X}"),
            value = format_args!("{:#X}", width.truncate(value)),
            %width,
            %order,
            "register write"
        );
        Ok(())
    }

    fn index(&self, addr: u64) -> usize {
        // `new` guarantees `offset + size` fits in the backing's `usize` length; callers keep
        // `addr < size` for anything that is dereferenced.
        (self.offset + addr) as usize
    }
}
