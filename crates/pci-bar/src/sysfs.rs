//! Resolution of a PCI function + BAR index to a mapped [`BarRegion`] via Linux sysfs.
//!
//! Layout consumed (relative to [`SysfsRoot`]):
//!
//! - `<dddd:bb:dd.f>/resource<N>`: the BAR itself; its file size is the BAR size
//! - `<dddd:bb:dd.f>/config`: PCI configuration space; the BAR register at `0x10 + 4 * N` yields the
//!   physical address, whose position within its 4 KiB page becomes the region offset

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::{BarRegion, MmapBacking, RegionError};

/// Default location of PCI device directories.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/bus/pci/devices";

/// Number of BAR registers in a type 0 configuration header.
pub const BAR_COUNT: u8 = 6;

/// Configuration-space offset of BAR0.
const BAR0_CONFIG_OFFSET: u64 = 0x10;

/// Regions smaller than a page can start anywhere inside the page that gets mapped.
const MAP_PAGE_SIZE: u32 = 0x1000;

/// Memory BAR flag bits (memory-space indicator, type, prefetchable).
const BAR_FLAG_MASK: u32 = 0xF;

/// PCI function address (`domain:bus:device.function`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PciAddress {
    pub domain: u16,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciAddress {
    pub const fn new(domain: u16, bus: u8, device: u8, function: u8) -> Self {
        Self {
            domain,
            bus,
            device,
            function,
        }
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid PCI address {input:?} (expected bb:dd.f or dddd:bb:dd.f in hex): {reason}")]
pub struct ParseAddressError {
    input: String,
    reason: &'static str,
}

impl FromStr for PciAddress {
    type Err = ParseAddressError;

    /// Accepts `bb:dd.f` (domain 0, as printed by `lspci`) and `dddd:bb:dd.f` (`lspci -D`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseAddressError {
            input: s.to_string(),
            reason,
        };

        let (head, function) = s.rsplit_once('.').ok_or_else(|| err("missing '.function'"))?;
        let parts = head.split(':').collect::<Vec<_>>();
        let (domain, bus, device) = match parts.as_slice() {
            [bus, device] => ("0", *bus, *device),
            [domain, bus, device] => (*domain, *bus, *device),
            _ => return Err(err("expected bus:device or domain:bus:device before '.'")),
        };

        let domain = parse_hex_field(domain, 4).ok_or_else(|| err("bad domain"))?;
        let bus = parse_hex_field(bus, 2).ok_or_else(|| err("bad bus"))?;
        let device = parse_hex_field(device, 2).ok_or_else(|| err("bad device"))?;
        let function = parse_hex_field(function, 1).ok_or_else(|| err("bad function"))?;

        if device >= 32 {
            return Err(err("device must be below 0x20"));
        }
        if function >= 8 {
            return Err(err("function must be below 8"));
        }

        Ok(Self::new(domain as u16, bus as u8, device as u8, function as u8))
    }
}

fn parse_hex_field(field: &str, max_digits: usize) -> Option<u32> {
    if field.is_empty() || field.len() > max_digits {
        return None;
    }
    u32::from_str_radix(field, 16).ok()
}

/// Directory that holds one sub-directory per PCI function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SysfsRoot(PathBuf);

impl SysfsRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn device_dir(&self, address: PciAddress) -> PathBuf {
        self.0.join(address.to_string())
    }

    pub fn resource_path(&self, address: PciAddress, bar: u8) -> PathBuf {
        self.device_dir(address).join(format!("resource{bar}"))
    }

    pub fn config_path(&self, address: PciAddress) -> PathBuf {
        self.device_dir(address).join("config")
    }
}

impl Default for SysfsRoot {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

#[derive(Debug, Error)]
pub enum SysfsError {
    #[error("BAR index {bar} out of range (expected 0 to 5)")]
    InvalidBar { bar: u8 },

    #[error("open failed for file '{}'", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to stat '{}'", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("resource '{}' has size {size:#x}, which cannot be mapped", .path.display())]
    UnsupportedSize { path: PathBuf, size: u64 },

    #[error("failed to map '{}' (BARs that are I/O ports are not supported by this tool)", .path.display())]
    Map {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration space read of BAR{bar} failed in '{}'", .path.display())]
    ConfigRead {
        path: PathBuf,
        bar: u8,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Region(#[from] RegionError),
}

/// Facts about a mapped BAR, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BarInfo {
    pub address: PciAddress,
    pub bar: u8,
    pub resource: PathBuf,
    /// BAR register contents (physical base address plus flag bits).
    pub phys: u32,
    pub size: u64,
    pub offset: u64,
}

/// Computes the region offset for a BAR register value: the physical base modulo 4 KiB.
pub fn offset_in_page(phys: u32) -> u64 {
    u64::from((phys & !BAR_FLAG_MASK) % MAP_PAGE_SIZE)
}

/// Reads the 32-bit BAR register `bar` from a configuration-space file.
pub fn read_bar_register(config: &Path, bar: u8) -> Result<u32, SysfsError> {
    if bar >= BAR_COUNT {
        return Err(SysfsError::InvalidBar { bar });
    }
    let config_err = |source| SysfsError::ConfigRead {
        path: config.to_path_buf(),
        bar,
        source,
    };

    let mut file = File::open(config).map_err(|source| SysfsError::Open {
        path: config.to_path_buf(),
        source,
    })?;
    file.seek(SeekFrom::Start(BAR0_CONFIG_OFFSET + 4 * u64::from(bar)))
        .map_err(config_err)?;
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf).map_err(config_err)?;

    // Configuration space is little-endian regardless of host.
    Ok(u32::from_le_bytes(buf))
}

/// Opens and maps BAR `bar` of the function at `address`.
///
/// The returned region owns the mapping and the resource file descriptor; dropping it unmaps and
/// closes both.
pub fn open_bar(
    root: &SysfsRoot,
    address: PciAddress,
    bar: u8,
) -> Result<(BarRegion<MmapBacking>, BarInfo), SysfsError> {
    if bar >= BAR_COUNT {
        return Err(SysfsError::InvalidBar { bar });
    }

    let resource = root.resource_path(address, bar);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_SYNC)
        .open(&resource)
        .map_err(|source| SysfsError::Open {
            path: resource.clone(),
            source,
        })?;

    let size = file
        .metadata()
        .map_err(|source| SysfsError::Stat {
            path: resource.clone(),
            source,
        })?
        .len();
    let map_len = usize::try_from(size)
        .ok()
        .filter(|&len| len > 0)
        .ok_or_else(|| SysfsError::UnsupportedSize {
            path: resource.clone(),
            size,
        })?;

    let backing = MmapBacking::map(file, map_len).map_err(|source| SysfsError::Map {
        path: resource.clone(),
        source,
    })?;

    let phys = read_bar_register(&root.config_path(address), bar)?;
    let offset = offset_in_page(phys);
    let region = BarRegion::new(backing, size, offset)?;

    tracing::info!(
        resource = %resource.display(),
        size,
        offset,
        phys = format_args!("{phys:#010x}"),
        "mapped PCI BAR{bar}"
    );

    Ok((
        region,
        BarInfo {
            address,
            bar,
            resource,
            phys,
            size,
            offset,
        },
    ))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{AccessWidth, Endianness, RegionBacking};

    fn fake_device(root: &Path, address: PciAddress, bar: u8, size: u64, phys: u32) {
        let dir = root.join(address.to_string());
        fs::create_dir_all(&dir).unwrap();

        let mut config = vec![0u8; 64];
        let at = 0x10 + 4 * bar as usize;
        config[at..at + 4].copy_from_slice(&phys.to_le_bytes());
        fs::write(dir.join("config"), config).unwrap();

        let resource = File::create(dir.join(format!("resource{bar}"))).unwrap();
        resource.set_len(size).unwrap();
    }

    #[test]
    fn parses_short_and_domain_qualified_addresses() {
        assert_eq!(
            "03:00.0".parse::<PciAddress>().unwrap(),
            PciAddress::new(0, 3, 0, 0)
        );
        assert_eq!(
            "0001:af:1f.7".parse::<PciAddress>().unwrap(),
            PciAddress::new(1, 0xAF, 0x1F, 7)
        );
        assert_eq!(PciAddress::new(0, 3, 0x1c, 2).to_string(), "0000:03:1c.2");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "", "03:00", "03.0", "3:00.8", "03:20.0", "xx:00.0", "00000:00:00.0", "0:0:0:0.0",
            "03:00.",
        ] {
            assert!(bad.parse::<PciAddress>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn offset_is_physical_address_modulo_page() {
        assert_eq!(offset_in_page(0xFEB0_0000), 0);
        assert_eq!(offset_in_page(0xFEB0_1100), 0x100);
        // Flag bits (prefetchable, 64-bit type) are ignored.
        assert_eq!(offset_in_page(0xFEB0_180C), 0x800);
    }

    #[test]
    fn sysfs_paths_follow_kernel_layout() {
        let root = SysfsRoot::default();
        let addr = PciAddress::new(0, 1, 2, 3);
        assert_eq!(
            root.resource_path(addr, 2),
            Path::new("/sys/bus/pci/devices/0000:01:02.3/resource2")
        );
        assert_eq!(
            root.config_path(addr),
            Path::new("/sys/bus/pci/devices/0000:01:02.3/config")
        );
    }

    #[test]
    fn open_bar_maps_resource_and_applies_offset() {
        let tmp = tempfile::tempdir().unwrap();
        let addr = PciAddress::new(0, 2, 0, 0);
        fake_device(tmp.path(), addr, 1, 0x100, 0xFEB0_1200);

        let root = SysfsRoot::new(tmp.path());
        let (mut region, info) = open_bar(&root, addr, 1).unwrap();
        assert_eq!(info.size, 0x100);
        assert_eq!(info.offset, 0x200);
        assert_eq!(info.phys, 0xFEB0_1200);
        assert_eq!(region.size(), 0x100);
        assert_eq!(region.offset(), 0x200);
        assert!(region.backing().len() >= 0x300);

        region
            .write(AccessWidth::Bits32, 0, 0xCAFE_F00D, Endianness::Little)
            .unwrap();
        assert_eq!(
            region.read(AccessWidth::Bits32, 0, Endianness::Little).unwrap(),
            0xCAFE_F00D
        );
    }

    #[test]
    fn missing_resource_is_an_open_error() {
        let tmp = tempfile::tempdir().unwrap();
        let root = SysfsRoot::new(tmp.path());
        let err = open_bar(&root, PciAddress::new(0, 9, 0, 0), 0).unwrap_err();
        assert!(matches!(err, SysfsError::Open { .. }), "{err:?}");
        assert!(err.to_string().contains("resource0"));
    }

    #[test]
    fn empty_resource_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let addr = PciAddress::new(0, 4, 0, 0);
        fake_device(tmp.path(), addr, 0, 0, 0);
        let err = open_bar(&SysfsRoot::new(tmp.path()), addr, 0).unwrap_err();
        assert!(matches!(err, SysfsError::UnsupportedSize { size: 0, .. }));
    }

    #[test]
    fn bar_index_is_validated() {
        let tmp = tempfile::tempdir().unwrap();
        let err = open_bar(&SysfsRoot::new(tmp.path()), PciAddress::new(0, 0, 0, 0), 6)
            .unwrap_err();
        assert!(matches!(err, SysfsError::InvalidBar { bar: 6 }));
    }

    #[test]
    fn truncated_config_space_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let addr = PciAddress::new(0, 5, 0, 0);
        fake_device(tmp.path(), addr, 0, 0x40, 0);
        fs::write(tmp.path().join(addr.to_string()).join("config"), [0u8; 8]).unwrap();

        let err = open_bar(&SysfsRoot::new(tmp.path()), addr, 0).unwrap_err();
        assert!(matches!(err, SysfsError::ConfigRead { bar: 0, .. }), "{err:?}");
    }
}
