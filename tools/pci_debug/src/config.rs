use std::path::PathBuf;

use pci_bar::sysfs::{PciAddress, SysfsRoot};

/// How much the tool prints besides command responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Verbosity(u8);

impl Verbosity {
    /// Errors and warnings only.
    pub const QUIET: Self = Self(0);
    /// Also names the BAR being accessed.
    pub const BAR: Self = Self(1);
    /// Also echoes command-file lines as they are sent.
    pub const COMMANDS: Self = Self(2);
    /// Also prints the startup banner and help.
    pub const FULL: Self = Self(3);

    /// Levels above [`Verbosity::FULL`] are clamped.
    pub fn new(level: u8) -> Self {
        Self(level.min(Self::FULL.0))
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::FULL
    }
}

#[derive(Debug, Clone)]
pub struct DebugConfig {
    pub slot: PciAddress,
    pub bar: u8,
    pub command_file: Option<PathBuf>,
    /// Exit after the command file instead of prompting.
    pub quit_after_file: bool,
    pub verbosity: Verbosity,
    pub sysfs_root: SysfsRoot,
}

impl DebugConfig {
    pub fn new(slot: PciAddress) -> Self {
        Self {
            slot,
            bar: 0,
            command_file: None,
            quit_after_file: false,
            verbosity: Verbosity::default(),
            sysfs_root: SysfsRoot::default(),
        }
    }
}
