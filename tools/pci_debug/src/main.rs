use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use pci_bar::sysfs::{PciAddress, SysfsRoot};
use pci_debug::{DebugConfig, PromptedLines, Verbosity};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "pci_debug",
    version,
    about = "Interactive read/write access to a PCI device BAR through sysfs"
)]
struct Args {
    /// PCI address of the device, `bb:dd.f` or `dddd:bb:dd.f` (see `lspci -D`).
    #[arg(short, long)]
    slot: PciAddress,

    /// Base address register to map.
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..6))]
    bar: u8,

    /// Commands file replayed before the prompt. Its first line must be `bar<N>`.
    #[arg(short = 'f', long = "file")]
    command_file: Option<PathBuf>,

    /// Exit after the commands file instead of prompting.
    #[arg(short, long)]
    quit: bool,

    /// 0: errors only, 1: BAR name, 2: echo file commands, 3: banner and help.
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..=3))]
    verbosity: u8,

    /// Directory holding the PCI device entries (defaults to `/sys/bus/pci/devices`).
    ///
    /// Environment variable: `PCI_DEBUG_SYSFS_ROOT`.
    #[arg(long, value_name = "DIR", env = "PCI_DEBUG_SYSFS_ROOT")]
    sysfs_root: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = DebugConfig {
        bar: args.bar,
        command_file: args.command_file,
        quit_after_file: args.quit,
        verbosity: Verbosity::new(args.verbosity),
        sysfs_root: args.sysfs_root.map(SysfsRoot::new).unwrap_or_default(),
        ..DebugConfig::new(args.slot)
    };
    tracing::debug!(?config, "starting");

    let mut source = PromptedLines::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    pci_debug::run(&config, &mut source, &mut out)
}
