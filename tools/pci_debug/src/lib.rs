//! Interactive register debugger for PCI base address regions.
//!
//! The BAR is mapped through its sysfs `resourceN` file and driven with a one-letter command
//! language (`d`isplay, `c`hange, `f`ill, `e`ndian, `?`, `q`). See [`format::HELP`] for the grammar.

pub mod command;
pub mod config;
pub mod format;
pub mod input;
pub mod repl;
pub mod script;
pub mod session;

use std::io::Write;

use anyhow::{Context, Result};
use pci_bar::sysfs::{self, BarInfo};

pub use command::Command;
pub use config::{DebugConfig, Verbosity};
pub use input::{Input, LineSource, PromptedLines, ScriptedLines};
pub use session::{CommandError, Outcome, Session, SessionState};

/// Maps the configured BAR and runs the command file and/or interactive loop against it.
///
/// Returns once the operator quits or input closes; the mapping is released before returning.
pub fn run<S, W>(config: &DebugConfig, source: &mut S, out: &mut W) -> Result<()>
where
    S: LineSource + ?Sized,
    W: Write,
{
    let (region, info) = sysfs::open_bar(&config.sysfs_root, config.slot, config.bar)
        .with_context(|| format!("failed to map BAR{} of {}", config.bar, config.slot))?;
    print_banner(&info, config.verbosity, out)?;

    let mut session = Session::new(region);

    let mut quit = config.quit_after_file;
    if let Some(path) = &config.command_file {
        let summary =
            script::run_command_file(&mut session, path, config.bar, config.verbosity, out)?;
        if summary.failed > 0 {
            tracing::warn!(
                failed = summary.failed,
                sent = summary.sent,
                "command file had failing commands"
            );
        }
        quit |= summary.quit;
    }

    if !quit {
        repl::run_interactive(&mut session, source, out)?;
    }
    out.flush()?;

    drop(session.into_region());
    tracing::debug!(resource = %info.resource.display(), "region released");
    Ok(())
}

fn print_banner(info: &BarInfo, verbosity: Verbosity, out: &mut impl Write) -> Result<()> {
    if verbosity >= Verbosity::FULL {
        writeln!(out)?;
        writeln!(out, "PCI debug")?;
        writeln!(out, "---------")?;
        writeln!(out)?;
        writeln!(out, " - accessing BAR{} of {}", info.bar, info.address)?;
        writeln!(out, " - region size is {}-bytes", info.size)?;
        writeln!(out, " - offset into region is {}-bytes", info.offset)?;
        format::write_help(out)?;
    } else if verbosity >= Verbosity::BAR {
        writeln!(out)?;
        writeln!(out, "Accessing BAR{}", info.bar)?;
    }
    Ok(())
}
