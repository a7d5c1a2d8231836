use std::io::{self, Write};

use pci_bar::RegionBacking;

use crate::input::{Input, LineSource};
use crate::session::Session;

/// Feeds lines from `source` to `session` until the session terminates or the input closes.
///
/// Empty lines are skipped. [`Input::Eof`] only prints a newline; the loop keeps prompting.
pub fn run_interactive<B, S, W>(
    session: &mut Session<B>,
    source: &mut S,
    out: &mut W,
) -> io::Result<()>
where
    B: RegionBacking,
    S: LineSource + ?Sized,
    W: Write,
{
    while !session.is_terminated() {
        match source.next_line()? {
            Input::Line(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                session.execute_line(line, out)?;
            }
            Input::Eof => writeln!(out)?,
            Input::Closed => {
                tracing::debug!("input closed before quit");
                break;
            }
        }
        out.flush()?;
    }
    Ok(())
}
