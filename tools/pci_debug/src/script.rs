//! Command files: a `bar<N>` header line followed by one command per line, replayed before the
//! interactive prompt.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use pci_bar::RegionBacking;
use thiserror::Error;

use crate::config::Verbosity;
use crate::session::{Outcome, Session};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("can not open the commands file '{}'", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read the commands file '{}'", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Output(io::Error),
}

/// What happened while replaying a command file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScriptSummary {
    /// Commands dispatched (header excluded).
    pub sent: usize,
    /// Commands that reported an error.
    pub failed: usize,
    /// The header named a different BAR, so no command was sent.
    pub bar_mismatch: bool,
    /// A `q` line ended the session.
    pub quit: bool,
}

/// Parses a `bar<N>` header. Returns `None` when the line is not a header.
pub fn parse_header(line: &str) -> Option<u8> {
    let digits = line.trim().strip_prefix("bar")?;
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}

/// Replays the command file at `path` into `session`.
pub fn run_command_file<B: RegionBacking>(
    session: &mut Session<B>,
    path: &Path,
    bar: u8,
    verbosity: Verbosity,
    out: &mut impl Write,
) -> Result<ScriptSummary, ScriptError> {
    let file = File::open(path).map_err(|source| ScriptError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    if verbosity >= Verbosity::FULL {
        writeln!(out, "Execute a commands file").map_err(ScriptError::Output)?;
    }
    run_commands(session, BufReader::new(file), path, bar, verbosity, out)
}

fn run_commands<B: RegionBacking>(
    session: &mut Session<B>,
    reader: impl BufRead,
    path: &Path,
    bar: u8,
    verbosity: Verbosity,
    out: &mut impl Write,
) -> Result<ScriptSummary, ScriptError> {
    let mut summary = ScriptSummary::default();
    let mut header_seen = false;

    for line in reader.lines() {
        let line = line.map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if !header_seen {
            header_seen = true;
            let found = parse_header(line);
            if found != Some(bar) {
                let found = found.map_or_else(|| "-1".to_string(), |b| b.to_string());
                tracing::warn!(expected = bar, %found, "command file targets another BAR");
                writeln!(
                    out,
                    "Warning: BAR is not compliant with the command file (Expected: {bar} - Found: {found})"
                )
                .map_err(ScriptError::Output)?;
                summary.bar_mismatch = true;
                break;
            }
            continue;
        }

        if verbosity >= Verbosity::COMMANDS {
            writeln!(out, "Send: {line}").map_err(ScriptError::Output)?;
        }
        summary.sent += 1;
        match session.execute_line(line, out).map_err(ScriptError::Output)? {
            Outcome::Completed => {}
            Outcome::Rejected(_) => {
                summary.failed += 1;
                writeln!(out, "Warning: Command failure - {line}").map_err(ScriptError::Output)?;
            }
            Outcome::Terminated => {
                summary.quit = true;
                break;
            }
        }
    }

    tracing::info!(
        path = %path.display(),
        sent = summary.sent,
        failed = summary.failed,
        "command file replayed"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use pci_bar::{BarRegion, HeapBacking};
    use pretty_assertions::assert_eq;

    use super::*;

    fn session() -> Session<HeapBacking> {
        Session::new(BarRegion::new(HeapBacking::new(16), 16, 0).unwrap())
    }

    fn replay(
        session: &mut Session<HeapBacking>,
        text: &str,
        bar: u8,
        verbosity: Verbosity,
    ) -> (ScriptSummary, String) {
        let mut out = Vec::new();
        let summary = run_commands(
            session,
            text.as_bytes(),
            Path::new("cmds.txt"),
            bar,
            verbosity,
            &mut out,
        )
        .unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    #[test]
    fn header_parsing() {
        assert_eq!(parse_header("bar0"), Some(0));
        assert_eq!(parse_header("bar2 trailing"), Some(2));
        assert_eq!(parse_header("  bar5\n"), Some(5));
        assert_eq!(parse_header("BAR0"), None);
        assert_eq!(parse_header("c 0 1"), None);
        assert_eq!(parse_header("bar"), None);
    }

    #[test]
    fn replays_commands_after_matching_header() {
        let mut s = session();
        let (summary, out) = replay(
            &mut s,
            "bar0\n\nc8 0 aa\nf8 4 1 4\nzz\n",
            0,
            Verbosity::COMMANDS,
        );
        assert_eq!(
            summary,
            ScriptSummary {
                sent: 3,
                failed: 1,
                bar_mismatch: false,
                quit: false
            }
        );
        assert_eq!(
            out,
            "Send: c8 0 aa\nSend: f8 4 1 4\nSend: zz\nSyntax error (use ? for help)\nWarning: Command failure - zz\n"
        );
        assert_eq!(&s.region().backing().bytes()[..8], &[0xAA, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn mismatched_header_skips_the_file() {
        let mut s = session();
        let (summary, out) = replay(&mut s, "bar1\nc8 0 aa\n", 0, Verbosity::QUIET);
        assert!(summary.bar_mismatch);
        assert_eq!(summary.sent, 0);
        assert_eq!(
            out,
            "Warning: BAR is not compliant with the command file (Expected: 0 - Found: 1)\n"
        );
        assert_eq!(s.region().backing().bytes()[0], 0);

        let (summary, out) = replay(&mut s, "c8 0 aa\n", 0, Verbosity::QUIET);
        assert!(summary.bar_mismatch);
        assert!(out.contains("Found: -1"));
    }

    #[test]
    fn quit_line_ends_the_session() {
        let mut s = session();
        let (summary, _) = replay(&mut s, "bar0\nq\nc8 0 aa\n", 0, Verbosity::QUIET);
        assert!(summary.quit);
        assert_eq!(summary.sent, 1);
        assert!(s.is_terminated());
        assert_eq!(s.region().backing().bytes()[0], 0);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut s = session();
        let tmp = tempfile::tempdir().unwrap();
        let err = run_command_file(
            &mut s,
            &tmp.path().join("absent.txt"),
            0,
            Verbosity::QUIET,
            &mut io::sink(),
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::Open { .. }));
    }

    #[test]
    fn file_is_read_from_disk() {
        let mut s = session();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cmds.txt");
        std::fs::write(&path, "bar3\r\nc16 2 beef\r\n").unwrap();

        let mut out = Vec::new();
        let summary = run_command_file(&mut s, &path, 3, Verbosity::FULL, &mut out).unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(&s.region().backing().bytes()[2..4], &[0xEF, 0xBE]);
        assert!(String::from_utf8(out)
            .unwrap()
            .starts_with("Execute a commands file\n"));
    }
}
