//! Command dispatcher.
//!
//! A [`Session`] owns the region being debugged and the current byte order. It runs one command at a
//! time: validation, zero or more region accesses, and the printed response all complete before
//! [`Session::execute`] returns.

use std::io::{self, Write};

use pci_bar::{AccessWidth, BarRegion, Endianness, RegionBacking, RegionError};
use thiserror::Error;

use crate::command::Command;
use crate::format::{write_help, HexDump};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Terminated,
}

/// Recoverable, per-command failures. The message is shown to the operator and the session keeps
/// running.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Syntax error (use ? for help)")]
    Syntax,

    #[error("Error: invalid address (maximum allowed is {max:08X})")]
    InvalidAddress { addr: u32, max: u64 },

    #[error("Error: {0}")]
    Access(#[from] RegionError),

    /// Writing the response failed; never shown to the operator, surfaced from `execute` instead.
    #[error(transparent)]
    Output(#[from] io::Error),
}

/// Result of dispatching one command.
#[derive(Debug)]
pub enum Outcome {
    Completed,
    /// The command was reported as failed; the error message has already been printed.
    Rejected(CommandError),
    /// The session has ended. Returned for `q` and for every command issued afterwards.
    Terminated,
}

impl Outcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }
}

pub struct Session<B> {
    region: BarRegion<B>,
    endian: Endianness,
    state: SessionState,
}

impl<B: RegionBacking> Session<B> {
    pub fn new(region: BarRegion<B>) -> Self {
        Self {
            region,
            endian: Endianness::default(),
            state: SessionState::Running,
        }
    }

    pub fn region(&self) -> &BarRegion<B> {
        &self.region
    }

    /// Ends the session and hands back the region for teardown.
    pub fn into_region(self) -> BarRegion<B> {
        self.region
    }

    pub fn endian(&self) -> Endianness {
        self.endian
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    /// Parses and dispatches one input line.
    pub fn execute_line(&mut self, line: &str, out: &mut impl Write) -> io::Result<Outcome> {
        let command = Command::parse(line);
        tracing::debug!(line, ?command, "dispatching");
        self.execute(&command, out)
    }

    /// Dispatches `command`, printing its response (or error message) to `out`.
    ///
    /// Only failures to write to `out` are returned as `Err`.
    pub fn execute(&mut self, command: &Command, out: &mut impl Write) -> io::Result<Outcome> {
        if self.is_terminated() {
            return Ok(Outcome::Terminated);
        }

        let result = match *command {
            Command::Help => write_help(out).map_err(CommandError::from),
            Command::Display { width, addr, len } => self.display(width, addr, len, out),
            Command::Change { width, addr, value } => self.change(width, addr, value),
            Command::Fill {
                width,
                addr,
                value,
                len,
                increment,
            } => self.fill(width, addr, value, len, increment),
            Command::SetEndian { mode } => self.set_endian(mode, out),
            Command::Quit => {
                self.state = SessionState::Terminated;
                return Ok(Outcome::Terminated);
            }
            Command::Invalid { .. } => Err(CommandError::Syntax),
        };

        match result {
            Ok(()) => Ok(Outcome::Completed),
            Err(CommandError::Output(err)) => Err(err),
            Err(err) => {
                writeln!(out, "{err}")?;
                Ok(Outcome::Rejected(err))
            }
        }
    }

    fn display(
        &mut self,
        width: AccessWidth,
        addr: u32,
        len: u32,
        out: &mut impl Write,
    ) -> Result<(), CommandError> {
        self.check_address(addr)?;
        let addr = u64::from(addr);
        let len = self.clamp_len(addr, u64::from(len));
        self.check_alignment(width, addr)?;

        let step = width.bytes() as u64;
        let mut dump = HexDump::new(out, width, addr);
        let mut i = 0;
        while i < len {
            let at = addr + i;
            if !self.fits(width, at) {
                break;
            }
            let value = self.region.read(width, at, self.endian)?;
            dump.push(at, value)?;
            i += step;
        }
        dump.finish()?;
        Ok(())
    }

    fn change(&mut self, width: AccessWidth, addr: u32, value: u32) -> Result<(), CommandError> {
        self.check_address(addr)?;
        let addr = u64::from(addr);
        self.check_alignment(width, addr)?;
        if !self.fits(width, addr) {
            tracing::debug!(
                addr = format_args!("{addr:#010X}"),
                %width,
                "change past region end skipped"
            );
            return Ok(());
        }
        self.region
            .write(width, addr, width.truncate(value), self.endian)?;
        tracing::debug!(
            addr = format_args!("{addr:#010X}"),
            value = format_args!("{:#X}", width.truncate(value)),
            %width,
            "changed register"
        );
        Ok(())
    }

    fn fill(
        &mut self,
        width: AccessWidth,
        addr: u32,
        value: u32,
        len: u32,
        increment: u32,
    ) -> Result<(), CommandError> {
        self.check_address(addr)?;
        let addr = u64::from(addr);
        let len = self.clamp_len(addr, u64::from(len));
        self.check_alignment(width, addr)?;

        let step = width.bytes() as u64;
        let mut i: u64 = 0;
        while i * step < len {
            let at = addr + i * step;
            if !self.fits(width, at) {
                break;
            }
            let element = value.wrapping_add((i as u32).wrapping_mul(increment));
            self.region
                .write(width, at, width.truncate(element), self.endian)?;
            i += 1;
        }
        tracing::debug!(
            addr = format_args!("{addr:#010X}"),
            elements = i,
            %width,
            "filled region"
        );
        Ok(())
    }

    fn set_endian(
        &mut self,
        mode: Option<Endianness>,
        out: &mut impl Write,
    ) -> Result<(), CommandError> {
        match mode {
            None => writeln!(out, "Endian mode: {}", self.endian)?,
            Some(mode) => {
                self.endian = mode;
                tracing::debug!(%mode, "endian mode changed");
            }
        }
        Ok(())
    }

    /// Start addresses up to and including the region size are accepted.
    fn check_address(&self, addr: u32) -> Result<(), CommandError> {
        let max = self.region.size();
        if u64::from(addr) > max {
            return Err(CommandError::InvalidAddress { addr, max });
        }
        Ok(())
    }

    /// An overrunning length is replaced by the whole region size, not by the bytes remaining after
    /// `addr`. The element loops stop at the region end, so the larger length is never dereferenced.
    fn clamp_len(&self, addr: u64, len: u64) -> u64 {
        if addr + len > self.region.size() {
            self.region.size()
        } else {
            len
        }
    }

    /// Rejects a misaligned start address before any output or access. An out-of-range first element
    /// is not an error here; the loops simply perform no accesses.
    fn check_alignment(&self, width: AccessWidth, addr: u64) -> Result<(), CommandError> {
        match self.region.check_access(width, addr) {
            Err(err @ RegionError::Misaligned { .. }) => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn fits(&self, width: AccessWidth, addr: u64) -> bool {
        addr + width.bytes() as u64 <= self.region.size()
    }
}
