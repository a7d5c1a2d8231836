use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};

pub const PROMPT: &str = "PCI> ";

/// One step of input from the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A trimmed line. May be empty.
    Line(String),
    /// End of input on an interactive terminal (Ctrl-D). The operator can keep typing afterwards.
    Eof,
    /// The input stream is gone for good.
    Closed,
}

/// Supplies one line of text per call, blocking until it is available.
pub trait LineSource {
    fn next_line(&mut self) -> io::Result<Input>;
}

/// Prompts on `prompt_out` and reads lines from `reader`.
pub struct PromptedLines<R, W> {
    reader: R,
    prompt_out: W,
    interactive: bool,
}

impl<R: BufRead, W: Write> PromptedLines<R, W> {
    /// `interactive` decides how end of input is reported: [`Input::Eof`] for a terminal, where the
    /// operator may continue after Ctrl-D, [`Input::Closed`] for pipes and files.
    pub fn new(reader: R, prompt_out: W, interactive: bool) -> Self {
        Self {
            reader,
            prompt_out,
            interactive,
        }
    }
}

impl PromptedLines<io::StdinLock<'static>, io::Stdout> {
    pub fn stdin() -> Self {
        let stdin = io::stdin();
        let interactive = stdin.is_terminal();
        Self::new(stdin.lock(), io::stdout(), interactive)
    }
}

impl<R: BufRead, W: Write> LineSource for PromptedLines<R, W> {
    fn next_line(&mut self) -> io::Result<Input> {
        write!(self.prompt_out, "{PROMPT}")?;
        self.prompt_out.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(if self.interactive {
                Input::Eof
            } else {
                Input::Closed
            });
        }
        Ok(Input::Line(line.trim().to_string()))
    }
}

/// Fixed list of lines; reports [`Input::Closed`] once drained.
#[derive(Debug, Default, Clone)]
pub struct ScriptedLines {
    lines: VecDeque<Input>,
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(|l| Input::Line(l.into())).collect(),
        }
    }

    /// Queues a terminal end-of-input event.
    pub fn push_eof(&mut self) {
        self.lines.push_back(Input::Eof);
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl LineSource for ScriptedLines {
    fn next_line(&mut self) -> io::Result<Input> {
        Ok(self.lines.pop_front().unwrap_or(Input::Closed))
    }
}
