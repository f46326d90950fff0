//! # Execution Context
//!
//! Everything a tool handler needs from its surroundings: the directory paths are
//! resolved against, whether confirmations are answered automatically, and the
//! terminal streams used for prompts, questions and live output.

use anyhow::Result;
use console::style;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub struct ExecutionContext {
    pub root: PathBuf,
    pub auto_confirm: bool,
    input: Box<dyn BufRead + Send>,
    pub output: Box<dyn Write + Send>,
    pub error_output: Box<dyn Write + Send>,
}

impl ExecutionContext {
    /// A context bound to the process terminal, rooted at the current directory.
    pub fn terminal(auto_confirm: bool) -> Self {
        Self {
            root: PathBuf::from("."),
            auto_confirm,
            input: Box::new(BufReader::new(io::stdin())),
            output: Box::new(io::stdout()),
            error_output: Box::new(io::stderr()),
        }
    }

    /// A context with caller-supplied streams, used by tests and embedders.
    pub fn new(
        root: impl Into<PathBuf>,
        auto_confirm: bool,
        input: Box<dyn BufRead + Send>,
        output: Box<dyn Write + Send>,
        error_output: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            root: root.into(),
            auto_confirm,
            input,
            output,
            error_output,
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Asks `"<description> (y/N): "`. Only `y` (any case) is a yes; end of input is a no.
    /// In auto-confirm mode the prompt is shown already answered and nothing is read.
    pub fn confirm(&mut self, description: &str) -> Result<bool> {
        if self.auto_confirm {
            writeln!(self.output, "{description} (y/N): {}", style("y (auto)").dim())?;
            return Ok(true);
        }
        write!(self.output, "{description} (y/N): ")?;
        self.output.flush()?;
        let answer = self.read_line()?;
        Ok(answer.eq_ignore_ascii_case("y"))
    }

    /// Reads one trimmed line of user input. Never auto-answered.
    pub fn read_answer(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        self.read_line()
    }

    fn read_line(&mut self) -> Result<String> {
        let mut buffer = String::new();
        self.input.read_line(&mut buffer)?;
        Ok(buffer.trim().to_string())
    }

    pub fn println(&mut self, line: impl std::fmt::Display) -> Result<()> {
        writeln!(self.output, "{line}")?;
        Ok(())
    }

    pub fn eprintln(&mut self, line: impl std::fmt::Display) -> Result<()> {
        writeln!(self.error_output, "{line}")?;
        Ok(())
    }
}
