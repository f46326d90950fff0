//! Where the task text comes from: the command line or a task file.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::PathBuf;

pub trait TaskSource {
    /// Produces the task text handed to the agent.
    fn task(&self) -> Result<String>;
}

/// A task given directly as the positional prompt.
pub struct InlineTaskSource(pub String);

impl TaskSource for InlineTaskSource {
    fn task(&self) -> Result<String> {
        let task = self.0.trim();
        if task.is_empty() {
            bail!("the task is empty");
        }
        Ok(task.to_string())
    }
}

/// A task read from a file, as given with `--input`.
pub struct FileTaskSource(pub PathBuf);

impl TaskSource for FileTaskSource {
    fn task(&self) -> Result<String> {
        let content = fs::read_to_string(&self.0)
            .with_context(|| format!("failed to read task file {}", self.0.display()))?;
        InlineTaskSource(content).task()
    }
}

/// Picks the task source from the command line: the input file wins over the
/// positional prompt.
pub fn from_cli(prompt: Option<String>, input: Option<PathBuf>) -> Result<Box<dyn TaskSource>> {
    match (input, prompt) {
        (Some(path), _) => Ok(Box::new(FileTaskSource(path))),
        (None, Some(prompt)) => Ok(Box::new(InlineTaskSource(prompt))),
        (None, None) => bail!("no task given; pass a prompt or --input <FILE>"),
    }
}
