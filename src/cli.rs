use crate::backend::Backend;
use clap::Parser;
use std::path::PathBuf;

/// Hands a task to a language model and applies the file edits and shell commands
/// it asks for, each confirmed by you first.
#[derive(Parser, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The task to perform. Ignored when `--input` is given.
    pub prompt: Option<String>,

    /// Read the task description from this file
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Answer yes to every confirmation (questions from the model are still asked)
    #[arg(short, long)]
    pub yes: bool,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Command-line values that take precedence over the config file.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Model identifier sent to the backend
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Base URL of the chat completions API
    #[arg(long)]
    pub base_url: Option<String>,

    /// Request model turns as a stream of chunks
    #[arg(long, overrides_with = "no_stream")]
    pub stream: bool,

    /// Request each model turn as one complete response
    #[arg(long)]
    pub no_stream: bool,

    /// Print the conversation sent to the model before every turn
    #[arg(long)]
    pub print_messages: bool,
}
