use crate::backend::Backend;
use crate::cli::ConfigOverrides;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a software engineering agent working inside the user's project directory.
You receive the project structure and a task. Use the tools to inspect and change the project:
- `get_file_contents` to read files before changing them,
- `modify_files` to write complete new file contents (never partial snippets),
- `run_command` to build, test or inspect the project with a shell command,
- `ask_question` when the task is ambiguous and you need the user's decision.
Every side effect is confirmed by the user, who may decline; adapt when they do.
When the task is finished, call `task_complete`.";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    /// Overrides the backend's default URL when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub model: String,
    pub system_prompt: String,
    /// HTTP timeout per model turn; 0 disables it.
    pub timeout_seconds: u64,
    pub stream: bool,
    /// Maximum model turns per task; 0 means no limit.
    pub max_turns: usize,
    /// Lines of each file included in the project structure; 0 lists names only.
    pub snippet_max_lines: usize,
    pub print_messages: bool,
    pub debug_tool_calls: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            base_url: None,
            model: "openai/gpt-4o".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout_seconds: 0,
            stream: true,
            max_turns: 0,
            snippet_max_lines: 0,
            print_messages: false,
            debug_tool_calls: false,
        }
    }
}

impl Config {
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.backend.config().base_url.to_string())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(backend) = overrides.backend {
            if backend != self.backend {
                self.base_url = None;
            }
            self.backend = backend;
        }
        if let Some(base_url) = &overrides.base_url {
            self.base_url = Some(base_url.clone());
        }
        if let Some(model) = &overrides.model {
            self.model = model.clone();
        }
        if overrides.stream {
            self.stream = true;
        }
        if overrides.no_stream {
            self.stream = false;
        }
        if overrides.print_messages {
            self.print_messages = true;
        }
    }
}

/// Loads `$XDG_CONFIG_HOME/errand/config.toml`, creating it with defaults on first
/// run, then applies command-line overrides.
pub fn load(overrides: &ConfigOverrides) -> Result<Config> {
    let xdg_dirs = xdg::BaseDirectories::new();
    let config_path = xdg_dirs.place_config_file("errand/config.toml")?;
    let mut config = load_or_create(&config_path)?;
    config.apply_overrides(overrides);
    Ok(config)
}

pub fn load_or_create(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        let default_config = Config::default();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(config_path, toml::to_string_pretty(&default_config)?)?;
        println!("Created default config at: {}", config_path.display());
        return Ok(default_config);
    }

    let config_string = fs::read_to_string(config_path)?;
    let config: Config = toml::from_str(&config_string)?;

    // Missing keys were filled from defaults; write them back so every option is visible.
    let complete = toml::to_string_pretty(&config)?;
    if complete != config_string {
        fs::write(config_path, complete)?;
    }

    Ok(config)
}
