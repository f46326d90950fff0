use serde::{Deserialize, Serialize};

/// Connection defaults for a known OpenAI-compatible provider.
pub struct BackendConfig {
    pub base_url: &'static str,
    pub api_key_env_var: Option<&'static str>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Openrouter,
    Openai,
    Ollama,
}

impl Backend {
    pub fn config(&self) -> BackendConfig {
        match self {
            Backend::Openrouter => BackendConfig {
                base_url: "https://openrouter.ai/api/v1",
                api_key_env_var: Some("OPENROUTER_API_KEY"),
            },
            Backend::Openai => BackendConfig {
                base_url: "https://api.openai.com/v1",
                api_key_env_var: Some("OPENAI_API_KEY"),
            },
            // Local server, no authentication.
            Backend::Ollama => BackendConfig {
                base_url: "http://localhost:11434/v1",
                api_key_env_var: None,
            },
        }
    }
}
