//! Runtime configuration.
//!
//! Everything has a built-in default; a TOML file only needs the keys it
//! overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{InvestigatorError, Result};

pub const DEFAULT_HOST: &str = "http://localhost:11434";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestigatorConfig {
    /// Base URL of the inference service
    pub host: String,
    pub thinking: ModelProfile,
    pub tool_calling: ModelProfile,
    pub summarizing: ModelProfile,
    /// ripgrep executable
    pub ripgrep: String,
    /// Per-request timeout for inference calls; unset means wait forever
    pub request_timeout_secs: Option<u64>,
    pub language_servers: Vec<LanguageServerDescriptor>,
}

/// Model name plus sampling options sent with every chat call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub model: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive: i64,
    #[serde(default)]
    pub options: ModelOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
}

/// One external language server and the language ids it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageServerDescriptor {
    pub name: String,
    pub language_ids: Vec<String>,
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Pushed through `workspace/didChangeConfiguration` after the handshake
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl LanguageServerDescriptor {
    pub fn serves(&self, language_id: &str) -> bool {
        self.language_ids.iter().any(|id| id == language_id)
    }
}

fn default_keep_alive() -> i64 {
    -1
}

impl Default for InvestigatorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            thinking: ModelProfile {
                model: "qwq:32b-preview-q4_K_M".to_string(),
                keep_alive: -1,
                options: ModelOptions {
                    num_ctx: Some(8192 * 2),
                    temperature: Some(1.2),
                    num_predict: Some(8192),
                },
            },
            tool_calling: ModelProfile {
                model: "qwen2.5:32b-instruct-q4_K_M".to_string(),
                keep_alive: -1,
                options: ModelOptions {
                    num_ctx: Some(8192 * 2),
                    temperature: Some(0.0),
                    num_predict: None,
                },
            },
            summarizing: ModelProfile {
                model: "mistral-large:123b-instruct-2407-q2_K".to_string(),
                keep_alive: -1,
                // too low a temperature makes the model repeat itself or copy whole files
                options: ModelOptions {
                    num_ctx: Some(8192 * 2),
                    temperature: Some(0.9),
                    num_predict: None,
                },
            },
            ripgrep: "rg".to_string(),
            request_timeout_secs: None,
            language_servers: default_language_servers(),
        }
    }
}

pub fn default_language_servers() -> Vec<LanguageServerDescriptor> {
    vec![
        LanguageServerDescriptor {
            name: "typescript-language-server".to_string(),
            language_ids: vec!["typescript".to_string(), "javascript".to_string()],
            command: vec![
                "typescript-language-server".to_string(),
                "--stdio".to_string(),
            ],
            settings: serde_json::json!({}),
        },
        LanguageServerDescriptor {
            name: "pyright".to_string(),
            language_ids: vec!["python".to_string()],
            command: vec!["pyright-langserver".to_string(), "--stdio".to_string()],
            settings: serde_json::json!({
                "python": { "analysis": { "autoSearchPaths": true } }
            }),
        },
        LanguageServerDescriptor {
            name: "rust-analyzer".to_string(),
            language_ids: vec!["rust".to_string()],
            command: vec!["rust-analyzer".to_string()],
            settings: serde_json::json!({}),
        },
    ]
}

impl InvestigatorConfig {
    /// Load from `path`, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| {
            InvestigatorError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
            .map_err(|e| InvestigatorError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| InvestigatorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(InvestigatorError::Config("host must not be empty".to_string()));
        }
        for server in &self.language_servers {
            if server.command.is_empty() {
                return Err(InvestigatorError::Config(format!(
                    "language server '{}' has an empty command",
                    server.name
                )));
            }
        }
        Ok(())
    }
}
