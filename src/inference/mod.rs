//! Chat-style inference backend.
//!
//! Every call is stateless: the whole message history goes out each time.

pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use ollama::OllamaClient;

use crate::config::ModelProfile;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Function declaration offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

/// A structured call as the model emitted it, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Stream a completion, handing each token to `on_token`; returns the
    /// concatenated text.
    async fn stream_chat(
        &self,
        profile: &ModelProfile,
        messages: &[ChatMessage],
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<String>;

    /// Non-streaming completion that may answer with structured calls; every
    /// call in the response is returned in order.
    async fn invoke_tools(
        &self,
        profile: &ModelProfile,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ToolResponse>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolResponse {
    /// Plain text the model produced alongside (or instead of) calls
    pub content: String,
    pub calls: Vec<RawToolCall>,
}
