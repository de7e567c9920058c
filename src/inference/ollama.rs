use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatMessage, InferenceService, RawToolCall, ToolDefinition, ToolResponse};
use crate::config::{ModelOptions, ModelProfile};
use crate::error::{InvestigatorError, Result};

/// Client for the Ollama `/api/chat` endpoint.
pub struct OllamaClient {
    host: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| {
            InvestigatorError::Inference(format!("failed to build inference http client: {}", e))
        })?;

        Ok(Self {
            host: host.into(),
            http,
        })
    }

    fn chat_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.ends_with("/api/chat") {
            host.to_string()
        } else if host.ends_with("/api") {
            format!("{}/chat", host)
        } else {
            format!("{}/api/chat", host)
        }
    }

    async fn send(&self, payload: &ChatRequest<'_>) -> Result<reqwest::Response> {
        debug!(
            model = %payload.model,
            messages = payload.messages.len(),
            stream = payload.stream,
            tools = payload.tools.map(|t| t.len()).unwrap_or(0),
            "inference call"
        );

        let response = self
            .http
            .post(self.chat_url())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                InvestigatorError::Transport(format!(
                    "inference request failed (model={}): {}",
                    payload.model, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InvestigatorError::Inference(format!(
                "inference endpoint returned HTTP {}: {}",
                status,
                truncate_for_error(&body)
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl InferenceService for OllamaClient {
    async fn stream_chat(
        &self,
        profile: &ModelProfile,
        messages: &[ChatMessage],
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<String> {
        let payload = ChatRequest::new(profile, messages, true, None);
        let response = self.send(&payload).await?;

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut text = String::new();
        let mut done = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                InvestigatorError::Transport(format!("inference stream interrupted: {}", e))
            })?;
            buffer.extend_from_slice(&chunk);

            while let Some(end) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=end).collect();
                done |= consume_stream_line(&line, &mut text, on_token)?;
            }
        }
        if !buffer.is_empty() {
            done |= consume_stream_line(&buffer, &mut text, on_token)?;
        }

        if !done {
            return Err(InvestigatorError::Transport(
                "inference stream ended before completion".to_string(),
            ));
        }
        Ok(text)
    }

    async fn invoke_tools(
        &self,
        profile: &ModelProfile,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ToolResponse> {
        let payload = ChatRequest::new(profile, messages, false, Some(tools));
        let response = self.send(&payload).await?;
        let body = response.text().await.map_err(|e| {
            InvestigatorError::Transport(format!("failed to read inference response body: {}", e))
        })?;

        let parsed: ChatChunk = serde_json::from_str(&body).map_err(|e| {
            InvestigatorError::Inference(format!(
                "invalid JSON from inference endpoint: {} (body={})",
                e,
                truncate_for_error(&body)
            ))
        })?;
        if let Some(error) = parsed.error {
            return Err(InvestigatorError::Inference(error));
        }

        let message = parsed.message.unwrap_or_default();
        let calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                Ok(RawToolCall {
                    name: call.function.name,
                    arguments: call.function.arguments.into_object()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ToolResponse {
            content: message.content,
            calls,
        })
    }
}

/// Feed one NDJSON line; returns whether it was the final chunk.
fn consume_stream_line(
    line: &[u8],
    text: &mut String,
    on_token: &mut (dyn FnMut(&str) + Send),
) -> Result<bool> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }

    let chunk: ChatChunk = serde_json::from_str(line).map_err(|e| {
        InvestigatorError::Transport(format!(
            "malformed stream chunk: {} (chunk={})",
            e,
            truncate_for_error(line)
        ))
    })?;
    if let Some(error) = chunk.error {
        return Err(InvestigatorError::Inference(error));
    }
    if let Some(message) = chunk.message {
        if !message.content.is_empty() {
            on_token(&message.content);
            text.push_str(&message.content);
        }
    }
    Ok(chunk.done)
}

fn truncate_for_error(value: &str) -> String {
    const LIMIT: usize = 400;
    if value.len() <= LIMIT {
        value.to_string()
    } else {
        let mut end = LIMIT;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &value[..end])
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    keep_alive: i64,
    options: &'a ModelOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

impl<'a> ChatRequest<'a> {
    fn new(
        profile: &'a ModelProfile,
        messages: &'a [ChatMessage],
        stream: bool,
        tools: Option<&'a [ToolDefinition]>,
    ) -> Self {
        Self {
            model: &profile.model,
            messages,
            stream,
            keep_alive: profile.keep_alive,
            options: &profile.options,
            tools,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Arguments,
}

/// Ollama sends an object; OpenAI-style backends send the JSON as text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Arguments {
    Text(String),
    Value(serde_json::Value),
}

impl Default for Arguments {
    fn default() -> Self {
        Arguments::Value(serde_json::Value::Null)
    }
}

impl Arguments {
    fn into_object(self) -> Result<serde_json::Value> {
        match self {
            Arguments::Text(text) if text.trim().is_empty() => Ok(serde_json::json!({})),
            Arguments::Text(text) => serde_json::from_str(&text).map_err(|e| {
                InvestigatorError::Inference(format!(
                    "tool call arguments are not valid JSON: {} ({})",
                    e,
                    truncate_for_error(&text)
                ))
            }),
            Arguments::Value(serde_json::Value::Null) => Ok(serde_json::json!({})),
            Arguments::Value(value) => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn profile() -> ModelProfile {
        ModelProfile {
            model: "qwen2.5:7b".to_string(),
            keep_alive: -1,
            options: ModelOptions {
                temperature: Some(0.0),
                ..Default::default()
            },
        }
    }

    /// Serves each body once, in order, and returns the request heads it saw.
    async fn spawn_mock_chat_server(
        bodies: Vec<String>,
    ) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for body in bodies {
                let (mut socket, _) = listener.accept().await.expect("accept");
                requests.push(read_request(&mut socket).await);

                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
            requests
        });

        (format!("http://{}", addr), handle)
    }

    /// Read headers and the full body, however the client splits its writes.
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0_u8; 8192];
        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if raw.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).to_string()
    }

    fn stream_body(tokens: &[&str]) -> String {
        let mut lines: Vec<String> = tokens
            .iter()
            .map(|t| {
                serde_json::json!({"message": {"role": "assistant", "content": t}, "done": false})
                    .to_string()
            })
            .collect();
        lines.push(
            serde_json::json!({"message": {"role": "assistant", "content": ""}, "done": true})
                .to_string(),
        );
        lines.join("\n") + "\n"
    }

    #[test]
    fn test_chat_url_normalisation() {
        let client = OllamaClient::new("http://localhost:11434/", None).unwrap();
        assert_eq!(client.chat_url(), "http://localhost:11434/api/chat");
        let client = OllamaClient::new("http://h/api", None).unwrap();
        assert_eq!(client.chat_url(), "http://h/api/chat");
    }

    #[tokio::test]
    async fn test_stream_chat_concatenates_tokens_in_order() {
        let (host, server) = spawn_mock_chat_server(vec![stream_body(&["The ", "answer", "."])]).await;
        let client = OllamaClient::new(host, None).unwrap();

        let mut seen = Vec::new();
        let text = client
            .stream_chat(&profile(), &[ChatMessage::user("hi")], &mut |t: &str| {
                seen.push(t.to_string())
            })
            .await
            .unwrap();

        assert_eq!(text, "The answer.");
        assert_eq!(seen, vec!["The ", "answer", "."]);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/chat"));
        assert!(requests[0].contains("\"stream\":true"));
        assert!(requests[0].contains("\"keep_alive\":-1"));
    }

    #[tokio::test]
    async fn test_stream_error_chunk_is_fatal() {
        let body = format!(
            "{}\n{}\n",
            serde_json::json!({"message": {"content": "par"}, "done": false}),
            serde_json::json!({"error": "model unloaded"})
        );
        let (host, _server) = spawn_mock_chat_server(vec![body]).await;
        let client = OllamaClient::new(host, None).unwrap();

        let err = client
            .stream_chat(&profile(), &[ChatMessage::user("hi")], &mut |_: &str| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model unloaded"));
    }

    #[tokio::test]
    async fn test_truncated_stream_is_transport_error() {
        let body = format!(
            "{}\n",
            serde_json::json!({"message": {"content": "par"}, "done": false})
        );
        let (host, _server) = spawn_mock_chat_server(vec![body]).await;
        let client = OllamaClient::new(host, None).unwrap();

        let err = client
            .stream_chat(&profile(), &[ChatMessage::user("hi")], &mut |_: &str| {})
            .await
            .unwrap_err();
        assert!(matches!(err, InvestigatorError::Transport(_)));
    }

    #[tokio::test]
    async fn test_invoke_tools_returns_every_call_with_object_arguments() {
        let body = serde_json::json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "report", "arguments": {"reason": "continue"}}},
                    {"function": {"name": "openFile", "arguments": "{\"filePath\": \"a.ts\"}"}}
                ]
            },
            "done": true
        })
        .to_string();
        let (host, server) = spawn_mock_chat_server(vec![body]).await;
        let client = OllamaClient::new(host, None).unwrap();

        let tools = vec![ToolDefinition {
            kind: "function",
            function: crate::inference::FunctionDefinition {
                name: "report",
                description: "report",
                parameters: serde_json::json!({"type": "object"}),
            },
        }];
        let response = client
            .invoke_tools(&profile(), &[ChatMessage::user("go")], &tools)
            .await
            .unwrap();

        assert_eq!(response.calls.len(), 2);
        assert_eq!(response.calls[0].name, "report");
        assert_eq!(response.calls[0].arguments["reason"], "continue");
        assert_eq!(response.calls[1].arguments["filePath"], "a.ts");

        let requests = server.await.unwrap();
        assert!(requests[0].contains("\"stream\":false"));
        assert!(requests[0].contains("\"tools\":["));
    }

    #[tokio::test]
    async fn test_invoke_tools_without_calls_is_empty() {
        let body = serde_json::json!({
            "message": {"role": "assistant", "content": "I will open the file."},
            "done": true
        })
        .to_string();
        let (host, _server) = spawn_mock_chat_server(vec![body]).await;
        let client = OllamaClient::new(host, None).unwrap();

        let response = client
            .invoke_tools(&profile(), &[ChatMessage::user("go")], &[])
            .await
            .unwrap();
        assert!(response.calls.is_empty());
        assert_eq!(response.content, "I will open the file.");
    }

    #[tokio::test]
    async fn test_invoke_tools_accepts_null_tool_calls() {
        let body = serde_json::json!({
            "message": {"role": "assistant", "content": "nothing to call", "tool_calls": null},
            "done": true
        })
        .to_string();
        let (host, _server) = spawn_mock_chat_server(vec![body]).await;
        let client = OllamaClient::new(host, None).unwrap();

        let response = client
            .invoke_tools(&profile(), &[ChatMessage::user("go")], &[])
            .await
            .unwrap();
        assert!(response.calls.is_empty());
        assert_eq!(response.content, "nothing to call");
    }
}
