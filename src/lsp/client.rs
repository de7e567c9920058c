//! JSON-RPC 2.0 transport to one language server.
//!
//! Messages are framed with a `Content-Length` header. A background task reads
//! the server's output, hands responses to the waiting request by id, answers
//! server-initiated requests with a null result and drops notifications.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::LanguageServerDescriptor;
use crate::error::{InvestigatorError, Result};

/// Teardown only: how long a server gets to answer `shutdown` and to exit.
const EXIT_GRACE: Duration = Duration::from_secs(5);

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type SharedWriter = Arc<Mutex<BoxedWriter>>;
type Reply = std::result::Result<Value, JsonRpcError>;
type PendingMap = Arc<DashMap<i64, oneshot::Sender<Reply>>>;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: i64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// Anything the server can send: a response, a request or a notification.
#[derive(Debug, Deserialize)]
struct IncomingMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// A live, handshaken (or about to be) connection to one language server.
pub struct LspConnection {
    name: String,
    writer: SharedWriter,
    next_id: AtomicI64,
    pending: PendingMap,
    reader_handle: JoinHandle<()>,
    child: Mutex<Option<Child>>,
}

impl LspConnection {
    /// Spawn the descriptor's command in `root` and complete the handshake.
    pub async fn spawn(descriptor: &LanguageServerDescriptor, root: &Path) -> Result<Self> {
        let (program, args) = descriptor.command.split_first().ok_or_else(|| {
            InvestigatorError::Config(format!("language server '{}' has no command", descriptor.name))
        })?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(root)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                InvestigatorError::Lsp(format!(
                    "failed to spawn language server '{}': {}",
                    descriptor.name, e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| InvestigatorError::Lsp("failed to capture server stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| InvestigatorError::Lsp("failed to capture server stdout".to_string()))?;

        let connection = Self::from_streams(&descriptor.name, stdout, stdin);
        *connection.child.lock().await = Some(child);

        connection.initialize(root, &descriptor.settings).await?;
        info!(server = %descriptor.name, root = %root.display(), "language server ready");
        Ok(connection)
    }

    /// Wrap an already-open duplex stream pair. No handshake is performed.
    pub fn from_streams<R, W>(name: &str, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: SharedWriter = Arc::new(Mutex::new(Box::new(writer)));
        let pending: PendingMap = Arc::new(DashMap::new());

        let reader_handle = tokio::spawn(reader_loop(
            name.to_string(),
            reader,
            Arc::clone(&pending),
            Arc::clone(&writer),
        ));

        Self {
            name: name.to_string(),
            writer,
            next_id: AtomicI64::new(1),
            pending,
            reader_handle,
            child: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `initialize` -> `initialized` -> `workspace/didChangeConfiguration`.
    pub async fn initialize(&self, root: &Path, settings: &Value) -> Result<()> {
        let root_uri = super::parse_uri(&super::path_to_uri(root))?;
        let folder_name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root.display().to_string());

        #[allow(deprecated)]
        let params = lsp_types::InitializeParams {
            process_id: Some(std::process::id()),
            root_uri: Some(root_uri.clone()),
            capabilities: lsp_types::ClientCapabilities {
                text_document: Some(lsp_types::TextDocumentClientCapabilities {
                    synchronization: Some(lsp_types::TextDocumentSyncClientCapabilities::default()),
                    references: Some(lsp_types::DynamicRegistrationClientCapabilities {
                        dynamic_registration: Some(false),
                    }),
                    implementation: Some(lsp_types::GotoCapability {
                        dynamic_registration: Some(false),
                        link_support: Some(true),
                    }),
                    ..Default::default()
                }),
                workspace: Some(lsp_types::WorkspaceClientCapabilities {
                    did_change_configuration: Some(
                        lsp_types::DynamicRegistrationClientCapabilities {
                            dynamic_registration: Some(false),
                        },
                    ),
                    ..Default::default()
                }),
                ..Default::default()
            },
            workspace_folders: Some(vec![lsp_types::WorkspaceFolder {
                uri: root_uri,
                name: folder_name,
            }]),
            ..Default::default()
        };

        self.request::<lsp_types::request::Initialize>(params).await?;
        self.notify::<lsp_types::notification::Initialized>(lsp_types::InitializedParams {})
            .await?;
        self.notify::<lsp_types::notification::DidChangeConfiguration>(
            lsp_types::DidChangeConfigurationParams {
                settings: settings.clone(),
            },
        )
        .await?;
        Ok(())
    }

    /// Typed request; waits for the matching response without a deadline.
    pub async fn request<R: lsp_types::request::Request>(
        &self,
        params: R::Params,
    ) -> Result<R::Result> {
        let params = serde_json::to_value(params)?;
        let result = self.call(R::METHOD, Some(params)).await?;
        serde_json::from_value(result).map_err(|e| {
            InvestigatorError::Lsp(format!("malformed '{}' response: {}", R::METHOD, e))
        })
    }

    pub async fn notify<N: lsp_types::notification::Notification>(
        &self,
        params: N::Params,
    ) -> Result<()> {
        let params = serde_json::to_value(params)?;
        self.send_notification(N::METHOD, Some(params)).await
    }

    /// `shutdown` -> `exit` -> wait for the process. Errors are logged, not returned.
    pub async fn shutdown(&self) {
        match tokio::time::timeout(EXIT_GRACE, self.call("shutdown", None)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(server = %self.name, error = %e, "shutdown request failed"),
            Err(_) => debug!(server = %self.name, "shutdown request unanswered"),
        }
        if let Err(e) = self.send_notification("exit", None).await {
            debug!(server = %self.name, error = %e, "exit notification failed");
        }

        if let Some(mut child) = self.child.lock().await.take() {
            if tokio::time::timeout(EXIT_GRACE, child.wait()).await.is_err() {
                warn!(server = %self.name, "language server did not exit, killing it");
                let _ = child.kill().await;
            }
        }
        self.reader_handle.abort();
    }

    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let (tx, rx) = oneshot::channel::<Reply>();
        self.pending.insert(id, tx);

        let body = serde_json::to_string(&request)?;
        if let Err(e) = write_message(&self.writer, &body).await {
            self.pending.remove(&id);
            return Err(e);
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(InvestigatorError::Lsp(format!(
                "'{}' failed with code {}: {}",
                method, error.code, error.message
            ))),
            Err(_) => Err(InvestigatorError::Lsp(format!(
                "connection to '{}' closed while waiting for '{}'",
                self.name, method
            ))),
        }
    }

    async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        };
        let body = serde_json::to_string(&notification)?;
        write_message(&self.writer, &body).await
    }
}

impl Drop for LspConnection {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

/// Encode a JSON-RPC body with its `Content-Length` header.
pub fn encode_message(body: &str) -> Vec<u8> {
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut output = Vec::with_capacity(header.len() + body.len());
    output.extend_from_slice(header.as_bytes());
    output.extend_from_slice(body.as_bytes());
    output
}

/// Read one framed message body. `Ok(None)` on a clean end of stream.
pub async fn read_message<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut content_length: Option<usize> = None;
    let mut header = String::new();

    loop {
        header.clear();
        if reader.read_line(&mut header).await? == 0 {
            return Ok(None);
        }
        let line = header.trim();
        if line.is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<usize>().ok();
            }
        }
    }

    let length = content_length.unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    String::from_utf8(body)
        .map(Some)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

async fn write_message(writer: &SharedWriter, body: &str) -> Result<()> {
    let frame = encode_message(body);
    let mut writer = writer.lock().await;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    debug!("lsp -> {}", body);
    Ok(())
}

async fn reader_loop<R: AsyncRead + Unpin>(
    name: String,
    stream: R,
    pending: PendingMap,
    writer: SharedWriter,
) {
    let mut reader = BufReader::new(stream);

    loop {
        let body = match read_message(&mut reader).await {
            Ok(Some(body)) => body,
            Ok(None) => break,
            Err(e) => {
                warn!(server = %name, error = %e, "failed to read from language server");
                break;
            }
        };
        debug!("lsp <- {}", body);

        let message: IncomingMessage = match serde_json::from_str(&body) {
            Ok(message) => message,
            Err(e) => {
                debug!(server = %name, error = %e, "skipping unparseable message");
                continue;
            }
        };

        match (message.method, message.id) {
            (Some(method), Some(id)) => {
                // server -> client request; a null result satisfies the ones we see
                debug!(server = %name, %method, "answering server request");
                let reply = serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": null });
                if let Err(e) = write_message(&writer, &reply.to_string()).await {
                    warn!(server = %name, error = %e, "failed to answer server request");
                }
            }
            (Some(method), None) => {
                debug!(server = %name, %method, "ignoring server notification");
            }
            (None, Some(id)) => {
                let Some(id) = id.as_i64() else {
                    continue;
                };
                if let Some((_, sender)) = pending.remove(&id) {
                    let reply = match message.error {
                        Some(error) => Err(error),
                        None => Ok(message.result.unwrap_or(Value::Null)),
                    };
                    let _ = sender.send(reply);
                }
            }
            (None, None) => {}
        }
    }

    // dropping the senders wakes every waiting request with a closed-channel error
    pending.clear();
}
