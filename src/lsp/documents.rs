use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use super::pool::ConnectionPool;
use crate::error::Result;
use crate::languages::LanguageRegistry;
use crate::REGISTRY;

/// A file as the session first saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: PathBuf,
    pub uri: String,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

impl Document {
    /// Zero-based line without its line terminator.
    pub fn line(&self, index: u32) -> Option<&str> {
        self.text
            .split('\n')
            .nth(index as usize)
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
    }
}

/// One copy of each opened file for the whole session, keyed by normalized
/// absolute path.
///
/// Files are read once; later changes on disk are not picked up. The first
/// open of a file announces it to the language server for its language.
pub struct DocumentCache {
    pool: Arc<ConnectionPool>,
    documents: Mutex<HashMap<PathBuf, Arc<Document>>>,
}

impl DocumentCache {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            documents: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &REGISTRY
    }

    pub async fn open(&self, path: &Path) -> Result<Arc<Document>> {
        let path = super::normalize_path(path);
        let mut documents = self.documents.lock().await;
        if let Some(document) = documents.get(&path) {
            return Ok(Arc::clone(document));
        }

        let bytes = tokio::fs::read(&path).await?;
        let text = String::from_utf8(bytes).unwrap_or_else(|e| {
            debug!(path = %path.display(), "file is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        });
        let document = Arc::new(Document {
            uri: super::path_to_uri(&path),
            language_id: REGISTRY.language_id_for(&path).to_string(),
            path,
            version: 1,
            text,
        });

        if let Some(connection) = self.pool.get(&document.language_id).await? {
            connection
                .notify::<lsp_types::notification::DidOpenTextDocument>(
                    lsp_types::DidOpenTextDocumentParams {
                        text_document: lsp_types::TextDocumentItem {
                            uri: super::parse_uri(&document.uri)?,
                            language_id: document.language_id.clone(),
                            version: document.version,
                            text: document.text.clone(),
                        },
                    },
                )
                .await?;
            debug!(path = %document.path.display(), server = connection.name(), "document opened");
        }

        documents.insert(document.path.clone(), Arc::clone(&document));
        Ok(document)
    }
}

/// Prefix every line with its zero-based number, padded to a common width.
pub fn number_lines(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let width = lines.len().to_string().len();
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| format!("{:>width$}: {}", index, line, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}
