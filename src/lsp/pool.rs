use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::client::LspConnection;
use crate::config::LanguageServerDescriptor;
use crate::error::Result;

/// Lazily started language servers, one per descriptor, shared by every
/// language id the descriptor declares.
pub struct ConnectionPool {
    root: PathBuf,
    descriptors: Vec<LanguageServerDescriptor>,
    state: Mutex<PoolState>,
}

#[derive(Default)]
struct PoolState {
    live: HashMap<String, Arc<LspConnection>>,
    /// Descriptors that failed to start; not retried within the session
    failed: HashSet<String>,
}

impl ConnectionPool {
    pub fn new(root: impl AsRef<Path>, descriptors: Vec<LanguageServerDescriptor>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            descriptors,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Connection for `language_id`, starting its server on first use.
    ///
    /// `Ok(None)` means no server is available for the language: either no
    /// descriptor covers it or its server could not be started.
    pub async fn get(&self, language_id: &str) -> Result<Option<Arc<LspConnection>>> {
        let mut state = self.state.lock().await;
        if let Some(connection) = state.live.get(language_id) {
            return Ok(Some(Arc::clone(connection)));
        }

        let Some(descriptor) = self.descriptors.iter().find(|d| d.serves(language_id)) else {
            debug!(language_id, "no language server descriptor");
            return Ok(None);
        };
        if state.failed.contains(&descriptor.name) {
            return Ok(None);
        }

        match LspConnection::spawn(descriptor, &self.root).await {
            Ok(connection) => {
                let connection = Arc::new(connection);
                for id in &descriptor.language_ids {
                    state.live.insert(id.clone(), Arc::clone(&connection));
                }
                Ok(Some(connection))
            }
            Err(e) => {
                warn!(server = %descriptor.name, error = %e, "language server unavailable");
                state.failed.insert(descriptor.name.clone());
                Ok(None)
            }
        }
    }

    /// Install an already-initialised connection under the given language ids.
    pub async fn register(&self, language_ids: &[&str], connection: Arc<LspConnection>) {
        let mut state = self.state.lock().await;
        for id in language_ids {
            state.live.insert(id.to_string(), Arc::clone(&connection));
        }
    }

    pub async fn is_live(&self, language_id: &str) -> bool {
        self.state.lock().await.live.contains_key(language_id)
    }

    /// Shut every distinct connection down and empty the pool.
    pub async fn shutdown(&self) {
        let live: Vec<Arc<LspConnection>> = {
            let mut state = self.state.lock().await;
            state.live.drain().map(|(_, c)| c).collect()
        };

        let mut distinct: Vec<Arc<LspConnection>> = Vec::new();
        for connection in live {
            if !distinct.iter().any(|c| Arc::ptr_eq(c, &connection)) {
                distinct.push(connection);
            }
        }
        for connection in distinct {
            debug!(server = connection.name(), "shutting down language server");
            connection.shutdown().await;
        }
    }
}
