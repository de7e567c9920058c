use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::params::{
    CodeNavigationParams, ListDirParams, OpenFileParams, SearchBy, SearchFilesParams, ToolParams,
};
use super::schema::{definition, validate};
use crate::config::InvestigatorConfig;
use crate::error::{InvestigatorError, Result};
use crate::inference::{RawToolCall, ToolDefinition};
use crate::lsp::{number_lines, ConnectionPool, DocumentCache, NavigationRequest, NavigationResolver};
use crate::search::{render_hits, SearchAdapter};

/// A validated call to one of the investigation tools.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    SearchFiles(SearchFilesParams),
    OpenFile(OpenFileParams),
    CodeNavigation(CodeNavigationParams),
    ListDir(ListDirParams),
}

impl ToolCall {
    /// Validate a raw call against the declared schema of the tool it names.
    pub fn from_raw(raw: &RawToolCall) -> Result<Self> {
        let args = &raw.arguments;
        match raw.name.as_str() {
            name if name == SearchFilesParams::NAME => Ok(Self::SearchFiles(validate(args)?)),
            name if name == OpenFileParams::NAME => Ok(Self::OpenFile(validate(args)?)),
            name if name == CodeNavigationParams::NAME => Ok(Self::CodeNavigation(validate(args)?)),
            name if name == ListDirParams::NAME => Ok(Self::ListDir(validate(args)?)),
            other => Err(InvestigatorError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SearchFiles(_) => SearchFilesParams::NAME,
            Self::OpenFile(_) => OpenFileParams::NAME,
            Self::CodeNavigation(_) => CodeNavigationParams::NAME,
            Self::ListDir(_) => ListDirParams::NAME,
        }
    }
}

/// Declarations of the four investigation tools, in the order they are offered.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        definition::<SearchFilesParams>(),
        definition::<OpenFileParams>(),
        definition::<CodeNavigationParams>(),
        definition::<ListDirParams>(),
    ]
}

/// Executes tool calls against one workspace.
///
/// Owns the session's search adapter, connection pool and document cache.
pub struct Toolbox {
    root: PathBuf,
    search: SearchAdapter,
    pool: Arc<ConnectionPool>,
    documents: DocumentCache,
}

impl Toolbox {
    pub fn new(root: impl AsRef<Path>, config: &InvestigatorConfig) -> Self {
        let root = root.as_ref();
        Self::with_parts(
            root,
            SearchAdapter::new(root, config.ripgrep.clone()),
            Arc::new(ConnectionPool::new(root, config.language_servers.clone())),
        )
    }

    pub fn with_parts(root: impl AsRef<Path>, search: SearchAdapter, pool: Arc<ConnectionPool>) -> Self {
        let documents = DocumentCache::new(Arc::clone(&pool));
        Self {
            root: root.as_ref().to_path_buf(),
            search,
            pool,
            documents,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Validate and execute a call exactly as the model produced it.
    pub async fn call(&self, raw: &RawToolCall) -> Result<String> {
        let call = ToolCall::from_raw(raw)?;
        self.execute(&call).await
    }

    /// Run a validated call. Recoverable failures come back as `Error: ...`
    /// text so the next iteration can react to them.
    pub async fn execute(&self, call: &ToolCall) -> Result<String> {
        info!(tool = call.name(), "executing tool");
        let result = match call {
            ToolCall::SearchFiles(params) => self.search_files(params).await,
            ToolCall::OpenFile(params) => self.open_file(params).await,
            ToolCall::CodeNavigation(params) => self.code_navigation(params).await,
            ToolCall::ListDir(params) => self.list_dir(params).await,
        };

        match result {
            Err(e) if e.is_recoverable() => {
                debug!(tool = call.name(), error = %e, "recoverable tool failure");
                Ok(format!("Error: {}", e))
            }
            other => other,
        }
    }

    pub async fn search_files(&self, params: &SearchFilesParams) -> Result<String> {
        let hits = match params.search_by {
            SearchBy::Filename => self.search.search_by_filename(&params.pattern).await?,
            SearchBy::Content => self.search.search_by_content(&params.pattern).await?,
        };
        if hits.is_empty() {
            return Ok("No file found.".to_string());
        }
        Ok(format!(
            "The following files were found:\n```\n{}\n```\n",
            render_hits(&hits)
        ))
    }

    pub async fn open_file(&self, params: &OpenFileParams) -> Result<String> {
        let path = self.root.join(&params.file_path);
        let document = match self.documents.open(&path).await {
            Ok(document) => document,
            Err(InvestigatorError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                return Ok(format!(
                    "Error: No such file or directory at '{}'",
                    params.file_path
                ));
            }
            Err(e) => return Err(e),
        };

        Ok(format!(
            "```{}\n// file://{}\n// line numbers prepend for each line starts from line number 0\n{}\n```",
            document.language_id,
            params.file_path,
            number_lines(&document.text)
        ))
    }

    pub async fn code_navigation(&self, params: &CodeNavigationParams) -> Result<String> {
        let resolver = NavigationResolver::new(&self.root, &self.documents, &self.pool);
        resolver
            .navigate(&NavigationRequest {
                file_path: &params.file_path,
                line: params.line,
                identifier: &params.identifier,
                occurrence: params.nth_id,
                kind: params.kind,
            })
            .await
    }

    pub async fn list_dir(&self, params: &ListDirParams) -> Result<String> {
        let dir = params
            .dir_path
            .as_deref()
            .filter(|dir| !dir.is_empty())
            .unwrap_or(".");
        match self.list_entries(dir).await {
            Ok(entries) => Ok(format!("```\n{}\n```", entries.join("\n"))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Ok(format!("Error: No such file or directory at '{}'", dir))
            }
            Err(e) => Ok(format!("Error: {}", e)),
        }
    }

    /// Entry paths relative to the workspace root, sorted.
    async fn list_entries(&self, dir: &str) -> std::io::Result<Vec<String>> {
        let full = self.root.join(dir);
        let mut reader = tokio::fs::read_dir(&full).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(&path);
            let relative = relative.strip_prefix(".").unwrap_or(relative);
            entries.push(relative.display().to_string());
        }
        entries.sort();
        Ok(entries)
    }

    /// Close every language server connection opened during the session.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn toolbox(dir: &TempDir) -> Toolbox {
        Toolbox::with_parts(
            dir.path(),
            SearchAdapter::new(dir.path(), "rg"),
            Arc::new(ConnectionPool::new(dir.path(), Vec::new())),
        )
    }

    fn raw(name: &str, arguments: serde_json::Value) -> RawToolCall {
        RawToolCall {
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_from_raw_builds_closed_variants() {
        let call = ToolCall::from_raw(&raw("listDir", json!({}))).unwrap();
        assert_eq!(call, ToolCall::ListDir(ListDirParams { dir_path: None }));
        assert_eq!(call.name(), "listDir");

        let call = ToolCall::from_raw(&raw(
            "codeNavigation",
            json!({"type": "references", "filePath": "a.ts", "line": 0, "identifier": "x", "nthId": 1}),
        ))
        .unwrap();
        match call {
            ToolCall::CodeNavigation(params) => assert_eq!(params.nth_id, Some(1)),
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_tool_is_rejected() {
        let err = ToolCall::from_raw(&raw("deleteFile", json!({}))).unwrap_err();
        assert!(matches!(err, InvestigatorError::UnknownTool(name) if name == "deleteFile"));
    }

    #[test]
    fn test_definitions_cover_all_tools() {
        let names: Vec<&str> = definitions().iter().map(|d| d.function.name).collect();
        assert_eq!(names, vec!["searchFiles", "openFile", "codeNavigation", "listDir"]);
        assert!(definitions().iter().all(|d| d.kind == "function"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_abort_before_execution() {
        let dir = TempDir::new().unwrap();
        let err = toolbox(&dir)
            .call(&raw("openFile", json!({"path": "a.ts"})))
            .await
            .unwrap_err();
        assert!(matches!(err, InvestigatorError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_open_file_numbers_lines() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.ts"), "const a = 1;\nexport { a };").unwrap();

        let text = toolbox(&dir)
            .call(&raw("openFile", json!({"filePath": "a.ts"})))
            .await
            .unwrap();
        assert_eq!(
            text,
            "```typescript\n// file://a.ts\n// line numbers prepend for each line starts from line number 0\n0: const a = 1;\n1: export { a };\n```"
        );
    }

    #[tokio::test]
    async fn test_open_missing_file_is_text() {
        let dir = TempDir::new().unwrap();
        let text = toolbox(&dir)
            .call(&raw("openFile", json!({"filePath": "gone.ts"})))
            .await
            .unwrap();
        assert_eq!(text, "Error: No such file or directory at 'gone.ts'");
    }

    #[tokio::test]
    async fn test_open_binary_file_is_text() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("logo.png"), [0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe, 0x0a]).unwrap();

        let text = toolbox(&dir)
            .call(&raw("openFile", json!({"filePath": "logo.png"})))
            .await
            .unwrap();
        assert!(text.starts_with("```unknown\n// file://logo.png\n"));
        assert!(text.contains("0: \u{FFFD}PNG\u{FFFD}\u{FFFD}"));
    }

    #[tokio::test]
    async fn test_list_dir_defaults_to_root_and_sorts() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/b.ts"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "# hi").unwrap();

        let tools = toolbox(&dir);
        let root = tools.call(&raw("listDir", json!({}))).await.unwrap();
        assert_eq!(root, "```\nREADME.md\nsrc\n```");

        let nested = tools
            .call(&raw("listDir", json!({"dirPath": "src"})))
            .await
            .unwrap();
        assert_eq!(nested, "```\nsrc/b.ts\n```");
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_text() {
        let dir = TempDir::new().unwrap();
        let text = toolbox(&dir)
            .call(&raw("listDir", json!({"dirPath": "nope"})))
            .await
            .unwrap();
        assert_eq!(text, "Error: No such file or directory at 'nope'");
    }

    #[tokio::test]
    async fn test_unsupported_language_is_recoverable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.md"), "# bar\n").unwrap();

        let text = toolbox(&dir)
            .call(&raw(
                "codeNavigation",
                json!({"type": "definition", "filePath": "notes.md", "line": 0, "identifier": "bar"}),
            ))
            .await
            .unwrap();
        assert_eq!(text, "Error: Language server not supported for \"markdown\"");
    }

    #[tokio::test]
    async fn test_navigation_line_out_of_range_is_fatal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.ts"), "one line").unwrap();

        let err = toolbox(&dir)
            .call(&raw(
                "codeNavigation",
                json!({"type": "definition", "filePath": "a.ts", "line": 9, "identifier": "x"}),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, InvestigatorError::LineOutOfRange { line: 9, .. }));
    }
}
