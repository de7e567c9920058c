use thiserror::Error;

#[derive(Error, Debug)]
pub enum InvestigatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{report}")]
    Validation { tool: String, report: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool not invoked during {stage}: {content}")]
    ToolNotInvoked { stage: String, content: String },

    #[error("No line {line} in `{path}`")]
    LineOutOfRange { path: String, line: u32 },

    #[error("Multiple matches ({count}) for `{identifier}` in line {line} of `{path}`")]
    AmbiguousIdentifier {
        path: String,
        line: u32,
        identifier: String,
        count: usize,
    },

    #[error("No match #{index} for `{identifier}` in line {line} of `{path}` ({count} found)")]
    OccurrenceNotFound {
        path: String,
        line: u32,
        identifier: String,
        index: u32,
        count: usize,
    },

    #[error("Language server not supported for \"{0}\"")]
    UnsupportedLanguage(String),

    #[error("Search command failed with code {code:?}: {stderr}")]
    SearchFailed { code: Option<i32>, stderr: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Language server error: {0}")]
    Lsp(String),
}

impl InvestigatorError {
    /// Recoverable errors become tool-result text instead of ending the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, InvestigatorError::UnsupportedLanguage(_))
    }
}

pub type Result<T> = std::result::Result<T, InvestigatorError>;
