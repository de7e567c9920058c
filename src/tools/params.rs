//! Argument records for every structured call the model can make.
//!
//! The derived JSON schema of each record is both what the model is shown and
//! what incoming arguments are validated against.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::lsp::NavigationKind;

/// A parameter record bound to the tool name and description the model sees.
pub trait ToolParams: JsonSchema + DeserializeOwned + Serialize {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;
}

// === searchFiles ===
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchBy {
    Filename,
    Content,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilesParams {
    /// The search criteria, choose to search by `filename` or by `content`
    pub search_by: SearchBy,
    /// The matching pattern for the search.
    pub pattern: String,
}

impl ToolParams for SearchFilesParams {
    const NAME: &'static str = "searchFiles";
    const DESCRIPTION: &'static str = "Non-semantic case insensitive files search.";
}

// === openFile ===
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenFileParams {
    /// The path to the file to be opened.
    pub file_path: String,
}

impl ToolParams for OpenFileParams {
    const NAME: &'static str = "openFile";
    const DESCRIPTION: &'static str = "Opens a file and returns its content.";
}

// === codeNavigation ===
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeNavigationParams {
    /// The type of navigation: "definition", "references", or "implementations".
    #[serde(rename = "type")]
    pub kind: NavigationKind,
    /// The path of the file containing the symbol, relative to the project root.
    pub file_path: String,
    /// The line number where the symbol is located.
    pub line: u32,
    /// The referred programming languages identifier in the specific line to be applied.
    pub identifier: String,
    /// The index of the identifier if there are multiple identifiers with the same name on the same line.
    #[serde(default)]
    pub nth_id: Option<u32>,
}

impl ToolParams for CodeNavigationParams {
    const NAME: &'static str = "codeNavigation";
    const DESCRIPTION: &'static str =
        "Navigate to definitions, find references, or find implementations of a symbol in the code.";
}

// === listDir ===
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListDirParams {
    /// The path of the directory to list, default to project root if not provided.
    #[serde(default)]
    pub dir_path: Option<String>,
}

impl ToolParams for ListDirParams {
    const NAME: &'static str = "listDir";
    const DESCRIPTION: &'static str =
        "List the files and directories in a given directory. The path is relative to the project's root.";
}

// === report ===
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Resolved,
    Review,
    Continue,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Verdict::Resolved => "resolved",
            Verdict::Review => "review",
            Verdict::Continue => "continue",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportParams {
    pub reason: Verdict,
}

impl ToolParams for ReportParams {
    const NAME: &'static str = "report";
    const DESCRIPTION: &'static str = "Report your current status, choose one of the reasons below:
- resolved: User's query has been resolved and you are ready to report your conclusion.
- review: You have collected decent amount of information and the rest of your doubts are unrelated to current code base. You need user to review your finding to decide the investigation should be continue.
- continue: User's query has not been resolved and further investigation is needed for collecting more information.";
}

// === submitRelevantFiles ===
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRelevantFilesParams {
    /// File paths relative to the project root, most relevant first.
    pub file_paths: Vec<String>,
}

impl ToolParams for SubmitRelevantFilesParams {
    const NAME: &'static str = "submitRelevantFiles";
    const DESCRIPTION: &'static str = "Submit the list of relevant file paths.";
}
