//! Symbol navigation: turns `(file, line, identifier, occurrence)` into a
//! protocol position, asks the language server, and renders the answer as
//! prompt-ready text.
//!
//! Identifier lookup is a whole-word text match on the requested line, not a
//! symbol-table resolution.

use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::documents::{number_lines, Document, DocumentCache};
use super::pool::ConnectionPool;
use super::{parse_uri, uri_to_path, LspConnection};
use crate::error::{InvestigatorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NavigationKind {
    Definition,
    References,
    Implementations,
}

#[derive(Debug, Clone)]
pub struct NavigationRequest<'a> {
    /// Path relative to the workspace root
    pub file_path: &'a str,
    /// Zero-based line
    pub line: u32,
    pub identifier: &'a str,
    /// Which match to use when the identifier appears more than once
    pub occurrence: Option<u32>,
    pub kind: NavigationKind,
}

pub struct NavigationResolver<'a> {
    root: &'a Path,
    documents: &'a DocumentCache,
    pool: &'a ConnectionPool,
}

impl<'a> NavigationResolver<'a> {
    pub fn new(root: &'a Path, documents: &'a DocumentCache, pool: &'a ConnectionPool) -> Self {
        Self {
            root,
            documents,
            pool,
        }
    }

    pub async fn navigate(&self, request: &NavigationRequest<'_>) -> Result<String> {
        let path = self.root.join(request.file_path);
        let document = self.documents.open(&path).await?;
        let line_text = document
            .line(request.line)
            .ok_or_else(|| InvestigatorError::LineOutOfRange {
                path: document.uri.clone(),
                line: request.line,
            })?;

        let character = resolve_character(
            line_text,
            request.identifier,
            request.occurrence,
            &document.uri,
            request.line,
        )?
        .unwrap_or_else(|| {
            warn!(
                identifier = request.identifier,
                line = request.line,
                path = %document.uri,
                "identifier not found on line, navigating from column 0"
            );
            0
        });

        let connection = self
            .pool
            .get(&document.language_id)
            .await?
            .ok_or_else(|| InvestigatorError::UnsupportedLanguage(document.language_id.clone()))?;

        let position = lsp_types::TextDocumentPositionParams {
            text_document: lsp_types::TextDocumentIdentifier {
                uri: parse_uri(&document.uri)?,
            },
            position: lsp_types::Position {
                line: request.line,
                character,
            },
        };
        debug!(kind = ?request.kind, uri = %document.uri, line = request.line, character, "navigating");

        match request.kind {
            NavigationKind::Definition => self.definition(&connection, position).await,
            NavigationKind::References => self.references(&connection, position).await,
            NavigationKind::Implementations => self.implementations(&connection, position).await,
        }
    }

    async fn definition(
        &self,
        connection: &Arc<LspConnection>,
        position: lsp_types::TextDocumentPositionParams,
    ) -> Result<String> {
        let response = connection
            .request::<lsp_types::request::GotoDefinition>(lsp_types::GotoDefinitionParams {
                text_document_position_params: position,
                work_done_progress_params: Default::default(),
                partial_result_params: Default::default(),
            })
            .await?;

        let Some(location) = normalize_locations(response).into_iter().next() else {
            return Ok("No definition found.".to_string());
        };
        let target = self.open_location(&location).await?;
        Ok(render_definition(
            &target,
            &self.relative(&target.path),
            location.range.start.line,
            self.documents.registry().is_source(&target.language_id),
        ))
    }

    async fn references(
        &self,
        connection: &Arc<LspConnection>,
        position: lsp_types::TextDocumentPositionParams,
    ) -> Result<String> {
        let locations = connection
            .request::<lsp_types::request::References>(lsp_types::ReferenceParams {
                text_document_position: position,
                work_done_progress_params: Default::default(),
                partial_result_params: Default::default(),
                context: lsp_types::ReferenceContext {
                    include_declaration: true,
                },
            })
            .await?
            .unwrap_or_default();

        if locations.is_empty() {
            return Ok("No references found.".to_string());
        }
        Ok(format!(
            "The references with prepend line number are:\n```\n{}\n```",
            self.format_locations(&locations).await?
        ))
    }

    async fn implementations(
        &self,
        connection: &Arc<LspConnection>,
        position: lsp_types::TextDocumentPositionParams,
    ) -> Result<String> {
        let response = connection
            .request::<lsp_types::request::GotoImplementation>(lsp_types::GotoDefinitionParams {
                text_document_position_params: position,
                work_done_progress_params: Default::default(),
                partial_result_params: Default::default(),
            })
            .await?;

        let locations = normalize_locations(response);
        if locations.is_empty() {
            return Ok("No implementations found.".to_string());
        }
        Ok(format!(
            "The implementation locations with prepend line number are:\n```\n{}\n```",
            self.format_locations(&locations).await?
        ))
    }

    /// One heading per file, then `<line>: <text>` per location, in the
    /// order the server returned them.
    async fn format_locations(&self, locations: &[lsp_types::Location]) -> Result<String> {
        let width = locations
            .iter()
            .map(|loc| loc.range.end.line)
            .max()
            .unwrap_or(0)
            .to_string()
            .len()
            + 1;

        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for location in locations {
            let uri = location.uri.as_str().to_string();
            let document = self.open_location(location).await?;
            let line = location.range.start.line;
            let text = document
                .line(line)
                .ok_or_else(|| InvestigatorError::LineOutOfRange {
                    path: uri.clone(),
                    line,
                })?;
            let entry = format!("{:>width$}: {}", line, text, width = width);

            match groups.iter_mut().find(|(key, _)| *key == uri) {
                Some((_, lines)) => lines.push(entry),
                None => groups.push((uri, vec![self.relative(&document.path), entry])),
            }
        }

        Ok(groups
            .into_iter()
            .flat_map(|(_, lines)| lines)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn open_location(&self, location: &lsp_types::Location) -> Result<Arc<Document>> {
        let uri = location.uri.as_str();
        let path = uri_to_path(uri)
            .ok_or_else(|| InvestigatorError::Lsp(format!("unsupported location uri '{}'", uri)))?;
        self.documents.open(&path).await
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// UTF-16 column of the chosen whole-word match of `identifier` in `line`.
///
/// `Ok(None)` when the identifier does not occur on the line. A single match
/// is used as is; with several, `occurrence` picks one and is mandatory.
pub fn resolve_character(
    line: &str,
    identifier: &str,
    occurrence: Option<u32>,
    path: &str,
    line_number: u32,
) -> Result<Option<u32>> {
    let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(identifier)))
        .map_err(|e| InvestigatorError::Lsp(format!("bad identifier '{}': {}", identifier, e)))?;
    let starts: Vec<usize> = pattern.find_iter(line).map(|m| m.start()).collect();

    let byte_offset = match starts.len() {
        0 => return Ok(None),
        1 => starts[0],
        count => {
            let index = occurrence.ok_or_else(|| InvestigatorError::AmbiguousIdentifier {
                path: path.to_string(),
                line: line_number,
                identifier: identifier.to_string(),
                count,
            })?;
            *starts
                .get(index as usize)
                .ok_or_else(|| InvestigatorError::OccurrenceNotFound {
                    path: path.to_string(),
                    line: line_number,
                    identifier: identifier.to_string(),
                    index,
                    count,
                })?
        }
    };

    Ok(Some(line[..byte_offset].encode_utf16().count() as u32))
}

/// Flatten every response shape into plain locations; links keep their
/// target range.
pub fn normalize_locations(
    response: Option<lsp_types::GotoDefinitionResponse>,
) -> Vec<lsp_types::Location> {
    match response {
        None => Vec::new(),
        Some(lsp_types::GotoDefinitionResponse::Scalar(location)) => vec![location],
        Some(lsp_types::GotoDefinitionResponse::Array(locations)) => locations,
        Some(lsp_types::GotoDefinitionResponse::Link(links)) => links
            .into_iter()
            .map(|link| lsp_types::Location {
                uri: link.target_uri,
                range: link.target_range,
            })
            .collect(),
    }
}

pub fn render_definition(
    document: &Document,
    relative_path: &str,
    start_line: u32,
    annotate: bool,
) -> String {
    if !annotate {
        return format!(
            "The content of `{}` is as below:\n```\n{}\n```",
            relative_path, document.text
        );
    }
    format!(
        "```{}\n// file://{}\n// line numbers prepend for each line starts from line number 0\n// definition starts from line {}\n{}\n```",
        document.language_id,
        relative_path,
        start_line,
        number_lines(&document.text)
    )
}
