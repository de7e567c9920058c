//! Text and filename search through a ripgrep subprocess.
//!
//! Exit status follows ripgrep: 0 means matches, 1 means none, anything else
//! is a failure carrying stderr.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{InvestigatorError, Result};

/// One file in a search result, with its matching lines for content searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Relative to the workspace root
    pub path: String,
    pub lines: Vec<LineMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    /// One-based, as ripgrep prints it
    pub number: u64,
    pub text: String,
}

pub struct SearchAdapter {
    root: PathBuf,
    program: String,
}

struct CommandOutput {
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl SearchAdapter {
    pub fn new(root: impl AsRef<Path>, program: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            program: program.into(),
        }
    }

    /// Every non-ignored file whose path matches `pattern` (case-insensitive regex).
    pub async fn search_by_filename(&self, pattern: &str) -> Result<Vec<SearchHit>> {
        let root = self.root.to_string_lossy().to_string();
        let listing = self.run(&[root.as_str(), "--files"], None).await?;
        let Some(listing) = interpret(listing)? else {
            return Ok(Vec::new());
        };

        let filtered = self
            .run(&["-i", "-e", pattern], Some(listing.as_bytes()))
            .await?;
        let Some(filtered) = interpret(filtered)? else {
            return Ok(Vec::new());
        };

        Ok(filtered
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| SearchHit {
                path: self.relative(line),
                lines: Vec::new(),
            })
            .collect())
    }

    /// Every line matching `pattern` (case-insensitive regex), grouped by file.
    pub async fn search_by_content(&self, pattern: &str) -> Result<Vec<SearchHit>> {
        let root = self.root.to_string_lossy().to_string();
        let output = self
            .run(
                &[
                    root.as_str(),
                    "--heading",
                    "--line-number",
                    "--color",
                    "never",
                    "-i",
                    "-e",
                    pattern,
                ],
                None,
            )
            .await?;
        let Some(stdout) = interpret(output)? else {
            return Ok(Vec::new());
        };
        Ok(self.parse_heading_output(&stdout))
    }

    fn parse_heading_output(&self, stdout: &str) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = Vec::new();
        for line in stdout.lines() {
            if line.is_empty() {
                continue;
            }
            match parse_line_match(line) {
                Some(matched) if !hits.is_empty() => {
                    if let Some(hit) = hits.last_mut() {
                        hit.lines.push(matched);
                    }
                }
                _ => hits.push(SearchHit {
                    path: self.relative(line),
                    lines: Vec::new(),
                }),
            }
        }
        hits
    }

    fn relative(&self, path: &str) -> String {
        let path = Path::new(path);
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    async fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<CommandOutput> {
        debug!(program = %self.program, ?args, "running search");
        let mut child = Command::new(&self.program)
            .args(args)
            .current_dir(&self.root)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| InvestigatorError::SearchFailed {
                code: None,
                stderr: format!("failed to run {}: {}", self.program, e),
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // feed on a task so a full stdout pipe cannot deadlock the write
            let input = input.to_vec();
            tokio::spawn(async move {
                let _ = pipe.write_all(&input).await;
                let _ = pipe.shutdown().await;
            });
        }

        let output = child.wait_with_output().await?;
        let code = output.status.code();
        debug!(program = %self.program, ?code, "search finished");
        Ok(CommandOutput {
            code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// `Some(stdout)` on success, `None` for "no matches", error otherwise.
fn interpret(output: CommandOutput) -> Result<Option<String>> {
    match output.code {
        Some(0) => Ok(Some(output.stdout)),
        Some(1) => Ok(None),
        code => Err(InvestigatorError::SearchFailed {
            code,
            stderr: output.stderr.trim().to_string(),
        }),
    }
}

fn parse_line_match(line: &str) -> Option<LineMatch> {
    let (number, text) = line.split_once(':')?;
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(LineMatch {
        number: number.parse().ok()?,
        text: text.to_string(),
    })
}

/// Render hits the way ripgrep's `--heading` output reads.
pub fn render_hits(hits: &[SearchHit]) -> String {
    let mut out = Vec::new();
    for hit in hits {
        out.push(hit.path.clone());
        for line in &hit.lines {
            out.push(format!("{}:{}", line.number, line.text));
        }
    }
    out.join("\n")
}
