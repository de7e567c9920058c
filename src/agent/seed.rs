//! Seed context for the first iteration.

use std::io::Write;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use super::progress::Transcript;
use super::prompts::{extraction_prompt, file_selection_prompt, file_submission_prompt};
use super::runner::{expect_call, first_call, stream_text};
use crate::error::Result;
use crate::inference::ChatMessage;
use crate::session::SessionContext;
use crate::tools::{
    definition, ListDirParams, OpenFileParams, SearchBy, SearchFilesParams,
    SubmitRelevantFilesParams, Toolbox,
};

/// Files opened at once while gathering seed context.
const MAX_IN_FLIGHT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SeedMode {
    /// No seed context
    None,
    /// Root listing plus the readme, when there is one
    #[default]
    Readme,
    /// Let the model pick files and extract what matters from them
    RelevantFiles,
}

pub async fn build_seed<W: Write + Send>(
    ctx: &SessionContext,
    transcript: &mut Transcript<W>,
    query: &str,
    mode: SeedMode,
) -> Result<String> {
    debug!(?mode, "building seed context");
    match mode {
        SeedMode::None => Ok(String::new()),
        SeedMode::Readme => readme_seed(&ctx.toolbox).await,
        SeedMode::RelevantFiles => relevant_files_seed(ctx, transcript, query).await,
    }
}

pub async fn readme_seed(toolbox: &Toolbox) -> Result<String> {
    let listing = toolbox.list_dir(&ListDirParams::default()).await?;
    let mut seed = format!(
        "## The project root folder contains following files:\n{}\n",
        listing
    );
    if listing.contains("\nREADME.md\n") {
        let readme = toolbox
            .open_file(&OpenFileParams {
                file_path: "README.md".to_string(),
            })
            .await?;
        seed.push_str(&format!("\n## Project readme\n{}\n", readme));
    }
    Ok(seed)
}

async fn relevant_files_seed<W: Write + Send>(
    ctx: &SessionContext,
    transcript: &mut Transcript<W>,
    query: &str,
) -> Result<String> {
    let profiles = &ctx.profiles;
    transcript.heading("INITIAL CONTEXT")?;

    let listing = ctx
        .toolbox
        .search_files(&SearchFilesParams {
            search_by: SearchBy::Filename,
            pattern: String::new(),
        })
        .await?;
    let selection = stream_text(
        ctx,
        transcript,
        &profiles.summarizing,
        &[ChatMessage::user(file_selection_prompt(&listing, query))],
    )
    .await?;

    let response = ctx
        .inference
        .invoke_tools(
            &profiles.tool_calling,
            &[ChatMessage::user(file_submission_prompt(&selection))],
            &[definition::<SubmitRelevantFilesParams>()],
        )
        .await?;
    let submitted: SubmitRelevantFilesParams =
        expect_call(first_call(response, "file selection")?)?;
    debug!(files = submitted.file_paths.len(), "relevant files selected");

    let contents = open_files(&ctx.toolbox, &submitted.file_paths).await?;
    stream_text(
        ctx,
        transcript,
        &profiles.summarizing,
        &[ChatMessage::user(extraction_prompt(
            &contents.join("\n\n"),
            query,
        ))],
    )
    .await
}

/// Open every path, a few at a time; results keep the order of `paths`.
pub async fn open_files(toolbox: &Toolbox, paths: &[String]) -> Result<Vec<String>> {
    stream::iter(paths)
        .map(|path| async move {
            toolbox
                .open_file(&OpenFileParams {
                    file_path: path.clone(),
                })
                .await
        })
        .buffered(MAX_IN_FLIGHT)
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::ConnectionPool;
    use crate::search::SearchAdapter;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn toolbox(dir: &TempDir) -> Toolbox {
        Toolbox::with_parts(
            dir.path(),
            SearchAdapter::new(dir.path(), "rg"),
            Arc::new(ConnectionPool::new(dir.path(), Vec::new())),
        )
    }

    #[tokio::test]
    async fn test_readme_seed_includes_numbered_readme() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README.md"), "# Demo\nhello").unwrap();
        std::fs::write(dir.path().join("a.ts"), "").unwrap();

        let seed = readme_seed(&toolbox(&dir)).await.unwrap();
        assert!(seed.starts_with(
            "## The project root folder contains following files:\n```\nREADME.md\na.ts\n```\n"
        ));
        assert!(seed.contains("## Project readme\n```markdown\n// file://README.md\n"));
        assert!(seed.contains("0: # Demo\n1: hello"));
    }

    #[tokio::test]
    async fn test_readme_seed_without_readme_is_listing_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.ts"), "").unwrap();
        std::fs::write(dir.path().join("b.ts"), "").unwrap();

        let seed = readme_seed(&toolbox(&dir)).await.unwrap();
        assert!(!seed.contains("readme"));
    }

    #[tokio::test]
    async fn test_open_files_keeps_request_order() {
        let dir = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for i in 0..20 {
            let name = format!("f{:02}.py", i);
            std::fs::write(dir.path().join(&name), format!("x = {}", i)).unwrap();
            paths.push(name);
        }
        paths.reverse();

        let contents = open_files(&toolbox(&dir), &paths).await.unwrap();
        assert_eq!(contents.len(), 20);
        for (path, content) in paths.iter().zip(&contents) {
            assert!(content.contains(&format!("// file://{}", path)));
        }
    }
}
