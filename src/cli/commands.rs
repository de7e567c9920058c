use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use code_investigator::{
    InvestigatorConfig, Investigation, OllamaClient, Outcome, RunOptions, SeedMode, SessionContext,
};

#[derive(Parser)]
#[command(name = "code-investigator")]
#[command(about = "LLM code investigation agent equipped with language servers and ripgrep")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Ask where a function is defined
    code-investigator -w ./my-project -q "where is function bar defined"

    # Skip the readme seed and allow more iterations
    code-investigator -w . -q "how are sessions persisted" --init-context none -m 20

    # Use a remote inference host and custom model profiles
    code-investigator -w . -q "..." --host http://gpu-box:11434 --config investigator.toml
"#)]
pub struct Cli {
    /// Path to the workspace folder
    #[arg(short, long)]
    pub workspace: PathBuf,

    /// Query to investigate
    #[arg(short, long)]
    pub query: String,

    /// Maximum number of iterations
    #[arg(short, long, default_value_t = 10)]
    pub max_iterations: usize,

    /// Context given to the first iteration
    #[arg(long, value_enum, default_value_t = SeedMode::Readme)]
    pub init_context: SeedMode,

    /// TOML file overriding the built-in configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Inference service URL (overrides the configuration)
    #[arg(long)]
    pub host: Option<String>,
}

pub async fn investigate(cli: Cli) -> anyhow::Result<()> {
    let workspace = cli
        .workspace
        .canonicalize()
        .with_context(|| format!("cannot open workspace {}", cli.workspace.display()))?;

    let mut config = InvestigatorConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.host = host;
    }

    let inference = Arc::new(OllamaClient::new(config.host.clone(), config.request_timeout())?);
    let ctx = SessionContext::new(&workspace, &config, inference);
    let options = RunOptions {
        max_iterations: cli.max_iterations,
        seed_mode: cli.init_context,
    };

    let result = Investigation::new(&ctx, std::io::stdout())
        .run(&cli.query, &options)
        .await;
    ctx.shutdown().await;

    let (session, outcome) = result?;
    if outcome == Outcome::Exhausted {
        info!(
            iterations = session.iterations().len() - 1,
            "stopped without a verdict"
        );
    }
    Ok(())
}
