pub mod agent;
pub mod config;
pub mod error;
pub mod inference;
pub mod languages;
pub mod lsp;
pub mod search;
pub mod session;
pub mod tools;

use once_cell::sync::Lazy;

pub use agent::{Investigation, Outcome, RunOptions, SeedMode};
pub use config::{InvestigatorConfig, LanguageServerDescriptor, ModelOptions, ModelProfile};
pub use error::{InvestigatorError, Result};
pub use inference::{ChatMessage, InferenceService, OllamaClient, RawToolCall, ToolDefinition, ToolResponse};
pub use languages::LanguageRegistry;
pub use lsp::{ConnectionPool, DocumentCache, LspConnection, NavigationKind};
pub use search::{SearchAdapter, SearchHit};
pub use session::{Iteration, ModelProfiles, Session, SessionContext, SessionStatus};
pub use tools::{ToolCall, Toolbox, Verdict};

/// Global language registry instance (lazily initialized)
pub static REGISTRY: Lazy<LanguageRegistry> = Lazy::new(LanguageRegistry::new);
