//! Session state and the explicitly owned resources a session runs with.

use std::path::Path;
use std::sync::Arc;

use crate::config::{InvestigatorConfig, ModelProfile};
use crate::inference::{InferenceService, RawToolCall};
use crate::tools::{Toolbox, Verdict};

/// What one think/act/note cycle produced. Never modified after it is
/// appended to a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Iteration {
    pub notes: String,
    pub thinking: String,
    /// `None` only for the initial, empty iteration
    pub tool_request: Option<RawToolCall>,
    pub tool_result: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Continuing,
    /// Ended with a `resolved` or `review` verdict
    Concluded(Verdict),
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct Session {
    query: String,
    iterations: Vec<Iteration>,
    status: SessionStatus,
}

impl Session {
    /// Starts with the empty initial iteration in place.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            iterations: vec![Iteration::default()],
            status: SessionStatus::Continuing,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn iterations(&self) -> &[Iteration] {
        &self.iterations
    }

    pub fn latest(&self) -> &Iteration {
        // never empty: `new` seeds the initial iteration
        &self.iterations[self.iterations.len() - 1]
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Append an iteration produced by a tool call.
    pub(crate) fn push(&mut self, iteration: Iteration) {
        debug_assert!(iteration.tool_request.is_some());
        self.iterations.push(iteration);
    }

    pub(crate) fn finish(&mut self, status: SessionStatus) {
        self.status = status;
    }
}

/// Model profiles used for each phase.
#[derive(Debug, Clone)]
pub struct ModelProfiles {
    pub thinking: ModelProfile,
    pub tool_calling: ModelProfile,
    pub summarizing: ModelProfile,
}

impl From<&InvestigatorConfig> for ModelProfiles {
    fn from(config: &InvestigatorConfig) -> Self {
        Self {
            thinking: config.thinking.clone(),
            tool_calling: config.tool_calling.clone(),
            summarizing: config.summarizing.clone(),
        }
    }
}

/// Everything a session talks to, passed explicitly to every phase.
pub struct SessionContext {
    pub inference: Arc<dyn InferenceService>,
    pub toolbox: Toolbox,
    pub profiles: ModelProfiles,
}

impl SessionContext {
    pub fn new(
        root: impl AsRef<Path>,
        config: &InvestigatorConfig,
        inference: Arc<dyn InferenceService>,
    ) -> Self {
        Self {
            inference,
            toolbox: Toolbox::new(root, config),
            profiles: ModelProfiles::from(config),
        }
    }

    pub fn with_toolbox(
        toolbox: Toolbox,
        profiles: ModelProfiles,
        inference: Arc<dyn InferenceService>,
    ) -> Self {
        Self {
            inference,
            toolbox,
            profiles,
        }
    }

    /// Close language server connections. Call once the session is over.
    pub async fn shutdown(self) {
        self.toolbox.shutdown().await;
    }
}
