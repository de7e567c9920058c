//! The tools the agent can call, their declarations and their validation.

pub mod dispatcher;
pub mod params;
pub mod schema;

pub use dispatcher::{definitions, ToolCall, Toolbox};
pub use params::{
    CodeNavigationParams, ListDirParams, OpenFileParams, ReportParams, SearchBy,
    SearchFilesParams, SubmitRelevantFilesParams, ToolParams, Verdict,
};
pub use schema::{definition, validate};
