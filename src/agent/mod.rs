//! The investigation agent: seed context, per-iteration context rendering,
//! phase prompts and the loop that drives them.

pub mod context;
pub mod progress;
pub mod prompts;
pub mod runner;
pub mod seed;

pub use context::render_context;
pub use progress::{separator, Transcript};
pub use runner::{Investigation, Outcome, RunOptions};
pub use seed::{build_seed, SeedMode};
