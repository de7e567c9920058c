mod commands;

pub use commands::{investigate, Cli};
