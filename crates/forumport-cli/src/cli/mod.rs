//! Command-line interface for forumport.

mod commands;
mod progress;

pub use commands::{is_verbose, run};
