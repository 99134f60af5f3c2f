//! Command-line interface for review-loop.
//!
//! Provides the `dispatch`, `merge` and `complete` task commands.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands, CompleteArgs};
