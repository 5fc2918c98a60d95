//! CLI module for the Cumulus convergence tool.
//!
//! This module provides the command-line interface for creating,
//! updating, listing, deleting and inspecting stacks.

mod commands;
mod output;

pub use commands::{Cli, Commands, UpsertArgs};
pub use output::OutputFormatter;
