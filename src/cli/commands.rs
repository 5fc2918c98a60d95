//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Cumulus - declarative CloudFormation stack convergence.
#[derive(Parser, Debug)]
#[command(name = "cumulus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or update a stack from a settings file.
    Upsert(UpsertArgs),

    /// Delete the given stack.
    Delete {
        /// Stack name.
        #[arg(short, long)]
        stack: String,

        /// Region where the stack lives.
        #[arg(short, long)]
        region: Option<String>,

        /// AWS credentials profile.
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// List the stacks in the region.
    List {
        /// Region to list.
        #[arg(short, long)]
        region: Option<String>,

        /// AWS credentials profile.
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Produce a drift report for the given stack.
    Drift {
        /// Stack name.
        #[arg(short, long)]
        stack: String,

        /// Region where the stack lives.
        #[arg(short, long)]
        region: Option<String>,

        /// AWS credentials profile.
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// List the resources of the given stack.
    Resources {
        /// Stack name.
        #[arg(short, long)]
        stack: String,

        /// Region where the stack lives.
        #[arg(short, long)]
        region: Option<String>,

        /// AWS credentials profile.
        #[arg(short, long)]
        profile: Option<String>,
    },
}

/// Arguments for the upsert command.
#[derive(Args, Debug)]
pub struct UpsertArgs {
    /// Settings file describing the convergence run.
    #[arg(short, long, env = "CUMULUS_CONFIG")]
    pub config: PathBuf,

    /// Stack name, overriding the settings file.
    #[arg(short, long)]
    pub stack: Option<String>,

    /// Code version recorded with the archived artifacts.
    #[arg(long)]
    pub version: Option<String>,

    /// Compute and print a change preview instead of converging.
    #[arg(short, long)]
    pub dry_run: bool,

    /// Submit the operation but do not poll it to completion.
    #[arg(long)]
    pub no_poll: bool,

    /// Change into this directory before doing anything else.
    #[arg(short, long)]
    pub work_directory: Option<PathBuf>,
}
