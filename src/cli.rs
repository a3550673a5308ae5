// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fsagent",
    about = "A conversational agent that manages files through an MCP filesystem server",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Answer this prompt and exit instead of starting the interactive loop
    #[arg(value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// Directory the agent may access (created if missing)
    #[arg(long, short = 'd', env = "FSAGENT_TARGET_DIR", value_name = "PATH")]
    pub dir: Option<String>,

    /// Path to config file (merged on top of auto-discovered files)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Model to use, e.g. "gemini-2.0-flash"
    #[arg(long, short = 'M', env = "FSAGENT_MODEL")]
    pub model: Option<String>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print the effective configuration and exit
    ShowConfig,
    /// Start the filesystem server, list the tools it exposes, and exit
    Tools,
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "fsagent", &mut std::io::stdout());
}
