// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use fsagent_bootstrap::{start_session, AgentSession, StartError};
use fsagent_config::Config;
use fsagent_model::ModelProvider;
use fsagent_repl::{run_once, InteractiveSession, SessionOutcome, StdinLines};

/// Exit status after Ctrl-C, as a shell would report SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Handle completions before touching the environment or config
    if let Some(Commands::Completions { shell }) = &cli.command {
        cli::print_completions(*shell);
        return Ok(());
    }

    if let Some(path) = fsagent_config::load_env_file(cli.env_file.as_deref())? {
        debug!(path = %path.display(), "loaded environment file");
    }

    let config = load_config(&cli)?;

    match &cli.command {
        Some(Commands::ShowConfig) => {
            let text = toml::to_string(&config).context("serializing configuration")?;
            print!("{text}");
            return Ok(());
        }
        Some(Commands::Tools) => {
            let session = start_or_exit(Arc::new(config)).await?;
            let code = list_tools(&session).await;
            std::process::exit(code);
        }
        Some(Commands::Completions { .. }) | None => {}
    }

    let session = start_or_exit(Arc::new(config)).await?;

    // Exit explicitly: a pending stdin read would otherwise keep the runtime
    // from shutting down after an interrupt.
    let code = match cli.prompt.as_deref() {
        Some(prompt) => one_shot(&session, prompt).await,
        None => interactive(session).await,
    };
    std::process::exit(code);
}

/// Load layered config and apply CLI / environment overrides.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = fsagent_config::load(cli.config.as_deref())?;
    // Re-read the env var: it may have come from the .env file loaded after
    // argument parsing.
    let dir = cli.dir.clone().or_else(|| std::env::var("FSAGENT_TARGET_DIR").ok());
    if let Some(dir) = dir.filter(|d| !d.is_empty()) {
        config.workspace.target_folder = dir;
    }
    if let Some(model) = &cli.model {
        config.model.name = model.clone();
    }
    Ok(config)
}

/// Start the session, or report why not and exit.
///
/// Ctrl-C during startup (e.g. while `npx` downloads the server) ends the
/// process with the usual interrupt message; the half-started server is
/// dropped, and so killed, first.
async fn start_or_exit(config: Arc<Config>) -> anyhow::Result<AgentSession> {
    let model: Arc<dyn ModelProvider> = Arc::from(fsagent_model::from_config(&config.model)?);
    let started = tokio::select! {
        biased;
        _ = ctrl_c() => None,
        res = start_session(config, model) => Some(res),
    };
    let Some(started) = started else {
        println!("\nSession terminated by user.");
        std::process::exit(EXIT_INTERRUPTED);
    };
    match started {
        Ok(session) => Ok(session),
        Err(StartError::TargetDir(e)) => {
            eprintln!("Error setting up target directory: {e}");
            eprintln!("Please ensure you have write permissions for the directory.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("An error occurred: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn interactive(session: AgentSession) -> i32 {
    let mut repl = InteractiveSession::new(session);
    let mut input = StdinLines::new();
    match repl.run(&mut input, ctrl_c()).await {
        Ok(SessionOutcome::Interrupted) => {
            println!("\nSession terminated by user.");
            EXIT_INTERRUPTED
        }
        Ok(SessionOutcome::Exited | SessionOutcome::EndOfInput) => 0,
        Err(e) => {
            eprintln!("An error occurred: {e:#}");
            1
        }
    }
}

async fn one_shot(session: &AgentSession, prompt: &str) -> i32 {
    let mut out = std::io::stdout();
    match run_once(session, prompt, &mut out, ctrl_c()).await {
        Ok(SessionOutcome::Interrupted) => {
            eprintln!("Session terminated by user.");
            EXIT_INTERRUPTED
        }
        Ok(_) => 0,
        Err(e) => {
            eprintln!("An error occurred: {e:#}");
            1
        }
    }
}

async fn list_tools(session: &AgentSession) -> i32 {
    let tools = session.runner.agent().tools();
    println!("Target directory: {}", session.target_dir.display());
    println!("{} tools:", tools.len());
    for schema in tools.schemas() {
        let summary = schema.description.lines().next().unwrap_or_default();
        println!("  {:<28} {summary}", schema.name);
    }
    match session.close().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("An error occurred: {e:#}");
            1
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
