// Copyright 2026 Oddsfeed Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use oddsfeed::cli;

#[derive(Parser)]
#[command(
    name = "oddsfeed",
    about = "Oddsfeed — live betting-odds scraper with a cached HTTP API",
    version,
    after_help = "Run 'oddsfeed <command> --help' for details on each command."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scraper daemon and HTTP API
    Start {
        /// Listen port for the HTTP API (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status {
        /// Port the daemon's API listens on
        #[arg(long, default_value = "8000")]
        port: u16,
    },
    /// Run one scrape cycle and print the snapshot as JSON
    Fetch {
        /// Target URL (overrides TARGET_URL)
        #[arg(long)]
        url: Option<String>,
        /// Automation engine to use (chromium, static)
        #[arg(long)]
        engine: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start { port } => cli::start::run(port).await,
        Commands::Stop => cli::stop::run().await,
        Commands::Status { port } => cli::status::run(port).await,
        Commands::Fetch { url, engine } => {
            cli::fetch::run(url.as_deref(), engine.as_deref()).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "oddsfeed", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
