//! ForgeGate CLI, the main entry point.
//!
//! Commands:
//! - `serve`      Start the protected HTTP gateway
//! - `authorize`  Check one privileged action against the SSOT
//! - `laws`       List the loaded laws and which decision cites each
//! - `doctor`     Diagnose config, SSOT, and audit trail
//! - `scan`       Run the WAF signatures over a string

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "forgegate",
    about = "ForgeGate: action authorization and request guarding",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $FORGEGATE_CONFIG, then ./forgegate.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway behind the security gate
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Authorize a privileged action and print the verdict
    Authorize {
        /// Action kind: read, write, delete, generate, migrate, export, license_check
        kind: String,

        /// Target path, where the action takes one
        target: Option<String>,
    },

    /// List laws and the decision classes that cite them
    Laws,

    /// Diagnose configuration and policy health
    Doctor,

    /// Scan a string with the WAF signature library
    Scan {
        /// Text to scan, e.g. a URL or request body
        text: String,
    },
}

/// Exit status for a denied action or a matched signature.
const EXIT_BLOCKED: i32 = 2;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays machine-readable.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let config = cli.config.as_deref();
    let passed = match cli.command {
        Commands::Serve { port } => {
            commands::serve::run(config, port).await?;
            true
        }
        Commands::Authorize { kind, target } => commands::authorize::run(config, kind, target)?,
        Commands::Laws => {
            commands::laws::run(config)?;
            true
        }
        Commands::Doctor => commands::doctor::run(config)?,
        Commands::Scan { text } => commands::scan::run(&text)?,
    };

    if !passed {
        std::process::exit(EXIT_BLOCKED);
    }
    Ok(())
}
