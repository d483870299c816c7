//! Modelgate CLI — entry point.
//!
//! # Commands
//!
//! - `modelgate init` — write a default config file
//! - `modelgate check` — validate the deployment (config, store, backend
//!   bindings)
//! - `modelgate ask -k KEY -m MODEL MESSAGE` — push one request through
//!   the full dispatch pipeline

mod ask;
mod check;
mod helpers;

use anyhow::Result;
use clap::{Parser, Subcommand};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Modelgate — model request dispatcher with access and quota control
#[derive(Parser)]
#[command(name = "modelgate", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Validate the deployment: every backend key the model table routes
    /// to must have a registered adapter
    Check {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Send a single request through the dispatcher
    Ask {
        /// Caller API key
        #[arg(short, long)]
        key: String,

        /// Model display name
        #[arg(short, long)]
        model: String,

        /// The message to send
        message: String,

        /// Session correlator passed through to the backend
        #[arg(short, long)]
        session: Option<String>,

        /// Treat as a completion request instead of chat
        #[arg(long, default_value_t = false)]
        complete: bool,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(false);
            helpers::init_config()
        }
        Commands::Check { logs } => {
            init_logging(logs);
            check::run().await
        }
        Commands::Ask {
            key,
            model,
            message,
            session,
            complete,
            logs,
        } => {
            init_logging(logs);
            ask::run(&key, &model, &message, session.as_deref(), complete).await
        }
    }
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("modelgate=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_parses_flags() {
        let cli = Cli::parse_from([
            "modelgate", "ask", "-k", "mg-abc", "-m", "Atlas", "hello there", "--session", "s1",
        ]);
        match cli.command {
            Commands::Ask {
                key,
                model,
                message,
                session,
                complete,
                ..
            } => {
                assert_eq!(key, "mg-abc");
                assert_eq!(model, "Atlas");
                assert_eq!(message, "hello there");
                assert_eq!(session.as_deref(), Some("s1"));
                assert!(!complete);
            }
            _ => panic!("expected ask command"),
        }
    }
}
