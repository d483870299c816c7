//! Shared CLI helpers — banner, reply printing, registry wiring.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;

use modelgate_backends::{
    BackendRegistry, ChatCompletionsBackend, ModelBackend, PainterBackend, ReaderBackend,
};
use modelgate_core::config::{get_config_path, save_config, Config};
use modelgate_core::{BackendReply, utils::truncate_string};

/// Print the version banner.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "Modelgate".cyan().bold(), version.dimmed());
    println!();
}

/// Print a backend reply to stdout.
pub fn print_reply(reply: &BackendReply) {
    println!();
    if reply.content.is_empty() {
        println!("{}", "(empty reply)".dimmed());
    } else {
        println!("{}", reply.content);
    }
    if let Some(usage) = &reply.usage {
        println!();
        println!(
            "{}",
            format!(
                "tokens: {} in / {} out",
                usage.prompt_tokens, usage.completion_tokens
            )
            .dimmed()
        );
    }
    println!();
}

/// One-line preview of a message, for logs and status output.
pub fn preview(text: &str) -> String {
    truncate_string(text.replace('\n', " ").trim(), 60)
}

/// Build the backend registry this deployment ships with.
///
/// Every supported provider key is bound exactly once here; a model row
/// routing anywhere else is a deployment error that `check` surfaces.
pub fn build_registry(config: &Config) -> Result<BackendRegistry> {
    let timeout = Duration::from_secs(config.http.timeout_secs);

    let registry = BackendRegistry::builder()
        .register(
            "chat-completions",
            Arc::new(ChatCompletionsBackend::new(timeout)) as Arc<dyn ModelBackend>,
        )?
        .register(
            "painter",
            Arc::new(PainterBackend::new(timeout)) as Arc<dyn ModelBackend>,
        )?
        .register(
            "reader",
            Arc::new(ReaderBackend::new(timeout)) as Arc<dyn ModelBackend>,
        )?
        .build();

    Ok(registry)
}

/// `modelgate init` — write a default config file if none exists.
pub fn init_config() -> Result<()> {
    print_banner();

    let path = get_config_path();
    if path.exists() {
        println!("  Config already exists at {}", path.display());
        return Ok(());
    }

    save_config(&Config::default(), Some(&path))
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    println!("  {} wrote {}", "✓".green(), path.display());
    println!();
    Ok(())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
