//! `modelgate check` — validate the deployment before taking traffic.
//!
//! Loads the config, opens the store, builds the registry, and verifies
//! that every backend key the model table routes to has a registered
//! adapter — the same condition that would otherwise surface per-request
//! as a configuration error.

use anyhow::{Context, Result};
use colored::Colorize;

use modelgate_core::config::{get_config_path, load_config};
use modelgate_store::Store;

use crate::helpers;

/// Run the check command.
pub async fn run() -> Result<()> {
    let config = load_config(None);
    helpers::print_banner();

    // Config
    let config_path = get_config_path();
    println!(
        "  {:<12} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, defaults in effect)".dimmed().to_string()
        }
    );

    // Store
    let store = Store::connect(&config.store.path)
        .await
        .with_context(|| format!("failed to open store at {}", config.store.path))?;
    println!("  {:<12} {} {}", "Store:".bold(), config.store.path, "✓".green());

    // Registry
    let registry = helpers::build_registry(&config)?;
    println!(
        "  {:<12} {}",
        "Backends:".bold(),
        registry.backend_keys().join(", ")
    );

    // Models and their bindings
    let models = store.list_models().await?;
    println!();
    println!("  {}", "Models:".bold());
    if models.is_empty() {
        println!("    {}", "(none registered)".dimmed());
    }

    for model in &models {
        let bound = registry.contains(&model.backend);
        println!(
            "    {:<24} → {:<18} {}",
            model.name,
            model.backend,
            if bound {
                "✓".green().to_string()
            } else {
                "missing adapter".red().to_string()
            }
        );
    }
    println!();

    // Exhaustive binding validation: fail loudly, at startup, not per call
    let backend_keys = store.list_backend_keys().await?;
    registry
        .validate_bindings(backend_keys.iter().map(String::as_str))
        .map_err(|e| anyhow::anyhow!(e).context("deployment validation failed"))?;

    println!("  {} all model bindings resolve", "✓".green());
    println!();
    Ok(())
}
