//! `modelgate ask` — one request through the full dispatch pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use modelgate_core::config::load_config;
use modelgate_core::ChatRequest;
use modelgate_dispatch::{CallContext, Dispatcher, StoreResolver};
use modelgate_store::Store;

use crate::helpers;

/// Run the ask command.
pub async fn run(
    api_key: &str,
    model: &str,
    message: &str,
    session: Option<&str>,
    complete: bool,
) -> Result<()> {
    let config = load_config(None);

    let store = Arc::new(
        Store::connect(&config.store.path)
            .await
            .with_context(|| format!("failed to open store at {}", config.store.path))?,
    );

    let key = store
        .find_key_by_api_key(api_key)
        .await?
        .context("unknown API key")?;

    let registry = Arc::new(helpers::build_registry(&config)?);
    let resolver = Arc::new(StoreResolver::new(store.clone()));
    let dispatcher = Dispatcher::new(registry, resolver, Some(store));

    info!(model = %model, message = %helpers::preview(message), "dispatching");

    let mut ctx = CallContext::new(ChatRequest::new(model, message), key);
    if let Some(session) = session {
        ctx = ctx.with_session_id(session);
    }

    let reply = if complete {
        dispatcher.complete(&ctx).await
    } else {
        dispatcher.chat(&ctx).await
    }?;

    helpers::print_reply(&reply);
    Ok(())
}
