//! Deep Probe - terminal client for a research-assistant service
//!
//! Manages chat sessions against the remote service and lets the user steer
//! which backend tools run for each message through `@mentions`.

mod api;
mod config;
mod controller;
mod format;
mod mention;
mod repl;
mod runtime;
mod tools;

use api::{HttpApi, LoggingApi};
use config::ClientConfig;
use controller::ChatController;
use runtime::ChatRuntime;
use std::sync::Arc;
use tools::ToolRegistry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout belongs to the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deep_probe=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(
        api_url = %config.api_url,
        model = %config.model_name,
        stream = config.stream_replies,
        "Starting Deep Probe client"
    );

    // Fails on a broken tool catalog
    let registry = Arc::new(ToolRegistry::builtin()?);
    tracing::info!(
        tools = registry.len(),
        groups = registry.groups().len(),
        "Tool registry loaded"
    );

    let http = HttpApi::new(&config.api_url, config.request_timeout)?;
    tracing::debug!(base_url = %http.base_url(), "HTTP client ready");
    let api = LoggingApi::new(http);
    let controller = ChatController::new(api, Arc::clone(&registry), config.controller_settings());
    let handle = ChatRuntime::spawn(controller);

    println!("Initializing Deep Probe...");
    handle.initialize().await?;
    repl::run(handle, &registry).await?;

    Ok(())
}
