//! CLI command handlers.

pub mod chat;
pub mod config;
pub mod exec;
pub mod sessions;

use anyhow::{Context, Result};
use mmchat_core::config::Config;
use mmchat_core::controller::SessionController;
use mmchat_core::gateway::{GatewaySettings, GeminiClient, GeminiConfig, ModelGateway};
use mmchat_core::store::FileStore;

/// Builds the Gemini-backed gateway. Fails when no API key is configured.
fn open_gateway(config: &Config) -> Result<ModelGateway<GeminiClient>> {
    let gemini = GeminiConfig::from_config(config).context("configure Gemini client")?;
    tracing::debug!(model = %gemini.model, base_url = %gemini.base_url, "gateway ready");
    let client = GeminiClient::new(gemini).context("configure Gemini client")?;
    Ok(ModelGateway::new(client, GatewaySettings::from_config(config)))
}

/// Opens the session controller over `$MMCHAT_HOME`.
fn open_controller() -> SessionController<FileStore> {
    SessionController::open(FileStore::in_home())
}
