//! Chat command handler.

use std::io::{IsTerminal, Read};

use anyhow::{Context, Result};
use mmchat_core::config;

use super::{exec, open_controller, open_gateway};
use crate::modes;

/// Runs the interactive loop. Without `interactive`, piped stdin is sent as
/// a single prompt instead.
pub async fn run(config: &config::Config, interactive: bool) -> Result<()> {
    if !interactive && !std::io::stdin().is_terminal() {
        let mut prompt = String::new();
        std::io::stdin().lock().read_to_string(&mut prompt)?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            anyhow::bail!("No input provided via pipe");
        }
        return exec::run(exec::ExecRunOptions {
            prompt,
            image: None,
            new_session: false,
            config,
        })
        .await;
    }

    let gateway = open_gateway(config)?;
    let mut controller = open_controller();

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    modes::chat::run_chat(&mut controller, &gateway, stdin.lock(), &mut stdout)
        .await
        .context("interactive chat failed")
}
