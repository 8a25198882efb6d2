//! Exec command handler.

use anyhow::{Context, Result};
use mmchat_core::config;
use mmchat_core::images::ImageAttachment;

use super::{open_controller, open_gateway};
use crate::modes::render;

pub struct ExecRunOptions<'a> {
    pub prompt: &'a str,
    pub image: Option<&'a str>,
    pub new_session: bool,
    pub config: &'a config::Config,
}

/// Sends one prompt to the latest session (or a new one) and prints the reply.
pub async fn run(options: ExecRunOptions<'_>) -> Result<()> {
    let gateway = open_gateway(options.config)?;

    let image = options
        .image
        .map(|path| {
            ImageAttachment::from_path(path).with_context(|| format!("attach image {path}"))
        })
        .transpose()?;

    let mut controller = open_controller();
    if options.new_session {
        controller.create_session();
    }

    let reply = controller
        .send(&gateway, options.prompt, image.as_ref())
        .await
        .context("send prompt")?;

    let mut stdout = std::io::stdout().lock();
    render::write_parts(&mut stdout, reply.role, &reply.parts)?;
    Ok(())
}
