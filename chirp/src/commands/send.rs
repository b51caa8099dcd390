use anyhow::{Context, Result};
use serde::Serialize;

use super::{Bootstrap, CommandContext, input_error, run_with_radio};
use crate::output::{OutputFormat, print_json};
use crate::utils::print_success;

#[derive(Debug, Serialize)]
struct SentText {
    ok: bool,
    to: u32,
    channel: u32,
    message: String,
}

pub async fn handle_send_text(
    ctx: &CommandContext,
    message: String,
    to: u32,
    channel: u32,
) -> Result<()> {
    if message.trim().is_empty() {
        return Err(input_error("--message cannot be empty"));
    }

    let text = message.clone();
    run_with_radio(ctx, Bootstrap::Connect, move |radio| {
        radio.send_text(&text, to, channel).context("send text")
    })
    .await?;

    match ctx.format {
        OutputFormat::Json => print_json(&SentText {
            ok: true,
            to,
            channel,
            message,
        }),
        OutputFormat::Table => {
            print_success(&format!("sent text to={to} channel={channel}"));
            Ok(())
        }
    }
}
