use anyhow::{Context, Result, bail};
use colored::*;
use serde_json::json;
use std::io;

use super::{Bootstrap, CommandContext, run_with_radio};
use crate::output::{OutputFormat, print_json};
use crate::utils::{confirm, print_success, print_warning};

pub async fn handle_factory_reset(ctx: &CommandContext, yes: bool) -> Result<()> {
    if !yes {
        eprintln!(
            "{message}",
            message = "Factory reset erases all settings and cannot be undone.".red().bold()
        );
        let confirmed = confirm(
            "This action is destructive. Continue? [y/N] ",
            &mut io::stdin().lock(),
            &mut io::stderr(),
        )
        .context("read confirmation")?;

        if !confirmed {
            bail!("factory-reset cancelled");
        }
    }

    print_warning("Sending factory reset command...");
    run_with_radio(ctx, Bootstrap::Open, |radio| {
        radio.factory_reset().context("factory-reset")
    })
    .await?;

    match ctx.format {
        OutputFormat::Json => print_json(&json!({ "ok": true })),
        OutputFormat::Table => {
            print_success("factory reset command sent");
            Ok(())
        }
    }
}
