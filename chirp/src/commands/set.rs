use anyhow::{Context, Result};
use chirp_core::command::ModemMode;
use serde_json::json;

use super::{Bootstrap, CommandContext, input_error, run_with_radio};
use crate::cli::SetCommands;
use crate::output::{OutputFormat, print_json};
use crate::utils::print_success;

pub async fn handle_set(ctx: &CommandContext, subcommand: SetCommands) -> Result<()> {
    match subcommand {
        SetCommands::Owner { name } => {
            if name.trim().is_empty() {
                return Err(input_error("--name cannot be empty"));
            }

            let owner = name.clone();
            run_with_radio(ctx, Bootstrap::Open, move |radio| {
                radio.set_owner(&owner).context("set owner")
            })
            .await?;

            report(
                ctx.format,
                json!({ "ok": true, "name": name }),
                format!("owner set to {name:?}"),
            )
        }

        SetCommands::Modem { mode } => {
            if mode.trim().is_empty() {
                return Err(input_error("--mode cannot be empty"));
            }
            let mode = ModemMode::parse(&mode)?;

            run_with_radio(ctx, Bootstrap::Open, move |radio| {
                radio.set_modem_mode(mode.code()).context("set modem")
            })
            .await?;

            report(
                ctx.format,
                json!({ "ok": true, "mode": mode.code() }),
                format!("modem mode set to {code:?}", code = mode.code()),
            )
        }

        SetCommands::Location { lat_i, lon_i, alt } => {
            run_with_radio(ctx, Bootstrap::Open, move |radio| {
                radio.set_location(lat_i, lon_i, alt).context("set location")
            })
            .await?;

            report(
                ctx.format,
                json!({ "ok": true, "lat_i": lat_i, "lon_i": lon_i, "alt": alt }),
                format!("location set lat_i={lat_i} lon_i={lon_i} alt={alt}"),
            )
        }
    }
}

fn report(format: OutputFormat, json: serde_json::Value, summary: String) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json),
        OutputFormat::Table => {
            print_success(&summary);
            Ok(())
        }
    }
}
