use anyhow::{Context, Result};
use chirp_core::{DecodedMessage, InfoSummary};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

use super::{Bootstrap, CommandContext, run_with_radio};
use crate::output::{OutputFormat, key_value_table, print_json};

#[derive(Debug, Serialize)]
struct InfoReport {
    summary: InfoSummary,
    responses: Vec<DecodedMessage>,
}

pub async fn handle_info(ctx: &CommandContext) -> Result<()> {
    let spinner = match ctx.format {
        OutputFormat::Table => Some(fetch_spinner()),
        OutputFormat::Json => None,
    };

    let fetched = run_with_radio(ctx, Bootstrap::Connect, |radio| {
        radio.get_radio_info().context("get radio info")
    })
    .await;

    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }

    let responses = fetched?;
    let report = InfoReport {
        summary: InfoSummary::from_messages(&responses),
        responses,
    };

    match ctx.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            println!("radio info");
            println!("{table}", table = key_value_table(&report.summary.rows()));
            Ok(())
        }
    }
}

fn fetch_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Fetching radio info...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
