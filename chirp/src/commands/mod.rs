mod admin;
mod info;
mod listen;
mod send;
mod set;

use anyhow::{Context, Result, anyhow};
use chirp_core::{RadioError, RadioSession, ValidationError};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::cli::{Cli, Commands, ListenOptions, SendCommands};
use crate::output::{OutputFormat, print_json};

/// Rejected command-line input. Exits with status 2.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct InputError(pub String);

pub fn input_error(message: impl Into<String>) -> anyhow::Error {
    InputError(message.into()).into()
}

/// Process exit status for a failed command.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let user_input = err.chain().any(|cause| {
        cause.is::<InputError>()
            || cause.is::<ValidationError>()
            || cause
                .downcast_ref::<RadioError>()
                .is_some_and(RadioError::is_validation)
    });

    if user_input { 2 } else { 1 }
}

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub port: String,
    pub timeout: Duration,
    pub format: OutputFormat,
}

impl CommandContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let port = cli.port.trim();
        if port.is_empty() {
            return Err(input_error("--port cannot be empty"));
        }
        if cli.timeout.is_zero() {
            return Err(input_error("--timeout must be greater than 0"));
        }

        Ok(Self {
            port: port.to_string(),
            timeout: cli.timeout,
            format: OutputFormat::from_json_flag(cli.json),
        })
    }
}

/// How the session is brought up before the command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    /// Open the port only.
    Connect,
    /// Open the port and learn the radio's node number.
    Open,
}

pub async fn handle_command(cli: Cli) -> Result<()> {
    // No radio involved, so the port and timeout are not checked.
    if let Commands::Version = cli.command {
        return handle_version(OutputFormat::from_json_flag(cli.json));
    }

    let ctx = CommandContext::from_cli(&cli)?;

    match cli.command {
        Commands::Info => info::handle_info(&ctx).await,
        Commands::Send { subcommand } => match subcommand {
            SendCommands::Text {
                message,
                to,
                channel,
            } => send::handle_send_text(&ctx, message, to, channel).await,
        },
        Commands::Set { subcommand } => set::handle_set(&ctx, subcommand).await,
        Commands::FactoryReset { yes } => admin::handle_factory_reset(&ctx, yes).await,
        Commands::Listen {
            idle_log,
            no_telemetry,
            no_events,
            no_packets,
        } => {
            let opts = ListenOptions {
                idle_log,
                no_telemetry,
                no_events,
                no_packets,
            };
            listen::handle_listen(&ctx, opts).await
        }
        Commands::Version => handle_version(ctx.format),
    }
}

fn handle_version(format: OutputFormat) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    match format {
        OutputFormat::Json => print_json(&json!({ "version": version })),
        OutputFormat::Table => {
            println!("{version}");
            Ok(())
        }
    }
}

/// Open the radio on a blocking worker, run `job` against it and close it,
/// all bounded by the command timeout.
///
/// On timeout the worker is abandoned. It keeps the session until the
/// blocking call returns and closes it on drop.
pub async fn run_with_radio<T, F>(ctx: &CommandContext, bootstrap: Bootstrap, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut RadioSession) -> Result<T> + Send + 'static,
{
    let port = ctx.port.clone();
    let worker = tokio::task::spawn_blocking(move || -> Result<T> {
        let mut radio = open_radio(&port, bootstrap)?;
        let value = job(&mut radio)?;
        radio.close().context("close radio")?;
        Ok(value)
    });

    match tokio::time::timeout(ctx.timeout, worker).await {
        Ok(joined) => joined.context("radio worker panicked")?,
        Err(_) => {
            debug!("Abandoning radio worker on {port}", port = ctx.port);
            Err(timeout_error(ctx.timeout))
        }
    }
}

pub fn open_radio(port: &str, bootstrap: Bootstrap) -> Result<RadioSession> {
    let opened = match bootstrap {
        Bootstrap::Connect => RadioSession::connect(port),
        Bootstrap::Open => RadioSession::open(port),
    };
    opened.map_err(|e| open_error(port, e))
}

pub fn timeout_error(timeout: Duration) -> anyhow::Error {
    anyhow!(
        "command timed out after {timeout}",
        timeout = humantime::format_duration(timeout)
    )
}

/// Wrap a failure to open the radio, with a hint for the usual culprits.
pub fn open_error(port: &str, err: RadioError) -> anyhow::Error {
    let hint = open_error_hint(&err.to_string());
    anyhow::Error::new(err).context(format!("failed to open radio on {port:?}{hint}"))
}

fn open_error_hint(message: &str) -> &'static str {
    let message = message.to_lowercase();
    if message.contains("resource busy") || message.contains("in use") {
        " (port may already be in use by another process)"
    } else if message.contains("permission denied") || message.contains("operation not permitted") {
        " (check serial port permissions)"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io;

    #[test]
    fn test_exit_codes() -> Result<()> {
        assert_eq!(exit_code(&input_error("--message cannot be empty")), 2);

        let validation = RadioError::from(ValidationError::NameTooShort { len: 1 });
        assert_eq!(exit_code(&anyhow::Error::new(validation).context("set owner")), 2);

        assert_eq!(exit_code(&timeout_error(Duration::from_secs(2))), 1);
        assert_eq!(exit_code(&anyhow::Error::new(RadioError::NoResponse { attempts: 5 })), 1);
        Ok(())
    }

    #[test]
    fn test_open_error_hints() -> Result<()> {
        let busy = RadioError::Transport(io::Error::other("Device or resource busy"));
        assert_eq!(
            format!("{:#}", open_error("/dev/ttyUSB0", busy)),
            "failed to open radio on \"/dev/ttyUSB0\" (port may already be in use by another process): Device or resource busy"
        );

        let denied = RadioError::Transport(io::Error::other("Permission denied"));
        assert!(
            open_error("/dev/ttyUSB0", denied)
                .to_string()
                .ends_with("(check serial port permissions)")
        );

        let missing = RadioError::Transport(io::Error::other("No such file or directory"));
        assert_eq!(
            open_error("/dev/ttyUSB0", missing).to_string(),
            "failed to open radio on \"/dev/ttyUSB0\""
        );
        Ok(())
    }

    #[test]
    fn test_timeout_message() -> Result<()> {
        assert_eq!(
            timeout_error(Duration::from_secs(30)).to_string(),
            "command timed out after 30s"
        );
        Ok(())
    }

    #[test]
    fn test_context_validation() -> Result<()> {
        let cli = Cli::try_parse_from(["chirp", "--port", "  ", "info"])?;
        let err = CommandContext::from_cli(&cli).err().context("expected error")?;
        assert_eq!(err.to_string(), "--port cannot be empty");
        assert_eq!(exit_code(&err), 2);

        let cli = Cli::try_parse_from(["chirp", "--timeout", "0s", "info"])?;
        let err = CommandContext::from_cli(&cli).err().context("expected error")?;
        assert_eq!(err.to_string(), "--timeout must be greater than 0");

        let cli = Cli::try_parse_from(["chirp", "--port", "/dev/ttyACM0", "--json", "info"])?;
        let ctx = CommandContext::from_cli(&cli)?;
        assert_eq!(ctx.port, "/dev/ttyACM0");
        assert_eq!(ctx.timeout, Duration::from_secs(30));
        assert_eq!(ctx.format, OutputFormat::Json);
        Ok(())
    }

    #[tokio::test]
    async fn test_version_skips_radio_settings() -> Result<()> {
        let cli = Cli::try_parse_from(["chirp", "--port", "", "--timeout", "0s", "version"])?;
        handle_command(cli).await?;
        Ok(())
    }

    #[test]
    fn test_parse_commands() -> Result<()> {
        let cli = Cli::try_parse_from([
            "chirp", "set", "location", "--lat-i", "374000000", "--lon-i", "-1220000000", "--alt", "15",
        ])?;
        assert!(matches!(
            cli.command,
            Commands::Set {
                subcommand: crate::cli::SetCommands::Location {
                    lat_i: 374_000_000,
                    lon_i: -1_220_000_000,
                    alt: 15,
                }
            }
        ));

        let cli = Cli::try_parse_from(["chirp", "send", "text", "--message", "hi", "--to", "42"])?;
        assert!(matches!(
            cli.command,
            Commands::Send {
                subcommand: SendCommands::Text { to: 42, channel: 0, .. }
            }
        ));

        let cli = Cli::try_parse_from(["chirp", "listen", "--idle-log", "5s", "--no-events"])?;
        let Commands::Listen {
            idle_log,
            no_events,
            no_packets,
            ..
        } = cli.command
        else {
            anyhow::bail!("expected listen");
        };
        assert_eq!(idle_log, Duration::from_secs(5));
        assert!(no_events);
        assert!(!no_packets);

        assert!(Cli::try_parse_from(["chirp", "send", "text", "--to", "-1", "--message", "x"]).is_err());
        assert!(Cli::try_parse_from(["chirp", "set", "location", "--lat-i", "3000000000", "--lon-i", "0", "--alt", "0"]).is_err());
        Ok(())
    }
}
