use clap::{Parser, Subcommand};
use std::time::Duration;

pub const DEFAULT_PORT: &str = "/dev/cu.usbmodem101";

#[derive(Parser, Debug)]
#[command(name = "chirp")]
#[command(author, version, about = "A slim Meshtastic CLI", long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Serial port for the Meshtastic node
    #[arg(short, long, global = true, env = "CHIRP_PORT", default_value = DEFAULT_PORT)]
    pub port: String,

    /// Command timeout (e.g. 30s, 1m)
    #[arg(short = 't', long, global = true, default_value = "30s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Output in JSON format
    #[arg(short = 'j', long, global = true)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch and print radio info
    Info,

    /// Send messages
    Send {
        #[command(subcommand)]
        subcommand: SendCommands,
    },

    /// Change radio settings
    Set {
        #[command(subcommand)]
        subcommand: SetCommands,
    },

    /// Factory reset the radio
    FactoryReset {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Stream incoming packets, events and telemetry until Ctrl-C
    Listen {
        /// How often to print an idle line when nothing arrives
        #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
        idle_log: Duration,

        /// Suppress telemetry output
        #[arg(long)]
        no_telemetry: bool,

        /// Suppress event output
        #[arg(long)]
        no_events: bool,

        /// Suppress packet output
        #[arg(long)]
        no_packets: bool,
    },

    /// Print the chirp version
    Version,
}

#[derive(Subcommand, Debug)]
pub enum SendCommands {
    /// Send a text message
    Text {
        /// Message text
        #[arg(short = 'm', long)]
        message: String,

        /// Destination node number (0 for broadcast)
        #[arg(long, default_value = "0")]
        to: u32,

        /// Channel index
        #[arg(short = 'c', long, default_value = "0")]
        channel: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum SetCommands {
    /// Set the owner long name (short name is its first three bytes)
    Owner {
        #[arg(short = 'n', long)]
        name: String,
    },

    /// Set the modem preset
    Modem {
        /// One of lf|ls|vls|ms|mf|sl|sf|lm
        #[arg(short = 'm', long)]
        mode: String,
    },

    /// Set a fixed location
    Location {
        /// Latitude in 1e-7 degrees
        #[arg(long = "lat-i", allow_negative_numbers = true)]
        lat_i: i32,

        /// Longitude in 1e-7 degrees
        #[arg(long = "lon-i", allow_negative_numbers = true)]
        lon_i: i32,

        /// Altitude in meters
        #[arg(long, allow_negative_numbers = true)]
        alt: i32,
    },
}

#[derive(Debug, Clone)]
pub struct ListenOptions {
    pub idle_log: Duration,
    pub no_telemetry: bool,
    pub no_events: bool,
    pub no_packets: bool,
}
