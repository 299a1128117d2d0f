//! Command-line definitions.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Environmental telemetry agent for Enviro+ boards.
///
/// Samples the weather, gas, light and particulate sensors, publishes each
/// snapshot to an MQTT broker and announces the channels to Home Assistant.
#[derive(Debug, Parser)]
#[command(name = "enviro", version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: ./config.toml, then the platform config dir)
    #[arg(long, short = 'c', env = "ENVIRO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// File holding the board serial number
    #[arg(long, default_value = "/proc/cpuinfo", global = true)]
    pub cpuinfo: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the sampling agent (default)
    Run,

    /// Inspect the configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path that would be loaded
    Path,

    /// Validate the config and print the effective settings as TOML
    Show,
}
