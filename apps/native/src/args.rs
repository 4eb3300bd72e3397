//! CLI argument parsing for linkwatch.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use link_protocol::Parity;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "linkwatch")]
#[command(about = "Supervise a serial link and print its event stream", long_about = None)]
pub struct Args {
    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports present on this machine
    List,

    /// Open a port once and close it again
    Test(LineArgs),

    /// Connect, keep the link alive and print every event
    Watch(WatchArgs),
}

/// Endpoint and framing
#[derive(ClapArgs, Debug, Clone)]
pub struct LineArgs {
    /// Serial port path, e.g. /dev/ttyUSB0 or COM3
    #[arg(value_name = "PORT")]
    pub port: Option<String>,

    #[arg(short, long, default_value_t = 9600)]
    pub baud: u32,

    #[arg(long, default_value_t = 8)]
    pub data_bits: u8,

    #[arg(long, default_value_t = 1)]
    pub stop_bits: u8,

    #[arg(long, value_enum, default_value_t = ParityArg::None)]
    pub parity: ParityArg,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub line: LineArgs,

    /// Link config as JSON (camelCase `LinkConfig` fields); replaces PORT and framing
    #[arg(long, value_name = "FILE", conflicts_with = "restore")]
    pub config: Option<PathBuf>,

    /// Reconnect to the last device recorded in an app-state snapshot
    #[arg(long, value_name = "FILE")]
    pub restore: Option<PathBuf>,

    /// Probe interval in milliseconds; enables the heartbeat
    #[arg(long, value_name = "MS")]
    pub heartbeat_ms: Option<u64>,

    /// Probe payload. Accepts \r, \n, \t, \\ and \xHH escapes.
    #[arg(long, default_value = "AT\\r")]
    pub payload: String,

    /// Reconnect attempts before giving up
    #[arg(long, default_value_t = 10)]
    pub max_attempts: u32,

    /// Timeout for one open, in milliseconds
    #[arg(long, value_name = "MS")]
    pub connect_timeout_ms: Option<u64>,

    /// Print received bytes as text
    #[arg(long)]
    pub echo: bool,

    /// Keep running after the retry budget is spent
    #[arg(long)]
    pub stay: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ParityArg {
    None,
    Even,
    Odd,
}

impl From<ParityArg> for Parity {
    fn from(arg: ParityArg) -> Self {
        match arg {
            ParityArg::None => Parity::None,
            ParityArg::Even => Parity::Even,
            ParityArg::Odd => Parity::Odd,
        }
    }
}
