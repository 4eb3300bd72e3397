//! linkwatch: supervise a serial link from the terminal
//!
//! ```bash
//! # What is plugged in?
//! linkwatch list
//!
//! # Can the port be opened at all?
//! linkwatch test /dev/ttyUSB0 --baud 115200
//!
//! # Keep a modem link alive, probing every 5s
//! linkwatch watch /dev/ttyUSB0 --baud 115200 --heartbeat-ms 5000 --payload 'AT\r'
//!
//! # Reconnect to the device the desktop app used last
//! linkwatch watch --restore ~/.config/serial-app/state.json --heartbeat-ms 30000
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::todo
)]

mod args;

use args::{Args, Command, LineArgs, WatchArgs};
use clap::Parser;
use futures::StreamExt;
use link_protocol::{
    ConfigError, Event, EventKind, LinkConfig, LinkError, LinkState, OpenError,
};
use link_supervisor::{test_connection, LinkHandle, SupervisionConfig};
use std::process::ExitCode;
use std::sync::Arc;
use transport_native::{list_ports, SerialTransport};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Open(#[from] OpenError),

    #[error("Cannot read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Invalid link config in {path}: {reason}")]
    BadConfig { path: String, reason: String },

    #[error("No restorable device in {0}. Pass PORT instead.")]
    NothingToRestore(String),

    #[error("No port given. Pass PORT, --config or --restore.")]
    NoPort,
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Link(e.into())
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_module_path(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let result = match args.command {
        Command::List => list(),
        Command::Test(line) => test(line).await,
        Command::Watch(watch) => watch_link(watch).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn list() -> Result<(), CliError> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }

    for port in ports {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => println!(
                "{}  {:04x}:{:04x}  {} {}",
                port.path,
                vid,
                pid,
                port.manufacturer.as_deref().unwrap_or(""),
                port.product.as_deref().unwrap_or("")
            ),
            _ => println!("{}", port.path),
        }
    }
    Ok(())
}

fn line_config(line: &LineArgs) -> Result<LinkConfig, CliError> {
    let port = line.port.clone().ok_or(CliError::NoPort)?;
    let mut config = LinkConfig::new_8n1(port, line.baud);
    config.data_bits = line.data_bits;
    config.stop_bits = line.stop_bits;
    config.parity = line.parity.into();
    config.validate()?;
    Ok(config)
}

async fn test(line: LineArgs) -> Result<(), CliError> {
    let config = line_config(&line)?;
    test_connection(&SerialTransport::new(), &config).await?;
    println!(
        "{} opened and closed ({})",
        config.endpoint_id,
        config.line_params().describe()
    );
    Ok(())
}

fn read_file(path: &std::path::Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Build the session config from, in order: a config file, an app-state
/// snapshot, or PORT and framing flags. Heartbeat flags apply on top.
fn watch_config(watch: &WatchArgs) -> Result<LinkConfig, CliError> {
    let mut config = if let Some(path) = &watch.config {
        let text = read_file(path)?;
        serde_json::from_str::<LinkConfig>(&text).map_err(|e| CliError::BadConfig {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?
    } else if let Some(path) = &watch.restore {
        let text = read_file(path)?;
        link_protocol::restore_last_link(&text, None)
            .ok_or_else(|| CliError::NothingToRestore(path.display().to_string()))?
    } else {
        line_config(&watch.line)?
    };

    // Raw bytes: `\xHH` escapes need not be valid UTF-8
    if let Some(interval_ms) = watch.heartbeat_ms {
        config = config.with_heartbeat(interval_ms, unescape(&watch.payload));
    }
    config.max_reconnect_attempts = watch.max_attempts;
    config.validate()?;
    Ok(config)
}

fn print_event(event: &Event, echo: bool) {
    match &event.kind {
        EventKind::StateChanged { .. } | EventKind::DataSent { .. } => {}
        EventKind::DataReceived { bytes } if echo => {
            print!("{}", String::from_utf8_lossy(bytes));
        }
        EventKind::DataReceived { .. } => {}
        kind => println!("[{:>6}] {}", event.seq, kind.describe()),
    }
}

async fn watch_link(watch: WatchArgs) -> Result<(), CliError> {
    let config = watch_config(&watch)?;
    let mut supervision = SupervisionConfig::default();
    if let Some(ms) = watch.connect_timeout_ms {
        supervision.connect_timeout_ms = ms;
    }

    log::info!(
        "Watching {} ({}), heartbeat {}",
        config.endpoint_id,
        config.line_params().describe(),
        if config.heartbeat_enabled {
            format!("every {} ms", config.heartbeat_interval_ms)
        } else {
            "off".to_string()
        }
    );

    let handle = LinkHandle::spawn(Arc::new(SerialTransport::new()), supervision);
    let mut events = handle.subscribe();
    handle.connect_with(config).await?;

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                print_event(&event, watch.echo);

                if matches!(event.kind, EventKind::ReconnectExhausted { .. }) && !watch.stay {
                    break;
                }
                // Without heartbeat a failed open ends the session
                if matches!(event.kind, EventKind::StateChanged { to: LinkState::Disconnected, .. }) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// Expand `\r`, `\n`, `\t`, `\\` and `\xHH`; anything else is kept as is
fn unescape(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('r') => out.push(b'\r'),
            Some('n') => out.push(b'\n'),
            Some('t') => out.push(b'\t'),
            Some('\\') => out.push(b'\\'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                match u8::from_str_radix(&hex, 16) {
                    Ok(byte) if hex.len() == 2 => out.push(byte),
                    _ => {
                        out.extend_from_slice(b"\\x");
                        out.extend_from_slice(hex.as_bytes());
                    }
                }
            }
            Some(other) => {
                out.push(b'\\');
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => out.push(b'\\'),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("AT\\r"), b"AT\r");
        assert_eq!(unescape("\\x02PING\\x03"), b"\x02PING\x03");
        assert_eq!(unescape("a\\\\b\\q"), b"a\\b\\q");
        assert_eq!(unescape("bad\\xZ"), b"bad\\xZ");
        assert_eq!(unescape("trailing\\"), b"trailing\\");
    }

    #[test]
    fn test_watch_config_from_flags() {
        let args = Args::parse_from([
            "linkwatch",
            "watch",
            "/dev/ttyACM0",
            "--baud",
            "115200",
            "--parity",
            "even",
            "--heartbeat-ms",
            "2000",
            "--max-attempts",
            "4",
        ]);
        let Command::Watch(watch) = args.command else {
            panic!("expected watch");
        };

        let config = watch_config(&watch).unwrap();
        assert_eq!(config.endpoint_id, "/dev/ttyACM0");
        assert_eq!(config.line_params().describe(), "115200 8E1");
        assert!(config.heartbeat_enabled);
        assert_eq!(config.heartbeat_payload, b"AT\r");
        assert_eq!(config.max_reconnect_attempts, 4);
    }

    fn snapshot_file(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("linkwatch-{}-{}.json", std::process::id(), name));
        std::fs::write(
            &path,
            r#"{"state":{"selectedDevice":{"path":"COM4"},"connectionOptions":{"baudRate":57600}}}"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_restore_keeps_max_attempts_without_heartbeat() {
        let path = snapshot_file("attempts");
        let args = Args::parse_from([
            "linkwatch",
            "watch",
            "--restore",
            path.to_str().unwrap(),
            "--max-attempts",
            "2",
        ]);
        let Command::Watch(watch) = args.command else {
            panic!("expected watch");
        };

        let config = watch_config(&watch).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.endpoint_id, "COM4");
        assert_eq!(config.baud_rate, 57600);
        assert!(!config.heartbeat_enabled);
        assert_eq!(config.max_reconnect_attempts, 2);
    }

    #[test]
    fn test_restore_keeps_binary_payload() {
        let path = snapshot_file("payload");
        let args = Args::parse_from([
            "linkwatch",
            "watch",
            "--restore",
            path.to_str().unwrap(),
            "--heartbeat-ms",
            "1000",
            "--payload",
            "\\x7e\\xff\\x00",
        ]);
        let Command::Watch(watch) = args.command else {
            panic!("expected watch");
        };

        let config = watch_config(&watch).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(config.heartbeat_enabled);
        assert_eq!(config.heartbeat_interval_ms, 1000);
        assert_eq!(config.heartbeat_payload, vec![0x7e, 0xff, 0x00]);
        assert_eq!(config.max_reconnect_attempts, 10);
    }

    #[test]
    fn test_watch_without_port_is_rejected() {
        let args = Args::parse_from(["linkwatch", "watch"]);
        let Command::Watch(watch) = args.command else {
            panic!("expected watch");
        };
        assert!(matches!(watch_config(&watch), Err(CliError::NoPort)));
    }
}
