use async_trait::async_trait;
use link_protocol::{LineParams, OpenError, Parity, WriteError};
use link_runtime::{link_debug, link_warn, Transport, TransportEvents, TransportLink};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Bytes requested per blocking read
const READ_CHUNK: usize = 1024;

/// Blocking read timeout; bounds how long `close` waits for the reader
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// `Transport` over OS serial ports
#[derive(Debug, Clone)]
pub struct SerialTransport {
    read_timeout: Duration,
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialTransport {
    pub fn new() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

fn data_bits(bits: u8) -> Result<serialport::DataBits, OpenError> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        other => Err(OpenError::Other(format!("unsupported data bits {}", other))),
    }
}

fn stop_bits(bits: u8) -> Result<serialport::StopBits, OpenError> {
    match bits {
        1 => Ok(serialport::StopBits::One),
        2 => Ok(serialport::StopBits::Two),
        other => Err(OpenError::Other(format!("unsupported stop bits {}", other))),
    }
}

fn parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

/// Translate a `serialport` failure into the open error taxonomy
fn open_error(endpoint: &str, e: serialport::Error) -> OpenError {
    let detail = format!("{}: {}", endpoint, e.description);
    match e.kind {
        serialport::ErrorKind::NoDevice => OpenError::NotFound(detail),
        serialport::ErrorKind::Io(io::ErrorKind::NotFound) => OpenError::NotFound(detail),
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
            OpenError::PermissionDenied(detail)
        }
        _ if e.description.to_lowercase().contains("busy") => OpenError::Busy(detail),
        _ => OpenError::Other(detail),
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(
        &self,
        endpoint: &str,
        params: &LineParams,
        events: TransportEvents,
    ) -> Result<Box<dyn TransportLink>, OpenError> {
        let builder = serialport::new(endpoint, params.baud_rate)
            .data_bits(data_bits(params.data_bits)?)
            .stop_bits(stop_bits(params.stop_bits)?)
            .parity(parity(params.parity))
            .flow_control(serialport::FlowControl::None)
            .timeout(self.read_timeout);

        // Opening may block on driver handshakes
        let port = tokio::task::spawn_blocking(move || builder.open())
            .await
            .map_err(|e| OpenError::Other(format!("open task failed: {}", e)))?
            .map_err(|e| open_error(endpoint, e))?;

        let link = SerialLink::start(port, endpoint, events)?;
        link_debug!("Opened {} ({})", endpoint, params.describe());
        Ok(Box::new(link))
    }
}

/// Blocking reader for one link. Exits when the link is closed, the
/// supervisor is gone, or the port fails.
fn read_loop(
    mut port: Box<dyn SerialPort>,
    events: TransportEvents,
    stop: Arc<AtomicBool>,
    endpoint: String,
) {
    let mut buf = vec![0u8; READ_CHUNK];

    while !stop.load(Ordering::Acquire) && !events.is_closed() {
        match port.read(&mut buf) {
            Ok(0) => {
                // Readable with nothing to read: the device went away
                if !stop.load(Ordering::Acquire) {
                    events.closed();
                }
                break;
            }
            Ok(n) => {
                if let Some(chunk) = buf.get(..n) {
                    events.data(chunk.to_vec());
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {}
            Err(e) => {
                if !stop.load(Ordering::Acquire) {
                    link_warn!("Read from {} failed: {}", endpoint, e);
                    events.error(format!("read failed: {}", e));
                }
                break;
            }
        }
    }

    link_debug!(
        "Reader for {} stopped (generation {})",
        endpoint,
        events.generation()
    );
}

/// An open port plus the thread reading from its clone.
///
/// Both handles hold the OS-level exclusive lock, so the port is only free
/// for the next open once the reader has exited and the write handle is
/// dropped. `close` waits for both.
struct SerialLink {
    port: Option<Box<dyn SerialPort>>,
    reader: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    endpoint: String,
}

impl SerialLink {
    fn start(
        port: Box<dyn SerialPort>,
        endpoint: &str,
        events: TransportEvents,
    ) -> Result<Self, OpenError> {
        let reader_port = port.try_clone().map_err(|e| open_error(endpoint, e))?;
        let stop = Arc::new(AtomicBool::new(false));

        let reader_stop = stop.clone();
        let reader_endpoint = endpoint.to_string();
        let reader = std::thread::Builder::new()
            .name(format!("serial-reader {}", endpoint))
            .spawn(move || read_loop(reader_port, events, reader_stop, reader_endpoint))
            .map_err(|e| OpenError::Other(format!("{}: cannot start reader: {}", endpoint, e)))?;

        Ok(Self {
            port: Some(port),
            reader: Some(reader),
            stop,
            endpoint: endpoint.to_string(),
        })
    }
}

impl TransportLink for SerialLink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        if self.stop.load(Ordering::Acquire) {
            return Err(WriteError::NotConnected);
        }
        let port = self.port.as_mut().ok_or(WriteError::NotConnected)?;
        port.write_all(bytes)
            .and_then(|()| port.flush())
            .map_err(|e| WriteError::Io(format!("{}: {}", self.endpoint, e)))
    }

    /// Blocks for at most one read timeout while the reader notices
    fn close(&mut self) {
        if !self.stop.swap(true, Ordering::AcqRel) {
            link_debug!("Closing {}", self.endpoint);
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                link_warn!("Reader for {} panicked", self.endpoint);
            }
        }
        self.port = None;
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_maps_to_serialport() {
        assert_eq!(data_bits(7).unwrap(), serialport::DataBits::Seven);
        assert_eq!(stop_bits(2).unwrap(), serialport::StopBits::Two);
        assert_eq!(parity(Parity::Even), serialport::Parity::Even);
        assert!(matches!(data_bits(9), Err(OpenError::Other(_))));
        assert!(matches!(stop_bits(3), Err(OpenError::Other(_))));
    }

    #[test]
    fn test_open_error_classification() {
        let missing = serialport::Error::new(serialport::ErrorKind::NoDevice, "No such device");
        assert!(matches!(
            open_error("/dev/ttyUSB0", missing),
            OpenError::NotFound(ref d) if d.starts_with("/dev/ttyUSB0")
        ));

        let denied = serialport::Error::new(
            serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied),
            "Permission denied",
        );
        assert!(matches!(
            open_error("COM3", denied),
            OpenError::PermissionDenied(_)
        ));

        let busy = serialport::Error::new(serialport::ErrorKind::Unknown, "Device or resource busy");
        assert!(matches!(open_error("COM3", busy), OpenError::Busy(_)));

        let other = serialport::Error::new(serialport::ErrorKind::InvalidInput, "bad baud");
        assert!(matches!(open_error("COM3", other), OpenError::Other(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_close_releases_reader_before_returning() {
        let (tx, mut rx) = link_runtime::supervisor_channel();
        let (mut device, mut host) = serialport::TTYPort::pair().unwrap();
        host.set_timeout(Duration::from_millis(200)).unwrap();

        let mut link = SerialLink::start(Box::new(host), "pty", TransportEvents::new(tx, 1)).unwrap();
        device.write_all(b"hello").unwrap();
        std::thread::sleep(Duration::from_millis(100));
        link.close();

        // The reader held the last sender: once it is gone the queue ends
        let mut received = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(link_runtime::SupervisorMessage::Transport {
                    notice: link_runtime::TransportNotice::Data(bytes),
                    ..
                }) => received.extend(bytes),
                Ok(other) => panic!("unexpected {:?}", other),
                Err(e) => {
                    assert!(e.is_closed(), "reader still running after close");
                    break;
                }
            }
        }
        assert_eq!(received, b"hello");
        assert!(link.port.is_none());
        assert_eq!(link.write(b"x"), Err(WriteError::NotConnected));

        // Idempotent
        link.close();
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let (tx, _rx) = link_runtime::supervisor_channel();
        let params = LineParams {
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
        };
        let result = SerialTransport::new()
            .open("/dev/ttyDOESNOTEXIST0", &params, TransportEvents::new(tx, 1))
            .await;
        assert!(matches!(result, Err(OpenError::NotFound(_))));
    }
}
