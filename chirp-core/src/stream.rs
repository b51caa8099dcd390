//! Byte stream abstraction the radio engine reads from and writes to.
//!
//! In practice this is a USB serial port, but the engine only needs the
//! narrow capability set of [`ByteStream`], which keeps it testable against
//! an in-memory double.

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// Serial link speed used by Meshtastic firmware.
pub const BAUD_RATE: u32 = 115_200;

/// Pause after every write so the radio can drain its UART buffer.
pub const WRITE_SETTLE: Duration = Duration::from_millis(100);

/// Read timeout installed when a port is opened, before any caller asks
/// for a shorter one.
const INITIAL_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport capability consumed by the engine.
///
/// Implementations signal end-of-stream with `Ok(0)` or
/// [`io::ErrorKind::UnexpectedEof`] and an expired read deadline with
/// [`io::ErrorKind::TimedOut`] or [`io::ErrorKind::WouldBlock`]. Every other
/// error is treated as a transport failure.
pub trait ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Release the underlying resource. Calling it again must be a no-op.
    fn close(&mut self) -> io::Result<()>;

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl<S: ByteStream + ?Sized> ByteStream for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).set_read_timeout(timeout)
    }
}

/// How a failed read should be interpreted by the decode loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadInterruption {
    /// The peer closed the stream.
    EndOfStream,
    /// The per-read deadline passed with nothing to read.
    DeadlineExceeded,
    /// A signal interrupted the call; retry.
    Retry,
    /// Anything else. Surfaced to the caller.
    Failure,
}

impl ReadInterruption {
    pub fn classify(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::EndOfStream,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::DeadlineExceeded,
            io::ErrorKind::Interrupted => Self::Retry,
            _ => Self::Failure,
        }
    }
}

/// [`ByteStream`] over a local serial port.
pub struct SerialStream {
    path: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialStream {
    /// Open `path` at 115200 8N1 with DTR and RTS deasserted.
    pub fn open(path: &str) -> io::Result<Self> {
        info!("Opening serial port {path}");

        let mut port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(INITIAL_READ_TIMEOUT)
            .open()
            .map_err(io::Error::from)?;

        // Holding DTR high resets some ESP32 boards.
        if let Err(e) = port.write_data_terminal_ready(false) {
            debug!("Could not clear DTR on {path}: {e}");
        }
        if let Err(e) = port.write_request_to_send(false) {
            debug!("Could not clear RTS on {path}: {e}");
        }

        Ok(Self {
            path: path.to_string(),
            port: Some(port),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is closed"))
    }
}

impl ByteStream for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port()?.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.port()?.write(buf)?;
        std::thread::sleep(WRITE_SETTLE);
        Ok(written)
    }

    fn close(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            debug!("Closed serial port {path}", path = self.path);
        }
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port()?.set_timeout(timeout).map_err(io::Error::from)
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialStream")
            .field("path", &self.path)
            .field("open", &self.port.is_some())
            .finish()
    }
}
