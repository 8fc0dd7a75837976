//! Serial port handling
//!
//! Provides low-level serial port access for the thermostat bus and the
//! [`SerialLink`] / [`LinkOpener`] seams the bridge engine talks through.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use super::{ProtocolError, LINE_TERMINATOR, SUPPORTED_BAUD_RATES};

/// Abstraction over the byte channel to the thermostat bus
pub trait SerialLink: Read + Write + Send {
    /// Discard anything received but not yet read
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Opens (and re-opens) the link to the thermostat bus
pub trait LinkOpener {
    /// Open the device at `path` with the given baud rate
    fn open(&mut self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialLink>, ProtocolError>;
}

/// Serial port wrapper implementing [`SerialLink`]
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Wrap an already configured port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl SerialLink for SerialChannel {
    fn clear_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

/// Opens real serial devices through the `serialport` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialOpener;

impl LinkOpener for SerialOpener {
    fn open(&mut self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialLink>, ProtocolError> {
        let mut port = open_port(path, baud_rate)?;
        configure_port(port.as_mut())?;

        // A bare CR makes every thermostat drop any half-received command.
        // Whatever they answer is discarded by the engine on its next tick.
        port.write_all(&[LINE_TERMINATOR])?;

        tracing::info!(port = %path, baud = baud_rate, "Serial port opened");
        Ok(Box::new(SerialChannel::new(port)))
    }
}

/// Open a serial port for non-blocking use
pub fn open_port(name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>, ProtocolError> {
    if !SUPPORTED_BAUD_RATES.contains(&baud_rate) {
        return Err(ProtocolError::InvalidBaudRate(baud_rate));
    }

    // Zero timeout: reads return TimedOut immediately when nothing is waiting
    serialport::new(name, baud_rate)
        .timeout(Duration::ZERO)
        .open()
        .map_err(|e| ProtocolError::SerialError(format!("{}: {}", name, e)))
}

/// Configure a serial port for the RCS bus: 8N1, no flow control
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.set_data_bits(serialport::DataBits::Eight)?;
    port.set_parity(serialport::Parity::None)?;
    port.set_stop_bits(serialport::StopBits::One)?;
    port.set_flow_control(serialport::FlowControl::None)?;
    Ok(())
}
