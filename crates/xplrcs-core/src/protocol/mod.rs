//! RCS Serial Protocol
//!
//! Implements the ASCII line protocol spoken by RCS thermostats on a shared
//! RS-232/RS-485 bus.
//!
//! Every line is a run of space separated `KEY=VALUE` tokens terminated by a
//! carriage return. The `A=<n>` token selects a thermostat on the bus.

pub mod commands;
mod error;
pub mod framer;
pub mod serial;
pub mod status;

pub use commands::{CommandKind, CommandRequest};
pub use error::ProtocolError;
pub use framer::{LineFramer, ReadOutcome};
pub use serial::{configure_port, open_port, LinkOpener, SerialChannel, SerialLink, SerialOpener};
pub use status::StatusLine;

/// Default baud rate for RCS thermostats
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default serial device
pub const DEFAULT_COM_PORT: &str = "/dev/ttyS0";

/// Baud rates accepted by the serial layer
pub const SUPPORTED_BAUD_RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

/// Maximum line length kept by the framer, longer lines are truncated
pub const MAX_LINE_LENGTH: usize = 1023;

/// Maximum number of tokens parsed out of a status line
pub const MAX_TOKENS: usize = 19;

/// Line terminator on the wire
pub const LINE_TERMINATOR: u8 = b'\r';
