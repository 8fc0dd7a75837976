//! # xplrcs Core Library
//!
//! Bridge engine between RCS-family serial thermostats and an xPL style
//! broadcast message bus.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Non-blocking CR-terminated line framing for the RCS serial protocol
//! - Status line tokenizing and key lookup
//! - A single in-flight command queue and round-robin zone poller
//! - Status diffing and translation into `hvac.*` messages
//! - Serial link loss detection and reconnection
//!
//! The engine performs no I/O multiplexing. The host calls
//! [`Bridge::on_tick`](bridge::Bridge::on_tick) once per second,
//! [`Bridge::on_serial_readable`](bridge::Bridge::on_serial_readable) when the
//! serial port may have data, and
//! [`Bridge::on_inbound_message`](bridge::Bridge::on_inbound_message) for each
//! command message addressed to this bridge.
//!
//! ## Example
//!
//! ```rust,ignore
//! use xplrcs_core::{bridge::Bridge, config::BridgeConfig, protocol::SerialOpener};
//!
//! let config = BridgeConfig::from_file("xplrcs.json")?;
//! config.validate()?;
//!
//! let mut bridge = Bridge::connect(config, SerialOpener, my_bus)?;
//! loop {
//!     bridge.on_serial_readable();
//!     bridge.on_tick();
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod messages;
pub mod protocol;
pub mod zone;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bridge::Bridge;
    pub use crate::config::{BridgeConfig, ConfigError, Units, ZoneConfig};
    pub use crate::messages::{InboundMessage, MessageBus, MessageKind, OutboundMessage};
    pub use crate::protocol::{CommandKind, LinkOpener, ProtocolError, SerialLink};
    pub use crate::zone::Zone;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
