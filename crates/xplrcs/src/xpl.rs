//! Minimal xPL transport
//!
//! Text framing for `xpl-cmnd`/`xpl-stat`/`xpl-trig` datagrams and a UDP
//! broadcast endpoint implementing [`MessageBus`]. No hub, no discovery and no
//! remote configuration: the endpoint listens on an ephemeral port and
//! advertises it with `hbeat.app` so a local hub can forward to it.

use std::fmt::Write as _;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket as StdUdpSocket};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::debug;

use xplrcs_core::messages::{InboundMessage, MessageBus, MessageKind, OutboundMessage};

/// Well-known xPL port
pub const XPL_PORT: u16 = 3865;

/// Vendor and device part of our source address
pub const VENDOR_DEVICE: &str = "hwstar-xplrcs";

/// Minutes between heartbeats
pub const HEARTBEAT_MINUTES: u64 = 5;

/// xPL parse errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum XplError {
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("Message truncated")]
    Truncated,

    #[error("Expected '{expected}', found '{found}'")]
    Unexpected { expected: &'static str, found: String },

    #[error("Missing header field: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid name/value line: {0}")]
    InvalidLine(String),
}

/// xPL message type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XplKind {
    Command,
    Status,
    Trigger,
}

impl XplKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            XplKind::Command => "xpl-cmnd",
            XplKind::Status => "xpl-stat",
            XplKind::Trigger => "xpl-trig",
        }
    }

    fn parse(s: &str) -> Result<Self, XplError> {
        match s.to_ascii_lowercase().as_str() {
            "xpl-cmnd" => Ok(XplKind::Command),
            "xpl-stat" => Ok(XplKind::Status),
            "xpl-trig" => Ok(XplKind::Trigger),
            _ => Err(XplError::UnknownMessageType(s.to_string())),
        }
    }
}

impl From<MessageKind> for XplKind {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Status => XplKind::Status,
            MessageKind::Trigger => XplKind::Trigger,
        }
    }
}

/// One xPL datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XplMessage {
    pub kind: XplKind,
    pub hop: u32,
    pub source: String,
    pub target: String,
    pub class: String,
    pub schema_type: String,
    pub body: Vec<(String, String)>,
}

impl XplMessage {
    /// Broadcast message from `source` carrying an engine message
    pub fn from_outbound(source: &str, msg: &OutboundMessage) -> Self {
        Self {
            kind: msg.kind.into(),
            hop: 1,
            source: source.to_string(),
            target: "*".to_string(),
            class: msg.class.clone(),
            schema_type: msg.schema_type.clone(),
            body: msg.fields.clone(),
        }
    }

    /// Serialize to the wire text form
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(256);
        // Writing to a String cannot fail
        let _ = write!(
            out,
            "{}\n{{\nhop={}\nsource={}\ntarget={}\n}}\n{}.{}\n{{\n",
            self.kind.as_str(),
            self.hop,
            self.source,
            self.target,
            self.class,
            self.schema_type
        );
        for (key, value) in &self.body {
            let _ = writeln!(out, "{}={}", key, value);
        }
        out.push_str("}\n");
        out
    }

    /// Parse the wire text form
    pub fn parse(text: &str) -> Result<Self, XplError> {
        let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));

        let kind = XplKind::parse(lines.next().ok_or(XplError::Truncated)?)?;
        let header = read_block(&mut lines)?;
        let schema = lines.next().ok_or(XplError::Truncated)?;
        let body = read_block(&mut lines)?;

        let (class, schema_type) = schema
            .split_once('.')
            .filter(|(c, t)| !c.is_empty() && !t.is_empty())
            .ok_or_else(|| XplError::InvalidSchema(schema.to_string()))?;

        let header_value = |name: &'static str| {
            header
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
                .ok_or(XplError::MissingHeader(name))
        };

        Ok(Self {
            kind,
            hop: header_value("hop")?.parse().unwrap_or(1),
            source: header_value("source")?,
            target: header_value("target")?,
            class: class.to_string(),
            schema_type: schema_type.to_string(),
            body,
        })
    }

    /// True for a command addressed to exactly `source`
    pub fn is_command_for(&self, source: &str) -> bool {
        self.kind == XplKind::Command && self.target.eq_ignore_ascii_case(source)
    }

    /// Hand the schema and body to the engine
    pub fn into_inbound(self) -> InboundMessage {
        InboundMessage {
            class: self.class,
            schema_type: self.schema_type,
            fields: self.body,
        }
    }
}

fn read_block<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
) -> Result<Vec<(String, String)>, XplError> {
    match lines.next() {
        Some("{") => {}
        Some(other) => {
            return Err(XplError::Unexpected {
                expected: "{",
                found: other.to_string(),
            })
        }
        None => return Err(XplError::Truncated),
    }

    let mut pairs = Vec::new();
    for line in lines.by_ref() {
        if line == "}" {
            return Ok(pairs);
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| XplError::InvalidLine(line.to_string()))?;
        pairs.push((key.to_string(), value.to_string()));
    }
    Err(XplError::Truncated)
}

/// Source address for an instance, `hwstar-xplrcs.<instance>`
pub fn source_address(instance: &str) -> String {
    format!("{}.{}", VENDOR_DEVICE, instance)
}

/// UDP side of the bridge
pub struct XplEndpoint {
    socket: Arc<UdpSocket>,
    source: String,
    local_ip: Ipv4Addr,
    broadcast: SocketAddr,
}

impl XplEndpoint {
    /// Bind an ephemeral broadcast-capable socket.
    ///
    /// `interface` is the IPv4 address of the interface to use; without it the
    /// address the kernel routes broadcasts from is advertised.
    pub fn bind(instance: &str, interface: Option<Ipv4Addr>) -> io::Result<Self> {
        let bind_ip = interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        let std_socket = StdUdpSocket::bind(SocketAddrV4::new(bind_ip, 0))?;
        std_socket.set_broadcast(true)?;
        std_socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(std_socket)?;

        let local_ip = match interface {
            Some(ip) => ip,
            None => routed_ip().unwrap_or(Ipv4Addr::LOCALHOST),
        };

        Ok(Self {
            socket: Arc::new(socket),
            source: source_address(instance),
            local_ip,
            broadcast: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, XPL_PORT)),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn local_port(&self) -> io::Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    /// Bus handle for the engine
    pub fn bus(&self) -> UdpBus {
        UdpBus {
            socket: self.socket.clone(),
            source: self.source.clone(),
            broadcast: self.broadcast,
        }
    }

    /// Wait for the next command addressed to us.
    ///
    /// Datagrams that fail to parse or are meant for someone else are skipped.
    pub async fn recv_command(&self, buf: &mut [u8]) -> io::Result<InboundMessage> {
        loop {
            let (len, from) = self.socket.recv_from(buf).await?;
            let text = String::from_utf8_lossy(&buf[..len]);
            match XplMessage::parse(&text) {
                Ok(msg) if msg.is_command_for(&self.source) => return Ok(msg.into_inbound()),
                Ok(_) => {}
                Err(e) => debug!(from = %from, error = %e, "Dropping malformed xPL datagram"),
            }
        }
    }

    /// Announce ourselves with `hbeat.app`
    pub fn heartbeat(&self) -> io::Result<()> {
        self.send_hbeat("app")
    }

    /// Announce shutdown with `hbeat.end`
    pub fn goodbye(&self) -> io::Result<()> {
        self.send_hbeat("end")
    }

    fn send_hbeat(&self, schema_type: &str) -> io::Result<()> {
        let msg = XplMessage {
            kind: XplKind::Status,
            hop: 1,
            source: self.source.clone(),
            target: "*".to_string(),
            class: "hbeat".to_string(),
            schema_type: schema_type.to_string(),
            body: vec![
                ("interval".to_string(), HEARTBEAT_MINUTES.to_string()),
                ("port".to_string(), self.local_port()?.to_string()),
                ("remote-ip".to_string(), self.local_ip.to_string()),
                ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
            ],
        };
        send(&self.socket, &msg, self.broadcast)
    }
}

/// Engine-facing broadcast handle
pub struct UdpBus {
    socket: Arc<UdpSocket>,
    source: String,
    broadcast: SocketAddr,
}

impl MessageBus for UdpBus {
    fn broadcast(&mut self, message: &OutboundMessage) -> io::Result<()> {
        let msg = XplMessage::from_outbound(&self.source, message);
        send(&self.socket, &msg, self.broadcast)
    }
}

fn send(socket: &UdpSocket, msg: &XplMessage, to: SocketAddr) -> io::Result<()> {
    let text = msg.encode();
    debug!(schema = %format!("{}.{}", msg.class, msg.schema_type), "Sending xPL message");
    socket.try_send_to(text.as_bytes(), to).map(|_| ())
}

/// Address the kernel would send a broadcast from
fn routed_ip() -> Option<Ipv4Addr> {
    let probe = StdUdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    probe.set_broadcast(true).ok()?;
    probe
        .connect(SocketAddrV4::new(Ipv4Addr::BROADCAST, XPL_PORT))
        .ok()?;
    match probe.local_addr().ok()? {
        SocketAddr::V4(addr) if !addr.ip().is_unspecified() => Some(*addr.ip()),
        _ => None,
    }
}
