//! Bridge engine
//!
//! Owns every piece of mutable bridge state and exposes the three entry points
//! the host loop drives:
//!
//! - [`Bridge::on_tick`] once per tick (one second)
//! - [`Bridge::on_serial_readable`] whenever the serial port may have data
//! - [`Bridge::on_inbound_message`] for each command addressed to the bridge
//!
//! The serial bus is half-duplex-like and replies carry no transaction id, so
//! at most one command or poll is outstanding at any time and each tick does
//! at most one unit of work: a housekeeping enqueue, one queued command, or
//! one zone poll.

mod correlator;
mod diff;
mod poller;
mod queue;
mod requests;
mod supervisor;

pub use correlator::correlate;
pub use diff::{translate, StatusDiff, Translated};
pub use poller::{PendingPoll, ZonePoller};
pub use queue::CommandQueue;
pub use supervisor::{LinkSupervisor, LinkTick, RETRY_INTERVAL};

use chrono::{Local, NaiveDateTime};
use std::io::Write;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::messages::{MessageBus, OutboundMessage};
use crate::protocol::{
    commands, CommandKind, LineFramer, LinkOpener, ProtocolError, ReadOutcome, SerialLink,
    StatusLine, LINE_TERMINATOR,
};
use crate::zone::Zone;

/// Ticks between clock synchronisations
pub const HOURLY_TICKS: u64 = 3600;

/// RCS thermostat bridge engine
pub struct Bridge<O: LinkOpener, B: MessageBus> {
    config: BridgeConfig,
    zones: Vec<Zone>,
    queue: CommandQueue,
    poller: ZonePoller,
    supervisor: LinkSupervisor,
    framer: LineFramer,
    link: Option<Box<dyn SerialLink>>,
    opener: O,
    bus: B,
    ticks: u64,
    sync_due: bool,
    settling: bool,
    ready_sent: bool,
}

impl<O: LinkOpener, B: MessageBus> Bridge<O, B> {
    /// Open the serial link and build the engine.
    ///
    /// The configuration is expected to be validated already. Failing to open
    /// the port at startup is an error; later failures are retried forever.
    pub fn connect(config: BridgeConfig, mut opener: O, bus: B) -> Result<Self, ProtocolError> {
        let link = opener.open(&config.com_port, config.baud_rate)?;
        let zones = config.zones.iter().map(Zone::from).collect();
        let poller = ZonePoller::new(config.poll_interval);

        Ok(Self {
            config,
            zones,
            queue: CommandQueue::new(),
            poller,
            supervisor: LinkSupervisor::new(),
            framer: LineFramer::new(),
            link: Some(link),
            opener,
            bus,
            ticks: 0,
            sync_due: false,
            settling: true,
            ready_sent: false,
        })
    }

    /// Configuration the engine runs with
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Zones in polling order
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Outbound command queue
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Zone whose poll reply is awaited
    pub fn pending_poll(&self) -> Option<&Zone> {
        self.poller.pending().and_then(|p| self.zones.get(p.zone))
    }

    /// True while the serial link is open
    pub fn is_link_up(&self) -> bool {
        self.link.is_some()
    }

    /// Ticks until the next reopen attempt, zero while the link is healthy
    pub fn retry_countdown(&self) -> u32 {
        self.supervisor.countdown()
    }

    /// Ticks processed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Message bus the engine broadcasts on
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Link opener used for reconnects
    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Mutable access to the link opener
    pub fn opener_mut(&mut self) -> &mut O {
        &mut self.opener
    }

    /// Periodic tick using the local wall clock
    pub fn on_tick(&mut self) {
        self.tick_at(Local::now().naive_local());
    }

    /// Periodic tick with an explicit wall clock time
    pub fn tick_at(&mut self, now: NaiveDateTime) {
        self.ticks += 1;

        // Counted on every tick so an hour that ends while the link is down
        // is synchronised once it is back
        if self.ticks % HOURLY_TICKS == 0 {
            self.sync_due = true;
        }

        match self.supervisor.on_tick() {
            LinkTick::Up => {}
            LinkTick::Waiting => return,
            LinkTick::Reconnect => {
                // A freshly opened link gets one tick to settle
                self.reconnect();
                return;
            }
        }

        if self.settling {
            self.discard_input();
        }

        self.expire_stale();
        self.poller.count_tick();

        if self.sync_due {
            self.sync_due = false;
            let payload = commands::date_time_sync(now);
            info!(command = %payload, "Queueing clock synchronisation");
            self.queue.enqueue(None, payload, CommandKind::DateTimeSync);
            return;
        }

        if !self.ready_sent {
            self.ready_sent = true;
            self.broadcast(&OutboundMessage::trigger("gateway").with("event", "ready"));
            return;
        }

        if !self.queue.is_empty() {
            self.send_queued();
            return;
        }

        if self.poller.is_due() {
            self.poll_next_zone();
        }
    }

    /// Drain every complete line the serial port has for us
    pub fn on_serial_readable(&mut self) {
        loop {
            let Some(link) = self.link.as_mut() else {
                return;
            };
            match self.framer.try_read_line(link.as_mut()) {
                ReadOutcome::NoData => return,
                ReadOutcome::Line(line) => self.handle_line(&line),
                ReadOutcome::EndOfStream => {
                    warn!(port = %self.config.com_port, "End of stream on serial port");
                    self.link_lost();
                    return;
                }
                ReadOutcome::Error(e) => {
                    warn!(port = %self.config.com_port, error = %e, "Serial read failed");
                    self.link_lost();
                    return;
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        debug!(line = %line, "Line received");
        match self.poller.pending() {
            Some(pending) => self.handle_poll_response(pending.zone, line),
            None => self.handle_command_response(line),
        }
    }

    fn handle_poll_response(&mut self, index: usize, line: &str) {
        let Some(zone) = self.zones.get(index) else {
            self.poller.clear();
            return;
        };

        let status = StatusLine::parse(line);
        if let Some(address) = status.lookup("A") {
            if address.parse::<u8>().ok() != Some(zone.address) {
                warn!(zone = %zone.name, line = %line, "Poll reply from unexpected address");
                return;
            }
        }
        self.poller.clear();

        let messages = if zone.is_first_poll() {
            debug!(zone = %zone.name, "First poll, storing baseline");
            Vec::new()
        } else {
            let diff = StatusDiff::compare(zone.last_poll_line(), line);
            if !diff.is_empty() {
                debug!(zone = %zone.name, changes = diff.changes.len(), send_all = diff.send_all, "Zone status changed");
            }
            diff.to_messages(&zone.name)
        };

        self.zones[index].record_poll(line);
        for msg in &messages {
            self.broadcast(msg);
        }
    }

    fn handle_command_response(&mut self, line: &str) {
        let Some(cmd) = self.queue.complete() else {
            debug!(line = %line, "Unexpected line, no command awaiting a reply");
            return;
        };

        let zone = cmd
            .zone
            .and_then(|i| self.zones.get(i))
            .map(|z| z.name.clone())
            .unwrap_or_default();

        match correlate(cmd.kind, &zone, line) {
            Some(msg) => self.broadcast(&msg),
            None => debug!(command = %cmd.payload, line = %line, "Reply lacks the expected field"),
        }
    }

    fn send_queued(&mut self) {
        if self.queue.in_flight().is_some() || self.poller.pending().is_some() {
            return;
        }
        let Some(bytes) = self.queue.ready_to_send().map(|c| c.to_bytes()) else {
            return;
        };

        debug!(command = %String::from_utf8_lossy(&bytes).trim_end(), "Sending command");
        self.queue.mark_sent(self.ticks);
        self.transmit(&bytes);
    }

    fn poll_next_zone(&mut self) {
        let Some(index) = self.poller.advance(self.zones.len()) else {
            return;
        };

        if let Some(missed) = self.poller.start(index, self.ticks) {
            if let Some(zone) = self.zones.get(missed.zone) {
                warn!(zone = %zone.name, "No response to previous poll");
            }
        }

        let zone = &self.zones[index];
        debug!(zone = %zone.name, address = zone.address, "Polling status");
        let mut bytes = commands::poll_status(zone.address).into_bytes();
        bytes.push(LINE_TERMINATOR);
        self.transmit(&bytes);
    }

    /// Drop whatever the thermostats sent in answer to the flushing CR
    fn discard_input(&mut self) {
        self.settling = false;
        self.framer.reset();
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if let Err(e) = link.clear_input() {
            warn!(port = %self.config.com_port, error = %e, "Failed to clear serial input");
        }
    }

    fn expire_stale(&mut self) {
        let timeout = u64::from(self.config.response_timeout);
        if let Some(cmd) = self.queue.expire(self.ticks, timeout) {
            warn!(command = %cmd.payload, "No response, command abandoned");
        }
        if let Some(poll) = self.poller.expire(self.ticks, timeout) {
            if let Some(zone) = self.zones.get(poll.zone) {
                warn!(zone = %zone.name, "No response to poll");
            }
        }
    }

    fn transmit(&mut self, bytes: &[u8]) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if let Err(e) = link.write_all(bytes).and_then(|_| link.flush()) {
            warn!(port = %self.config.com_port, error = %e, "Serial write failed");
            self.link_lost();
        }
    }

    fn link_lost(&mut self) {
        // Dropping the handle closes the device
        self.link = None;
        self.framer.reset();
        self.supervisor.link_lost();

        if let Some(cmd) = self.queue.complete() {
            debug!(command = %cmd.payload, "Abandoning command in flight");
        }
        self.poller.clear();

        warn!(
            port = %self.config.com_port,
            retry_in = self.supervisor.countdown(),
            "Serial link lost"
        );
        self.broadcast(&OutboundMessage::trigger("gateway").with("event", "serial-lost"));
    }

    fn reconnect(&mut self) {
        match self.opener.open(&self.config.com_port, self.config.baud_rate) {
            Ok(link) => {
                self.link = Some(link);
                self.settling = true;
                info!(
                    port = %self.config.com_port,
                    attempts = self.supervisor.attempts(),
                    "Serial link restored"
                );
                self.broadcast(&OutboundMessage::trigger("gateway").with("event", "serial-restored"));
            }
            Err(e) => {
                self.supervisor.reconnect_failed();
                warn!(port = %self.config.com_port, error = %e, "Reconnect failed");
            }
        }
    }

    fn broadcast(&mut self, msg: &OutboundMessage) {
        if let Err(e) = self.bus.broadcast(msg) {
            warn!(schema = %msg.schema(), error = %e, "Message transmission failed");
        }
    }
}
