//! Inbound command handling
//!
//! `hvac.basic` commands become queued settings changes, `hvac.request`
//! commands either queue a device query or are answered straight away from
//! configuration. Anything malformed or unknown is dropped.

use tracing::debug;

use super::Bridge;
use crate::messages::{InboundMessage, MessageBus, OutboundMessage, HVAC_CLASS};
use crate::protocol::commands::{self, FanMode, HvacMode};
use crate::protocol::{CommandKind, LinkOpener};

/// Commands accepted in `hvac.basic`
const BASIC_COMMANDS: [&str; 3] = ["hvac-mode", "fan-mode", "setpoint"];

/// Setpoints a zone exposes
const SETPOINTS: [&str; 2] = ["heating", "cooling"];

impl<O: LinkOpener, B: MessageBus> Bridge<O, B> {
    /// Handle a command message addressed to this bridge
    pub fn on_inbound_message(&mut self, msg: &InboundMessage) {
        if !msg.class.eq_ignore_ascii_case(HVAC_CLASS) {
            debug!(class = %msg.class, "Ignoring message for another class");
            return;
        }

        match msg.schema_type.to_ascii_lowercase().as_str() {
            "basic" => self.handle_basic(msg),
            "request" => self.handle_request(msg),
            other => debug!(schema_type = %other, "Ignoring unknown hvac schema"),
        }
    }

    /// Index of the zone a message names, case-insensitive
    fn resolve_zone(&self, msg: &InboundMessage) -> Option<usize> {
        let name = msg.field("zone")?;
        let index = self
            .zones
            .iter()
            .position(|z| z.name.eq_ignore_ascii_case(name));
        if index.is_none() {
            debug!(zone = %name, "Unknown zone");
        }
        index
    }

    fn handle_basic(&mut self, msg: &InboundMessage) {
        let (Some(command), Some(index)) = (msg.field("command"), self.resolve_zone(msg)) else {
            debug!("hvac.basic without command or known zone");
            return;
        };
        let address = self.zones[index].address;

        let payload = match command.to_ascii_lowercase().as_str() {
            "hvac-mode" => msg
                .field("mode")
                .and_then(HvacMode::from_name)
                .map(|m| commands::set_hvac_mode(address, m)),
            "fan-mode" => msg
                .field("mode")
                .and_then(FanMode::from_name)
                .map(|m| commands::set_fan_mode(address, m)),
            "setpoint" => {
                commands::set_setpoints(address, msg.field("heating"), msg.field("cooling"))
            }
            _ => None,
        };

        match payload {
            Some(payload) => {
                debug!(command = %payload, "Queueing basic command");
                self.queue.enqueue(Some(index), payload, CommandKind::Basic);
            }
            None => debug!(command = %command, "Invalid or incomplete basic command"),
        }
    }

    fn handle_request(&mut self, msg: &InboundMessage) {
        let Some(request) = msg.field("request") else {
            debug!("hvac.request without request field");
            return;
        };

        match request.to_ascii_lowercase().as_str() {
            "gateinfo" => self.reply_gateinfo(),
            "zonelist" => self.reply_zonelist(),
            "zoneinfo" => {
                if let Some(index) = self.resolve_zone(msg) {
                    self.reply_zoneinfo(index);
                }
            }
            "setpoint" => {
                let kind = match msg.field("setpoint").map(str::to_ascii_lowercase).as_deref() {
                    Some("heating") => CommandKind::RequestSetpointHeat,
                    Some("cooling") => CommandKind::RequestSetpointCool,
                    _ => {
                        debug!("Setpoint request without heating/cooling");
                        return;
                    }
                };
                if let Some(index) = self.resolve_zone(msg) {
                    let payload = commands::request_setpoints(self.zones[index].address);
                    self.queue.enqueue(Some(index), payload, kind);
                }
            }
            "zone" => {
                if let Some(index) = self.resolve_zone(msg) {
                    let payload = commands::poll_status(self.zones[index].address);
                    self.queue
                        .enqueue(Some(index), payload, CommandKind::RequestZoneStatus);
                }
            }
            "runtime" => {
                let (kind, heating) = match msg.field("state").map(str::to_ascii_lowercase).as_deref() {
                    Some("heating") => (CommandKind::RequestRunTimeHeat, true),
                    Some("cooling") => (CommandKind::RequestRunTimeCool, false),
                    _ => {
                        debug!("Runtime request without heating/cooling state");
                        return;
                    }
                };
                if let Some(index) = self.resolve_zone(msg) {
                    let payload = commands::request_runtime(self.zones[index].address, heating);
                    self.queue.enqueue(Some(index), payload, kind);
                }
            }
            other => debug!(request = %other, "Unknown request"),
        }
    }

    fn reply_gateinfo(&mut self) {
        let msg = OutboundMessage::status("gateinfo")
            .with("protocol", "RCS")
            .with("description", "xPL to RCS bridge")
            .with("version", crate::VERSION)
            .with("author", "Stephen A. Rodgers")
            .with("info-url", "http://xpl.ohnosec.org")
            .with("zone-count", self.zones.len().to_string());
        self.broadcast(&msg);
    }

    fn reply_zonelist(&mut self) {
        let names: Vec<&str> = self.zones.iter().map(|z| z.name.as_str()).collect();
        let msg = OutboundMessage::status("zonelist")
            .with("zone-count", self.zones.len().to_string())
            .with("zone-list", names.join(","));
        self.broadcast(&msg);
    }

    fn reply_zoneinfo(&mut self, index: usize) {
        let modes: Vec<&str> = HvacMode::ALL.iter().map(|m| m.name()).collect();
        let fan_modes: Vec<&str> = FanMode::ALL.iter().map(|m| m.name()).collect();
        let msg = OutboundMessage::status("zoneinfo")
            .with("zone", self.zones[index].name.as_str())
            .with("command-list", BASIC_COMMANDS.join(","))
            .with("hvac-mode-list", modes.join(","))
            .with("fan-mode-list", fan_modes.join(","))
            .with("setpoint-list", SETPOINTS.join(","))
            .with("scale", self.config.units.as_str());
        self.broadcast(&msg);
    }
}
