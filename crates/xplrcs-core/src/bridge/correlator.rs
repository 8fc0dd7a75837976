//! Command response interpretation
//!
//! Replies carry no transaction id; a line that arrives while no poll is
//! pending belongs to the command in flight and is read according to that
//! command's kind.

use super::diff::{translate, Translated};
use crate::messages::OutboundMessage;
use crate::protocol::{CommandKind, StatusLine};

/// Build the status message answering a command of `kind` issued for `zone`.
///
/// Returns `None` when the reply lacks the expected field or the command
/// expects no reply at all.
pub fn correlate(kind: CommandKind, zone: &str, line: &str) -> Option<OutboundMessage> {
    let status = StatusLine::parse(line);

    match kind {
        CommandKind::RequestSetpointHeat => setpoint_status(&status, zone, "SPH", "heating"),
        CommandKind::RequestSetpointCool => setpoint_status(&status, zone, "SPC", "cooling"),
        CommandKind::RequestRunTimeHeat => runtime_status(&status, zone, "RTH", "heating"),
        CommandKind::RequestRunTimeCool => runtime_status(&status, zone, "RTC", "cooling"),
        CommandKind::RequestZoneStatus => Some(zone_status(&status, zone)),
        CommandKind::Basic | CommandKind::DateTimeSync => None,
    }
}

fn setpoint_status(
    status: &StatusLine,
    zone: &str,
    key: &str,
    setpoint: &str,
) -> Option<OutboundMessage> {
    let value = status.lookup(key)?;
    Some(
        OutboundMessage::status("setpoint")
            .with("zone", zone)
            .with(setpoint, value),
    )
}

fn runtime_status(status: &StatusLine, zone: &str, key: &str, state: &str) -> Option<OutboundMessage> {
    let value = status.lookup(key)?;
    Some(
        OutboundMessage::status("runtime")
            .with("zone", zone)
            .with(state, value)
            .with("units", "hours"),
    )
}

fn zone_status(status: &StatusLine, zone: &str) -> OutboundMessage {
    let mut msg = OutboundMessage::status("zone");

    // The device reports its own origin, the configured name is what clients know
    if status.lookup("O").is_some() {
        msg.set("zone", zone);
    }
    for key in ["FM", "M", "T"] {
        if let Some(Translated::ZoneField(field, value)) =
            status.lookup(key).and_then(|v| translate(key, v))
        {
            msg.set(field, value);
        }
    }
    msg
}
