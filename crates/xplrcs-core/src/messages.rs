//! Message bus boundary
//!
//! The bridge talks to the home-automation side through [`MessageBus`]:
//! broadcast-only, fire and forget. Inbound command messages reach the engine
//! as [`InboundMessage`] values already filtered for this bridge.

use std::io;

/// Schema class used for every thermostat message
pub const HVAC_CLASS: &str = "hvac";

/// Outbound message flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Current state, usually in reply to a request
    Status,
    /// Something changed
    Trigger,
}

/// A message to broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Status or trigger
    pub kind: MessageKind,
    /// Schema class, e.g. `hvac`
    pub class: String,
    /// Schema type, e.g. `zone`
    pub schema_type: String,
    /// Named values in insertion order
    pub fields: Vec<(String, String)>,
}

impl OutboundMessage {
    /// Empty status message for an `hvac.<schema_type>` schema
    pub fn status(schema_type: &str) -> Self {
        Self::new(MessageKind::Status, schema_type)
    }

    /// Empty trigger message for an `hvac.<schema_type>` schema
    pub fn trigger(schema_type: &str) -> Self {
        Self::new(MessageKind::Trigger, schema_type)
    }

    fn new(kind: MessageKind, schema_type: &str) -> Self {
        Self {
            kind,
            class: HVAC_CLASS.to_string(),
            schema_type: schema_type.to_string(),
            fields: Vec::new(),
        }
    }

    /// Append a field, builder style
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a field, replacing an existing value for the same key
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    /// Value of a field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Full schema name, `class.type`
    pub fn schema(&self) -> String {
        format!("{}.{}", self.class, self.schema_type)
    }
}

/// A command message addressed to this bridge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    /// Schema class
    pub class: String,
    /// Schema type
    pub schema_type: String,
    /// Named values in message order
    pub fields: Vec<(String, String)>,
}

impl InboundMessage {
    /// Build a message from a schema and fields
    pub fn new(class: &str, schema_type: &str, fields: &[(&str, &str)]) -> Self {
        Self {
            class: class.to_string(),
            schema_type: schema_type.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// First value for a key, compared case-insensitively
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Broadcast side of the messaging protocol
pub trait MessageBus {
    /// Send one message; delivery is at most once
    fn broadcast(&mut self, message: &OutboundMessage) -> io::Result<()>;
}

impl<B: MessageBus + ?Sized> MessageBus for Box<B> {
    fn broadcast(&mut self, message: &OutboundMessage) -> io::Result<()> {
        (**self).broadcast(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_value() {
        let mut msg = OutboundMessage::trigger("zone").with("zone", "living");
        msg.set("temperature", "70");
        msg.set("temperature", "72");
        assert_eq!(msg.fields.len(), 2);
        assert_eq!(msg.get("temperature"), Some("72"));
        assert_eq!(msg.schema(), "hvac.zone");
    }

    #[test]
    fn test_inbound_field_case_insensitive() {
        let msg = InboundMessage::new("hvac", "basic", &[("Command", "hvac-mode")]);
        assert_eq!(msg.field("command"), Some("hvac-mode"));
        assert_eq!(msg.field("zone"), None);
    }
}
