//! Thermostat zones
//!
//! A zone is one addressable thermostat on the shared bus. Identity comes from
//! configuration; the poll bookkeeping is owned by the bridge engine.

use crate::config::ZoneConfig;

/// One thermostat on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Unique zone name used on the message bus
    pub name: String,
    /// Bus address (1-255)
    pub address: u8,
    last_poll_line: String,
    first_poll: bool,
}

impl Zone {
    /// Create a zone that has not been polled yet
    pub fn new(name: impl Into<String>, address: u8) -> Self {
        Self {
            name: name.into(),
            address,
            last_poll_line: String::new(),
            first_poll: true,
        }
    }

    /// Most recent poll line seen for this zone, empty before the first poll
    pub fn last_poll_line(&self) -> &str {
        &self.last_poll_line
    }

    /// True until the first poll of this zone completes
    pub fn is_first_poll(&self) -> bool {
        self.first_poll
    }

    /// Record a completed poll
    pub(crate) fn record_poll(&mut self, line: &str) {
        self.last_poll_line.clear();
        self.last_poll_line.push_str(line);
        self.first_poll = false;
    }
}

impl From<&ZoneConfig> for Zone {
    fn from(cfg: &ZoneConfig) -> Self {
        Zone::new(cfg.name.clone(), cfg.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_poll_clears_first_poll() {
        let mut zone = Zone::new("living", 2);
        assert!(zone.is_first_poll());
        assert_eq!(zone.last_poll_line(), "");

        zone.record_poll("A=2 T=70");
        assert!(!zone.is_first_poll());
        assert_eq!(zone.last_poll_line(), "A=2 T=70");
    }
}
