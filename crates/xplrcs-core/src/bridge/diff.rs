//! Status comparison and translation
//!
//! Compare a zone's new poll line with the previous one and turn the changed
//! tokens into `hvac.*` trigger messages.

use crate::messages::OutboundMessage;
use crate::protocol::commands::{fan_mode_name, hvac_mode_name};
use crate::protocol::status::{split_token, StatusLine};

/// A device token translated into bus vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translated {
    /// `SPH=`
    HeatingSetpoint(String),
    /// `SPC=`
    CoolingSetpoint(String),
    /// A field of the `hvac.zone` schema
    ZoneField(&'static str, String),
}

/// Translate one `KEY=VALUE` pair, `None` for keys the bus does not carry
pub fn translate(key: &str, value: &str) -> Option<Translated> {
    match key {
        "SPH" => Some(Translated::HeatingSetpoint(value.to_string())),
        "SPC" => Some(Translated::CoolingSetpoint(value.to_string())),
        "FM" => Some(Translated::ZoneField("fan-mode", fan_mode_name(value).to_string())),
        "M" => Some(Translated::ZoneField("hvac-mode", hvac_mode_name(value).to_string())),
        "T" => Some(Translated::ZoneField("temperature", value.to_string())),
        _ => None,
    }
}

/// Result of comparing two poll lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDiff {
    /// Changed `(key, value)` pairs in line order
    pub changes: Vec<(String, String)>,
    /// True when positional comparison was abandoned
    pub send_all: bool,
}

impl StatusDiff {
    /// Compare two poll lines
    pub fn compare(previous: &str, current: &str) -> Self {
        let mut diff = StatusDiff::default();
        if previous == current {
            return diff;
        }

        let cur = StatusLine::parse(current);
        let last = StatusLine::parse(previous);

        // Structure changed, positions can't be trusted
        diff.send_all = cur.len() != last.len();

        for (i, token) in cur.tokens().iter().enumerate() {
            if !diff.send_all && last.get(i) == Some(token.as_str()) {
                continue;
            }
            match split_token(token) {
                Some((key, value)) => diff.changes.push((key.to_string(), value.to_string())),
                None => {
                    tracing::debug!(token = %token, "Unparseable status token");
                    diff.send_all = true;
                }
            }
        }
        diff
    }

    /// True when nothing changed
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Build the trigger messages for `zone`: `hvac.zone` first, then the
    /// heating and cooling `hvac.setpoint` triggers. Messages without any
    /// translated field are left out.
    pub fn to_messages(&self, zone: &str) -> Vec<OutboundMessage> {
        let mut state = OutboundMessage::trigger("zone").with("zone", zone);
        let mut heating = None;
        let mut cooling = None;

        for (key, value) in &self.changes {
            match translate(key, value) {
                Some(Translated::ZoneField(field, v)) => state.set(field, v),
                Some(Translated::HeatingSetpoint(v)) => heating = Some(v),
                Some(Translated::CoolingSetpoint(v)) => cooling = Some(v),
                None => {}
            }
        }

        let mut messages = Vec::new();
        if state.fields.len() > 1 {
            messages.push(state);
        }
        for (setpoint, value) in [("heating", heating), ("cooling", cooling)] {
            if let Some(v) = value {
                messages.push(
                    OutboundMessage::trigger("setpoint")
                        .with("zone", zone)
                        .with("setpoint", setpoint)
                        .with("temperature", v),
                );
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_only_changed_token() {
        let diff = StatusDiff::compare("A=1 M=H T=70", "A=1 M=H T=72");
        assert!(!diff.send_all);
        assert_eq!(diff.changes, vec![("T".to_string(), "72".to_string())]);

        let msgs = diff.to_messages("living");
        assert_eq!(msgs.len(), 1);
        assert_eq!(
            msgs[0],
            OutboundMessage::trigger("zone")
                .with("zone", "living")
                .with("temperature", "72")
        );
    }

    #[test]
    fn test_token_count_change_sends_all() {
        let diff = StatusDiff::compare("A=1 M=H T=70", "A=1 M=H T=70 FM=0");
        assert!(diff.send_all);
        assert_eq!(diff.changes.len(), 4);

        let msgs = diff.to_messages("living");
        assert_eq!(
            msgs,
            vec![OutboundMessage::trigger("zone")
                .with("zone", "living")
                .with("hvac-mode", "heat")
                .with("temperature", "70")
                .with("fan-mode", "auto")]
        );
    }

    #[test]
    fn test_identical_lines() {
        let diff = StatusDiff::compare("A=1 T=70", "A=1 T=70");
        assert!(diff.is_empty());
        assert!(diff.to_messages("living").is_empty());
    }

    #[test]
    fn test_unparseable_token_forces_rest() {
        // JUNK differs and has no '=', everything after it is resent
        let diff = StatusDiff::compare("A=1 X=1 M=H T=70", "A=1 JUNK M=H T=70");
        assert!(diff.send_all);
        assert_eq!(
            diff.changes,
            vec![
                ("M".to_string(), "H".to_string()),
                ("T".to_string(), "70".to_string())
            ]
        );
    }

    #[test]
    fn test_setpoint_triggers() {
        let diff = StatusDiff::compare("A=1 SPH=68 SPC=76", "A=1 SPH=69 SPC=75");
        let msgs = diff.to_messages("den");
        assert_eq!(
            msgs,
            vec![
                OutboundMessage::trigger("setpoint")
                    .with("zone", "den")
                    .with("setpoint", "heating")
                    .with("temperature", "69"),
                OutboundMessage::trigger("setpoint")
                    .with("zone", "den")
                    .with("setpoint", "cooling")
                    .with("temperature", "75"),
            ]
        );
    }

    #[test]
    fn test_untranslated_keys_emit_nothing() {
        let diff = StatusDiff::compare("A=1 Z=1 OA=40", "A=1 Z=1 OA=41");
        assert!(!diff.is_empty());
        assert!(diff.to_messages("den").is_empty());
    }

    #[test]
    fn test_translate_modes() {
        assert_eq!(
            translate("M", "C"),
            Some(Translated::ZoneField("hvac-mode", "cool".to_string()))
        );
        assert_eq!(
            translate("M", "Q"),
            Some(Translated::ZoneField("hvac-mode", "?".to_string()))
        );
        assert_eq!(
            translate("FM", "1"),
            Some(Translated::ZoneField("fan-mode", "on".to_string()))
        );
        assert_eq!(translate("A", "1"), None);
    }
}
