//! Protocol commands
//!
//! Defines the commands the bridge sends to RCS thermostats and the
//! device/domain vocabulary shared by outbound commands and inbound status.

use chrono::{Datelike, NaiveDateTime, Timelike};

/// What kind of reply a queued command expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Settings change, no reply expected
    Basic,
    /// Heating setpoint query
    RequestSetpointHeat,
    /// Cooling setpoint query
    RequestSetpointCool,
    /// Full zone status query on behalf of a client
    RequestZoneStatus,
    /// Heating run time query
    RequestRunTimeHeat,
    /// Cooling run time query
    RequestRunTimeCool,
    /// Clock synchronisation broadcast to every thermostat
    DateTimeSync,
}

impl CommandKind {
    /// Check if this command expects a response line
    pub fn expects_response(&self) -> bool {
        !matches!(self, CommandKind::Basic | CommandKind::DateTimeSync)
    }
}

/// One entry of the outbound command queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Command text, upper-cased at transmission
    pub payload: String,
    /// Expected reply
    pub kind: CommandKind,
    /// Index of the owning zone, `None` for bus-wide commands
    pub zone: Option<usize>,
    /// Tick at which the command went out, `None` while unsent
    pub sent_at: Option<u64>,
}

impl CommandRequest {
    /// Create an unsent command
    pub fn new(zone: Option<usize>, payload: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            payload: payload.into(),
            kind,
            zone,
            sent_at: None,
        }
    }

    /// True once transmitted
    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    /// Bytes put on the wire: upper-cased payload plus CR
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.payload.to_ascii_uppercase().into_bytes();
        bytes.push(super::LINE_TERMINATOR);
        bytes
    }
}

/// HVAC operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    /// System off
    Off,
    /// Heating only
    Heat,
    /// Cooling only
    Cool,
    /// Automatic changeover
    Auto,
}

impl HvacMode {
    /// All modes in advertised order
    pub const ALL: [HvacMode; 4] = [HvacMode::Off, HvacMode::Heat, HvacMode::Cool, HvacMode::Auto];

    /// Device code used with the `M=` token
    pub fn code(&self) -> &'static str {
        match self {
            HvacMode::Off => "O",
            HvacMode::Heat => "H",
            HvacMode::Cool => "C",
            HvacMode::Auto => "A",
        }
    }

    /// Name used on the message bus
    pub fn name(&self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::Heat => "heat",
            HvacMode::Cool => "cool",
            HvacMode::Auto => "auto",
        }
    }

    /// Parse a device code
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }

    /// Parse a bus name, case-insensitive
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

/// Fan mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    /// Fan runs with the equipment
    Auto,
    /// Fan runs continuously
    On,
}

impl FanMode {
    /// All fan modes in advertised order
    pub const ALL: [FanMode; 2] = [FanMode::Auto, FanMode::On];

    /// Device code used with the `FM=` token
    pub fn code(&self) -> &'static str {
        match self {
            FanMode::Auto => "0",
            FanMode::On => "1",
        }
    }

    /// Name used on the message bus
    pub fn name(&self) -> &'static str {
        match self {
            FanMode::Auto => "auto",
            FanMode::On => "on",
        }
    }

    /// Parse a device code
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }

    /// Parse a bus name, case-insensitive
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

/// Translate an `M=` code to its bus name, `?` when unknown
pub fn hvac_mode_name(code: &str) -> &'static str {
    HvacMode::from_code(code).map(|m| m.name()).unwrap_or("?")
}

/// Translate an `FM=` code to its bus name, `?` when unknown
pub fn fan_mode_name(code: &str) -> &'static str {
    FanMode::from_code(code).map(|m| m.name()).unwrap_or("?")
}

/// Full status poll (`R=1`)
pub fn poll_status(address: u8) -> String {
    format!("A={} R=1", address)
}

/// Setpoint query (`R=4`)
pub fn request_setpoints(address: u8) -> String {
    format!("A={} R=4", address)
}

/// Run time query by key, `RTH=?` or `RTC=?`
pub fn request_runtime(address: u8, heating: bool) -> String {
    format!("A={} {}=?", address, if heating { "RTH" } else { "RTC" })
}

/// Mode change
pub fn set_hvac_mode(address: u8, mode: HvacMode) -> String {
    format!("A={} M={}", address, mode.code())
}

/// Fan mode change
pub fn set_fan_mode(address: u8, mode: FanMode) -> String {
    format!("A={} FM={}", address, mode.code())
}

/// True for a setpoint the thermostats accept: one or more ASCII digits
pub fn is_setpoint_value(value: &str) -> bool {
    !value.is_empty() && value.len() <= 3 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Setpoint change; either or both setpoints may be given.
///
/// Returns `None` when neither is given or either is not a plain number, so a
/// value can never smuggle extra tokens or lines onto the wire.
pub fn set_setpoints(address: u8, heating: Option<&str>, cooling: Option<&str>) -> Option<String> {
    if heating.is_none() && cooling.is_none() {
        return None;
    }
    if [heating, cooling].into_iter().flatten().any(|v| !is_setpoint_value(v)) {
        return None;
    }
    let mut cmd = format!("A={}", address);
    if let Some(v) = heating {
        cmd.push_str(&format!(" SPH={}", v));
    }
    if let Some(v) = cooling {
        cmd.push_str(&format!(" SPC={}", v));
    }
    Some(cmd)
}

/// Clock sync line; day of week counts Sunday as 1
pub fn date_time_sync(now: NaiveDateTime) -> String {
    format!(
        "TIME={:02}:{:02}:{:02} DATE={:02}/{:02}/{:02} DOW={}",
        now.hour(),
        now.minute(),
        now.second(),
        now.month(),
        now.day(),
        now.year().rem_euclid(100),
        now.weekday().number_from_sunday()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_command_response() {
        assert!(!CommandKind::Basic.expects_response());
        assert!(!CommandKind::DateTimeSync.expects_response());
        assert!(CommandKind::RequestSetpointHeat.expects_response());
        assert!(CommandKind::RequestRunTimeCool.expects_response());
    }

    #[test]
    fn test_payload_uppercased_on_wire() {
        let cmd = CommandRequest::new(Some(0), "a=3 m=h", CommandKind::Basic);
        assert_eq!(cmd.to_bytes(), b"A=3 M=H\r".to_vec());
        assert!(!cmd.is_sent());
    }

    #[test]
    fn test_mode_codes() {
        assert_eq!(hvac_mode_name("O"), "off");
        assert_eq!(hvac_mode_name("H"), "heat");
        assert_eq!(hvac_mode_name("C"), "cool");
        assert_eq!(hvac_mode_name("A"), "auto");
        assert_eq!(hvac_mode_name("X"), "?");
        assert_eq!(hvac_mode_name(""), "?");
    }

    #[test]
    fn test_fan_codes() {
        assert_eq!(fan_mode_name("0"), "auto");
        assert_eq!(fan_mode_name("1"), "on");
        assert_eq!(fan_mode_name("2"), "?");
        assert_eq!(FanMode::from_name("ON"), Some(FanMode::On));
    }

    #[test]
    fn test_command_builders() {
        assert_eq!(poll_status(3), "A=3 R=1");
        assert_eq!(request_setpoints(3), "A=3 R=4");
        assert_eq!(request_runtime(3, true), "A=3 RTH=?");
        assert_eq!(set_hvac_mode(3, HvacMode::Heat), "A=3 M=H");
        assert_eq!(set_fan_mode(3, FanMode::On), "A=3 FM=1");
        assert_eq!(set_setpoints(3, Some("68"), None).as_deref(), Some("A=3 SPH=68"));
        assert_eq!(
            set_setpoints(3, Some("68"), Some("76")).as_deref(),
            Some("A=3 SPH=68 SPC=76")
        );
        assert_eq!(set_setpoints(3, None, None), None);
    }

    #[test]
    fn test_setpoint_values_must_be_numeric() {
        assert!(is_setpoint_value("68"));
        assert!(!is_setpoint_value(""));
        assert!(!is_setpoint_value("68.5"));
        assert!(!is_setpoint_value("-5"));
        assert!(!is_setpoint_value("1000"));
        assert_eq!(set_setpoints(2, Some("68\rA=1 M=O"), None), None);
        assert_eq!(set_setpoints(2, Some("68 R=4"), None), None);
        assert_eq!(set_setpoints(2, Some("68"), Some("7 6")), None);
    }

    #[test]
    fn test_date_time_sync() {
        // 2024-03-21 was a Thursday
        let now = NaiveDate::from_ymd_opt(2024, 3, 21)
            .unwrap()
            .and_hms_opt(14, 5, 2)
            .unwrap();
        assert_eq!(date_time_sync(now), "TIME=14:05:02 DATE=03/21/24 DOW=5");
    }
}
