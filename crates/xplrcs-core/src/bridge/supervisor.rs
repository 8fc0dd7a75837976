//! Serial link supervision
//!
//! Countdown based reconnect loop: zero means the link is healthy, any other
//! value is the number of ticks until the next reopen attempt.

/// Ticks between reopen attempts
pub const RETRY_INTERVAL: u32 = 5;

/// What the engine should do with the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTick {
    /// Link is up, schedule normally
    Up,
    /// Link is down, nothing else this tick
    Waiting,
    /// Countdown expired, try to reopen now
    Reconnect,
}

/// Tracks link health and the retry countdown
#[derive(Debug, Default)]
pub struct LinkSupervisor {
    countdown: u32,
    attempts: u64,
}

impl LinkSupervisor {
    /// A supervisor for a healthy link
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks left before the next reopen attempt
    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// Reopen attempts made since the link last went down
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// The link went away
    pub fn link_lost(&mut self) {
        self.countdown = RETRY_INTERVAL;
        self.attempts = 0;
    }

    /// Advance the countdown by one tick
    pub fn on_tick(&mut self) -> LinkTick {
        if self.countdown == 0 {
            return LinkTick::Up;
        }
        self.countdown -= 1;
        if self.countdown == 0 {
            self.attempts += 1;
            LinkTick::Reconnect
        } else {
            LinkTick::Waiting
        }
    }

    /// The reopen attempt failed, wait another interval
    pub fn reconnect_failed(&mut self) {
        self.countdown = RETRY_INTERVAL;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_link() {
        let mut sup = LinkSupervisor::new();
        assert_eq!(sup.countdown(), 0);
        assert_eq!(sup.on_tick(), LinkTick::Up);
    }

    #[test]
    fn test_reconnect_after_interval() {
        let mut sup = LinkSupervisor::new();
        sup.link_lost();
        let ticks: Vec<LinkTick> = (0..RETRY_INTERVAL).map(|_| sup.on_tick()).collect();
        assert_eq!(ticks[..4], [LinkTick::Waiting; 4]);
        assert_eq!(ticks[4], LinkTick::Reconnect);
        // No failure reported: countdown is zero, link counts as up again
        assert_eq!(sup.countdown(), 0);
    }

    #[test]
    fn test_failed_reconnect_retries() {
        let mut sup = LinkSupervisor::new();
        sup.link_lost();
        for _ in 0..RETRY_INTERVAL {
            sup.on_tick();
        }
        sup.reconnect_failed();
        assert_eq!(sup.countdown(), RETRY_INTERVAL);
        for _ in 0..RETRY_INTERVAL {
            sup.on_tick();
        }
        assert_eq!(sup.attempts(), 2);
    }
}
