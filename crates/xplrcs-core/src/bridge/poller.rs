//! Round-robin zone poller

/// A poll on the wire awaiting its reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPoll {
    /// Index of the polled zone
    pub zone: usize,
    /// Tick the poll went out
    pub sent_at: u64,
}

/// Cycles over the configured zones, one poll per interval
#[derive(Debug)]
pub struct ZonePoller {
    interval: u32,
    counter: u32,
    cursor: Option<usize>,
    pending: Option<PendingPoll>,
}

impl ZonePoller {
    /// Create a poller that polls every `interval` ticks
    pub fn new(interval: u32) -> Self {
        Self {
            interval,
            counter: 0,
            cursor: None,
            pending: None,
        }
    }

    /// Count one tick
    pub fn count_tick(&mut self) {
        self.counter = self.counter.saturating_add(1);
    }

    /// True once the poll interval has elapsed
    pub fn is_due(&self) -> bool {
        self.counter >= self.interval
    }

    /// Advance to the next of `zone_count` zones, wrapping after the last,
    /// and restart the interval
    pub fn advance(&mut self, zone_count: usize) -> Option<usize> {
        if zone_count == 0 {
            return None;
        }
        let next = match self.cursor {
            Some(i) if i + 1 < zone_count => i + 1,
            _ => 0,
        };
        self.cursor = Some(next);
        self.counter = 0;
        Some(next)
    }

    /// Record a poll sent to `zone`; returns a previous poll that never got
    /// its reply
    pub fn start(&mut self, zone: usize, tick: u64) -> Option<PendingPoll> {
        self.pending.replace(PendingPoll {
            zone,
            sent_at: tick,
        })
    }

    /// The poll awaiting a reply
    pub fn pending(&self) -> Option<PendingPoll> {
        self.pending
    }

    /// Forget the pending poll
    pub fn clear(&mut self) -> Option<PendingPoll> {
        self.pending.take()
    }

    /// Forget the pending poll if it is older than `timeout` ticks
    pub fn expire(&mut self, now: u64, timeout: u64) -> Option<PendingPoll> {
        match self.pending {
            Some(p) if now.saturating_sub(p.sent_at) > timeout => self.pending.take(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_wraps() {
        let mut poller = ZonePoller::new(2);
        let order: Vec<usize> = (0..7).filter_map(|_| poller.advance(3)).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_no_zones() {
        let mut poller = ZonePoller::new(2);
        assert_eq!(poller.advance(0), None);
    }

    #[test]
    fn test_interval() {
        let mut poller = ZonePoller::new(3);
        poller.count_tick();
        poller.count_tick();
        assert!(!poller.is_due());
        poller.count_tick();
        assert!(poller.is_due());
        poller.advance(1);
        assert!(!poller.is_due());
    }

    #[test]
    fn test_start_supersedes() {
        let mut poller = ZonePoller::new(2);
        assert!(poller.start(0, 1).is_none());
        let missed = poller.start(1, 3).unwrap();
        assert_eq!(missed.zone, 0);
        assert_eq!(poller.pending().map(|p| p.zone), Some(1));
    }

    #[test]
    fn test_expire() {
        let mut poller = ZonePoller::new(2);
        poller.start(0, 10);
        assert!(poller.expire(12, 2).is_none());
        assert!(poller.expire(13, 2).is_some());
        assert!(poller.pending().is_none());
    }
}
