//! Outbound command queue
//!
//! Strict FIFO with a single in-flight slot: only the head is ever
//! transmitted, and a transmitted head stays in place until its reply has been
//! consumed (or it is abandoned).

use std::collections::VecDeque;

use crate::protocol::{CommandKind, CommandRequest};

/// Ordered queue of commands not yet completed
#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: VecDeque<CommandRequest>,
}

impl CommandQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command at the tail
    pub fn enqueue(&mut self, zone: Option<usize>, payload: impl Into<String>, kind: CommandKind) {
        self.entries
            .push_back(CommandRequest::new(zone, payload, kind));
    }

    /// Number of queued commands, including one in flight
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The transmitted command awaiting its reply
    pub fn in_flight(&self) -> Option<&CommandRequest> {
        self.entries.front().filter(|c| c.is_sent())
    }

    /// The head, if it has not been transmitted yet
    pub fn ready_to_send(&self) -> Option<&CommandRequest> {
        self.entries.front().filter(|c| !c.is_sent())
    }

    /// Mark the head as transmitted at `tick`.
    ///
    /// Commands that expect no reply are removed right away and returned.
    pub fn mark_sent(&mut self, tick: u64) -> Option<CommandRequest> {
        let head = self.entries.front_mut()?;
        head.sent_at = Some(tick);
        if head.kind.expects_response() {
            None
        } else {
            self.entries.pop_front()
        }
    }

    /// Remove and return the in-flight command
    pub fn complete(&mut self) -> Option<CommandRequest> {
        self.in_flight()?;
        self.entries.pop_front()
    }

    /// Remove the in-flight command if it was sent more than `timeout` ticks
    /// before `now`
    pub fn expire(&mut self, now: u64, timeout: u64) -> Option<CommandRequest> {
        let sent_at = self.in_flight()?.sent_at?;
        if now.saturating_sub(sent_at) > timeout {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Iterate over queued commands, head first
    pub fn iter(&self) -> impl Iterator<Item = &CommandRequest> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_single_in_flight() {
        let mut q = CommandQueue::new();
        q.enqueue(Some(0), "A=1 R=4", CommandKind::RequestSetpointHeat);
        q.enqueue(Some(1), "A=2 R=4", CommandKind::RequestSetpointCool);

        assert!(q.in_flight().is_none());
        assert_eq!(q.ready_to_send().map(|c| c.payload.as_str()), Some("A=1 R=4"));

        assert!(q.mark_sent(1).is_none());
        assert_eq!(q.in_flight().map(|c| c.zone), Some(Some(0)));
        // Head is in flight, nothing else may go out
        assert!(q.ready_to_send().is_none());

        let done = q.complete().unwrap();
        assert_eq!(done.payload, "A=1 R=4");
        assert_eq!(q.ready_to_send().map(|c| c.payload.as_str()), Some("A=2 R=4"));
    }

    #[test]
    fn test_fire_and_forget_removed_on_send() {
        let mut q = CommandQueue::new();
        q.enqueue(Some(0), "A=1 M=H", CommandKind::Basic);
        let sent = q.mark_sent(3).unwrap();
        assert_eq!(sent.kind, CommandKind::Basic);
        assert!(q.is_empty());
    }

    #[test]
    fn test_complete_requires_in_flight() {
        let mut q = CommandQueue::new();
        q.enqueue(Some(0), "A=1 R=1", CommandKind::RequestZoneStatus);
        assert!(q.complete().is_none());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_expire() {
        let mut q = CommandQueue::new();
        q.enqueue(Some(0), "A=1 R=1", CommandKind::RequestZoneStatus);
        q.mark_sent(10);
        assert!(q.expire(15, 5).is_none());
        assert!(q.expire(16, 5).is_some());
        assert!(q.is_empty());
    }
}
