use std::fmt::Debug;
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired<K> {
    pub kind: K,
    pub due_ns: u64,
}

/// A single cancellable one-shot timer.
///
/// At most one timer is pending. Arming replaces (and thereby cancels) the previous
/// one; firing and cancelling both consume it, so whichever of the two happens first
/// wins and the other becomes a no-op.
#[derive(Debug)]
pub struct TimerSlot<K> {
    pending: Option<TimerFired<K>>,
}

impl<K> Default for TimerSlot<K> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<K: Copy + Debug> TimerSlot<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, kind: K, now_ns: u64, after: Duration) {
        if let Some(stale) = self.pending.take() {
            trace!(kind = ?stale.kind, "replacing pending timer");
        }
        self.pending = Some(TimerFired {
            kind,
            due_ns: now_ns.saturating_add(after.as_nanos() as u64),
        });
    }

    /// Clears the pending timer, returning it if there was one.
    pub fn cancel(&mut self) -> Option<TimerFired<K>> {
        self.pending.take()
    }

    /// Fires the pending timer if its deadline has passed.
    pub fn poll(&mut self, now_ns: u64) -> Option<TimerFired<K>> {
        match &self.pending {
            Some(p) if now_ns >= p.due_ns => self.pending.take(),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.due_ns)
    }

    pub fn remaining(&self, now_ns: u64) -> Option<Duration> {
        self.deadline()
            .map(|due| Duration::from_nanos(due.saturating_sub(now_ns)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    enum Kind {
        Fixation,
        Break,
    }

    #[test]
    fn fires_once_at_deadline() {
        let mut slot = TimerSlot::new();
        slot.arm(Kind::Fixation, 0, Duration::from_millis(500));
        assert_eq!(slot.poll(499_999_999), None);
        let fired = slot.poll(500_000_000).unwrap();
        assert_eq!(fired.kind, Kind::Fixation);
        assert_eq!(slot.poll(600_000_000), None);
    }

    #[test]
    fn arming_replaces_the_previous_timer() {
        let mut slot = TimerSlot::new();
        slot.arm(Kind::Fixation, 0, Duration::from_millis(1));
        slot.arm(Kind::Break, 0, Duration::from_secs(60));
        assert_eq!(slot.poll(1_000_000), None);
        assert_eq!(slot.deadline(), Some(60_000_000_000));
        assert_eq!(slot.cancel().map(|t| t.kind), Some(Kind::Break));
    }

    #[test]
    fn cancel_and_expiry_race_only_once() {
        let mut slot = TimerSlot::new();
        slot.arm(Kind::Break, 0, Duration::from_secs(60));
        assert!(slot.cancel().is_some());
        assert_eq!(slot.poll(u64::MAX), None);
        assert!(slot.cancel().is_none());

        slot.arm(Kind::Break, 0, Duration::from_secs(60));
        assert!(slot.poll(60_000_000_000).is_some());
        assert!(slot.cancel().is_none());
    }

    #[test]
    fn remaining_counts_down() {
        let mut slot = TimerSlot::new();
        slot.arm(Kind::Break, 1_000, Duration::from_secs(60));
        assert_eq!(slot.remaining(1_000), Some(Duration::from_secs(60)));
        assert_eq!(
            slot.remaining(1_000 + 59_000_000_000),
            Some(Duration::from_secs(1))
        );
        slot.cancel();
        assert_eq!(slot.remaining(0), None);
    }
}
