//! Retransmit (NACK) tracking for the classic audio receiver (§4.7).
//!
//! Tracks gaps in the received sequence-number stream and decides when to
//! ask the source to resend them, backing off between repeat requests for
//! the same gap so a slow/lossy link doesn't get flooded.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// How long to wait before re-requesting a gap that's still missing.
pub const RESEND_BACKOFF: Duration = Duration::from_millis(300);

/// One contiguous run of missing sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    /// First missing sequence number.
    pub start: u16,
    /// Number of consecutive missing packets.
    pub count: u16,
}

/// Tracks outstanding gaps and when each was last requested.
#[derive(Default)]
pub struct ResendTracker {
    last_requested: BTreeMap<u16, Instant>,
}

impl ResendTracker {
    /// Construct an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Given the last contiguous sequence number received (`last_seq`) and a
    /// newly-arrived `seq`, compute the gap between them, if any.
    pub fn gap_before(&self, last_seq: u16, seq: u16) -> Option<Gap> {
        let delta = seq.wrapping_sub(last_seq);
        if delta > 1 && delta < u16::MAX / 2 {
            Some(Gap {
                start: last_seq.wrapping_add(1),
                count: delta - 1,
            })
        } else {
            None
        }
    }

    /// Whether `gap` should be (re)requested right now, given `now`.
    pub fn should_request(&mut self, gap: Gap, now: Instant) -> bool {
        match self.last_requested.get(&gap.start) {
            Some(last) if now.duration_since(*last) < RESEND_BACKOFF => false,
            _ => {
                tracing::debug!(start = gap.start, count = gap.count, "requesting resend for gap");
                self.last_requested.insert(gap.start, now);
                true
            }
        }
    }

    /// Stop tracking a gap once it has been filled.
    pub fn resolve(&mut self, start: u16) {
        self.last_requested.remove(&start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_gap_for_consecutive_sequence() {
        let tracker = ResendTracker::new();
        assert!(tracker.gap_before(10, 11).is_none());
    }

    #[test]
    fn gap_detected_for_skipped_sequence() {
        let tracker = ResendTracker::new();
        let gap = tracker.gap_before(10, 14).unwrap();
        assert_eq!(gap, Gap { start: 11, count: 3 });
    }

    #[test]
    fn gap_detection_handles_sequence_wraparound() {
        let tracker = ResendTracker::new();
        let gap = tracker.gap_before(u16::MAX, 2).unwrap();
        assert_eq!(gap, Gap { start: 0, count: 2 });
    }

    #[test]
    fn repeat_request_within_backoff_window_is_suppressed() {
        let mut tracker = ResendTracker::new();
        let gap = Gap { start: 5, count: 2 };
        let t0 = Instant::now();
        assert!(tracker.should_request(gap, t0));
        assert!(!tracker.should_request(gap, t0 + Duration::from_millis(50)));
        assert!(tracker.should_request(gap, t0 + RESEND_BACKOFF + Duration::from_millis(1)));
    }

    #[test]
    fn resolve_clears_backoff_state() {
        let mut tracker = ResendTracker::new();
        let gap = Gap { start: 5, count: 2 };
        let t0 = Instant::now();
        tracker.should_request(gap, t0);
        tracker.resolve(5);
        assert!(tracker.should_request(gap, t0 + Duration::from_millis(1)));
    }
}
