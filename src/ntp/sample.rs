//! Timing samples and the fixed-size dispersion-aged history that backs the
//! NTP-style drift estimator (§4.4).

use std::time::Duration;

/// One four-timestamp NTP-style exchange with a peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSample {
    /// Local send time, in ns.
    pub t1: i64,
    /// Peer receive time, in ns (peer's clock).
    pub t2: i64,
    /// Peer transmit time, in ns (peer's clock).
    pub t3: i64,
    /// Local receive time, in ns.
    pub t4: i64,
    /// Estimated clock offset (peer - local), in ns.
    pub offset: i64,
    /// Round-trip delay, in ns.
    pub delay: i64,
    /// Dispersion: accumulated uncertainty, grows each time the sample ages
    /// without being refreshed, and whenever delay is large.
    pub dispersion: f64,
    /// Position of this exchange in the peer's request sequence, used to
    /// gate drift fitting until the exchange has settled (§4.4).
    pub sequence_number: u64,
}

impl TimingSample {
    /// Derive a sample from four raw timestamps and its request sequence
    /// number.
    pub fn from_exchange(t1: i64, t2: i64, t3: i64, t4: i64, sequence_number: u64) -> Self {
        let offset = ((t2 - t1) + (t3 - t4)) / 2;
        let delay = (t4 - t1) - (t3 - t2);
        Self {
            t1,
            t2,
            t3,
            t4,
            offset,
            delay,
            dispersion: delay.max(0) as f64,
            sequence_number,
        }
    }
}

/// Factor applied to a sample's dispersion for each insertion that displaces
/// it further back in the history (§4.4: `D^(1/H)` aging, `D≈10`).
pub const DISPERSION_AGING_BASE: f64 = 10.0;

/// Fixed-size power-of-two ring of [`TimingSample`]s with dispersion aging.
///
/// Capacity must be a power of two so the write cursor can wrap with a
/// bitmask instead of a modulo.
pub struct TimingHistory {
    samples: Vec<Option<TimingSample>>,
    mask: usize,
    next: usize,
    len: usize,
}

impl TimingHistory {
    /// Construct a history with room for `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or not a power of two.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0 && capacity.is_power_of_two());
        Self {
            samples: vec![None; capacity],
            mask: capacity - 1,
            next: 0,
            len: 0,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no samples have been inserted yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a new sample, ageing every existing sample's dispersion by
    /// [`DISPERSION_AGING_BASE`]`^(1/capacity)` first.
    pub fn insert(&mut self, sample: TimingSample) {
        let capacity = self.samples.len();
        let aging = DISPERSION_AGING_BASE.powf(1.0 / capacity as f64);
        for slot in self.samples.iter_mut().flatten() {
            slot.dispersion *= aging;
        }

        self.samples[self.next] = Some(sample);
        self.next = (self.next + 1) & self.mask;
        self.len = (self.len + 1).min(capacity);
    }

    /// Iterate over occupied samples in insertion order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &TimingSample> {
        self.samples.iter().filter_map(|slot| slot.as_ref())
    }

    /// The "chosen" subset used for drift estimation: the sample(s) with
    /// minimum dispersion (§4.4).
    pub fn min_dispersion(&self) -> Option<&TimingSample> {
        self.iter()
            .min_by(|a, b| a.dispersion.partial_cmp(&b.dispersion).unwrap())
    }

    /// True once the oldest surviving sample is older than `max_age`
    /// relative to `now` (local clock, ns) — used to decide the sample is
    /// too stale to contribute to drift estimation.
    pub fn oldest_is_stale(&self, now: i64, max_age: Duration) -> bool {
        self.iter()
            .map(|s| s.t4)
            .min()
            .is_some_and(|oldest| now - oldest > max_age.as_nanos() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_and_delay_match_classic_ntp_formula() {
        let s = TimingSample::from_exchange(0, 100, 110, 200, 0);
        assert_eq!(s.offset, 5);
        assert_eq!(s.delay, 190);
    }

    #[test]
    fn insert_ages_existing_samples() {
        let mut h = TimingHistory::new(4);
        h.insert(TimingSample::from_exchange(0, 10, 10, 0, 0));
        let before = h.iter().next().unwrap().dispersion;
        h.insert(TimingSample::from_exchange(0, 10, 10, 0, 1));
        let after = h.iter().next().unwrap().dispersion;
        assert!(after > before);
    }

    #[test]
    fn wraps_after_capacity_insertions() {
        let mut h = TimingHistory::new(2);
        h.insert(TimingSample::from_exchange(0, 1, 1, 0, 0));
        h.insert(TimingSample::from_exchange(0, 2, 2, 0, 1));
        h.insert(TimingSample::from_exchange(0, 3, 3, 0, 2));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn min_dispersion_picks_lowest_delay_sample() {
        let mut h = TimingHistory::new(4);
        let noisy = TimingSample::from_exchange(0, 10, 10, 1_000, 0);
        let clean = TimingSample::from_exchange(0, 10, 10, 20, 1);
        assert!(clean.dispersion < noisy.dispersion);
        h.insert(noisy);
        h.insert(clean);
        let chosen = h.min_dispersion().unwrap();
        assert_eq!(chosen.delay, clean.delay);
    }
}
