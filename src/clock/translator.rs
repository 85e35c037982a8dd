//! Time Translator (§4.3).
//!
//! Converts between RTP frame counts and local nanosecond timestamps using
//! an [`Anchor`], handling signed wraparound in the frame delta and, in NTP
//! mode, an observed sample-rate ratio instead of the nominal rate.

use crate::clock::anchor::Anchor;

/// Acceptable range for the observed-vs-nominal sample rate ratio in NTP
/// mode; ratios outside this band are rejected as implausible (§4.3).
pub const RATE_RATIO_BOUNDS: (f64, f64) = (0.998, 1.002);

/// How a [`TimeTranslator`] derives its effective sample rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateMode {
    /// AirPlay 2 / PTP: master and local clocks are already disciplined to
    /// the same rate, so the nominal input rate is used directly.
    Nominal,
    /// AirPlay 1 / classic: derive an observed rate from drift measurements,
    /// clamped to [`RATE_RATIO_BOUNDS`] of the nominal rate.
    Observed {
        /// Ratio of observed to nominal sample rate.
        ratio: f64,
    },
}

/// Bidirectional RTP-frame <-> local-nanosecond time conversion anchored to
/// a single `(rtp_time, network_time)` pair.
#[derive(Debug, Clone, Copy)]
pub struct TimeTranslator {
    anchor: Anchor,
    anchor_rtp_time: u32,
    nominal_rate: u32,
    mode: RateMode,
}

impl TimeTranslator {
    /// Build a translator for `anchor`, whose `rtp_time` member is the RTP
    /// timestamp that corresponds to the anchor's local/network time pair.
    pub fn new(anchor: Anchor, anchor_rtp_time: u32, nominal_rate: u32, mode: RateMode) -> Self {
        Self {
            anchor,
            anchor_rtp_time,
            nominal_rate,
            mode,
        }
    }

    /// Clamp an observed sample rate ratio into [`RATE_RATIO_BOUNDS`],
    /// falling back to `1.0` (the nominal rate) when it's implausible.
    pub fn clamp_ratio(ratio: f64) -> f64 {
        let (lo, hi) = RATE_RATIO_BOUNDS;
        if ratio.is_finite() && ratio >= lo && ratio <= hi {
            ratio
        } else {
            1.0
        }
    }

    fn effective_rate(&self) -> f64 {
        match self.mode {
            RateMode::Nominal => self.nominal_rate as f64,
            RateMode::Observed { ratio } => self.nominal_rate as f64 * Self::clamp_ratio(ratio),
        }
    }

    /// Signed frame delta `rtp_time - anchor_rtp_time`, correct across
    /// `u32` wraparound in either direction.
    fn signed_frame_delta(&self, rtp_time: u32) -> i64 {
        rtp_time.wrapping_sub(self.anchor_rtp_time) as i32 as i64
    }

    /// Convert an RTP frame timestamp to local nanoseconds.
    pub fn frame_to_local_time(&self, rtp_time: u32) -> i64 {
        let delta_frames = self.signed_frame_delta(rtp_time);
        let delta_ns = (delta_frames as f64 * 1_000_000_000.0 / self.effective_rate()) as i64;
        self.anchor.local_time as i64 + delta_ns
    }

    /// Convert a local nanosecond timestamp to the nearest RTP frame.
    pub fn local_time_to_frame(&self, local_time: i64) -> u32 {
        let delta_ns = local_time - self.anchor.local_time as i64;
        let delta_frames =
            (delta_ns as f64 * self.effective_rate() / 1_000_000_000.0).round() as i64;
        self.anchor_rtp_time.wrapping_add(delta_frames as i32 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> Anchor {
        Anchor {
            clock_id: 1,
            local_time: 1_000_000_000,
            network_time: 1_000_000_000,
        }
    }

    #[test]
    fn round_trips_through_frame_and_back_in_nominal_mode() {
        let t = TimeTranslator::new(anchor(), 1_000, 44_100, RateMode::Nominal);
        let local = t.frame_to_local_time(45_100);
        let back = t.local_time_to_frame(local);
        assert_eq!(back, 45_100);
    }

    #[test]
    fn handles_frame_before_anchor() {
        let t = TimeTranslator::new(anchor(), 10_000, 44_100, RateMode::Nominal);
        let local = t.frame_to_local_time(5_000);
        assert!(local < anchor().local_time as i64);
    }

    #[test]
    fn handles_rtp_wraparound_forward() {
        let t = TimeTranslator::new(anchor(), u32::MAX - 10, 44_100, RateMode::Nominal);
        let local = t.frame_to_local_time(10);
        // 21 frames forward across the wrap, not ~4 billion frames backward.
        let expected_delta_ns = (21.0 * 1_000_000_000.0 / 44_100.0) as i64;
        assert_eq!(local, anchor().local_time as i64 + expected_delta_ns);
    }

    #[test]
    fn observed_ratio_outside_bounds_falls_back_to_nominal() {
        let t = TimeTranslator::new(
            anchor(),
            0,
            44_100,
            RateMode::Observed { ratio: 1.5 },
        );
        let nominal = TimeTranslator::new(anchor(), 0, 44_100, RateMode::Nominal);
        assert_eq!(t.frame_to_local_time(44_100), nominal.frame_to_local_time(44_100));
    }

    #[test]
    fn observed_ratio_within_bounds_changes_mapping() {
        let t = TimeTranslator::new(
            anchor(),
            0,
            44_100,
            RateMode::Observed { ratio: 1.001 },
        );
        let nominal = TimeTranslator::new(anchor(), 0, 44_100, RateMode::Nominal);
        assert_ne!(t.frame_to_local_time(44_100), nominal.frame_to_local_time(44_100));
    }
}
