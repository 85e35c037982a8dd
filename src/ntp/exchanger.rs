//! NTP-style ping exchanger (§4.4): drives the timing-request cadence for a
//! classic (AirPlay 1) session, accumulates samples, and fits a drift model.

use std::time::Duration;

use crate::ntp::drift_store::DriftModel;
use crate::ntp::sample::{TimingHistory, TimingSample};
use crate::transport::packet::{PacketError, TimingReply, TimingRequest};

/// Errors handling an inbound wire-level timing reply.
#[derive(Debug, thiserror::Error)]
pub enum TimingExchangeError {
    /// The datagram could not be parsed as a [`TimingReply`].
    #[error("malformed timing reply: {0}")]
    Packet(#[from] PacketError),
}

/// Interval between the first few timing requests after a session starts,
/// used to converge quickly before settling into steady state (§4.4).
pub const FAST_CADENCE: Duration = Duration::from_millis(300);

/// Number of fast-cadence requests sent before switching to [`SLOW_CADENCE`].
pub const FAST_CADENCE_COUNT: u32 = 6;

/// Steady-state interval between timing requests once the fast burst ends.
pub const SLOW_CADENCE: Duration = Duration::from_secs(3);

/// Default history capacity; must stay a power of two (§4.4).
pub const DEFAULT_HISTORY_CAPACITY: usize = 16;

/// A sample's sequence number must exceed this before it may contribute to
/// a drift fit (§4.4: `settling_time / 3`, `settling_time` = 60s, one
/// request roughly every 3s in steady state).
pub const SETTLING_SEQUENCE_THRESHOLD: u64 = 20;

/// Minimum number of settled, low-dispersion samples required before
/// [`NtpExchanger::fit_drift`] will produce a model (§4.4).
pub const MINIMUM_CHOSEN_SAMPLES: usize = 8;

/// Drives the request cadence and answers "is it time to send another
/// timing request" without owning the socket itself.
#[derive(Debug, Clone, Copy)]
pub struct CadenceScheduler {
    sent: u32,
}

impl CadenceScheduler {
    /// A scheduler that hasn't sent any requests yet.
    pub fn new() -> Self {
        Self { sent: 0 }
    }

    /// Interval to wait before the *next* request, given `sent` requests
    /// have been sent so far.
    pub fn next_interval(&self) -> Duration {
        if self.sent < FAST_CADENCE_COUNT {
            FAST_CADENCE
        } else {
            SLOW_CADENCE
        }
    }

    /// Record that a request was just sent.
    pub fn record_sent(&mut self) {
        self.sent += 1;
    }
}

impl Default for CadenceScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates [`TimingSample`]s for one peer and fits a linear drift model.
pub struct NtpExchanger {
    history: TimingHistory,
    scheduler: CadenceScheduler,
    next_sequence: u64,
}

impl NtpExchanger {
    /// Construct an exchanger with the default history capacity.
    pub fn new() -> Self {
        Self {
            history: TimingHistory::new(DEFAULT_HISTORY_CAPACITY),
            scheduler: CadenceScheduler::new(),
            next_sequence: 0,
        }
    }

    /// Cadence scheduler for this exchanger.
    pub fn scheduler(&mut self) -> &mut CadenceScheduler {
        &mut self.scheduler
    }

    /// Record a completed four-timestamp exchange, tagging it with this
    /// exchanger's own request sequence number.
    pub fn record(&mut self, t1: i64, t2: i64, t3: i64, t4: i64) {
        let sequence_number = self.next_sequence;
        self.next_sequence += 1;
        self.history
            .insert(TimingSample::from_exchange(t1, t2, t3, t4, sequence_number));
    }

    /// Build the next outbound timing request (§4.4), stamped with `origin`
    /// (the local send time, ns) and this exchanger's own request sequence
    /// number so the eventual reply can be matched back to it.
    pub fn build_request(&mut self, origin_ns: i64) -> TimingRequest {
        let sequence = (self.next_sequence & 0xffff) as u16;
        self.next_sequence += 1;
        TimingRequest {
            sequence,
            origin: origin_ns as u64,
        }
    }

    /// Parse an inbound timing-reply datagram and fold it into the history
    /// as a completed four-timestamp exchange: `t1` is the request's echoed
    /// `origin`, `t2`/`t3` are the reply's NTP-style receive/transmit
    /// times, and `t4` is `now_ns` (§4.4).
    pub fn handle_reply(&mut self, datagram: &[u8], now_ns: i64) -> Result<(), TimingExchangeError> {
        let reply = TimingReply::decode(datagram)?;
        self.history.insert(TimingSample::from_exchange(
            reply.origin as i64,
            reply.receive_ns(),
            reply.transmit_ns(),
            now_ns,
            reply.sequence as u64,
        ));
        Ok(())
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<&TimingSample> {
        self.history.iter().last()
    }

    /// Fit a [`DriftModel`] via least squares over the "chosen" subset:
    /// samples that have settled past [`SETTLING_SEQUENCE_THRESHOLD`] and
    /// whose dispersion is within a constant factor of the minimum (§4.4).
    /// Requires at least [`MINIMUM_CHOSEN_SAMPLES`] such samples.
    pub fn fit_drift(&self) -> Option<DriftModel> {
        let min_dispersion = self
            .history
            .iter()
            .filter(|s| s.sequence_number > SETTLING_SEQUENCE_THRESHOLD)
            .map(|s| s.dispersion)
            .fold(f64::INFINITY, f64::min);

        // Within 2x the best settled sample's dispersion, same selection
        // rule as the reference "chosen" set.
        let chosen: Vec<&TimingSample> = self
            .history
            .iter()
            .filter(|s| s.sequence_number > SETTLING_SEQUENCE_THRESHOLD)
            .filter(|s| s.dispersion <= min_dispersion * 2.0 + f64::EPSILON)
            .collect();

        if chosen.len() < MINIMUM_CHOSEN_SAMPLES {
            return None;
        }

        let epoch = chosen.iter().map(|s| s.t1).min()?;
        let xs: Vec<f64> = chosen.iter().map(|s| (s.t1 - epoch) as f64).collect();
        let ys: Vec<f64> = chosen.iter().map(|s| s.offset as f64).collect();

        let n = xs.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;

        let mut num = 0.0;
        let mut den = 0.0;
        for (x, y) in xs.iter().zip(ys.iter()) {
            num += (x - mean_x) * (y - mean_y);
            den += (x - mean_x) * (x - mean_x);
        }

        let gradient = if den.abs() > f64::EPSILON { num / den } else { 0.0 };
        let intercept = mean_y - gradient * mean_x;

        Some(DriftModel {
            gradient,
            intercept,
            epoch,
        })
    }
}

impl Default for NtpExchanger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_switches_from_fast_to_slow_after_count() {
        let mut s = CadenceScheduler::new();
        for _ in 0..FAST_CADENCE_COUNT {
            assert_eq!(s.next_interval(), FAST_CADENCE);
            s.record_sent();
        }
        assert_eq!(s.next_interval(), SLOW_CADENCE);
    }

    #[test]
    fn build_request_and_handle_reply_round_trip_over_the_wire() {
        let mut ex = NtpExchanger::new();
        let request = ex.build_request(1_000);
        assert_eq!(request.sequence, 0);

        // Stand in for the source: echo `origin` back, fill in its own
        // receive/transmit NTP-style timestamps.
        let reply = TimingReply {
            sequence: request.sequence,
            origin: request.origin,
            receive: (1, 0),
            transmit: (1, 0),
        };
        let datagram = reply.encode();

        ex.handle_reply(&datagram, 2_000).unwrap();
        let sample = ex.latest().unwrap();
        assert_eq!(sample.t1, 1_000);
        assert_eq!(sample.t2, 1_000_000_000);
        assert_eq!(sample.t4, 2_000);
        assert_eq!(sample.sequence_number, 0);
    }

    #[test]
    fn handle_reply_rejects_malformed_datagrams() {
        let mut ex = NtpExchanger::new();
        assert!(ex.handle_reply(&[0u8; 4], 0).is_err());
    }

    #[test]
    fn fit_drift_requires_settled_samples_past_threshold() {
        let mut ex = NtpExchanger::new();
        assert!(ex.fit_drift().is_none());
        // Fewer than SETTLING_SEQUENCE_THRESHOLD exchanges: none has settled.
        for _ in 0..10 {
            ex.record(0, 100, 110, 200);
        }
        assert!(ex.fit_drift().is_none());
    }

    #[test]
    fn fit_drift_requires_minimum_chosen_samples_once_settled() {
        let mut ex = NtpExchanger::new();
        // Settles past the threshold (sequence numbers 0..24) but only 3
        // samples end up with sequence_number > SETTLING_SEQUENCE_THRESHOLD.
        for i in 0..24 {
            let t1 = i * 1_000_000_000;
            ex.record(t1, t1 + 50, t1 + 50, t1);
        }
        assert!(ex.fit_drift().is_none());
    }

    #[test]
    fn fit_drift_recovers_constant_offset_with_no_drift() {
        let mut ex = NtpExchanger::new();
        // Constant 50ns offset, growing t1 each time, zero delay noise.
        // 29 exchanges so the surviving 16-entry ring still has at least
        // MINIMUM_CHOSEN_SAMPLES past SETTLING_SEQUENCE_THRESHOLD.
        for i in 0..29 {
            let t1 = i * 1_000_000_000;
            ex.record(t1, t1 + 50, t1 + 50, t1);
        }
        let model = ex.fit_drift().unwrap();
        assert!(model.gradient.abs() < 1e-6, "gradient: {}", model.gradient);
        assert!((model.intercept - 50.0).abs() < 1e-6);
    }

    #[test]
    fn fit_drift_recovers_linear_drift() {
        let mut ex = NtpExchanger::new();
        // offset grows by 1ns per second of elapsed local time.
        for i in 0..29i64 {
            let t1 = i * 1_000_000_000;
            let offset = i; // ns
            let half_rtt = 5;
            ex.record(t1, t1 + offset + half_rtt, t1 + offset + half_rtt, t1);
        }
        let model = ex.fit_drift().unwrap();
        assert!((model.gradient - 1e-9).abs() < 1e-10, "gradient: {}", model.gradient);
    }
}
