//! Anchor Store (§4.2).
//!
//! Caches the last-known mapping between the master clock's network time and
//! local monotonic time, so that a transient shared-clock reader failure or
//! a brief master-clock handover doesn't interrupt playback.

use std::time::{Duration, Instant};

use crate::clock::shared::{ClockError, ClockInfo, ClockSource};

/// Minimum time a newly-observed master clock must persist before the
/// anchor rebases onto it (§4.2 step 3).
pub const REBASE_DEBOUNCE: Duration = Duration::from_secs(5);

/// Errors from anchor maintenance.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AnchorError {
    /// The shared-clock reader failed and no cached anchor exists to fall
    /// back on.
    #[error("no anchor available: {0}")]
    NoAnchor(#[source] ClockError),
}

/// A resolved mapping from master-clock network time to local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    /// Identity of the master clock this anchor was derived from.
    pub clock_id: u64,
    /// Local time corresponding to `network_time`, in ns.
    pub local_time: u64,
    /// Master-clock ("network") time corresponding to `local_time`, in ns.
    pub network_time: i64,
}

/// Health of the anchor returned by [`AnchorStore::current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorStatus {
    /// Derived from a fresh shared-clock read.
    Fresh,
    /// The shared-clock reader failed; this is the last good anchor.
    Stale,
}

/// Maintains a rebase-debounced [`Anchor`] derived from a [`SharedClockReader`].
pub struct AnchorStore {
    cached: Option<(Anchor, Instant)>,
    /// When the cached anchor's clock id was last confirmed to match the
    /// reader's reported clock id.
    last_match_at: Option<Instant>,
}

impl AnchorStore {
    /// Construct an empty store; the first [`AnchorStore::refresh`] call
    /// establishes the initial anchor.
    pub fn new() -> Self {
        Self {
            cached: None,
            last_match_at: None,
        }
    }

    /// Query `reader` and update the cached anchor per the §4.2 algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`AnchorError::NoAnchor`] only when the reader fails and no
    /// anchor has ever been established.
    pub fn refresh(&mut self, reader: &impl ClockSource) -> Result<(Anchor, AnchorStatus), AnchorError> {
        match reader.get_clock_info() {
            Ok(info) => {
                let anchor = self.resolve(info);
                self.cached = Some((anchor, Instant::now()));
                Ok((anchor, AnchorStatus::Fresh))
            }
            Err(err) => match self.cached {
                Some((anchor, _)) => {
                    tracing::warn!(clock_id = anchor.clock_id, error = %err, "shared-clock read failed, serving stale anchor");
                    Ok((anchor, AnchorStatus::Stale))
                }
                None => Err(AnchorError::NoAnchor(err)),
            },
        }
    }

    /// Last anchor computed by [`AnchorStore::refresh`], if any.
    pub fn last(&self) -> Option<Anchor> {
        self.cached.map(|(anchor, _)| anchor)
    }

    fn resolve(&mut self, info: ClockInfo) -> Anchor {
        let fresh = Anchor {
            clock_id: info.clock_id,
            local_time: info.local_time,
            network_time: info.local_time as i64 - info.offset_to_master,
        };

        let now = Instant::now();

        let Some((old, _)) = self.cached else {
            self.last_match_at = Some(now);
            return fresh;
        };

        if info.clock_id == old.clock_id {
            self.last_match_at = Some(now);
            return fresh;
        }

        // A different master clock than the cached anchor: only rebase once
        // REBASE_DEBOUNCE has elapsed since the last time the reader's clock
        // id was confirmed to match the cached anchor. This is measured from
        // that last confirmed match, not from when this candidate clock id
        // first appeared, so a clock that flaps between several ids before
        // settling rebases onto whichever one is current as soon as the
        // debounce window has elapsed, without needing that id to have been
        // stable the whole time.
        let last_match_at = self.last_match_at.unwrap_or(now);
        if now.duration_since(last_match_at) < REBASE_DEBOUNCE {
            return old;
        }

        // Rebase: keep the network timeline continuous across the clock
        // switch instead of jumping to the new clock's raw offset.
        let old_offset = old.local_time as i64 - old.network_time;
        let new_offset = fresh.local_time as i64 - fresh.network_time;
        Anchor {
            clock_id: info.clock_id,
            local_time: info.local_time,
            network_time: old.network_time - old_offset + new_offset,
        }
    }
}

impl Default for AnchorStore {
    fn default() -> Self {
        Self::new()
    }
}
