//! PipeWire/PulseAudio-style audio output back end (§4.11 variant B).
//!
//! Reports delay via a torn-write-protected double-buffered timing record
//! instead of a mutex, the same protocol the PTP shared-clock reader uses
//! (§4.1): the realtime thread writes `timing_1` then `timing_2` with a
//! fence between, and `delay()` reads both and retries until they agree.

use std::sync::atomic::{fence, AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::audio::backend::{AudioBackend, OutputError};

const MAX_READ_ATTEMPTS: u32 = 10;

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// One snapshot of the realtime thread's notion of queued/buffered frames,
/// mirroring the fields a PipeWire stream's `pw_time` reports.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct TimingData {
    /// Frames handed to the device as of this snapshot.
    frames: i64,
    /// Local time this snapshot was taken, ns.
    now: i64,
    /// Device-reported delay, ns.
    delay_ns: i64,
    /// Device-reported buffered (not yet rendered) amount, ns.
    buffered_ns: i64,
    /// Whether the device had a valid time record at snapshot time.
    valid: bool,
}

/// Lock-free double-buffered copy of a [`TimingData`] snapshot, following
/// the same main/secondary-plus-fence protocol as the PTP shared-clock
/// reader (`crate::clock::shared::SharedClockReader::read_consistent`):
/// the writer stores `primary` then `secondary` with a release fence
/// between, the reader loads `primary` then `secondary` with acquire fences
/// between and retries until the two copies agree. Each `TimingData` field
/// gets its own atomic so a single snapshot publishes without a lock.
struct TimingSlot {
    primary: [AtomicI64; 4],
    primary_valid: AtomicBool,
    secondary: [AtomicI64; 4],
    secondary_valid: AtomicBool,
}

/// Field order within [`TimingSlot::primary`]/[`TimingSlot::secondary`].
const FIELD_FRAMES: usize = 0;
const FIELD_NOW: usize = 1;
const FIELD_DELAY_NS: usize = 2;
const FIELD_BUFFERED_NS: usize = 3;

impl TimingSlot {
    fn new() -> Self {
        Self {
            primary: [const { AtomicI64::new(0) }; 4],
            primary_valid: AtomicBool::new(false),
            secondary: [const { AtomicI64::new(0) }; 4],
            secondary_valid: AtomicBool::new(false),
        }
    }

    fn write(&self, data: TimingData) {
        Self::store_into(&self.primary, &self.primary_valid, data);
        fence(Ordering::Release);
        Self::store_into(&self.secondary, &self.secondary_valid, data);
        fence(Ordering::Release);
    }

    fn store_into(fields: &[AtomicI64; 4], valid: &AtomicBool, data: TimingData) {
        fields[FIELD_FRAMES].store(data.frames, Ordering::Relaxed);
        fields[FIELD_NOW].store(data.now, Ordering::Relaxed);
        fields[FIELD_DELAY_NS].store(data.delay_ns, Ordering::Relaxed);
        fields[FIELD_BUFFERED_NS].store(data.buffered_ns, Ordering::Relaxed);
        valid.store(data.valid, Ordering::Relaxed);
    }

    fn load_from(fields: &[AtomicI64; 4], valid: &AtomicBool) -> TimingData {
        TimingData {
            frames: fields[FIELD_FRAMES].load(Ordering::Relaxed),
            now: fields[FIELD_NOW].load(Ordering::Relaxed),
            delay_ns: fields[FIELD_DELAY_NS].load(Ordering::Relaxed),
            buffered_ns: fields[FIELD_BUFFERED_NS].load(Ordering::Relaxed),
            valid: valid.load(Ordering::Relaxed),
        }
    }

    fn read_consistent(&self) -> Option<TimingData> {
        for attempt in 0..MAX_READ_ATTEMPTS {
            let first = Self::load_from(&self.primary, &self.primary_valid);
            fence(Ordering::Acquire);
            let second = Self::load_from(&self.secondary, &self.secondary_valid);
            fence(Ordering::Acquire);
            if first == second {
                return Some(first);
            }
            if attempt + 1 < MAX_READ_ATTEMPTS {
                std::thread::yield_now();
            }
        }
        None
    }
}

/// Output back end whose delay reporting follows the torn-write-protected
/// double-buffer pattern of a PipeWire-backed stream.
pub struct TimedBackend {
    timing: TimingSlot,
    buffer: RwLock<Vec<i16>>,
    capacity_frames: usize,
    running: AtomicBool,
    frames_played: AtomicUsize,
    volume: Mutex<f32>,
    muted: AtomicBool,
}

impl TimedBackend {
    /// Construct a back end with room for `capacity_frames` stereo frames.
    pub fn new(capacity_frames: usize) -> Self {
        Self {
            timing: TimingSlot::new(),
            buffer: RwLock::new(Vec::with_capacity(capacity_frames * 2)),
            capacity_frames,
            running: AtomicBool::new(false),
            frames_played: AtomicUsize::new(0),
            volume: Mutex::new(1.0),
            muted: AtomicBool::new(false),
        }
    }

    /// Simulate the realtime thread's periodic timing snapshot; in a real
    /// PipeWire back end this is invoked from the stream's `process`
    /// callback rather than by the caller.
    pub fn publish_timing_snapshot(&self) {
        let queued_frames = self.buffer.read().unwrap().len() / 2;
        self.timing.write(TimingData {
            frames: self.frames_played.load(Ordering::Acquire) as i64,
            now: now_ns(),
            delay_ns: 0,
            buffered_ns: (queued_frames as i64 * 1_000_000_000) / 44_100,
            valid: true,
        });
    }
}

impl AudioBackend for TimedBackend {
    fn init(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), OutputError> {
        self.buffer.write().unwrap().clear();
        Ok(())
    }

    fn start(&mut self) -> Result<(), OutputError> {
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), OutputError> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }

    fn play(&mut self, frames: &[i16]) -> Result<usize, OutputError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(OutputError::NotRunning);
        }
        let mut buffer = self.buffer.write().unwrap();
        let free_samples = (self.capacity_frames * 2).saturating_sub(buffer.len());
        let to_write = frames.len().min(free_samples);
        buffer.extend_from_slice(&frames[..to_write]);
        drop(buffer);

        self.frames_played
            .fetch_add(to_write / 2, Ordering::AcqRel);
        self.publish_timing_snapshot();
        Ok(to_write / 2)
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        self.buffer.write().unwrap().clear();
        self.publish_timing_snapshot();
        Ok(())
    }

    fn delay(&self) -> Result<i64, OutputError> {
        let timing = self
            .timing
            .read_consistent()
            .ok_or_else(|| OutputError::Device("timing snapshot unavailable".into()))?;

        if !timing.valid {
            return Ok(0);
        }

        let elapsed_ns = now_ns() - timing.now;
        let total_delay_ns = timing.delay_ns + timing.buffered_ns + elapsed_ns;
        Ok((total_delay_ns * 44_100) / 1_000_000_000 + timing.frames)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), OutputError> {
        *self.volume.lock().unwrap() = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) -> Result<(), OutputError> {
        self.muted.store(muted, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_before_start_is_rejected() {
        let mut backend = TimedBackend::new(1024);
        assert!(matches!(
            backend.play(&[0; 4]),
            Err(OutputError::NotRunning)
        ));
    }

    #[test]
    fn play_then_delay_reports_queued_frames() {
        let mut backend = TimedBackend::new(1024);
        backend.start().unwrap();
        backend.play(&[0; 8]).unwrap(); // 4 frames
        let delay = backend.delay().unwrap();
        assert!(delay >= 4);
    }

    #[test]
    fn flush_resets_queued_frames() {
        let mut backend = TimedBackend::new(1024);
        backend.start().unwrap();
        backend.play(&[0; 8]).unwrap();
        backend.flush().unwrap();
        let delay = backend.delay().unwrap();
        assert!(delay < 4);
    }

    #[test]
    fn set_volume_clamps_to_unit_range() {
        let mut backend = TimedBackend::new(1024);
        backend.set_volume(2.0).unwrap();
        assert_eq!(*backend.volume.lock().unwrap(), 1.0);
    }
}
