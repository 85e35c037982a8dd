//! Classic-ring (JACK-style) audio output back end (§4.11 variant A).
//!
//! A lock-free SPSC ring buffer feeds a realtime audio callback; the
//! producer (this struct's `play`) never touches the callback's read
//! cursor, and flush is a flag the *callback* consumes on its own thread,
//! since only the consumer can safely discard a lock-free ring's contents.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use jack::{AudioOut, Client, ClientOptions, Control, ProcessScope};

use crate::audio::backend::{AudioBackend, OutputError};
use crate::audio::buffer::AudioRingBuffer;

const BYTES_PER_FRAME: usize = 4; // 16-bit stereo

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

fn sample_to_f32(sample: i16) -> f32 {
    if sample < 0 {
        -1.0 * sample as f32 / i16::MIN as f32
    } else {
        sample as f32 / i16::MAX as f32
    }
}

struct Shared {
    ring: AudioRingBuffer,
    flush_requested: AtomicBool,
    time_of_latest_transfer: AtomicI64,
    latency_frames: AtomicI64,
}

struct ClassicProcessHandler {
    left_port: jack::Port<AudioOut>,
    right_port: jack::Port<AudioOut>,
    shared: Arc<Shared>,
}

impl jack::ProcessHandler for ClassicProcessHandler {
    fn process(&mut self, _client: &Client, ps: &ProcessScope) -> Control {
        let left = self.left_port.as_mut_slice(ps);
        let right = self.right_port.as_mut_slice(ps);
        let nframes = left.len();

        if self.shared.flush_requested.swap(false, Ordering::AcqRel) {
            let available = self.shared.ring.available();
            let mut discard = vec![0u8; available];
            self.shared.ring.read(&mut discard);
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                *l = 0.0;
                *r = 0.0;
            }
            return Control::Continue;
        }

        let mut raw = vec![0u8; nframes * BYTES_PER_FRAME];
        let bytes_read = self.shared.ring.read(&mut raw);
        let frames_read = bytes_read / BYTES_PER_FRAME;

        for i in 0..frames_read {
            let base = i * BYTES_PER_FRAME;
            let l = i16::from_le_bytes([raw[base], raw[base + 1]]);
            let r = i16::from_le_bytes([raw[base + 2], raw[base + 3]]);
            left[i] = sample_to_f32(l);
            right[i] = sample_to_f32(r);
        }
        for i in frames_read..nframes {
            left[i] = 0.0;
            right[i] = 0.0;
        }

        Control::Continue
    }
}

/// JACK-backed classic-ring output back end.
pub struct ClassicRingBackend {
    client_name: String,
    shared: Arc<Shared>,
    active: Mutex<Option<jack::AsyncClient<(), ClassicProcessHandler>>>,
    running: AtomicBool,
}

impl ClassicRingBackend {
    /// Construct a back end that will register a JACK client named
    /// `client_name` with a ring buffer of `ring_capacity_bytes` bytes.
    pub fn new(client_name: impl Into<String>, ring_capacity_bytes: usize) -> Self {
        Self {
            client_name: client_name.into(),
            shared: Arc::new(Shared {
                ring: AudioRingBuffer::new(ring_capacity_bytes),
                flush_requested: AtomicBool::new(false),
                time_of_latest_transfer: AtomicI64::new(0),
                latency_frames: AtomicI64::new(0),
            }),
            active: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }
}

impl AudioBackend for ClassicRingBackend {
    fn init(&mut self) -> Result<(), OutputError> {
        let (client, _status) = Client::new(&self.client_name, ClientOptions::NO_START_SERVER)
            .map_err(|e| OutputError::Init(e.to_string()))?;

        if client.sample_rate() != 44_100 {
            return Err(OutputError::Init(format!(
                "JACK server sample rate {} != 44100",
                client.sample_rate()
            )));
        }

        let left_port = client
            .register_port("out_L", AudioOut::default())
            .map_err(|e| OutputError::Init(e.to_string()))?;
        let right_port = client
            .register_port("out_R", AudioOut::default())
            .map_err(|e| OutputError::Init(e.to_string()))?;

        let handler = ClassicProcessHandler {
            left_port,
            right_port,
            shared: Arc::clone(&self.shared),
        };

        let active = client
            .activate_async((), handler)
            .map_err(|e| OutputError::Init(e.to_string()))?;

        *self.active.lock().unwrap() = Some(active);
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), OutputError> {
        self.active.lock().unwrap().take();
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
        let bytes: Vec<u8> = frames.iter().flat_map(|s| s.to_le_bytes()).collect();
        let written = self.shared.ring.write(&bytes);
        self.shared
            .time_of_latest_transfer
            .store(now_ns(), Ordering::Release);
        Ok(written / 2)
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        // Only the realtime callback may safely discard a lock-free ring's
        // contents; ask it to do so on its next cycle.
        self.shared.flush_requested.store(true, Ordering::Release);
        Ok(())
    }

    fn delay(&self) -> Result<i64, OutputError> {
        let time_now = now_ns();
        let last_transfer = self.shared.time_of_latest_transfer.load(Ordering::Acquire);
        let delta_ns = time_now - last_transfer;
        let occupancy_frames = (self.shared.ring.available() / BYTES_PER_FRAME) as i64;
        let frames_processed_since_check = (delta_ns * 44_100) / 1_000_000_000;
        let base_latency = self.shared.latency_frames.load(Ordering::Acquire);
        Ok(base_latency + occupancy_frames - frames_processed_since_check)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_volume(&mut self, _volume: f32) -> Result<(), OutputError> {
        // JACK is a patchbay; this back end has no gain stage of its own.
        Ok(())
    }

    fn set_muted(&mut self, _muted: bool) -> Result<(), OutputError> {
        Ok(())
    }
}
