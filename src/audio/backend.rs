//! Audio output back-end abstraction (§4.11).
//!
//! Unlike [`crate::audio::output::AudioOutput`] (callback-driven, pull
//! model), back ends here are push-driven: the buffered/realtime pipeline
//! hands them frames and the back end is responsible for its own internal
//! buffering and clock bridging to the output device.

use thiserror::Error;

/// Errors from an audio output back end.
#[derive(Debug, Error)]
pub enum OutputError {
    /// The back end could not be initialised (device missing, wrong format).
    #[error("output back end init failed: {0}")]
    Init(String),
    /// A frame was pushed while the back end was not running.
    #[error("output back end is not running")]
    NotRunning,
    /// The underlying device reported an error during playback.
    #[error("output device error: {0}")]
    Device(String),
}

/// Push-driven audio output back end (§4.11).
///
/// Implementors own their own internal buffering; `play` never blocks
/// indefinitely; it returns the number of frames actually accepted so the
/// caller can retry the remainder.
pub trait AudioBackend: Send {
    /// Allocate device resources. Must be called before any other method.
    fn init(&mut self) -> Result<(), OutputError>;

    /// Release device resources. Safe to call even if never started.
    fn deinit(&mut self) -> Result<(), OutputError>;

    /// Begin accepting frames.
    fn start(&mut self) -> Result<(), OutputError>;

    /// Stop accepting frames; buffered frames may still drain.
    fn stop(&mut self) -> Result<(), OutputError>;

    /// Push interleaved S16 frames; returns how many frames were accepted.
    fn play(&mut self, frames: &[i16]) -> Result<usize, OutputError>;

    /// Discard all buffered-but-not-yet-rendered frames.
    fn flush(&mut self) -> Result<(), OutputError>;

    /// Output latency, in frames, not yet rendered to the device.
    fn delay(&self) -> Result<i64, OutputError>;

    /// Whether the back end is currently accepting/rendering frames.
    fn is_running(&self) -> bool;

    /// Set output volume in `[0.0, 1.0]`, if the back end supports it.
    fn set_volume(&mut self, volume: f32) -> Result<(), OutputError>;

    /// Mute/unmute, if the back end supports it.
    fn set_muted(&mut self, muted: bool) -> Result<(), OutputError>;
}
