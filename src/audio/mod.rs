//! Audio handling module

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod backend;
#[cfg(feature = "backend-jack")]
pub mod backend_classic;
#[cfg(feature = "backend-pipewire")]
pub mod backend_timed;
pub mod buffer;
pub mod clock;
pub mod concealment;
pub mod convert;
pub mod format;
pub mod output;
pub mod output_coreaudio;
pub mod output_cpal;

#[cfg(test)]
mod tests;

pub use backend::{AudioBackend, OutputError};
#[cfg(feature = "backend-jack")]
pub use backend_classic::ClassicRingBackend;
#[cfg(feature = "backend-pipewire")]
pub use backend_timed::TimedBackend;
pub use buffer::AudioRingBuffer;
pub use clock::{AudioClock, TimingSync};
pub use concealment::{Concealer, ConcealmentStrategy};
pub use convert::{convert_channels, convert_samples, from_f32, resample_linear, to_f32};
pub use format::{
    AacProfile, AudioCodec, AudioFormat, ChannelConfig, CodecParams, SampleFormat, SampleRate,
};
pub use output::{AudioDevice, AudioOutput, AudioOutputError, OutputState};
