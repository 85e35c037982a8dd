//! # airplay-rtp-core
//!
//! RTP transport, PTP/NTP-derived clock anchoring, and an audio output
//! back-end bridge for an AirPlay-compatible receiver.
//!
//! This crate is the real-time core of a receiver: it does not perform the
//! RTSP/SDP handshake, HomeKit pairing, or mDNS advertisement that set up a
//! session — those are the job of an external collaborator that hands this
//! crate a [`session::SessionConfig`] once negotiation is complete.
//!
//! ## Modules
//!
//! - [`clock`] - shared-memory PTP clock reader, anchor store, time translator
//! - [`ntp`] - classic NTP-style ping exchange and persisted drift model
//! - [`transport`] - RTP wire codecs and the classic/AP2 socket receivers
//! - [`buffered`] - AP2 buffered-audio pipeline (TCP -> AAC -> PCM)
//! - [`audio`] - output back-end abstraction and ring buffer

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod audio;
pub mod buffered;
pub mod clock;
pub mod error;
pub mod ntp;
pub mod protocol;
pub mod session;
pub mod transport;

pub use audio::{AudioBackend, AudioRingBuffer, OutputError};
pub use error::{CoreError, CoreResult};
pub use session::{AirplayKind, PendingFlush, SessionConfig, SessionState};
