//! RTP transport subsystem: wire packet codecs and the classic/AP2
//! audio/control socket receivers (§4.5 - §4.9).

pub mod ap2_control;
pub mod ap2_realtime_audio;
pub mod audio_receiver;
pub mod control_receiver;
pub mod packet;
pub mod resend;

pub use ap2_control::{Ap2ControlError, Ap2ControlMessage, Ap2ControlReceiver};
pub use ap2_realtime_audio::{Ap2AudioError, Ap2AudioReceiver, Ap2DecodedAudio};
pub use audio_receiver::{AudioReceiver, AudioReceiverError, DecodedAudio, WelfordStats};
pub use control_receiver::{
    anchor_rtp_frame, resolve_latency, ControlMessage, ControlReceiver, ControlReceiverError,
    ResolvedLatency, VERSION_BONUS_FRAMES,
};
pub use packet::{
    AudioPacket, PacketError, PtpAnchorPacket, ResendRequest, RtpHeader, SyncPacket, TimingReply,
    TimingRequest,
};
pub use resend::{Gap, ResendTracker};

/// Aggregate error type for the transport subsystem, composed with
/// `#[from]` so call sites can propagate any one socket's error uniformly.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Classic audio-socket receiver failure.
    #[error(transparent)]
    Audio(#[from] AudioReceiverError),
    /// Classic control-socket receiver failure.
    #[error(transparent)]
    Control(#[from] ControlReceiverError),
    /// AP2 control-socket receiver failure.
    #[error(transparent)]
    Ap2Control(#[from] Ap2ControlError),
    /// AP2 realtime-audio receiver failure.
    #[error(transparent)]
    Ap2Audio(#[from] Ap2AudioError),
}
