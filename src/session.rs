//! Per-connection session state (§3 "Session State").
//!
//! Populating these fields is the job of the excluded RTSP/SDP handshake
//! collaborator; this module only holds the result.

use std::net::SocketAddr;

/// Which generation of the protocol a connection is speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirplayKind {
    /// AirPlay 1 / RAOP: NTP-derived anchor, UDP audio + control + timing.
    Classic,
    /// AirPlay 2: PTP-derived anchor, AP2 control socket, buffered-audio TCP.
    Ap2,
}

/// Static, rarely-changing configuration for one streaming session.
///
/// Negotiated out-of-band by the RTSP handshake and handed to the core at
/// `setup` time; this struct never parses wire bytes itself.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Protocol generation.
    pub kind: AirplayKind,
    /// Nominal input sample rate (frames/second), normally 44100.
    pub input_rate: u32,
    /// Lower bound accepted for the derived/overridden latency, in frames.
    pub minimum_latency: i64,
    /// Upper bound accepted for the derived/overridden latency, in frames.
    pub maximum_latency: i64,
    /// User-configured latency override, if any; takes precedence over the
    /// derived value (§4.6 step 1).
    pub user_latency: Option<i64>,
    /// Output back-end latency offset, expressed in seconds and converted to
    /// frames via `input_rate` (§4.6 step 5, §4.8).
    pub backend_latency_offset_seconds: f64,
    /// Number of frames the audio output back-end must keep free as
    /// headroom when validating the backend-adjusted latency.
    pub minimum_free_headroom: i64,
    /// Maximum frames carried in a single audio packet.
    pub max_frames_per_packet: i64,
    /// Capacity of the player's own buffer, in frames (`BUFFER_FRAMES`).
    pub buffer_frames: i64,
    /// 32-byte session AEAD key (ChaCha20-Poly1305), already derived.
    pub aead_key: [u8; 32],
    /// The source's reported protocol version (used by §4.6 step 2's
    /// version-range bonus).
    pub source_version: u32,
    /// Diagnostic uniform packet-drop fraction, `[0, 1]`, for network
    /// impairment testing (§4.5).
    pub diagnostic_drop_fraction: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            kind: AirplayKind::Classic,
            input_rate: 44100,
            minimum_latency: 4410,
            maximum_latency: 88200,
            user_latency: None,
            backend_latency_offset_seconds: 0.0,
            minimum_free_headroom: 1024,
            max_frames_per_packet: 352,
            buffer_frames: 1024,
            aead_key: [0u8; 32],
            source_version: 0,
            diagnostic_drop_fraction: 0.0,
        }
    }
}

/// Mutable, fast-changing per-connection state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Currently finalised latency, in frames.
    pub current_latency: i64,
    /// Packets received since the last flush.
    pub packets_since_flush: u64,
    /// Pending flush request, if one has been raised but not yet satisfied.
    pub pending_flush: Option<PendingFlush>,
    /// Whether the player is currently allowed to receive frames.
    ///
    /// Cleared on flush, set on anchor+resume (§GLOSSARY "Play-enabled").
    pub play_enabled: bool,
    /// Latched remote address for the AP2 resend/control requester, set on
    /// the first inbound packet (§4.8).
    pub remote_control_addr: Option<SocketAddr>,
}

/// A flush request in flight, keyed by `(sequence, rtp timestamp)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFlush {
    /// Sequence number up to and including which frames must be discarded.
    pub until_seq: u32,
    /// RTP timestamp, inclusive, up to which frames must be discarded once
    /// `until_seq` is reached.
    pub until_ts: u32,
}
