//! Classic control-socket receiver: sync-packet parsing and the §4.6
//! latency adjustment pipeline, grounded on the sync-packet handling in
//! `examples/original_source/rtp.c`'s control-socket loop.

use crate::session::SessionConfig;
use crate::transport::packet::{AudioPacket, PacketError, SyncPacket};

/// Fixed latency bonus applied to flagged/old/new sources (§4.6 step 2).
pub const VERSION_BONUS_FRAMES: i64 = 11025;

/// Errors from the control-socket receiver path.
#[derive(Debug, thiserror::Error)]
pub enum ControlReceiverError {
    /// The inbound datagram could not be parsed as a sync packet.
    #[error("malformed sync packet: {0}")]
    Packet(#[from] PacketError),
}

/// One parsed classic control-socket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Sync packet (`0xd4`) driving the §4.6 latency pipeline.
    Sync(SyncPacket),
    /// Retransmitted audio relayed over the control socket (`0xd6`), already
    /// stripped of its 4-byte nested-sequence prefix and 12-byte RTP header.
    ResentAudio {
        /// RTP sequence number of the retransmitted packet.
        sequence: u16,
        /// RTP timestamp carried by the retransmitted packet.
        timestamp: u32,
        /// Remaining (still encrypted) payload, if long enough to be
        /// reasonable (`rtp.c`'s `plen >= 16` content-sanity check).
        payload: Vec<u8>,
    },
}

/// Result of running the §4.6 latency pipeline against one sync packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLatency {
    /// Final latency, in frames.
    pub frames: i64,
    /// Whether the flag/version bonus (step 2) was applied.
    pub version_bonus_applied: bool,
}

/// Runs the §4.6 latency pipeline for one sync packet.
///
/// 1. A user latency override replaces everything else outright.
/// 2. `flags == 7`, or a known-buggy source version (`<= 353` or `>= 371`,
///    `0` meaning "unknown" and exempt), adds [`VERSION_BONUS_FRAMES`].
/// 3. Clamp to `[minimum_latency, maximum_latency]`.
/// 4. Reject (keep `current_latency`) if the result exceeds
///    `(3 * buffer_frames * 352) / 4 - 11025`.
/// 5. Add the backend latency offset (seconds converted to frames at
///    `input_rate`); reject (keep `current_latency`) if that pushes the
///    result negative or past `max_frames_per_packet * (buffer_frames -
///    minimum_free_headroom)`.
pub fn resolve_latency(
    config: &SessionConfig,
    sync: &SyncPacket,
    current_latency: i64,
) -> ResolvedLatency {
    if let Some(user_latency) = config.user_latency {
        return ResolvedLatency {
            frames: user_latency,
            version_bonus_applied: false,
        };
    }

    let mut latency =
        sync.sync_rtp_timestamp.wrapping_sub(sync.rtp_timestamp_less_latency) as i32 as i64;

    let buggy_version =
        config.source_version != 0 && (config.source_version <= 353 || config.source_version >= 371);
    let version_bonus_applied = sync.flags == 7 || buggy_version;
    if version_bonus_applied {
        latency += VERSION_BONUS_FRAMES;
    }

    latency = latency.clamp(config.minimum_latency, config.maximum_latency);

    let max_frames = (3 * config.buffer_frames * 352) / 4 - 11025;
    if latency > max_frames {
        tracing::warn!(latency, max_frames, "out-of-range latency request ignored");
        return ResolvedLatency {
            frames: current_latency,
            version_bonus_applied,
        };
    }

    let backend_offset_frames =
        (config.backend_latency_offset_seconds * config.input_rate as f64) as i64;
    let adjusted = latency + backend_offset_frames;
    let upper_bound = config.max_frames_per_packet * (config.buffer_frames - config.minimum_free_headroom);
    if adjusted < 0 || adjusted > upper_bound {
        tracing::warn!(adjusted, upper_bound, "audio_backend_latency_offset out of range, ignored");
        return ResolvedLatency {
            frames: current_latency,
            version_bonus_applied,
        };
    }

    ResolvedLatency {
        frames: adjusted,
        version_bonus_applied,
    }
}

/// The new anchor RTP frame a resolved sync packet establishes: the sync
/// timestamp with the finalised latency subtracted (§4.6, final paragraph).
pub fn anchor_rtp_frame(sync: &SyncPacket, resolved_latency: i64) -> u32 {
    sync.sync_rtp_timestamp.wrapping_sub(resolved_latency as u32)
}

/// Parses inbound sync-socket datagrams.
pub struct ControlReceiver;

impl ControlReceiver {
    /// Parse one inbound control-socket datagram.
    ///
    /// Dispatches on the full second header byte: `0xd4` is a sync packet,
    /// `0xd6` is retransmitted audio relayed over the control path (a
    /// classic-AirPlay quirk seen from some sources); anything else is
    /// rejected as an unrecognised payload type.
    pub fn handle_datagram(datagram: &[u8]) -> Result<ControlMessage, ControlReceiverError> {
        if datagram.len() < 2 {
            return Err(ControlReceiverError::Packet(PacketError::TooShort {
                needed: 2,
                have: datagram.len(),
            }));
        }
        match datagram[1] {
            0xd4 => Ok(ControlMessage::Sync(SyncPacket::decode(datagram)?)),
            0xd6 => {
                let packet = AudioPacket::decode(datagram, true)?;
                Ok(ControlMessage::ResentAudio {
                    sequence: packet.header.sequence,
                    timestamp: packet.header.timestamp,
                    payload: packet.payload,
                })
            }
            other => Err(ControlReceiverError::Packet(PacketError::UnknownPayloadType(other))),
        }
    }
}
