//! Wire packet parsing and encoding for the RTP audio, control, and timing
//! sockets (§6 packet-type table).
//!
//! Payload-type bytes below are the full second RTP-header byte (marker bit
//! set, `0x80 | PT`), matching what's actually observed on the wire rather
//! than the masked 7-bit type alone, since AirPlay 2's announce/anchor
//! packets only differ from each other in that top bit.

use thiserror::Error;

/// Errors decoding a wire packet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Buffer shorter than the fixed header/payload this type requires.
    #[error("packet too short: needed {needed}, have {have}")]
    TooShort {
        /// Minimum length required.
        needed: usize,
        /// Actual length received.
        have: usize,
    },
    /// Second header byte didn't match any known payload type.
    #[error("unrecognised payload type byte {0:#04x}")]
    UnknownPayloadType(u8),
}

/// Standard 12-byte RTP header fields used across audio/control/timing packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Marker bit (top bit of the second header byte).
    pub marker: bool,
    /// 7-bit payload type.
    pub payload_type: u8,
    /// 16-bit sequence number.
    pub sequence: u16,
    /// 32-bit RTP timestamp.
    pub timestamp: u32,
    /// 32-bit synchronisation source.
    pub ssrc: u32,
}

impl RtpHeader {
    /// Standard header size in bytes.
    pub const SIZE: usize = 12;

    /// Parse the 12-byte standard header.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < Self::SIZE {
            return Err(PacketError::TooShort {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }
        Ok(Self {
            marker: buf[1] & 0x80 != 0,
            payload_type: buf[1] & 0x7F,
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }

    /// Encode the 12-byte standard header.
    pub fn encode(&self, buf: &mut [u8; 12]) {
        buf[0] = 0x80;
        buf[1] = (u8::from(self.marker) << 7) | (self.payload_type & 0x7F);
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
    }
}

/// A classic (AirPlay 1) audio packet: header plus ciphertext/PCM payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPacket {
    /// Header fields.
    pub header: RtpHeader,
    /// Payload bytes following the header (encrypted audio).
    pub payload: Vec<u8>,
}

impl AudioPacket {
    /// Payload type byte for realtime (classic) audio: `0xd4` (0x60 | 0x80... no,
    /// the marker is carried separately; `0x60` is the 7-bit type).
    pub const PAYLOAD_TYPE: u8 = 0x60;
    /// Payload type byte for a retransmitted audio packet response.
    pub const RESEND_PAYLOAD_TYPE: u8 = 0x56;

    /// Parse a full audio/resend packet. Resend responses carry a 4-byte
    /// nested RTP-header prefix (original sequence) before the real header.
    pub fn decode(buf: &[u8], is_resend: bool) -> Result<Self, PacketError> {
        let body = if is_resend {
            if buf.len() < 4 {
                return Err(PacketError::TooShort {
                    needed: 4,
                    have: buf.len(),
                });
            }
            &buf[4..]
        } else {
            buf
        };
        let header = RtpHeader::decode(body)?;
        Ok(Self {
            header,
            payload: body[RtpHeader::SIZE..].to_vec(),
        })
    }
}

/// Classic RTCP-style sync packet (payload type `0x54`, §6/§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPacket {
    /// Whether this is the first sync packet of the session (marker bit).
    pub is_first: bool,
    /// Second header halfword; a value of `7` requests the fixed latency
    /// bonus regardless of source version (§4.6 step 2).
    pub flags: u16,
    /// RTP timestamp of the frame that would be playing now with no added
    /// latency.
    pub rtp_timestamp_less_latency: u32,
    /// Remote NTP time (seconds, fraction) corresponding to `sync_rtp_timestamp`.
    pub ntp_time: (u32, u32),
    /// Raw RTP timestamp the source says should be playing at `ntp_time`,
    /// before latency is subtracted.
    pub sync_rtp_timestamp: u32,
}

impl SyncPacket {
    /// Fixed wire size: 4-byte mini-header + 16 bytes of payload.
    pub const SIZE: usize = 20;
    /// 7-bit payload type.
    pub const PAYLOAD_TYPE: u8 = 0x54;

    /// Parse a sync packet.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < Self::SIZE {
            return Err(PacketError::TooShort {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }
        Ok(Self {
            is_first: buf[1] & 0x80 != 0,
            flags: u16::from_be_bytes([buf[2], buf[3]]),
            rtp_timestamp_less_latency: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ntp_time: (
                u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
                u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
            ),
            sync_rtp_timestamp: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
        })
    }
}

/// AirPlay 2 PTP anchor-announcement packet (payload type `0xd5`, §4.8/§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtpAnchorPacket {
    /// RTP timestamp the anchor describes (`frame_1`).
    pub rtp_timestamp: u32,
    /// PTP network time, ns, corresponding to `rtp_timestamp`.
    pub ptp_timestamp: u64,
    /// RTP timestamp of the next audio packet (`frame_2`).
    pub rtp_timestamp_next: u32,
    /// Identity of the PTP master clock this anchor was derived from.
    pub clock_identity: u64,
}

impl PtpAnchorPacket {
    /// Fixed wire size: 4-byte header + 24-byte payload.
    pub const SIZE: usize = 28;
    /// Full second-header-byte value (`0xD5` per SPEC_FULL.md's §6 table).
    pub const PAYLOAD_TYPE_FULL: u8 = 0xd5;

    /// Parse a PTP anchor packet.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < Self::SIZE {
            return Err(PacketError::TooShort {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }
        Ok(Self {
            rtp_timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ptp_timestamp: u64::from_be_bytes(buf[8..16].try_into().unwrap()),
            rtp_timestamp_next: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
            clock_identity: u64::from_be_bytes(buf[20..28].try_into().unwrap()),
        })
    }
}

/// Classic (AirPlay 1) NTP-style timing request, sent by the receiver to the
/// source's timing socket (payload type `0xd2`, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingRequest {
    /// Request sequence number, echoed back in the matching reply.
    pub sequence: u16,
    /// Local send time (`t1`), a raw nanosecond counter.
    pub origin: u64,
}

impl TimingRequest {
    /// Fixed wire size (`struct timing_request`): leader + type + seqno +
    /// filler + three 8-byte timestamp fields.
    pub const SIZE: usize = 32;
    /// Full second-header-byte value.
    pub const PAYLOAD_TYPE_FULL: u8 = 0xd2;

    /// Encode a timing request. `origin` bytes land at the wire offset a
    /// reply echoes back verbatim; `receive`/`transmit` are left zeroed,
    /// the source fills them in on reply.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = 0x80;
        buf[1] = Self::PAYLOAD_TYPE_FULL;
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[8..16].copy_from_slice(&self.origin.to_be_bytes());
        buf
    }

    /// Parse a timing request (used by a source, or in tests of the
    /// receiver's own request encoding).
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < Self::SIZE {
            return Err(PacketError::TooShort {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }
        Ok(Self {
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            origin: u64::from_be_bytes(buf[8..16].try_into().unwrap()),
        })
    }
}

/// Classic NTP-style timing reply, returned by the source in answer to a
/// [`TimingRequest`] (payload type `0xd3`, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingReply {
    /// Echoed request sequence number.
    pub sequence: u16,
    /// Echoed `origin` (`t1`) from the request this answers.
    pub origin: u64,
    /// Remote receive time (`t2`), NTP-style 64-bit (seconds, fraction).
    pub receive: (u32, u32),
    /// Remote transmit time (`t3`), NTP-style 64-bit (seconds, fraction).
    pub transmit: (u32, u32),
}

impl TimingReply {
    /// Fixed wire size, matching [`TimingRequest::SIZE`].
    pub const SIZE: usize = 32;
    /// Full second-header-byte value.
    pub const PAYLOAD_TYPE_FULL: u8 = 0xd3;

    /// Encode a timing reply (used by tests standing in for a source).
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = 0x80;
        buf[1] = Self::PAYLOAD_TYPE_FULL;
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[8..16].copy_from_slice(&self.origin.to_be_bytes());
        buf[16..20].copy_from_slice(&self.receive.0.to_be_bytes());
        buf[20..24].copy_from_slice(&self.receive.1.to_be_bytes());
        buf[24..28].copy_from_slice(&self.transmit.0.to_be_bytes());
        buf[28..32].copy_from_slice(&self.transmit.1.to_be_bytes());
        buf
    }

    /// Parse a timing reply.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < Self::SIZE {
            return Err(PacketError::TooShort {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }
        Ok(Self {
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            origin: u64::from_be_bytes(buf[8..16].try_into().unwrap()),
            receive: (
                u32::from_be_bytes(buf[16..20].try_into().unwrap()),
                u32::from_be_bytes(buf[20..24].try_into().unwrap()),
            ),
            transmit: (
                u32::from_be_bytes(buf[24..28].try_into().unwrap()),
                u32::from_be_bytes(buf[28..32].try_into().unwrap()),
            ),
        })
    }

    /// Reconstruct [`Self::receive`] as a single nanosecond count (§4.4's
    /// `ps*1e9 + (pn*1e9)>>32` NTP-pair reconstruction idiom).
    pub fn receive_ns(&self) -> i64 {
        ntp_pair_to_ns(self.receive)
    }

    /// Reconstruct [`Self::transmit`] as a single nanosecond count.
    pub fn transmit_ns(&self) -> i64 {
        ntp_pair_to_ns(self.transmit)
    }
}

/// Reconstruct an NTP-style 32-bit-seconds/32-bit-fraction pair as a single
/// nanosecond count (§4.4, §6 glossary "NTP timestamp").
fn ntp_pair_to_ns((seconds, fraction): (u32, u32)) -> i64 {
    seconds as i64 * 1_000_000_000 + (((fraction as u64) * 1_000_000_000) >> 32) as i64
}

/// Retransmit (resend) request, sent by the receiver on the control socket
/// (payload type `0x55`, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendRequest {
    /// First missing sequence number.
    pub sequence_start: u16,
    /// Number of consecutive missing packets.
    pub count: u16,
}

impl ResendRequest {
    /// Fixed wire size: 12-byte header + 4-byte payload.
    pub const SIZE: usize = 16;
    /// 7-bit payload type.
    pub const PAYLOAD_TYPE: u8 = 0x55;

    /// Encode a resend request with the given RTP sequence number.
    pub fn encode(&self, sequence: u16, ssrc: u32) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        let header = RtpHeader {
            marker: true,
            payload_type: Self::PAYLOAD_TYPE,
            sequence,
            timestamp: 0,
            ssrc,
        };
        header.encode((&mut buf[0..12]).try_into().unwrap());
        buf[12..14].copy_from_slice(&self.sequence_start.to_be_bytes());
        buf[14..16].copy_from_slice(&self.count.to_be_bytes());
        buf
    }

    /// Parse a resend request.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < Self::SIZE {
            return Err(PacketError::TooShort {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }
        Ok(Self {
            sequence_start: u16::from_be_bytes([buf[12], buf[13]]),
            count: u16::from_be_bytes([buf[14], buf[15]]),
        })
    }
}
