//! Classic (AirPlay 1) realtime audio socket receiver (§4.5).
//!
//! Decrypts inbound audio packets, tracks simple jitter/size statistics with
//! Welford's online algorithm, and optionally exercises a diagnostic
//! uniform packet-drop hook for network-impairment testing.

use rand::Rng;

use crate::protocol::crypto::chacha::{ChaCha20Poly1305Cipher, Nonce};
use crate::transport::packet::{AudioPacket, PacketError};

/// Errors from the classic audio receiver path.
#[derive(Debug, thiserror::Error)]
pub enum AudioReceiverError {
    /// The inbound datagram could not be parsed as an audio packet.
    #[error("malformed audio packet: {0}")]
    Packet(#[from] PacketError),
    /// AEAD decryption/authentication failed.
    #[error("audio payload decryption failed: {0}")]
    Decrypt(String),
}

/// Online (single-pass) mean/variance accumulator, used here for inter-arrival
/// jitter and payload-size statistics (§4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct WelfordStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl WelfordStats {
    /// Fold one more observation into the running statistics.
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Number of observations folded in so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Running mean.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Running (population) variance.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }
}

/// A decoded, decrypted audio packet plus the sequence number it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAudio {
    /// RTP sequence number.
    pub sequence: u16,
    /// RTP timestamp (frame count).
    pub timestamp: u32,
    /// Decrypted PCM/ALAC payload bytes.
    pub payload: Vec<u8>,
}

/// Decrypts and statistics-tracks inbound classic audio datagrams.
pub struct AudioReceiver {
    cipher: ChaCha20Poly1305Cipher,
    jitter_stats: WelfordStats,
    size_stats: WelfordStats,
    last_arrival: Option<std::time::Instant>,
    /// Fraction of packets to synthetically drop, `[0, 1]`, for diagnostics.
    pub diagnostic_drop_fraction: f64,
}

impl AudioReceiver {
    /// Construct a receiver using `key` for the session AEAD.
    pub fn new(cipher: ChaCha20Poly1305Cipher, diagnostic_drop_fraction: f64) -> Self {
        Self {
            cipher,
            jitter_stats: WelfordStats::default(),
            size_stats: WelfordStats::default(),
            last_arrival: None,
            diagnostic_drop_fraction,
        }
    }

    /// Jitter statistics accumulated so far.
    pub fn jitter_stats(&self) -> WelfordStats {
        self.jitter_stats
    }

    /// Payload-size statistics accumulated so far.
    pub fn size_stats(&self) -> WelfordStats {
        self.size_stats
    }

    /// True if this packet should be synthetically discarded per
    /// [`Self::diagnostic_drop_fraction`] (§4.5 diagnostic hook).
    fn should_diagnostically_drop(&self) -> bool {
        self.diagnostic_drop_fraction > 0.0
            && rand::thread_rng().gen::<f64>() < self.diagnostic_drop_fraction
    }

    /// Process one inbound datagram: parse, (maybe) drop, decrypt, and fold
    /// arrival statistics. `nonce_bytes` is the 8-byte wire nonce, front-padded
    /// with zeros to the 12-byte ChaCha20-Poly1305 nonce.
    ///
    /// Dispatches on the masked 7-bit payload type (`0x60` regular audio,
    /// `0x56` a retransmitted-audio response with a 4-byte nested-sequence
    /// prefix before its own RTP header); anything else is rejected. A
    /// payload shorter than 16 bytes after the 12-byte RTP header is
    /// silently dropped rather than treated as an error (`rtp.c`'s `plen >=
    /// 16` content-sanity check).
    pub fn handle_datagram(
        &mut self,
        datagram: &[u8],
        nonce_bytes: &[u8; 8],
    ) -> Result<Option<DecodedAudio>, AudioReceiverError> {
        if self.should_diagnostically_drop() {
            return Ok(None);
        }

        if datagram.len() < 2 {
            return Err(AudioReceiverError::Packet(PacketError::TooShort {
                needed: 2,
                have: datagram.len(),
            }));
        }
        let is_resend = match datagram[1] & 0x7F {
            AudioPacket::PAYLOAD_TYPE => false,
            AudioPacket::RESEND_PAYLOAD_TYPE => true,
            other => return Err(AudioReceiverError::Packet(PacketError::UnknownPayloadType(other))),
        };

        let packet = AudioPacket::decode(datagram, is_resend)?;
        if packet.payload.len() < 16 {
            return Ok(None);
        }

        let now = std::time::Instant::now();
        if let Some(last) = self.last_arrival {
            self.jitter_stats.push(now.duration_since(last).as_secs_f64() * 1000.0);
        }
        self.last_arrival = Some(now);
        self.size_stats.push(packet.payload.len() as f64);

        let mut full_nonce = [0u8; 12];
        full_nonce[4..12].copy_from_slice(nonce_bytes);
        let nonce = Nonce::from_bytes(&full_nonce).expect("fixed-size nonce buffer");

        let plaintext = self.cipher.decrypt(&nonce, &packet.payload).map_err(|e| {
            tracing::debug!(sequence = packet.header.sequence, error = %e, "audio payload decryption failed");
            AudioReceiverError::Decrypt(e.to_string())
        })?;

        Ok(Some(DecodedAudio {
            sequence: packet.header.sequence,
            timestamp: packet.header.timestamp,
            payload: plaintext,
        }))
    }
}
