//! AirPlay 2 realtime audio socket receiver (§4.9).
//!
//! Same UDP/RTP transport as the classic audio receiver, but the AEAD nonce
//! is the datagram's own trailing 8 bytes (front-padded with zeros) rather
//! than a zero-padded counter, the ciphertext runs up to those trailing 8
//! bytes, and the 12-byte RTP header's timestamp+ssrc fields double as AAD
//! (§4.9; grounded on `decipher_player_put_packet` in
//! `examples/original_source/rtp.c:1470-1491`). There is no NTP ping
//! exchange on this path (time comes from the PTP anchor instead).

use crate::protocol::crypto::chacha::{ChaCha20Poly1305Cipher, Nonce};
use crate::transport::packet::{AudioPacket, PacketError};

/// Errors from the AP2 realtime audio receiver path.
#[derive(Debug, thiserror::Error)]
pub enum Ap2AudioError {
    /// The inbound datagram could not be parsed as an audio packet.
    #[error("malformed AP2 audio packet: {0}")]
    Packet(#[from] PacketError),
    /// AEAD decryption/authentication failed.
    #[error("AP2 audio payload decryption failed: {0}")]
    Decrypt(String),
}

/// A decrypted AP2 realtime-audio frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ap2DecodedAudio {
    /// RTP sequence number.
    pub sequence: u16,
    /// RTP timestamp (frame count).
    pub timestamp: u32,
    /// Decrypted PCM payload bytes.
    pub payload: Vec<u8>,
}

/// Decrypts inbound AP2 realtime-audio datagrams.
pub struct Ap2AudioReceiver {
    cipher: ChaCha20Poly1305Cipher,
}

impl Ap2AudioReceiver {
    /// Construct a receiver using the session's AEAD cipher.
    pub fn new(cipher: ChaCha20Poly1305Cipher) -> Self {
        Self { cipher }
    }

    /// Parse, decrypt, and return one inbound datagram.
    pub fn handle_datagram(&self, datagram: &[u8]) -> Result<Ap2DecodedAudio, Ap2AudioError> {
        decode_and_decrypt(&self.cipher, datagram)
    }
}

/// Parse and decrypt one AP2 audio datagram with `cipher`.
///
/// The 12-byte RTP header's `timestamp`/`ssrc` fields are the AAD; the
/// payload that follows is ciphertext up to its last 8 bytes, which are the
/// wire nonce, front-padded with zeros to the 12-byte ChaCha20 nonce. Shared
/// with `ap2_control`'s `0xD6` (encrypted audio relayed over the control
/// socket) case, which hands this the same slice shape after stripping its
/// own short control-message prefix.
pub(crate) fn decode_and_decrypt(
    cipher: &ChaCha20Poly1305Cipher,
    datagram: &[u8],
) -> Result<Ap2DecodedAudio, Ap2AudioError> {
    let packet = AudioPacket::decode(datagram, false)?;
    if packet.payload.len() < 8 {
        return Err(Ap2AudioError::Packet(PacketError::TooShort {
            needed: crate::transport::packet::RtpHeader::SIZE + 8,
            have: datagram.len(),
        }));
    }

    let ciphertext_len = packet.payload.len() - 8;
    let (ciphertext, nonce_tail) = packet.payload.split_at(ciphertext_len);

    let mut full_nonce = [0u8; 12];
    full_nonce[4..12].copy_from_slice(nonce_tail);
    let nonce = Nonce::from_bytes(&full_nonce).expect("fixed-size nonce buffer");

    let mut aad = [0u8; 8];
    aad[0..4].copy_from_slice(&packet.header.timestamp.to_be_bytes());
    aad[4..8].copy_from_slice(&packet.header.ssrc.to_be_bytes());

    let plaintext = cipher.decrypt_with_aad(&nonce, &aad, ciphertext).map_err(|e| {
        tracing::debug!(sequence = packet.header.sequence, error = %e, "AP2 audio payload decryption failed");
        Ap2AudioError::Decrypt(e.to_string())
    })?;

    Ok(Ap2DecodedAudio {
        sequence: packet.header.sequence,
        timestamp: packet.header.timestamp,
        payload: plaintext,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::packet::RtpHeader;

    fn encode_datagram(cipher: &ChaCha20Poly1305Cipher, header: RtpHeader, nonce_tail: &[u8; 8], plaintext: &[u8]) -> Vec<u8> {
        let mut full_nonce = [0u8; 12];
        full_nonce[4..12].copy_from_slice(nonce_tail);
        let nonce = Nonce::from_bytes(&full_nonce).unwrap();

        let mut aad = [0u8; 8];
        aad[0..4].copy_from_slice(&header.timestamp.to_be_bytes());
        aad[4..8].copy_from_slice(&header.ssrc.to_be_bytes());

        let ciphertext = cipher.encrypt_with_aad(&nonce, &aad, plaintext).unwrap();

        let mut buf = vec![0u8; RtpHeader::SIZE];
        header.encode((&mut buf[0..12]).try_into().unwrap());
        buf.extend_from_slice(&ciphertext);
        buf.extend_from_slice(nonce_tail);
        buf
    }

    #[test]
    fn decrypts_real_wire_scheme_with_trailing_nonce_and_header_aad() {
        let cipher = ChaCha20Poly1305Cipher::new(&[9u8; 32]).unwrap();
        let header = RtpHeader {
            marker: false,
            payload_type: AudioPacket::PAYLOAD_TYPE,
            sequence: 42,
            timestamp: 123_456,
            ssrc: 0xdead_beef,
        };
        let plaintext = vec![0xAB; 32];
        let datagram = encode_datagram(&cipher, header, &[1, 2, 3, 4, 5, 6, 7, 8], &plaintext);

        let receiver = Ap2AudioReceiver::new(cipher);
        let decoded = receiver.handle_datagram(&datagram).unwrap();
        assert_eq!(decoded.sequence, 42);
        assert_eq!(decoded.timestamp, 123_456);
        assert_eq!(decoded.payload, plaintext);
    }

    #[test]
    fn wrong_aad_fails_authentication() {
        let cipher = ChaCha20Poly1305Cipher::new(&[9u8; 32]).unwrap();
        let header = RtpHeader {
            marker: false,
            payload_type: AudioPacket::PAYLOAD_TYPE,
            sequence: 1,
            timestamp: 1,
            ssrc: 1,
        };
        let mut datagram = encode_datagram(&cipher, header, &[0u8; 8], &[1, 2, 3]);
        // Corrupt the timestamp the AAD is derived from after encoding.
        datagram[4] ^= 0xff;

        let receiver = Ap2AudioReceiver::new(cipher);
        assert!(receiver.handle_datagram(&datagram).is_err());
    }
}
