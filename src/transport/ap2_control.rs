//! AirPlay 2 control-socket receiver (§4.8): latches the sender's address on
//! first contact and parses anchor/audio/flush control messages over UDP.

use std::net::SocketAddr;

use crate::protocol::crypto::chacha::ChaCha20Poly1305Cipher;
use crate::session::{PendingFlush, SessionConfig, SessionState};
use crate::transport::ap2_realtime_audio::{self, Ap2AudioError, Ap2DecodedAudio};
use crate::transport::packet::{PacketError, PtpAnchorPacket};

/// Fixed RTP-frame offset folded into the anchor latency on every AP2
/// anchor announcement (§4.8, grounded on the `11035` constant in
/// `examples/original_source/rtp.c:1509-1610`).
pub const ANCHOR_LATENCY_OFFSET_FRAMES: i64 = 11035;

/// Length of the control-message prefix stripped from a `0xD6` datagram
/// before the remainder is handed to the shared AP2 audio decoder
/// (`examples/original_source/rtp.c`'s `decipher_player_put_packet(packet +
/// 6, nread - 6, conn)` call).
const AP2_AUDIO_PREFIX_LEN: usize = 6;

/// Errors from the AP2 control receiver path.
#[derive(Debug, thiserror::Error)]
pub enum Ap2ControlError {
    /// The inbound datagram could not be parsed as a control message.
    #[error("malformed AP2 control packet: {0}")]
    Packet(#[from] PacketError),
    /// Encrypted audio relayed over the control socket failed to decrypt.
    #[error(transparent)]
    Audio(#[from] Ap2AudioError),
}

/// One parsed AP2 control-socket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ap2ControlMessage {
    /// PTP-derived anchor announcement, already resolved to a finalised
    /// latency (written into `SessionState::current_latency`) and an
    /// anchor RTP frame (§4.8).
    Anchor {
        /// Identity of the PTP master clock this anchor was derived from.
        clock_id: u64,
        /// RTP frame that maps to `remote_time_ns`, with the resolved
        /// latency already subtracted.
        anchor_rtp_frame: u32,
        /// PTP network time, ns, corresponding to `anchor_rtp_frame`.
        remote_time_ns: u64,
    },
    /// Encrypted audio relayed over the control socket (`0xD6`).
    Audio(Ap2DecodedAudio),
    /// Flush up to (and including) the given sequence/timestamp.
    Flush(PendingFlush),
}

/// Parses the AP2 control socket and maintains the session's latched
/// remote address (§4.8: "set once on first inbound packet").
pub struct Ap2ControlReceiver;

impl Ap2ControlReceiver {
    /// Handle one inbound datagram from `from`, latching `state`'s remote
    /// control address on first contact.
    ///
    /// Dispatches on the full second header byte (§6 packet-type table):
    /// `0xD5` is a PTP anchor announcement (§4.8's latency transformation
    /// runs here and updates `state.current_latency`), `0xD6` is encrypted
    /// audio decrypted with `cipher`, anything else falls back to the
    /// flush-boundary layout.
    pub fn handle_datagram(
        datagram: &[u8],
        from: SocketAddr,
        config: &SessionConfig,
        cipher: &ChaCha20Poly1305Cipher,
        state: &mut SessionState,
    ) -> Result<Ap2ControlMessage, Ap2ControlError> {
        if state.remote_control_addr.is_none() {
            state.remote_control_addr = Some(from);
        }

        if datagram.len() < 2 {
            return Err(Ap2ControlError::Packet(PacketError::TooShort {
                needed: 2,
                have: datagram.len(),
            }));
        }

        match datagram[1] {
            PtpAnchorPacket::PAYLOAD_TYPE_FULL => {
                let anchor = PtpAnchorPacket::decode(datagram)?;

                // §4.8: notified_latency = frame_2 - frame_1; conn.latency =
                // notified_latency + 11035 + backend_offset; stored anchor
                // frame = frame_1 - 11035 - backend_offset.
                let notified_latency =
                    anchor.rtp_timestamp_next.wrapping_sub(anchor.rtp_timestamp) as i32 as i64;
                let added_latency =
                    (config.backend_latency_offset_seconds * config.input_rate as f64) as i64;
                let total_offset = ANCHOR_LATENCY_OFFSET_FRAMES + added_latency;

                state.current_latency = notified_latency + total_offset;
                let anchor_rtp_frame = anchor.rtp_timestamp.wrapping_sub(total_offset as u32);

                Ok(Ap2ControlMessage::Anchor {
                    clock_id: anchor.clock_identity,
                    anchor_rtp_frame,
                    remote_time_ns: anchor.ptp_timestamp,
                })
            }
            0xd6 => {
                let payload = datagram.get(AP2_AUDIO_PREFIX_LEN..).ok_or(PacketError::TooShort {
                    needed: AP2_AUDIO_PREFIX_LEN,
                    have: datagram.len(),
                })?;
                let decoded = ap2_realtime_audio::decode_and_decrypt(cipher, payload)?;
                Ok(Ap2ControlMessage::Audio(decoded))
            }
            _ => {
                // Flush control messages reuse the sync-packet layout: the
                // header's sequence/timestamp fields carry the flush boundary.
                if datagram.len() < 8 {
                    return Err(Ap2ControlError::Packet(PacketError::TooShort {
                        needed: 8,
                        have: datagram.len(),
                    }));
                }
                let until_seq = u16::from_be_bytes([datagram[2], datagram[3]]) as u32;
                let until_ts = u32::from_be_bytes([datagram[4], datagram[5], datagram[6], datagram[7]]);
                Ok(Ap2ControlMessage::Flush(PendingFlush { until_seq, until_ts }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ap2_realtime_audio::Ap2AudioReceiver;
    use crate::transport::packet::{AudioPacket, RtpHeader};
    use std::net::Ipv4Addr;

    fn peer() -> SocketAddr {
        SocketAddr::new(Ipv4Addr::new(10, 0, 0, 1).into(), 6002)
    }

    fn default_cipher() -> ChaCha20Poly1305Cipher {
        ChaCha20Poly1305Cipher::new(&[0u8; 32]).unwrap()
    }

    #[test]
    fn first_datagram_latches_remote_address() {
        let mut state = SessionState::default();
        let config = SessionConfig::default();
        let cipher = default_cipher();
        let mut buf = [0u8; 8];
        buf[1] = 0x54;
        let _ = Ap2ControlReceiver::handle_datagram(&buf, peer(), &config, &cipher, &mut state);
        assert_eq!(state.remote_control_addr, Some(peer()));
    }

    #[test]
    fn subsequent_datagram_from_different_peer_does_not_relatch() {
        let mut state = SessionState::default();
        let config = SessionConfig::default();
        let cipher = default_cipher();
        let mut buf = [0u8; 8];
        buf[1] = 0x54;
        let _ = Ap2ControlReceiver::handle_datagram(&buf, peer(), &config, &cipher, &mut state);
        let other = SocketAddr::new(Ipv4Addr::new(10, 0, 0, 2).into(), 6002);
        let _ = Ap2ControlReceiver::handle_datagram(&buf, other, &config, &cipher, &mut state);
        assert_eq!(state.remote_control_addr, Some(peer()));
    }

    #[test]
    fn parses_flush_message_fields() {
        let mut state = SessionState::default();
        let config = SessionConfig::default();
        let cipher = default_cipher();
        let mut buf = [0u8; 8];
        buf[1] = 0x54;
        buf[2..4].copy_from_slice(&500u16.to_be_bytes());
        buf[4..8].copy_from_slice(&44_100u32.to_be_bytes());
        let msg =
            Ap2ControlReceiver::handle_datagram(&buf, peer(), &config, &cipher, &mut state).unwrap();
        assert_eq!(
            msg,
            Ap2ControlMessage::Flush(PendingFlush {
                until_seq: 500,
                until_ts: 44_100,
            })
        );
    }

    #[test]
    fn anchor_datagram_resolves_latency_and_anchor_frame() {
        let mut state = SessionState::default();
        let mut config = SessionConfig::default();
        config.backend_latency_offset_seconds = 0.0;
        let cipher = default_cipher();

        let mut buf = [0u8; PtpAnchorPacket::SIZE];
        buf[1] = PtpAnchorPacket::PAYLOAD_TYPE_FULL;
        buf[4..8].copy_from_slice(&100_000u32.to_be_bytes());
        buf[8..16].copy_from_slice(&1_000_000_000u64.to_be_bytes());
        buf[16..20].copy_from_slice(&101_000u32.to_be_bytes());
        buf[20..28].copy_from_slice(&0x1122_3344_5566_7788u64.to_be_bytes());

        let msg =
            Ap2ControlReceiver::handle_datagram(&buf, peer(), &config, &cipher, &mut state).unwrap();
        match msg {
            Ap2ControlMessage::Anchor {
                clock_id,
                anchor_rtp_frame,
                remote_time_ns,
            } => {
                assert_eq!(clock_id, 0x1122_3344_5566_7788);
                assert_eq!(remote_time_ns, 1_000_000_000);
                let expected_latency = 1000 + ANCHOR_LATENCY_OFFSET_FRAMES;
                assert_eq!(state.current_latency, expected_latency);
                assert_eq!(anchor_rtp_frame, 100_000u32.wrapping_sub(expected_latency as u32));
            }
            other => panic!("expected Anchor, got {other:?}"),
        }
    }

    #[test]
    fn audio_datagram_on_control_socket_decrypts_via_shared_decoder() {
        let mut state = SessionState::default();
        let config = SessionConfig::default();
        let cipher = default_cipher();

        let header = RtpHeader {
            marker: false,
            payload_type: AudioPacket::PAYLOAD_TYPE,
            sequence: 7,
            timestamp: 900,
            ssrc: 55,
        };
        let plaintext = vec![0x11; 16];
        let nonce_tail = [1u8; 8];
        let mut full_nonce = [0u8; 12];
        full_nonce[4..12].copy_from_slice(&nonce_tail);
        let nonce = crate::protocol::crypto::chacha::Nonce::from_bytes(&full_nonce).unwrap();
        let mut aad = [0u8; 8];
        aad[0..4].copy_from_slice(&header.timestamp.to_be_bytes());
        aad[4..8].copy_from_slice(&header.ssrc.to_be_bytes());
        let ciphertext = cipher.encrypt_with_aad(&nonce, &aad, &plaintext).unwrap();

        let mut audio = vec![0u8; RtpHeader::SIZE];
        header.encode((&mut audio[0..12]).try_into().unwrap());
        audio.extend_from_slice(&ciphertext);
        audio.extend_from_slice(&nonce_tail);

        let mut buf = vec![0u8; AP2_AUDIO_PREFIX_LEN];
        buf[1] = 0xd6;
        buf.extend_from_slice(&audio);

        let msg =
            Ap2ControlReceiver::handle_datagram(&buf, peer(), &config, &cipher, &mut state).unwrap();
        match msg {
            Ap2ControlMessage::Audio(decoded) => {
                assert_eq!(decoded.sequence, 7);
                assert_eq!(decoded.payload, plaintext);
            }
            other => panic!("expected Audio, got {other:?}"),
        }

        // Sanity: the standalone receiver agrees on the same bytes.
        let _ = Ap2AudioReceiver::new(default_cipher());
    }
}
