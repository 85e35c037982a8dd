//! Buffered-audio stage B: pull length-framed records off the TCP byte
//! queue, AEAD-decrypt each, and synthesise an ADTS header for the decoder
//! (§4.10 stage B).
//!
//! Each record carries a 12-byte leading header (not otherwise decoded by
//! this stage) followed by ciphertext and an 8-byte trailing wire nonce,
//! front-padded with zeros to the 12-byte ChaCha20 nonce — the same
//! trailing-nonce convention as the realtime-audio path (§4.9), grounded
//! on `examples/original_source/rtp.c:2285-2301`.

use crate::buffered::adts::add_adts_header;
use crate::buffered::tcp_queue::TcpByteQueue;
use crate::protocol::crypto::chacha::{ChaCha20Poly1305Cipher, Nonce};

/// Length of the big-endian record-length prefix, in bytes.
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Leading per-record header length, stripped and not otherwise decoded by
/// this stage.
pub const RECORD_HEADER_LEN: usize = 12;

/// Trailing wire-nonce length.
pub const RECORD_NONCE_LEN: usize = 8;

/// Errors from the deframer stage.
#[derive(Debug, thiserror::Error)]
pub enum DeframerError {
    /// Record too short to hold the header and trailing nonce.
    #[error("buffered-audio record too short: needed {needed}, have {have}")]
    TooShort {
        /// Minimum length required.
        needed: usize,
        /// Actual length received.
        have: usize,
    },
    /// AEAD decryption/authentication failed for a record.
    #[error("buffered-audio record decryption failed: {0}")]
    Decrypt(String),
}

/// Reads length-prefixed encrypted records from a [`TcpByteQueue`] and
/// yields ADTS-framed AAC access units.
pub struct Deframer {
    cipher: ChaCha20Poly1305Cipher,
}

impl Deframer {
    /// Construct a deframer using the session's buffered-audio AEAD cipher.
    pub fn new(cipher: ChaCha20Poly1305Cipher) -> Self {
        Self { cipher }
    }

    /// Block on `queue` for the next record, decrypt it, and return it
    /// ADTS-framed and ready for the AAC decoder.
    pub fn next_frame(&mut self, queue: &TcpByteQueue) -> Result<Vec<u8>, DeframerError> {
        let length_bytes = queue.pop_exact(LENGTH_PREFIX_LEN);
        let record_len = u16::from_be_bytes([length_bytes[0], length_bytes[1]]) as usize;
        let record = queue.pop_exact(record_len);

        let minimum = RECORD_HEADER_LEN + RECORD_NONCE_LEN;
        if record.len() < minimum {
            return Err(DeframerError::TooShort {
                needed: minimum,
                have: record.len(),
            });
        }

        let ciphertext_end = record.len() - RECORD_NONCE_LEN;
        let ciphertext = &record[RECORD_HEADER_LEN..ciphertext_end];
        let nonce_tail = &record[ciphertext_end..];

        let mut full_nonce = [0u8; 12];
        full_nonce[4..12].copy_from_slice(nonce_tail);
        let nonce = Nonce::from_bytes(&full_nonce).expect("fixed-size nonce buffer");

        let plaintext = self.cipher.decrypt(&nonce, ciphertext).map_err(|e| {
            tracing::debug!(error = %e, "buffered-audio record decryption failed");
            DeframerError::Decrypt(e.to_string())
        })?;

        Ok(add_adts_header(&plaintext))
    }
}
