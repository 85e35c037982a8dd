//! ADTS (Audio Data Transport Stream) framing for the buffered-audio
//! pipeline's AAC payloads (§4.10 stage B).
//!
//! AirPlay 2 buffered audio carries raw AAC-LC access units without ADTS
//! framing; the decoder expects ADTS, so a fixed 7-byte header is
//! synthesised per packet. Profile/frequency/channel fields are pinned to
//! the values this stream always uses rather than parsed from anywhere.

/// MPEG-4 audio object type for AAC-LC, minus one as ADTS encodes it.
pub const AAC_LC_PROFILE: u8 = 2 - 1;
/// Sampling-frequency index for 44.1 kHz in the ADTS frequency table.
pub const SAMPLE_RATE_INDEX_44100: u8 = 4;
/// Channel configuration for stereo.
pub const CHANNEL_CONFIG_STEREO: u8 = 2;

/// Fixed ADTS header length in bytes (no CRC).
pub const ADTS_HEADER_LEN: usize = 7;

/// Prepend a 7-byte ADTS header to a raw AAC access unit.
///
/// Mirrors the reference `addADTStoPacket` helper: syncword, MPEG-4 profile,
/// no CRC, frame length including the header, and a single-AAC-frame buffer
/// fullness/count tail.
pub fn add_adts_header(aac_frame: &[u8]) -> Vec<u8> {
    let frame_len = aac_frame.len() + ADTS_HEADER_LEN;
    let mut out = Vec::with_capacity(frame_len);

    out.push(0xFF);
    out.push(0xF9); // MPEG-4, layer 0, no CRC
    out.push((AAC_LC_PROFILE << 6) | (SAMPLE_RATE_INDEX_44100 << 2) | (CHANNEL_CONFIG_STEREO >> 2));
    out.push(
        ((CHANNEL_CONFIG_STEREO & 0x3) << 6) | ((frame_len >> 11) as u8 & 0x3),
    );
    out.push((frame_len >> 3) as u8);
    out.push((((frame_len & 0x7) as u8) << 5) | 0x1F);
    out.push(0xFC);

    out.extend_from_slice(aac_frame);
    out
}

/// Errors parsing an ADTS header.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AdtsError {
    /// Buffer shorter than [`ADTS_HEADER_LEN`].
    #[error("ADTS header too short: have {0} bytes")]
    TooShort(usize),
    /// The 12-bit syncword didn't match `0xFFF`.
    #[error("bad ADTS syncword")]
    BadSyncword,
}

/// Parsed fields of an ADTS header, plus the frame-length it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// Total frame length (header + payload), in bytes.
    pub frame_length: usize,
}

/// Parse the 7-byte ADTS header at the start of `buf`.
pub fn parse_adts_header(buf: &[u8]) -> Result<AdtsHeader, AdtsError> {
    if buf.len() < ADTS_HEADER_LEN {
        return Err(AdtsError::TooShort(buf.len()));
    }
    if buf[0] != 0xFF || (buf[1] & 0xF0) != 0xF0 {
        return Err(AdtsError::BadSyncword);
    }
    let frame_length =
        (((buf[3] & 0x3) as usize) << 11) | ((buf[4] as usize) << 3) | ((buf[5] as usize) >> 5);
    Ok(AdtsHeader { frame_length })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_frame_length() {
        let aac = vec![0xAA; 100];
        let framed = add_adts_header(&aac);
        let header = parse_adts_header(&framed).unwrap();
        assert_eq!(header.frame_length, framed.len());
        assert_eq!(&framed[ADTS_HEADER_LEN..], &aac[..]);
    }

    #[test]
    fn rejects_bad_syncword() {
        let buf = [0u8; 7];
        assert_eq!(parse_adts_header(&buf), Err(AdtsError::BadSyncword));
    }

    #[test]
    fn rejects_short_buffer() {
        assert_eq!(parse_adts_header(&[0xFF, 0xF9]), Err(AdtsError::TooShort(2)));
    }
}
