//! Buffered-audio pipeline (§4.10): glues the TCP reader queue, deframer,
//! AAC decoder, resampler, and PCM output queue into the four-stage
//! pipeline described there.

use std::sync::Arc;

use fdk_aac::dec::{Decoder, DecoderError, Transport};
use rubato::{FftFixedInOut, Resampler};

use crate::buffered::adts::AdtsError;
use crate::buffered::deframer::{Deframer, DeframerError};
use crate::buffered::pcm_queue::{PcmBlock, PcmQueue, FRAMES_PER_BLOCK};
use crate::buffered::tcp_queue::TcpByteQueue;
use crate::protocol::crypto::chacha::ChaCha20Poly1305Cipher;

/// Errors from any stage of the buffered-audio pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Stage B: record decryption failed.
    #[error(transparent)]
    Deframe(#[from] DeframerError),
    /// Stage B: ADTS framing was malformed.
    #[error(transparent)]
    Adts(#[from] AdtsError),
    /// Stage C: AAC decode failed.
    #[error("AAC decode failed: {0:?}")]
    Decode(DecoderError),
    /// Stage C: resampling failed.
    #[error("resample failed: {0}")]
    Resample(String),
}

/// One decoded, resampled block ready for the audio output back end,
/// paired with the RTP timestamp it was decoded from.
pub type DecodedBlock = PcmBlock;

/// Drives stages A-D of the buffered-audio pipeline for one session.
pub struct BufferedAudioPipeline {
    tcp_queue: Arc<TcpByteQueue>,
    deframer: Deframer,
    decoder: Decoder,
    resampler: Option<FftFixedInOut<f64>>,
    pcm_queue: PcmQueue,
}

impl BufferedAudioPipeline {
    /// Construct a pipeline fed from `tcp_queue`, decrypting with `cipher`.
    /// `output_rate` is the audio output back end's sample rate; a
    /// resampler stage is only built when it differs from the AAC decode
    /// rate of 44100 Hz.
    pub fn new(tcp_queue: Arc<TcpByteQueue>, cipher: ChaCha20Poly1305Cipher, output_rate: u32, capacity_blocks: usize) -> Self {
        let decoder = Decoder::new(Transport::Adts);
        let resampler = if output_rate != 44_100 {
            FftFixedInOut::<f64>::new(44_100, output_rate as usize, FRAMES_PER_BLOCK as usize, 2).ok()
        } else {
            None
        };

        Self {
            tcp_queue,
            deframer: Deframer::new(cipher),
            decoder,
            resampler,
            pcm_queue: PcmQueue::new(capacity_blocks),
        }
    }

    /// Stage B+C: block for the next record, decrypt+ADTS-frame it, decode
    /// it to PCM, resample if needed, and push the result onto the PCM
    /// queue (stage D).
    pub fn decode_next(&mut self) -> Result<(), PipelineError> {
        let adts_frame = self.deframer.next_frame(&self.tcp_queue)?;

        self.decoder.fill(&adts_frame).map_err(|e| {
            tracing::warn!(error = ?e, "AAC decoder rejected buffered-audio frame");
            PipelineError::Decode(e)
        })?;

        let mut pcm = vec![0i16; (FRAMES_PER_BLOCK as usize) * 2];
        let decoded_samples = self.decoder.decode_frame(&mut pcm).map_err(|e| {
            tracing::warn!(error = ?e, "AAC frame decode failed");
            PipelineError::Decode(e)
        })?;
        pcm.truncate(decoded_samples);

        let samples = match &mut self.resampler {
            Some(resampler) => Self::resample(resampler, &pcm)?,
            None => pcm,
        };

        // The RTP timestamp for this block is tracked by the higher-level
        // session loop (it owns sequence/timestamp bookkeeping from the
        // TCP stream framing, not the pipeline); callers attach it via
        // `push_with_timestamp`.
        self.pcm_queue.push(PcmBlock {
            rtp_timestamp: 0,
            samples,
        });
        Ok(())
    }

    fn resample(resampler: &mut FftFixedInOut<f64>, pcm: &[i16]) -> Result<Vec<i16>, PipelineError> {
        let left: Vec<f64> = pcm.iter().step_by(2).map(|&s| s as f64 / i16::MAX as f64).collect();
        let right: Vec<f64> = pcm.iter().skip(1).step_by(2).map(|&s| s as f64 / i16::MAX as f64).collect();

        let out = resampler.process(&[left, right], None).map_err(|e| {
            tracing::warn!(error = %e, "resampler rejected buffered-audio block");
            PipelineError::Resample(e.to_string())
        })?;

        let frames = out[0].len();
        let mut interleaved = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            interleaved.push((out[0][i] * i16::MAX as f64) as i16);
            interleaved.push((out[1][i] * i16::MAX as f64) as i16);
        }
        Ok(interleaved)
    }

    /// Attach the correct RTP timestamp to the most recently decoded block
    /// and re-tag it before it's handed to the output back end. The
    /// session loop calls this right after `decode_next` using the
    /// timestamp carried by the buffered-audio record it just consumed.
    pub fn retag_last(&mut self, rtp_timestamp: u32) {
        if let Some(back) = self.pcm_queue_back_mut() {
            back.rtp_timestamp = rtp_timestamp;
        }
    }

    fn pcm_queue_back_mut(&mut self) -> Option<&mut PcmBlock> {
        self.pcm_queue.back_mut()
    }

    /// Pop the next block ready for playback.
    pub fn pop_ready(&mut self) -> Option<DecodedBlock> {
        self.pcm_queue.pop()
    }

    /// Flush everything up to and including `until_ts` (§4.10 flush algorithm).
    pub fn flush_through(&mut self, until_ts: u32) {
        self.pcm_queue.flush_through(until_ts);
        self.tcp_queue.clear();
    }

    /// Discard all buffered state unconditionally.
    pub fn flush_all(&mut self) {
        self.pcm_queue.flush_all();
        self.tcp_queue.clear();
    }
}
