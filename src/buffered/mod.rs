//! AP2 buffered-audio pipeline: TCP reader queue, deframer, AAC decode,
//! resample, and the 352-frame-aligned PCM output queue (§4.10).

pub mod adts;
pub mod deframer;
pub mod pcm_queue;
pub mod pipeline;
pub mod tcp_queue;

pub use adts::{add_adts_header, parse_adts_header, AdtsError, AdtsHeader};
pub use deframer::{Deframer, DeframerError};
pub use pcm_queue::{PcmBlock, PcmQueue, FRAMES_PER_BLOCK};
pub use pipeline::{BufferedAudioPipeline, PipelineError};
pub use tcp_queue::TcpByteQueue;
