//! Crate-wide error aggregation.
//!
//! Each subsystem keeps its own precise `thiserror` enum (`ClockError`,
//! `AnchorError`, `TransportError`, `PipelineError`, `OutputError`, ...);
//! this type exists for call sites that want one error to propagate, the
//! same role `AirPlayError` plays in the original client crate.

use crate::buffered::PipelineError;
use crate::clock::{AnchorError, ClockError};
use crate::transport::TransportError;

/// Top-level result alias used at crate boundaries.
pub type CoreResult<T> = Result<T, CoreError>;

/// Aggregate error type for operations that cross subsystem boundaries.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Shared-clock reader failure.
    #[error(transparent)]
    Clock(#[from] ClockError),

    /// Anchor store failure.
    #[error(transparent)]
    Anchor(#[from] AnchorError),

    /// RTP/control transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Buffered-audio pipeline failure.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A configuration or allocation failure encountered during setup.
    ///
    /// Unlike every other variant, this one is fatal: per §7 of the spec,
    /// initialisation failures are the only errors a receive loop may
    /// propagate instead of logging and continuing.
    #[error("fatal configuration error: {0}")]
    FatalConfig(String),
}
