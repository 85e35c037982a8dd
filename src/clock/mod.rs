//! Clock anchoring subsystem (§4.1 - §4.3): shared-clock reader, anchor
//! store, and RTP-frame/local-time translator.

pub mod anchor;
pub mod shared;
pub mod translator;

pub use anchor::{Anchor, AnchorError, AnchorStatus, AnchorStore};
pub use shared::{ClockError, ClockInfo, ClockSet, ClockSource, SharedClockReader, ShmRecord};
pub use translator::{RateMode, TimeTranslator};
