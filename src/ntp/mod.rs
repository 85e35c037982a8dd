//! Classic (AirPlay 1) NTP-style ping exchange and persisted drift model (§4.4).

pub mod drift_store;
pub mod exchanger;
pub mod sample;

pub use drift_store::{DriftModel, DriftStore, DriftStoreError};
pub use exchanger::{
    CadenceScheduler, NtpExchanger, TimingExchangeError, FAST_CADENCE, FAST_CADENCE_COUNT,
    MINIMUM_CHOSEN_SAMPLES, SETTLING_SEQUENCE_THRESHOLD, SLOW_CADENCE,
};
pub use sample::{TimingHistory, TimingSample};
