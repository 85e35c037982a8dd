//! Persists a fitted drift model to disk and recovers it in a fresh
//! `DriftStore`, the way a restarted receiver picks up where a classic
//! (AirPlay 1) source's exchange history left off.

use std::net::IpAddr;
use std::str::FromStr;

use airplay_rtp_core::ntp::{DriftStore, NtpExchanger};

#[test]
fn fitted_drift_model_survives_a_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drift.json");

    let mut exchanger = NtpExchanger::new();
    // A steady 10 us/s drift, sampled once a second for long enough that
    // the exchange history (a 16-entry ring) still holds at least 8
    // settled (sequence_number > 20) samples once it fills.
    for i in 0..29i64 {
        let t1 = i * 1_000_000_000;
        let t2 = t1 + 50_000_000 + i * 10_000;
        let t3 = t2 + 1_000_000;
        let t4 = t1 + 100_000_000 + i * 10_000;
        exchanger.record(t1, t2, t3, t4);
    }
    let model = exchanger.fit_drift().expect("settled samples fit a drift model");

    let peer: IpAddr = IpAddr::from_str("192.0.2.1").unwrap();
    {
        let mut store = DriftStore::open(&path).unwrap();
        store.put(peer, model).unwrap();
    }

    let reopened = DriftStore::open(&path).unwrap();
    let recovered = reopened.get(peer).expect("model persisted across reopen");
    assert!((recovered.gradient - model.gradient).abs() < 1e-12);
    assert!((recovered.intercept - model.intercept).abs() < 1e-9);
}

#[test]
fn missing_drift_file_opens_as_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nonexistent.json");
    let store = DriftStore::open(&path).unwrap();
    let peer: IpAddr = IpAddr::from_str("192.0.2.2").unwrap();
    assert!(store.get(peer).is_none());
}
