//! Bounded byte queue feeding the buffered-audio pipeline's deframer stage,
//! filled by a blocking TCP reader thread (§4.10 stage A).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A bounded byte queue with blocking push/pop, used to hand raw TCP bytes
/// from the reader thread to the deframer thread without an async runtime.
pub struct TcpByteQueue {
    state: Mutex<VecDeque<u8>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl TcpByteQueue {
    /// Construct a queue that holds at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Push `bytes`, blocking while the queue is full.
    pub fn push(&self, bytes: &[u8]) {
        let mut guard = self.state.lock().unwrap();
        for &byte in bytes {
            while guard.len() >= self.capacity {
                guard = self.not_full.wait(guard).unwrap();
            }
            guard.push_back(byte);
        }
        drop(guard);
        self.not_empty.notify_all();
    }

    /// Pop exactly `len` bytes, blocking until that many are available.
    pub fn pop_exact(&self, len: usize) -> Vec<u8> {
        let mut guard = self.state.lock().unwrap();
        while guard.len() < len {
            guard = self.not_empty.wait(guard).unwrap();
        }
        let out: Vec<u8> = guard.drain(..len).collect();
        drop(guard);
        self.not_full.notify_all();
        out
    }

    /// Pop up to `len` bytes, waiting at most `timeout`; returns fewer bytes
    /// (possibly zero) if the timeout elapses first.
    pub fn pop_up_to(&self, len: usize, timeout: Duration) -> Vec<u8> {
        let guard = self.state.lock().unwrap();
        let (mut guard, _) = self
            .not_empty
            .wait_timeout_while(guard, timeout, |q| q.is_empty())
            .unwrap();
        let take = len.min(guard.len());
        let out: Vec<u8> = guard.drain(..take).collect();
        drop(guard);
        self.not_full.notify_all();
        out
    }

    /// Discard all queued bytes (used by flush handling).
    pub fn clear(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.clear();
        drop(guard);
        self.not_full.notify_all();
    }

    /// Number of bytes currently queued.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().len()
    }

    /// True if no bytes are currently queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
