//! Exercises the TCP byte queue and PCM output queue under concurrent
//! producer/consumer threads, the shape the buffered-audio pipeline uses
//! them in between a socket-reader thread and an output-callback thread.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use airplay_rtp_core::buffered::{PcmBlock, PcmQueue, TcpByteQueue};

#[test]
fn tcp_queue_pop_exact_blocks_until_a_concurrent_push_arrives() {
    let queue = Arc::new(TcpByteQueue::new(4096));
    let reader = queue.clone();

    let handle = thread::spawn(move || reader.pop_exact(5));

    thread::sleep(Duration::from_millis(20));
    queue.push(b"hel");
    thread::sleep(Duration::from_millis(20));
    queue.push(b"lo!");

    let popped = handle.join().unwrap();
    assert_eq!(&popped, b"hello");
    assert_eq!(queue.len(), 1); // the trailing '!' stays queued
}

#[test]
fn pcm_queue_flush_through_drops_only_stale_blocks() {
    let mut queue = PcmQueue::new(8);
    for ts in [0u32, 352, 704, 1056] {
        queue.push(PcmBlock {
            rtp_timestamp: ts,
            samples: vec![0i16; 4],
        });
    }

    queue.flush_through(704);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.pop().unwrap().rtp_timestamp, 1056);
}
