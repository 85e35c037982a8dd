//! Exercises the clock anchoring path (shared-clock read -> anchor ->
//! time translator) the way a receiver's session loop would, without any
//! real shared memory segment.

use std::cell::RefCell;

use airplay_rtp_core::clock::{
    Anchor, AnchorStore, ClockError, ClockInfo, ClockSource, RateMode, TimeTranslator,
};

struct FakeSource {
    next: RefCell<Result<ClockInfo, ClockError>>,
}

impl FakeSource {
    fn new(info: ClockInfo) -> Self {
        Self {
            next: RefCell::new(Ok(info)),
        }
    }

    fn set(&self, info: ClockInfo) {
        *self.next.borrow_mut() = Ok(info);
    }
}

impl ClockSource for FakeSource {
    fn get_clock_info(&self) -> Result<ClockInfo, ClockError> {
        self.next.borrow().clone()
    }
}

#[test]
fn anchor_refresh_feeds_a_working_time_translator() {
    let source = FakeSource::new(ClockInfo {
        clock_id: 7,
        local_time: 10_000_000_000,
        offset_to_master: 2_000_000,
        mastership_start: 0,
    });

    let mut store = AnchorStore::new();
    let (anchor, _status) = store.refresh(&source).expect("first refresh always succeeds");

    let translator = TimeTranslator::new(anchor, 0, 44_100, RateMode::Nominal);

    let one_second_later = translator.frame_to_local_time(44_100);
    assert_eq!(one_second_later, anchor.local_time as i64 + 1_000_000_000);

    let round_tripped = translator.local_time_to_frame(one_second_later);
    assert_eq!(round_tripped, 44_100);
}

#[test]
fn anchor_rebase_is_invisible_to_an_in_flight_translator() {
    let source = FakeSource::new(ClockInfo {
        clock_id: 1,
        local_time: 1_000_000_000,
        offset_to_master: 500_000,
        mastership_start: 0,
    });
    let mut store = AnchorStore::new();
    let (first, _) = store.refresh(&source).unwrap();
    let translator = TimeTranslator::new(first, 0, 44_100, RateMode::Nominal);

    // A different master clock observed only momentarily must not move the
    // cached anchor (debounce window hasn't elapsed).
    source.set(ClockInfo {
        clock_id: 2,
        local_time: 1_100_000_000,
        offset_to_master: 10_000,
        mastership_start: 0,
    });
    let (second, status) = store.refresh(&source).unwrap();
    assert_eq!(second.clock_id, 1);
    assert_eq!(second, first);
    assert_eq!(
        translator.frame_to_local_time(0),
        TimeTranslator::new(second, 0, 44_100, RateMode::Nominal).frame_to_local_time(0)
    );
    let _ = status;
}

fn _assert_anchor_is_copy(a: Anchor) -> Anchor {
    a
}
