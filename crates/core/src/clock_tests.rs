// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

#[test]
fn system_clock_returns_increasing_time() {
    let clock = SystemClock;
    let t1 = clock.now();
    std::thread::sleep(Duration::from_millis(1));
    let t2 = clock.now();
    assert!(t2 > t1);
}

#[test]
fn fake_clock_advances_both_readings() {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let clock = FakeClock::at(start);
    let t1 = clock.now();

    clock.advance(Duration::from_secs(60));

    assert!(clock.now().duration_since(t1) >= Duration::from_secs(60));
    assert_eq!(clock.utc_now(), start + chrono::Duration::seconds(60));
}

#[test]
fn fake_clock_is_cloneable_and_shared() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    let before = clock1.utc_now();
    clock2.advance(Duration::from_secs(30));
    assert_eq!(clock1.utc_now() - before, chrono::Duration::seconds(30));
}
