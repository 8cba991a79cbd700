//! Wall-clock placement of the first sync.

use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};

/// Time to wait from `now` until the next occurrence of `at`.
///
/// Today if `at` has not passed yet, otherwise tomorrow. Exactly `now`
/// means no wait.
#[must_use]
pub fn delay_until(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let mut target = now.date().and_time(at);
    if now > target {
        target += TimeDelta::days(1);
    }
    (target - now).to_std().unwrap_or(Duration::ZERO)
}
