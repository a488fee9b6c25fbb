use getrandom::getrandom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Sleeps in short slices so a raised stop flag is noticed quickly. Returns
/// false when the stop flag was raised.
pub(crate) fn sleep_with_stop(stop: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::from_millis(0) {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(Duration::from_millis(50));
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::Relaxed)
}

/// Poll interval plus up to a quarter of it at random, so idle workers do
/// not hit the store in lockstep.
pub(crate) fn jittered_interval(interval: Duration) -> Duration {
    let spread_ms = (interval.as_millis() / 4) as u64;
    if spread_ms == 0 {
        return interval;
    }
    let mut bytes = [0_u8; 4];
    if getrandom(&mut bytes).is_err() {
        return interval;
    }
    let extra = u64::from(u32::from_le_bytes(bytes)) % (spread_ms + 1);
    interval + Duration::from_millis(extra)
}
