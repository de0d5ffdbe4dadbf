use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Think time for a clock-based `go`: a fortieth of the remaining time plus
/// most of the increment (when the clock comfortably covers it), floored so
/// the engine always thinks a little, and capped so one move can never
/// drain the clock.
pub fn think_time_ms(remaining_ms: u64, increment_ms: u64) -> u64 {
    let mut think = remaining_ms / 40;
    if remaining_ms > increment_ms * 2 {
        think += increment_ms * 8 / 10;
    }
    let min_think = (remaining_ms / 4).min(50);
    think = think.max(min_think);
    think.min((remaining_ms / 2).max(1))
}

/// Arm a one-shot timeout tied to a search generation. The sleeper sets the
/// abort flag only if its generation is still current when it wakes, so
/// superseded timers silently no-op.
pub fn arm_timeout(
    abort: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    id: u64,
    budget: Duration,
) {
    thread::spawn(move || {
        thread::sleep(budget);
        if generation.load(Ordering::SeqCst) == id {
            abort.store(true, Ordering::SeqCst);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typical_clock_allocation() {
        // 60s + 1s increment: 1.5s base + 0.8s increment
        assert_eq!(think_time_ms(60_000, 1_000), 2_300);
    }

    #[test]
    fn increment_ignored_when_clock_is_short() {
        // remaining <= 2 * increment: no increment share, floor applies
        assert_eq!(think_time_ms(1_000, 800), 50);
    }

    #[test]
    fn floor_scales_down_with_tiny_clocks() {
        // min(50, remaining / 4) keeps the floor below the clock itself
        let think = think_time_ms(100, 0);
        assert!(think >= 25 && think <= 50);
    }

    #[test]
    fn never_exceeds_half_the_clock() {
        for remaining in [10u64, 100, 1_000, 100_000] {
            for inc in [0u64, 10, 1_000, 10_000] {
                assert!(think_time_ms(remaining, inc) <= (remaining / 2).max(1));
            }
        }
    }

    #[test]
    fn stale_timeout_does_not_fire() {
        let abort = Arc::new(AtomicBool::new(false));
        let generation = Arc::new(AtomicU64::new(1));
        arm_timeout(abort.clone(), generation.clone(), 1, Duration::from_millis(20));
        // supersede the timer before it wakes
        generation.store(2, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(60));
        assert!(!abort.load(Ordering::SeqCst));

        arm_timeout(abort.clone(), generation.clone(), 2, Duration::from_millis(10));
        thread::sleep(Duration::from_millis(60));
        assert!(abort.load(Ordering::SeqCst));
    }
}
