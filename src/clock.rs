//! A rate-adjustable, pausable monotonic clock over bag timestamps. Every
//! mutator notifies a `Condvar` so that any thread parked in `sleep_until`
//! wakes, re-evaluates, and either returns or resumes waiting against the
//! new state — `sleep_until` reports cancellation rather than silently
//! sleeping on stale parameters.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct ClockState {
    base_bag_time: i64,
    base_wall_time: Instant,
    rate: f64,
    paused: bool,
    paused_at: i64,
    /// Bumped on every mutation so sleepers can detect "something changed"
    /// even when the computed `now()` happens to be unchanged.
    generation: u64,
}

impl ClockState {
    fn now(&self, wall_now: Instant) -> i64 {
        if self.paused {
            return self.paused_at;
        }
        let elapsed = wall_now.saturating_duration_since(self.base_wall_time);
        self.base_bag_time + (elapsed.as_nanos() as f64 * self.rate) as i64
    }
}

/// A rate-controlled, pausable clock over bag time.
pub struct VirtualClock {
    state: Mutex<ClockState>,
    cv: Condvar,
}

impl VirtualClock {
    pub fn new(start_bag_time: i64) -> Self {
        Self {
            state: Mutex::new(ClockState {
                base_bag_time: start_bag_time,
                base_wall_time: Instant::now(),
                rate: 1.0,
                paused: false,
                paused_at: start_bag_time,
                generation: 0,
            }),
            cv: Condvar::new(),
        }
    }

    pub fn now(&self) -> i64 {
        let state = self.lock();
        state.now(Instant::now())
    }

    pub fn rate(&self) -> f64 {
        self.lock().rate
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Blocks until `now() >= target`. Returns `true` once reached, `false`
    /// if a mutator woke this call first — callers must retry with the same
    /// target.
    pub fn sleep_until(&self, target: i64) -> bool {
        let mut state = self.lock();
        let wall_now = Instant::now();
        if state.now(wall_now) >= target {
            return true;
        }
        let generation = state.generation;
        let wait_for = remaining_wall_duration(&state, wall_now, target);
        let (guard, timeout) = self
            .cv
            .wait_timeout(state, wait_for)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state = guard;
        if timeout.timed_out() {
            return state.now(Instant::now()) >= target;
        }
        // Woken by a mutator (generation changed) rather than the timeout
        // elapsing on its own: report cancellation even if `now()` already
        // reached the target, so the caller's loop re-checks its own
        // bookkeeping (e.g. the skip-flag) before publishing.
        if state.generation != generation {
            return false;
        }
        state.now(Instant::now()) >= target
    }

    /// `set_rate(r)`: accepts `r > 0` only. Returns whether it was accepted.
    pub fn set_rate(&self, rate: f64) -> bool {
        if !(rate > 0.0) {
            return false;
        }
        let mut state = self.lock();
        let now = state.now(Instant::now());
        state.base_bag_time = now;
        state.base_wall_time = Instant::now();
        state.rate = rate;
        state.generation += 1;
        self.cv.notify_all();
        true
    }

    pub fn pause(&self) {
        let mut state = self.lock();
        if state.paused {
            return;
        }
        state.paused_at = state.now(Instant::now());
        state.paused = true;
        state.generation += 1;
        self.cv.notify_all();
    }

    pub fn resume(&self) {
        let mut state = self.lock();
        if !state.paused {
            return;
        }
        state.base_bag_time = state.paused_at;
        state.base_wall_time = Instant::now();
        state.paused = false;
        state.generation += 1;
        self.cv.notify_all();
    }

    /// `jump(t)`: force `now()` to `t` without touching `paused`/`rate`.
    pub fn jump(&self, t: i64) {
        let mut state = self.lock();
        state.base_bag_time = t;
        state.base_wall_time = Instant::now();
        if state.paused {
            state.paused_at = t;
        }
        state.generation += 1;
        self.cv.notify_all();
    }

    /// A poisoned clock mutex means some mutator panicked mid-update; the
    /// `ClockState` it leaves behind is still a plain struct of plain
    /// fields, so recovering the guard keeps every other thread's pacing
    /// alive instead of cascading the panic into the whole pipeline.
    fn lock(&self) -> std::sync::MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn remaining_wall_duration(state: &ClockState, wall_now: Instant, target: i64) -> Duration {
    if state.paused {
        // Nothing advances the clock while paused; park until woken by a
        // mutator rather than busy-polling a target that can't be reached.
        return Duration::from_secs(3600);
    }
    let bag_delta = target - state.now(wall_now);
    if bag_delta <= 0 {
        return Duration::ZERO;
    }
    let wall_nanos = bag_delta as f64 / state.rate;
    if !wall_nanos.is_finite() || wall_nanos < 0.0 {
        return Duration::from_secs(3600);
    }
    Duration::from_nanos(wall_nanos.min(u64::MAX as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn now_advances_with_rate() {
        let clock = VirtualClock::new(0);
        clock.set_rate(1_000_000_000.0); // 1 bag-second per wall-nanosecond, for a fast test
        thread::sleep(Duration::from_millis(1));
        assert!(clock.now() > 0);
    }

    #[test]
    fn pause_freezes_now() {
        let clock = VirtualClock::new(0);
        clock.set_rate(1_000_000_000.0);
        clock.pause();
        let first = clock.now();
        thread::sleep(Duration::from_millis(2));
        assert_eq!(clock.now(), first);
    }

    #[test]
    fn jump_moves_now_immediately() {
        let clock = VirtualClock::new(0);
        clock.jump(5_000);
        assert_eq!(clock.now(), 5_000);
    }

    #[test]
    fn sleep_until_reached_returns_true() {
        let clock = VirtualClock::new(1_000);
        assert!(clock.sleep_until(500));
    }

    #[test]
    fn pause_wakes_sleeper_with_false() {
        let clock = Arc::new(VirtualClock::new(0));
        let sleeper = Arc::clone(&clock);
        let handle = thread::spawn(move || sleeper.sleep_until(i64::MAX));
        thread::sleep(Duration::from_millis(20));
        clock.pause();
        assert_eq!(handle.join().unwrap(), false);
    }

    #[test]
    fn set_rate_rejects_non_positive() {
        let clock = VirtualClock::new(0);
        assert!(!clock.set_rate(0.0));
        assert!(!clock.set_rate(-1.0));
        assert_eq!(clock.rate(), 1.0);
    }
}
