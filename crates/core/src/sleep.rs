use rand::Rng;
use std::thread;
use std::time::Duration;

/// Blocking delay. Every wait in the crate goes through this so tests can
/// record delays instead of sleeping.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Uniform random duration in seconds between `a` and `b` (either order).
pub fn uniform_secs<R: Rng + ?Sized>(rng: &mut R, a: f64, b: f64) -> Duration {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let secs = if lo == hi { lo } else { rng.gen_range(lo..=hi) };
    Duration::from_secs_f64(secs.max(0.0))
}

/// `secs` shifted by up to `spread` seconds either way, never negative.
pub fn jittered<R: Rng + ?Sized>(rng: &mut R, secs: f64, spread: f64) -> Duration {
    let actual = secs + rng.gen_range(-spread..=spread);
    Duration::from_secs_f64(actual.max(0.0))
}
