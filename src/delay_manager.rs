use std::ops::RangeInclusive;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use rand::Rng;

use crate::error::{Error, Result};

/// Bounded exponential backoff with an overall deadline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub deadline: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, deadline: Duration) -> Self {
        Backoff { initial, max, deadline }
    }

    /// Polling policy used for waits bounded by `deadline`.
    pub fn polling(deadline: Duration) -> Self {
        Backoff::new(Duration::from_millis(200), Duration::from_secs(2), deadline)
    }

    /// Delay to sleep before attempt `attempt` (0-based), doubling up to `max`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// Polls `probe` until it reports ready or the deadline passes.
///
/// Returns `Ok(true)` when the condition was met and `Ok(false)` on deadline.
/// Errors from the probe abort the wait.
pub fn wait_until<F>(policy: &Backoff, mut probe: F) -> Result<bool>
where
    F: FnMut() -> Result<bool>,
{
    let started = Instant::now();
    let mut attempt = 0;
    loop {
        if probe()? {
            return Ok(true);
        }
        let elapsed = started.elapsed();
        if elapsed >= policy.deadline {
            return Ok(false);
        }
        let remaining = policy.deadline - elapsed;
        sleep_jittered(policy.delay_for(attempt).min(remaining));
        attempt += 1;
    }
}

/// Like [`wait_until`] but a missed deadline is an [`Error::Timeout`].
pub fn wait_for<F>(policy: &Backoff, what: &str, probe: F) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    if wait_until(policy, probe)? {
        Ok(())
    } else {
        Err(Error::Timeout {
            what: what.to_string(),
            elapsed: policy.deadline,
        })
    }
}

/// Retries `op` while it keeps failing transiently, at most `attempts` times in total.
pub fn retry_transient<T, F>(policy: &Backoff, attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                debug!("Transient failure (attempt {}): {}", attempt + 1, e);
                sleep_jittered(policy.delay_for(attempt));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Short randomized pause between listings.
pub fn listing_pause(range_ms: &RangeInclusive<u64>) {
    if range_ms.is_empty() || *range_ms.end() == 0 {
        return;
    }
    let mut rng = rand::thread_rng();
    let delay_ms = rng.gen_range(range_ms.clone());
    debug!("Pausing for {} ms between listings...", delay_ms);
    thread::sleep(Duration::from_millis(delay_ms));
}

fn sleep_jittered(base: Duration) {
    if base.is_zero() {
        return;
    }
    // Up to 10% extra so repeated polls don't line up with page timers.
    let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 10);
    thread::sleep(base + Duration::from_millis(jitter_ms));
}
