use std::time::Duration;

use tracing::debug;

/// Throttling applied before every uncached request to the upstream service.
pub trait DelayPolicy {
    async fn wait(&self, min: Duration, max: Duration);
}

/// Chosen at runtime: `Disabled` for `--no-delay` and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    /// Sleep for a uniformly random duration within `[min, max]`.
    Random,
    Disabled,
}

impl Throttle {
    pub fn new(enabled: bool) -> Self {
        if enabled {
            Throttle::Random
        } else {
            Throttle::Disabled
        }
    }
}

impl DelayPolicy for Throttle {
    async fn wait(&self, min: Duration, max: Duration) {
        match self {
            Throttle::Random => {
                let delay = pick_delay(min, max);
                debug!(delay_ms = delay.as_millis() as u64, "throttling before request");
                tokio::time::sleep(delay).await;
            }
            Throttle::Disabled => {}
        }
    }
}

fn pick_delay(min: Duration, max: Duration) -> Duration {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    let lo_ms = lo.as_millis() as u64;
    let hi_ms = hi.as_millis() as u64;
    Duration::from_millis(fastrand::u64(lo_ms..=hi_ms))
}
