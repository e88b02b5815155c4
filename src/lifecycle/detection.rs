//! Player detection backoff

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff for finding the media element
///
/// After an immediate probe, detection retries `max_attempts` times, waiting
/// `base_delay_ms * 2^(n-1)` before retry `n`. `max_attempts` counts retries
/// only, so the page is looked at `max_attempts + 1` times in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
        }
    }
}

impl DetectionPolicy {
    /// Delay before retry `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Progress of the current detection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionState {
    /// Not looking (off a playback page, or torn down)
    #[default]
    Idle,
    /// Waiting for retry `attempt`
    Pending { attempt: u32 },
    /// Media element found and attached
    Attached,
    /// Every retry missed; inert until the next mutation
    GaveUp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays_double_from_500ms() {
        let policy = DetectionPolicy::default();
        let delays: Vec<u64> = (1..=policy.max_attempts)
            .map(|attempt| policy.delay_for(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000]);
    }

    #[test]
    fn test_large_attempt_saturates() {
        let policy = DetectionPolicy {
            max_attempts: 200,
            base_delay_ms: 500,
        };
        assert_eq!(policy.delay_for(100), Duration::from_millis(u64::MAX));
    }
}
