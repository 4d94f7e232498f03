use std::time::Duration;

use crate::config::ReconnectConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Attempts per burst before the cooldown kicks in.
    pub max_attempts: u32,
    pub cooldown: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 10,
            cooldown: Duration::from_millis(60_000),
        }
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(cfg: &ReconnectConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            max_attempts: cfg.max_attempts.max(1),
            cooldown: Duration::from_millis(cfg.cooldown_ms),
        }
    }
}

impl ReconnectPolicy {
    /// `min(base * 2^(attempt-1), max)`; attempt is 1-based.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exp;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    Retry { attempt: u32, delay: Duration },
    /// Burst exhausted; wait for the cooldown, then `reset`.
    Exhausted { cooldown: Duration },
}

/// Exponential backoff for reconnection, capped per burst.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub fn next_step(&mut self) -> BackoffStep {
        if self.attempt >= self.policy.max_attempts {
            return BackoffStep::Exhausted {
                cooldown: self.policy.cooldown,
            };
        }
        self.attempt += 1;
        BackoffStep::Retry {
            attempt: self.attempt,
            delay: self.policy.delay_for_attempt(self.attempt),
        }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}
