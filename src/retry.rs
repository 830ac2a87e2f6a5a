// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Reconnect policy for failed watch streams.
//!
//! A [`RetryStrategy`] is pure policy: whether attempt N may happen and how
//! long to wait before it. The watch driver owns the attempt counter and the
//! actual sleeping; strategies are small `Copy` values shared read-only by
//! every stream that references them.

use std::time::Duration;

/// Whether a failed watch stream should be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Never reconnect; the first failure is terminal
    Never,
    /// Reconnect until the subscription is cancelled
    Always,
    /// Reconnect at most this many times
    Limited(u32),
}

/// Delay applied before a reconnect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Constant delay between attempts
    Fixed(Duration),
    /// `base * 2^(attempt - 1)`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

/// Policy governing whether and when a failed watch stream is reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryStrategy {
    pub policy: RetryPolicy,
    pub backoff: Backoff,
}

impl RetryStrategy {
    pub fn new(policy: RetryPolicy, backoff: Backoff) -> Self {
        Self { policy, backoff }
    }

    /// Strategy that gives up on the first failure.
    pub fn never() -> Self {
        Self::new(RetryPolicy::Never, Backoff::Fixed(Duration::ZERO))
    }

    /// Whether reconnect attempt `attempt` (1-based) may be made.
    pub fn should_retry(&self, attempt: u32) -> bool {
        match self.policy {
            RetryPolicy::Never => false,
            RetryPolicy::Always => true,
            RetryPolicy::Limited(max_attempts) => attempt <= max_attempts,
        }
    }

    /// Delay to sleep before reconnect attempt `attempt` (1-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let factor = 1u32
                    .checked_shl(attempt.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                base.checked_mul(factor).map_or(max, |delay| delay.min(max))
            }
        }
    }
}

impl Default for RetryStrategy {
    /// Reconnect forever with a fixed ten second delay.
    fn default() -> Self {
        Self::new(RetryPolicy::Always, Backoff::Fixed(Duration::from_secs(10)))
    }
}
