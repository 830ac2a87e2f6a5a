// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration for the discovery facade.

use std::time::Duration;

use crate::retry::RetryStrategy;

/// Deadline applied to lookups when the caller does not pass one
const DEFAULT_LOOKUP_DEADLINE: Duration = Duration::from_secs(1);

/// Configuration for a [`ServiceDiscovery`](crate::ServiceDiscovery)
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Reconnect behavior for subscription watch streams
    pub retry: RetryStrategy,
    /// Deadline for lookups that do not specify their own
    pub lookup_deadline: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            retry: RetryStrategy::default(),
            lookup_deadline: DEFAULT_LOOKUP_DEADLINE,
        }
    }
}
