// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error taxonomy for discovery operations.
//!
//! Unusable objects never appear here — they are filtered by the instance
//! mappers. Everything that does reach a caller is one of the variants
//! below: a failed API call, a terminally failed watch transport, a missed
//! lookup deadline, or use after shutdown.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by lookups, subscriptions and shutdown.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A list or watch call against the cluster API failed.
    #[error("kubernetes API request failed")]
    Api(#[from] kube::Error),

    /// The watch transport failed without a structured cause.
    #[error("watch transport failure: {0}")]
    Transport(String),

    /// The local kubeconfig could not be loaded.
    #[error("failed to load kubeconfig")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// No usable kubeconfig context.
    #[error("kubeconfig context error: {0}")]
    Context(String),

    /// A lookup did not complete within its deadline.
    #[error("lookup did not complete within {0:?}")]
    DeadlineExceeded(Duration),

    /// The discovery facade has already been shut down.
    #[error("service discovery has been shut down")]
    ShutDown,
}

impl DiscoveryError {
    /// Whether a watch attempt that failed with this error may be retried.
    ///
    /// Network-level failures and 429/503/504 responses are transient. A 410
    /// means the watch window expired; the next attempt re-lists, so it is
    /// retryable too. Everything else ends the stream.
    pub fn is_retryable(&self) -> bool {
        match self {
            DiscoveryError::Api(kube::Error::HyperError(_)) => true,
            DiscoveryError::Api(kube::Error::Api(response)) => {
                matches!(response.code, 410 | 429 | 503 | 504)
            }
            DiscoveryError::Api(_) => false,
            DiscoveryError::Transport(_) => true,
            DiscoveryError::Kubeconfig(_)
            | DiscoveryError::Context(_)
            | DiscoveryError::DeadlineExceeded(_)
            | DiscoveryError::ShutDown => false,
        }
    }
}
