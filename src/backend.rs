// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! The cluster-side capability consumed by the discovery engines.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::DiscoveryError;
use crate::retry::RetryStrategy;
use crate::selector::Selector;
use crate::watch::WatchHandle;

/// A source of raw cluster objects: one-shot lists and long-lived watches.
///
/// Implementations own transport, authentication and reconnect mechanics;
/// the engines stay agnostic to what is being watched as long as an instance
/// mapper exists for `Object`. [`KubeBackend`](crate::KubeBackend) talks to
/// a real cluster, [`InMemoryBackend`](crate::InMemoryBackend) answers from
/// seeded fixtures.
#[async_trait]
pub trait DiscoveryBackend: Send + Sync + 'static {
    /// Raw object type produced by lists and watches
    type Object: Send + 'static;

    /// List all objects currently matching the selector.
    async fn list(&self, selector: &Selector) -> Result<Vec<Self::Object>, DiscoveryError>;

    /// Open a watch stream for the selector.
    ///
    /// Must not block: stream establishment happens behind the returned
    /// handle. The handle yields events until the stream fails terminally
    /// (per the retry strategy) or `cancel` fires.
    fn watch(
        &self,
        selector: &Selector,
        retry: RetryStrategy,
        cancel: CancellationToken,
    ) -> WatchHandle<Self::Object>;

    /// Release any underlying connections.
    async fn shutdown(&self) -> Result<(), DiscoveryError>;
}
