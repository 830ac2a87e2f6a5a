// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Public service-discovery facade.
//!
//! [`ServiceDiscovery`] composes the lookup and subscription engines over a
//! backend and an instance mapper: `lookup` answers "who is there right
//! now", `subscribe` streams membership growth, `shutdown` tears everything
//! down exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;

use crate::backend::DiscoveryBackend;
use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::instance::{Instance, InstanceMapper};
use crate::lookup::LookupEngine;
use crate::selector::Selector;
use crate::subscription::{
    CompletionReason, CompletionSlot, OnComplete, OnNext, Subscription, SubscriptionEngine,
};

/// Service discovery facade over a [`DiscoveryBackend`].
pub struct ServiceDiscovery<B: DiscoveryBackend> {
    backend: Arc<B>,
    lookup: LookupEngine<B>,
    subscriptions: SubscriptionEngine<B>,
    config: DiscoveryConfig,
    shut_down: AtomicBool,
}

impl<B: DiscoveryBackend> ServiceDiscovery<B> {
    /// Build a facade over a backend and an instance mapper.
    ///
    /// The mapper decides what "usable" means for the watched resource
    /// kind; see [`pod_instance`](crate::pod_instance) for pods.
    pub fn new<M>(backend: B, mapper: M, config: DiscoveryConfig) -> Self
    where
        M: Fn(&B::Object) -> Option<Instance> + Send + Sync + 'static,
    {
        let backend = Arc::new(backend);
        let mapper: InstanceMapper<B::Object> = Arc::new(mapper);
        Self {
            lookup: LookupEngine::new(Arc::clone(&backend), Arc::clone(&mapper)),
            subscriptions: SubscriptionEngine::new(Arc::clone(&backend), mapper, config.retry),
            backend,
            config,
            shut_down: AtomicBool::new(false),
        }
    }

    /// One-shot lookup with the configured default deadline.
    pub async fn lookup(&self, selector: &Selector) -> Result<Vec<Instance>, DiscoveryError> {
        self.lookup_within(selector, self.config.lookup_deadline)
            .await
    }

    /// One-shot lookup bounded by an explicit deadline. Never retried; the
    /// caller re-invokes if it wants another attempt.
    pub async fn lookup_within(
        &self,
        selector: &Selector,
        deadline: Duration,
    ) -> Result<Vec<Instance>, DiscoveryError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(DiscoveryError::ShutDown);
        }
        match tokio::time::timeout(deadline, self.lookup.lookup(selector)).await {
            Ok(result) => result,
            Err(_) => Err(DiscoveryError::DeadlineExceeded(deadline)),
        }
    }

    /// Subscribe to membership changes for the selector.
    ///
    /// `on_next` receives each net-new instance; `on_complete` fires exactly
    /// once when the subscription ends, whether by cancellation, stream
    /// exhaustion or terminal failure. Returns immediately.
    pub fn subscribe<N, C>(&self, selector: &Selector, on_next: N, on_complete: C) -> Subscription
    where
        N: Fn(Vec<Instance>) + Send + Sync + 'static,
        C: FnOnce(CompletionReason) + Send + 'static,
    {
        let on_next: OnNext = Box::new(on_next);
        let on_complete: OnComplete = Box::new(on_complete);
        if self.shut_down.load(Ordering::SeqCst) {
            let completion = CompletionSlot::new(on_complete);
            completion.complete(CompletionReason::Failed(DiscoveryError::ShutDown));
            return Subscription::inert(completion);
        }
        self.subscriptions.subscribe(selector, on_next, on_complete)
    }

    /// Number of currently active subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.active()
    }

    /// Cancel all subscriptions and release the backend.
    ///
    /// Every outstanding subscription completes with
    /// [`CompletionReason::Cancelled`]. Safe to call more than once; later
    /// calls are no-ops.
    pub async fn shutdown(&self) -> Result<(), DiscoveryError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("shutting down service discovery");
        self.subscriptions.cancel_all().await;
        self.backend.shutdown().await
    }
}
