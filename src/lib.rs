// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource-agnostic service discovery over the Kubernetes watch API.
//!
//! Callers ask for the current set of instances matching a [`Selector`]
//! (a one-shot [`lookup`](ServiceDiscovery::lookup)) or for an ongoing
//! stream of membership changes (a
//! [`subscribe`](ServiceDiscovery::subscribe)), without dealing with watch
//! semantics, reconnect behavior or event deduplication:
//!
//! - a subscription opens a long-lived watch, announces the current state,
//!   and forwards each *net-new* instance exactly once — re-announcements
//!   of known instances (including after a reconnect re-list) are absorbed
//!   by a per-subscription membership set;
//! - a configurable [`RetryStrategy`] governs reconnects when the watch
//!   stream fails; once the budget is exhausted the subscription completes
//!   with a terminal reason, exactly once;
//! - cancellation is idempotent and race-free: however a subscription ends,
//!   the completion callback fires once and nothing is delivered after it.
//!
//! The engines are generic over a [`DiscoveryBackend`] plus an instance
//! mapper, so the same machinery watches any resource kind. [`KubeBackend`]
//! talks to a real cluster; [`InMemoryBackend`] answers from seeded
//! fixtures for tests.
//!
//! ```ignore
//! use kube_discover::{
//!     DiscoveryConfig, KubeBackend, ResourceKind, Selector, ServiceDiscovery, pod_instance,
//! };
//!
//! let backend = KubeBackend::from_kubeconfig(None).await?;
//! let discovery = ServiceDiscovery::new(backend, pod_instance, DiscoveryConfig::default());
//!
//! let selector = Selector::new(ResourceKind::pods())
//!     .namespaced("default")
//!     .with_label("app=nginx");
//!
//! // who is there right now
//! for instance in discovery.lookup(&selector).await? {
//!     println!("{} @ {}", instance.name(), instance.address());
//! }
//!
//! // and everyone who shows up later
//! let subscription = discovery.subscribe(
//!     &selector,
//!     |instances| println!("new: {instances:?}"),
//!     |reason| println!("done: {reason:?}"),
//! );
//! // ...
//! subscription.cancel();
//! discovery.shutdown().await?;
//! ```

mod backend;
mod config;
mod discovery;
mod error;
mod instance;
mod kubernetes;
mod lookup;
mod memory;
mod retry;
mod selector;
mod subscription;
mod watch;

pub use backend::DiscoveryBackend;
pub use config::DiscoveryConfig;
pub use discovery::ServiceDiscovery;
pub use error::DiscoveryError;
pub use instance::{Instance, InstanceMapper, pod_instance};
pub use kubernetes::KubeBackend;
pub use memory::{InMemoryBackend, pod_object};
pub use retry::{Backoff, RetryPolicy, RetryStrategy};
pub use selector::{FilterOptions, NamespaceScope, ResourceKind, Selector};
pub use subscription::{CompletionReason, OnComplete, OnNext, Subscription};
pub use watch::{WatchConnector, WatchEvent, WatchHandle, WatchItem};

/// Discovery over a real cluster.
pub type KubeServiceDiscovery = ServiceDiscovery<KubeBackend>;
