// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! In-memory discovery backend for deterministic tests and local
//! development.
//!
//! Seeded with a fixed selector → object mapping, it answers lookups and
//! subscriptions without any cluster: `list` returns the seeds, a watch
//! announces them as `Added` events and then stays open until cancelled.
//! The watch path runs through the same driver loop as the real backend.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::backend::DiscoveryBackend;
use crate::error::DiscoveryError;
use crate::retry::RetryStrategy;
use crate::selector::Selector;
use crate::watch::{WatchConnector, WatchEvent, WatchHandle, WatchItem};

/// Discovery backend answering from seeded fixtures.
#[derive(Default)]
pub struct InMemoryBackend {
    seeds: HashMap<Selector, Vec<DynamicObject>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw objects for a selector.
    pub fn seed(mut self, selector: Selector, objects: Vec<DynamicObject>) -> Self {
        self.seeds.insert(selector, objects);
        self
    }

    /// Seed pod objects built from IP strings: each pod is named after its
    /// IP, lives in `default`, and carries uid `uid-[<ip>]`.
    pub fn seed_pod_ips<I, S>(self, selector: Selector, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pods = ips
            .into_iter()
            .map(|ip| pod_object(ip.as_ref()))
            .collect();
        self.seed(selector, pods)
    }
}

/// Build a minimal pod object with `ip` as both name and pod IP.
pub fn pod_object(ip: &str) -> DynamicObject {
    DynamicObject {
        types: None,
        metadata: ObjectMeta {
            name: Some(ip.to_string()),
            namespace: Some("default".to_string()),
            uid: Some(format!("uid-[{ip}]")),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        data: json!({ "status": { "podIP": ip } }),
    }
}

#[async_trait]
impl DiscoveryBackend for InMemoryBackend {
    type Object = DynamicObject;

    async fn list(&self, selector: &Selector) -> Result<Vec<DynamicObject>, DiscoveryError> {
        Ok(self.seeds.get(selector).cloned().unwrap_or_default())
    }

    fn watch(
        &self,
        selector: &Selector,
        retry: RetryStrategy,
        cancel: CancellationToken,
    ) -> WatchHandle<DynamicObject> {
        let connector = SeededConnector {
            seeds: self.seeds.get(selector).cloned().unwrap_or_default(),
        };
        WatchHandle::spawn(connector, retry, cancel)
    }

    async fn shutdown(&self) -> Result<(), DiscoveryError> {
        Ok(())
    }
}

/// Announces the seeds, then keeps the stream open until cancellation.
struct SeededConnector {
    seeds: Vec<DynamicObject>,
}

#[async_trait]
impl WatchConnector for SeededConnector {
    type Object = DynamicObject;

    async fn connect(
        &mut self,
    ) -> Result<BoxStream<'static, WatchItem<DynamicObject>>, DiscoveryError> {
        let initial = stream::iter(
            self.seeds
                .clone()
                .into_iter()
                .map(|object| Ok(WatchEvent::Added(object))),
        );
        Ok(initial.chain(stream::pending()).boxed())
    }
}
