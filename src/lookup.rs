// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! One-shot lookup: list once, map, return.

use std::sync::Arc;

use tracing::debug;

use crate::backend::DiscoveryBackend;
use crate::error::DiscoveryError;
use crate::instance::{Instance, InstanceMapper};
use crate::selector::Selector;

/// Stateless one-shot lookup path. No dedup, no retry: a caller that wants
/// another answer simply asks again.
pub(crate) struct LookupEngine<B: DiscoveryBackend> {
    backend: Arc<B>,
    mapper: InstanceMapper<B::Object>,
}

impl<B: DiscoveryBackend> LookupEngine<B> {
    pub(crate) fn new(backend: Arc<B>, mapper: InstanceMapper<B::Object>) -> Self {
        Self { backend, mapper }
    }

    /// List objects matching the selector and map them, silently dropping
    /// objects with missing required fields. Results keep listing order.
    pub(crate) async fn lookup(
        &self,
        selector: &Selector,
    ) -> Result<Vec<Instance>, DiscoveryError> {
        let objects = self.backend.list(selector).await?;
        let total = objects.len();
        let instances: Vec<Instance> = objects
            .iter()
            .filter_map(|object| (self.mapper)(object))
            .collect();
        debug!(
            selector = %selector,
            listed = total,
            usable = instances.len(),
            "lookup complete"
        );
        Ok(instances)
    }
}
