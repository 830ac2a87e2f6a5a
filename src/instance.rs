// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Discovered instance records and the mapping from raw watched objects.
//!
//! An [`Instance`] is the lean, normalized record handed to callers; raw
//! cluster objects are turned into instances by a mapper function. Mapping
//! returns `None` when a required field is missing — a filtering outcome,
//! not an error, so a malformed object never aborts a lookup or a watch
//! stream.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use kube::api::DynamicObject;

/// Turns a raw watched object into an [`Instance`], or `None` when the
/// object is unusable. Injected into the engines so they stay agnostic to
/// what is being watched.
pub type InstanceMapper<K> = Arc<dyn Fn(&K) -> Option<Instance> + Send + Sync>;

/// A discovered, normalized record of one running resource.
///
/// Two instances are equal when identity, name, namespace and address all
/// match. `version` tracks the orchestrator revision the instance was last
/// observed at and does not participate in equality: the same logical
/// instance re-observed with a bumped revision is still the same instance.
#[derive(Debug, Clone)]
pub struct Instance {
    id: String,
    version: String,
    name: String,
    namespace: String,
    labels: BTreeMap<String, String>,
    address: String,
}

impl Instance {
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
        labels: BTreeMap<String, String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            name: name.into(),
            namespace: namespace.into(),
            labels,
            address: address.into(),
        }
    }

    /// Stable unique identity assigned by the orchestrator
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Revision the instance was last observed at (informational)
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Routable address of the instance, e.g. a pod IP
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.namespace == other.namespace
            && self.address == other.address
    }
}

impl Eq for Instance {}

impl Hash for Instance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.name.hash(state);
        self.namespace.hash(state);
        self.address.hash(state);
    }
}

/// Map a pod object into an [`Instance`].
///
/// Identity comes from the pod's uid, the address from `status.podIP`.
/// Returns `None` when uid, resource version, name, namespace or pod IP is
/// absent — unscheduled or terminating pods routinely lack an IP.
pub fn pod_instance(object: &DynamicObject) -> Option<Instance> {
    let meta = &object.metadata;
    let id = meta.uid.clone()?;
    let version = meta.resource_version.clone()?;
    let name = meta.name.clone()?;
    let namespace = meta.namespace.clone()?;
    let labels = meta.labels.clone().unwrap_or_default();
    let address = object
        .data
        .get("status")?
        .get("podIP")?
        .as_str()?
        .to_string();

    Some(Instance::new(id, version, name, namespace, labels, address))
}
