// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Selectors describing which cluster resources to discover.
//!
//! A [`Selector`] is pure data: a resource kind, a namespace scope and
//! optional label/field filters. Selectors are hashable and usable as map
//! keys; filter options are canonicalized at construction so two selectors
//! built from the same options always compare equal, regardless of the order
//! the options were added in.

use std::fmt;

/// Group/version/kind triple identifying a watchable resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    /// API group, empty for the core group
    pub group: String,
    /// API version within the group
    pub version: String,
    /// Resource kind, e.g. `Pod`
    pub kind: String,
}

impl ResourceKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// A kind in the core API group
    pub fn core(version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::new("", version, kind)
    }

    pub fn pods() -> Self {
        Self::core("v1", "Pod")
    }

    pub fn services() -> Self {
        Self::core("v1", "Service")
    }

    pub fn endpoint_slices() -> Self {
        Self::new("discovery.k8s.io", "v1", "EndpointSlice")
    }

    /// Full `group/version` string, e.g. `v1` or `discovery.k8s.io/v1`
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// Which namespaces a lookup or subscription covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceScope {
    /// Every namespace the client can see
    All,
    /// A single namespace
    Named(String),
}

impl Default for NamespaceScope {
    /// The `default` namespace, matching the cluster's convention for
    /// unspecified namespaces.
    fn default() -> Self {
        NamespaceScope::Named("default".to_string())
    }
}

/// Label and field selector expressions, kept sorted and deduplicated so
/// that insertion order never affects equality or hashing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterOptions {
    labels: Vec<String>,
    fields: Vec<String>,
}

impl FilterOptions {
    fn insert(list: &mut Vec<String>, expr: String) {
        list.push(expr);
        list.sort();
        list.dedup();
    }

    /// Combined label selector string for the API, e.g. `app=nginx,tier=web`
    pub fn label_selector(&self) -> Option<String> {
        if self.labels.is_empty() {
            None
        } else {
            Some(self.labels.join(","))
        }
    }

    /// Combined field selector string for the API
    pub fn field_selector(&self) -> Option<String> {
        if self.fields.is_empty() {
            None
        } else {
            Some(self.fields.join(","))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.fields.is_empty()
    }
}

/// Criteria identifying which cluster resources to discover.
///
/// Immutable once built; two selectors are equal iff kind, namespace scope
/// and (canonicalized) filter options are all equal, which makes `Selector`
/// the natural key for seeding fixtures or collapsing discovery sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    kind: ResourceKind,
    namespace: NamespaceScope,
    filters: FilterOptions,
}

impl Selector {
    /// Selector for a kind in the `default` namespace with no filters.
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            namespace: NamespaceScope::default(),
            filters: FilterOptions::default(),
        }
    }

    /// Scope to a single namespace.
    pub fn namespaced(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = NamespaceScope::Named(namespace.into());
        self
    }

    /// Scope to all namespaces.
    pub fn all_namespaces(mut self) -> Self {
        self.namespace = NamespaceScope::All;
        self
    }

    /// Add a label selector expression, e.g. `app=nginx`.
    pub fn with_label(mut self, expr: impl Into<String>) -> Self {
        FilterOptions::insert(&mut self.filters.labels, expr.into());
        self
    }

    /// Add a field selector expression, e.g. `status.phase=Running`.
    pub fn with_field(mut self, expr: impl Into<String>) -> Self {
        FilterOptions::insert(&mut self.filters.fields, expr.into());
        self
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn namespace(&self) -> &NamespaceScope {
        &self.namespace
    }

    pub fn filters(&self) -> &FilterOptions {
        &self.filters
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.api_version(), self.kind.kind)?;
        match &self.namespace {
            NamespaceScope::All => write!(f, " in all namespaces")?,
            NamespaceScope::Named(ns) => write!(f, " in {}", ns)?,
        }
        if let Some(labels) = self.filters.label_selector() {
            write!(f, " [{}]", labels)?;
        }
        Ok(())
    }
}
