use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use kube::api::{Api, ApiResource, DynamicObject, ListParams, WatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{GroupVersionKind, WatchEvent as KubeWatchEvent};
use kube::{Client, Config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::backend::DiscoveryBackend;
use crate::error::DiscoveryError;
use crate::retry::RetryStrategy;
use crate::selector::{NamespaceScope, Selector};
use crate::watch::{WatchConnector, WatchEvent, WatchHandle, WatchItem};

/// Timeout for connecting to the K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading K8s API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for paginated list requests
/// Smaller pages reduce memory pressure and allow faster initial response
const PAGE_SIZE: u32 = 500;

/// Server-side watch window in seconds. Kept under the client read timeout
/// so an idle watch closes cleanly on the server side instead of tripping
/// the client timeout; the driver then reconnects with a fresh list.
const WATCH_WINDOW_SECS: u32 = 20;

/// Discovery backend over a real Kubernetes cluster.
///
/// Lists and watches resources dynamically by group/version/kind, so the
/// same backend serves any selector an instance mapper exists for.
#[derive(Clone)]
pub struct KubeBackend {
    client: Client,
}

impl KubeBackend {
    /// Wrap an already configured client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the local kubeconfig, optionally pinning a
    /// context, with connection timeouts applied.
    pub async fn from_kubeconfig(context: Option<&str>) -> Result<Self, DiscoveryError> {
        let kubeconfig = Kubeconfig::read()?;

        let context_name = context
            .map(String::from)
            .or_else(|| kubeconfig.current_context.clone())
            .ok_or_else(|| {
                DiscoveryError::Context(
                    "no context specified and no current context in kubeconfig".to_string(),
                )
            })?;

        // Verify context exists
        if !kubeconfig.contexts.iter().any(|c| c.name == context_name) {
            return Err(DiscoveryError::Context(format!(
                "context '{}' not found in kubeconfig",
                context_name
            )));
        }

        let mut config = Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: Some(context_name.clone()),
                ..Default::default()
            },
        )
        .await?;

        // Set timeouts for reliability
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config).map_err(DiscoveryError::Api)?;

        info!(context = %context_name, "created kubernetes client");
        Ok(Self { client })
    }

    /// API handle scoped to the selector's kind and namespace
    fn api_for(&self, selector: &Selector) -> Api<DynamicObject> {
        let kind = selector.kind();
        let gvk = GroupVersionKind::gvk(&kind.group, &kind.version, &kind.kind);
        let resource = ApiResource::from_gvk(&gvk);
        match selector.namespace() {
            NamespaceScope::Named(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            NamespaceScope::All => Api::all_with(self.client.clone(), &resource),
        }
    }

    /// Build ListParams from the selector's filters
    fn list_params(selector: &Selector) -> ListParams {
        let mut params = ListParams::default();
        if let Some(labels) = selector.filters().label_selector() {
            params = params.labels(&labels);
        }
        if let Some(fields) = selector.filters().field_selector() {
            params = params.fields(&fields);
        }
        trace!(selector = %selector, "built list params");
        params
    }

    fn watch_params(selector: &Selector) -> WatchParams {
        let mut params = WatchParams::default().timeout(WATCH_WINDOW_SECS);
        if let Some(labels) = selector.filters().label_selector() {
            params = params.labels(&labels);
        }
        if let Some(fields) = selector.filters().field_selector() {
            params = params.fields(&fields);
        }
        params
    }

    /// Fetch every page of a list using continue tokens.
    ///
    /// Returns the items plus the list's resource version, which is where a
    /// subsequent watch picks up.
    async fn list_all(
        api: &Api<DynamicObject>,
        base_params: &ListParams,
    ) -> Result<(Vec<DynamicObject>, Option<String>), DiscoveryError> {
        let mut all_items = Vec::new();
        let mut continue_token: Option<String> = None;
        let mut resource_version: Option<String> = None;
        let mut page_count = 0u32;

        loop {
            // Build params for this page
            let mut params = base_params.clone().limit(PAGE_SIZE);
            if let Some(ref token) = continue_token {
                params = params.continue_token(token);
            }

            let page = api.list(&params).await.map_err(DiscoveryError::Api)?;
            if resource_version.is_none() {
                resource_version = page.metadata.resource_version.clone();
            }

            let items_count = page.items.len();
            all_items.extend(page.items);
            page_count += 1;

            // Check for more pages
            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    debug!(
                        page = page_count,
                        items_this_page = items_count,
                        total_so_far = all_items.len(),
                        "fetched page, continuing"
                    );
                    continue_token = Some(token);
                }
                _ => break,
            }
        }

        if page_count > 1 {
            debug!(
                pages = page_count,
                total_items = all_items.len(),
                "pagination complete"
            );
        }

        Ok((all_items, resource_version))
    }
}

#[async_trait]
impl DiscoveryBackend for KubeBackend {
    type Object = DynamicObject;

    async fn list(&self, selector: &Selector) -> Result<Vec<DynamicObject>, DiscoveryError> {
        let api = self.api_for(selector);
        let (items, _) = Self::list_all(&api, &Self::list_params(selector)).await?;
        debug!(selector = %selector, items = items.len(), "list complete");
        Ok(items)
    }

    fn watch(
        &self,
        selector: &Selector,
        retry: RetryStrategy,
        cancel: CancellationToken,
    ) -> WatchHandle<DynamicObject> {
        let connector = KubeConnector {
            api: self.api_for(selector),
            list_params: Self::list_params(selector),
            watch_params: Self::watch_params(selector),
        };
        WatchHandle::spawn(connector, retry, cancel)
    }

    async fn shutdown(&self) -> Result<(), DiscoveryError> {
        // the client's pooled connections close when the last clone drops
        Ok(())
    }
}

/// One watch attempt: list the current state, announce it as `Added`
/// events, then stream changes from the list's resource version.
struct KubeConnector {
    api: Api<DynamicObject>,
    list_params: ListParams,
    watch_params: WatchParams,
}

#[async_trait]
impl WatchConnector for KubeConnector {
    type Object = DynamicObject;

    async fn connect(
        &mut self,
    ) -> Result<BoxStream<'static, WatchItem<DynamicObject>>, DiscoveryError> {
        let (items, resource_version) =
            KubeBackend::list_all(&self.api, &self.list_params).await?;
        let version = resource_version.unwrap_or_else(|| "0".to_string());
        debug!(
            objects = items.len(),
            version = %version,
            "watch connected, announcing listed objects"
        );

        let initial = stream::iter(
            items
                .into_iter()
                .map(|object| Ok(WatchEvent::Added(object))),
        );
        let updates = self
            .api
            .watch(&self.watch_params, &version)
            .await
            .map_err(DiscoveryError::Api)?
            .filter_map(|event| futures::future::ready(convert_event(event)));

        Ok(initial.chain(updates).boxed())
    }
}

/// Translate a raw watch event into the driver's item type.
///
/// Bookmarks are dropped. A `410 Gone` error event means the watch window
/// expired and becomes a retryable transport failure, forcing the next
/// attempt to re-list; other error events are forwarded as recoverable.
fn convert_event(
    event: kube::Result<KubeWatchEvent<DynamicObject>>,
) -> Option<WatchItem<DynamicObject>> {
    match event {
        Ok(KubeWatchEvent::Added(object)) => Some(Ok(WatchEvent::Added(object))),
        Ok(KubeWatchEvent::Modified(object)) => Some(Ok(WatchEvent::Modified(object))),
        Ok(KubeWatchEvent::Deleted(object)) => Some(Ok(WatchEvent::Deleted(object))),
        Ok(KubeWatchEvent::Bookmark(_)) => None,
        Ok(KubeWatchEvent::Error(response)) if response.code == 410 => Some(Err(
            DiscoveryError::Transport(format!("watch expired: {}", response.message)),
        )),
        Ok(KubeWatchEvent::Error(response)) => Some(Ok(WatchEvent::Error(response.message))),
        Err(err) => Some(Err(DiscoveryError::Api(err))),
    }
}
