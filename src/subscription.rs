// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! The subscription engine: membership tracking, event deduplication and
//! exactly-once completion.
//!
//! Every subscription gets a dedicated worker task that owns its membership
//! set and consumes its watch stream sequentially. Three lifecycles meet
//! here — the caller's subscription, the watch stream's failure/retry loop,
//! and explicit cancellation — and the engine reconciles them so that the
//! caller sees each new instance once, a single terminal completion, and
//! nothing after it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::backend::DiscoveryBackend;
use crate::error::DiscoveryError;
use crate::instance::{Instance, InstanceMapper};
use crate::retry::RetryStrategy;
use crate::selector::Selector;
use crate::watch::{WatchEvent, WatchHandle};

/// Why a subscription ended. Delivered exactly once per subscription.
#[derive(Debug)]
pub enum CompletionReason {
    /// The caller cancelled the subscription
    Cancelled,
    /// The watch stream ended with no cause to attach
    Unavailable,
    /// The watch stream failed terminally
    Failed(DiscoveryError),
}

/// Called with each net-new batch of instances, in stream order, never
/// concurrently with itself for one subscription.
pub type OnNext = Box<dyn Fn(Vec<Instance>) + Send + Sync>;

/// Terminal notification; consumed on first use.
pub type OnComplete = Box<dyn FnOnce(CompletionReason) + Send>;

/// Holds the completion callback until exactly one terminal path claims it.
///
/// The cancellation path and the worker race to take the same closure;
/// whoever wins fires it, the loser finds the slot empty. The lock is
/// released before the callback runs, so completing re-entrantly (e.g.
/// cancelling from inside the callback) cannot deadlock.
pub(crate) struct CompletionSlot {
    callback: Mutex<Option<OnComplete>>,
}

impl CompletionSlot {
    pub(crate) fn new(on_complete: OnComplete) -> Arc<Self> {
        Arc::new(Self {
            callback: Mutex::new(Some(on_complete)),
        })
    }

    pub(crate) fn complete(&self, reason: CompletionReason) {
        let callback = self.callback.lock().unwrap().take();
        if let Some(callback) = callback {
            callback(reason);
        }
    }
}

type Registry = HashMap<u64, Registered>;

/// Registry entry for one live subscription
struct Registered {
    cancel: CancellationToken,
    completion: Arc<CompletionSlot>,
    worker: Option<JoinHandle<()>>,
}

/// Caller-held cancellation capability for one subscription.
pub struct Subscription {
    id: u64,
    cancel: CancellationToken,
    completion: Arc<CompletionSlot>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Identifier of this subscription, unique per engine.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A capability whose subscription never started; already completed.
    pub(crate) fn inert(completion: Arc<CompletionSlot>) -> Self {
        let cancel = CancellationToken::new();
        cancel.cancel();
        Self {
            id: 0,
            cancel,
            completion,
            registry: Weak::new(),
        }
    }

    /// Cancel the subscription.
    ///
    /// Marks it cancelled, tears down the watch stream, fires the completion
    /// callback with [`CompletionReason::Cancelled`] and deregisters.
    /// Idempotent: any number of calls, from any task — including from
    /// inside the completion callback itself or concurrently with natural
    /// stream completion — results in exactly one completion callback.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.completion.complete(CompletionReason::Cancelled);
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().unwrap().remove(&self.id);
        }
    }
}

/// Tracks all live subscriptions for one facade and spawns their workers.
pub struct SubscriptionEngine<B: DiscoveryBackend> {
    backend: Arc<B>,
    mapper: InstanceMapper<B::Object>,
    retry: RetryStrategy,
    next_id: AtomicU64,
    registry: Arc<Mutex<Registry>>,
}

impl<B: DiscoveryBackend> SubscriptionEngine<B> {
    pub(crate) fn new(
        backend: Arc<B>,
        mapper: InstanceMapper<B::Object>,
        retry: RetryStrategy,
    ) -> Self {
        Self {
            backend,
            mapper,
            retry,
            next_id: AtomicU64::new(1),
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Open a subscription for the selector.
    ///
    /// Returns immediately; events are consumed on a dedicated task. The
    /// returned capability is the only way to cancel the subscription.
    pub fn subscribe(
        &self,
        selector: &Selector,
        on_next: OnNext,
        on_complete: OnComplete,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let completion = CompletionSlot::new(on_complete);

        // registered before the worker spawns so a cancel racing with an
        // instantly-failing stream still finds the entry
        self.registry.lock().unwrap().insert(
            id,
            Registered {
                cancel: cancel.clone(),
                completion: Arc::clone(&completion),
                worker: None,
            },
        );

        info!(subscription = id, selector = %selector, "starting subscription");
        let handle = self.backend.watch(selector, self.retry, cancel.clone());
        let worker = tokio::spawn(run_subscription(
            id,
            handle,
            Arc::clone(&self.mapper),
            on_next,
            Arc::clone(&completion),
            cancel.clone(),
            Arc::clone(&self.registry),
        ));

        // the entry may already be gone if the stream completed instantly
        if let Some(entry) = self.registry.lock().unwrap().get_mut(&id) {
            entry.worker = Some(worker);
        }

        Subscription {
            id,
            cancel,
            completion,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Number of currently registered subscriptions.
    pub fn active(&self) -> usize {
        self.registry.lock().unwrap().len()
    }

    /// Cancel every active subscription and wait until their watch streams
    /// are released. Each subscription completes with
    /// [`CompletionReason::Cancelled`] through the same idempotent path as
    /// single cancellation.
    pub async fn cancel_all(&self) {
        let drained: Vec<(u64, Registered)> = {
            let mut registry = self.registry.lock().unwrap();
            registry.drain().collect()
        };
        if drained.is_empty() {
            return;
        }

        info!(count = drained.len(), "cancelling all subscriptions");
        for (_, entry) in &drained {
            entry.cancel.cancel();
        }
        for (id, entry) in drained {
            entry.completion.complete(CompletionReason::Cancelled);
            if let Some(worker) = entry.worker {
                if let Err(err) = worker.await {
                    warn!(subscription = id, error = %err, "subscription worker panicked");
                }
            }
        }
    }
}

/// Per-subscription worker: consumes the watch stream, maintains the
/// membership set, forwards net-new instances and reports the terminal
/// completion unless cancellation already owns it.
async fn run_subscription<K: Send + 'static>(
    id: u64,
    handle: WatchHandle<K>,
    mapper: InstanceMapper<K>,
    on_next: OnNext,
    completion: Arc<CompletionSlot>,
    cancel: CancellationToken,
    registry: Arc<Mutex<Registry>>,
) {
    let WatchHandle { mut events, driver } = handle;
    let mut members: HashMap<String, Instance> = HashMap::new();

    let reason = loop {
        let item = tokio::select! {
            biased;
            // checked before each event; the cancellation path owns the
            // completion callback
            _ = cancel.cancelled() => break None,
            item = events.recv() => item,
        };
        match item {
            Some(Ok(event)) => apply_event(id, event, &mapper, &mut members, &on_next),
            Some(Err(err)) => break Some(CompletionReason::Failed(err)),
            None => break Some(CompletionReason::Unavailable),
        }
    };

    if let Some(reason) = reason {
        debug!(subscription = id, ?reason, "subscription completing");
        registry.lock().unwrap().remove(&id);
        completion.complete(reason);
    }

    // release the watch stream before the worker itself finishes, so that
    // awaiting the worker implies the stream is gone
    drop(events);
    let _ = driver.await;
}

/// Apply one watch event to the membership set.
///
/// Only net-new instances are forwarded: a re-announcement of a known
/// identity is suppressed. Removals update local state without notifying
/// the caller — subscribers observe additions only.
fn apply_event<K>(
    id: u64,
    event: WatchEvent<K>,
    mapper: &InstanceMapper<K>,
    members: &mut HashMap<String, Instance>,
    on_next: &OnNext,
) {
    match event {
        WatchEvent::Added(object) | WatchEvent::Modified(object) => {
            let Some(instance) = mapper(&object) else {
                trace!(subscription = id, "skipping object with missing fields");
                return;
            };
            if members.contains_key(instance.id()) {
                debug!(
                    subscription = id,
                    instance = %instance.id(),
                    "instance already tracked"
                );
                return;
            }
            debug!(
                subscription = id,
                instance = %instance.id(),
                address = %instance.address(),
                "new instance"
            );
            members.insert(instance.id().to_string(), instance.clone());
            on_next(vec![instance]);
        }
        WatchEvent::Deleted(object) => {
            if let Some(instance) = mapper(&object) {
                if members.remove(instance.id()).is_some() {
                    debug!(
                        subscription = id,
                        instance = %instance.id(),
                        "instance removed from membership"
                    );
                }
            }
        }
        WatchEvent::Error(message) => {
            warn!(subscription = id, message = %message, "watch stream error event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{Backoff, RetryPolicy};
    use crate::watch::{WatchConnector, WatchItem};
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use futures::{StreamExt, stream};
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Minimal raw object type: the engine is generic over whatever the
    /// backend yields, as long as a mapper exists for it.
    #[derive(Debug, Clone)]
    struct TestObject {
        uid: &'static str,
        ip: Option<&'static str>,
    }

    fn object(uid: &'static str, ip: &'static str) -> TestObject {
        TestObject { uid, ip: Some(ip) }
    }

    fn map_object(object: &TestObject) -> Option<Instance> {
        let ip = object.ip?;
        Some(Instance::new(
            object.uid,
            "1",
            object.uid,
            "default",
            BTreeMap::new(),
            ip,
        ))
    }

    type Feed = mpsc::UnboundedReceiver<WatchItem<TestObject>>;

    /// One scripted connection attempt: an outright failure, or a stream
    /// fed live from the test through a channel.
    enum Attempt {
        Fail(DiscoveryError),
        Feed(Feed),
    }

    /// Backend whose watch attempts follow a script; lists are not used by
    /// the engine.
    struct ScriptedBackend {
        attempts: Mutex<VecDeque<Attempt>>,
        connects: Arc<AtomicU32>,
    }

    impl ScriptedBackend {
        fn new(attempts: Vec<Attempt>) -> (Arc<Self>, Arc<AtomicU32>) {
            let connects = Arc::new(AtomicU32::new(0));
            (
                Arc::new(Self {
                    attempts: Mutex::new(attempts.into()),
                    connects: Arc::clone(&connects),
                }),
                connects,
            )
        }
    }

    struct ScriptedConnector {
        attempts: VecDeque<Attempt>,
        connects: Arc<AtomicU32>,
    }

    #[async_trait]
    impl WatchConnector for ScriptedConnector {
        type Object = TestObject;

        async fn connect(
            &mut self,
        ) -> Result<BoxStream<'static, WatchItem<TestObject>>, DiscoveryError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            match self.attempts.pop_front() {
                Some(Attempt::Fail(err)) => Err(err),
                Some(Attempt::Feed(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
                .boxed()),
                None => Ok(stream::pending().boxed()),
            }
        }
    }

    #[async_trait]
    impl DiscoveryBackend for ScriptedBackend {
        type Object = TestObject;

        async fn list(&self, _selector: &Selector) -> Result<Vec<TestObject>, DiscoveryError> {
            Ok(Vec::new())
        }

        fn watch(
            &self,
            _selector: &Selector,
            retry: RetryStrategy,
            cancel: CancellationToken,
        ) -> WatchHandle<TestObject> {
            let attempts = std::mem::take(&mut *self.attempts.lock().unwrap());
            let connector = ScriptedConnector {
                attempts,
                connects: Arc::clone(&self.connects),
            };
            WatchHandle::spawn(connector, retry, cancel)
        }

        async fn shutdown(&self) -> Result<(), DiscoveryError> {
            Ok(())
        }
    }

    struct Harness {
        engine: SubscriptionEngine<ScriptedBackend>,
        connects: Arc<AtomicU32>,
    }

    fn harness(attempts: Vec<Attempt>, retry: RetryStrategy) -> Harness {
        let (backend, connects) = ScriptedBackend::new(attempts);
        Harness {
            engine: SubscriptionEngine::new(backend, Arc::new(map_object), retry),
            connects,
        }
    }

    fn selector() -> Selector {
        Selector::new(crate::selector::ResourceKind::pods())
    }

    /// Collecting callbacks: addresses land on `next_rx`, the completion
    /// reason on `done_rx`.
    fn callbacks() -> (
        OnNext,
        OnComplete,
        mpsc::UnboundedReceiver<Vec<String>>,
        mpsc::UnboundedReceiver<CompletionReason>,
    ) {
        let (next_tx, next_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let on_next: OnNext = Box::new(move |instances: Vec<Instance>| {
            let addresses = instances
                .iter()
                .map(|instance| instance.address().to_string())
                .collect();
            let _ = next_tx.send(addresses);
        });
        let on_complete: OnComplete = Box::new(move |reason| {
            let _ = done_tx.send(reason);
        });
        (on_next, on_complete, next_rx, done_rx)
    }

    async fn recv_batch(rx: &mut mpsc::UnboundedReceiver<Vec<String>>) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for on_next")
            .expect("on_next channel closed")
    }

    async fn recv_reason(
        rx: &mut mpsc::UnboundedReceiver<CompletionReason>,
    ) -> CompletionReason {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for completion")
            .expect("completion channel closed")
    }

    fn retry_never() -> RetryStrategy {
        RetryStrategy::never()
    }

    #[tokio::test]
    async fn test_distinct_identities_are_each_delivered_once() {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let h = harness(vec![Attempt::Feed(feed_rx)], retry_never());
        let (on_next, on_complete, mut next_rx, _done_rx) = callbacks();

        let subscription = h.engine.subscribe(&selector(), on_next, on_complete);

        feed_tx.send(Ok(WatchEvent::Added(object("a", "10.10.0.1")))).unwrap();
        feed_tx.send(Ok(WatchEvent::Added(object("b", "10.10.0.2")))).unwrap();

        assert_eq!(recv_batch(&mut next_rx).await, vec!["10.10.0.1"]);
        assert_eq!(recv_batch(&mut next_rx).await, vec!["10.10.0.2"]);

        subscription.cancel();
    }

    #[tokio::test]
    async fn test_known_identity_is_not_redelivered() {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let h = harness(vec![Attempt::Feed(feed_rx)], retry_never());
        let (on_next, on_complete, mut next_rx, _done_rx) = callbacks();

        let subscription = h.engine.subscribe(&selector(), on_next, on_complete);

        // two known instances, one re-announced, one genuinely new
        feed_tx.send(Ok(WatchEvent::Added(object("a", "10.10.0.1")))).unwrap();
        feed_tx.send(Ok(WatchEvent::Added(object("b", "10.10.0.2")))).unwrap();
        feed_tx.send(Ok(WatchEvent::Added(object("a", "10.10.0.1")))).unwrap();
        feed_tx.send(Ok(WatchEvent::Modified(object("b", "10.10.0.2")))).unwrap();
        feed_tx.send(Ok(WatchEvent::Added(object("c", "10.10.0.3")))).unwrap();

        assert_eq!(recv_batch(&mut next_rx).await, vec!["10.10.0.1"]);
        assert_eq!(recv_batch(&mut next_rx).await, vec!["10.10.0.2"]);
        // the duplicate add and the modify are absorbed; the next delivery
        // is the genuinely new instance
        assert_eq!(recv_batch(&mut next_rx).await, vec!["10.10.0.3"]);

        subscription.cancel();
    }

    #[tokio::test]
    async fn test_deleted_instance_can_be_rediscovered() {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let h = harness(vec![Attempt::Feed(feed_rx)], retry_never());
        let (on_next, on_complete, mut next_rx, _done_rx) = callbacks();

        let subscription = h.engine.subscribe(&selector(), on_next, on_complete);

        feed_tx.send(Ok(WatchEvent::Added(object("a", "10.10.0.1")))).unwrap();
        feed_tx.send(Ok(WatchEvent::Deleted(object("a", "10.10.0.1")))).unwrap();
        feed_tx.send(Ok(WatchEvent::Added(object("a", "10.10.0.1")))).unwrap();

        // membership reflects delivered-and-not-removed, so the re-add is new
        assert_eq!(recv_batch(&mut next_rx).await, vec!["10.10.0.1"]);
        assert_eq!(recv_batch(&mut next_rx).await, vec!["10.10.0.1"]);

        subscription.cancel();
    }

    #[tokio::test]
    async fn test_unusable_objects_are_filtered_silently() {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let h = harness(vec![Attempt::Feed(feed_rx)], retry_never());
        let (on_next, on_complete, mut next_rx, mut done_rx) = callbacks();

        let subscription = h.engine.subscribe(&selector(), on_next, on_complete);

        // no address: unusable, skipped without any callback
        feed_tx
            .send(Ok(WatchEvent::Added(TestObject { uid: "x", ip: None })))
            .unwrap();
        feed_tx.send(Ok(WatchEvent::Added(object("b", "10.10.0.2")))).unwrap();

        assert_eq!(recv_batch(&mut next_rx).await, vec!["10.10.0.2"]);
        assert!(done_rx.try_recv().is_err());

        subscription.cancel();
    }

    #[tokio::test]
    async fn test_error_events_do_not_end_the_subscription() {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let h = harness(vec![Attempt::Feed(feed_rx)], retry_never());
        let (on_next, on_complete, mut next_rx, mut done_rx) = callbacks();

        let subscription = h.engine.subscribe(&selector(), on_next, on_complete);

        feed_tx.send(Ok(WatchEvent::Error("etcdserver: too old".to_string()))).unwrap();
        feed_tx.send(Ok(WatchEvent::Added(object("a", "10.10.0.1")))).unwrap();

        assert_eq!(recv_batch(&mut next_rx).await, vec!["10.10.0.1"]);
        assert!(done_rx.try_recv().is_err());

        subscription.cancel();
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (_feed_tx, feed_rx) = mpsc::unbounded_channel();
        let h = harness(vec![Attempt::Feed(feed_rx)], retry_never());
        let (on_next, on_complete, _next_rx, mut done_rx) = callbacks();

        let subscription = h.engine.subscribe(&selector(), on_next, on_complete);

        subscription.cancel();
        subscription.cancel();
        subscription.cancel();

        assert!(matches!(
            recv_reason(&mut done_rx).await,
            CompletionReason::Cancelled
        ));
        assert!(done_rx.try_recv().is_err());
        assert_eq!(h.engine.active(), 0);
        assert!(subscription.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_racing_natural_completion_yields_one_reason() {
        for _ in 0..16 {
            let (feed_tx, feed_rx) = mpsc::unbounded_channel();
            let h = harness(vec![Attempt::Feed(feed_rx)], retry_never());
            let (on_next, on_complete, _next_rx, mut done_rx) = callbacks();

            let subscription = h.engine.subscribe(&selector(), on_next, on_complete);

            // natural termination and caller cancellation race
            feed_tx
                .send(Err(DiscoveryError::Transport("gone".to_string())))
                .unwrap();
            drop(feed_tx);
            subscription.cancel();

            // exactly one completion, either reason acceptable
            let reason = recv_reason(&mut done_rx).await;
            assert!(matches!(
                reason,
                CompletionReason::Cancelled | CompletionReason::Failed(_)
            ));
            tokio::task::yield_now().await;
            assert!(done_rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_cancel_from_inside_completion_callback() {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let h = harness(vec![Attempt::Feed(feed_rx)], retry_never());

        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let inner = Arc::clone(&slot);
        let on_complete: OnComplete = Box::new(move |reason| {
            // re-entrant cancel must be a no-op, not a deadlock
            if let Some(subscription) = inner.lock().unwrap().take() {
                subscription.cancel();
            }
            let _ = done_tx.send(reason);
        });

        let subscription = h.engine.subscribe(&selector(), Box::new(|_| {}), on_complete);
        *slot.lock().unwrap() = Some(subscription);

        // natural failure fires the completion callback, which cancels
        feed_tx
            .send(Err(DiscoveryError::Transport("gone".to_string())))
            .unwrap();

        let reason = recv_reason(&mut done_rx).await;
        assert!(matches!(reason, CompletionReason::Failed(_)));
        tokio::task::yield_now().await;
        assert!(done_rx.try_recv().is_err());
        assert_eq!(h.engine.active(), 0);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_completes_with_failure() {
        let attempts = vec![
            Attempt::Fail(DiscoveryError::Transport("down".to_string())),
            Attempt::Fail(DiscoveryError::Transport("down".to_string())),
            Attempt::Fail(DiscoveryError::Transport("down".to_string())),
        ];
        let retry = RetryStrategy::new(
            RetryPolicy::Limited(2),
            Backoff::Fixed(Duration::from_millis(10)),
        );
        let h = harness(attempts, retry);
        let (on_next, on_complete, mut next_rx, mut done_rx) = callbacks();

        let _subscription = h.engine.subscribe(&selector(), on_next, on_complete);

        let reason = recv_reason(&mut done_rx).await;
        assert!(matches!(reason, CompletionReason::Failed(_)));
        // initial attempt plus exactly two retries
        assert_eq!(h.connects.load(Ordering::SeqCst), 3);
        assert_eq!(h.engine.active(), 0);
        // no membership deliveries and nothing after the terminal callback
        assert!(next_rx.try_recv().is_err());
        assert!(done_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stream_end_without_cause_completes_unavailable() {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let h = harness(vec![Attempt::Feed(feed_rx)], retry_never());
        let (on_next, on_complete, mut next_rx, mut done_rx) = callbacks();

        let _subscription = h.engine.subscribe(&selector(), on_next, on_complete);

        feed_tx.send(Ok(WatchEvent::Added(object("a", "10.10.0.1")))).unwrap();
        assert_eq!(recv_batch(&mut next_rx).await, vec!["10.10.0.1"]);
        drop(feed_tx);

        assert!(matches!(
            recv_reason(&mut done_rx).await,
            CompletionReason::Unavailable
        ));
        assert_eq!(h.engine.active(), 0);
    }

    #[tokio::test]
    async fn test_cancel_all_completes_every_subscription() {
        let (_feed_a, feed_rx_a) = mpsc::unbounded_channel();
        let h = harness(vec![Attempt::Feed(feed_rx_a)], retry_never());

        let (next_a, done_a, _next_rx_a, mut done_rx_a) = callbacks();
        let (next_b, done_b, _next_rx_b, mut done_rx_b) = callbacks();

        let _a = h.engine.subscribe(&selector(), next_a, done_a);
        let _b = h.engine.subscribe(&selector(), next_b, done_b);
        assert_eq!(h.engine.active(), 2);

        h.engine.cancel_all().await;

        assert!(matches!(
            recv_reason(&mut done_rx_a).await,
            CompletionReason::Cancelled
        ));
        assert!(matches!(
            recv_reason(&mut done_rx_b).await,
            CompletionReason::Cancelled
        ));
        assert_eq!(h.engine.active(), 0);
    }
}
