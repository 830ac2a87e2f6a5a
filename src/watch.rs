// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Watch-stream plumbing shared by every backend.
//!
//! Backends implement [`WatchConnector`] — "open one watch attempt" — and
//! [`run_watch`] drives attempts through a [`RetryStrategy`]: forward events
//! into a channel, reconnect on failure, and either hand the subscription a
//! terminal error or close the channel when the budget runs out. The
//! subscription engine consumes the channel through a [`WatchHandle`].

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::DiscoveryError;
use crate::retry::RetryStrategy;

/// Events buffered between the watch driver and the subscription worker
const EVENT_BUFFER: usize = 64;

/// A typed change notification for one watched object.
#[derive(Debug, Clone)]
pub enum WatchEvent<K> {
    /// The object appeared
    Added(K),
    /// The object changed
    Modified(K),
    /// The object went away
    Deleted(K),
    /// The server reported a recoverable error for this stream
    Error(String),
}

/// Items flowing out of the watch driver: events while the stream is
/// healthy, a single terminal `Err` when a hard failure exhausts the retry
/// budget. The channel closing without an `Err` means the stream ended with
/// no cause to attach.
pub type WatchItem<K> = Result<WatchEvent<K>, DiscoveryError>;

/// Handle to a running watch stream: the event channel plus the driver task
/// that feeds it.
pub struct WatchHandle<K> {
    pub(crate) events: mpsc::Receiver<WatchItem<K>>,
    pub(crate) driver: JoinHandle<()>,
}

impl<K: Send + 'static> WatchHandle<K> {
    /// Spawn [`run_watch`] over a connector and hand back the consuming side.
    pub fn spawn<C>(connector: C, retry: RetryStrategy, cancel: CancellationToken) -> Self
    where
        C: WatchConnector<Object = K>,
    {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let driver = tokio::spawn(run_watch(connector, retry, tx, cancel));
        Self { events: rx, driver }
    }
}

/// Opens one watch attempt.
///
/// Implementations may list first and prepend the results as `Added` events
/// so every fresh stream announces the current state; the subscription
/// engine's dedup absorbs the re-announcements on reconnect.
#[async_trait]
pub trait WatchConnector: Send + 'static {
    type Object: Send + 'static;

    /// Establish a new event stream.
    async fn connect(&mut self)
    -> Result<BoxStream<'static, WatchItem<Self::Object>>, DiscoveryError>;
}

/// Drive watch attempts through the retry strategy until cancelled or
/// exhausted.
///
/// Consecutive failures — failed connects, stream errors, orderly stream
/// ends — are counted against the strategy; a delivered event resets the
/// counter. Every suspension point (connect, next event, backoff sleep) is
/// cancellable.
pub(crate) async fn run_watch<C>(
    mut connector: C,
    retry: RetryStrategy,
    tx: mpsc::Sender<WatchItem<C::Object>>,
    cancel: CancellationToken,
) where
    C: WatchConnector,
{
    let mut failures: u32 = 0;
    loop {
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            connected = connector.connect() => connected,
        };

        let mut stream = match connected {
            Ok(stream) => stream,
            Err(err) => {
                if !next_attempt(&retry, &mut failures, err, &tx, &cancel).await {
                    return;
                }
                continue;
            }
        };

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                item = stream.next() => item,
            };
            match item {
                Some(Ok(event)) => {
                    failures = 0;
                    if tx.send(Ok(event)).await.is_err() {
                        // receiver dropped, the subscription is gone
                        return;
                    }
                }
                Some(Err(err)) => {
                    if !next_attempt(&retry, &mut failures, err, &tx, &cancel).await {
                        return;
                    }
                    break;
                }
                None => {
                    // orderly close: same budget, but no cause to attach, so
                    // exhaustion closes the channel instead of sending an Err
                    failures += 1;
                    if !retry.should_retry(failures) {
                        debug!(failures, "watch stream closed, retry budget exhausted");
                        return;
                    }
                    if !backoff(&retry, failures, &cancel).await {
                        return;
                    }
                    break;
                }
            }
        }
    }
}

/// Count a failure and decide whether to go around again. Returns `false`
/// when the loop must stop: budget exhausted, non-retryable error, or
/// cancellation during backoff. Terminal errors are forwarded to the
/// subscription before stopping.
async fn next_attempt<K>(
    retry: &RetryStrategy,
    failures: &mut u32,
    err: DiscoveryError,
    tx: &mpsc::Sender<WatchItem<K>>,
    cancel: &CancellationToken,
) -> bool {
    *failures += 1;
    if !err.is_retryable() || !retry.should_retry(*failures) {
        warn!(failures = *failures, error = %err, "watch stream failed terminally");
        let _ = tx.send(Err(err)).await;
        return false;
    }
    debug!(failures = *failures, error = %err, "watch stream failed, reconnecting");
    backoff(retry, *failures, cancel).await
}

/// Sleep the strategy's delay for this attempt; `false` if cancelled
/// mid-sleep.
async fn backoff(retry: &RetryStrategy, attempt: u32, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(retry.delay_before(attempt)) => true,
    }
}
