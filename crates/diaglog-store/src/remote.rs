//! Fire-and-forget remote mirroring.
//!
//! Entries are handed to an unbounded channel; a background worker drains it
//! and starts one delivery per entry through a [`RemoteTransport`]. Deliveries
//! run independently, so a stalled request holds up neither later entries nor
//! shutdown. Delivery failures are reported with `tracing` and counted, never
//! retried, and never reach the code that logged the entry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use diaglog_types::LogEntry;

use crate::error::Result;

/// How long shutdown waits for in-flight deliveries before abandoning them
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Delivers one entry to a remote collector
pub trait RemoteTransport: Send + Sync + 'static {
    fn send<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<()>>;
}

/// POSTs entries as JSON over HTTP
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to build HTTP client, using defaults");
            reqwest::Client::new()
        });

        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl RemoteTransport for HttpTransport {
    fn send<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            // Any completed exchange counts; the status and body are not inspected
            self.client.post(&self.endpoint).json(entry).send().await?;
            Ok(())
        })
    }
}

/// Delivery counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemoteStats {
    pub sent: u64,
    pub failed: u64,
}

#[derive(Default)]
struct AtomicRemoteStats {
    sent: AtomicU64,
    failed: AtomicU64,
}

impl AtomicRemoteStats {
    fn to_stats(&self) -> RemoteStats {
        RemoteStats {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Channel front end plus the worker task draining it
pub struct RemoteMirror {
    tx: mpsc::UnboundedSender<LogEntry>,
    cancel: CancellationToken,
    stats: Arc<AtomicRemoteStats>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteMirror {
    /// Start the worker on the current tokio runtime
    ///
    /// Returns `None` when called outside a runtime.
    pub fn spawn(transport: Arc<dyn RemoteTransport>) -> Option<Self> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(error = %e, "no async runtime, remote log mirroring disabled");
                return None;
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let stats = Arc::new(AtomicRemoteStats::default());

        let task = handle.spawn(run_worker(
            transport,
            rx,
            cancel.clone(),
            Arc::clone(&stats),
        ));

        Some(Self {
            tx,
            cancel,
            stats,
            task: Mutex::new(Some(task)),
        })
    }

    /// Queue an entry without waiting for delivery
    pub fn enqueue(&self, entry: LogEntry) {
        if self.tx.send(entry).is_err() {
            tracing::warn!("remote log worker stopped, entry not mirrored");
        }
    }

    pub fn stats(&self) -> RemoteStats {
        self.stats.to_stats()
    }

    /// Stop the worker after it delivers what is already queued
    ///
    /// Deliveries still pending after a short grace period are abandoned and
    /// counted as failed.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for RemoteMirror {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    transport: Arc<dyn RemoteTransport>,
    mut rx: mpsc::UnboundedReceiver<LogEntry>,
    cancel: CancellationToken,
    stats: Arc<AtomicRemoteStats>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            maybe_entry = rx.recv() => match maybe_entry {
                Some(entry) => {
                    in_flight.spawn(deliver(Arc::clone(&transport), entry, Arc::clone(&stats)));
                }
                None => break,
            },

            _ = cancel.cancelled() => break,

            // Reap finished deliveries so the set does not grow unbounded
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }

    rx.close();
    while let Ok(entry) = rx.try_recv() {
        in_flight.spawn(deliver(Arc::clone(&transport), entry, Arc::clone(&stats)));
    }

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while in_flight.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        let abandoned = in_flight.len();
        in_flight.abort_all();
        stats.failed.fetch_add(abandoned as u64, Ordering::Relaxed);
        tracing::warn!(abandoned, "remote deliveries still pending at shutdown, abandoned");
    }
}

async fn deliver(
    transport: Arc<dyn RemoteTransport>,
    entry: LogEntry,
    stats: Arc<AtomicRemoteStats>,
) {
    match transport.send(&entry).await {
        Ok(()) => {
            stats.sent.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, entry = %entry.message, "failed to send log to remote");
        }
    }
}
