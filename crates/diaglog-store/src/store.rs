//! The log store: bounded buffer plus console and remote mirrors.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use diaglog_types::{Environment, LogEntry, LogLevel, into_log_data};

use crate::buffer::{ArcLogEntry, LevelCounts, LogBuffer};
use crate::config::StoreConfig;
use crate::console::ConsoleMirror;
use crate::error::Result;
use crate::export;
use crate::filter::CompiledFilter;
use crate::remote::{HttpTransport, RemoteMirror, RemoteStats, RemoteTransport};

/// Process-wide log store handle
///
/// Cloning is cheap and every clone appends to the same buffer. Logging
/// calls never fail and never wait on the mirrors.
#[derive(Clone)]
pub struct LogStore {
    buffer: LogBuffer,
    config: Arc<StoreConfig>,
    console: Option<Arc<ConsoleMirror>>,
    remote: Option<Arc<RemoteMirror>>,
}

impl LogStore {
    /// Build a store with the mirrors its configuration enables
    ///
    /// Remote mirroring needs a running tokio runtime.
    pub fn new(config: StoreConfig) -> Self {
        LogStoreBuilder::new(config).build()
    }

    /// Store without any mirroring
    pub fn in_memory(max_logs: usize) -> Self {
        Self::new(StoreConfig {
            max_logs,
            console: Some(false),
            remote: Some(false),
            ..Default::default()
        })
    }

    pub fn builder(config: StoreConfig) -> LogStoreBuilder {
        LogStoreBuilder::new(config)
    }

    // ------------------------------------------------------------------
    // Logging
    // ------------------------------------------------------------------

    /// Append an entry at `level`
    ///
    /// Non-object `data` values are wrapped as `{"value": ...}`.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, data: Option<Value>) {
        self.append(self.entry(level, message, data));
    }

    /// Like [`LogStore::log`] but never waits on a lock
    ///
    /// Used from the panic hook, where the panicking thread may already hold
    /// the buffer or console lock. Returns whether the entry reached the buffer.
    pub(crate) fn try_log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> bool {
        let entry = self.entry(level, message, data);
        if let Some(console) = &self.console {
            console.try_emit(&entry);
        }
        if let Some(remote) = &self.remote {
            remote.enqueue(entry.clone());
        }
        self.buffer.try_push(entry)
    }

    fn entry(&self, level: LogLevel, message: impl Into<String>, data: Option<Value>) -> LogEntry {
        let trace = if self.config.capture_traces {
            capture_trace()
        } else {
            None
        };
        LogEntry::new(level, message, data.and_then(into_log_data)).with_trace(trace)
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message, None);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message, None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message, None);
    }

    pub fn debug_with(&self, message: impl Into<String>, data: Value) {
        self.log(LogLevel::Debug, message, Some(data));
    }

    pub fn info_with(&self, message: impl Into<String>, data: Value) {
        self.log(LogLevel::Info, message, Some(data));
    }

    pub fn warn_with(&self, message: impl Into<String>, data: Value) {
        self.log(LogLevel::Warn, message, Some(data));
    }

    pub fn error_with(&self, message: impl Into<String>, data: Value) {
        self.log(LogLevel::Error, message, Some(data));
    }

    /// Append a prepared entry and mirror it
    pub fn append(&self, entry: LogEntry) {
        if let Some(console) = &self.console {
            console.emit(&entry);
        }
        if let Some(remote) = &self.remote {
            remote.enqueue(entry.clone());
        }
        self.buffer.push(entry);
    }

    /// Append entries from an earlier export without mirroring them
    pub fn restore<I>(&self, entries: I)
    where
        I: IntoIterator<Item = LogEntry>,
    {
        for entry in entries {
            self.buffer.push(entry);
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Copy of all retained entries, oldest first
    pub fn get_logs(&self) -> Vec<LogEntry> {
        self.buffer.snapshot()
    }

    /// Shared handles to all retained entries, oldest first
    pub fn snapshot(&self) -> Vec<ArcLogEntry> {
        self.buffer.all()
    }

    pub fn filtered(&self, filter: &CompiledFilter) -> Vec<ArcLogEntry> {
        self.buffer.filtered(|e| filter.matches(e))
    }

    pub fn tail(&self, n: usize) -> Vec<ArcLogEntry> {
        self.buffer.tail(n)
    }

    pub fn level_counts(&self) -> LevelCounts {
        self.buffer.level_counts()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Empty the buffer; the store stays usable
    pub fn clear_logs(&self) {
        self.buffer.clear();
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Pretty-printed JSON array of the current buffer
    pub fn export_logs(&self) -> Result<String> {
        export::export_json(&self.get_logs())
    }

    /// Write the current buffer to `dir/logs-<timestamp>.json`
    pub fn download_logs(&self, dir: &Path) -> Result<PathBuf> {
        let path = export::write_artifact(dir, &self.get_logs(), Utc::now())?;
        tracing::info!(path = %path.display(), "exported logs");
        Ok(path)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn environment(&self) -> Environment {
        self.config.environment
    }

    pub fn console_active(&self) -> bool {
        self.console.is_some()
    }

    pub fn remote_active(&self) -> bool {
        self.remote.is_some()
    }

    /// Remote delivery counters, when remote mirroring is active
    pub fn remote_stats(&self) -> Option<RemoteStats> {
        self.remote.as_ref().map(|r| r.stats())
    }

    /// Let the remote worker deliver queued entries, then stop it
    pub async fn shutdown(&self) {
        if let Some(remote) = &self.remote {
            remote.shutdown().await;
        }
    }
}

/// Builder allowing custom mirror targets
pub struct LogStoreBuilder {
    config: StoreConfig,
    console: Option<ConsoleMirror>,
    transport: Option<Arc<dyn RemoteTransport>>,
}

impl LogStoreBuilder {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            console: None,
            transport: None,
        }
    }

    /// Console output target (defaults to stderr)
    pub fn console_writer<W>(mut self, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        self.console = Some(ConsoleMirror::with_writer(writer));
        self
    }

    /// Remote transport (defaults to HTTP against the configured endpoint)
    pub fn transport(mut self, transport: Arc<dyn RemoteTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> LogStore {
        let config = self.config;

        let console = config
            .console_enabled()
            .then(|| Arc::new(self.console.unwrap_or_else(ConsoleMirror::stderr)));

        let remote = if config.remote_enabled() {
            let transport = self.transport.unwrap_or_else(|| {
                Arc::new(HttpTransport::new(
                    config.remote_endpoint.clone(),
                    config.remote_timeout,
                ))
            });
            RemoteMirror::spawn(transport).map(Arc::new)
        } else {
            None
        };

        tracing::debug!(
            environment = %config.environment,
            max_logs = config.max_logs,
            console = console.is_some(),
            remote = remote.is_some(),
            "log store ready"
        );

        LogStore {
            buffer: LogBuffer::new(config.max_logs),
            config: Arc::new(config),
            console,
            remote,
        }
    }
}

/// Backtrace text when the runtime has capture enabled
fn capture_trace() -> Option<String> {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteTransport;
    use futures::future::BoxFuture;
    use parking_lot::Mutex;
    use serde_json::json;

    fn store(max_logs: usize) -> LogStore {
        LogStore::in_memory(max_logs)
    }

    fn messages(store: &LogStore) -> Vec<String> {
        store.get_logs().into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_boot_then_fail_scenario() {
        let store = store(1000);
        store.info("boot");
        store.error_with("fail", json!({"code": 500}));

        let logs = store.get_logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].level, LogLevel::Info);
        assert_eq!(logs[0].message, "boot");
        assert!(logs[0].data.is_none());
        assert_eq!(logs[1].level, LogLevel::Error);
        assert_eq!(logs[1].message, "fail");
        assert_eq!(logs[1].data.as_ref().unwrap()["code"], 500);
    }

    #[test]
    fn test_capacity_boundary_scenario() {
        let store = store(3);
        for m in ["a", "b", "c", "d"] {
            store.info(m);
        }
        assert_eq!(messages(&store), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_bounded_size_keeps_most_recent() {
        let store = store(1000);
        for i in 0..1500 {
            store.debug(format!("m{}", i));
        }
        let logs = store.get_logs();
        assert_eq!(logs.len(), 1000);
        assert_eq!(logs[0].message, "m500");
        assert_eq!(logs[999].message, "m1499");
    }

    #[test]
    fn test_order_preserved() {
        let store = store(100);
        let expected: Vec<String> = (0..50).map(|i| format!("event-{}", i)).collect();
        for m in &expected {
            store.info(m.as_str());
        }
        assert_eq!(messages(&store), expected);
    }

    #[test]
    fn test_level_tagging() {
        let store = store(10);
        store.debug("d");
        store.info("i");
        store.warn("x");
        store.error("e");

        let levels: Vec<LogLevel> = store.get_logs().iter().map(|e| e.level).collect();
        assert_eq!(levels, LogLevel::ALL.to_vec());
        let warns: Vec<_> = store
            .get_logs()
            .into_iter()
            .filter(|e| e.level == LogLevel::Warn)
            .collect();
        assert_eq!(warns.len(), 1);
        assert_eq!(warns[0].message, "x");
    }

    #[test]
    fn test_snapshot_isolation() {
        let store = store(10);
        store.info("one");
        let mut logs = store.get_logs();
        logs.push(LogEntry::new(LogLevel::Error, "forged", None));
        logs[0].message = "changed".to_string();

        assert_eq!(messages(&store), vec!["one"]);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = store(10);
        store.clear_logs();
        assert!(store.get_logs().is_empty());

        store.info("a");
        store.clear_logs();
        store.clear_logs();
        assert!(store.get_logs().is_empty());

        store.info("b");
        assert_eq!(messages(&store), vec!["b"]);
    }

    #[test]
    fn test_export_round_trip() {
        let store = store(10);
        store.info("boot");
        store.warn_with("slow", json!({"ms": 1200, "path": "/api/chat"}));

        let before = store.get_logs();
        let parsed = export::parse_export(&store.export_logs().unwrap()).unwrap();
        assert_eq!(parsed, before);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_download_logs_does_not_mutate() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(10);
        store.info("kept");

        let path = store.download_logs(dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("logs-") && name.ends_with(".json"));
        assert_eq!(export::read_artifact(&path).unwrap(), store.get_logs());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_non_object_data_is_wrapped() {
        let store = store(10);
        store.info_with("count", json!(3));
        store.info_with("nothing", json!(null));

        let logs = store.get_logs();
        assert_eq!(logs[0].data.as_ref().unwrap()["value"], 3);
        assert!(logs[1].data.is_none());
    }

    #[test]
    fn test_filtered_and_tail() {
        let store = store(10);
        store.info("cache warm");
        store.error_with("db down", json!({"host": "cache-1"}));
        store.warn("slow query");

        let hits = store.filtered(&CompiledFilter::text("cache", true));
        let hit_messages: Vec<_> = hits.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(hit_messages, vec!["cache warm", "db down"]);

        let tail: Vec<_> = store.tail(2).iter().map(|e| e.message.clone()).collect();
        assert_eq!(tail, vec!["db down", "slow query"]);
        assert_eq!(store.tail(50).len(), 3);
    }

    #[test]
    fn test_try_log_appends_when_unlocked() {
        let store = store(10);
        assert!(store.try_log(LogLevel::Error, "hook", Some(json!({"k": 1}))));
        let logs = store.get_logs();
        assert_eq!(logs[0].message, "hook");
        assert_eq!(logs[0].data.as_ref().unwrap()["k"], 1);
    }

    #[test]
    fn test_clones_share_buffer() {
        let store = store(10);
        let other = store.clone();
        other.info("from clone");
        assert_eq!(messages(&store), vec!["from clone"]);
    }

    #[test]
    fn test_console_mirror_in_development() {
        #[derive(Clone, Default)]
        struct SharedBuf(Arc<Mutex<Vec<u8>>>);

        impl Write for SharedBuf {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buf = SharedBuf::default();
        let store = LogStore::builder(StoreConfig::for_environment(Environment::Development))
            .console_writer(buf.clone())
            .build();
        assert!(store.console_active());
        assert!(!store.remote_active());

        store.warn("disk low");
        let text = String::from_utf8(buf.0.lock().clone()).unwrap();
        assert!(text.contains("[WARN] disk low"));
    }

    struct RecordingTransport(Mutex<Vec<String>>);

    impl RemoteTransport for RecordingTransport {
        fn send<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.0.lock().push(entry.message.clone());
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_remote_mirror_in_production() {
        let transport = Arc::new(RecordingTransport(Mutex::new(Vec::new())));
        let store = LogStore::builder(StoreConfig::for_environment(Environment::Production))
            .transport(transport.clone())
            .build();
        assert!(!store.console_active());
        assert!(store.remote_active());

        store.info("boot");
        store.error("fail");
        // Local buffer is updated before any delivery happens
        assert_eq!(messages(&store), vec!["boot", "fail"]);

        store.shutdown().await;
        let mut delivered = transport.0.lock().clone();
        delivered.sort();
        assert_eq!(delivered, vec!["boot", "fail"]);
        assert_eq!(store.remote_stats(), Some(RemoteStats { sent: 2, failed: 0 }));
    }

    #[test]
    fn test_production_without_runtime_still_logs() {
        let store = LogStore::new(StoreConfig::for_environment(Environment::Production));
        assert!(!store.remote_active());
        store.error("still recorded");
        assert_eq!(store.len(), 1);
    }
}
