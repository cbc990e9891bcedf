use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use diaglog_types::{LogEntry, LogLevel};

/// Shared, immutable handle to a stored entry
pub type ArcLogEntry = Arc<LogEntry>;

/// Thread-safe ring buffer for log entries
#[derive(Clone)]
pub struct LogBuffer {
    /// Internal storage - entries are never mutated once pushed
    entries: Arc<RwLock<VecDeque<ArcLogEntry>>>,

    /// Maximum capacity
    capacity: usize,
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Push a new entry, evicting the oldest ones past capacity
    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.entries.write();
        self.push_locked(&mut entries, entry);
    }

    /// Push unless the lock is held, returning whether the entry was stored
    ///
    /// For callers that must never block, like a panic hook running while
    /// the panicking thread holds a read guard.
    pub fn try_push(&self, entry: LogEntry) -> bool {
        let Some(mut entries) = self.entries.try_write() else {
            return false;
        };
        self.push_locked(&mut entries, entry);
        true
    }

    fn push_locked(&self, entries: &mut VecDeque<ArcLogEntry>, entry: LogEntry) {
        entries.push_back(Arc::new(entry));
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Get all entries (Arc clones are cheap - just reference count increment)
    pub fn all(&self) -> Vec<ArcLogEntry> {
        self.entries.read().iter().cloned().collect()
    }

    /// Deep copy of all entries, in insertion order
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.read().iter().map(|e| LogEntry::clone(e)).collect()
    }

    /// Get entries filtered by a predicate
    pub fn filtered<F>(&self, predicate: F) -> Vec<ArcLogEntry>
    where
        F: Fn(&LogEntry) -> bool,
    {
        self.entries
            .read()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// Get entry count per log level
    pub fn level_counts(&self) -> LevelCounts {
        let entries = self.entries.read();
        let mut counts = LevelCounts::default();

        for entry in entries.iter() {
            match entry.level {
                LogLevel::Debug => counts.debug += 1,
                LogLevel::Info => counts.info += 1,
                LogLevel::Warn => counts.warn += 1,
                LogLevel::Error => counts.error += 1,
            }
        }

        counts
    }

    /// Total entry count
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Maximum number of retained entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Get the last N entries
    pub fn tail(&self, n: usize) -> Vec<ArcLogEntry> {
        let entries = self.entries.read();
        let start = entries.len().saturating_sub(n);
        entries.iter().skip(start).cloned().collect()
    }
}

/// Counts per log level
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    pub debug: usize,
    pub info: usize,
    pub warn: usize,
    pub error: usize,
}

impl LevelCounts {
    pub fn total(&self) -> usize {
        self.debug + self.info + self.warn + self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(level: LogLevel, message: &str) -> LogEntry {
        LogEntry::new(level, message, None)
    }

    fn messages(buffer: &LogBuffer) -> Vec<String> {
        buffer.all().iter().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn test_capacity_boundary() {
        let buffer = LogBuffer::new(3);
        for m in ["a", "b", "c", "d"] {
            buffer.push(entry(LogLevel::Info, m));
        }
        assert_eq!(messages(&buffer), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let buffer = LogBuffer::new(0);
        buffer.push(entry(LogLevel::Info, "a"));
        buffer.push(entry(LogLevel::Info, "b"));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(messages(&buffer), vec!["b"]);
    }

    #[test]
    fn test_level_counts() {
        let buffer = LogBuffer::new(10);
        buffer.push(entry(LogLevel::Debug, "d"));
        buffer.push(entry(LogLevel::Info, "i"));
        buffer.push(entry(LogLevel::Warn, "w"));
        buffer.push(entry(LogLevel::Error, "e"));
        buffer.push(entry(LogLevel::Error, "e2"));

        let counts = buffer.level_counts();
        assert_eq!(counts.error, 2);
        assert_eq!(counts.total(), 5);
        assert_eq!(counts.debug, 1);
    }

    #[test]
    fn test_tail() {
        let buffer = LogBuffer::new(10);
        for m in ["a", "b", "c", "d"] {
            buffer.push(entry(LogLevel::Info, m));
        }
        let tail: Vec<_> = buffer.tail(2).iter().map(|e| e.message.clone()).collect();
        assert_eq!(tail, vec!["c", "d"]);
        assert_eq!(buffer.tail(100).len(), 4);
    }

    #[test]
    fn test_try_push_skips_while_read_locked() {
        let buffer = LogBuffer::new(10);
        buffer.push(entry(LogLevel::Info, "a"));

        // A predicate runs under the read guard; pushing from it must not deadlock
        let seen = buffer.filtered(|_| {
            assert!(!buffer.try_push(entry(LogLevel::Error, "from predicate")));
            true
        });
        assert_eq!(seen.len(), 1);

        assert!(buffer.try_push(entry(LogLevel::Error, "b")));
        assert_eq!(messages(&buffer), vec!["a", "b"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let buffer = LogBuffer::new(10);
        buffer.push(entry(LogLevel::Info, "kept"));
        let mut snap = buffer.snapshot();
        snap.clear();
        snap.push(entry(LogLevel::Error, "injected"));
        assert_eq!(messages(&buffer), vec!["kept"]);
    }

    proptest! {
        #[test]
        fn prop_retains_most_recent_in_order(capacity in 1usize..32, count in 0usize..128) {
            let buffer = LogBuffer::new(capacity);
            for i in 0..count {
                buffer.push(entry(LogLevel::Info, &i.to_string()));
            }

            let expected: Vec<String> = (count.saturating_sub(capacity)..count)
                .map(|i| i.to_string())
                .collect();
            prop_assert_eq!(buffer.len(), count.min(capacity));
            prop_assert_eq!(messages(&buffer), expected);
        }
    }
}
