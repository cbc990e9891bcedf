//! Log store for diaglog
//!
//! This crate provides the bounded log buffer, console and remote mirroring,
//! diagnostic capture, filtering and JSON export.

mod buffer;
mod capture;
mod config;
mod console;
mod error;
pub mod export;
mod filter;
mod parser;
mod remote;
mod store;

pub use buffer::{ArcLogEntry, LevelCounts, LogBuffer};
pub use capture::{DiagnosticCapture, PANIC_MESSAGE, REJECTION_MESSAGE, report_rejection};
pub use config::{DEFAULT_MAX_LOGS, DEFAULT_REMOTE_ENDPOINT, StoreConfig};
pub use console::{ConsoleMirror, format_line};
pub use error::{CaptureError, LogError, Result};
pub use filter::{CompiledFilter, FilterPresets};
pub use parser::{LineParser, ParsedLine};
pub use remote::{HttpTransport, RemoteMirror, RemoteStats, RemoteTransport};
pub use store::{LogStore, LogStoreBuilder};

// Re-export types used in our public API
pub use diaglog_types::{Environment, LogData, LogEntry, LogLevel};
