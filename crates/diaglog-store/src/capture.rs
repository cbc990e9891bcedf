//! Process-wide diagnostic capture.
//!
//! Panics and failed background tasks are turned into `error` entries in the
//! installed [`LogStore`]. The panic hook chains to the previously installed
//! hook, so default reporting still happens.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt::Display;
use std::future::Future;
use std::panic::PanicHookInfo;
use std::sync::OnceLock;

use serde_json::{Value, json};
use tokio::task::JoinHandle;

use diaglog_types::{LogData, LogLevel};

use crate::error::CaptureError;
use crate::store::LogStore;

/// Message of entries logged for panics
pub const PANIC_MESSAGE: &str = "Uncaught Panic";

/// Message of entries logged for failed background tasks
pub const REJECTION_MESSAGE: &str = "Unhandled Task Rejection";

static INSTALLED: OnceLock<DiagnosticCapture> = OnceLock::new();

/// Handle to the installed capture hooks
#[derive(Clone)]
pub struct DiagnosticCapture {
    store: LogStore,
}

impl DiagnosticCapture {
    /// Install the panic hook and the task-failure sink for `store`
    ///
    /// Only the first call in a process succeeds.
    pub fn install(store: &LogStore) -> Result<Self, CaptureError> {
        let mut installed_now = false;
        let capture = INSTALLED.get_or_init(|| {
            installed_now = true;
            install_panic_hook(store.clone());
            Self {
                store: store.clone(),
            }
        });

        if installed_now {
            tracing::debug!("diagnostic capture installed");
            Ok(capture.clone())
        } else {
            Err(CaptureError::AlreadyInstalled)
        }
    }

    /// The installed capture, if any
    pub fn installed() -> Option<Self> {
        INSTALLED.get().cloned()
    }

    /// Spawn a fallible task whose error is logged instead of dropped
    ///
    /// The handle resolves to `None` when the task failed.
    pub fn spawn<F, T, E>(&self, name: impl Into<String>, future: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let capture = self.clone();
        let name = name.into();
        tokio::spawn(async move {
            match future.await {
                Ok(value) => Some(value),
                Err(e) => {
                    capture.report(Some(&name), &e);
                    None
                }
            }
        })
    }

    /// Log an unhandled failure reason
    pub fn report(&self, task: Option<&str>, reason: &dyn Display) {
        let mut data = LogData::new();
        data.insert("reason".to_string(), Value::String(reason.to_string()));
        if let Some(task) = task {
            data.insert("task".to_string(), Value::String(task.to_string()));
        }
        self.store.error_with(REJECTION_MESSAGE, Value::Object(data));
    }
}

/// Log an unhandled failure through the installed capture
///
/// Does nothing before [`DiagnosticCapture::install`].
pub fn report_rejection(reason: impl Display) {
    if let Some(capture) = INSTALLED.get() {
        capture.report(None, &reason);
    }
}

fn install_panic_hook(store: LogStore) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Non-blocking: the panicking thread may hold the buffer lock, in which
        // case the entry is dropped and only the previous hook reports it
        let data = Value::Object(panic_data(info));
        if !store.try_log(LogLevel::Error, PANIC_MESSAGE, Some(data)) {
            tracing::warn!("log buffer busy, panic entry not stored");
        }
        previous(info);
    }));
}

fn panic_data(info: &PanicHookInfo<'_>) -> LogData {
    let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
        *s
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.as_str()
    } else {
        "<unknown panic payload>"
    };

    let thread = std::thread::current();
    let mut data = LogData::new();
    data.insert("message".to_string(), json!(message));
    data.insert("thread".to_string(), json!(thread.name().unwrap_or("unnamed")));

    if let Some(location) = info.location() {
        data.insert("file".to_string(), json!(location.file()));
        data.insert("line".to_string(), json!(location.line()));
        data.insert("column".to_string(), json!(location.column()));
    }

    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        data.insert("stack".to_string(), json!(backtrace.to_string()));
    }

    data
}
