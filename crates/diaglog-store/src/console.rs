//! Console mirroring of log entries.

use std::io::{self, Write};

use crossterm::style::{Color, Stylize};
use parking_lot::Mutex;

use diaglog_types::{LogEntry, LogLevel};

/// Writes one formatted line per entry to a console stream
pub struct ConsoleMirror {
    writer: Mutex<Box<dyn Write + Send>>,
    colored: bool,
}

impl ConsoleMirror {
    /// Mirror to stderr with level colors
    pub fn stderr() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stderr())),
            colored: true,
        }
    }

    /// Mirror to an arbitrary writer without colors
    pub fn with_writer<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            writer: Mutex::new(Box::new(writer)),
            colored: false,
        }
    }

    /// Write an entry; failures are ignored
    pub fn emit(&self, entry: &LogEntry) {
        let line = format_line(entry, self.colored);
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "{}", line);
        let _ = writer.flush();
    }

    /// Write an entry unless another caller holds the writer
    pub fn try_emit(&self, entry: &LogEntry) -> bool {
        let Some(mut writer) = self.writer.try_lock() else {
            return false;
        };
        let _ = writeln!(writer, "{}", format_line(entry, self.colored));
        let _ = writer.flush();
        true
    }
}

/// `<timestamp> [<LEVEL>] <message> <data>`
pub fn format_line(entry: &LogEntry, colored: bool) -> String {
    let header = format!("{} [{}]", entry.timestamp_iso(), entry.level.label());
    let header = if colored {
        header.with(level_color(entry.level)).bold().to_string()
    } else {
        header
    };

    match entry.data_json() {
        Some(data) => format!("{} {} {}", header, entry.message, data),
        None => format!("{} {}", header, entry.message),
    }
}

fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Debug => Color::Grey,
        LogLevel::Info => Color::Blue,
        LogLevel::Warn => Color::Yellow,
        LogLevel::Error => Color::Red,
    }
}
