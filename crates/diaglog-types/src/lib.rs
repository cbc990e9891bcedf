//! Shared types for diaglog
//!
//! This crate contains data structures used across multiple diaglog crates.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use ratatui::style::Color;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Structured payload attached to a log entry
pub type LogData = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Environment
// ============================================================================

/// Deployment environment, decides which mirrors are active by default
///
/// Deserializes from any name [`Environment::parse`] accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Parse an environment name (`development`, `dev`, `production`, `prod`)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// Console mirroring is on in development only
    pub fn console_enabled(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Remote mirroring is on in production only
    pub fn remote_enabled(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Self::parse(&name).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "unknown environment {:?}, expected development or production",
                name
            ))
        })
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// Log severity level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// All levels, lowest severity first
    pub const ALL: [LogLevel; 4] = [Self::Debug, Self::Info, Self::Warn, Self::Error];

    /// Parse log level from common formats
    ///
    /// Levels outside the four supported ones collapse onto their nearest
    /// neighbour: trace becomes debug, fatal/panic/critical become error.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" | "trc" | "debug" | "dbg" | "debg" => Some(Self::Debug),
            "info" | "inf" | "information" => Some(Self::Info),
            "warn" | "warning" | "wrn" => Some(Self::Warn),
            "error" | "err" | "erro" | "fatal" | "panic" | "critical" | "crit" => Some(Self::Error),
            _ => None,
        }
    }

    /// Get display color for this level
    pub fn color(&self) -> Color {
        match self {
            Self::Debug => Color::Gray,
            Self::Info => Color::Blue,
            Self::Warn => Color::Yellow,
            Self::Error => Color::Red,
        }
    }

    /// Lowercase name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Uppercase name for console and viewer output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single log entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Capture time, millisecond precision
    #[serde(serialize_with = "serialize_timestamp", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    pub level: LogLevel,

    pub message: String,

    /// Caller-supplied structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<LogData>,

    /// Captured call stack (best effort)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current time
    pub fn new(level: LogLevel, message: impl Into<String>, data: Option<LogData>) -> Self {
        Self::at(Utc::now(), level, message, data)
    }

    /// Create an entry with an explicit timestamp
    pub fn at(
        timestamp: DateTime<Utc>,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<LogData>,
    ) -> Self {
        Self {
            // ISO-8601 output carries milliseconds only
            timestamp: timestamp.trunc_subsecs(3),
            level,
            message: message.into(),
            data,
            trace: None,
        }
    }

    /// Attach a captured call stack
    pub fn with_trace(mut self, trace: Option<String>) -> Self {
        self.trace = trace;
        self
    }

    /// ISO-8601 timestamp, e.g. `2024-01-15T10:30:00.123Z`
    pub fn timestamp_iso(&self) -> String {
        format_timestamp(&self.timestamp)
    }

    /// Compact JSON of the data payload, if any
    pub fn data_json(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| serde_json::to_string(d).ok())
    }
}

/// Normalize an arbitrary JSON value into a data payload
///
/// Objects are used as-is, `null` means no payload, anything else is
/// wrapped as `{"value": ...}`.
pub fn into_log_data(value: serde_json::Value) -> Option<LogData> {
    match value {
        serde_json::Value::Object(map) => Some(map),
        serde_json::Value::Null => None,
        other => {
            let mut map = LogData::new();
            map.insert("value".to_string(), other);
            Some(map)
        }
    }
}

/// ISO-8601 with milliseconds and a `Z` suffix
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(ts))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}
