use serde_json::Value;

use diaglog_types::{LogData, LogLevel};

/// One input line turned into the pieces of a log call
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedLine {
    pub level: LogLevel,
    pub message: String,
    pub data: Option<LogData>,
}

/// Parser for lines fed into the store from outside the process
///
/// JSON objects contribute their level and message fields, with every other
/// field kept as data. Anything else is taken as plain text.
pub struct LineParser;

const LEVEL_FIELDS: [&str; 6] = ["level", "lvl", "severity", "loglevel", "log_level", "log.level"];
const MESSAGE_FIELDS: [&str; 5] = ["message", "msg", "log", "text", "body"];
/// Fields an exported entry carries besides level, message and data
const EXPORT_FIELDS: [&str; 2] = ["timestamp", "trace"];

impl LineParser {
    /// Parse a raw line; blank lines yield `None`
    pub fn parse(raw: &str) -> Option<ParsedLine> {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }

        Some(Self::try_parse_json(line).unwrap_or_else(|| ParsedLine {
            level: Self::extract_level_from_text(line),
            message: line.to_string(),
            data: None,
        }))
    }

    fn try_parse_json(line: &str) -> Option<ParsedLine> {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            return None;
        }

        let Value::Object(mut fields) = serde_json::from_str::<Value>(trimmed).ok()? else {
            return None;
        };

        let level = LEVEL_FIELDS
            .iter()
            .find_map(|key| fields.remove(*key))
            .and_then(|value| Self::level_from_json(&value))
            .unwrap_or_default();

        let message = MESSAGE_FIELDS
            .iter()
            .find_map(|key| match fields.get(*key) {
                Some(Value::String(s)) => Some((*key, s.clone())),
                _ => None,
            })
            .map(|(key, message)| {
                fields.remove(key);
                message
            })
            .unwrap_or_default();

        // Exported entries nest their payload under `data`; the store stamps
        // its own timestamp and trace
        let exported = matches!(fields.get("data"), Some(Value::Object(_)))
            && fields
                .keys()
                .all(|key| key == "data" || EXPORT_FIELDS.contains(&key.as_str()));
        if exported && let Some(Value::Object(data)) = fields.remove("data") {
            fields = data;
        }

        Some(ParsedLine {
            level,
            message,
            data: (!fields.is_empty()).then_some(fields),
        })
    }

    /// Level from a string or a numeric (pino/bunyan style) value
    fn level_from_json(value: &Value) -> Option<LogLevel> {
        match value {
            Value::String(s) => LogLevel::parse(s),
            Value::Number(n) => n.as_u64().map(|num| match num {
                0..=20 => LogLevel::Debug,
                21..=30 => LogLevel::Info,
                31..=40 => LogLevel::Warn,
                _ => LogLevel::Error,
            }),
            _ => None,
        }
    }

    /// Extract log level from plain text patterns, defaulting to info
    fn extract_level_from_text(content: &str) -> LogLevel {
        let upper = content.to_uppercase();

        // Bracketed patterns first: [ERROR], [WARN], ...
        let bracket_patterns = [
            ("[FATAL]", LogLevel::Error),
            ("[PANIC]", LogLevel::Error),
            ("[ERROR]", LogLevel::Error),
            ("[ERR]", LogLevel::Error),
            ("[WARN]", LogLevel::Warn),
            ("[WARNING]", LogLevel::Warn),
            ("[INFO]", LogLevel::Info),
            ("[DEBUG]", LogLevel::Debug),
            ("[TRACE]", LogLevel::Debug),
        ];

        for (pattern, level) in bracket_patterns {
            if upper.contains(pattern) {
                return level;
            }
        }

        let colon_patterns = [
            ("FATAL:", LogLevel::Error),
            ("ERROR:", LogLevel::Error),
            ("WARNING:", LogLevel::Warn),
            ("WARN:", LogLevel::Warn),
            ("INFO:", LogLevel::Info),
            ("DEBUG:", LogLevel::Debug),
            ("TRACE:", LogLevel::Debug),
        ];

        for (pattern, level) in colon_patterns {
            if upper.contains(pattern) {
                return level;
            }
        }

        let start_patterns = [
            ("FATAL", LogLevel::Error),
            ("ERROR", LogLevel::Error),
            ("WARN", LogLevel::Warn),
            ("INFO", LogLevel::Info),
            ("DEBUG", LogLevel::Debug),
            ("TRACE", LogLevel::Debug),
        ];

        let trimmed_upper = upper.trim_start();
        for (pattern, level) in start_patterns {
            if trimmed_upper.starts_with(pattern) {
                return level;
            }
        }

        LogLevel::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diaglog_types::{LogEntry, into_log_data};
    use serde_json::json;

    #[test]
    fn test_parse_json_line() {
        let line = r#"{"level":"error","msg":"something failed","code":500}"#;
        let parsed = LineParser::parse(line).unwrap();
        assert_eq!(parsed.level, LogLevel::Error);
        assert_eq!(parsed.message, "something failed");

        let data = parsed.data.unwrap();
        assert_eq!(data["code"], 500);
        assert!(!data.contains_key("level"));
        assert!(!data.contains_key("msg"));
    }

    #[test]
    fn test_parse_numeric_level() {
        let parsed = LineParser::parse(r#"{"level":40,"message":"slow"}"#).unwrap();
        assert_eq!(parsed.level, LogLevel::Warn);
        assert!(parsed.data.is_none());
    }

    #[test]
    fn test_parse_exported_entry_shape() {
        let line = r#"{"level":"warn","message":"low disk","data":{"free_mb":12}}"#;
        let parsed = LineParser::parse(line).unwrap();
        assert_eq!(parsed.level, LogLevel::Warn);
        assert_eq!(parsed.message, "low disk");
        assert_eq!(parsed.data.unwrap()["free_mb"], 12);

        // `data` next to other fields stays nested
        let parsed = LineParser::parse(r#"{"msg":"x","data":{"a":1},"b":2}"#).unwrap();
        let data = parsed.data.unwrap();
        assert_eq!(data["data"]["a"], 1);
        assert_eq!(data["b"], 2);
    }

    #[test]
    fn test_parse_serialized_entry() {
        let data = into_log_data(json!({"code": 507}));
        let entry = LogEntry::new(LogLevel::Error, "upload failed", data)
            .with_trace(Some("frame 0".to_string()));
        let line = serde_json::to_string(&entry).unwrap();

        let parsed = LineParser::parse(&line).unwrap();
        assert_eq!(parsed.level, LogLevel::Error);
        assert_eq!(parsed.message, "upload failed");
        assert_eq!(parsed.data, entry.data);

        let entry = LogEntry::new(LogLevel::Info, "tick", into_log_data(json!({"n": 1})));
        let parsed = LineParser::parse(&serde_json::to_string(&entry).unwrap()).unwrap();
        let data = parsed.data.unwrap();
        assert_eq!(data["n"], 1);
        assert!(!data.contains_key("timestamp"));
    }

    #[test]
    fn test_parse_text_level() {
        let parsed = LineParser::parse("[ERROR] something went wrong\n").unwrap();
        assert_eq!(parsed.level, LogLevel::Error);
        assert_eq!(parsed.message, "[ERROR] something went wrong");

        assert_eq!(LineParser::parse("WARN: disk").unwrap().level, LogLevel::Warn);
        assert_eq!(LineParser::parse("hello").unwrap().level, LogLevel::Info);
    }

    #[test]
    fn test_blank_and_non_object_lines() {
        assert!(LineParser::parse("   \n").is_none());
        let parsed = LineParser::parse("[1, 2]").unwrap();
        assert_eq!(parsed.message, "[1, 2]");
        assert!(parsed.data.is_none());
    }

    #[test]
    fn test_parse_multibyte_utf8_no_panic() {
        let parsed = LineParser::parse("─────── ╭──╮ erreur").unwrap();
        assert_eq!(parsed.level, LogLevel::Info);
    }
}
