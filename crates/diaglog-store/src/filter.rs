use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

use diaglog_types::{LogEntry, LogLevel};

use crate::error::Result;

/// Compiled filter for log entries
///
/// An entry matches when the pattern occurs in its message or in the JSON
/// text of its data payload.
#[derive(Clone)]
pub struct CompiledFilter {
    /// Compiled pattern (if any)
    regex: Option<Regex>,

    /// Original pattern string
    pattern: String,

    /// Log levels to include (empty = all)
    levels: HashSet<LogLevel>,

    /// Case sensitivity
    case_insensitive: bool,

    /// Pattern is a regular expression rather than literal text
    is_regex: bool,
}

impl CompiledFilter {
    /// Literal substring filter
    pub fn text(pattern: &str, case_insensitive: bool) -> Self {
        let regex = if pattern.is_empty() {
            None
        } else {
            // An escaped literal always compiles
            RegexBuilder::new(&regex::escape(pattern))
                .case_insensitive(case_insensitive)
                .build()
                .ok()
        };

        Self {
            regex,
            pattern: pattern.to_string(),
            levels: HashSet::new(),
            case_insensitive,
            is_regex: false,
        }
    }

    /// Regular expression filter
    pub fn regex(pattern: &str, case_insensitive: bool) -> Result<Self> {
        let regex = if pattern.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(pattern)
                    .case_insensitive(case_insensitive)
                    .build()?,
            )
        };

        Ok(Self {
            regex,
            pattern: pattern.to_string(),
            levels: HashSet::new(),
            case_insensitive,
            is_regex: true,
        })
    }

    /// Set log levels to filter by
    pub fn with_levels(mut self, levels: HashSet<LogLevel>) -> Self {
        self.levels = levels;
        self
    }

    /// Check if a log entry matches this filter
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if !self.levels.is_empty() && !self.levels.contains(&entry.level) {
            return false;
        }

        let Some(re) = &self.regex else {
            return true;
        };

        if re.is_match(&entry.message) {
            return true;
        }

        entry
            .data_json()
            .map(|json| re.is_match(&json))
            .unwrap_or(false)
    }

    /// Find all match positions in a string (for highlighting)
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        match &self.regex {
            Some(re) => re.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            None => Vec::new(),
        }
    }

    /// Get the original pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Check if filter is empty (matches everything)
    pub fn is_empty(&self) -> bool {
        self.regex.is_none() && self.levels.is_empty()
    }

    /// Check if filter has a text pattern
    pub fn has_pattern(&self) -> bool {
        self.regex.is_some()
    }

    /// Check if filter is case insensitive
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn is_regex(&self) -> bool {
        self.is_regex
    }
}

impl std::fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("pattern", &self.pattern)
            .field("levels", &self.levels)
            .field("case_insensitive", &self.case_insensitive)
            .field("is_regex", &self.is_regex)
            .finish()
    }
}

/// Quick filter presets
pub struct FilterPresets;

impl FilterPresets {
    /// Filter for errors only
    pub fn errors_only() -> CompiledFilter {
        CompiledFilter::text("", true).with_levels(HashSet::from([LogLevel::Error]))
    }

    /// Filter for warnings and above
    pub fn warnings_and_above() -> CompiledFilter {
        CompiledFilter::text("", true)
            .with_levels(HashSet::from([LogLevel::Warn, LogLevel::Error]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diaglog_types::into_log_data;
    use serde_json::json;

    #[test]
    fn test_text_filter_is_case_insensitive() {
        let filter = CompiledFilter::text("ERROR", true);
        let mut entry = LogEntry::new(LogLevel::Info, "an error occurred", None);
        assert!(filter.matches(&entry));

        entry.message = "everything is fine".to_string();
        assert!(!filter.matches(&entry));
    }

    #[test]
    fn test_text_filter_escapes_regex_syntax() {
        let filter = CompiledFilter::text("a.b(", true);
        let entry = LogEntry::new(LogLevel::Info, "literal a.b( here", None);
        assert!(filter.matches(&entry));
        let other = LogEntry::new(LogLevel::Info, "axb(", None);
        assert!(!filter.matches(&other));
    }

    #[test]
    fn test_filter_searches_data_payload() {
        let filter = CompiledFilter::text("timeout", true);
        let entry = LogEntry::new(
            LogLevel::Error,
            "request failed",
            into_log_data(json!({"reason": "Timeout after 30s"})),
        );
        assert!(filter.matches(&entry));
    }

    #[test]
    fn test_case_sensitive_filter() {
        let filter = CompiledFilter::text("Boot", false);
        assert!(!filter.matches(&LogEntry::new(LogLevel::Info, "boot", None)));
        assert!(filter.matches(&LogEntry::new(LogLevel::Info, "Boot", None)));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(CompiledFilter::regex("(unclosed", true).is_err());
        let filter = CompiledFilter::regex(r"code \d+", true).unwrap();
        assert!(filter.matches(&LogEntry::new(LogLevel::Info, "CODE 500", None)));
    }

    #[test]
    fn test_level_filter() {
        let filter = FilterPresets::errors_only();
        assert!(filter.matches(&LogEntry::new(LogLevel::Error, "x", None)));
        assert!(!filter.matches(&LogEntry::new(LogLevel::Info, "x", None)));
        let warn = LogEntry::new(LogLevel::Warn, "x", None);
        assert!(FilterPresets::warnings_and_above().matches(&warn));
        assert!(!filter.matches(&warn));
    }

    #[test]
    fn test_find_matches() {
        let filter = CompiledFilter::text("error", true);
        let matches = filter.find_matches("an error occurred, another ERROR here");
        assert_eq!(matches.len(), 2);
    }
}
