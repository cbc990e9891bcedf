use std::time::Duration;

use diaglog_types::Environment;

/// Default number of retained entries
pub const DEFAULT_MAX_LOGS: usize = 1000;

/// Default remote collection endpoint
pub const DEFAULT_REMOTE_ENDPOINT: &str = "http://localhost:5000/api/logs";

/// Configuration for a [`LogStore`](crate::LogStore)
#[derive(Clone, Debug, PartialEq)]
pub struct StoreConfig {
    /// Maximum retained entries, oldest evicted first
    pub max_logs: usize,

    /// Decides the mirroring defaults
    pub environment: Environment,

    /// Console mirroring override (None = environment default)
    pub console: Option<bool>,

    /// Remote mirroring override (None = environment default)
    pub remote: Option<bool>,

    /// Where remote mirroring POSTs entries
    pub remote_endpoint: String,

    /// Per-request timeout for remote mirroring (None = wait indefinitely)
    pub remote_timeout: Option<Duration>,

    /// Attach a backtrace to each entry when the runtime allows it
    pub capture_traces: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_logs: DEFAULT_MAX_LOGS,
            environment: Environment::default(),
            console: None,
            remote: None,
            remote_endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            remote_timeout: None,
            capture_traces: true,
        }
    }
}

impl StoreConfig {
    /// Defaults for the given environment
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            ..Default::default()
        }
    }

    /// Whether entries are mirrored to the console
    pub fn console_enabled(&self) -> bool {
        self.console.unwrap_or_else(|| self.environment.console_enabled())
    }

    /// Whether entries are mirrored to the remote endpoint
    pub fn remote_enabled(&self) -> bool {
        self.remote.unwrap_or_else(|| self.environment.remote_enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_contract() {
        let dev = StoreConfig::for_environment(Environment::Development);
        assert!(dev.console_enabled());
        assert!(!dev.remote_enabled());

        let prod = StoreConfig::for_environment(Environment::Production);
        assert!(!prod.console_enabled());
        assert!(prod.remote_enabled());
    }

    #[test]
    fn test_overrides_win() {
        let config = StoreConfig {
            console: Some(false),
            remote: Some(true),
            ..StoreConfig::for_environment(Environment::Development)
        };
        assert!(!config.console_enabled());
        assert!(config.remote_enabled());
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.max_logs, 1000);
        assert_eq!(config.remote_endpoint, "http://localhost:5000/api/logs");
        assert!(config.remote_timeout.is_none());
    }
}
