use serde::Deserialize;
use std::time::Duration;

/// Default identity cache capacity per session.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Default number of idle sessions kept by a [`SessionPool`](crate::SessionPool).
pub const DEFAULT_MAX_IDLE_SESSIONS: usize = 64;

/// Session configuration.
///
/// Deserializable so it can live in an application's config file:
///
/// ```toml
/// cache_capacity = 200
/// log_statements = true
/// slow_statement_threshold_ms = 250
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Identity cache capacity. `0` disables caching.
    pub cache_capacity: usize,
    /// Idle sessions retained by the pool.
    pub max_idle_sessions: usize,
    /// Emit every statement at `debug` level.
    pub log_statements: bool,
    /// Statements slower than this are logged at `warn` level. `None` disables the check.
    #[serde(rename = "slow_statement_threshold_ms", with = "millis")]
    pub slow_statement_threshold: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_idle_sessions: DEFAULT_MAX_IDLE_SESSIONS,
            log_statements: false,
            slow_statement_threshold: None,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identity cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set how many idle sessions the pool keeps.
    pub fn with_max_idle_sessions(mut self, n: usize) -> Self {
        self.max_idle_sessions = n;
        self
    }

    /// Enable statement logging.
    pub fn enable_statement_logging(mut self) -> Self {
        self.log_statements = true;
        self
    }

    /// Set the slow statement threshold.
    pub fn with_slow_statement_threshold(mut self, threshold: Duration) -> Self {
        self.slow_statement_threshold = Some(threshold);
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.cache_capacity, 50);
        assert!(!cfg.log_statements);
        assert!(cfg.slow_statement_threshold.is_none());
    }

    #[test]
    fn deserialize_partial_json() {
        let cfg: SessionConfig =
            serde_json::from_str(r#"{"cache_capacity": 8, "slow_statement_threshold_ms": 250}"#)
                .unwrap();
        assert_eq!(cfg.cache_capacity, 8);
        assert_eq!(cfg.max_idle_sessions, DEFAULT_MAX_IDLE_SESSIONS);
        assert_eq!(
            cfg.slow_statement_threshold,
            Some(Duration::from_millis(250))
        );
    }
}
