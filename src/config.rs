use std::time::Duration;

use tracing::warn;

use crate::constants::{DEFAULT_TIMEOUT, DEFAULT_WORKER_NAME, ENV_RUSTYFATAL_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// How long to wait for the block to reach a termination point
    pub timeout: Duration,
    /// Name given to threads spawned for blocks
    pub thread_name: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            thread_name: DEFAULT_WORKER_NAME.to_string(),
        }
    }
}

impl HarnessConfig {
    /// Defaults, with the timeout taken from `RUSTYFATAL_TIMEOUT` if it is set and valid.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(ENV_RUSTYFATAL_TIMEOUT) {
            config.apply_timeout(&value);
        }
        config
    }

    fn apply_timeout(&mut self, value: &str) {
        match humantime::parse_duration(value.trim()) {
            Ok(timeout) => self.timeout = timeout,
            Err(e) => warn!(
                value,
                error = %e,
                "ignoring invalid {}, keeping {}",
                ENV_RUSTYFATAL_TIMEOUT,
                humantime::format_duration(self.timeout)
            ),
        }
    }
}
