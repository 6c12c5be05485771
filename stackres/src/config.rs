//! Runtime configuration shared by all handlers.

use std::time::Duration;

use crate::wait::{DEFAULT_ATTEMPTS, DEFAULT_INTERVAL, Waiter};

/// Default timeout for the orchestrator callback request.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Delay between convergence polls.
    pub wait_interval: Duration,
    /// Maximum number of convergence polls.
    pub wait_attempts: u32,
    /// Timeout for the callback PUT.
    pub callback_timeout: Duration,
    /// Region used when neither the event nor the function ARN names one.
    pub region: Option<String>,
    /// Log stream referenced in callback reasons.
    pub log_stream_name: String,
}

impl HandlerConfig {
    pub fn waiter(&self) -> Waiter {
        Waiter::new(self.wait_interval, self.wait_attempts)
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            wait_interval: DEFAULT_INTERVAL,
            wait_attempts: DEFAULT_ATTEMPTS,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            region: None,
            log_stream_name: String::new(),
        }
    }
}
