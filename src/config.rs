use std::time::Duration;

/// Configuration for a [`SessionController`](crate::SessionController).
///
/// Use [`ControllerConfig::builder()`] for ergonomic construction, or
/// [`ControllerConfig::default()`] for a 2 second interval and a 150 poll
/// ceiling (about five minutes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Delay between a poll resolving and the next one being issued.
    pub poll_interval: Duration,

    /// Status checks allowed per session before giving up with a timeout.
    pub max_poll_attempts: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 150,
        }
    }
}

impl ControllerConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder::default()
    }
}

/// Builder for [`ControllerConfig`].
#[derive(Default)]
pub struct ControllerConfigBuilder {
    config: ControllerConfig,
}

impl ControllerConfigBuilder {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the poll ceiling. Values below 1 are raised to 1.
    pub fn with_max_poll_attempts(mut self, max: u32) -> Self {
        self.config.max_poll_attempts = max.max(1);
        self
    }

    /// Build the final [`ControllerConfig`].
    pub fn build(self) -> ControllerConfig {
        self.config
    }
}
