//! Registry configuration

use std::time::Duration;

/// Shortest accepted per-write deadline
pub const MIN_WRITE_TIMEOUT: Duration = Duration::from_millis(10);

/// Configuration for subscriber delivery and membership
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Deadline for a single chunk write to one subscriber.
    ///
    /// A write that does not complete in time counts as a failure and the
    /// subscriber is evicted at the end of the sweep.
    pub write_timeout: Duration,

    /// Deadline for sending the close frame to an evicted subscriber
    pub close_timeout: Duration,

    /// Maximum registered subscribers (0 = unlimited)
    pub max_subscribers: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(2),
            close_timeout: Duration::from_secs(1),
            max_subscribers: 0,
        }
    }
}

impl RegistryConfig {
    /// Set the per-write deadline, raised to at least [`MIN_WRITE_TIMEOUT`]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout.max(MIN_WRITE_TIMEOUT);
        self
    }

    /// Set the close deadline
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set the subscriber limit
    pub fn max_subscribers(mut self, max: usize) -> Self {
        self.max_subscribers = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.write_timeout, Duration::from_secs(2));
        assert_eq!(config.max_subscribers, 0);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .write_timeout(Duration::from_millis(250))
            .close_timeout(Duration::from_millis(50))
            .max_subscribers(16);

        assert_eq!(config.write_timeout, Duration::from_millis(250));
        assert_eq!(config.close_timeout, Duration::from_millis(50));
        assert_eq!(config.max_subscribers, 16);
    }

    #[test]
    fn test_zero_write_timeout_is_raised() {
        let config = RegistryConfig::default().write_timeout(Duration::ZERO);

        assert_eq!(config.write_timeout, MIN_WRITE_TIMEOUT);
    }
}
