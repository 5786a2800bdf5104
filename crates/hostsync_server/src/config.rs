//! Server configuration.

use std::net::SocketAddr;

/// Configuration for the group synchronization server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the TCP transport binds to.
    pub bind_addr: SocketAddr,
    /// Inline size limit for update deliveries when a participant set none.
    pub default_threshold: usize,
    /// Maximum number of fields in one request.
    pub max_fields_per_request: usize,
    /// Maximum size of one field payload, input or private value.
    pub max_payload_bytes: usize,
    /// Smallest accepted account idle timeout.
    pub min_timeout_minutes: u32,
    /// Largest accepted account idle timeout.
    pub max_timeout_minutes: u32,
    /// Number of random bytes in a session token.
    pub token_bytes: usize,
    /// Maximum length of one request line on the transport.
    pub max_line_bytes: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            default_threshold: 64 * 1024,
            max_fields_per_request: 256,
            max_payload_bytes: 1024 * 1024,
            min_timeout_minutes: 1,
            max_timeout_minutes: 7 * 24 * 60,
            token_bytes: 32,
            max_line_bytes: 8 * 1024 * 1024,
        }
    }

    /// Sets the default inline delivery threshold.
    pub fn with_default_threshold(mut self, bytes: usize) -> Self {
        self.default_threshold = bytes;
        self
    }

    /// Sets the maximum number of fields per request.
    pub fn with_max_fields_per_request(mut self, max: usize) -> Self {
        self.max_fields_per_request = max;
        self
    }

    /// Sets the maximum payload size.
    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = max;
        self
    }

    /// Sets the accepted range of account idle timeouts.
    pub fn with_timeout_bounds(mut self, min_minutes: u32, max_minutes: u32) -> Self {
        self.min_timeout_minutes = min_minutes;
        self.max_timeout_minutes = max_minutes;
        self
    }

    /// Sets the maximum request line length.
    pub fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8420)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.default_threshold, 64 * 1024);
        assert_eq!(config.bind_addr.port(), 8420);
        assert_eq!(config.token_bytes, 32);
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap())
            .with_default_threshold(16)
            .with_max_fields_per_request(4)
            .with_timeout_bounds(5, 60);

        assert_eq!(config.default_threshold, 16);
        assert_eq!(config.max_fields_per_request, 4);
        assert_eq!(config.min_timeout_minutes, 5);
        assert_eq!(config.max_timeout_minutes, 60);
    }
}
