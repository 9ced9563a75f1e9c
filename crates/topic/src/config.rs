use std::time::Duration;

/// Timing knobs shared by every topic endpoint.
#[derive(Clone, Copy, Debug)]
pub struct TopicConfig {
    /// How long a writeable waits for a record before checking whether the
    /// peer is still there.
    pub ready_timeout: Duration,

    /// Upper bound on the websocket handshake of a client.
    pub connect_timeout: Duration,

    /// Upper bound on the closing handshake when a session ends.
    pub close_timeout: Duration,
}

impl TopicConfig {
    /// Set the ready timeout.
    #[must_use]
    pub const fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the close timeout.
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
            close_timeout: Duration::from_secs(1),
        }
    }
}
