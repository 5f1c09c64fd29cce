//! Relay configuration.

/// Default ceiling for one inbound frame (1 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Default capacity of each connection's outbound queue.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 128;

/// Default number of events retained per session by the memory store.
pub const DEFAULT_BACKLOG_LIMIT: usize = 256;

/// Default number of sessions retained by the memory store.
pub const DEFAULT_MAX_SESSIONS: usize = 4096;

/// Per-connection relay settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Frames larger than this terminate the connection.
    pub max_frame_bytes: usize,
    /// Bounded outbound queue capacity.
    pub outbox_capacity: usize,
    /// Events retained per session.
    pub backlog_limit: usize,
    /// Sessions retained by the memory store.
    pub max_sessions: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            backlog_limit: DEFAULT_BACKLOG_LIMIT,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl RelayConfig {
    /// Reject settings that would make the relay unusable.
    pub fn validate(&self) -> veil_common::Result<()> {
        if self.max_frame_bytes == 0 {
            return Err(veil_common::Error::config("max_frame_bytes must be non-zero"));
        }
        if self.outbox_capacity == 0 {
            return Err(veil_common::Error::config("outbox_capacity must be non-zero"));
        }
        if self.backlog_limit == 0 {
            return Err(veil_common::Error::config("backlog_limit must be non-zero"));
        }
        if self.max_sessions == 0 {
            return Err(veil_common::Error::config("max_sessions must be non-zero"));
        }
        Ok(())
    }
}
