//! Server information returned by the public API

use chrono::{DateTime, TimeDelta, Utc};

/// Server clock reading and its offset from the local clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInformation {
    pub server_time: DateTime<Utc>,
    /// `server_time - local time` at the moment the reading was taken
    pub time_diff: TimeDelta,
}

impl ServerInformation {
    #[must_use]
    pub fn from_server_time(server_time: DateTime<Utc>, local_now: DateTime<Utc>) -> Self {
        Self { server_time, time_diff: server_time - local_now }
    }
}
