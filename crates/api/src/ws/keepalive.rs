use std::time::Duration;

/// Time allowed to write one frame to the peer.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// A connection with no inbound traffic (including pongs) for this long is
/// considered dead.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Interval between outbound ping frames. Must be shorter than
/// [`PONG_WAIT`].
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Largest inbound message accepted from a client, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024;

/// Timing and size limits applied to every client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub write_wait: Duration,
    pub pong_wait: Duration,
    pub ping_period: Duration,
    pub max_message_size: usize,
}

impl ConnectionSettings {
    /// Settings with `pong_wait` as the dead-connection threshold and the
    /// ping period derived from it (nine tenths).
    pub fn with_pong_wait(pong_wait: Duration) -> Self {
        Self {
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            ..Self::default()
        }
    }

    /// Whether pings are sent often enough to keep a healthy peer alive.
    pub fn is_valid(&self) -> bool {
        !self.ping_period.is_zero() && self.ping_period < self.pong_wait
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            write_wait: WRITE_WAIT,
            pong_wait: PONG_WAIT,
            ping_period: PING_PERIOD,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}
