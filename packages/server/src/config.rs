//! Hub and connection tuning.
//!
//! Defaults match what the hub has always shipped with; the binary overrides
//! them from CLI flags or `HIROBA_*` environment variables.

use std::time::Duration;

use thiserror::Error;

/// Default capacity of every bounded queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("ping period ({ping_period:?}) must be shorter than pong wait ({pong_wait:?})")]
    PingPeriodTooLong {
        ping_period: Duration,
        pong_wait: Duration,
    },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Queue capacities of the hub and its rooms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Per-connection outbound queue
    pub outbound_capacity: usize,
    /// Per-room fan-out queue
    pub room_queue_capacity: usize,
    /// Central hub broadcast queue
    pub hub_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: DEFAULT_QUEUE_CAPACITY,
            room_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            hub_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl HubConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("outbound_capacity"));
        }
        if self.room_queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("room_queue_capacity"));
        }
        if self.hub_queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("hub_queue_capacity"));
        }
        Ok(())
    }
}

/// Heartbeat and deadline settings of the read/write pumps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Time allowed to write one frame to the peer
    pub write_wait: Duration,
    /// Idle-read deadline, refreshed by every inbound frame
    pub pong_wait: Duration,
    /// Transport ping interval; must be shorter than `pong_wait`
    pub ping_period: Duration,
    /// Maximum inbound frame size in bytes
    pub max_message_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            write_wait: Duration::from_secs(10),
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            max_message_size: 512,
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.write_wait.is_zero() {
            return Err(ConfigError::ZeroDuration("write_wait"));
        }
        if self.ping_period.is_zero() {
            return Err(ConfigError::ZeroDuration("ping_period"));
        }
        if self.ping_period >= self.pong_wait {
            return Err(ConfigError::PingPeriodTooLong {
                ping_period: self.ping_period,
                pong_wait: self.pong_wait,
            });
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::ZeroCapacity("max_message_size"));
        }
        Ok(())
    }
}
