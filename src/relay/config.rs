use super::backoff::BackoffPolicy;
use super::protocol::RelayProtocol;
use super::state::RelayError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Read/write timeout of the serial port.
    pub io_timeout_ms: u64,
    /// Length of a reject pulse.
    pub trigger_duration_ms: u64,
    /// Pause between the handshake ping and draining the echo.
    pub handshake_settle_ms: u64,
    /// Ping interval while idle and connected; 0 disables it.
    pub health_check_interval_ms: u64,
    /// Connect to `port` as soon as the controller starts.
    pub auto_connect: bool,
    pub protocol: RelayProtocol,
    pub backoff: BackoffPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            io_timeout_ms: 1000,
            trigger_duration_ms: 500,
            handshake_settle_ms: 100,
            health_check_interval_ms: 10_000,
            auto_connect: true,
            protocol: RelayProtocol::default(),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RelayConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn trigger_duration(&self) -> Duration {
        Duration::from_millis(self.trigger_duration_ms)
    }

    pub fn handshake_settle(&self) -> Duration {
        Duration::from_millis(self.handshake_settle_ms)
    }

    pub fn health_check_interval(&self) -> Option<Duration> {
        (self.health_check_interval_ms > 0)
            .then(|| Duration::from_millis(self.health_check_interval_ms))
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.baud_rate == 0 {
            return Err(RelayError::Config("baud_rate must be positive".to_string()));
        }
        if self.trigger_duration_ms == 0 {
            return Err(RelayError::Config(
                "trigger_duration_ms must be positive".to_string(),
            ));
        }
        self.protocol.validate().map_err(RelayError::Config)?;
        self.backoff.validate().map_err(RelayError::Config)?;
        Ok(())
    }
}
