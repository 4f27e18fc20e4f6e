use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Connection state of the reject relay. Owned by the relay worker; every
/// other party only observes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Faulted,
}

impl fmt::Display for RelayConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RelayConnectionState::Disconnected => "disconnected",
            RelayConnectionState::Connecting => "connecting",
            RelayConnectionState::Connected => "connected",
            RelayConnectionState::Faulted => "faulted",
        };
        f.write_str(label)
    }
}

/// Result of asking the relay for a reject pulse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum TriggerOutcome {
    /// The output was asserted; it is released after the pulse duration.
    Fired,
    /// Not connected; nothing was written.
    NotReady,
    /// Another pulse is still in flight.
    Busy,
    /// The pulse was not delivered: the write failed (the relay is then
    /// faulted) or the worker did not answer in time.
    Failed(String),
    /// No relay is configured.
    Disabled,
}

impl TriggerOutcome {
    pub fn is_fired(&self) -> bool {
        matches!(self, TriggerOutcome::Fired)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("relay I/O failed: {0}")]
    Io(String),
    #[error("relay is not connected")]
    NotConnected,
    #[error("relay is busy with another pulse")]
    Busy,
    #[error("relay worker is not running")]
    WorkerGone,
    #[error("relay did not answer within {0:?}")]
    Timeout(Duration),
    #[error("invalid relay configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Io(err.to_string())
    }
}
