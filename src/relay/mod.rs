//! Serial relay that kicks misaligned boards off the line.
//!
//! [`RelayController`] is a cheap handle; the port itself lives on a worker
//! thread that connects, reconnects with [`BackoffPolicy`], pings the link
//! while idle and times reject pulses.

pub mod backoff;
pub mod config;
pub mod controller;
pub mod protocol;
pub mod state;
pub mod transport;
mod worker;

pub use backoff::BackoffPolicy;
pub use config::RelayConfig;
pub use controller::RelayController;
pub use protocol::RelayProtocol;
pub use state::{RelayConnectionState, RelayError, TriggerOutcome};
pub use transport::{
    available_ports, RelayConnector, RelayTransport, SerialConnector, SerialTransport,
};
