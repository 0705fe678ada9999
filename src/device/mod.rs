pub mod manager;

pub use manager::{DeviceManager, SupervisorHandle};

use serde::{Deserialize, Serialize};

/// Where the engine currently stands with respect to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    /// The reconnect sweep is probing candidate ports.
    Probing,
    Connected(String),
}

/// Notifications the embedding UI subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEvent {
    Connected(String),
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("No device connected")]
    NotConnected,

    #[error("Encode error: {0}")]
    Encode(#[from] crate::params::EncodeError),

    #[error("Serial communication error: {0}")]
    Serial(#[from] crate::serial::SerialError),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
