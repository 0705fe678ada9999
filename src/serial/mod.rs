pub mod interface;
pub mod reader;
pub mod transport;

pub use interface::{SerialTransport, SystemPorts};
pub use transport::{PortProvider, Transport};

use serde::{Deserialize, Serialize};

/// Baud rate the tracker firmware talks at.
pub const BAUD_RATE: u32 = 115200;

/// Control byte (ETX) that asks the tracker to dump its parameter table.
pub const DUMP_REQUEST: u8 = 0x03;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Communication timeout")]
    Timeout,

    #[error("Config dump too short ({0} bytes)")]
    ShortRead(usize),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;
