use std::time::Duration;

use super::{Result, SerialPortInfo};

/// One open serial link to a tracker.
///
/// The engine only ever talks to the device through this trait, so tests can
/// substitute a scripted implementation for a real port.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Whether the underlying port is still open.
    fn is_open(&self) -> bool;

    /// Write the full buffer and flush it to the device.
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Wait up to `wait` for a complete newline-terminated line.
    ///
    /// `Ok(None)` means the wait elapsed without a full line becoming
    /// available (a stall); it is not an error.
    async fn read_line(&mut self, wait: Duration) -> Result<Option<String>>;

    /// Drop any bytes already received but not yet consumed.
    fn clear_input(&mut self) -> Result<()>;

    /// Close the port. Further reads and writes fail.
    fn close(&mut self);
}

/// Access to the platform's serial ports: enumeration, probing and opening.
pub trait PortProvider: Send + Sync {
    /// List available ports with their human-readable descriptors.
    /// Never fails; no ports present yields an empty list.
    fn list_ports(&self) -> Vec<SerialPortInfo>;

    /// Heuristic check whether `name` hosts a supported tracker: the port's
    /// descriptor must match a known USB-UART bridge and the port must open.
    /// Any port opened for the check is closed again before returning.
    fn probe(&self, name: &str) -> bool;

    /// Open `name` at the fixed tracker settings.
    fn open(&self, name: &str) -> Result<Box<dyn Transport>>;

    /// Probe every port in enumeration order and return the first match.
    /// Failed probes are not retried within the same call.
    fn auto_probe_and_select(&self) -> Option<String> {
        for port in self.list_ports() {
            if self.probe(&port.port_name) {
                log::info!("Probe succeeded on {}", port.port_name);
                return Some(port.port_name);
            }
        }
        None
    }
}
