//! Configuration engine for OGN tracker devices on a serial link.
//!
//! The engine discovers candidate serial ports, probes them for a supported
//! USB-UART bridge, keeps a single watched connection alive, pulls the
//! device's parameter table over its line-oriented dump protocol, and writes
//! edited parameters back with the `$POGNS` command syntax. Rendering and
//! editing the table is the embedding UI's job; it drives the engine through
//! [`device::DeviceManager`] and the notifications it publishes.

pub mod device;
pub mod params;
pub mod serial;

pub use device::{ConnectionState, DeviceError, DeviceEvent, DeviceManager};
pub use params::{ParamValue, ParameterEntry, ParameterTable};
pub use serial::{PortProvider, SerialError, SerialPortInfo, Transport};
