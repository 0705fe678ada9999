use std::io::{Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortType, StopBits};
use tokio::time::timeout;

use super::transport::{PortProvider, Transport};
use super::{Result, SerialError, SerialPortInfo, BAUD_RATE};

/// USB-UART bridge chips known to ship on supported tracker boards.
pub const KNOWN_BRIDGES: [&str; 3] = [
    "Silicon Labs CP210x USB to UART Bridge",
    "CP2104 USB to UART Bridge Controller",
    "CP2102 USB to UART Bridge Controller",
];

/// The real serial port backend.
pub struct SystemPorts;

impl SystemPorts {
    pub fn new() -> Self {
        Self
    }

    fn open_port(name: &str) -> Result<Box<dyn SerialPort>> {
        let port = serialport::new(name, BAUD_RATE)
            .stop_bits(StopBits::Two)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| SerialError::ConnectionFailed(e.to_string()))?;
        Ok(port)
    }

    fn describe(port_type: &SerialPortType) -> String {
        match port_type {
            SerialPortType::UsbPort(usb) => usb.product.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }
}

impl PortProvider for SystemPorts {
    fn list_ports(&self) -> Vec<SerialPortInfo> {
        let ports = serialport::available_ports().unwrap_or_default();
        ports
            .into_iter()
            .map(|p| SerialPortInfo {
                description: Self::describe(&p.port_type),
                port_name: p.port_name,
            })
            .collect()
    }

    fn probe(&self, name: &str) -> bool {
        // Look the one port up instead of enumerating everything per probe.
        let ports = serialport::available_ports().unwrap_or_default();
        let known = ports
            .iter()
            .find(|p| p.port_name == name)
            .map(|p| KNOWN_BRIDGES.contains(&Self::describe(&p.port_type).as_str()))
            .unwrap_or(false);
        if !known {
            return false;
        }

        // Descriptor matched; confirm the port actually opens read/write.
        // The probe port is dropped (closed) before returning.
        match Self::open_port(name) {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Probe open failed for {}: {}", name, e);
                false
            }
        }
    }

    fn open(&self, name: &str) -> Result<Box<dyn Transport>> {
        let port = Self::open_port(name)?;
        log::info!("Opened {} at {} baud, two stop bits", name, BAUD_RATE);
        Ok(Box::new(SerialTransport::new(port)))
    }
}

impl Default for SystemPorts {
    fn default() -> Self {
        Self::new()
    }
}

/// Line-buffered [`Transport`] over a real serial port.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    buffer: Vec<u8>,
}

impl SerialTransport {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port: Some(port),
            buffer: Vec::new(),
        }
    }

    /// Pop the first complete line off the byte buffer, if any.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&raw);
        Some(text.trim_end_matches(|c| c == '\r' || c == '\n').to_string())
    }
}

#[async_trait::async_trait]
impl Transport for SerialTransport {
    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| SerialError::ConnectionFailed("port is closed".to_string()))?;
        port.write_all(data).map_err(SerialError::IoError)?;
        port.flush().map_err(SerialError::IoError)?;
        Ok(())
    }

    async fn read_line(&mut self, wait: Duration) -> Result<Option<String>> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }
        if self.port.is_none() {
            return Err(SerialError::ConnectionFailed("port is closed".to_string()));
        }

        let fill = async {
            loop {
                let port = match self.port.as_mut() {
                    Some(p) => p,
                    None => {
                        return Err(SerialError::ConnectionFailed("port is closed".to_string()))
                    }
                };
                match port.bytes_to_read() {
                    Ok(0) => tokio::time::sleep(Duration::from_millis(10)).await,
                    Ok(n) => {
                        let mut chunk = vec![0u8; n as usize];
                        match port.read(&mut chunk) {
                            Ok(read) => {
                                self.buffer.extend_from_slice(&chunk[..read]);
                                if let Some(line) = self.take_line() {
                                    return Ok(line);
                                }
                            }
                            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                            Err(e) => return Err(SerialError::IoError(e)),
                        }
                    }
                    Err(e) => return Err(SerialError::SerialportError(e)),
                }
            }
        };

        match timeout(wait, fill).await {
            Ok(Ok(line)) => Ok(Some(line)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    fn clear_input(&mut self) -> Result<()> {
        self.buffer.clear();
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| SerialError::ConnectionFailed("port is closed".to_string()))?;
        port.clear(serialport::ClearBuffer::Input)
            .map_err(SerialError::SerialportError)
    }

    fn close(&mut self) {
        self.port = None;
        self.buffer.clear();
    }
}
