//! Scripted transports standing in for a real tracker.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ogn_configurator::serial::{PortProvider, Result, SerialError, SerialPortInfo, Transport};

pub const FAKE_PORT: &str = "ttyFAKE0";

/// Route engine logs through the test harness when RUST_LOG is set.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One scripted read outcome.
#[derive(Debug, Clone)]
pub enum Step {
    Line(&'static str),
    Stall,
    ClosePort,
}

pub struct FakeTransport {
    steps: VecDeque<Step>,
    /// Lines already sitting in the receive buffer, as opposed to the
    /// scripted stream the device produces over time. Discarded by
    /// `clear_input`, like a real port's input buffer.
    buffered: VecDeque<String>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    open: bool,
    /// Once the script runs dry: keep answering (a chatty, healthy device)
    /// or go quiet (an unplugged one).
    chatty_when_empty: bool,
}

impl FakeTransport {
    pub fn scripted(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            buffered: VecDeque::new(),
            written: Arc::new(Mutex::new(Vec::new())),
            open: true,
            chatty_when_empty: false,
        }
    }

    pub fn with_shared(
        steps: Vec<Step>,
        written: Arc<Mutex<Vec<Vec<u8>>>>,
        chatty_when_empty: bool,
    ) -> Self {
        Self {
            steps: steps.into(),
            buffered: VecDeque::new(),
            written,
            open: true,
            chatty_when_empty,
        }
    }

    /// Pre-load lines into the receive buffer, as if they arrived before
    /// anyone looked at the port.
    pub fn preload(&mut self, lines: Vec<String>) {
        self.buffered = lines.into();
    }

    pub fn closed() -> Self {
        let mut t = Self::scripted(Vec::new());
        t.open = false;
        t
    }

    pub fn written(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.written)
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(SerialError::ConnectionFailed("port is closed".to_string()));
        }
        self.written.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn read_line(&mut self, _wait: Duration) -> Result<Option<String>> {
        if !self.open {
            return Err(SerialError::ConnectionFailed("port is closed".to_string()));
        }
        if let Some(line) = self.buffered.pop_front() {
            return Ok(Some(line));
        }
        match self.steps.pop_front() {
            Some(Step::Line(line)) => Ok(Some(line.to_string())),
            Some(Step::Stall) => Ok(None),
            Some(Step::ClosePort) => {
                self.open = false;
                Err(SerialError::ConnectionFailed("port vanished".to_string()))
            }
            None => {
                if self.chatty_when_empty {
                    Ok(Some("$GPRMC,,,,,,,,,,*00".to_string()))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn clear_input(&mut self) -> Result<()> {
        self.buffered.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// A [`PortProvider`] exposing one pluggable fake port.
pub struct FakePorts {
    present: AtomicBool,
    chatty: bool,
    script: Mutex<VecDeque<Step>>,
    buffered: Mutex<Vec<String>>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FakePorts {
    pub fn new(present: bool, chatty: bool) -> Self {
        Self {
            present: AtomicBool::new(present),
            chatty,
            script: Mutex::new(VecDeque::new()),
            buffered: Mutex::new(Vec::new()),
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Plug the fake device in or out.
    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    /// Script the responses the next opened transport will produce.
    pub fn load_script(&self, steps: Vec<Step>) {
        *self.script.lock().unwrap() = steps.into();
    }

    /// Pre-fill the next opened transport's receive buffer.
    pub fn load_buffered(&self, lines: Vec<&str>) {
        *self.buffered.lock().unwrap() = lines.into_iter().map(str::to_string).collect();
    }

    pub fn written(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.written)
    }
}

impl PortProvider for FakePorts {
    fn list_ports(&self) -> Vec<SerialPortInfo> {
        if self.present.load(Ordering::SeqCst) {
            vec![SerialPortInfo {
                port_name: FAKE_PORT.to_string(),
                description: "CP2102 USB to UART Bridge Controller".to_string(),
            }]
        } else {
            Vec::new()
        }
    }

    fn probe(&self, name: &str) -> bool {
        self.present.load(Ordering::SeqCst) && name == FAKE_PORT
    }

    fn open(&self, name: &str) -> Result<Box<dyn Transport>> {
        if !self.present.load(Ordering::SeqCst) || name != FAKE_PORT {
            return Err(SerialError::PortNotFound(name.to_string()));
        }
        let steps: Vec<Step> = self.script.lock().unwrap().drain(..).collect();
        let mut transport =
            FakeTransport::with_shared(steps, Arc::clone(&self.written), self.chatty);
        let buffered: Vec<String> = self.buffered.lock().unwrap().drain(..).collect();
        transport.preload(buffered);
        Ok(Box::new(transport))
    }
}
