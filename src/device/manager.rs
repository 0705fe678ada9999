use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::time::MissedTickBehavior;

use super::{ConnectionState, DeviceError, DeviceEvent, Result};
use crate::params::{codec, ParameterEntry, ParameterTable};
use crate::serial::{reader, PortProvider, SerialPortInfo, Transport, DUMP_REQUEST};

/// Liveness watchdog period while connected.
const WATCHDOG_PERIOD: Duration = Duration::from_secs(1);
/// Reconnect sweep period while disconnected.
const SWEEP_PERIOD: Duration = Duration::from_millis(500);
/// How long the watchdog listens after its probe write.
const PROBE_WAIT: Duration = Duration::from_millis(100);
/// How long a parameter write waits for the device to say anything back.
const WRITE_WAIT: Duration = Duration::from_millis(1000);

/// The one open connection, plus liveness bookkeeping.
struct Link {
    transport: Option<Box<dyn Transport>>,
    port_name: Option<String>,
    /// Bytes observed since the last watchdog tick.
    data_seen: bool,
}

/// Owner of the serial resource.
///
/// Holds at most one open connection, runs the liveness watchdog and the
/// reconnect sweep, and serializes every port access behind one mutex so
/// a multi-second config read can never race a watchdog probe.
pub struct DeviceManager {
    ports: Arc<dyn PortProvider>,
    link: Mutex<Link>,
    /// Set across config reads and applies to suspend the watchdog.
    busy: AtomicBool,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<DeviceEvent>,
}

impl DeviceManager {
    pub fn new(ports: Arc<dyn PortProvider>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(16);
        Self {
            ports,
            link: Mutex::new(Link {
                transport: None,
                port_name: None,
                data_seen: false,
            }),
            busy: AtomicBool::new(false),
            state,
            events,
        }
    }

    /// Subscribe to connected/disconnected notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Watch connection state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.state.borrow(), ConnectionState::Connected(_))
    }

    pub fn connected_port(&self) -> Option<String> {
        match &*self.state.borrow() {
            ConnectionState::Connected(name) => Some(name.clone()),
            _ => None,
        }
    }

    /// List candidate ports with their descriptors.
    pub fn list_ports(&self) -> Vec<SerialPortInfo> {
        self.ports.list_ports()
    }

    /// Open `name` at the fixed tracker settings, closing any previous
    /// connection first.
    pub async fn connect(&self, name: &str) -> Result<()> {
        let mut link = self.link.lock().await;
        if let Some(mut old) = link.transport.take() {
            old.close();
        }
        let transport = self.ports.open(name)?;
        link.transport = Some(transport);
        link.port_name = Some(name.to_string());
        link.data_seen = false;
        drop(link);

        self.state
            .send_replace(ConnectionState::Connected(name.to_string()));
        log::info!("Connected to {}", name);
        let _ = self.events.send(DeviceEvent::Connected(name.to_string()));
        Ok(())
    }

    /// Close the connection if open.
    ///
    /// Idempotent, but the disconnected notification fires even when nothing
    /// was open; downstream listeners rely on the repeat.
    pub async fn disconnect(&self) {
        let mut link = self.link.lock().await;
        if let Some(mut transport) = link.transport.take() {
            transport.close();
            log::info!(
                "Disconnected from {}",
                link.port_name.as_deref().unwrap_or("<unknown>")
            );
        }
        link.port_name = None;
        link.data_seen = false;
        drop(link);

        self.state.send_replace(ConnectionState::Disconnected);
        let _ = self.events.send(DeviceEvent::Disconnected);
    }

    /// Probe every enumerated port and connect to the first supported one.
    pub async fn auto_connect(&self) -> Option<String> {
        let name = self.ports.auto_probe_and_select()?;
        match self.connect(&name).await {
            Ok(()) => Some(name),
            Err(e) => {
                log::warn!("Auto-connect to {} failed: {}", name, e);
                None
            }
        }
    }

    /// Fetch and decode the device's parameter table.
    ///
    /// The watchdog is suspended for the duration; a failed read leaves the
    /// connection in an unknown state, so it is torn down and the reconnect
    /// sweep takes over.
    pub async fn read_config(&self, advanced: bool) -> Result<ParameterTable> {
        self.busy.store(true, Ordering::SeqCst);
        let result = self.read_raw_config().await;
        self.busy.store(false, Ordering::SeqCst);

        match result {
            Ok(lines) => Ok(codec::decode_table(&lines, advanced)),
            Err(e) => {
                log::warn!("Config read failed: {}", e);
                if matches!(e, DeviceError::Serial(_)) {
                    self.disconnect().await;
                }
                Err(e)
            }
        }
    }

    async fn read_raw_config(&self) -> Result<Vec<String>> {
        let mut guard = self.link.lock().await;
        let link = &mut *guard;
        let transport = link.transport.as_mut().ok_or(DeviceError::NotConnected)?;
        let lines = reader::read_config(transport.as_mut()).await?;
        link.data_seen = true;
        Ok(lines)
    }

    /// Write every modified entry back to the device.
    ///
    /// Each write is `$POGNS,<name>=<value>\n` followed by a bounded wait for
    /// any responding bytes; silence and a response both count as completion.
    /// A failed parameter does not stop the remaining ones.
    pub async fn apply(&self, entries: &[ParameterEntry]) -> Vec<(String, Result<()>)> {
        self.busy.store(true, Ordering::SeqCst);
        let results = self.apply_inner(entries).await;
        self.busy.store(false, Ordering::SeqCst);
        results
    }

    async fn apply_inner(&self, entries: &[ParameterEntry]) -> Vec<(String, Result<()>)> {
        let mut results = Vec::new();
        let mut guard = self.link.lock().await;
        let link = &mut *guard;

        for entry in entries.iter().filter(|e| e.modified) {
            let Some(transport) = link.transport.as_mut() else {
                results.push((entry.name.clone(), Err(DeviceError::NotConnected)));
                continue;
            };
            let value = match codec::encode_entry(entry) {
                Ok(v) => v,
                Err(e) => {
                    results.push((entry.name.clone(), Err(e.into())));
                    continue;
                }
            };
            let command = format!("$POGNS,{}={}\n", entry.name, value);
            log::debug!("Writing {}", command.trim_end());
            match transport.write_all(command.as_bytes()).await {
                Ok(()) => {
                    if let Ok(Some(_)) = transport.read_line(WRITE_WAIT).await {
                        link.data_seen = true;
                    }
                    results.push((entry.name.clone(), Ok(())));
                }
                Err(e) => results.push((entry.name.clone(), Err(e.into()))),
            }
        }
        results
    }

    /// One watchdog tick: probe the device and disconnect if it has been
    /// silent since the previous tick.
    async fn watchdog_tick(&self) {
        if self.busy.load(Ordering::SeqCst) {
            return;
        }
        let alive = {
            let mut guard = self.link.lock().await;
            let link = &mut *guard;
            let Some(transport) = link.transport.as_mut() else {
                return;
            };
            let mut seen = link.data_seen;
            link.data_seen = false;
            if transport.write_all(&[DUMP_REQUEST]).await.is_ok() {
                if let Ok(Some(_)) = transport.read_line(PROBE_WAIT).await {
                    seen = true;
                }
            }
            // Drop whatever is still buffered so the next tick only counts
            // bytes the device produces after this one.
            let _ = transport.clear_input();
            seen && transport.is_open()
        };
        if !alive {
            log::info!("No data from device since last check, assuming unplug");
            self.disconnect().await;
        }
    }

    /// One reconnect-sweep tick: re-enumerate and try to auto-connect.
    async fn sweep_tick(&self) {
        self.state.send_replace(ConnectionState::Probing);
        if self.auto_connect().await.is_none() {
            self.state.send_replace(ConnectionState::Disconnected);
        }
    }

    /// Spawn the supervisory task driving the watchdog and reconnect sweep.
    pub fn start_supervisor(self: Arc<Self>) -> SupervisorHandle {
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let manager = self;

        let task = tokio::spawn(async move {
            let mut sweep = tokio::time::interval(SWEEP_PERIOD);
            sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut watchdog = tokio::time::interval(WATCHDOG_PERIOD);
            watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    _ = sweep.tick() => {
                        if !manager.is_connected() {
                            manager.sweep_tick().await;
                        }
                    }
                    _ = watchdog.tick() => {
                        if manager.is_connected() {
                            manager.watchdog_tick().await;
                        }
                    }
                }
            }
            log::debug!("Supervisor stopped");
        });

        SupervisorHandle { task, stop_tx }
    }
}

/// Handle to the running supervisory task.
pub struct SupervisorHandle {
    task: tokio::task::JoinHandle<()>,
    stop_tx: mpsc::Sender<()>,
}

impl SupervisorHandle {
    /// Signal the supervisor to stop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = tokio::time::timeout(Duration::from_secs(2), self.task).await;
    }
}
