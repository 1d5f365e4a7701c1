use crate::bus::{self, BusEvent, DeviceAction};
use crate::client::{ControlClient, MpdClient};
use crate::config::Config;
use crate::dispatcher::{CommandDispatcher, LoopExit};
use crate::error::Result;
use crate::input::{EventDevice, KeyEventSource};
use crate::types::{DeviceId, DeviceProperties};
use futures_util::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Opens the per-device collaborators for a newly attached remote
pub trait Attach: Send + Sync + 'static {
    type Client: ControlClient + 'static;
    type Source: KeyEventSource + 'static;

    /// Open the key event source for a device node
    fn open_device(&self, devnode: &Path) -> Result<Self::Source>;

    /// A fresh, disconnected control client
    fn control_client(&self, config: &Config) -> Self::Client;
}

/// Production collaborators: evdev device nodes and the MPD TCP client
pub struct SystemAttach;

impl Attach for SystemAttach {
    type Client = MpdClient;
    type Source = EventDevice;

    fn open_device(&self, devnode: &Path) -> Result<EventDevice> {
        EventDevice::open(devnode)
    }

    fn control_client(&self, config: &Config) -> MpdClient {
        MpdClient::new(config.timeout)
    }
}

/// A running dispatch task
struct ActiveDispatcher {
    stop_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

/// Watches the device bus and runs a dispatcher while the remote is attached
///
/// Each dispatcher runs on its own task, so bus notifications keep flowing
/// while a remote is in use. Only one remote is served at a time.
pub struct DeviceLifecycleMonitor<A: Attach = SystemAttach> {
    config: Arc<Config>,
    collaborators: A,
    active: BTreeMap<DeviceId, ActiveDispatcher>,
}

impl DeviceLifecycleMonitor<SystemAttach> {
    pub fn new(config: Config) -> Self {
        Self::with_attach(config, SystemAttach)
    }

    /// Serve the remote until the bus subscription ends
    pub async fn run(&mut self) -> Result<()> {
        self.run_with(bus::watch_input_devices, bus::scan_input_devices)
            .await
    }
}

impl<A: Attach> DeviceLifecycleMonitor<A> {
    pub fn with_attach(config: Config, attach: A) -> Self {
        Self {
            config: Arc::new(config),
            collaborators: attach,
            active: BTreeMap::new(),
        }
    }

    /// Subscribe with `watch`, attach what `scan` finds, then follow the subscription
    ///
    /// The subscription is opened before the scan so a remote plugged in
    /// between the two is still seen.
    async fn run_with<W, E, F, D>(&mut self, watch: W, scan: F) -> Result<()>
    where
        W: FnOnce() -> Result<E>,
        E: Stream<Item = Result<BusEvent>>,
        F: FnOnce() -> Result<D>,
        D: IntoIterator<Item = DeviceProperties>,
    {
        let events = watch()?;
        self.scan_for_already_connected(scan()?);
        self.watch_for_hotplug(events).await;
        Ok(())
    }

    /// Device nodes with a live dispatcher
    pub fn active_devices(&self) -> Vec<DeviceId> {
        self.active
            .iter()
            .filter(|(_, active)| !active.task.is_finished())
            .map(|(devnode, _)| devnode.clone())
            .collect()
    }

    /// Attach the first matching device among those already present
    pub fn scan_for_already_connected(&mut self, devices: impl IntoIterator<Item = DeviceProperties>) {
        let found = devices
            .into_iter()
            .find_map(|device| device.matching_devnode(&self.config));

        match found {
            Some(devnode) => {
                tracing::info!(
                    "Found connected device {} at {}",
                    self.config.device_phys,
                    devnode.display()
                );
                self.attach(devnode);
            }
            None => tracing::debug!("Device {} not connected yet", self.config.device_phys),
        }
    }

    /// Handle bus notifications until the stream ends
    pub async fn watch_for_hotplug<S>(&mut self, events: S)
    where
        S: Stream<Item = Result<BusEvent>>,
    {
        futures_util::pin_mut!(events);
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => self.handle_event(event).await,
                Err(e) => tracing::warn!("Device bus error: {}", e),
            }
        }
        tracing::info!("Device bus subscription ended");
    }

    /// React to one bus notification
    pub async fn handle_event(&mut self, event: BusEvent) {
        let Some(devnode) = event.properties.matching_devnode(&self.config) else {
            return;
        };

        match event.action {
            DeviceAction::Add => {
                tracing::info!(
                    "Device {} connected at {}.",
                    self.config.device_phys,
                    devnode.display()
                );
                self.attach(devnode);
            }
            DeviceAction::Remove => {
                tracing::info!(
                    "Device {} at {} disconnected.",
                    self.config.device_phys,
                    devnode.display()
                );
                self.detach(&devnode).await;
            }
            DeviceAction::Other(action) => {
                tracing::debug!("Ignoring {} for {}", action, devnode.display());
            }
        }
    }

    /// Start a dispatcher for `devnode` unless one is already serving
    fn attach(&mut self, devnode: DeviceId) {
        self.active.retain(|_, active| !active.task.is_finished());

        if let Some(current) = self.active.keys().next() {
            tracing::warn!(
                "Ignoring {}: already serving {}",
                devnode.display(),
                current.display()
            );
            return;
        }

        let source = match self.collaborators.open_device(&devnode) {
            Ok(source) => source,
            Err(e) => {
                tracing::error!("Failed to open {}: {}", devnode.display(), e);
                return;
            }
        };
        let client = self.collaborators.control_client(&self.config);

        let (stop_tx, stop_rx) = broadcast::channel(1);
        let task = tokio::spawn(serve(
            self.config.clone(),
            devnode.clone(),
            client,
            source,
            stop_rx,
        ));

        self.active.insert(devnode, ActiveDispatcher { stop_tx, task });
    }

    /// Stop the dispatcher for `devnode` and wait for it to release the device
    ///
    /// The entry stays registered until the task has finished, so an
    /// interrupted detach is completed by [`shutdown`](Self::shutdown).
    async fn detach(&mut self, devnode: &DeviceId) {
        let Some(active) = self.active.get_mut(devnode) else {
            tracing::debug!("No dispatcher for {}", devnode.display());
            return;
        };

        let _ = active.stop_tx.send(());
        let joined = (&mut active.task).await;
        self.active.remove(devnode);

        if let Err(e) = joined {
            tracing::error!("Dispatcher for {} panicked: {}", devnode.display(), e);
        }
    }

    /// Stop every dispatcher
    pub async fn shutdown(&mut self) {
        let devnodes: Vec<DeviceId> = self.active.keys().cloned().collect();
        for devnode in devnodes {
            self.detach(&devnode).await;
        }
    }
}

/// Body of a dispatch task
async fn serve<C, S>(
    config: Arc<Config>,
    devnode: DeviceId,
    client: C,
    source: S,
    stop_rx: broadcast::Receiver<()>,
) where
    C: ControlClient,
    S: KeyEventSource,
{
    let playlist = config.playlist.clone();
    let mut dispatcher = CommandDispatcher::new(config, devnode, client, source);
    if let Err(e) = dispatcher.load_playlist(&playlist).await {
        tracing::error!("Failed to load playlist {}: {}", playlist, e);
        dispatcher.close();
        return;
    }

    let exit = dispatcher.run(stop_rx).await;
    match exit {
        LoopExit::Cancelled | LoopExit::Ended => {
            tracing::info!("Event loop ended.");
            if let Err(e) = dispatcher.disconnect().await {
                tracing::warn!("Failed to stop playback: {}", e);
            }
        }
        LoopExit::Failed(e) => {
            tracing::error!("Event loop for {} failed: {}", dispatcher.devnode().display(), e);
        }
    }

    dispatcher.close();
}
