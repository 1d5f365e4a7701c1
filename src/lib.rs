//! Control a Music Player Daemon from a Bluetooth media remote
//!
//! This library watches the Linux device bus for a remote identified by its
//! hardware address, reads its key events through evdev, and turns button
//! presses into MPD playback commands:
//!
//! - `KEY_STOPCD` stops playback
//! - `KEY_PLAYCD` toggles between playing and paused
//! - `KEY_PREVIOUSSONG` / `KEY_NEXTSONG` skip through the queue
//!
//! When the remote attaches, the configured playlist is loaded. When it
//! detaches, playback is stopped and the device node released.
//!
//! # Quick Start
//!
//! ```no_run
//! use mpd_remote::{Config, DeviceLifecycleMonitor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut monitor = DeviceLifecycleMonitor::new(Config::default());
//!     monitor.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Monitor**: udev scan and hot-plug watch, one dispatch task per attached remote
//! - **Dispatcher**: key event loop, one short MPD session per command
//! - **Client**: playback operations, run on the blocking pool through the `mpd` crate
//! - **Connection**: dialing the daemon and the protocol handshake
//! - **Input / Bus**: evdev and udev adapters

mod bus;
mod client;
mod config;
mod connection;
mod dispatcher;
mod error;
mod input;
mod monitor;
mod types;

// Public exports
pub use bus::{scan_input_devices, watch_input_devices, BusEvent, DeviceAction};
pub use client::{ControlClient, MpdClient};
pub use config::{
    Config, DEFAULT_PLAYLIST, DEVICE_PHYS, INPUT_EVENT_PREFIX, MPD_HOST, MPD_PORT,
    REQUEST_TIMEOUT,
};
pub use dispatcher::{CommandDispatcher, LoopExit};
pub use error::{BridgeError, Result};
pub use input::{EventDevice, KeyEvent, KeyEventSource, KeyTransition, RemoteKey};
pub use monitor::{Attach, DeviceLifecycleMonitor, SystemAttach};
pub use types::{DeviceId, DeviceProperties, PlaybackState, Song, Status};
