use std::time::Duration;

/// Hardware address of the remote, matched as a suffix of its device group
pub const DEVICE_PHYS: &str = "xx:xx:xx:xx:xx:xx";

/// Music Player Daemon host
pub const MPD_HOST: &str = "localhost";

/// Music Player Daemon port
pub const MPD_PORT: u16 = 6600;

/// Playlist loaded whenever the remote attaches
pub const DEFAULT_PLAYLIST: &str = "your_playlist";

/// Upper bound for connecting and for each request/response exchange
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Device nodes the remote's key events arrive on
pub const INPUT_EVENT_PREFIX: &str = "/dev/input/event";

/// udev property carrying the physical address group of an input device
pub const DEVICE_GROUP_PROPERTY: &str = "LIBINPUT_DEVICE_GROUP";

/// udev property carrying the device node path
pub const DEVNAME_PROPERTY: &str = "DEVNAME";

/// Runtime configuration, built from the compiled-in constants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Hardware address suffix to match
    pub device_phys: String,
    /// Control server host
    pub host: String,
    /// Control server port
    pub port: u16,
    /// Playlist to load on attach
    pub playlist: String,
    /// Network timeout for a single command round-trip
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_phys: DEVICE_PHYS.to_string(),
            host: MPD_HOST.to_string(),
            port: MPD_PORT,
            playlist: DEFAULT_PLAYLIST.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    /// `host:port` of the control server, for logging
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
