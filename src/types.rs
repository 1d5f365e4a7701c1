use crate::config::{Config, DEVICE_GROUP_PROPERTY, DEVNAME_PROPERTY, INPUT_EVENT_PREFIX};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Device identifier (the device node path, e.g. `/dev/input/event7`)
pub type DeviceId = PathBuf;

/// Playback state reported by `status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Play,
    Pause,
    Stop,
}

impl From<mpd::State> for PlaybackState {
    fn from(state: mpd::State) -> Self {
        match state {
            mpd::State::Play => PlaybackState::Play,
            mpd::State::Pause => PlaybackState::Pause,
            mpd::State::Stop => PlaybackState::Stop,
        }
    }
}

/// Daemon status snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub state: PlaybackState,

    /// Mixer volume, -1 when there is no mixer
    pub volume: i8,

    /// Number of songs in the queue
    pub queue_len: u32,
}

impl From<mpd::Status> for Status {
    fn from(status: mpd::Status) -> Self {
        Self {
            state: status.state.into(),
            volume: status.volume,
            queue_len: status.queue_len,
        }
    }
}

/// Currently selected song
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Song {
    pub file: String,
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl From<mpd::Song> for Song {
    fn from(song: mpd::Song) -> Self {
        Self {
            file: song.file,
            title: song.title,
            artist: song.artist,
        }
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => write!(f, "{} - {}", artist, title),
            (None, Some(title)) => write!(f, "{}", title),
            _ if !self.file.is_empty() => write!(f, "{}", self.file),
            _ => write!(f, "<nothing>"),
        }
    }
}

/// Owned snapshot of a udev device's properties
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceProperties(BTreeMap<String, String>);

impl DeviceProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a property value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Set a property value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Device node of this device if it is the configured remote
    ///
    /// Matches when the device group ends with the configured hardware address
    /// and the node is an input event node. Both properties must be present.
    pub fn matching_devnode(&self, config: &Config) -> Option<DeviceId> {
        let group = self.get(DEVICE_GROUP_PROPERTY)?;
        let devname = self.get(DEVNAME_PROPERTY)?;

        if group.ends_with(&config.device_phys) && devname.starts_with(INPUT_EVENT_PREFIX) {
            Some(PathBuf::from(devname))
        } else {
            None
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DeviceProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
