//! Key events from the remote's input device node.

use crate::error::Result;
use async_trait::async_trait;
use evdev::{Device, EventStream, InputEventKind, Key};
use std::path::Path;

/// Key state change carried by an event's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Up,
    Down,
    Repeat,
}

impl KeyTransition {
    /// Map an `EV_KEY` value; anything outside 0..=2 is not a key transition
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyTransition::Up),
            1 => Some(KeyTransition::Down),
            2 => Some(KeyTransition::Repeat),
            _ => None,
        }
    }
}

/// A key event read from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u16,
    pub transition: KeyTransition,
}

impl KeyEvent {
    pub fn new(key: Key, transition: KeyTransition) -> Self {
        Self {
            code: key.code(),
            transition,
        }
    }

    /// The remote button this event presses, if any
    ///
    /// Releases and auto-repeats never press a button.
    pub fn pressed(&self) -> Option<RemoteKey> {
        match self.transition {
            KeyTransition::Down => RemoteKey::from_code(self.code),
            KeyTransition::Up | KeyTransition::Repeat => None,
        }
    }
}

/// Buttons the bridge reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKey {
    Stop,
    PlayPause,
    Previous,
    Next,
}

impl RemoteKey {
    pub fn from_code(code: u16) -> Option<Self> {
        match Key::new(code) {
            Key::KEY_STOPCD => Some(RemoteKey::Stop),
            Key::KEY_PLAYCD => Some(RemoteKey::PlayPause),
            Key::KEY_PREVIOUSSONG => Some(RemoteKey::Previous),
            Key::KEY_NEXTSONG => Some(RemoteKey::Next),
            _ => None,
        }
    }

    /// Log label for the button
    pub fn label(&self) -> &'static str {
        match self {
            RemoteKey::Stop => "STOP",
            RemoteKey::PlayPause => "PLAY/PAUSE",
            RemoteKey::Previous => "PREVIOUS SONG",
            RemoteKey::Next => "NEXT SONG",
        }
    }
}

/// Blocking-style sequence of key events from one device
#[async_trait]
pub trait KeyEventSource: Send {
    /// Next key event; `Ok(None)` once the stream has ended or the source is closed
    async fn next_key_event(&mut self) -> Result<Option<KeyEvent>>;

    /// Release the device handle. Calling it again has no effect.
    fn close(&mut self);
}

/// evdev device node read through tokio
pub struct EventDevice {
    stream: Option<EventStream>,
}

impl EventDevice {
    /// Open a device node such as `/dev/input/event7`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::open(path)?;
        tracing::debug!(
            "Opened {} ({})",
            path.display(),
            device.name().unwrap_or("unnamed device")
        );

        Ok(Self {
            stream: Some(device.into_event_stream()?),
        })
    }
}

/// Whether a read failed because the device node was removed
fn device_gone(error: &std::io::Error) -> bool {
    error.raw_os_error() == Some(libc::ENODEV)
}

#[async_trait]
impl KeyEventSource for EventDevice {
    async fn next_key_event(&mut self) -> Result<Option<KeyEvent>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        loop {
            let event = match stream.next_event().await {
                Ok(event) => event,
                Err(e) if device_gone(&e) => {
                    tracing::debug!("Input device went away");
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };
            if let InputEventKind::Key(key) = event.kind() {
                if let Some(transition) = KeyTransition::from_value(event.value()) {
                    return Ok(Some(KeyEvent::new(key, transition)));
                }
            }
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!("Closing device");
        }
    }
}
