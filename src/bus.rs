use crate::error::{BridgeError, Result};
use crate::types::DeviceProperties;
use futures_util::{Stream, StreamExt};
use tokio_udev::{AsyncMonitorSocket, Device, Enumerator, EventType, MonitorBuilder};

const INPUT_SUBSYSTEM: &str = "input";

/// What happened to a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    Add,
    Remove,
    Other(String),
}

impl From<EventType> for DeviceAction {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Add => DeviceAction::Add,
            EventType::Remove => DeviceAction::Remove,
            other => DeviceAction::Other(other.to_string()),
        }
    }
}

/// Device notification from the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    pub action: DeviceAction,
    pub properties: DeviceProperties,
}

impl BusEvent {
    pub fn new(action: DeviceAction, properties: DeviceProperties) -> Self {
        Self { action, properties }
    }
}

fn properties_of(device: &Device) -> DeviceProperties {
    device
        .properties()
        .map(|property| {
            (
                property.name().to_string_lossy().into_owned(),
                property.value().to_string_lossy().into_owned(),
            )
        })
        .collect()
}

/// Snapshot the input devices present right now
pub fn scan_input_devices() -> Result<Vec<DeviceProperties>> {
    let mut enumerator = Enumerator::new().map_err(BridgeError::Udev)?;
    enumerator
        .match_subsystem(INPUT_SUBSYSTEM)
        .map_err(BridgeError::Udev)?;

    let devices = enumerator
        .scan_devices()
        .map_err(BridgeError::Udev)?
        .map(|device| properties_of(&device))
        .collect();

    Ok(devices)
}

/// Subscribe to input device notifications on the kernel netlink bus
pub fn watch_input_devices() -> Result<impl Stream<Item = Result<BusEvent>>> {
    let socket = MonitorBuilder::new()
        .and_then(|builder| builder.match_subsystem(INPUT_SUBSYSTEM))
        .and_then(|builder| builder.listen())
        .map_err(BridgeError::Udev)?;
    let socket = AsyncMonitorSocket::new(socket).map_err(BridgeError::Udev)?;

    Ok(socket.map(|event| {
        let event = event.map_err(BridgeError::Udev)?;
        Ok(BusEvent::new(
            event.event_type().into(),
            properties_of(&event.device()),
        ))
    }))
}
