use crate::{ChannelHandle, ContextError, DeviceHandle, HardwareContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Static description of a simulated hardware set, loaded from TOML or JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimDescription {
    #[serde(default)]
    pub devices: Vec<SimDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimDevice {
    pub name: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, SimAttr>,
    #[serde(default)]
    pub channels: Vec<SimChannel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimChannel {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub output: bool,
    #[serde(default)]
    pub attrs: BTreeMap<String, SimAttr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimAttr {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
    Detailed {
        value: String,
        #[serde(default)]
        read_only: bool,
    },
}

impl SimAttr {
    fn into_cell(self) -> AttrCell {
        match self {
            SimAttr::Text(value) => AttrCell::writable(value),
            SimAttr::Integer(v) => AttrCell::writable(v.to_string()),
            SimAttr::Float(v) => AttrCell::writable(v.to_string()),
            SimAttr::Flag(v) => AttrCell::writable(if v { "1" } else { "0" }.to_string()),
            SimAttr::Detailed { value, read_only } => AttrCell { value, read_only },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub device: String,
    pub channel: Option<String>,
    pub attr: String,
    pub value: String,
}

#[derive(Debug, Clone)]
struct AttrCell {
    value: String,
    read_only: bool,
}

impl AttrCell {
    fn writable(value: String) -> Self {
        Self {
            value,
            read_only: false,
        }
    }
}

#[derive(Debug)]
struct ChannelState {
    id: String,
    label: Option<String>,
    output: bool,
    attrs: BTreeMap<String, AttrCell>,
}

#[derive(Debug)]
struct DeviceState {
    name: String,
    attrs: BTreeMap<String, AttrCell>,
    channels: Vec<ChannelState>,
}

#[derive(Debug, Default)]
struct SimState {
    devices: Vec<DeviceState>,
    writes: Vec<WriteRecord>,
    reads: u64,
    live_handles: usize,
}

impl SimState {
    fn device(&self, name: &str) -> Result<&DeviceState, ContextError> {
        self.devices
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ContextError::DeviceNotFound(name.to_string()))
    }

    fn device_mut(&mut self, name: &str) -> Result<&mut DeviceState, ContextError> {
        self.devices
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| ContextError::DeviceNotFound(name.to_string()))
    }

    fn channel(&self, handle: &ChannelHandle) -> Result<&ChannelState, ContextError> {
        self.device(handle.device())?
            .channels
            .iter()
            .find(|c| c.id == handle.id() && c.output == handle.is_output())
            .ok_or_else(|| ContextError::ChannelNotFound {
                device: handle.device().to_string(),
                channel: handle.id().to_string(),
            })
    }

    fn channel_mut(&mut self, handle: &ChannelHandle) -> Result<&mut ChannelState, ContextError> {
        self.device_mut(handle.device())?
            .channels
            .iter_mut()
            .find(|c| c.id == handle.id() && c.output == handle.is_output())
            .ok_or_else(|| ContextError::ChannelNotFound {
                device: handle.device().to_string(),
                channel: handle.id().to_string(),
            })
    }
}

/// In-memory hardware context.
///
/// Clones share the same simulated hardware, so a test can keep one handle
/// as a probe while a plugin owns another. Every live handle is counted,
/// which makes context release observable through [`SimContext::live_handles`].
#[derive(Debug)]
pub struct SimContext {
    state: Arc<Mutex<SimState>>,
}

impl SimContext {
    pub fn new(description: SimDescription) -> Result<Self, ContextError> {
        let mut devices: Vec<DeviceState> = Vec::with_capacity(description.devices.len());
        for device in description.devices {
            if devices.iter().any(|d| d.name == device.name) {
                return Err(ContextError::Description(format!(
                    "duplicate device '{}'",
                    device.name
                )));
            }
            let channels = device
                .channels
                .into_iter()
                .map(|ch| ChannelState {
                    id: ch.id,
                    label: ch.label,
                    output: ch.output,
                    attrs: ch
                        .attrs
                        .into_iter()
                        .map(|(k, v)| (k, v.into_cell()))
                        .collect(),
                })
                .collect();
            devices.push(DeviceState {
                name: device.name,
                attrs: device
                    .attrs
                    .into_iter()
                    .map(|(k, v)| (k, v.into_cell()))
                    .collect(),
                channels,
            });
        }
        let state = SimState {
            devices,
            live_handles: 1,
            ..SimState::default()
        };
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn from_toml_str(data: &str) -> Result<Self, ContextError> {
        let description: SimDescription =
            toml::from_str(data).map_err(|e| ContextError::Description(e.to_string()))?;
        Self::new(description)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ContextError> {
        let description: SimDescription =
            serde_json::from_str(data).map_err(|e| ContextError::Description(e.to_string()))?;
        Self::new(description)
    }

    /// Loads a description file; `.json` files are parsed as JSON, anything else as TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ContextError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| ContextError::Io(format!("{}: {e}", path.display())))?;
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Self::from_json_str(&data)
        } else {
            Self::from_toml_str(&data)
        }
    }

    /// Opens another handle onto the same hardware.
    pub fn open_private(&self) -> SimContext {
        self.clone()
    }

    pub fn live_handles(&self) -> usize {
        self.lock().live_handles
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    pub fn read_count(&self) -> u64 {
        self.lock().reads
    }

    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.writes.clear();
        state.reads = 0;
    }

    /// Current value of a device attribute, without touching the counters.
    pub fn peek_device(&self, device: &str, attr: &str) -> Option<String> {
        let state = self.lock();
        let dev = state.device(device).ok()?;
        dev.attrs.get(attr).map(|cell| cell.value.clone())
    }

    /// Current value of a channel attribute, without touching the counters.
    pub fn peek_channel(&self, device: &str, channel: &str, output: bool, attr: &str) -> Option<String> {
        let state = self.lock();
        let dev = state.device(device).ok()?;
        dev.channels
            .iter()
            .find(|c| c.id == channel && c.output == output)
            .and_then(|c| c.attrs.get(attr))
            .map(|cell| cell.value.clone())
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        self.lock().live_handles += 1;
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl Drop for SimContext {
    fn drop(&mut self) {
        let mut state = self.lock();
        state.live_handles = state.live_handles.saturating_sub(1);
    }
}

impl HardwareContext for SimContext {
    fn devices(&self) -> Vec<DeviceHandle> {
        self.lock()
            .devices
            .iter()
            .map(|d| DeviceHandle::new(d.name.clone()))
            .collect()
    }

    fn find_device(&self, name: &str) -> Option<DeviceHandle> {
        self.lock()
            .devices
            .iter()
            .find(|d| d.name == name)
            .map(|d| DeviceHandle::new(d.name.clone()))
    }

    fn channels(&self, device: &DeviceHandle) -> Vec<ChannelHandle> {
        let state = self.lock();
        let Ok(dev) = state.device(device.name()) else {
            return Vec::new();
        };
        dev.channels
            .iter()
            .map(|c| ChannelHandle::new(dev.name.clone(), c.id.clone(), c.label.clone(), c.output))
            .collect()
    }

    fn device_attrs(&self, device: &DeviceHandle) -> Vec<String> {
        let state = self.lock();
        state
            .device(device.name())
            .map(|d| d.attrs.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn channel_attrs(&self, channel: &ChannelHandle) -> Vec<String> {
        let state = self.lock();
        state
            .channel(channel)
            .map(|c| c.attrs.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn device_attr_read(&self, device: &DeviceHandle, attr: &str) -> Result<String, ContextError> {
        let mut state = self.lock();
        let value = state
            .device(device.name())?
            .attrs
            .get(attr)
            .map(|cell| cell.value.clone())
            .ok_or_else(|| ContextError::AttributeNotFound {
                device: device.name().to_string(),
                attr: attr.to_string(),
            })?;
        state.reads += 1;
        Ok(value)
    }

    fn device_attr_write(
        &self,
        device: &DeviceHandle,
        attr: &str,
        value: &str,
    ) -> Result<(), ContextError> {
        let mut state = self.lock();
        let cell = state
            .device_mut(device.name())?
            .attrs
            .get_mut(attr)
            .ok_or_else(|| ContextError::AttributeNotFound {
                device: device.name().to_string(),
                attr: attr.to_string(),
            })?;
        if cell.read_only {
            return Err(ContextError::ReadOnly {
                device: device.name().to_string(),
                attr: attr.to_string(),
            });
        }
        cell.value = value.to_string();
        state.writes.push(WriteRecord {
            device: device.name().to_string(),
            channel: None,
            attr: attr.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn channel_attr_read(
        &self,
        channel: &ChannelHandle,
        attr: &str,
    ) -> Result<String, ContextError> {
        let mut state = self.lock();
        let value = state
            .channel(channel)?
            .attrs
            .get(attr)
            .map(|cell| cell.value.clone())
            .ok_or_else(|| ContextError::AttributeNotFound {
                device: channel.device().to_string(),
                attr: format!("{}/{attr}", channel.id()),
            })?;
        state.reads += 1;
        Ok(value)
    }

    fn channel_attr_write(
        &self,
        channel: &ChannelHandle,
        attr: &str,
        value: &str,
    ) -> Result<(), ContextError> {
        let mut state = self.lock();
        let cell = state
            .channel_mut(channel)?
            .attrs
            .get_mut(attr)
            .ok_or_else(|| ContextError::AttributeNotFound {
                device: channel.device().to_string(),
                attr: format!("{}/{attr}", channel.id()),
            })?;
        if cell.read_only {
            return Err(ContextError::ReadOnly {
                device: channel.device().to_string(),
                attr: format!("{}/{attr}", channel.id()),
            });
        }
        cell.value = value.to_string();
        state.writes.push(WriteRecord {
            device: channel.device().to_string(),
            channel: Some(channel.id().to_string()),
            attr: attr.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }
}
