//! Hardware context used by the oscilloscope host and its plugins.
//!
//! A context exposes devices, their channels and scalar attributes. Attributes
//! are addressed either directly on a handle or by their sysfs-style filename
//! (`out_altvoltage0_1A_frequency`), which [`HardwareContext::resolve_attr`]
//! maps back to a device or channel attribute.

pub mod sim;

pub use sim::{SimAttr, SimChannel, SimContext, SimDescription, SimDevice, WriteRecord};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    name: String,
}

impl DeviceHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    device: String,
    id: String,
    label: Option<String>,
    output: bool,
}

impl ChannelHandle {
    pub fn new(
        device: impl Into<String>,
        id: impl Into<String>,
        label: Option<String>,
        output: bool,
    ) -> Self {
        Self {
            device: device.into(),
            id: id.into(),
            label,
            output,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_output(&self) -> bool {
        self.output
    }

    /// Channel type, i.e. the id without its trailing index (`altvoltage0` -> `altvoltage`).
    pub fn type_name(&self) -> &str {
        self.id.trim_end_matches(|c: char| c.is_ascii_digit())
    }

    fn direction_prefix(&self) -> &'static str {
        if self.output {
            "out"
        } else {
            "in"
        }
    }
}

/// Where an attribute filename points to once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrTarget {
    Device(DeviceHandle, String),
    Channel(ChannelHandle, String),
    /// Attribute shared by every channel of one type and direction.
    SharedByType(Vec<ChannelHandle>, String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("channel not found: {device}:{channel}")]
    ChannelNotFound { device: String, channel: String },
    #[error("attribute not found: {device}.{attr}")]
    AttributeNotFound { device: String, attr: String },
    #[error("attribute is read-only: {device}.{attr}")]
    ReadOnly { device: String, attr: String },
    #[error("invalid value for {attr}: '{value}'")]
    InvalidValue { attr: String, value: String },
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid hardware description: {0}")]
    Description(String),
}

pub trait HardwareContext: Send {
    fn devices(&self) -> Vec<DeviceHandle>;
    fn find_device(&self, name: &str) -> Option<DeviceHandle>;
    fn channels(&self, device: &DeviceHandle) -> Vec<ChannelHandle>;
    fn device_attrs(&self, device: &DeviceHandle) -> Vec<String>;
    fn channel_attrs(&self, channel: &ChannelHandle) -> Vec<String>;
    fn device_attr_read(&self, device: &DeviceHandle, attr: &str) -> Result<String, ContextError>;
    fn device_attr_write(
        &self,
        device: &DeviceHandle,
        attr: &str,
        value: &str,
    ) -> Result<(), ContextError>;
    fn channel_attr_read(&self, channel: &ChannelHandle, attr: &str)
        -> Result<String, ContextError>;
    fn channel_attr_write(
        &self,
        channel: &ChannelHandle,
        attr: &str,
        value: &str,
    ) -> Result<(), ContextError>;

    fn find_channel(
        &self,
        device: &DeviceHandle,
        name: &str,
        is_output: bool,
    ) -> Option<ChannelHandle> {
        self.channels(device).into_iter().find(|ch| {
            ch.is_output() == is_output && (ch.id() == name || ch.label() == Some(name))
        })
    }

    fn resolve_attr(&self, device: &DeviceHandle, filename: &str) -> Option<AttrTarget> {
        if self.device_attrs(device).iter().any(|a| a == filename) {
            return Some(AttrTarget::Device(device.clone(), filename.to_string()));
        }

        let channels = self.channels(device);
        for ch in &channels {
            let prefix = ch.direction_prefix();
            for attr in self.channel_attrs(ch) {
                let exact = ch
                    .label()
                    .map(|label| format!("{prefix}_{}_{label}_{attr}", ch.id()));
                if exact.as_deref() == Some(filename)
                    || format!("{prefix}_{}_{attr}", ch.id()) == filename
                {
                    return Some(AttrTarget::Channel(ch.clone(), attr));
                }
            }
        }

        for ch in &channels {
            let prefix = ch.direction_prefix();
            let Some(attr) = filename
                .strip_prefix(&format!("{prefix}_{}_", ch.type_name()))
                .map(str::to_string)
            else {
                continue;
            };
            let shared: Vec<ChannelHandle> = channels
                .iter()
                .filter(|other| {
                    other.is_output() == ch.is_output()
                        && other.type_name() == ch.type_name()
                        && self.channel_attrs(other).iter().any(|a| *a == attr)
                })
                .cloned()
                .collect();
            if !shared.is_empty() {
                return Some(AttrTarget::SharedByType(shared, attr));
            }
        }
        None
    }

    fn read_target(&self, target: &AttrTarget) -> Result<String, ContextError> {
        match target {
            AttrTarget::Device(dev, attr) => self.device_attr_read(dev, attr),
            AttrTarget::Channel(ch, attr) => self.channel_attr_read(ch, attr),
            AttrTarget::SharedByType(channels, attr) => match channels.first() {
                Some(ch) => self.channel_attr_read(ch, attr),
                None => Err(ContextError::AttributeNotFound {
                    device: String::new(),
                    attr: attr.clone(),
                }),
            },
        }
    }

    fn write_target(&self, target: &AttrTarget, value: &str) -> Result<(), ContextError> {
        match target {
            AttrTarget::Device(dev, attr) => self.device_attr_write(dev, attr, value),
            AttrTarget::Channel(ch, attr) => self.channel_attr_write(ch, attr, value),
            AttrTarget::SharedByType(channels, attr) => {
                // Every channel gets the write; the first failure is reported.
                let mut first_err = None;
                for ch in channels {
                    if let Err(err) = self.channel_attr_write(ch, attr, value) {
                        log::warn!("{}: write {attr} failed: {err}", ch.id());
                        first_err.get_or_insert(err);
                    }
                }
                first_err.map_or(Ok(()), Err)
            }
        }
    }

    fn attr_read(&self, device: &DeviceHandle, filename: &str) -> Result<String, ContextError> {
        let target = self.resolve_attr(device, filename).ok_or_else(|| {
            ContextError::AttributeNotFound {
                device: device.name().to_string(),
                attr: filename.to_string(),
            }
        })?;
        self.read_target(&target)
    }

    fn attr_write(
        &self,
        device: &DeviceHandle,
        filename: &str,
        value: &str,
    ) -> Result<(), ContextError> {
        let target = self.resolve_attr(device, filename).ok_or_else(|| {
            ContextError::AttributeNotFound {
                device: device.name().to_string(),
                attr: filename.to_string(),
            }
        })?;
        log::debug!("{}.{} <- {}", device.name(), filename, value);
        self.write_target(&target, value)
    }

    fn read_double(&self, device: &DeviceHandle, filename: &str) -> Result<f64, ContextError> {
        let raw = self.attr_read(device, filename)?;
        parse_value(filename, &raw)
    }

    fn read_longlong(&self, device: &DeviceHandle, filename: &str) -> Result<i64, ContextError> {
        let raw = self.attr_read(device, filename)?;
        parse_value(filename, &raw)
    }

    fn read_bool(&self, device: &DeviceHandle, filename: &str) -> Result<bool, ContextError> {
        let raw = self.attr_read(device, filename)?;
        parse_bool(filename, &raw)
    }

    fn write_double(
        &self,
        device: &DeviceHandle,
        filename: &str,
        value: f64,
    ) -> Result<(), ContextError> {
        self.attr_write(device, filename, &value.to_string())
    }

    fn write_longlong(
        &self,
        device: &DeviceHandle,
        filename: &str,
        value: i64,
    ) -> Result<(), ContextError> {
        self.attr_write(device, filename, &value.to_string())
    }

    fn write_bool(
        &self,
        device: &DeviceHandle,
        filename: &str,
        value: bool,
    ) -> Result<(), ContextError> {
        self.attr_write(device, filename, if value { "1" } else { "0" })
    }
}

fn parse_value<T: std::str::FromStr>(attr: &str, raw: &str) -> Result<T, ContextError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ContextError::InvalidValue {
            attr: attr.to_string(),
            value: raw.to_string(),
        })
}

/// Accepts `0`/`1` style integers as well as `true`/`false`.
pub fn parse_bool(attr: &str, raw: &str) -> Result<bool, ContextError> {
    let trimmed = raw.trim();
    match trimmed {
        "true" | "True" | "TRUE" => return Ok(true),
        "false" | "False" | "FALSE" => return Ok(false),
        _ => {}
    }
    trimmed
        .parse::<i64>()
        .map(|v| v != 0)
        .map_err(|_| ContextError::InvalidValue {
            attr: attr.to_string(),
            value: raw.to_string(),
        })
}
