//! Signal generator state for a DAC with DDS tone channels.
//!
//! Tracks the generation mode of each channel group, the transmit channel
//! enables and the buffer file chooser, and owns the tone widgets bound to
//! the `frequency`, `scale` and `phase` attributes of every DDS channel.

use crate::binding::{
    Adapter, BindingError, BindingTable, Control, ControlEvent, ControlKind, PushOutcome,
};
use crate::registry::ValueKind;
use iio_context::{AttrTarget, ChannelHandle, DeviceHandle, HardwareContext};
use std::path::{Path, PathBuf};

pub const GUI_CONTAINER: &str = "dac_data_manager";
const TONES_PER_GROUP: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdsMode {
    Disabled = 0,
    OneTone = 1,
    TwoTones = 2,
    Independent = 3,
    Buffer = 4,
}

impl DdsMode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for DdsMode {
    type Error = ManagerError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DdsMode::Disabled),
            1 => Ok(DdsMode::OneTone),
            2 => Ok(DdsMode::TwoTones),
            3 => Ok(DdsMode::Independent),
            4 => Ok(DdsMode::Buffer),
            other => Err(ManagerError::InvalidMode(other)),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    #[error("device {0} has no DDS channels")]
    NoDdsChannels(String),
    #[error("no channel group {0}")]
    NoSuchGroup(usize),
    #[error("no tx channel {0}")]
    NoSuchTxChannel(usize),
    #[error("invalid DDS mode {0}")]
    InvalidMode(i32),
}

#[derive(Debug)]
pub struct DacDataManager {
    device: DeviceHandle,
    modes: Vec<DdsMode>,
    tx_channels: Vec<(ChannelHandle, bool)>,
    buffer_filename: Option<PathBuf>,
    current_folder: Option<PathBuf>,
    tones: BindingTable,
}

impl DacDataManager {
    pub fn new(ctx: &dyn HardwareContext, device: &DeviceHandle) -> Result<Self, ManagerError> {
        let channels = ctx.channels(device);
        let tone_channels: Vec<&ChannelHandle> = channels
            .iter()
            .filter(|ch| {
                ch.is_output()
                    && ch.type_name() == "altvoltage"
                    && ctx.channel_attrs(ch).iter().any(|a| a == "frequency")
            })
            .collect();
        if tone_channels.is_empty() {
            return Err(ManagerError::NoDdsChannels(device.name().to_string()));
        }

        let mut tones = BindingTable::new();
        for ch in &tone_channels {
            bind_tones(ctx, &mut tones, ch);
        }
        tones.connect_signals();

        let tx_channels = channels
            .iter()
            .filter(|ch| ch.is_output() && ch.type_name() == "voltage")
            .map(|ch| (ch.clone(), true))
            .collect();

        let groups = tone_channels.len().div_ceil(TONES_PER_GROUP);
        log::debug!(
            "{}: {} DDS tones in {groups} group(s)",
            device.name(),
            tone_channels.len()
        );

        Ok(Self {
            device: device.clone(),
            modes: vec![DdsMode::OneTone; groups],
            tx_channels,
            buffer_filename: None,
            current_folder: None,
            tones,
        })
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    pub fn gui_container(&self) -> &str {
        GUI_CONTAINER
    }

    pub fn group_count(&self) -> usize {
        self.modes.len()
    }

    /// Channel groups are numbered from 1.
    pub fn dds_mode(&self, group: usize) -> Result<DdsMode, ManagerError> {
        group
            .checked_sub(1)
            .and_then(|idx| self.modes.get(idx))
            .copied()
            .ok_or(ManagerError::NoSuchGroup(group))
    }

    pub fn set_dds_mode(&mut self, group: usize, mode: DdsMode) -> Result<(), ManagerError> {
        let slot = group
            .checked_sub(1)
            .and_then(|idx| self.modes.get_mut(idx))
            .ok_or(ManagerError::NoSuchGroup(group))?;
        *slot = mode;
        log::debug!("{}: group {group} mode {mode:?}", self.device.name());
        Ok(())
    }

    pub fn tx_channel_count(&self) -> usize {
        self.tx_channels.len()
    }

    pub fn tx_channel_state(&self, index: usize) -> Result<bool, ManagerError> {
        self.tx_channels
            .get(index)
            .map(|(_, enabled)| *enabled)
            .ok_or(ManagerError::NoSuchTxChannel(index))
    }

    pub fn set_tx_channel_state(&mut self, index: usize, enabled: bool) -> Result<(), ManagerError> {
        let (_, state) = self
            .tx_channels
            .get_mut(index)
            .ok_or(ManagerError::NoSuchTxChannel(index))?;
        *state = enabled;
        Ok(())
    }

    pub fn buffer_chooser_filename(&self) -> Option<&Path> {
        self.buffer_filename.as_deref()
    }

    /// An empty name clears the selection.
    pub fn set_buffer_chooser_filename(&mut self, filename: &str) {
        let filename = filename.trim();
        self.buffer_filename = (!filename.is_empty()).then(|| PathBuf::from(filename));
    }

    pub fn buffer_chooser_current_folder(&self) -> Option<&Path> {
        self.current_folder.as_deref()
    }

    pub fn set_buffer_chooser_current_folder(&mut self, folder: &Path) {
        self.current_folder = Some(folder.to_path_buf());
    }

    pub fn tones(&self) -> &BindingTable {
        &self.tones
    }

    /// Refreshes every tone widget from hardware.
    pub fn update_iio_widgets(&mut self, ctx: &dyn HardwareContext) -> usize {
        self.tones.pull_all(ctx)
    }

    /// Bounds the tone frequency widgets to `max_mhz`.
    pub fn freq_widgets_range_update(&mut self, max_mhz: f64) {
        let ids: Vec<String> = self
            .tones
            .iter()
            .filter(|b| matches!(b.target(), AttrTarget::Channel(_, attr) if attr == "frequency"))
            .map(|b| b.control().id().to_string())
            .collect();
        for id in ids {
            if let Some(control) = self.tones.control_mut(&id) {
                control.set_range(0.0, max_mhz);
            }
        }
    }

    pub fn handle_event(
        &mut self,
        ctx: &dyn HardwareContext,
        control_id: &str,
        event: ControlEvent,
    ) -> Result<PushOutcome, BindingError> {
        self.tones.handle_event(ctx, control_id, event)
    }

    pub fn interact(
        &mut self,
        ctx: &dyn HardwareContext,
        control_id: &str,
        value: crate::binding::ControlValue,
    ) -> Result<PushOutcome, BindingError> {
        self.tones.interact(ctx, control_id, value)
    }
}

impl Drop for DacDataManager {
    fn drop(&mut self) {
        log::debug!("{}: releasing DAC data manager", self.device.name());
    }
}

fn bind_tones(ctx: &dyn HardwareContext, tones: &mut BindingTable, ch: &ChannelHandle) {
    let attrs = ctx.channel_attrs(ch);
    let name = ch.label().unwrap_or(ch.id());
    let specs = [
        (
            "frequency",
            ControlKind::SpinButton {
                progress: true,
                min: 0.0,
                max: f64::MAX,
            },
            Adapter::new(ValueKind::LongLong, 1e6),
        ),
        (
            "scale",
            ControlKind::SpinButton {
                progress: false,
                min: 0.0,
                max: 1.0,
            },
            Adapter::new(ValueKind::Double, 1.0),
        ),
        (
            "phase",
            ControlKind::SpinButton {
                progress: false,
                min: 0.0,
                max: 360.0,
            },
            Adapter::new(ValueKind::LongLong, 1000.0),
        ),
    ];
    for (attr, kind, adapter) in specs {
        if !attrs.iter().any(|a| a == attr) {
            continue;
        }
        tones.bind(
            format!("{}.{}_{attr}", ch.device(), ch.id()),
            AttrTarget::Channel(ch.clone(), attr.to_string()),
            Control::new(format!("tone_{name}_{attr}"), kind),
            adapter,
        );
    }
}
