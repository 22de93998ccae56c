//! Plugin for the AD-FMCDAQ2-EBZ board: an AD9680 ADC paired with an AD9144 DAC.
//!
//! Binds the converter attributes to the panel controls, hands the DDS and
//! buffer settings of the DAC to a [`DacDataManager`] and keeps all of it in
//! the `[DAQ2]` section of a profile.

mod driver;
mod persistence;

pub use driver::{DriverAttr, DriverError};

use iio_context::{ContextError, DeviceHandle, HardwareContext};
use osc_core::{
    default_handle, AttributePath, BindingGroup, BindingTable, Control, ControlEvent,
    ControlValue, DacDataManager, Layout, OscPlugin, Panel, PluginError, PluginHost, PushOutcome,
    ValueKind,
};
use std::path::{Path, PathBuf};

pub const THIS_DRIVER: &str = "DAQ2";
pub const SYNC_RELOAD: &str = "SYNC_RELOAD";

pub const ADC_DEVICE: &str = "axi-ad9680-hpc";
pub const DAC_DEVICE: &str = "axi-ad9144-hpc";

pub const MAX_TX_CHANNELS: usize = 2;

/// Channel group the `dds_mode` key applies to.
const DDS_GROUP: usize = 1;

pub const LAYOUT_FILE: &str = "daq2.layout.toml";
pub const DDS_CONTAINER: &str = "dds_transmit_block";

pub const BLOCK_DIAGRAM: [&str; 4] = [
    "AD9680_11752-001.svg",
    "AD9144_11675-002.svg",
    "AD9523_09278-020.svg",
    "AD-FMCDAQ2-EBZ.jpg",
];

const MHZ_SCALE: i64 = 1_000_000;

/// Attributes synced by name between the profile and the hardware.
pub const DAQ2_SR_ATTRIBS: &[AttributePath] = &[
    AttributePath::new(ADC_DEVICE, "in_voltage_sampling_frequency", ValueKind::LongLong),
    AttributePath::new(DAC_DEVICE, "out_altvoltage_sampling_frequency", ValueKind::LongLong),
    AttributePath::new(DAC_DEVICE, "out_altvoltage0_1A_frequency", ValueKind::Double),
    AttributePath::new(DAC_DEVICE, "out_altvoltage2_2A_frequency", ValueKind::Double),
    AttributePath::new(DAC_DEVICE, "out_altvoltage1_1B_frequency", ValueKind::Double),
    AttributePath::new(DAC_DEVICE, "out_altvoltage3_2B_frequency", ValueKind::Double),
    AttributePath::new(DAC_DEVICE, "out_altvoltage0_1A_scale", ValueKind::Double),
    AttributePath::new(DAC_DEVICE, "out_altvoltage2_2A_scale", ValueKind::Double),
    AttributePath::new(DAC_DEVICE, "out_altvoltage1_1B_scale", ValueKind::Double),
    AttributePath::new(DAC_DEVICE, "out_altvoltage3_2B_scale", ValueKind::Double),
    AttributePath::new(DAC_DEVICE, "out_altvoltage0_1A_phase", ValueKind::Double),
    AttributePath::new(DAC_DEVICE, "out_altvoltage1_1B_phase", ValueKind::Double),
    AttributePath::new(DAC_DEVICE, "out_altvoltage2_2A_phase", ValueKind::Double),
    AttributePath::new(DAC_DEVICE, "out_altvoltage3_2B_phase", ValueKind::Double),
];

/// Pseudo-attributes owned by the DAC data manager, applied in this order.
pub const DAQ2_DRIVER_ATTRIBS: &[&str] = &[
    "dds_mode",
    "tx_channel_0",
    "tx_channel_1",
    "dac_buf_filename",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Uninitialized,
    Identified,
    Initialized,
    Active,
    Destroyed,
}

/// Everything acquired by `init` and released together by `destroy`.
struct Daq2Instance {
    // Dropped before the context it reads from.
    manager: DacDataManager,
    rx: BindingTable,
    tx: BindingTable,
    panel: Panel,
    layout_path: PathBuf,
    adc: DeviceHandle,
    dac: DeviceHandle,
    ctx: Box<dyn HardwareContext>,
}

impl Daq2Instance {
    /// Re-reads every bound control from the hardware.
    fn refresh(&mut self) {
        let ctx = self.ctx.as_ref();
        self.rx.pull_all(ctx);
        self.tx.pull_all(ctx);
        self.manager.update_iio_widgets(ctx);
    }

    /// DAC sample rate in whole MHz, or `None` when it cannot be read.
    fn tx_sampling_mhz(&self) -> Option<f64> {
        let ctx = self.ctx.as_ref();
        let ch0 = ctx.find_channel(&self.dac, "altvoltage0", true)?;
        let raw = ctx.channel_attr_read(&ch0, "sampling_frequency").ok()?;
        let hz = osc_core::registry::parse_longlong(&raw)?;
        Some((hz / MHZ_SCALE) as f64)
    }
}

pub struct Daq2Plugin {
    state: PluginState,
    can_update_widgets: bool,
    instance: Option<Daq2Instance>,
}

impl Default for Daq2Plugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Daq2Plugin {
    pub fn new() -> Self {
        Self {
            state: PluginState::Uninitialized,
            can_update_widgets: false,
            instance: None,
        }
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    /// True once `init` has finished and until `destroy`.
    pub fn can_update_widgets(&self) -> bool {
        self.can_update_widgets
    }

    pub fn manager(&self) -> Option<&DacDataManager> {
        self.instance.as_ref().map(|inst| &inst.manager)
    }

    pub fn rx(&self) -> Option<&BindingTable> {
        self.instance.as_ref().map(|inst| &inst.rx)
    }

    pub fn tx(&self) -> Option<&BindingTable> {
        self.instance.as_ref().map(|inst| &inst.tx)
    }

    pub fn panel(&self) -> Option<&Panel> {
        self.instance.as_ref().map(|inst| &inst.panel)
    }

    pub fn layout_path(&self) -> Option<&Path> {
        self.instance.as_ref().map(|inst| inst.layout_path.as_path())
    }

    /// Looks a control up in the rx, tx and DDS tone tables.
    pub fn control(&self, id: &str) -> Option<&Control> {
        let inst = self.instance.as_ref()?;
        inst.rx
            .control(id)
            .or_else(|| inst.tx.control(id))
            .or_else(|| inst.manager.tones().control(id))
    }

    /// Forwards a UI event to whichever table owns the control.
    pub fn handle_event(&mut self, id: &str, event: ControlEvent) -> Result<PushOutcome, PluginError> {
        let inst = self.instance.as_mut().ok_or(PluginError::NotInitialized)?;
        let ctx = inst.ctx.as_ref();
        let outcome = if inst.rx.control(id).is_some() {
            inst.rx.handle_event(ctx, id, event)?
        } else if inst.tx.control(id).is_some() {
            inst.tx.handle_event(ctx, id, event)?
        } else {
            inst.manager.handle_event(ctx, id, event)?
        };
        Ok(outcome)
    }

    /// Sets a control's value as the user would and fires its trigger.
    pub fn interact(&mut self, id: &str, value: ControlValue) -> Result<PushOutcome, PluginError> {
        let inst = self.instance.as_mut().ok_or(PluginError::NotInitialized)?;
        let ctx = inst.ctx.as_ref();
        let outcome = if inst.rx.control(id).is_some() {
            inst.rx.interact(ctx, id, value)?
        } else if inst.tx.control(id).is_some() {
            inst.tx.interact(ctx, id, value)?
        } else {
            inst.manager.interact(ctx, id, value)?
        };
        Ok(outcome)
    }

    fn acquire(host: &dyn PluginHost) -> Result<Daq2Instance, PluginError> {
        let ctx = host.create_context()?;
        let dac = ctx
            .find_device(DAC_DEVICE)
            .ok_or_else(|| ContextError::DeviceNotFound(DAC_DEVICE.to_string()))?;
        let adc = ctx
            .find_device(ADC_DEVICE)
            .ok_or_else(|| ContextError::DeviceNotFound(ADC_DEVICE.to_string()))?;

        let manager = DacDataManager::new(ctx.as_ref(), &dac)?;

        let candidates = host.settings().layout_candidates(LAYOUT_FILE);
        let (layout, layout_path) = Layout::load_first(&candidates)?;
        log::debug!("{THIS_DRIVER}: layout loaded from {}", layout_path.display());

        let mut panel = Panel::from_layout(&layout);
        panel.attach(DDS_CONTAINER, manager.gui_container())?;

        let rx = layout.build_bindings(ctx.as_ref(), BindingGroup::Rx, &adc);
        let tx = layout.build_bindings(ctx.as_ref(), BindingGroup::Tx, &dac);

        Ok(Daq2Instance {
            manager,
            rx,
            tx,
            panel,
            layout_path,
            adc,
            dac,
            ctx,
        })
    }
}

impl OscPlugin for Daq2Plugin {
    fn name(&self) -> &str {
        THIS_DRIVER
    }

    fn identify(&mut self, host: &dyn PluginHost) -> bool {
        let ctx = host.context();
        let found = ctx.find_device(DAC_DEVICE).is_some() && ctx.find_device(ADC_DEVICE).is_some();
        if found && self.state == PluginState::Uninitialized {
            self.state = PluginState::Identified;
        }
        found
    }

    fn init(&mut self, host: &dyn PluginHost, profile: Option<&Path>) -> Result<&Panel, PluginError> {
        match self.state {
            PluginState::Uninitialized | PluginState::Identified => {}
            PluginState::Initialized | PluginState::Active => {
                return Err(PluginError::AlreadyInitialized)
            }
            PluginState::Destroyed => return Err(PluginError::Destroyed),
        }

        // Anything acquired so far is dropped on the error path.
        let mut inst = Self::acquire(host).map_err(|err| {
            log::error!("{THIS_DRIVER}: init failed: {err}");
            err
        })?;
        self.state = PluginState::Initialized;
        self.can_update_widgets = false;

        if let Some(path) = profile {
            inst.load_profile(path, false);
        }

        inst.rx.connect_signals();
        inst.tx.connect_signals();

        let tx_sampling_mhz = inst.tx_sampling_mhz().unwrap_or(0.0);
        inst.manager.freq_widgets_range_update(tx_sampling_mhz / 2.0);

        inst.refresh();

        inst.manager
            .set_buffer_chooser_current_folder(&host.settings().waveform_dir);
        inst.panel.set_block_diagram(&BLOCK_DIAGRAM);

        self.can_update_widgets = true;
        self.state = PluginState::Active;
        log::info!(
            "{THIS_DRIVER}: ready ({} rx, {} tx, {} tone controls)",
            inst.rx.len(),
            inst.tx.len(),
            inst.manager.tones().len()
        );
        Ok(&self.instance.insert(inst).panel)
    }

    fn handle_item(&mut self, line: usize, attrib: &str, value: &str) -> Result<(), PluginError> {
        let ready = self.can_update_widgets;
        let inst = self.instance.as_mut().ok_or(PluginError::NotInitialized)?;
        if let Some(result) = default_handle(inst.ctx.as_ref(), line, attrib, value) {
            return result;
        }
        inst.handle_driver(attrib, value, ready)
            .map_err(|err| match err {
                DriverError::UnknownAttribute(attr) => PluginError::UnknownAttribute { line, attr },
                other => PluginError::Attribute {
                    line,
                    attr: attrib.to_string(),
                    reason: other.to_string(),
                },
            })
    }

    fn save_profile(&mut self, path: &Path) {
        match &self.instance {
            Some(inst) => inst.save_profile(path),
            None => log::warn!("{THIS_DRIVER}: not initialized, profile not saved"),
        }
    }

    fn load_profile(&mut self, path: &Path) {
        let ready = self.can_update_widgets;
        match &mut self.instance {
            Some(inst) => inst.load_profile(path, ready),
            None => log::warn!("{THIS_DRIVER}: not initialized, profile not loaded"),
        }
    }

    fn destroy(&mut self, path: &Path) {
        if let Some(inst) = self.instance.take() {
            inst.save_profile(path);
            let Daq2Instance { manager, ctx, .. } = inst;
            drop(manager);
            drop(ctx);
        }
        self.can_update_widgets = false;
        self.state = PluginState::Destroyed;
        log::debug!("{THIS_DRIVER}: destroyed");
    }
}
