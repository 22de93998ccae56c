use crate::binding::BindingError;
use crate::dac_manager::ManagerError;
use crate::layout::{LayoutError, Panel};
use crate::settings::OscSettings;
use iio_context::{ContextError, DeviceHandle, HardwareContext};
use profile::Profile;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum PluginError {
    #[error("plugin is not initialized")]
    NotInitialized,
    #[error("plugin is already initialized")]
    AlreadyInitialized,
    #[error("plugin has been destroyed")]
    Destroyed,
    #[error("context error: {0}")]
    Context(#[from] ContextError),
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),
    #[error("DAC data manager error: {0}")]
    Manager(#[from] ManagerError),
    #[error("binding error: {0}")]
    Binding(#[from] BindingError),
    #[error("line {line}: unknown attribute '{attr}'")]
    UnknownAttribute { line: usize, attr: String },
    #[error("line {line}: {attr}: {reason}")]
    Attribute {
        line: usize,
        attr: String,
        reason: String,
    },
}

/// Services the host application offers to its plugins.
pub trait PluginHost {
    /// Context shared by the whole application, used for device detection.
    fn context(&self) -> &dyn HardwareContext;
    /// Opens a context the plugin owns for its whole lifetime.
    fn create_context(&self) -> Result<Box<dyn HardwareContext>, ContextError>;
    fn settings(&self) -> &OscSettings;
}

/// Entry points a plugin exposes to the host.
pub trait OscPlugin {
    fn name(&self) -> &str;
    /// Reports whether the hardware this plugin drives is present.
    ///
    /// Only looks at the host's shared context; the plugin records the result
    /// in its own lifecycle state and touches nothing else.
    fn identify(&mut self, host: &dyn PluginHost) -> bool;
    fn init(&mut self, host: &dyn PluginHost, profile: Option<&Path>)
        -> Result<&Panel, PluginError>;
    fn handle_item(&mut self, line: usize, attrib: &str, value: &str) -> Result<(), PluginError>;
    fn save_profile(&mut self, path: &Path);
    fn load_profile(&mut self, path: &Path);
    fn destroy(&mut self, path: &Path);
}

/// Splits `device.attr` against the devices the context knows.
pub fn split_device_attr<'a>(
    ctx: &dyn HardwareContext,
    attrib: &'a str,
) -> Option<(DeviceHandle, &'a str)> {
    ctx.devices().into_iter().find_map(|dev| {
        let attr = attrib
            .strip_prefix(dev.name())
            .and_then(|rest| rest.strip_prefix('.'))?;
        (!attr.is_empty()).then_some((dev, attr))
    })
}

/// Handles the profile items every plugin understands.
///
/// `device.attr` items are written straight to the hardware. Anything else
/// returns `None` and is left to the plugin's own driver handler.
pub fn default_handle(
    ctx: &dyn HardwareContext,
    line: usize,
    attrib: &str,
    value: &str,
) -> Option<Result<(), PluginError>> {
    let (device, attr) = split_device_attr(ctx, attrib)?;
    Some(
        ctx.attr_write(&device, attr, value.trim())
            .map_err(|err| PluginError::Attribute {
                line,
                attr: attrib.to_string(),
                reason: err.to_string(),
            }),
    )
}

#[derive(Debug, Default)]
pub struct HandleReport {
    pub handled: usize,
    pub failed: Vec<(usize, String)>,
}

/// Replays the plugin's section of a profile through `handle_item`, line by line.
///
/// Failures are collected and processing continues with the next line.
pub fn apply_section(plugin: &mut dyn OscPlugin, profile: &Profile) -> HandleReport {
    let section = plugin.name().to_string();
    let mut report = HandleReport::default();
    for entry in profile.section(&section) {
        match plugin.handle_item(entry.line, &entry.key, &entry.value) {
            Ok(()) => report.handled += 1,
            Err(err) => {
                log::warn!("[{section}] {err}");
                report.failed.push((entry.line, err.to_string()));
            }
        }
    }
    report
}
