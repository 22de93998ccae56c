pub mod binding;
pub mod dac_manager;
pub mod host;
pub mod layout;
pub mod plugin;
pub mod registry;
pub mod settings;

pub use binding::{
    Adapter, BindTarget, BindingError, BindingGroup, BindingTable, Control, ControlEvent,
    ControlKind, ControlValue, PushOutcome, WidgetBinding,
};
pub use dac_manager::{DacDataManager, DdsMode, ManagerError};
pub use host::SimHost;
pub use layout::{Layout, LayoutError, Panel};
pub use plugin::{apply_section, default_handle, HandleReport, OscPlugin, PluginError, PluginHost};
pub use registry::{save_to_profile, update_from_profile, ApplyReport, AttributePath, ValueKind};
pub use settings::{OscSettings, SettingsError};
