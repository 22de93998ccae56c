use crate::plugin::PluginHost;
use crate::settings::OscSettings;
use iio_context::{ContextError, HardwareContext, SimContext};

/// Host backed by simulated hardware.
pub struct SimHost {
    context: SimContext,
    settings: OscSettings,
}

impl SimHost {
    pub fn new(context: SimContext, settings: OscSettings) -> Self {
        Self { context, settings }
    }

    pub fn sim(&self) -> &SimContext {
        &self.context
    }

    pub fn settings_mut(&mut self) -> &mut OscSettings {
        &mut self.settings
    }
}

impl PluginHost for SimHost {
    fn context(&self) -> &dyn HardwareContext {
        &self.context
    }

    fn create_context(&self) -> Result<Box<dyn HardwareContext>, ContextError> {
        Ok(Box::new(self.context.open_private()))
    }

    fn settings(&self) -> &OscSettings {
        &self.settings
    }
}
