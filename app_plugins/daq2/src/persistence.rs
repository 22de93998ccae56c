use crate::{
    Daq2Instance, DAQ2_DRIVER_ATTRIBS, DAQ2_SR_ATTRIBS, DDS_GROUP, MAX_TX_CHANNELS, THIS_DRIVER,
};
use osc_core::{save_to_profile, update_from_profile};
use profile::{Profile, ProfileError, ProfileWriter};
use std::path::Path;

impl Daq2Instance {
    pub(crate) fn load_profile(&mut self, path: &Path, ready: bool) {
        match Profile::load(path) {
            Ok(profile) => self.apply_profile(&profile, ready),
            Err(err) => log::warn!("{THIS_DRIVER}: cannot read {}: {err}", path.display()),
        }
    }

    /// Driver keys first, in their fixed order, then the plain attributes.
    pub(crate) fn apply_profile(&mut self, profile: &Profile, ready: bool) {
        for key in DAQ2_DRIVER_ATTRIBS {
            let Some(value) = profile.get(THIS_DRIVER, key) else {
                continue;
            };
            if let Err(err) = self.handle_driver(key, value, ready) {
                log::warn!("{THIS_DRIVER}: {key} = {value}: {err}");
            }
        }

        let ctx = self.ctx.as_ref();
        for device in [&self.dac, &self.adc] {
            let report = update_from_profile(ctx, profile, THIS_DRIVER, device, DAQ2_SR_ATTRIBS);
            log::debug!("{THIS_DRIVER}: {} {report:?}", device.name());
        }

        if ready {
            self.refresh();
        }
    }

    /// Appends the current state as a new `[DAQ2]` section.
    pub(crate) fn save_profile(&self, path: &Path) {
        let writer = match ProfileWriter::append(path) {
            Ok(writer) => writer,
            Err(err) => {
                log::warn!("{THIS_DRIVER}: cannot open {}: {err}", path.display());
                return;
            }
        };
        if let Err(err) = self.write_profile(writer) {
            log::warn!("{THIS_DRIVER}: saving {} failed: {err}", path.display());
        }
    }

    fn write_profile(&self, mut writer: ProfileWriter) -> Result<(), ProfileError> {
        let ctx = self.ctx.as_ref();
        save_to_profile(&mut writer, Some(THIS_DRIVER), ctx, &self.dac, DAQ2_SR_ATTRIBS)?;
        save_to_profile(&mut writer, None, ctx, &self.adc, DAQ2_SR_ATTRIBS)?;

        let mode = self
            .manager
            .dds_mode(DDS_GROUP)
            .map(|mode| mode.as_i32())
            .unwrap_or_default();
        writer.entry("dds_mode", &mode.to_string())?;

        let filename = self
            .manager
            .buffer_chooser_filename()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        writer.entry("dac_buf_filename", &filename)?;

        for index in 0..MAX_TX_CHANNELS {
            match self.manager.tx_channel_state(index) {
                Ok(enabled) => {
                    writer.entry(&format!("tx_channel_{index}"), &i32::from(enabled).to_string())?
                }
                Err(err) => log::debug!("{THIS_DRIVER}: tx_channel_{index} not saved: {err}"),
            }
        }
        writer.finish()
    }
}
