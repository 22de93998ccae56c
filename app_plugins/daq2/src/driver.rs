use crate::{Daq2Instance, DDS_GROUP, MAX_TX_CHANNELS, SYNC_RELOAD};
use osc_core::registry::parse_longlong;
use osc_core::{DdsMode, ManagerError};

const TX_CHANNEL_PREFIX: &str = "tx_channel_";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),
    #[error("malformed tx channel attribute '{0}'")]
    MalformedChannel(String),
    #[error("tx channel {0} out of range, the board has {MAX_TX_CHANNELS}")]
    ChannelOutOfRange(usize),
    #[error("invalid value '{value}' for {attr}")]
    InvalidValue { attr: String, value: String },
    #[error(transparent)]
    Manager(#[from] ManagerError),
}

/// Profile keys handled by the plugin rather than written to hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverAttr {
    DdsMode,
    TxChannel(usize),
    BufFilename,
    SyncReload,
}

impl DriverAttr {
    pub fn parse(name: &str) -> Result<Self, DriverError> {
        match name {
            "dds_mode" => Ok(DriverAttr::DdsMode),
            "dac_buf_filename" => Ok(DriverAttr::BufFilename),
            SYNC_RELOAD => Ok(DriverAttr::SyncReload),
            _ => {
                let Some(index) = name.strip_prefix(TX_CHANNEL_PREFIX) else {
                    return Err(DriverError::UnknownAttribute(name.to_string()));
                };
                let index: usize = index
                    .parse()
                    .map_err(|_| DriverError::MalformedChannel(name.to_string()))?;
                if index >= MAX_TX_CHANNELS {
                    return Err(DriverError::ChannelOutOfRange(index));
                }
                Ok(DriverAttr::TxChannel(index))
            }
        }
    }

    pub fn key(&self) -> String {
        match self {
            DriverAttr::DdsMode => "dds_mode".to_string(),
            DriverAttr::TxChannel(index) => format!("{TX_CHANNEL_PREFIX}{index}"),
            DriverAttr::BufFilename => "dac_buf_filename".to_string(),
            DriverAttr::SyncReload => SYNC_RELOAD.to_string(),
        }
    }
}

/// Integer driver values, also written as `2.0` by some profile tools.
fn parse_int(attr: DriverAttr, value: &str) -> Result<i32, DriverError> {
    parse_longlong(value.trim())
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| DriverError::InvalidValue {
            attr: attr.key(),
            value: value.to_string(),
        })
}

impl Daq2Instance {
    /// Applies one driver key. Nothing is touched when the key is unknown.
    pub(crate) fn handle_driver(
        &mut self,
        attrib: &str,
        value: &str,
        ready: bool,
    ) -> Result<(), DriverError> {
        let attr = DriverAttr::parse(attrib)?;
        match attr {
            DriverAttr::DdsMode => {
                let mode = DdsMode::try_from(parse_int(attr, value)?)?;
                self.manager.set_dds_mode(DDS_GROUP, mode)?;
            }
            DriverAttr::TxChannel(index) => {
                let enabled = parse_int(attr, value)? != 0;
                self.manager.set_tx_channel_state(index, enabled)?;
            }
            DriverAttr::BufFilename => {
                // Only meaningful while the DAC plays a buffer.
                if self.manager.dds_mode(DDS_GROUP)? == DdsMode::Buffer {
                    self.manager.set_buffer_chooser_filename(value);
                } else {
                    log::debug!("ignoring dac_buf_filename outside buffer mode");
                }
            }
            DriverAttr::SyncReload => {
                if ready {
                    self.refresh();
                }
            }
        }
        Ok(())
    }
}
