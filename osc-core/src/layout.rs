//! Declarative panel layouts.
//!
//! A layout names the panel, its containers and every control, and tells
//! which hardware attribute each control is bound to.

use crate::binding::{Adapter, BindTarget, BindingGroup, BindingTable, Control, ControlKind};
use crate::registry::ValueKind;
use iio_context::{AttrTarget, DeviceHandle, HardwareContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum LayoutError {
    #[error("failed to read layout '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse layout: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no usable layout found (tried {tried:?})")]
    NoLayout { tried: Vec<PathBuf> },
    #[error("unknown layout element: {0}")]
    UnknownElement(String),
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSpec {
    pub id: String,
    pub kind: String,
    pub group: BindingGroup,
    #[serde(default)]
    pub bind: Option<BindTarget>,
    #[serde(default)]
    pub value: ValueKind,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub precision: Option<usize>,
    #[serde(default)]
    pub truncate: bool,
    #[serde(default)]
    pub progress: bool,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub options: Vec<String>,
    /// Attribute next to the bound one listing the combo box choices.
    #[serde(default)]
    pub options_attr: Option<String>,
}

impl ControlSpec {
    pub fn control_kind(&self) -> ControlKind {
        match self.kind.as_str() {
            "check_button" => ControlKind::CheckButton,
            "toggle_button" => ControlKind::ToggleButton,
            "spin_button" => ControlKind::SpinButton {
                progress: self.progress,
                min: self.min.unwrap_or(f64::MIN),
                max: self.max.unwrap_or(f64::MAX),
            },
            "combo_box_text" => ControlKind::ComboBoxText {
                options: self.options.clone(),
            },
            "text_view" => ControlKind::TextView,
            other => ControlKind::Unsupported(other.to_string()),
        }
    }

    pub fn adapter(&self) -> Adapter {
        Adapter {
            kind: self.value,
            scale: self.scale,
            precision: self.precision,
            truncate: self.truncate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub panel: String,
    #[serde(default)]
    pub containers: Vec<String>,
    #[serde(default)]
    pub controls: Vec<ControlSpec>,
}

impl std::str::FromStr for Layout {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

impl Layout {
    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        let data = std::fs::read_to_string(path).map_err(|source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        data.parse()
    }

    /// Loads the first candidate that reads and parses cleanly.
    pub fn load_first(candidates: &[PathBuf]) -> Result<(Self, PathBuf), LayoutError> {
        for path in candidates {
            match Self::load(path) {
                Ok(layout) => return Ok((layout, path.clone())),
                Err(err) => log::debug!("layout candidate skipped: {err}"),
            }
        }
        Err(LayoutError::NoLayout {
            tried: candidates.to_vec(),
        })
    }

    pub fn control(&self, id: &str) -> Option<&ControlSpec> {
        self.controls.iter().find(|c| c.id == id)
    }

    /// Builds the bindings of one group for the controls bound to `device`.
    ///
    /// Controls whose attribute does not exist on the hardware are left out.
    pub fn build_bindings(
        &self,
        ctx: &dyn HardwareContext,
        group: BindingGroup,
        device: &DeviceHandle,
    ) -> BindingTable {
        let mut table = BindingTable::new();
        for spec in self.controls.iter().filter(|c| c.group == group) {
            let Some(bind) = spec.bind.as_ref().filter(|b| b.device == device.name()) else {
                continue;
            };
            let Some(target) = bind.resolve(ctx, device) else {
                log::warn!(
                    "{}: attribute {}.{} not found, control left unbound",
                    spec.id,
                    bind.device,
                    bind.attr
                );
                continue;
            };
            let mut control = Control::new(spec.id.clone(), spec.control_kind());
            if let Some(options_attr) = &spec.options_attr {
                if let Some(options) = read_options(ctx, &target, options_attr) {
                    control.set_options(options);
                }
            }
            table.bind(
                format!("{}.{}", bind.device, bind.attr),
                target,
                control,
                spec.adapter(),
            );
        }
        table
    }
}

fn read_options(ctx: &dyn HardwareContext, target: &AttrTarget, attr: &str) -> Option<Vec<String>> {
    let sibling = match target {
        AttrTarget::Device(dev, _) => AttrTarget::Device(dev.clone(), attr.to_string()),
        AttrTarget::Channel(ch, _) => AttrTarget::Channel(ch.clone(), attr.to_string()),
        AttrTarget::SharedByType(channels, _) => {
            AttrTarget::SharedByType(channels.clone(), attr.to_string())
        }
    };
    match ctx.read_target(&sibling) {
        Ok(raw) => Some(raw.split_whitespace().map(str::to_string).collect()),
        Err(err) => {
            log::warn!("failed to read choices {attr}: {err}");
            None
        }
    }
}

/// The built panel: named containers and the block diagram it shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Panel {
    name: String,
    containers: BTreeMap<String, Vec<String>>,
    block_diagram: Vec<String>,
}

impl Panel {
    pub fn from_layout(layout: &Layout) -> Self {
        Self {
            name: layout.panel.clone(),
            containers: layout
                .containers
                .iter()
                .map(|c| (c.clone(), Vec::new()))
                .collect(),
            block_diagram: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attach(&mut self, container: &str, child: &str) -> Result<(), LayoutError> {
        let children = self
            .containers
            .get_mut(container)
            .ok_or_else(|| LayoutError::UnknownElement(container.to_string()))?;
        children.push(child.to_string());
        Ok(())
    }

    pub fn container(&self, id: &str) -> Option<&[String]> {
        self.containers.get(id).map(Vec::as_slice)
    }

    pub fn set_block_diagram(&mut self, images: &[&str]) {
        self.block_diagram = images.iter().map(|s| s.to_string()).collect();
    }

    pub fn block_diagram(&self) -> &[String] {
        &self.block_diagram
    }
}
