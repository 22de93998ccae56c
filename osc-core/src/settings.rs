use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_LAYOUT_DIR: &str = "/usr/local/share/osc";
pub const DEFAULT_WAVEFORM_DIR: &str = "/usr/local/lib/osc/waveforms";

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Host-wide settings handed to every plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscSettings {
    /// Fallback directory searched for plugin layouts.
    pub layout_dir: PathBuf,
    /// Folder the buffer file chooser opens in.
    pub waveform_dir: PathBuf,
    /// Profile applied at startup and written back on exit.
    pub profile: Option<PathBuf>,
}

impl Default for OscSettings {
    fn default() -> Self {
        Self {
            layout_dir: PathBuf::from(DEFAULT_LAYOUT_DIR),
            waveform_dir: PathBuf::from(DEFAULT_WAVEFORM_DIR),
            profile: None,
        }
    }
}

impl OscSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let data = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&data)
    }

    pub fn from_toml(data: &str) -> Result<Self, SettingsError> {
        let settings: OscSettings = toml::from_str(data)?;
        Ok(settings.normalized())
    }

    pub fn normalized(mut self) -> Self {
        if self.layout_dir.as_os_str().is_empty() {
            self.layout_dir = PathBuf::from(DEFAULT_LAYOUT_DIR);
        }
        if self.waveform_dir.as_os_str().is_empty() {
            self.waveform_dir = PathBuf::from(DEFAULT_WAVEFORM_DIR);
        }
        if self
            .profile
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            self.profile = None;
        }
        self
    }

    /// Candidate locations of a layout file: the working directory first, then the layout dir.
    pub fn layout_candidates(&self, file_name: &str) -> Vec<PathBuf> {
        vec![PathBuf::from(file_name), self.layout_dir.join(file_name)]
    }
}
