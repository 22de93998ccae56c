use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "osc", version, about = "IIO oscilloscope plugin host")]
pub struct Cli {
    /// Simulated hardware description (TOML, or JSON by extension)
    #[arg(long)]
    pub hw: PathBuf,
    /// Host settings file
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Overrides the layout directory from the settings
    #[arg(long)]
    pub layout_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check whether the DAQ2 devices are present
    Identify,
    /// Initialize the DAQ2 plugin and print its controls
    Run {
        /// Profile applied during init
        #[arg(long)]
        profile: Option<PathBuf>,
        /// Destroy the plugin afterwards, saving its state here
        #[arg(long)]
        save: Option<PathBuf>,
        /// Send SYNC_RELOAD once the plugin is up
        #[arg(long)]
        reload: bool,
    },
    /// Replay the [DAQ2] section of a profile item by item
    Handle {
        profile: PathBuf,
    },
    /// List every attribute of the hardware with its current value
    Dump,
}
