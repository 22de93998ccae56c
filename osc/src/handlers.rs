use crate::commands::*;
use crate::output::*;
use daq2_plugin::{Daq2Plugin, SYNC_RELOAD};
use iio_context::SimContext;
use osc_core::{apply_section, OscPlugin, OscSettings, PluginHost, SimHost};
use profile::Profile;
use std::path::PathBuf;

pub fn handle_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let host = build_host(&cli)?;
    match cli.command {
        Commands::Identify => {
            let mut plugin = Daq2Plugin::new();
            if plugin.identify(&host) {
                print_info(&format!("{} hardware found", plugin.name()));
            } else {
                print_error(&format!("{} hardware not found", plugin.name()));
            }
        }
        Commands::Run {
            profile,
            save,
            reload,
        } => handle_run(&host, profile, save, reload)?,
        Commands::Handle { profile } => handle_profile(&host, profile)?,
        Commands::Dump => print_dump(host.sim()),
    }
    Ok(())
}

fn build_host(cli: &Cli) -> Result<SimHost, Box<dyn std::error::Error>> {
    let context = SimContext::from_file(&cli.hw)?;
    log::debug!("hardware description loaded from {}", cli.hw.display());
    let mut settings = match &cli.settings {
        Some(path) => OscSettings::load(path)?,
        None => OscSettings::default(),
    };
    if let Some(dir) = &cli.layout_dir {
        settings.layout_dir = dir.clone();
    }
    Ok(SimHost::new(context, settings))
}

fn start(host: &SimHost, profile: Option<PathBuf>) -> Option<Daq2Plugin> {
    let mut plugin = Daq2Plugin::new();
    if !plugin.identify(host) {
        print_error(&format!("{} hardware not found", plugin.name()));
        return None;
    }
    let profile = profile.or_else(|| host.settings().profile.clone());
    match plugin.init(host, profile.as_deref()) {
        Ok(panel) => print_panel(panel),
        Err(err) => {
            print_error(&format!("{} init failed: {err}", plugin.name()));
            return None;
        }
    }
    Some(plugin)
}

fn handle_run(
    host: &SimHost,
    profile: Option<PathBuf>,
    save: Option<PathBuf>,
    reload: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(mut plugin) = start(host, profile) else {
        return Ok(());
    };
    if reload {
        plugin.handle_item(0, SYNC_RELOAD, "")?;
    }
    print_controls(&plugin);
    if let Some(path) = save {
        plugin.destroy(&path);
        print_info(&format!("Profile saved to {}", path.display()));
    }
    Ok(())
}

fn handle_profile(host: &SimHost, path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let profile = Profile::load(&path)?;
    let Some(mut plugin) = start(host, None) else {
        return Ok(());
    };
    let report = apply_section(&mut plugin, &profile);
    print_report(&report);
    print_controls(&plugin);
    Ok(())
}
