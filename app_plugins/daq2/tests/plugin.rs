use daq2_plugin::{
    Daq2Plugin, DriverAttr, DriverError, PluginState, ADC_DEVICE, DAC_DEVICE, SYNC_RELOAD,
};
use iio_context::{ContextError, SimContext};
use osc_core::{
    apply_section, ControlValue, DdsMode, LayoutError, OscPlugin, OscSettings, PluginError,
    PushOutcome, SimHost,
};
use profile::Profile;
use std::path::{Path, PathBuf};

const FIXTURE: &str = include_str!("fixtures/daq2_sim.toml");

const ADC_ONLY: &str = r#"
[[devices]]
name = "axi-ad9680-hpc"

[[devices.channels]]
id = "voltage0"
attrs = { sampling_frequency = 1000000000 }
"#;

const DAC_ONLY: &str = r#"
[[devices]]
name = "axi-ad9144-hpc"

[[devices.channels]]
id = "altvoltage0"
label = "1A"
output = true
attrs = { frequency = 1000000 }
"#;

fn settings() -> OscSettings {
    OscSettings {
        layout_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/layout")),
        waveform_dir: PathBuf::from("/tmp/waveforms"),
        ..OscSettings::default()
    }
}

fn host_from(description: &str) -> SimHost {
    SimHost::new(SimContext::from_toml_str(description).unwrap(), settings())
}

fn host() -> SimHost {
    host_from(FIXTURE)
}

fn active(host: &SimHost, profile: Option<&Path>) -> Daq2Plugin {
    let mut plugin = Daq2Plugin::new();
    assert!(plugin.identify(host));
    plugin.init(host, profile).unwrap();
    plugin
}

fn write_profile(dir: &tempfile::TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("profile.ini");
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn identify_needs_both_converters() {
    let mut plugin = Daq2Plugin::new();
    assert!(!plugin.identify(&host_from(ADC_ONLY)));
    assert!(!plugin.identify(&host_from(DAC_ONLY)));
    assert_eq!(plugin.state(), PluginState::Uninitialized);

    let host = host();
    assert!(plugin.identify(&host));
    assert!(plugin.identify(&host));
    assert_eq!(plugin.state(), PluginState::Identified);
    assert_eq!(host.sim().write_count(), 0);
    assert_eq!(plugin.name(), "DAQ2");
}

#[test]
fn init_builds_the_panel() {
    let host = host();
    let mut plugin = Daq2Plugin::new();
    let panel = plugin.init(&host, None).unwrap();
    assert_eq!(panel.name(), "daq2_panel");
    assert_eq!(
        panel.container("dds_transmit_block").unwrap(),
        &["dac_data_manager".to_string()]
    );
    assert_eq!(panel.block_diagram().len(), 4);

    assert_eq!(plugin.state(), PluginState::Active);
    assert!(plugin.can_update_widgets());
    assert_eq!(host.sim().live_handles(), 2);
    assert!(plugin.layout_path().unwrap().ends_with("layout/daq2.layout.toml"));

    assert_eq!(
        plugin.control("text_view_adc_freq").unwrap().value(),
        &ControlValue::Text("1000.00".into())
    );
    assert_eq!(
        plugin.control("text_view_dac_freq").unwrap().value(),
        &ControlValue::Text("1000.00".into())
    );
    assert_eq!(
        plugin.control("adc_test_mode").unwrap().value(),
        &ControlValue::Choice("off".into())
    );

    let manager = plugin.manager().unwrap();
    assert_eq!(manager.tones().len(), 12);
    assert_eq!(
        manager.buffer_chooser_current_folder(),
        Some(Path::new("/tmp/waveforms"))
    );
    assert_eq!(host.sim().write_count(), 0);
}

#[test]
fn tone_frequency_is_bounded_by_half_the_dac_rate() {
    let host = host();
    let mut plugin = active(&host, None);
    let outcome = plugin
        .interact("tone_2A_frequency", ControlValue::Number(800.0))
        .unwrap();
    assert_eq!(outcome, PushOutcome::Written);
    assert_eq!(
        host.sim()
            .peek_channel(DAC_DEVICE, "altvoltage2", true, "frequency")
            .as_deref(),
        Some("500000000")
    );
}

#[test]
fn rate_displays_drop_fractional_megahertz() {
    let host = host_from(&FIXTURE.replace("1000000000", "983040000"));
    let mut plugin = active(&host, None);
    assert_eq!(
        plugin.control("text_view_adc_freq").unwrap().value(),
        &ControlValue::Text("983.00".into())
    );
    assert_eq!(
        plugin.control("text_view_dac_freq").unwrap().value(),
        &ControlValue::Text("983.00".into())
    );

    plugin
        .interact("tone_2A_frequency", ControlValue::Number(800.0))
        .unwrap();
    assert_eq!(
        host.sim()
            .peek_channel(DAC_DEVICE, "altvoltage2", true, "frequency")
            .as_deref(),
        Some("491500000")
    );
}

#[test]
fn ui_changes_reach_the_hardware() {
    let host = host();
    let mut plugin = active(&host, None);
    plugin
        .interact("adc_test_mode", ControlValue::Choice("checkerboard".into()))
        .unwrap();
    assert_eq!(
        host.sim()
            .peek_channel(ADC_DEVICE, "voltage0", false, "test_mode")
            .as_deref(),
        Some("checkerboard")
    );
    assert!(matches!(
        plugin.interact("no_such_control", ControlValue::Bool(true)),
        Err(PluginError::Binding(_))
    ));
}

#[test]
fn profile_given_to_init_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_profile(
        &dir,
        "[DAQ2]\n\
         dds_mode = 1\n\
         tx_channel_0 = 1\n\
         tx_channel_1 = 0\n\
         dac_buf_filename = /tmp/x.bin\n\
         axi-ad9144-hpc.out_altvoltage0_1A_frequency = 2000000\n",
    );
    let host = host();
    let plugin = active(&host, Some(&path));

    let manager = plugin.manager().unwrap();
    assert!(manager.tx_channel_state(0).unwrap());
    assert!(!manager.tx_channel_state(1).unwrap());
    assert_eq!(manager.dds_mode(1).unwrap(), DdsMode::OneTone);
    assert!(manager.buffer_chooser_filename().is_none());
    assert_eq!(
        host.sim()
            .peek_channel(DAC_DEVICE, "altvoltage0", true, "frequency")
            .as_deref(),
        Some("2000000")
    );
    assert_eq!(
        plugin.control("tone_1A_frequency").unwrap().value(),
        &ControlValue::Number(2.0)
    );
}

#[test]
fn buffer_filename_needs_buffer_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_profile(
        &dir,
        "[DAQ2]\ndds_mode = 4\ndac_buf_filename = /tmp/x.bin\n",
    );
    let host = host();
    let mut plugin = active(&host, Some(&path));
    let manager = plugin.manager().unwrap();
    assert_eq!(manager.dds_mode(1).unwrap(), DdsMode::Buffer);
    assert_eq!(
        manager.buffer_chooser_filename(),
        Some(Path::new("/tmp/x.bin"))
    );

    plugin.handle_item(1, "dds_mode", "2").unwrap();
    plugin.handle_item(2, "dac_buf_filename", "/tmp/y.bin").unwrap();
    assert_eq!(
        plugin.manager().unwrap().buffer_chooser_filename(),
        Some(Path::new("/tmp/x.bin"))
    );
}

#[test]
fn driver_values_accept_float_notation() {
    let host = host();
    let mut plugin = active(&host, None);
    plugin.handle_item(1, "dds_mode", "2.0").unwrap();
    plugin.handle_item(2, "tx_channel_1", "0.0").unwrap();

    let manager = plugin.manager().unwrap();
    assert_eq!(manager.dds_mode(1).unwrap(), DdsMode::TwoTones);
    assert!(!manager.tx_channel_state(1).unwrap());

    let err = plugin.handle_item(3, "dds_mode", "1.5").unwrap_err();
    assert!(matches!(err, PluginError::Attribute { line: 3, .. }));
    assert_eq!(
        plugin.manager().unwrap().dds_mode(1).unwrap(),
        DdsMode::TwoTones
    );
}

#[test]
fn unknown_attributes_change_nothing() {
    let host = host();
    let mut plugin = active(&host, None);
    host.sim().clear_log();

    let err = plugin.handle_item(7, "bogus_attr", "1").unwrap_err();
    assert!(matches!(
        err,
        PluginError::UnknownAttribute { line: 7, ref attr } if attr == "bogus_attr"
    ));

    let err = plugin.handle_item(8, "tx_channel_2", "0").unwrap_err();
    assert!(matches!(err, PluginError::Attribute { line: 8, .. }));

    let err = plugin.handle_item(9, "dds_mode", "9").unwrap_err();
    assert!(matches!(err, PluginError::Attribute { line: 9, .. }));

    let manager = plugin.manager().unwrap();
    assert_eq!(manager.dds_mode(1).unwrap(), DdsMode::OneTone);
    assert!(manager.tx_channel_state(0).unwrap());
    assert!(manager.tx_channel_state(1).unwrap());
    assert_eq!(host.sim().write_count(), 0);
}

#[test]
fn device_items_are_written_directly() {
    let host = host();
    let mut plugin = active(&host, None);
    plugin
        .handle_item(1, "axi-ad9144-hpc.out_altvoltage1_1B_scale", "0.125")
        .unwrap();
    assert_eq!(
        host.sim()
            .peek_channel(DAC_DEVICE, "altvoltage1", true, "scale")
            .as_deref(),
        Some("0.125")
    );
    let err = plugin
        .handle_item(2, "axi-ad9680-hpc.in_voltage_sampling_frequency", "5")
        .unwrap_err();
    assert!(matches!(err, PluginError::Attribute { line: 2, .. }));
}

#[test]
fn sync_reload_pulls_every_widget_once() {
    let host = host();
    let mut plugin = active(&host, None);
    let pulls = |plugin: &Daq2Plugin| -> Vec<u64> {
        let rx = plugin.rx().unwrap().iter();
        let tx = plugin.tx().unwrap().iter();
        let tones = plugin.manager().unwrap().tones().iter();
        rx.chain(tx).chain(tones).map(|b| b.pull_count()).collect()
    };
    let before = pulls(&plugin);
    host.sim().clear_log();

    plugin.handle_item(1, SYNC_RELOAD, "").unwrap();

    let after = pulls(&plugin);
    assert_eq!(before.len(), after.len());
    assert!(before.iter().zip(&after).all(|(b, a)| *a == b + 1));
    assert_eq!(host.sim().write_count(), 0);
}

#[test]
fn nothing_is_handled_outside_the_active_state() {
    let mut plugin = Daq2Plugin::new();
    assert!(matches!(
        plugin.handle_item(1, SYNC_RELOAD, ""),
        Err(PluginError::NotInitialized)
    ));

    let host = host();
    let dir = tempfile::tempdir().unwrap();
    plugin.init(&host, None).unwrap();
    assert!(matches!(
        plugin.init(&host, None),
        Err(PluginError::AlreadyInitialized)
    ));
    plugin.destroy(&dir.path().join("p.ini"));
    assert!(matches!(
        plugin.handle_item(1, SYNC_RELOAD, ""),
        Err(PluginError::NotInitialized)
    ));
    assert!(matches!(
        plugin.init(&host, None),
        Err(PluginError::Destroyed)
    ));
}

#[test]
fn missing_dac_rolls_back_init() {
    let host = host_from(ADC_ONLY);
    let mut plugin = Daq2Plugin::new();
    let err = plugin.init(&host, None).unwrap_err();
    assert!(matches!(
        err,
        PluginError::Context(ContextError::DeviceNotFound(ref dev)) if dev == DAC_DEVICE
    ));
    assert_eq!(host.sim().live_handles(), 1);
    assert!(plugin.manager().is_none());
    assert!(plugin.rx().is_none());
    assert!(plugin.tx().is_none());
    assert!(!plugin.can_update_widgets());
    assert_eq!(plugin.state(), PluginState::Uninitialized);
}

#[test]
fn missing_adc_rolls_back_init() {
    let host = host_from(DAC_ONLY);
    let mut plugin = Daq2Plugin::new();
    let err = plugin.init(&host, None).unwrap_err();
    assert!(matches!(
        err,
        PluginError::Context(ContextError::DeviceNotFound(ref dev)) if dev == ADC_DEVICE
    ));
    assert_eq!(host.sim().live_handles(), 1);
    assert!(plugin.manager().is_none());
}

#[test]
fn missing_layout_rolls_back_init() {
    let mut host = host();
    host.settings_mut().layout_dir = PathBuf::from("/nonexistent/osc");
    let mut plugin = Daq2Plugin::new();
    let err = plugin.init(&host, None).unwrap_err();
    assert!(matches!(err, PluginError::Layout(LayoutError::NoLayout { .. })));
    assert_eq!(host.sim().live_handles(), 1);
    assert!(plugin.panel().is_none());
}

#[test]
fn saved_profile_restores_the_same_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saved.ini");

    let host = host();
    let mut plugin = active(&host, None);
    plugin.handle_item(1, "dds_mode", "4").unwrap();
    plugin.handle_item(2, "dac_buf_filename", "/tmp/tone.bin").unwrap();
    plugin.handle_item(3, "tx_channel_1", "0").unwrap();
    plugin
        .handle_item(4, "axi-ad9144-hpc.out_altvoltage1_1B_frequency", "3000000")
        .unwrap();
    plugin.save_profile(&path);

    let saved = Profile::load(&path).unwrap();
    assert_eq!(saved.get("DAQ2", "dds_mode"), Some("4"));
    assert_eq!(saved.get("DAQ2", "dac_buf_filename"), Some("/tmp/tone.bin"));
    assert_eq!(saved.get("DAQ2", "tx_channel_0"), Some("1"));
    assert_eq!(saved.get("DAQ2", "tx_channel_1"), Some("0"));
    assert_eq!(
        saved.get("DAQ2", "axi-ad9144-hpc.out_altvoltage1_1B_frequency"),
        Some("3000000")
    );
    assert_eq!(
        saved.get("DAQ2", "axi-ad9680-hpc.in_voltage_sampling_frequency"),
        Some("1000000000")
    );

    let fresh = host_from(FIXTURE);
    let restored = active(&fresh, Some(&path));
    let manager = restored.manager().unwrap();
    assert_eq!(manager.dds_mode(1).unwrap(), DdsMode::Buffer);
    assert_eq!(
        manager.buffer_chooser_filename(),
        Some(Path::new("/tmp/tone.bin"))
    );
    assert!(manager.tx_channel_state(0).unwrap());
    assert!(!manager.tx_channel_state(1).unwrap());
    assert_eq!(
        fresh
            .sim()
            .peek_channel(DAC_DEVICE, "altvoltage1", true, "frequency")
            .as_deref(),
        Some("3000000")
    );
}

#[test]
fn load_then_save_keeps_every_value() {
    let dir = tempfile::tempdir().unwrap();
    let input = "[DAQ2]\n\
                 dds_mode = 4\n\
                 dac_buf_filename = /tmp/tone.bin\n\
                 tx_channel_0 = 0\n\
                 tx_channel_1 = 1\n\
                 axi-ad9144-hpc.out_altvoltage1_1B_frequency = 3000000\n\
                 axi-ad9144-hpc.out_altvoltage3_2B_scale = 0.25\n\
                 axi-ad9144-hpc.out_altvoltage0_1A_phase = 45000\n";
    let path = write_profile(&dir, input);
    let host = host();
    let mut plugin = active(&host, None);
    plugin.load_profile(&path);

    let out = dir.path().join("fresh.ini");
    plugin.save_profile(&out);

    let loaded = Profile::parse(input);
    let saved = Profile::load(&out).unwrap();
    for entry in loaded.section("DAQ2") {
        assert_eq!(
            saved.get("DAQ2", &entry.key),
            Some(entry.value.as_str()),
            "{}",
            entry.key
        );
    }
}

#[test]
fn saving_appends_a_new_section() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_profile(&dir, "[Other]\nkeep = me\n");

    let host = host();
    let mut plugin = active(&host, None);
    plugin.save_profile(&path);
    plugin.handle_item(1, "dds_mode", "0").unwrap();
    plugin.save_profile(&path);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("[Other]\nkeep = me\n"));
    assert_eq!(text.matches("[DAQ2]").count(), 2);

    let saved = Profile::load(&path).unwrap();
    assert_eq!(saved.get("Other", "keep"), Some("me"));
    assert_eq!(saved.get("DAQ2", "dds_mode"), Some("0"));
}

#[test]
fn unwritable_profile_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let mut plugin = active(&host, None);
    plugin.save_profile(&dir.path().join("missing").join("p.ini"));
    plugin.load_profile(&dir.path().join("absent.ini"));
    assert_eq!(plugin.state(), PluginState::Active);
}

#[test]
fn load_after_init_refreshes_widgets() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_profile(
        &dir,
        "[DAQ2]\naxi-ad9144-hpc.out_altvoltage3_2B_scale = 0.25\n",
    );
    let host = host();
    let mut plugin = active(&host, None);
    assert_eq!(
        plugin.control("tone_2B_scale").unwrap().value(),
        &ControlValue::Number(0.5)
    );
    plugin.load_profile(&path);
    assert_eq!(
        plugin.control("tone_2B_scale").unwrap().value(),
        &ControlValue::Number(0.25)
    );
}

#[test]
fn destroy_saves_and_releases_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exit.ini");
    let host = host();
    let mut plugin = active(&host, None);
    assert_eq!(host.sim().live_handles(), 2);

    plugin.destroy(&path);
    assert_eq!(plugin.state(), PluginState::Destroyed);
    assert!(!plugin.can_update_widgets());
    assert!(plugin.manager().is_none());
    assert_eq!(host.sim().live_handles(), 1);

    let saved = Profile::load(&path).unwrap();
    assert!(saved.has_section("DAQ2"));
    assert_eq!(saved.get("DAQ2", "dds_mode"), Some("1"));
}

#[test]
fn host_replays_the_plugin_section() {
    let host = host();
    let mut plugin = active(&host, None);
    let profile = Profile::parse(
        "[DAQ2]\n\
         dds_mode = 3\n\
         tx_channel_0 = 0\n\
         not_a_driver_key = 1\n\
         axi-ad9144-hpc.out_altvoltage0_1A_phase = 45000\n\
         [ADRV9009]\n\
         dds_mode = 0\n",
    );
    let report = apply_section(&mut plugin, &profile);
    assert_eq!(report.handled, 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 4);

    let manager = plugin.manager().unwrap();
    assert_eq!(manager.dds_mode(1).unwrap(), DdsMode::Independent);
    assert!(!manager.tx_channel_state(0).unwrap());
    assert_eq!(
        host.sim()
            .peek_channel(DAC_DEVICE, "altvoltage0", true, "phase")
            .as_deref(),
        Some("45000")
    );
}

#[test]
fn driver_attributes_parse() {
    assert_eq!(DriverAttr::parse("dds_mode").unwrap(), DriverAttr::DdsMode);
    assert_eq!(
        DriverAttr::parse("tx_channel_1").unwrap(),
        DriverAttr::TxChannel(1)
    );
    assert_eq!(
        DriverAttr::parse("tx_channel_2"),
        Err(DriverError::ChannelOutOfRange(2))
    );
    assert_eq!(
        DriverAttr::parse("tx_channel_x"),
        Err(DriverError::MalformedChannel("tx_channel_x".into()))
    );
    assert_eq!(
        DriverAttr::parse(SYNC_RELOAD).unwrap(),
        DriverAttr::SyncReload
    );
    assert_eq!(
        DriverAttr::parse("dac_buf"),
        Err(DriverError::UnknownAttribute("dac_buf".into()))
    );
    assert_eq!(DriverAttr::TxChannel(0).key(), "tx_channel_0");
}
