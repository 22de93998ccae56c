use daq2_plugin::Daq2Plugin;
use iio_context::HardwareContext;
use osc_core::{BindingTable, HandleReport, Panel};

pub fn print_info(message: &str) {
    println!("[OSC][INFO] {message}");
}

pub fn print_error(message: &str) {
    eprintln!("[OSC][ERROR]: {message}");
}

pub fn print_panel(panel: &Panel) {
    print_info(&format!("Panel {} ready", panel.name()));
    if !panel.block_diagram().is_empty() {
        println!("Block diagram: {}", panel.block_diagram().join(", "));
    }
}

fn print_table(group: &str, table: &BindingTable) {
    for binding in table.iter() {
        let control = binding.control();
        println!("[{group}] {} = {}", control.id(), control.value());
    }
}

pub fn print_controls(plugin: &Daq2Plugin) {
    let (Some(rx), Some(tx), Some(manager)) = (plugin.rx(), plugin.tx(), plugin.manager()) else {
        print_info("Plugin is not active");
        return;
    };
    print_table("rx", rx);
    print_table("tx", tx);
    print_table("dds", manager.tones());

    let mode = manager
        .dds_mode(1)
        .map(|mode| format!("{mode:?}"))
        .unwrap_or_else(|err| err.to_string());
    println!("dds_mode: {mode}");
    for index in 0..manager.tx_channel_count() {
        if let Ok(enabled) = manager.tx_channel_state(index) {
            println!("tx_channel_{index}: {}", if enabled { "on" } else { "off" });
        }
    }
    if let Some(path) = manager.buffer_chooser_filename() {
        println!("dac_buf_filename: {}", path.display());
    }
}

pub fn print_report(report: &HandleReport) {
    print_info(&format!("{} items handled", report.handled));
    for (line, reason) in &report.failed {
        print_error(&format!("line {line}: {reason}"));
    }
}

pub fn print_dump(ctx: &dyn HardwareContext) {
    let devices = ctx.devices();
    if devices.is_empty() {
        print_info("No devices found");
        return;
    }
    for device in devices {
        print_info(device.name());
        for attr in ctx.device_attrs(&device) {
            let value = ctx
                .device_attr_read(&device, &attr)
                .unwrap_or_else(|err| format!("<{err}>"));
            println!("\t{attr} = {value}");
        }
        for channel in ctx.channels(&device) {
            let direction = if channel.is_output() { "out" } else { "in" };
            let prefix = match channel.label() {
                Some(label) => format!("{direction}_{}_{label}", channel.id()),
                None => format!("{direction}_{}", channel.id()),
            };
            for attr in ctx.channel_attrs(&channel) {
                let value = ctx
                    .channel_attr_read(&channel, &attr)
                    .unwrap_or_else(|err| format!("<{err}>"));
                println!("\t{prefix}_{attr} = {value}");
            }
        }
    }
}
