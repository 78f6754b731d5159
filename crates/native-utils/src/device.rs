use anyhow::Context;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the named input device, or the host's default input when no name
/// is given.
pub fn get_or_default_input(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    let target = match device_name {
        Some(name) => name,
        None => host
            .default_input_device()
            .context("No default input device")?
            .name()?,
    };

    host.input_devices()?
        .find(|device| device.name().is_ok_and(|name| name == target))
        .ok_or_else(|| anyhow::anyhow!("No target device found: {}", target))
}

//does the same as the input device above
pub fn get_or_default_output(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();
    let target = match device_name {
        Some(name) => name,
        None => host
            .default_output_device()
            .context("No default output device")?
            .name()?,
    };

    host.output_devices()?
        .find(|device| device.name().is_ok_and(|name| name == target))
        .ok_or_else(|| anyhow::anyhow!("No target device found: {}", target))
}

fn describe(name: &str, channels: u16, sample_rate: u32, default_name: Option<&str>) -> String {
    let mut d = format!(" * {}({}ch, {}hz)", name, channels, sample_rate);
    if default_name == Some(name) {
        d.push_str(" [default]");
    }
    d
}

/// One line per input device with its default channel count and rate.
pub fn get_available_inputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_device = host.default_input_device().and_then(|d| d.name().ok());

    let mut device_names: Vec<String> = Vec::new();
    for in_device in host.input_devices().context("No input devices found")? {
        let Ok(d_name) = in_device.name() else {
            continue;
        };
        match in_device.default_input_config() {
            Ok(d_cfg) => device_names.push(describe(
                &d_name,
                d_cfg.channels(),
                d_cfg.sample_rate().0,
                default_device.as_deref(),
            )),
            Err(e) => tracing::debug!("Skipping input {}: {}", d_name, e),
        }
    }
    Ok(device_names.join("\n"))
}

//does the same as the input function above
pub fn get_available_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_device = host.default_output_device().and_then(|d| d.name().ok());

    let mut device_names: Vec<String> = Vec::new();
    for out_device in host.output_devices().context("No output devices found")? {
        let Ok(d_name) = out_device.name() else {
            continue;
        };
        match out_device.default_output_config() {
            Ok(d_cfg) => device_names.push(describe(
                &d_name,
                d_cfg.channels(),
                d_cfg.sample_rate().0,
                default_device.as_deref(),
            )),
            Err(e) => tracing::debug!("Skipping output {}: {}", d_name, e),
        }
    }
    Ok(device_names.join("\n"))
}
