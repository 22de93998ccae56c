use iio_context::{parse_bool, ContextError, DeviceHandle, HardwareContext};
use profile::{Profile, ProfileWriter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Double,
    LongLong,
    Bool,
    Text,
}

impl ValueKind {
    /// Parses `raw` as this kind and writes it to `filename`.
    pub fn write(
        self,
        ctx: &dyn HardwareContext,
        device: &DeviceHandle,
        filename: &str,
        raw: &str,
    ) -> Result<(), ContextError> {
        let invalid = || ContextError::InvalidValue {
            attr: filename.to_string(),
            value: raw.to_string(),
        };
        let raw = raw.trim();
        match self {
            ValueKind::Double => {
                let value = raw.parse::<f64>().map_err(|_| invalid())?;
                ctx.write_double(device, filename, value)
            }
            ValueKind::LongLong => {
                let value = parse_longlong(raw).ok_or_else(invalid)?;
                ctx.write_longlong(device, filename, value)
            }
            ValueKind::Bool => {
                let value = parse_bool(filename, raw)?;
                ctx.write_bool(device, filename, value)
            }
            ValueKind::Text => ctx.attr_write(device, filename, raw),
        }
    }

    /// Reads `filename` and formats it the way it is stored in a profile.
    pub fn read(
        self,
        ctx: &dyn HardwareContext,
        device: &DeviceHandle,
        filename: &str,
    ) -> Result<String, ContextError> {
        Ok(match self {
            ValueKind::Double => ctx.read_double(device, filename)?.to_string(),
            ValueKind::LongLong => ctx.read_longlong(device, filename)?.to_string(),
            ValueKind::Bool => {
                if ctx.read_bool(device, filename)? {
                    "1".to_string()
                } else {
                    "0".to_string()
                }
            }
            ValueKind::Text => ctx.attr_read(device, filename)?.trim().to_string(),
        })
    }
}

/// Integers are accepted in float notation as long as they carry no fraction.
pub fn parse_longlong(raw: &str) -> Option<i64> {
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.fract() == 0.0 && value.is_finite()).then_some(value as i64)
}

/// One scalar hardware setting, addressed as `device.attribute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributePath {
    pub device: &'static str,
    pub attr: &'static str,
    pub kind: ValueKind,
}

impl AttributePath {
    pub const fn new(device: &'static str, attr: &'static str, kind: ValueKind) -> Self {
        Self { device, attr, kind }
    }

    pub fn key(&self) -> String {
        format!("{}.{}", self.device, self.attr)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub written: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Writes every attribute of `device` found in `section` to the hardware.
///
/// Missing keys leave the hardware untouched. Bad values and rejected
/// writes are logged and counted.
pub fn update_from_profile(
    ctx: &dyn HardwareContext,
    profile: &Profile,
    section: &str,
    device: &DeviceHandle,
    paths: &[AttributePath],
) -> ApplyReport {
    let mut report = ApplyReport::default();
    for path in paths.iter().filter(|p| p.device == device.name()) {
        let key = path.key();
        let Some(value) = profile.get(section, &key) else {
            report.missing += 1;
            continue;
        };
        match path.kind.write(ctx, device, path.attr, value) {
            Ok(()) => report.written += 1,
            Err(err) => {
                log::warn!("failed to apply {key} = {value}: {err}");
                report.failed += 1;
            }
        }
    }
    report
}

/// Captures the current value of every attribute of `device`.
///
/// A section header is only written when `section` is given, so several
/// devices can share one section. Attributes that cannot be read are left out.
pub fn save_to_profile(
    writer: &mut ProfileWriter,
    section: Option<&str>,
    ctx: &dyn HardwareContext,
    device: &DeviceHandle,
    paths: &[AttributePath],
) -> std::io::Result<usize> {
    if let Some(name) = section {
        writer.section(name)?;
    }
    let mut saved = 0;
    for path in paths.iter().filter(|p| p.device == device.name()) {
        match path.kind.read(ctx, device, path.attr) {
            Ok(value) => {
                writer.entry(&path.key(), &value)?;
                saved += 1;
            }
            Err(err) => log::warn!("skipping {} while saving: {err}", path.key()),
        }
    }
    Ok(saved)
}
