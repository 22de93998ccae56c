//! Two-way binding between hardware attributes and on-screen controls.
//!
//! A binding is pulled (hardware -> control) on demand and pushed
//! (control -> hardware) when its control fires the one event that its kind
//! commits on. Spin buttons with a progress gesture hold their commits until
//! the gesture ends.

use crate::registry::{parse_longlong, ValueKind};
use iio_context::{parse_bool, AttrTarget, ContextError, DeviceHandle, HardwareContext};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingGroup {
    Rx,
    Tx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Toggled,
    ValueChanged,
    Changed,
    GestureBegin,
    GestureEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    CheckButton,
    ToggleButton,
    SpinButton { progress: bool, min: f64, max: f64 },
    ComboBoxText { options: Vec<String> },
    /// Display only, never commits.
    TextView,
    Unsupported(String),
}

impl ControlKind {
    /// The interaction that commits this kind of control to hardware.
    pub fn trigger(&self) -> Option<ControlEvent> {
        match self {
            ControlKind::CheckButton | ControlKind::ToggleButton => Some(ControlEvent::Toggled),
            ControlKind::SpinButton { .. } => Some(ControlEvent::ValueChanged),
            ControlKind::ComboBoxText { .. } => Some(ControlEvent::Changed),
            ControlKind::TextView | ControlKind::Unsupported(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ControlKind::CheckButton => "check_button",
            ControlKind::ToggleButton => "toggle_button",
            ControlKind::SpinButton { .. } => "spin_button",
            ControlKind::ComboBoxText { .. } => "combo_box_text",
            ControlKind::TextView => "text_view",
            ControlKind::Unsupported(name) => name,
        }
    }

    fn default_value(&self) -> ControlValue {
        match self {
            ControlKind::CheckButton | ControlKind::ToggleButton => ControlValue::Bool(false),
            ControlKind::SpinButton { min, max, .. } => ControlValue::Number(0.0_f64.max(*min).min(*max)),
            ControlKind::ComboBoxText { options } => {
                ControlValue::Choice(options.first().cloned().unwrap_or_default())
            }
            ControlKind::TextView | ControlKind::Unsupported(_) => ControlValue::Text(String::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlValue {
    Bool(bool),
    Number(f64),
    Choice(String),
    Text(String),
}

impl std::fmt::Display for ControlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlValue::Bool(v) => write!(f, "{v}"),
            ControlValue::Number(v) => write!(f, "{v}"),
            ControlValue::Choice(v) | ControlValue::Text(v) => write!(f, "{v}"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    #[error("unknown control: {0}")]
    UnknownControl(String),
    #[error("control {control} cannot hold '{value}'")]
    Mismatch { control: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    id: String,
    kind: ControlKind,
    value: ControlValue,
    gesture_active: bool,
    pending_commit: bool,
}

impl Control {
    pub fn new(id: impl Into<String>, kind: ControlKind) -> Self {
        let value = kind.default_value();
        Self {
            id: id.into(),
            kind,
            value,
            gesture_active: false,
            pending_commit: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ControlKind {
        &self.kind
    }

    pub fn value(&self) -> &ControlValue {
        &self.value
    }

    pub fn has_pending_commit(&self) -> bool {
        self.pending_commit
    }

    /// Changes the displayed value the way a user would. Spin buttons clamp to their range.
    pub fn set_value(&mut self, value: ControlValue) -> Result<(), BindingError> {
        let mismatch = |value: &ControlValue| BindingError::Mismatch {
            control: self.id.clone(),
            value: value.to_string(),
        };
        let value = match (&self.kind, value) {
            (ControlKind::CheckButton | ControlKind::ToggleButton, v @ ControlValue::Bool(_)) => v,
            (ControlKind::SpinButton { min, max, .. }, ControlValue::Number(n)) => {
                ControlValue::Number(n.max(*min).min(*max))
            }
            (ControlKind::ComboBoxText { options }, ControlValue::Choice(choice)) => {
                if !options.is_empty() && !options.contains(&choice) {
                    return Err(mismatch(&ControlValue::Choice(choice)));
                }
                ControlValue::Choice(choice)
            }
            (ControlKind::TextView, v @ ControlValue::Text(_)) => v,
            (ControlKind::Unsupported(_), v) => v,
            (_, v) => return Err(mismatch(&v)),
        };
        self.value = value;
        Ok(())
    }

    pub fn set_range(&mut self, new_min: f64, new_max: f64) {
        if let ControlKind::SpinButton { min, max, .. } = &mut self.kind {
            *min = new_min;
            *max = new_max;
        }
    }

    pub fn set_options(&mut self, new_options: Vec<String>) {
        if let ControlKind::ComboBoxText { options } = &mut self.kind {
            *options = new_options;
        }
    }

    fn supports_gesture(&self) -> bool {
        matches!(self.kind, ControlKind::SpinButton { progress: true, .. })
    }
}

/// Read/write adapter between a hardware value and what a control shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adapter {
    pub kind: ValueKind,
    /// Hardware units per displayed unit (1e6 shows Hz as MHz).
    pub scale: f64,
    pub precision: Option<usize>,
    /// Drop the fraction of the scaled value before display (Hz shown as whole MHz).
    pub truncate: bool,
}

impl Default for Adapter {
    fn default() -> Self {
        Self {
            kind: ValueKind::Double,
            scale: 1.0,
            precision: None,
            truncate: false,
        }
    }
}

impl Adapter {
    pub fn new(kind: ValueKind, scale: f64) -> Self {
        Self {
            kind,
            scale,
            precision: None,
            truncate: false,
        }
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn truncated(mut self) -> Self {
        self.truncate = true;
        self
    }

    fn scale(&self) -> f64 {
        if self.scale == 0.0 {
            1.0
        } else {
            self.scale
        }
    }

    fn to_control(&self, kind: &ControlKind, attr: &str, raw: &str) -> Result<ControlValue, ContextError> {
        let raw = raw.trim();
        let invalid = || ContextError::InvalidValue {
            attr: attr.to_string(),
            value: raw.to_string(),
        };
        Ok(match kind {
            ControlKind::CheckButton | ControlKind::ToggleButton => {
                ControlValue::Bool(parse_bool(attr, raw)?)
            }
            ControlKind::SpinButton { .. } => {
                let value = raw.parse::<f64>().map_err(|_| invalid())?;
                ControlValue::Number(value / self.scale())
            }
            ControlKind::ComboBoxText { .. } => ControlValue::Choice(raw.to_string()),
            ControlKind::TextView | ControlKind::Unsupported(_) => {
                let numeric = matches!(self.kind, ValueKind::Double | ValueKind::LongLong);
                match raw.parse::<f64>() {
                    Ok(value) if numeric => {
                        let mut shown = value / self.scale();
                        if self.truncate {
                            shown = shown.trunc();
                        }
                        match self.precision {
                            Some(precision) => ControlValue::Text(format!("{shown:.precision$}")),
                            None => ControlValue::Text(shown.to_string()),
                        }
                    }
                    _ => ControlValue::Text(raw.to_string()),
                }
            }
        })
    }

    fn to_hardware(&self, value: &ControlValue) -> Option<String> {
        match value {
            ControlValue::Bool(v) => Some(if *v { "1" } else { "0" }.to_string()),
            ControlValue::Number(n) => {
                let raw = n * self.scale();
                Some(match self.kind {
                    ValueKind::LongLong => (raw.round() as i64).to_string(),
                    ValueKind::Bool => (if raw != 0.0 { "1" } else { "0" }).to_string(),
                    ValueKind::Double | ValueKind::Text => raw.to_string(),
                })
            }
            ControlValue::Choice(s) | ControlValue::Text(s) => match self.kind {
                ValueKind::LongLong => parse_longlong(s).map(|v| v.to_string()),
                _ => Some(s.clone()),
            },
        }
    }
}

/// Unresolved address of a bound attribute, as written in a layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindTarget {
    pub device: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub output: bool,
    pub attr: String,
}

impl BindTarget {
    pub fn resolve(&self, ctx: &dyn HardwareContext, device: &DeviceHandle) -> Option<AttrTarget> {
        match &self.channel {
            Some(channel) => {
                let ch = ctx.find_channel(device, channel, self.output)?;
                ctx.channel_attrs(&ch)
                    .iter()
                    .any(|a| *a == self.attr)
                    .then(|| AttrTarget::Channel(ch, self.attr.clone()))
            }
            None => ctx.resolve_attr(device, &self.attr),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WidgetBinding {
    name: String,
    target: AttrTarget,
    control: Control,
    adapter: Adapter,
    live: bool,
    pulls: u64,
}

impl WidgetBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &AttrTarget {
        &self.target
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn pull_count(&self) -> u64 {
        self.pulls
    }

    fn pull(&mut self, ctx: &dyn HardwareContext) -> bool {
        self.pulls += 1;
        let result = ctx
            .read_target(&self.target)
            .and_then(|raw| self.adapter.to_control(&self.control.kind, &self.name, &raw));
        match result {
            Ok(value) => {
                self.control.value = value;
                true
            }
            Err(err) => {
                log::warn!("failed to read {}: {err}", self.name);
                if matches!(self.control.kind, ControlKind::TextView) {
                    self.control.value = ControlValue::Text("error".to_string());
                }
                false
            }
        }
    }

    fn push(&mut self, ctx: &dyn HardwareContext) -> PushOutcome {
        let Some(raw) = self.adapter.to_hardware(&self.control.value) else {
            let err = ContextError::InvalidValue {
                attr: self.name.clone(),
                value: self.control.value.to_string(),
            };
            log::warn!("failed to write {}: {err}", self.name);
            return PushOutcome::Failed(err);
        };
        match ctx.write_target(&self.target, &raw) {
            Ok(()) => PushOutcome::Written,
            Err(err) => {
                log::warn!("failed to write {} = {raw}: {err}", self.name);
                PushOutcome::Failed(err)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Written,
    /// Held back until the running gesture ends.
    Deferred,
    Ignored,
    Failed(ContextError),
}

/// Ordered collection of bindings owned by one panel.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: Vec<WidgetBinding>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WidgetBinding> {
        self.bindings.iter()
    }

    pub fn bind(
        &mut self,
        name: impl Into<String>,
        target: AttrTarget,
        control: Control,
        adapter: Adapter,
    ) -> usize {
        self.bindings.push(WidgetBinding {
            name: name.into(),
            target,
            control,
            adapter,
            live: false,
            pulls: 0,
        });
        self.bindings.len() - 1
    }

    pub fn binding(&self, control_id: &str) -> Option<&WidgetBinding> {
        self.bindings.iter().find(|b| b.control.id == control_id)
    }

    pub fn control(&self, control_id: &str) -> Option<&Control> {
        self.binding(control_id).map(|b| &b.control)
    }

    pub fn control_mut(&mut self, control_id: &str) -> Option<&mut Control> {
        self.bindings
            .iter_mut()
            .find(|b| b.control.id == control_id)
            .map(|b| &mut b.control)
    }

    /// Registers every binding for live push updates.
    ///
    /// Controls without a commit event stay pull-only; unrecognised kinds are
    /// reported. Returns how many bindings went live.
    pub fn connect_signals(&mut self) -> usize {
        let mut live = 0;
        for binding in &mut self.bindings {
            match binding.control.kind.trigger() {
                Some(_) => {
                    binding.live = true;
                    live += 1;
                }
                None => {
                    if let ControlKind::Unsupported(_) = binding.control.kind {
                        log::warn!("unhandled widget type, attribute: {}", binding.name);
                    }
                    binding.live = false;
                }
            }
        }
        live
    }

    /// Refreshes every control from hardware. Returns how many reads succeeded.
    pub fn pull_all(&mut self, ctx: &dyn HardwareContext) -> usize {
        self.bindings
            .iter_mut()
            .map(|b| b.pull(ctx))
            .filter(|ok| *ok)
            .count()
    }

    pub fn handle_event(
        &mut self,
        ctx: &dyn HardwareContext,
        control_id: &str,
        event: ControlEvent,
    ) -> Result<PushOutcome, BindingError> {
        let binding = self
            .bindings
            .iter_mut()
            .find(|b| b.control.id == control_id)
            .ok_or_else(|| BindingError::UnknownControl(control_id.to_string()))?;

        if !binding.live {
            return Ok(PushOutcome::Ignored);
        }

        match event {
            ControlEvent::GestureBegin => {
                if binding.control.supports_gesture() {
                    binding.control.gesture_active = true;
                }
                Ok(PushOutcome::Ignored)
            }
            ControlEvent::GestureEnd => {
                if !binding.control.gesture_active {
                    return Ok(PushOutcome::Ignored);
                }
                binding.control.gesture_active = false;
                if std::mem::take(&mut binding.control.pending_commit) {
                    Ok(binding.push(ctx))
                } else {
                    Ok(PushOutcome::Ignored)
                }
            }
            event if binding.control.kind.trigger() == Some(event) => {
                if binding.control.gesture_active {
                    binding.control.pending_commit = true;
                    Ok(PushOutcome::Deferred)
                } else {
                    Ok(binding.push(ctx))
                }
            }
            _ => Ok(PushOutcome::Ignored),
        }
    }

    /// Sets a control's value and fires its commit event, as a user edit would.
    pub fn interact(
        &mut self,
        ctx: &dyn HardwareContext,
        control_id: &str,
        value: ControlValue,
    ) -> Result<PushOutcome, BindingError> {
        let control = self
            .control_mut(control_id)
            .ok_or_else(|| BindingError::UnknownControl(control_id.to_string()))?;
        control.set_value(value)?;
        let trigger = control.kind.trigger();
        match trigger {
            Some(event) => self.handle_event(ctx, control_id, event),
            None => Ok(PushOutcome::Ignored),
        }
    }
}
