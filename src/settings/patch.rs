//! Partial-update payloads for the settings singleton.
//!
//! Patches arrive as loose JSON objects so that "field omitted" can be told
//! apart from "field present". Each object is split against a static
//! allow-list: recognised fields are validated and typed, everything else is
//! returned to the caller as ignored.

use chrono::NaiveTime;
use serde_json::{Map, Value};

use crate::{
    db::models::SystemSettings,
    error::{ServiceError, ServiceResult},
};

/// Fields a user may change through `PATCH /settings`. `SettingsPatch`
/// accepts exactly these names.
pub const EDITABLE_FIELDS: &[&str] = &[
    "temperature_setpoint",
    "ac_timer_on",
    "ac_timer_off",
    "fan_4_speed_percent",
    "fan_2_speed_percent",
];

/// Fields only a device push may change. `DeviceStatusPatch` accepts exactly
/// these names.
pub const REPORTED_FIELDS: &[&str] = &[
    "fan_1_speed_percent",
    "fan_3_speed_percent",
    "fan_1_status",
    "fan_4_status",
    "pump_1_status",
    "peltier_1_status",
    "fan_3_status",
    "fan_2_status",
    "pump_2_status",
    "peltier_2_status",
];

pub const SETPOINT_MIN: f64 = -50.0;
pub const SETPOINT_MAX: f64 = 150.0;

/// A typed patch plus the names of the fields that were not accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<P> {
    pub patch: P,
    pub ignored: Vec<String>,
}

// ---------------------------------------------------------------------------
// SettingsPatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub temperature_setpoint: Option<f64>,
    pub ac_timer_on: Option<NaiveTime>,
    pub ac_timer_off: Option<NaiveTime>,
    pub fan_4_speed_percent: Option<i32>,
    pub fan_2_speed_percent: Option<i32>,
}

impl SettingsPatch {
    pub fn from_fields(fields: &Map<String, Value>) -> ServiceResult<Parsed<Self>> {
        let mut patch = Self::default();
        let mut ignored = Vec::new();

        for (name, value) in fields {
            if !EDITABLE_FIELDS.contains(&name.as_str()) {
                ignored.push(name.clone());
                continue;
            }
            match name.as_str() {
                "temperature_setpoint" => patch.temperature_setpoint = Some(setpoint(name, value)?),
                "ac_timer_on" => patch.ac_timer_on = Some(time_of_day(name, value)?),
                "ac_timer_off" => patch.ac_timer_off = Some(time_of_day(name, value)?),
                "fan_4_speed_percent" => patch.fan_4_speed_percent = Some(percent(name, value)?),
                "fan_2_speed_percent" => patch.fan_2_speed_percent = Some(percent(name, value)?),
                other => return Err(unhandled(other)),
            }
        }

        Ok(Parsed { patch, ignored })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copies every present field onto `settings`. Timestamps are left alone.
    pub fn apply_to(&self, settings: &mut SystemSettings) {
        if let Some(v) = self.temperature_setpoint {
            settings.temperature_setpoint = v;
        }
        if let Some(v) = self.ac_timer_on {
            settings.ac_timer_on = v;
        }
        if let Some(v) = self.ac_timer_off {
            settings.ac_timer_off = v;
        }
        if let Some(v) = self.fan_4_speed_percent {
            settings.fan_4_speed_percent = v;
        }
        if let Some(v) = self.fan_2_speed_percent {
            settings.fan_2_speed_percent = v;
        }
    }
}

// ---------------------------------------------------------------------------
// DeviceStatusPatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceStatusPatch {
    pub fan_1_speed_percent: Option<i32>,
    pub fan_3_speed_percent: Option<i32>,
    pub fan_1_status: Option<bool>,
    pub fan_4_status: Option<bool>,
    pub pump_1_status: Option<bool>,
    pub peltier_1_status: Option<bool>,
    pub fan_3_status: Option<bool>,
    pub fan_2_status: Option<bool>,
    pub pump_2_status: Option<bool>,
    pub peltier_2_status: Option<bool>,
}

impl DeviceStatusPatch {
    pub fn from_fields(fields: &Map<String, Value>) -> ServiceResult<Parsed<Self>> {
        let mut patch = Self::default();
        let mut ignored = Vec::new();

        for (name, value) in fields {
            if !REPORTED_FIELDS.contains(&name.as_str()) {
                ignored.push(name.clone());
                continue;
            }
            match name.as_str() {
                "fan_1_speed_percent" => patch.fan_1_speed_percent = Some(percent(name, value)?),
                "fan_3_speed_percent" => patch.fan_3_speed_percent = Some(percent(name, value)?),
                "fan_1_status" => patch.fan_1_status = Some(flag(name, value)?),
                "fan_4_status" => patch.fan_4_status = Some(flag(name, value)?),
                "pump_1_status" => patch.pump_1_status = Some(flag(name, value)?),
                "peltier_1_status" => patch.peltier_1_status = Some(flag(name, value)?),
                "fan_3_status" => patch.fan_3_status = Some(flag(name, value)?),
                "fan_2_status" => patch.fan_2_status = Some(flag(name, value)?),
                "pump_2_status" => patch.pump_2_status = Some(flag(name, value)?),
                "peltier_2_status" => patch.peltier_2_status = Some(flag(name, value)?),
                other => return Err(unhandled(other)),
            }
        }

        Ok(Parsed { patch, ignored })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, settings: &mut SystemSettings) {
        if let Some(v) = self.fan_1_speed_percent {
            settings.fan_1_speed_percent = v;
        }
        if let Some(v) = self.fan_3_speed_percent {
            settings.fan_3_speed_percent = v;
        }
        if let Some(v) = self.fan_1_status {
            settings.fan_1_status = v;
        }
        if let Some(v) = self.fan_4_status {
            settings.fan_4_status = v;
        }
        if let Some(v) = self.pump_1_status {
            settings.pump_1_status = v;
        }
        if let Some(v) = self.peltier_1_status {
            settings.peltier_1_status = v;
        }
        if let Some(v) = self.fan_3_status {
            settings.fan_3_status = v;
        }
        if let Some(v) = self.fan_2_status {
            settings.fan_2_status = v;
        }
        if let Some(v) = self.pump_2_status {
            settings.pump_2_status = v;
        }
        if let Some(v) = self.peltier_2_status {
            settings.peltier_2_status = v;
        }
    }
}

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

fn setpoint(field: &str, value: &Value) -> ServiceResult<f64> {
    let v = value
        .as_f64()
        .ok_or_else(|| ServiceError::invalid_field(field, "expected a number"))?;
    if !(SETPOINT_MIN..=SETPOINT_MAX).contains(&v) {
        return Err(ServiceError::invalid_field(
            field,
            format!("must be between {SETPOINT_MIN} and {SETPOINT_MAX}"),
        ));
    }
    Ok(v)
}

/// Whole numbers only, but `72.0` counts as whole.
fn percent(field: &str, value: &Value) -> ServiceResult<i32> {
    let whole = value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.fract() == 0.0 && v.abs() <= i32::MAX as f64)
            .map(|v| v as i64)
    });
    match whole {
        Some(v @ 0..=100) => Ok(v as i32),
        _ => Err(ServiceError::invalid_field(
            field,
            "expected an integer between 0 and 100",
        )),
    }
}

/// A listed field without a reader means the list and the readers disagree.
fn unhandled(field: &str) -> ServiceError {
    ServiceError::invalid_field(field, "field is listed but has no reader")
}

fn flag(field: &str, value: &Value) -> ServiceResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| ServiceError::invalid_field(field, "expected a boolean"))
}

/// Accepts `HH:MM` and `HH:MM:SS[.fff]`.
fn time_of_day(field: &str, value: &Value) -> ServiceResult<NaiveTime> {
    let raw = value
        .as_str()
        .ok_or_else(|| ServiceError::invalid_field(field, "expected a time of day string"))?;
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| ServiceError::invalid_field(field, "expected HH:MM or HH:MM:SS"))
}
