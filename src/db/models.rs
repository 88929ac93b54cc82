use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Fixed primary key of the settings singleton row.
pub const SETTINGS_ID: i32 = 1;

// ---------------------------------------------------------------------------
// Temperature readings
// ---------------------------------------------------------------------------

/// A temperature reading ready to be persisted, `sensor_name` already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTemperatureReading {
    pub sensor_id: String,
    pub sensor_name: String,
    pub temperature: f64,
    pub sensor_type: String,
    pub battery_level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub id: Uuid,
    pub sensor_id: String,
    pub sensor_name: String,
    pub temperature: f64,
    pub sensor_type: String,
    pub battery_level: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl TemperatureReading {
    pub fn from_new(id: Uuid, new: NewTemperatureReading, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id,
            sensor_id: new.sensor_id,
            sensor_name: new.sensor_name,
            temperature: new.temperature,
            sensor_type: new.sensor_type,
            battery_level: new.battery_level,
            recorded_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Solar PV samples
// ---------------------------------------------------------------------------

/// Request body for `POST /solar_pv`; also the insert payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NewSolarPvSample {
    pub panel_voltage: f64,
    pub panel_current: f64,
    pub load_voltage: f64,
    pub load_current: f64,
    pub load_power: f64,
    pub battery_voltage: f64,
    pub battery_current: f64,
    pub sunlight_intensity: f64,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SolarPvSample {
    pub id: Uuid,
    pub panel_voltage: f64,
    pub panel_current: f64,
    pub load_voltage: f64,
    pub load_current: f64,
    pub load_power: f64,
    pub battery_voltage: f64,
    pub battery_current: f64,
    pub sunlight_intensity: f64,
    pub recorded_at: DateTime<Utc>,
}

impl SolarPvSample {
    pub fn from_new(id: Uuid, new: &NewSolarPvSample, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id,
            panel_voltage: new.panel_voltage,
            panel_current: new.panel_current,
            load_voltage: new.load_voltage,
            load_current: new.load_current,
            load_power: new.load_power,
            battery_voltage: new.battery_voltage,
            battery_current: new.battery_current,
            sunlight_intensity: new.sunlight_intensity,
            recorded_at,
        }
    }
}

// ---------------------------------------------------------------------------
// System settings
// ---------------------------------------------------------------------------

/// The single mutable settings/status row.
///
/// Zone layout of the cooling rig:
///
/// | Block | Component      | Speed field           | Speed is  |
/// |-------|----------------|-----------------------|-----------|
/// | 1     | hot-side fan   | `fan_1_speed_percent` | reported  |
/// | 1     | cold-side fan  | `fan_4_speed_percent` | editable  |
/// | 2     | hot-side fan   | `fan_3_speed_percent` | reported  |
/// | 2     | cold-side fan  | `fan_2_speed_percent` | editable  |
///
/// Hot-side fans run under closed-loop (PID) control on the device, so their
/// speeds are only ever written by device pushes.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SystemSettings {
    pub id: i32,

    // Editable parameters
    pub temperature_setpoint: f64,
    pub ac_timer_on: NaiveTime,
    pub ac_timer_off: NaiveTime,
    pub fan_4_speed_percent: i32,
    pub fan_2_speed_percent: i32,

    // Reported status
    pub fan_1_speed_percent: i32,
    pub fan_3_speed_percent: i32,
    pub fan_1_status: bool,
    pub fan_4_status: bool,
    pub pump_1_status: bool,
    pub peltier_1_status: bool,
    pub fan_3_status: bool,
    pub fan_2_status: bool,
    pub pump_2_status: bool,
    pub peltier_2_status: bool,

    /// Bumped on every accepted edit of the editable parameters.
    pub updated_at: DateTime<Utc>,
    /// Bumped on every accepted device status push.
    pub status_updated_at: Option<DateTime<Utc>>,
}

impl SystemSettings {
    pub const DEFAULT_SETPOINT: f64 = 23.0;
    pub const DEFAULT_FAN_SPEED: i32 = 50;

    /// The row created on first access.
    pub fn defaults(updated_at: DateTime<Utc>) -> Self {
        Self {
            id: SETTINGS_ID,
            temperature_setpoint: Self::DEFAULT_SETPOINT,
            ac_timer_on: NaiveTime::from_hms_opt(7, 0, 0).expect("07:00 is a valid time"),
            ac_timer_off: NaiveTime::from_hms_opt(22, 0, 0).expect("22:00 is a valid time"),
            fan_4_speed_percent: Self::DEFAULT_FAN_SPEED,
            fan_2_speed_percent: Self::DEFAULT_FAN_SPEED,
            fan_1_speed_percent: Self::DEFAULT_FAN_SPEED,
            fan_3_speed_percent: Self::DEFAULT_FAN_SPEED,
            fan_1_status: false,
            fan_4_status: false,
            pump_1_status: false,
            peltier_1_status: false,
            fan_3_status: false,
            fan_2_status: false,
            pump_2_status: false,
            peltier_2_status: false,
            updated_at,
            status_updated_at: None,
        }
    }
}
