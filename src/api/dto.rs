use chrono::{DateTime, FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    clock::in_target_tz,
    db::models::{SolarPvSample, SystemSettings, TemperatureReading},
    status::SystemStatusView,
};

// All timestamps below are rendered in the rig's fixed UTC-05:00 timezone.

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemperatureReadingDto {
    pub id: Uuid,
    pub sensor_id: String,
    pub sensor_name: String,
    pub temperature: f64,
    pub sensor_type: String,
    pub battery_level: Option<f64>,
    pub timestamp: DateTime<FixedOffset>,
}

impl From<TemperatureReading> for TemperatureReadingDto {
    fn from(r: TemperatureReading) -> Self {
        Self {
            id: r.id,
            sensor_id: r.sensor_id,
            sensor_name: r.sensor_name,
            temperature: r.temperature,
            sensor_type: r.sensor_type,
            battery_level: r.battery_level,
            timestamp: in_target_tz(r.recorded_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SolarPvDto {
    pub id: Uuid,
    pub panel_voltage: f64,
    pub panel_current: f64,
    pub load_voltage: f64,
    pub load_current: f64,
    pub load_power: f64,
    pub battery_voltage: f64,
    pub battery_current: f64,
    pub sunlight_intensity: f64,
    pub timestamp: DateTime<FixedOffset>,
}

impl From<SolarPvSample> for SolarPvDto {
    fn from(s: SolarPvSample) -> Self {
        Self {
            id: s.id,
            panel_voltage: s.panel_voltage,
            panel_current: s.panel_current,
            load_voltage: s.load_voltage,
            load_current: s.load_current,
            load_power: s.load_power,
            battery_voltage: s.battery_voltage,
            battery_current: s.battery_current,
            sunlight_intensity: s.sunlight_intensity,
            timestamp: in_target_tz(s.recorded_at),
        }
    }
}

/// The full settings row: editable parameters and reported status.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SettingsDto {
    pub id: i32,
    pub temperature_setpoint: f64,
    #[schema(value_type = String, example = "07:00:00")]
    pub ac_timer_on: NaiveTime,
    #[schema(value_type = String, example = "22:00:00")]
    pub ac_timer_off: NaiveTime,
    /// Block 1 cold-side fan. Editable.
    pub fan_4_speed_percent: i32,
    /// Block 2 cold-side fan. Editable.
    pub fan_2_speed_percent: i32,
    /// Block 1 hot-side fan (PID). Reported only.
    pub fan_1_speed_percent: i32,
    /// Block 2 hot-side fan (PID). Reported only.
    pub fan_3_speed_percent: i32,
    pub fan_1_status: bool,
    pub fan_4_status: bool,
    pub pump_1_status: bool,
    pub peltier_1_status: bool,
    pub fan_3_status: bool,
    pub fan_2_status: bool,
    pub pump_2_status: bool,
    pub peltier_2_status: bool,
    pub updated_at: DateTime<FixedOffset>,
    pub status_updated_at: Option<DateTime<FixedOffset>>,
}

impl From<SystemSettings> for SettingsDto {
    fn from(s: SystemSettings) -> Self {
        Self {
            id: s.id,
            temperature_setpoint: s.temperature_setpoint,
            ac_timer_on: s.ac_timer_on,
            ac_timer_off: s.ac_timer_off,
            fan_4_speed_percent: s.fan_4_speed_percent,
            fan_2_speed_percent: s.fan_2_speed_percent,
            fan_1_speed_percent: s.fan_1_speed_percent,
            fan_3_speed_percent: s.fan_3_speed_percent,
            fan_1_status: s.fan_1_status,
            fan_4_status: s.fan_4_status,
            pump_1_status: s.pump_1_status,
            peltier_1_status: s.peltier_1_status,
            fan_3_status: s.fan_3_status,
            fan_2_status: s.fan_2_status,
            pump_2_status: s.pump_2_status,
            peltier_2_status: s.peltier_2_status,
            updated_at: in_target_tz(s.updated_at),
            status_updated_at: s.status_updated_at.map(in_target_tz),
        }
    }
}

/// Response for `GET /status`. `temperatures` is ordered newest first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SystemStatusDto {
    pub temperatures: Vec<TemperatureReadingDto>,
    pub solar_data: Option<SolarPvDto>,
    pub current_settings: Option<SettingsDto>,
}

impl From<SystemStatusView> for SystemStatusDto {
    fn from(v: SystemStatusView) -> Self {
        Self {
            temperatures: v.temperatures.into_iter().map(Into::into).collect(),
            solar_data: v.solar_data.map(Into::into),
            current_settings: v.current_settings.map(Into::into),
        }
    }
}

/// Response for `POST /temperature`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemperatureBatchResponse {
    pub message: String,
    pub count: u64,
}

impl TemperatureBatchResponse {
    pub fn saved(count: u64) -> Self {
        Self {
            message: format!("{count} temperature reading(s) saved successfully."),
            count,
        }
    }
}

/// Request body for `PATCH /settings`. Every field is optional; only the
/// fields present are applied. Any other field is ignored.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SettingsUpdateRequest {
    /// Between -50 and 150.
    pub temperature_setpoint: Option<f64>,
    /// `HH:MM` or `HH:MM:SS`.
    pub ac_timer_on: Option<String>,
    /// `HH:MM` or `HH:MM:SS`.
    pub ac_timer_off: Option<String>,
    /// 0 to 100.
    pub fan_4_speed_percent: Option<i32>,
    /// 0 to 100.
    pub fan_2_speed_percent: Option<i32>,
}

/// Request body for `POST /settings/status`, sent by the controller board.
/// Only the fields present are applied. Any other field is ignored.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DeviceStatusRequest {
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
