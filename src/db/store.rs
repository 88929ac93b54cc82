//! Storage seams. Services hold `Arc<dyn …>` handles to these traits and never
//! talk to a concrete backend directly.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::models::{
    NewSolarPvSample, NewTemperatureReading, SolarPvSample, SystemSettings, TemperatureReading,
};
use crate::settings::patch::{DeviceStatusPatch, SettingsPatch};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// The backend refused the write; nothing from the call was kept.
    #[error("write rejected: {0}")]
    WriteRejected(String),

    /// An update targeted the settings row but it does not exist.
    #[error("settings row is missing")]
    SettingsMissing,
}

/// Filter for `TelemetryStore::temperature_history`. `None` means unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    pub sensor_name: Option<String>,
    /// Inclusive lower bound.
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub end_time: Option<DateTime<Utc>>,
    pub limit: i64,
}

impl HistoryFilter {
    pub fn matches(&self, reading: &TemperatureReading) -> bool {
        self.sensor_name
            .as_deref()
            .map_or(true, |name| reading.sensor_name == name)
            && self.start_time.map_or(true, |t| reading.recorded_at >= t)
            && self.end_time.map_or(true, |t| reading.recorded_at <= t)
    }
}

/// Append-only fact streams: temperature readings and solar PV samples.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Persists the whole batch in one commit or nothing at all.
    async fn insert_temperature_readings(
        &self,
        readings: Vec<NewTemperatureReading>,
        recorded_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn insert_solar_sample(
        &self,
        sample: &NewSolarPvSample,
        recorded_at: DateTime<Utc>,
    ) -> Result<SolarPvSample, StoreError>;

    /// The most recent `filter.limit` matching readings, ordered oldest first.
    async fn temperature_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<TemperatureReading>, StoreError>;

    /// Newest first.
    async fn latest_temperatures(&self, n: i64) -> Result<Vec<TemperatureReading>, StoreError>;

    async fn latest_solar_sample(&self) -> Result<Option<SolarPvSample>, StoreError>;
}

/// The settings singleton row.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn fetch_settings(&self) -> Result<Option<SystemSettings>, StoreError>;

    /// Conditional insert. Returns `None` when a row already exists, in which
    /// case nothing is written.
    async fn insert_settings_if_absent(
        &self,
        defaults: &SystemSettings,
    ) -> Result<Option<SystemSettings>, StoreError>;

    /// Applies `patch` and sets `updated_at`, in one commit.
    async fn update_settings(
        &self,
        patch: &SettingsPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<SystemSettings, StoreError>;

    /// Applies `patch` and sets `status_updated_at`, in one commit.
    async fn update_device_status(
        &self,
        patch: &DeviceStatusPatch,
        status_updated_at: DateTime<Utc>,
    ) -> Result<SystemSettings, StoreError>;
}

pub type DynTelemetryStore = Arc<dyn TelemetryStore>;
pub type DynSettingsStore = Arc<dyn SettingsStore>;
