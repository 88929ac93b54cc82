use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    models::{
        NewSolarPvSample, NewTemperatureReading, SolarPvSample, SystemSettings, TemperatureReading,
    },
    store::{HistoryFilter, SettingsStore, StoreError, TelemetryStore},
};
use crate::settings::patch::{DeviceStatusPatch, SettingsPatch};

/// Process-local implementation of both storage traits.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
/// Every write happens under a single write-lock acquisition, which gives
/// the same all-or-nothing guarantee a database transaction does.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
    reject_writes: Arc<AtomicBool>,
}

#[derive(Default)]
struct Tables {
    temperature_readings: Vec<TemperatureReading>,
    solar_pv_data: Vec<SolarPvSample>,
    settings: Option<SystemSettings>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail, to exercise rollback paths.
    #[cfg(test)]
    pub(crate) fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) async fn temperature_count(&self) -> usize {
        self.inner.read().await.temperature_readings.len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected("memory store is read-only".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn insert_temperature_readings(
        &self,
        readings: Vec<NewTemperatureReading>,
        recorded_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.check_writable()?;

        let rows: Vec<_> = readings
            .into_iter()
            .map(|r| TemperatureReading::from_new(Uuid::new_v4(), r, recorded_at))
            .collect();
        let count = rows.len() as u64;

        self.inner.write().await.temperature_readings.extend(rows);
        Ok(count)
    }

    async fn insert_solar_sample(
        &self,
        sample: &NewSolarPvSample,
        recorded_at: DateTime<Utc>,
    ) -> Result<SolarPvSample, StoreError> {
        self.check_writable()?;

        let row = SolarPvSample::from_new(Uuid::new_v4(), sample, recorded_at);
        self.inner.write().await.solar_pv_data.push(row.clone());
        Ok(row)
    }

    async fn temperature_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<TemperatureReading>, StoreError> {
        let tables = self.inner.read().await;
        let mut rows: Vec<_> = tables
            .temperature_readings
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.recorded_at);

        let skip = rows.len().saturating_sub(filter.limit.max(0) as usize);
        Ok(rows.split_off(skip))
    }

    async fn latest_temperatures(&self, n: i64) -> Result<Vec<TemperatureReading>, StoreError> {
        let tables = self.inner.read().await;
        let mut rows = tables.temperature_readings.clone();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        rows.truncate(n.max(0) as usize);
        Ok(rows)
    }

    async fn latest_solar_sample(&self) -> Result<Option<SolarPvSample>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.solar_pv_data.iter().max_by_key(|s| s.recorded_at).cloned())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn fetch_settings(&self) -> Result<Option<SystemSettings>, StoreError> {
        Ok(self.inner.read().await.settings.clone())
    }

    async fn insert_settings_if_absent(
        &self,
        defaults: &SystemSettings,
    ) -> Result<Option<SystemSettings>, StoreError> {
        self.check_writable()?;

        let mut tables = self.inner.write().await;
        if tables.settings.is_some() {
            return Ok(None);
        }
        tables.settings = Some(defaults.clone());
        Ok(Some(defaults.clone()))
    }

    async fn update_settings(
        &self,
        patch: &SettingsPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<SystemSettings, StoreError> {
        self.check_writable()?;

        let mut tables = self.inner.write().await;
        let settings = tables.settings.as_mut().ok_or(StoreError::SettingsMissing)?;
        patch.apply_to(settings);
        settings.updated_at = updated_at;
        Ok(settings.clone())
    }

    async fn update_device_status(
        &self,
        patch: &DeviceStatusPatch,
        status_updated_at: DateTime<Utc>,
    ) -> Result<SystemSettings, StoreError> {
        self.check_writable()?;

        let mut tables = self.inner.write().await;
        let settings = tables.settings.as_mut().ok_or(StoreError::SettingsMissing)?;
        patch.apply_to(settings);
        settings.status_updated_at = Some(status_updated_at);
        Ok(settings.clone())
    }
}
