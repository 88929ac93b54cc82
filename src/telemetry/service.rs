use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    clock,
    config::HistoryLimits,
    db::{
        models::{NewSolarPvSample, NewTemperatureReading, SolarPvSample, TemperatureReading},
        store::{DynTelemetryStore, HistoryFilter},
    },
    error::{ServiceError, ServiceResult},
};

/// One element of the `POST /temperature` batch, as sent by a sensor node.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
pub struct TemperatureReadingInput {
    pub sensor_id: String,
    /// Defaults to `Sensor_<sensor_id>` when absent or blank.
    #[serde(default)]
    pub sensor_name: Option<String>,
    pub temperature: f64,
    pub sensor_type: String,
    /// Only sent by battery-powered probes.
    #[serde(default)]
    pub battery_level: Option<f64>,
}

impl TemperatureReadingInput {
    fn resolve(self) -> NewTemperatureReading {
        let sensor_name = match self.sensor_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => format!("Sensor_{}", self.sensor_id),
        };
        NewTemperatureReading {
            sensor_id: self.sensor_id,
            sensor_name,
            temperature: self.temperature,
            sensor_type: self.sensor_type,
            battery_level: self.battery_level,
        }
    }
}

/// Query parameters for `GET /temperature_history`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Only readings from this sensor name.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub sensor_name: Option<String>,
    /// Maximum number of rows; the most recent rows win.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub limit: Option<i64>,
    /// Inclusive lower bound (RFC3339).
    #[serde(default, deserialize_with = "blank_as_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Inclusive upper bound (RFC3339).
    #[serde(default, deserialize_with = "blank_as_none")]
    pub end_time: Option<DateTime<Utc>>,
}

/// Form submissions send `?sensor_name=` for an unset filter; treat it as omitted.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map(Some).map_err(de::Error::custom)
        }
        _ => Ok(None),
    }
}

/// Ingestion and queries over the two append-only fact streams.
#[derive(Clone)]
pub struct TelemetryService {
    store: DynTelemetryStore,
    limits: HistoryLimits,
}

impl TelemetryService {
    pub fn new(store: DynTelemetryStore, limits: HistoryLimits) -> Self {
        Self { store, limits }
    }

    /// Persists a non-empty batch under one server timestamp. All or nothing.
    pub async fn append_temperature_readings(
        &self,
        batch: Vec<TemperatureReadingInput>,
    ) -> ServiceResult<u64> {
        if batch.is_empty() {
            return Err(ServiceError::InvalidInput(
                "No temperature readings provided in the list.".into(),
            ));
        }

        let readings: Vec<_> = batch.into_iter().map(TemperatureReadingInput::resolve).collect();
        let count = self
            .store
            .insert_temperature_readings(readings, clock::now())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to save temperature readings");
                ServiceError::from(e)
            })?;

        info!(count, "Temperature readings persisted");
        Ok(count)
    }

    pub async fn append_solar_sample(&self, sample: NewSolarPvSample) -> ServiceResult<SolarPvSample> {
        let created = self
            .store
            .insert_solar_sample(&sample, clock::now())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to save solar PV sample");
                ServiceError::from(e)
            })?;

        info!(id = %created.id, "Solar PV sample persisted");
        Ok(created)
    }

    /// Readings for charting, oldest first.
    pub async fn query_temperature_history(
        &self,
        query: HistoryQuery,
    ) -> ServiceResult<Vec<TemperatureReading>> {
        let limit = query.limit.unwrap_or(self.limits.default_limit);
        if !(1..=self.limits.max_limit).contains(&limit) {
            return Err(ServiceError::InvalidInput(format!(
                "limit must be between 1 and {}",
                self.limits.max_limit
            )));
        }
        if let (Some(start), Some(end)) = (query.start_time, query.end_time) {
            if start > end {
                return Err(ServiceError::InvalidInput(
                    "start_time must not be after end_time".into(),
                ));
            }
        }

        let filter = HistoryFilter {
            sensor_name: query.sensor_name,
            start_time: query.start_time,
            end_time: query.end_time,
            limit,
        };
        Ok(self.store.temperature_history(&filter).await?)
    }

    /// Newest first.
    pub async fn query_latest_temperatures(&self, n: i64) -> ServiceResult<Vec<TemperatureReading>> {
        Ok(self.store.latest_temperatures(n).await?)
    }

    pub async fn query_latest_solar(&self) -> ServiceResult<Option<SolarPvSample>> {
        Ok(self.store.latest_solar_sample().await?)
    }
}
