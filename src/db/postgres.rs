use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{
    models::{
        NewSolarPvSample, NewTemperatureReading, SolarPvSample, SystemSettings, TemperatureReading,
        SETTINGS_ID,
    },
    store::{HistoryFilter, SettingsStore, StoreError, TelemetryStore},
};
use crate::settings::patch::{DeviceStatusPatch, SettingsPatch};

const READING_COLUMNS: &str =
    "id, sensor_id, sensor_name, temperature, sensor_type, battery_level, recorded_at";

const SOLAR_COLUMNS: &str = "id, panel_voltage, panel_current, load_voltage, load_current, \
     load_power, battery_voltage, battery_current, sunlight_intensity, recorded_at";

const SETTINGS_COLUMNS: &str = "id, temperature_setpoint, ac_timer_on, ac_timer_off, \
     fan_4_speed_percent, fan_2_speed_percent, fan_1_speed_percent, fan_3_speed_percent, \
     fan_1_status, fan_4_status, pump_1_status, peltier_1_status, \
     fan_3_status, fan_2_status, pump_2_status, peltier_2_status, \
     updated_at, status_updated_at";

/// Postgres-backed implementation of both storage traits.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TelemetryStore for PgStore {
    async fn insert_temperature_readings(
        &self,
        readings: Vec<NewTemperatureReading>,
        recorded_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        // Dropping `tx` without commit rolls the whole batch back.
        let mut tx = self.pool.begin().await?;
        let mut count = 0;

        for r in &readings {
            count += sqlx::query(
                r#"
                INSERT INTO temperature_readings
                    (sensor_id, sensor_name, temperature, sensor_type, battery_level, recorded_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&r.sensor_id)
            .bind(&r.sensor_name)
            .bind(r.temperature)
            .bind(&r.sensor_type)
            .bind(r.battery_level)
            .bind(recorded_at)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(count)
    }

    async fn insert_solar_sample(
        &self,
        sample: &NewSolarPvSample,
        recorded_at: DateTime<Utc>,
    ) -> Result<SolarPvSample, StoreError> {
        let row = sqlx::query_as::<_, SolarPvSample>(&format!(
            r#"
            INSERT INTO solar_pv_data
                (panel_voltage, panel_current, load_voltage, load_current, load_power,
                 battery_voltage, battery_current, sunlight_intensity, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {SOLAR_COLUMNS}
            "#
        ))
        .bind(sample.panel_voltage)
        .bind(sample.panel_current)
        .bind(sample.load_voltage)
        .bind(sample.load_current)
        .bind(sample.load_power)
        .bind(sample.battery_voltage)
        .bind(sample.battery_current)
        .bind(sample.sunlight_intensity)
        .bind(recorded_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn temperature_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<TemperatureReading>, StoreError> {
        let rows = sqlx::query_as::<_, TemperatureReading>(&format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM (
                SELECT {READING_COLUMNS}
                FROM temperature_readings
                WHERE ($1::text        IS NULL OR sensor_name = $1)
                  AND ($2::timestamptz IS NULL OR recorded_at >= $2)
                  AND ($3::timestamptz IS NULL OR recorded_at <= $3)
                ORDER BY recorded_at DESC
                LIMIT $4
            ) AS recent
            ORDER BY recorded_at ASC
            "#
        ))
        .bind(filter.sensor_name.as_deref())
        .bind(filter.start_time)
        .bind(filter.end_time)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn latest_temperatures(&self, n: i64) -> Result<Vec<TemperatureReading>, StoreError> {
        let rows = sqlx::query_as::<_, TemperatureReading>(&format!(
            r#"
            SELECT {READING_COLUMNS}
            FROM temperature_readings
            ORDER BY recorded_at DESC
            LIMIT $1
            "#
        ))
        .bind(n)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn latest_solar_sample(&self) -> Result<Option<SolarPvSample>, StoreError> {
        let row = sqlx::query_as::<_, SolarPvSample>(&format!(
            r#"
            SELECT {SOLAR_COLUMNS}
            FROM solar_pv_data
            ORDER BY recorded_at DESC
            LIMIT 1
            "#
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn fetch_settings(&self) -> Result<Option<SystemSettings>, StoreError> {
        let row = sqlx::query_as::<_, SystemSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM system_settings WHERE id = $1"
        ))
        .bind(SETTINGS_ID)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn insert_settings_if_absent(
        &self,
        defaults: &SystemSettings,
    ) -> Result<Option<SystemSettings>, StoreError> {
        let row = sqlx::query_as::<_, SystemSettings>(&format!(
            r#"
            INSERT INTO system_settings ({SETTINGS_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (id) DO NOTHING
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(defaults.id)
        .bind(defaults.temperature_setpoint)
        .bind(defaults.ac_timer_on)
        .bind(defaults.ac_timer_off)
        .bind(defaults.fan_4_speed_percent)
        .bind(defaults.fan_2_speed_percent)
        .bind(defaults.fan_1_speed_percent)
        .bind(defaults.fan_3_speed_percent)
        .bind(defaults.fan_1_status)
        .bind(defaults.fan_4_status)
        .bind(defaults.pump_1_status)
        .bind(defaults.peltier_1_status)
        .bind(defaults.fan_3_status)
        .bind(defaults.fan_2_status)
        .bind(defaults.pump_2_status)
        .bind(defaults.peltier_2_status)
        .bind(defaults.updated_at)
        .bind(defaults.status_updated_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update_settings(
        &self,
        patch: &SettingsPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<SystemSettings, StoreError> {
        sqlx::query_as::<_, SystemSettings>(&format!(
            r#"
            UPDATE system_settings SET
                temperature_setpoint = COALESCE($1, temperature_setpoint),
                ac_timer_on          = COALESCE($2, ac_timer_on),
                ac_timer_off         = COALESCE($3, ac_timer_off),
                fan_4_speed_percent  = COALESCE($4, fan_4_speed_percent),
                fan_2_speed_percent  = COALESCE($5, fan_2_speed_percent),
                updated_at           = $6
            WHERE id = $7
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(patch.temperature_setpoint)
        .bind(patch.ac_timer_on)
        .bind(patch.ac_timer_off)
        .bind(patch.fan_4_speed_percent)
        .bind(patch.fan_2_speed_percent)
        .bind(updated_at)
        .bind(SETTINGS_ID)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::SettingsMissing)
    }

    async fn update_device_status(
        &self,
        patch: &DeviceStatusPatch,
        status_updated_at: DateTime<Utc>,
    ) -> Result<SystemSettings, StoreError> {
        sqlx::query_as::<_, SystemSettings>(&format!(
            r#"
            UPDATE system_settings SET
                fan_1_speed_percent = COALESCE($1, fan_1_speed_percent),
                fan_3_speed_percent = COALESCE($2, fan_3_speed_percent),
                fan_1_status        = COALESCE($3, fan_1_status),
                fan_4_status        = COALESCE($4, fan_4_status),
                pump_1_status       = COALESCE($5, pump_1_status),
                peltier_1_status    = COALESCE($6, peltier_1_status),
                fan_3_status        = COALESCE($7, fan_3_status),
                fan_2_status        = COALESCE($8, fan_2_status),
                pump_2_status       = COALESCE($9, pump_2_status),
                peltier_2_status    = COALESCE($10, peltier_2_status),
                status_updated_at   = $11
            WHERE id = $12
            RETURNING {SETTINGS_COLUMNS}
            "#
        ))
        .bind(patch.fan_1_speed_percent)
        .bind(patch.fan_3_speed_percent)
        .bind(patch.fan_1_status)
        .bind(patch.fan_4_status)
        .bind(patch.pump_1_status)
        .bind(patch.peltier_1_status)
        .bind(patch.fan_3_status)
        .bind(patch.fan_2_status)
        .bind(patch.pump_2_status)
        .bind(patch.peltier_2_status)
        .bind(status_updated_at)
        .bind(SETTINGS_ID)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::SettingsMissing)
    }
}

// ---------------------------------------------------------------------------
// Tests (need a reachable Postgres via DATABASE_URL)
// ---------------------------------------------------------------------------
