use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::patch::{DeviceStatusPatch, Parsed, SettingsPatch};
use crate::{
    clock,
    db::{
        models::SystemSettings,
        store::{DynSettingsStore, StoreError},
    },
    error::{ServiceError, ServiceResult},
};

/// Owns the settings singleton: get-or-create, user edits and device pushes.
#[derive(Clone)]
pub struct SettingsManager {
    store: DynSettingsStore,
}

/// The singleton row plus whether this call had to create it.
struct Established {
    settings: SystemSettings,
    created: bool,
}

impl SettingsManager {
    pub fn new(store: DynSettingsStore) -> Self {
        Self { store }
    }

    /// Returns the settings row, creating it with defaults on first access.
    pub async fn get_or_create_settings(&self) -> ServiceResult<SystemSettings> {
        Ok(self.establish().await?.settings)
    }

    /// Applies the editable fields present in `fields`.
    ///
    /// Reported-status and unknown fields are ignored with a warning. A patch
    /// with no editable field left is rejected, unless the row was created by
    /// this very call, in which case the fresh defaults are returned.
    pub async fn apply_partial_update(
        &self,
        fields: &Map<String, Value>,
    ) -> ServiceResult<SystemSettings> {
        let Parsed { patch, ignored } = SettingsPatch::from_fields(fields)?;
        if !ignored.is_empty() {
            warn!(fields = ?ignored, "Ignoring fields that cannot be set through a settings update");
        }

        let established = self.establish().await?;
        if patch.is_empty() {
            if established.created {
                return Ok(established.settings);
            }
            return Err(ServiceError::InvalidInput(
                "No settings provided for update".into(),
            ));
        }

        let updated = self
            .store
            .update_settings(&patch, clock::now())
            .await
            .map_err(|e| settings_write_error(e, "Failed to commit settings update"))?;

        info!(patch = ?patch, "Settings updated");
        Ok(updated)
    }

    /// Writes device-reported status fields. Editable parameters and
    /// `updated_at` are never touched; `status_updated_at` is bumped instead.
    pub async fn record_device_status(&self, fields: &Map<String, Value>) -> ServiceResult<()> {
        let Parsed { patch, ignored } = DeviceStatusPatch::from_fields(fields)?;
        if !ignored.is_empty() {
            warn!(fields = ?ignored, "Ignoring fields that a device status push cannot set");
        }
        if patch.is_empty() {
            return Err(ServiceError::InvalidInput(
                "No status fields provided".into(),
            ));
        }

        self.establish().await?;
        self.store
            .update_device_status(&patch, clock::now())
            .await
            .map_err(|e| settings_write_error(e, "Failed to commit device status"))?;

        debug!(patch = ?patch, "Device status recorded");
        Ok(())
    }

    /// Read, else conditional insert, else re-read after losing the insert race.
    async fn establish(&self) -> ServiceResult<Established> {
        if let Some(settings) = self.store.fetch_settings().await? {
            return Ok(Established { settings, created: false });
        }

        info!("No settings found, creating default settings row");
        let defaults = SystemSettings::defaults(clock::now());
        let inserted = self
            .store
            .insert_settings_if_absent(&defaults)
            .await
            .map_err(|e| settings_write_error(e, "Failed to create default settings"))?;

        if let Some(settings) = inserted {
            info!("Default settings created");
            return Ok(Established { settings, created: true });
        }

        debug!("Settings row was created concurrently; re-reading");
        match self.store.fetch_settings().await? {
            Some(settings) => Ok(Established { settings, created: false }),
            None => {
                error!("Settings row absent after conflicting insert");
                Err(ServiceError::SettingsUnavailable)
            }
        }
    }
}

fn settings_write_error(e: StoreError, message: &str) -> ServiceError {
    error!(error = %e, "{message}");
    match e {
        StoreError::SettingsMissing => ServiceError::SettingsUnavailable,
        other => ServiceError::Storage(other),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use super::*;
    use crate::db::{memory::MemoryStore, store::SettingsStore};

    fn fields(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn manager(store: &MemoryStore) -> SettingsManager {
        SettingsManager::new(Arc::new(store.clone()))
    }

    /// Reports "absent" on the first read while another writer slips the row in,
    /// reproducing two callers racing through first access.
    struct RacingStore {
        inner: MemoryStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl SettingsStore for RacingStore {
        async fn fetch_settings(&self) -> Result<Option<SystemSettings>, StoreError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let mut other = SystemSettings::defaults(Utc::now());
                other.temperature_setpoint = 18.0;
                self.inner.insert_settings_if_absent(&other).await?;
                return Ok(None);
            }
            self.inner.fetch_settings().await
        }

        async fn insert_settings_if_absent(
            &self,
            defaults: &SystemSettings,
        ) -> Result<Option<SystemSettings>, StoreError> {
            self.inner.insert_settings_if_absent(defaults).await
        }

        async fn update_settings(
            &self,
            patch: &SettingsPatch,
            updated_at: DateTime<Utc>,
        ) -> Result<SystemSettings, StoreError> {
            self.inner.update_settings(patch, updated_at).await
        }

        async fn update_device_status(
            &self,
            patch: &DeviceStatusPatch,
            status_updated_at: DateTime<Utc>,
        ) -> Result<SystemSettings, StoreError> {
            self.inner.update_device_status(patch, status_updated_at).await
        }
    }

    #[tokio::test]
    async fn first_access_creates_defaults() {
        let store = MemoryStore::new();
        let settings = manager(&store).get_or_create_settings().await.unwrap();

        assert_eq!(settings.temperature_setpoint, SystemSettings::DEFAULT_SETPOINT);
        assert_eq!(store.fetch_settings().await.unwrap(), Some(settings));
    }

    #[tokio::test]
    async fn second_access_returns_the_same_row() {
        let store = MemoryStore::new();
        let mgr = manager(&store);

        let first = mgr.get_or_create_settings().await.unwrap();
        let second = mgr.get_or_create_settings().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_access_yields_one_row() {
        let store = MemoryStore::new();
        let mgr = manager(&store);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mgr = mgr.clone();
                tokio::spawn(async move { mgr.get_or_create_settings().await })
            })
            .collect();

        let mut rows = Vec::new();
        for h in handles {
            rows.push(h.await.unwrap().unwrap());
        }
        assert!(rows.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn lost_insert_race_falls_back_to_reading_the_winner() {
        let store = Arc::new(RacingStore {
            inner: MemoryStore::new(),
            raced: AtomicBool::new(false),
        });
        let mgr = SettingsManager::new(store.clone());

        let settings = mgr.get_or_create_settings().await.unwrap();
        assert_eq!(settings.temperature_setpoint, 18.0);
        assert_eq!(store.inner.fetch_settings().await.unwrap(), Some(settings));
    }

    #[tokio::test]
    async fn setpoint_update_changes_only_that_field_and_bumps_updated_at() {
        let store = MemoryStore::new();
        let mgr = manager(&store);
        let before = mgr.get_or_create_settings().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;

        let after = mgr
            .apply_partial_update(&fields(json!({ "temperature_setpoint": 25.0 })))
            .await
            .unwrap();

        assert_eq!(after.temperature_setpoint, 25.0);
        assert!(after.updated_at > before.updated_at);

        let mut expected = before.clone();
        expected.temperature_setpoint = 25.0;
        expected.updated_at = after.updated_at;
        assert_eq!(after, expected);
    }

    #[tokio::test]
    async fn explicit_zero_speed_is_applied() {
        let store = MemoryStore::new();
        let mgr = manager(&store);
        mgr.get_or_create_settings().await.unwrap();

        let after = mgr
            .apply_partial_update(&fields(json!({ "fan_2_speed_percent": 0 })))
            .await
            .unwrap();
        assert_eq!(after.fan_2_speed_percent, 0);
        assert_eq!(after.fan_4_speed_percent, SystemSettings::DEFAULT_FAN_SPEED);
    }

    #[tokio::test]
    async fn empty_patch_on_existing_row_is_rejected() {
        let store = MemoryStore::new();
        let mgr = manager(&store);
        let before = mgr.get_or_create_settings().await.unwrap();

        let err = mgr.apply_partial_update(&Map::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(store.fetch_settings().await.unwrap(), Some(before));
    }

    #[tokio::test]
    async fn status_field_in_patch_changes_nothing() {
        let store = MemoryStore::new();
        let mgr = manager(&store);
        let before = mgr.get_or_create_settings().await.unwrap();

        let err = mgr
            .apply_partial_update(&fields(json!({ "peltier_1_status": true })))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidInput(_)));
        let stored = store.fetch_settings().await.unwrap().unwrap();
        assert_eq!(stored, before);
        assert!(!stored.peltier_1_status);
    }

    #[tokio::test]
    async fn reported_fields_are_dropped_from_a_mixed_patch() {
        let store = MemoryStore::new();
        let mgr = manager(&store);
        mgr.get_or_create_settings().await.unwrap();

        let after = mgr
            .apply_partial_update(&fields(json!({
                "fan_4_speed_percent": 70,
                "fan_1_speed_percent": 95,
                "pump_2_status": true,
            })))
            .await
            .unwrap();

        assert_eq!(after.fan_4_speed_percent, 70);
        assert_eq!(after.fan_1_speed_percent, SystemSettings::DEFAULT_FAN_SPEED);
        assert!(!after.pump_2_status);
    }

    #[tokio::test]
    async fn empty_patch_on_first_access_returns_fresh_defaults() {
        let store = MemoryStore::new();
        let settings = manager(&store)
            .apply_partial_update(&fields(json!({ "fan_3_status": true })))
            .await
            .unwrap();

        assert_eq!(settings.temperature_setpoint, SystemSettings::DEFAULT_SETPOINT);
        assert!(!settings.fan_3_status);
    }

    #[tokio::test]
    async fn invalid_value_is_rejected_before_any_write() {
        let store = MemoryStore::new();
        let err = manager(&store)
            .apply_partial_update(&fields(json!({ "fan_4_speed_percent": 140 })))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidField { .. }));
        assert!(store.fetch_settings().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_creation_is_a_storage_error() {
        let store = MemoryStore::new();
        store.reject_writes(true);

        let err = manager(&store).get_or_create_settings().await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
    }

    #[tokio::test]
    async fn failed_update_leaves_prior_state() {
        let store = MemoryStore::new();
        let mgr = manager(&store);
        let before = mgr.get_or_create_settings().await.unwrap();
        store.reject_writes(true);

        let err = mgr
            .apply_partial_update(&fields(json!({ "temperature_setpoint": 30.0 })))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
        assert_eq!(store.fetch_settings().await.unwrap(), Some(before));
    }

    #[tokio::test]
    async fn device_status_writes_only_reported_fields() {
        let store = MemoryStore::new();
        let mgr = manager(&store);
        let before = mgr.get_or_create_settings().await.unwrap();

        mgr.record_device_status(&fields(json!({
            "peltier_1_status": true,
            "fan_1_speed_percent": 88,
            "temperature_setpoint": 40.0,
        })))
        .await
        .unwrap();

        let after = store.fetch_settings().await.unwrap().unwrap();
        assert!(after.peltier_1_status);
        assert_eq!(after.fan_1_speed_percent, 88);
        assert_eq!(after.temperature_setpoint, before.temperature_setpoint);
        assert_eq!(after.updated_at, before.updated_at);
        assert!(after.status_updated_at.is_some());
    }

    #[tokio::test]
    async fn device_status_creates_the_row_when_absent() {
        let store = MemoryStore::new();
        manager(&store)
            .record_device_status(&fields(json!({ "pump_1_status": true })))
            .await
            .unwrap();

        assert!(store.fetch_settings().await.unwrap().unwrap().pump_1_status);
    }

    #[tokio::test]
    async fn empty_device_status_is_rejected() {
        let store = MemoryStore::new();
        let err = manager(&store)
            .record_device_status(&fields(json!({ "ac_timer_on": "07:00" })))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
