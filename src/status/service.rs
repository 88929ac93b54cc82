use tracing::warn;

use crate::{
    db::models::{SolarPvSample, SystemSettings, TemperatureReading},
    error::ServiceResult,
    settings::SettingsManager,
    telemetry::TelemetryService,
};

/// Dashboard snapshot. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatusView {
    /// Newest first.
    pub temperatures: Vec<TemperatureReading>,
    pub solar_data: Option<SolarPvSample>,
    /// `None` only when the settings row could not be read or created.
    pub current_settings: Option<SystemSettings>,
}

#[derive(Clone)]
pub struct StatusAggregator {
    telemetry: TelemetryService,
    settings: SettingsManager,
    temperature_count: i64,
}

impl StatusAggregator {
    pub fn new(telemetry: TelemetryService, settings: SettingsManager, temperature_count: i64) -> Self {
        Self {
            telemetry,
            settings,
            temperature_count,
        }
    }

    /// Latest readings, latest solar sample and the settings row.
    ///
    /// Storage faults on the fact streams are errors. A settings failure
    /// degrades to `current_settings: None` so the dashboard still renders.
    pub async fn get_system_status(&self) -> ServiceResult<SystemStatusView> {
        let (temperatures, solar_data, settings) = tokio::join!(
            self.telemetry.query_latest_temperatures(self.temperature_count),
            self.telemetry.query_latest_solar(),
            self.settings.get_or_create_settings(),
        );

        let current_settings = match settings {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(error = %e, "Settings unavailable for status view");
                None
            }
        };

        Ok(SystemStatusView {
            temperatures: temperatures?,
            solar_data: solar_data?,
            current_settings,
        })
    }
}
