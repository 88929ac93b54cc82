pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{
    config::HistoryLimits,
    db::store::{DynSettingsStore, DynTelemetryStore, SettingsStore, TelemetryStore},
    settings::SettingsManager,
    status::StatusAggregator,
    telemetry::TelemetryService,
};

/// Services shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub telemetry: TelemetryService,
    pub settings: SettingsManager,
    pub status: StatusAggregator,
}

impl AppState {
    pub fn new(
        telemetry_store: DynTelemetryStore,
        settings_store: DynSettingsStore,
        status_temperature_count: i64,
        history: HistoryLimits,
    ) -> Self {
        let telemetry = TelemetryService::new(telemetry_store, history);
        let settings = SettingsManager::new(settings_store);
        let status =
            StatusAggregator::new(telemetry.clone(), settings.clone(), status_temperature_count);

        Self {
            telemetry,
            settings,
            status,
        }
    }

    /// Wires one backend into both storage seams.
    pub fn with_store<S>(store: S, status_temperature_count: i64, history: HistoryLimits) -> Self
    where
        S: TelemetryStore + SettingsStore + 'static,
    {
        let store = Arc::new(store);
        Self::new(store.clone(), store, status_temperature_count, history)
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/temperature", post(handlers::receive_temperature))
        .route("/solar_pv", post(handlers::receive_solar_data))
        .route("/temperature_history", get(handlers::get_temperature_history))
        .route(
            "/settings",
            get(handlers::get_settings).patch(handlers::update_settings),
        )
        .route("/settings/status", post(handlers::record_device_status))
        .route("/status", get(handlers::get_system_status))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
