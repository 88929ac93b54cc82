use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};
use utoipa::OpenApi;

use super::{
    dto::{
        DeviceStatusRequest, SettingsDto, SettingsUpdateRequest, SolarPvDto, SystemStatusDto,
        TemperatureBatchResponse, TemperatureReadingDto,
    },
    errors::AppError,
    AppState,
};
use crate::{
    db::models::NewSolarPvSample,
    telemetry::{HistoryQuery, TemperatureReadingInput},
};

// ---------------------------------------------------------------------------
// Sensor data
// ---------------------------------------------------------------------------

/// Store a batch of temperature readings in one commit.
#[utoipa::path(
    post,
    path = "/temperature",
    request_body = Vec<TemperatureReadingInput>,
    responses(
        (status = 201, description = "Readings saved", body = TemperatureBatchResponse),
        (status = 400, description = "Empty batch"),
        (status = 500, description = "Database commit failed"),
    ),
    tag = "sensor data"
)]
pub async fn receive_temperature(
    State(state): State<AppState>,
    Json(batch): Json<Vec<TemperatureReadingInput>>,
) -> Result<(StatusCode, Json<TemperatureBatchResponse>), AppError> {
    let count = state.telemetry.append_temperature_readings(batch).await?;
    Ok((StatusCode::CREATED, Json(TemperatureBatchResponse::saved(count))))
}

/// Store a single solar PV sample.
#[utoipa::path(
    post,
    path = "/solar_pv",
    request_body = NewSolarPvSample,
    responses(
        (status = 201, description = "Sample saved", body = SolarPvDto),
        (status = 500, description = "Database commit failed"),
    ),
    tag = "sensor data"
)]
pub async fn receive_solar_data(
    State(state): State<AppState>,
    Json(sample): Json<NewSolarPvSample>,
) -> Result<(StatusCode, Json<SolarPvDto>), AppError> {
    let created = state.telemetry.append_solar_sample(sample).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Temperature readings for charting, ordered by `timestamp ASC`.
/// With more matches than `limit`, the most recent `limit` readings are returned.
#[utoipa::path(
    get,
    path = "/temperature_history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Temperature readings", body = Vec<TemperatureReadingDto>),
        (status = 400, description = "Invalid limit or time range"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensor data"
)]
pub async fn get_temperature_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<TemperatureReadingDto>>, AppError> {
    let rows = state.telemetry.query_temperature_history(query).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Current settings, created with defaults on first access.
#[utoipa::path(
    get,
    path = "/settings",
    responses(
        (status = 200, description = "Current settings", body = SettingsDto),
        (status = 404, description = "Settings could not be established"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "settings"
)]
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<SettingsDto>, AppError> {
    let settings = state.settings.get_or_create_settings().await?;
    Ok(Json(settings.into()))
}

/// Partially update the editable settings. Status fields are ignored.
#[utoipa::path(
    patch,
    path = "/settings",
    request_body = SettingsUpdateRequest,
    responses(
        (status = 200, description = "Updated settings", body = SettingsDto),
        (status = 400, description = "No editable fields provided"),
        (status = 404, description = "Settings could not be established"),
        (status = 422, description = "Invalid field value"),
        (status = 500, description = "Database commit failed"),
    ),
    tag = "settings"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<SettingsDto>, AppError> {
    let settings = state.settings.apply_partial_update(&fields).await?;
    Ok(Json(settings.into()))
}

/// Record fan, pump and Peltier status reported by the controller board.
#[utoipa::path(
    post,
    path = "/settings/status",
    request_body = DeviceStatusRequest,
    responses(
        (status = 204, description = "Status recorded"),
        (status = 400, description = "No status fields provided"),
        (status = 422, description = "Invalid field value"),
        (status = 500, description = "Database commit failed"),
    ),
    tag = "settings"
)]
pub async fn record_device_status(
    State(state): State<AppState>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<StatusCode, AppError> {
    state.settings.record_device_status(&fields).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Latest readings, latest solar sample and current settings in one view.
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "System status", body = SystemStatusDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "status"
)]
pub async fn get_system_status(
    State(state): State<AppState>,
) -> Result<Json<SystemStatusDto>, AppError> {
    let view = state.status.get_system_status().await?;
    Ok(Json(view.into()))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        receive_temperature,
        receive_solar_data,
        get_temperature_history,
        get_settings,
        update_settings,
        record_device_status,
        get_system_status,
        health,
    ),
    components(schemas(
        TemperatureReadingInput,
        NewSolarPvSample,
        TemperatureReadingDto,
        SolarPvDto,
        SettingsDto,
        SettingsUpdateRequest,
        DeviceStatusRequest,
        SystemStatusDto,
        TemperatureBatchResponse,
    )),
    tags(
        (name = "sensor data", description = "Ingestion and history of sensor readings"),
        (name = "settings",    description = "Operating parameters and reported device status"),
        (name = "status",      description = "Dashboard snapshot"),
        (name = "system",      description = "System endpoints"),
    ),
    info(
        title = "Rig Telemetry API",
        version = "0.1.0",
        description = "REST API for the cooling rig's sensor data and settings"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    use crate::{api::router, api::AppState, config::HistoryLimits, db::memory::MemoryStore};

    fn test_server(store: &MemoryStore) -> TestServer {
        let state = AppState::with_store(store.clone(), 8, HistoryLimits::default());
        TestServer::new(router(state)).unwrap()
    }

    async fn post_readings(server: &TestServer, body: Value) {
        server
            .post("/temperature")
            .json(&body)
            .await
            .assert_status(StatusCode::CREATED);
    }

    fn solar_body() -> Value {
        json!({
            "panel_voltage": 18.2,
            "panel_current": 1.1,
            "load_voltage": 12.1,
            "load_current": 0.4,
            "load_power": 4.84,
            "battery_voltage": 12.6,
            "battery_current": 0.7,
            "sunlight_intensity": 830.0
        })
    }

    // -----------------------------------------------------------------------
    // POST /temperature
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn temperature_batch_returns_created_count() {
        let server = test_server(&MemoryStore::new());
        let resp = server
            .post("/temperature")
            .json(&json!([
                { "sensor_id": "1", "temperature": 21.5, "sensor_type": "ds18b20" },
                { "sensor_id": "2", "sensor_name": "Hot side", "temperature": 48.0,
                  "sensor_type": "thermistor", "battery_level": 3.9 }
            ]))
            .await;

        resp.assert_status(StatusCode::CREATED);
        let body: Value = resp.json();
        assert_eq!(body["count"], 2);
        assert_eq!(body["message"], "2 temperature reading(s) saved successfully.");
    }

    #[tokio::test]
    async fn empty_temperature_batch_is_bad_request() {
        let store = MemoryStore::new();
        let server = test_server(&store);
        let resp = server.post("/temperature").json(&json!([])).await;

        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert!(body["error"].as_str().unwrap().contains("No temperature readings"));
        assert_eq!(store.temperature_count().await, 0);
    }

    #[tokio::test]
    async fn temperature_commit_failure_is_server_error() {
        let store = MemoryStore::new();
        store.reject_writes(true);
        let server = test_server(&store);

        let resp = server
            .post("/temperature")
            .json(&json!([{ "sensor_id": "1", "temperature": 21.5, "sensor_type": "ds18b20" }]))
            .await;

        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.temperature_count().await, 0);
    }

    // -----------------------------------------------------------------------
    // POST /solar_pv
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn solar_sample_is_echoed_with_id_and_timestamp() {
        let server = test_server(&MemoryStore::new());
        let resp = server.post("/solar_pv").json(&solar_body()).await;

        resp.assert_status(StatusCode::CREATED);
        let body: Value = resp.json();
        assert!(body["id"].is_string());
        assert!(body["timestamp"].as_str().unwrap().ends_with("-05:00"));
        assert_eq!(body["load_power"], 4.84);
        assert_eq!(body["sunlight_intensity"], 830.0);
    }

    // -----------------------------------------------------------------------
    // GET /temperature_history
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn history_filters_by_sensor_name_in_ascending_order() {
        let server = test_server(&MemoryStore::new());
        for t in [20.0, 21.0, 22.0] {
            post_readings(
                &server,
                json!([
                    { "sensor_id": "1", "sensor_name": "Inlet", "temperature": t, "sensor_type": "ds18b20" },
                    { "sensor_id": "2", "temperature": t + 10.0, "sensor_type": "ds18b20" }
                ]),
            )
            .await;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let resp = server
            .get("/temperature_history")
            .add_query_param("sensor_name", "Inlet")
            .add_query_param("limit", 2)
            .await;
        resp.assert_status_ok();

        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0]["temperature"], 21.0);
        assert_eq!(body[1]["temperature"], 22.0);
        assert!(body.iter().all(|r| r["sensor_name"] == "Inlet"));
    }

    #[tokio::test]
    async fn history_defaults_sensor_name_for_unnamed_sensors() {
        let server = test_server(&MemoryStore::new());
        post_readings(
            &server,
            json!([{ "sensor_id": "9", "temperature": 5.0, "sensor_type": "probe" }]),
        )
        .await;

        let resp = server
            .get("/temperature_history")
            .add_query_param("sensor_name", "Sensor_9")
            .await;
        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 1);
        assert!(body[0]["battery_level"].is_null());
    }

    #[tokio::test]
    async fn blank_history_filters_are_unconstrained() {
        let server = test_server(&MemoryStore::new());
        post_readings(
            &server,
            json!([
                { "sensor_id": "1", "sensor_name": "Inlet", "temperature": 20.0, "sensor_type": "ds18b20" },
                { "sensor_id": "2", "temperature": 30.0, "sensor_type": "ds18b20" }
            ]),
        )
        .await;

        let resp = server
            .get("/temperature_history?sensor_name=&limit=&start_time=&end_time=")
            .await;
        resp.assert_status_ok();
        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 2);
    }

    #[tokio::test]
    async fn malformed_history_bound_is_rejected() {
        let server = test_server(&MemoryStore::new());
        let resp = server
            .get("/temperature_history")
            .add_query_param("start_time", "yesterday")
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn history_rejects_zero_limit() {
        let server = test_server(&MemoryStore::new());
        let resp = server
            .get("/temperature_history")
            .add_query_param("limit", 0)
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    // -----------------------------------------------------------------------
    // GET / PATCH /settings
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn get_settings_creates_defaults() {
        let server = test_server(&MemoryStore::new());
        let resp = server.get("/settings").await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body["id"], 1);
        assert_eq!(body["temperature_setpoint"], 23.0);
        assert_eq!(body["ac_timer_on"], "07:00:00");
        assert_eq!(body["ac_timer_off"], "22:00:00");
        assert_eq!(body["fan_2_speed_percent"], 50);
        assert_eq!(body["peltier_1_status"], false);
        assert!(body["updated_at"].as_str().unwrap().ends_with("-05:00"));
        assert!(body["status_updated_at"].is_null());
    }

    #[tokio::test]
    async fn patch_settings_applies_editable_fields_only() {
        let server = test_server(&MemoryStore::new());
        server.get("/settings").await.assert_status_ok();

        let resp = server
            .patch("/settings")
            .json(&json!({
                "temperature_setpoint": 25.0,
                "ac_timer_on": "06:45",
                "fan_3_speed_percent": 100,
                "pump_1_status": true
            }))
            .await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body["temperature_setpoint"], 25.0);
        assert_eq!(body["ac_timer_on"], "06:45:00");
        assert_eq!(body["ac_timer_off"], "22:00:00");
        assert_eq!(body["fan_3_speed_percent"], 50);
        assert_eq!(body["pump_1_status"], false);
    }

    #[tokio::test]
    async fn patch_settings_with_nothing_usable_is_bad_request() {
        let server = test_server(&MemoryStore::new());
        server.get("/settings").await.assert_status_ok();

        let resp = server.patch("/settings").json(&json!({})).await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        let resp = server
            .patch("/settings")
            .json(&json!({ "peltier_2_status": true }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn patch_settings_out_of_range_is_unprocessable() {
        let server = test_server(&MemoryStore::new());
        let resp = server
            .patch("/settings")
            .json(&json!({ "fan_4_speed_percent": 101 }))
            .await;

        resp.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = resp.json();
        assert!(body["error"].as_str().unwrap().contains("fan_4_speed_percent"));
    }

    #[tokio::test]
    async fn first_patch_without_usable_fields_returns_defaults() {
        let server = test_server(&MemoryStore::new());
        let resp = server.patch("/settings").json(&json!({})).await;

        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["temperature_setpoint"], 23.0);
    }

    // -----------------------------------------------------------------------
    // POST /settings/status
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn device_status_push_is_visible_in_settings() {
        let server = test_server(&MemoryStore::new());
        server
            .post("/settings/status")
            .json(&json!({ "fan_1_status": true, "fan_1_speed_percent": 65 }))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let body: Value = server.get("/settings").await.json();
        assert_eq!(body["fan_1_status"], true);
        assert_eq!(body["fan_1_speed_percent"], 65);
        assert!(body["status_updated_at"].is_string());
    }

    #[tokio::test]
    async fn device_status_without_status_fields_is_bad_request() {
        let server = test_server(&MemoryStore::new());
        let resp = server
            .post("/settings/status")
            .json(&json!({ "temperature_setpoint": 30.0 }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    // -----------------------------------------------------------------------
    // GET /status
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn status_on_empty_store() {
        let server = test_server(&MemoryStore::new());
        let resp = server.get("/status").await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body["temperatures"], json!([]));
        assert!(body["solar_data"].is_null());
        assert_eq!(body["current_settings"]["temperature_setpoint"], 23.0);
    }

    #[tokio::test]
    async fn status_combines_latest_readings_solar_and_settings() {
        let server = test_server(&MemoryStore::new());
        post_readings(
            &server,
            json!([{ "sensor_id": "1", "temperature": 19.0, "sensor_type": "ds18b20" }]),
        )
        .await;
        server
            .post("/solar_pv")
            .json(&solar_body())
            .await
            .assert_status(StatusCode::CREATED);

        let body: Value = server.get("/status").await.json();
        assert_eq!(body["temperatures"].as_array().unwrap().len(), 1);
        assert_eq!(body["temperatures"][0]["sensor_name"], "Sensor_1");
        assert_eq!(body["solar_data"]["panel_voltage"], 18.2);
        assert_eq!(body["current_settings"]["id"], 1);
    }

    // -----------------------------------------------------------------------
    // GET /health, GET /api-docs/openapi.json
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_returns_ok() {
        let server = test_server(&MemoryStore::new());
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn openapi_spec_is_served() {
        let server = test_server(&MemoryStore::new());
        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Rig Telemetry API");
        assert!(body["paths"]["/settings"]["patch"].is_object());
    }
}
