//! Read side: rooms, sensors, readings and conformity.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    api::{
        dto::{ApiResponse, LimitParams},
        AppState,
    },
    conformity::report::{ConformityReport, RoomConformity},
    db::models::{Measurement, Room, RoomAverages, RoomMeasurement, SensorDetails, SensorType},
    sensors::service::SensorReadings,
};

use super::ApiResult;

const DEFAULT_HISTORY_LIMIT: i64 = 10;

/// Active rooms ordered by building, floor and name.
#[utoipa::path(
    get,
    path = "/api/sensors/rooms",
    responses(
        (status = 200, description = "Active rooms", body = ApiResponse<Vec<Room>>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn list_rooms(State(state): State<AppState>) -> ApiResult<Vec<Room>> {
    let rooms = state.sensors.active_rooms().await?;
    let message = format!("{} active rooms", rooms.len());
    Ok(Json(ApiResponse::ok(rooms, message)))
}

/// Active sensors of a room.
#[utoipa::path(
    get,
    path = "/api/sensors/rooms/{room_id}/sensors",
    params(("room_id" = i64, Path, description = "Room id")),
    responses(
        (status = 200, description = "Sensors of the room", body = ApiResponse<Vec<SensorDetails>>),
        (status = 404, description = "Room unknown or inactive"),
    ),
    tag = "sensors"
)]
pub async fn room_sensors(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
) -> ApiResult<Vec<SensorDetails>> {
    let sensors = state.sensors.room_sensors(room_id).await?;
    let message = format!("{} sensors in room {room_id}", sensors.len());
    Ok(Json(ApiResponse::ok(sensors, message)))
}

/// Per-quantity averages of a room over the latest `limit` readings of each sensor.
#[utoipa::path(
    get,
    path = "/api/sensors/rooms/{room_id}/averages",
    params(("room_id" = i64, Path, description = "Room id"), LimitParams),
    responses(
        (status = 200, description = "Room averages", body = ApiResponse<RoomAverages>),
        (status = 400, description = "Invalid limit"),
        (status = 404, description = "Room unknown or inactive"),
    ),
    tag = "sensors"
)]
pub async fn room_averages(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(params): Query<LimitParams>,
) -> ApiResult<RoomAverages> {
    let window = params.limit.unwrap_or(state.measurement_window);
    let averages = state.sensors.room_averages(room_id, window).await?;
    Ok(Json(ApiResponse::ok(averages, "Room averages")))
}

/// Latest readings of one type across the room's active sensors.
#[utoipa::path(
    get,
    path = "/api/sensors/rooms/{room_id}/measurements/{sensor_type}",
    params(
        ("room_id" = i64, Path, description = "Room id"),
        ("sensor_type" = SensorType, Path, description = "Sensor type"),
        LimitParams,
    ),
    responses(
        (status = 200, description = "Readings, newest first", body = ApiResponse<Vec<RoomMeasurement>>),
        (status = 400, description = "Invalid limit"),
        (status = 404, description = "Room unknown or inactive"),
    ),
    tag = "sensors"
)]
pub async fn room_measurements(
    State(state): State<AppState>,
    Path((room_id, sensor_type)): Path<(i64, SensorType)>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<RoomMeasurement>> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let rows = state
        .sensors
        .room_measurements(room_id, sensor_type, limit)
        .await?;
    let message = format!("{} {sensor_type} readings", rows.len());
    Ok(Json(ApiResponse::ok(rows, message)))
}

/// Conformity of one room.
#[utoipa::path(
    get,
    path = "/api/sensors/rooms/{room_id}/conformity",
    params(("room_id" = i64, Path, description = "Room id"), LimitParams),
    responses(
        (status = 200, description = "Room conformity", body = ApiResponse<RoomConformity>),
        (status = 404, description = "Room unknown or inactive"),
        (status = 422, description = "Non-finite average or bound"),
    ),
    tag = "conformity"
)]
pub async fn room_conformity(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(params): Query<LimitParams>,
) -> ApiResult<RoomConformity> {
    let window = params.limit.unwrap_or(state.measurement_window);
    let result = state.sensors.check_room(room_id, window).await?;
    let message = format!("Room {room_id}: {}", result.status);
    Ok(Json(ApiResponse::ok(result, message)))
}

/// Conformity of every active room with building-wide statistics.
#[utoipa::path(
    get,
    path = "/api/sensors/conformity",
    params(LimitParams),
    responses(
        (status = 200, description = "Conformity report", body = ApiResponse<ConformityReport>),
        (status = 400, description = "Invalid limit"),
        (status = 422, description = "Non-finite average or bound"),
    ),
    tag = "conformity"
)]
pub async fn building_conformity(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<ConformityReport> {
    let window = params.limit.unwrap_or(state.measurement_window);
    let report = state.sensors.check_all_rooms(window).await?;
    let message = format!(
        "{} of {} rooms compliant",
        report.statistics.compliant, report.statistics.total
    );
    Ok(Json(ApiResponse::ok(report, message)))
}

/// An active sensor with its latest readings.
#[utoipa::path(
    get,
    path = "/api/sensors/{sensor_id}/data",
    params(("sensor_id" = i64, Path, description = "Sensor id"), LimitParams),
    responses(
        (status = 200, description = "Sensor and latest readings", body = ApiResponse<SensorReadings>),
        (status = 404, description = "Sensor unknown or inactive"),
    ),
    tag = "sensors"
)]
pub async fn sensor_data(
    State(state): State<AppState>,
    Path(sensor_id): Path<i64>,
    Query(params): Query<LimitParams>,
) -> ApiResult<SensorReadings> {
    let limit = params.limit.unwrap_or(1);
    let data = state.sensors.sensor_latest(sensor_id, limit).await?;
    Ok(Json(ApiResponse::ok(data, format!("Sensor {sensor_id}"))))
}

/// Reading history of an active sensor, newest first.
#[utoipa::path(
    get,
    path = "/api/sensors/{sensor_id}/measurements",
    params(("sensor_id" = i64, Path, description = "Sensor id"), LimitParams),
    responses(
        (status = 200, description = "Readings", body = ApiResponse<Vec<Measurement>>),
        (status = 404, description = "Sensor unknown or inactive"),
    ),
    tag = "sensors"
)]
pub async fn sensor_measurements(
    State(state): State<AppState>,
    Path(sensor_id): Path<i64>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<Measurement>> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let rows = state.sensors.sensor_measurements(sensor_id, limit).await?;
    let message = format!("{} readings", rows.len());
    Ok(Json(ApiResponse::ok(rows, message)))
}
