//! Sensor administration.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    admin::service::{AdminStatistics, SensorListing},
    api::{
        dto::{ApiResponse, AssociateRequest, ChangeRoomRequest, ConfirmParams, Deleted},
        errors::AppError,
        AppState,
    },
    db::models::{NewSensor, RoomSensorSummary, Sensor, SensorDetails},
    error::Error,
};

use super::ApiResult;

#[utoipa::path(
    get,
    path = "/api/admin/sensors",
    responses(
        (status = 200, description = "All sensors with status and last reading", body = ApiResponse<SensorListing>),
    ),
    tag = "admin"
)]
pub async fn list_sensors(State(state): State<AppState>) -> ApiResult<SensorListing> {
    let listing = state.admin.list_sensors().await?;
    let message = format!("{} sensors", listing.statistics.total);
    Ok(Json(ApiResponse::ok(listing, message)))
}

/// Create a sensor in an active room.
#[utoipa::path(
    post,
    path = "/api/admin/sensors",
    request_body = NewSensor,
    responses(
        (status = 201, description = "Sensor created", body = ApiResponse<SensorDetails>),
        (status = 400, description = "Missing name"),
        (status = 404, description = "Room unknown or inactive"),
        (status = 409, description = "Room already has an active sensor of this type"),
    ),
    tag = "admin"
)]
pub async fn create_sensor(
    State(state): State<AppState>,
    Json(body): Json<NewSensor>,
) -> Result<(StatusCode, Json<ApiResponse<SensorDetails>>), AppError> {
    let sensor = state.admin.create_sensor(body).await?;
    let message = format!("Sensor {} created", sensor.id);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(sensor, message))))
}

/// Active sensors not linked to any room.
#[utoipa::path(
    get,
    path = "/api/admin/sensors/available",
    responses((status = 200, description = "Available sensors", body = ApiResponse<Vec<Sensor>>)),
    tag = "admin"
)]
pub async fn available_sensors(State(state): State<AppState>) -> ApiResult<Vec<Sensor>> {
    let sensors = state.admin.available_sensors().await?;
    let message = format!("{} available sensors", sensors.len());
    Ok(Json(ApiResponse::ok(sensors, message)))
}

/// Deactivated sensors.
#[utoipa::path(
    get,
    path = "/api/admin/sensors/unavailable",
    responses((status = 200, description = "Inactive sensors", body = ApiResponse<Vec<SensorDetails>>)),
    tag = "admin"
)]
pub async fn unavailable_sensors(State(state): State<AppState>) -> ApiResult<Vec<SensorDetails>> {
    let sensors = state.admin.unavailable_sensors().await?;
    let message = format!("{} inactive sensors", sensors.len());
    Ok(Json(ApiResponse::ok(sensors, message)))
}

#[utoipa::path(
    get,
    path = "/api/admin/sensors/by-room",
    responses((status = 200, description = "Active sensors per active room", body = ApiResponse<Vec<RoomSensorSummary>>)),
    tag = "admin"
)]
pub async fn sensors_by_room(State(state): State<AppState>) -> ApiResult<Vec<RoomSensorSummary>> {
    let rooms = state.admin.sensors_by_room().await?;
    Ok(Json(ApiResponse::ok(rooms, "Sensors per room")))
}

#[utoipa::path(
    get,
    path = "/api/admin/statistics",
    responses((status = 200, description = "Sensor and room counts", body = ApiResponse<AdminStatistics>)),
    tag = "admin"
)]
pub async fn statistics(State(state): State<AppState>) -> ApiResult<AdminStatistics> {
    let stats = state.admin.statistics().await?;
    Ok(Json(ApiResponse::ok(stats, "Statistics")))
}

#[utoipa::path(
    get,
    path = "/api/admin/sensors/{id}",
    params(("id" = i64, Path, description = "Sensor id")),
    responses(
        (status = 200, description = "Sensor", body = ApiResponse<SensorDetails>),
        (status = 404, description = "Sensor not found"),
    ),
    tag = "admin"
)]
pub async fn get_sensor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<SensorDetails> {
    let sensor = state.admin.get_sensor(id).await?;
    Ok(Json(ApiResponse::ok(sensor, format!("Sensor {id}"))))
}

/// Delete a sensor and all its readings. Requires `?confirm=true`.
#[utoipa::path(
    delete,
    path = "/api/admin/sensors/{id}",
    params(("id" = i64, Path, description = "Sensor id"), ConfirmParams),
    responses(
        (status = 200, description = "Sensor deleted", body = ApiResponse<Deleted>),
        (status = 400, description = "Deletion not confirmed"),
        (status = 404, description = "Sensor not found"),
    ),
    tag = "admin"
)]
pub async fn delete_sensor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ConfirmParams>,
) -> ApiResult<Deleted> {
    if params.confirm != Some(true) {
        return Err(Error::validation(
            "Deleting a sensor removes all of its readings; pass ?confirm=true",
        )
        .into());
    }
    state.admin.delete_sensor(id).await?;
    Ok(Json(ApiResponse::ok(Deleted { id }, format!("Sensor {id} deleted"))))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/api/admin/sensors/{id}/associate",
    params(("id" = i64, Path, description = "Sensor id")),
    request_body = AssociateRequest,
    responses(
        (status = 200, description = "Sensor linked", body = ApiResponse<SensorDetails>),
        (status = 404, description = "Sensor or room not found"),
        (status = 409, description = "Sensor inactive or already linked, or type already present"),
    ),
    tag = "admin"
)]
pub async fn associate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<AssociateRequest>,
) -> ApiResult<SensorDetails> {
    let sensor = state.admin.associate(id, body.room_id).await?;
    let message = format!("Sensor {id} linked to room {}", body.room_id);
    Ok(Json(ApiResponse::ok(sensor, message)))
}

#[utoipa::path(
    put,
    path = "/api/admin/sensors/{id}/dissociate",
    params(("id" = i64, Path, description = "Sensor id")),
    responses(
        (status = 200, description = "Sensor unlinked", body = ApiResponse<SensorDetails>),
        (status = 404, description = "Sensor not found"),
        (status = 409, description = "Sensor not linked"),
    ),
    tag = "admin"
)]
pub async fn dissociate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<SensorDetails> {
    let sensor = state.admin.dissociate(id).await?;
    Ok(Json(ApiResponse::ok(sensor, format!("Sensor {id} unlinked"))))
}

#[utoipa::path(
    put,
    path = "/api/admin/sensors/{id}/change-room",
    params(("id" = i64, Path, description = "Sensor id")),
    request_body = ChangeRoomRequest,
    responses(
        (status = 200, description = "Sensor moved", body = ApiResponse<SensorDetails>),
        (status = 404, description = "Sensor or room not found"),
        (status = 409, description = "Sensor inactive, same room, or type already present"),
    ),
    tag = "admin"
)]
pub async fn change_room(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ChangeRoomRequest>,
) -> ApiResult<SensorDetails> {
    let sensor = state.admin.change_room(id, body.new_room_id).await?;
    let message = format!("Sensor {id} moved to room {}", body.new_room_id);
    Ok(Json(ApiResponse::ok(sensor, message)))
}

#[utoipa::path(
    put,
    path = "/api/admin/sensors/{id}/deactivate",
    params(("id" = i64, Path, description = "Sensor id")),
    responses(
        (status = 200, description = "Sensor deactivated", body = ApiResponse<SensorDetails>),
        (status = 404, description = "Sensor not found"),
        (status = 409, description = "Sensor already inactive"),
    ),
    tag = "admin"
)]
pub async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<SensorDetails> {
    let sensor = state.admin.deactivate(id).await?;
    Ok(Json(ApiResponse::ok(sensor, format!("Sensor {id} deactivated"))))
}

#[utoipa::path(
    put,
    path = "/api/admin/sensors/{id}/reactivate",
    params(("id" = i64, Path, description = "Sensor id")),
    responses(
        (status = 200, description = "Sensor reactivated", body = ApiResponse<SensorDetails>),
        (status = 404, description = "Sensor not found"),
        (status = 409, description = "Sensor already active, or type already present"),
    ),
    tag = "admin"
)]
pub async fn reactivate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<SensorDetails> {
    let sensor = state.admin.reactivate(id).await?;
    Ok(Json(ApiResponse::ok(sensor, format!("Sensor {id} reactivated"))))
}
