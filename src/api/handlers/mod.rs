pub mod admin;
pub mod readings;
pub mod rooms;

use axum::Json;
use utoipa::OpenApi;

use super::{
    dto::{ApiResponse, AssociateRequest, ChangeRoomRequest, Deleted},
    errors::AppError,
};
use crate::{
    admin::service::{AdminStatistics, SensorListing, SensorTotals},
    conformity::{
        report::{
            AlertsByType, ConformityReport, ReportParameters, RoomAlert, RoomConformity, Scoring,
            Statistics,
        },
        Evaluation, Level, QuantityCheck, Status,
    },
    db::models::{
        Measurement, NewRoom, NewSensor, NewThresholds, Room, RoomAverages, RoomChanges,
        RoomMeasurement, RoomSensorSummary, RoomState, Sensor, SensorDetails, SensorOverview,
        SensorType, ThresholdSet,
    },
    sensors::service::SensorReadings,
};

pub(crate) type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

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
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        readings::list_rooms,
        readings::room_sensors,
        readings::room_averages,
        readings::room_measurements,
        readings::room_conformity,
        readings::building_conformity,
        readings::sensor_data,
        readings::sensor_measurements,
        admin::list_sensors,
        admin::create_sensor,
        admin::available_sensors,
        admin::unavailable_sensors,
        admin::sensors_by_room,
        admin::statistics,
        admin::get_sensor,
        admin::delete_sensor,
        admin::associate,
        admin::dissociate,
        admin::change_room,
        admin::deactivate,
        admin::reactivate,
        rooms::list_rooms,
        rooms::create_room,
        rooms::get_room,
        rooms::update_room,
        rooms::delete_room,
        rooms::active_thresholds,
        rooms::create_thresholds,
    ),
    components(schemas(
        SensorType,
        RoomState,
        Room,
        NewRoom,
        RoomChanges,
        Sensor,
        SensorDetails,
        SensorOverview,
        NewSensor,
        RoomSensorSummary,
        Measurement,
        RoomMeasurement,
        RoomAverages,
        ThresholdSet,
        NewThresholds,
        SensorReadings,
        SensorListing,
        SensorTotals,
        AdminStatistics,
        Status,
        Level,
        QuantityCheck,
        Evaluation,
        RoomConformity,
        Statistics,
        Scoring,
        RoomAlert,
        AlertsByType,
        ReportParameters,
        ConformityReport,
        AssociateRequest,
        ChangeRoomRequest,
        Deleted,
    )),
    tags(
        (name = "sensors",    description = "Rooms, sensors and readings"),
        (name = "conformity", description = "Room conformity against comfort thresholds"),
        (name = "admin",      description = "Sensor administration"),
        (name = "rooms",      description = "Room administration and threshold sets"),
        (name = "system",     description = "System endpoints"),
    ),
    info(
        title = "Climhetic Backend API",
        version = "0.1.0",
        description = "REST API for building sensor monitoring and room conformity"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
