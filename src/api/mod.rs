pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, put},
    Router,
};
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{admin::AdminService, rooms::RoomService, sensors::SensorService};
use handlers::{admin, readings, rooms, ApiDoc};

/// Services shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub sensors: SensorService,
    pub admin: AdminService,
    pub rooms: RoomService,
    /// Readings per sensor averaged when a request gives no `limit`.
    pub measurement_window: i64,
}

impl AppState {
    pub fn new(pool: PgPool, measurement_window: i64) -> Self {
        Self {
            sensors: SensorService::new(pool.clone()),
            admin: AdminService::new(pool.clone()),
            rooms: RoomService::new(pool),
            measurement_window,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        // Read side
        .route("/api/sensors/rooms", get(readings::list_rooms))
        .route(
            "/api/sensors/rooms/{room_id}/sensors",
            get(readings::room_sensors),
        )
        .route(
            "/api/sensors/rooms/{room_id}/averages",
            get(readings::room_averages),
        )
        .route(
            "/api/sensors/rooms/{room_id}/measurements/{sensor_type}",
            get(readings::room_measurements),
        )
        .route(
            "/api/sensors/rooms/{room_id}/conformity",
            get(readings::room_conformity),
        )
        .route("/api/sensors/conformity", get(readings::building_conformity))
        .route("/api/sensors/{sensor_id}/data", get(readings::sensor_data))
        .route(
            "/api/sensors/{sensor_id}/measurements",
            get(readings::sensor_measurements),
        )
        // Sensor administration
        .route(
            "/api/admin/sensors",
            get(admin::list_sensors).post(admin::create_sensor),
        )
        .route("/api/admin/sensors/available", get(admin::available_sensors))
        .route(
            "/api/admin/sensors/unavailable",
            get(admin::unavailable_sensors),
        )
        .route("/api/admin/sensors/by-room", get(admin::sensors_by_room))
        .route("/api/admin/statistics", get(admin::statistics))
        .route(
            "/api/admin/sensors/{id}",
            get(admin::get_sensor).delete(admin::delete_sensor),
        )
        .route("/api/admin/sensors/{id}/associate", put(admin::associate))
        .route("/api/admin/sensors/{id}/dissociate", put(admin::dissociate))
        .route("/api/admin/sensors/{id}/change-room", put(admin::change_room))
        .route("/api/admin/sensors/{id}/deactivate", put(admin::deactivate))
        .route("/api/admin/sensors/{id}/reactivate", put(admin::reactivate))
        // Room administration
        .route(
            "/api/admin/rooms",
            get(rooms::list_rooms).post(rooms::create_room),
        )
        .route(
            "/api/admin/rooms/{id}",
            get(rooms::get_room)
                .patch(rooms::update_room)
                .delete(rooms::delete_room),
        )
        .route(
            "/api/admin/rooms/{id}/thresholds",
            get(rooms::active_thresholds).post(rooms::create_thresholds),
        )
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
