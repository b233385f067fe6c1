//! Room administration and threshold sets.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::{
        dto::{ApiResponse, DeleteRoomParams, Deleted, PageParams},
        errors::AppError,
        AppState,
    },
    db::models::{NewRoom, NewThresholds, Room, RoomChanges, ThresholdSet},
};

use super::ApiResult;

const DEFAULT_PAGE_SIZE: i64 = 50;

/// All rooms, newest first.
#[utoipa::path(
    get,
    path = "/api/admin/rooms",
    params(PageParams),
    responses(
        (status = 200, description = "Rooms", body = ApiResponse<Vec<Room>>),
        (status = 400, description = "Invalid paging"),
    ),
    tag = "rooms"
)]
pub async fn list_rooms(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Vec<Room>> {
    let rooms = state
        .rooms
        .list(
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            params.offset.unwrap_or(0),
        )
        .await?;
    let message = format!("{} rooms", rooms.len());
    Ok(Json(ApiResponse::ok(rooms, message)))
}

#[utoipa::path(
    post,
    path = "/api/admin/rooms",
    request_body = NewRoom,
    responses(
        (status = 201, description = "Room created", body = ApiResponse<Room>),
        (status = 400, description = "Invalid room"),
    ),
    tag = "rooms"
)]
pub async fn create_room(
    State(state): State<AppState>,
    Json(body): Json<NewRoom>,
) -> Result<(StatusCode, Json<ApiResponse<Room>>), AppError> {
    let room = state.rooms.create(body).await?;
    let message = format!("Room {} created", room.id);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(room, message))))
}

#[utoipa::path(
    get,
    path = "/api/admin/rooms/{id}",
    params(("id" = i64, Path, description = "Room id")),
    responses(
        (status = 200, description = "Room", body = ApiResponse<Room>),
        (status = 404, description = "Room not found"),
    ),
    tag = "rooms"
)]
pub async fn get_room(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Room> {
    let room = state.rooms.get(id).await?;
    Ok(Json(ApiResponse::ok(room, format!("Room {id}"))))
}

/// Partial update; absent fields are left untouched.
#[utoipa::path(
    patch,
    path = "/api/admin/rooms/{id}",
    params(("id" = i64, Path, description = "Room id")),
    request_body = RoomChanges,
    responses(
        (status = 200, description = "Room updated", body = ApiResponse<Room>),
        (status = 400, description = "No field or invalid field"),
        (status = 404, description = "Room not found"),
    ),
    tag = "rooms"
)]
pub async fn update_room(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<RoomChanges>,
) -> ApiResult<Room> {
    let room = state.rooms.update(id, body).await?;
    Ok(Json(ApiResponse::ok(room, format!("Room {id} updated"))))
}

/// Mark a room inactive, or delete it with `?hard=true`.
#[utoipa::path(
    delete,
    path = "/api/admin/rooms/{id}",
    params(("id" = i64, Path, description = "Room id"), DeleteRoomParams),
    responses(
        (status = 200, description = "Room deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Room not found"),
        (status = 409, description = "Room has threshold history"),
    ),
    tag = "rooms"
)]
pub async fn delete_room(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<DeleteRoomParams>,
) -> ApiResult<Deleted> {
    let hard = params.hard.unwrap_or(false);
    state.rooms.delete(id, hard).await?;
    let message = if hard {
        format!("Room {id} deleted")
    } else {
        format!("Room {id} deactivated")
    };
    Ok(Json(ApiResponse::ok(Deleted { id }, message)))
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// The threshold set currently in force; `data` is null when there is none.
#[utoipa::path(
    get,
    path = "/api/admin/rooms/{id}/thresholds",
    params(("id" = i64, Path, description = "Room id")),
    responses(
        (status = 200, description = "Active thresholds", body = ApiResponse<ThresholdSet>),
        (status = 404, description = "Room not found"),
    ),
    tag = "rooms"
)]
pub async fn active_thresholds(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ThresholdSet> {
    let set = state.rooms.active_thresholds(id).await?;
    let message = match &set {
        Some(_) => format!("Active thresholds of room {id}"),
        None => format!("Room {id} has no active thresholds"),
    };
    Ok(Json(ApiResponse {
        success: true,
        data: set,
        message,
    }))
}

/// Put a new threshold set in force; the previous one is closed.
#[utoipa::path(
    post,
    path = "/api/admin/rooms/{id}/thresholds",
    params(("id" = i64, Path, description = "Room id")),
    request_body = NewThresholds,
    responses(
        (status = 201, description = "Thresholds created", body = ApiResponse<ThresholdSet>),
        (status = 400, description = "Inverted or non-finite bounds"),
        (status = 404, description = "Room not found"),
    ),
    tag = "rooms"
)]
pub async fn create_thresholds(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<NewThresholds>,
) -> Result<(StatusCode, Json<ApiResponse<ThresholdSet>>), AppError> {
    let set = state.rooms.create_thresholds(id, body).await?;
    let message = format!("Thresholds {} in force for room {id}", set.id);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(set, message))))
}
