//! Lookups shared by several services.

use sqlx::PgPool;

use super::models::{Room, Sensor, SensorDetails, ThresholdSet};

pub async fn room(pool: &PgPool, room_id: i64) -> sqlx::Result<Option<Room>> {
    sqlx::query_as::<_, Room>(
        r#"
        SELECT id, name, building, floor, capacity, state, created_at
        FROM rooms
        WHERE id = $1
        "#,
    )
    .bind(room_id)
    .fetch_optional(pool)
    .await
}

pub async fn active_room(pool: &PgPool, room_id: i64) -> sqlx::Result<Option<Room>> {
    sqlx::query_as::<_, Room>(
        r#"
        SELECT id, name, building, floor, capacity, state, created_at
        FROM rooms
        WHERE id = $1 AND state = 'active'
        "#,
    )
    .bind(room_id)
    .fetch_optional(pool)
    .await
}

pub async fn sensor(pool: &PgPool, sensor_id: i64) -> sqlx::Result<Option<Sensor>> {
    sqlx::query_as::<_, Sensor>(
        r#"
        SELECT id, name, sensor_type, installed_at, is_active, room_id
        FROM sensors
        WHERE id = $1
        "#,
    )
    .bind(sensor_id)
    .fetch_optional(pool)
    .await
}

/// The threshold set currently in force for `room_id`: started, not yet
/// closed, most recent first.
pub async fn active_thresholds(pool: &PgPool, room_id: i64) -> sqlx::Result<Option<ThresholdSet>> {
    sqlx::query_as::<_, ThresholdSet>(
        r#"
        SELECT id, room_id,
               temp_high, temp_low,
               humidity_high, humidity_low,
               pressure_high, pressure_low,
               valid_from, valid_until
        FROM threshold_sets
        WHERE room_id = $1
          AND valid_from <= now()
          AND (valid_until IS NULL OR valid_until > now())
        ORDER BY valid_from DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(room_id)
    .fetch_optional(pool)
    .await
}

/// A sensor of any state, joined with its room.
pub async fn sensor_details(pool: &PgPool, sensor_id: i64) -> sqlx::Result<Option<SensorDetails>> {
    sqlx::query_as::<_, SensorDetails>(
        r#"
        SELECT s.id, s.name, s.sensor_type, s.installed_at, s.is_active, s.room_id,
               r.name AS room_name, r.building, r.floor
        FROM sensors s
        LEFT JOIN rooms r ON r.id = s.room_id
        WHERE s.id = $1
        "#,
    )
    .bind(sensor_id)
    .fetch_optional(pool)
    .await
}
