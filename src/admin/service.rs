use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    db::{
        models::{NewSensor, RoomSensorSummary, Sensor, SensorDetails, SensorOverview, SensorType},
        queries,
    },
    error::{Error, Result},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SensorListing {
    pub sensors: Vec<SensorOverview>,
    pub statistics: SensorTotals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct SensorTotals {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
}

impl SensorTotals {
    fn of(sensors: &[SensorOverview]) -> Self {
        let active = sensors.iter().filter(|s| s.is_active).count();
        Self {
            total: sensors.len(),
            active,
            inactive: sensors.len() - active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct AdminStatistics {
    pub total_sensors: i64,
    pub active_sensors: i64,
    pub inactive_sensors: i64,
    /// Active and linked to a room.
    pub assigned_sensors: i64,
    /// Active and not linked to any room.
    pub available_sensors: i64,
    /// Active rooms.
    pub total_rooms: i64,
    pub rooms_with_sensors: i64,
    pub rooms_without_sensors: i64,
}

#[derive(FromRow)]
struct SensorCounts {
    total_sensors: i64,
    active_sensors: i64,
    inactive_sensors: i64,
    assigned_sensors: i64,
    available_sensors: i64,
}

#[derive(FromRow)]
struct RoomCounts {
    total_rooms: i64,
    rooms_with_sensors: i64,
}

/// Sensor lifecycle administration.
///
/// At most one active sensor of each type may be linked to a room; every
/// operation that links or reactivates a sensor checks this before writing.
#[derive(Debug, Clone)]
pub struct AdminService {
    pool: PgPool,
}

impl AdminService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------------

    /// Every sensor with its room, status label and last reading since
    /// installation; active sensors first.
    pub async fn list_sensors(&self) -> Result<SensorListing> {
        let sensors = sqlx::query_as::<_, SensorOverview>(
            r#"
            SELECT s.id, s.name, s.sensor_type, s.installed_at, s.is_active, s.room_id,
                   r.name AS room_name, r.building, r.floor,
                   CASE
                       WHEN NOT s.is_active   THEN 'inactive'
                       WHEN s.room_id IS NULL THEN 'unassigned'
                       ELSE 'active'
                   END AS status,
                   last.value       AS last_value,
                   last.unit        AS last_unit,
                   last.recorded_at AS last_recorded_at
            FROM sensors s
            LEFT JOIN rooms r ON r.id = s.room_id
            LEFT JOIN LATERAL (
                SELECT m.value, m.unit, m.recorded_at
                FROM measurements m
                WHERE m.sensor_id = s.id AND m.recorded_at >= s.installed_at
                ORDER BY m.recorded_at DESC, m.id DESC
                LIMIT 1
            ) last ON TRUE
            ORDER BY s.is_active DESC, s.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let statistics = SensorTotals::of(&sensors);
        Ok(SensorListing { sensors, statistics })
    }

    /// Active sensors not linked to any room.
    pub async fn available_sensors(&self) -> Result<Vec<Sensor>> {
        let sensors = sqlx::query_as::<_, Sensor>(
            r#"
            SELECT id, name, sensor_type, installed_at, is_active, room_id
            FROM sensors
            WHERE is_active AND room_id IS NULL
            ORDER BY sensor_type, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sensors)
    }

    /// Deactivated sensors.
    pub async fn unavailable_sensors(&self) -> Result<Vec<SensorDetails>> {
        let sensors = sqlx::query_as::<_, SensorDetails>(
            r#"
            SELECT s.id, s.name, s.sensor_type, s.installed_at, s.is_active, s.room_id,
                   r.name AS room_name, r.building, r.floor
            FROM sensors s
            LEFT JOIN rooms r ON r.id = s.room_id
            WHERE NOT s.is_active
            ORDER BY s.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sensors)
    }

    /// Active sensors grouped per active room.
    pub async fn sensors_by_room(&self) -> Result<Vec<RoomSensorSummary>> {
        let rooms = sqlx::query_as::<_, RoomSensorSummary>(
            r#"
            SELECT r.id AS room_id,
                   r.name AS room_name,
                   r.building,
                   r.floor,
                   r.capacity,
                   COUNT(s.id) AS sensor_count,
                   STRING_AGG(
                       s.name || ' (' || s.sensor_type::text || ')',
                       ', ' ORDER BY s.sensor_type, s.name
                   ) AS sensors
            FROM rooms r
            LEFT JOIN sensors s ON s.room_id = r.id AND s.is_active
            WHERE r.state = 'active'
            GROUP BY r.id, r.name, r.building, r.floor, r.capacity
            ORDER BY r.building, r.floor, r.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rooms)
    }

    pub async fn get_sensor(&self, sensor_id: i64) -> Result<SensorDetails> {
        queries::sensor_details(&self.pool, sensor_id)
            .await?
            .ok_or_else(|| sensor_not_found(sensor_id))
    }

    pub async fn statistics(&self) -> Result<AdminStatistics> {
        let sensors = sqlx::query_as::<_, SensorCounts>(
            r#"
            SELECT COUNT(*)                                                 AS total_sensors,
                   COUNT(*) FILTER (WHERE is_active)                        AS active_sensors,
                   COUNT(*) FILTER (WHERE NOT is_active)                    AS inactive_sensors,
                   COUNT(*) FILTER (WHERE is_active AND room_id IS NOT NULL) AS assigned_sensors,
                   COUNT(*) FILTER (WHERE is_active AND room_id IS NULL)    AS available_sensors
            FROM sensors
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let rooms = sqlx::query_as::<_, RoomCounts>(
            r#"
            SELECT COUNT(DISTINCT r.id)      AS total_rooms,
                   COUNT(DISTINCT s.room_id) AS rooms_with_sensors
            FROM rooms r
            LEFT JOIN sensors s ON s.room_id = r.id AND s.is_active
            WHERE r.state = 'active'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminStatistics {
            total_sensors: sensors.total_sensors,
            active_sensors: sensors.active_sensors,
            inactive_sensors: sensors.inactive_sensors,
            assigned_sensors: sensors.assigned_sensors,
            available_sensors: sensors.available_sensors,
            total_rooms: rooms.total_rooms,
            rooms_with_sensors: rooms.rooms_with_sensors,
            rooms_without_sensors: rooms.total_rooms - rooms.rooms_with_sensors,
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------
    //
    // Operations that link a sensor to a room lock the room row first, so the
    // one-active-sensor-per-type check and the write are serialised per room.

    /// Create an active sensor linked to an active room.
    pub async fn create_sensor(&self, new: NewSensor) -> Result<SensorDetails> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::validation("Sensor name is required"));
        }

        let mut tx = self.pool.begin().await?;
        lock_active_room(&mut *tx, new.room_id).await?;
        ensure_type_free(&mut *tx, new.room_id, new.sensor_type, None).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sensors (name, sensor_type, room_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(new.sensor_type)
        .bind(new.room_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(sensor_id = id, room_id = new.room_id, sensor_type = %new.sensor_type, "Sensor created");
        self.get_sensor(id).await
    }

    /// Link an active, unassigned sensor to a room.
    pub async fn associate(&self, sensor_id: i64, room_id: i64) -> Result<SensorDetails> {
        let mut tx = self.pool.begin().await?;
        lock_active_room(&mut *tx, room_id).await?;
        let sensor = lock_sensor(&mut *tx, sensor_id).await?;
        if !sensor.is_active {
            return Err(not_active(sensor_id));
        }
        if sensor.room_id.is_some() {
            return Err(Error::conflict(format!(
                "Sensor {sensor_id} is already linked to a room"
            )));
        }
        ensure_type_free(&mut *tx, room_id, sensor.sensor_type, Some(sensor_id)).await?;

        sqlx::query("UPDATE sensors SET room_id = $1, installed_at = now() WHERE id = $2")
            .bind(room_id)
            .bind(sensor_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(sensor_id, room_id, "Sensor linked to room");
        self.get_sensor(sensor_id).await
    }

    /// Unlink a sensor from its room.
    pub async fn dissociate(&self, sensor_id: i64) -> Result<SensorDetails> {
        let sensor = self.require_sensor(sensor_id).await?;
        if sensor.room_id.is_none() {
            return Err(Error::conflict(format!(
                "Sensor {sensor_id} is not linked to any room"
            )));
        }

        sqlx::query("UPDATE sensors SET room_id = NULL WHERE id = $1")
            .bind(sensor_id)
            .execute(&self.pool)
            .await?;

        info!(sensor_id, "Sensor unlinked from its room");
        self.get_sensor(sensor_id).await
    }

    /// Move an active sensor to another room. Resets its installation date.
    pub async fn change_room(&self, sensor_id: i64, new_room_id: i64) -> Result<SensorDetails> {
        let mut tx = self.pool.begin().await?;
        lock_active_room(&mut *tx, new_room_id).await?;
        let sensor = lock_sensor(&mut *tx, sensor_id).await?;
        if !sensor.is_active {
            return Err(not_active(sensor_id));
        }
        if sensor.room_id == Some(new_room_id) {
            return Err(Error::conflict(format!(
                "Sensor {sensor_id} is already in room {new_room_id}"
            )));
        }
        ensure_type_free(&mut *tx, new_room_id, sensor.sensor_type, Some(sensor_id)).await?;

        sqlx::query("UPDATE sensors SET room_id = $1, installed_at = now() WHERE id = $2")
            .bind(new_room_id)
            .bind(sensor_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            sensor_id,
            from_room = ?sensor.room_id,
            to_room = new_room_id,
            "Sensor moved to another room"
        );
        self.get_sensor(sensor_id).await
    }

    /// Deactivate a sensor and unlink it from its room.
    pub async fn deactivate(&self, sensor_id: i64) -> Result<SensorDetails> {
        let sensor = self.require_sensor(sensor_id).await?;
        if !sensor.is_active {
            return Err(Error::conflict(format!("Sensor {sensor_id} is already inactive")));
        }

        sqlx::query("UPDATE sensors SET is_active = FALSE, room_id = NULL WHERE id = $1")
            .bind(sensor_id)
            .execute(&self.pool)
            .await?;

        info!(sensor_id, previous_room = ?sensor.room_id, "Sensor deactivated");
        self.get_sensor(sensor_id).await
    }

    /// Reactivate a deactivated sensor.
    pub async fn reactivate(&self, sensor_id: i64) -> Result<SensorDetails> {
        let current = self.require_sensor(sensor_id).await?;

        let mut tx = self.pool.begin().await?;
        if let Some(room_id) = current.room_id {
            lock_room(&mut *tx, room_id).await?;
        }
        let sensor = lock_sensor(&mut *tx, sensor_id).await?;
        if sensor.is_active {
            return Err(Error::conflict(format!("Sensor {sensor_id} is already active")));
        }
        if sensor.room_id != current.room_id {
            return Err(Error::conflict(format!(
                "Sensor {sensor_id} was modified concurrently"
            )));
        }
        if let Some(room_id) = sensor.room_id {
            ensure_type_free(&mut *tx, room_id, sensor.sensor_type, Some(sensor_id)).await?;
        }

        sqlx::query("UPDATE sensors SET is_active = TRUE WHERE id = $1")
            .bind(sensor_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(sensor_id, "Sensor reactivated");
        self.get_sensor(sensor_id).await
    }

    /// Permanently delete a sensor and all of its readings.
    pub async fn delete_sensor(&self, sensor_id: i64) -> Result<()> {
        self.require_sensor(sensor_id).await?;

        let mut tx = self.pool.begin().await?;
        let readings = sqlx::query("DELETE FROM measurements WHERE sensor_id = $1")
            .bind(sensor_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM sensors WHERE id = $1")
            .bind(sensor_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(sensor_id, readings, "Sensor deleted");
        Ok(())
    }

    async fn require_sensor(&self, sensor_id: i64) -> Result<Sensor> {
        queries::sensor(&self.pool, sensor_id)
            .await?
            .ok_or_else(|| sensor_not_found(sensor_id))
    }
}

// ---------------------------------------------------------------------------
// Row locks
// ---------------------------------------------------------------------------

async fn lock_active_room(conn: &mut PgConnection, room_id: i64) -> Result<()> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM rooms WHERE id = $1 AND state = 'active' FOR UPDATE")
        .bind(room_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| Error::not_found(format!("Room {room_id} not found or inactive")))
}

async fn lock_room(conn: &mut PgConnection, room_id: i64) -> Result<()> {
    sqlx::query("SELECT id FROM rooms WHERE id = $1 FOR UPDATE")
        .bind(room_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn lock_sensor(conn: &mut PgConnection, sensor_id: i64) -> Result<Sensor> {
    sqlx::query_as::<_, Sensor>(
        r#"
        SELECT id, name, sensor_type, installed_at, is_active, room_id
        FROM sensors
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(sensor_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| sensor_not_found(sensor_id))
}

/// Fail with `Conflict` if another active sensor of `sensor_type` is
/// already linked to `room_id`.
async fn ensure_type_free(
    conn: &mut PgConnection,
    room_id: i64,
    sensor_type: SensorType,
    except: Option<i64>,
) -> Result<()> {
    let taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM sensors
            WHERE room_id = $1
              AND sensor_type = $2
              AND is_active
              AND ($3::bigint IS NULL OR id <> $3)
        )
        "#,
    )
    .bind(room_id)
    .bind(sensor_type)
    .bind(except)
    .fetch_one(&mut *conn)
    .await?;

    if taken {
        warn!(room_id, sensor_type = %sensor_type, "Rejected second active sensor of the same type");
        return Err(Error::conflict(format!(
            "An active {sensor_type} sensor is already linked to room {room_id}"
        )));
    }
    Ok(())
}

fn sensor_not_found(sensor_id: i64) -> Error {
    Error::not_found(format!("Sensor {sensor_id} not found"))
}

fn not_active(sensor_id: i64) -> Error {
    Error::conflict(format!("Sensor {sensor_id} is not active"))
}
