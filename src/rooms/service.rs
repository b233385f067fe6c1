use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    db::{
        self,
        models::{NewRoom, NewThresholds, Room, RoomChanges, ThresholdSet},
        queries,
    },
    error::{Error, Result},
};

/// Room administration and threshold history.
#[derive(Debug, Clone)]
pub struct RoomService {
    pool: PgPool,
}

impl RoomService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All rooms, newest first.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Room>> {
        if limit < 1 {
            return Err(Error::validation("limit must be at least 1"));
        }
        if offset < 0 {
            return Err(Error::validation("offset must not be negative"));
        }

        let rooms = sqlx::query_as::<_, Room>(
            r#"
            SELECT id, name, building, floor, capacity, state, created_at
            FROM rooms
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rooms)
    }

    pub async fn get(&self, room_id: i64) -> Result<Room> {
        queries::room(&self.pool, room_id)
            .await?
            .ok_or_else(|| room_not_found(room_id))
    }

    pub async fn create(&self, new: NewRoom) -> Result<Room> {
        let name = required_text("name", &new.name)?;
        let building = required_text("building", &new.building)?;
        check_capacity(new.capacity)?;

        let room = sqlx::query_as::<_, Room>(
            r#"
            INSERT INTO rooms (name, building, floor, capacity, state)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, building, floor, capacity, state, created_at
            "#,
        )
        .bind(name)
        .bind(building)
        .bind(new.floor)
        .bind(new.capacity)
        .bind(new.state)
        .fetch_one(&self.pool)
        .await?;

        info!(room_id = room.id, name = %room.name, "Room created");
        Ok(room)
    }

    /// Apply the fields present in `changes`; the others are left untouched.
    pub async fn update(&self, room_id: i64, changes: RoomChanges) -> Result<Room> {
        if changes.is_empty() {
            return Err(Error::validation("No field to update"));
        }
        let name = changes.name.as_deref().map(|n| required_text("name", n)).transpose()?;
        let building = changes
            .building
            .as_deref()
            .map(|b| required_text("building", b))
            .transpose()?;
        if let Some(capacity) = changes.capacity {
            check_capacity(capacity)?;
        }

        let room = sqlx::query_as::<_, Room>(
            r#"
            UPDATE rooms
            SET name     = COALESCE($2, name),
                building = COALESCE($3, building),
                floor    = COALESCE($4, floor),
                capacity = COALESCE($5, capacity),
                state    = COALESCE($6, state)
            WHERE id = $1
            RETURNING id, name, building, floor, capacity, state, created_at
            "#,
        )
        .bind(room_id)
        .bind(name)
        .bind(building)
        .bind(changes.floor)
        .bind(changes.capacity)
        .bind(changes.state)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| room_not_found(room_id))?;

        info!(room_id, "Room updated");
        Ok(room)
    }

    /// Soft delete marks the room inactive; hard delete removes the row.
    pub async fn delete(&self, room_id: i64, hard: bool) -> Result<()> {
        let affected = if hard {
            sqlx::query("DELETE FROM rooms WHERE id = $1")
                .bind(room_id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    if db::is_foreign_key_violation(&e) {
                        warn!(room_id, "Refused to delete a room with threshold history");
                        Error::conflict(format!(
                            "Room {room_id} still has threshold history and cannot be deleted"
                        ))
                    } else {
                        Error::from(e)
                    }
                })?
                .rows_affected()
        } else {
            sqlx::query("UPDATE rooms SET state = 'inactive' WHERE id = $1")
                .bind(room_id)
                .execute(&self.pool)
                .await?
                .rows_affected()
        };

        if affected == 0 {
            return Err(room_not_found(room_id));
        }
        info!(room_id, hard, "Room deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Thresholds
    // -----------------------------------------------------------------------

    pub async fn active_thresholds(&self, room_id: i64) -> Result<Option<ThresholdSet>> {
        self.get(room_id).await?;
        Ok(queries::active_thresholds(&self.pool, room_id).await?)
    }

    /// Put a new threshold set in force, closing the current one.
    pub async fn create_thresholds(
        &self,
        room_id: i64,
        bounds: NewThresholds,
    ) -> Result<ThresholdSet> {
        check_bounds(&bounds)?;
        self.get(room_id).await?;

        let mut tx = self.pool.begin().await?;
        let closed = sqlx::query(
            r#"
            UPDATE threshold_sets
            SET valid_until = now()
            WHERE room_id = $1
              AND valid_from <= now()
              AND (valid_until IS NULL OR valid_until > now())
            "#,
        )
        .bind(room_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let set = sqlx::query_as::<_, ThresholdSet>(
            r#"
            INSERT INTO threshold_sets (
                room_id,
                temp_high, temp_low,
                humidity_high, humidity_low,
                pressure_high, pressure_low,
                valid_until
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, room_id,
                      temp_high, temp_low,
                      humidity_high, humidity_low,
                      pressure_high, pressure_low,
                      valid_from, valid_until
            "#,
        )
        .bind(room_id)
        .bind(bounds.temp_high)
        .bind(bounds.temp_low)
        .bind(bounds.humidity_high)
        .bind(bounds.humidity_low)
        .bind(bounds.pressure_high)
        .bind(bounds.pressure_low)
        .bind(bounds.valid_until)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(room_id, threshold_set = set.id, closed, "Thresholds updated");
        Ok(set)
    }
}

fn room_not_found(room_id: i64) -> Error {
    Error::not_found(format!("Room {room_id} not found"))
}

fn required_text<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    Ok(value)
}

fn check_capacity(capacity: i32) -> Result<()> {
    if capacity < 0 {
        return Err(Error::validation("capacity must not be negative"));
    }
    Ok(())
}

fn check_bounds(b: &NewThresholds) -> Result<()> {
    let pairs = [
        ("temperature", b.temp_low, b.temp_high),
        ("humidity", b.humidity_low, b.humidity_high),
        ("pressure", b.pressure_low, b.pressure_high),
    ];
    for (quantity, low, high) in pairs {
        if low.into_iter().chain(high).any(|v| !v.is_finite()) {
            return Err(Error::validation(format!("{quantity} bounds must be finite numbers")));
        }
        if let (Some(low), Some(high)) = (low, high) {
            if low > high {
                return Err(Error::validation(format!(
                    "{quantity} lower bound {low} is above upper bound {high}"
                )));
            }
        }
    }
    if let Some(until) = b.valid_until {
        if until <= chrono::Utc::now() {
            return Err(Error::validation("valid_until must be in the future"));
        }
    }
    Ok(())
}
