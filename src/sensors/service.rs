use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    conformity::report::{ConformityReport, RoomConformity},
    db::{
        models::{
            Measurement, Room, RoomAverages, RoomMeasurement, SensorDetails, SensorType,
            ThresholdSet,
        },
        queries,
    },
    error::{Error, Result},
};

/// Largest `limit` accepted by the read endpoints.
pub const MAX_LIMIT: i64 = 1000;

/// An active sensor together with its most recent readings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SensorReadings {
    pub sensor: SensorDetails,
    /// Newest first.
    pub measurements: Vec<Measurement>,
}

/// Read side of the monitoring API: rooms, their sensors and readings, and
/// room conformity.
#[derive(Debug, Clone)]
pub struct SensorService {
    pool: PgPool,
}

impl SensorService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active rooms ordered by building, floor, name.
    pub async fn active_rooms(&self) -> Result<Vec<Room>> {
        let rooms = sqlx::query_as::<_, Room>(
            r#"
            SELECT id, name, building, floor, capacity, state, created_at
            FROM rooms
            WHERE state = 'active'
            ORDER BY building, floor, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rooms)
    }

    /// Active sensors linked to `room_id`, ordered by type then name.
    pub async fn room_sensors(&self, room_id: i64) -> Result<Vec<SensorDetails>> {
        self.require_active_room(room_id).await?;

        let sensors = sqlx::query_as::<_, SensorDetails>(
            r#"
            SELECT s.id, s.name, s.sensor_type, s.installed_at, s.is_active, s.room_id,
                   r.name AS room_name, r.building, r.floor
            FROM sensors s
            JOIN rooms r ON r.id = s.room_id
            WHERE s.room_id = $1 AND s.is_active
            ORDER BY s.sensor_type, s.name
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sensors)
    }

    /// Per-quantity averages of an active room.
    ///
    /// For every active sensor in the room, its `window` most recent readings
    /// since installation are taken; readings of sensors of the same type are
    /// then averaged together.
    pub async fn room_averages(&self, room_id: i64, window: i64) -> Result<RoomAverages> {
        let window = checked_limit(window)?;
        self.averages(room_id, window).await
    }

    /// [`Self::room_averages`] with an already validated window.
    async fn averages(&self, room_id: i64, window: i64) -> Result<RoomAverages> {
        debug!(room_id, window, "Computing room averages");

        sqlx::query_as::<_, RoomAverages>(
            r#"
            WITH latest AS (
                SELECT s.sensor_type,
                       m.value,
                       m.unit,
                       ROW_NUMBER() OVER (
                           PARTITION BY m.sensor_id
                           ORDER BY m.recorded_at DESC, m.id DESC
                       ) AS rn
                FROM sensors s
                JOIN measurements m
                  ON m.sensor_id = s.id
                 AND m.recorded_at >= s.installed_at
                WHERE s.room_id = $1 AND s.is_active
            )
            SELECT r.id   AS room_id,
                   r.name AS room_name,
                   r.building,
                   r.floor,
                   AVG(l.value) FILTER (WHERE l.sensor_type = 'temperature') AS avg_temperature,
                   AVG(l.value) FILTER (WHERE l.sensor_type = 'humidity')    AS avg_humidity,
                   AVG(l.value) FILTER (WHERE l.sensor_type = 'pressure')    AS avg_pressure,
                   MAX(l.unit)  FILTER (WHERE l.sensor_type = 'temperature') AS temperature_unit,
                   MAX(l.unit)  FILTER (WHERE l.sensor_type = 'humidity')    AS humidity_unit,
                   MAX(l.unit)  FILTER (WHERE l.sensor_type = 'pressure')    AS pressure_unit
            FROM rooms r
            LEFT JOIN latest l ON l.rn <= $2
            WHERE r.id = $1 AND r.state = 'active'
            GROUP BY r.id, r.name, r.building, r.floor
            "#,
        )
        .bind(room_id)
        .bind(window)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| room_not_found(room_id))
    }

    /// Most recent readings of one type across the room's active sensors.
    pub async fn room_measurements(
        &self,
        room_id: i64,
        sensor_type: SensorType,
        limit: i64,
    ) -> Result<Vec<RoomMeasurement>> {
        let limit = checked_limit(limit)?;
        self.require_active_room(room_id).await?;

        let rows = sqlx::query_as::<_, RoomMeasurement>(
            r#"
            SELECT s.id AS sensor_id,
                   s.name AS sensor_name,
                   m.value,
                   m.unit,
                   m.recorded_at,
                   r.name AS room_name,
                   r.building,
                   r.floor
            FROM sensors s
            JOIN rooms r ON r.id = s.room_id
            JOIN measurements m ON m.sensor_id = s.id
            WHERE r.id = $1
              AND s.sensor_type = $2
              AND s.is_active
            ORDER BY m.recorded_at DESC, m.id DESC
            LIMIT $3
            "#,
        )
        .bind(room_id)
        .bind(sensor_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// An active sensor with its `limit` latest readings.
    pub async fn sensor_latest(&self, sensor_id: i64, limit: i64) -> Result<SensorReadings> {
        let limit = checked_limit(limit)?;
        let sensor = self.active_sensor(sensor_id).await?;
        let measurements = self.measurements(sensor_id, limit).await?;
        Ok(SensorReadings { sensor, measurements })
    }

    /// Reading history of an active sensor, newest first.
    pub async fn sensor_measurements(&self, sensor_id: i64, limit: i64) -> Result<Vec<Measurement>> {
        let limit = checked_limit(limit)?;
        self.active_sensor(sensor_id).await?;
        self.measurements(sensor_id, limit).await
    }

    pub async fn active_thresholds(&self, room_id: i64) -> Result<Option<ThresholdSet>> {
        Ok(queries::active_thresholds(&self.pool, room_id).await?)
    }

    // -----------------------------------------------------------------------
    // Conformity
    // -----------------------------------------------------------------------

    /// Conformity of a single active room.
    pub async fn check_room(&self, room_id: i64, window: i64) -> Result<RoomConformity> {
        let window = checked_limit(window)?;
        let room = self.require_active_room(room_id).await?;
        let averages = self.averages(room_id, window).await?;
        self.assess(room, Some(averages)).await
    }

    /// Conformity of every active room, with building-wide statistics.
    pub async fn check_all_rooms(&self, window: i64) -> Result<ConformityReport> {
        let window = checked_limit(window)?;
        let rooms = self.active_rooms().await?;
        let mut results = Vec::with_capacity(rooms.len());

        for room in rooms {
            // A room deactivated since the listing simply has no data.
            let averages = match self.averages(room.id, window).await {
                Ok(a) => Some(a),
                Err(Error::NotFound(_)) => None,
                Err(e) => return Err(e),
            };
            results.push(self.assess(room, averages).await?);
        }

        let report = ConformityReport::build(results, window);
        info!(
            rooms = report.statistics.total,
            compliant = report.statistics.compliant,
            non_compliant = report.statistics.non_compliant,
            "Conformity check completed"
        );
        Ok(report)
    }

    async fn assess(&self, room: Room, averages: Option<RoomAverages>) -> Result<RoomConformity> {
        let averages = match averages {
            Some(a) if a.has_data() => a,
            other => {
                warn!(room_id = room.id, "No sensor data for room");
                return Ok(RoomConformity::no_data(room, other));
            }
        };

        let thresholds = self.active_thresholds(room.id).await?;
        if thresholds.is_none() {
            warn!(room_id = room.id, "No active thresholds for room");
        }
        RoomConformity::assess(room, averages, thresholds)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn require_active_room(&self, room_id: i64) -> Result<Room> {
        queries::active_room(&self.pool, room_id)
            .await?
            .ok_or_else(|| room_not_found(room_id))
    }

    async fn active_sensor(&self, sensor_id: i64) -> Result<SensorDetails> {
        queries::sensor_details(&self.pool, sensor_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| Error::not_found(format!("Sensor {sensor_id} not found or inactive")))
    }

    async fn measurements(&self, sensor_id: i64, limit: i64) -> Result<Vec<Measurement>> {
        let rows = sqlx::query_as::<_, Measurement>(
            r#"
            SELECT id, sensor_id, value, unit, recorded_at
            FROM measurements
            WHERE sensor_id = $1
            ORDER BY recorded_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(sensor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn room_not_found(room_id: i64) -> Error {
    Error::not_found(format!("Room {room_id} not found or inactive"))
}

/// Validate a `limit`/window query parameter.
pub(crate) fn checked_limit(limit: i64) -> Result<i64> {
    if (1..=MAX_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(Error::validation(format!("limit must be between 1 and {MAX_LIMIT}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{admin::AdminService, db::models::NewSensor};

    #[test]
    fn limit_bounds() {
        assert_eq!(checked_limit(1).unwrap(), 1);
        assert_eq!(checked_limit(MAX_LIMIT).unwrap(), MAX_LIMIT);
        assert!(matches!(checked_limit(0), Err(Error::Validation(_))));
        assert!(matches!(checked_limit(-3), Err(Error::Validation(_))));
        assert!(matches!(checked_limit(MAX_LIMIT + 1), Err(Error::Validation(_))));
    }

    // -----------------------------------------------------------------------
    // Room averages
    // -----------------------------------------------------------------------

    async fn insert_room(pool: &PgPool, name: &str) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO rooms (name, building, floor, capacity) VALUES ($1, 'A', 1, 20) RETURNING id",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    /// Sensor installed `installed_secs` seconds from now (negative: in the past).
    async fn insert_sensor(
        pool: &PgPool,
        room_id: i64,
        sensor_type: SensorType,
        installed_secs: f64,
    ) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO sensors (name, sensor_type, room_id, installed_at)
            VALUES ($1, $2, $3, now() + make_interval(secs => $4))
            RETURNING id
            "#,
        )
        .bind(format!("{sensor_type}-{room_id}"))
        .bind(sensor_type)
        .bind(room_id)
        .bind(installed_secs)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn insert_reading(
        pool: &PgPool,
        sensor_id: i64,
        sensor_type: SensorType,
        value: f64,
        recorded_secs: f64,
    ) {
        sqlx::query(
            r#"
            INSERT INTO measurements (sensor_id, value, unit, recorded_at)
            VALUES ($1, $2, $3, now() + make_interval(secs => $4))
            "#,
        )
        .bind(sensor_id)
        .bind(value)
        .bind(sensor_type.unit())
        .bind(recorded_secs)
        .execute(pool)
        .await
        .unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn window_takes_the_latest_readings_of_each_sensor(pool: PgPool) {
        let room = insert_room(&pool, "R1").await;
        let t = insert_sensor(&pool, room, SensorType::Temperature, -3600.0).await;
        insert_reading(&pool, t, SensorType::Temperature, 10.0, -300.0).await;
        insert_reading(&pool, t, SensorType::Temperature, 20.0, -200.0).await;
        insert_reading(&pool, t, SensorType::Temperature, 30.0, -100.0).await;

        let service = SensorService::new(pool);
        let avg = |w| {
            let service = service.clone();
            async move { service.room_averages(room, w).await.unwrap().avg_temperature }
        };
        assert_eq!(avg(1).await, Some(30.0));
        assert_eq!(avg(2).await, Some(25.0));
        assert_eq!(avg(3).await, Some(20.0));
        assert_eq!(avg(MAX_LIMIT).await, Some(20.0));

        let averages = service.room_averages(room, 1).await.unwrap();
        assert_eq!(averages.temperature_unit.as_deref(), Some("°C"));
        assert_eq!(averages.avg_humidity, None);
        assert_eq!(averages.avg_pressure, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn readings_before_installation_are_ignored(pool: PgPool) {
        let room = insert_room(&pool, "R1").await;
        let h = insert_sensor(&pool, room, SensorType::Humidity, -3600.0).await;
        insert_reading(&pool, h, SensorType::Humidity, 99.0, -7200.0).await;
        insert_reading(&pool, h, SensorType::Humidity, 45.0, -60.0).await;

        let averages = SensorService::new(pool).room_averages(room, 5).await.unwrap();
        assert_eq!(averages.avg_humidity, Some(45.0));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn moving_a_sensor_drops_its_earlier_readings(pool: PgPool) {
        let first = insert_room(&pool, "R1").await;
        let second = insert_room(&pool, "R2").await;
        let admin = AdminService::new(pool.clone());
        let sensor = admin
            .create_sensor(NewSensor {
                name: "T1".to_owned(),
                sensor_type: SensorType::Temperature,
                room_id: first,
            })
            .await
            .unwrap();
        insert_reading(&pool, sensor.id, SensorType::Temperature, 23.0, 0.0).await;

        let service = SensorService::new(pool.clone());
        assert_eq!(
            service.room_averages(first, 1).await.unwrap().avg_temperature,
            Some(23.0)
        );

        admin.change_room(sensor.id, second).await.unwrap();
        assert!(!service.room_averages(first, 10).await.unwrap().has_data());
        assert!(!service.room_averages(second, 10).await.unwrap().has_data());

        insert_reading(&pool, sensor.id, SensorType::Temperature, 19.0, 0.0).await;
        assert_eq!(
            service.room_averages(second, 10).await.unwrap().avg_temperature,
            Some(19.0)
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn sensors_of_one_type_are_averaged_together(pool: PgPool) {
        let room = insert_room(&pool, "R1").await;
        // Inserted directly; the admin service refuses a second active sensor of a type.
        let a = insert_sensor(&pool, room, SensorType::Pressure, -3600.0).await;
        let b = insert_sensor(&pool, room, SensorType::Pressure, -3600.0).await;
        insert_reading(&pool, a, SensorType::Pressure, 900.0, -600.0).await;
        insert_reading(&pool, a, SensorType::Pressure, 1010.0, -60.0).await;
        insert_reading(&pool, b, SensorType::Pressure, 1020.0, -30.0).await;

        let service = SensorService::new(pool);
        let averages = service.room_averages(room, 1).await.unwrap();
        assert_eq!(averages.avg_pressure, Some(1015.0));
        assert_eq!(averages.pressure_unit.as_deref(), Some("hPa"));

        // a: 900 and 1010, b: 1020
        let wider = service.room_averages(room, 2).await.unwrap();
        assert_eq!(wider.avg_pressure, Some(2930.0 / 3.0));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn inactive_sensors_do_not_count(pool: PgPool) {
        let room = insert_room(&pool, "R1").await;
        let t = insert_sensor(&pool, room, SensorType::Temperature, -3600.0).await;
        insert_reading(&pool, t, SensorType::Temperature, 21.0, -60.0).await;
        sqlx::query("UPDATE sensors SET is_active = FALSE WHERE id = $1")
            .bind(t)
            .execute(&pool)
            .await
            .unwrap();

        let service = SensorService::new(pool);
        assert!(!service.room_averages(room, 1).await.unwrap().has_data());

        let result = service.check_room(room, 1).await.unwrap();
        assert_eq!(result.status, crate::conformity::Status::NoData);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unknown_room_is_not_found(pool: PgPool) {
        let service = SensorService::new(pool);
        assert!(matches!(
            service.room_averages(4242, 1).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(service.check_room(4242, 1).await, Err(Error::NotFound(_))));
    }
}
