use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Mirrors the `sensor_type` Postgres enum.
///
/// A sensor's type is fixed at creation; it doubles as the measured quantity
/// when scoring a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "sensor_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Temperature,
    Humidity,
    Pressure,
}

impl SensorType {
    /// Scoring order: temperature, then humidity, then pressure.
    pub const ALL: [SensorType; 3] = [
        SensorType::Temperature,
        SensorType::Humidity,
        SensorType::Pressure,
    ];

    /// Unit stored alongside readings of this type.
    pub fn unit(self) -> &'static str {
        match self {
            SensorType::Temperature => "°C",
            SensorType::Humidity => "%",
            SensorType::Pressure => "hPa",
        }
    }

    /// Capitalised name used in alert messages.
    pub fn label(self) -> &'static str {
        match self {
            SensorType::Temperature => "Temperature",
            SensorType::Humidity => "Humidity",
            SensorType::Pressure => "Pressure",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SensorType::Temperature => "temperature",
            SensorType::Humidity => "humidity",
            SensorType::Pressure => "pressure",
        };
        f.write_str(s)
    }
}

/// Mirrors the `room_state` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "room_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    #[default]
    Active,
    Inactive,
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub building: String,
    pub floor: i32,
    pub capacity: i32,
    pub state: RoomState,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/admin/rooms`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewRoom {
    pub name: String,
    pub building: String,
    pub floor: i32,
    pub capacity: i32,
    #[serde(default)]
    pub state: RoomState,
}

/// Body of `PATCH /api/admin/rooms/{id}`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RoomChanges {
    pub name: Option<String>,
    pub building: Option<String>,
    pub floor: Option<i32>,
    pub capacity: Option<i32>,
    pub state: Option<RoomState>,
}

impl RoomChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.building.is_none()
            && self.floor.is_none()
            && self.capacity.is_none()
            && self.state.is_none()
    }
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Sensor {
    pub id: i64,
    pub name: String,
    pub sensor_type: SensorType,
    pub installed_at: DateTime<Utc>,
    pub is_active: bool,
    pub room_id: Option<i64>,
}

/// A sensor joined with the room it is linked to, if any.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct SensorDetails {
    pub id: i64,
    pub name: String,
    pub sensor_type: SensorType,
    pub installed_at: DateTime<Utc>,
    pub is_active: bool,
    pub room_id: Option<i64>,
    pub room_name: Option<String>,
    pub building: Option<String>,
    pub floor: Option<i32>,
}

/// Admin listing row: a sensor, its room, a status label and its last reading
/// since installation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct SensorOverview {
    pub id: i64,
    pub name: String,
    pub sensor_type: SensorType,
    pub installed_at: DateTime<Utc>,
    pub is_active: bool,
    pub room_id: Option<i64>,
    pub room_name: Option<String>,
    pub building: Option<String>,
    pub floor: Option<i32>,
    /// `unassigned`, `inactive` or `active`.
    pub status: String,
    pub last_value: Option<f64>,
    pub last_unit: Option<String>,
    pub last_recorded_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/admin/sensors`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewSensor {
    pub name: String,
    pub sensor_type: SensorType,
    pub room_id: i64,
}

/// Active sensors of one active room.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct RoomSensorSummary {
    pub room_id: i64,
    pub room_name: String,
    pub building: String,
    pub floor: i32,
    pub capacity: i32,
    pub sensor_count: i64,
    /// `"name (type)"` entries joined by `", "`; `None` for a room without sensors.
    pub sensors: Option<String>,
}

// ---------------------------------------------------------------------------
// Measurements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Measurement {
    pub id: i64,
    pub sensor_id: i64,
    pub value: f64,
    pub unit: String,
    pub recorded_at: DateTime<Utc>,
}

/// A reading joined with its sensor and room, for per-room listings.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct RoomMeasurement {
    pub sensor_id: i64,
    pub sensor_name: String,
    pub value: f64,
    pub unit: String,
    pub recorded_at: DateTime<Utc>,
    pub room_name: String,
    pub building: String,
    pub floor: i32,
}

/// Latest per-quantity averages of one active room. Each average is `None`
/// when the room has no active sensor of that type or no reading yet.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct RoomAverages {
    pub room_id: i64,
    pub room_name: String,
    pub building: String,
    pub floor: i32,
    pub avg_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_pressure: Option<f64>,
    pub temperature_unit: Option<String>,
    pub humidity_unit: Option<String>,
    pub pressure_unit: Option<String>,
}

impl RoomAverages {
    pub fn has_data(&self) -> bool {
        self.avg_temperature.is_some() || self.avg_humidity.is_some() || self.avg_pressure.is_some()
    }
}

// ---------------------------------------------------------------------------
// Threshold sets
// ---------------------------------------------------------------------------

/// Comfort bounds of a room over a validity window. `valid_until = None`
/// means open-ended.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct ThresholdSet {
    pub id: i64,
    pub room_id: i64,
    pub temp_high: Option<f64>,
    pub temp_low: Option<f64>,
    pub humidity_high: Option<f64>,
    pub humidity_low: Option<f64>,
    pub pressure_high: Option<f64>,
    pub pressure_low: Option<f64>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Body of `POST /api/admin/rooms/{id}/thresholds`. Absent bounds are not enforced.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewThresholds {
    pub temp_high: Option<f64>,
    pub temp_low: Option<f64>,
    pub humidity_high: Option<f64>,
    pub humidity_low: Option<f64>,
    pub pressure_high: Option<f64>,
    pub pressure_low: Option<f64>,
    /// Closing date of the new set; open-ended when absent.
    pub valid_until: Option<DateTime<Utc>>,
}
