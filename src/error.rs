use crate::db::models::SensorType;

/// Failure kinds surfaced by the services. The HTTP layer maps each kind to a
/// status code in `api::errors`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// A non-finite average or bound reached the scoring function.
    #[error("invalid measurement for {quantity}: {value}")]
    InvalidMeasurement { quantity: SensorType, value: f64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
