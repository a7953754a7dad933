use chrono::NaiveDate;

use concierge_core::dates::InvalidDateRange;
use concierge_core::ids::RoomTypeId;
use concierge_store::StoreError;

/// Booking failures. None of these are fatal to the process.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("no capacity left for {room_type} on {date}")]
    CapacityExceeded { room_type: RoomTypeId, date: NaiveDate },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl BookingError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::NotFound(_) => "not_found",
            Self::Persistence(_) => "persistence",
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::InvalidSeed(msg) => Self::Validation(msg),
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<InvalidDateRange> for BookingError {
    fn from(e: InvalidDateRange) -> Self {
        Self::Validation(e.to_string())
    }
}
