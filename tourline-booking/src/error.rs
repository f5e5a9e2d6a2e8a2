use uuid::Uuid;
use tourline_catalog::{LedgerError, LifecycleError, TourError};
use tourline_core::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient capacity: requested {requested}, available {available}")]
    InsufficientCapacity {
        requested: i32,
        available: i32,
    },

    #[error("Booking already cancelled: {0}")]
    AlreadyCancelled(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: String,
        to: String,
    },

    #[error("Capacity ledger corrupted: {0}")]
    CorruptedLedger(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Gave up after {attempts} concurrent modification conflicts")]
    Contention {
        attempts: u32,
    },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Payment provider error: {0}")]
    Payment(String),
}

impl BookingError {
    pub fn transition(from: impl ToString, to: impl ToString) -> Self {
        BookingError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<LedgerError> for BookingError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCapacity { requested, available } => {
                BookingError::InsufficientCapacity { requested, available }
            }
            LedgerError::InvalidQuantity(quantity) => {
                BookingError::InvalidRequest(format!("invalid number of people: {}", quantity))
            }
            LedgerError::CorruptedLedger(detail) => BookingError::CorruptedLedger(detail),
        }
    }
}

impl From<LifecycleError> for BookingError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::InvalidTransition { from, to } => BookingError::transition(from, to),
            LifecycleError::NotDeparted(id) => {
                BookingError::transition("departure pending", format!("completed ({})", id))
            }
            other => BookingError::InvalidRequest(other.to_string()),
        }
    }
}

impl From<TourError> for BookingError {
    fn from(err: TourError) -> Self {
        BookingError::InvalidRequest(err.to_string())
    }
}
