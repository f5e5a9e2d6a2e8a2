use uuid::Uuid;
use crate::instance::TourInstance;

/// Seat accounting for a single departure.
///
/// Keeps `booked_spots + available_spots == capacity`. Operations mutate the
/// instance in place and leave it untouched on error; callers make them atomic by
/// writing the result back with a revision check.
pub struct CapacityLedger;

impl CapacityLedger {
    /// Hold seats for `booking_id`. A booking holds at most once.
    pub fn reserve(instance: &mut TourInstance, booking_id: Uuid, quantity: i32) -> Result<(), LedgerError> {
        Self::verify(instance)?;

        if quantity <= 0 {
            return Err(LedgerError::InvalidQuantity(quantity));
        }

        if instance.holds_seats_for(booking_id) {
            return Err(LedgerError::CorruptedLedger(format!(
                "booking {} already holds seats on instance {}",
                booking_id, instance.id
            )));
        }

        if quantity > instance.available_spots {
            return Err(LedgerError::InsufficientCapacity {
                requested: quantity,
                available: instance.available_spots,
            });
        }

        instance.booked_spots += quantity;
        instance.available_spots -= quantity;
        instance.seat_holds.insert(booking_id, quantity);

        Ok(())
    }

    /// Give back the seats held by `booking_id` and return how many there were.
    ///
    /// Releasing a booking with no hold is a no-op returning 0, so a release
    /// interrupted half way can simply be run again.
    pub fn release(instance: &mut TourInstance, booking_id: Uuid) -> Result<i32, LedgerError> {
        Self::verify(instance)?;

        let Some(&quantity) = instance.seat_holds.get(&booking_id) else {
            return Ok(0);
        };

        if quantity <= 0 || quantity > instance.booked_spots {
            tracing::error!(
                "Hold of {} seats for booking {} does not fit {} booked on instance {}",
                quantity,
                booking_id,
                instance.booked_spots,
                instance.id
            );
            return Err(LedgerError::CorruptedLedger(format!(
                "hold of {} for booking {} exceeds {} booked on instance {}",
                quantity, booking_id, instance.booked_spots, instance.id
            )));
        }

        instance.seat_holds.remove(&booking_id);
        instance.booked_spots -= quantity;
        instance.available_spots += quantity;

        Ok(quantity)
    }

    /// Check the seat invariant
    pub fn verify(instance: &TourInstance) -> Result<(), LedgerError> {
        let consistent = instance.booked_spots >= 0
            && instance.available_spots >= 0
            && instance.booked_spots <= instance.capacity
            && instance.booked_spots + instance.available_spots == instance.capacity;

        if consistent {
            Ok(())
        } else {
            tracing::error!(
                "Capacity invariant broken on instance {}: booked {} + available {} != capacity {}",
                instance.id,
                instance.booked_spots,
                instance.available_spots,
                instance.capacity
            );
            Err(LedgerError::CorruptedLedger(format!(
                "instance {}: booked {} + available {} != capacity {}",
                instance.id, instance.booked_spots, instance.available_spots, instance.capacity
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient capacity: requested {requested}, available {available}")]
    InsufficientCapacity {
        requested: i32,
        available: i32,
    },

    #[error("Invalid seat quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Capacity ledger corrupted: {0}")]
    CorruptedLedger(String),
}
