use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use tourline_catalog::TourInstance;
use tourline_shared::Masked;
use crate::error::BookingError;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "pending_payment",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Customer,
    Provider,
    System,
}

impl CancelledBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelledBy::Customer => "customer",
            CancelledBy::Provider => "provider",
            CancelledBy::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cancellation {
    pub cancelled_by: CancelledBy,
    pub reason: Option<String>,
    pub refund_percentage: u8,
    pub refund_amount: i64,
    pub cancelled_at: DateTime<Utc>,
}

/// The person a booking is made for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: Option<Masked<String>>,
}

impl Customer {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email: email.map(Masked),
        }
    }
}

/// One customer's reservation of seats on one departure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub tour_instance_id: Uuid,
    pub tour_id: Uuid,
    pub customer_id: String,
    pub customer_email: Option<Masked<String>>,
    pub number_of_people: i32,
    /// Instance price at the moment of booking; later discounts do not apply
    pub price_per_person: i64,
    pub total_amount: i64,
    pub currency: String,
    pub discount_applied: Option<u8>,
    pub status: BookingStatus,
    pub cancellation: Option<Cancellation>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// New pending booking with price and discount locked from `instance`
    pub fn new(
        id: Uuid,
        instance: &TourInstance,
        customer: &Customer,
        number_of_people: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tour_instance_id: instance.id,
            tour_id: instance.tour_id,
            customer_id: customer.id.clone(),
            customer_email: customer.email.clone(),
            number_of_people,
            price_per_person: instance.price_per_person,
            total_amount: instance.price_per_person * i64::from(number_of_people),
            currency: instance.currency.clone(),
            discount_applied: instance.active_discount(),
            status: BookingStatus::PendingPayment,
            cancellation: None,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Neither completed nor cancelled
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Transition: PendingPayment → Confirmed. Confirming twice is a no-op.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        match self.status {
            BookingStatus::PendingPayment => {
                self.status = BookingStatus::Confirmed;
                self.updated_at = now;
                Ok(())
            }
            BookingStatus::Confirmed => Ok(()),
            BookingStatus::Cancelled => Err(BookingError::AlreadyCancelled(self.id)),
            BookingStatus::Completed => Err(BookingError::transition(self.status, BookingStatus::Confirmed)),
        }
    }

    /// Transition: Confirmed → Completed (the tour took place)
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        if self.status != BookingStatus::Confirmed {
            return Err(BookingError::transition(self.status, BookingStatus::Completed));
        }

        self.status = BookingStatus::Completed;
        self.updated_at = now;
        Ok(())
    }

    /// Transition: PendingPayment | Confirmed → Cancelled
    pub fn cancel(
        &mut self,
        cancelled_by: CancelledBy,
        reason: Option<String>,
        refund_percentage: u8,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        match self.status {
            BookingStatus::Cancelled => return Err(BookingError::AlreadyCancelled(self.id)),
            BookingStatus::Completed => {
                return Err(BookingError::transition(self.status, BookingStatus::Cancelled))
            }
            _ => {}
        }

        let refund_percentage = refund_percentage.min(100);
        self.status = BookingStatus::Cancelled;
        self.cancellation = Some(Cancellation {
            cancelled_by,
            reason,
            refund_percentage,
            refund_amount: self.refund_amount(refund_percentage),
            cancelled_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Amount returned for a refund of `percentage` percent, rounded to the nearest unit
    pub fn refund_amount(&self, percentage: u8) -> i64 {
        (self.total_amount * i64::from(percentage.min(100)) + 50).div_euclid(100)
    }
}
