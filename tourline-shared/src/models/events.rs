use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct InstanceUpdatedEvent {
    pub instance_id: Uuid,
    pub tour_id: Uuid,
    pub status: String,
    pub booked_spots: i32,
    pub available_spots: i32,
    pub price_per_person: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PricingActivatedEvent {
    pub instance_id: Uuid,
    pub discount_percentage: u8,
    pub reason: String,
    pub price_per_person: i64,
    pub original_price: i64,
    pub valid_until: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCreatedEvent {
    pub booking_id: Uuid,
    pub instance_id: Uuid,
    pub customer_id: String,
    pub number_of_people: i32,
    pub total_amount: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub instance_id: Uuid,
    pub cancelled_by: String,
    pub refund_percentage: u8,
    pub refund_amount: i64,
    pub timestamp: i64,
}

/// Everything the booking core announces to subscribers (SSE streams, audit sinks).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TourEvent {
    InstanceUpdated(InstanceUpdatedEvent),
    PricingActivated(PricingActivatedEvent),
    BookingCreated(BookingCreatedEvent),
    BookingCancelled(BookingCancelledEvent),
}

impl TourEvent {
    /// Instance the event belongs to, used to filter per-departure streams
    pub fn instance_id(&self) -> Uuid {
        match self {
            TourEvent::InstanceUpdated(e) => e.instance_id,
            TourEvent::PricingActivated(e) => e.instance_id,
            TourEvent::BookingCreated(e) => e.instance_id,
            TourEvent::BookingCancelled(e) => e.instance_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TourEvent::InstanceUpdated(_) => "instance_updated",
            TourEvent::PricingActivated(_) => "pricing_activated",
            TourEvent::BookingCreated(_) => "booking_created",
            TourEvent::BookingCancelled(_) => "booking_cancelled",
        }
    }
}
