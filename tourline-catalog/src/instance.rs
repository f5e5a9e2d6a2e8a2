use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tourline_shared::models::events::InstanceUpdatedEvent;

/// Lifecycle status of a departure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Scheduled,
    Filling,
    AlmostFull,
    AtRisk,
    Confirmed,
    Full,
    Completed,
    Cancelled,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceStatus::Completed | InstanceStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Scheduled => "scheduled",
            InstanceStatus::Filling => "filling",
            InstanceStatus::AlmostFull => "almost_full",
            InstanceStatus::AtRisk => "at_risk",
            InstanceStatus::Confirmed => "confirmed",
            InstanceStatus::Full => "full",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountReason {
    LastMinute,
    LowBookings,
}

impl DiscountReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountReason::LastMinute => "last_minute",
            DiscountReason::LowBookings => "low_bookings",
        }
    }
}

/// Extras unlocked by deep rescue discounts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BonusIncentive {
    FreePhotoPackage,
    PriorityCheckIn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DynamicPricing {
    pub is_active: bool,
    pub discount_percentage: u8,
    pub reason: DiscountReason,
    pub bonus_incentives: Vec<BonusIncentive>,
    pub valid_until: DateTime<Utc>,
    pub activated_at: DateTime<Utc>,
}

/// One dated departure of a tour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TourInstance {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub provider_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
    pub min_participants: i32,
    pub booked_spots: i32,
    pub available_spots: i32,
    /// Seats held by each booking that has not given them back
    #[serde(default)]
    pub seat_holds: BTreeMap<Uuid, i32>,
    pub price_per_person: i64,
    pub original_price: i64,
    pub currency: String,
    pub status: InstanceStatus,
    pub dynamic_pricing: Option<DynamicPricing>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TourInstance {
    /// Departure instant. Dates and times are stored in UTC.
    pub fn departure_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.start_time).and_utc()
    }

    /// Fractional hours until departure; negative once the tour has left.
    pub fn hours_until_departure(&self, now: DateTime<Utc>) -> f64 {
        (self.departure_at() - now).num_seconds() as f64 / 3600.0
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn holds_seats_for(&self, booking_id: Uuid) -> bool {
        self.seat_holds.contains_key(&booking_id)
    }

    /// Discount currently offered, if any
    pub fn active_discount(&self) -> Option<u8> {
        self.dynamic_pricing
            .as_ref()
            .filter(|p| p.is_active)
            .map(|p| p.discount_percentage)
    }

    pub fn available_fraction(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.available_spots as f64 / self.capacity as f64
        }
    }

    pub fn to_event(&self) -> InstanceUpdatedEvent {
        InstanceUpdatedEvent {
            instance_id: self.id,
            tour_id: self.tour_id,
            status: self.status.to_string(),
            booked_spots: self.booked_spots,
            available_spots: self.available_spots,
            price_per_person: self.price_per_person,
            timestamp: self.updated_at.timestamp(),
        }
    }
}
