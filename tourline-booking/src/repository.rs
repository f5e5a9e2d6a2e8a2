use async_trait::async_trait;
use uuid::Uuid;
use tourline_catalog::{Tour, TourInstance};
use tourline_core::{StoreError, Versioned};
use crate::models::Booking;

/// Read-mostly access to tour templates
#[async_trait]
pub trait TourCatalog: Send + Sync {
    async fn save_tour(&self, tour: &Tour) -> Result<(), StoreError>;

    async fn get_tour(&self, id: Uuid) -> Result<Option<Tour>, StoreError>;

    async fn list_tours(&self, provider_id: &str) -> Result<Vec<Tour>, StoreError>;
}

/// Departure documents with optimistic concurrency
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    async fn insert_instance(&self, instance: &TourInstance) -> Result<(), StoreError>;

    async fn get_instance(&self, id: Uuid) -> Result<Option<Versioned<TourInstance>>, StoreError>;

    /// Write `instance` if the stored revision is still `expected_revision`.
    /// Returns the new revision.
    async fn update_instance(
        &self,
        instance: &TourInstance,
        expected_revision: u64,
    ) -> Result<u64, StoreError>;

    async fn list_instances_by_tour(&self, tour_id: Uuid) -> Result<Vec<TourInstance>, StoreError>;

    /// Instances not yet completed or cancelled
    async fn list_open_instances(&self) -> Result<Vec<TourInstance>, StoreError>;

    /// Cancelled instances whose cascade has not given every seat back yet
    async fn list_cancelled_holding_seats(&self) -> Result<Vec<TourInstance>, StoreError>;
}

/// Booking documents with optimistic concurrency
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<Versioned<Booking>>, StoreError>;

    async fn update_booking(
        &self,
        booking: &Booking,
        expected_revision: u64,
    ) -> Result<u64, StoreError>;

    async fn list_bookings_by_instance(&self, instance_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    async fn list_bookings_by_customer(&self, customer_id: &str) -> Result<Vec<Booking>, StoreError>;
}
