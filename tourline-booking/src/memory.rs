use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use tourline_catalog::{InstanceStatus, Tour, TourInstance};
use tourline_core::{StoreError, Versioned};
use crate::models::Booking;
use crate::repository::{BookingRepository, InstanceRepository, TourCatalog};

/// In-process document store for tests and single-node runs.
///
/// Each document carries a revision bumped on every write; updates against a
/// stale revision fail exactly like the Postgres store does.
#[derive(Default)]
pub struct MemoryStore {
    tours: RwLock<HashMap<Uuid, Tour>>,
    instances: RwLock<HashMap<Uuid, Versioned<TourInstance>>>,
    bookings: RwLock<HashMap<Uuid, Versioned<Booking>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare_and_set<T: Clone>(
    docs: &mut HashMap<Uuid, Versioned<T>>,
    id: Uuid,
    value: &T,
    expected_revision: u64,
) -> Result<u64, StoreError> {
    let doc = docs
        .get_mut(&id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

    if doc.revision != expected_revision {
        return Err(StoreError::RevisionConflict {
            id: id.to_string(),
            expected: expected_revision,
        });
    }

    doc.revision += 1;
    doc.value = value.clone();
    Ok(doc.revision)
}

#[async_trait]
impl TourCatalog for MemoryStore {
    async fn save_tour(&self, tour: &Tour) -> Result<(), StoreError> {
        self.tours.write().await.insert(tour.id, tour.clone());
        Ok(())
    }

    async fn get_tour(&self, id: Uuid) -> Result<Option<Tour>, StoreError> {
        Ok(self.tours.read().await.get(&id).cloned())
    }

    async fn list_tours(&self, provider_id: &str) -> Result<Vec<Tour>, StoreError> {
        let mut tours: Vec<Tour> = self
            .tours
            .read()
            .await
            .values()
            .filter(|t| t.provider_id == provider_id)
            .cloned()
            .collect();
        tours.sort_by_key(|t| t.created_at);
        Ok(tours)
    }
}

#[async_trait]
impl InstanceRepository for MemoryStore {
    async fn insert_instance(&self, instance: &TourInstance) -> Result<(), StoreError> {
        let mut instances = self.instances.write().await;
        if instances.contains_key(&instance.id) {
            return Err(StoreError::AlreadyExists(instance.id.to_string()));
        }
        instances.insert(instance.id, Versioned::new(1, instance.clone()));
        Ok(())
    }

    async fn get_instance(&self, id: Uuid) -> Result<Option<Versioned<TourInstance>>, StoreError> {
        Ok(self.instances.read().await.get(&id).cloned())
    }

    async fn update_instance(
        &self,
        instance: &TourInstance,
        expected_revision: u64,
    ) -> Result<u64, StoreError> {
        let mut instances = self.instances.write().await;
        compare_and_set(&mut instances, instance.id, instance, expected_revision)
    }

    async fn list_instances_by_tour(&self, tour_id: Uuid) -> Result<Vec<TourInstance>, StoreError> {
        let mut found: Vec<TourInstance> = self
            .instances
            .read()
            .await
            .values()
            .filter(|doc| doc.value.tour_id == tour_id)
            .map(|doc| doc.value.clone())
            .collect();
        found.sort_by_key(|i| i.departure_at());
        Ok(found)
    }

    async fn list_open_instances(&self) -> Result<Vec<TourInstance>, StoreError> {
        let mut found: Vec<TourInstance> = self
            .instances
            .read()
            .await
            .values()
            .filter(|doc| !doc.value.is_terminal())
            .map(|doc| doc.value.clone())
            .collect();
        found.sort_by_key(|i| i.departure_at());
        Ok(found)
    }

    async fn list_cancelled_holding_seats(&self) -> Result<Vec<TourInstance>, StoreError> {
        let mut found: Vec<TourInstance> = self
            .instances
            .read()
            .await
            .values()
            .filter(|doc| doc.value.status == InstanceStatus::Cancelled && !doc.value.seat_holds.is_empty())
            .map(|doc| doc.value.clone())
            .collect();
        found.sort_by_key(|i| i.departure_at());
        Ok(found)
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(StoreError::AlreadyExists(booking.id.to_string()));
        }
        bookings.insert(booking.id, Versioned::new(1, booking.clone()));
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Versioned<Booking>>, StoreError> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn update_booking(
        &self,
        booking: &Booking,
        expected_revision: u64,
    ) -> Result<u64, StoreError> {
        let mut bookings = self.bookings.write().await;
        compare_and_set(&mut bookings, booking.id, booking, expected_revision)
    }

    async fn list_bookings_by_instance(&self, instance_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let mut found: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|doc| doc.value.tour_instance_id == instance_id)
            .map(|doc| doc.value.clone())
            .collect();
        found.sort_by_key(|b| b.created_at);
        Ok(found)
    }

    async fn list_bookings_by_customer(&self, customer_id: &str) -> Result<Vec<Booking>, StoreError> {
        let mut found: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|doc| doc.value.customer_id == customer_id)
            .map(|doc| doc.value.clone())
            .collect();
        found.sort_by_key(|b| b.created_at);
        Ok(found)
    }
}
